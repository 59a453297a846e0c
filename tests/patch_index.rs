mod util;
use mesh_relations::prelude::*;
use util::*;

/// Patch index of every element of `kind`, written by a kernel, identity order.
fn kernel_patches(m: &MeshInstance, kind: ElementKind) -> Vec<u32> {
    let mut k = KernelBuilder::new("patch-index", m, kind).unwrap();
    let p = k.field::<u32>(kind, "p", Access::Write).unwrap();
    let kernel = k.compile(m.config()).unwrap();
    kernel.run(|ctx, e| ctx.write(p, e, ctx.patch_index(e))).unwrap();
    m.elements(kind).unwrap().export::<u32>("p").unwrap()
}

fn instance(meta: &std::sync::Arc<MeshMetadata>, config: MeshConfig, reorder: bool) -> MeshInstance {
    let p = [("p", FieldType::of::<u32>())];
    let kinds: Vec<ElementKind> = meta.kinds().collect();
    let fields: Vec<(ElementKind, &[(&str, FieldType)])> =
        kinds.iter().map(|&k| (k, &p[..])).collect();
    build(meta, config, reorder, &fields, &[])
}

#[test]
fn patch_index_depends_only_on_metadata() {
    let meta = tet_grid(4, 2);
    for kind in [Vertex, Edge, Face, Cell] {
        let expect = meta.patch_ids(kind).unwrap().to_vec();
        for config in configs() {
            for reorder in [false, true] {
                let m = instance(&meta, config, reorder);
                let got = kernel_patches(&m, kind);
                assert_eq!(got, expect, "{kind} {config:?} reorder={reorder}");
            }
        }
    }
}

#[test]
fn two_tets_first_patch_and_sum() {
    let meta = two_tets();
    for config in configs() {
        for reorder in [false, true] {
            let m = instance(&meta, config, reorder);
            let got = kernel_patches(&m, Vertex);
            assert_eq!(got[0], 1);
            assert_eq!(got.iter().sum::<u32>(), 3);
            assert_eq!(m.patch_of(Vertex, ElementId(0)).unwrap(), 1);
        }
    }
}

#[test]
fn contiguous_storage_exposes_slot_ranges() {
    let meta = tet_grid(4, 2);
    let config = MeshConfig::default().with_patch_contiguous(true);
    let m = instance(&meta, config, false);
    for kind in [Vertex, Cell] {
        let info = m.patch_indexer().info(kind).unwrap();
        assert!(info.is_contiguous());
        let perm = m.permutation(kind).unwrap();
        let mut covered = 0;
        for (patch, range) in info.ranges().unwrap() {
            assert_eq!(m.patch_indexer().slot_range_of(kind, patch).unwrap(), range);
            for s in range.clone() {
                let id = perm.identity_of(Slot(s as u32));
                assert_eq!(m.patch_of(kind, id).unwrap(), patch);
            }
            covered += range.len();
        }
        assert_eq!(covered, m.len(kind).unwrap());
    }
}

#[test]
fn slot_ranges_need_contiguous_storage() {
    let meta = tet_grid(2, 1);
    let m = instance(&meta, MeshConfig::default(), true);
    // grouped by patch, but ranges were not requested
    assert!(matches!(
        m.patch_indexer().slot_range_of(Vertex, 0),
        Err(MeshError::PatchLayout(_))
    ));
}
