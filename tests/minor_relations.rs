mod util;
use mesh_relations::prelude::*;
use util::*;

const LINKS: &[(ElementKind, ElementKind)] = &[
    (Cell, Face),
    (Face, Vertex),
    (Cell, Edge),
    (Edge, Vertex),
    (Vertex, Edge),
];

fn instance(config: MeshConfig, reorder: bool) -> MeshInstance {
    let meta = tet_grid(3, 2);
    build(
        &meta,
        config,
        reorder,
        &[(Cell, &[("s", FieldType::of::<i64>()), ("n", FieldType::of::<i64>())][..])],
        LINKS,
    )
}

/// Manual composition from the metadata: for every cell, the sum over
/// `cell -> mid -> vertex` paths of vertex identities.
fn raw_two_hop(meta: &MeshMetadata, mid: ElementKind) -> Vec<i64> {
    let first = meta.relation_or_transpose(Cell, mid).unwrap();
    let second = meta.relation_or_transpose(mid, Vertex).unwrap();
    (0..first.rows())
        .map(|c| {
            first
                .row(c)
                .iter()
                .flat_map(|&m| second.row(m as usize))
                .map(|&v| v as i64)
                .sum()
        })
        .collect()
}

#[test]
fn chained_kernel_access_equals_composed_hops() {
    let meta = tet_grid(3, 2);
    for mid in [Face, Edge] {
        let expect = raw_two_hop(&meta, mid);
        for config in configs() {
            for reorder in [false, true] {
                let m = instance(config, reorder);
                let mut k = KernelBuilder::new("two-hop", &m, Cell).unwrap();
                let r1 = k.relation(Cell, mid).unwrap();
                let r2 = k.relation(mid, Vertex).unwrap();
                let s = k.field::<i64>(Cell, "s", Access::Write).unwrap();
                let kernel = k.compile(m.config()).unwrap();
                kernel
                    .run(|ctx, c| {
                        let outer = ctx.neighbors(r1, c);
                        let mut acc = 0;
                        for j in 0..outer.len() {
                            let inner = ctx.neighbors_at(r2, outer.get(j));
                            for kk in 0..inner.len() {
                                acc += ctx.target(r2, inner.get(kk)).identity().get() as i64;
                            }
                        }
                        ctx.write(s, c, acc);
                    })
                    .unwrap();
                let got = m.elements(Cell).unwrap().export::<i64>("s").unwrap();
                assert_eq!(got, expect, "cells->{mid}->verts {config:?} reorder={reorder}");
            }
        }
    }
}

#[test]
fn compiled_traversal_matches_single_hops() {
    for reorder in [false, true] {
        let m = instance(MeshConfig::default().with_localize_to_end(false), reorder);
        let t = compile_traversal(&m, Cell, &[Edge, Vertex, Edge]).unwrap();
        assert_eq!(t.hops(), 3);
        assert_eq!(t.endpoint_kind(), Edge);
        let ce = m.relation(Cell, Edge).unwrap();
        let ev = m.relation(Edge, Vertex).unwrap();
        let ve = m.relation(Vertex, Edge).unwrap();
        for c in m.iterate(Cell).unwrap() {
            let mut manual = Vec::new();
            for e in ce.neighbors_of(c.slot()).iter() {
                for v in ev.neighbors_of(e).iter() {
                    manual.extend(ve.neighbors_of(v).iter());
                }
            }
            assert_eq!(t.endpoints(c.slot()), manual);
        }
    }
}

#[test]
fn every_tet_has_four_faces_and_six_edges() {
    let m = instance(MeshConfig::default(), true);
    let mut k = KernelBuilder::new("degrees", &m, Cell).unwrap();
    let cf = k.relation(Cell, Face).unwrap();
    let ce = k.relation(Cell, Edge).unwrap();
    let n = k.field::<i64>(Cell, "n", Access::Write).unwrap();
    let kernel = k.compile(m.config()).unwrap();
    kernel
        .run(|ctx, c| {
            let d = ctx.neighbors(cf, c).len() * 10 + ctx.neighbors(ce, c).len();
            ctx.write(n, c, d as i64);
        })
        .unwrap();
    let got = m.elements(Cell).unwrap().export::<i64>("n").unwrap();
    assert!(got.iter().all(|&d| d == 46));
}
