#![allow(dead_code)]
use std::collections::BTreeMap;
use std::sync::Arc;

use mesh_relations::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub use mesh_relations::topology::element::ElementKind::{Cell, Edge, Face, Vertex};

pub fn rng() -> SmallRng {
    SmallRng::seed_from_u64(0xDEADBEEF)
}

/// Two tetrahedra sharing the face {1, 2, 3}.
pub fn two_tets() -> Arc<MeshMetadata> {
    MeshMetadata::builder()
        .count(Vertex, 5)
        .count(Cell, 2)
        .relation_lists(Cell, Vertex, &[vec![0u32, 1, 2, 3], vec![1, 2, 3, 4]])
        .relation_lists(Cell, Cell, &[vec![1u32], vec![0]])
        .patches(Vertex, vec![1, 0, 0, 1, 1])
        .patches(Cell, vec![1, 0])
        .build()
        .unwrap()
}

fn insert_unique<const N: usize>(map: &mut BTreeMap<[u32; N], u32>, mut key: [u32; N]) {
    key.sort_unstable();
    let next = map.len() as u32;
    map.entry(key).or_insert(next);
}

fn lookup<const N: usize>(map: &BTreeMap<[u32; N], u32>, mut key: [u32; N]) -> u32 {
    key.sort_unstable();
    map[&key]
}

/// Structured `n^3` hexahedral grid, each hex split into six tetrahedra
/// (Kuhn split along the main diagonal). Patches are `block^3` groups of hexes
/// (cells) or of lattice points (vertices); edges and faces take the patch of
/// their lowest vertex.
///
/// Stored relations: cells->verts, cells->cells (face neighbours),
/// cells->faces, cells->edges, faces->verts, edges->verts, verts->verts (edge
/// neighbours, ascending). Everything else is derived by transposition.
pub fn tet_grid(n: usize, block: usize) -> Arc<MeshMetadata> {
    let np = n + 1;
    let vid = |x: usize, y: usize, z: usize| (x + y * np + z * np * np) as u32;
    let blocks = n.div_ceil(block) + 1;
    let patch_at =
        |x: usize, y: usize, z: usize| (x / block + (y / block) * blocks + (z / block) * blocks * blocks) as u32;

    const AXES: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let mut cells: Vec<[u32; 4]> = Vec::new();
    let mut cell_patch = Vec::new();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                for axes in AXES {
                    let mut p = [x, y, z];
                    let mut tet = [vid(p[0], p[1], p[2]); 4];
                    for (i, &a) in axes.iter().enumerate() {
                        p[a] += 1;
                        tet[i + 1] = vid(p[0], p[1], p[2]);
                    }
                    cells.push(tet);
                    cell_patch.push(patch_at(x, y, z));
                }
            }
        }
    }

    let nv = np * np * np;
    let mut vert_patch = vec![0u32; nv];
    for z in 0..np {
        for y in 0..np {
            for x in 0..np {
                vert_patch[vid(x, y, z) as usize] = patch_at(x, y, z);
            }
        }
    }

    let mut faces: BTreeMap<[u32; 3], u32> = BTreeMap::new();
    let mut edges: BTreeMap<[u32; 2], u32> = BTreeMap::new();
    for t in &cells {
        for skip in 0..4 {
            let f: Vec<u32> = (0..4).filter(|&i| i != skip).map(|i| t[i]).collect();
            insert_unique(&mut faces, [f[0], f[1], f[2]]);
        }
        for i in 0..4 {
            for j in i + 1..4 {
                insert_unique(&mut edges, [t[i], t[j]]);
            }
        }
    }

    let mut face_verts = vec![Vec::new(); faces.len()];
    for (f, &id) in &faces {
        face_verts[id as usize] = f.to_vec();
    }
    let mut edge_verts = vec![Vec::new(); edges.len()];
    for (e, &id) in &edges {
        edge_verts[id as usize] = e.to_vec();
    }

    let mut cell_faces = Vec::with_capacity(cells.len());
    let mut cell_edges = Vec::with_capacity(cells.len());
    let mut face_cells: Vec<Vec<u32>> = vec![Vec::new(); faces.len()];
    for (c, t) in cells.iter().enumerate() {
        let mut fs = Vec::with_capacity(4);
        for skip in 0..4 {
            let f: Vec<u32> = (0..4).filter(|&i| i != skip).map(|i| t[i]).collect();
            let id = lookup(&faces, [f[0], f[1], f[2]]);
            face_cells[id as usize].push(c as u32);
            fs.push(id);
        }
        cell_faces.push(fs);
        let mut es = Vec::with_capacity(6);
        for i in 0..4 {
            for j in i + 1..4 {
                es.push(lookup(&edges, [t[i], t[j]]));
            }
        }
        cell_edges.push(es);
    }
    let cell_cells: Vec<Vec<u32>> = cell_faces
        .iter()
        .enumerate()
        .map(|(c, fs)| {
            fs.iter()
                .filter_map(|&f| {
                    face_cells[f as usize]
                        .iter()
                        .copied()
                        .find(|&o| o != c as u32)
                })
                .collect()
        })
        .collect();

    let mut vert_verts = vec![Vec::new(); nv];
    for e in edges.keys() {
        vert_verts[e[0] as usize].push(e[1]);
        vert_verts[e[1] as usize].push(e[0]);
    }
    for l in &mut vert_verts {
        l.sort_unstable();
    }

    let face_patch: Vec<u32> = face_verts.iter().map(|f| vert_patch[f[0] as usize]).collect();
    let edge_patch: Vec<u32> = edge_verts.iter().map(|e| vert_patch[e[0] as usize]).collect();
    let cell_lists: Vec<Vec<u32>> = cells.iter().map(|t| t.to_vec()).collect();

    MeshMetadata::builder()
        .count(Vertex, nv)
        .count(Edge, edges.len())
        .count(Face, faces.len())
        .count(Cell, cells.len())
        .relation_lists(Cell, Vertex, &cell_lists)
        .relation_lists(Cell, Cell, &cell_cells)
        .relation_lists(Cell, Face, &cell_faces)
        .relation_lists(Cell, Edge, &cell_edges)
        .relation_lists(Face, Vertex, &face_verts)
        .relation_lists(Edge, Vertex, &edge_verts)
        .relation_lists(Vertex, Vertex, &vert_verts)
        .patches(Vertex, vert_patch)
        .patches(Edge, edge_patch)
        .patches(Face, face_patch)
        .patches(Cell, cell_patch)
        .build()
        .unwrap()
}

/// Every combination of the localization axes, with and without
/// patch-contiguous storage.
pub fn configs() -> Vec<MeshConfig> {
    let mut out = Vec::new();
    for patch_contiguous in [false, true] {
        for to_end in [true, false] {
            for from_end in [false, true] {
                out.push(
                    MeshConfig::default()
                        .with_localize_to_end(to_end)
                        .with_localize_from_end(from_end)
                        .with_patch_contiguous(patch_contiguous),
                );
            }
        }
    }
    out
}

/// Build a tet instance: `reorder` on every kind the metadata describes,
/// then `fields` and `links`.
pub fn build(
    meta: &Arc<MeshMetadata>,
    config: MeshConfig,
    reorder: bool,
    fields: &[(ElementKind, &[(&str, FieldType)])],
    links: &[(ElementKind, ElementKind)],
) -> MeshInstance {
    let mut b = MeshBuilder::new(MeshTopology::Tet).with_config(config);
    for &kind in MeshTopology::Tet.kinds() {
        if meta.count(kind).is_some() {
            b.place(kind, &[], reorder).unwrap();
        }
    }
    for &(kind, decls) in fields {
        b.place(kind, decls, reorder).unwrap();
    }
    for &(from, to) in links {
        b.link(from, to).unwrap();
    }
    b.build(meta.clone()).unwrap()
}

/// Per-source sums of neighbour identities, straight from the metadata.
pub fn raw_neighbor_sums(meta: &MeshMetadata, from: ElementKind, to: ElementKind) -> Vec<i64> {
    let adj = meta.relation_or_transpose(from, to).unwrap();
    (0..adj.rows())
        .map(|r| adj.row(r).iter().map(|&v| v as i64).sum())
        .collect()
}

/// Per-source neighbour counts, straight from the metadata.
pub fn raw_degrees(meta: &MeshMetadata, from: ElementKind, to: ElementKind) -> Vec<i64> {
    let adj = meta.relation_or_transpose(from, to).unwrap();
    (0..adj.rows()).map(|r| adj.degree(r) as i64).collect()
}
