//! Immutable mesh metadata: element counts, identity-based adjacency and
//! per-element patch ids.
//!
//! Metadata is validated once when it is created and then shared by
//! reference (`Arc<MeshMetadata>`) among every mesh instance built from it.
//! All neighbour values are *logical identities* of the target kind.
//!
//! Two ways in:
//! - [`MetadataBuilder`] for programmatic construction;
//! - [`RawMeshMetadata`], a serde-friendly plain form for hosts that already
//!   parsed a metadata document, converted with [`MeshMetadata::try_from_raw`].

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshError;
use crate::topology::csr::CsrAdjacency;
use crate::topology::element::{ElementId, ElementKind, RelationKey};

/// Validated, immutable mesh description.
#[derive(Clone, Debug, Default)]
pub struct MeshMetadata {
    counts: BTreeMap<ElementKind, usize>,
    relations: BTreeMap<RelationKey, CsrAdjacency>,
    patches: BTreeMap<ElementKind, Arc<[u32]>>,
    /// Transposes of stored relations, keyed by the stored relation.
    transposed: BTreeMap<RelationKey, OnceCell<CsrAdjacency>>,
}

impl MeshMetadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Validate a raw metadata document.
    pub fn try_from_raw(raw: RawMeshMetadata) -> Result<Arc<Self>, MeshError> {
        let mut b = MetadataBuilder::default();
        for (kind, count) in raw.counts {
            b = b.count(kind, count);
        }
        for rel in raw.relations {
            b = b.relation(rel.from, rel.to, rel.offsets, rel.neighbors);
        }
        for (kind, ids) in raw.patches {
            b = b.patches(kind, ids);
        }
        b.build()
    }

    /// Element count of `kind`, if the metadata describes it.
    pub fn count(&self, kind: ElementKind) -> Option<usize> {
        self.counts.get(&kind).copied()
    }

    /// Kinds with a declared count, ascending.
    pub fn kinds(&self) -> impl Iterator<Item = ElementKind> + '_ {
        self.counts.keys().copied()
    }

    /// Identity-based adjacency stored for `from -> to`.
    pub fn relation(&self, from: ElementKind, to: ElementKind) -> Option<&CsrAdjacency> {
        self.relations.get(&RelationKey::new(from, to))
    }

    /// Adjacency for `from -> to`: the stored table, or the transpose of a
    /// stored `to -> from` (neighbours in ascending source identity). The
    /// transpose is computed once and shared by every instance.
    pub fn relation_or_transpose(
        &self,
        from: ElementKind,
        to: ElementKind,
    ) -> Option<&CsrAdjacency> {
        if let Some(adj) = self.relation(from, to) {
            return Some(adj);
        }
        let stored = RelationKey::new(to, from);
        let reverse = self.relations.get(&stored)?;
        let cell = self.transposed.get(&stored)?;
        Some(cell.get_or_init(|| {
            log::debug!("deriving {from}->{to} by transposing {stored}");
            reverse.transpose()
        }))
    }

    /// Relations stored in the metadata.
    pub fn relation_keys(&self) -> impl Iterator<Item = RelationKey> + '_ {
        self.relations.keys().copied()
    }

    /// Patch id per logical element of `kind`.
    ///
    /// Kinds without a patch array in the document are treated as a single
    /// patch `0`.
    pub fn patch_ids(&self, kind: ElementKind) -> Option<&Arc<[u32]>> {
        self.patches.get(&kind)
    }

    /// Patch id of one element.
    pub fn patch_of(&self, kind: ElementKind, id: ElementId) -> Option<u32> {
        self.patches.get(&kind)?.get(id.index()).copied()
    }
}

/// Programmatic construction of [`MeshMetadata`]. Validation happens in
/// [`MetadataBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct MetadataBuilder {
    counts: BTreeMap<ElementKind, usize>,
    relations: Vec<RawRelation>,
    patches: BTreeMap<ElementKind, Vec<u32>>,
}

impl MetadataBuilder {
    pub fn count(mut self, kind: ElementKind, count: usize) -> Self {
        self.counts.insert(kind, count);
        self
    }

    pub fn relation(
        mut self,
        from: ElementKind,
        to: ElementKind,
        offsets: Vec<u32>,
        neighbors: Vec<u32>,
    ) -> Self {
        self.relations.push(RawRelation {
            from,
            to,
            offsets,
            neighbors,
        });
        self
    }

    /// Convenience: a relation given as one neighbour list per source element.
    pub fn relation_lists<L: AsRef<[u32]>>(
        self,
        from: ElementKind,
        to: ElementKind,
        lists: &[L],
    ) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        offsets.push(0u32);
        let mut neighbors = Vec::new();
        for l in lists {
            neighbors.extend_from_slice(l.as_ref());
            offsets.push(neighbors.len() as u32);
        }
        self.relation(from, to, offsets, neighbors)
    }

    pub fn patches(mut self, kind: ElementKind, ids: Vec<u32>) -> Self {
        self.patches.insert(kind, ids);
        self
    }

    /// Validate everything and freeze.
    pub fn build(self) -> Result<Arc<MeshMetadata>, MeshError> {
        let counts = self.counts;
        let count_of = |kind: ElementKind| {
            counts.get(&kind).copied().ok_or_else(|| {
                MeshError::Schema(format!("no element count declared for {kind}"))
            })
        };

        let mut relations = BTreeMap::new();
        for rel in self.relations {
            let key = RelationKey::new(rel.from, rel.to);
            let rows = count_of(rel.from)?;
            let targets = count_of(rel.to)?;
            let csr = CsrAdjacency::try_new(rows, rel.offsets, rel.neighbors, targets)
                .map_err(|e| match e {
                    MeshError::Schema(msg) => MeshError::Schema(format!("relation {key}: {msg}")),
                    other => other,
                })?;
            if relations.insert(key, csr).is_some() {
                return Err(MeshError::Schema(format!("relation {key} given twice")));
            }
        }

        let mut patches = BTreeMap::new();
        for (&kind, &count) in &counts {
            let ids: Arc<[u32]> = match self.patches.get(&kind) {
                Some(ids) if ids.len() == count => ids.as_slice().into(),
                Some(ids) => {
                    return Err(MeshError::Schema(format!(
                        "patch array for {kind} has {} entries, expected {count}",
                        ids.len()
                    )));
                }
                None => vec![0u32; count].into(),
            };
            patches.insert(kind, ids);
        }
        if let Some(kind) = self.patches.keys().find(|k| !counts.contains_key(k)) {
            return Err(MeshError::Schema(format!(
                "patch array given for {kind} without an element count"
            )));
        }

        log::debug!(
            "mesh metadata loaded: {} kinds, {} relations",
            counts.len(),
            relations.len()
        );
        let transposed = relations.keys().map(|&k| (k, OnceCell::new())).collect();
        Ok(Arc::new(MeshMetadata {
            counts,
            relations,
            patches,
            transposed,
        }))
    }
}

/// Serde-friendly plain form of mesh metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawMeshMetadata {
    pub counts: BTreeMap<ElementKind, usize>,
    #[serde(default)]
    pub relations: Vec<RawRelation>,
    #[serde(default)]
    pub patches: BTreeMap<ElementKind, Vec<u32>>,
}

/// One CSR relation in raw form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRelation {
    pub from: ElementKind,
    pub to: ElementKind,
    pub offsets: Vec<u32>,
    pub neighbors: Vec<u32>,
}
