//! A built mesh instance.
//!
//! The instance owns its element sets, relation tables, permutations and
//! patch information, and shares the metadata by reference. Structure is
//! frozen; only field values change, through the atomic cells of each set.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::algs::patch::PatchIndexer;
use crate::algs::renumber::Permutation;
use crate::config::MeshConfig;
use crate::data::element_set::ElementSet;
use crate::kernel::access::{Element, Elements};
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, MeshTopology, RelationKey};
use crate::topology::metadata::MeshMetadata;
use crate::topology::relation::RelationTable;

#[derive(Debug)]
pub struct MeshInstance {
    metadata: Arc<MeshMetadata>,
    topology: MeshTopology,
    config: MeshConfig,
    sets: BTreeMap<ElementKind, ElementSet>,
    relations: BTreeMap<RelationKey, RelationTable>,
    patches: PatchIndexer,
}

impl MeshInstance {
    pub(crate) fn new(
        metadata: Arc<MeshMetadata>,
        topology: MeshTopology,
        config: MeshConfig,
        sets: BTreeMap<ElementKind, ElementSet>,
        relations: BTreeMap<RelationKey, RelationTable>,
        patches: PatchIndexer,
    ) -> Self {
        Self {
            metadata,
            topology,
            config,
            sets,
            relations,
            patches,
        }
    }

    pub fn metadata(&self) -> &Arc<MeshMetadata> {
        &self.metadata
    }

    pub fn topology(&self) -> MeshTopology {
        self.topology
    }

    /// Configuration the instance was built with.
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Element kinds with storage in this instance.
    pub fn kinds(&self) -> impl Iterator<Item = ElementKind> + '_ {
        self.sets.keys().copied()
    }

    pub fn elements(&self, kind: ElementKind) -> Result<&ElementSet, MeshError> {
        self.sets
            .get(&kind)
            .ok_or_else(|| MeshError::Config(format!("instance has no {kind}")))
    }

    /// Number of elements of `kind`.
    pub fn len(&self, kind: ElementKind) -> Result<usize, MeshError> {
        Ok(self.elements(kind)?.len())
    }

    pub fn permutation(&self, kind: ElementKind) -> Result<&Arc<Permutation>, MeshError> {
        Ok(self.elements(kind)?.permutation())
    }

    /// Relation table linked at build time, or
    /// [`MeshError::UnlinkedRelation`].
    pub fn relation(&self, from: ElementKind, to: ElementKind) -> Result<&RelationTable, MeshError> {
        self.relations
            .get(&RelationKey::new(from, to))
            .ok_or(MeshError::UnlinkedRelation { from, to })
    }

    pub fn relation_keys(&self) -> impl Iterator<Item = RelationKey> + '_ {
        self.relations.keys().copied()
    }

    pub fn patch_indexer(&self) -> &PatchIndexer {
        &self.patches
    }

    /// Patch of the element of `kind` with identity `id`.
    pub fn patch_of(&self, kind: ElementKind, id: ElementId) -> Result<u32, MeshError> {
        self.patches.patch_of(kind, id)
    }

    /// Lazy sequence of element handles of `kind`, in slot order.
    pub fn iterate(&self, kind: ElementKind) -> Result<Elements<'_>, MeshError> {
        let set = self.elements(kind)?;
        Ok(Elements::new(kind, set.permutation()))
    }

    /// Parallel counterpart of [`MeshInstance::iterate`].
    pub fn par_iterate(
        &self,
        kind: ElementKind,
    ) -> Result<impl IndexedParallelIterator<Item = Element<'_>>, MeshError> {
        let perm: &Permutation = self.elements(kind)?.permutation();
        Ok((0..perm.len() as u32)
            .into_par_iter()
            .map(move |s| Element::new(kind, s.into(), perm)))
    }
}
