//! Build phase of a mesh instance.
//!
//! Fields, per-kind reorder flags and relations are declared on a
//! [`MeshBuilder`]. The first [`MeshBuilder::build`] freezes the declaration
//! set; later `place`/`link` calls fail with [`MeshError::FrozenInstance`].
//! `build` itself may be repeated against any metadata, each call producing an
//! independent [`MeshInstance`] with its own storage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::algs::patch::{PatchIndexer, PatchInfo};
use crate::algs::renumber::OrderingAssigner;
use crate::config::MeshConfig;
use crate::data::element_set::ElementSet;
use crate::data::field::{FieldDecl, FieldType};
use crate::mesh::instance::MeshInstance;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementKind, MeshTopology, RelationKey};
use crate::topology::metadata::MeshMetadata;
use crate::topology::relation::RelationTable;

#[derive(Clone, Debug, Default)]
struct Placement {
    fields: Vec<FieldDecl>,
    reorder: bool,
}

/// Declares the structure of mesh instances.
#[derive(Clone, Debug)]
pub struct MeshBuilder {
    topology: MeshTopology,
    config: MeshConfig,
    placements: BTreeMap<ElementKind, Placement>,
    links: BTreeSet<RelationKey>,
    frozen: bool,
}

impl MeshBuilder {
    pub fn new(topology: MeshTopology) -> Self {
        Self {
            topology,
            config: MeshConfig::default(),
            placements: BTreeMap::new(),
            links: BTreeSet::new(),
            frozen: false,
        }
    }

    pub fn with_config(mut self, config: MeshConfig) -> Self {
        self.config = config;
        self
    }

    pub fn topology(&self) -> MeshTopology {
        self.topology
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_kind(&self, kind: ElementKind) -> Result<(), MeshError> {
        if !self.topology.has(kind) {
            return Err(MeshError::Config(format!(
                "{kind} is not an element kind of a {:?} mesh",
                self.topology
            )));
        }
        Ok(())
    }

    /// Declare fields on `kind`. Repeated calls add fields; `reorder` is
    /// sticky once set.
    pub fn place(
        &mut self,
        kind: ElementKind,
        fields: &[(&str, FieldType)],
        reorder: bool,
    ) -> Result<&mut Self, MeshError> {
        if self.frozen {
            return Err(MeshError::FrozenInstance("place fields"));
        }
        self.check_kind(kind)?;
        let placement = self.placements.entry(kind).or_default();
        for &(name, ty) in fields {
            if placement.fields.iter().any(|d| d.name == name) {
                return Err(MeshError::Config(format!(
                    "{kind}: field `{name}` declared twice"
                )));
            }
            if ty.components == 0 {
                return Err(MeshError::Config(format!(
                    "{kind}: field `{name}` has zero components"
                )));
            }
            placement.fields.push(FieldDecl::new(name, ty));
        }
        placement.reorder |= reorder;
        Ok(self)
    }

    /// Declare the directed relation `from -> to`.
    pub fn link(&mut self, from: ElementKind, to: ElementKind) -> Result<&mut Self, MeshError> {
        if self.frozen {
            return Err(MeshError::FrozenInstance("link relations"));
        }
        self.check_kind(from)?;
        self.check_kind(to)?;
        self.links.insert(RelationKey::new(from, to));
        Ok(self)
    }

    /// Lay out storage and relation tables for `metadata`.
    pub fn build(&mut self, metadata: Arc<MeshMetadata>) -> Result<MeshInstance, MeshError> {
        let assigner = OrderingAssigner::new(self.config.patch_contiguous);
        let mode = self.config.localize_mode();

        for &kind in self.placements.keys() {
            if metadata.count(kind).is_none() {
                return Err(MeshError::Config(format!(
                    "fields placed on {kind}, but the metadata has no {kind}"
                )));
            }
        }

        // Permutations are installed before any table or set refers to them.
        let mut perms = BTreeMap::new();
        let mut patches = PatchIndexer::default();
        for &kind in self.topology.kinds() {
            let (Some(_), Some(ids)) = (metadata.count(kind), metadata.patch_ids(kind)) else {
                continue;
            };
            let reorder = self.placements.get(&kind).is_some_and(|p| p.reorder);
            let perm = Arc::new(assigner.assign(kind, ids, reorder));
            let info = if self.config.patch_contiguous {
                PatchInfo::contiguous(kind, ids.clone(), &perm)?
            } else {
                PatchInfo::new(kind, ids.clone())
            };
            patches.insert(info);
            perms.insert(kind, perm);
        }

        let mut sets = BTreeMap::new();
        for (&kind, perm) in &perms {
            let decls = self
                .placements
                .get(&kind)
                .map(|p| p.fields.as_slice())
                .unwrap_or_default();
            sets.insert(kind, ElementSet::new(kind, perm.clone(), decls)?);
        }

        let mut relations = BTreeMap::new();
        for &key in &self.links {
            let (Some(source), Some(target)) = (perms.get(&key.from), perms.get(&key.to)) else {
                return Err(MeshError::Config(format!(
                    "cannot link {key}: the metadata lacks one of its element kinds"
                )));
            };
            let Some(adj) = metadata.relation_or_transpose(key.from, key.to) else {
                return Err(MeshError::Config(format!(
                    "cannot link {key}: no adjacency in either direction"
                )));
            };
            let table = RelationTable::build(key, adj, source.clone(), target.clone(), mode)?;
            relations.insert(key, table);
        }

        self.frozen = true;
        log::debug!(
            "built {:?} instance: {} element kinds, {} relations",
            self.topology,
            sets.len(),
            relations.len()
        );
        Ok(MeshInstance::new(
            metadata,
            self.topology,
            self.config,
            sets,
            relations,
            patches,
        ))
    }
}
