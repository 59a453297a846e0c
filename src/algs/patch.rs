//! Patch membership and patch slot ranges.
//!
//! Patch ids come straight from the metadata and are a function of logical
//! identity only, so they never change with reordering or localization
//! settings. When storage is patch-contiguous, each patch additionally owns a
//! half-open slot range `[start, end)`.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::algs::renumber::Permutation;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, Slot};

/// Patch information for one element kind of one instance.
#[derive(Clone, Debug)]
pub struct PatchInfo {
    kind: ElementKind,
    patch_of: Arc<[u32]>,
    ranges: Option<BTreeMap<u32, Range<usize>>>,
}

impl PatchInfo {
    /// Membership only; no slot ranges.
    pub fn new(kind: ElementKind, patch_of: Arc<[u32]>) -> Self {
        Self {
            kind,
            patch_of,
            ranges: None,
        }
    }

    /// Membership plus slot ranges derived from `perm`.
    ///
    /// Fails with [`MeshError::PatchLayout`] if some patch is not stored
    /// contiguously under `perm`.
    pub fn contiguous(
        kind: ElementKind,
        patch_of: Arc<[u32]>,
        perm: &Permutation,
    ) -> Result<Self, MeshError> {
        let mut ranges: BTreeMap<u32, Range<usize>> = BTreeMap::new();
        let mut current: Option<u32> = None;
        for s in 0..perm.len() {
            let patch = patch_of[perm.identity_of(Slot(s as u32)).index()];
            if current == Some(patch) {
                if let Some(r) = ranges.get_mut(&patch) {
                    r.end = s + 1;
                }
                continue;
            }
            if ranges.contains_key(&patch) {
                return Err(MeshError::PatchLayout(format!(
                    "{kind}: patch {patch} is split (resumes at slot {s})"
                )));
            }
            ranges.insert(patch, s..s + 1);
            current = Some(patch);
        }
        let info = Self {
            kind,
            patch_of,
            ranges: Some(ranges),
        };
        info.debug_assert_invariants();
        Ok(info)
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline]
    pub fn patch_of(&self, id: ElementId) -> u32 {
        self.patch_of[id.index()]
    }

    /// Whether slot ranges are available.
    pub fn is_contiguous(&self) -> bool {
        self.ranges.is_some()
    }

    pub fn slot_range_of(&self, patch: u32) -> Result<Range<usize>, MeshError> {
        let ranges = self.ranges.as_ref().ok_or_else(|| {
            MeshError::PatchLayout(format!(
                "{}: storage is not patch-contiguous",
                self.kind
            ))
        })?;
        ranges.get(&patch).cloned().ok_or_else(|| {
            MeshError::PatchLayout(format!("{}: no element belongs to patch {patch}", self.kind))
        })
    }

    /// `(patch, slot range)` pairs in ascending patch order, if contiguous.
    pub fn ranges(&self) -> Option<impl Iterator<Item = (u32, Range<usize>)> + '_> {
        self.ranges
            .as_ref()
            .map(|r| r.iter().map(|(&p, range)| (p, range.clone())))
    }

    /// Number of distinct patches.
    pub fn num_patches(&self) -> usize {
        match &self.ranges {
            Some(r) => r.len(),
            None => {
                let mut ids = self.patch_of.to_vec();
                ids.sort_unstable();
                ids.dedup();
                ids.len()
            }
        }
    }
}

impl DebugInvariants for PatchInfo {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        let Some(ranges) = &self.ranges else {
            return Ok(());
        };
        let covered: usize = ranges.values().map(|r| r.len()).sum();
        if covered != self.patch_of.len() {
            return Err(MeshError::PatchLayout(format!(
                "{}: ranges cover {covered} of {} slots",
                self.kind,
                self.patch_of.len()
            )));
        }
        Ok(())
    }
}

/// Patch queries across every element kind of an instance.
#[derive(Clone, Debug, Default)]
pub struct PatchIndexer {
    infos: BTreeMap<ElementKind, PatchInfo>,
}

impl PatchIndexer {
    pub fn insert(&mut self, info: PatchInfo) {
        self.infos.insert(info.kind, info);
    }

    pub fn info(&self, kind: ElementKind) -> Result<&PatchInfo, MeshError> {
        self.infos
            .get(&kind)
            .ok_or_else(|| MeshError::Config(format!("no patch information for {kind}")))
    }

    pub fn patch_of(&self, kind: ElementKind, id: ElementId) -> Result<u32, MeshError> {
        let info = self.info(kind)?;
        if id.index() >= info.patch_of.len() {
            return Err(MeshError::IndexOutOfRange {
                what: format!("{kind} identity"),
                index: id.index(),
                len: info.patch_of.len(),
            });
        }
        Ok(info.patch_of(id))
    }

    pub fn slot_range_of(&self, kind: ElementKind, patch: u32) -> Result<Range<usize>, MeshError> {
        self.info(kind)?.slot_range_of(patch)
    }
}
