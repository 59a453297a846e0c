//! Identity/slot permutations and the ordering policies that produce them.
//!
//! A [`Permutation`] is the per-instance, per-kind bijection between an
//! element's logical identity and its physical storage slot. The
//! [`OrderingAssigner`] decides which permutation a kind gets: identity when
//! reordering is off, or a patch-grouped order (ascending patch id, then
//! ascending identity) when it is on, so elements of one patch share a
//! contiguous slot range.

use std::sync::Arc;

use itertools::Itertools;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, Slot};

/// Bijection `identity <-> slot` over `0..len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    slot_of: Arc<[u32]>,
    identity_of: Arc<[u32]>,
    identity: bool,
}

impl Permutation {
    /// `slot == identity` for every element.
    pub fn identity(len: usize) -> Self {
        let table: Arc<[u32]> = (0..len as u32).collect();
        Self {
            slot_of: table.clone(),
            identity_of: table,
            identity: true,
        }
    }

    /// Build from the storage order: slot `s` holds identity `order[s]`.
    ///
    /// Fails with [`MeshError::InvalidPermutation`] on duplicates or ids
    /// outside `0..order.len()`.
    pub fn from_identity_order(order: Vec<u32>) -> Result<Self, MeshError> {
        let n = order.len();
        let mut slot_of = vec![u32::MAX; n];
        for (slot, &id) in order.iter().enumerate() {
            let entry = slot_of.get_mut(id as usize).ok_or_else(|| {
                MeshError::InvalidPermutation(format!("identity {id} out of range for {n} elements"))
            })?;
            if *entry != u32::MAX {
                return Err(MeshError::InvalidPermutation(format!(
                    "identity {id} placed in slots {} and {slot}",
                    *entry
                )));
            }
            *entry = slot as u32;
        }
        let identity = order.iter().enumerate().all(|(s, &id)| s as u32 == id);
        Ok(Self {
            slot_of: slot_of.into(),
            identity_of: order.into(),
            identity,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slot_of.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slot_of.is_empty()
    }

    /// `true` when no element moved.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    #[inline]
    pub fn slot_of(&self, id: ElementId) -> Slot {
        Slot(self.slot_of[id.index()])
    }

    #[inline]
    pub fn identity_of(&self, slot: Slot) -> ElementId {
        ElementId(self.identity_of[slot.index()])
    }

    /// Checked variant of [`Permutation::slot_of`].
    pub fn try_slot_of(&self, id: ElementId) -> Result<Slot, MeshError> {
        self.slot_of
            .get(id.index())
            .map(|&s| Slot(s))
            .ok_or_else(|| MeshError::IndexOutOfRange {
                what: "identity".into(),
                index: id.index(),
                len: self.len(),
            })
    }

    /// Checked variant of [`Permutation::identity_of`].
    pub fn try_identity_of(&self, slot: Slot) -> Result<ElementId, MeshError> {
        self.identity_of
            .get(slot.index())
            .map(|&i| ElementId(i))
            .ok_or_else(|| MeshError::IndexOutOfRange {
                what: "slot".into(),
                index: slot.index(),
                len: self.len(),
            })
    }

    /// Raw `identity -> slot` table.
    pub fn slot_table(&self) -> &[u32] {
        &self.slot_of
    }

    /// Raw `slot -> identity` table.
    pub fn identity_table(&self) -> &[u32] {
        &self.identity_of
    }
}

impl DebugInvariants for Permutation {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        if self.slot_of.len() != self.identity_of.len() {
            return Err(MeshError::InvalidPermutation(format!(
                "forward table has {} entries, inverse has {}",
                self.slot_of.len(),
                self.identity_of.len()
            )));
        }
        for (id, &slot) in self.slot_of.iter().enumerate() {
            if self.identity_of.get(slot as usize) != Some(&(id as u32)) {
                return Err(MeshError::InvalidPermutation(format!(
                    "identity {id} -> slot {slot} is not inverted"
                )));
            }
        }
        Ok(())
    }
}

/// How an element kind's storage is ordered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageOrdering {
    /// Slot equals identity.
    Identity,
    /// Ascending patch id, ascending identity within a patch.
    PatchGrouped,
}

/// Computes the identity/slot permutation of each element kind.
#[derive(Copy, Clone, Debug, Default)]
pub struct OrderingAssigner {
    /// Group every kind by patch, whatever its reorder flag says.
    pub force_patch_grouping: bool,
}

impl OrderingAssigner {
    pub fn new(force_patch_grouping: bool) -> Self {
        Self {
            force_patch_grouping,
        }
    }

    /// Ordering chosen for a kind with the given reorder flag.
    pub fn ordering_for(&self, reorder: bool) -> StorageOrdering {
        if reorder || self.force_patch_grouping {
            StorageOrdering::PatchGrouped
        } else {
            StorageOrdering::Identity
        }
    }

    /// Permutation for `kind`, whose elements carry `patch_ids` (one per
    /// identity).
    pub fn assign(&self, kind: ElementKind, patch_ids: &[u32], reorder: bool) -> Permutation {
        let perm = match self.ordering_for(reorder) {
            StorageOrdering::Identity => Permutation::identity(patch_ids.len()),
            StorageOrdering::PatchGrouped => patch_grouped(patch_ids),
        };
        log::debug!(
            "{kind}: {} elements, ordering {:?}{}",
            perm.len(),
            self.ordering_for(reorder),
            if perm.is_identity() { " (no element moved)" } else { "" }
        );
        perm.debug_assert_invariants();
        perm
    }
}

/// Stable sort of identities by patch id.
fn patch_grouped(patch_ids: &[u32]) -> Permutation {
    let order: Vec<u32> = (0..patch_ids.len() as u32)
        .sorted_by_key(|&id| patch_ids[id as usize])
        .collect();
    let identity = order.iter().enumerate().all(|(s, &id)| s as u32 == id);
    let mut slot_of = vec![0u32; order.len()];
    for (slot, &id) in order.iter().enumerate() {
        slot_of[id as usize] = slot as u32;
    }
    Permutation {
        slot_of: slot_of.into(),
        identity_of: order.into(),
        identity,
    }
}
