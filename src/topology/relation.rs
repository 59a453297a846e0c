//! Per-instance relation tables: CSR adjacency over physical slots.
//!
//! A table is built at link time by remapping the metadata's identity-based
//! adjacency through the source and target permutations. Which end of the
//! mapping is applied eagerly is a compilation-strategy choice
//! ([`LocalizeMode`]); every combination yields the same neighbour slots in
//! the same order.
//!
//! | axis        | `true`                                   | `false`                                  |
//! |-------------|------------------------------------------|------------------------------------------|
//! | `to_end`    | targets stored as slots                  | targets stored as identities, mapped per lookup |
//! | `from_end`  | rows kept in identity order, source slot mapped per lookup | rows reordered into slot order at build |

use std::sync::Arc;

use crate::algs::renumber::Permutation;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use crate::topology::csr::CsrAdjacency;
use crate::topology::element::{ElementId, RelationKey, Slot};

/// Which permutation is applied when a relation table is built versus when
/// it is traversed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalizeMode {
    /// Apply the target permutation at build time.
    pub to_end: bool,
    /// Apply the source permutation at traversal time.
    pub from_end: bool,
}

impl Default for LocalizeMode {
    fn default() -> Self {
        Self {
            to_end: true,
            from_end: false,
        }
    }
}

/// Slot-space adjacency for one directed relation of one instance.
#[derive(Clone, Debug)]
pub struct RelationTable {
    key: RelationKey,
    adjacency: CsrAdjacency,
    source: Arc<Permutation>,
    target: Arc<Permutation>,
    mode: LocalizeMode,
}

impl RelationTable {
    /// Remap identity-based `adjacency` for the current permutations.
    pub fn build(
        key: RelationKey,
        adjacency: &CsrAdjacency,
        source: Arc<Permutation>,
        target: Arc<Permutation>,
        mode: LocalizeMode,
    ) -> Result<Self, MeshError> {
        if adjacency.rows() != source.len() || adjacency.target_count() != target.len() {
            return Err(MeshError::Schema(format!(
                "relation {key}: adjacency is {}x{}, permutations are {}x{}",
                adjacency.rows(),
                adjacency.target_count(),
                source.len(),
                target.len()
            )));
        }
        let row_source = (!mode.from_end && !source.is_identity()).then(|| source.identity_table());
        let target_map = (mode.to_end && !target.is_identity()).then(|| target.slot_table());
        let adjacency = if row_source.is_none() && target_map.is_none() {
            adjacency.clone()
        } else {
            adjacency.remap(row_source, target_map)
        };
        log::debug!(
            "linked {key}: {} entries, to_end={} from_end={}",
            adjacency.nnz(),
            mode.to_end,
            mode.from_end
        );
        let table = Self {
            key,
            adjacency,
            source,
            target,
            mode,
        };
        table.debug_assert_invariants();
        Ok(table)
    }

    pub fn key(&self) -> RelationKey {
        self.key
    }

    pub fn mode(&self) -> LocalizeMode {
        self.mode
    }

    /// Number of source elements.
    pub fn len(&self) -> usize {
        self.adjacency.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.rows() == 0
    }

    /// Total neighbour entries.
    pub fn nnz(&self) -> usize {
        self.adjacency.nnz()
    }

    #[inline]
    fn row_of(&self, source: Slot) -> usize {
        if self.mode.from_end {
            self.source.identity_of(source).index()
        } else {
            source.index()
        }
    }

    /// Neighbour slots of `source`, in the metadata's neighbour order.
    ///
    /// # Panics
    /// Panics if `source` is not a slot of the source kind.
    #[inline]
    pub fn neighbors_of(&self, source: Slot) -> Neighbors<'_> {
        let raw = self.adjacency.row(self.row_of(source));
        Neighbors {
            raw,
            target: (!self.mode.to_end).then_some(self.target.as_ref()),
        }
    }

    /// Checked variant of [`RelationTable::neighbors_of`].
    pub fn try_neighbors_of(&self, source: Slot) -> Result<Neighbors<'_>, MeshError> {
        if source.index() >= self.len() {
            return Err(MeshError::IndexOutOfRange {
                what: format!("{} source slot", self.key),
                index: source.index(),
                len: self.len(),
            });
        }
        Ok(self.neighbors_of(source))
    }

    /// Neighbour identities of `source`, in order.
    pub fn neighbor_identities(&self, source: Slot) -> Vec<ElementId> {
        self.neighbors_of(source)
            .iter()
            .map(|s| self.target.identity_of(s))
            .collect()
    }

    pub fn source_permutation(&self) -> &Arc<Permutation> {
        &self.source
    }

    pub fn target_permutation(&self) -> &Arc<Permutation> {
        &self.target
    }
}

impl DebugInvariants for RelationTable {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        self.adjacency.validate_invariants()?;
        if self.adjacency.rows() != self.source.len() {
            return Err(MeshError::Schema(format!(
                "relation {}: {} rows for {} sources",
                self.key,
                self.adjacency.rows(),
                self.source.len()
            )));
        }
        Ok(())
    }
}

/// Neighbour accessor for one source element: `.len()` and `[j]`.
#[derive(Copy, Clone, Debug)]
pub struct Neighbors<'a> {
    raw: &'a [u32],
    /// Present when targets are stored as identities.
    target: Option<&'a Permutation>,
}

impl<'a> Neighbors<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Slot of the `j`-th neighbour.
    ///
    /// # Panics
    /// Panics if `j >= self.len()`.
    #[inline]
    pub fn get(&self, j: usize) -> Slot {
        let v = self.raw[j];
        match self.target {
            Some(perm) => perm.slot_of(ElementId(v)),
            None => Slot(v),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Slot> + use<'a> {
        let raw = self.raw;
        let target = self.target;
        raw.iter().map(move |&v| match target {
            Some(perm) => perm.slot_of(ElementId(v)),
            None => Slot(v),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::element::ElementKind;

    fn modes() -> [LocalizeMode; 4] {
        [
            LocalizeMode { to_end: true, from_end: false },
            LocalizeMode { to_end: false, from_end: false },
            LocalizeMode { to_end: true, from_end: true },
            LocalizeMode { to_end: false, from_end: true },
        ]
    }

    #[test]
    fn every_mode_yields_same_neighbors() {
        // two cells over four vertices; identities
        let adj = CsrAdjacency::from_lists(&[vec![0u32, 1, 2], vec![2, 3, 1]], 4).unwrap();
        let src = Arc::new(Permutation::from_identity_order(vec![1, 0]).unwrap());
        let dst = Arc::new(Permutation::from_identity_order(vec![3, 1, 0, 2]).unwrap());
        let key = RelationKey::new(ElementKind::Cell, ElementKind::Vertex);

        let reference: Vec<Vec<ElementId>> = (0..2)
            .map(|s| {
                let t = RelationTable::build(key, &adj, src.clone(), dst.clone(), modes()[0]).unwrap();
                t.neighbor_identities(Slot(s))
            })
            .collect();
        // slot 0 holds cell 1
        assert_eq!(reference[0], vec![ElementId(2), ElementId(3), ElementId(1)]);
        assert_eq!(reference[1], vec![ElementId(0), ElementId(1), ElementId(2)]);

        for mode in modes() {
            let t = RelationTable::build(key, &adj, src.clone(), dst.clone(), mode).unwrap();
            for s in 0..2u32 {
                let slots: Vec<Slot> = t.neighbors_of(Slot(s)).iter().collect();
                let expect: Vec<Slot> = reference[s as usize].iter().map(|&id| dst.slot_of(id)).collect();
                assert_eq!(slots, expect, "mode {mode:?}");
                let n = t.neighbors_of(Slot(s));
                assert_eq!(n.get(n.len() - 1), *expect.last().unwrap());
            }
        }
    }

    #[test]
    fn self_relation_keeps_self_loops() {
        let adj = CsrAdjacency::from_lists(&[vec![0u32, 1], vec![0]], 2).unwrap();
        let perm = Arc::new(Permutation::from_identity_order(vec![1, 0]).unwrap());
        let key = RelationKey::new(ElementKind::Cell, ElementKind::Cell);
        let t = RelationTable::build(key, &adj, perm.clone(), perm, LocalizeMode::default()).unwrap();
        // cell 0 sits in slot 1 and lists itself first
        assert_eq!(t.neighbor_identities(Slot(1)), vec![ElementId(0), ElementId(1)]);
        assert_eq!(t.neighbors_of(Slot(1)).get(0), Slot(1));
        assert!(Arc::ptr_eq(t.source_permutation(), t.target_permutation()));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let adj = CsrAdjacency::from_lists(&[vec![0u32]], 1).unwrap();
        let key = RelationKey::new(ElementKind::Cell, ElementKind::Vertex);
        let err = RelationTable::build(
            key,
            &adj,
            Arc::new(Permutation::identity(2)),
            Arc::new(Permutation::identity(1)),
            LocalizeMode::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::Schema(_)));
    }

    #[test]
    fn checked_lookup_out_of_range() {
        let adj = CsrAdjacency::from_lists(&[vec![0u32]], 1).unwrap();
        let key = RelationKey::new(ElementKind::Cell, ElementKind::Vertex);
        let p = Arc::new(Permutation::identity(1));
        let t = RelationTable::build(key, &adj, p.clone(), p, LocalizeMode::default()).unwrap();
        assert!(t.try_neighbors_of(Slot(1)).is_err());
        assert_eq!(t.try_neighbors_of(Slot(0)).unwrap().len(), 1);
    }
}
