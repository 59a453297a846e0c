//! Compressed sparse row adjacency.
//!
//! Immutable, cache-friendly neighbour lists: row `i` owns
//! `targets[offsets[i]..offsets[i + 1]]`. Neighbour order inside a row is
//! preserved exactly as supplied; nothing here sorts or deduplicates, so
//! self-loops and repeated neighbours survive. Arrays are shared through
//! `Arc<[u32]>` so clones are cheap.

use std::sync::Arc;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;

/// CSR adjacency from `rows` sources into `0..target_count` targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrAdjacency {
    offsets: Arc<[u32]>,
    targets: Arc<[u32]>,
    target_count: usize,
}

impl Default for CsrAdjacency {
    fn default() -> Self {
        Self {
            offsets: Arc::from([0u32]),
            targets: Arc::from([]),
            target_count: 0,
        }
    }
}

impl CsrAdjacency {
    /// Validate and wrap raw CSR arrays.
    ///
    /// Fails with [`MeshError::Schema`] when `offsets` is not `rows + 1` long,
    /// does not start at zero, decreases, disagrees with `targets.len()`, or
    /// when a target lies outside `0..target_count`.
    pub fn try_new(
        rows: usize,
        offsets: Vec<u32>,
        targets: Vec<u32>,
        target_count: usize,
    ) -> Result<Self, MeshError> {
        if offsets.len() != rows + 1 {
            return Err(MeshError::Schema(format!(
                "offsets has {} entries, expected {}",
                offsets.len(),
                rows + 1
            )));
        }
        if offsets[0] != 0 {
            return Err(MeshError::Schema(format!(
                "offsets must start at 0, found {}",
                offsets[0]
            )));
        }
        if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(MeshError::Schema(format!(
                "offsets decrease at row {i} ({} > {})",
                offsets[i],
                offsets[i + 1]
            )));
        }
        let nnz = offsets[rows] as usize;
        if targets.len() != nnz {
            return Err(MeshError::Schema(format!(
                "neighbor list has {} entries, offsets end at {nnz}",
                targets.len()
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t as usize >= target_count) {
            return Err(MeshError::Schema(format!(
                "neighbor id {bad} out of range for {target_count} targets"
            )));
        }
        Ok(Self {
            offsets: offsets.into(),
            targets: targets.into(),
            target_count,
        })
    }

    /// Build from per-row neighbour lists.
    pub fn from_lists<L>(lists: &[L], target_count: usize) -> Result<Self, MeshError>
    where
        L: AsRef<[u32]>,
    {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        offsets.push(0u32);
        let mut targets = Vec::new();
        for list in lists {
            targets.extend_from_slice(list.as_ref());
            offsets.push(targets.len() as u32);
        }
        Self::try_new(lists.len(), offsets, targets, target_count)
    }

    /// Number of source rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Size of the target index space.
    #[inline]
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Total number of stored neighbour entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.targets.len()
    }

    /// Neighbours of `row` in stored order.
    #[inline]
    pub fn row(&self, row: usize) -> &[u32] {
        let lo = self.offsets[row] as usize;
        let hi = self.offsets[row + 1] as usize;
        &self.targets[lo..hi]
    }

    #[inline]
    pub fn degree(&self, row: usize) -> usize {
        (self.offsets[row + 1] - self.offsets[row]) as usize
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    /// Reverse every arrow. Row `t` of the result lists the sources that
    /// reach `t`, in ascending source order.
    pub fn transpose(&self) -> CsrAdjacency {
        let n = self.target_count;
        let mut deg = vec![0u32; n];
        for &t in self.targets.iter() {
            deg[t as usize] += 1;
        }
        let mut offsets = vec![0u32; n + 1];
        for i in 0..n {
            offsets[i + 1] = offsets[i] + deg[i];
        }
        let mut write = offsets.clone();
        let mut targets = vec![0u32; self.nnz()];
        for src in 0..self.rows() {
            for &t in self.row(src) {
                let pos = write[t as usize] as usize;
                targets[pos] = src as u32;
                write[t as usize] += 1;
            }
        }
        CsrAdjacency {
            offsets: offsets.into(),
            targets: targets.into(),
            target_count: self.rows(),
        }
    }

    /// Rebuild with rows reordered and targets renamed.
    ///
    /// Row `r` of the result is row `row_source[r]` of `self`; every target
    /// `t` becomes `target_map[t]` when a map is given. Relative neighbour
    /// order inside a row is untouched.
    pub fn remap(&self, row_source: Option<&[u32]>, target_map: Option<&[u32]>) -> CsrAdjacency {
        let rows = self.rows();
        let mut offsets = Vec::with_capacity(rows + 1);
        offsets.push(0u32);
        let mut targets = Vec::with_capacity(self.nnz());
        for r in 0..rows {
            let old = row_source.map_or(r, |order| order[r] as usize);
            match target_map {
                Some(map) => targets.extend(self.row(old).iter().map(|&t| map[t as usize])),
                None => targets.extend_from_slice(self.row(old)),
            }
            offsets.push(targets.len() as u32);
        }
        CsrAdjacency {
            offsets: offsets.into(),
            targets: targets.into(),
            target_count: self.target_count,
        }
    }
}

impl DebugInvariants for CsrAdjacency {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        Self::try_new(
            self.rows(),
            self.offsets.to_vec(),
            self.targets.to_vec(),
            self.target_count,
        )
        .map(|_| ())
    }
}
