//! Relation access compilation.
//!
//! A traversal `element.R` over a loop of kind `A` resolves at compile time to
//! the instance's [`RelationTable`] for `A -> B`; at run time it is an offset
//! lookup plus a scan of the neighbour row, with the permutation applied on
//! whichever end the table left unmapped. Chained traversals (`A -> B -> C`)
//! compile to one table per hop and run as sequential lookups; no composed
//! table is ever materialized.

use std::iter::FusedIterator;
use std::ops::Range;

use crate::algs::renumber::Permutation;
use crate::mesh::instance::MeshInstance;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, RelationKey, Slot};
use crate::topology::relation::{Neighbors, RelationTable};

/// Handle to the element bound to one loop iteration.
#[derive(Copy, Clone, Debug)]
pub struct Element<'a> {
    kind: ElementKind,
    slot: Slot,
    perm: &'a Permutation,
}

impl<'a> Element<'a> {
    pub(crate) fn new(kind: ElementKind, slot: Slot, perm: &'a Permutation) -> Self {
        Self { kind, slot, perm }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Physical slot of the element.
    #[inline]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Stable logical identity of the element.
    #[inline]
    pub fn identity(&self) -> ElementId {
        self.perm.identity_of(self.slot)
    }
}

/// Lazy, single-pass sequence of element handles in slot order.
#[derive(Clone, Debug)]
pub struct Elements<'a> {
    kind: ElementKind,
    perm: &'a Permutation,
    slots: Range<u32>,
}

impl<'a> Elements<'a> {
    pub(crate) fn new(kind: ElementKind, perm: &'a Permutation) -> Self {
        Self::over(kind, perm, 0..perm.len() as u32)
    }

    pub(crate) fn over(kind: ElementKind, perm: &'a Permutation, slots: Range<u32>) -> Self {
        Self { kind, perm, slots }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = Element<'a>;

    #[inline]
    fn next(&mut self) -> Option<Element<'a>> {
        self.slots
            .next()
            .map(|s| Element::new(self.kind, Slot(s), self.perm))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for Elements<'_> {}
impl FusedIterator for Elements<'_> {}

/// Compiled single-hop relation access, usable inside kernels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelationHandle {
    pub(crate) index: usize,
    pub(crate) key: RelationKey,
}

impl RelationHandle {
    pub fn key(&self) -> RelationKey {
        self.key
    }
}

/// Resolves relation traversals against one mesh instance.
#[derive(Copy, Clone, Debug)]
pub struct RelationAccessCompiler<'m> {
    instance: &'m MeshInstance,
}

impl<'m> RelationAccessCompiler<'m> {
    pub fn new(instance: &'m MeshInstance) -> Self {
        Self { instance }
    }

    /// The table behind `from -> to`, or [`MeshError::UnlinkedRelation`].
    pub fn hop(&self, from: ElementKind, to: ElementKind) -> Result<&'m RelationTable, MeshError> {
        self.instance.relation(from, to)
    }

    /// Compile `over -> path[0] -> path[1] -> ...`.
    pub fn traversal(
        &self,
        over: ElementKind,
        path: &[ElementKind],
    ) -> Result<CompiledTraversal<'m>, MeshError> {
        if path.is_empty() {
            return Err(MeshError::Config(format!(
                "traversal from {over} names no relation"
            )));
        }
        let mut hops = Vec::with_capacity(path.len());
        let mut from = over;
        for &to in path {
            hops.push(self.hop(from, to)?);
            from = to;
        }
        log::debug!(
            "compiled traversal {over}{} ({} hops)",
            path.iter().map(|k| format!("->{k}")).collect::<String>(),
            hops.len()
        );
        Ok(CompiledTraversal { over, hops })
    }
}

/// Compile a multi-hop traversal over `instance`.
pub fn compile_traversal<'m>(
    instance: &'m MeshInstance,
    over: ElementKind,
    path: &[ElementKind],
) -> Result<CompiledTraversal<'m>, MeshError> {
    RelationAccessCompiler::new(instance).traversal(over, path)
}

/// A chain of relation hops compiled into sequential lookups.
#[derive(Clone, Debug)]
pub struct CompiledTraversal<'m> {
    over: ElementKind,
    hops: Vec<&'m RelationTable>,
}

impl<'m> CompiledTraversal<'m> {
    pub fn source_kind(&self) -> ElementKind {
        self.over
    }

    /// Kind reached by the last hop.
    pub fn endpoint_kind(&self) -> ElementKind {
        self.hops.last().map_or(self.over, |t| t.key().to)
    }

    pub fn hops(&self) -> usize {
        self.hops.len()
    }

    /// Neighbours of `slot` on hop `hop`.
    pub fn step(&self, hop: usize, slot: Slot) -> Neighbors<'m> {
        self.hops[hop].neighbors_of(slot)
    }

    /// Visit every endpoint slot reachable from `start`, one per path, in
    /// neighbour order.
    pub fn for_each_endpoint<F: FnMut(Slot)>(&self, start: Slot, mut f: F) {
        self.walk(0, start, &mut f);
    }

    fn walk<F: FnMut(Slot)>(&self, depth: usize, slot: Slot, f: &mut F) {
        match self.hops.get(depth) {
            None => f(slot),
            Some(table) => {
                for next in table.neighbors_of(slot).iter() {
                    self.walk(depth + 1, next, f);
                }
            }
        }
    }

    /// Collected endpoints of [`CompiledTraversal::for_each_endpoint`].
    pub fn endpoints(&self, start: Slot) -> Vec<Slot> {
        let mut out = Vec::new();
        self.for_each_endpoint(start, |s| out.push(s));
        out
    }
}
