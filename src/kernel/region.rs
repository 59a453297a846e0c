//! Parallel regions over the elements of one kind.
//!
//! A kernel is described as dataflow before it runs: the iterated kind, the
//! relation hops it walks, the fields it touches with their [`Access`] mode
//! and the bindings to stage through the local cache. [`KernelBuilder::compile`]
//! resolves relations (see [`RelationAccessCompiler`]) and plans caching (see
//! [`LocalCacheOptimizer`]); [`Kernel::run`] executes the body once per element
//! with rayon, then reconciles scratch storage before returning.
//!
//! Addressing inside a body:
//! - fields of the kernel's own instance take a slot ([`Element`], a
//!   neighbour [`Slot`]) or an identity;
//! - fields of another instance and external fields take identities only.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Range;

use rayon::prelude::*;

use crate::algs::patch::PatchIndexer;
use crate::algs::renumber::Permutation;
use crate::config::MeshConfig;
use crate::data::external::ExternalField;
use crate::data::field::Field;
use crate::data::scalar::{AtomicCell, Scalar};
use crate::data::storage::{ColumnData, Storage, VecStorage};
use crate::kernel::access::{Element, RelationAccessCompiler, RelationHandle};
use crate::kernel::cache::{
    Access, BindingSummary, CacheMode, CachePlan, DeltaMap, LocalCacheOptimizer,
};
use crate::mesh::instance::MeshInstance;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, Slot};
use crate::topology::relation::{Neighbors, RelationTable};

/// Address of a value inside a bound field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum At {
    Slot(Slot),
    Id(ElementId),
}

impl From<Slot> for At {
    fn from(s: Slot) -> Self {
        At::Slot(s)
    }
}

impl From<ElementId> for At {
    fn from(id: ElementId) -> Self {
        At::Id(id)
    }
}

impl From<Element<'_>> for At {
    fn from(e: Element<'_>) -> Self {
        At::Slot(e.slot())
    }
}

/// Typed handle to a field bound into a kernel.
#[derive(Debug)]
pub struct FieldHandle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for FieldHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldHandle<T> {}

#[derive(Copy, Clone, Debug)]
enum Addressing<'m> {
    /// Own instance: slots directly, identities through the permutation.
    Own(&'m Permutation),
    /// Another instance: identities through that instance's permutation.
    Foreign(&'m Permutation),
    /// Standalone field: identity is the index.
    External,
}

#[derive(Copy, Clone, Debug)]
struct Binding<'m> {
    field: &'m Field,
    access: Access,
    addressing: Addressing<'m>,
}

impl Binding<'_> {
    #[inline]
    fn cell_index(&self, at: At, comp: usize) -> usize {
        let c = self.field.components();
        assert!(
            comp < c,
            "component {comp} out of range for `{}`",
            self.field.name()
        );
        let element = match (self.addressing, at) {
            (Addressing::Own(_), At::Slot(s)) => s.index(),
            (Addressing::Own(perm), At::Id(id)) | (Addressing::Foreign(perm), At::Id(id)) => {
                perm.slot_of(id).index()
            }
            (Addressing::External, At::Id(id)) => id.index(),
            (_, At::Slot(_)) => panic!(
                "`{}` does not belong to this instance and is addressed by identity only",
                self.field.name()
            ),
        };
        element * c + comp
    }
}

#[inline]
fn typed<T: Scalar>(data: &ColumnData) -> &VecStorage<T::Cell> {
    match T::column(data) {
        Some(cells) => cells,
        None => unreachable!("field handles are type-checked when bound"),
    }
}

/// Declares the dataflow of one parallel region.
pub struct KernelBuilder<'m> {
    name: String,
    instance: &'m MeshInstance,
    over: ElementKind,
    relations: Vec<&'m RelationTable>,
    bindings: Vec<Binding<'m>>,
    cached: Vec<usize>,
}

impl<'m> KernelBuilder<'m> {
    /// Region iterating every element of `over` in `instance`.
    pub fn new(
        name: impl Into<String>,
        instance: &'m MeshInstance,
        over: ElementKind,
    ) -> Result<Self, MeshError> {
        instance.elements(over)?;
        Ok(Self {
            name: name.into(),
            instance,
            over,
            relations: Vec::new(),
            bindings: Vec::new(),
            cached: Vec::new(),
        })
    }

    /// Compile the hop `from -> to`.
    pub fn relation(
        &mut self,
        from: ElementKind,
        to: ElementKind,
    ) -> Result<RelationHandle, MeshError> {
        let table = RelationAccessCompiler::new(self.instance).hop(from, to)?;
        self.relations.push(table);
        Ok(RelationHandle {
            index: self.relations.len() - 1,
            key: table.key(),
        })
    }

    fn push<T: Scalar>(
        &mut self,
        kind: ElementKind,
        binding: Binding<'m>,
    ) -> Result<FieldHandle<T>, MeshError> {
        binding.field.typed::<T>()?;
        // plain stores are only race-free on the element bound to an iteration
        if binding.access == Access::Write && kind != self.over {
            return Err(MeshError::Config(format!(
                "{}: `{}` on {kind} cannot be overwritten from a loop over {}; accumulate instead",
                self.name,
                binding.field.name(),
                self.over
            )));
        }
        self.bindings.push(binding);
        Ok(FieldHandle {
            index: self.bindings.len() - 1,
            _marker: PhantomData,
        })
    }

    /// Bind a field of the kernel's own instance.
    pub fn field<T: Scalar>(
        &mut self,
        kind: ElementKind,
        name: &str,
        access: Access,
    ) -> Result<FieldHandle<T>, MeshError> {
        let set = self.instance.elements(kind)?;
        let binding = Binding {
            field: set.field(name)?,
            access,
            addressing: Addressing::Own(set.permutation().as_ref()),
        };
        self.push(kind, binding)
    }

    /// Bind a field of another instance, addressed by identity.
    pub fn foreign<T: Scalar>(
        &mut self,
        other: &'m MeshInstance,
        kind: ElementKind,
        name: &str,
        access: Access,
    ) -> Result<FieldHandle<T>, MeshError> {
        let set = other.elements(kind)?;
        let binding = Binding {
            field: set.field(name)?,
            access,
            addressing: Addressing::Foreign(set.permutation().as_ref()),
        };
        self.push(kind, binding)
    }

    /// Bind a standalone field, addressed by identity.
    pub fn external<T: Scalar>(
        &mut self,
        field: &'m ExternalField,
        access: Access,
    ) -> Result<FieldHandle<T>, MeshError> {
        let binding = Binding {
            field: field.field(),
            access,
            addressing: Addressing::External,
        };
        self.push(field.kind(), binding)
    }

    /// Stage `handle` through the local cache for this region.
    pub fn local_cache<T>(&mut self, handle: FieldHandle<T>) -> &mut Self {
        self.cached.push(handle.index);
        self
    }

    /// Resolve the region against `config`.
    pub fn compile(self, config: &MeshConfig) -> Result<Kernel<'m>, MeshError> {
        let patches = self.instance.patch_indexer();
        let over_info = patches.info(self.over)?;
        let optimizer =
            LocalCacheOptimizer::new(config.local_cache, config.patch_contiguous && over_info.is_contiguous());
        let summaries: Vec<BindingSummary<'m>> = self
            .bindings
            .iter()
            .map(|b| BindingSummary {
                field: b.field,
                access: b.access,
            })
            .collect();
        let plan = optimizer.plan(&self.name, &summaries, &self.cached)?;
        let patch_ranges = match plan.mode {
            CacheMode::PerPatch if !plan.is_empty() => over_info
                .ranges()
                .map(|ranges| ranges.map(|(_, r)| r).collect::<Vec<_>>()),
            _ => None,
        };
        log::debug!(
            "compiled kernel `{}` over {}: {} relations, {} bindings, {} cached",
            self.name,
            self.over,
            self.relations.len(),
            self.bindings.len(),
            plan.entries.len()
        );
        let perm = self.instance.permutation(self.over)?.as_ref();
        Ok(Kernel {
            name: self.name,
            over: self.over,
            perm,
            patches,
            relations: self.relations,
            bindings: self.bindings,
            plan,
            patch_ranges,
        })
    }
}

/// A compiled parallel region.
#[derive(Debug)]
pub struct Kernel<'m> {
    name: String,
    over: ElementKind,
    perm: &'m Permutation,
    patches: &'m PatchIndexer,
    relations: Vec<&'m RelationTable>,
    bindings: Vec<Binding<'m>>,
    plan: CachePlan,
    patch_ranges: Option<Vec<Range<usize>>>,
}

impl<'m> Kernel<'m> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn over(&self) -> ElementKind {
        self.over
    }

    pub fn cache_plan(&self) -> &CachePlan {
        &self.plan
    }

    /// Whether the region runs patch by patch.
    pub fn runs_per_patch(&self) -> bool {
        self.patch_ranges.is_some()
    }

    /// Run `body` once for every element of the iterated kind. Returns after
    /// every unit of work has finished and scratch storage is reconciled.
    pub fn run<F>(&self, body: F) -> Result<(), MeshError>
    where
        F: Fn(&KernelCtx<'_, 'm>, Element<'m>) + Sync,
    {
        let scratch: Vec<Option<ColumnData>> = (0..self.bindings.len())
            .map(|i| {
                self.plan
                    .entry_for(i)
                    .map(|_| self.bindings[i].field.data().clone())
            })
            .collect();
        log::trace!(
            "running `{}` over {} {}",
            self.name,
            self.perm.len(),
            self.over
        );

        if let Some(ranges) = &self.patch_ranges {
            ranges.par_iter().try_for_each(|range| {
                let ctx = KernelCtx::new(self, &scratch, Some(self.patch_deltas()));
                for s in range.clone() {
                    body(&ctx, Element::new(self.over, Slot(s as u32), self.perm));
                }
                ctx.merge_deltas()
            })?;
            log::trace!("`{}`: merged {} patches", self.name, ranges.len());
            return Ok(());
        }

        (0..self.perm.len() as u32).into_par_iter().for_each_init(
            || KernelCtx::new(self, &scratch, None),
            |ctx, s| body(ctx, Element::new(self.over, Slot(s), self.perm)),
        );
        for entry in &self.plan.entries {
            if entry.access != Access::Accumulate {
                continue;
            }
            if let Some(staged) = &scratch[entry.binding] {
                self.bindings[entry.binding].field.data().store_from(staged)?;
            }
        }
        Ok(())
    }

    fn patch_deltas(&self) -> Vec<Option<DeltaMap>> {
        (0..self.bindings.len())
            .map(|i| match self.plan.entry_for(i) {
                Some(e) if e.access == Access::Accumulate => {
                    Some(DeltaMap::empty(self.bindings[i].field.ty().scalar))
                }
                _ => None,
            })
            .collect()
    }
}

/// Per-unit-of-work view of a running kernel.
pub struct KernelCtx<'k, 'm> {
    kernel: &'k Kernel<'m>,
    scratch: &'k [Option<ColumnData>],
    deltas: Option<RefCell<Vec<Option<DeltaMap>>>>,
}

impl<'k, 'm> KernelCtx<'k, 'm> {
    fn new(
        kernel: &'k Kernel<'m>,
        scratch: &'k [Option<ColumnData>],
        deltas: Option<Vec<Option<DeltaMap>>>,
    ) -> Self {
        Self {
            kernel,
            scratch,
            deltas: deltas.map(RefCell::new),
        }
    }

    fn merge_deltas(self) -> Result<(), MeshError> {
        let Some(deltas) = self.deltas else {
            return Ok(());
        };
        for (i, delta) in deltas.into_inner().into_iter().enumerate() {
            if let Some(delta) = delta {
                delta.merge_into(self.kernel.bindings[i].field.data())?;
            }
        }
        Ok(())
    }

    /// Stable logical identity of `e`.
    #[inline]
    pub fn identity(&self, e: Element<'_>) -> ElementId {
        e.identity()
    }

    /// Patch of `e`, from the metadata.
    ///
    /// # Panics
    /// Panics if `e` is not an element of the kernel's instance.
    pub fn patch_index(&self, e: Element<'_>) -> u32 {
        match self.kernel.patches.info(e.kind()) {
            Ok(info) => info.patch_of(e.identity()),
            Err(err) => panic!("{err}"),
        }
    }

    /// Neighbours of the bound element `e` through `rel`.
    #[inline]
    pub fn neighbors(&self, rel: RelationHandle, e: Element<'_>) -> Neighbors<'m> {
        debug_assert_eq!(e.kind(), rel.key().from);
        self.neighbors_at(rel, e.slot())
    }

    /// Neighbours of the element in `slot` of `rel`'s source kind.
    #[inline]
    pub fn neighbors_at(&self, rel: RelationHandle, slot: Slot) -> Neighbors<'m> {
        let table: &'m RelationTable = self.kernel.relations[rel.index];
        table.neighbors_of(slot)
    }

    /// Handle for the target-kind element in `slot`, for identity readback.
    pub fn target(&self, rel: RelationHandle, slot: Slot) -> Element<'m> {
        let table: &'m RelationTable = self.kernel.relations[rel.index];
        Element::new(rel.key().to, slot, table.target_permutation().as_ref())
    }

    pub fn read<T: Scalar>(&self, h: FieldHandle<T>, at: impl Into<At>) -> T {
        self.read_at(h, at, 0)
    }

    /// Component `comp` of the value at `at`.
    pub fn read_at<T: Scalar>(&self, h: FieldHandle<T>, at: impl Into<At>, comp: usize) -> T {
        let b = &self.kernel.bindings[h.index];
        let i = b.cell_index(at.into(), comp);
        match &self.scratch[h.index] {
            None => typed::<T>(b.field.data()).cells()[i].load(),
            Some(staged) => {
                let base = typed::<T>(staged).cells()[i].load();
                match &self.deltas {
                    Some(deltas) => match deltas.borrow_mut()[h.index].as_mut() {
                        Some(delta) => base.accumulate(delta.get(i)),
                        None => base,
                    },
                    None => base,
                }
            }
        }
    }

    /// Overwrite the value at `at`.
    pub fn write<T: Scalar>(&self, h: FieldHandle<T>, at: impl Into<At>, value: T) {
        self.write_at(h, at, 0, value)
    }

    /// Overwrite component `comp` of the value at `at`. Write bindings only
    /// exist for the iterated kind, so `at` should be the bound element.
    ///
    /// # Panics
    /// Panics unless the binding was declared with [`Access::Write`].
    pub fn write_at<T: Scalar>(&self, h: FieldHandle<T>, at: impl Into<At>, comp: usize, value: T) {
        let b = &self.kernel.bindings[h.index];
        assert_eq!(
            b.access,
            Access::Write,
            "`{}` is not bound for writing",
            b.field.name()
        );
        let i = b.cell_index(at.into(), comp);
        typed::<T>(b.field.data()).cells()[i].store(value);
    }

    /// Add `value` to the value at `at`.
    pub fn accumulate<T: Scalar>(&self, h: FieldHandle<T>, at: impl Into<At>, value: T) {
        self.accumulate_at(h, at, 0, value)
    }

    /// Add `value` to component `comp` of the value at `at`.
    ///
    /// # Panics
    /// Panics unless the binding was declared with [`Access::Accumulate`].
    pub fn accumulate_at<T: Scalar>(
        &self,
        h: FieldHandle<T>,
        at: impl Into<At>,
        comp: usize,
        value: T,
    ) {
        let b = &self.kernel.bindings[h.index];
        assert_eq!(
            b.access,
            Access::Accumulate,
            "`{}` is not bound for accumulation",
            b.field.name()
        );
        let i = b.cell_index(at.into(), comp);
        match (&self.scratch[h.index], &self.deltas) {
            (None, _) => {
                AtomicCell::fetch_add(&typed::<T>(b.field.data()).cells()[i], value);
            }
            (Some(_), Some(deltas)) => {
                if let Some(delta) = deltas.borrow_mut()[h.index].as_mut() {
                    delta.add(i, value);
                }
            }
            (Some(staged), None) => {
                AtomicCell::fetch_add(&typed::<T>(staged).cells()[i], value);
            }
        }
    }
}
