//! Field storage for one element kind of one mesh instance.
//!
//! Storage is addressed by physical [`Slot`]. Identity-addressed access and
//! the bulk `import`/`export` transfers go through the kind's permutation, so
//! position `i` of an external buffer always denotes logical identity `i`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::algs::renumber::Permutation;
use crate::data::field::{Field, FieldDecl};
use crate::data::scalar::Scalar;
use crate::data::storage::Storage;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind, Slot};

/// Typed, slot-addressed fields of one element kind.
#[derive(Clone, Debug)]
pub struct ElementSet {
    kind: ElementKind,
    perm: Arc<Permutation>,
    fields: BTreeMap<String, Field>,
}

impl ElementSet {
    /// Allocate zeroed storage for `decls` under the installed permutation.
    pub fn new(
        kind: ElementKind,
        perm: Arc<Permutation>,
        decls: &[FieldDecl],
    ) -> Result<Self, MeshError> {
        let mut fields = BTreeMap::new();
        for decl in decls {
            if decl.ty.components == 0 {
                return Err(MeshError::Config(format!(
                    "{kind}: field `{}` has zero components",
                    decl.name
                )));
            }
            let field = Field::zeroed(decl, perm.len());
            if fields.insert(decl.name.clone(), field).is_some() {
                return Err(MeshError::Config(format!(
                    "{kind}: field `{}` declared twice",
                    decl.name
                )));
            }
        }
        Ok(Self { kind, perm, fields })
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn permutation(&self) -> &Arc<Permutation> {
        &self.perm
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared field, or [`MeshError::UnknownField`].
    pub fn field(&self, name: &str) -> Result<&Field, MeshError> {
        self.fields.get(name).ok_or_else(|| MeshError::UnknownField {
            owner: self.kind.collection_name().to_string(),
            field: name.to_string(),
        })
    }

    fn slot_for(&self, id: ElementId) -> Result<Slot, MeshError> {
        self.perm.try_slot_of(id)
    }

    /// All components stored at `slot`.
    pub fn read<T: Scalar>(&self, name: &str, slot: Slot) -> Result<Vec<T>, MeshError> {
        self.field(name)?.values(slot.index())
    }

    /// First component stored at `slot`.
    pub fn read_scalar<T: Scalar>(&self, name: &str, slot: Slot) -> Result<T, MeshError> {
        self.field(name)?.get(slot.index(), 0)
    }

    /// Overwrite the value stored at `slot`.
    pub fn write<T: Scalar>(&self, name: &str, slot: Slot, value: &[T]) -> Result<(), MeshError> {
        self.field(name)?.set(slot.index(), value)
    }

    /// All components of the element with identity `id`.
    pub fn get<T: Scalar>(&self, name: &str, id: ElementId) -> Result<Vec<T>, MeshError> {
        let field = self.field(name)?;
        field.values(self.slot_for(id)?.index())
    }

    /// First component of the element with identity `id`.
    pub fn get_scalar<T: Scalar>(&self, name: &str, id: ElementId) -> Result<T, MeshError> {
        let field = self.field(name)?;
        field.get(self.slot_for(id)?.index(), 0)
    }

    /// Overwrite the value of the element with identity `id`.
    pub fn set<T: Scalar>(&self, name: &str, id: ElementId, value: &[T]) -> Result<(), MeshError> {
        let field = self.field(name)?;
        field.set(self.slot_for(id)?.index(), value)
    }

    /// Load an identity-ordered buffer (`len * components` values).
    pub fn import<T: Scalar>(&self, name: &str, buf: &[T]) -> Result<(), MeshError> {
        let field = self.field(name)?;
        if self.perm.is_identity() {
            return field.load(buf);
        }
        let c = field.components();
        if buf.len() != self.len() * c {
            return Err(MeshError::BufferLength {
                field: name.to_string(),
                expected: self.len() * c,
                found: buf.len(),
            });
        }
        let cells = field.typed::<T>()?;
        for (id, chunk) in buf.chunks_exact(c).enumerate() {
            let slot = self.perm.slot_of(ElementId(id as u32));
            cells.write_at(slot.index() * c, chunk)?;
        }
        log::trace!("{}: imported `{name}` ({} values)", self.kind, buf.len());
        Ok(())
    }

    /// Identity-ordered copy of the whole field.
    pub fn export<T: Scalar>(&self, name: &str) -> Result<Vec<T>, MeshError> {
        let field = self.field(name)?;
        let by_slot = field.snapshot::<T>()?;
        if self.perm.is_identity() {
            return Ok(by_slot);
        }
        let c = field.components();
        let mut out = Vec::with_capacity(by_slot.len());
        for &slot in self.perm.slot_table() {
            let start = slot as usize * c;
            out.extend_from_slice(&by_slot[start..start + c]);
        }
        Ok(out)
    }

    /// Set every component of every element.
    pub fn fill<T: Scalar>(&self, name: &str, value: T) -> Result<(), MeshError> {
        self.field(name)?.fill(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::FieldType;

    fn set(perm: Permutation) -> ElementSet {
        ElementSet::new(
            ElementKind::Vertex,
            Arc::new(perm),
            &[
                FieldDecl::new("a", FieldType::of::<i32>()),
                FieldDecl::new("x", FieldType::vector_of::<f64>(2)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn import_export_is_identity_ordered() {
        let s = set(Permutation::from_identity_order(vec![2, 0, 1]).unwrap());
        s.import("a", &[10, 11, 12]).unwrap();
        assert_eq!(s.export::<i32>("a").unwrap(), vec![10, 11, 12]);
        // identity 2 lives in slot 0
        assert_eq!(s.read_scalar::<i32>("a", Slot(0)).unwrap(), 12);
        assert_eq!(s.get_scalar::<i32>("a", ElementId(1)).unwrap(), 11);

        let xs = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        s.import("x", &xs).unwrap();
        assert_eq!(s.export::<f64>("x").unwrap(), xs.to_vec());
        assert_eq!(s.read::<f64>("x", Slot(0)).unwrap(), vec![2.0, 2.5]);
    }

    #[test]
    fn identity_and_slot_writes_agree() {
        let s = set(Permutation::from_identity_order(vec![1, 2, 0]).unwrap());
        s.set("a", ElementId(0), &[7]).unwrap();
        let slot = s.permutation().slot_of(ElementId(0));
        assert_eq!(slot, Slot(2));
        assert_eq!(s.read_scalar::<i32>("a", slot).unwrap(), 7);
        s.write("a", Slot(0), &[3]).unwrap();
        assert_eq!(s.get::<i32>("a", ElementId(1)).unwrap(), vec![3]);
    }

    #[test]
    fn errors() {
        let s = set(Permutation::identity(3));
        assert!(s.has_field("x") && !s.has_field("missing"));
        assert!(matches!(
            s.read_scalar::<i32>("missing", Slot(0)),
            Err(MeshError::UnknownField { .. })
        ));
        assert!(matches!(
            s.import("a", &[1, 2]),
            Err(MeshError::BufferLength { .. })
        ));
        assert!(matches!(
            s.get_scalar::<i32>("a", ElementId(3)),
            Err(MeshError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            s.fill("a", 1.0f32),
            Err(MeshError::FieldTypeMismatch { .. })
        ));
        let dup = ElementSet::new(
            ElementKind::Cell,
            Arc::new(Permutation::identity(1)),
            &[
                FieldDecl::new("a", FieldType::of::<i32>()),
                FieldDecl::new("a", FieldType::of::<i64>()),
            ],
        );
        assert!(matches!(dup, Err(MeshError::Config(_))));
    }

    #[test]
    fn fill_sets_every_slot() {
        let s = set(Permutation::from_identity_order(vec![2, 0, 1]).unwrap());
        s.fill("x", 4.0).unwrap();
        assert_eq!(s.export::<f64>("x").unwrap(), vec![4.0; 6]);
        let names: Vec<_> = s.field_names().collect();
        assert_eq!(names, vec!["a", "x"]);
    }
}
