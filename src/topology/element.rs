//! Element kinds and the two index spaces every element lives in.
//!
//! Each mesh element has an immutable *logical identity* ([`ElementId`]),
//! stable across instances and used for anything observed from outside, and a
//! *physical slot* ([`Slot`]) indexing field storage. The two are related by a
//! per-instance [`Permutation`](crate::algs::renumber::Permutation).
//!
//! Both are `repr(transparent)` over `u32` so CSR neighbour arrays can store
//! either without conversion cost.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A category of mesh entity.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Vertex,
    Edge,
    Face,
    Cell,
}

impl ElementKind {
    /// All kinds in increasing topological dimension.
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Vertex,
        ElementKind::Edge,
        ElementKind::Face,
        ElementKind::Cell,
    ];

    /// Topological dimension (vertex = 0).
    pub fn dimension(self) -> usize {
        match self {
            ElementKind::Vertex => 0,
            ElementKind::Edge => 1,
            ElementKind::Face => 2,
            ElementKind::Cell => 3,
        }
    }

    /// Plural collection name used in diagnostics (`verts`, `edges`, ...).
    pub fn collection_name(self) -> &'static str {
        match self {
            ElementKind::Vertex => "verts",
            ElementKind::Edge => "edges",
            ElementKind::Face => "faces",
            ElementKind::Cell => "cells",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Shape of mesh a builder describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshTopology {
    /// Surface mesh: vertices, edges and triangular faces.
    Tri,
    /// Volume mesh: vertices, edges, faces and tetrahedral cells.
    Tet,
}

impl MeshTopology {
    /// Element kinds this topology carries.
    pub fn kinds(self) -> &'static [ElementKind] {
        match self {
            MeshTopology::Tri => &ElementKind::ALL[..3],
            MeshTopology::Tet => &ElementKind::ALL,
        }
    }

    /// Whether `kind` belongs to this topology.
    pub fn has(self, kind: ElementKind) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Directed relation between two element kinds (possibly the same kind).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    pub from: ElementKind,
    pub to: ElementKind,
}

impl RelationKey {
    pub const fn new(from: ElementKind, to: ElementKind) -> Self {
        Self { from, to }
    }

    /// The same relation walked the other way.
    pub const fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    /// `true` for a type linked to itself (cell-cell, vertex-vertex).
    pub fn is_self_relation(self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Logical identity of an element within its kind: `0..count`, stable.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct ElementId(pub u32);

/// Physical storage slot of an element within its kind: `0..count`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Slot(pub u32);

macro_rules! index_newtype {
    ($name:ident, $short:expr) => {
        impl $name {
            /// Raw index.
            #[inline]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Raw index widened for slice indexing.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $short, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_newtype!(ElementId, "#");
index_newtype!(Slot, "@");
