//! The ATSL type system.
//!
//! Types are value types, compared structurally and never mutated after
//! construction. They live in the module's [`UniqueArena`], so two
//! structurally equal types always share one handle.

use crate::arena::{Handle, UniqueArena};

/// The primitive scalar kinds.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Primitive {
    Bool,
    Int,
    UInt,
    Float,
}

impl Primitive {
    /// Size of the scalar in bytes (all ATSL scalars occupy 4 bytes in
    /// buffer layouts, including `bool`).
    pub fn size(self) -> u32 {
        4
    }
}

/// Number of components in a vector (or rows/columns of a matrix).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VectorSize {
    Bi = 2,
    Tri = 3,
    Quad = 4,
}

impl VectorSize {
    /// Builds a size from a component count of 2, 3 or 4.
    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// The dimensionality of a sampled image.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ImageKind {
    Image1D,
    Image2D,
    Image3D,
    Cubemap,
}

/// How an array's length is determined.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum ArraySize {
    /// Fixed length known at parse time.
    Constant(u32),
    /// Length inferred from an initializer.
    Implicit,
    /// Length given by a specialization option, resolved by the
    /// preprocessor.
    Option(String),
}

/// A member of a struct type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub ty: Handle<Type>,
}

/// A named type.
///
/// `name` is `Some` for struct types and `None` for everything else.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

/// The concrete shape of a type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum TypeInner {
    /// The absence of a value; only valid as a function return type.
    Void,
    /// A single scalar.
    Scalar(Primitive),
    /// A vector of 2, 3 or 4 scalars.
    Vector {
        size: VectorSize,
        scalar: Primitive,
    },
    /// A column-major matrix of `columns` column vectors of `rows`
    /// scalars each.
    Matrix {
        columns: VectorSize,
        rows: VectorSize,
        scalar: Primitive,
    },
    /// A combined image/sampler.
    Sampler {
        image: ImageKind,
        scalar: Primitive,
    },
    /// A composite struct type.
    Struct { members: Vec<StructMember> },
    /// An array of `base` elements.
    Array {
        base: Handle<Type>,
        size: ArraySize,
    },
}

impl TypeInner {
    /// Returns `true` for scalar bool, vectors of bool are not conditions.
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Scalar(Primitive::Bool))
    }

    /// The scalar kind of a scalar or vector type.
    pub fn scalar(&self) -> Option<Primitive> {
        match *self {
            Self::Scalar(s) | Self::Vector { scalar: s, .. } | Self::Matrix { scalar: s, .. } => {
                Some(s)
            }
            _ => None,
        }
    }
}

/// Interns the common case of a scalar type.
pub fn scalar_type(types: &mut UniqueArena<Type>, scalar: Primitive) -> Handle<Type> {
    types.insert(Type {
        name: None,
        inner: TypeInner::Scalar(scalar),
    })
}

/// Interns a vector type.
pub fn vector_type(
    types: &mut UniqueArena<Type>,
    size: VectorSize,
    scalar: Primitive,
) -> Handle<Type> {
    types.insert(Type {
        name: None,
        inner: TypeInner::Vector { size, scalar },
    })
}
