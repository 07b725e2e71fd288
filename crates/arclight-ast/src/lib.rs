//! AST model for the Arclight shading language (ATSL).
//!
//! An arena-based tree: a [`Module`] owns a deduplicated type arena, an
//! expression arena, and the root statement block. Nodes reference each
//! other through typed [`Handle`]s, so the tree carries no reference
//! counting and cannot form cycles.

pub mod arena;
mod constant;
pub mod display;
mod equiv;
mod expr;
pub mod rewrite;
mod stmt;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use constant::ConstantValue;
pub use display::write_module;
pub use equiv::{expression_eq, module_eq, statement_eq};
pub use expr::{
    AssignOp, BinaryOp, BuiltInFunction, Expression, SwizzleComponent, UnaryOp,
};
pub use stmt::{Block, Function, FunctionParameter, Stage, Statement};
pub use types::{
    scalar_type, vector_type, ArraySize, ImageKind, Primitive, StructMember, Type, TypeInner,
    VectorSize,
};

/// A parsed ATSL translation unit.
///
/// Conceptually immutable once handed to preprocessing: every transform
/// builds a new module rather than mutating a shared one, so multiple
/// specializations of one base module can be derived concurrently.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// Expression arena; statements reference expressions by handle.
    pub expressions: Arena<Expression>,
    /// The root sequence statement.
    pub root: Block,
}

impl Module {
    /// Creates an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates the entry functions declared at the root, with their
    /// stages.
    pub fn entry_functions(&self) -> impl Iterator<Item = (Stage, &Function)> {
        self.root.iter().filter_map(|stmt| match stmt {
            Statement::EntryFunctionDeclaration { stage, function } => Some((*stage, function)),
            _ => None,
        })
    }

    /// Finds a helper function declared at the root by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.root.iter().find_map(|stmt| match stmt {
            Statement::FunctionDeclaration(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    /// Finds a root declaration by name (any declaration kind).
    pub fn declaration(&self, name: &str) -> Option<&Statement> {
        self.root
            .iter()
            .find(|stmt| stmt.declared_name() == Some(name))
    }
}
