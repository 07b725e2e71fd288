//! Statements and declarations — the closed control-flow node set.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::types::Type;

/// A shader stage.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    /// The source-level spelling (`vertex` / `fragment`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A formal parameter of a function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: Handle<Type>,
}

/// A function body with its signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<FunctionParameter>,
    /// `None` for `void` functions.
    pub result: Option<Handle<Type>>,
    pub body: Block,
}

/// A sequence of statements.
pub type Block = Vec<Statement>;

/// A statement node.
///
/// Declarations are statements: a whole translation unit is the root
/// [`Block`], and function bodies reuse the same statement set.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `if (condition) { accept } else { reject }`.
    Conditional {
        condition: Handle<Expression>,
        accept: Block,
        reject: Block,
    },
    /// `for (init; condition; step) body`.
    For {
        init: Option<Box<Statement>>,
        condition: Option<Handle<Expression>>,
        step: Option<Handle<Expression>>,
        body: Block,
    },
    /// `while (condition) body`.
    While {
        condition: Handle<Expression>,
        body: Block,
    },
    /// `do body while (condition);`.
    DoWhile {
        body: Block,
        condition: Handle<Expression>,
    },
    /// A local variable declaration.
    VariableDeclaration {
        name: String,
        ty: Handle<Type>,
        init: Option<Handle<Expression>>,
    },
    /// A module-scope constant.
    ConstDeclaration {
        name: String,
        ty: Handle<Type>,
        init: Handle<Expression>,
    },
    /// A struct type declaration; `ty` is the interned struct type.
    StructDeclaration {
        name: String,
        ty: Handle<Type>,
    },
    /// A per-stage shader input.
    InputDeclaration {
        stage: Stage,
        name: String,
        ty: Handle<Type>,
        location: Option<u32>,
    },
    /// A per-stage shader output.
    OutputDeclaration {
        stage: Stage,
        name: String,
        ty: Handle<Type>,
        location: Option<u32>,
    },
    /// A descriptor-bound external resource (uniform data or sampler).
    ExternalDeclaration {
        name: String,
        ty: Handle<Type>,
        set: Option<u32>,
        binding: Option<u32>,
    },
    /// A specialization option with an optional default.
    OptionDeclaration {
        name: String,
        ty: Handle<Type>,
        default: Option<Handle<Expression>>,
    },
    /// A helper function.
    FunctionDeclaration(Function),
    /// A stage entry function (`[vertex] fn …` / `[fragment] fn …`).
    EntryFunctionDeclaration {
        stage: Stage,
        function: Function,
    },
    /// A shader library reference, resolved against the registry.
    Include { library: String },
    /// An expression evaluated for its side effects.
    Expression(Handle<Expression>),
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `return;` or `return value;`
    Return { value: Option<Handle<Expression>> },
    /// A braced scope.
    Sequence(Block),
}

impl Statement {
    /// The declared name, for declaration statements.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Self::VariableDeclaration { name, .. }
            | Self::ConstDeclaration { name, .. }
            | Self::StructDeclaration { name, .. }
            | Self::InputDeclaration { name, .. }
            | Self::OutputDeclaration { name, .. }
            | Self::ExternalDeclaration { name, .. }
            | Self::OptionDeclaration { name, .. } => Some(name),
            Self::FunctionDeclaration(f) | Self::EntryFunctionDeclaration { function: f, .. } => {
                Some(&f.name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::constant::ConstantValue;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Vertex.name(), "vertex");
        assert_eq!(Stage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn conditional_shape() {
        let mut exprs = Arena::new();
        let cond = exprs.append(Expression::Constant(ConstantValue::Bool(true)));
        let stmt = Statement::Conditional {
            condition: cond,
            accept: vec![Statement::Break],
            reject: vec![],
        };
        match stmt {
            Statement::Conditional { accept, reject, .. } => {
                assert_eq!(accept.len(), 1);
                assert!(reject.is_empty());
            }
            other => panic!("expected Conditional, got {other:?}"),
        }
    }

    #[test]
    fn declared_names() {
        let mut exprs = Arena::new();
        let init = exprs.append(Expression::Constant(ConstantValue::Float(1.0)));
        let mut types = crate::arena::UniqueArena::new();
        let float = crate::types::scalar_type(&mut types, crate::types::Primitive::Float);

        let var = Statement::VariableDeclaration {
            name: "speed".into(),
            ty: float,
            init: Some(init),
        };
        assert_eq!(var.declared_name(), Some("speed"));
        assert_eq!(Statement::Break.declared_name(), None);

        let f = Statement::FunctionDeclaration(Function {
            name: "shade".into(),
            parameters: vec![],
            result: None,
            body: vec![],
        });
        assert_eq!(f.declared_name(), Some("shade"));
    }
}
