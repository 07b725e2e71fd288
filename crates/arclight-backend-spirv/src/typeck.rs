//! Expression type resolution.
//!
//! SPIR-V instructions are selected by operand type, so the writer
//! re-derives the type of every expression from declared types and the
//! usual promotion rules. Resolution is local and synchronous — a
//! mismatch becomes an `Unsupported` error naming the construct rather
//! than a guess.

use std::collections::HashMap;

use arclight_ast::{
    BuiltInFunction, ConstantValue, Expression, Handle, ImageKind, Module, Primitive, Type,
    TypeInner, VectorSize,
};
use arclight_backend_core::BackendError;

use crate::unsupported;

/// The resolved type of an expression value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueType {
    Void,
    Scalar(Primitive),
    Vector(VectorSize, Primitive),
    /// Square float matrix.
    Matrix(VectorSize),
    Sampler(ImageKind, Primitive),
    /// A struct or array value; the handle preserves full type
    /// identity for member/element resolution.
    Composite(Handle<Type>),
}

impl ValueType {
    /// Maps a declared type to a value type.
    pub fn of(module: &Module, handle: Handle<Type>) -> ValueType {
        match &module.types[handle].inner {
            TypeInner::Void => ValueType::Void,
            TypeInner::Scalar(p) => ValueType::Scalar(*p),
            TypeInner::Vector { size, scalar } => ValueType::Vector(*size, *scalar),
            TypeInner::Matrix { columns, .. } => ValueType::Matrix(*columns),
            TypeInner::Sampler { image, scalar } => ValueType::Sampler(*image, *scalar),
            TypeInner::Struct { .. } | TypeInner::Array { .. } => ValueType::Composite(handle),
        }
    }

    /// The scalar kind of a scalar or vector value.
    pub fn scalar(self) -> Option<Primitive> {
        match self {
            Self::Scalar(p) | Self::Vector(_, p) => Some(p),
            Self::Matrix(_) => Some(Primitive::Float),
            _ => None,
        }
    }
}

/// Name-to-type environment: module declarations plus function locals.
#[derive(Clone, Default)]
pub struct Environment {
    names: HashMap<String, Handle<Type>>,
    functions: HashMap<String, Option<Handle<Type>>>,
}

impl Environment {
    /// Collects module-scope declarations and function signatures.
    pub fn from_module(module: &Module) -> Self {
        use arclight_ast::Statement;
        let mut env = Self::default();
        for stmt in &module.root {
            match stmt {
                Statement::ConstDeclaration { name, ty, .. }
                | Statement::InputDeclaration { name, ty, .. }
                | Statement::OutputDeclaration { name, ty, .. }
                | Statement::ExternalDeclaration { name, ty, .. }
                | Statement::OptionDeclaration { name, ty, .. } => {
                    env.names.insert(name.clone(), *ty);
                }
                Statement::FunctionDeclaration(f) => {
                    env.functions.insert(f.name.clone(), f.result);
                }
                _ => {}
            }
        }
        env
    }

    /// Adds a function-local binding (parameter or variable).
    pub fn bind(&mut self, name: impl Into<String>, ty: Handle<Type>) {
        self.names.insert(name.into(), ty);
    }

    /// Looks up a name's declared type.
    pub fn get(&self, name: &str) -> Option<Handle<Type>> {
        self.names.get(name).copied()
    }

    /// Looks up a user function's result type.
    pub fn function_result(&self, name: &str) -> Option<Option<Handle<Type>>> {
        self.functions.get(name).copied()
    }
}

/// Resolves the type of `expr` under `env`.
pub fn infer(
    module: &Module,
    env: &Environment,
    expr: Handle<Expression>,
) -> Result<ValueType, BackendError> {
    match &module.expressions[expr] {
        Expression::Constant(value) => constant_type(value),
        Expression::Variable(name) => {
            let ty = env
                .get(name)
                .ok_or_else(|| unsupported(format!("reference to undeclared name `{name}`")))?;
            Ok(ValueType::of(module, ty))
        }
        Expression::AccessIndex { base, .. } => {
            match infer(module, env, *base)? {
                ValueType::Vector(_, scalar) => Ok(ValueType::Scalar(scalar)),
                ValueType::Matrix(cols) => Ok(ValueType::Vector(cols, Primitive::Float)),
                ValueType::Composite(handle) => match &module.types[handle].inner {
                    TypeInner::Array { base, .. } => Ok(ValueType::of(module, *base)),
                    _ => Err(unsupported("indexing a non-indexable value".into())),
                },
                other => Err(unsupported(format!("indexing into {other:?}"))),
            }
        }
        Expression::AccessMember { base, member } => {
            match infer(module, env, *base)? {
                ValueType::Composite(handle) => {
                    member_type(module, handle, member).map(|(_, ty)| ValueType::of(module, ty))
                }
                other => Err(unsupported(format!(
                    "member access `.{member}` on {other:?}"
                ))),
            }
        }
        Expression::Swizzle { base, pattern } => {
            let scalar = match infer(module, env, *base)? {
                ValueType::Vector(_, scalar) => scalar,
                other => return Err(unsupported(format!("swizzle on {other:?}"))),
            };
            match pattern.len() {
                1 => Ok(ValueType::Scalar(scalar)),
                n => Ok(ValueType::Vector(
                    VectorSize::from_count(n as u32)
                        .ok_or_else(|| unsupported("swizzle pattern too long".into()))?,
                    scalar,
                )),
            }
        }
        Expression::Assignment { target, .. } => infer(module, env, *target),
        Expression::Unary { operand, .. } => infer(module, env, *operand),
        Expression::Binary { op, left, right } => {
            use arclight_ast::BinaryOp::*;
            let lt = infer(module, env, *left)?;
            let rt = infer(module, env, *right)?;
            match op {
                Less | Greater | LessEqual | GreaterEqual | Equal | NotEqual | LogicalAnd
                | LogicalOr => Ok(ValueType::Scalar(Primitive::Bool)),
                Multiply => Ok(multiply_type(lt, rt)?),
                _ => arithmetic_type(lt, rt),
            }
        }
        Expression::Call { function, .. } => {
            match env.function_result(function) {
                Some(Some(ty)) => Ok(ValueType::of(module, ty)),
                Some(None) => Ok(ValueType::Void),
                None => Err(unsupported(format!("call to undeclared function `{function}`"))),
            }
        }
        Expression::BuiltInCall {
            function,
            arguments,
        } => builtin_type(module, env, *function, arguments),
        Expression::Cast { ty, .. } => Ok(ValueType::of(module, *ty)),
        Expression::Ternary { accept, .. } => infer(module, env, *accept),
    }
}

fn constant_type(value: &ConstantValue) -> Result<ValueType, BackendError> {
    match value {
        ConstantValue::Bool(_) => Ok(ValueType::Scalar(Primitive::Bool)),
        ConstantValue::Int(_) => Ok(ValueType::Scalar(Primitive::Int)),
        ConstantValue::UInt(_) => Ok(ValueType::Scalar(Primitive::UInt)),
        ConstantValue::Float(_) => Ok(ValueType::Scalar(Primitive::Float)),
        ConstantValue::Vector(components) => {
            let scalar = components
                .first()
                .and_then(|c| c.primitive())
                .ok_or_else(|| unsupported("empty composite constant".into()))?;
            let size = VectorSize::from_count(components.len() as u32)
                .ok_or_else(|| unsupported("composite constant of unsupported width".into()))?;
            Ok(ValueType::Vector(size, scalar))
        }
    }
}

/// Finds a struct member's index and type.
pub fn member_type(
    module: &Module,
    handle: Handle<Type>,
    member: &str,
) -> Result<(u32, Handle<Type>), BackendError> {
    match &module.types[handle].inner {
        TypeInner::Struct { members } => members
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == member)
            .map(|(i, m)| (i as u32, m.ty))
            .ok_or_else(|| {
                let name = module.types[handle].name.as_deref().unwrap_or("struct");
                unsupported(format!("`{name}` has no member `{member}`"))
            }),
        _ => Err(unsupported(format!("member access `.{member}` on non-struct"))),
    }
}

fn multiply_type(lt: ValueType, rt: ValueType) -> Result<ValueType, BackendError> {
    Ok(match (lt, rt) {
        (ValueType::Matrix(n), ValueType::Vector(..)) => ValueType::Vector(n, Primitive::Float),
        (ValueType::Vector(n, _), ValueType::Matrix(_)) => ValueType::Vector(n, Primitive::Float),
        (ValueType::Matrix(n), ValueType::Matrix(_)) => ValueType::Matrix(n),
        (ValueType::Matrix(n), ValueType::Scalar(Primitive::Float))
        | (ValueType::Scalar(Primitive::Float), ValueType::Matrix(n)) => ValueType::Matrix(n),
        _ => return arithmetic_type(lt, rt),
    })
}

fn arithmetic_type(lt: ValueType, rt: ValueType) -> Result<ValueType, BackendError> {
    match (lt, rt) {
        (ValueType::Scalar(a), ValueType::Scalar(b)) if a == b => Ok(lt),
        (ValueType::Vector(n, a), ValueType::Vector(m, b)) if n == m && a == b => Ok(lt),
        (ValueType::Vector(_, a), ValueType::Scalar(b)) if a == b => Ok(lt),
        (ValueType::Scalar(a), ValueType::Vector(_, b)) if a == b => Ok(rt),
        _ => Err(unsupported(format!(
            "operands {lt:?} and {rt:?} do not combine arithmetically"
        ))),
    }
}

fn builtin_type(
    module: &Module,
    env: &Environment,
    function: BuiltInFunction,
    arguments: &[Handle<Expression>],
) -> Result<ValueType, BackendError> {
    use BuiltInFunction::*;
    match function {
        SetVertexPosition => Ok(ValueType::Void),
        Dot | Length | Distance => Ok(ValueType::Scalar(Primitive::Float)),
        Cross => Ok(ValueType::Vector(VectorSize::Tri, Primitive::Float)),
        Sample => {
            let scalar = match infer(module, env, arguments[0])? {
                ValueType::Sampler(_, scalar) => scalar,
                other => {
                    return Err(unsupported(format!(
                        "sample() expects a sampler, found {other:?}"
                    )))
                }
            };
            Ok(ValueType::Vector(VectorSize::Quad, scalar))
        }
        // Component-wise functions keep their first argument's shape.
        Min | Max | Norm | Abs | Floor | Ceil | Fract | Clamp | Mix | Step | SmoothStep | Pow
        | Sqrt | Sin | Cos | Tan | Reflect => infer(module, env, arguments[0]),
    }
}
