//! Deep-copy of subtrees between modules.
//!
//! The copier rebuilds statements and expressions from a source module
//! into a destination module, remapping every handle into the
//! destination's arenas. The source is never mutated; the result is an
//! independently owned, structurally identical subtree. Transform passes
//! (preprocessing, stage extraction) use this to produce new modules
//! while leaving their input intact.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::stmt::{Function, FunctionParameter, Statement};
use crate::types::{Type, TypeInner};
use crate::Module;

/// Copies a type (and its transitive component types) into `dst`,
/// returning the destination handle. Deduplication in the destination
/// arena makes repeated copies cheap.
pub fn copy_type(src: &Module, dst: &mut Module, handle: Handle<Type>) -> Handle<Type> {
    let ty = &src.types[handle];
    let inner = match &ty.inner {
        TypeInner::Void => TypeInner::Void,
        TypeInner::Scalar(s) => TypeInner::Scalar(*s),
        TypeInner::Vector { size, scalar } => TypeInner::Vector {
            size: *size,
            scalar: *scalar,
        },
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => TypeInner::Matrix {
            columns: *columns,
            rows: *rows,
            scalar: *scalar,
        },
        TypeInner::Sampler { image, scalar } => TypeInner::Sampler {
            image: *image,
            scalar: *scalar,
        },
        TypeInner::Struct { members } => TypeInner::Struct {
            members: members
                .iter()
                .map(|m| crate::types::StructMember {
                    name: m.name.clone(),
                    ty: copy_type(src, dst, m.ty),
                })
                .collect(),
        },
        TypeInner::Array { base, size } => TypeInner::Array {
            base: copy_type(src, dst, *base),
            size: size.clone(),
        },
    };
    dst.types.insert(Type {
        name: ty.name.clone(),
        inner,
    })
}

/// Copies an expression subtree into `dst`, returning the new root
/// handle.
pub fn copy_expression(
    src: &Module,
    dst: &mut Module,
    handle: Handle<Expression>,
) -> Handle<Expression> {
    let expr = match &src.expressions[handle] {
        Expression::Constant(value) => Expression::Constant(value.clone()),
        Expression::Variable(name) => Expression::Variable(name.clone()),
        Expression::AccessIndex { base, index } => {
            let base = copy_expression(src, dst, *base);
            let index = copy_expression(src, dst, *index);
            Expression::AccessIndex { base, index }
        }
        Expression::AccessMember { base, member } => {
            let base = copy_expression(src, dst, *base);
            Expression::AccessMember {
                base,
                member: member.clone(),
            }
        }
        Expression::Swizzle { base, pattern } => {
            let base = copy_expression(src, dst, *base);
            Expression::Swizzle {
                base,
                pattern: pattern.clone(),
            }
        }
        Expression::Assignment { op, target, value } => {
            let target = copy_expression(src, dst, *target);
            let value = copy_expression(src, dst, *value);
            Expression::Assignment {
                op: *op,
                target,
                value,
            }
        }
        Expression::Unary { op, operand } => {
            let operand = copy_expression(src, dst, *operand);
            Expression::Unary { op: *op, operand }
        }
        Expression::Binary { op, left, right } => {
            let left = copy_expression(src, dst, *left);
            let right = copy_expression(src, dst, *right);
            Expression::Binary {
                op: *op,
                left,
                right,
            }
        }
        Expression::Call {
            function,
            arguments,
        } => {
            let arguments = arguments
                .iter()
                .map(|&a| copy_expression(src, dst, a))
                .collect();
            Expression::Call {
                function: function.clone(),
                arguments,
            }
        }
        Expression::BuiltInCall {
            function,
            arguments,
        } => {
            let arguments = arguments
                .iter()
                .map(|&a| copy_expression(src, dst, a))
                .collect();
            Expression::BuiltInCall {
                function: *function,
                arguments,
            }
        }
        Expression::Cast { ty, arguments } => {
            let ty = copy_type(src, dst, *ty);
            let arguments = arguments
                .iter()
                .map(|&a| copy_expression(src, dst, a))
                .collect();
            Expression::Cast { ty, arguments }
        }
        Expression::Ternary {
            condition,
            accept,
            reject,
        } => {
            let condition = copy_expression(src, dst, *condition);
            let accept = copy_expression(src, dst, *accept);
            let reject = copy_expression(src, dst, *reject);
            Expression::Ternary {
                condition,
                accept,
                reject,
            }
        }
    };
    dst.expressions.append(expr)
}

/// Copies a whole statement subtree into `dst`.
pub fn copy_statement(src: &Module, dst: &mut Module, stmt: &Statement) -> Statement {
    match stmt {
        Statement::Conditional {
            condition,
            accept,
            reject,
        } => Statement::Conditional {
            condition: copy_expression(src, dst, *condition),
            accept: copy_block(src, dst, accept),
            reject: copy_block(src, dst, reject),
        },
        Statement::For {
            init,
            condition,
            step,
            body,
        } => Statement::For {
            init: init
                .as_ref()
                .map(|s| Box::new(copy_statement(src, dst, s))),
            condition: condition.map(|c| copy_expression(src, dst, c)),
            step: step.map(|s| copy_expression(src, dst, s)),
            body: copy_block(src, dst, body),
        },
        Statement::While { condition, body } => Statement::While {
            condition: copy_expression(src, dst, *condition),
            body: copy_block(src, dst, body),
        },
        Statement::DoWhile { body, condition } => Statement::DoWhile {
            body: copy_block(src, dst, body),
            condition: copy_expression(src, dst, *condition),
        },
        Statement::VariableDeclaration { name, ty, init } => Statement::VariableDeclaration {
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            init: init.map(|e| copy_expression(src, dst, e)),
        },
        Statement::ConstDeclaration { name, ty, init } => Statement::ConstDeclaration {
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            init: copy_expression(src, dst, *init),
        },
        Statement::StructDeclaration { name, ty } => Statement::StructDeclaration {
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
        },
        Statement::InputDeclaration {
            stage,
            name,
            ty,
            location,
        } => Statement::InputDeclaration {
            stage: *stage,
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            location: *location,
        },
        Statement::OutputDeclaration {
            stage,
            name,
            ty,
            location,
        } => Statement::OutputDeclaration {
            stage: *stage,
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            location: *location,
        },
        Statement::ExternalDeclaration {
            name,
            ty,
            set,
            binding,
        } => Statement::ExternalDeclaration {
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            set: *set,
            binding: *binding,
        },
        Statement::OptionDeclaration { name, ty, default } => Statement::OptionDeclaration {
            name: name.clone(),
            ty: copy_type(src, dst, *ty),
            default: default.map(|e| copy_expression(src, dst, e)),
        },
        Statement::FunctionDeclaration(f) => {
            Statement::FunctionDeclaration(copy_function(src, dst, f))
        }
        Statement::EntryFunctionDeclaration { stage, function } => {
            Statement::EntryFunctionDeclaration {
                stage: *stage,
                function: copy_function(src, dst, function),
            }
        }
        Statement::Include { library } => Statement::Include {
            library: library.clone(),
        },
        Statement::Expression(e) => Statement::Expression(copy_expression(src, dst, *e)),
        Statement::Break => Statement::Break,
        Statement::Continue => Statement::Continue,
        Statement::Return { value } => Statement::Return {
            value: value.map(|e| copy_expression(src, dst, e)),
        },
        Statement::Sequence(block) => Statement::Sequence(copy_block(src, dst, block)),
    }
}

/// Copies a statement block into `dst`.
pub fn copy_block(src: &Module, dst: &mut Module, block: &[Statement]) -> Vec<Statement> {
    block
        .iter()
        .map(|s| copy_statement(src, dst, s))
        .collect()
}

fn copy_function(src: &Module, dst: &mut Module, f: &Function) -> Function {
    Function {
        name: f.name.clone(),
        parameters: f
            .parameters
            .iter()
            .map(|p| FunctionParameter {
                name: p.name.clone(),
                ty: copy_type(src, dst, p.ty),
            })
            .collect(),
        result: f.result.map(|t| copy_type(src, dst, t)),
        body: copy_block(src, dst, &f.body),
    }
}
