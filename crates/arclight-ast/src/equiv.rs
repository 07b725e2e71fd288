//! Structural equality across modules.
//!
//! Handles are arena indices, so derived `PartialEq` on whole modules
//! would compare arena layouts rather than tree shapes. These helpers
//! compare trees by chasing handles in each module's own arenas, which
//! is what round-trip and idempotence tests need.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::stmt::{Function, Statement};
use crate::types::{Type, TypeInner};
use crate::Module;

/// Compares two modules' root blocks structurally.
pub fn module_eq(a: &Module, b: &Module) -> bool {
    block_eq(a, &a.root, b, &b.root)
}

/// Compares two statements structurally across modules.
pub fn statement_eq(ma: &Module, a: &Statement, mb: &Module, b: &Statement) -> bool {
    match (a, b) {
        (
            Statement::Conditional {
                condition: ca,
                accept: aa,
                reject: ra,
            },
            Statement::Conditional {
                condition: cb,
                accept: ab,
                reject: rb,
            },
        ) => {
            expression_eq(ma, *ca, mb, *cb)
                && block_eq(ma, aa, mb, ab)
                && block_eq(ma, ra, mb, rb)
        }
        (
            Statement::For {
                init: ia,
                condition: ca,
                step: sa,
                body: ba,
            },
            Statement::For {
                init: ib,
                condition: cb,
                step: sb,
                body: bb,
            },
        ) => {
            opt_stmt_eq(ma, ia.as_deref(), mb, ib.as_deref())
                && opt_expr_eq(ma, *ca, mb, *cb)
                && opt_expr_eq(ma, *sa, mb, *sb)
                && block_eq(ma, ba, mb, bb)
        }
        (
            Statement::While {
                condition: ca,
                body: ba,
            },
            Statement::While {
                condition: cb,
                body: bb,
            },
        ) => expression_eq(ma, *ca, mb, *cb) && block_eq(ma, ba, mb, bb),
        (
            Statement::DoWhile {
                body: ba,
                condition: ca,
            },
            Statement::DoWhile {
                body: bb,
                condition: cb,
            },
        ) => expression_eq(ma, *ca, mb, *cb) && block_eq(ma, ba, mb, bb),
        (
            Statement::VariableDeclaration {
                name: na,
                ty: ta,
                init: ia,
            },
            Statement::VariableDeclaration {
                name: nb,
                ty: tb,
                init: ib,
            },
        ) => na == nb && type_eq(ma, *ta, mb, *tb) && opt_expr_eq(ma, *ia, mb, *ib),
        (
            Statement::ConstDeclaration {
                name: na,
                ty: ta,
                init: ia,
            },
            Statement::ConstDeclaration {
                name: nb,
                ty: tb,
                init: ib,
            },
        ) => na == nb && type_eq(ma, *ta, mb, *tb) && expression_eq(ma, *ia, mb, *ib),
        (
            Statement::StructDeclaration { name: na, ty: ta },
            Statement::StructDeclaration { name: nb, ty: tb },
        ) => na == nb && type_eq(ma, *ta, mb, *tb),
        (
            Statement::InputDeclaration {
                stage: sa,
                name: na,
                ty: ta,
                location: la,
            },
            Statement::InputDeclaration {
                stage: sb,
                name: nb,
                ty: tb,
                location: lb,
            },
        )
        | (
            Statement::OutputDeclaration {
                stage: sa,
                name: na,
                ty: ta,
                location: la,
            },
            Statement::OutputDeclaration {
                stage: sb,
                name: nb,
                ty: tb,
                location: lb,
            },
        ) => sa == sb && na == nb && la == lb && type_eq(ma, *ta, mb, *tb),
        (
            Statement::ExternalDeclaration {
                name: na,
                ty: ta,
                set: seta,
                binding: ba,
            },
            Statement::ExternalDeclaration {
                name: nb,
                ty: tb,
                set: setb,
                binding: bb,
            },
        ) => na == nb && seta == setb && ba == bb && type_eq(ma, *ta, mb, *tb),
        (
            Statement::OptionDeclaration {
                name: na,
                ty: ta,
                default: da,
            },
            Statement::OptionDeclaration {
                name: nb,
                ty: tb,
                default: db,
            },
        ) => na == nb && type_eq(ma, *ta, mb, *tb) && opt_expr_eq(ma, *da, mb, *db),
        (Statement::FunctionDeclaration(fa), Statement::FunctionDeclaration(fb)) => {
            function_eq(ma, fa, mb, fb)
        }
        (
            Statement::EntryFunctionDeclaration {
                stage: sa,
                function: fa,
            },
            Statement::EntryFunctionDeclaration {
                stage: sb,
                function: fb,
            },
        ) => sa == sb && function_eq(ma, fa, mb, fb),
        (Statement::Include { library: la }, Statement::Include { library: lb }) => la == lb,
        (Statement::Expression(ea), Statement::Expression(eb)) => expression_eq(ma, *ea, mb, *eb),
        (Statement::Break, Statement::Break) | (Statement::Continue, Statement::Continue) => true,
        (Statement::Return { value: va }, Statement::Return { value: vb }) => {
            opt_expr_eq(ma, *va, mb, *vb)
        }
        (Statement::Sequence(ba), Statement::Sequence(bb)) => block_eq(ma, ba, mb, bb),
        _ => false,
    }
}

/// Compares two expression subtrees structurally across modules.
pub fn expression_eq(
    ma: &Module,
    a: Handle<Expression>,
    mb: &Module,
    b: Handle<Expression>,
) -> bool {
    match (&ma.expressions[a], &mb.expressions[b]) {
        (Expression::Constant(va), Expression::Constant(vb)) => va == vb,
        (Expression::Variable(na), Expression::Variable(nb)) => na == nb,
        (
            Expression::AccessIndex { base: ba, index: ia },
            Expression::AccessIndex { base: bb, index: ib },
        ) => expression_eq(ma, *ba, mb, *bb) && expression_eq(ma, *ia, mb, *ib),
        (
            Expression::AccessMember {
                base: ba,
                member: fa,
            },
            Expression::AccessMember {
                base: bb,
                member: fb,
            },
        ) => fa == fb && expression_eq(ma, *ba, mb, *bb),
        (
            Expression::Swizzle {
                base: ba,
                pattern: pa,
            },
            Expression::Swizzle {
                base: bb,
                pattern: pb,
            },
        ) => pa == pb && expression_eq(ma, *ba, mb, *bb),
        (
            Expression::Assignment {
                op: oa,
                target: ta,
                value: va,
            },
            Expression::Assignment {
                op: ob,
                target: tb,
                value: vb,
            },
        ) => oa == ob && expression_eq(ma, *ta, mb, *tb) && expression_eq(ma, *va, mb, *vb),
        (
            Expression::Unary {
                op: oa,
                operand: ea,
            },
            Expression::Unary {
                op: ob,
                operand: eb,
            },
        ) => oa == ob && expression_eq(ma, *ea, mb, *eb),
        (
            Expression::Binary {
                op: oa,
                left: la,
                right: ra,
            },
            Expression::Binary {
                op: ob,
                left: lb,
                right: rb,
            },
        ) => oa == ob && expression_eq(ma, *la, mb, *lb) && expression_eq(ma, *ra, mb, *rb),
        (
            Expression::Call {
                function: fa,
                arguments: aa,
            },
            Expression::Call {
                function: fb,
                arguments: ab,
            },
        ) => fa == fb && args_eq(ma, aa, mb, ab),
        (
            Expression::BuiltInCall {
                function: fa,
                arguments: aa,
            },
            Expression::BuiltInCall {
                function: fb,
                arguments: ab,
            },
        ) => fa == fb && args_eq(ma, aa, mb, ab),
        (
            Expression::Cast {
                ty: ta,
                arguments: aa,
            },
            Expression::Cast {
                ty: tb,
                arguments: ab,
            },
        ) => type_eq(ma, *ta, mb, *tb) && args_eq(ma, aa, mb, ab),
        (
            Expression::Ternary {
                condition: ca,
                accept: aa,
                reject: ra,
            },
            Expression::Ternary {
                condition: cb,
                accept: ab,
                reject: rb,
            },
        ) => {
            expression_eq(ma, *ca, mb, *cb)
                && expression_eq(ma, *aa, mb, *ab)
                && expression_eq(ma, *ra, mb, *rb)
        }
        _ => false,
    }
}

fn type_eq(ma: &Module, a: Handle<Type>, mb: &Module, b: Handle<Type>) -> bool {
    let (ta, tb) = (&ma.types[a], &mb.types[b]);
    if ta.name != tb.name {
        return false;
    }
    match (&ta.inner, &tb.inner) {
        (TypeInner::Void, TypeInner::Void) => true,
        (TypeInner::Scalar(sa), TypeInner::Scalar(sb)) => sa == sb,
        (
            TypeInner::Vector {
                size: za,
                scalar: sa,
            },
            TypeInner::Vector {
                size: zb,
                scalar: sb,
            },
        ) => za == zb && sa == sb,
        (
            TypeInner::Matrix {
                columns: ca,
                rows: ra,
                scalar: sa,
            },
            TypeInner::Matrix {
                columns: cb,
                rows: rb,
                scalar: sb,
            },
        ) => ca == cb && ra == rb && sa == sb,
        (
            TypeInner::Sampler {
                image: ia,
                scalar: sa,
            },
            TypeInner::Sampler {
                image: ib,
                scalar: sb,
            },
        ) => ia == ib && sa == sb,
        (TypeInner::Struct { members: mas }, TypeInner::Struct { members: mbs }) => {
            mas.len() == mbs.len()
                && mas
                    .iter()
                    .zip(mbs)
                    .all(|(x, y)| x.name == y.name && type_eq(ma, x.ty, mb, y.ty))
        }
        (
            TypeInner::Array { base: ba, size: za },
            TypeInner::Array { base: bb, size: zb },
        ) => za == zb && type_eq(ma, *ba, mb, *bb),
        _ => false,
    }
}

fn function_eq(ma: &Module, a: &Function, mb: &Module, b: &Function) -> bool {
    a.name == b.name
        && a.parameters.len() == b.parameters.len()
        && a.parameters
            .iter()
            .zip(&b.parameters)
            .all(|(x, y)| x.name == y.name && type_eq(ma, x.ty, mb, y.ty))
        && match (a.result, b.result) {
            (None, None) => true,
            (Some(x), Some(y)) => type_eq(ma, x, mb, y),
            _ => false,
        }
        && block_eq(ma, &a.body, mb, &b.body)
}

fn block_eq(ma: &Module, a: &[Statement], mb: &Module, b: &[Statement]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| statement_eq(ma, x, mb, y))
}

fn opt_expr_eq(
    ma: &Module,
    a: Option<Handle<Expression>>,
    mb: &Module,
    b: Option<Handle<Expression>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => expression_eq(ma, x, mb, y),
        _ => false,
    }
}

fn opt_stmt_eq(ma: &Module, a: Option<&Statement>, mb: &Module, b: Option<&Statement>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => statement_eq(ma, x, mb, y),
        _ => false,
    }
}

fn args_eq(
    ma: &Module,
    a: &[Handle<Expression>],
    mb: &Module,
    b: &[Handle<Expression>],
) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(&x, &y)| expression_eq(ma, x, mb, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ConstantValue;
    use crate::expr::BinaryOp;
    use crate::types::{scalar_type, Primitive};

    fn const_module(v: f32) -> Module {
        let mut m = Module::new();
        let float = scalar_type(&mut m.types, Primitive::Float);
        let init = m
            .expressions
            .append(Expression::Constant(ConstantValue::Float(v)));
        m.root.push(Statement::ConstDeclaration {
            name: "k".into(),
            ty: float,
            init,
        });
        m
    }

    #[test]
    fn equal_modules() {
        assert!(module_eq(&const_module(1.0), &const_module(1.0)));
    }

    #[test]
    fn different_constants_differ() {
        assert!(!module_eq(&const_module(1.0), &const_module(2.0)));
    }

    #[test]
    fn arena_layout_is_irrelevant() {
        // Same tree, but b's arena carries an extra unreferenced expression
        // before the referenced ones.
        let a = const_module(4.0);
        let mut b = Module::new();
        b.expressions
            .append(Expression::Constant(ConstantValue::Bool(false)));
        let float = scalar_type(&mut b.types, Primitive::Float);
        let init = b
            .expressions
            .append(Expression::Constant(ConstantValue::Float(4.0)));
        b.root.push(Statement::ConstDeclaration {
            name: "k".into(),
            ty: float,
            init,
        });
        assert!(module_eq(&a, &b));
    }

    #[test]
    fn operator_mismatch_detected() {
        let mut a = Module::new();
        let mut b = Module::new();
        for (m, op) in [(&mut a, BinaryOp::Add), (&mut b, BinaryOp::Multiply)] {
            let l = m
                .expressions
                .append(Expression::Constant(ConstantValue::Int(1)));
            let r = m
                .expressions
                .append(Expression::Constant(ConstantValue::Int(2)));
            let e = m.expressions.append(Expression::Binary {
                op,
                left: l,
                right: r,
            });
            m.root.push(Statement::Expression(e));
        }
        assert!(!module_eq(&a, &b));
    }
}
