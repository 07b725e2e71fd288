//! ATSL pretty printer.
//!
//! Emits parseable ATSL source from a module. Parenthesization is
//! driven by the same precedence ladder the parser uses, so printing
//! and re-parsing a module yields a structurally equal tree.

use std::fmt::Write;

use crate::arena::{Handle, UniqueArena};
use crate::constant::ConstantValue;
use crate::expr::{AssignOp, BinaryOp, Expression, UnaryOp};
use crate::stmt::{Function, Stage, Statement};
use crate::types::{ArraySize, ImageKind, Primitive, Type, TypeInner, VectorSize};
use crate::Module;

// Context precedences for parenthesization. Binary operators occupy
// 2..=7 (see BinaryOp::precedence); these bracket that range.
const PREC_ASSIGN: u8 = 0;
const PREC_TERNARY: u8 = 1;
const PREC_UNARY: u8 = 8;
const PREC_POSTFIX: u8 = 9;
const PREC_ATOM: u8 = 10;

/// Renders a whole module as ATSL source.
pub fn write_module(module: &Module) -> String {
    let mut out = String::new();
    for stmt in &module.root {
        write_statement(&mut out, module, stmt, 0);
    }
    out
}

/// The ATSL spelling of a type.
pub fn type_name(types: &UniqueArena<Type>, handle: Handle<Type>) -> String {
    let ty = &types[handle];
    match &ty.inner {
        TypeInner::Void => "void".into(),
        TypeInner::Scalar(p) => primitive_name(*p).into(),
        TypeInner::Vector { size, scalar } => {
            format!("vec{}{}", *size as u32, primitive_suffix(*scalar))
        }
        TypeInner::Matrix { columns, .. } => format!("mat{}f", *columns as u32),
        TypeInner::Sampler { image, scalar } => {
            let dim = match image {
                ImageKind::Image1D => "1D",
                ImageKind::Image2D => "2D",
                ImageKind::Image3D => "3D",
                ImageKind::Cubemap => "Cube",
            };
            format!("sampler{dim}{}", primitive_suffix(*scalar))
        }
        TypeInner::Struct { .. } => ty.name.clone().unwrap_or_else(|| "struct".into()),
        TypeInner::Array { base, size } => {
            let base = type_name(types, *base);
            match size {
                ArraySize::Constant(n) => format!("{base}[{n}]"),
                ArraySize::Implicit => format!("{base}[]"),
                ArraySize::Option(name) => format!("{base}[{name}]"),
            }
        }
    }
}

fn primitive_name(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "bool",
        Primitive::Int => "int",
        Primitive::UInt => "uint",
        Primitive::Float => "float",
    }
}

fn primitive_suffix(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "b",
        Primitive::Int => "i",
        Primitive::UInt => "u",
        Primitive::Float => "f",
    }
}

/// Formats a constant as an ATSL literal.
pub fn constant_literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(v) => v.to_string(),
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::UInt(v) => format!("{v}u"),
        ConstantValue::Float(v) => float_literal(*v),
        ConstantValue::Vector(components) => {
            let parts: Vec<_> = components.iter().map(constant_literal).collect();
            let suffix = components
                .first()
                .and_then(|c| c.primitive())
                .map(primitive_suffix)
                .unwrap_or("f");
            format!("vec{}{suffix}({})", components.len(), parts.join(", "))
        }
    }
}

fn float_literal(v: f32) -> String {
    if v == v.trunc() && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn write_statement(out: &mut String, module: &Module, stmt: &Statement, indent: usize) {
    let pad = "    ".repeat(indent);
    match stmt {
        Statement::Conditional {
            condition,
            accept,
            reject,
        } => {
            let cond = expr_str(module, *condition, PREC_ASSIGN);
            let _ = writeln!(out, "{pad}if ({cond}) {{");
            for s in accept {
                write_statement(out, module, s, indent + 1);
            }
            if reject.is_empty() {
                let _ = writeln!(out, "{pad}}}");
            } else {
                let _ = writeln!(out, "{pad}}} else {{");
                for s in reject {
                    write_statement(out, module, s, indent + 1);
                }
                let _ = writeln!(out, "{pad}}}");
            }
        }
        Statement::For {
            init,
            condition,
            step,
            body,
        } => {
            let init_str = match init {
                Some(s) => inline_statement(module, s),
                None => String::new(),
            };
            let cond_str = condition
                .map(|c| expr_str(module, c, PREC_ASSIGN))
                .unwrap_or_default();
            let step_str = step
                .map(|s| expr_str(module, s, PREC_ASSIGN))
                .unwrap_or_default();
            let _ = writeln!(out, "{pad}for ({init_str}; {cond_str}; {step_str}) {{");
            for s in body {
                write_statement(out, module, s, indent + 1);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::While { condition, body } => {
            let cond = expr_str(module, *condition, PREC_ASSIGN);
            let _ = writeln!(out, "{pad}while ({cond}) {{");
            for s in body {
                write_statement(out, module, s, indent + 1);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::DoWhile { body, condition } => {
            let _ = writeln!(out, "{pad}do {{");
            for s in body {
                write_statement(out, module, s, indent + 1);
            }
            let cond = expr_str(module, *condition, PREC_ASSIGN);
            let _ = writeln!(out, "{pad}}} while ({cond});");
        }
        Statement::VariableDeclaration { .. } | Statement::ConstDeclaration { .. } => {
            let decl = inline_statement(module, stmt);
            let _ = writeln!(out, "{pad}{decl};");
        }
        Statement::StructDeclaration { name, ty } => {
            let _ = writeln!(out, "{pad}struct {name} {{");
            if let TypeInner::Struct { members } = &module.types[*ty].inner {
                for m in members {
                    let mty = type_name(&module.types, m.ty);
                    let _ = writeln!(out, "{pad}    {mty} {};", m.name);
                }
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::InputDeclaration {
            stage,
            name,
            ty,
            location,
        } => {
            write_io(out, &pad, module, "input", *stage, name, *ty, *location);
        }
        Statement::OutputDeclaration {
            stage,
            name,
            ty,
            location,
        } => {
            write_io(out, &pad, module, "output", *stage, name, *ty, *location);
        }
        Statement::ExternalDeclaration {
            name,
            ty,
            set,
            binding,
        } => {
            let tname = type_name(&module.types, *ty);
            match (set, binding) {
                (Some(s), Some(b)) => {
                    let _ = writeln!(out, "{pad}external(set = {s}, binding = {b}) {tname} {name};");
                }
                _ => {
                    let _ = writeln!(out, "{pad}external {tname} {name};");
                }
            }
        }
        Statement::OptionDeclaration { name, ty, default } => {
            let tname = type_name(&module.types, *ty);
            match default {
                Some(d) => {
                    let dstr = expr_str(module, *d, PREC_ASSIGN);
                    let _ = writeln!(out, "{pad}option {tname} {name} = {dstr};");
                }
                None => {
                    let _ = writeln!(out, "{pad}option {tname} {name};");
                }
            }
        }
        Statement::FunctionDeclaration(f) => {
            write_function(out, module, f, None, indent);
        }
        Statement::EntryFunctionDeclaration { stage, function } => {
            write_function(out, module, function, Some(*stage), indent);
        }
        Statement::Include { library } => {
            let _ = writeln!(out, "{pad}include <{library}>;");
        }
        Statement::Expression(e) => {
            let estr = expr_str(module, *e, PREC_ASSIGN);
            let _ = writeln!(out, "{pad}{estr};");
        }
        Statement::Break => {
            let _ = writeln!(out, "{pad}break;");
        }
        Statement::Continue => {
            let _ = writeln!(out, "{pad}continue;");
        }
        Statement::Return { value } => match value {
            Some(v) => {
                let vstr = expr_str(module, *v, PREC_ASSIGN);
                let _ = writeln!(out, "{pad}return {vstr};");
            }
            None => {
                let _ = writeln!(out, "{pad}return;");
            }
        },
        Statement::Sequence(block) => {
            let _ = writeln!(out, "{pad}{{");
            for s in block {
                write_statement(out, module, s, indent + 1);
            }
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_io(
    out: &mut String,
    pad: &str,
    module: &Module,
    keyword: &str,
    stage: Stage,
    name: &str,
    ty: Handle<Type>,
    location: Option<u32>,
) {
    let tname = type_name(&module.types, ty);
    match location {
        Some(loc) => {
            let _ = writeln!(out, "{pad}{keyword}({stage}, location = {loc}) {tname} {name};");
        }
        None => {
            let _ = writeln!(out, "{pad}{keyword}({stage}) {tname} {name};");
        }
    }
}

fn write_function(
    out: &mut String,
    module: &Module,
    f: &Function,
    stage: Option<Stage>,
    indent: usize,
) {
    let pad = "    ".repeat(indent);
    if let Some(stage) = stage {
        let _ = writeln!(out, "{pad}[{stage}]");
    }
    let params: Vec<_> = f
        .parameters
        .iter()
        .map(|p| format!("{} {}", type_name(&module.types, p.ty), p.name))
        .collect();
    let ret = match f.result {
        Some(t) => format!(" -> {}", type_name(&module.types, t)),
        None => String::new(),
    };
    let _ = writeln!(out, "{pad}fn {}({}){ret} {{", f.name, params.join(", "));
    for s in &f.body {
        write_statement(out, module, s, indent + 1);
    }
    let _ = writeln!(out, "{pad}}}");
}

/// Renders a statement without trailing newline/semicolon, for `for`
/// initializers and declaration lines.
fn inline_statement(module: &Module, stmt: &Statement) -> String {
    match stmt {
        Statement::VariableDeclaration { name, ty, init } => {
            let tname = type_name(&module.types, *ty);
            match init {
                Some(e) => format!("{tname} {name} = {}", expr_str(module, *e, PREC_ASSIGN)),
                None => format!("{tname} {name}"),
            }
        }
        Statement::ConstDeclaration { name, ty, init } => {
            let tname = type_name(&module.types, *ty);
            format!(
                "const {tname} {name} = {}",
                expr_str(module, *init, PREC_ASSIGN)
            )
        }
        Statement::Expression(e) => expr_str(module, *e, PREC_ASSIGN),
        other => format!("/* {other:?} */"),
    }
}

/// Renders an expression, adding parentheses whenever this node binds
/// weaker than the surrounding context requires.
fn expr_str(module: &Module, handle: Handle<Expression>, min_prec: u8) -> String {
    let (text, prec) = match &module.expressions[handle] {
        Expression::Constant(v) => (constant_literal(v), PREC_ATOM),
        Expression::Variable(name) => (name.clone(), PREC_ATOM),
        Expression::AccessIndex { base, index } => (
            format!(
                "{}[{}]",
                expr_str(module, *base, PREC_POSTFIX),
                expr_str(module, *index, PREC_ASSIGN)
            ),
            PREC_POSTFIX,
        ),
        Expression::AccessMember { base, member } => (
            format!("{}.{member}", expr_str(module, *base, PREC_POSTFIX)),
            PREC_POSTFIX,
        ),
        Expression::Swizzle { base, pattern } => {
            let chars: String = pattern.iter().map(|c| c.to_char()).collect();
            (
                format!("{}.{chars}", expr_str(module, *base, PREC_POSTFIX)),
                PREC_POSTFIX,
            )
        }
        Expression::Assignment { op, target, value } => {
            let sym = match op {
                AssignOp::Assign => "=",
                AssignOp::AddAssign => "+=",
                AssignOp::SubAssign => "-=",
                AssignOp::MulAssign => "*=",
                AssignOp::DivAssign => "/=",
                AssignOp::ModAssign => "%=",
            };
            (
                format!(
                    "{} {sym} {}",
                    expr_str(module, *target, PREC_POSTFIX),
                    expr_str(module, *value, PREC_ASSIGN)
                ),
                PREC_ASSIGN,
            )
        }
        Expression::Unary { op, operand } => {
            let inner = expr_str(module, *operand, PREC_UNARY);
            let text = match op {
                UnaryOp::Negate => format!("-{inner}"),
                UnaryOp::LogicalNot => format!("!{inner}"),
                UnaryOp::PreIncrement => format!("++{inner}"),
                UnaryOp::PreDecrement => format!("--{inner}"),
                UnaryOp::PostIncrement => format!("{inner}++"),
                UnaryOp::PostDecrement => format!("{inner}--"),
            };
            (text, PREC_UNARY)
        }
        Expression::Binary { op, left, right } => {
            let prec = op.precedence();
            let sym = binary_symbol(*op);
            (
                format!(
                    "{} {sym} {}",
                    expr_str(module, *left, prec),
                    // Right operand of a left-associative operator needs
                    // strictly tighter binding to avoid reassociation.
                    expr_str(module, *right, prec + 1)
                ),
                prec,
            )
        }
        Expression::Call {
            function,
            arguments,
        } => (call_str(module, function, arguments), PREC_ATOM),
        Expression::BuiltInCall {
            function,
            arguments,
        } => (call_str(module, function.name(), arguments), PREC_ATOM),
        Expression::Cast { ty, arguments } => (
            call_str(module, &type_name(&module.types, *ty), arguments),
            PREC_ATOM,
        ),
        Expression::Ternary {
            condition,
            accept,
            reject,
        } => (
            format!(
                "{} ? {} : {}",
                expr_str(module, *condition, PREC_TERNARY + 1),
                expr_str(module, *accept, PREC_ASSIGN),
                expr_str(module, *reject, PREC_TERNARY)
            ),
            PREC_TERNARY,
        ),
    };
    if prec < min_prec {
        format!("({text})")
    } else {
        text
    }
}

fn call_str(module: &Module, callee: &str, arguments: &[Handle<Expression>]) -> String {
    let args: Vec<_> = arguments
        .iter()
        .map(|&a| expr_str(module, a, PREC_ASSIGN))
        .collect();
    format!("{callee}({})", args.join(", "))
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Less => "<",
        BinaryOp::Greater => ">",
        BinaryOp::LessEqual => "<=",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::LogicalAnd => "&&",
        BinaryOp::LogicalOr => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::scalar_type;

    #[test]
    fn literals() {
        assert_eq!(constant_literal(&ConstantValue::Float(1.0)), "1.0");
        assert_eq!(constant_literal(&ConstantValue::Float(0.25)), "0.25");
        assert_eq!(constant_literal(&ConstantValue::Int(-3)), "-3");
        assert_eq!(constant_literal(&ConstantValue::UInt(7)), "7u");
        assert_eq!(constant_literal(&ConstantValue::Bool(true)), "true");
    }

    #[test]
    fn type_names() {
        let mut types = UniqueArena::new();
        let float = scalar_type(&mut types, Primitive::Float);
        assert_eq!(type_name(&types, float), "float");
        let v3 = types.insert(Type {
            name: None,
            inner: TypeInner::Vector {
                size: VectorSize::Tri,
                scalar: Primitive::Float,
            },
        });
        assert_eq!(type_name(&types, v3), "vec3f");
        let m4 = types.insert(Type {
            name: None,
            inner: TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar: Primitive::Float,
            },
        });
        assert_eq!(type_name(&types, m4), "mat4f");
        let s2 = types.insert(Type {
            name: None,
            inner: TypeInner::Sampler {
                image: ImageKind::Image2D,
                scalar: Primitive::Float,
            },
        });
        assert_eq!(type_name(&types, s2), "sampler2Df");
        let arr = types.insert(Type {
            name: None,
            inner: TypeInner::Array {
                base: float,
                size: ArraySize::Constant(4),
            },
        });
        assert_eq!(type_name(&types, arr), "float[4]");
    }

    #[test]
    fn precedence_parenthesization() {
        // (1 + 2) * 3 keeps its parentheses; 1 + 2 * 3 has none.
        let mut m = Module::new();
        let one = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(1)));
        let two = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(2)));
        let three = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(3)));
        let sum = m.expressions.append(Expression::Binary {
            op: BinaryOp::Add,
            left: one,
            right: two,
        });
        let product = m.expressions.append(Expression::Binary {
            op: BinaryOp::Multiply,
            left: sum,
            right: three,
        });
        assert_eq!(expr_str(&m, product, PREC_ASSIGN), "(1 + 2) * 3");

        let product2 = m.expressions.append(Expression::Binary {
            op: BinaryOp::Multiply,
            left: two,
            right: three,
        });
        let sum2 = m.expressions.append(Expression::Binary {
            op: BinaryOp::Add,
            left: one,
            right: product2,
        });
        assert_eq!(expr_str(&m, sum2, PREC_ASSIGN), "1 + 2 * 3");
    }

    #[test]
    fn subtraction_right_operand_parenthesized() {
        // 1 - (2 - 3) must not print as 1 - 2 - 3.
        let mut m = Module::new();
        let one = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(1)));
        let two = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(2)));
        let three = m
            .expressions
            .append(Expression::Constant(ConstantValue::Int(3)));
        let inner = m.expressions.append(Expression::Binary {
            op: BinaryOp::Subtract,
            left: two,
            right: three,
        });
        let outer = m.expressions.append(Expression::Binary {
            op: BinaryOp::Subtract,
            left: one,
            right: inner,
        });
        assert_eq!(expr_str(&m, outer, PREC_ASSIGN), "1 - (2 - 3)");
    }

    #[test]
    fn option_declaration_line() {
        let mut m = Module::new();
        let b = scalar_type(&mut m.types, Primitive::Bool);
        let default = m
            .expressions
            .append(Expression::Constant(ConstantValue::Bool(false)));
        m.root.push(Statement::OptionDeclaration {
            name: "useTexture".into(),
            ty: b,
            default: Some(default),
        });
        assert_eq!(write_module(&m), "option bool useTexture = false;\n");
    }
}
