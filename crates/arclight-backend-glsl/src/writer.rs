//! The GLSL source writer.

use std::fmt::Write as _;

use arclight_ast::{
    ArraySize, AssignOp, BinaryOp, BuiltInFunction, ConstantValue, Expression, Function, Handle,
    ImageKind, Module, Primitive, Stage, Statement, Type, TypeInner, UnaryOp,
};
use arclight_backend_core::{layout, BackendError, BackendOptions};
use arclight_reflect::{reflect, ReflectionTable};

const TARGET: &str = "GLSL";

// Same ladder as the parser; see BinaryOp::precedence.
const PREC_ASSIGN: u8 = 0;
const PREC_TERNARY: u8 = 1;
const PREC_UNARY: u8 = 8;
const PREC_POSTFIX: u8 = 9;
const PREC_ATOM: u8 = 10;

pub(crate) struct Writer<'a> {
    module: &'a Module,
    stage: Stage,
    version: u32,
    out: String,
    table: Option<ReflectionTable>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(module: &'a Module, stage: Stage, opts: &BackendOptions) -> Self {
        Self {
            module,
            stage,
            version: opts.version.unwrap_or(450),
            out: String::new(),
            table: None,
        }
    }

    pub(crate) fn write(mut self) -> Result<String, BackendError> {
        self.reject_unresolved()?;
        self.table = Some(reflect(self.module, self.stage)?);

        let _ = writeln!(self.out, "#version {}", self.version);
        self.out.push('\n');

        let module = self.module;
        for stmt in &module.root {
            match stmt {
                Statement::StructDeclaration { name, ty } => self.write_struct(name, *ty),
                Statement::ConstDeclaration { name, ty, init } => {
                    let decl = self.declare(*ty, name);
                    let init = self.expression(*init, PREC_ASSIGN)?;
                    let _ = writeln!(self.out, "const {decl} = {init};");
                }
                Statement::ExternalDeclaration { name, ty, .. } => {
                    self.write_external(name, *ty)?;
                }
                Statement::InputDeclaration { stage, name, ty, .. } if *stage == self.stage => {
                    self.write_io("in", name, *ty, true)
                }
                Statement::OutputDeclaration { stage, name, ty, .. } if *stage == self.stage => {
                    self.write_io("out", name, *ty, false)
                }
                Statement::InputDeclaration { .. } | Statement::OutputDeclaration { .. } => {}
                Statement::FunctionDeclaration(f) => self.write_function(f, false)?,
                Statement::EntryFunctionDeclaration { stage, function } => {
                    if *stage == self.stage {
                        self.write_function(function, true)?;
                    }
                }
                Statement::OptionDeclaration { .. } | Statement::Include { .. } => {
                    unreachable!("rejected by reject_unresolved")
                }
                other => {
                    return Err(unsupported(format!(
                        "top-level statement {other:?} has no GLSL form"
                    )))
                }
            }
        }

        Ok(self.out)
    }

    /// Symbolic options and unresolved includes cannot be emitted.
    fn reject_unresolved(&self) -> Result<(), BackendError> {
        for stmt in &self.module.root {
            match stmt {
                Statement::OptionDeclaration { name, .. } => {
                    return Err(unsupported(format!(
                        "option `{name}` is still symbolic at emission time"
                    )));
                }
                Statement::Include { library } => {
                    return Err(unsupported(format!(
                        "include <{library}> was not resolved before emission"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    // --- declarations ---

    fn write_struct(&mut self, name: &str, ty: Handle<Type>) {
        let _ = writeln!(self.out, "struct {name} {{");
        if let TypeInner::Struct { members } = &self.module.types[ty].inner {
            for m in members {
                let decl = self.declare(m.ty, &m.name);
                let _ = writeln!(self.out, "    {decl};");
            }
        }
        let _ = writeln!(self.out, "}};\n");
    }

    fn write_external(&mut self, name: &str, ty: Handle<Type>) -> Result<(), BackendError> {
        let table = self.table.as_ref().expect("reflection runs before emission");
        let entry = table
            .external(name)
            .expect("reflection covers every external");
        let (set, binding) = (entry.set, entry.binding);

        if matches!(self.module.types[ty].inner, TypeInner::Sampler { .. }) {
            let tname = self.type_name(ty);
            let _ = writeln!(
                self.out,
                "layout(set = {set}, binding = {binding}) uniform {tname} {name};\n"
            );
            return Ok(());
        }

        // Validates layoutability (no samplers inside, lengths resolved).
        layout::compute(self.module, ty, layout::StructLayout::Uniform)?;

        let decl = self.declare(ty, name);
        let _ = writeln!(
            self.out,
            "layout(std140, set = {set}, binding = {binding}) uniform {name}_block {{\n    {decl};\n}};\n"
        );
        Ok(())
    }

    fn write_io(&mut self, direction: &str, name: &str, ty: Handle<Type>, input: bool) {
        let table = self.table.as_ref().expect("reflection runs before emission");
        let entry = if input {
            table.inputs.iter().find(|e| e.name == name)
        } else {
            table.outputs.iter().find(|e| e.name == name)
        }
        .expect("reflection covers every io declaration");
        let decl = self.declare(ty, name);
        let _ = writeln!(
            self.out,
            "layout(location = {}) {direction} {decl};",
            entry.location
        );
    }

    fn write_function(&mut self, f: &Function, entry: bool) -> Result<(), BackendError> {
        if entry && (!f.parameters.is_empty() || f.result.is_some()) {
            return Err(unsupported(format!(
                "entry function `{}` must take no parameters and return nothing",
                f.name
            )));
        }
        self.out.push('\n');
        if entry {
            let _ = writeln!(self.out, "void main() {{");
        } else {
            let ret = match f.result {
                Some(ty) => self.type_name(ty),
                None => "void".into(),
            };
            let params: Vec<_> = f
                .parameters
                .iter()
                .map(|p| self.declare(p.ty, &p.name))
                .collect();
            let _ = writeln!(self.out, "{ret} {}({}) {{", f.name, params.join(", "));
        }
        for stmt in &f.body {
            self.write_statement(stmt, 1)?;
        }
        let _ = writeln!(self.out, "}}");
        Ok(())
    }

    // --- statements ---

    fn write_statement(&mut self, stmt: &Statement, indent: usize) -> Result<(), BackendError> {
        let pad = "    ".repeat(indent);
        match stmt {
            Statement::Conditional {
                condition,
                accept,
                reject,
            } => {
                let cond = self.expression(*condition, PREC_ASSIGN)?;
                let _ = writeln!(self.out, "{pad}if ({cond}) {{");
                for s in accept {
                    self.write_statement(s, indent + 1)?;
                }
                if reject.is_empty() {
                    let _ = writeln!(self.out, "{pad}}}");
                } else {
                    let _ = writeln!(self.out, "{pad}}} else {{");
                    for s in reject {
                        self.write_statement(s, indent + 1)?;
                    }
                    let _ = writeln!(self.out, "{pad}}}");
                }
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                let init = match init {
                    Some(s) => self.inline_statement(s)?,
                    None => String::new(),
                };
                let cond = match condition {
                    Some(c) => self.expression(*c, PREC_ASSIGN)?,
                    None => String::new(),
                };
                let step = match step {
                    Some(s) => self.expression(*s, PREC_ASSIGN)?,
                    None => String::new(),
                };
                let _ = writeln!(self.out, "{pad}for ({init}; {cond}; {step}) {{");
                for s in body {
                    self.write_statement(s, indent + 1)?;
                }
                let _ = writeln!(self.out, "{pad}}}");
            }
            Statement::While { condition, body } => {
                let cond = self.expression(*condition, PREC_ASSIGN)?;
                let _ = writeln!(self.out, "{pad}while ({cond}) {{");
                for s in body {
                    self.write_statement(s, indent + 1)?;
                }
                let _ = writeln!(self.out, "{pad}}}");
            }
            Statement::DoWhile { body, condition } => {
                let _ = writeln!(self.out, "{pad}do {{");
                for s in body {
                    self.write_statement(s, indent + 1)?;
                }
                let cond = self.expression(*condition, PREC_ASSIGN)?;
                let _ = writeln!(self.out, "{pad}}} while ({cond});");
            }
            Statement::VariableDeclaration { .. } => {
                let line = self.inline_statement(stmt)?;
                let _ = writeln!(self.out, "{pad}{line};");
            }
            Statement::Expression(e) => {
                let line = self.expression(*e, PREC_ASSIGN)?;
                let _ = writeln!(self.out, "{pad}{line};");
            }
            Statement::Break => {
                let _ = writeln!(self.out, "{pad}break;");
            }
            Statement::Continue => {
                let _ = writeln!(self.out, "{pad}continue;");
            }
            Statement::Return { value } => match value {
                Some(v) => {
                    let v = self.expression(*v, PREC_ASSIGN)?;
                    let _ = writeln!(self.out, "{pad}return {v};");
                }
                None => {
                    let _ = writeln!(self.out, "{pad}return;");
                }
            },
            Statement::Sequence(block) => {
                let _ = writeln!(self.out, "{pad}{{");
                for s in block {
                    self.write_statement(s, indent + 1)?;
                }
                let _ = writeln!(self.out, "{pad}}}");
            }
            other => {
                return Err(unsupported(format!(
                    "statement {other:?} inside a function body has no GLSL form"
                )))
            }
        }
        Ok(())
    }

    fn inline_statement(&mut self, stmt: &Statement) -> Result<String, BackendError> {
        match stmt {
            Statement::VariableDeclaration { name, ty, init } => {
                let decl = self.declare(*ty, name);
                Ok(match init {
                    Some(e) => format!("{decl} = {}", self.expression(*e, PREC_ASSIGN)?),
                    None => decl,
                })
            }
            Statement::Expression(e) => self.expression(*e, PREC_ASSIGN),
            other => Err(unsupported(format!(
                "statement {other:?} cannot appear in a for-initializer"
            ))),
        }
    }

    // --- expressions ---

    fn expression(
        &self,
        handle: Handle<Expression>,
        min_prec: u8,
    ) -> Result<String, BackendError> {
        let (text, prec) = match &self.module.expressions[handle] {
            Expression::Constant(v) => (self.constant(v), PREC_ATOM),
            Expression::Variable(name) => (name.clone(), PREC_ATOM),
            Expression::AccessIndex { base, index } => (
                format!(
                    "{}[{}]",
                    self.expression(*base, PREC_POSTFIX)?,
                    self.expression(*index, PREC_ASSIGN)?
                ),
                PREC_POSTFIX,
            ),
            Expression::AccessMember { base, member } => (
                format!("{}.{member}", self.expression(*base, PREC_POSTFIX)?),
                PREC_POSTFIX,
            ),
            Expression::Swizzle { base, pattern } => {
                let chars: String = pattern.iter().map(|c| c.to_char()).collect();
                (
                    format!("{}.{chars}", self.expression(*base, PREC_POSTFIX)?),
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
                        self.expression(*target, PREC_POSTFIX)?,
                        self.expression(*value, PREC_ASSIGN)?
                    ),
                    PREC_ASSIGN,
                )
            }
            Expression::Unary { op, operand } => {
                let inner = self.expression(*operand, PREC_UNARY)?;
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
                (
                    format!(
                        "{} {} {}",
                        self.expression(*left, prec)?,
                        binary_symbol(*op),
                        self.expression(*right, prec + 1)?
                    ),
                    prec,
                )
            }
            Expression::Call {
                function,
                arguments,
            } => (self.call(function, arguments)?, PREC_ATOM),
            Expression::BuiltInCall {
                function,
                arguments,
            } => {
                let text = self.builtin(*function, arguments)?;
                // setVertexPosition lowers to an assignment, which does
                // not bind like a call.
                let prec = if *function == BuiltInFunction::SetVertexPosition {
                    PREC_ASSIGN
                } else {
                    PREC_ATOM
                };
                (text, prec)
            }
            Expression::Cast { ty, arguments } => {
                (self.call(&self.type_name(*ty), arguments)?, PREC_ATOM)
            }
            Expression::Ternary {
                condition,
                accept,
                reject,
            } => (
                format!(
                    "{} ? {} : {}",
                    self.expression(*condition, PREC_TERNARY + 1)?,
                    self.expression(*accept, PREC_ASSIGN)?,
                    self.expression(*reject, PREC_TERNARY)?
                ),
                PREC_TERNARY,
            ),
        };
        Ok(if prec < min_prec {
            format!("({text})")
        } else {
            text
        })
    }

    fn call(&self, callee: &str, arguments: &[Handle<Expression>]) -> Result<String, BackendError> {
        let args = arguments
            .iter()
            .map(|&a| self.expression(a, PREC_ASSIGN))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{callee}({})", args.join(", ")))
    }

    fn builtin(
        &self,
        function: BuiltInFunction,
        arguments: &[Handle<Expression>],
    ) -> Result<String, BackendError> {
        match function {
            BuiltInFunction::SetVertexPosition => {
                if self.stage != Stage::Vertex {
                    return Err(unsupported(
                        "setVertexPosition is only available in the vertex stage".into(),
                    ));
                }
                let value = self.expression(arguments[0], PREC_ASSIGN)?;
                Ok(format!("gl_Position = {value}"))
            }
            BuiltInFunction::Norm => self.call("normalize", arguments),
            BuiltInFunction::Sample => self.call("texture", arguments),
            // The rest share their GLSL spelling.
            other => self.call(other.name(), arguments),
        }
    }

    fn constant(&self, value: &ConstantValue) -> String {
        match value {
            ConstantValue::Bool(v) => v.to_string(),
            ConstantValue::Int(v) => v.to_string(),
            ConstantValue::UInt(v) => format!("{v}u"),
            ConstantValue::Float(v) => {
                if *v == v.trunc() && v.is_finite() {
                    format!("{v:.1}")
                } else {
                    format!("{v}")
                }
            }
            ConstantValue::Vector(components) => {
                let parts: Vec<_> = components.iter().map(|c| self.constant(c)).collect();
                let prefix = match components.first().and_then(|c| c.primitive()) {
                    Some(Primitive::Int) => "ivec",
                    Some(Primitive::UInt) => "uvec",
                    Some(Primitive::Bool) => "bvec",
                    _ => "vec",
                };
                format!("{prefix}{}({})", components.len(), parts.join(", "))
            }
        }
    }

    // --- types ---

    /// GLSL declaration of `name` with the given type; arrays move the
    /// brackets after the name.
    fn declare(&self, ty: Handle<Type>, name: &str) -> String {
        match &self.module.types[ty].inner {
            TypeInner::Array { base, size } => {
                let base = self.type_name(*base);
                match size {
                    ArraySize::Constant(n) => format!("{base} {name}[{n}]"),
                    ArraySize::Implicit => format!("{base} {name}[]"),
                    // Caught earlier by layout validation; spell it out
                    // for locals so the GLSL compiler reports it.
                    ArraySize::Option(opt) => format!("{base} {name}[{opt}]"),
                }
            }
            _ => format!("{} {name}", self.type_name(ty)),
        }
    }

    fn type_name(&self, ty: Handle<Type>) -> String {
        let ty = &self.module.types[ty];
        match &ty.inner {
            TypeInner::Void => "void".into(),
            TypeInner::Scalar(p) => scalar_name(*p).into(),
            TypeInner::Vector { size, scalar } => {
                format!("{}vec{}", vector_prefix(*scalar), *size as u32)
            }
            TypeInner::Matrix { columns, .. } => format!("mat{}", *columns as u32),
            TypeInner::Sampler { image, scalar } => {
                let dim = match image {
                    ImageKind::Image1D => "1D",
                    ImageKind::Image2D => "2D",
                    ImageKind::Image3D => "3D",
                    ImageKind::Cubemap => "Cube",
                };
                format!("{}sampler{dim}", vector_prefix(*scalar))
            }
            TypeInner::Struct { .. } => ty.name.clone().unwrap_or_else(|| "struct".into()),
            TypeInner::Array { base, size } => {
                // Anonymous array spelling, used by constructors.
                let base = self.type_name(*base);
                match size {
                    ArraySize::Constant(n) => format!("{base}[{n}]"),
                    _ => format!("{base}[]"),
                }
            }
        }
    }
}

fn scalar_name(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "bool",
        Primitive::Int => "int",
        Primitive::UInt => "uint",
        Primitive::Float => "float",
    }
}

fn vector_prefix(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "b",
        Primitive::Int => "i",
        Primitive::UInt => "u",
        Primitive::Float => "",
    }
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

fn unsupported(reason: String) -> BackendError {
    BackendError::Unsupported {
        target: TARGET,
        reason,
    }
}
