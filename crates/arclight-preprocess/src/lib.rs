//! Option-driven AST specialization.
//!
//! [`process`] takes a parsed module plus an [`OptionTable`] and
//! produces a new module in which resolved options have been replaced
//! by constants, constant subexpressions folded, and conditionals with
//! compile-time-constant conditions reduced to the taken branch. The
//! input module is never mutated, so several specializations of one
//! base module can be derived independently.
//!
//! Options absent from the table fall back to their declared default;
//! with neither, the option stays symbolic and the surrounding code is
//! preserved unresolved — rejecting that is the emitting backend's job,
//! not ours.

mod fold;

use std::collections::HashMap;

use arclight_ast::{
    ArraySize, BinaryOp, Block, ConstantValue, Expression, Function, FunctionParameter, Handle,
    Module, Statement, Type, TypeInner,
};

/// Specialization failures.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("division by a literal zero")]
    DivisionByZero,
    #[error("option `{name}` value does not match its declared type")]
    OptionTypeMismatch { name: String },
    #[error("default value of option `{name}` is not a constant expression")]
    InvalidOptionDefault { name: String },
    #[error("array length option `{name}` does not resolve to a non-negative integer")]
    InvalidArrayLength { name: String },
}

/// Concrete option values supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct OptionTable {
    values: HashMap<String, ConstantValue>,
}

impl OptionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option value.
    pub fn set(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: ConstantValue) -> Self {
        self.set(name, value);
        self
    }

    /// Looks up an option value.
    pub fn get(&self, name: &str) -> Option<&ConstantValue> {
        self.values.get(name)
    }
}

/// Specializes `module` for the given option values.
pub fn process(module: &Module, options: &OptionTable) -> Result<Module, PreprocessError> {
    let mut spec = Specializer {
        src: module,
        out: Module::new(),
        values: HashMap::new(),
    };
    spec.resolve_options(options)?;
    let root = spec.rewrite_block(&module.root)?;
    let mut out = spec.out;
    out.root = root;
    Ok(out)
}

struct Specializer<'a> {
    src: &'a Module,
    out: Module,
    /// Resolved option values, by option name.
    values: HashMap<String, ConstantValue>,
}

impl Specializer<'_> {
    /// Resolves every option declaration against the table (or its
    /// default), in declaration order so later defaults may reference
    /// earlier options.
    fn resolve_options(&mut self, options: &OptionTable) -> Result<(), PreprocessError> {
        for stmt in &self.src.root {
            let Statement::OptionDeclaration { name, ty, default } = stmt else {
                continue;
            };
            if let Some(value) = options.get(name) {
                let declared = self.src.types[*ty].inner.scalar();
                if value.primitive() != declared {
                    return Err(PreprocessError::OptionTypeMismatch { name: name.clone() });
                }
                self.values.insert(name.clone(), value.clone());
            } else if let Some(default) = default {
                let value = self.evaluate(*default)?.ok_or_else(|| {
                    PreprocessError::InvalidOptionDefault { name: name.clone() }
                })?;
                self.values.insert(name.clone(), value);
            }
            // No value and no default: stays symbolic.
        }
        Ok(())
    }

    /// Evaluates an expression in the source module down to a constant,
    /// if it reduces to one under the current option values.
    fn evaluate(&self, handle: Handle<Expression>) -> Result<Option<ConstantValue>, PreprocessError> {
        Ok(match &self.src.expressions[handle] {
            Expression::Constant(v) => Some(v.clone()),
            Expression::Variable(name) => self.values.get(name).cloned(),
            Expression::Unary { op, operand } => match self.evaluate(*operand)? {
                Some(v) => fold::fold_unary(*op, &v),
                None => None,
            },
            Expression::Binary { op, left, right } => {
                let l = self.evaluate(*left)?;
                // Short-circuit on a literal left side.
                if let (Some(ConstantValue::Bool(lb)), BinaryOp::LogicalAnd | BinaryOp::LogicalOr) =
                    (&l, op)
                {
                    match (op, lb) {
                        (BinaryOp::LogicalAnd, false) => return Ok(Some(ConstantValue::Bool(false))),
                        (BinaryOp::LogicalOr, true) => return Ok(Some(ConstantValue::Bool(true))),
                        _ => return self.evaluate(*right),
                    }
                }
                match (l, self.evaluate(*right)?) {
                    (Some(l), Some(r)) => fold::fold_binary(*op, &l, &r)?,
                    _ => None,
                }
            }
            Expression::Ternary {
                condition,
                accept,
                reject,
            } => match self.evaluate(*condition)? {
                Some(ConstantValue::Bool(true)) => self.evaluate(*accept)?,
                Some(ConstantValue::Bool(false)) => self.evaluate(*reject)?,
                _ => None,
            },
            _ => None,
        })
    }

    // --- rewriting into the output module ---

    fn rewrite_block(&mut self, block: &[Statement]) -> Result<Block, PreprocessError> {
        let mut out = Vec::new();
        for stmt in block {
            self.rewrite_statement(stmt, &mut out)?;
        }
        Ok(out)
    }

    /// Rewrites one statement; dead-branch elimination may splice zero
    /// or several statements into `out`.
    fn rewrite_statement(
        &mut self,
        stmt: &Statement,
        out: &mut Block,
    ) -> Result<(), PreprocessError> {
        match stmt {
            Statement::Conditional {
                condition,
                accept,
                reject,
            } => {
                let cond = self.rewrite_expression(*condition)?;
                if let Some(taken) = self.literal_bool(cond) {
                    // Dead-branch elimination: only the taken branch
                    // survives, spliced in place of the conditional.
                    let branch = if taken { accept } else { reject };
                    let rewritten = self.rewrite_block(branch)?;
                    out.extend(rewritten);
                } else {
                    let accept = self.rewrite_block(accept)?;
                    let reject = self.rewrite_block(reject)?;
                    out.push(Statement::Conditional {
                        condition: cond,
                        accept,
                        reject,
                    });
                }
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                let init = match init {
                    Some(s) => {
                        let mut tmp = Vec::new();
                        self.rewrite_statement(s, &mut tmp)?;
                        tmp.pop().map(Box::new)
                    }
                    None => None,
                };
                let condition = condition
                    .map(|c| self.rewrite_expression(c))
                    .transpose()?;
                let step = step.map(|s| self.rewrite_expression(s)).transpose()?;
                let body = self.rewrite_block(body)?;
                out.push(Statement::For {
                    init,
                    condition,
                    step,
                    body,
                });
            }
            Statement::While { condition, body } => {
                let condition = self.rewrite_expression(*condition)?;
                let body = self.rewrite_block(body)?;
                out.push(Statement::While { condition, body });
            }
            Statement::DoWhile { body, condition } => {
                let body = self.rewrite_block(body)?;
                let condition = self.rewrite_expression(*condition)?;
                out.push(Statement::DoWhile { body, condition });
            }
            Statement::VariableDeclaration { name, ty, init } => {
                let ty = self.rewrite_type(*ty)?;
                let init = init.map(|e| self.rewrite_expression(e)).transpose()?;
                out.push(Statement::VariableDeclaration {
                    name: name.clone(),
                    ty,
                    init,
                });
            }
            Statement::ConstDeclaration { name, ty, init } => {
                let ty = self.rewrite_type(*ty)?;
                let init = self.rewrite_expression(*init)?;
                out.push(Statement::ConstDeclaration {
                    name: name.clone(),
                    ty,
                    init,
                });
            }
            Statement::StructDeclaration { name, ty } => {
                let ty = self.rewrite_type(*ty)?;
                out.push(Statement::StructDeclaration {
                    name: name.clone(),
                    ty,
                });
            }
            Statement::InputDeclaration {
                stage,
                name,
                ty,
                location,
            } => {
                let ty = self.rewrite_type(*ty)?;
                out.push(Statement::InputDeclaration {
                    stage: *stage,
                    name: name.clone(),
                    ty,
                    location: *location,
                });
            }
            Statement::OutputDeclaration {
                stage,
                name,
                ty,
                location,
            } => {
                let ty = self.rewrite_type(*ty)?;
                out.push(Statement::OutputDeclaration {
                    stage: *stage,
                    name: name.clone(),
                    ty,
                    location: *location,
                });
            }
            Statement::ExternalDeclaration {
                name,
                ty,
                set,
                binding,
            } => {
                let ty = self.rewrite_type(*ty)?;
                out.push(Statement::ExternalDeclaration {
                    name: name.clone(),
                    ty,
                    set: *set,
                    binding: *binding,
                });
            }
            Statement::OptionDeclaration { name, ty, default } => {
                if self.values.contains_key(name) {
                    // Resolved: every use has been replaced, drop the
                    // declaration.
                    return Ok(());
                }
                let ty = self.rewrite_type(*ty)?;
                let default = default.map(|e| self.rewrite_expression(e)).transpose()?;
                out.push(Statement::OptionDeclaration {
                    name: name.clone(),
                    ty,
                    default,
                });
            }
            Statement::FunctionDeclaration(f) => {
                out.push(Statement::FunctionDeclaration(self.rewrite_function(f)?));
            }
            Statement::EntryFunctionDeclaration { stage, function } => {
                out.push(Statement::EntryFunctionDeclaration {
                    stage: *stage,
                    function: self.rewrite_function(function)?,
                });
            }
            Statement::Include { library } => {
                out.push(Statement::Include {
                    library: library.clone(),
                });
            }
            Statement::Expression(e) => {
                out.push(Statement::Expression(self.rewrite_expression(*e)?));
            }
            Statement::Break => out.push(Statement::Break),
            Statement::Continue => out.push(Statement::Continue),
            Statement::Return { value } => {
                let value = value.map(|e| self.rewrite_expression(e)).transpose()?;
                out.push(Statement::Return { value });
            }
            Statement::Sequence(block) => {
                out.push(Statement::Sequence(self.rewrite_block(block)?));
            }
        }
        Ok(())
    }

    fn rewrite_function(&mut self, f: &Function) -> Result<Function, PreprocessError> {
        let parameters = f
            .parameters
            .iter()
            .map(|p| {
                Ok(FunctionParameter {
                    name: p.name.clone(),
                    ty: self.rewrite_type(p.ty)?,
                })
            })
            .collect::<Result<_, PreprocessError>>()?;
        let result = f.result.map(|t| self.rewrite_type(t)).transpose()?;
        let body = self.rewrite_block(&f.body)?;
        Ok(Function {
            name: f.name.clone(),
            parameters,
            result,
            body,
        })
    }

    /// Copies a type into the output, resolving option-sized array
    /// lengths where the option has a value.
    fn rewrite_type(&mut self, handle: Handle<Type>) -> Result<Handle<Type>, PreprocessError> {
        let ty = &self.src.types[handle];
        let inner = match &ty.inner {
            TypeInner::Array { base, size } => {
                let base = self.rewrite_type(*base)?;
                let size = match size {
                    ArraySize::Option(name) => match self.values.get(name) {
                        Some(value) => ArraySize::Constant(value.as_array_length().ok_or_else(
                            || PreprocessError::InvalidArrayLength { name: name.clone() },
                        )?),
                        None => ArraySize::Option(name.clone()),
                    },
                    other => other.clone(),
                };
                TypeInner::Array { base, size }
            }
            TypeInner::Struct { members } => TypeInner::Struct {
                members: members
                    .iter()
                    .map(|m| {
                        Ok(arclight_ast::StructMember {
                            name: m.name.clone(),
                            ty: self.rewrite_type(m.ty)?,
                        })
                    })
                    .collect::<Result<_, PreprocessError>>()?,
            },
            other => other.clone(),
        };
        Ok(self.out.types.insert(Type {
            name: ty.name.clone(),
            inner,
        }))
    }

    fn rewrite_expression(
        &mut self,
        handle: Handle<Expression>,
    ) -> Result<Handle<Expression>, PreprocessError> {
        let expr = match &self.src.expressions[handle] {
            Expression::Constant(v) => Expression::Constant(v.clone()),
            Expression::Variable(name) => match self.values.get(name) {
                Some(value) => Expression::Constant(value.clone()),
                None => Expression::Variable(name.clone()),
            },
            Expression::AccessIndex { base, index } => {
                let base = self.rewrite_expression(*base)?;
                let index = self.rewrite_expression(*index)?;
                Expression::AccessIndex { base, index }
            }
            Expression::AccessMember { base, member } => {
                let base = self.rewrite_expression(*base)?;
                Expression::AccessMember {
                    base,
                    member: member.clone(),
                }
            }
            Expression::Swizzle { base, pattern } => {
                let base = self.rewrite_expression(*base)?;
                Expression::Swizzle {
                    base,
                    pattern: pattern.clone(),
                }
            }
            Expression::Assignment { op, target, value } => {
                let target = self.rewrite_expression(*target)?;
                let value = self.rewrite_expression(*value)?;
                Expression::Assignment {
                    op: *op,
                    target,
                    value,
                }
            }
            Expression::Unary { op, operand } => {
                let operand = self.rewrite_expression(*operand)?;
                let folded = match &self.out.expressions[operand] {
                    Expression::Constant(v) => fold::fold_unary(*op, v),
                    _ => None,
                };
                if let Some(folded) = folded {
                    return Ok(self.append(Expression::Constant(folded)));
                }
                Expression::Unary {
                    op: *op,
                    operand,
                }
            }
            Expression::Binary { op, left, right } => {
                let left = self.rewrite_expression(*left)?;
                // Short-circuit before touching the right side so
                // `false && <unresolved>` still folds.
                if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
                    if let Some(lb) = self.literal_bool(left) {
                        match (op, lb) {
                            (BinaryOp::LogicalAnd, false) => {
                                return Ok(
                                    self.append(Expression::Constant(ConstantValue::Bool(false)))
                                )
                            }
                            (BinaryOp::LogicalOr, true) => {
                                return Ok(
                                    self.append(Expression::Constant(ConstantValue::Bool(true)))
                                )
                            }
                            _ => return self.rewrite_expression(*right),
                        }
                    }
                }
                let right = self.rewrite_expression(*right)?;
                let folded = match (&self.out.expressions[left], &self.out.expressions[right]) {
                    (Expression::Constant(l), Expression::Constant(r)) => {
                        fold::fold_binary(*op, l, r)?
                    }
                    _ => None,
                };
                if let Some(folded) = folded {
                    return Ok(self.append(Expression::Constant(folded)));
                }
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
                    .map(|&a| self.rewrite_expression(a))
                    .collect::<Result<_, _>>()?;
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
                    .map(|&a| self.rewrite_expression(a))
                    .collect::<Result<_, _>>()?;
                Expression::BuiltInCall {
                    function: *function,
                    arguments,
                }
            }
            Expression::Cast { ty, arguments } => {
                let ty = self.rewrite_type(*ty)?;
                let arguments = arguments
                    .iter()
                    .map(|&a| self.rewrite_expression(a))
                    .collect::<Result<_, _>>()?;
                Expression::Cast { ty, arguments }
            }
            Expression::Ternary {
                condition,
                accept,
                reject,
            } => {
                let cond = self.rewrite_expression(*condition)?;
                if let Some(taken) = self.literal_bool(cond) {
                    // Dead branch of a constant ternary is dropped.
                    let survivor = if taken { accept } else { reject };
                    return self.rewrite_expression(*survivor);
                }
                let accept = self.rewrite_expression(*accept)?;
                let reject = self.rewrite_expression(*reject)?;
                Expression::Ternary {
                    condition: cond,
                    accept,
                    reject,
                }
            }
        };
        Ok(self.append(expr))
    }

    fn append(&mut self, expr: Expression) -> Handle<Expression> {
        self.out.expressions.append(expr)
    }

    /// The literal bool value of an already-rewritten expression, if
    /// it reduced to one.
    fn literal_bool(&self, handle: Handle<Expression>) -> Option<bool> {
        match self.out.expressions[handle] {
            Expression::Constant(ConstantValue::Bool(b)) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arclight_ast::module_eq;
    use arclight_parser::parse;

    fn has_builtin(module: &Module, f: arclight_ast::BuiltInFunction) -> bool {
        fn expr_uses(module: &Module, block: &[Statement], f: arclight_ast::BuiltInFunction) -> bool {
            // Reachability through the root block is what matters here;
            // scan all statements' expressions transitively.
            fn walk(module: &Module, h: Handle<Expression>, f: arclight_ast::BuiltInFunction) -> bool {
                match &module.expressions[h] {
                    Expression::BuiltInCall { function, arguments } => {
                        *function == f || arguments.iter().any(|&a| walk(module, a, f))
                    }
                    Expression::AccessIndex { base, index } => {
                        walk(module, *base, f) || walk(module, *index, f)
                    }
                    Expression::AccessMember { base, .. } | Expression::Swizzle { base, .. } => {
                        walk(module, *base, f)
                    }
                    Expression::Assignment { target, value, .. } => {
                        walk(module, *target, f) || walk(module, *value, f)
                    }
                    Expression::Unary { operand, .. } => walk(module, *operand, f),
                    Expression::Binary { left, right, .. } => {
                        walk(module, *left, f) || walk(module, *right, f)
                    }
                    Expression::Call { arguments, .. } | Expression::Cast { arguments, .. } => {
                        arguments.iter().any(|&a| walk(module, a, f))
                    }
                    Expression::Ternary {
                        condition,
                        accept,
                        reject,
                    } => {
                        walk(module, *condition, f)
                            || walk(module, *accept, f)
                            || walk(module, *reject, f)
                    }
                    Expression::Constant(_) | Expression::Variable(_) => false,
                }
            }
            block.iter().any(|stmt| match stmt {
                Statement::Conditional {
                    condition,
                    accept,
                    reject,
                } => {
                    walk(module, *condition, f)
                        || expr_uses(module, accept, f)
                        || expr_uses(module, reject, f)
                }
                Statement::Expression(e) => walk(module, *e, f),
                Statement::Return { value: Some(v) } => walk(module, *v, f),
                Statement::VariableDeclaration { init: Some(i), .. } => walk(module, *i, f),
                Statement::FunctionDeclaration(func)
                | Statement::EntryFunctionDeclaration { function: func, .. } => {
                    expr_uses(module, &func.body, f)
                }
                Statement::Sequence(b) => expr_uses(module, b, f),
                Statement::While { condition, body } => {
                    walk(module, *condition, f) || expr_uses(module, body, f)
                }
                _ => false,
            })
        }
        expr_uses(module, &module.root, f)
    }

    const SCENARIO_A: &str = "\
option bool useTexture = false;
external(set = 0, binding = 0) sampler2Df colorMap;
input(fragment, location = 0) vec2f uv;
output(fragment, location = 0) vec4f color;
[fragment]
fn fsMain() {
    if (useTexture) {
        color = sample(colorMap, uv);
    } else {
        color = vec4f(0.0, 0.0, 0.0, 1.0);
    }
}
";

    #[test]
    fn default_false_keeps_only_else_branch() {
        let module = parse(SCENARIO_A).unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        assert!(!has_builtin(
            &specialized,
            arclight_ast::BuiltInFunction::Sample
        ));
        // The option declaration is resolved away.
        assert!(specialized.declaration("useTexture").is_none());
    }

    #[test]
    fn override_true_keeps_only_then_branch() {
        let module = parse(SCENARIO_A).unwrap();
        let options = OptionTable::new().with("useTexture", ConstantValue::Bool(true));
        let specialized = process(&module, &options).unwrap();
        assert!(has_builtin(
            &specialized,
            arclight_ast::BuiltInFunction::Sample
        ));
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let module = parse(SCENARIO_A).unwrap();
        let options = OptionTable::new().with("useTexture", ConstantValue::Bool(true));
        let once = process(&module, &options).unwrap();
        let twice = process(&once, &options).unwrap();
        assert!(module_eq(&once, &twice));
    }

    #[test]
    fn unresolved_option_preserves_conditional() {
        let source = "\
option bool fancy;
[fragment]
fn fsMain() {
    if (fancy) {
        return;
    }
}
";
        let module = parse(source).unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        // Declaration survives, conditional survives.
        assert!(specialized.declaration("fancy").is_some());
        let (_, f) = specialized.entry_functions().next().unwrap();
        assert!(matches!(f.body[0], Statement::Conditional { .. }));
    }

    #[test]
    fn constant_folding_reduces_literal_arithmetic() {
        let module = parse("option int N = 2;\nconst int doubled = N * 3 + 1;").unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        match specialized.declaration("doubled") {
            Some(Statement::ConstDeclaration { init, .. }) => {
                assert_eq!(
                    specialized.expressions[*init],
                    Expression::Constant(ConstantValue::Int(7))
                );
            }
            other => panic!("expected const declaration, got {other:?}"),
        }
    }

    #[test]
    fn short_circuit_skips_unresolvable_side() {
        let source = "\
option bool enabled = false;
option int level;
[fragment]
fn fsMain() {
    if (enabled && level > 2) {
        return;
    }
}
";
        let module = parse(source).unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        // `false && _` folds to false, so the conditional disappears
        // even though `level` is unresolved.
        let (_, f) = specialized.entry_functions().next().unwrap();
        assert!(f.body.is_empty());
    }

    #[test]
    fn division_by_zero_is_reported() {
        let module = parse("option int N = 0;\nconst int k = 4 / N;").unwrap();
        match process(&module, &OptionTable::new()) {
            Err(PreprocessError::DivisionByZero) => {}
            other => panic!("expected DivisionByZero, got {other:?}"),
        }
    }

    #[test]
    fn option_type_mismatch_is_reported() {
        let module = parse("option bool flag = false;").unwrap();
        let options = OptionTable::new().with("flag", ConstantValue::Int(1));
        match process(&module, &options) {
            Err(PreprocessError::OptionTypeMismatch { name }) => assert_eq!(name, "flag"),
            other => panic!("expected OptionTypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn option_sized_array_resolves() {
        let module = parse("option uint LIGHTS = 2u;\nexternal vec4f[LIGHTS] colors;").unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        match specialized.declaration("colors") {
            Some(Statement::ExternalDeclaration { ty, .. }) => {
                match &specialized.types[*ty].inner {
                    TypeInner::Array { size, .. } => {
                        assert_eq!(*size, ArraySize::Constant(2));
                    }
                    other => panic!("expected array, got {other:?}"),
                }
            }
            other => panic!("expected external, got {other:?}"),
        }
    }

    #[test]
    fn constant_ternary_is_reduced() {
        let module = parse("option bool hq = true;\nconst float k = hq ? 2.0 : 1.0;").unwrap();
        let specialized = process(&module, &OptionTable::new()).unwrap();
        match specialized.declaration("k") {
            Some(Statement::ConstDeclaration { init, .. }) => {
                assert_eq!(
                    specialized.expressions[*init],
                    Expression::Constant(ConstantValue::Float(2.0))
                );
            }
            other => panic!("expected const, got {other:?}"),
        }
    }

    #[test]
    fn input_module_is_untouched() {
        let module = parse(SCENARIO_A).unwrap();
        let before = arclight_ast::write_module(&module);
        let _ = process(&module, &OptionTable::new()).unwrap();
        assert_eq!(arclight_ast::write_module(&module), before);
    }

    #[test]
    fn matching_option_kind_is_accepted() {
        let module = parse("option uint N = 1u;").unwrap();
        let options = OptionTable::new().with("N", ConstantValue::UInt(5));
        assert!(process(&module, &options).is_ok());
    }
}
