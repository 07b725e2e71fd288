//! Stage extraction: prune a shared module down to one stage.
//!
//! Starting from the stage's entry function, the extractor transitively
//! marks called functions, referenced declarations, and the struct and
//! option names their types mention, then rebuilds a module containing
//! only the marked declarations in their original order. Declarations
//! tagged for the other stage are always dropped.

use std::collections::HashSet;

use arclight_ast::{
    rewrite, ArraySize, Expression, Function, Handle, Module, Stage, Statement, Type, TypeInner,
};

use crate::ReflectError;

/// Extracts the subset of `module` reachable from `stage`'s entry
/// function.
pub fn extract_stage(module: &Module, stage: Stage) -> Result<Module, ReflectError> {
    let mut entries = module
        .root
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::EntryFunctionDeclaration {
                stage: s,
                function,
            } if *s == stage => Some(function),
            _ => None,
        });
    let entry = entries
        .next()
        .ok_or(ReflectError::MissingEntryPoint { stage })?;
    if let Some(second) = entries.next() {
        return Err(ReflectError::DuplicateEntryPoint {
            stage,
            name: second.name.clone(),
        });
    }

    let marks = mark_reachable(module, entry);

    let mut out = Module::new();
    for stmt in &module.root {
        let keep = match stmt {
            Statement::StructDeclaration { name, .. } => marks.types.contains(name),
            Statement::ConstDeclaration { name, .. }
            | Statement::ExternalDeclaration { name, .. }
            | Statement::OptionDeclaration { name, .. } => marks.names.contains(name),
            Statement::InputDeclaration { stage: s, name, .. }
            | Statement::OutputDeclaration { stage: s, name, .. } => {
                *s == stage && marks.names.contains(name)
            }
            Statement::FunctionDeclaration(f) => marks.functions.contains(&f.name),
            Statement::EntryFunctionDeclaration { stage: s, .. } => *s == stage,
            // Includes should have been resolved before extraction; keep
            // any stragglers so the error surfaces downstream.
            Statement::Include { .. } => true,
            _ => true,
        };
        if keep {
            let copied = rewrite::copy_statement(module, &mut out, stmt);
            out.root.push(copied);
        }
    }
    Ok(out)
}

struct Marks {
    /// Referenced value declarations (consts, externals, options, I/O).
    names: HashSet<String>,
    /// Reachable helper functions.
    functions: HashSet<String>,
    /// Referenced struct type names.
    types: HashSet<String>,
}

/// Worklist walk to a fixpoint: function calls pull in bodies, value
/// references pull in declarations, declarations pull in their types
/// and initializers, and option-sized arrays pull in the option.
fn mark_reachable(module: &Module, entry: &Function) -> Marks {
    let mut marks = Marks {
        names: HashSet::new(),
        functions: HashSet::new(),
        types: HashSet::new(),
    };

    collect_function(module, entry, &mut marks);

    loop {
        let mut changed = false;
        for stmt in &module.root {
            match stmt {
                Statement::FunctionDeclaration(f)
                    if marks.functions.contains(&f.name) && !f.body.is_empty() =>
                {
                    // Re-walking is idempotent; `changed` tracks set growth.
                    let before = totals(&marks);
                    collect_function(module, f, &mut marks);
                    changed |= totals(&marks) != before;
                }
                Statement::ConstDeclaration { name, ty, init }
                    if marks.names.contains(name) =>
                {
                    let before = totals(&marks);
                    collect_type(module, *ty, &mut marks);
                    collect_expression(module, *init, &mut marks);
                    changed |= totals(&marks) != before;
                }
                Statement::OptionDeclaration { name, ty, default }
                    if marks.names.contains(name) =>
                {
                    let before = totals(&marks);
                    collect_type(module, *ty, &mut marks);
                    if let Some(d) = default {
                        collect_expression(module, *d, &mut marks);
                    }
                    changed |= totals(&marks) != before;
                }
                Statement::ExternalDeclaration { name, ty, .. }
                | Statement::InputDeclaration { name, ty, .. }
                | Statement::OutputDeclaration { name, ty, .. }
                    if marks.names.contains(name) =>
                {
                    let before = totals(&marks);
                    collect_type(module, *ty, &mut marks);
                    changed |= totals(&marks) != before;
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }

    marks
}

fn totals(marks: &Marks) -> (usize, usize, usize) {
    (marks.names.len(), marks.functions.len(), marks.types.len())
}

fn collect_function(module: &Module, f: &Function, marks: &mut Marks) {
    for p in &f.parameters {
        collect_type(module, p.ty, marks);
    }
    if let Some(result) = f.result {
        collect_type(module, result, marks);
    }
    collect_block(module, &f.body, marks);
}

fn collect_block(module: &Module, block: &[Statement], marks: &mut Marks) {
    for stmt in block {
        match stmt {
            Statement::Conditional {
                condition,
                accept,
                reject,
            } => {
                collect_expression(module, *condition, marks);
                collect_block(module, accept, marks);
                collect_block(module, reject, marks);
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    collect_block(module, std::slice::from_ref(init.as_ref()), marks);
                }
                if let Some(c) = condition {
                    collect_expression(module, *c, marks);
                }
                if let Some(s) = step {
                    collect_expression(module, *s, marks);
                }
                collect_block(module, body, marks);
            }
            Statement::While { condition, body } => {
                collect_expression(module, *condition, marks);
                collect_block(module, body, marks);
            }
            Statement::DoWhile { body, condition } => {
                collect_block(module, body, marks);
                collect_expression(module, *condition, marks);
            }
            Statement::VariableDeclaration { ty, init, .. } => {
                collect_type(module, *ty, marks);
                if let Some(init) = init {
                    collect_expression(module, *init, marks);
                }
            }
            Statement::Expression(e) => collect_expression(module, *e, marks),
            Statement::Return { value } => {
                if let Some(v) = value {
                    collect_expression(module, *v, marks);
                }
            }
            Statement::Sequence(b) => collect_block(module, b, marks),
            Statement::Break | Statement::Continue => {}
            // Declarations do not occur inside function bodies.
            _ => {}
        }
    }
}

fn collect_expression(module: &Module, handle: Handle<Expression>, marks: &mut Marks) {
    match &module.expressions[handle] {
        Expression::Constant(_) => {}
        Expression::Variable(name) => {
            marks.names.insert(name.clone());
        }
        Expression::AccessIndex { base, index } => {
            collect_expression(module, *base, marks);
            collect_expression(module, *index, marks);
        }
        Expression::AccessMember { base, .. } | Expression::Swizzle { base, .. } => {
            collect_expression(module, *base, marks);
        }
        Expression::Assignment { target, value, .. } => {
            collect_expression(module, *target, marks);
            collect_expression(module, *value, marks);
        }
        Expression::Unary { operand, .. } => collect_expression(module, *operand, marks),
        Expression::Binary { left, right, .. } => {
            collect_expression(module, *left, marks);
            collect_expression(module, *right, marks);
        }
        Expression::Call {
            function,
            arguments,
        } => {
            marks.functions.insert(function.clone());
            for &a in arguments {
                collect_expression(module, a, marks);
            }
        }
        Expression::BuiltInCall { arguments, .. } => {
            for &a in arguments {
                collect_expression(module, a, marks);
            }
        }
        Expression::Cast { ty, arguments } => {
            collect_type(module, *ty, marks);
            for &a in arguments {
                collect_expression(module, a, marks);
            }
        }
        Expression::Ternary {
            condition,
            accept,
            reject,
        } => {
            collect_expression(module, *condition, marks);
            collect_expression(module, *accept, marks);
            collect_expression(module, *reject, marks);
        }
    }
}

fn collect_type(module: &Module, handle: Handle<Type>, marks: &mut Marks) {
    let ty = &module.types[handle];
    match &ty.inner {
        TypeInner::Struct { members } => {
            if let Some(name) = &ty.name {
                marks.types.insert(name.clone());
            }
            for m in members {
                collect_type(module, m.ty, marks);
            }
        }
        TypeInner::Array { base, size } => {
            collect_type(module, *base, marks);
            if let ArraySize::Option(name) = size {
                marks.names.insert(name.clone());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arclight_parser::parse;

    const TWO_STAGE: &str = "\
struct Camera { mat4f viewProj; }
struct Unused { float pad; }
external(set = 0, binding = 0) Camera camera;
external(set = 0, binding = 1) sampler2Df colorMap;
const float scale = 2.0;
input(vertex, location = 0) vec3f position;
input(fragment, location = 0) vec2f uv;
output(vertex, location = 0) vec2f vsUv;
output(fragment, location = 0) vec4f color;
fn scaled(vec3f p) -> vec4f {
    return vec4f(p * scale, 1.0);
}
fn orphan() -> float {
    return 0.0;
}
[vertex]
fn vsMain() {
    setVertexPosition(camera.viewProj * scaled(position));
}
[fragment]
fn fsMain() {
    color = sample(colorMap, uv);
}
";

    #[test]
    fn vertex_extraction_prunes_fragment_declarations() {
        let module = parse(TWO_STAGE).unwrap();
        let vs = extract_stage(&module, Stage::Vertex).unwrap();
        let names: Vec<_> = vs.root.iter().filter_map(|s| s.declared_name()).collect();
        assert!(names.contains(&"camera"));
        assert!(names.contains(&"Camera"));
        assert!(names.contains(&"position"));
        assert!(names.contains(&"scaled"));
        assert!(names.contains(&"scale"), "const reached through scaled()");
        assert!(names.contains(&"vsMain"));
        assert!(!names.contains(&"colorMap"));
        assert!(!names.contains(&"uv"));
        assert!(!names.contains(&"color"));
        assert!(!names.contains(&"orphan"));
        assert!(!names.contains(&"Unused"));
        assert!(!names.contains(&"fsMain"));
    }

    #[test]
    fn fragment_extraction_keeps_sampler() {
        let module = parse(TWO_STAGE).unwrap();
        let fs = extract_stage(&module, Stage::Fragment).unwrap();
        let names: Vec<_> = fs.root.iter().filter_map(|s| s.declared_name()).collect();
        assert!(names.contains(&"colorMap"));
        assert!(names.contains(&"uv"));
        assert!(names.contains(&"color"));
        assert!(!names.contains(&"camera"));
        assert!(!names.contains(&"position"));
    }

    #[test]
    fn missing_entry_point_errors() {
        let module = parse("const float k = 1.0;").unwrap();
        match extract_stage(&module, Stage::Vertex) {
            Err(ReflectError::MissingEntryPoint { stage }) => assert_eq!(stage, Stage::Vertex),
            other => panic!("expected MissingEntryPoint, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_entry_point_errors() {
        let module = parse(
            "[vertex]\nfn a() { }\n[vertex]\nfn b() { }",
        )
        .unwrap();
        match extract_stage(&module, Stage::Vertex) {
            Err(ReflectError::DuplicateEntryPoint { name, .. }) => assert_eq!(name, "b"),
            other => panic!("expected DuplicateEntryPoint, got {other:?}"),
        }
    }

    #[test]
    fn option_sized_array_retains_option() {
        let module = parse(
            "option uint LIGHTS = 4u;\n\
             external(set = 0, binding = 0) vec4f[LIGHTS] lightColors;\n\
             output(fragment, location = 0) vec4f color;\n\
             [fragment]\n\
             fn fsMain() { color = lightColors[0]; }",
        )
        .unwrap();
        let fs = extract_stage(&module, Stage::Fragment).unwrap();
        assert!(fs.declaration("LIGHTS").is_some());
        assert!(fs.declaration("lightColors").is_some());
    }

    #[test]
    fn extraction_preserves_declaration_order() {
        let module = parse(TWO_STAGE).unwrap();
        let vs = extract_stage(&module, Stage::Vertex).unwrap();
        let names: Vec<_> = vs.root.iter().filter_map(|s| s.declared_name()).collect();
        let camera = names.iter().position(|&n| n == "camera").unwrap();
        let position = names.iter().position(|&n| n == "position").unwrap();
        let scaled = names.iter().position(|&n| n == "scaled").unwrap();
        assert!(camera < position && position < scaled);
    }
}
