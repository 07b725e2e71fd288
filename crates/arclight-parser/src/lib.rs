//! ATSL frontend: tokenizer, parser, and the shader library registry.
//!
//! The frontend is purely syntactic: it produces an
//! [`arclight_ast::Module`] and validates only well-formedness plus the
//! closed namespaces it owns (type names, built-in function names, user
//! function names). Type checking belongs to the downstream consumers.

mod lexer;
mod library;
mod parser;

pub use lexer::{tokenize, Keyword, LexError, Symbol, Token, TokenKind};
pub use library::{resolve_includes, LibraryRegistry};

use arclight_ast::Module;

/// Parse failures, with the offending position where available.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("expected {expected}, found {found} at {line}:{column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: u32,
        column: u32,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown type `{name}` at {line}:{column}")]
    UnknownType { name: String, line: u32, column: u32 },
    #[error("unknown function `{name}` at {line}:{column}")]
    UnknownFunction { name: String, line: u32, column: u32 },
    #[error("`{function}` expects {expected} argument(s), found {found} at {line}:{column}")]
    WrongArgumentCount {
        function: String,
        expected: usize,
        found: usize,
        line: u32,
        column: u32,
    },
    #[error("struct `{name}` redeclared at {line}:{column}")]
    DuplicateStruct { name: String, line: u32, column: u32 },
    #[error("invalid assignment target at {line}:{column}")]
    InvalidAssignmentTarget { line: u32, column: u32 },
    #[error("invalid swizzle pattern `{pattern}` at {line}:{column}")]
    InvalidSwizzle {
        pattern: String,
        line: u32,
        column: u32,
    },
    #[error("unknown shader library `{name}`")]
    UnknownLibrary { name: String },
    #[error("shader library include cycle through `{name}`")]
    IncludeCycle { name: String },
}

/// Tokenizes and parses ATSL source into a module.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    parse_tokens(&tokens)
}

/// Parses an already-tokenized stream.
pub fn parse_tokens(tokens: &[Token]) -> Result<Module, ParseError> {
    parser::Parser::new(tokens).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arclight_ast::{
        BinaryOp, Expression, Primitive, Stage, Statement, TypeInner, UnaryOp,
    };

    fn parse_ok(source: &str) -> Module {
        parse(source).unwrap_or_else(|e| panic!("parse failed: {e}\nsource:\n{source}"))
    }

    /// Digs the root expression out of a `const float k = <expr>;` module.
    fn const_init(module: &Module) -> &Expression {
        match &module.root[0] {
            Statement::ConstDeclaration { init, .. } => &module.expressions[*init],
            other => panic!("expected const declaration, got {other:?}"),
        }
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let m = parse_ok("const float k = 1.0 + 2.0 * 3.0;");
        match const_init(&m) {
            Expression::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(
                    m.expressions[*left],
                    Expression::Constant(arclight_ast::ConstantValue::Float(v)) if v == 1.0
                ));
                assert!(matches!(
                    m.expressions[*right],
                    Expression::Binary {
                        op: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected Add at root, got {other:?}"),
        }
    }

    #[test]
    fn precedence_comparison_over_logic() {
        // a < b && c < d must parse as (a < b) && (c < d).
        let m = parse_ok("const bool k = 1 < 2 && 3 < 4;");
        match const_init(&m) {
            Expression::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::LogicalAnd);
                assert!(matches!(
                    m.expressions[*left],
                    Expression::Binary {
                        op: BinaryOp::Less,
                        ..
                    }
                ));
                assert!(matches!(
                    m.expressions[*right],
                    Expression::Binary {
                        op: BinaryOp::Less,
                        ..
                    }
                ));
            }
            other => panic!("expected LogicalAnd at root, got {other:?}"),
        }
    }

    #[test]
    fn left_associativity() {
        // 1 - 2 - 3 parses as (1 - 2) - 3.
        let m = parse_ok("const int k = 1 - 2 - 3;");
        match const_init(&m) {
            Expression::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Subtract);
                assert!(matches!(
                    m.expressions[*left],
                    Expression::Binary {
                        op: BinaryOp::Subtract,
                        ..
                    }
                ));
            }
            other => panic!("expected Subtract at root, got {other:?}"),
        }
    }

    #[test]
    fn ternary_is_right_associative() {
        let m = parse_ok("const int k = true ? 1 : false ? 2 : 3;");
        match const_init(&m) {
            Expression::Ternary { reject, .. } => {
                assert!(matches!(
                    m.expressions[*reject],
                    Expression::Ternary { .. }
                ));
            }
            other => panic!("expected Ternary at root, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let m = parse_ok("const int k = -1 * 2;");
        match const_init(&m) {
            Expression::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Multiply);
                assert!(matches!(
                    m.expressions[*left],
                    Expression::Unary {
                        op: UnaryOp::Negate,
                        ..
                    }
                ));
            }
            other => panic!("expected Multiply at root, got {other:?}"),
        }
    }

    #[test]
    fn struct_and_entry_function() {
        let m = parse_ok(
            "struct Light { vec3f direction; float intensity; }\n\
             external(set = 0, binding = 0) Light mainLight;\n\
             [fragment]\n\
             fn fsMain() { return; }",
        );
        assert!(matches!(m.root[0], Statement::StructDeclaration { .. }));
        match &m.root[1] {
            Statement::ExternalDeclaration { set, binding, ty, .. } => {
                assert_eq!((*set, *binding), (Some(0), Some(0)));
                assert!(matches!(
                    m.types[*ty].inner,
                    TypeInner::Struct { .. }
                ));
            }
            other => panic!("expected external, got {other:?}"),
        }
        match &m.root[2] {
            Statement::EntryFunctionDeclaration { stage, function } => {
                assert_eq!(*stage, Stage::Fragment);
                assert_eq!(function.name, "fsMain");
            }
            other => panic!("expected entry function, got {other:?}"),
        }
    }

    #[test]
    fn forward_function_reference() {
        let m = parse_ok(
            "fn caller() -> float { return callee(); }\n\
             fn callee() -> float { return 1.0; }",
        );
        assert_eq!(m.root.len(), 2);
    }

    #[test]
    fn unknown_function_is_rejected() {
        match parse("fn f() { texelFetch(1); }") {
            Err(ParseError::UnknownFunction { name, .. }) => assert_eq!(name, "texelFetch"),
            other => panic!("expected UnknownFunction, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        match parse("fn f() { quaternion q; }") {
            // `quaternion` is not a type, so this parses as an expression
            // statement and fails on the following identifier.
            Err(ParseError::UnexpectedToken { .. }) => {}
            other => panic!("expected UnexpectedToken, got {other:?}"),
        }
        match parse("const dmat4 k = 1;") {
            Err(ParseError::UnknownType { name, .. }) => assert_eq!(name, "dmat4"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn builtin_arity_is_checked() {
        match parse("fn f() -> float { return dot(1.0); }") {
            Err(ParseError::WrongArgumentCount {
                function, found, ..
            }) => {
                assert_eq!(function, "dot");
                assert_eq!(found, 1);
            }
            other => panic!("expected WrongArgumentCount, got {other:?}"),
        }
    }

    #[test]
    fn swizzle_vs_member_access() {
        let m = parse_ok("fn f(vec4f v) -> float { return v.xyz.x + v.length2; }");
        // The tree contains one Swizzle chain and one AccessMember.
        let mut swizzles = 0;
        let mut members = 0;
        for (_, e) in m.expressions.iter() {
            match e {
                Expression::Swizzle { .. } => swizzles += 1,
                Expression::AccessMember { .. } => members += 1,
                _ => {}
            }
        }
        assert_eq!(swizzles, 2); // .xyz then .x
        assert_eq!(members, 1); // .length2
    }

    #[test]
    fn swizzle_is_not_assignable() {
        match parse("fn f(vec4f v) { v.xy = v.zw; }") {
            Err(ParseError::InvalidAssignmentTarget { .. }) => {}
            other => panic!("expected InvalidAssignmentTarget, got {other:?}"),
        }
    }

    #[test]
    fn option_sized_array() {
        let m = parse_ok("option uint LIGHTS = 4u;\nexternal vec4f[LIGHTS] lightColors;");
        match &m.root[1] {
            Statement::ExternalDeclaration { ty, .. } => match &m.types[*ty].inner {
                TypeInner::Array { size, .. } => {
                    assert_eq!(*size, arclight_ast::ArraySize::Option("LIGHTS".into()));
                }
                other => panic!("expected array, got {other:?}"),
            },
            other => panic!("expected external, got {other:?}"),
        }
    }

    #[test]
    fn for_loop_with_declaration_init() {
        let m = parse_ok("fn f() { for (int i = 0; i < 4; i++) { continue; } }");
        let f = m.function("f").unwrap();
        match &f.body[0] {
            Statement::For {
                init: Some(init),
                condition: Some(_),
                step: Some(_),
                body,
            } => {
                assert!(matches!(**init, Statement::VariableDeclaration { .. }));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn dangling_else_attaches_to_nearest_if() {
        let m = parse_ok("fn f(bool a, bool b) { if (a) if (b) return; else return; }");
        let f = m.function("f").unwrap();
        match &f.body[0] {
            Statement::Conditional { accept, reject, .. } => {
                assert!(reject.is_empty());
                match &accept[0] {
                    Statement::Conditional { reject, .. } => assert_eq!(reject.len(), 1),
                    other => panic!("expected nested if, got {other:?}"),
                }
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn vector_constructor_is_a_cast() {
        let m = parse_ok("const vec4f k = vec4f(0.0, 0.0, 0.0, 1.0);");
        match const_init(&m) {
            Expression::Cast { ty, arguments } => {
                assert_eq!(arguments.len(), 4);
                assert!(matches!(
                    m.types[*ty].inner,
                    TypeInner::Vector {
                        scalar: Primitive::Float,
                        ..
                    }
                ));
            }
            other => panic!("expected Cast, got {other:?}"),
        }
    }

    #[test]
    fn primitive_scalar_sizes() {
        assert_eq!(Primitive::Float.size(), 4);
        assert_eq!(Primitive::Bool.size(), 4);
    }
}
