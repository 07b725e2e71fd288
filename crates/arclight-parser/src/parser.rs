//! Recursive-descent parser for ATSL.
//!
//! Statements are parsed by straightforward descent over the grammar;
//! expressions use precedence climbing with the ladder documented on
//! [`BinaryOp::precedence`]. The parser validates syntactic
//! well-formedness only — no type checking — but it does resolve the
//! closed namespaces it owns: type names, built-in function names, and
//! user function names (collected in a pre-scan so forward references
//! parse).

use std::collections::{HashMap, HashSet};

use arclight_ast::{
    ArraySize, AssignOp, BinaryOp, Block, BuiltInFunction, ConstantValue, Expression, Function,
    FunctionParameter, Handle, ImageKind, Module, Primitive, Stage, Statement, StructMember,
    SwizzleComponent, Type, TypeInner, UnaryOp, VectorSize,
};

use crate::lexer::{Keyword, Symbol, Token, TokenKind};
use crate::ParseError;

pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    module: Module,
    struct_types: HashMap<String, Handle<Type>>,
    function_names: HashSet<String>,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        // Pre-scan function names so calls may precede declarations.
        let mut function_names = HashSet::new();
        for pair in tokens.windows(2) {
            if let [Token {
                kind: TokenKind::Keyword(Keyword::Fn),
                ..
            }, Token {
                kind: TokenKind::Identifier(name),
                ..
            }] = pair
            {
                function_names.insert(name.clone());
            }
        }
        Self {
            tokens,
            pos: 0,
            module: Module::new(),
            struct_types: HashMap::new(),
            function_names,
        }
    }

    pub(crate) fn parse_module(mut self) -> Result<Module, ParseError> {
        while self.pos < self.tokens.len() {
            let stmt = self.parse_top_level()?;
            self.module.root.push(stmt);
        }
        Ok(self.module)
    }

    // --- token plumbing ---

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn position(&self) -> (u32, u32) {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0))
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: token.kind.to_string(),
            line: token.line,
            column: token.column,
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol, expected: &str) -> Result<(), ParseError> {
        let token = self.next()?;
        if token.kind == TokenKind::Symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&token, expected))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, expected: &str) -> Result<(), ParseError> {
        let token = self.next()?;
        if token.kind == TokenKind::Keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&token, expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(self.unexpected(&token, expected)),
        }
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.peek() == Some(&TokenKind::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // --- types ---

    fn builtin_type_inner(name: &str) -> Option<TypeInner> {
        match name {
            "void" => return Some(TypeInner::Void),
            "bool" => return Some(TypeInner::Scalar(Primitive::Bool)),
            "int" => return Some(TypeInner::Scalar(Primitive::Int)),
            "uint" => return Some(TypeInner::Scalar(Primitive::UInt)),
            "float" => return Some(TypeInner::Scalar(Primitive::Float)),
            _ => {}
        }
        if let Some(rest) = name.strip_prefix("vec") {
            let mut chars = rest.chars();
            let size = chars.next()?.to_digit(10).and_then(VectorSize::from_count)?;
            let scalar = Self::suffix_primitive(chars.as_str())?;
            return Some(TypeInner::Vector { size, scalar });
        }
        if let Some(rest) = name.strip_prefix("mat") {
            let mut chars = rest.chars();
            let size = chars.next()?.to_digit(10).and_then(VectorSize::from_count)?;
            if chars.as_str() != "f" {
                return None;
            }
            return Some(TypeInner::Matrix {
                columns: size,
                rows: size,
                scalar: Primitive::Float,
            });
        }
        if let Some(rest) = name.strip_prefix("sampler") {
            for (tag, image) in [
                ("1D", ImageKind::Image1D),
                ("2D", ImageKind::Image2D),
                ("3D", ImageKind::Image3D),
                ("Cube", ImageKind::Cubemap),
            ] {
                if let Some(suffix) = rest.strip_prefix(tag) {
                    let scalar = Self::suffix_primitive(suffix)?;
                    return Some(TypeInner::Sampler { image, scalar });
                }
            }
        }
        None
    }

    fn suffix_primitive(suffix: &str) -> Option<Primitive> {
        match suffix {
            "f" => Some(Primitive::Float),
            "i" => Some(Primitive::Int),
            "u" => Some(Primitive::UInt),
            "b" => Some(Primitive::Bool),
            _ => None,
        }
    }

    fn lookup_type(&mut self, name: &str) -> Option<Handle<Type>> {
        if let Some(&handle) = self.struct_types.get(name) {
            return Some(handle);
        }
        let inner = Self::builtin_type_inner(name)?;
        Some(self.module.types.insert(Type { name: None, inner }))
    }

    fn is_type_name(&self, name: &str) -> bool {
        self.struct_types.contains_key(name) || Self::builtin_type_inner(name).is_some()
    }

    /// Parses a type name plus optional array suffix.
    fn parse_type(&mut self) -> Result<Handle<Type>, ParseError> {
        let token = self.next()?;
        let name = match &token.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return Err(self.unexpected(&token, "a type name")),
        };
        let base = self.lookup_type(&name).ok_or(ParseError::UnknownType {
            name: name.clone(),
            line: token.line,
            column: token.column,
        })?;

        if !self.eat_symbol(Symbol::LBracket) {
            return Ok(base);
        }
        let size = match self.peek().cloned() {
            Some(TokenKind::Symbol(Symbol::RBracket)) => ArraySize::Implicit,
            Some(TokenKind::Int(n)) if n > 0 => {
                self.pos += 1;
                ArraySize::Constant(n as u32)
            }
            Some(TokenKind::UInt(n)) => {
                self.pos += 1;
                ArraySize::Constant(n)
            }
            Some(TokenKind::Identifier(opt)) => {
                self.pos += 1;
                ArraySize::Option(opt)
            }
            _ => {
                let token = self.next()?;
                return Err(self.unexpected(&token, "an array length"));
            }
        };
        self.expect_symbol(Symbol::RBracket, "`]`")?;
        Ok(self.module.types.insert(Type {
            name: None,
            inner: TypeInner::Array { base, size },
        }))
    }

    // --- top-level declarations ---

    fn parse_top_level(&mut self) -> Result<Statement, ParseError> {
        let token = self.next()?;
        match &token.kind {
            TokenKind::Keyword(Keyword::Include) => {
                self.expect_symbol(Symbol::Less, "`<`")?;
                let library = self.expect_identifier("a library name")?;
                self.expect_symbol(Symbol::Greater, "`>`")?;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::Include { library })
            }
            TokenKind::Keyword(Keyword::Option) => {
                let ty = self.parse_type()?;
                let name = self.expect_identifier("an option name")?;
                let default = if self.eat_symbol(Symbol::Assign) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::OptionDeclaration { name, ty, default })
            }
            TokenKind::Keyword(Keyword::Const) => {
                let ty = self.parse_type()?;
                let name = self.expect_identifier("a constant name")?;
                self.expect_symbol(Symbol::Assign, "`=`")?;
                let init = self.parse_expression()?;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::ConstDeclaration { name, ty, init })
            }
            TokenKind::Keyword(Keyword::Struct) => self.parse_struct(),
            TokenKind::Keyword(Keyword::External) => self.parse_external(),
            TokenKind::Keyword(Keyword::Input) => self.parse_io(true),
            TokenKind::Keyword(Keyword::Output) => self.parse_io(false),
            TokenKind::Keyword(Keyword::Fn) => {
                Ok(Statement::FunctionDeclaration(self.parse_function()?))
            }
            TokenKind::Symbol(Symbol::LBracket) => {
                let stage_token = self.next()?;
                let stage = match stage_token.kind {
                    TokenKind::Keyword(Keyword::Vertex) => Stage::Vertex,
                    TokenKind::Keyword(Keyword::Fragment) => Stage::Fragment,
                    _ => return Err(self.unexpected(&stage_token, "`vertex` or `fragment`")),
                };
                self.expect_symbol(Symbol::RBracket, "`]`")?;
                self.expect_keyword(Keyword::Fn, "`fn`")?;
                let function = self.parse_function()?;
                Ok(Statement::EntryFunctionDeclaration { stage, function })
            }
            _ => Err(self.unexpected(&token, "a declaration")),
        }
    }

    fn parse_struct(&mut self) -> Result<Statement, ParseError> {
        let name_token = self.next()?;
        let name = match &name_token.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return Err(self.unexpected(&name_token, "a struct name")),
        };
        if self.struct_types.contains_key(&name) || Self::builtin_type_inner(&name).is_some() {
            return Err(ParseError::DuplicateStruct {
                name,
                line: name_token.line,
                column: name_token.column,
            });
        }
        self.expect_symbol(Symbol::LBrace, "`{`")?;
        let mut members = Vec::new();
        while !self.eat_symbol(Symbol::RBrace) {
            let ty = self.parse_type()?;
            let member = self.expect_identifier("a member name")?;
            self.expect_symbol(Symbol::Semicolon, "`;`")?;
            members.push(StructMember { name: member, ty });
        }
        let ty = self.module.types.insert(Type {
            name: Some(name.clone()),
            inner: TypeInner::Struct { members },
        });
        self.struct_types.insert(name.clone(), ty);
        Ok(Statement::StructDeclaration { name, ty })
    }

    fn parse_external(&mut self) -> Result<Statement, ParseError> {
        let (mut set, mut binding) = (None, None);
        if self.eat_symbol(Symbol::LParen) {
            loop {
                let key = self.expect_identifier("`set` or `binding`")?;
                self.expect_symbol(Symbol::Assign, "`=`")?;
                let value = self.parse_index_literal()?;
                match key.as_str() {
                    "set" => set = Some(value),
                    "binding" => binding = Some(value),
                    _ => {
                        let (line, column) = self.position();
                        return Err(ParseError::UnexpectedToken {
                            expected: "`set` or `binding`".into(),
                            found: format!("identifier `{key}`"),
                            line,
                            column,
                        });
                    }
                }
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            self.expect_symbol(Symbol::RParen, "`)`")?;
        }
        let ty = self.parse_type()?;
        let name = self.expect_identifier("an external name")?;
        self.expect_symbol(Symbol::Semicolon, "`;`")?;
        Ok(Statement::ExternalDeclaration {
            name,
            ty,
            // An explicit binding with no set defaults to set 0; the
            // reflector treats both-None as "assign for me".
            set: set.or(if binding.is_some() { Some(0) } else { None }),
            binding,
        })
    }

    fn parse_io(&mut self, is_input: bool) -> Result<Statement, ParseError> {
        self.expect_symbol(Symbol::LParen, "`(`")?;
        let stage_token = self.next()?;
        let stage = match stage_token.kind {
            TokenKind::Keyword(Keyword::Vertex) => Stage::Vertex,
            TokenKind::Keyword(Keyword::Fragment) => Stage::Fragment,
            _ => return Err(self.unexpected(&stage_token, "`vertex` or `fragment`")),
        };
        let mut location = None;
        if self.eat_symbol(Symbol::Comma) {
            let key = self.expect_identifier("`location`")?;
            if key != "location" {
                let (line, column) = self.position();
                return Err(ParseError::UnexpectedToken {
                    expected: "`location`".into(),
                    found: format!("identifier `{key}`"),
                    line,
                    column,
                });
            }
            self.expect_symbol(Symbol::Assign, "`=`")?;
            location = Some(self.parse_index_literal()?);
        }
        self.expect_symbol(Symbol::RParen, "`)`")?;
        let ty = self.parse_type()?;
        let name = self.expect_identifier("a name")?;
        self.expect_symbol(Symbol::Semicolon, "`;`")?;
        Ok(if is_input {
            Statement::InputDeclaration {
                stage,
                name,
                ty,
                location,
            }
        } else {
            Statement::OutputDeclaration {
                stage,
                name,
                ty,
                location,
            }
        })
    }

    fn parse_index_literal(&mut self) -> Result<u32, ParseError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Int(v) if v >= 0 => Ok(v as u32),
            TokenKind::UInt(v) => Ok(v),
            _ => Err(self.unexpected(&token, "a non-negative integer")),
        }
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let name = self.expect_identifier("a function name")?;
        self.expect_symbol(Symbol::LParen, "`(`")?;
        let mut parameters = Vec::new();
        if !self.eat_symbol(Symbol::RParen) {
            loop {
                let ty = self.parse_type()?;
                let pname = self.expect_identifier("a parameter name")?;
                parameters.push(FunctionParameter { name: pname, ty });
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            self.expect_symbol(Symbol::RParen, "`)`")?;
        }
        let result = if self.eat_symbol(Symbol::Arrow) {
            let ty = self.parse_type()?;
            if matches!(self.module.types[ty].inner, TypeInner::Void) {
                None
            } else {
                Some(ty)
            }
        } else {
            None
        };
        self.expect_symbol(Symbol::LBrace, "`{`")?;
        let body = self.parse_block()?;
        Ok(Function {
            name,
            parameters,
            result,
            body,
        })
    }

    // --- statements ---

    /// Parses statements until the closing `}` (consumed).
    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let mut block = Vec::new();
        while !self.eat_symbol(Symbol::RBrace) {
            if self.pos >= self.tokens.len() {
                return Err(ParseError::UnexpectedEof);
            }
            block.push(self.parse_statement()?);
        }
        Ok(block)
    }

    /// Parses a single statement or braced block (as `Sequence`).
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            Some(TokenKind::Symbol(Symbol::LBrace)) => {
                self.pos += 1;
                Ok(Statement::Sequence(self.parse_block()?))
            }
            Some(TokenKind::Keyword(Keyword::If)) => self.parse_if(),
            Some(TokenKind::Keyword(Keyword::While)) => {
                self.pos += 1;
                self.expect_symbol(Symbol::LParen, "`(`")?;
                let condition = self.parse_expression()?;
                self.expect_symbol(Symbol::RParen, "`)`")?;
                let body = self.parse_branch()?;
                Ok(Statement::While { condition, body })
            }
            Some(TokenKind::Keyword(Keyword::Do)) => {
                self.pos += 1;
                let body = self.parse_branch()?;
                self.expect_keyword(Keyword::While, "`while`")?;
                self.expect_symbol(Symbol::LParen, "`(`")?;
                let condition = self.parse_expression()?;
                self.expect_symbol(Symbol::RParen, "`)`")?;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::DoWhile { body, condition })
            }
            Some(TokenKind::Keyword(Keyword::For)) => self.parse_for(),
            Some(TokenKind::Keyword(Keyword::Break)) => {
                self.pos += 1;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::Break)
            }
            Some(TokenKind::Keyword(Keyword::Continue)) => {
                self.pos += 1;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::Continue)
            }
            Some(TokenKind::Keyword(Keyword::Return)) => {
                self.pos += 1;
                let value = if self.peek() == Some(&TokenKind::Symbol(Symbol::Semicolon)) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(Statement::Return { value })
            }
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.expect_symbol(Symbol::Semicolon, "`;`")?;
                Ok(stmt)
            }
        }
    }

    /// A variable declaration or expression statement, without the
    /// trailing semicolon (shared with `for` initializers).
    fn parse_simple_statement(&mut self) -> Result<Statement, ParseError> {
        // A type name followed by an identifier is a declaration; a type
        // name followed by `(` is a constructor expression.
        if let Some(TokenKind::Identifier(name)) = self.peek() {
            let is_decl = self.is_type_name(name)
                && matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.kind),
                    Some(TokenKind::Identifier(_)) | Some(TokenKind::Symbol(Symbol::LBracket))
                );
            if is_decl {
                let ty = self.parse_type()?;
                let vname = self.expect_identifier("a variable name")?;
                let init = if self.eat_symbol(Symbol::Assign) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                return Ok(Statement::VariableDeclaration {
                    name: vname,
                    ty,
                    init,
                });
            }
        }
        let expr = self.parse_expression()?;
        Ok(Statement::Expression(expr))
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::If, "`if`")?;
        self.expect_symbol(Symbol::LParen, "`(`")?;
        let condition = self.parse_expression()?;
        self.expect_symbol(Symbol::RParen, "`)`")?;
        let accept = self.parse_branch()?;
        let reject = if self.peek() == Some(&TokenKind::Keyword(Keyword::Else)) {
            self.pos += 1;
            if self.peek() == Some(&TokenKind::Keyword(Keyword::If)) {
                vec![self.parse_if()?]
            } else {
                self.parse_branch()?
            }
        } else {
            Vec::new()
        };
        Ok(Statement::Conditional {
            condition,
            accept,
            reject,
        })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::For, "`for`")?;
        self.expect_symbol(Symbol::LParen, "`(`")?;
        let init = if self.eat_symbol(Symbol::Semicolon) {
            None
        } else {
            let stmt = self.parse_simple_statement()?;
            self.expect_symbol(Symbol::Semicolon, "`;`")?;
            Some(Box::new(stmt))
        };
        let condition = if self.peek() == Some(&TokenKind::Symbol(Symbol::Semicolon)) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_symbol(Symbol::Semicolon, "`;`")?;
        let step = if self.peek() == Some(&TokenKind::Symbol(Symbol::RParen)) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_symbol(Symbol::RParen, "`)`")?;
        let body = self.parse_branch()?;
        Ok(Statement::For {
            init,
            condition,
            step,
            body,
        })
    }

    /// A loop/conditional body: either a braced block or a single
    /// statement promoted to a one-element block.
    fn parse_branch(&mut self) -> Result<Block, ParseError> {
        if self.eat_symbol(Symbol::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    // --- expressions ---

    fn parse_expression(&mut self) -> Result<Handle<Expression>, ParseError> {
        let target = self.parse_ternary()?;
        let op = match self.peek() {
            Some(TokenKind::Symbol(Symbol::Assign)) => AssignOp::Assign,
            Some(TokenKind::Symbol(Symbol::PlusAssign)) => AssignOp::AddAssign,
            Some(TokenKind::Symbol(Symbol::MinusAssign)) => AssignOp::SubAssign,
            Some(TokenKind::Symbol(Symbol::StarAssign)) => AssignOp::MulAssign,
            Some(TokenKind::Symbol(Symbol::SlashAssign)) => AssignOp::DivAssign,
            Some(TokenKind::Symbol(Symbol::PercentAssign)) => AssignOp::ModAssign,
            _ => return Ok(target),
        };
        let (line, column) = self.position();
        if !matches!(
            self.module.expressions[target],
            Expression::Variable(_)
                | Expression::AccessIndex { .. }
                | Expression::AccessMember { .. }
        ) {
            return Err(ParseError::InvalidAssignmentTarget { line, column });
        }
        self.pos += 1;
        // Right-associative: a = b = c parses as a = (b = c).
        let value = self.parse_expression()?;
        Ok(self.module.expressions.append(Expression::Assignment {
            op,
            target,
            value,
        }))
    }

    fn parse_ternary(&mut self) -> Result<Handle<Expression>, ParseError> {
        let condition = self.parse_binary(0)?;
        if !self.eat_symbol(Symbol::Question) {
            return Ok(condition);
        }
        let accept = self.parse_expression()?;
        self.expect_symbol(Symbol::Colon, "`:`")?;
        // Right-associative: a ? b : c ? d : e groups to the right.
        let reject = self.parse_ternary()?;
        Ok(self.module.expressions.append(Expression::Ternary {
            condition,
            accept,
            reject,
        }))
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        match self.peek()? {
            TokenKind::Symbol(Symbol::Star) => Some(BinaryOp::Multiply),
            TokenKind::Symbol(Symbol::Slash) => Some(BinaryOp::Divide),
            TokenKind::Symbol(Symbol::Percent) => Some(BinaryOp::Modulo),
            TokenKind::Symbol(Symbol::Plus) => Some(BinaryOp::Add),
            TokenKind::Symbol(Symbol::Minus) => Some(BinaryOp::Subtract),
            TokenKind::Symbol(Symbol::Less) => Some(BinaryOp::Less),
            TokenKind::Symbol(Symbol::Greater) => Some(BinaryOp::Greater),
            TokenKind::Symbol(Symbol::LessEqual) => Some(BinaryOp::LessEqual),
            TokenKind::Symbol(Symbol::GreaterEqual) => Some(BinaryOp::GreaterEqual),
            TokenKind::Symbol(Symbol::Equal) => Some(BinaryOp::Equal),
            TokenKind::Symbol(Symbol::NotEqual) => Some(BinaryOp::NotEqual),
            TokenKind::Symbol(Symbol::AndAnd) => Some(BinaryOp::LogicalAnd),
            TokenKind::Symbol(Symbol::OrOr) => Some(BinaryOp::LogicalOr),
            _ => None,
        }
    }

    /// Precedence climbing over the binary operator ladder.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Handle<Expression>, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            // Left-associative: the right side must bind strictly tighter.
            let right = self.parse_binary(prec + 1)?;
            left = self
                .module
                .expressions
                .append(Expression::Binary { op, left, right });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Handle<Expression>, ParseError> {
        let op = match self.peek() {
            Some(TokenKind::Symbol(Symbol::Minus)) => Some(UnaryOp::Negate),
            Some(TokenKind::Symbol(Symbol::Not)) => Some(UnaryOp::LogicalNot),
            Some(TokenKind::Symbol(Symbol::PlusPlus)) => Some(UnaryOp::PreIncrement),
            Some(TokenKind::Symbol(Symbol::MinusMinus)) => Some(UnaryOp::PreDecrement),
            Some(TokenKind::Symbol(Symbol::Plus)) => {
                // Unary plus is a no-op; parse the operand directly.
                self.pos += 1;
                return self.parse_unary();
            }
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(self.module.expressions.append(Expression::Unary { op, operand }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Handle<Expression>, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Symbol(Symbol::Dot)) => {
                    self.pos += 1;
                    let token = self.next()?;
                    let member = match token.kind {
                        TokenKind::Identifier(name) => name,
                        _ => return Err(self.unexpected(&token, "a member or swizzle")),
                    };
                    expr = self.member_or_swizzle(expr, member, token.line, token.column)?;
                }
                Some(TokenKind::Symbol(Symbol::LBracket)) => {
                    self.pos += 1;
                    let index = self.parse_expression()?;
                    self.expect_symbol(Symbol::RBracket, "`]`")?;
                    expr = self
                        .module
                        .expressions
                        .append(Expression::AccessIndex { base: expr, index });
                }
                Some(TokenKind::Symbol(Symbol::PlusPlus)) => {
                    self.pos += 1;
                    expr = self.module.expressions.append(Expression::Unary {
                        op: UnaryOp::PostIncrement,
                        operand: expr,
                    });
                }
                Some(TokenKind::Symbol(Symbol::MinusMinus)) => {
                    self.pos += 1;
                    expr = self.module.expressions.append(Expression::Unary {
                        op: UnaryOp::PostDecrement,
                        operand: expr,
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `.xyz` patterns over the `xyzw`/`rgba` alphabets are swizzles;
    /// anything else is struct member access. Purely syntactic — the
    /// parser does not know the base's type.
    fn member_or_swizzle(
        &mut self,
        base: Handle<Expression>,
        member: String,
        line: u32,
        column: u32,
    ) -> Result<Handle<Expression>, ParseError> {
        let looks_positional = member.len() <= 4
            && (member.chars().all(|c| "xyzw".contains(c))
                || member.chars().all(|c| "rgba".contains(c)));
        if !looks_positional {
            return Ok(self
                .module
                .expressions
                .append(Expression::AccessMember { base, member }));
        }
        let pattern: Vec<SwizzleComponent> = member
            .chars()
            .map(|c| {
                SwizzleComponent::from_char(c).ok_or(ParseError::InvalidSwizzle {
                    pattern: member.clone(),
                    line,
                    column,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self
            .module
            .expressions
            .append(Expression::Swizzle { base, pattern }))
    }

    fn parse_primary(&mut self) -> Result<Handle<Expression>, ParseError> {
        let token = self.next()?;
        let expr = match token.kind {
            TokenKind::Int(v) => Expression::Constant(ConstantValue::Int(v)),
            TokenKind::UInt(v) => Expression::Constant(ConstantValue::UInt(v)),
            TokenKind::Float(v) => Expression::Constant(ConstantValue::Float(v)),
            TokenKind::Bool(v) => Expression::Constant(ConstantValue::Bool(v)),
            TokenKind::Symbol(Symbol::LParen) => {
                let inner = self.parse_expression()?;
                self.expect_symbol(Symbol::RParen, "`)`")?;
                return Ok(inner);
            }
            TokenKind::Identifier(name) => {
                if self.peek() == Some(&TokenKind::Symbol(Symbol::LParen)) {
                    self.pos += 1;
                    return self.parse_call(name, token.line, token.column);
                }
                Expression::Variable(name)
            }
            _ => return Err(self.unexpected(&token, "an expression")),
        };
        Ok(self.module.expressions.append(expr))
    }

    fn parse_call(
        &mut self,
        callee: String,
        line: u32,
        column: u32,
    ) -> Result<Handle<Expression>, ParseError> {
        let mut arguments = Vec::new();
        if !self.eat_symbol(Symbol::RParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
            self.expect_symbol(Symbol::RParen, "`)`")?;
        }

        // Constructors/casts first: a type name shadows nothing else.
        if self.is_type_name(&callee) {
            // Re-resolve; parse_type is not usable here since the name
            // token is already consumed.
            let ty = self.lookup_type(&callee).expect("checked is_type_name");
            return Ok(self
                .module
                .expressions
                .append(Expression::Cast { ty, arguments }));
        }

        if let Some(function) = BuiltInFunction::from_name(&callee) {
            let (min, max) = function.arity();
            if arguments.len() < min || arguments.len() > max {
                return Err(ParseError::WrongArgumentCount {
                    function: callee,
                    expected: min,
                    found: arguments.len(),
                    line,
                    column,
                });
            }
            return Ok(self.module.expressions.append(Expression::BuiltInCall {
                function,
                arguments,
            }));
        }

        if self.function_names.contains(&callee) {
            return Ok(self.module.expressions.append(Expression::Call {
                function: callee,
                arguments,
            }));
        }

        Err(ParseError::UnknownFunction {
            name: callee,
            line,
            column,
        })
    }
}
