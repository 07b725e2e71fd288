//! ATSL tokenizer.
//!
//! A single linear pass over the source text. Whitespace and comments
//! are discarded; the only lookahead is the one extra character needed
//! to split multi-character symbols (`==` vs `=`, `++` vs `+=` vs `+`).

use std::fmt;

/// Reserved words of the language.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Keyword {
    Include,
    Option,
    Const,
    Struct,
    External,
    Input,
    Output,
    Fn,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,
    Vertex,
    Fragment,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "include" => Self::Include,
            "option" => Self::Option,
            "const" => Self::Const,
            "struct" => Self::Struct,
            "external" => Self::External,
            "input" => Self::Input,
            "output" => Self::Output,
            "fn" => Self::Fn,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "return" => Self::Return,
            "vertex" => Self::Vertex,
            "fragment" => Self::Fragment,
            _ => return None,
        })
    }
}

/// Punctuation and operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Symbol {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Arrow,
    Question,
    Colon,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    AndAnd,
    OrOr,
    Not,
}

/// What a token is, with its literal payload where applicable.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(Keyword),
    Int(i32),
    UInt(u32),
    Float(f32),
    Bool(bool),
    Symbol(Symbol),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier `{name}`"),
            Self::Keyword(k) => write!(f, "keyword `{k:?}`"),
            Self::Int(v) => write!(f, "literal `{v}`"),
            Self::UInt(v) => write!(f, "literal `{v}u`"),
            Self::Float(v) => write!(f, "literal `{v}`"),
            Self::Bool(v) => write!(f, "literal `{v}`"),
            Self::Symbol(s) => write!(f, "`{s:?}`"),
        }
    }
}

/// A token with its source position (1-based line and column).
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

/// Tokenization failures.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character `{ch}` at {line}:{column}")]
    UnexpectedCharacter { ch: char, line: u32, column: u32 },
    #[error("malformed number literal at {line}:{column}")]
    MalformedNumber { line: u32, column: u32 },
    #[error("unterminated block comment starting at {line}:{column}")]
    UnterminatedComment { line: u32, column: u32 },
}

struct Cursor<'a> {
    rest: std::str::Chars<'a>,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            rest: source.chars(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest.clone().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.rest.clone();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.rest.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

/// Tokenizes ATSL source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    loop {
        // Skip whitespace and comments.
        loop {
            match cursor.peek() {
                Some(c) if c.is_whitespace() => {
                    cursor.bump();
                }
                Some('/') if cursor.peek2() == Some('/') => {
                    while let Some(c) = cursor.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if cursor.peek2() == Some('*') => {
                    let (line, column) = (cursor.line, cursor.column);
                    cursor.bump();
                    cursor.bump();
                    let mut closed = false;
                    while let Some(c) = cursor.bump() {
                        if c == '*' && cursor.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(LexError::UnterminatedComment { line, column });
                    }
                }
                _ => break,
            }
        }

        let (line, column) = (cursor.line, cursor.column);
        let Some(c) = cursor.peek() else {
            break;
        };

        if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(c) = cursor.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    cursor.bump();
                } else {
                    break;
                }
            }
            let kind = match word.as_str() {
                "true" => TokenKind::Bool(true),
                "false" => TokenKind::Bool(false),
                _ => match Keyword::from_word(&word) {
                    Some(k) => TokenKind::Keyword(k),
                    None => TokenKind::Identifier(word),
                },
            };
            tokens.push(Token { kind, line, column });
            continue;
        }

        if c.is_ascii_digit() {
            tokens.push(lex_number(&mut cursor, line, column)?);
            continue;
        }

        cursor.bump();
        let symbol = match c {
            '(' => Symbol::LParen,
            ')' => Symbol::RParen,
            '{' => Symbol::LBrace,
            '}' => Symbol::RBrace,
            '[' => Symbol::LBracket,
            ']' => Symbol::RBracket,
            ',' => Symbol::Comma,
            ';' => Symbol::Semicolon,
            '.' => Symbol::Dot,
            '?' => Symbol::Question,
            ':' => Symbol::Colon,
            '+' => {
                if cursor.eat('+') {
                    Symbol::PlusPlus
                } else if cursor.eat('=') {
                    Symbol::PlusAssign
                } else {
                    Symbol::Plus
                }
            }
            '-' => {
                if cursor.eat('-') {
                    Symbol::MinusMinus
                } else if cursor.eat('=') {
                    Symbol::MinusAssign
                } else if cursor.eat('>') {
                    Symbol::Arrow
                } else {
                    Symbol::Minus
                }
            }
            '*' => {
                if cursor.eat('=') {
                    Symbol::StarAssign
                } else {
                    Symbol::Star
                }
            }
            '/' => {
                if cursor.eat('=') {
                    Symbol::SlashAssign
                } else {
                    Symbol::Slash
                }
            }
            '%' => {
                if cursor.eat('=') {
                    Symbol::PercentAssign
                } else {
                    Symbol::Percent
                }
            }
            '=' => {
                if cursor.eat('=') {
                    Symbol::Equal
                } else {
                    Symbol::Assign
                }
            }
            '!' => {
                if cursor.eat('=') {
                    Symbol::NotEqual
                } else {
                    Symbol::Not
                }
            }
            '<' => {
                if cursor.eat('=') {
                    Symbol::LessEqual
                } else {
                    Symbol::Less
                }
            }
            '>' => {
                if cursor.eat('=') {
                    Symbol::GreaterEqual
                } else {
                    Symbol::Greater
                }
            }
            '&' => {
                if cursor.eat('&') {
                    Symbol::AndAnd
                } else {
                    return Err(LexError::UnexpectedCharacter { ch: c, line, column });
                }
            }
            '|' => {
                if cursor.eat('|') {
                    Symbol::OrOr
                } else {
                    return Err(LexError::UnexpectedCharacter { ch: c, line, column });
                }
            }
            other => {
                return Err(LexError::UnexpectedCharacter {
                    ch: other,
                    line,
                    column,
                })
            }
        };
        tokens.push(Token {
            kind: TokenKind::Symbol(symbol),
            line,
            column,
        });
    }

    Ok(tokens)
}

fn lex_number(cursor: &mut Cursor<'_>, line: u32, column: u32) -> Result<Token, LexError> {
    let mut text = String::new();
    let mut is_float = false;

    while let Some(c) = cursor.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            cursor.bump();
        } else {
            break;
        }
    }

    // Fractional part: a dot only counts when followed by a digit, so
    // `v.x` after an integer parse still lexes as member access.
    if cursor.peek() == Some('.') && cursor.peek2().is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        text.push('.');
        cursor.bump();
        while let Some(c) = cursor.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                cursor.bump();
            } else {
                break;
            }
        }
    }

    // Exponent.
    if matches!(cursor.peek(), Some('e') | Some('E')) {
        let mut probe = String::from("e");
        let mut it_ok = false;
        let second = cursor.peek2();
        if let Some(c) = second {
            if c.is_ascii_digit() {
                it_ok = true;
            }
        }
        // e+NN / e-NN needs a third-character check, handled below by
        // consuming greedily and validating with parse().
        if it_ok || matches!(second, Some('+') | Some('-')) {
            is_float = true;
            cursor.bump();
            if matches!(cursor.peek(), Some('+') | Some('-')) {
                probe.push(cursor.bump().unwrap());
            }
            let mut any = false;
            while let Some(c) = cursor.peek() {
                if c.is_ascii_digit() {
                    any = true;
                    probe.push(c);
                    cursor.bump();
                } else {
                    break;
                }
            }
            if !any {
                return Err(LexError::MalformedNumber { line, column });
            }
            text.push_str(&probe);
        }
    }

    if is_float {
        let value: f32 = text
            .parse()
            .map_err(|_| LexError::MalformedNumber { line, column })?;
        return Ok(Token {
            kind: TokenKind::Float(value),
            line,
            column,
        });
    }

    if cursor.eat('u') {
        let value: u32 = text
            .parse()
            .map_err(|_| LexError::MalformedNumber { line, column })?;
        return Ok(Token {
            kind: TokenKind::UInt(value),
            line,
            column,
        });
    }

    let value: i32 = text
        .parse()
        .map_err(|_| LexError::MalformedNumber { line, column })?;
    Ok(Token {
        kind: TokenKind::Int(value),
        line,
        column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("fn shade"),
            vec![
                TokenKind::Keyword(Keyword::Fn),
                TokenKind::Identifier("shade".into())
            ]
        );
    }

    #[test]
    fn number_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42)]);
        assert_eq!(kinds("42u"), vec![TokenKind::UInt(42)]);
        assert_eq!(kinds("1.5"), vec![TokenKind::Float(1.5)]);
        assert_eq!(kinds("2e3"), vec![TokenKind::Float(2000.0)]);
        assert_eq!(kinds("1.5e-1"), vec![TokenKind::Float(0.15)]);
    }

    #[test]
    fn member_access_is_not_a_float() {
        assert_eq!(
            kinds("v.x"),
            vec![
                TokenKind::Identifier("v".into()),
                TokenKind::Symbol(Symbol::Dot),
                TokenKind::Identifier("x".into())
            ]
        );
        // But a digit after the dot is a fraction.
        assert_eq!(kinds("1.5"), vec![TokenKind::Float(1.5)]);
    }

    #[test]
    fn multi_character_symbols() {
        assert_eq!(
            kinds("== != <= >= && || -> ++ -- += -="),
            vec![
                TokenKind::Symbol(Symbol::Equal),
                TokenKind::Symbol(Symbol::NotEqual),
                TokenKind::Symbol(Symbol::LessEqual),
                TokenKind::Symbol(Symbol::GreaterEqual),
                TokenKind::Symbol(Symbol::AndAnd),
                TokenKind::Symbol(Symbol::OrOr),
                TokenKind::Symbol(Symbol::Arrow),
                TokenKind::Symbol(Symbol::PlusPlus),
                TokenKind::Symbol(Symbol::MinusMinus),
                TokenKind::Symbol(Symbol::PlusAssign),
                TokenKind::Symbol(Symbol::MinusAssign),
            ]
        );
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(
            kinds("a // comment\nb /* block\nspanning */ c"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Identifier("c".into()),
            ]
        );
    }

    #[test]
    fn unterminated_comment_errors() {
        match tokenize("a /* never closed") {
            Err(LexError::UnterminatedComment { line: 1, column: 3 }) => {}
            other => panic!("expected UnterminatedComment, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_character_errors() {
        match tokenize("a @ b") {
            Err(LexError::UnexpectedCharacter {
                ch: '@',
                line: 1,
                column: 3,
            }) => {}
            other => panic!("expected UnexpectedCharacter, got {other:?}"),
        }
    }

    #[test]
    fn positions_track_lines() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn bool_literals() {
        assert_eq!(
            kinds("true false"),
            vec![TokenKind::Bool(true), TokenKind::Bool(false)]
        );
    }

    #[test]
    fn lone_ampersand_is_an_error() {
        assert!(matches!(
            tokenize("a & b"),
            Err(LexError::UnexpectedCharacter { ch: '&', .. })
        ));
    }
}
