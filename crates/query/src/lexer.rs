//! Tokenizer for statement text.
//!
//! Produces identifiers, literals, parameter markers and punctuation, each
//! tagged with the byte position it starts at so parse errors can point
//! into the source.

use verdict_core::{DataType, Error, Result};

/// Punctuation and operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    LParen,
    RParen,
    Comma,
    Star,
    Semicolon,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    Bang,
}

/// Token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare word; keywords are identifiers matched case-insensitively.
    Ident(String),
    Str(String),
    Int(i64),
    Blob(Vec<u8>),
    /// A `%s`, `%d`, `%u` or `%b` parameter marker.
    Param(DataType),
    Symbol(Symbol),
    End,
}

/// A token and the byte position it starts at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    /// Returns true if this is the keyword `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }
}

/// Lexer state.
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::End,
                    position: start,
                })
            }
        };
        let kind = match c {
            'x' | 'X' if self.peek_second() == Some('\'') => {
                self.advance();
                TokenKind::Blob(self.parse_blob()?)
            }
            c if c.is_ascii_alphabetic() || c == '_' => TokenKind::Ident(self.parse_identifier()),
            c if c.is_ascii_digit() => TokenKind::Int(self.parse_number()?),
            '-' if self.peek_second().map_or(false, |d| d.is_ascii_digit()) => {
                TokenKind::Int(self.parse_number()?)
            }
            '\'' => TokenKind::Str(self.parse_string_literal()?),
            '%' => {
                self.advance();
                let data_type = match self.peek() {
                    Some('s') => DataType::Varchar,
                    Some('d') => DataType::Integer,
                    Some('u') => DataType::Unsigned,
                    Some('b') => DataType::Blob,
                    _ => return Err(Error::parse("unknown parameter marker", start)),
                };
                self.advance();
                TokenKind::Param(data_type)
            }
            _ => TokenKind::Symbol(self.parse_symbol()?),
        };
        Ok(Token { kind, position: start })
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_number(&mut self) -> Result<i64> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let value: i64 = self.input[start..self.pos]
            .parse()
            .map_err(|_| Error::parse("invalid number", start))?;
        if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
            return Err(Error::parse("number out of range", start));
        }
        Ok(value)
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        let start = self.pos;
        self.advance();
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.advance();
            if c == '\'' {
                if self.peek() == Some('\'') {
                    self.advance();
                    out.push('\'');
                } else {
                    return Ok(out);
                }
            } else {
                out.push(c);
            }
        }
        Err(Error::parse("unterminated string", start))
    }

    fn parse_blob(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        let body = self.parse_string_literal()?;
        if body.len() % 2 != 0 {
            return Err(Error::parse("blob literal needs an even number of hex digits", start));
        }
        (0..body.len())
            .step_by(2)
            .map(|i| {
                body.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| Error::parse("invalid hex digit in blob literal", start + 1 + i))
            })
            .collect()
    }

    fn parse_symbol(&mut self) -> Result<Symbol> {
        let start = self.pos;
        let c = self.peek();
        self.advance();
        let followed_by_eq = self.peek() == Some('=');
        let symbol = match c {
            Some('(') => Symbol::LParen,
            Some(')') => Symbol::RParen,
            Some(',') => Symbol::Comma,
            Some('*') => Symbol::Star,
            Some(';') => Symbol::Semicolon,
            Some('=') => Symbol::Eq,
            Some('&') => Symbol::Amp,
            Some('|') => Symbol::Pipe,
            Some('!') if followed_by_eq => {
                self.advance();
                Symbol::Ne
            }
            Some('!') => Symbol::Bang,
            Some('<') if followed_by_eq => {
                self.advance();
                Symbol::Le
            }
            Some('<') => Symbol::Lt,
            Some('>') if followed_by_eq => {
                self.advance();
                Symbol::Ge
            }
            Some('>') => Symbol::Gt,
            Some(other) => return Err(Error::parse(format!("unexpected character '{}'", other), start)),
            None => return Err(Error::parse("unexpected end of input", start)),
        };
        Ok(symbol)
    }
}

/// Splits statement text into tokens, ending with `TokenKind::End`.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
