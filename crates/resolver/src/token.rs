//! Script and ruleset tokens.
//!
//! Every token keeps the text it was scanned from plus the source name and
//! line, which only ever feed error messages.

use core::fmt;
use verdict_core::{Error, Result};

/// Lexical class of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `target <name>`
    Target,
    /// `depends on <dep> ...`
    Depends,
    /// `update script`
    UpdateScript,
    /// `end script`
    EndScript,
    Ident,
    /// `&name`
    Variable,
    /// `$name`
    Fact,
    Str,
    Int,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Assign,
    /// A newline or `;`.
    Separator,
    End,
}

/// Typed payload of a token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TokenValue {
    #[default]
    None,
    Str(String),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    StrArray(Vec<String>),
}

impl TokenValue {
    /// Picks the narrowest integer variant holding `n`.
    pub fn integer(n: i64) -> Option<TokenValue> {
        if n >= 0 {
            u16::try_from(n)
                .map(TokenValue::U16)
                .ok()
                .or_else(|| u32::try_from(n).map(TokenValue::U32).ok())
        } else {
            i16::try_from(n)
                .map(TokenValue::S16)
                .ok()
                .or_else(|| i32::try_from(n).map(TokenValue::S32).ok())
        }
    }

    /// Widens an integer payload.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TokenValue::S16(v) => Some(i64::from(*v)),
            TokenValue::U16(v) => Some(i64::from(*v)),
            TokenValue::S32(v) => Some(i64::from(*v)),
            TokenValue::U32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TokenValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A scanned token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub text: String,
    pub source: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, text: impl Into<String>, source: &str, line: u32) -> Self {
        Self {
            kind,
            value,
            text: text.into(),
            source: source.to_string(),
            line,
        }
    }

    /// Builds a script error located at this token.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::script(self.source.as_str(), self.line, message)
    }

    /// Returns true for the identifier `word`.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::End => f.write_str("end of script"),
            TokenKind::Separator => f.write_str("end of statement"),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

/// Removes a `#` comment, leaving quoted text alone.
pub fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Scans a ruleset directive line, or returns `None` for any other line.
pub fn scan_directive(line: &str, source: &str, number: u32) -> Result<Option<Token>> {
    let text = strip_comment(line).trim();
    let words: Vec<&str> = text.split_whitespace().collect();
    let token = match words.as_slice() {
        ["target", name] => Token::new(
            TokenKind::Target,
            TokenValue::Str(name.to_string()),
            text,
            source,
            number,
        ),
        ["target", ..] => {
            return Err(Error::script(source, number, "target takes exactly one name"));
        }
        ["depends", "on", deps @ ..] => {
            if deps.is_empty() {
                return Err(Error::script(source, number, "empty dependency list"));
            }
            Token::new(
                TokenKind::Depends,
                TokenValue::StrArray(deps.iter().map(|d| d.to_string()).collect()),
                text,
                source,
                number,
            )
        }
        ["update", "script"] => Token::new(TokenKind::UpdateScript, TokenValue::None, text, source, number),
        ["end", "script"] => Token::new(TokenKind::EndScript, TokenValue::None, text, source, number),
        _ => return Ok(None),
    };
    Ok(Some(token))
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    source: &'a str,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn token(&self, kind: TokenKind, value: TokenValue, start: usize) -> Token {
        Token::new(kind, value, &self.input[start..self.pos], self.source, self.line)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::script(self.source, self.line, message)
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else if c.is_whitespace() && c != '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn name(&mut self) -> String {
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

    fn next_token(&mut self) -> Result<Token> {
        self.skip_blank();
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(self.token(TokenKind::End, TokenValue::None, start)),
        };
        if c.is_ascii_alphabetic() || c == '_' {
            let name = self.name();
            return Ok(self.token(TokenKind::Ident, TokenValue::Str(name), start));
        }
        if c.is_ascii_digit() || c == '-' {
            self.advance();
            while self.peek().map_or(false, |d| d.is_ascii_digit()) {
                self.advance();
            }
            let text = &self.input[start..self.pos];
            let value = text
                .parse::<i64>()
                .ok()
                .and_then(TokenValue::integer)
                .ok_or_else(|| self.error(format!("invalid integer {}", text)))?;
            return Ok(self.token(TokenKind::Int, value, start));
        }
        self.advance();
        let (kind, value) = match c {
            '&' | '$' => {
                let name = self.name();
                if name.is_empty() {
                    return Err(self.error(format!("expected a name after '{}'", c)));
                }
                let kind = if c == '&' { TokenKind::Variable } else { TokenKind::Fact };
                (kind, TokenValue::Str(name))
            }
            '\'' | '"' => {
                let mut body = String::new();
                loop {
                    match self.peek() {
                        Some(q) if q == c => {
                            self.advance();
                            break;
                        }
                        Some('\n') | None => return Err(self.error("unterminated string")),
                        Some(other) => {
                            body.push(other);
                            self.advance();
                        }
                    }
                }
                (TokenKind::Str, TokenValue::Str(body))
            }
            '(' => (TokenKind::LParen, TokenValue::None),
            ')' => (TokenKind::RParen, TokenValue::None),
            '{' => (TokenKind::LBrace, TokenValue::None),
            '}' => (TokenKind::RBrace, TokenValue::None),
            ',' => (TokenKind::Comma, TokenValue::None),
            '=' => (TokenKind::Assign, TokenValue::None),
            ';' => (TokenKind::Separator, TokenValue::None),
            '\n' => {
                let token = self.token(TokenKind::Separator, TokenValue::None, start);
                self.line += 1;
                return Ok(token);
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };
        Ok(self.token(kind, value, start))
    }
}

/// Scans script text whose first line is line `first_line` of `source`.
///
/// The result always ends with an `End` token.
pub fn tokenize(source: &str, first_line: u32, text: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner {
        input: text,
        pos: 0,
        line: first_line,
        source,
    };
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token()?;
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::ErrorKind;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize("t", 1, text).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(TokenValue::integer(7), Some(TokenValue::U16(7)));
        assert_eq!(TokenValue::integer(70_000), Some(TokenValue::U32(70_000)));
        assert_eq!(TokenValue::integer(-7), Some(TokenValue::S16(-7)));
        assert_eq!(TokenValue::integer(-70_000), Some(TokenValue::S32(-70_000)));
        assert_eq!(TokenValue::integer(1 << 40), None);
        assert_eq!(TokenValue::integer(-(1 << 40)), None);
    }

    #[test]
    fn test_script_tokens() {
        assert_eq!(
            kinds("let &avg = avg($temp, \"degrees\") # note\necho(&avg)"),
            vec![
                TokenKind::Ident,
                TokenKind::Variable,
                TokenKind::Assign,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Fact,
                TokenKind::Comma,
                TokenKind::Str,
                TokenKind::RParen,
                TokenKind::Separator,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Variable,
                TokenKind::RParen,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_lines_and_payloads() {
        let tokens = tokenize("rules", 10, "a\n\n  &x = -3").unwrap();
        let x = tokens.iter().find(|t| t.kind == TokenKind::Variable).unwrap();
        assert_eq!(x.line, 12);
        assert_eq!(x.value.as_str(), Some("x"));
        assert_eq!(x.text, "&x");
        let n = tokens.iter().find(|t| t.kind == TokenKind::Int).unwrap();
        assert_eq!(n.value, TokenValue::S16(-3));
        assert_eq!(n.source, "rules");
    }

    #[test]
    fn test_scan_errors() {
        let err = tokenize("rules", 4, "echo('open)").unwrap_err();
        assert_eq!(err, Error::script("rules", 4, "unterminated string"));
        assert_eq!(tokenize("r", 1, "a ^ b").unwrap_err().kind(), ErrorKind::ScriptError);
        assert!(tokenize("r", 1, "& = 1").is_err());
    }

    #[test]
    fn test_directives() {
        let t = scan_directive("  depends on $temp avg  # inputs", "r", 3)
            .unwrap()
            .unwrap();
        assert_eq!(t.kind, TokenKind::Depends);
        assert_eq!(
            t.value,
            TokenValue::StrArray(vec!["$temp".into(), "avg".into()])
        );
        assert_eq!(t.line, 3);
        assert!(scan_directive("echo('#')", "r", 1).unwrap().is_none());
        assert!(scan_directive("depends on", "r", 1).is_err());
        assert_eq!(strip_comment("a('#x') # y"), "a('#x') ");
    }
}
