//! Update scripts: compilation to a small statement tree and evaluation.
//!
//! A script is a sequence of statements separated by newlines or `;`:
//!
//! ```text
//! let &avg = avg($temp, 'degrees')     # declare in the current frame
//! &avg = max(&avg, 0)                  # assign where declared
//! { let &tmp = count($temp); echo(&tmp) }   # block with its own frame
//! report(&limit = 20, &avg)            # `&limit` lives only for this call
//! expose(&avg)
//! ```

use crate::builtins::{int_value, CallContext, Functions};
use crate::config::ResolverConfig;
use crate::token::{tokenize, Token, TokenKind};
use tracing::trace;
use verdict_core::{Error, Result, Value};

/// An expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    Var { name: String, line: u32 },
    Call(Call),
}

/// A function call with positional arguments and call-scoped bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub scoped: Vec<(String, Expr)>,
    pub line: u32,
}

/// A statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Call(Call),
    Assign {
        name: String,
        value: Expr,
        declare: bool,
        line: u32,
    },
    Block { body: Vec<Stmt>, line: u32 },
}

/// A compiled update script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    source: String,
    body: Vec<Stmt>,
}

impl Script {
    /// Name of the file or ruleset the script came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// Runs every statement in order, stopping at the first error.
    ///
    /// Errors come back as script errors located at the failing statement.
    pub fn run(&self, cx: &mut CallContext<'_>, functions: &Functions) -> Result<()> {
        self.body.iter().try_for_each(|stmt| self.exec(stmt, cx, functions))
    }

    fn exec(&self, stmt: &Stmt, cx: &mut CallContext<'_>, functions: &Functions) -> Result<()> {
        match stmt {
            Stmt::Call(call) => self.call(call, cx, functions).map(|_| ()),
            Stmt::Assign {
                name,
                value,
                declare,
                line,
            } => {
                let value = self.eval(value, cx, functions)?;
                let context = cx.context_mut();
                let result = if *declare {
                    context.declare(name, value)
                } else {
                    context.set(name, value)
                };
                result.map_err(|e| self.locate(e, *line))
            }
            Stmt::Block { body, line } => {
                cx.context_mut().push().map_err(|e| self.locate(e, *line))?;
                let result = body.iter().try_for_each(|s| self.exec(s, cx, functions));
                cx.context_mut().pop().map_err(|e| self.locate(e, *line))?;
                result
            }
        }
    }

    fn eval(&self, expr: &Expr, cx: &mut CallContext<'_>, functions: &Functions) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var { name, line } => cx
                .variable(name)
                .cloned()
                .ok_or_else(|| self.locate(Error::not_found("variable", name.as_str()), *line)),
            Expr::Call(call) => self.call(call, cx, functions)?.ok_or_else(|| {
                self.locate(
                    Error::invalid_operation(format!("{} returns no value", call.name)),
                    call.line,
                )
            }),
        }
    }

    fn call(&self, call: &Call, cx: &mut CallContext<'_>, functions: &Functions) -> Result<Option<Value>> {
        let function = functions
            .get(&call.name)
            .ok_or_else(|| self.locate(Error::not_found("function", call.name.as_str()), call.line))?;
        let args = call
            .args
            .iter()
            .map(|a| self.eval(a, cx, functions))
            .collect::<Result<Vec<_>>>()?;
        trace!(function = %call.name, args = args.len(), "script call");
        if call.scoped.is_empty() {
            return function(cx, &args).map_err(|e| self.locate(e, call.line));
        }

        // Scoped bindings are evaluated in the caller's frame.
        let bindings = call
            .scoped
            .iter()
            .map(|(name, e)| Ok((name, self.eval(e, cx, functions)?)))
            .collect::<Result<Vec<_>>>()?;
        cx.context_mut().push().map_err(|e| self.locate(e, call.line))?;
        let result = bindings
            .into_iter()
            .try_for_each(|(name, v)| cx.context_mut().declare(name, v))
            .and_then(|_| function(cx, &args));
        cx.context_mut().pop().map_err(|e| self.locate(e, call.line))?;
        result.map_err(|e| self.locate(e, call.line))
    }

    /// Attaches this script's location to an error that has none.
    fn locate(&self, err: Error, line: u32) -> Error {
        match err {
            Error::ScriptError {
                line: 0, message, ..
            } => Error::script(self.source.as_str(), line, message),
            e @ Error::ScriptError { .. } => e,
            other => Error::script(self.source.as_str(), line, other.to_string()),
        }
    }
}

/// Compiles script text whose first line is line `first_line` of `source`.
pub fn compile(source: &str, first_line: u32, text: &str) -> Result<Script> {
    compile_with(source, first_line, text, ResolverConfig::default().max_frame_depth)
}

/// Like `compile`, rejecting blocks and calls nested deeper than `max_depth`.
pub fn compile_with(source: &str, first_line: u32, text: &str, max_depth: usize) -> Result<Script> {
    let tokens = tokenize(source, first_line, text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let body = parser.parse_body(TokenKind::End)?;
    Ok(Script {
        source: source.to_string(),
        body,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[i].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(token.error(format!("expected {}, found {}", what, token)))
        }
    }

    fn nest(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(self
                .peek()
                .error(format!("nested deeper than {} levels", self.max_depth)));
        }
        self.depth += 1;
        Ok(())
    }

    fn name_of(token: &Token) -> String {
        token.value.as_str().unwrap_or(token.text.as_str()).to_string()
    }

    fn parse_body(&mut self, closing: TokenKind) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            while self.peek().kind == TokenKind::Separator {
                self.advance();
            }
            let kind = self.peek().kind;
            if kind == closing {
                return Ok(body);
            }
            if kind == TokenKind::End {
                return Err(self.peek().error("expected '}', found end of script"));
            }
            body.push(self.parse_stmt()?);
            let next = self.peek();
            if !matches!(next.kind, TokenKind::Separator | TokenKind::End) && next.kind != closing {
                return Err(next.error(format!("expected end of statement, found {}", next)));
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::LBrace => {
                self.advance();
                self.nest()?;
                let body = self.parse_body(TokenKind::RBrace)?;
                self.expect(TokenKind::RBrace, "'}'")?;
                self.depth -= 1;
                Ok(Stmt::Block {
                    body,
                    line: token.line,
                })
            }
            TokenKind::Ident if token.is_word("let") => {
                self.advance();
                let name = self.expect(TokenKind::Variable, "a variable")?;
                self.expect(TokenKind::Assign, "'='")?;
                Ok(Stmt::Assign {
                    name: Self::name_of(&name),
                    value: self.parse_expr()?,
                    declare: true,
                    line: token.line,
                })
            }
            TokenKind::Variable => {
                self.advance();
                self.expect(TokenKind::Assign, "'='")?;
                Ok(Stmt::Assign {
                    name: Self::name_of(&token),
                    value: self.parse_expr()?,
                    declare: false,
                    line: token.line,
                })
            }
            TokenKind::Ident => Ok(Stmt::Call(self.parse_call()?)),
            _ => Err(token.error(format!("expected a statement, found {}", token))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Str => Expr::Literal(Value::String(Self::name_of(&token))),
            TokenKind::Fact => Expr::Literal(Value::String(Self::name_of(&token))),
            TokenKind::Int => {
                let n = token
                    .value
                    .as_i64()
                    .ok_or_else(|| token.error("invalid integer"))?;
                Expr::Literal(int_value(n).map_err(|e| token.error(e.to_string()))?)
            }
            TokenKind::Variable => Expr::Var {
                name: Self::name_of(&token),
                line: token.line,
            },
            TokenKind::Ident if token.is_word("true") => Expr::Literal(Value::Integer(1)),
            TokenKind::Ident if token.is_word("false") => Expr::Literal(Value::Integer(0)),
            TokenKind::Ident => return self.parse_call().map(Expr::Call),
            _ => return Err(token.error(format!("expected a value, found {}", token))),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_call(&mut self) -> Result<Call> {
        self.nest()?;
        let call = self.parse_call_args()?;
        self.depth -= 1;
        Ok(call)
    }

    fn parse_call_args(&mut self) -> Result<Call> {
        let name = self.expect(TokenKind::Ident, "a function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut call = Call {
            name: Self::name_of(&name),
            args: Vec::new(),
            scoped: Vec::new(),
            line: name.line,
        };
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(call);
        }
        loop {
            if self.peek().kind == TokenKind::Variable && self.peek_kind_at(1) == TokenKind::Assign {
                let var = self.advance();
                self.advance();
                call.scoped.push((Self::name_of(&var), self.parse_expr()?));
            } else {
                call.args.push(self.parse_expr()?);
            }
            if self.peek().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RParen, "',' or ')'")?;
            return Ok(call);
        }
    }
}
