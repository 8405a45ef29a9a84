//! Statement parser.
//!
//! A recursive descent over the token stream from the lexer. Conditions
//! bind tighter in the order NOT, AND, OR, and runs of the same connective
//! are flattened into one node.

use crate::config::StatementConfig;
use crate::lexer::{tokenize, Symbol, Token, TokenKind};
use crate::statement::{ColumnDef, Operand, ParamSlot, Predicate, Statement, StatementKind};
use tracing::trace;
use verdict_core::{DataType, Error, Result, Value};
use verdict_storage::CompareOp;

/// Compiles statement text with the default limits.
pub fn compile(text: &str) -> Result<Statement> {
    compile_with(text, &StatementConfig::default())
}

/// Compiles statement text.
pub fn compile_with(text: &str, config: &StatementConfig) -> Result<Statement> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        slots: Vec::new(),
        max_parameters: config.max_parameters,
        depth: 0,
        max_nesting: config.max_nesting,
    };
    let kind = parser.parse_statement()?;
    if parser.check_symbol(Symbol::Semicolon) {
        parser.advance();
    }
    parser.expect_end()?;
    trace!(verb = kind.verb(), params = parser.slots.len(), "statement compiled");
    Ok(Statement::new(kind, parser.slots))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    slots: Vec<ParamSlot>,
    max_parameters: usize,
    depth: usize,
    max_nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends the stream with End
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn position(&self) -> usize {
        self.peek().position
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::parse(message, self.position()))
    }

    /// Enters one level of condition nesting.
    fn nest(&mut self) -> Result<()> {
        if self.depth >= self.max_nesting {
            return self.error(format!("condition nested deeper than {} levels", self.max_nesting));
        }
        self.depth += 1;
        Ok(())
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    fn check_symbol(&self, symbol: Symbol) -> bool {
        self.peek().kind == TokenKind::Symbol(symbol)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        let found = self.check_keyword(word);
        if found {
            self.advance();
        }
        found
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        let found = self.check_symbol(symbol);
        if found {
            self.advance();
        }
        found
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            self.error(format!("expected {}", word))
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol, text: &str) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            self.error(format!("expected '{}'", text))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek().kind {
            TokenKind::End => Ok(()),
            _ => self.error("unexpected trailing input"),
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.error("expected identifier"),
        }
    }

    fn parse_count(&mut self) -> Result<usize> {
        match self.peek().kind {
            TokenKind::Int(n) if n >= 0 => {
                self.advance();
                Ok(n as usize)
            }
            _ => self.error("expected non-negative integer"),
        }
    }

    fn parse_statement(&mut self) -> Result<StatementKind> {
        let verb = match &self.peek().kind {
            TokenKind::Ident(word) => word.to_ascii_uppercase(),
            _ => return self.error("expected statement"),
        };
        self.advance();
        match verb.as_str() {
            "SHOW" => {
                self.expect_keyword("TABLES")?;
                Ok(StatementKind::ShowTables)
            }
            "DESCRIBE" => Ok(StatementKind::Describe {
                table: self.parse_identifier()?,
            }),
            "CREATE" => self.parse_create(),
            "DROP" => self.parse_drop(),
            "BEGIN" => Ok(StatementKind::Begin {
                name: self.parse_identifier()?,
            }),
            "COMMIT" => Ok(StatementKind::Commit {
                name: self.parse_identifier()?,
            }),
            "ROLLBACK" => Ok(StatementKind::Rollback {
                name: self.parse_identifier()?,
            }),
            "INSERT" => self.parse_insert(),
            "UPDATE" => self.parse_update(),
            "DELETE" => {
                self.expect_keyword("FROM")?;
                let table = self.parse_identifier()?;
                let filter = self.parse_where()?;
                Ok(StatementKind::Delete { table, filter })
            }
            "SELECT" => self.parse_select(),
            _ => Err(Error::parse(
                format!("unknown statement {}", verb),
                self.tokens[self.pos.saturating_sub(1)].position,
            )),
        }
    }

    fn parse_create(&mut self) -> Result<StatementKind> {
        let temporary = self.eat_keyword("TEMPORARY");
        if temporary || self.check_keyword("TABLE") {
            self.expect_keyword("TABLE")?;
            let table = self.parse_identifier()?;
            self.expect_symbol(Symbol::LParen, "(")?;
            let mut columns = vec![self.parse_column_def()?];
            while self.eat_symbol(Symbol::Comma) {
                columns.push(self.parse_column_def()?);
            }
            self.expect_symbol(Symbol::RParen, ")")?;
            return Ok(StatementKind::CreateTable {
                table,
                temporary,
                columns,
            });
        }

        let unique = self.eat_keyword("UNIQUE");
        self.expect_keyword("INDEX")?;
        let name = if self.check_keyword("ON") {
            None
        } else {
            Some(self.parse_identifier()?)
        };
        self.expect_keyword("ON")?;
        let table = self.parse_identifier()?;
        let columns = self.parse_name_list()?;
        Ok(StatementKind::CreateIndex {
            table,
            name,
            unique,
            columns,
        })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.parse_identifier()?;
        let type_pos = self.position();
        let type_name = self.parse_identifier()?;
        let data_type =
            DataType::from_name(&type_name).map_err(|err| Error::parse(err.to_string(), type_pos))?;
        let size = if self.check_symbol(Symbol::LParen) {
            if !data_type.is_sized() {
                return self.error(format!("type {} takes no size", data_type));
            }
            self.advance();
            let size = self.parse_count()?;
            self.expect_symbol(Symbol::RParen, ")")?;
            size
        } else {
            0
        };
        Ok(ColumnDef {
            name,
            data_type,
            size,
        })
    }

    fn parse_drop(&mut self) -> Result<StatementKind> {
        if self.eat_keyword("TABLE") {
            return Ok(StatementKind::DropTable {
                table: self.parse_identifier()?,
            });
        }
        self.expect_keyword("INDEX")?;
        let name = self.parse_identifier()?;
        self.expect_keyword("ON")?;
        let table = self.parse_identifier()?;
        Ok(StatementKind::DropIndex { table, name })
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        self.expect_symbol(Symbol::LParen, "(")?;
        let mut names = vec![self.parse_identifier()?];
        while self.eat_symbol(Symbol::Comma) {
            names.push(self.parse_identifier()?);
        }
        self.expect_symbol(Symbol::RParen, ")")?;
        Ok(names)
    }

    fn parse_insert(&mut self) -> Result<StatementKind> {
        self.expect_keyword("INTO")?;
        let table = self.parse_identifier()?;
        let columns = if self.check_symbol(Symbol::LParen) {
            Some(self.parse_name_list()?)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        self.expect_symbol(Symbol::LParen, "(")?;
        let mut values = vec![self.parse_operand()?];
        while self.eat_symbol(Symbol::Comma) {
            values.push(self.parse_operand()?);
        }
        self.expect_symbol(Symbol::RParen, ")")?;
        if let Some(columns) = &columns {
            if columns.len() != values.len() {
                return self.error(format!(
                    "{} columns but {} values",
                    columns.len(),
                    values.len()
                ));
            }
        }
        Ok(StatementKind::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<StatementKind> {
        let table = self.parse_identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect_symbol(Symbol::Eq, "=")?;
            assignments.push((column, self.parse_operand()?));
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        let filter = self.parse_where()?;
        Ok(StatementKind::Update {
            table,
            assignments,
            filter,
        })
    }

    fn parse_select(&mut self) -> Result<StatementKind> {
        let columns = if self.eat_symbol(Symbol::Star) {
            None
        } else {
            let mut names = vec![self.parse_identifier()?];
            while self.eat_symbol(Symbol::Comma) {
                names.push(self.parse_identifier()?);
            }
            Some(names)
        };
        self.expect_keyword("FROM")?;
        let table = self.parse_identifier()?;
        let filter = self.parse_where()?;
        let mut limit = None;
        let mut offset = 0;
        if self.eat_keyword("LIMIT") {
            limit = Some(self.parse_count()?);
            if self.eat_keyword("OFFSET") {
                offset = self.parse_count()?;
            }
        }
        Ok(StatementKind::Select {
            table,
            columns,
            filter,
            limit,
            offset,
        })
    }

    fn parse_where(&mut self) -> Result<Option<Predicate>> {
        if self.eat_keyword("WHERE") {
            Ok(Some(self.parse_or()?))
        } else {
            Ok(None)
        }
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut parts = Vec::new();
        loop {
            match self.parse_and()? {
                Predicate::Or(inner) => parts.extend(inner),
                p => parts.push(p),
            }
            if !(self.eat_symbol(Symbol::Pipe) || self.eat_keyword("OR")) {
                break;
            }
        }
        Ok(join(parts, Predicate::Or))
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut parts = Vec::new();
        loop {
            match self.parse_not()? {
                Predicate::And(inner) => parts.extend(inner),
                p => parts.push(p),
            }
            if !(self.eat_symbol(Symbol::Amp) || self.eat_keyword("AND")) {
                break;
            }
        }
        Ok(join(parts, Predicate::And))
    }

    fn parse_not(&mut self) -> Result<Predicate> {
        if self.eat_symbol(Symbol::Bang) || self.eat_keyword("NOT") {
            self.nest()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate> {
        if self.eat_symbol(Symbol::LParen) {
            self.nest()?;
            let inner = self.parse_or()?;
            self.expect_symbol(Symbol::RParen, ")")?;
            self.depth -= 1;
            return Ok(inner);
        }
        let column = self.parse_identifier()?;
        let op = match self.peek().kind {
            TokenKind::Symbol(Symbol::Eq) => CompareOp::Eq,
            TokenKind::Symbol(Symbol::Ne) => CompareOp::Ne,
            TokenKind::Symbol(Symbol::Lt) => CompareOp::Lt,
            TokenKind::Symbol(Symbol::Le) => CompareOp::Le,
            TokenKind::Symbol(Symbol::Gt) => CompareOp::Gt,
            TokenKind::Symbol(Symbol::Ge) => CompareOp::Ge,
            _ => return self.error("expected comparison operator"),
        };
        self.advance();
        let operand = self.parse_operand()?;
        Ok(Predicate::Compare {
            column,
            op,
            operand,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let operand = match &self.peek().kind {
            TokenKind::Str(s) => Operand::Literal(Value::String(s.clone())),
            TokenKind::Blob(b) => Operand::Literal(Value::Blob(b.clone())),
            TokenKind::Int(n) => Operand::Literal(match i32::try_from(*n) {
                Ok(v) => Value::Integer(v),
                Err(_) => Value::Unsigned(*n as u32),
            }),
            TokenKind::Param(data_type) => {
                if self.slots.len() >= self.max_parameters {
                    return Err(Error::exhausted(format!(
                        "statement has more than {} parameters",
                        self.max_parameters
                    )));
                }
                self.slots.push(ParamSlot {
                    data_type: *data_type,
                    value: None,
                });
                Operand::Param(self.slots.len() - 1)
            }
            _ => return self.error("expected value"),
        };
        self.advance();
        Ok(operand)
    }
}

fn join(mut parts: Vec<Predicate>, connective: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        connective(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::ErrorKind;

    fn roundtrip(text: &str) -> String {
        let stmt = compile(text).unwrap();
        let printed = stmt.to_string();
        assert_eq!(compile(&printed).unwrap(), stmt, "reparse of {}", printed);
        printed
    }

    #[test]
    fn test_ddl() {
        assert_eq!(roundtrip("show tables"), "SHOW TABLES");
        assert_eq!(roundtrip("describe temp;"), "DESCRIBE temp");
        assert_eq!(
            roundtrip("create temporary table temp (id integer, state varchar(8), raw blob(4))"),
            "CREATE TEMPORARY TABLE temp (id INTEGER, state VARCHAR(8), raw BLOB(4))"
        );
        assert_eq!(
            roundtrip("create unique index on temp (id, state)"),
            "CREATE UNIQUE INDEX ON temp (id, state)"
        );
        assert_eq!(roundtrip("Create Index by_state On temp(state)"), "CREATE INDEX by_state ON temp (state)");
        assert_eq!(roundtrip("drop index by_state on temp"), "DROP INDEX by_state ON temp");
        assert_eq!(roundtrip("drop table temp"), "DROP TABLE temp");
        assert_eq!(roundtrip("begin a"), "BEGIN a");
        assert_eq!(roundtrip("rollback a"), "ROLLBACK a");
    }

    #[test]
    fn test_dml() {
        assert_eq!(
            roundtrip("insert into temp values (1, 'cold', %s)"),
            "INSERT INTO temp VALUES (1, 'cold', %s)"
        );
        assert_eq!(
            roundtrip("update temp set state = 'hot', id = %d where id = 1"),
            "UPDATE temp SET state = 'hot', id = %d WHERE id = 1"
        );
        assert_eq!(roundtrip("delete from temp"), "DELETE FROM temp");
        assert_eq!(
            roundtrip("select id, state from temp where id >= -2 limit 10 offset 5"),
            "SELECT id, state FROM temp WHERE id >= -2 LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_condition_precedence() {
        assert_eq!(
            roundtrip("select * from t where a = 1 | b = 2 & !c = 3"),
            "SELECT * FROM t WHERE (a = 1 OR (b = 2 AND NOT c = 3))"
        );
        assert_eq!(
            roundtrip("select * from t where (a = 1 and b = 2) and c != 'x'"),
            "SELECT * FROM t WHERE (a = 1 AND b = 2 AND c != 'x')"
        );
        assert_eq!(
            roundtrip("select * from t where not (a < 1 or a > 9)"),
            "SELECT * FROM t WHERE NOT (a < 1 OR a > 9)"
        );
    }

    #[test]
    fn test_large_integer_is_unsigned() {
        let stmt = compile("insert into t values (4294967295, 2147483647)").unwrap();
        match stmt.kind() {
            StatementKind::Insert { values, .. } => {
                assert_eq!(values[0], Operand::Literal(Value::Unsigned(u32::MAX)));
                assert_eq!(values[1], Operand::Literal(Value::Integer(i32::MAX)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slots_in_order() {
        let stmt = compile("select * from t where a = %u & b = %b & c = %s").unwrap();
        let types: Vec<DataType> = stmt.slots().iter().map(|s| s.data_type).collect();
        assert_eq!(types, vec![DataType::Unsigned, DataType::Blob, DataType::Varchar]);
    }

    #[test]
    fn test_parse_errors() {
        let err = compile("select * t").unwrap_err();
        assert_eq!(err, Error::parse("expected FROM", 9));

        let err = compile("frobnicate t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);

        let err = compile("create table t (a floating)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);

        let err = compile("create table t (a integer(4))").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);

        assert!(compile("insert into t (a, b) values (1)").is_err());
        assert!(compile("select * from t where a").is_err());
        assert!(compile("select * from t limit 1 extra").is_err());
    }

    #[test]
    fn test_parameter_limit() {
        let config = StatementConfig {
            max_parameters: 2,
            ..StatementConfig::default()
        };
        assert!(compile_with("insert into t values (%d, %d)", &config).is_ok());
        let err = compile_with("insert into t values (%d, %d, %d)", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_nesting_limit() {
        let config = StatementConfig {
            max_nesting: 3,
            ..StatementConfig::default()
        };
        assert!(compile_with("select * from t where ((not (a = 1)))", &config).is_err());
        assert!(compile_with("select * from t where ((not a = 1))", &config).is_ok());

        let deep = format!("select * from t where {}a = 1{}", "(".repeat(5000), ")".repeat(5000));
        let err = compile(&deep).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        let bangs = format!("select * from t where {}a = 1", "!".repeat(5000));
        assert_eq!(compile(&bangs).unwrap_err().kind(), ErrorKind::ParseError);
    }
}
