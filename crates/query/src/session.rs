//! Statement execution against an engine.

use crate::config::StatementConfig;
use crate::named::NamedTransactions;
use crate::parser::compile_with;
use crate::result::{columns_text, list_text, ColumnInfo, QueryResult, ResultKind, RowSet};
use crate::statement::{Statement, StatementKind};
use tracing::{debug, warn};
use verdict_core::schema::{IndexDef, TableBuilder};
use verdict_core::{Error, Result, Value};
use verdict_storage::{Engine, TxHandle};

/// An engine together with the named transactions opened through it.
pub struct Session {
    engine: Engine,
    transactions: NamedTransactions,
    config: StatementConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Engine::new())
    }
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        Self::with_config(engine, StatementConfig::default())
    }

    pub fn with_config(engine: Engine, config: StatementConfig) -> Self {
        Self {
            engine,
            transactions: NamedTransactions::new(),
            config,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    pub fn transactions(&self) -> &NamedTransactions {
        &self.transactions
    }

    /// Compiles statement text with this session's limits.
    pub fn compile(&self, text: &str) -> Result<Statement> {
        compile_with(text, &self.config)
    }

    /// Compiles and executes `text`, taking whatever result it produces.
    pub fn run(&mut self, text: &str) -> Result<QueryResult> {
        let statement = self.compile(text)?;
        self.execute(&statement, ResultKind::DontCare)
    }

    pub fn begin(&mut self, name: &str) -> Result<TxHandle> {
        self.transactions.begin(&mut self.engine, name)
    }

    pub fn commit(&mut self, name: &str) -> Result<()> {
        self.transactions.commit(&mut self.engine, name)
    }

    pub fn rollback(&mut self, name: &str) -> Result<()> {
        self.transactions.rollback(&mut self.engine, name)
    }

    /// Executes a statement, shaping the result as `kind` asks.
    ///
    /// Every parameter slot must be bound. Asking for a shape the statement
    /// cannot produce is an invalid operation and nothing is executed.
    pub fn execute(&mut self, statement: &Statement, kind: ResultKind) -> Result<QueryResult> {
        if let Some(slot) = statement.slots().iter().position(|s| s.value.is_none()) {
            return Err(Error::invalid_operation(format!("parameter {} is not bound", slot)));
        }
        let natural = natural_kind(statement.kind());
        if !produces(natural, kind) {
            return Err(Error::invalid_operation(format!(
                "{} cannot produce a {:?} result",
                statement.kind().verb(),
                kind
            )));
        }
        debug!(statement = %statement, "executing");
        let result = self.dispatch(statement).map_err(|err| {
            warn!(statement = %statement, error = %err, "statement failed");
            err
        })?;
        Ok(match (kind, result) {
            (ResultKind::Text, QueryResult::Rows(rows)) => QueryResult::Text(rows.to_text()),
            (ResultKind::Text, QueryResult::Columns(columns)) => QueryResult::Text(columns_text(&columns)),
            (ResultKind::Text, QueryResult::List(items)) => QueryResult::Text(list_text(&items)),
            (_, result) => result,
        })
    }

    fn dispatch(&mut self, statement: &Statement) -> Result<QueryResult> {
        let engine = &mut self.engine;
        match statement.kind() {
            StatementKind::ShowTables => Ok(QueryResult::List(engine.table_names())),
            StatementKind::Describe { table } => {
                let handle = engine.table(table)?;
                let schema = engine.schema(handle)?;
                Ok(QueryResult::Columns(
                    schema.columns().iter().map(ColumnInfo::from).collect(),
                ))
            }
            StatementKind::CreateTable {
                table,
                temporary,
                columns,
            } => {
                let mut builder = TableBuilder::new(table.as_str())?.temporary(*temporary);
                for c in columns {
                    builder = builder.add_column(c.name.as_str(), c.data_type, c.size)?;
                }
                engine.create_table(builder.build()?)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::DropTable { table } => {
                let handle = engine.table(table)?;
                engine.drop_table(handle)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::CreateIndex {
                table,
                name,
                unique,
                columns,
            } => {
                let handle = engine.table(table)?;
                let def = match name {
                    Some(name) => IndexDef::new(name.as_str(), columns.clone(), *unique),
                    None => IndexDef::auto(table, columns.clone(), *unique),
                };
                engine.create_index(handle, def)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::DropIndex { table, name } => {
                let handle = engine.table(table)?;
                engine.drop_index(handle, name)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::Begin { name } => {
                self.transactions.begin(engine, name)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::Commit { name } => {
                self.transactions.commit(engine, name)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::Rollback { name } => {
                self.transactions.rollback(engine, name)?;
                Ok(QueryResult::Status { affected: 0 })
            }
            StatementKind::Insert {
                table,
                columns,
                values,
            } => {
                let handle = engine.table(table)?;
                let values = values
                    .iter()
                    .map(|v| statement.value(v))
                    .collect::<Result<Vec<Value>>>()?;
                let columns: Option<Vec<&str>> =
                    columns.as_ref().map(|c| c.iter().map(String::as_str).collect());
                engine.insert(handle, columns.as_deref(), values)?;
                Ok(QueryResult::Status { affected: 1 })
            }
            StatementKind::Update {
                table,
                assignments,
                filter,
            } => {
                let handle = engine.table(table)?;
                let condition = statement.condition(filter)?;
                let assignments = assignments
                    .iter()
                    .map(|(c, v)| Ok((c.as_str(), statement.value(v)?)))
                    .collect::<Result<Vec<(&str, Value)>>>()?;
                let affected = engine.update(handle, &condition, &assignments)?;
                Ok(QueryResult::Status { affected })
            }
            StatementKind::Delete { table, filter } => {
                let handle = engine.table(table)?;
                let affected = engine.delete(handle, &statement.condition(filter)?)?;
                Ok(QueryResult::Status { affected })
            }
            StatementKind::Select {
                table,
                columns,
                filter,
                limit,
                offset,
            } => {
                let handle = engine.table(table)?;
                let schema = engine.schema(handle)?;
                let info: Vec<ColumnInfo> = match columns {
                    Some(names) => names
                        .iter()
                        .map(|n| schema.column(n).map(ColumnInfo::from))
                        .collect::<Result<_>>()?,
                    None => schema.columns().iter().map(ColumnInfo::from).collect(),
                };
                let columns: Option<Vec<&str>> =
                    columns.as_ref().map(|c| c.iter().map(String::as_str).collect());
                let max_rows = limit.unwrap_or(engine.config().max_result_rows);
                let rows = engine.select(
                    handle,
                    &statement.condition(filter)?,
                    columns.as_deref(),
                    max_rows,
                    *offset,
                )?;
                Ok(QueryResult::Rows(RowSet::new(info, rows)))
            }
        }
    }
}

fn natural_kind(kind: &StatementKind) -> ResultKind {
    match kind {
        StatementKind::ShowTables => ResultKind::List,
        StatementKind::Describe { .. } => ResultKind::Columns,
        StatementKind::Select { .. } => ResultKind::Rows,
        _ => ResultKind::Status,
    }
}

fn produces(natural: ResultKind, wanted: ResultKind) -> bool {
    match wanted {
        ResultKind::DontCare => true,
        ResultKind::Text => natural != ResultKind::Status,
        other => other == natural,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::{DataType, ErrorKind};

    fn session() -> Session {
        let mut session = Session::default();
        session
            .run("create table temp (id integer, state varchar(8))")
            .unwrap();
        session.run("insert into temp values (1, 'cold')").unwrap();
        session
    }

    #[test]
    fn test_rollback_scenario() {
        let mut s = session();
        s.begin("t").unwrap();
        s.run("update temp set state = 'hot' where id = 1").unwrap();
        s.rollback("t").unwrap();

        let result = s.run("select state from temp where id = 1").unwrap();
        let rows = result.rows().unwrap();
        assert_eq!(rows.rows(), &[vec![Value::from("cold")]]);
        assert_eq!(rows.columns()[0].data_type, DataType::Varchar);
    }

    #[test]
    fn test_transaction_statements() {
        let mut s = session();
        s.run("begin work").unwrap();
        s.run("insert into temp values (2, 'warm')").unwrap();
        assert_eq!(s.transactions().names(), vec!["work".to_string()]);
        s.run("commit work").unwrap();
        assert!(s.transactions().is_empty());
        assert_eq!(s.engine().row_count(s.engine().table("temp").unwrap()).unwrap(), 2);

        let err = s.run("rollback work").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_prepared_statement() {
        let mut s = session();
        let mut insert = s.compile("insert into temp (id, state) values (%d, %s)").unwrap();

        let err = s.execute(&insert, ResultKind::DontCare).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        for (id, state) in [(2, "warm"), (3, "hot")] {
            insert.bind(0, DataType::Integer, id).unwrap();
            insert.bind(1, DataType::Varchar, state).unwrap();
            let result = s.execute(&insert, ResultKind::Status).unwrap();
            assert_eq!(result.affected(), Some(1));
        }

        let mut select = s.compile("select id from temp where state != %s").unwrap();
        select.bind(0, DataType::String, "cold").unwrap();
        let result = s.execute(&select, ResultKind::Rows).unwrap();
        assert_eq!(
            result.rows().unwrap().rows(),
            &[vec![Value::Integer(2)], vec![Value::Integer(3)]]
        );
    }

    #[test]
    fn test_result_kinds() {
        let mut s = session();
        let describe = s.compile("describe temp").unwrap();
        let columns = s.execute(&describe, ResultKind::Columns).unwrap();
        assert_eq!(columns.columns().unwrap().len(), 2);
        let text = s.execute(&describe, ResultKind::Text).unwrap();
        assert_eq!(
            text.text().unwrap(),
            "column type\n------ ----------\nid     INTEGER\nstate  VARCHAR(8)\n"
        );

        let err = s.execute(&describe, ResultKind::Rows).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let insert = s.compile("insert into temp values (5, 'x')").unwrap();
        let err = s.execute(&insert, ResultKind::Text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(s.engine().row_count(s.engine().table("temp").unwrap()).unwrap(), 1);

        let tables = s.run("show tables").unwrap();
        assert_eq!(tables.list().unwrap(), &["temp".to_string()]);
    }

    #[test]
    fn test_update_delete_counts() {
        let mut s = session();
        s.run("insert into temp values (2, 'cold')").unwrap();
        s.run("insert into temp values (3, 'hot')").unwrap();
        let updated = s.run("update temp set state = 'warm' where state = 'cold'").unwrap();
        assert_eq!(updated.affected(), Some(2));
        let deleted = s.run("delete from temp where id > 1").unwrap();
        assert_eq!(deleted.affected(), Some(2));
        let rest = s.run("select * from temp").unwrap();
        assert_eq!(rest.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_index_statements_and_limits() {
        let mut s = session();
        for id in 2..=6 {
            s.run(&format!("insert into temp values ({}, 'x')", id)).unwrap();
        }
        s.run("create unique index on temp (id)").unwrap();
        let err = s.run("insert into temp values (3, 'dup')").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        let page = s.run("select id from temp where id >= 2 limit 2 offset 1").unwrap();
        assert_eq!(
            page.rows().unwrap().rows(),
            &[vec![Value::Integer(3)], vec![Value::Integer(4)]]
        );
        s.run("drop index temp_id on temp").unwrap();
        s.run("insert into temp values (3, 'dup')").unwrap();
    }

    #[test]
    fn test_schema_errors_surface() {
        let mut s = Session::default();
        let err = s.run("create table t (name string)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
        let err = s.run("select * from missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        s.run("create temporary table t (name string(4))").unwrap();
        let err = s.run("select nope from t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        s.run("drop table t").unwrap();
        assert!(s.run("show tables").unwrap().list().unwrap().is_empty());
    }
}
