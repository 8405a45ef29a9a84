//! Compiled statements and parameter binding.

use core::fmt;
use verdict_core::{DataType, Error, Result, Value};
use verdict_storage::{CompareOp, Condition};

/// Right-hand side of a comparison, an insert value or an assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Literal(Value),
    /// Index into the statement's parameter slots.
    Param(usize),
}

impl Operand {
    fn resolve(&self, slots: &[ParamSlot]) -> Result<Value> {
        match self {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Param(i) => slots
                .get(*i)
                .and_then(|s| s.value.clone())
                .ok_or_else(|| Error::invalid_operation(format!("parameter {} is not bound", i))),
        }
    }
}

/// A WHERE clause before parameter substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        operand: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Substitutes bound parameters, producing an engine condition.
    pub fn resolve(&self, slots: &[ParamSlot]) -> Result<Condition> {
        Ok(match self {
            Predicate::Compare { column, op, operand } => {
                Condition::compare(column.as_str(), *op, operand.resolve(slots)?)
            }
            Predicate::And(parts) => Condition::And(
                parts
                    .iter()
                    .map(|p| p.resolve(slots))
                    .collect::<Result<_>>()?,
            ),
            Predicate::Or(parts) => Condition::Or(
                parts
                    .iter()
                    .map(|p| p.resolve(slots))
                    .collect::<Result<_>>()?,
            ),
            Predicate::Not(inner) => Condition::Not(Box::new(inner.resolve(slots)?)),
        })
    }
}

/// A column in a CREATE TABLE statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub size: usize,
}

/// A positional parameter and its current binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSlot {
    pub data_type: DataType,
    pub value: Option<Value>,
}

impl ParamSlot {
    /// Returns the marker the slot was declared with.
    pub fn marker(&self) -> &'static str {
        match self.data_type {
            DataType::String | DataType::Varchar => "%s",
            DataType::Integer => "%d",
            DataType::Unsigned => "%u",
            DataType::Blob => "%b",
            DataType::Reference => "%r",
        }
    }

    fn accepts(&self, data_type: DataType) -> bool {
        match self.data_type {
            DataType::String | DataType::Varchar => {
                matches!(data_type, DataType::String | DataType::Varchar)
            }
            other => other == data_type,
        }
    }
}

/// What a statement does, with its operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatementKind {
    ShowTables,
    Describe {
        table: String,
    },
    CreateTable {
        table: String,
        temporary: bool,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        table: String,
    },
    CreateIndex {
        table: String,
        name: Option<String>,
        unique: bool,
        columns: Vec<String>,
    },
    DropIndex {
        table: String,
        name: String,
    },
    Begin {
        name: String,
    },
    Commit {
        name: String,
    },
    Rollback {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Operand>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        filter: Option<Predicate>,
    },
    Delete {
        table: String,
        filter: Option<Predicate>,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        filter: Option<Predicate>,
        limit: Option<usize>,
        offset: usize,
    },
}

impl StatementKind {
    /// Returns the leading keyword(s) of the statement.
    pub fn verb(&self) -> &'static str {
        match self {
            StatementKind::ShowTables => "SHOW TABLES",
            StatementKind::Describe { .. } => "DESCRIBE",
            StatementKind::CreateTable { .. } => "CREATE TABLE",
            StatementKind::DropTable { .. } => "DROP TABLE",
            StatementKind::CreateIndex { .. } => "CREATE INDEX",
            StatementKind::DropIndex { .. } => "DROP INDEX",
            StatementKind::Begin { .. } => "BEGIN",
            StatementKind::Commit { .. } => "COMMIT",
            StatementKind::Rollback { .. } => "ROLLBACK",
            StatementKind::Insert { .. } => "INSERT",
            StatementKind::Update { .. } => "UPDATE",
            StatementKind::Delete { .. } => "DELETE",
            StatementKind::Select { .. } => "SELECT",
        }
    }
}

/// A compiled statement with its parameter slots.
///
/// Compile once, then bind and execute as often as needed; binding a slot
/// again overwrites the previous value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    kind: StatementKind,
    slots: Vec<ParamSlot>,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, slots: Vec<ParamSlot>) -> Self {
        Self { kind, slots }
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Binds `value` to parameter `slot`.
    ///
    /// `data_type` must be the type the slot was declared with; `%s` slots
    /// take either string type.
    pub fn bind(&mut self, slot: usize, data_type: DataType, value: impl Into<Value>) -> Result<()> {
        let target = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| Error::not_found("parameter", slot.to_string()))?;
        if !target.accepts(data_type) {
            return Err(Error::type_mismatch(target.data_type, data_type));
        }
        let value = value.into();
        data_type.check(&value, 0)?;
        target.value = Some(value);
        Ok(())
    }

    /// Unbinds every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
    }

    /// Returns true if every slot has a value.
    pub fn is_bound(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_some())
    }

    pub(crate) fn value(&self, operand: &Operand) -> Result<Value> {
        operand.resolve(&self.slots)
    }

    pub(crate) fn condition(&self, filter: &Option<Predicate>) -> Result<Condition> {
        filter
            .as_ref()
            .map_or(Ok(Condition::True), |p| p.resolve(&self.slots))
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::Literal(v) => write_literal(f, v),
            Operand::Param(i) => match self.slots.get(*i) {
                Some(slot) => f.write_str(slot.marker()),
                None => f.write_str("%?"),
            },
        }
    }

    fn write_predicate(&self, f: &mut fmt::Formatter<'_>, predicate: &Predicate) -> fmt::Result {
        match predicate {
            Predicate::Compare { column, op, operand } => {
                write!(f, "{} {} ", column, op)?;
                self.write_operand(f, operand)
            }
            Predicate::And(parts) => self.write_group(f, parts, " AND "),
            Predicate::Or(parts) => self.write_group(f, parts, " OR "),
            Predicate::Not(inner) => {
                f.write_str("NOT ")?;
                self.write_predicate(f, inner)
            }
        }
    }

    fn write_group(&self, f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
        f.write_str("(")?;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            self.write_predicate(f, part)?;
        }
        f.write_str(")")
    }

    fn write_where(&self, f: &mut fmt::Formatter<'_>, filter: &Option<Predicate>) -> fmt::Result {
        if let Some(p) = filter {
            f.write_str(" WHERE ")?;
            self.write_predicate(f, p)?;
        }
        Ok(())
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Blob(b) => {
            f.write_str("X'")?;
            for byte in b {
                write!(f, "{:02x}", byte)?;
            }
            f.write_str("'")
        }
        Value::Reference(r) => write!(f, "{}", r),
        other => write!(f, "{}", other),
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    f.write_str("(")?;
    f.write_str(&names.join(", "))?;
    f.write_str(")")
}

impl fmt::Display for Statement {
    /// Prints the normalized statement text; compiling it yields an equal statement.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::ShowTables => f.write_str("SHOW TABLES"),
            StatementKind::Describe { table } => write!(f, "DESCRIBE {}", table),
            StatementKind::CreateTable {
                table,
                temporary,
                columns,
            } => {
                f.write_str("CREATE ")?;
                if *temporary {
                    f.write_str("TEMPORARY ")?;
                }
                write!(f, "TABLE {} (", table)?;
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", c.name, c.data_type)?;
                    if c.data_type.is_sized() {
                        write!(f, "({})", c.size)?;
                    }
                }
                f.write_str(")")
            }
            StatementKind::DropTable { table } => write!(f, "DROP TABLE {}", table),
            StatementKind::CreateIndex {
                table,
                name,
                unique,
                columns,
            } => {
                f.write_str("CREATE ")?;
                if *unique {
                    f.write_str("UNIQUE ")?;
                }
                f.write_str("INDEX ")?;
                if let Some(name) = name {
                    write!(f, "{} ", name)?;
                }
                write!(f, "ON {} ", table)?;
                write_names(f, columns)
            }
            StatementKind::DropIndex { table, name } => write!(f, "DROP INDEX {} ON {}", name, table),
            StatementKind::Begin { name } => write!(f, "BEGIN {}", name),
            StatementKind::Commit { name } => write!(f, "COMMIT {}", name),
            StatementKind::Rollback { name } => write!(f, "ROLLBACK {}", name),
            StatementKind::Insert {
                table,
                columns,
                values,
            } => {
                write!(f, "INSERT INTO {} ", table)?;
                if let Some(columns) = columns {
                    write_names(f, columns)?;
                    f.write_str(" ")?;
                }
                f.write_str("VALUES (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.write_operand(f, v)?;
                }
                f.write_str(")")
            }
            StatementKind::Update {
                table,
                assignments,
                filter,
            } => {
                write!(f, "UPDATE {} SET ", table)?;
                for (i, (column, v)) in assignments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = ", column)?;
                    self.write_operand(f, v)?;
                }
                self.write_where(f, filter)
            }
            StatementKind::Delete { table, filter } => {
                write!(f, "DELETE FROM {}", table)?;
                self.write_where(f, filter)
            }
            StatementKind::Select {
                table,
                columns,
                filter,
                limit,
                offset,
            } => {
                f.write_str("SELECT ")?;
                match columns {
                    Some(columns) => f.write_str(&columns.join(", "))?,
                    None => f.write_str("*")?,
                }
                write!(f, " FROM {}", table)?;
                self.write_where(f, filter)?;
                if let Some(limit) = limit {
                    write!(f, " LIMIT {}", limit)?;
                    if *offset > 0 {
                        write!(f, " OFFSET {}", offset)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::ErrorKind;

    fn select_with_params() -> Statement {
        Statement::new(
            StatementKind::Select {
                table: "temp".into(),
                columns: None,
                filter: Some(Predicate::And(vec![
                    Predicate::Compare {
                        column: "room".into(),
                        op: CompareOp::Eq,
                        operand: Operand::Param(0),
                    },
                    Predicate::Not(Box::new(Predicate::Compare {
                        column: "degrees".into(),
                        op: CompareOp::Lt,
                        operand: Operand::Param(1),
                    })),
                ])),
                limit: Some(3),
                offset: 1,
            },
            vec![
                ParamSlot {
                    data_type: DataType::Varchar,
                    value: None,
                },
                ParamSlot {
                    data_type: DataType::Integer,
                    value: None,
                },
            ],
        )
    }

    #[test]
    fn test_display_normalized() {
        assert_eq!(
            select_with_params().to_string(),
            "SELECT * FROM temp WHERE (room = %s AND NOT degrees < %d) LIMIT 3 OFFSET 1"
        );
    }

    #[test]
    fn test_literal_escapes() {
        let stmt = Statement::new(
            StatementKind::Insert {
                table: "t".into(),
                columns: Some(vec!["a".into(), "b".into()]),
                values: vec![
                    Operand::Literal("it's".into()),
                    Operand::Literal(Value::Blob(vec![0, 255])),
                ],
            },
            Vec::new(),
        );
        assert_eq!(stmt.to_string(), "INSERT INTO t (a, b) VALUES ('it''s', X'00ff')");
    }

    #[test]
    fn test_bind_checks_slot_and_type() {
        let mut stmt = select_with_params();
        assert!(!stmt.is_bound());

        let err = stmt.bind(2, DataType::Integer, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = stmt.bind(1, DataType::Unsigned, 1u32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = stmt.bind(1, DataType::Integer, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        stmt.bind(0, DataType::String, "hall").unwrap();
        stmt.bind(1, DataType::Integer, 18).unwrap();
        assert!(stmt.is_bound());

        stmt.bind(1, DataType::Integer, 20).unwrap();
        assert_eq!(stmt.slots()[1].value, Some(Value::Integer(20)));

        stmt.clear();
        assert!(!stmt.is_bound());
    }

    #[test]
    fn test_resolve_substitutes_params() {
        let mut stmt = select_with_params();
        let filter = match stmt.kind() {
            StatementKind::Select { filter, .. } => filter.clone(),
            _ => unreachable!(),
        };
        assert_eq!(
            stmt.condition(&filter).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );

        stmt.bind(0, DataType::Varchar, "hall").unwrap();
        stmt.bind(1, DataType::Integer, 18).unwrap();
        let expected = Condition::eq("room", "hall")
            .and(Condition::compare("degrees", CompareOp::Lt, 18).not());
        assert_eq!(stmt.condition(&filter).unwrap(), expected);
        assert_eq!(stmt.condition(&None).unwrap(), Condition::True);
    }
}
