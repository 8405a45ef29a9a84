//! Statement results.

use core::fmt;
use verdict_core::schema::Column;
use verdict_core::{DataType, Value};

/// The result shape a caller asks `Session::execute` for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Whatever the statement naturally produces.
    #[default]
    DontCare,
    Status,
    Columns,
    Rows,
    Text,
    List,
}

/// Name, type and size of a result column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub size: usize,
}

impl ColumnInfo {
    /// Returns the type as written in statement text.
    pub fn type_text(&self) -> String {
        if self.data_type.is_sized() {
            format!("{}({})", self.data_type, self.size)
        } else {
            self.data_type.to_string()
        }
    }
}

impl From<&Column> for ColumnInfo {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name().to_string(),
            data_type: column.data_type(),
            size: column.size(),
        }
    }
}

/// Selected rows with their column descriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowSet {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the cell at `row`, `column`.
    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Looks a column up by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Renders the rows as an aligned text table.
    pub fn to_text(&self) -> String {
        let headers: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();
        render_table(&headers, &cells)
    }
}

/// Outcome of executing a statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    /// A mutation or control statement and the rows it touched.
    Status { affected: usize },
    Columns(Vec<ColumnInfo>),
    Rows(RowSet),
    Text(String),
    List(Vec<String>),
}

impl QueryResult {
    /// Returns the shape of this result.
    pub fn kind(&self) -> ResultKind {
        match self {
            QueryResult::Status { .. } => ResultKind::Status,
            QueryResult::Columns(_) => ResultKind::Columns,
            QueryResult::Rows(_) => ResultKind::Rows,
            QueryResult::Text(_) => ResultKind::Text,
            QueryResult::List(_) => ResultKind::List,
        }
    }

    pub fn affected(&self) -> Option<usize> {
        match self {
            QueryResult::Status { affected } => Some(*affected),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn columns(&self) -> Option<&[ColumnInfo]> {
        match self {
            QueryResult::Columns(columns) => Some(columns),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&[String]> {
        match self {
            QueryResult::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            QueryResult::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Status { affected } => write!(f, "{} row(s) affected", affected),
            QueryResult::Columns(columns) => f.write_str(&columns_text(columns)),
            QueryResult::Rows(rows) => f.write_str(&rows.to_text()),
            QueryResult::Text(text) => f.write_str(text),
            QueryResult::List(items) => f.write_str(&list_text(items)),
        }
    }
}

pub(crate) fn columns_text(columns: &[ColumnInfo]) -> String {
    let headers = vec!["column".to_string(), "type".to_string()];
    let cells: Vec<Vec<String>> = columns
        .iter()
        .map(|c| vec![c.name.clone(), c.type_text()])
        .collect();
    render_table(&headers, &cells)
}

pub(crate) fn list_text(items: &[String]) -> String {
    let cells: Vec<Vec<String>> = items.iter().map(|i| vec![i.clone()]).collect();
    render_table(&["table".to_string()], &cells)
}

/// Lays out a header, a dashed rule and the rows in left-aligned columns.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let mut out = String::new();
        for (i, (cell, w)) in cells.iter().zip(&widths).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(cell);
            let pad = w.saturating_sub(cell.chars().count());
            out.extend(core::iter::repeat(' ').take(pad));
        }
        out.trim_end().to_string()
    };

    let mut out = line(headers);
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(&rule));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, data_type: DataType, size: usize) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            data_type,
            size,
        }
    }

    #[test]
    fn test_rows_text_is_aligned() {
        let rows = RowSet::new(
            vec![info("room", DataType::Varchar, 16), info("degrees", DataType::Integer, 0)],
            vec![
                vec!["kitchen".into(), Value::Integer(21)],
                vec!["hall".into(), Value::Integer(-4)],
            ],
        );
        assert_eq!(
            rows.to_text(),
            "room    degrees\n------- -------\nkitchen 21\nhall    -4\n"
        );
        assert_eq!(rows.column_index("degrees"), Some(1));
        assert_eq!(rows.get(1, 0), Some(&Value::from("hall")));
    }

    #[test]
    fn test_columns_and_list_text() {
        let text = columns_text(&[info("id", DataType::Integer, 0), info("state", DataType::Varchar, 8)]);
        assert_eq!(text, "column type\n------ ----------\nid     INTEGER\nstate  VARCHAR(8)\n");
        assert_eq!(list_text(&["temp".into()]), "table\n-----\ntemp\n");
    }

    #[test]
    fn test_accessors() {
        let result = QueryResult::Status { affected: 3 };
        assert_eq!(result.kind(), ResultKind::Status);
        assert_eq!(result.affected(), Some(3));
        assert!(result.rows().is_none());
        assert_eq!(result.to_string(), "3 row(s) affected");
        assert_eq!(QueryResult::List(vec![]).list(), Some(&[][..]));
    }
}
