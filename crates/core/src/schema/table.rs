//! Table definition for fact table schemas.

use super::column::Column;
use super::index::IndexDef;
use crate::error::{Error, Result};
use crate::types::DataType;

/// A table definition in the fact store schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    name: String,
    /// Column definitions.
    columns: Vec<Column>,
    /// Index definitions, in creation order.
    indices: Vec<IndexDef>,
    /// Whether the table was declared TEMPORARY.
    temporary: bool,
}

impl Table {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the indices.
    #[inline]
    pub fn indices(&self) -> &[IndexDef] {
        &self.indices
    }

    /// Returns whether the table is temporary.
    #[inline]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column index by name.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Resolves a column name, failing with `NotFound`.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.get_column(name)
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    /// Resolves a list of column names to positions.
    pub fn column_positions<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| self.column(n.as_ref()).map(|c| c.index()))
            .collect()
    }

    /// Gets an index by name.
    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indices.iter().find(|i| i.name() == name)
    }

    /// Adds an index definition after checking its columns and name.
    pub fn add_index(&mut self, index: IndexDef) -> Result<()> {
        TableBuilder::check_naming_rules(index.name())?;
        if index.columns().is_empty() {
            return Err(Error::invalid_schema("index needs at least one column"));
        }
        for col in index.columns() {
            self.column(col)?;
        }
        if self.get_index(index.name()).is_some() {
            return Err(Error::constraint(format!(
                "index {} already exists on {}",
                index.name(),
                self.name
            )));
        }
        self.indices.push(index);
        Ok(())
    }

    /// Removes an index definition by name.
    pub fn remove_index(&mut self, name: &str) -> Result<IndexDef> {
        let pos = self
            .indices
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| Error::not_found("index", format!("{}.{}", self.name, name)))?;
        Ok(self.indices.remove(pos))
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    indices: Vec<IndexDef>,
    temporary: bool,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            indices: Vec::new(),
            temporary: false,
        })
    }

    /// Validates a name follows naming rules.
    pub fn check_naming_rules(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return Err(Error::invalid_schema("name cannot be empty")),
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "name must start with letter or underscore: {}",
                name
            )));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    /// Adds a column to the table.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType, size: usize) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!("duplicate column: {}", name)));
        }
        let column = Column::new(name, data_type, size);
        column.validate()?;
        self.columns.push(column);
        Ok(self)
    }

    /// Adds an index over the named columns.
    pub fn add_index(mut self, name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.indices.push(IndexDef::new(name, columns, unique));
        self
    }

    /// Marks the table temporary.
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "table {} has no columns",
                self.name
            )));
        }
        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();
        let mut table = Table {
            name: self.name,
            columns,
            indices: Vec::new(),
            temporary: self.temporary,
        };
        for index in self.indices {
            table.add_index(index)?;
        }
        Ok(table)
    }
}
