//! Column definition for fact table schemas.

use crate::error::{Error, Result};
use crate::types::DataType;
use crate::value::Value;

/// A column definition in a table schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    name: String,
    /// Data type of the column.
    data_type: DataType,
    /// Declared size for sized types, 0 otherwise.
    size: usize,
    /// Column index in the table (0-based).
    index: usize,
}

impl Column {
    /// Creates a new column definition.
    ///
    /// The size is ignored for unsized types.
    pub fn new(name: impl Into<String>, data_type: DataType, size: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: if data_type.is_sized() { size } else { 0 },
            index: 0,
        }
    }

    /// Sets the column index.
    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the declared size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the column index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Checks the column definition itself.
    pub fn validate(&self) -> Result<()> {
        if self.data_type.requires_size() && self.size == 0 {
            return Err(Error::invalid_schema(format!(
                "column {} of type {} needs a non-zero size",
                self.name, self.data_type
            )));
        }
        Ok(())
    }

    /// Checks a value against this column's type and size.
    pub fn check(&self, value: &Value) -> Result<()> {
        self.data_type.check(value, self.size)
    }

    /// Returns the type as written in statement text, e.g. `VARCHAR(16)`.
    pub fn type_text(&self) -> String {
        if self.data_type.is_sized() {
            format!("{}({})", self.data_type, self.size)
        } else {
            self.data_type.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_new() {
        let col = Column::new("id", DataType::Integer, 4);
        assert_eq!(col.name(), "id");
        assert_eq!(col.data_type(), DataType::Integer);
        assert_eq!(col.size(), 0);
        assert_eq!(col.type_text(), "INTEGER");
    }

    #[test]
    fn test_column_validate() {
        assert!(Column::new("s", DataType::String, 8).validate().is_ok());
        assert!(Column::new("s", DataType::String, 0).validate().is_err());
        assert!(Column::new("b", DataType::Blob, 0).validate().is_err());
        assert!(Column::new("v", DataType::Varchar, 0).validate().is_ok());
    }

    #[test]
    fn test_column_type_text() {
        assert_eq!(Column::new("s", DataType::Varchar, 12).type_text(), "VARCHAR(12)");
    }
}
