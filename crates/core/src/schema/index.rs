//! Index definition for fact table schemas.

/// An index definition in a table schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name, unique within its table.
    name: String,
    /// Indexed column names, in key order.
    columns: Vec<String>,
    /// Whether this index enforces uniqueness.
    unique: bool,
}

impl IndexDef {
    /// Creates a new index definition.
    pub fn new(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }

    /// Creates an index definition named after its table and columns.
    pub fn auto(table: &str, columns: Vec<String>, unique: bool) -> Self {
        let name = format!("{}_{}", table, columns.join("_"));
        Self::new(name, columns, unique)
    }

    /// Returns the index name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed columns.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns whether this index is unique.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}
