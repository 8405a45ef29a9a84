//! Row structure for the verdict fact store.
//!
//! This module defines the `Row` struct which represents a single fact in a table.

use crate::value::Value;

/// Table-local identifier for a row.
///
/// Row ids are assigned by the owning table and never leave the engine as a
/// way to address rows; callers select rows by key values.
pub type RowId = u64;

/// A row in a fact table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    /// Identifier, unique within the owning table.
    id: RowId,
    /// Values stored in this row, indexed by column position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given ID and values.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Sets a value at the given column index.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Copies the values at the given column positions.
    pub fn project(&self, columns: &[usize]) -> Vec<Value> {
        columns
            .iter()
            .filter_map(|&i| self.values.get(i).cloned())
            .collect()
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
