//! Data type definitions for the verdict fact store.
//!
//! This module defines the closed set of column types.

use crate::error::{Error, Result};
use crate::value::Value;
use core::fmt;

/// Supported column data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// 32-bit signed integer
    Integer,
    /// 32-bit unsigned integer
    Unsigned,
    /// Fixed-capacity string, the column size is mandatory
    String,
    /// Variable-length string, a size of 0 means unbounded
    Varchar,
    /// Binary blob, the column size is mandatory
    Blob,
    /// Opaque 64-bit reference
    Reference,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 6] = [
        DataType::Integer,
        DataType::Unsigned,
        DataType::String,
        DataType::Varchar,
        DataType::Blob,
        DataType::Reference,
    ];

    /// Returns the keyword used for this type in statement text.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Unsigned => "UNSIGNED",
            DataType::String => "STRING",
            DataType::Varchar => "VARCHAR",
            DataType::Blob => "BLOB",
            DataType::Reference => "REFERENCE",
        }
    }

    /// Parses a type keyword, case-insensitively.
    pub fn from_name(name: &str) -> Result<DataType> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::invalid_schema(format!("unsupported datatype: {}", name)))
    }

    /// Returns whether a column of this type must declare a non-zero size.
    pub fn requires_size(&self) -> bool {
        matches!(self, DataType::String | DataType::Blob)
    }

    /// Returns whether a column of this type carries a size at all.
    pub fn is_sized(&self) -> bool {
        matches!(self, DataType::String | DataType::Varchar | DataType::Blob)
    }

    /// Returns the value a column of this type takes when an insert omits it.
    pub fn default_value(&self) -> Value {
        match self {
            DataType::Integer => Value::Integer(0),
            DataType::Unsigned => Value::Unsigned(0),
            DataType::String | DataType::Varchar => Value::String(String::new()),
            DataType::Blob => Value::Blob(Vec::new()),
            DataType::Reference => Value::Reference(0),
        }
    }

    /// Checks that `value` can be stored in a column of this type and size.
    pub fn check(&self, value: &Value, size: usize) -> Result<()> {
        let got = value.data_type();
        let compatible = match self {
            DataType::String | DataType::Varchar => got == DataType::String,
            other => *other == got,
        };
        if !compatible {
            return Err(Error::type_mismatch(*self, got));
        }
        let len = match value {
            Value::String(s) => s.len(),
            Value::Blob(b) => b.len(),
            _ => return Ok(()),
        };
        if size > 0 && len > size {
            return Err(Error::constraint(format!(
                "{} value of length {} exceeds column size {}",
                self, len, size
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
