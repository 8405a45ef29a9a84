//! Value type definitions for the verdict fact store.
//!
//! This module defines the `Value` enum which represents any value that can be stored
//! in a fact table cell.

use crate::error::{Error, Result};
use crate::types::DataType;
use core::fmt;

/// A value that can be stored in a fact table cell.
///
/// The derived `Ord` orders values by variant first and then by payload,
/// which keeps comparison consistent with the derived `Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),
    /// 32-bit unsigned integer
    Unsigned(u32),
    /// String, stored in both STRING and VARCHAR columns
    String(String),
    /// Binary data
    Blob(Vec<u8>),
    /// Opaque reference
    Reference(u64),
}

impl Value {
    /// Returns the data type of this value.
    ///
    /// Strings report `DataType::String`; VARCHAR columns accept them as well.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Unsigned(_) => DataType::Unsigned,
            Value::String(_) => DataType::String,
            Value::Blob(_) => DataType::Blob,
            Value::Reference(_) => DataType::Reference,
        }
    }

    /// Returns the i32 value if this is an Integer, None otherwise.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the u32 value if this is an Unsigned, None otherwise.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the bytes if this is a Blob, None otherwise.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Returns the raw reference if this is a Reference, None otherwise.
    pub fn as_reference(&self) -> Option<u64> {
        match self {
            Value::Reference(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens a numeric value to i64, None for non-numeric values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Unsigned(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Converts this value to the representation of `target`.
    ///
    /// Integer and unsigned values convert into each other when in range;
    /// strings convert between STRING and VARCHAR. Anything else is a
    /// type mismatch.
    pub fn coerce_to(self, target: DataType) -> Result<Value> {
        let got = self.data_type();
        match (self, target) {
            (v @ Value::Integer(_), DataType::Integer) => Ok(v),
            (v @ Value::Unsigned(_), DataType::Unsigned) => Ok(v),
            (Value::Integer(v), DataType::Unsigned) => u32::try_from(v)
                .map(Value::Unsigned)
                .map_err(|_| Error::type_mismatch(target, got)),
            (Value::Unsigned(v), DataType::Integer) => i32::try_from(v)
                .map(Value::Integer)
                .map_err(|_| Error::type_mismatch(target, got)),
            (v @ Value::String(_), DataType::String | DataType::Varchar) => Ok(v),
            (v @ Value::Blob(_), DataType::Blob) => Ok(v),
            (v @ Value::Reference(_), DataType::Reference) => Ok(v),
            _ => Err(Error::type_mismatch(target, got)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Unsigned(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Blob(v) => {
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Reference(v) => write!(f, "@{:#x}", v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Unsigned(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}
