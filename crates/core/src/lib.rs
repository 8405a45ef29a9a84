//! Verdict Core - Core types and schema definitions for the verdict fact store.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - `DataType`: The closed set of column types (Integer, Unsigned, String, Varchar, Blob, Reference)
//! - `Value`: Runtime values that can be stored in a fact table cell
//! - `Row`: A fixed-arity tuple of values with a table-local identifier
//! - `schema`: Schema definitions (Column, Table, TableBuilder, IndexDef)
//! - `Error`: The error taxonomy used across the engine, statement layer and resolver
//!
//! # Example
//!
//! ```rust
//! use verdict_core::{DataType, Value, Row};
//! use verdict_core::schema::TableBuilder;
//!
//! let table = TableBuilder::new("temp")
//!     .unwrap()
//!     .add_column("id", DataType::Integer, 0)
//!     .unwrap()
//!     .add_column("state", DataType::Varchar, 16)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let row = Row::new(1, vec![Value::Integer(1), Value::String("cold".into())]);
//!
//! assert_eq!(table.columns().len(), 2);
//! assert_eq!(row.get(1), Some(&Value::String("cold".into())));
//! ```

mod error;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, ErrorKind, Result};
pub use row::{Row, RowId};
pub use types::DataType;
pub use value::Value;
