//! Verdict Query - Statement layer for the verdict fact store.
//!
//! This crate compiles a small statement language into typed statements
//! with bindable parameters and runs them against a fact table engine:
//!
//! - `lexer` / `parser`: statement text to `Statement`
//! - `statement`: statement kinds, parameter slots and binding
//! - `session`: execution against an `Engine`
//! - `result`: result shapes and text rendering
//! - `named`: transactions addressed by name
//!
//! # Example
//!
//! ```rust
//! use verdict_core::{DataType, Value};
//! use verdict_query::{ResultKind, Session};
//!
//! let mut session = Session::default();
//! session.run("CREATE TABLE temp (id INTEGER, state VARCHAR(8))").unwrap();
//!
//! let mut insert = session.compile("INSERT INTO temp VALUES (%d, %s)").unwrap();
//! insert.bind(0, DataType::Integer, 1).unwrap();
//! insert.bind(1, DataType::Varchar, "cold").unwrap();
//! session.execute(&insert, ResultKind::Status).unwrap();
//!
//! let result = session.run("SELECT state FROM temp WHERE id = 1").unwrap();
//! assert_eq!(result.rows().unwrap().rows(), &[vec![Value::from("cold")]]);
//! ```

pub mod config;
pub mod lexer;
pub mod named;
pub mod parser;
pub mod result;
pub mod session;
pub mod statement;

pub use config::StatementConfig;
pub use named::NamedTransactions;
pub use parser::{compile, compile_with};
pub use result::{ColumnInfo, QueryResult, ResultKind, RowSet};
pub use session::Session;
pub use statement::{ColumnDef, Operand, ParamSlot, Predicate, Statement, StatementKind};
