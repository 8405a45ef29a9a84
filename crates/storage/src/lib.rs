//! Verdict Storage - Fact table engine for the verdict policy store.
//!
//! This crate provides the transactional store the resolver reads facts from:
//!
//! - `Engine`: named tables, row operations, nested transactions and triggers
//! - `FactTable`: rows of one table plus its secondary indices
//! - `Condition`: row filters over column values
//! - `Journal` / `TableDiff`: undo log and net per-row change of a transaction
//! - `TriggerEvent`: committed changes delivered to registered listeners
//!
//! # Example
//!
//! ```rust
//! use verdict_core::schema::TableBuilder;
//! use verdict_core::{DataType, Value};
//! use verdict_storage::{Condition, Engine};
//!
//! let mut engine = Engine::new();
//! let schema = TableBuilder::new("temp")
//!     .unwrap()
//!     .add_column("room", DataType::Varchar, 16)
//!     .unwrap()
//!     .add_column("state", DataType::Varchar, 8)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let temp = engine.create_table(schema).unwrap();
//! engine.insert(temp, None, vec!["kitchen".into(), "cold".into()]).unwrap();
//!
//! let tx = engine.begin().unwrap();
//! engine
//!     .update(temp, &Condition::eq("room", "kitchen"), &[("state", "hot".into())])
//!     .unwrap();
//! engine.rollback(tx).unwrap();
//!
//! let rows = engine.select(temp, &Condition::True, Some(&["state"]), 10, 0).unwrap();
//! assert_eq!(rows, vec![vec![Value::from("cold")]]);
//! ```

pub mod condition;
pub mod config;
pub mod engine;
pub mod journal;
pub mod table;
pub mod transaction;
pub mod trigger;

pub use condition::{CompareOp, Condition};
pub use config::EngineConfig;
pub use engine::Engine;
pub use journal::{Journal, JournalEntry, TableDiff, TableHandle};
pub use table::{FactTable, TableIndex};
pub use transaction::{TxHandle, TxStack};
pub use trigger::{RowTrigger, TriggerEvent, TriggerListener, TriggerToken};
