//! Verdict Resolver - Incremental target evaluation over verdict fact tables.
//!
//! Targets are named values derived from fact tables and from other
//! targets. Each target carries an update script; the resolver re-runs a
//! script when the committed data it depends on changes, in dependency
//! order, each run inside its own engine transaction.
//!
//! - `ruleset`: target declarations and their scripts
//! - `token` / `script`: script scanning, compilation and evaluation
//! - `context`: variable frames
//! - `builtins`: functions callable from scripts
//! - `graph`: dependency graph and topological order
//! - `resolver`: change tracking and evaluation passes
//!
//! # Example
//!
//! ```rust
//! use verdict_core::schema::TableBuilder;
//! use verdict_core::{DataType, Value};
//! use verdict_resolver::{Resolver, ResolverConfig};
//! use verdict_storage::Engine;
//!
//! let mut engine = Engine::new();
//! let schema = TableBuilder::new("temp")
//!     .unwrap()
//!     .add_column("degrees", DataType::Integer, 0)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let temp = engine.create_table(schema).unwrap();
//! engine.insert(temp, None, vec![Value::Integer(18)]).unwrap();
//!
//! let rules = "
//! target avg_temp
//!   depends on $temp
//!   update script
//!     expose(avg($temp, 'degrees'))
//!   end script
//! ";
//! let mut resolver =
//!     Resolver::from_ruleset(&mut engine, "climate.rules", rules, ResolverConfig::default()).unwrap();
//! assert_eq!(resolver.value(&mut engine, "avg_temp").unwrap(), Some(Value::Integer(18)));
//!
//! engine.insert(temp, None, vec![Value::Integer(22)]).unwrap();
//! assert_eq!(resolver.value(&mut engine, "avg_temp").unwrap(), Some(Value::Integer(20)));
//! ```

pub mod builtins;
pub mod config;
pub mod context;
pub mod graph;
pub mod resolver;
pub mod ruleset;
pub mod script;
pub mod target;
pub mod token;

pub use builtins::{CallContext, Function, Functions};
pub use config::ResolverConfig;
pub use context::Context;
pub use graph::{DependencyGraph, Sorted};
pub use resolver::{Report, Resolver};
pub use ruleset::{parse_ruleset, ScriptText, TargetDef};
pub use script::{compile, compile_with, Script};
pub use target::{Target, TargetState};
pub use token::{Token, TokenKind, TokenValue};
