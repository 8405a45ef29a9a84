//! Schema module for the verdict fact store.
//!
//! This module contains the schema definitions for fact tables: columns,
//! tables and index definitions.

mod column;
mod index;
mod table;

pub use column::Column;
pub use index::IndexDef;
pub use table::{Table, TableBuilder};
