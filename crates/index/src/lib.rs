//! Verdict Index - Store structures for the verdict fact store.
//!
//! This crate provides the low-level containers the engine is built on:
//!
//! - `KeyedStore`: chained hash table driven by pluggable per-datatype key operations
//! - `OrderedStore`: keyed container iterated in insertion, priority or key order
//! - `HandleTable`: arena of generation-checked handles to owned objects
//! - `KeyOps`: hash/compare/print function table for a key type
//!
//! # Example
//!
//! ```rust
//! use verdict_index::{Cursor, KeyOps, KeyedStore, Order, OrderedStore, Store};
//!
//! let mut keyed: KeyedStore<u32, &str> = KeyedStore::with_capacity(8, KeyOps::natural());
//! keyed.add(10, "ten").unwrap();
//! keyed.add(20, "twenty").unwrap();
//! assert_eq!(keyed.get(&10), Some(&"ten"));
//! assert!(keyed.add(10, "again").is_err());
//!
//! let mut cursor = Cursor::new();
//! let mut seen = 0;
//! while let Some((_, _)) = keyed.iterate(&mut cursor).unwrap() {
//!     seen += 1;
//! }
//! assert_eq!(seen, 2);
//!
//! let mut ordered: OrderedStore<u32, &str> = OrderedStore::new(Order::Key, KeyOps::natural());
//! ordered.add(3, "c").unwrap();
//! ordered.add(1, "a").unwrap();
//! let keys: Vec<u32> = ordered.iter().map(|(k, _)| *k).collect();
//! assert_eq!(keys, vec![1, 3]);
//! ```

pub mod handle;
pub mod keyed;
pub mod keyops;
pub mod ordered;
pub mod stats;
pub mod traits;

pub use handle::{Handle, HandleTable};
pub use keyed::{Cursor, KeyedStore};
pub use keyops::KeyOps;
pub use ordered::{Order, OrderedCursor, OrderedStore};
pub use stats::StoreStats;
pub use traits::{IndexError, Store};
