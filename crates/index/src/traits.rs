//! Store trait definitions.
//!
//! This module defines the `Store` trait shared by the keyed and ordered stores.

use thiserror::Error as ThisError;
use verdict_core::Error;

/// Errors raised by the store structures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum IndexError {
    /// An equal key is already present.
    #[error("duplicate key")]
    DuplicateKey,
    /// The store was rehashed since the cursor started; restart the traversal.
    #[error("cursor invalidated by rehash")]
    StaleCursor,
    /// No more slots can be allocated.
    #[error("store capacity exhausted")]
    Exhausted,
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DuplicateKey => Error::constraint("duplicate key"),
            IndexError::StaleCursor => Error::invalid_handle("cursor invalidated by rehash"),
            IndexError::Exhausted => Error::exhausted("store capacity exhausted"),
        }
    }
}

/// Common contract of the keyed and ordered stores.
///
/// Traversal goes through an explicit cursor. Starting from a fresh cursor
/// begins a new traversal; removing the element most recently returned is
/// always safe.
pub trait Store<K, V> {
    /// Cursor type for this store.
    type Cursor: Default;

    /// Adds an entry, failing if an equal key is already present.
    fn add(&mut self, key: K, value: V) -> Result<(), IndexError>;

    /// Removes an entry, returning its value.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Looks up an entry.
    fn get(&self, key: &K) -> Option<&V>;

    /// Advances the cursor, returning the next entry or `None` at the end.
    fn iterate<'a>(&'a self, cursor: &mut Self::Cursor) -> Result<Option<(&'a K, &'a V)>, IndexError>;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if an equal key is present.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}
