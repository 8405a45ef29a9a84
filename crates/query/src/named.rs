//! Transactions addressed by name.
//!
//! A registry from name to engine transaction handle. Commit and rollback
//! take the name out of the registry before calling the engine, so the name
//! is released even when the engine refuses the operation.

use tracing::debug;
use verdict_core::{Error, Result};
use verdict_index::{KeyOps, KeyedStore, Store};
use verdict_storage::{Engine, TxHandle};

/// Name to handle registry for open transactions.
pub struct NamedTransactions {
    handles: KeyedStore<String, TxHandle>,
}

impl Default for NamedTransactions {
    fn default() -> Self {
        Self::new()
    }
}

impl NamedTransactions {
    pub fn new() -> Self {
        Self {
            handles: KeyedStore::with_capacity(16, KeyOps::natural()),
        }
    }

    /// Begins an engine transaction under `name`.
    ///
    /// A name already in use is a constraint violation; the transaction
    /// begun for it is rolled back again.
    pub fn begin(&mut self, engine: &mut Engine, name: &str) -> Result<TxHandle> {
        let handle = engine.begin()?;
        if self.handles.add(name.to_string(), handle).is_err() {
            engine.rollback(handle)?;
            return Err(Error::constraint(format!("transaction {} already exists", name)));
        }
        debug!(name, handle = %handle, "named transaction begun");
        Ok(handle)
    }

    /// Commits the transaction registered as `name`.
    pub fn commit(&mut self, engine: &mut Engine, name: &str) -> Result<()> {
        let handle = self.take(name)?;
        debug!(name, handle = %handle, "named transaction commit");
        engine.commit(handle)
    }

    /// Rolls back the transaction registered as `name`.
    pub fn rollback(&mut self, engine: &mut Engine, name: &str) -> Result<()> {
        let handle = self.take(name)?;
        debug!(name, handle = %handle, "named transaction rollback");
        engine.rollback(handle)
    }

    /// Returns the handle registered as `name`.
    pub fn get(&self, name: &str) -> Option<TxHandle> {
        self.handles.get(&name.to_string()).copied()
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn take(&mut self, name: &str) -> Result<TxHandle> {
        self.handles
            .remove(&name.to_string())
            .ok_or_else(|| Error::not_found("transaction", name))
    }
}
