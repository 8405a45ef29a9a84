//! The fact table engine.
//!
//! `Engine` owns every table, the transaction stack and the trigger
//! registry. Mutations apply immediately and are journaled; the outer
//! commit stamps the changed tables and dispatches triggers, and a rollback
//! replays the journal backwards.

use crate::condition::{Bound, Condition};
use crate::config::EngineConfig;
use crate::journal::{Journal, JournalEntry, TableDiff, TableHandle};
use crate::table::FactTable;
use crate::transaction::{TxHandle, TxStack};
use crate::trigger::{
    GlobalTriggers, Registered, RowListener, RowTrigger, TriggerEvent, TriggerListener,
    TriggerToken,
};
use hashbrown::HashMap;
use tracing::{debug, info, warn};
use verdict_core::schema::{IndexDef, Table};
use verdict_core::{Error, Result, Row, Value};
use verdict_index::{HandleTable, KeyOps, KeyedStore, Store};

#[derive(Clone, Copy, Debug)]
enum TriggerScope {
    Global,
    Table(TableHandle),
}

/// In-memory store of fact tables with nested transactions and triggers.
pub struct Engine {
    config: EngineConfig,
    tables: HandleTable<FactTable>,
    names: KeyedStore<String, TableHandle>,
    tx: TxStack,
    triggers: GlobalTriggers,
    scopes: HashMap<u64, TriggerScope>,
    next_trigger: u64,
    clock: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with default limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given limits.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            tx: TxStack::new(config.max_transaction_depth),
            names: KeyedStore::with_capacity(config.initial_capacity, KeyOps::natural()),
            config,
            tables: HandleTable::new(),
            triggers: GlobalTriggers::default(),
            scopes: HashMap::new(),
            next_trigger: 1,
            clock: 0,
        }
    }

    /// Returns the engine limits.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves a table name.
    pub fn table(&self, name: &str) -> Result<TableHandle> {
        self.names
            .get(&name.to_string())
            .copied()
            .ok_or_else(|| Error::table_not_found(name))
    }

    fn live(&self, table: TableHandle) -> Result<&FactTable> {
        self.tables
            .get(table)
            .filter(|t| !t.is_dropped())
            .ok_or_else(|| Error::invalid_handle(format!("table handle {} is stale", table)))
    }

    fn live_mut(&mut self, table: TableHandle) -> Result<&mut FactTable> {
        self.tables
            .get_mut(table)
            .filter(|t| !t.is_dropped())
            .ok_or_else(|| Error::invalid_handle(format!("table handle {} is stale", table)))
    }

    /// Returns a table's schema.
    pub fn schema(&self, table: TableHandle) -> Result<&Table> {
        Ok(self.live(table)?.schema())
    }

    /// Returns the names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of rows in a table.
    pub fn row_count(&self, table: TableHandle) -> Result<usize> {
        Ok(self.live(table)?.len())
    }

    /// Returns the stamp of a table's last committed change.
    pub fn stamp(&self, table: TableHandle) -> Result<u64> {
        Ok(self.live(table)?.stamp())
    }

    /// Returns the stamp of the named table, or 0 if it does not exist.
    pub fn table_stamp(&self, name: &str) -> u64 {
        self.table(name)
            .and_then(|h| self.stamp(h))
            .unwrap_or(0)
    }

    /// Returns the most recent commit stamp.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Creates a table from a schema.
    pub fn create_table(&mut self, schema: Table) -> Result<TableHandle> {
        if schema.columns().len() > self.config.max_columns {
            return Err(Error::exhausted(format!(
                "table {} has {} columns, limit is {}",
                schema.name(),
                schema.columns().len(),
                self.config.max_columns
            )));
        }
        if self.names.contains_key(&schema.name().to_string()) {
            return Err(Error::constraint(format!("table {} already exists", schema.name())));
        }
        self.autocommit(|engine| {
            let name = schema.name().to_string();
            let table = FactTable::new(schema, engine.config.initial_capacity)?;
            let handle = engine.tables.insert(table)?;
            if let Err(err) = engine.names.add(name.clone(), handle) {
                engine.tables.remove(handle);
                return Err(err.into());
            }
            engine.record(JournalEntry::CreateTable { table: handle });
            info!(table = %name, handle = %handle, "table created");
            Ok(handle)
        })
    }

    /// Drops a table.
    ///
    /// Fails if an open transaction has pending row changes on it.
    pub fn drop_table(&mut self, table: TableHandle) -> Result<()> {
        let name = self.live(table)?.name().to_string();
        if self.tx.journals().any(|j| j.touches_rows(table)) {
            return Err(Error::invalid_operation(format!(
                "table {} has pending changes in an open transaction",
                name
            )));
        }
        self.autocommit(|engine| {
            engine.live_mut(table)?.set_dropped(true);
            engine.names.remove(&name);
            engine.record(JournalEntry::DropTable { table });
            info!(table = %name, "table dropped");
            Ok(())
        })
    }

    /// Adds an index to a table, filling it from the existing rows.
    pub fn create_index(&mut self, table: TableHandle, def: IndexDef) -> Result<()> {
        self.autocommit(|engine| {
            let name = def.name().to_string();
            engine.live_mut(table)?.create_index(def)?;
            debug!(index = %name, "index created");
            engine.record(JournalEntry::CreateIndex { table, name });
            Ok(())
        })
    }

    /// Removes an index from a table.
    pub fn drop_index(&mut self, table: TableHandle, name: &str) -> Result<()> {
        self.autocommit(|engine| {
            let def = engine.live_mut(table)?.drop_index(name)?;
            engine.record(JournalEntry::DropIndex { table, def });
            Ok(())
        })
    }

    /// Inserts one row.
    ///
    /// With `columns`, values are given for those columns only and the rest
    /// take their type's default.
    pub fn insert(&mut self, table: TableHandle, columns: Option<&[&str]>, values: Vec<Value>) -> Result<()> {
        self.insert_many(table, columns, vec![values]).map(|_| ())
    }

    /// Inserts a batch of rows; either all are inserted or none.
    pub fn insert_many(
        &mut self,
        table: TableHandle,
        columns: Option<&[&str]>,
        rows: Vec<Vec<Value>>,
    ) -> Result<usize> {
        self.autocommit(|engine| {
            let t = engine.live_mut(table)?;
            let positions = columns.map(|c| t.schema().column_positions(c)).transpose()?;
            let mut added: Vec<Row> = Vec::with_capacity(rows.len());
            for values in rows {
                let result = match t.make_row(positions.as_deref(), values) {
                    Ok(row) => t.insert_row(row.clone()).map(|_| row),
                    Err(err) => Err(err),
                };
                match result {
                    Ok(row) => added.push(row),
                    Err(err) => {
                        for row in added.iter().rev() {
                            t.remove_row(row.id());
                        }
                        return Err(err);
                    }
                }
            }
            let count = added.len();
            for row in added {
                engine.record(JournalEntry::Insert { table, row });
            }
            Ok(count)
        })
    }

    /// Selects matching rows, projected to `columns` (all when `None`).
    ///
    /// At most `max_rows` rows are returned after skipping `offset`;
    /// `max_rows` is clamped to the configured result limit.
    pub fn select(
        &self,
        table: TableHandle,
        condition: &Condition,
        columns: Option<&[&str]>,
        max_rows: usize,
        offset: usize,
    ) -> Result<Vec<Vec<Value>>> {
        let t = self.live(table)?;
        let positions = columns.map(|c| t.schema().column_positions(c)).transpose()?;
        let rows = self.select_rows_from(t, condition, max_rows, offset)?;
        Ok(rows
            .into_iter()
            .map(|row| match &positions {
                Some(p) => row.project(p),
                None => row.values().to_vec(),
            })
            .collect())
    }

    /// Selects matching rows whole.
    pub fn select_rows(&self, table: TableHandle, condition: &Condition) -> Result<Vec<Row>> {
        let t = self.live(table)?;
        self.select_rows_from(t, condition, self.config.max_result_rows, 0)
    }

    fn select_rows_from(
        &self,
        t: &FactTable,
        condition: &Condition,
        max_rows: usize,
        offset: usize,
    ) -> Result<Vec<Row>> {
        let bound = Bound::bind(condition, t.schema(), self.config.max_conditions)?;
        let limit = max_rows.min(self.config.max_result_rows);
        Ok(t.matching_ids(&bound)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| t.get(id).cloned())
            .collect())
    }

    /// Visits every matching row, ignoring `max_result_rows`.
    pub fn for_each_row<F>(&self, table: TableHandle, condition: &Condition, mut f: F) -> Result<()>
    where
        F: FnMut(&Row) -> Result<()>,
    {
        let t = self.live(table)?;
        let bound = Bound::bind(condition, t.schema(), self.config.max_conditions)?;
        for id in t.matching_ids(&bound) {
            if let Some(row) = t.get(id) {
                f(row)?;
            }
        }
        Ok(())
    }

    /// Counts matching rows.
    pub fn count(&self, table: TableHandle, condition: &Condition) -> Result<usize> {
        let t = self.live(table)?;
        let bound = Bound::bind(condition, t.schema(), self.config.max_conditions)?;
        Ok(t.matching_ids(&bound).len())
    }

    /// Sets columns on every matching row; either all rows change or none.
    pub fn update(
        &mut self,
        table: TableHandle,
        condition: &Condition,
        assignments: &[(&str, Value)],
    ) -> Result<usize> {
        self.autocommit(|engine| {
            let max_conditions = engine.config.max_conditions;
            let t = engine.live_mut(table)?;
            let bound = Bound::bind(condition, t.schema(), max_conditions)?;
            let mut sets = Vec::with_capacity(assignments.len());
            for (column, value) in assignments {
                let col = t.schema().column(column)?;
                let value = value.clone().coerce_to(col.data_type())?;
                col.check(&value)?;
                sets.push((col.index(), value));
            }

            let targets: Vec<Row> = t
                .matching_ids(&bound)
                .into_iter()
                .filter_map(|id| t.get(id).cloned())
                .map(|mut row| {
                    for (pos, value) in &sets {
                        row.set(*pos, value.clone());
                    }
                    row
                })
                .collect();

            let mut applied: Vec<(Row, Row)> = Vec::with_capacity(targets.len());
            for new in targets {
                match t.replace_row(new.clone()) {
                    Ok(old) => applied.push((old, new)),
                    Err(err) => {
                        for (old, _) in applied.into_iter().rev() {
                            if let Err(undo) = t.replace_row(old) {
                                warn!(error = %undo, "failed to revert partial update");
                            }
                        }
                        return Err(err);
                    }
                }
            }
            let count = applied.len();
            for (old, new) in applied {
                engine.record(JournalEntry::Update { table, old, new });
            }
            Ok(count)
        })
    }

    /// Deletes every matching row.
    pub fn delete(&mut self, table: TableHandle, condition: &Condition) -> Result<usize> {
        self.autocommit(|engine| {
            let max_conditions = engine.config.max_conditions;
            let t = engine.live_mut(table)?;
            let bound = Bound::bind(condition, t.schema(), max_conditions)?;
            let removed: Vec<Row> = t
                .matching_ids(&bound)
                .into_iter()
                .filter_map(|id| t.remove_row(id))
                .collect();
            let count = removed.len();
            for row in removed {
                engine.record(JournalEntry::Delete { table, row });
            }
            Ok(count)
        })
    }

    /// Returns the number of open transactions.
    pub fn depth(&self) -> usize {
        self.tx.depth()
    }

    /// Opens a transaction, nested in any already open.
    pub fn begin(&mut self) -> Result<TxHandle> {
        let handle = self.tx.begin()?;
        debug!(depth = handle.depth(), "transaction begin");
        Ok(handle)
    }

    /// Commits the innermost transaction.
    ///
    /// Changes become visible to listeners only when the outer transaction
    /// commits.
    pub fn commit(&mut self, handle: TxHandle) -> Result<()> {
        match self.tx.commit(handle)? {
            None => {
                debug!(depth = handle.depth(), "nested transaction commit");
                Ok(())
            }
            Some(journal) => {
                self.finish(journal);
                Ok(())
            }
        }
    }

    /// Rolls back `handle`'s transaction and every transaction nested in it.
    pub fn rollback(&mut self, handle: TxHandle) -> Result<()> {
        let journals = self.tx.rollback(handle)?;
        let mut undone = 0;
        for journal in journals {
            for entry in journal.into_entries().into_iter().rev() {
                self.undo(entry);
                undone += 1;
            }
        }
        debug!(depth = handle.depth(), undone, "transaction rollback");
        Ok(())
    }

    fn autocommit<R>(&mut self, op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.tx.depth() > 0 {
            return op(self);
        }
        let handle = self.begin()?;
        match op(self) {
            Ok(value) => {
                self.commit(handle)?;
                Ok(value)
            }
            Err(err) => {
                self.rollback(handle)?;
                Err(err)
            }
        }
    }

    fn record(&mut self, entry: JournalEntry) {
        match self.tx.journal_mut() {
            Some(journal) => journal.record(entry),
            None => warn!("change recorded outside a transaction"),
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        let result = match entry {
            JournalEntry::Insert { table, row } => {
                if let Some(t) = self.tables.get_mut(table) {
                    t.remove_row(row.id());
                }
                Ok(())
            }
            JournalEntry::Update { table, old, .. } => match self.tables.get_mut(table) {
                Some(t) => t.replace_row(old).map(|_| ()),
                None => Ok(()),
            },
            JournalEntry::Delete { table, row } => match self.tables.get_mut(table) {
                Some(t) => t.insert_row(row),
                None => Ok(()),
            },
            JournalEntry::CreateTable { table } => {
                if let Some(t) = self.tables.remove(table) {
                    self.names.remove(&t.name().to_string());
                    self.release_table_triggers(&t);
                }
                Ok(())
            }
            JournalEntry::DropTable { table } => match self.tables.get_mut(table) {
                Some(t) => {
                    t.set_dropped(false);
                    let name = t.name().to_string();
                    self.names.add(name, table).map_err(Error::from)
                }
                None => Ok(()),
            },
            JournalEntry::CreateIndex { table, name } => match self.tables.get_mut(table) {
                Some(t) => t.drop_index(&name).map(|_| ()),
                None => Ok(()),
            },
            JournalEntry::DropIndex { table, def } => match self.tables.get_mut(table) {
                Some(t) => t.create_index(def),
                None => Ok(()),
            },
        };
        if let Err(err) = result {
            warn!(error = %err, "rollback step failed");
        }
    }

    /// Completes an outer commit: stamps, releases dropped tables, fires triggers.
    fn finish(&mut self, journal: Journal) {
        let entries = journal.into_entries();
        let changes = TableDiff::from_entries(&entries).into_changes();

        let mut changed: Vec<TableHandle> = Vec::new();
        let created = entries.iter().filter_map(|e| match e {
            JournalEntry::CreateTable { table } => Some(*table),
            _ => None,
        });
        for handle in changes.iter().map(|(t, _)| *t).chain(created) {
            if !changed.contains(&handle) && self.live(handle).is_ok() {
                changed.push(handle);
            }
        }
        if !changed.is_empty() {
            self.clock += 1;
        }
        let stamp = self.clock;
        let mut stamped = Vec::with_capacity(changed.len());
        for handle in &changed {
            if let Some(t) = self.tables.get_mut(*handle) {
                t.set_stamp(stamp);
                stamped.push(t.name().to_string());
            }
        }

        let mut lifecycle = Vec::new();
        for entry in &entries {
            match entry {
                JournalEntry::CreateTable { table } => {
                    if let Some(t) = self.tables.get(*table) {
                        lifecycle.push(TriggerEvent::TableCreated {
                            table: t.name().to_string(),
                        });
                    }
                }
                JournalEntry::DropTable { table } => {
                    if let Some(t) = self.tables.get(*table) {
                        lifecycle.push(TriggerEvent::TableDropped {
                            table: t.name().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        for entry in &entries {
            if let JournalEntry::DropTable { table } = entry {
                let dropped = self.tables.get(*table).map_or(false, |t| t.is_dropped());
                if dropped {
                    if let Some(t) = self.tables.remove(*table) {
                        self.release_table_triggers(&t);
                    }
                }
            }
        }

        let mut fired = 0;
        for (handle, change) in &changes {
            if let Some(t) = self.tables.get_mut(*handle) {
                fired += t.dispatch(change);
            }
        }
        for event in &lifecycle {
            fired += self.triggers.dispatch_table(event);
        }
        let end = TriggerEvent::TransactionEnd {
            stamp,
            tables: stamped,
        };
        fired += self.triggers.dispatch_transaction(&end);
        debug!(stamp, rows = changes.len(), fired, "transaction commit");
    }

    fn next_token(&mut self, scope: TriggerScope) -> TriggerToken {
        let id = self.next_trigger;
        self.next_trigger += 1;
        self.scopes.insert(id, scope);
        TriggerToken(id)
    }

    fn release_table_triggers(&mut self, table: &FactTable) {
        if table.triggers.is_empty() {
            return;
        }
        for id in table.triggers.ids() {
            self.scopes.remove(&id);
        }
    }

    /// Registers a listener for transaction commits.
    pub fn on_transaction(&mut self, listener: impl TriggerListener + 'static) -> TriggerToken {
        let token = self.next_token(TriggerScope::Global);
        self.triggers.transaction.push(Registered {
            id: token.0,
            listener: Box::new(listener),
        });
        token
    }

    /// Registers a listener for table creation and drop.
    pub fn on_table(&mut self, listener: impl TriggerListener + 'static) -> TriggerToken {
        let token = self.next_token(TriggerScope::Global);
        self.triggers.table.push(Registered {
            id: token.0,
            listener: Box::new(listener),
        });
        token
    }

    /// Registers a listener for committed row changes in one table.
    pub fn on_row(
        &mut self,
        table: TableHandle,
        options: RowTrigger,
        listener: impl TriggerListener + 'static,
    ) -> Result<TriggerToken> {
        self.register_row_listener(table, None, options, Box::new(listener))
    }

    /// Registers a listener for committed changes to one column.
    pub fn on_column(
        &mut self,
        table: TableHandle,
        column: &str,
        options: RowTrigger,
        listener: impl TriggerListener + 'static,
    ) -> Result<TriggerToken> {
        self.register_row_listener(table, Some(column), options, Box::new(listener))
    }

    fn register_row_listener(
        &mut self,
        table: TableHandle,
        column: Option<&str>,
        options: RowTrigger,
        listener: Box<dyn TriggerListener>,
    ) -> Result<TriggerToken> {
        let id = self.next_trigger;
        let max_conditions = self.config.max_conditions;
        let t = self.live_mut(table)?;
        let bound = RowListener::bind(id, t.schema(), column, &options, max_conditions, listener)?;
        t.triggers.add(bound);
        Ok(self.next_token(TriggerScope::Table(table)))
    }

    /// Deregisters a listener.
    pub fn remove_trigger(&mut self, token: TriggerToken) -> Result<()> {
        let removed = match self.scopes.remove(&token.0) {
            Some(TriggerScope::Global) => self.triggers.remove(token.0),
            Some(TriggerScope::Table(table)) => self
                .tables
                .get_mut(table)
                .map_or(false, |t| t.triggers.remove(token.0)),
            None => false,
        };
        if removed {
            Ok(())
        } else {
            Err(Error::not_found("trigger", token.0.to_string()))
        }
    }

    /// Renders one table's schema and rows.
    pub fn dump_table(&self, table: TableHandle) -> Result<String> {
        Ok(self.live(table)?.dump())
    }

    /// Renders every table, by name.
    pub fn dump(&self) -> String {
        self.table_names()
            .iter()
            .filter_map(|name| self.table(name).ok())
            .filter_map(|h| self.dump_table(h).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
