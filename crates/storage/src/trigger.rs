//! Trigger registration and dispatch.
//!
//! Listeners are registered at one of four scopes. Transaction and table
//! listeners live in the engine; row and column listeners live in the table
//! they observe and go away with it. Nothing is dispatched until an outer
//! commit, so listeners only ever see committed changes.

use crate::condition::{Bound, Condition};
use verdict_core::schema::Table;
use verdict_core::{Result, Row, Value};

/// A committed change delivered to a listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// An outer transaction committed. `tables` lists the tables whose
    /// stamp was set to `stamp` by this commit.
    TransactionEnd { stamp: u64, tables: Vec<String> },
    TableCreated { table: String },
    TableDropped { table: String },
    RowInserted { table: String, row: Vec<Value> },
    RowDeleted { table: String, row: Vec<Value> },
    RowUpdated {
        table: String,
        before: Vec<Value>,
        after: Vec<Value>,
    },
    /// An update changed one watched column.
    ColumnChanged {
        table: String,
        column: String,
        before: Value,
        after: Value,
        row: Vec<Value>,
    },
}

/// Receiver of committed changes.
pub trait TriggerListener {
    fn on_event(&mut self, event: &TriggerEvent);
}

impl<F> TriggerListener for F
where
    F: FnMut(&TriggerEvent),
{
    fn on_event(&mut self, event: &TriggerEvent) {
        self(event)
    }
}

/// Identifies one registration; pass it to `Engine::remove_trigger`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerToken(pub(crate) u64);

impl TriggerToken {
    /// Returns the raw token id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Options for row and column listeners.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowTrigger {
    /// Only rows matching this condition, before or after the change, are reported.
    pub filter: Option<Condition>,
    /// Columns copied into the event; all columns when absent.
    pub select: Option<Vec<String>>,
}

impl RowTrigger {
    /// Creates options that report every row with every column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts reports to rows matching `condition`.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Restricts the reported columns.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

/// A net committed change to one row.
#[derive(Clone, Debug)]
pub(crate) struct RowChange {
    pub before: Option<Row>,
    pub after: Option<Row>,
}

pub(crate) struct Registered {
    pub id: u64,
    pub listener: Box<dyn TriggerListener>,
}

/// A row or column listener bound to its table's schema.
pub(crate) struct RowListener {
    id: u64,
    column: Option<usize>,
    filter: Option<Bound>,
    select: Option<Vec<usize>>,
    listener: Box<dyn TriggerListener>,
}

impl RowListener {
    pub(crate) fn bind(
        id: u64,
        schema: &Table,
        column: Option<&str>,
        options: &RowTrigger,
        max_conditions: usize,
        listener: Box<dyn TriggerListener>,
    ) -> Result<Self> {
        let column = column.map(|c| schema.column(c).map(|c| c.index())).transpose()?;
        let filter = options
            .filter
            .as_ref()
            .map(|c| Bound::bind(c, schema, max_conditions))
            .transpose()?;
        let select = options
            .select
            .as_ref()
            .map(|cols| schema.column_positions(cols))
            .transpose()?;
        Ok(Self {
            id,
            column,
            filter,
            select,
            listener,
        })
    }

    fn accepts(&self, change: &RowChange) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => [&change.before, &change.after]
                .into_iter()
                .flatten()
                .any(|row| filter.matches(row.values())),
        }
    }

    fn payload(&self, row: &Row) -> Vec<Value> {
        match &self.select {
            Some(positions) => row.project(positions),
            None => row.values().to_vec(),
        }
    }
}

/// Listeners registered against one table.
#[derive(Default)]
pub(crate) struct TableTriggers {
    rows: Vec<RowListener>,
    columns: Vec<RowListener>,
}

impl TableTriggers {
    pub(crate) fn add(&mut self, listener: RowListener) {
        if listener.column.is_some() {
            self.columns.push(listener);
        } else {
            self.rows.push(listener);
        }
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.rows.len() + self.columns.len();
        self.rows.retain(|l| l.id != id);
        self.columns.retain(|l| l.id != id);
        before != self.rows.len() + self.columns.len()
    }

    /// Returns the ids of every listener on the table.
    pub(crate) fn ids(&self) -> Vec<u64> {
        self.rows.iter().chain(&self.columns).map(|l| l.id).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    /// Delivers one row change: row listeners first, then column listeners.
    ///
    /// Returns the number of events delivered.
    pub(crate) fn dispatch(&mut self, schema: &Table, change: &RowChange) -> usize {
        let table = schema.name();
        let mut fired = 0;
        for l in &mut self.rows {
            if !l.accepts(change) {
                continue;
            }
            let event = match (&change.before, &change.after) {
                (None, Some(after)) => TriggerEvent::RowInserted {
                    table: table.to_string(),
                    row: l.payload(after),
                },
                (Some(before), None) => TriggerEvent::RowDeleted {
                    table: table.to_string(),
                    row: l.payload(before),
                },
                (Some(before), Some(after)) => TriggerEvent::RowUpdated {
                    table: table.to_string(),
                    before: l.payload(before),
                    after: l.payload(after),
                },
                (None, None) => continue,
            };
            l.listener.on_event(&event);
            fired += 1;
        }

        let (before, after) = match (&change.before, &change.after) {
            (Some(b), Some(a)) => (b, a),
            _ => return fired,
        };
        for l in &mut self.columns {
            let Some(pos) = l.column else { continue };
            let (old, new) = match (before.get(pos), after.get(pos)) {
                (Some(old), Some(new)) if old != new => (old, new),
                _ => continue,
            };
            if !l.accepts(change) {
                continue;
            }
            let event = TriggerEvent::ColumnChanged {
                table: table.to_string(),
                column: schema.columns()[pos].name().to_string(),
                before: old.clone(),
                after: new.clone(),
                row: l.payload(after),
            };
            l.listener.on_event(&event);
            fired += 1;
        }
        fired
    }
}

/// Listeners registered against the whole engine.
#[derive(Default)]
pub(crate) struct GlobalTriggers {
    pub transaction: Vec<Registered>,
    pub table: Vec<Registered>,
}

impl GlobalTriggers {
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.transaction.len() + self.table.len();
        self.transaction.retain(|r| r.id != id);
        self.table.retain(|r| r.id != id);
        before != self.transaction.len() + self.table.len()
    }

    pub(crate) fn dispatch_table(&mut self, event: &TriggerEvent) -> usize {
        for r in &mut self.table {
            r.listener.on_event(event);
        }
        self.table.len()
    }

    pub(crate) fn dispatch_transaction(&mut self, event: &TriggerEvent) -> usize {
        for r in &mut self.transaction {
            r.listener.on_event(event);
        }
        self.transaction.len()
    }
}
