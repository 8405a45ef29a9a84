//! Fact table storage.
//!
//! This module provides `FactTable`, which keeps a table's rows keyed by row
//! id together with its secondary indices. Row ids grow monotonically, so
//! the row store iterated in key order is the insertion order, and a row
//! restored under its old id returns to its old position.

use crate::condition::{Bound, CompareOp};
use crate::trigger::{RowChange, TableTriggers};
use core::cmp::Ordering;
use core::fmt::Write;
use verdict_core::schema::{IndexDef, Table};
use verdict_core::{Error, Result, Row, RowId, Value};
use verdict_index::{KeyOps, Order, OrderedStore, Store};

/// A secondary index over one or more columns.
pub struct TableIndex {
    def: IndexDef,
    positions: Vec<usize>,
    entries: OrderedStore<Vec<Value>, Vec<RowId>>,
}

impl TableIndex {
    fn new(def: IndexDef, schema: &Table) -> Result<Self> {
        let positions = schema.column_positions(def.columns())?;
        Ok(Self {
            def,
            positions,
            entries: OrderedStore::new(Order::Key, KeyOps::composite()),
        })
    }

    /// Returns the index definition.
    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    /// Returns the indexed column positions, leading column first.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    fn key_of(&self, values: &[Value]) -> Vec<Value> {
        self.positions
            .iter()
            .filter_map(|&p| values.get(p).cloned())
            .collect()
    }

    /// Returns true if adding `key` for a row other than `owner` breaks uniqueness.
    fn conflicts(&self, key: &Vec<Value>, owner: Option<RowId>) -> bool {
        if !self.def.is_unique() {
            return false;
        }
        match self.entries.get(key) {
            Some(ids) => ids.iter().any(|id| Some(*id) != owner),
            None => false,
        }
    }

    fn add(&mut self, key: Vec<Value>, id: RowId) {
        match self.entries.get_mut(&key) {
            Some(ids) => {
                if let Err(at) = ids.binary_search(&id) {
                    ids.insert(at, id);
                }
            }
            None => {
                // The key is known to be absent, so the add cannot collide.
                let _ = self.entries.add(key, vec![id]);
            }
        }
    }

    fn remove(&mut self, key: &Vec<Value>, id: RowId) {
        let emptied = match self.entries.get_mut(key) {
            Some(ids) => {
                ids.retain(|x| *x != id);
                ids.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove(key);
        }
    }

    fn conflict_error(&self, table: &str, key: &Vec<Value>) -> Error {
        Error::constraint(format!(
            "duplicate key {} in unique index {} on {}",
            KeyOps::composite().display(key),
            self.def.name(),
            table
        ))
    }
}

/// Access path chosen for a bound condition.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Plan {
    /// Walk every row in insertion order.
    Scan,
    /// Walk one index from `start` while keys keep `prefix`.
    Index {
        index: usize,
        prefix: Vec<Value>,
        start: Vec<Value>,
        upper: Option<(CompareOp, Value)>,
    },
}

/// One fact table: schema, rows, indices and row-level triggers.
pub struct FactTable {
    schema: Table,
    rows: OrderedStore<RowId, Row>,
    indices: Vec<TableIndex>,
    next_row_id: RowId,
    stamp: u64,
    dropped: bool,
    pub(crate) triggers: TableTriggers,
}

impl FactTable {
    /// Creates an empty table, building the indices its schema declares.
    pub fn new(schema: Table, capacity_hint: usize) -> Result<Self> {
        let indices = schema
            .indices()
            .iter()
            .map(|def| TableIndex::new(def.clone(), &schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            rows: OrderedStore::with_capacity(Order::Key, capacity_hint, KeyOps::natural()),
            indices,
            next_row_id: 1,
            stamp: 0,
            dropped: false,
            triggers: TableTriggers::default(),
        })
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &Table {
        &self.schema
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the stamp of the last committed change.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub(crate) fn set_stamp(&mut self, stamp: u64) {
        self.stamp = stamp;
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub(crate) fn set_dropped(&mut self, dropped: bool) {
        self.dropped = dropped;
    }

    /// Returns the secondary indices in creation order.
    pub fn indices(&self) -> &[TableIndex] {
        &self.indices
    }

    /// Looks up a row by id.
    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Iterates over rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().map(|(_, row)| row)
    }

    /// Builds a row from values for the given column positions.
    ///
    /// Columns not listed take their type's default value. Every value is
    /// coerced to its column type and checked against the column size.
    pub(crate) fn make_row(&mut self, positions: Option<&[usize]>, values: Vec<Value>) -> Result<Row> {
        let columns = self.schema.columns();
        let mut full: Vec<Value> = columns.iter().map(|c| c.data_type().default_value()).collect();
        match positions {
            Some(positions) => {
                if positions.len() != values.len() {
                    return Err(Error::invalid_operation(format!(
                        "{} columns named but {} values given",
                        positions.len(),
                        values.len()
                    )));
                }
                for (&p, v) in positions.iter().zip(values) {
                    full[p] = v;
                }
            }
            None => {
                if values.len() != columns.len() {
                    return Err(Error::invalid_operation(format!(
                        "table {} has {} columns but {} values given",
                        self.schema.name(),
                        columns.len(),
                        values.len()
                    )));
                }
                full = values;
            }
        }
        let full = self.check_values(full)?;
        let id = self.next_row_id;
        self.next_row_id += 1;
        Ok(Row::new(id, full))
    }

    /// Coerces and checks a full set of row values.
    pub(crate) fn check_values(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        values
            .into_iter()
            .zip(self.schema.columns())
            .map(|(v, col)| {
                let v = v.coerce_to(col.data_type())?;
                col.check(&v)?;
                Ok(v)
            })
            .collect()
    }

    /// Adds a row, keeping every unique index unique.
    ///
    /// Nothing is changed when an index rejects the row.
    pub(crate) fn insert_row(&mut self, row: Row) -> Result<()> {
        if self.rows.contains_key(&row.id()) {
            return Err(Error::invalid_operation(format!("row id {} already exists", row.id())));
        }
        for index in &self.indices {
            let key = index.key_of(row.values());
            if index.conflicts(&key, None) {
                return Err(index.conflict_error(self.schema.name(), &key));
            }
        }
        for index in &mut self.indices {
            let key = index.key_of(row.values());
            index.add(key, row.id());
        }
        self.rows.add(row.id(), row)?;
        Ok(())
    }

    /// Removes a row and its index entries.
    pub(crate) fn remove_row(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        for index in &mut self.indices {
            let key = index.key_of(row.values());
            index.remove(&key, id);
        }
        Some(row)
    }

    /// Replaces the row with `row.id()`, returning the previous row.
    pub(crate) fn replace_row(&mut self, row: Row) -> Result<Row> {
        let id = row.id();
        let old = self
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("row", format!("{}#{}", self.schema.name(), id)))?;
        for index in &self.indices {
            let key = index.key_of(row.values());
            if index.conflicts(&key, Some(id)) {
                return Err(index.conflict_error(self.schema.name(), &key));
            }
        }
        for index in &mut self.indices {
            let old_key = index.key_of(old.values());
            let new_key = index.key_of(row.values());
            if old_key != new_key {
                index.remove(&old_key, id);
                index.add(new_key, id);
            }
        }
        if let Some(slot) = self.rows.get_mut(&id) {
            *slot = row;
        }
        Ok(old)
    }

    /// Adds an index and fills it from the existing rows.
    ///
    /// A unique index fails with `ConstraintViolation` if existing rows
    /// already collide; the table is left without the index.
    pub(crate) fn create_index(&mut self, def: IndexDef) -> Result<()> {
        let mut index = TableIndex::new(def.clone(), &self.schema)?;
        for (id, row) in self.rows.iter() {
            let key = index.key_of(row.values());
            if index.conflicts(&key, None) {
                return Err(index.conflict_error(self.schema.name(), &key));
            }
            index.add(key, *id);
        }
        self.schema.add_index(def)?;
        self.indices.push(index);
        Ok(())
    }

    /// Removes an index by name.
    pub(crate) fn drop_index(&mut self, name: &str) -> Result<IndexDef> {
        let def = self.schema.remove_index(name)?;
        self.indices.retain(|i| i.def.name() != name);
        Ok(def)
    }

    /// Chooses an access path for a bound condition.
    ///
    /// An index scores one point per leading column constrained by
    /// equality, plus one if the next column carries a range bound. The
    /// highest score wins; ties go to the index created first. A score of
    /// zero falls back to a scan.
    pub(crate) fn plan(&self, condition: &Bound) -> Plan {
        let conjuncts = condition.conjuncts();
        let eq_value = |pos: usize| {
            conjuncts
                .iter()
                .find(|(p, op, _)| *p == pos && *op == CompareOp::Eq)
                .map(|(_, _, v)| (*v).clone())
        };
        let range_at = |pos: usize| {
            conjuncts
                .iter()
                .find(|(p, op, _)| *p == pos && op.is_range())
                .map(|(_, op, v)| (*op, (*v).clone()))
        };

        let mut best: Option<(usize, usize, Vec<Value>, Option<(CompareOp, Value)>)> = None;
        for (i, index) in self.indices.iter().enumerate() {
            let mut prefix = Vec::new();
            for &pos in &index.positions {
                match eq_value(pos) {
                    Some(v) => prefix.push(v),
                    None => break,
                }
            }
            let range = index.positions.get(prefix.len()).and_then(|&pos| range_at(pos));
            let score = prefix.len() + usize::from(range.is_some());
            if score > 0 && best.as_ref().map_or(true, |(s, ..)| score > *s) {
                best = Some((score, i, prefix, range));
            }
        }

        match best {
            None => Plan::Scan,
            Some((_, index, prefix, range)) => {
                let mut start = prefix.clone();
                let mut upper = None;
                match range {
                    Some((CompareOp::Gt | CompareOp::Ge, v)) => start.push(v),
                    Some((op, v)) => upper = Some((op, v)),
                    None => {}
                }
                Plan::Index {
                    index,
                    prefix,
                    start,
                    upper,
                }
            }
        }
    }

    /// Returns the ids of rows matching a bound condition, in plan order.
    pub(crate) fn matching_ids(&self, condition: &Bound) -> Vec<RowId> {
        match self.plan(condition) {
            Plan::Scan => self
                .rows
                .iter()
                .filter(|(_, row)| condition.matches(row.values()))
                .map(|(id, _)| *id)
                .collect(),
            Plan::Index {
                index,
                prefix,
                start,
                upper,
            } => {
                let index = &self.indices[index];
                let compare = KeyOps::<Value>::dynamic().compare;
                let mut out = Vec::new();
                for (key, ids) in index.entries.range_from(&start) {
                    if key.len() < prefix.len() || key[..prefix.len()] != prefix[..] {
                        break;
                    }
                    if let (Some((op, bound)), Some(v)) = (&upper, key.get(prefix.len())) {
                        if compare(v, bound) == Ordering::Greater
                            || (*op == CompareOp::Lt && compare(v, bound) == Ordering::Equal)
                        {
                            break;
                        }
                    }
                    for id in ids {
                        if let Some(row) = self.rows.get(id) {
                            if condition.matches(row.values()) {
                                out.push(*id);
                            }
                        }
                    }
                }
                out
            }
        }
    }

    /// Delivers a committed row change to this table's listeners.
    pub(crate) fn dispatch(&mut self, change: &RowChange) -> usize {
        self.triggers.dispatch(&self.schema, change)
    }

    /// Renders the table's schema, indices and rows.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let cols: Vec<String> = self
            .schema
            .columns()
            .iter()
            .map(|c| format!("{} {}", c.name(), c.type_text()))
            .collect();
        let temp = if self.schema.is_temporary() { "temporary " } else { "" };
        let _ = writeln!(out, "{}table {} ({})", temp, self.schema.name(), cols.join(", "));
        for index in &self.indices {
            let unique = if index.def.is_unique() { "unique " } else { "" };
            let _ = writeln!(
                out,
                "  {}index {} ({})",
                unique,
                index.def.name(),
                index.def.columns().join(", ")
            );
        }
        let printer = KeyOps::<Vec<Value>>::composite();
        for row in self.rows() {
            let values = row.values().to_vec();
            let _ = writeln!(out, "  #{} {}", row.id(), printer.display(&values));
        }
        out
    }
}
