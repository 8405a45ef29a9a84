//! Journal for tracking changes in a transaction.
//!
//! Changes are applied to the tables as they are made; the journal records
//! enough to undo them on rollback and to work out the net change per row
//! on commit.

use crate::trigger::RowChange;
use hashbrown::HashMap;
use verdict_core::schema::IndexDef;
use verdict_core::{Row, RowId};
use verdict_index::Handle;

/// Handle of a table in the engine.
pub type TableHandle = Handle;

/// A single journal entry representing a change.
#[derive(Clone, Debug)]
pub enum JournalEntry {
    Insert { table: TableHandle, row: Row },
    Update { table: TableHandle, old: Row, new: Row },
    Delete { table: TableHandle, row: Row },
    CreateTable { table: TableHandle },
    /// The table stays allocated, marked dropped, until the outer commit.
    DropTable { table: TableHandle },
    CreateIndex { table: TableHandle, name: String },
    DropIndex { table: TableHandle, def: IndexDef },
}

impl JournalEntry {
    /// Returns the table this entry touches.
    pub fn table(&self) -> TableHandle {
        match self {
            JournalEntry::Insert { table, .. }
            | JournalEntry::Update { table, .. }
            | JournalEntry::Delete { table, .. }
            | JournalEntry::CreateTable { table }
            | JournalEntry::DropTable { table }
            | JournalEntry::CreateIndex { table, .. }
            | JournalEntry::DropIndex { table, .. } => *table,
        }
    }

    /// Returns true for row inserts, updates and deletes.
    pub fn is_row_op(&self) -> bool {
        matches!(
            self,
            JournalEntry::Insert { .. } | JournalEntry::Update { .. } | JournalEntry::Delete { .. }
        )
    }
}

/// Net row changes of one transaction, across tables.
///
/// Rows keep the order in which they were first touched. Successive
/// changes to one row fold into a single before/after pair, and a pair
/// whose two sides are equal vanishes.
#[derive(Debug, Default)]
pub struct TableDiff {
    order: Vec<(TableHandle, RowId)>,
    changes: HashMap<(TableHandle, RowId), RowChange>,
}

impl TableDiff {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, table: TableHandle, id: RowId, before: Option<Row>, after: Option<Row>) {
        match self.changes.get_mut(&(table, id)) {
            Some(change) => change.after = after,
            None => {
                self.order.push((table, id));
                self.changes.insert((table, id), RowChange { before, after });
            }
        }
    }

    /// Records an addition.
    pub fn add(&mut self, table: TableHandle, row: Row) {
        self.record(table, row.id(), None, Some(row));
    }

    /// Records a modification.
    pub fn modify(&mut self, table: TableHandle, old: Row, new: Row) {
        self.record(table, old.id(), Some(old), Some(new));
    }

    /// Records a deletion.
    pub fn delete(&mut self, table: TableHandle, row: Row) {
        self.record(table, row.id(), Some(row), None);
    }

    /// Builds the diff of a sequence of journal entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Self {
        let mut diff = Self::new();
        for entry in entries {
            match entry {
                JournalEntry::Insert { table, row } => diff.add(*table, row.clone()),
                JournalEntry::Update { table, old, new } => diff.modify(*table, old.clone(), new.clone()),
                JournalEntry::Delete { table, row } => diff.delete(*table, row.clone()),
                _ => {}
            }
        }
        diff
    }

    /// Consumes the diff, yielding net changes in first-touch order.
    pub(crate) fn into_changes(mut self) -> Vec<(TableHandle, RowChange)> {
        self.order
            .into_iter()
            .filter_map(|key| {
                let change = self.changes.remove(&key)?;
                let unchanged = match (&change.before, &change.after) {
                    (None, None) => true,
                    (Some(b), Some(a)) => b.values() == a.values(),
                    _ => false,
                };
                (!unchanged).then_some((key.0, change))
            })
            .collect()
    }

    /// Returns the number of rows touched, including ones that net out.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no row was touched.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Undo log of one transaction frame.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Appends a child frame's entries after this frame's own.
    pub fn merge(&mut self, child: Journal) {
        self.entries.extend(child.entries);
    }

    /// Returns all entries in recording order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Consumes the journal, returning its entries.
    pub fn into_entries(self) -> Vec<JournalEntry> {
        self.entries
    }

    /// Returns true if a row operation on `table` is pending.
    pub fn touches_rows(&self, table: TableHandle) -> bool {
        self.entries.iter().any(|e| e.is_row_op() && e.table() == table)
    }

    /// Returns true if the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::Value;
    use verdict_index::HandleTable;

    fn handles() -> (TableHandle, TableHandle) {
        let mut t = HandleTable::new();
        (t.insert(()).unwrap(), t.insert(()).unwrap())
    }

    fn row(id: RowId, v: i32) -> Row {
        Row::new(id, vec![Value::Integer(v)])
    }

    #[test]
    fn test_insert_then_delete_vanishes() {
        let (t, _) = handles();
        let mut diff = TableDiff::new();
        diff.add(t, row(1, 1));
        diff.delete(t, row(1, 1));
        assert_eq!(diff.len(), 1);
        assert!(diff.into_changes().is_empty());
    }

    #[test]
    fn test_insert_then_update_is_insert() {
        let (t, _) = handles();
        let mut diff = TableDiff::new();
        diff.add(t, row(1, 1));
        diff.modify(t, row(1, 1), row(1, 2));
        let changes = diff.into_changes();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].1.before.is_none());
        assert_eq!(changes[0].1.after, Some(row(1, 2)));
    }

    #[test]
    fn test_updates_fold_to_original() {
        let (t, _) = handles();
        let mut diff = TableDiff::new();
        diff.modify(t, row(1, 1), row(1, 2));
        diff.modify(t, row(1, 2), row(1, 3));
        let changes = diff.into_changes();
        assert_eq!(changes[0].1.before, Some(row(1, 1)));
        assert_eq!(changes[0].1.after, Some(row(1, 3)));

        let mut diff = TableDiff::new();
        diff.modify(t, row(1, 1), row(1, 2));
        diff.modify(t, row(1, 2), row(1, 1));
        assert!(diff.into_changes().is_empty());
    }

    #[test]
    fn test_first_touch_order_across_tables() {
        let (a, b) = handles();
        let entries = vec![
            JournalEntry::Insert { table: b, row: row(1, 1) },
            JournalEntry::Insert { table: a, row: row(1, 1) },
            JournalEntry::Update { table: b, old: row(1, 1), new: row(1, 5) },
            JournalEntry::CreateTable { table: a },
        ];
        let changes = TableDiff::from_entries(&entries).into_changes();
        let tables: Vec<TableHandle> = changes.iter().map(|(t, _)| *t).collect();
        assert_eq!(tables, vec![b, a]);
    }

    #[test]
    fn test_journal_merge_and_touches() {
        let (a, b) = handles();
        let mut parent = Journal::new();
        parent.record(JournalEntry::CreateTable { table: b });
        let mut child = Journal::new();
        child.record(JournalEntry::Delete { table: a, row: row(3, 3) });
        parent.merge(child);
        assert_eq!(parent.len(), 2);
        assert!(parent.touches_rows(a));
        assert!(!parent.touches_rows(b));
        assert!(matches!(parent.entries()[1], JournalEntry::Delete { .. }));
    }
}
