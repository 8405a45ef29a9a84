//! Ordered store implementation.
//!
//! This module provides a keyed container whose traversal order is
//! maintained independently of hashing: insertion order, priority order
//! (ties broken by insertion) or key order.

use crate::keyed::KeyedStore;
use crate::keyops::KeyOps;
use crate::traits::{IndexError, Store};
use core::cmp::Ordering;

/// Traversal order of an `OrderedStore`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Oldest entry first.
    Insertion,
    /// Lowest priority first, then oldest.
    Priority,
    /// Smallest key first, by the store's compare function.
    Key,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    priority: i64,
    seq: u64,
}

struct Entry<K, V> {
    key: K,
    value: V,
    rank: Rank,
}

#[derive(Clone, Debug)]
enum Bookmark<K> {
    Start,
    /// Resume after this rank.
    AfterRank(Rank),
    /// Resume after this key.
    AfterKey(K),
    /// Resume at the first key not less than this one.
    AtKey(K),
}

/// Traversal position in an `OrderedStore`.
///
/// The cursor remembers the last entry it returned rather than a position,
/// so removing that entry does not disturb the traversal.
#[derive(Clone, Debug)]
pub struct OrderedCursor<K> {
    bookmark: Bookmark<K>,
}

impl<K> Default for OrderedCursor<K> {
    fn default() -> Self {
        Self {
            bookmark: Bookmark::Start,
        }
    }
}

impl<K> OrderedCursor<K> {
    /// Creates a cursor positioned before the first entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cursor positioned before the first key not less than `key`.
    ///
    /// Only meaningful for key-ordered stores; other stores start from the
    /// beginning.
    pub fn seek(key: K) -> Self {
        Self {
            bookmark: Bookmark::AtKey(key),
        }
    }
}

/// A keyed container iterated in a maintained order.
pub struct OrderedStore<K, V> {
    order: Order,
    ops: KeyOps<K>,
    entries: Vec<Entry<K, V>>,
    ranks: KeyedStore<K, Rank>,
    next_seq: u64,
}

impl<K: Clone, V> OrderedStore<K, V> {
    /// Creates an empty store.
    pub fn new(order: Order, ops: KeyOps<K>) -> Self {
        Self::with_capacity(order, 0, ops)
    }

    /// Creates an empty store sized for about `capacity_hint` entries.
    pub fn with_capacity(order: Order, capacity_hint: usize, ops: KeyOps<K>) -> Self {
        Self {
            order,
            ops,
            entries: Vec::with_capacity(capacity_hint),
            ranks: KeyedStore::with_capacity(capacity_hint, ops),
            next_seq: 0,
        }
    }

    /// Returns the traversal order.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Returns the key operations.
    pub fn ops(&self) -> &KeyOps<K> {
        &self.ops
    }

    fn cmp_entry(&self, entry: &Entry<K, V>, key: &K, rank: Rank) -> Ordering {
        match self.order {
            Order::Key => (self.ops.compare)(&entry.key, key),
            Order::Insertion | Order::Priority => entry.rank.cmp(&rank),
        }
    }

    fn position(&self, key: &K) -> Option<usize> {
        let rank = *self.ranks.get(key)?;
        self.entries
            .binary_search_by(|e| self.cmp_entry(e, key, rank))
            .ok()
    }

    /// Adds an entry with a priority; lower priorities iterate first.
    ///
    /// The priority is ignored by key-ordered stores.
    pub fn add_with_priority(&mut self, key: K, priority: i64, value: V) -> Result<(), IndexError> {
        if self.ranks.contains_key(&key) {
            return Err(IndexError::DuplicateKey);
        }
        let priority = if self.order == Order::Priority { priority } else { 0 };
        let rank = Rank {
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let at = match self
            .entries
            .binary_search_by(|e| self.cmp_entry(e, &key, rank))
        {
            Ok(at) | Err(at) => at,
        };
        self.ranks.add(key.clone(), rank)?;
        self.entries.insert(at, Entry { key, value, rank });
        Ok(())
    }

    /// Looks up a value for mutation.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let at = self.position(key)?;
        Some(&mut self.entries[at].value)
    }

    /// Returns the first entry in order.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entries.first().map(|e| (&e.key, &e.value))
    }

    /// Returns the last entry in order.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entries.last().map(|e| (&e.key, &e.value))
    }

    /// Iterates over all entries in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    /// Iterates over entries from the first key not less than `key`.
    pub fn range_from<'a>(&'a self, key: &K) -> impl Iterator<Item = (&'a K, &'a V)> {
        let start = match self.order {
            Order::Key => self
                .entries
                .partition_point(|e| (self.ops.compare)(&e.key, key) == Ordering::Less),
            Order::Insertion | Order::Priority => 0,
        };
        self.entries[start..].iter().map(|e| (&e.key, &e.value))
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ranks.clear();
    }

    fn resume_index(&self, bookmark: &Bookmark<K>) -> usize {
        match bookmark {
            Bookmark::Start => 0,
            Bookmark::AfterRank(rank) => self.entries.partition_point(|e| e.rank <= *rank),
            Bookmark::AfterKey(key) => self
                .entries
                .partition_point(|e| (self.ops.compare)(&e.key, key) != Ordering::Greater),
            Bookmark::AtKey(key) => match self.order {
                Order::Key => self
                    .entries
                    .partition_point(|e| (self.ops.compare)(&e.key, key) == Ordering::Less),
                Order::Insertion | Order::Priority => 0,
            },
        }
    }
}

impl<K: Clone, V> Store<K, V> for OrderedStore<K, V> {
    type Cursor = OrderedCursor<K>;

    fn add(&mut self, key: K, value: V) -> Result<(), IndexError> {
        self.add_with_priority(key, 0, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let at = self.position(key)?;
        self.ranks.remove(key);
        Some(self.entries.remove(at).value)
    }

    fn get(&self, key: &K) -> Option<&V> {
        let at = self.position(key)?;
        Some(&self.entries[at].value)
    }

    fn iterate<'a>(
        &'a self,
        cursor: &mut OrderedCursor<K>,
    ) -> Result<Option<(&'a K, &'a V)>, IndexError> {
        let at = self.resume_index(&cursor.bookmark);
        let entry = match self.entries.get(at) {
            Some(e) => e,
            None => return Ok(None),
        };
        cursor.bookmark = match self.order {
            Order::Key => Bookmark::AfterKey(entry.key.clone()),
            Order::Insertion | Order::Priority => Bookmark::AfterRank(entry.rank),
        };
        Ok(Some((&entry.key, &entry.value)))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(store: &OrderedStore<i32, V>) -> Vec<i32> {
        store.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_insertion_order() {
        let mut s = OrderedStore::new(Order::Insertion, KeyOps::natural());
        for k in [5, 1, 9, 3] {
            s.add(k, k * 10).unwrap();
        }
        assert_eq!(keys(&s), vec![5, 1, 9, 3]);
        assert_eq!(s.get(&9), Some(&90));
        assert_eq!(s.add(1, 0), Err(IndexError::DuplicateKey));
    }

    #[test]
    fn test_key_order() {
        let mut s = OrderedStore::new(Order::Key, KeyOps::natural());
        for k in [5, 1, 9, 3] {
            s.add(k, ()).unwrap();
        }
        assert_eq!(keys(&s), vec![1, 3, 5, 9]);
        assert_eq!(s.first().map(|(k, _)| *k), Some(1));
        assert_eq!(s.last().map(|(k, _)| *k), Some(9));
        let tail: Vec<i32> = s.range_from(&4).map(|(k, _)| *k).collect();
        assert_eq!(tail, vec![5, 9]);
    }

    #[test]
    fn test_priority_order() {
        let mut s = OrderedStore::new(Order::Priority, KeyOps::natural());
        s.add_with_priority(1, 10, "low").unwrap();
        s.add_with_priority(2, -5, "high").unwrap();
        s.add_with_priority(3, 10, "low-later").unwrap();
        assert_eq!(keys(&s), vec![2, 1, 3]);
    }

    #[test]
    fn test_remove_and_get_mut() {
        let mut s = OrderedStore::new(Order::Insertion, KeyOps::natural());
        s.add(1, 1).unwrap();
        s.add(2, 2).unwrap();
        *s.get_mut(&2).unwrap() = 20;
        assert_eq!(s.remove(&1), Some(1));
        assert_eq!(s.remove(&1), None);
        assert_eq!(keys(&s), vec![2]);
        assert_eq!(s.get(&2), Some(&20));
    }

    #[test]
    fn test_cursor_survives_removing_current() {
        let mut s = OrderedStore::new(Order::Insertion, KeyOps::natural());
        for k in 0..6 {
            s.add(k, ()).unwrap();
        }
        let mut cursor = OrderedCursor::new();
        let mut visited = Vec::new();
        loop {
            let key = match s.iterate(&mut cursor).unwrap() {
                Some((k, _)) => *k,
                None => break,
            };
            visited.push(key);
            s.remove(&key);
        }
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);
        assert!(s.is_empty());
    }

    #[test]
    fn test_seek_cursor() {
        let mut s = OrderedStore::new(Order::Key, KeyOps::natural());
        for k in [10, 20, 30] {
            s.add(k, ()).unwrap();
        }
        let mut cursor = OrderedCursor::seek(15);
        assert_eq!(s.iterate(&mut cursor).unwrap().map(|(k, _)| *k), Some(20));
        assert_eq!(s.iterate(&mut cursor).unwrap().map(|(k, _)| *k), Some(30));
        assert_eq!(s.iterate(&mut cursor).unwrap(), None);
    }
}
