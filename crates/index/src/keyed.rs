//! Keyed store implementation.
//!
//! This module provides a chained hash table whose hashing, comparison and
//! printing come from a `KeyOps` table instead of trait bounds on the key.

use crate::keyops::KeyOps;
use crate::stats::StoreStats;
use crate::traits::{IndexError, Store};
use core::fmt::{self, Write};
use hashbrown::hash_map::DefaultHashBuilder;

/// Smallest bucket count.
const MIN_BUCKETS: usize = 8;

type Bucket<K, V> = Vec<Option<(K, V)>>;

/// Traversal position in a `KeyedStore`.
///
/// A fresh cursor starts a new traversal. The cursor remembers the store
/// generation it started in; after a rehash it must be restarted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    generation: Option<u64>,
    bucket: usize,
    slot: usize,
}

impl Cursor {
    /// Creates a cursor positioned before the first entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the cursor to the start.
    pub fn restart(&mut self) {
        *self = Self::default();
    }
}

/// A chained hash table with pluggable key operations.
///
/// Removal leaves a tombstone so that slot positions, and therefore cursors,
/// stay stable. When live entries plus tombstones exceed three quarters of
/// the bucket count the table is rehashed, tombstones are dropped and the
/// generation advances.
pub struct KeyedStore<K, V> {
    buckets: Vec<Bucket<K, V>>,
    ops: KeyOps<K>,
    hasher: DefaultHashBuilder,
    len: usize,
    tombstones: usize,
    generation: u64,
    stats: StoreStats,
}

impl<K, V> KeyedStore<K, V> {
    /// Creates a store sized for about `capacity_hint` entries.
    pub fn with_capacity(capacity_hint: usize, ops: KeyOps<K>) -> Self {
        let wanted = (capacity_hint.saturating_mul(4) / 3 + 1).max(MIN_BUCKETS);
        let count = wanted.next_power_of_two();
        Self {
            buckets: (0..count).map(|_| Vec::new()).collect(),
            ops,
            hasher: DefaultHashBuilder::default(),
            len: 0,
            tombstones: 0,
            generation: 0,
            stats: StoreStats::new(),
        }
    }

    /// Returns the key operations.
    pub fn ops(&self) -> &KeyOps<K> {
        &self.ops
    }

    /// Returns the number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the current generation; it changes on every rehash.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the statistics for this store.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    fn bucket_of(&self, key: &K) -> usize {
        let hash = self.ops.hash_key(key, &self.hasher);
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn find(&self, key: &K) -> Option<(usize, usize)> {
        let b = self.bucket_of(key);
        self.buckets[b]
            .iter()
            .position(|slot| matches!(slot, Some((k, _)) if self.ops.eq(k, key)))
            .map(|s| (b, s))
    }

    /// Looks up a value for mutation.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (b, s) = self.find(key)?;
        self.buckets[b][s].as_mut().map(|(_, v)| v)
    }

    fn grow_if_needed(&mut self) {
        let used = self.len + self.tombstones + 1;
        if used * 4 <= self.buckets.len() * 3 {
            return;
        }
        let count = if (self.len + 1) * 2 > self.buckets.len() {
            self.buckets.len() * 2
        } else {
            self.buckets.len()
        };
        self.rehash(count);
    }

    fn rehash(&mut self, count: usize) {
        let old = core::mem::replace(&mut self.buckets, (0..count).map(|_| Vec::new()).collect());
        for (k, v) in old.into_iter().flatten().flatten() {
            let b = self.bucket_of(&k);
            self.buckets[b].push(Some((k, v)));
        }
        self.tombstones = 0;
        self.generation += 1;
        self.stats.record_resize();
    }

    /// Removes every entry for which `pred` returns true.
    ///
    /// This is the traversal variant that tolerates removing arbitrary
    /// entries: the predicate sees each entry before anything is removed
    /// from its slot.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut removed = Vec::new();
        for bucket in &mut self.buckets {
            for slot in bucket.iter_mut() {
                let hit = matches!(slot.as_ref(), Some((k, v)) if pred(k, v));
                if hit {
                    if let Some(entry) = slot.take() {
                        removed.push(entry);
                    }
                }
            }
        }
        self.len -= removed.len();
        self.tombstones += removed.len();
        self.stats.record_remove(removed.len());
        removed
    }

    /// Removes all entries. Outstanding cursors become stale.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
        self.tombstones = 0;
        self.generation += 1;
    }

    /// Iterates over live entries in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .iter()
            .flat_map(|b| b.iter())
            .filter_map(|slot| slot.as_ref().map(|(k, v)| (k, v)))
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Renders every entry as `key => value`, one per line.
    pub fn dump(&self) -> String
    where
        V: fmt::Debug,
    {
        let mut out = String::new();
        for (k, v) in self.iter() {
            let _ = writeln!(out, "{} => {:?}", self.ops.display(k), v);
        }
        out
    }
}

impl<K, V> Store<K, V> for KeyedStore<K, V> {
    type Cursor = Cursor;

    fn add(&mut self, key: K, value: V) -> Result<(), IndexError> {
        if self.find(&key).is_some() {
            return Err(IndexError::DuplicateKey);
        }
        self.grow_if_needed();
        let b = self.bucket_of(&key);
        let bucket = &mut self.buckets[b];
        match bucket.iter().position(Option::is_none) {
            Some(s) => {
                bucket[s] = Some((key, value));
                self.tombstones -= 1;
            }
            None => bucket.push(Some((key, value))),
        }
        self.len += 1;
        self.stats.record_insert();
        Ok(())
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let (b, s) = self.find(key)?;
        let bucket = &mut self.buckets[b];
        let (_, value) = bucket[s].take()?;
        self.tombstones += 1;
        // Trailing tombstones can go: no cursor position depends on them.
        while matches!(bucket.last(), Some(None)) {
            bucket.pop();
            self.tombstones -= 1;
        }
        self.len -= 1;
        self.stats.record_remove(1);
        Some(value)
    }

    fn get(&self, key: &K) -> Option<&V> {
        let (b, s) = self.find(key)?;
        self.buckets[b][s].as_ref().map(|(_, v)| v)
    }

    fn iterate<'a>(&'a self, cursor: &mut Cursor) -> Result<Option<(&'a K, &'a V)>, IndexError> {
        match cursor.generation {
            None => {
                cursor.generation = Some(self.generation);
                cursor.bucket = 0;
                cursor.slot = 0;
            }
            Some(g) if g != self.generation => return Err(IndexError::StaleCursor),
            Some(_) => {}
        }
        while let Some(bucket) = self.buckets.get(cursor.bucket) {
            while let Some(slot) = bucket.get(cursor.slot) {
                cursor.slot += 1;
                if let Some((k, v)) = slot {
                    return Ok(Some((k, v)));
                }
            }
            cursor.bucket += 1;
            cursor.slot = 0;
        }
        Ok(None)
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl<K, V: fmt::Debug> fmt::Debug for KeyedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("len", &self.len)
            .field("buckets", &self.buckets.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::{DataType, Value};

    fn store() -> KeyedStore<i32, i32> {
        KeyedStore::with_capacity(4, KeyOps::natural())
    }

    #[test]
    fn test_keyed_add_get() {
        let mut s = store();
        assert!(s.add(1, 100).is_ok());
        assert!(s.add(2, 200).is_ok());
        assert_eq!(s.add(1, 101), Err(IndexError::DuplicateKey));

        assert_eq!(s.get(&1), Some(&100));
        assert_eq!(s.get(&2), Some(&200));
        assert_eq!(s.get(&3), None);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_keyed_remove() {
        let mut s = store();
        s.add(1, 100).unwrap();
        s.add(2, 200).unwrap();

        assert_eq!(s.remove(&1), Some(100));
        assert_eq!(s.remove(&1), None);
        assert!(!s.contains_key(&1));
        assert_eq!(s.len(), 1);

        // Re-adding after removal reuses the slot.
        s.add(1, 111).unwrap();
        assert_eq!(s.get(&1), Some(&111));
    }

    #[test]
    fn test_keyed_get_mut() {
        let mut s = store();
        s.add(7, 1).unwrap();
        *s.get_mut(&7).unwrap() += 1;
        assert_eq!(s.get(&7), Some(&2));
    }

    #[test]
    fn test_keyed_cursor_visits_all() {
        let mut s = store();
        for i in 0..5 {
            s.add(i, i * 10).unwrap();
        }
        let mut cursor = Cursor::new();
        let mut seen = Vec::new();
        while let Some((k, _)) = s.iterate(&mut cursor).unwrap() {
            seen.push(*k);
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        // An exhausted cursor stays exhausted.
        assert_eq!(s.iterate(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_keyed_remove_current_during_traversal() {
        let mut s = store();
        for i in 0..6 {
            s.add(i, i).unwrap();
        }
        let mut cursor = Cursor::new();
        let mut visited = 0;
        loop {
            let key = match s.iterate(&mut cursor).unwrap() {
                Some((k, _)) => *k,
                None => break,
            };
            visited += 1;
            if key % 2 == 0 {
                s.remove(&key);
            }
        }
        assert_eq!(visited, 6);
        assert_eq!(s.len(), 3);
        assert!(s.keys().all(|k| k % 2 == 1));
    }

    #[test]
    fn test_keyed_rehash_invalidates_cursor() {
        let mut s = store();
        s.add(0, 0).unwrap();
        let buckets = s.bucket_count();

        let mut cursor = Cursor::new();
        assert!(s.iterate(&mut cursor).unwrap().is_some());

        let mut i = 1;
        while s.bucket_count() == buckets {
            s.add(i, i).unwrap();
            i += 1;
        }
        assert_eq!(s.iterate(&mut cursor), Err(IndexError::StaleCursor));

        cursor.restart();
        let mut count = 0;
        while s.iterate(&mut cursor).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, i as usize);
        assert!(s.stats().resizes() >= 1);
    }

    #[test]
    fn test_keyed_remove_where() {
        let mut s = store();
        for i in 0..10 {
            s.add(i, i).unwrap();
        }
        let removed = s.remove_where(|k, _| *k >= 5);
        assert_eq!(removed.len(), 5);
        assert_eq!(s.len(), 5);
        assert!(s.keys().all(|k| *k < 5));
    }

    #[test]
    fn test_keyed_value_keys() {
        let mut s: KeyedStore<Value, u32> =
            KeyedStore::with_capacity(16, KeyOps::for_type(DataType::Varchar));
        s.add(Value::from("cold"), 1).unwrap();
        s.add(Value::from("hot"), 2).unwrap();
        assert_eq!(s.get(&Value::from("hot")), Some(&2));
        assert!(s.add(Value::from("cold"), 3).is_err());
        assert!(s.dump().contains("'cold' => 1"));
    }

    #[test]
    fn test_keyed_clear() {
        let mut s = store();
        s.add(1, 1).unwrap();
        let generation = s.generation();
        s.clear();
        assert!(s.is_empty());
        assert!(s.generation() > generation);
    }
}
