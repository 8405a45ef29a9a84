//! Property-based tests for verdict-index using proptest.

use proptest::prelude::*;
use std::collections::BTreeSet;
use verdict_core::{DataType, Value};
use verdict_index::{Cursor, HandleTable, KeyOps, KeyedStore, Order, OrderedStore, Store};

proptest! {
    /// Every added key can be retrieved, duplicates are rejected.
    #[test]
    fn keyed_add_get_roundtrip(keys in prop::collection::vec(0i64..10000, 1..500)) {
        let mut store = KeyedStore::with_capacity(4, KeyOps::natural());
        let mut expected = BTreeSet::new();
        for &key in &keys {
            let added = store.add(key, key * 2).is_ok();
            prop_assert_eq!(added, expected.insert(key));
        }
        prop_assert_eq!(store.len(), expected.len());
        for key in &expected {
            prop_assert_eq!(store.get(key), Some(&(key * 2)));
        }
    }

    /// Rehashing preserves all entries, and a restarted cursor sees each exactly once.
    #[test]
    fn keyed_rehash_preserves_entries(keys in prop::collection::btree_set(any::<u32>(), 1..300)) {
        let mut store = KeyedStore::with_capacity(1, KeyOps::natural());
        for &key in &keys {
            store.add(key, ()).unwrap();
        }
        prop_assert!(keys.len() <= 6 || store.stats().resizes() > 0);

        let mut cursor = Cursor::new();
        let mut seen = BTreeSet::new();
        while let Some((k, _)) = store.iterate(&mut cursor).unwrap() {
            prop_assert!(seen.insert(*k), "key {} visited twice", k);
        }
        prop_assert_eq!(seen, keys);
    }

    /// Removing the current element during traversal visits every entry once.
    #[test]
    fn keyed_remove_while_iterating(keys in prop::collection::btree_set(0u16..5000, 1..200)) {
        let mut store = KeyedStore::with_capacity(keys.len(), KeyOps::natural());
        for &key in &keys {
            store.add(key, ()).unwrap();
        }
        let mut cursor = Cursor::new();
        let mut visited = 0;
        loop {
            let key = match store.iterate(&mut cursor).unwrap() {
                Some((k, _)) => *k,
                None => break,
            };
            visited += 1;
            store.remove(&key);
        }
        prop_assert_eq!(visited, keys.len());
        prop_assert!(store.is_empty());
    }

    /// Key-ordered stores iterate sorted by the datatype compare.
    #[test]
    fn ordered_key_order_sorted(values in prop::collection::btree_set(any::<i32>(), 1..200)) {
        let mut store = OrderedStore::new(Order::Key, KeyOps::for_type(DataType::Integer));
        for &v in values.iter().rev() {
            store.add(Value::Integer(v), ()).unwrap();
        }
        let got: Vec<i32> = store.iter().filter_map(|(k, _)| k.as_i32()).collect();
        let want: Vec<i32> = values.into_iter().collect();
        prop_assert_eq!(got, want);
    }

    /// Insertion-ordered stores keep insertion order across removals.
    #[test]
    fn ordered_insertion_order_kept(
        keys in prop::collection::vec(0u32..1000, 1..200),
        drop_every in 2usize..5
    ) {
        let mut store = OrderedStore::new(Order::Insertion, KeyOps::natural());
        let mut expected = Vec::new();
        for &key in &keys {
            if store.add(key, ()).is_ok() {
                expected.push(key);
            }
        }
        for key in expected.iter().step_by(drop_every) {
            store.remove(key);
        }
        let kept: Vec<u32> = expected
            .iter()
            .enumerate()
            .filter(|(i, _)| i % drop_every != 0)
            .map(|(_, k)| *k)
            .collect();
        let got: Vec<u32> = store.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(got, kept);
    }

    /// Removed handles never resolve again, even after their slots are reused.
    #[test]
    fn handles_never_alias(ops in prop::collection::vec(any::<bool>(), 1..200)) {
        let mut table = HandleTable::new();
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for (i, insert) in ops.into_iter().enumerate() {
            if insert || live.is_empty() {
                live.push((table.insert(i).unwrap(), i));
            } else {
                let (h, v) = live.remove(0);
                prop_assert_eq!(table.remove(h), Some(v));
                dead.push(h);
            }
        }
        for (h, v) in &live {
            prop_assert_eq!(table.get(*h), Some(v));
        }
        for h in &dead {
            prop_assert!(table.get(*h).is_none());
        }
        prop_assert_eq!(table.len(), live.len());
    }
}
