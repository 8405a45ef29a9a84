//! Property-based tests for verdict-storage using proptest.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use verdict_core::schema::{Table, TableBuilder};
use verdict_core::{DataType, Value};
use verdict_storage::{Condition, Engine, RowTrigger, TableHandle, TriggerEvent};

#[derive(Clone, Debug)]
enum Op {
    Insert(i32, i32),
    Update(i32, i32),
    Delete(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i32..20, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        (0i32..20, any::<i32>()).prop_map(|(k, v)| Op::Update(k, v)),
        (0i32..20).prop_map(Op::Delete),
    ]
}

fn schema() -> Table {
    TableBuilder::new("fact")
        .unwrap()
        .add_column("key", DataType::Integer, 0)
        .unwrap()
        .add_column("value", DataType::Integer, 0)
        .unwrap()
        .add_index("fact_key", &["key"], true)
        .build()
        .unwrap()
}

/// Applies an op; constraint failures are expected and leave the store unchanged.
fn apply(engine: &mut Engine, table: TableHandle, op: &Op) {
    let _ = match op {
        Op::Insert(k, v) => engine.insert(table, None, vec![Value::Integer(*k), Value::Integer(*v)]),
        Op::Update(k, v) => engine
            .update(table, &Condition::eq("key", *k), &[("value", Value::Integer(*v))])
            .map(|_| ()),
        Op::Delete(k) => engine.delete(table, &Condition::eq("key", *k)).map(|_| ()),
    };
}

fn counter() -> (Rc<RefCell<usize>>, impl FnMut(&TriggerEvent) + 'static) {
    let count = Rc::new(RefCell::new(0));
    let sink = count.clone();
    (count, move |_: &TriggerEvent| *sink.borrow_mut() += 1)
}

proptest! {
    /// Rolling back any sequence of changes restores rows and stamps without firing triggers.
    #[test]
    fn rollback_is_identity(
        before in prop::collection::vec(op_strategy(), 0..20),
        during in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let mut engine = Engine::new();
        let table = engine.create_table(schema()).unwrap();
        for op in &before {
            apply(&mut engine, table, op);
        }
        let (rows, row_listener) = counter();
        let (ends, end_listener) = counter();
        engine.on_row(table, RowTrigger::new(), row_listener).unwrap();
        engine.on_transaction(end_listener);

        let dump = engine.dump_table(table).unwrap();
        let stamp = engine.stamp(table).unwrap();

        let tx = engine.begin().unwrap();
        for op in &during {
            apply(&mut engine, table, op);
        }
        engine.rollback(tx).unwrap();

        prop_assert_eq!(engine.dump_table(table).unwrap(), dump);
        prop_assert_eq!(engine.stamp(table).unwrap(), stamp);
        prop_assert_eq!(*rows.borrow(), 0);
        prop_assert_eq!(*ends.borrow(), 0);
        prop_assert_eq!(engine.depth(), 0);
    }

    /// A committed transaction fires one row event per net-changed row and one end event.
    #[test]
    fn triggers_fire_once_per_row(
        keys in prop::collection::btree_set(0i32..1000, 1..50),
        updates in prop::collection::vec(0i32..1000, 0..30),
    ) {
        let mut engine = Engine::new();
        let table = engine.create_table(schema()).unwrap();
        let (rows, row_listener) = counter();
        let (ends, end_listener) = counter();
        engine.on_row(table, RowTrigger::new(), row_listener).unwrap();
        engine.on_transaction(end_listener);

        let tx = engine.begin().unwrap();
        for &k in &keys {
            engine.insert(table, None, vec![Value::Integer(k), Value::Integer(0)]).unwrap();
        }
        for &k in &updates {
            engine
                .update(table, &Condition::eq("key", k), &[("value", Value::Integer(k + 1))])
                .unwrap();
        }
        prop_assert_eq!(*rows.borrow(), 0);
        engine.commit(tx).unwrap();

        prop_assert_eq!(*rows.borrow(), keys.len());
        prop_assert_eq!(*ends.borrow(), 1);
    }
}

#[test]
fn temporary_table_rollback_scenario() {
    let mut engine = Engine::new();
    let schema = TableBuilder::new("temp")
        .unwrap()
        .add_column("name", DataType::Varchar, 16)
        .unwrap()
        .add_column("state", DataType::Varchar, 8)
        .unwrap()
        .temporary(true)
        .build()
        .unwrap();
    let temp = engine.create_table(schema).unwrap();
    engine
        .insert(temp, None, vec!["kitchen".into(), "cold".into()])
        .unwrap();

    let tx = engine.begin().unwrap();
    engine
        .update(temp, &Condition::True, &[("state", "hot".into())])
        .unwrap();
    engine.rollback(tx).unwrap();

    let rows = engine.select(temp, &Condition::True, None, 10, 0).unwrap();
    assert_eq!(rows, vec![vec![Value::from("kitchen"), Value::from("cold")]]);
}
