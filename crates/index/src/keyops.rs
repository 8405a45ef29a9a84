//! Key operations for store keys.
//!
//! A `KeyOps` bundles the hash, compare and print functions the stores use
//! for a key type. Fact table keys get one function table per `DataType`,
//! which keeps hashing consistent with comparison: equal values hash equally.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use verdict_core::{DataType, Value};

/// Feeds a key into a hasher.
pub type HashFn<K> = fn(&K, &mut dyn Hasher);
/// Total order over keys.
pub type CompareFn<K> = fn(&K, &K) -> Ordering;
/// Renders a key for diagnostics.
pub type PrintFn<K> = fn(&K, &mut dyn fmt::Write) -> fmt::Result;

/// Hash, compare and print functions for a key type.
pub struct KeyOps<K> {
    pub hash: HashFn<K>,
    pub compare: CompareFn<K>,
    pub print: PrintFn<K>,
}

impl<K> Clone for KeyOps<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for KeyOps<K> {}

impl<K> fmt::Debug for KeyOps<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOps").finish_non_exhaustive()
    }
}

impl<K> KeyOps<K> {
    /// Creates a function table from explicit functions.
    pub fn new(hash: HashFn<K>, compare: CompareFn<K>, print: PrintFn<K>) -> Self {
        Self { hash, compare, print }
    }

    /// Hashes a key with a hasher built from `builder`.
    pub fn hash_key<S: BuildHasher>(&self, key: &K, builder: &S) -> u64 {
        let mut state = builder.build_hasher();
        (self.hash)(key, &mut state);
        state.finish()
    }

    /// Returns true if the keys compare equal.
    #[inline]
    pub fn eq(&self, a: &K, b: &K) -> bool {
        (self.compare)(a, b) == Ordering::Equal
    }

    /// Wraps a key so it formats through the print function.
    pub fn display<'a>(&self, key: &'a K) -> Printed<'a, K> {
        Printed { key, print: self.print }
    }
}

/// A key formatted through its print function.
pub struct Printed<'a, K> {
    key: &'a K,
    print: PrintFn<K>,
}

impl<K> fmt::Display for Printed<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.print)(self.key, f)
    }
}

fn natural_hash<K: Hash>(key: &K, mut state: &mut dyn Hasher) {
    key.hash(&mut state);
}

fn natural_compare<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

fn natural_print<K: fmt::Debug>(key: &K, out: &mut dyn fmt::Write) -> fmt::Result {
    write!(out, "{:?}", key)
}

impl<K: Hash + Ord + fmt::Debug> KeyOps<K> {
    /// Uses the key type's own `Hash`, `Ord` and `Debug` implementations.
    pub fn natural() -> Self {
        Self::new(natural_hash::<K>, natural_compare::<K>, natural_print::<K>)
    }
}

// Per-datatype value functions. A value of another variant falls back to the
// derived implementations, so mixed keys still get a total order.

fn hash_integer(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::Integer(x) => state.write_i32(*x),
        other => hash_dynamic(other, state),
    }
}

fn compare_integer(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

fn hash_unsigned(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::Unsigned(x) => state.write_u32(*x),
        other => hash_dynamic(other, state),
    }
}

fn compare_unsigned(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Unsigned(x), Value::Unsigned(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

fn hash_string(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::String(s) => {
            state.write(s.as_bytes());
            state.write_u8(0xff);
        }
        other => hash_dynamic(other, state),
    }
}

fn compare_string(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        _ => a.cmp(b),
    }
}

fn hash_blob(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::Blob(b) => {
            state.write_usize(b.len());
            state.write(b);
        }
        other => hash_dynamic(other, state),
    }
}

fn compare_blob(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

fn hash_reference(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::Reference(r) => state.write_u64(*r),
        other => hash_dynamic(other, state),
    }
}

fn compare_reference(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Reference(x), Value::Reference(y)) => x.cmp(y),
        _ => a.cmp(b),
    }
}

fn print_value(v: &Value, out: &mut dyn fmt::Write) -> fmt::Result {
    match v {
        Value::String(s) => write!(out, "'{}'", s),
        Value::Blob(b) => {
            out.write_str("X'")?;
            for byte in b {
                write!(out, "{:02x}", byte)?;
            }
            out.write_char('\'')
        }
        other => write!(out, "{}", other),
    }
}

fn hash_dynamic(v: &Value, state: &mut dyn Hasher) {
    match v {
        Value::Integer(_) => hash_integer(v, state),
        Value::Unsigned(_) => hash_unsigned(v, state),
        Value::String(_) => hash_string(v, state),
        Value::Blob(_) => hash_blob(v, state),
        Value::Reference(_) => hash_reference(v, state),
    }
}

fn compare_dynamic(a: &Value, b: &Value) -> Ordering {
    match a.data_type() {
        DataType::Integer => compare_integer(a, b),
        DataType::Unsigned => compare_unsigned(a, b),
        DataType::String | DataType::Varchar => compare_string(a, b),
        DataType::Blob => compare_blob(a, b),
        DataType::Reference => compare_reference(a, b),
    }
}

impl KeyOps<Value> {
    /// Returns the function table for one column datatype.
    pub fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer => Self::new(hash_integer, compare_integer, print_value),
            DataType::Unsigned => Self::new(hash_unsigned, compare_unsigned, print_value),
            DataType::String | DataType::Varchar => {
                Self::new(hash_string, compare_string, print_value)
            }
            DataType::Blob => Self::new(hash_blob, compare_blob, print_value),
            DataType::Reference => Self::new(hash_reference, compare_reference, print_value),
        }
    }

    /// Returns a function table that dispatches on each value's own type.
    pub fn dynamic() -> Self {
        Self::new(hash_dynamic, compare_dynamic, print_value)
    }
}

fn hash_composite(key: &Vec<Value>, state: &mut dyn Hasher) {
    state.write_usize(key.len());
    for v in key {
        hash_dynamic(v, state);
    }
}

fn compare_composite(a: &Vec<Value>, b: &Vec<Value>) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_dynamic(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn print_composite(key: &Vec<Value>, out: &mut dyn fmt::Write) -> fmt::Result {
    out.write_char('(')?;
    for (i, v) in key.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        print_value(v, out)?;
    }
    out.write_char(')')
}

impl KeyOps<Vec<Value>> {
    /// Returns the function table for composite index keys.
    ///
    /// Keys compare column by column; a proper prefix sorts before any
    /// key it is a prefix of.
    pub fn composite() -> Self {
        Self::new(hash_composite, compare_composite, print_composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::hash_map::DefaultHashBuilder;

    #[test]
    fn test_natural_ops() {
        let ops: KeyOps<i32> = KeyOps::natural();
        assert_eq!((ops.compare)(&1, &2), Ordering::Less);
        assert!(ops.eq(&5, &5));
        assert_eq!(ops.display(&7).to_string(), "7");
    }

    #[test]
    fn test_typed_ops_consistent_with_hash() {
        let builder = DefaultHashBuilder::default();
        for t in DataType::ALL {
            let ops = KeyOps::for_type(t);
            let a = t.default_value();
            let b = t.default_value();
            assert!(ops.eq(&a, &b));
            assert_eq!(ops.hash_key(&a, &builder), ops.hash_key(&b, &builder));
        }
    }

    #[test]
    fn test_integer_order() {
        let ops = KeyOps::for_type(DataType::Integer);
        assert_eq!((ops.compare)(&Value::Integer(-4), &Value::Integer(2)), Ordering::Less);
    }

    #[test]
    fn test_print_value() {
        let ops = KeyOps::dynamic();
        assert_eq!(ops.display(&Value::from("hot")).to_string(), "'hot'");
        assert_eq!(ops.display(&Value::Blob(vec![1, 0xab])).to_string(), "X'01ab'");
        assert_eq!(ops.display(&Value::Unsigned(3)).to_string(), "3");
    }

    #[test]
    fn test_composite_prefix_order() {
        let ops = KeyOps::composite();
        let short = vec![Value::from("a")];
        let long = vec![Value::from("a"), Value::Integer(1)];
        let other = vec![Value::from("b")];
        assert_eq!((ops.compare)(&short, &long), Ordering::Less);
        assert_eq!((ops.compare)(&long, &other), Ordering::Less);
        assert_eq!(ops.display(&long).to_string(), "('a', 1)");
    }
}
