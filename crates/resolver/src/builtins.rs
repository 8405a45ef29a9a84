//! Functions callable from update scripts.
//!
//! A function receives its evaluated arguments and a `CallContext` giving
//! access to the engine, the variable frames and the target being
//! evaluated. Table and column names are passed as strings, so `$temp`
//! and `'temp'` name the same table.

use crate::context::Context;
use hashbrown::HashMap;
use tracing::info;
use verdict_core::{DataType, Error, Result, Value};
use verdict_storage::{Condition, Engine, TableHandle};

/// A script-callable function. `Ok(None)` means the call yields no value.
pub type Function = Box<dyn Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>>>;

/// Looks up the exposed value of another target.
pub type PeerLookup<'a> = &'a dyn Fn(&str) -> Result<Option<Value>>;

/// State visible to a function while a target's script runs.
pub struct CallContext<'a> {
    engine: &'a mut Engine,
    context: &'a mut Context,
    target: &'a str,
    peers: PeerLookup<'a>,
    exposed: Option<Value>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        engine: &'a mut Engine,
        context: &'a mut Context,
        target: &'a str,
        peers: PeerLookup<'a>,
    ) -> Self {
        Self {
            engine,
            context,
            target,
            peers,
            exposed: None,
        }
    }

    pub fn engine(&mut self) -> &mut Engine {
        self.engine
    }

    /// Name of the target being evaluated.
    pub fn target(&self) -> &str {
        self.target
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.context.get(name)
    }

    /// Sets the value the target publishes once its evaluation commits.
    pub fn expose(&mut self, value: Value) {
        self.exposed = Some(value);
    }

    /// Returns the value exposed by another target, if any.
    pub fn peer_value(&self, name: &str) -> Result<Option<Value>> {
        (self.peers)(name)
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        self.context
    }

    pub(crate) fn into_exposed(self) -> Option<Value> {
        self.exposed
    }
}

/// Name to function table.
#[derive(Default)]
pub struct Functions {
    table: HashMap<String, Function>,
}

impl Functions {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the built-in functions.
    pub fn with_builtins() -> Self {
        let mut functions = Self::new();
        functions.register("echo", echo);
        functions.register("count", count);
        functions.register("sum", sum);
        functions.register("avg", avg);
        functions.register("min", min);
        functions.register("max", max);
        functions.register("lookup", lookup);
        functions.register("insert", insert);
        functions.register("update", update);
        functions.register("delete", delete);
        functions.register("clear", clear);
        functions.register("expose", expose);
        functions.register("value", value);
        functions.register("fail", fail);
        functions
    }

    /// Adds or replaces a function.
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>> + 'static,
    {
        self.table.insert(name.to_string(), Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Converts a computed integer into the narrowest script value.
pub fn int_value(n: i64) -> Result<Value> {
    i32::try_from(n)
        .map(Value::Integer)
        .or_else(|_| u32::try_from(n).map(Value::Unsigned))
        .map_err(|_| Error::exhausted(format!("integer {} out of range", n)))
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::invalid_operation(format!(
            "{} takes {} arguments, got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn text(args: &[Value], i: usize) -> Result<&str> {
    args[i]
        .as_str()
        .ok_or_else(|| Error::type_mismatch(DataType::String, args[i].data_type()))
}

fn table(cx: &CallContext<'_>, args: &[Value]) -> Result<TableHandle> {
    cx.engine.table(text(args, 0)?)
}

/// Every value of one column, however many rows the table holds.
fn column(cx: &CallContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    let h = table(cx, args)?;
    let pos = cx.engine.schema(h)?.column(text(args, 1)?)?.index();
    let mut values = Vec::new();
    cx.engine.for_each_row(h, &Condition::True, |row| {
        values.extend(row.get(pos).cloned());
        Ok(())
    })?;
    Ok(values)
}

fn numbers(values: &[Value]) -> Result<Vec<i64>> {
    values
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| Error::type_mismatch(DataType::Integer, v.data_type()))
        })
        .collect()
}

fn count_value(n: usize) -> Result<Value> {
    int_value(i64::try_from(n).unwrap_or(i64::MAX))
}

fn echo(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    let line: Vec<String> = args.iter().map(Value::to_string).collect();
    info!(target_name = cx.target(), "{}", line.join(" "));
    Ok(None)
}

fn count(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("count", args, 1)?;
    let h = table(cx, args)?;
    let n = cx.engine.count(h, &Condition::True)?;
    count_value(n).map(Some)
}

fn sum(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("sum", args, 2)?;
    let total: i64 = numbers(&column(cx, args)?)?.iter().sum();
    int_value(total).map(Some)
}

fn avg(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("avg", args, 2)?;
    let values = numbers(&column(cx, args)?)?;
    if values.is_empty() {
        return Ok(Some(Value::Integer(0)));
    }
    let total: i64 = values.iter().sum();
    int_value(total / values.len() as i64).map(Some)
}

fn extreme(cx: &mut CallContext<'_>, args: &[Value], name: &str, want_max: bool) -> Result<Option<Value>> {
    arity(name, args, 2)?;
    let values = column(cx, args)?;
    let found = if want_max {
        values.into_iter().max()
    } else {
        values.into_iter().min()
    };
    found
        .map(Some)
        .ok_or_else(|| Error::invalid_operation(format!("{} over empty table {}", name, args[0])))
}

fn min(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    extreme(cx, args, "min", false)
}

fn max(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    extreme(cx, args, "max", true)
}

/// `lookup(table, column, key_column, key)`
fn lookup(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("lookup", args, 4)?;
    let h = table(cx, args)?;
    let key_column = text(args, 2)?;
    let rows = cx.engine.select(
        h,
        &Condition::eq(key_column, args[3].clone()),
        Some(&[text(args, 1)?]),
        1,
        0,
    )?;
    rows.into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .map(Some)
        .ok_or_else(|| Error::not_found("row", format!("{}.{} = {}", args[0], key_column, args[3])))
}

/// `insert(table, value...)`
fn insert(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    if args.len() < 2 {
        return Err(Error::invalid_operation("insert takes a table and at least one value"));
    }
    let h = table(cx, args)?;
    cx.engine.insert(h, None, args[1..].to_vec())?;
    Ok(None)
}

/// `update(table, column, value, key_column, key)`
fn update(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("update", args, 5)?;
    let h = table(cx, args)?;
    let condition = Condition::eq(text(args, 3)?, args[4].clone());
    let n = cx
        .engine
        .update(h, &condition, &[(text(args, 1)?, args[2].clone())])?;
    count_value(n).map(Some)
}

/// `delete(table, key_column, key)`
fn delete(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("delete", args, 3)?;
    let h = table(cx, args)?;
    let n = cx
        .engine
        .delete(h, &Condition::eq(text(args, 1)?, args[2].clone()))?;
    count_value(n).map(Some)
}

fn clear(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("clear", args, 1)?;
    let h = table(cx, args)?;
    let n = cx.engine.delete(h, &Condition::True)?;
    count_value(n).map(Some)
}

fn expose(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("expose", args, 1)?;
    cx.expose(args[0].clone());
    Ok(None)
}

/// `value(target)` reads the value another target exposed.
fn value(cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    arity("value", args, 1)?;
    let name = text(args, 0)?;
    cx.peer_value(name)?
        .map(Some)
        .ok_or_else(|| Error::invalid_operation(format!("target {} exposes no value", name)))
}

fn fail(_cx: &mut CallContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    let message = match args {
        [] => "failed".to_string(),
        _ => args.iter().map(Value::to_string).collect::<Vec<_>>().join(" "),
    };
    Err(Error::script("", 0, message))
}
