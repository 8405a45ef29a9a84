//! Variable scopes for script evaluation.

use hashbrown::HashMap;
use verdict_core::{Error, Result, Value};

/// A stack of variable frames.
///
/// Lookups walk from the innermost frame outwards. Assigning to a name
/// writes to the frame that declared it; an undeclared name is declared in
/// the innermost frame. A variable keeps the type of its first value.
#[derive(Debug)]
pub struct Context {
    frames: Vec<HashMap<String, Value>>,
    max_depth: usize,
}

impl Context {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Returns the number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a nested frame.
    pub fn push(&mut self) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(Error::exhausted(format!(
                "context frame depth limit {} reached",
                self.max_depth
            )));
        }
        self.frames.push(HashMap::new());
        Ok(())
    }

    /// Closes the innermost frame, discarding its variables.
    pub fn pop(&mut self) -> Result<()> {
        self.frames
            .pop()
            .map(|_| ())
            .ok_or_else(|| Error::invalid_operation("no context frame to pop"))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Declares `name` in the innermost frame, shadowing outer declarations.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Error::invalid_operation("no context frame open"))?;
        if let Some(old) = frame.get(name) {
            check_type(old, &value)?;
        }
        frame.insert(name.to_string(), value);
        Ok(())
    }

    /// Assigns `name` in the frame that declared it, or declares it.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        match self.frames.iter_mut().rev().find_map(|f| f.get_mut(name)) {
            Some(slot) => {
                check_type(slot, &value)?;
                *slot = value;
                Ok(())
            }
            None => self.declare(name, value),
        }
    }

    /// Returns the names visible from the innermost frame, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .frames
            .iter()
            .flat_map(|f| f.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn check_type(old: &Value, new: &Value) -> Result<()> {
    if old.data_type() != new.data_type() {
        return Err(Error::type_mismatch(old.data_type(), new.data_type()));
    }
    Ok(())
}
