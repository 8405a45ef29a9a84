//! Target evaluation state.

use crate::script::Script;
use core::fmt;
use verdict_core::{Error, Value};
use verdict_storage::Engine;

/// Where a target stands relative to its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Inputs changed since the last successful evaluation, or the last
    /// evaluation failed (see `Target::last_error`).
    Dirty,
    /// The script is running.
    Evaluating,
    /// Up to date with every input.
    Clean,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetState::Dirty => "dirty",
            TargetState::Evaluating => "evaluating",
            TargetState::Clean => "clean",
        })
    }
}

/// A target together with the input stamps it was last evaluated against.
#[derive(Debug)]
pub struct Target {
    name: String,
    facts: Vec<String>,
    script: Option<Script>,
    source: String,
    line: u32,
    pub(crate) state: TargetState,
    /// Set after a failure; cleared when an input changes.
    pub(crate) blocked: bool,
    pub(crate) stamp: u64,
    pub(crate) fact_stamps: Vec<u64>,
    pub(crate) input_stamps: Vec<u64>,
    pub(crate) exposed: Option<Value>,
    pub(crate) last_error: Option<Error>,
}

impl Target {
    pub(crate) fn new(
        name: String,
        facts: Vec<String>,
        inputs: usize,
        script: Option<Script>,
        source: String,
        line: u32,
    ) -> Self {
        let fact_count = facts.len();
        Self {
            name,
            facts,
            script,
            source,
            line,
            state: TargetState::Dirty,
            blocked: false,
            stamp: 0,
            fact_stamps: vec![0; fact_count],
            input_stamps: vec![0; inputs],
            exposed: None,
            last_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fact tables read by this target.
    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Resolver generation of the last successful evaluation, 0 if never.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn exposed(&self) -> Option<&Value> {
        self.exposed.as_ref()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub(crate) fn mark_dirty(&mut self) {
        if self.state != TargetState::Evaluating {
            self.state = TargetState::Dirty;
        }
        self.blocked = false;
    }

    /// Returns true when a fact table stamp differs from the one recorded.
    pub(crate) fn facts_changed(&self, engine: &Engine) -> bool {
        self.facts
            .iter()
            .zip(&self.fact_stamps)
            .any(|(table, &seen)| engine.table_stamp(table) != seen)
    }

    pub(crate) fn reads_fact(&self, table: &str) -> bool {
        self.facts.iter().any(|f| f == table)
    }

    pub(crate) fn record_facts(&mut self, engine: &Engine) {
        self.fact_stamps = self.facts.iter().map(|t| engine.table_stamp(t)).collect();
    }

    /// Gives an error with no script location the location of this target.
    pub(crate) fn locate(&self, err: Error) -> Error {
        match err {
            e @ Error::ScriptError { .. } => e,
            other => {
                let source = if self.source.is_empty() {
                    self.name.as_str()
                } else {
                    self.source.as_str()
                };
                Error::script(source, self.line, other.to_string())
            }
        }
    }
}
