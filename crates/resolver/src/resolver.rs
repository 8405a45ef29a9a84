//! Incremental re-evaluation of targets.
//!
//! The resolver watches the engine through a transaction-end listener and a
//! table lifecycle listener. Both feed table names into a change log which
//! every pass drains; a target whose fact table changed, or whose input
//! target was re-evaluated, becomes dirty and is evaluated again in
//! dependency order.

use crate::builtins::{int_value, CallContext, Functions};
use crate::config::ResolverConfig;
use crate::context::Context;
use crate::graph::{DependencyGraph, Sorted};
use crate::ruleset::{check_dependencies, parse_ruleset, TargetDef};
use crate::script;
use crate::target::{Target, TargetState};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::rc::Rc;
use tracing::{debug, trace, warn};
use verdict_core::{Error, Result, Value};
use verdict_storage::{Engine, TriggerEvent, TriggerToken};

type ChangeLog = Rc<RefCell<Vec<String>>>;

/// Outcome of a pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Targets evaluated successfully, in evaluation order.
    pub evaluated: Vec<String>,
    /// Targets that failed or sit on a cycle.
    pub failed: Vec<(String, Error)>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn error(&self, target: &str) -> Option<&Error> {
        self.failed.iter().find(|(name, _)| name == target).map(|(_, e)| e)
    }
}

/// Dependency resolver over the fact tables of one engine.
pub struct Resolver {
    config: ResolverConfig,
    graph: DependencyGraph,
    sorted: Sorted,
    targets: Vec<Target>,
    functions: Functions,
    changes: ChangeLog,
    listeners: [TriggerToken; 2],
    generation: u64,
}

impl Resolver {
    pub fn new(engine: &mut Engine, defs: Vec<TargetDef>) -> Result<Self> {
        Self::with_config(engine, defs, ResolverConfig::default())
    }

    /// Builds the graph, compiles every script and starts listening.
    pub fn with_config(engine: &mut Engine, defs: Vec<TargetDef>, config: ResolverConfig) -> Result<Self> {
        check_dependencies(&defs)?;
        let mut graph = DependencyGraph::new();
        for def in &defs {
            graph.add_node(&def.name)?;
        }
        if let Some(name) = &config.auto_update_target {
            if graph.node(name).is_none() {
                return Err(Error::not_found("target", name.as_str()));
            }
        }

        let mut targets = Vec::with_capacity(defs.len());
        for (i, def) in defs.into_iter().enumerate() {
            for dep in def.targets() {
                if let Some(input) = graph.node(dep) {
                    graph.add_edge(i, input);
                }
            }
            let script = def
                .script
                .as_ref()
                .map(|s| script::compile_with(&s.source, s.first_line, &s.text, config.max_frame_depth))
                .transpose()?;
            let facts = def.facts().map(String::from).collect();
            let inputs = graph.inputs(i).len();
            targets.push(Target::new(def.name, facts, inputs, script, def.source, def.line));
        }
        let sorted = graph.sort();
        if !sorted.unordered.is_empty() {
            warn!(targets = sorted.unordered.len(), "dependency cycle in target graph");
        }

        let changes: ChangeLog = Rc::default();
        let log = Rc::clone(&changes);
        let on_commit = engine.on_transaction(move |event: &TriggerEvent| {
            if let TriggerEvent::TransactionEnd { tables, .. } = event {
                log.borrow_mut().extend(tables.iter().cloned());
            }
        });
        let log = Rc::clone(&changes);
        let on_table = engine.on_table(move |event: &TriggerEvent| match event {
            TriggerEvent::TableCreated { table } | TriggerEvent::TableDropped { table } => {
                log.borrow_mut().push(table.clone());
            }
            _ => {}
        });
        debug!(targets = targets.len(), "resolver attached");

        Ok(Self {
            config,
            graph,
            sorted,
            targets,
            functions: Functions::with_builtins(),
            changes,
            listeners: [on_commit, on_table],
            generation: 0,
        })
    }

    /// Parses a ruleset and builds a resolver from it.
    pub fn from_ruleset(engine: &mut Engine, source: &str, text: &str, config: ResolverConfig) -> Result<Self> {
        let defs = parse_ruleset(source, text)?;
        Self::with_config(engine, defs, config)
    }

    /// Stops listening to the engine.
    pub fn detach(self, engine: &mut Engine) -> Result<()> {
        for token in self.listeners {
            engine.remove_trigger(token)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Targets in declaration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.graph.node(name).map(|i| &self.targets[i])
    }

    pub fn state(&self, name: &str) -> Option<TargetState> {
        self.target(name).map(Target::state)
    }

    /// Names of the orderable targets in evaluation order.
    pub fn order(&self) -> Vec<&str> {
        self.sorted.order.iter().map(|&i| self.graph.name(i)).collect()
    }

    /// Makes `function` callable from scripts under `name`.
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> Result<Option<Value>> + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    /// Drains the change log and marks targets whose fact tables changed.
    ///
    /// Returns the number of targets that were clean or gated and are now
    /// due for evaluation.
    pub fn collect(&mut self, engine: &Engine) -> usize {
        let changed: Vec<String> = self.changes.borrow_mut().drain(..).collect();
        if changed.is_empty() {
            return 0;
        }
        let mut marked = 0;
        for target in &mut self.targets {
            let touched = changed.iter().any(|t| target.reads_fact(t));
            if touched && target.facts_changed(engine) {
                if target.state == TargetState::Clean || target.blocked {
                    marked += 1;
                }
                trace!(target_name = %target.name(), "fact input changed");
                target.mark_dirty();
            }
        }
        marked
    }

    /// Evaluates every dirty, eligible target in dependency order.
    pub fn resolve(&mut self, engine: &mut Engine) -> Result<Report> {
        Ok(self.run_pass(engine, None))
    }

    /// Like `resolve`, but re-evaluates every target regardless of state
    /// or retry gate.
    pub fn force_resolve(&mut self, engine: &mut Engine) -> Result<Report> {
        for target in &mut self.targets {
            target.mark_dirty();
        }
        self.resolve(engine)
    }

    /// Brings the configured auto-update target up to date, or everything
    /// when none is configured.
    pub fn resolve_auto(&mut self, engine: &mut Engine) -> Result<Report> {
        match self.config.auto_update_target.clone() {
            Some(name) => self.update_target(engine, &name),
            None => self.resolve(engine),
        }
    }

    /// Brings one target and everything it reads up to date.
    pub fn update_target(&mut self, engine: &mut Engine, name: &str) -> Result<Report> {
        let node = self.node(name)?;
        let scope = self.graph.prerequisites(node);
        Ok(self.run_pass(engine, Some(&scope)))
    }

    /// Returns the value `name` exposes after bringing it up to date.
    ///
    /// A target that failed reports its last error instead.
    pub fn value(&mut self, engine: &mut Engine, name: &str) -> Result<Option<Value>> {
        let node = self.node(name)?;
        self.update_target(engine, name)?;
        let target = &self.targets[node];
        match (target.state(), target.last_error()) {
            (TargetState::Clean, _) => Ok(target.exposed().cloned()),
            (_, Some(err)) => Err(err.clone()),
            (state, None) => Err(Error::invalid_operation(format!(
                "target {} is {}",
                name, state
            ))),
        }
    }

    fn node(&self, name: &str) -> Result<usize> {
        let node = self
            .graph
            .node(name)
            .ok_or_else(|| Error::not_found("target", name))?;
        if self.sorted.unordered.contains(&node) {
            return Err(self.graph.cycle_error(&self.sorted.unordered));
        }
        Ok(node)
    }

    fn inputs_advanced(&self, node: usize) -> bool {
        self.graph
            .inputs(node)
            .iter()
            .zip(&self.targets[node].input_stamps)
            .any(|(&input, &seen)| self.targets[input].stamp != seen)
    }

    fn record_inputs(&mut self, engine: &Engine, node: usize) {
        let stamps = self
            .graph
            .inputs(node)
            .iter()
            .map(|&input| self.targets[input].stamp)
            .collect();
        let target = &mut self.targets[node];
        target.input_stamps = stamps;
        target.record_facts(engine);
    }

    fn run_pass(&mut self, engine: &mut Engine, scope: Option<&[bool]>) -> Report {
        let in_scope = |node: usize| scope.map_or(true, |s| s[node]);
        self.collect(engine);
        debug!(generation = self.generation, "resolver pass started");

        let mut report = Report::default();
        let cycle: Vec<usize> = self
            .sorted
            .unordered
            .iter()
            .copied()
            .filter(|&n| in_scope(n))
            .collect();
        if !cycle.is_empty() {
            let err = self.graph.cycle_error(&self.sorted.unordered);
            warn!(error = %err, "skipping targets on a dependency cycle");
            for node in cycle {
                report.failed.push((self.graph.name(node).to_string(), err.clone()));
            }
        }

        for pos in 0..self.sorted.order.len() {
            let node = self.sorted.order[pos];
            if !in_scope(node) {
                continue;
            }
            if self.inputs_advanced(node) {
                self.targets[node].mark_dirty();
            }
            let target = &self.targets[node];
            if target.state != TargetState::Dirty || (target.blocked && !self.config.retry_failed) {
                continue;
            }

            self.targets[node].state = TargetState::Evaluating;
            debug!(target_name = %self.graph.name(node), "evaluating target");
            let outcome = self.evaluate(engine, node);
            self.record_inputs(engine, node);
            let name = self.graph.name(node).to_string();
            match outcome {
                Ok(exposed) => {
                    self.generation += 1;
                    let target = &mut self.targets[node];
                    target.stamp = self.generation;
                    target.exposed = exposed;
                    target.state = TargetState::Clean;
                    target.blocked = false;
                    target.last_error = None;
                    report.evaluated.push(name);
                    // Pick up tables the script wrote so later readers see them.
                    self.collect(engine);
                }
                Err(err) => {
                    let target = &mut self.targets[node];
                    let err = target.locate(err);
                    warn!(target_name = %name, error = %err, "target evaluation failed");
                    target.state = TargetState::Dirty;
                    target.blocked = true;
                    target.last_error = Some(err.clone());
                    report.failed.push((name, err));
                }
            }
        }

        debug!(
            evaluated = report.evaluated.len(),
            failed = report.failed.len(),
            "resolver pass finished"
        );
        report
    }

    /// Runs one target's script inside its own engine transaction.
    fn evaluate(&self, engine: &mut Engine, node: usize) -> Result<Option<Value>> {
        let tx = engine.begin()?;
        match self.run_script(engine, &self.targets[node]) {
            Ok(exposed) => {
                engine.commit(tx)?;
                Ok(exposed)
            }
            Err(err) => {
                if let Err(rollback) = engine.rollback(tx) {
                    warn!(error = %rollback, "rollback after failed evaluation");
                }
                Err(err)
            }
        }
    }

    fn run_script(&self, engine: &mut Engine, target: &Target) -> Result<Option<Value>> {
        let mut context = Context::new(self.config.max_frame_depth);
        context.push()?;
        context.declare("target", Value::from(target.name()))?;
        for fact in target.facts() {
            let rows = engine
                .table(fact)
                .and_then(|h| engine.row_count(h))
                .unwrap_or(0);
            context.declare(fact, int_value(rows as i64)?)?;
        }

        let exposed = match target.script() {
            Some(script) => {
                let peers = |name: &str| -> Result<Option<Value>> {
                    let node = self
                        .graph
                        .node(name)
                        .ok_or_else(|| Error::not_found("target", name))?;
                    Ok(self.targets[node].exposed.clone())
                };
                let mut cx = CallContext::new(engine, &mut context, target.name(), &peers);
                script.run(&mut cx, &self.functions)?;
                cx.into_exposed()
            }
            None => None,
        };
        context.pop()?;
        Ok(exposed)
    }

    /// Renders the tables of `engine` and the state of every target.
    pub fn dump_text(&self, engine: &Engine) -> String {
        let mut out = String::from("tables:\n");
        for name in engine.table_names() {
            let rows = engine
                .table(&name)
                .and_then(|h| engine.row_count(h))
                .unwrap_or(0);
            let _ = writeln!(out, "  {} rows={} stamp={}", name, rows, engine.table_stamp(&name));
        }
        out.push_str("targets:\n");
        for (node, target) in self.targets.iter().enumerate() {
            let inputs: Vec<String> = target
                .facts()
                .iter()
                .map(|f| format!("${}", f))
                .chain(self.graph.inputs(node).iter().map(|&i| self.graph.name(i).to_string()))
                .collect();
            let value = target
                .exposed()
                .map_or_else(|| "-".to_string(), Value::to_string);
            let _ = write!(
                out,
                "  {} {} stamp={} inputs={} value={}",
                target.name(),
                target.state(),
                target.stamp(),
                inputs.join(","),
                value
            );
            if target.is_blocked() {
                out.push_str(" blocked");
            }
            if let Some(err) = target.last_error() {
                let _ = write!(out, " error=\"{}\"", err);
            }
            out.push('\n');
        }
        out
    }

    /// Renders the dependency graph in Graphviz dot syntax.
    pub fn dump_dot(&self) -> String {
        let mut out = String::from("digraph verdict {\n");
        let facts: BTreeSet<&str> = self
            .targets
            .iter()
            .flat_map(|t| t.facts().iter().map(String::as_str))
            .collect();
        for target in &self.targets {
            let _ = writeln!(out, "  \"{}\" [shape=box];", target.name());
        }
        for fact in &facts {
            let _ = writeln!(out, "  \"${}\" [shape=ellipse];", fact);
        }
        for (node, target) in self.targets.iter().enumerate() {
            for fact in target.facts() {
                let _ = writeln!(out, "  \"{}\" -> \"${}\";", target.name(), fact);
            }
            for &input in self.graph.inputs(node) {
                let _ = writeln!(out, "  \"{}\" -> \"{}\";", target.name(), self.graph.name(input));
            }
        }
        out.push_str("}\n");
        out
    }
}
