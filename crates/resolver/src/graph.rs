//! Target dependency graph.

use hashbrown::HashMap;
use std::collections::BTreeSet;
use verdict_core::{Error, Result};

/// Outcome of a topological sort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sorted {
    /// Nodes in dependency order; every node follows all of its inputs.
    pub order: Vec<usize>,
    /// Nodes on a cycle or downstream of one, in declaration order.
    pub unordered: Vec<usize>,
}

/// Directed graph of targets, with an edge from each target to each
/// target it reads.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    inputs: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; names must be unique.
    pub fn add_node(&mut self, name: &str) -> Result<usize> {
        if self.index.contains_key(name) {
            return Err(Error::constraint(format!("duplicate target {}", name)));
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.inputs.push(Vec::new());
        self.dependents.push(Vec::new());
        Ok(id)
    }

    /// Records that `node` reads `input`.
    pub fn add_edge(&mut self, node: usize, input: usize) {
        if !self.inputs[node].contains(&input) {
            self.inputs[node].push(input);
            self.dependents[input].push(node);
        }
    }

    pub fn node(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, node: usize) -> &str {
        &self.names[node]
    }

    pub fn inputs(&self, node: usize) -> &[usize] {
        &self.inputs[node]
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Kahn's algorithm. Among nodes ready at the same time the one
    /// declared first goes first, so the order is deterministic.
    pub fn sort(&self) -> Sorted {
        let mut pending: Vec<usize> = self.inputs.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&n| pending[n] == 0).collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &next in &self.dependents[node] {
                pending[next] -= 1;
                if pending[next] == 0 {
                    ready.insert(next);
                }
            }
        }
        let unordered = (0..self.len()).filter(|&n| pending[n] > 0).collect();
        Sorted { order, unordered }
    }

    /// Marks `node` and every node it transitively reads.
    pub fn prerequisites(&self, node: usize) -> Vec<bool> {
        let mut seen = vec![false; self.len()];
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if !seen[n] {
                seen[n] = true;
                stack.extend(self.inputs[n].iter().copied());
            }
        }
        seen
    }

    /// Builds the error reported for unordered nodes.
    pub fn cycle_error(&self, nodes: &[usize]) -> Error {
        Error::cycle(nodes.iter().map(|&n| self.names[n].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::ErrorKind;

    fn graph(names: &[&str], edges: &[(usize, usize)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for name in names {
            g.add_node(name).unwrap();
        }
        for &(node, input) in edges {
            g.add_edge(node, input);
        }
        g
    }

    #[test]
    fn test_sort_respects_inputs() {
        // c reads b, b reads a, declared in reverse.
        let g = graph(&["c", "b", "a"], &[(0, 1), (1, 2)]);
        let sorted = g.sort();
        assert_eq!(sorted.order, vec![2, 1, 0]);
        assert!(sorted.unordered.is_empty());
    }

    #[test]
    fn test_ties_follow_declaration() {
        let g = graph(&["x", "y", "z", "w"], &[(3, 0)]);
        assert_eq!(g.sort().order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cycle_leaves_members_unordered() {
        // a <-> b, c reads b, d is independent
        let g = graph(&["a", "b", "c", "d"], &[(0, 1), (1, 0), (2, 1)]);
        let sorted = g.sort();
        assert_eq!(sorted.order, vec![3]);
        assert_eq!(sorted.unordered, vec![0, 1, 2]);
        let err = g.cycle_error(&sorted.unordered);
        assert_eq!(err.kind(), ErrorKind::CycleDetected);
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c");
    }

    #[test]
    fn test_prerequisites_and_duplicates() {
        let mut g = graph(&["a", "b", "c"], &[(2, 1), (1, 0)]);
        g.add_edge(2, 1);
        assert_eq!(g.inputs(2), &[1]);
        assert_eq!(g.dependents(0), &[1]);
        assert_eq!(g.prerequisites(1), vec![true, true, false]);
        assert_eq!(g.add_node("a").unwrap_err().kind(), ErrorKind::ConstraintViolation);
        assert_eq!(g.node("c"), Some(2));
    }
}
