//! Disjunctive-graph representation of job-shop schedules.
//!
//! A schedule is a DAG over tasks with two families of arcs: fixed
//! job-precedence arcs and mutable machine-capacity arcs. Heads (longest
//! path into a task) and tails (longest path out of it) are recomputed
//! lazily from a dirty set, so local-search mutations stay cheap.

mod solution_graph;

use std::collections::VecDeque;

pub use solution_graph::{SolutionGraph, TailMode};

use thiserror::Error;

/// Dense index of a task inside the solution graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl TaskId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("a constraint already occupies the requested slot")]
    LinkOccupied,
    #[error("the constraint to remove does not exist")]
    LinkMissing,
    #[error("tasks are processed on different machines")]
    MachineMismatch,
    #[error("the disjunctive graph is not acyclic")]
    Cyclic,
}

/// A reversible schedule mutation: an ordered list of adjacent-on-machine
/// exchanges `(from, to)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Move {
    changes: Vec<(TaskId, TaskId)>,
}

impl Move {
    pub fn new() -> Self {
        Move::default()
    }

    /// A move consisting of a single exchange.
    pub fn single(from: TaskId, to: TaskId) -> Self {
        let mut mv = Move::new();
        mv.add_change(from, to);
        mv
    }

    pub fn add_change(&mut self, from: TaskId, to: TaskId) {
        self.changes.push((from, to));
    }

    /// The move that undoes this one: pairs swapped, order reversed.
    pub fn invert(&self) -> Move {
        Move {
            changes: self
                .changes
                .iter()
                .rev()
                .map(|&(from, to)| (to, from))
                .collect(),
        }
    }

    pub fn changes(&self) -> &[(TaskId, TaskId)] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A run of machine arcs `(from, to)` along one critical path, ordered
/// from the earliest edge to the latest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    edges: VecDeque<(TaskId, TaskId)>,
}

impl Block {
    pub fn new() -> Self {
        Block::default()
    }

    pub fn push_front(&mut self, from: TaskId, to: TaskId) {
        self.edges.push_front((from, to));
    }

    pub fn push_back(&mut self, from: TaskId, to: TaskId) {
        self.edges.push_back((from, to));
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl DoubleEndedIterator<Item = (TaskId, TaskId)> + '_ {
        self.edges.iter().copied()
    }

    pub fn first(&self) -> Option<(TaskId, TaskId)> {
        self.edges.front().copied()
    }

    pub fn last(&self) -> Option<(TaskId, TaskId)> {
        self.edges.back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_reverses_order_and_swaps_pairs() {
        let mut mv = Move::new();
        mv.add_change(TaskId(1), TaskId(2));
        mv.add_change(TaskId(1), TaskId(3));

        let inverse = mv.invert();
        assert_eq!(
            inverse.changes(),
            &[(TaskId(3), TaskId(1)), (TaskId(2), TaskId(1))]
        );
        assert_eq!(inverse.invert(), mv);
    }

    #[test]
    fn block_keeps_edges_in_path_order() {
        let mut block = Block::new();
        block.push_front(TaskId(2), TaskId(3));
        block.push_front(TaskId(1), TaskId(2));

        assert_eq!(block.len(), 2);
        assert_eq!(block.first(), Some((TaskId(1), TaskId(2))));
        assert_eq!(block.last(), Some((TaskId(2), TaskId(3))));
    }
}
