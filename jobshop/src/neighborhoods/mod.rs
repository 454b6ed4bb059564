//! Critical-block neighbourhoods.
//!
//! Both operators only propose feasibility-preserving moves: reversing a
//! critical arc, or sliding a task along its own critical block, can
//! never create a cycle.

use std::collections::VecDeque;

use disjunctgraph::{Move, TaskId};
use fuzzytime::Time;
use metaheur::{MoveData, Neighborhood};

use crate::solution::JspSolution;
use crate::JspError;

/// Scores a candidate move.
///
/// Exact mode applies the move to the scratch copy, reads the objective
/// and rolls back with the inverse; estimate mode asks the solution for
/// its localised window bounds on the untouched graph.
fn candidate_quality<S: JspSolution>(
    estimate: bool,
    solution: &mut S,
    scratch: &mut S,
    mv: &Move,
    order: &[TaskId],
    before: Option<TaskId>,
    after: Option<TaskId>,
) -> Result<f64, JspError> {
    if estimate {
        solution.estimate_window_quality(order, before, after)
    } else {
        scratch.apply(mv)?;
        let quality = scratch.quality()?;
        scratch.apply(&mv.invert())?;
        Ok(quality)
    }
}

/// Critical-Edge Transpose: swap the first arc of every critical block,
/// and the last arc of blocks with at least two.
pub struct Cet {
    pub estimate: bool,
}

impl Cet {
    pub fn exact() -> Self {
        Cet { estimate: false }
    }

    pub fn estimating() -> Self {
        Cet { estimate: true }
    }
}

impl<S: JspSolution> Neighborhood<S> for Cet {
    fn neighbors(&self, solution: &mut S) -> Result<Vec<MoveData>, JspError> {
        let blocks = solution.graph_mut().critical_blocks()?;
        let mut scratch = solution.clone();
        let mut candidates = Vec::new();

        for block in &blocks {
            let mut edges = vec![block.first()];
            if block.len() > 1 {
                edges.push(block.last());
            }
            for (from, to) in edges.into_iter().flatten() {
                let mv = Move::single(from, to);
                let order = [to, from];
                let before = solution.graph().mach_pred(from);
                let after = solution.graph().mach_succ(to);
                let quality = candidate_quality(
                    self.estimate,
                    solution,
                    &mut scratch,
                    &mv,
                    &order,
                    before,
                    after,
                )?;
                candidates.push(MoveData::new(mv, quality));
            }
        }
        Ok(candidates)
    }
}

/// Critical-Edge Insert: slide a block-opening task towards the back of
/// its block (tail shift), or a block-closing task towards the front
/// (head shift), as far as the job constraints admit.
pub struct Cei {
    pub estimate: bool,
}

impl Cei {
    pub fn exact() -> Self {
        Cei { estimate: false }
    }

    pub fn estimating() -> Self {
        Cei { estimate: true }
    }
}

impl<S: JspSolution> Neighborhood<S> for Cei {
    fn neighbors(&self, solution: &mut S) -> Result<Vec<MoveData>, JspError> {
        let blocks = solution.graph_mut().critical_blocks()?;
        let mut scratch = solution.clone();
        let mut candidates = Vec::new();

        for block in &blocks {
            let edges: Vec<(TaskId, TaskId)> = block.edges().collect();

            // tail shifts: relocate the `from` of an edge after one or
            // more of the block members that follow it
            for i in 0..edges.len() {
                let relocated = edges[i].0;
                let completion = match solution.graph().job_succ(relocated) {
                    Some(succ) => {
                        solution.graph_mut().head(succ)? + solution.graph().duration(succ)
                    }
                    None => Time::zero(),
                };

                let mut mv = Move::new();
                let mut order: VecDeque<TaskId> = VecDeque::new();
                for &(_, target) in &edges[i..] {
                    let head = match solution.graph().job_pred(target) {
                        Some(pred) => solution.graph_mut().head(pred)?,
                        None => Time::zero(),
                    };
                    if head.expected() >= completion.expected() {
                        break;
                    }
                    mv.add_change(relocated, target);
                    order.push_back(target);
                }
                if !order.is_empty() {
                    order.push_back(relocated);
                    let before = solution.graph().mach_pred(relocated);
                    let after = solution.graph().mach_succ(order[order.len() - 2]);
                    let order: Vec<TaskId> = order.into();
                    let quality = candidate_quality(
                        self.estimate,
                        solution,
                        &mut scratch,
                        &mv,
                        &order,
                        before,
                        after,
                    )?;
                    candidates.push(MoveData::new(mv, quality));
                }
            }

            // head shifts: relocate the `to` of an edge before one or
            // more of the block members preceding it
            for i in (0..edges.len()).rev() {
                let relocated = edges[i].1;
                let head = match solution.graph().job_pred(relocated) {
                    Some(pred) => solution.graph_mut().head(pred)?,
                    None => Time::zero(),
                };

                let mut mv = Move::new();
                let mut order: VecDeque<TaskId> = VecDeque::new();
                for &(target, _) in edges[..=i].iter().rev() {
                    let completion = match solution.graph().job_succ(target) {
                        Some(succ) => {
                            solution.graph_mut().head(succ)? + solution.graph().duration(succ)
                        }
                        None => Time::zero(),
                    };
                    if head.expected() >= completion.expected() {
                        break;
                    }
                    mv.add_change(target, relocated);
                    order.push_front(target);
                }
                if !order.is_empty() {
                    order.push_front(relocated);
                    let before = solution.graph().mach_pred(order[1]);
                    let after = solution.graph().mach_succ(order[0]);
                    let order: Vec<TaskId> = order.into();
                    let quality = candidate_quality(
                        self.estimate,
                        solution,
                        &mut scratch,
                        &mv,
                        &order,
                        before,
                        after,
                    )?;
                    candidates.push(MoveData::new(mv, quality));
                }
            }
        }
        Ok(candidates)
    }
}
