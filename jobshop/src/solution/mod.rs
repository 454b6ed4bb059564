//! The two schedule flavours built on the shared disjunctive graph:
//! makespan minimisation and total weighted tardiness minimisation.

use std::collections::BTreeMap;
use std::fmt;

use disjunctgraph::{Move, SolutionGraph, TailMode, TaskId};
use fuzzytime::Time;
use itertools::Itertools;
use metaheur::SearchSolution;

use crate::problem::Problem;
use crate::JspError;

/// Machine-capacity orders: per machine id, its tasks first-to-last.
pub type MachineOrders = BTreeMap<u32, Vec<TaskId>>;

/// Common surface of the two schedule flavours.
///
/// Implementations are chosen at construction; everything downstream
/// (decoder, neighbourhoods, searches) is generic over this trait.
pub trait JspSolution: SearchSolution<Error = JspError> + fmt::Display {
    type Time: Time;

    /// Wires a fresh graph with the problem's job precedences and the
    /// given machine orders.
    fn build(problem: &Problem<Self::Time>, orders: &MachineOrders) -> Result<Self, JspError>;

    fn graph(&self) -> &SolutionGraph<Self::Time>;

    fn graph_mut(&mut self) -> &mut SolutionGraph<Self::Time>;

    /// The minimised objective value.
    fn objective(&mut self) -> Result<Self::Time, JspError>;

    /// The objective of a schedule given by earliest start times, without
    /// building a graph. `est` is indexed by task id.
    fn objective_from_schedule(problem: &Problem<Self::Time>, est: &[Self::Time]) -> Self::Time;

    /// Quality of the schedule that results from re-ordering a machine
    /// window to `order`, estimated from the surrounding heads and tails
    /// of the *current* schedule. `before` and `after` are the machine
    /// neighbours of the window.
    fn estimate_window_quality(
        &mut self,
        order: &[TaskId],
        before: Option<TaskId>,
        after: Option<TaskId>,
    ) -> Result<f64, JspError>;
}

fn wire_graph<T: Time>(
    problem: &Problem<T>,
    orders: &MachineOrders,
    tail_mode: TailMode,
) -> Result<SolutionGraph<T>, JspError> {
    let mut graph = SolutionGraph::new(tail_mode);
    for task in problem.tasks() {
        let id = graph.add_task(task.job, task.machine, task.duration, problem.is_final(task.id));
        debug_assert_eq!(id, task.id);
    }
    for job in problem.jobs() {
        for pair in problem.job_tasks(job.id).windows(2) {
            graph.add_precedence(pair[0], pair[1])?;
        }
    }
    for tasks in orders.values() {
        for pair in tasks.windows(2) {
            graph.add_capacity(pair[0], pair[1])?;
        }
    }
    Ok(graph)
}

fn sequence_lines<T: Time>(
    graph: &SolutionGraph<T>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for (_, jobs) in graph.solution_sequence().map_err(|_| fmt::Error)? {
        writeln!(f, "{}", jobs.iter().join(" "))?;
    }
    Ok(())
}

/// Forward head estimates over a re-ordered machine window, seeded from
/// the window's surroundings in the current schedule.
fn window_heads<T: Time>(
    graph: &mut SolutionGraph<T>,
    order: &[TaskId],
    before: Option<TaskId>,
) -> Result<Vec<T>, JspError> {
    let mut heads = Vec::with_capacity(order.len());
    let mut head = T::zero();
    if let Some(pred) = graph.job_pred(order[0]) {
        head = head.join(graph.head(pred)? + graph.duration(pred));
    }
    if let Some(before) = before {
        head = head.join(graph.head(before)? + graph.duration(before));
    }
    heads.push(head);
    for i in 1..order.len() {
        let mut head = heads[i - 1] + graph.duration(order[i - 1]);
        if let Some(pred) = graph.job_pred(order[i]) {
            head = head.join(graph.head(pred)? + graph.duration(pred));
        }
        heads.push(head);
    }
    Ok(heads)
}

fn window_tails<T: Time>(
    graph: &mut SolutionGraph<T>,
    order: &[TaskId],
    after: Option<TaskId>,
) -> Result<Vec<T>, JspError> {
    let len = order.len();
    let mut tails = vec![T::zero(); len];
    let mut tail = T::zero();
    if let Some(succ) = graph.job_succ(order[len - 1]) {
        tail = tail.join(graph.tail(succ)? + graph.duration(succ));
    }
    if let Some(after) = after {
        tail = tail.join(graph.tail(after)? + graph.duration(after));
    }
    tails[len - 1] = tail;
    for i in (0..len - 1).rev() {
        let mut tail = tails[i + 1] + graph.duration(order[i + 1]);
        if let Some(succ) = graph.job_succ(order[i]) {
            tail = tail.join(graph.tail(succ)? + graph.duration(succ));
        }
        tails[i] = tail;
    }
    Ok(tails)
}

fn join_opt<T: Time>(current: Option<T>, value: T) -> Option<T> {
    Some(match current {
        Some(current) => current.join(value),
        None => value,
    })
}

/// Schedule minimising the makespan.
#[derive(Clone, Debug, PartialEq)]
pub struct MakespanSolution<T: Time> {
    graph: SolutionGraph<T>,
}

impl<T: Time> MakespanSolution<T> {
    /// A variant without tails: enough for reading the makespan, but no
    /// critical-path queries. Used when a schedule is only evaluated,
    /// never searched.
    pub fn evaluation_only(
        problem: &Problem<T>,
        orders: &MachineOrders,
    ) -> Result<Self, JspError> {
        Ok(MakespanSolution {
            graph: wire_graph(problem, orders, TailMode::Disabled)?,
        })
    }

    pub fn makespan(&mut self) -> Result<T, JspError> {
        Ok(self.graph.makespan()?)
    }
}

impl<T: Time> SearchSolution for MakespanSolution<T> {
    type Error = JspError;

    fn quality(&mut self) -> Result<f64, JspError> {
        Ok(self.graph.quality()?)
    }

    fn apply(&mut self, mv: &Move) -> Result<(), JspError> {
        Ok(self.graph.apply_move(mv)?)
    }
}

impl<T: Time> JspSolution for MakespanSolution<T> {
    type Time = T;

    fn build(problem: &Problem<T>, orders: &MachineOrders) -> Result<Self, JspError> {
        Ok(MakespanSolution {
            graph: wire_graph(problem, orders, TailMode::Aggregate)?,
        })
    }

    fn graph(&self) -> &SolutionGraph<T> {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut SolutionGraph<T> {
        &mut self.graph
    }

    fn objective(&mut self) -> Result<T, JspError> {
        self.makespan()
    }

    fn objective_from_schedule(problem: &Problem<T>, est: &[T]) -> T {
        let mut makespan = T::zero();
        for id in problem.final_tasks() {
            makespan = makespan.join(est[id.index()] + problem.task(id).duration);
        }
        makespan
    }

    fn estimate_window_quality(
        &mut self,
        order: &[TaskId],
        before: Option<TaskId>,
        after: Option<TaskId>,
    ) -> Result<f64, JspError> {
        let heads = window_heads(&mut self.graph, order, before)?;
        let tails = window_tails(&mut self.graph, order, after)?;
        let mut makespan = T::zero();
        for (i, &task) in order.iter().enumerate() {
            makespan = makespan.join(heads[i] + self.graph.duration(task) + tails[i]);
        }
        Ok(1.0 / makespan.expected())
    }
}

impl<T: Time> fmt::Display for MakespanSolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut graph = self.graph.clone();
        let makespan = graph.makespan().map_err(|_| fmt::Error)?;
        writeln!(f, "Makespan {makespan}")?;
        sequence_lines(&graph, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct JobTerm<T> {
    job: u32,
    due_date: T,
    weight: f64,
    last_task: TaskId,
}

/// Schedule minimising the total weighted tardiness
/// `sum_j w_j * max(0, C_j - due_j)`.
///
/// Carries per-job tails so that moves can estimate how every job's
/// completion time shifts.
#[derive(Clone, Debug, PartialEq)]
pub struct TardinessSolution<T: Time> {
    graph: SolutionGraph<T>,
    job_terms: Vec<JobTerm<T>>,
}

impl<T: Time> TardinessSolution<T> {
    pub fn total_weighted_tardiness(&mut self) -> Result<T, JspError> {
        let mut twt = T::zero();
        for i in 0..self.job_terms.len() {
            let JobTerm {
                due_date,
                weight,
                last_task,
                ..
            } = self.job_terms[i];
            let completion = self.graph.head(last_task)? + self.graph.duration(last_task);
            let tardiness = T::zero().join(completion.minus(due_date.expected()));
            twt += tardiness.scale(weight);
        }
        Ok(twt)
    }
}

impl<T: Time> SearchSolution for TardinessSolution<T> {
    type Error = JspError;

    fn quality(&mut self) -> Result<f64, JspError> {
        Ok(1.0 / self.total_weighted_tardiness()?.expected())
    }

    fn apply(&mut self, mv: &Move) -> Result<(), JspError> {
        Ok(self.graph.apply_move(mv)?)
    }
}

impl<T: Time> JspSolution for TardinessSolution<T> {
    type Time = T;

    fn build(problem: &Problem<T>, orders: &MachineOrders) -> Result<Self, JspError> {
        let graph = wire_graph(problem, orders, TailMode::PerJob)?;
        let job_terms = problem
            .jobs()
            .filter_map(|job| {
                let last_task = *problem.job_tasks(job.id).last()?;
                Some(JobTerm {
                    job: job.id,
                    due_date: job.due_date,
                    weight: job.weight,
                    last_task,
                })
            })
            .collect();
        Ok(TardinessSolution { graph, job_terms })
    }

    fn graph(&self) -> &SolutionGraph<T> {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut SolutionGraph<T> {
        &mut self.graph
    }

    fn objective(&mut self) -> Result<T, JspError> {
        self.total_weighted_tardiness()
    }

    fn objective_from_schedule(problem: &Problem<T>, est: &[T]) -> T {
        let mut twt = T::zero();
        for id in problem.final_tasks() {
            let task = problem.task(id);
            let job = match problem.job(task.job) {
                Some(job) => job,
                None => continue,
            };
            let completion = est[id.index()] + task.duration;
            let tardiness = T::zero().join(completion.minus(job.due_date.expected()));
            twt += tardiness.scale(job.weight);
        }
        twt
    }

    fn estimate_window_quality(
        &mut self,
        order: &[TaskId],
        before: Option<TaskId>,
        after: Option<TaskId>,
    ) -> Result<f64, JspError> {
        let heads = window_heads(&mut self.graph, order, before)?;
        let len = order.len();
        let last = order[len - 1];
        let mut twt = T::zero();

        for i in 0..self.job_terms.len() {
            let JobTerm {
                job,
                due_date,
                weight,
                ..
            } = self.job_terms[i];
            let ends_job =
                |graph: &SolutionGraph<T>, task: TaskId| -> Option<T> {
                    (graph.job_of(task) == job && graph.last_of_job(task)).then(T::zero)
                };

            // per-job tails over the window; None marks window tasks from
            // which this job's completion is unreachable
            let mut tails: Vec<Option<T>> = vec![None; len];
            let mut tail = ends_job(&self.graph, last);
            if let Some(succ) = self.graph.job_succ(last) {
                if let Some(succ_tail) = self.graph.job_tail(succ, job)? {
                    tail = join_opt(tail, succ_tail + self.graph.duration(succ));
                }
            }
            if let Some(after) = after {
                if let Some(after_tail) = self.graph.job_tail(after, job)? {
                    tail = join_opt(tail, after_tail + self.graph.duration(after));
                }
            }
            tails[len - 1] = tail;
            for k in (0..len - 1).rev() {
                let task = order[k];
                let mut tail = ends_job(&self.graph, task);
                if let Some(next_tail) = tails[k + 1] {
                    tail = join_opt(tail, next_tail + self.graph.duration(order[k + 1]));
                }
                if let Some(succ) = self.graph.job_succ(task) {
                    if let Some(succ_tail) = self.graph.job_tail(succ, job)? {
                        tail = join_opt(tail, succ_tail + self.graph.duration(succ));
                    }
                }
                tails[k] = tail;
            }

            let mut completion: Option<T> = None;
            for k in 0..len {
                if let Some(tail) = tails[k] {
                    completion = join_opt(
                        completion,
                        heads[k] + self.graph.duration(order[k]) + tail,
                    );
                }
            }
            if let Some(completion) = completion {
                let tardiness = T::zero().join(completion.minus(due_date.expected()));
                twt += tardiness.scale(weight);
            }
        }
        Ok(1.0 / twt.expected())
    }
}

impl<T: Time> fmt::Display for TardinessSolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut graph = self.graph.clone();
        let makespan = graph.makespan().map_err(|_| fmt::Error)?;
        writeln!(f, "Makespan {makespan}")?;
        sequence_lines(&graph, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;

    /// job 1: m1 (3) -> m2 (2); job 2: m2 (2) -> m1 (4)
    fn problem() -> Problem<f64> {
        Problem::from_reader(
            r"2 2
0 3 1 2
1 2 0 4"
                .as_bytes(),
        )
        .unwrap()
    }

    fn orders(problem: &Problem<f64>) -> MachineOrders {
        // machine 1: j1 then j2; machine 2: j2 then j1
        let t = |job, pos| problem.task_at(job, pos).unwrap().id;
        let mut orders = MachineOrders::new();
        orders.insert(1, vec![t(1, 0), t(2, 1)]);
        orders.insert(2, vec![t(2, 0), t(1, 1)]);
        orders
    }

    #[test]
    fn makespan_solution_reads_the_critical_path() {
        let problem = problem();
        let mut solution = MakespanSolution::build(&problem, &orders(&problem)).unwrap();
        assert_eq!(solution.makespan().unwrap(), 7.0);
        assert_eq!(solution.quality().unwrap(), 1.0 / 7.0);

        let blocks = solution.graph_mut().critical_blocks().unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn evaluation_only_solution_still_reports_the_makespan() {
        let problem = problem();
        let mut solution = MakespanSolution::evaluation_only(&problem, &orders(&problem)).unwrap();
        assert_eq!(solution.makespan().unwrap(), 7.0);
    }

    #[test]
    fn tardiness_objective_weighs_late_jobs() {
        let problem: Problem<f64> = Problem::from_reader_due_dates(
            r"2 2
4 2
0 3 1 2
5 1
1 2 0 4"
                .as_bytes(),
        )
        .unwrap();
        let mut solution = TardinessSolution::build(&problem, &orders(&problem)).unwrap();
        // completions: job 1 at 5 (due 4, weight 2), job 2 at 7 (due 5)
        assert_eq!(solution.total_weighted_tardiness().unwrap(), 2.0 + 2.0);
        assert_eq!(solution.quality().unwrap(), 0.25);
    }

    #[test]
    fn schedule_objectives_match_the_graph() {
        let problem = problem();
        let mut solution = MakespanSolution::build(&problem, &orders(&problem)).unwrap();
        // earliest starts for the same machine orders
        let mut est = vec![0.0; problem.task_count()];
        for task in problem.tasks() {
            est[task.id.index()] = solution.graph_mut().head(task.id).unwrap();
        }
        assert_eq!(
            MakespanSolution::objective_from_schedule(&problem, &est),
            solution.makespan().unwrap()
        );
    }

    #[test]
    fn display_renders_the_trace_block() {
        let problem = problem();
        let solution = MakespanSolution::build(&problem, &orders(&problem)).unwrap();
        assert_eq!(solution.to_string(), "Makespan 7\n1 2\n2 1\n");
    }

    #[test]
    fn exact_estimate_on_a_full_machine_window() {
        // single machine: the window covers everything, so the estimate
        // equals the true makespan
        let problem: Problem<f64> = Problem::from_reader(
            r"3 1
0 4
0 2
0 5"
                .as_bytes(),
        )
        .unwrap();
        let order: Vec<TaskId> = problem.machine_tasks(1).to_vec();
        let mut machine_orders = MachineOrders::new();
        machine_orders.insert(1, order.clone());
        let mut solution = MakespanSolution::build(&problem, &machine_orders).unwrap();
        assert_eq!(solution.makespan().unwrap(), 11.0);

        let estimate = solution
            .estimate_window_quality(&order, None, None)
            .unwrap();
        assert_eq!(estimate, 1.0 / 11.0);

        // reversed window: still the full machine, still exact
        let reversed: Vec<TaskId> = order.iter().rev().copied().collect();
        let estimate = solution
            .estimate_window_quality(&reversed, None, None)
            .unwrap();
        assert_eq!(estimate, 1.0 / 11.0);
    }
}
