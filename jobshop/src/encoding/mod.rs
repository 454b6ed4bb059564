//! Permutation-with-repetition chromosomes and the Giffler & Thompson
//! active-schedule builder.
//!
//! A chromosome lists job ids; the k-th occurrence of job `j` stands for
//! j's k-th task. Decoding turns chromosome positions into priorities,
//! derives earliest start times with G&T, and installs the resulting
//! machine orders on a fresh solution graph.

use std::marker::PhantomData;

use disjunctgraph::TaskId;
use fuzzytime::Time;
use itertools::Itertools;
use metaheur::evolutionary::{Evaluator, Gene};
use std::collections::BTreeMap;

use crate::problem::{ModelError, Problem};
use crate::solution::{JspSolution, MachineOrders};
use crate::JspError;

/// Encoder/decoder between chromosomes and schedules of flavour `S`.
pub struct PermutationWithRepetition<'p, S: JspSolution> {
    problem: &'p Problem<S::Time>,
    _solution: PhantomData<S>,
}

impl<'p, S: JspSolution> PermutationWithRepetition<'p, S> {
    pub fn new(problem: &'p Problem<S::Time>) -> Self {
        PermutationWithRepetition {
            problem,
            _solution: PhantomData,
        }
    }

    pub fn problem(&self) -> &'p Problem<S::Time> {
        self.problem
    }

    /// The chromosome of a schedule: job ids in topological order.
    pub fn encode(&self, solution: &S) -> Result<Vec<Gene>, JspError> {
        let order = solution.graph().topological_order()?;
        Ok(order
            .into_iter()
            .map(|task| solution.graph().job_of(task))
            .collect())
    }

    /// Builds the schedule of a chromosome and rewrites the chromosome
    /// into its canonical decoded form (`encode` of the result).
    pub fn decode(&self, chromosome: &mut Vec<Gene>) -> Result<S, JspError> {
        let priorities = self.priorities(chromosome)?;
        let schedule = self.schedule_with(&priorities);

        let mut est = vec![S::Time::zero(); self.problem.task_count()];
        for &(task, start) in &schedule {
            est[task.index()] = start;
        }

        // per machine: earliest start first, chromosome priority breaking
        // ties
        let mut orders = MachineOrders::new();
        for machine in self.problem.machines() {
            let tasks = self
                .problem
                .machine_tasks(machine.id)
                .iter()
                .copied()
                .sorted_by(|&a, &b| {
                    est[a.index()]
                        .expected()
                        .partial_cmp(&est[b.index()].expected())
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| priorities[a.index()].cmp(&priorities[b.index()]))
                })
                .collect_vec();
            orders.insert(machine.id, tasks);
        }

        let solution = S::build(self.problem, &orders)?;
        *chromosome = self.encode(&solution)?;
        Ok(solution)
    }

    /// Runs the G&T builder: `(task, earliest start)` in scheduling
    /// order. The order is a topological order of the induced schedule.
    pub fn active_schedule(
        &self,
        chromosome: &[Gene],
    ) -> Result<Vec<(TaskId, S::Time)>, JspError> {
        let priorities = self.priorities(chromosome)?;
        Ok(self.schedule_with(&priorities))
    }

    /// Chromosome position of every task, by task index.
    fn priorities(&self, chromosome: &[Gene]) -> Result<Vec<usize>, JspError> {
        if chromosome.len() != self.problem.task_count() {
            return Err(ModelError::ChromosomeMismatch {
                got: chromosome.len(),
                expected: self.problem.task_count(),
            }
            .into());
        }
        let mut occurrence: BTreeMap<Gene, usize> = BTreeMap::new();
        let mut priorities = vec![usize::MAX; self.problem.task_count()];
        for (slot, &job) in chromosome.iter().enumerate() {
            let position = occurrence.entry(job).or_insert(0);
            let task = self
                .problem
                .task_at(job, *position)
                .ok_or(ModelError::TaskNotFound {
                    job,
                    position: *position,
                })?;
            priorities[task.id.index()] = slot;
            *position += 1;
        }
        Ok(priorities)
    }

    fn schedule_with(&self, priorities: &[usize]) -> Vec<(TaskId, S::Time)> {
        let problem = self.problem;
        let mut est: Vec<S::Time> = vec![Time::zero(); problem.task_count()];
        let mut machine_avail: BTreeMap<u32, S::Time> = BTreeMap::new();
        let mut available: Vec<TaskId> = problem.initial_tasks();
        let mut schedule = Vec::with_capacity(problem.task_count());

        while !available.is_empty() {
            let start_of = |task: TaskId, est: &[S::Time], avail: &BTreeMap<u32, S::Time>| {
                let machine = problem.task(task).machine;
                let free = avail.get(&machine).copied().unwrap_or_else(Time::zero);
                est[task.index()].join(free)
            };

            // candidate: earliest possible completion, priority on ties
            let candidate = *available
                .iter()
                .min_by(|&&a, &&b| {
                    let ect_a = start_of(a, &est, &machine_avail) + problem.task(a).duration;
                    let ect_b = start_of(b, &est, &machine_avail) + problem.task(b).duration;
                    ect_a
                        .expected()
                        .partial_cmp(&ect_b.expected())
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| priorities[a.index()].cmp(&priorities[b.index()]))
                })
                .expect("available set is non-empty");
            let candidate_ect =
                start_of(candidate, &est, &machine_avail) + problem.task(candidate).duration;
            let machine = problem.task(candidate).machine;

            // conflict set: tasks on the candidate's machine that could
            // start before the candidate would complete; the earliest
            // chromosome slot wins
            let mut winner: Option<(usize, TaskId)> = None;
            for &task in &available {
                if problem.task(task).machine != machine {
                    continue;
                }
                let start = start_of(task, &est, &machine_avail);
                if start.expected() < candidate_ect.expected() {
                    let priority = priorities[task.index()];
                    if winner.map_or(true, |(best, _)| priority < best) {
                        winner = Some((priority, task));
                    }
                }
            }
            let (_, winner) = winner.unwrap_or((priorities[candidate.index()], candidate));

            let start = start_of(winner, &est, &machine_avail);
            let completion = start + problem.task(winner).duration;
            est[winner.index()] = start;
            machine_avail.insert(machine, completion);
            available.retain(|&task| task != winner);

            let winner_task = problem.task(winner);
            if let Some(next) = problem.task_at(winner_task.job, winner_task.position as usize + 1)
            {
                est[next.id.index()] = completion;
                available.push(next.id);
            }
            schedule.push((winner, start));
        }
        schedule
    }
}

impl<'p, S: JspSolution> Evaluator for PermutationWithRepetition<'p, S> {
    type Error = JspError;

    /// Fast evaluation: G&T start times straight to the objective, no
    /// graph built. The chromosome is rewritten in scheduling order.
    fn evaluate(&self, chromosome: &mut Vec<Gene>) -> Result<f64, JspError> {
        let schedule = self.active_schedule(chromosome)?;
        let mut est = vec![S::Time::zero(); self.problem.task_count()];
        for &(task, start) in &schedule {
            est[task.index()] = start;
        }
        *chromosome = schedule
            .iter()
            .map(|&(task, _)| self.problem.task(task).job)
            .collect();
        let objective = S::objective_from_schedule(self.problem, &est);
        Ok(1.0 / objective.expected())
    }
}
