use std::collections::{BTreeMap, VecDeque};

use fuzzytime::Time;
use hashbrown::{HashMap, HashSet};

use crate::{Block, GraphError, Move, TaskId};

/// Which tails the graph maintains.
///
/// Tails are only needed by the critical-path machinery; a graph that is
/// evaluated through the schedule builder alone can skip them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TailMode {
    /// No tails. Cheapest; critical-path queries are a programmer error.
    Disabled,
    /// One tail per task: longest path to any terminal task.
    Aggregate,
    /// One tail per task and job: longest path to that job's last task.
    /// The aggregate tail is maintained as well.
    PerJob,
}

#[derive(Clone, Debug, PartialEq)]
struct NodeData<T> {
    job: u32,
    machine: u32,
    duration: T,
    last_of_job: bool,
}

#[derive(Clone, Debug)]
struct TaskMeta<T> {
    job_pred: Option<TaskId>,
    job_succ: Option<TaskId>,
    mach_pred: Option<TaskId>,
    mach_succ: Option<TaskId>,
    head: T,
    tail: T,
}

impl<T: Time> TaskMeta<T> {
    fn new() -> Self {
        TaskMeta {
            job_pred: None,
            job_succ: None,
            mach_pred: None,
            mach_succ: None,
            head: T::zero(),
            tail: T::zero(),
        }
    }

    fn links(&self) -> [Option<TaskId>; 4] {
        [self.job_pred, self.job_succ, self.mach_pred, self.mach_succ]
    }
}

/// Mutable disjunctive-graph schedule over an arena of tasks.
///
/// Job arcs are wired once at construction; machine arcs are rewired by
/// [`SolutionGraph::swap_on_machine`] during search. Mutations only mark
/// the touched tasks dirty; heads, tails and the makespan are brought up
/// to date by the read accessors.
#[derive(Clone, Debug)]
pub struct SolutionGraph<T: Time> {
    nodes: Vec<NodeData<T>>,
    meta: Vec<TaskMeta<T>>,
    /// Dense column per job id, in first-seen order.
    job_cols: HashMap<u32, u32>,
    /// `tasks x jobs` matrix, only in [`TailMode::PerJob`]. `None` means
    /// the job's last task is unreachable from the row's task.
    job_tails: Vec<Option<T>>,
    dirty: HashSet<TaskId>,
    makespan: T,
    tail_mode: TailMode,
}

impl<T: Time> SolutionGraph<T> {
    pub fn new(tail_mode: TailMode) -> Self {
        SolutionGraph {
            nodes: Vec::new(),
            meta: Vec::new(),
            job_cols: HashMap::new(),
            job_tails: Vec::new(),
            dirty: HashSet::new(),
            makespan: T::zero(),
            tail_mode,
        }
    }

    pub fn tail_mode(&self) -> TailMode {
        self.tail_mode
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn job_count(&self) -> usize {
        self.job_cols.len()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.nodes.len() as u32).map(TaskId)
    }

    /// Registers a task and returns its dense identifier.
    pub fn add_task(&mut self, job: u32, machine: u32, duration: T, last_of_job: bool) -> TaskId {
        let id = TaskId(self.nodes.len() as u32);
        let next_col = self.job_cols.len() as u32;
        self.job_cols.entry(job).or_insert(next_col);
        self.nodes.push(NodeData {
            job,
            machine,
            duration,
            last_of_job,
        });
        self.meta.push(TaskMeta::new());
        self.dirty.insert(id);
        id
    }

    pub fn job_of(&self, task: TaskId) -> u32 {
        self.nodes[task.index()].job
    }

    pub fn machine_of(&self, task: TaskId) -> u32 {
        self.nodes[task.index()].machine
    }

    pub fn duration(&self, task: TaskId) -> T {
        self.nodes[task.index()].duration
    }

    pub fn last_of_job(&self, task: TaskId) -> bool {
        self.nodes[task.index()].last_of_job
    }

    /// Wires `from` directly before `to` in their job chain.
    pub fn add_precedence(&mut self, from: TaskId, to: TaskId) -> Result<(), GraphError> {
        if self.meta[from.index()].job_succ.is_some() || self.meta[to.index()].job_pred.is_some() {
            return Err(GraphError::LinkOccupied);
        }
        self.meta[from.index()].job_succ = Some(to);
        self.meta[to.index()].job_pred = Some(from);
        self.dirty.insert(from);
        self.dirty.insert(to);
        Ok(())
    }

    pub fn remove_precedence(&mut self, from: TaskId, to: TaskId) -> Result<(), GraphError> {
        if self.meta[from.index()].job_succ != Some(to)
            || self.meta[to.index()].job_pred != Some(from)
        {
            return Err(GraphError::LinkMissing);
        }
        self.meta[from.index()].job_succ = None;
        self.meta[to.index()].job_pred = None;
        self.dirty.insert(from);
        self.dirty.insert(to);
        Ok(())
    }

    /// Wires `from` directly before `to` in their machine order.
    pub fn add_capacity(&mut self, from: TaskId, to: TaskId) -> Result<(), GraphError> {
        if self.meta[from.index()].mach_succ.is_some() || self.meta[to.index()].mach_pred.is_some()
        {
            return Err(GraphError::LinkOccupied);
        }
        self.meta[from.index()].mach_succ = Some(to);
        self.meta[to.index()].mach_pred = Some(from);
        self.dirty.insert(from);
        self.dirty.insert(to);
        Ok(())
    }

    pub fn remove_capacity(&mut self, from: TaskId, to: TaskId) -> Result<(), GraphError> {
        if self.meta[from.index()].mach_succ != Some(to)
            || self.meta[to.index()].mach_pred != Some(from)
        {
            return Err(GraphError::LinkMissing);
        }
        self.meta[from.index()].mach_succ = None;
        self.meta[to.index()].mach_pred = None;
        self.dirty.insert(from);
        self.dirty.insert(to);
        Ok(())
    }

    /// Exchanges the positions of two tasks on their shared machine.
    ///
    /// Only the machine check is performed; callers are responsible for
    /// producing feasibility-preserving exchanges.
    pub fn swap_on_machine(&mut self, task1: TaskId, task2: TaskId) -> Result<(), GraphError> {
        if self.nodes[task1.index()].machine != self.nodes[task2.index()].machine {
            return Err(GraphError::MachineMismatch);
        }
        let pred1 = self.meta[task1.index()].mach_pred;
        let pred2 = self.meta[task2.index()].mach_pred;
        let succ1 = self.meta[task1.index()].mach_succ;
        let succ2 = self.meta[task2.index()].mach_succ;

        // Neighbour updates first; for adjacent tasks these deliberately
        // write into task1/task2 themselves before the final field swap.
        if let Some(p) = pred1 {
            self.meta[p.index()].mach_succ = Some(task2);
        }
        if let Some(p) = pred2 {
            self.meta[p.index()].mach_succ = Some(task1);
        }
        if let Some(s) = succ1 {
            self.meta[s.index()].mach_pred = Some(task2);
        }
        if let Some(s) = succ2 {
            self.meta[s.index()].mach_pred = Some(task1);
        }
        let (a, b) = (task1.index(), task2.index());
        let tmp = self.meta[a].mach_pred;
        self.meta[a].mach_pred = self.meta[b].mach_pred;
        self.meta[b].mach_pred = tmp;
        let tmp = self.meta[a].mach_succ;
        self.meta[a].mach_succ = self.meta[b].mach_succ;
        self.meta[b].mach_succ = tmp;

        self.dirty.insert(task1);
        self.dirty.insert(task2);
        Ok(())
    }

    /// Applies every exchange of the move in order.
    pub fn apply_move(&mut self, mv: &Move) -> Result<(), GraphError> {
        for &(from, to) in mv.changes() {
            self.swap_on_machine(from, to)?;
        }
        Ok(())
    }

    /// `(job predecessor, machine predecessor)`.
    pub fn prev(&self, task: TaskId) -> (Option<TaskId>, Option<TaskId>) {
        let meta = &self.meta[task.index()];
        (meta.job_pred, meta.mach_pred)
    }

    /// `(job successor, machine successor)`.
    pub fn next(&self, task: TaskId) -> (Option<TaskId>, Option<TaskId>) {
        let meta = &self.meta[task.index()];
        (meta.job_succ, meta.mach_succ)
    }

    pub fn job_pred(&self, task: TaskId) -> Option<TaskId> {
        self.meta[task.index()].job_pred
    }

    pub fn job_succ(&self, task: TaskId) -> Option<TaskId> {
        self.meta[task.index()].job_succ
    }

    pub fn mach_pred(&self, task: TaskId) -> Option<TaskId> {
        self.meta[task.index()].mach_pred
    }

    pub fn mach_succ(&self, task: TaskId) -> Option<TaskId> {
        self.meta[task.index()].mach_succ
    }

    /// Kahn's algorithm over the job + machine arcs. Fails with
    /// [`GraphError::Cyclic`] when the order does not cover every task.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        let mut in_degree = vec![0u8; self.nodes.len()];
        let mut available = VecDeque::new();
        for task in self.task_ids() {
            let meta = &self.meta[task.index()];
            let degree =
                u8::from(meta.job_pred.is_some()) + u8::from(meta.mach_pred.is_some());
            in_degree[task.index()] = degree;
            if degree == 0 {
                available.push_back(task);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = available.pop_front() {
            order.push(current);
            let (job_succ, mach_succ) = self.next(current);
            for succ in [job_succ, mach_succ].into_iter().flatten() {
                in_degree[succ.index()] -= 1;
                if in_degree[succ.index()] == 0 {
                    available.push_back(succ);
                }
            }
        }

        if order.len() != self.nodes.len() {
            log::debug!(
                "topological order covered {} of {} tasks",
                order.len(),
                self.nodes.len()
            );
            return Err(GraphError::Cyclic);
        }
        Ok(order)
    }

    pub fn head(&mut self, task: TaskId) -> Result<T, GraphError> {
        self.refresh()?;
        Ok(self.meta[task.index()].head)
    }

    /// Longest path from the task to a terminal task.
    ///
    /// # Panics
    ///
    /// Panics when the graph was built with [`TailMode::Disabled`].
    pub fn tail(&mut self, task: TaskId) -> Result<T, GraphError> {
        assert!(
            self.tail_mode != TailMode::Disabled,
            "tails are disabled for this solution graph"
        );
        self.refresh()?;
        Ok(self.meta[task.index()].tail)
    }

    /// Longest path from the task to the last task of `job`, or `None`
    /// when that task is unreachable.
    ///
    /// # Panics
    ///
    /// Panics unless the graph was built with [`TailMode::PerJob`].
    pub fn job_tail(&mut self, task: TaskId, job: u32) -> Result<Option<T>, GraphError> {
        assert!(
            self.tail_mode == TailMode::PerJob,
            "per-job tails are not maintained for this solution graph"
        );
        self.refresh()?;
        let col = self.job_cols[&job] as usize;
        Ok(self.job_tails[task.index() * self.job_cols.len() + col])
    }

    pub fn makespan(&mut self) -> Result<T, GraphError> {
        self.refresh()?;
        Ok(self.makespan)
    }

    /// `1 / expected(makespan)`.
    pub fn quality(&mut self) -> Result<f64, GraphError> {
        Ok(1.0 / self.makespan()?.expected())
    }

    /// Tasks lying on a longest path: `head + duration + tail` matches the
    /// makespan under the slack time equality.
    ///
    /// # Panics
    ///
    /// Panics when the graph was built with [`TailMode::Disabled`].
    pub fn critical_tasks(&mut self) -> Result<Vec<TaskId>, GraphError> {
        assert!(
            self.tail_mode != TailMode::Disabled,
            "critical tasks require tails"
        );
        self.refresh()?;
        let makespan = self.makespan;
        Ok(self
            .task_ids()
            .filter(|task| {
                let meta = &self.meta[task.index()];
                let node = &self.nodes[task.index()];
                (meta.head + node.duration + meta.tail).loose_eq(&makespan)
            })
            .collect())
    }

    /// Maximal runs of machine-consecutive critical arcs, extracted by
    /// walking critical predecessors back from every critical final task.
    pub fn critical_blocks(&mut self) -> Result<Vec<Block>, GraphError> {
        self.refresh()?;
        let makespan = self.makespan;
        let mut blocks = Vec::new();
        for task in self.task_ids() {
            let node = &self.nodes[task.index()];
            if node.last_of_job
                && (self.meta[task.index()].head + node.duration).loose_eq(&makespan)
            {
                self.collect_blocks(task, Block::new(), &mut blocks);
            }
        }
        Ok(blocks)
    }

    fn collect_blocks(&self, current: TaskId, mut block: Block, out: &mut Vec<Block>) {
        let (job_pred, mach_pred) = self.prev(current);
        let head = self.meta[current.index()].head;

        if job_pred.is_none() && mach_pred.is_none() && !block.is_empty() {
            out.push(block.clone());
        }

        // A critical job arc interrupts the machine run: close the block
        // and keep walking with an empty one.
        if let Some(pred) = job_pred {
            if self.completes_at(pred).loose_eq(&head) {
                if !block.is_empty() {
                    out.push(block.clone());
                    self.collect_blocks(pred, Block::new(), out);
                } else {
                    self.collect_blocks(pred, block.clone(), out);
                }
            }
        }

        // A critical machine arc extends the run.
        if let Some(pred) = mach_pred {
            if self.completes_at(pred).loose_eq(&head) {
                block.push_front(pred, current);
                self.collect_blocks(pred, block, out);
            }
        }
    }

    fn completes_at(&self, task: TaskId) -> T {
        self.meta[task.index()].head + self.nodes[task.index()].duration
    }

    /// Per machine (ascending id), the job of every task in scheduled
    /// order.
    pub fn solution_sequence(&self) -> Result<Vec<(u32, Vec<u32>)>, GraphError> {
        let order = self.topological_order()?;
        let mut position = vec![0usize; self.nodes.len()];
        for (pos, task) in order.iter().enumerate() {
            position[task.index()] = pos;
        }
        let mut machines: BTreeMap<u32, Vec<TaskId>> = BTreeMap::new();
        for task in self.task_ids() {
            machines
                .entry(self.nodes[task.index()].machine)
                .or_default()
                .push(task);
        }
        Ok(machines
            .into_iter()
            .map(|(machine, mut tasks)| {
                tasks.sort_by_key(|task| position[task.index()]);
                let jobs = tasks
                    .into_iter()
                    .map(|task| self.nodes[task.index()].job)
                    .collect();
                (machine, jobs)
            })
            .collect())
    }

    /// Recomputes stale heads, tails and the makespan.
    fn refresh(&mut self) -> Result<(), GraphError> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let order = self.topological_order()?;

        // Heads: forward from the first modified task.
        if let Some(first) = order.iter().position(|task| self.dirty.contains(task)) {
            for &task in &order[first..] {
                let (job_pred, mach_pred) = self.prev(task);
                let mut head = T::zero();
                for pred in [job_pred, mach_pred].into_iter().flatten() {
                    head = head.join(self.completes_at(pred));
                }
                self.meta[task.index()].head = head;
            }
        }

        match self.tail_mode {
            TailMode::Disabled => {}
            TailMode::Aggregate => self.refresh_tails(&order),
            TailMode::PerJob => self.refresh_job_tails(&order),
        }

        self.dirty.clear();

        self.makespan = T::zero();
        for task in self.task_ids() {
            if self.nodes[task.index()].last_of_job {
                self.makespan = self.makespan.join(self.completes_at(task));
            }
        }
        Ok(())
    }

    fn refresh_tails(&mut self, order: &[TaskId]) {
        let last = match order.iter().rposition(|task| self.dirty.contains(task)) {
            Some(last) => last,
            None => return,
        };
        for &task in order[..=last].iter().rev() {
            let (job_succ, mach_succ) = self.next(task);
            let mut tail = T::zero();
            for succ in [job_succ, mach_succ].into_iter().flatten() {
                tail = tail.join(self.meta[succ.index()].tail + self.nodes[succ.index()].duration);
            }
            self.meta[task.index()].tail = tail;
        }
    }

    fn refresh_job_tails(&mut self, order: &[TaskId]) {
        let cols = self.job_cols.len();
        if self.job_tails.len() != self.nodes.len() * cols {
            self.job_tails = vec![None; self.nodes.len() * cols];
        }
        // The whole matrix is rebuilt: a per-job tail may change for any
        // task upstream of a modification, and the reverse scan is O(n·J)
        // either way.
        for &task in order.iter().rev() {
            let node = &self.nodes[task.index()];
            let own_col = self.job_cols[&node.job] as usize;
            let (job_succ, mach_succ) = self.next(task);
            let mut aggregate: Option<T> = None;
            for col in 0..cols {
                let mut tail = if node.last_of_job && col == own_col {
                    Some(T::zero())
                } else {
                    None
                };
                for succ in [job_succ, mach_succ].into_iter().flatten() {
                    if let Some(succ_tail) = self.job_tails[succ.index() * cols + col] {
                        let candidate = succ_tail + self.nodes[succ.index()].duration;
                        tail = Some(match tail {
                            Some(current) => current.join(candidate),
                            None => candidate,
                        });
                    }
                }
                self.job_tails[task.index() * cols + col] = tail;
                if let Some(tail) = tail {
                    aggregate = Some(match aggregate {
                        Some(current) => current.join(tail),
                        None => tail,
                    });
                }
            }
            self.meta[task.index()].tail = aggregate.unwrap_or_else(T::zero);
        }
    }
}

/// Structural equality: static task data and the four link families.
/// Heads, tails and dirtiness are derived state and do not participate.
impl<T: Time> PartialEq for SolutionGraph<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self
                .meta
                .iter()
                .zip(other.meta.iter())
                .all(|(a, b)| a.links() == b.links())
    }
}
