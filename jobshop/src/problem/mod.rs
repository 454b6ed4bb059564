//! Immutable catalogue of jobs, machines and tasks.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use disjunctgraph::TaskId;
use fuzzytime::Time;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("job {0} is not registered")]
    UnknownJob(u32),
    #[error("machine {0} is not registered")]
    UnknownMachine(u32),
    #[error("job {job} has no task at position {position}")]
    TaskNotFound { job: u32, position: usize },
    #[error("chromosome has {got} genes but the problem has {expected} tasks")]
    ChromosomeMismatch { got: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of instance")]
    UnexpectedEof,
    #[error("invalid token `{token}`: {reason}")]
    InvalidToken { token: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// One operation of a job, bound to a machine.
#[derive(Clone, Debug)]
pub struct Task<T> {
    pub id: TaskId,
    pub job: u32,
    pub machine: u32,
    /// 0-based position within the job routing.
    pub position: u32,
    pub duration: T,
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Task<T> {}

impl<T> Hash for Task<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Clone, Debug)]
pub struct Job<T> {
    pub id: u32,
    pub due_date: T,
    pub weight: f64,
}

impl<T> PartialEq for Job<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Job<T> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Machine {
    pub id: u32,
}

/// The immutable problem instance: a dense task arena plus per-job
/// routings and per-machine candidate sets.
#[derive(Clone, Debug, Default)]
pub struct Problem<T> {
    tasks: Vec<Task<T>>,
    jobs: BTreeMap<u32, Job<T>>,
    machines: BTreeMap<u32, Machine>,
    job_tasks: BTreeMap<u32, Vec<TaskId>>,
    machine_tasks: BTreeMap<u32, Vec<TaskId>>,
}

impl<T: Time> Problem<T> {
    pub fn new() -> Self {
        Problem {
            tasks: Vec::new(),
            jobs: BTreeMap::new(),
            machines: BTreeMap::new(),
            job_tasks: BTreeMap::new(),
            machine_tasks: BTreeMap::new(),
        }
    }

    /// Registers a job. Re-registering an id keeps the first entry.
    pub fn add_job(&mut self, id: u32, due_date: T, weight: f64) {
        self.jobs.entry(id).or_insert(Job {
            id,
            due_date,
            weight,
        });
        self.job_tasks.entry(id).or_default();
    }

    /// Registers a machine. Re-registering an id is a no-op.
    pub fn add_machine(&mut self, id: u32) {
        self.machines.entry(id).or_insert(Machine { id });
        self.machine_tasks.entry(id).or_default();
    }

    /// Appends a task to the routing of `job`, to be processed on
    /// `machine`.
    pub fn add_task(&mut self, job: u32, machine: u32, duration: T) -> Result<TaskId, ModelError> {
        if !self.jobs.contains_key(&job) {
            return Err(ModelError::UnknownJob(job));
        }
        if !self.machines.contains_key(&machine) {
            return Err(ModelError::UnknownMachine(machine));
        }
        let id = TaskId(self.tasks.len() as u32);
        let routing = self.job_tasks.entry(job).or_default();
        self.tasks.push(Task {
            id,
            job,
            machine,
            position: routing.len() as u32,
            duration,
        });
        routing.push(id);
        self.machine_tasks.entry(machine).or_default().push(id);
        Ok(id)
    }

    pub fn task(&self, id: TaskId) -> &Task<T> {
        &self.tasks[id.index()]
    }

    /// The task of `job` at the given routing position.
    pub fn task_at(&self, job: u32, position: usize) -> Option<&Task<T>> {
        let id = *self.job_tasks.get(&job)?.get(position)?;
        Some(&self.tasks[id.index()])
    }

    pub fn tasks(&self) -> &[Task<T>] {
        &self.tasks
    }

    pub fn job(&self, id: u32) -> Option<&Job<T>> {
        self.jobs.get(&id)
    }

    /// Jobs in ascending id order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job<T>> {
        self.jobs.values()
    }

    /// Machines in ascending id order.
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values()
    }

    pub fn job_tasks(&self, job: u32) -> &[TaskId] {
        self.job_tasks.get(&job).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn machine_tasks(&self, machine: u32) -> &[TaskId] {
        self.machine_tasks
            .get(&machine)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    /// The first task of every job, ascending job id.
    pub fn initial_tasks(&self) -> Vec<TaskId> {
        self.job_tasks
            .values()
            .filter_map(|routing| routing.first().copied())
            .collect()
    }

    /// The last task of every job, ascending job id.
    pub fn final_tasks(&self) -> Vec<TaskId> {
        self.job_tasks
            .values()
            .filter_map(|routing| routing.last().copied())
            .collect()
    }

    /// Whether the task closes its job's routing.
    pub fn is_final(&self, id: TaskId) -> bool {
        let task = &self.tasks[id.index()];
        self.job_tasks(task.job).last() == Some(&id)
    }
}

impl<T> Problem<T>
where
    T: Time,
    <T as FromStr>::Err: fmt::Display,
{
    /// Reads the standard instance format:
    ///
    /// ```text
    /// <jobs> <machines>
    /// per job, <machines> times: <machine_0based> <duration>
    /// ```
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ParseError> {
        Self::parse(reader, false)
    }

    /// Reads the standard format with a `<due_date> <weight>` line per
    /// job.
    pub fn from_reader_due_dates<R: Read>(reader: R) -> Result<Self, ParseError> {
        Self::parse(reader, true)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn read_due_dates<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        Self::from_reader_due_dates(BufReader::new(File::open(path)?))
    }

    fn parse<R: Read>(mut reader: R, due_dates: bool) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut tokens = Tokens(text.split_whitespace());

        let mut problem = Problem::new();
        let jobs: u32 = tokens.parse()?;
        let machines: u32 = tokens.parse()?;
        for job in 1..=jobs {
            let (due_date, weight) = if due_dates {
                (tokens.parse::<T>()?, tokens.parse::<f64>()?)
            } else {
                (T::zero(), 1.0)
            };
            problem.add_job(job, due_date, weight);
            for _ in 0..machines {
                let machine: u32 = tokens.parse()?;
                let duration: T = tokens.parse()?;
                // instance files index machines from 0
                problem.add_machine(machine + 1);
                problem.add_task(job, machine + 1, duration)?;
            }
        }
        Ok(problem)
    }
}

struct Tokens<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn parse<F>(&mut self) -> Result<F, ParseError>
    where
        F: FromStr,
        F::Err: fmt::Display,
    {
        let token = self.0.next().ok_or(ParseError::UnexpectedEof)?;
        token.parse().map_err(|err: F::Err| ParseError::InvalidToken {
            token: token.to_owned(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzytime::TriangularFuzzyNumber;

    fn two_by_two() -> Problem<f64> {
        Problem::from_reader(
            r"2 2
0 1 1 1
1 1 0 1"
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn parses_the_standard_format() {
        let problem = two_by_two();
        assert_eq!(problem.job_count(), 2);
        assert_eq!(problem.machine_count(), 2);
        assert_eq!(problem.task_count(), 4);

        let first = problem.task_at(1, 0).unwrap();
        assert_eq!(first.machine, 1);
        assert_eq!(first.position, 0);
        assert_eq!(first.duration, 1.0);
        // machine indices are normalised to 1-based
        assert_eq!(problem.task_at(2, 0).unwrap().machine, 2);
    }

    #[test]
    fn parses_due_dates_and_weights() {
        let problem: Problem<f64> = Problem::from_reader_due_dates(
            r"2 2
10 2.5
0 3 1 2
8 1
1 4 0 1"
                .as_bytes(),
        )
        .unwrap();
        let job1 = problem.job(1).unwrap();
        assert_eq!(job1.due_date, 10.0);
        assert_eq!(job1.weight, 2.5);
        let job2 = problem.job(2).unwrap();
        assert_eq!(job2.due_date, 8.0);
        assert_eq!(job2.weight, 1.0);
    }

    #[test]
    fn parses_fuzzy_durations() {
        let problem: Problem<TriangularFuzzyNumber> = Problem::from_reader_due_dates(
            r"1 2
(9,10,11) 1
0 (1,2,3) 1 (2,2,2)"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(
            problem.task_at(1, 0).unwrap().duration,
            TriangularFuzzyNumber::new(1.0, 2.0, 3.0)
        );
        assert_eq!(
            problem.job(1).unwrap().due_date,
            TriangularFuzzyNumber::new(9.0, 10.0, 11.0)
        );
    }

    #[test]
    fn truncated_and_malformed_instances_fail() {
        assert!(matches!(
            Problem::<f64>::from_reader("2 2\n0 1".as_bytes()),
            Err(ParseError::UnexpectedEof)
        ));
        assert!(matches!(
            Problem::<f64>::from_reader("x 2".as_bytes()),
            Err(ParseError::InvalidToken { .. })
        ));
        assert!(matches!(
            Problem::<TriangularFuzzyNumber>::from_reader_due_dates(
                "1 1\n(3,2,1) 1\n0 1".as_bytes()
            ),
            Err(ParseError::InvalidToken { .. })
        ));
    }

    #[test]
    fn tasks_reference_registered_jobs_and_machines() {
        let mut problem: Problem<f64> = Problem::new();
        problem.add_machine(1);
        assert_eq!(problem.add_task(1, 1, 1.0), Err(ModelError::UnknownJob(1)));
        problem.add_job(1, 0.0, 1.0);
        assert_eq!(
            problem.add_task(1, 9, 1.0),
            Err(ModelError::UnknownMachine(9))
        );
        let id = problem.add_task(1, 1, 1.0).unwrap();
        assert_eq!(problem.task(id).position, 0);
    }

    #[test]
    fn routings_are_dense_and_ordered() {
        let problem = two_by_two();
        let routing = problem.job_tasks(1);
        assert_eq!(routing.len(), 2);
        assert_eq!(problem.task(routing[0]).position, 0);
        assert_eq!(problem.task(routing[1]).position, 1);
        assert_eq!(problem.initial_tasks(), vec![routing[0], problem.job_tasks(2)[0]]);
        assert!(problem.is_final(routing[1]));
        assert!(!problem.is_final(routing[0]));
    }
}
