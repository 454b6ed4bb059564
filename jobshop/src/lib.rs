//! Job-shop scheduling with uncertain processing times.
//!
//! The crate ties the generic pieces together: the [`problem`] catalogue
//! feeds the disjunctive-graph [`solution`] variants, chromosomes travel
//! through the [`encoding`] module's G&T decoder, and the [`neighborhoods`]
//! supply moves to the metaheuristic drivers in `metaheur`.

pub mod encoding;
pub mod generation;
pub mod neighborhoods;
pub mod problem;
pub mod solution;

pub use encoding::PermutationWithRepetition;
pub use generation::RandomPopulation;
pub use neighborhoods::{Cei, Cet};
pub use problem::{Job, Machine, ModelError, ParseError, Problem, Task};
pub use solution::{JspSolution, MachineOrders, MakespanSolution, TardinessSolution};

use disjunctgraph::GraphError;
use thiserror::Error;

/// Failures while manipulating or evaluating a schedule.
#[derive(Debug, Error, PartialEq)]
pub enum JspError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use crate::encoding::PermutationWithRepetition;
    use crate::generation::RandomPopulation;
    use crate::neighborhoods::Cet;
    use crate::problem::Problem;
    use crate::solution::{MakespanSolution, TardinessSolution};
    use crate::JspError;

    use fuzzytime::{Time, TriangularFuzzyNumber};
    use metaheur::evolutionary::operators::{Gox, PairSelection, SwapMutation, Tournament};
    use metaheur::evolutionary::EvolutionError;
    use metaheur::loggers::{EvolutionLogger, LocalSearchLogger};
    use metaheur::{
        EvolutionaryAlgorithm, FixedTabuSearch, Individual, LocalSearchPolicy, MemeticAlgorithm,
        SearchSolution, VariableTabuSearch,
    };
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn three_by_three() -> Problem<f64> {
        Problem::from_reader(
            r"3 3
0 3 1 2 2 2
2 2 0 1 1 4
1 4 2 3 0 1"
                .as_bytes(),
        )
        .unwrap()
    }

    /// Largest machine load and largest job length bound the makespan
    /// from below.
    fn makespan_lower_bound(problem: &Problem<f64>) -> f64 {
        let machine_load = problem
            .machines()
            .map(|m| {
                problem
                    .machine_tasks(m.id)
                    .iter()
                    .map(|&t| problem.task(t).duration)
                    .sum::<f64>()
            })
            .fold(0.0, f64::max);
        let job_length = problem
            .jobs()
            .map(|j| {
                problem
                    .job_tasks(j.id)
                    .iter()
                    .map(|&t| problem.task(t).duration)
                    .sum::<f64>()
            })
            .fold(0.0, f64::max);
        machine_load.max(job_length)
    }

    #[test]
    fn tabu_search_improves_a_decoded_schedule() {
        let problem = three_by_three();
        let encoder = PermutationWithRepetition::<MakespanSolution<f64>>::new(&problem);
        let mut chromosome = vec![1, 2, 3, 1, 2, 3, 1, 2, 3];
        let mut initial = encoder.decode(&mut chromosome).unwrap();
        let initial_makespan = initial.makespan().unwrap();

        let mut logger = LocalSearchLogger::new("tabu", true);
        let mut best = FixedTabuSearch::new(7)
            .run(&mut logger, &initial, |iters, _| iters >= 200, &Cet::exact())
            .unwrap();
        let best_makespan = best.makespan().unwrap();

        assert!(best_makespan <= initial_makespan);
        assert!(best_makespan >= makespan_lower_bound(&problem));
        assert!(!logger.history().is_empty());
    }

    #[test]
    fn memetic_fuzzy_tardiness_stays_under_the_trivial_bound() {
        type Fuzzy = TriangularFuzzyNumber;
        type Solution = TardinessSolution<Fuzzy>;

        let problem: Problem<Fuzzy> = Problem::from_reader_due_dates(
            r"2 2
(9,10,11) 1
0 (2,3,4) 1 (1,2,3)
(7,8,9) 2
1 (2,2,2) 0 (3,4,5)"
                .as_bytes(),
        )
        .unwrap();

        let encoder = PermutationWithRepetition::<Solution>::new(&problem);
        let generation = RandomPopulation::new(&problem);
        let jobs = problem.job_count();
        let machines = problem.machine_count();
        let memetic = MemeticAlgorithm {
            evolutionary: EvolutionaryAlgorithm {
                population_size: jobs * machines,
                cross_prob: 1.0,
                mutation_prob: 0.1,
                elitism: false,
            },
            policy: LocalSearchPolicy::default(),
        };
        let local_search = VariableTabuSearch::new(jobs + machines, 2 * (jobs + machines)).unwrap();
        let neighborhood = Cet::exact();
        let ls_cutoff = (2 * jobs + machines) as u32;
        let mut refine = |individual: &mut Individual| -> Result<(), EvolutionError<JspError>> {
            let mut genes = individual.chromosome.clone();
            let seed = encoder.decode(&mut genes).map_err(EvolutionError::Evaluate)?;
            let mut ls_logger: LocalSearchLogger<Solution> = LocalSearchLogger::new("ls", false);
            let mut improved = local_search
                .run(
                    &mut ls_logger,
                    &seed,
                    |_, no_improving| no_improving > ls_cutoff,
                    &neighborhood,
                )
                .map_err(EvolutionError::Evaluate)?;
            individual.chromosome = encoder.encode(&improved).map_err(EvolutionError::Evaluate)?;
            individual.quality = improved.quality().map_err(EvolutionError::Evaluate)?;
            Ok(())
        };

        let mut logger: EvolutionLogger<Solution> = EvolutionLogger::new("ea", true);
        let mut rng = SmallRng::seed_from_u64(123);
        let best = memetic
            .run(
                &mut logger,
                &encoder,
                &generation,
                &PairSelection,
                &Gox,
                &SwapMutation,
                &Tournament,
                |generations, no_improving, _, _| generations >= 10 || no_improving > jobs as u32,
                &mut rng,
                &mut refine,
            )
            .unwrap();

        let mut genes = best.chromosome.clone();
        let mut solution = encoder.decode(&mut genes).unwrap();
        let twt = solution.total_weighted_tardiness().unwrap();

        // any schedule completes within the duration sum, so the weighted
        // tardiness can never exceed weight-sum x duration-sum
        let total_duration: f64 = problem
            .tasks()
            .iter()
            .map(|t| t.duration.expected())
            .sum();
        let weight_sum: f64 = problem.jobs().map(|j| j.weight).sum();
        assert!(twt.expected() <= weight_sum * total_duration);
        assert!(best.quality > 0.0);

        // the best-quality trajectory never regresses
        let history = logger.history();
        assert!(!history.is_empty());
        assert!(history
            .windows(2)
            .all(|w| w[0].maximum_quality <= w[1].maximum_quality));
    }
}
