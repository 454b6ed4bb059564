use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{arg, Command};
use fuzzytime::{Time, TriangularFuzzyNumber};
use rand::rngs::StdRng;
use rand::SeedableRng;

use jobshop::{
    Cet, JspError, PermutationWithRepetition, Problem, RandomPopulation, TardinessSolution,
};
use metaheur::evolutionary::operators::{Gox, PairSelection, SwapMutation, Tournament};
use metaheur::evolutionary::EvolutionError;
use metaheur::loggers::{EvolutionLogger, LocalSearchLogger};
use metaheur::{
    almost_equal, EvolutionaryAlgorithm, Individual, LocalSearchPolicy, MemeticAlgorithm,
    SearchSolution, VariableTabuSearch,
};

type Fuzzy = TriangularFuzzyNumber;
type Solution = TardinessSolution<Fuzzy>;

fn cli() -> Command {
    Command::new("jobshop")
        .about("Memetic solver for job-shop instances with fuzzy durations")
        .arg_required_else_help(true)
        .arg(arg!(<INSTANCE> "Path to the instance file").value_parser(clap::value_parser!(PathBuf)))
        .arg(
            arg!(<TRACE> "Path the execution trace is written to")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    let instance = matches.get_one::<PathBuf>("INSTANCE").expect("required");
    let trace = matches.get_one::<PathBuf>("TRACE").expect("required");

    if let Err(err) = run(instance, trace) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(instance: &Path, trace: &Path) -> Result<()> {
    let problem: Problem<Fuzzy> = Problem::read_due_dates(instance)
        .with_context(|| format!("reading instance {}", instance.display()))?;
    log::info!(
        "loaded instance: {} jobs, {} machines, {} tasks",
        problem.job_count(),
        problem.machine_count(),
        problem.task_count()
    );

    let mut rng = StdRng::from_entropy();
    let start = Instant::now();
    let (mut best, logger) = solve(&problem, &mut rng)?;
    let elapsed = start.elapsed();

    let twt = best.total_weighted_tardiness()?;
    log::info!(
        "finished in {} ms, expected total weighted tardiness {}",
        elapsed.as_millis(),
        twt.expected()
    );

    let mut out = File::create(trace)
        .with_context(|| format!("creating trace file {}", trace.display()))?;
    writeln!(out, "Execution Time = {}", elapsed.as_millis())?;
    writeln!(out, "Total Weighted Tardiness = {twt}")?;
    writeln!(out, "Expected Total Weighted Tardiness = {}", twt.expected())?;
    writeln!(out, "TRACE")?;
    write!(out, "{logger}")?;
    Ok(())
}

fn solve(
    problem: &Problem<Fuzzy>,
    rng: &mut StdRng,
) -> Result<(Solution, EvolutionLogger<Solution>)> {
    let jobs = problem.job_count();
    let machines = problem.machine_count();

    let encoder = PermutationWithRepetition::<Solution>::new(problem);
    let generation = RandomPopulation::new(problem);
    let memetic = MemeticAlgorithm {
        evolutionary: EvolutionaryAlgorithm {
            population_size: jobs * machines,
            cross_prob: 1.0,
            mutation_prob: 0.1,
            elitism: false,
        },
        policy: LocalSearchPolicy::default(),
    };
    let local_search = VariableTabuSearch::new(jobs + machines, 2 * (jobs + machines))?;
    let neighborhood = Cet::exact();
    let ls_cutoff = (2 * jobs + machines) as u32;

    let mut refine = |individual: &mut Individual| -> Result<(), EvolutionError<JspError>> {
        let mut chromosome = individual.chromosome.clone();
        let seed = encoder
            .decode(&mut chromosome)
            .map_err(EvolutionError::Evaluate)?;
        let mut ls_logger: LocalSearchLogger<Solution> =
            LocalSearchLogger::new("Local Search", false);
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

    let mut logger = EvolutionLogger::new("Evolutionary Algorithm", true);
    let ea_cutoff = jobs as u32;
    let best = memetic.run(
        &mut logger,
        &encoder,
        &generation,
        &PairSelection,
        &Gox,
        &SwapMutation,
        &Tournament,
        |_, no_improving, average, best| no_improving > ea_cutoff || almost_equal(best, average),
        rng,
        &mut refine,
    )?;

    let mut chromosome = best.chromosome;
    let best_solution = encoder.decode(&mut chromosome)?;
    logger.set_best_solution(&best_solution);
    Ok((best_solution, logger))
}
