//! Memetic controller: the evolutionary loop with a local-search hook.

use rand::Rng;

use super::{
    CrossoverOp, EvolutionError, EvolutionaryAlgorithm, Evaluator, GenerationOp, Individual,
    MutationOp, ReplacementOp, SelectionOp,
};
use crate::loggers::EvolutionLogger;

/// When the local search is invoked on individuals.
///
/// The choice trades schedule quality against runtime: refining every
/// offspring is the strongest (and slowest) setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalSearchPolicy {
    /// Refine every offspring right after its evaluation.
    #[default]
    EveryOffspring,
    /// Refine the two descendants chosen by the replacement operator.
    EveryDescendant,
    /// Refine the best individual of a generation, only when it improved.
    NewBestOnly,
}

/// Evolutionary algorithm whose individuals are periodically refined by a
/// local search supplied as a hook.
///
/// The hook receives an individual, is expected to decode it, improve the
/// schedule, and write the re-encoded chromosome and quality back.
pub struct MemeticAlgorithm {
    pub evolutionary: EvolutionaryAlgorithm,
    pub policy: LocalSearchPolicy,
}

impl MemeticAlgorithm {
    #[allow(clippy::too_many_arguments)]
    pub fn run<L, V, G, S, C, M, P, F, R, H>(
        &self,
        logger: &mut EvolutionLogger<L>,
        evaluator: &V,
        generation: &G,
        selection: &S,
        crossover: &C,
        mutation: &M,
        replacement: &P,
        stop: F,
        rng: &mut R,
        improve: &mut H,
    ) -> Result<Individual, EvolutionError<V::Error>>
    where
        L: Clone,
        V: Evaluator,
        G: GenerationOp,
        S: SelectionOp,
        C: CrossoverOp,
        M: MutationOp,
        P: ReplacementOp,
        F: Fn(u32, u32, f64, f64) -> bool,
        R: Rng,
        H: FnMut(&mut Individual) -> Result<(), EvolutionError<V::Error>>,
    {
        let hook: &mut dyn FnMut(&mut Individual) -> Result<(), EvolutionError<V::Error>> = improve;
        self.evolutionary.run_inner(
            logger,
            evaluator,
            generation,
            selection,
            crossover,
            mutation,
            replacement,
            &stop,
            rng,
            self.policy,
            Some(hook),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolutionary::operators::{Gox, PairSelection, SwapMutation, Tournament};
    use crate::evolutionary::Gene;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::convert::Infallible;

    struct SumEvaluator;

    impl Evaluator for SumEvaluator {
        type Error = Infallible;

        fn evaluate(&self, chromosome: &mut Vec<Gene>) -> Result<f64, Infallible> {
            // earlier big genes score higher
            Ok(chromosome
                .iter()
                .enumerate()
                .map(|(i, &g)| g as f64 * (chromosome.len() - i) as f64)
                .sum::<f64>()
                .max(1.0))
        }
    }

    struct Shuffles;

    impl GenerationOp for Shuffles {
        fn chromosomes<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Vec<Gene>> {
            (0..count)
                .map(|_| {
                    let mut c: Vec<Gene> = vec![0, 0, 1, 1, 2, 2];
                    c.shuffle(rng);
                    c
                })
                .collect()
        }
    }

    #[test]
    fn the_hook_refines_every_offspring() {
        let memetic = MemeticAlgorithm {
            evolutionary: EvolutionaryAlgorithm {
                population_size: 8,
                cross_prob: 1.0,
                mutation_prob: 0.1,
                elitism: false,
            },
            policy: LocalSearchPolicy::EveryOffspring,
        };
        let mut logger: EvolutionLogger<String> = EvolutionLogger::new("memetic", false);
        let mut rng = SmallRng::seed_from_u64(21);
        let mut hook_calls = 0usize;

        // "local search": sort descending, the known optimum of SumEvaluator
        let best = memetic
            .run(
                &mut logger,
                &SumEvaluator,
                &Shuffles,
                &PairSelection,
                &Gox,
                &SwapMutation,
                &Tournament,
                |generations, _, _, _| generations >= 4,
                &mut rng,
                &mut |individual: &mut Individual| {
                    hook_calls += 1;
                    individual.chromosome.sort_unstable_by(|a, b| b.cmp(a));
                    individual.quality = SumEvaluator
                        .evaluate(&mut individual.chromosome)
                        .unwrap();
                    Ok(())
                },
            )
            .unwrap();

        // 4 generations x 4 couples x 2 offspring
        assert_eq!(hook_calls, 32);
        assert_eq!(best.chromosome, vec![2, 2, 1, 1, 0, 0]);
    }
}
