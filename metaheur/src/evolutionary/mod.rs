//! Evolutionary algorithm over permutation-with-repetition chromosomes.
//!
//! Operators plug in through small traits and are dispatched statically;
//! the chromosome evaluator is the only bridge back to the scheduling
//! domain. Decoding canonicalises a chromosome, so qualities are cached
//! by gene sequence and duplicate individuals are never decoded twice.

pub mod memetic;
pub mod operators;

use std::collections::HashMap;

use rand::Rng;
use thiserror::Error;

use crate::loggers::EvolutionLogger;
use crate::ConfigError;
use memetic::LocalSearchPolicy;

pub type Gene = u32;

#[derive(Clone, Debug, PartialEq)]
pub struct Individual {
    pub chromosome: Vec<Gene>,
    pub quality: f64,
}

/// Scores chromosomes, rewriting them into their canonical decoded form.
pub trait Evaluator {
    type Error: std::error::Error + 'static;

    fn evaluate(&self, chromosome: &mut Vec<Gene>) -> Result<f64, Self::Error>;
}

/// Produces the raw chromosomes of an initial population.
pub trait GenerationOp {
    fn chromosomes<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Vec<Gene>>;
}

/// Picks the index couples that will reproduce.
pub trait SelectionOp {
    fn select<R: Rng>(
        &self,
        population: &[Individual],
        couples: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>, ConfigError>;
}

pub trait CrossoverOp {
    fn cross<R: Rng>(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        rng: &mut R,
    ) -> (Vec<Gene>, Vec<Gene>);
}

pub trait MutationOp {
    fn mutate<R: Rng>(&self, chromosome: &mut [Gene], rng: &mut R);
}

/// Chooses the two descendants that enter the next generation.
pub trait ReplacementOp {
    fn choose<R: Rng>(
        &self,
        parent1: &Individual,
        parent2: &Individual,
        offspring1: Individual,
        offspring2: Individual,
        rng: &mut R,
    ) -> (Individual, Individual);
}

#[derive(Debug, Error)]
pub enum EvolutionError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Evaluate(E),
}

type Hook<'h, E> = &'h mut dyn FnMut(&mut Individual) -> Result<(), EvolutionError<E>>;

pub struct EvolutionaryAlgorithm {
    pub population_size: usize,
    pub cross_prob: f64,
    pub mutation_prob: f64,
    pub elitism: bool,
}

impl EvolutionaryAlgorithm {
    #[allow(clippy::too_many_arguments)]
    pub fn run<L, V, G, S, C, M, P, F, R>(
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
    {
        let hook: Option<Hook<'_, V::Error>> = None;
        self.run_inner(
            logger,
            evaluator,
            generation,
            selection,
            crossover,
            mutation,
            replacement,
            &stop,
            rng,
            LocalSearchPolicy::EveryOffspring,
            hook,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_inner<L, V, G, S, C, M, P, F, R>(
        &self,
        logger: &mut EvolutionLogger<L>,
        evaluator: &V,
        generation: &G,
        selection: &S,
        crossover: &C,
        mutation: &M,
        replacement: &P,
        stop: &F,
        rng: &mut R,
        policy: LocalSearchPolicy,
        mut hook: Option<Hook<'_, V::Error>>,
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
    {
        let mut cache: HashMap<Vec<Gene>, f64> = HashMap::new();

        let mut population: Vec<Individual> = Vec::with_capacity(self.population_size);
        for mut chromosome in generation.chromosomes(self.population_size, rng) {
            let quality = cached_quality(evaluator, &mut cache, &mut chromosome)?;
            population.push(Individual { chromosome, quality });
        }

        let mut best = match population
            .iter()
            .max_by(|a, b| compare_quality(a.quality, b.quality))
        {
            Some(best) => best.clone(),
            None => return Err(ConfigError::PopulationTooSmall.into()),
        };

        let mut generations = 0u32;
        let mut no_improving = 0u32;
        let mut average = average_quality(&population);
        logger.add_log(average, best.quality);

        while !stop(generations, no_improving, average, best.quality) {
            generations += 1;
            no_improving += 1;

            let mut next: Vec<Individual> = Vec::with_capacity(self.population_size + 1);
            if self.elitism {
                next.push(best.clone());
            }

            let couples = selection.select(&population, self.population_size / 2, rng)?;
            for (first, second) in couples {
                let parent1 = &population[first];
                let parent2 = &population[second];

                let (mut genes1, mut genes2) = if rng.gen::<f64>() < self.cross_prob {
                    crossover.cross(&parent1.chromosome, &parent2.chromosome, rng)
                } else {
                    (parent1.chromosome.clone(), parent2.chromosome.clone())
                };
                if rng.gen::<f64>() < self.mutation_prob {
                    mutation.mutate(&mut genes1, rng);
                }
                if rng.gen::<f64>() < self.mutation_prob {
                    mutation.mutate(&mut genes2, rng);
                }

                let quality1 = cached_quality(evaluator, &mut cache, &mut genes1)?;
                let quality2 = cached_quality(evaluator, &mut cache, &mut genes2)?;
                let mut offspring1 = Individual {
                    chromosome: genes1,
                    quality: quality1,
                };
                let mut offspring2 = Individual {
                    chromosome: genes2,
                    quality: quality2,
                };

                if policy == LocalSearchPolicy::EveryOffspring {
                    if let Some(hook) = hook.as_mut() {
                        hook(&mut offspring1)?;
                        cache.insert(offspring1.chromosome.clone(), offspring1.quality);
                        hook(&mut offspring2)?;
                        cache.insert(offspring2.chromosome.clone(), offspring2.quality);
                    }
                }

                let (mut descendant1, mut descendant2) =
                    replacement.choose(parent1, parent2, offspring1, offspring2, rng);

                if policy == LocalSearchPolicy::EveryDescendant {
                    if let Some(hook) = hook.as_mut() {
                        hook(&mut descendant1)?;
                        cache.insert(descendant1.chromosome.clone(), descendant1.quality);
                        hook(&mut descendant2)?;
                        cache.insert(descendant2.chromosome.clone(), descendant2.quality);
                    }
                }

                if descendant1.quality > best.quality {
                    best = descendant1.clone();
                    no_improving = 0;
                }
                if descendant2.quality > best.quality {
                    best = descendant2.clone();
                    no_improving = 0;
                }
                next.push(descendant1);
                next.push(descendant2);
            }

            population = next;
            average = average_quality(&population);

            if policy == LocalSearchPolicy::NewBestOnly && no_improving == 0 {
                if let Some(hook) = hook.as_mut() {
                    hook(&mut best)?;
                    cache.insert(best.chromosome.clone(), best.quality);
                }
            }

            log::debug!(
                "generation {generations}: average {average:.6}, best {:.6}",
                best.quality
            );
            logger.add_log(average, best.quality);
        }

        Ok(best)
    }
}

fn cached_quality<V: Evaluator>(
    evaluator: &V,
    cache: &mut HashMap<Vec<Gene>, f64>,
    chromosome: &mut Vec<Gene>,
) -> Result<f64, EvolutionError<V::Error>> {
    if let Some(&quality) = cache.get(chromosome) {
        return Ok(quality);
    }
    let quality = evaluator
        .evaluate(chromosome)
        .map_err(EvolutionError::Evaluate)?;
    cache.insert(chromosome.clone(), quality);
    Ok(quality)
}

fn average_quality(population: &[Individual]) -> f64 {
    population.iter().map(|i| i.quality).sum::<f64>() / population.len() as f64
}

pub(crate) fn compare_quality(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}
