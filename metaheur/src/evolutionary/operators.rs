//! Concrete selection, crossover, mutation and replacement operators.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use super::{compare_quality, CrossoverOp, Gene, Individual, MutationOp, ReplacementOp, SelectionOp};
use crate::ConfigError;

/// Pairs the whole population after a shuffle, reshuffling as often as
/// needed to produce the requested number of couples.
pub struct PairSelection;

impl SelectionOp for PairSelection {
    fn select<R: Rng>(
        &self,
        population: &[Individual],
        couples: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>, ConfigError> {
        if population.len() < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        let mut indices: Vec<usize> = (0..population.len()).collect();
        let mut selected = Vec::with_capacity(couples);
        while selected.len() < couples {
            indices.shuffle(rng);
            let mut i = 0;
            while i + 1 < indices.len() && selected.len() < couples {
                selected.push((indices[i], indices[i + 1]));
                i += 2;
            }
        }
        Ok(selected)
    }
}

/// Fitness-proportionate selection over cumulative quality intervals.
pub struct RouletteWheel;

impl SelectionOp for RouletteWheel {
    fn select<R: Rng>(
        &self,
        population: &[Individual],
        couples: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>, ConfigError> {
        if population.len() < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        let mut cumulative = Vec::with_capacity(population.len());
        let mut total = 0.0;
        for individual in population {
            if individual.quality <= 0.0 {
                return Err(ConfigError::NonPositiveQuality);
            }
            total += individual.quality;
            cumulative.push(total);
        }

        let mut spin = |rng: &mut R| {
            let value = rng.gen_range(0.0..total);
            cumulative
                .partition_point(|&bound| bound <= value)
                .min(population.len() - 1)
        };
        Ok((0..couples).map(|_| (spin(rng), spin(rng))).collect())
    }
}

/// Generalised Order Crossover for permutations with repetition.
///
/// Genes are disambiguated by their repetition rank, so "the second 3 of
/// the donator" removes exactly "the second 3 of the receiver", and both
/// offspring keep the parents' gene multiset.
pub struct Gox;

type Labelled = (Gene, u32);

fn label_repetitions(genes: &[Gene]) -> Vec<Labelled> {
    let mut ranks: HashMap<Gene, u32> = HashMap::new();
    genes
        .iter()
        .map(|&gene| {
            let rank = ranks.entry(gene).or_insert(0);
            let labelled = (gene, *rank);
            *rank += 1;
            labelled
        })
        .collect()
}

fn implant(receiver: &[Labelled], donator: &[Labelled], position: usize, length: usize) -> Vec<Gene> {
    let mut child = Vec::with_capacity(receiver.len());
    if position + length > donator.len() {
        // wrapped segment: its tail goes to the front of the child, its
        // head to the back
        let back = &donator[position..];
        let front = &donator[..length - back.len()];
        let implanted: HashSet<Labelled> = back.iter().chain(front).copied().collect();
        child.extend(front.iter().map(|&(gene, _)| gene));
        child.extend(
            receiver
                .iter()
                .filter(|labelled| !implanted.contains(labelled))
                .map(|&(gene, _)| gene),
        );
        child.extend(back.iter().map(|&(gene, _)| gene));
    } else {
        let segment = &donator[position..position + length];
        let implanted: HashSet<Labelled> = segment.iter().copied().collect();
        let anchor = donator[position];
        for labelled in receiver {
            if implanted.contains(labelled) {
                // the segment replaces the receiver copy of its first gene
                if *labelled == anchor {
                    child.extend(segment.iter().map(|&(gene, _)| gene));
                }
            } else {
                child.push(labelled.0);
            }
        }
    }
    child
}

impl CrossoverOp for Gox {
    fn cross<R: Rng>(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        rng: &mut R,
    ) -> (Vec<Gene>, Vec<Gene>) {
        assert_eq!(
            parent1.len(),
            parent2.len(),
            "chromosomes must have the same length"
        );
        let labelled1 = label_repetitions(parent1);
        let labelled2 = label_repetitions(parent2);

        let len = parent1.len();
        let implant_position = rng.gen_range(0..len);
        let implant_length = rng.gen_range(len / 3..=len / 2);

        (
            implant(&labelled1, &labelled2, implant_position, implant_length),
            implant(&labelled2, &labelled1, implant_position, implant_length),
        )
    }
}

/// Exchanges two uniformly chosen positions.
pub struct SwapMutation;

impl MutationOp for SwapMutation {
    fn mutate<R: Rng>(&self, chromosome: &mut [Gene], rng: &mut R) {
        let first = rng.gen_range(0..chromosome.len());
        let second = rng.gen_range(0..chromosome.len());
        chromosome.swap(first, second);
    }
}

/// The offspring always replace their parents.
pub struct Generational;

impl ReplacementOp for Generational {
    fn choose<R: Rng>(
        &self,
        _parent1: &Individual,
        _parent2: &Individual,
        offspring1: Individual,
        offspring2: Individual,
        _rng: &mut R,
    ) -> (Individual, Individual) {
        (offspring1, offspring2)
    }
}

/// The two best of parents and offspring survive.
pub struct Tournament;

impl ReplacementOp for Tournament {
    fn choose<R: Rng>(
        &self,
        parent1: &Individual,
        parent2: &Individual,
        offspring1: Individual,
        offspring2: Individual,
        _rng: &mut R,
    ) -> (Individual, Individual) {
        let mut contenders = vec![parent1.clone(), parent2.clone(), offspring1, offspring2];
        contenders.sort_by(|a, b| compare_quality(b.quality, a.quality));
        let second = contenders.swap_remove(1);
        let first = contenders.swap_remove(0);
        (first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn individual(quality: f64) -> Individual {
        Individual {
            chromosome: vec![0],
            quality,
        }
    }

    fn gene_counts(genes: &[Gene]) -> HashMap<Gene, usize> {
        let mut counts = HashMap::new();
        for &gene in genes {
            *counts.entry(gene).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn gox_preserves_length_and_gene_multiset() {
        let parent1: Vec<Gene> = vec![1, 2, 3, 1, 2, 3, 1, 2, 3];
        let parent2: Vec<Gene> = vec![3, 3, 2, 2, 1, 1, 3, 2, 1];
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let (child1, child2) = Gox.cross(&parent1, &parent2, &mut rng);
            assert_eq!(child1.len(), parent1.len());
            assert_eq!(child2.len(), parent2.len());
            assert_eq!(gene_counts(&child1), gene_counts(&parent1));
            assert_eq!(gene_counts(&child2), gene_counts(&parent1));
        }
    }

    #[test]
    fn gox_transfers_a_segment_of_the_donator() {
        // With length 6 the implant spans 2..=3 genes; offspring differ
        // from a pure copy for most draws, but must stay valid even when
        // parents are identical.
        let parent: Vec<Gene> = vec![1, 1, 2, 2, 3, 3];
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..50 {
            let (child1, child2) = Gox.cross(&parent, &parent, &mut rng);
            assert_eq!(gene_counts(&child1), gene_counts(&parent));
            assert_eq!(gene_counts(&child2), gene_counts(&parent));
        }
    }

    #[test]
    fn swap_mutation_keeps_the_multiset() {
        let mut chromosome: Vec<Gene> = vec![1, 2, 2, 3];
        let expected = gene_counts(&chromosome);
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..50 {
            SwapMutation.mutate(&mut chromosome, &mut rng);
            assert_eq!(gene_counts(&chromosome), expected);
        }
    }

    #[test]
    fn pair_selection_covers_the_requested_count() {
        let population: Vec<Individual> = (0..5).map(|i| individual(1.0 + i as f64)).collect();
        let mut rng = SmallRng::seed_from_u64(5);
        let couples = PairSelection.select(&population, 7, &mut rng).unwrap();
        assert_eq!(couples.len(), 7);
        for (a, b) in couples {
            assert_ne!(a, b);
            assert!(a < population.len() && b < population.len());
        }
    }

    #[test]
    fn pair_selection_needs_two_individuals() {
        let population = vec![individual(1.0)];
        let mut rng = SmallRng::seed_from_u64(5);
        assert_eq!(
            PairSelection.select(&population, 1, &mut rng),
            Err(ConfigError::PopulationTooSmall)
        );
    }

    #[test]
    fn roulette_favours_high_quality() {
        let population = vec![individual(0.01), individual(10.0)];
        let mut rng = SmallRng::seed_from_u64(13);
        let couples = RouletteWheel.select(&population, 100, &mut rng).unwrap();
        let hits = couples
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .filter(|&i| i == 1)
            .count();
        assert!(hits > 150, "expected the fit individual to dominate, got {hits}");
    }

    #[test]
    fn roulette_rejects_non_positive_quality() {
        let population = vec![individual(1.0), individual(0.0)];
        let mut rng = SmallRng::seed_from_u64(13);
        assert_eq!(
            RouletteWheel.select(&population, 1, &mut rng),
            Err(ConfigError::NonPositiveQuality)
        );
    }

    #[test]
    fn tournament_keeps_the_two_best() {
        let mut rng = SmallRng::seed_from_u64(17);
        let (first, second) = Tournament.choose(
            &individual(0.4),
            &individual(0.9),
            individual(0.7),
            individual(0.1),
            &mut rng,
        );
        assert_eq!(first.quality, 0.9);
        assert_eq!(second.quality, 0.7);
    }

    #[test]
    fn generational_keeps_the_offspring() {
        let mut rng = SmallRng::seed_from_u64(17);
        let (first, second) = Generational.choose(
            &individual(0.9),
            &individual(0.8),
            individual(0.1),
            individual(0.2),
            &mut rng,
        );
        assert_eq!(first.quality, 0.1);
        assert_eq!(second.quality, 0.2);
    }
}
