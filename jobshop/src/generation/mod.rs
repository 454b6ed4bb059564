//! Initial-population generation.

use fuzzytime::Time;
use metaheur::evolutionary::{Gene, GenerationOp};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::problem::Problem;

/// Shuffles a master pattern listing every job id once per task of that
/// job, yielding uniformly random permutation-with-repetition
/// chromosomes.
pub struct RandomPopulation {
    master_pattern: Vec<Gene>,
}

impl RandomPopulation {
    pub fn new<T: Time>(problem: &Problem<T>) -> Self {
        let mut master_pattern = Vec::with_capacity(problem.task_count());
        for job in problem.jobs() {
            master_pattern
                .extend(std::iter::repeat(job.id).take(problem.job_tasks(job.id).len()));
        }
        RandomPopulation { master_pattern }
    }
}

impl GenerationOp for RandomPopulation {
    fn chromosomes<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Vec<Gene>> {
        let mut pattern = self.master_pattern.clone();
        (0..count)
            .map(|_| {
                pattern.shuffle(rng);
                pattern.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn chromosomes_repeat_each_job_once_per_task() {
        let problem: Problem<f64> = Problem::from_reader(
            r"2 3
0 1 1 1 2 1
2 1 1 1 0 1"
                .as_bytes(),
        )
        .unwrap();
        let generator = RandomPopulation::new(&problem);
        let mut rng = SmallRng::seed_from_u64(31);
        for chromosome in generator.chromosomes(25, &mut rng) {
            assert_eq!(chromosome.len(), 6);
            let mut counts: HashMap<Gene, usize> = HashMap::new();
            for gene in chromosome {
                *counts.entry(gene).or_insert(0) += 1;
            }
            assert_eq!(counts.get(&1), Some(&3));
            assert_eq!(counts.get(&2), Some(&3));
        }
    }
}
