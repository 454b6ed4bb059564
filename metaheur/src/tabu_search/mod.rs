//! Tabu search drivers.
//!
//! Both variants share the same skeleton: generate candidates, sort them
//! best-estimate-first, take the first acceptable one. The tabu list
//! always holds the *inverse* of the last applied moves, so the search is
//! forbidden from undoing its recent steps, not from repeating them.

use disjunctgraph::Move;

use crate::loggers::LocalSearchLogger;
use crate::move_data::sort_descending;
use crate::{ConfigError, Neighborhood, SearchSolution, TabuList};

/// Tabu search with a constant-capacity tabu list.
pub struct FixedTabuSearch {
    tabu_len: usize,
}

impl FixedTabuSearch {
    pub fn new(tabu_len: usize) -> Self {
        FixedTabuSearch { tabu_len }
    }

    pub fn run<S, N, F>(
        &self,
        logger: &mut LocalSearchLogger<S>,
        initial: &S,
        stop: F,
        neighborhood: &N,
    ) -> Result<S, S::Error>
    where
        S: SearchSolution,
        N: Neighborhood<S>,
        F: Fn(u32, u32) -> bool,
    {
        logger.set_initial_solution(initial);
        let mut current = initial.clone();
        let mut best = current.clone();
        let mut tabu: TabuList<Move> = TabuList::new(self.tabu_len);

        let mut iterations = 0u32;
        let mut no_improving = 0u32;

        while !stop(iterations, no_improving) {
            iterations += 1;
            no_improving += 1;

            let mut moves = neighborhood.neighbors(&mut current)?;
            sort_descending(&mut moves);
            let best_quality = best.quality()?;
            let mut found = false;
            let mut evaluated = 0usize;

            for data in &moves {
                evaluated += 1;
                if data.quality_estimate > best_quality {
                    // aspiration: a move this promising may override the
                    // tabu status, but only after an exact re-check
                    let mut neighbor = current.clone();
                    neighbor.apply(&data.mv)?;
                    if neighbor.quality()? > best_quality {
                        current = neighbor;
                        best = current.clone();
                        tabu.force_push(data.mv.invert());
                        no_improving = 0;
                        found = true;
                        break;
                    }
                }
                if !tabu.contains(&data.mv) {
                    current.apply(&data.mv)?;
                    tabu.force_push(data.mv.invert());
                    found = true;
                    break;
                }
            }

            if !found {
                if moves.is_empty() {
                    logger.add_log(current.quality()?, 0, evaluated, "No neighbors available");
                    log::debug!("tabu search stopped after {iterations} iterations: no neighbors");
                    break;
                }
                // every candidate is tabu: take the best one anyway
                let data = &moves[0];
                current.apply(&data.mv)?;
                tabu.force_push(data.mv.invert());
            }
            logger.add_log(
                current.quality()?,
                moves.len(),
                evaluated,
                if found { "" } else { "All moves tabu" },
            );
        }

        logger.set_best_solution(&best);
        Ok(best)
    }
}

/// Tabu search whose tabu list grows while the search walks downhill and
/// shrinks while it improves, within `[min, max]`.
#[derive(Debug)]
pub struct VariableTabuSearch {
    min: usize,
    max: usize,
}

impl VariableTabuSearch {
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if min == 0 || min >= max {
            return Err(ConfigError::InvalidTabuBounds { min, max });
        }
        Ok(VariableTabuSearch { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn run<S, N, F>(
        &self,
        logger: &mut LocalSearchLogger<S>,
        initial: &S,
        stop: F,
        neighborhood: &N,
    ) -> Result<S, S::Error>
    where
        S: SearchSolution,
        N: Neighborhood<S>,
        F: Fn(u32, u32) -> bool,
    {
        logger.set_initial_solution(initial);
        let mut current = initial.clone();
        let mut best = current.clone();
        let mut tabu: TabuList<Move> = TabuList::new(1);

        let mut iterations = 0u32;
        let mut no_improving = 0u32;

        while !stop(iterations, no_improving) {
            iterations += 1;
            no_improving += 1;

            let mut moves = neighborhood.neighbors(&mut current)?;
            sort_descending(&mut moves);
            let best_quality = best.quality()?;
            let mut found = false;
            let mut evaluated = 0usize;

            for data in &moves {
                evaluated += 1;
                if data.quality_estimate > best_quality {
                    let mut neighbor = current.clone();
                    neighbor.apply(&data.mv)?;
                    if neighbor.quality()? > best_quality {
                        current = neighbor;
                        best = current.clone();
                        tabu.change_capacity(1);
                        tabu.force_push(data.mv.invert());
                        no_improving = 0;
                        found = true;
                        break;
                    }
                }
                if !tabu.contains(&data.mv) {
                    let mut neighbor = current.clone();
                    neighbor.apply(&data.mv)?;
                    // improving steps tighten the list, worsening steps
                    // relax it
                    if neighbor.quality()? > current.quality()? {
                        if tabu.capacity() > self.min {
                            tabu.change_capacity(tabu.capacity() - 1);
                        }
                    } else if tabu.capacity() < self.max {
                        tabu.change_capacity(tabu.capacity() + 1);
                    }
                    current = neighbor;
                    tabu.force_push(data.mv.invert());
                    found = true;
                    break;
                }
            }

            if !found {
                if moves.is_empty() {
                    logger.add_log(current.quality()?, 0, evaluated, "No neighbors available");
                    log::debug!("tabu search stopped after {iterations} iterations: no neighbors");
                    break;
                }
                let data = &moves[0];
                current.apply(&data.mv)?;
                tabu.force_push(data.mv.invert());
            }
            logger.add_log(
                current.quality()?,
                moves.len(),
                evaluated,
                if found { "" } else { "All moves tabu" },
            );
        }

        logger.set_best_solution(&best);
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MoveData;
    use disjunctgraph::TaskId;
    use std::convert::Infallible;

    /// One-dimensional walk: the move `(0 -> 1)` increments a counter,
    /// its inverse `(1 -> 0)` decrements it. Quality peaks at the target.
    #[derive(Clone, Debug, PartialEq)]
    struct Walk {
        value: i64,
        target: i64,
    }

    impl Walk {
        fn quality_at(&self, value: i64) -> f64 {
            1.0 / (1.0 + (self.target - value).abs() as f64)
        }
    }

    impl SearchSolution for Walk {
        type Error = Infallible;

        fn quality(&mut self) -> Result<f64, Infallible> {
            Ok(self.quality_at(self.value))
        }

        fn apply(&mut self, mv: &Move) -> Result<(), Infallible> {
            for &(from, to) in mv.changes() {
                if (from, to) == (TaskId(0), TaskId(1)) {
                    self.value += 1;
                } else {
                    self.value -= 1;
                }
            }
            Ok(())
        }
    }

    struct Steps;

    impl Neighborhood<Walk> for Steps {
        fn neighbors(&self, solution: &mut Walk) -> Result<Vec<MoveData>, Infallible> {
            let up = Move::single(TaskId(0), TaskId(1));
            let down = Move::single(TaskId(1), TaskId(0));
            Ok(vec![
                MoveData::new(up, solution.quality_at(solution.value + 1)),
                MoveData::new(down, solution.quality_at(solution.value - 1)),
            ])
        }
    }

    #[test]
    fn fixed_search_climbs_to_the_target() {
        let mut logger = LocalSearchLogger::new("test", true);
        let initial = Walk { value: 0, target: 4 };
        let best = FixedTabuSearch::new(3)
            .run(&mut logger, &initial, |iters, _| iters >= 12, &Steps)
            .unwrap();
        assert_eq!(best.value, 4);
        assert_eq!(logger.history().len(), 12);
        assert_eq!(logger.best_solution().unwrap().value, 4);
    }

    #[test]
    fn variable_search_climbs_to_the_target() {
        let mut logger = LocalSearchLogger::new("test", false);
        let initial = Walk { value: 0, target: 5 };
        let search = VariableTabuSearch::new(1, 4).unwrap();
        let best = search
            .run(&mut logger, &initial, |iters, _| iters >= 15, &Steps)
            .unwrap();
        assert_eq!(best.value, 5);
    }

    #[test]
    fn degenerate_bounds_are_rejected() {
        assert_eq!(
            VariableTabuSearch::new(0, 5).unwrap_err(),
            ConfigError::InvalidTabuBounds { min: 0, max: 5 }
        );
        assert_eq!(
            VariableTabuSearch::new(5, 5).unwrap_err(),
            ConfigError::InvalidTabuBounds { min: 5, max: 5 }
        );
    }

    #[test]
    fn the_inverse_of_the_last_move_is_tabu() {
        // From the target itself every move worsens; the search must not
        // oscillate by undoing its previous step.
        let mut logger = LocalSearchLogger::new("test", true);
        let initial = Walk { value: 2, target: 2 };
        let best = FixedTabuSearch::new(2)
            .run(&mut logger, &initial, |iters, _| iters >= 6, &Steps)
            .unwrap();
        assert_eq!(best.value, 2);
        // the walk keeps moving, it never sits still
        assert!(logger.history().iter().all(|log| log.neighbors_generated == 2));
    }
}
