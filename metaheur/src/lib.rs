//! Problem-agnostic metaheuristic drivers: tabu search (fixed and
//! variable tabu length), an evolutionary algorithm, and the memetic
//! combination of the two.
//!
//! The drivers know nothing about scheduling beyond the [`Move`] type
//! they forbid and the two small traits below; the `jobshop` crate plugs
//! in solutions, neighbourhoods and the chromosome encoder/decoder.

pub mod evolutionary;
pub mod loggers;
mod move_data;
pub mod tabu_list;
pub mod tabu_search;

pub use evolutionary::{
    memetic::{LocalSearchPolicy, MemeticAlgorithm},
    EvolutionaryAlgorithm, Gene, Individual,
};
pub use move_data::MoveData;
pub use tabu_list::TabuList;
pub use tabu_search::{FixedTabuSearch, VariableTabuSearch};

use disjunctgraph::Move;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tabu bounds must satisfy 0 < min < max, got min={min} max={max}")]
    InvalidTabuBounds { min: usize, max: usize },
    #[error("roulette wheel selection requires strictly positive qualities")]
    NonPositiveQuality,
    #[error("selection requires a population of at least two individuals")]
    PopulationTooSmall,
}

/// A schedule the local search can walk over.
///
/// `quality` takes `&mut self` because solutions refresh lazily computed
/// state on read.
pub trait SearchSolution: Clone {
    type Error: std::error::Error;

    fn quality(&mut self) -> Result<f64, Self::Error>;

    fn apply(&mut self, mv: &Move) -> Result<(), Self::Error>;
}

/// Produces candidate moves with their quality estimates.
pub trait Neighborhood<S: SearchSolution> {
    fn neighbors(&self, solution: &mut S) -> Result<Vec<MoveData>, S::Error>;
}

/// Relative floating-point comparison used by the stopping criteria.
pub fn almost_equal(a: f64, b: f64) -> bool {
    let d = (a - b).abs();
    d <= f64::EPSILON || d < a.abs().max(b.abs()) * f64::EPSILON
}
