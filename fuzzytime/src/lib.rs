//! Time quantities for scheduling under uncertainty.
//!
//! The solver is generic over a [`Time`] type: plain `f64` durations for
//! deterministic instances, [`TriangularFuzzyNumber`] for uncertain ones.
//! All ordering decisions in the solver go through [`Time::expected`], so
//! the fuzzy type does not need (and deliberately does not implement) a
//! total order of its own.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use thiserror::Error;

/// A duration-like quantity the scheduler can work with.
pub trait Time:
    Copy
    + fmt::Debug
    + fmt::Display
    + Default
    + PartialEq
    + Add<Output = Self>
    + AddAssign
    + FromStr
    + 'static
{
    /// The additive identity.
    fn zero() -> Self {
        Self::default()
    }

    /// Defuzzified value used for every ordering decision.
    fn expected(&self) -> f64;

    /// Component-wise maximum.
    fn join(self, other: Self) -> Self;

    /// Subtracts a scalar from every component.
    fn minus(self, amount: f64) -> Self;

    /// Multiplies every component by a scalar.
    fn scale(self, factor: f64) -> Self;

    /// Slack equality used for critical-path detection.
    ///
    /// For fuzzy values this is true when *any* component pair is equal,
    /// an over-approximation that keeps critical-block extraction stable
    /// under floating-point noise. For scalars it is plain equality.
    fn loose_eq(&self, other: &Self) -> bool;
}

impl Time for f64 {
    fn expected(&self) -> f64 {
        *self
    }

    fn join(self, other: Self) -> Self {
        self.max(other)
    }

    fn minus(self, amount: f64) -> Self {
        self - amount
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn loose_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Triangular fuzzy number `(a, b, c)`: "about `b`, no less than `a`,
/// no more than `c`".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TriangularFuzzyNumber {
    smallest: f64,
    most_probable: f64,
    largest: f64,
}

impl TriangularFuzzyNumber {
    pub fn new(smallest: f64, most_probable: f64, largest: f64) -> Self {
        TriangularFuzzyNumber {
            smallest,
            most_probable,
            largest,
        }
    }

    /// A crisp value lifted into the fuzzy domain.
    pub fn crisp(value: f64) -> Self {
        TriangularFuzzyNumber::new(value, value, value)
    }

    pub fn smallest(&self) -> f64 {
        self.smallest
    }

    pub fn most_probable(&self) -> f64 {
        self.most_probable
    }

    pub fn largest(&self) -> f64 {
        self.largest
    }

    /// Expected value `(a + 2b + c) / 4`.
    pub fn expected_value(&self) -> f64 {
        (self.smallest + 2.0 * self.most_probable + self.largest) / 4.0
    }
}

impl Add for TriangularFuzzyNumber {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for TriangularFuzzyNumber {
    fn add_assign(&mut self, rhs: Self) {
        self.smallest += rhs.smallest;
        self.most_probable += rhs.most_probable;
        self.largest += rhs.largest;
    }
}

impl Time for TriangularFuzzyNumber {
    fn expected(&self) -> f64 {
        self.expected_value()
    }

    fn join(self, other: Self) -> Self {
        TriangularFuzzyNumber::new(
            self.smallest.max(other.smallest),
            self.most_probable.max(other.most_probable),
            self.largest.max(other.largest),
        )
    }

    fn minus(self, amount: f64) -> Self {
        TriangularFuzzyNumber::new(
            self.smallest - amount,
            self.most_probable - amount,
            self.largest - amount,
        )
    }

    fn scale(self, factor: f64) -> Self {
        TriangularFuzzyNumber::new(
            self.smallest * factor,
            self.most_probable * factor,
            self.largest * factor,
        )
    }

    fn loose_eq(&self, other: &Self) -> bool {
        self.smallest == other.smallest
            || self.most_probable == other.most_probable
            || self.largest == other.largest
    }
}

impl fmt::Display for TriangularFuzzyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.smallest, self.most_probable, self.largest)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FuzzyParseError {
    #[error("expected a fuzzy literal of the form (a,b,c), got `{0}`")]
    Malformed(String),
    #[error("fuzzy components must satisfy a <= b <= c in `{0}`")]
    Unordered(String),
}

impl FromStr for TriangularFuzzyNumber {
    type Err = FuzzyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || FuzzyParseError::Malformed(s.to_owned());
        let inner = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let mut components = inner.split(',');
        let mut next = || -> Result<f64, FuzzyParseError> {
            components
                .next()
                .and_then(|c| c.trim().parse().ok())
                .ok_or_else(malformed)
        };
        let (a, b, c) = (next()?, next()?, next()?);
        if components.next().is_some() {
            return Err(malformed());
        }
        if a > b || b > c {
            return Err(FuzzyParseError::Unordered(s.to_owned()));
        }
        Ok(TriangularFuzzyNumber::new(a, b, c))
    }
}
