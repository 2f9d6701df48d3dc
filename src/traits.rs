//! # Traits
//!
//! $$
//! \text{Trait contracts: }\mathcal{A}:\text{parameters}\to\text{samples/distances/densities}
//! $$
//!
use rand::Rng;
use rayon::prelude::*;

use crate::error::Result;
use crate::stochastic::trace::TraceSink;

/// A process that can draw sample paths from its own random source.
pub trait ProcessExt: Send + Sync {
  type Output: Send;

  fn sample(&self) -> Self::Output;

  /// Draws `m` independent samples in parallel.
  fn sample_par(&self, m: usize) -> Vec<Self::Output> {
    (0..m).into_par_iter().map(|_| self.sample()).collect()
  }
}

/// A simulator driven by an ABC outer loop.
///
/// Implementors turn a parameter vector into simulated data and score it
/// against observed data.
pub trait SimulatorExt: Send + Sync {
  type Data;

  /// Number of parameters expected in `theta`.
  fn dimension(&self) -> usize;

  /// Parses the observed data file contents.
  fn parse_observed(&self, input: &str) -> Result<Self::Data>;

  fn simulate<R: Rng + ?Sized>(
    &self,
    theta: &[f64],
    rng: &mut R,
    sink: Option<&mut dyn TraceSink>,
  ) -> Result<Self::Data>;

  fn distance(&self, observed: &Self::Data, simulated: &Self::Data) -> Result<f64>;
}
