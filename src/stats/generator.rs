//! # Generator
//!
//! $$
//! Q_{n,n+1}=\gamma (N-n),\qquad Q_{n,n-1}=\beta n (N-n),\qquad
//! Q_{n,n}=-\beta n (N-n)-\gamma (N-n)
//! $$
//!
//! The state `n` is the susceptible count; `N - n` is the infected count.
//! Rows sum to zero, so `exp(Q t)` is row-stochastic and
//! `exp(Q t)[m, n] = P(S_t = n | S_0 = m)`.
//!
use approx::abs_diff_eq;
use nalgebra::DMatrix;
use nalgebra::DVector;
use rayon::prelude::*;

use crate::error::Result;
use crate::error::SisError;
use crate::model::SisRates;
use crate::stats::grid::ParameterGrid;

/// Round-off allowance for transition probabilities produced by `exp(Q t)`.
const PROBABILITY_TOL: f64 = 1e-8;

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorMatrix {
  rates: SisRates,
  npop: usize,
  q: DMatrix<f64>,
}

impl GeneratorMatrix {
  pub fn build(beta: f64, gamma: f64, npop: usize) -> Result<Self> {
    let rates = SisRates::new(beta, gamma);
    if !rates.is_valid() {
      return Err(SisError::Domain(format!(
        "beta and gamma must be finite and non-negative, got beta = {beta}, gamma = {gamma}"
      )));
    }

    let dim = npop + 1;
    let mut q = DMatrix::<f64>::zeros(dim, dim);
    for n in 0..dim {
      let infected = (npop - n) as f64;
      let recovery = gamma * infected;
      let infection = beta * n as f64 * infected;

      if n < npop {
        q[(n, n + 1)] = recovery;
      }
      if n > 0 {
        q[(n, n - 1)] = infection;
      }
      q[(n, n)] = -(infection + recovery);
    }

    Ok(Self { rates, npop, q })
  }

  /// One generator per grid point, in the grid's logical order.
  pub fn build_batch(grid: &ParameterGrid, npop: usize) -> Result<Vec<Self>> {
    grid
      .points()
      .into_par_iter()
      .map(|(beta, gamma)| Self::build(beta, gamma, npop))
      .collect()
  }

  pub fn npop(&self) -> usize {
    self.npop
  }

  pub fn rates(&self) -> SisRates {
    self.rates
  }

  pub fn matrix(&self) -> &DMatrix<f64> {
    &self.q
  }

  /// Jump rate from `S = from` to `S = to`.
  pub fn rate(&self, from: usize, to: usize) -> f64 {
    if from == to {
      return 0.0;
    }
    self.q[(from, to)]
  }

  /// Checks the generator contract: non-negative off-diagonal rates and rows
  /// summing to zero within `tol`.
  pub fn validate(&self, tol: f64) -> Result<()> {
    for (n, row) in self.q.row_iter().enumerate() {
      for (m, &v) in row.iter().enumerate() {
        if !v.is_finite() {
          return Err(SisError::numerical(format!("Q[{n}, {m}] is not finite")));
        }
        if n != m && v < 0.0 {
          return Err(SisError::Domain(format!("Q[{n}, {m}] = {v} is negative")));
        }
      }
      let sum = row.sum();
      if !abs_diff_eq!(sum, 0.0, epsilon = tol) {
        return Err(SisError::Domain(format!("row {n} sums to {sum}")));
      }
    }
    Ok(())
  }

  /// Transition matrix `exp(Q t)`, computed by Padé scaling and squaring.
  ///
  /// Entries are checked to be probabilities up to round-off and then
  /// clamped to `[0, 1]`.
  pub fn transition_matrix(&self, t: f64) -> Result<DMatrix<f64>> {
    if !(t.is_finite() && t >= 0.0) {
      return Err(SisError::Domain(format!(
        "time step must be finite and non-negative, got {t}"
      )));
    }

    let mut p = (&self.q * t).exp();
    for v in p.iter_mut() {
      if !v.is_finite() || *v < -PROBABILITY_TOL || *v > 1.0 + PROBABILITY_TOL {
        return Err(SisError::numerical(format!(
          "matrix exponential produced {v} for beta = {}, gamma = {}, t = {t}",
          self.rates.beta, self.rates.gamma
        )));
      }
      *v = (*v).clamp(0.0, 1.0);
    }

    Ok(p)
  }

  /// Exact distribution of `S_t` given `S_0 = s0`.
  pub fn state_distribution(&self, s0: usize, t: f64) -> Result<DVector<f64>> {
    if s0 > self.npop {
      return Err(SisError::Domain(format!(
        "initial susceptible count {s0} exceeds population {}",
        self.npop
      )));
    }
    let p = self.transition_matrix(t)?;
    Ok(p.row(s0).transpose())
  }
}
