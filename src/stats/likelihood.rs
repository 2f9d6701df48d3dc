//! # Likelihood
//!
//! $$
//! L(\beta,\gamma\mid y)=\prod_{k=0}^{n-1}\left[e^{Q(\beta,\gamma)\,\Delta t}\right]_{y_k,\,y_{k+1}}
//! $$
//!
//! Exact probability of an observed susceptible series sampled every
//! $\Delta t$, with the first observation at $t = 0$.
//!
use std::sync::Mutex;

use ndarray::ArrayD;
use ndarray::Zip;
use tracing::debug;
use tracing::warn;

use crate::error::Result;
use crate::error::SisError;
use crate::stats::generator::GeneratorMatrix;
use crate::stats::grid::ParameterGrid;
use crate::stats::integrate::Integrand2D;

/// Likelihood of a fixed observed series as a function of `(beta, gamma)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SisLikelihood {
  npop: usize,
  dt: f64,
  observed: Vec<usize>,
}

impl SisLikelihood {
  pub fn new(npop: usize, dt: f64, observed: Vec<usize>) -> Result<Self> {
    if !(dt.is_finite() && dt > 0.0) {
      return Err(SisError::Domain(format!(
        "observation interval must be finite and positive, got {dt}"
      )));
    }
    if observed.is_empty() {
      return Err(SisError::Domain("observed series is empty".into()));
    }
    if let Some(&y) = observed.iter().find(|&&y| y > npop) {
      return Err(SisError::Domain(format!(
        "observed count {y} exceeds population {npop}"
      )));
    }

    Ok(Self { npop, dt, observed })
  }

  pub fn npop(&self) -> usize {
    self.npop
  }

  pub fn dt(&self) -> f64 {
    self.dt
  }

  pub fn observed(&self) -> &[usize] {
    &self.observed
  }

  /// Likelihood under an already built generator.
  pub fn evaluate_generator(&self, q: &GeneratorMatrix) -> Result<f64> {
    if q.npop() != self.npop {
      return Err(SisError::Domain(format!(
        "generator population {} does not match likelihood population {}",
        q.npop(),
        self.npop
      )));
    }
    if self.observed.len() < 2 {
      return Ok(1.0);
    }

    let p = q.transition_matrix(self.dt)?;
    let likelihood = self
      .observed
      .windows(2)
      .map(|w| p[(w[0], w[1])])
      .product();

    Ok(likelihood)
  }

  pub fn evaluate_point(&self, beta: f64, gamma: f64) -> Result<f64> {
    let q = GeneratorMatrix::build(beta, gamma, self.npop)?;
    self.evaluate_generator(&q)
  }

  /// Likelihood at every grid point, shaped like the grid.
  ///
  /// Points are independent and evaluated in parallel.
  pub fn evaluate(&self, grid: &ParameterGrid) -> Result<ArrayD<f64>> {
    let failure: Mutex<Option<SisError>> = Mutex::new(None);

    let values = Zip::from(grid.beta())
      .and(grid.gamma())
      .par_map_collect(|&beta, &gamma| {
        self.evaluate_point(beta, gamma).unwrap_or_else(|e| {
          let mut slot = failure.lock().unwrap_or_else(|p| p.into_inner());
          if slot.is_none() {
            *slot = Some(e);
          }
          f64::NAN
        })
      });

    if let Some(e) = failure.into_inner().unwrap_or_else(|p| p.into_inner()) {
      return Err(e);
    }
    debug!(points = values.len(), npop = self.npop, "likelihood grid evaluated");

    Ok(values)
  }
}

impl Integrand2D for SisLikelihood {
  fn eval(&self, beta: f64, gamma: f64) -> f64 {
    match self.evaluate_point(beta, gamma) {
      Ok(value) => value,
      Err(e) => {
        warn!(beta, gamma, error = %e, "likelihood evaluation failed");
        f64::NAN
      }
    }
  }
}

/// Array-in, array-out evaluation with scalar broadcasting.
pub fn evaluate_sis_likelihood(
  beta: ArrayD<f64>,
  gamma: ArrayD<f64>,
  npop: usize,
  dt: f64,
  observed: &[usize],
) -> Result<ArrayD<f64>> {
  let grid = ParameterGrid::new(beta, gamma)?;
  SisLikelihood::new(npop, dt, observed.to_vec())?.evaluate(&grid)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;
  use ndarray::ArrayD;
  use ndarray::IxDyn;

  use super::evaluate_sis_likelihood;
  use super::SisLikelihood;
  use crate::stats::generator::GeneratorMatrix;
  use crate::stats::grid::ParameterGrid;
  use crate::stats::integrate::integrate_2d_with_rule;
  use crate::stats::integrate::QuadratureRule;

  const OBSERVED: [usize; 11] = [100, 98, 95, 87, 74, 59, 44, 35, 39, 32, 38];

  fn scenario() -> SisLikelihood {
    SisLikelihood::new(101, 4.0, OBSERVED.to_vec()).unwrap()
  }

  #[test]
  fn observed_series_has_likelihood_in_unit_interval() {
    let value = scenario().evaluate_point(0.003, 0.1).unwrap();

    assert!(value > 0.0 && value < 1.0, "likelihood {value}");
  }

  #[test]
  fn likelihood_is_product_of_transition_probabilities() {
    let l = scenario();
    let p = GeneratorMatrix::build(0.003, 0.1, 101)
      .unwrap()
      .transition_matrix(4.0)
      .unwrap();
    let expected: f64 = OBSERVED.windows(2).map(|w| p[(w[0], w[1])]).product();

    assert_relative_eq!(l.evaluate_point(0.003, 0.1).unwrap(), expected, max_relative = 1e-12);
  }

  #[test]
  fn single_observation_is_certain() {
    let l = SisLikelihood::new(10, 1.0, vec![7]).unwrap();

    assert_eq!(l.evaluate_point(0.4, 0.2).unwrap(), 1.0);
  }

  #[test]
  fn impossible_path_has_zero_likelihood() {
    // absorbed at S = N, nothing can leave
    let l = SisLikelihood::new(5, 1.0, vec![5, 4]).unwrap();

    assert_abs_diff_eq!(l.evaluate_point(0.5, 0.5).unwrap(), 0.0, epsilon = 1e-15);
  }

  #[test]
  fn likelihood_stays_in_unit_interval_across_grid() {
    let grid = ParameterGrid::mesh(&[0.0, 0.001, 0.01, 0.05], &[0.0, 0.05, 0.5, 2.0]).unwrap();
    let l = SisLikelihood::new(20, 2.0, vec![19, 18, 15, 15, 12]).unwrap();

    let values = l.evaluate(&grid).unwrap();

    assert_eq!(values.shape(), &[4, 4]);
    assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
  }

  #[test]
  fn scalar_broadcast_matches_explicit_array() {
    let y = [19, 18, 15, 15, 12];
    let gamma = array![[0.05, 0.1], [0.5, 1.0]].into_dyn();

    let broadcast = evaluate_sis_likelihood(
      ArrayD::from_elem(IxDyn(&[]), 0.01),
      gamma.clone(),
      20,
      2.0,
      &y,
    )
    .unwrap();
    let explicit = evaluate_sis_likelihood(
      ArrayD::from_elem(IxDyn(&[2, 2]), 0.01),
      gamma,
      20,
      2.0,
      &y,
    )
    .unwrap();

    assert_eq!(broadcast, explicit);
  }

  #[test]
  fn scalar_inputs_give_scalar_output() {
    let out = evaluate_sis_likelihood(
      ArrayD::from_elem(IxDyn(&[]), 0.003),
      ArrayD::from_elem(IxDyn(&[]), 0.1),
      101,
      4.0,
      &OBSERVED,
    )
    .unwrap();

    assert_eq!(out.ndim(), 0);
  }

  #[test]
  fn mismatched_shapes_are_a_domain_error() {
    let err = evaluate_sis_likelihood(
      array![0.1, 0.2].into_dyn(),
      array![0.1, 0.2, 0.3].into_dyn(),
      10,
      1.0,
      &[9, 8],
    );

    assert!(matches!(err, Err(crate::error::SisError::Domain(_))));
  }

  #[test]
  fn constructor_validates_inputs() {
    assert!(SisLikelihood::new(10, 0.0, vec![1, 2]).is_err());
    assert!(SisLikelihood::new(10, 1.0, vec![]).is_err());
    assert!(SisLikelihood::new(10, 1.0, vec![11]).is_err());
  }

  #[test]
  fn grid_values_match_pointwise_evaluation() {
    let grid = ParameterGrid::mesh(&[0.005, 0.01, 0.02], &[0.1, 0.3]).unwrap();
    let l = SisLikelihood::new(20, 2.0, vec![19, 18, 15, 15, 12]).unwrap();

    let values = l.evaluate(&grid).unwrap();

    for ((idx, &value), (beta, gamma)) in values.indexed_iter().zip(grid.points()) {
      assert_eq!(value, l.evaluate_point(beta, gamma).unwrap(), "at {idx:?}");
    }
  }

  #[test]
  fn failed_points_surface_through_the_integrator() {
    let l = SisLikelihood::new(10, 1.0, vec![9, 8]).unwrap();

    let out = integrate_2d_with_rule(QuadratureRule::DoubleExponential, -0.1, 0.1, 0.0, 1.0, &l, 1e-8);

    assert!(matches!(out, Err(crate::error::SisError::Numerical { .. })));
  }

  #[test]
  fn generator_population_must_match() {
    let l = SisLikelihood::new(10, 1.0, vec![9, 8]).unwrap();
    let q = GeneratorMatrix::build(0.1, 0.1, 11).unwrap();

    assert!(l.evaluate_generator(&q).is_err());
  }
}
