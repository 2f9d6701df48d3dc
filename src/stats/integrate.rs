//! # Integrate
//!
//! $$
//! W=\int_{\gamma_0}^{\gamma_1}\int_{\beta_0}^{\beta_1} L(\beta,\gamma)\,d\beta\,d\gamma
//! $$
//!
//! Nested quadrature: the outer rule runs over `gamma`, the inner rule over
//! `beta` for every outer node. The default rule bisects Gauss-Legendre
//! panels, so a narrow likelihood peak is refined on both axes.
//!
use std::cell::Cell;
use std::cell::RefCell;

use gauss_quad::GaussLegendre;
use quadrature::clenshaw_curtis;
use quadrature::double_exponential;
use tracing::warn;

use crate::error::Result;
use crate::error::SisError;

/// Scalar function of one variable.
pub trait Integrand1D {
  fn eval(&self, x: f64) -> f64;
}

impl<F> Integrand1D for F
where
  F: Fn(f64) -> f64,
{
  fn eval(&self, x: f64) -> f64 {
    self(x)
  }
}

/// Scalar function of `(beta, gamma)`.
pub trait Integrand2D {
  fn eval(&self, beta: f64, gamma: f64) -> f64;
}

impl<F> Integrand2D for F
where
  F: Fn(f64, f64) -> f64,
{
  fn eval(&self, beta: f64, gamma: f64) -> f64 {
    self(beta, gamma)
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fixed {
  Beta(f64),
  Gamma(f64),
}

/// A 2-D integrand with one parameter held fixed.
#[derive(Clone, Debug)]
pub struct Marginal<F> {
  inner: F,
  fixed: Fixed,
}

impl<F: Integrand2D> Marginal<F> {
  /// Integrand in `gamma` at a fixed `beta`.
  pub fn at_beta(inner: F, beta: f64) -> Self {
    Self {
      inner,
      fixed: Fixed::Beta(beta),
    }
  }

  /// Integrand in `beta` at a fixed `gamma`.
  pub fn at_gamma(inner: F, gamma: f64) -> Self {
    Self {
      inner,
      fixed: Fixed::Gamma(gamma),
    }
  }

  pub fn fixed(&self) -> Fixed {
    self.fixed
  }
}

impl<F: Integrand2D> Integrand1D for Marginal<F> {
  fn eval(&self, x: f64) -> f64 {
    match self.fixed {
      Fixed::Beta(beta) => self.inner.eval(beta, x),
      Fixed::Gamma(gamma) => self.inner.eval(x, gamma),
    }
  }
}

/// An integrand divided by a normalizing constant.
#[derive(Clone, Debug)]
pub struct Normalized<F> {
  inner: F,
  constant: f64,
}

impl<F> Normalized<F> {
  pub fn new(inner: F, constant: f64) -> Result<Self> {
    if !(constant.is_finite() && constant > 0.0) {
      return Err(SisError::Domain(format!(
        "normalizing constant must be finite and positive, got {constant}"
      )));
    }
    Ok(Self { inner, constant })
  }

  pub fn constant(&self) -> f64 {
    self.constant
  }
}

impl<F: Integrand1D> Integrand1D for Normalized<F> {
  fn eval(&self, x: f64) -> f64 {
    self.inner.eval(x) / self.constant
  }
}

impl<F: Integrand2D> Integrand2D for Normalized<F> {
  fn eval(&self, beta: f64, gamma: f64) -> f64 {
    self.inner.eval(beta, gamma) / self.constant
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QuadratureRule {
  /// Gauss-Legendre panels bisected until each half-split changes the panel
  /// sum by less than its share of the tolerance.
  AdaptiveGaussLegendre { degree: usize, panels: usize },
  /// Tanh-sinh.
  DoubleExponential,
  ClenshawCurtis,
  /// Fixed order; the error estimate compares against twice the order.
  GaussLegendre { degree: usize },
}

impl Default for QuadratureRule {
  fn default() -> Self {
    Self::AdaptiveGaussLegendre {
      degree: 8,
      panels: 16,
    }
  }
}

/// Deepest bisection of an initial panel.
const MAX_BISECTION_DEPTH: u32 = 30;
/// Function evaluations allowed for one adaptive 1-D integral.
const MAX_ADAPTIVE_EVALUATIONS: usize = 400_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadratureOutput {
  pub value: f64,
  pub error_estimate: f64,
  pub evaluations: usize,
  pub converged: bool,
}

impl QuadratureOutput {
  /// Turns a non-converged output into a numerical error carrying the
  /// best estimate.
  pub fn into_result(self) -> Result<Self> {
    if self.converged {
      return Ok(self);
    }
    Err(SisError::Numerical {
      message: format!(
        "quadrature did not reach tolerance after {} evaluations",
        self.evaluations
      ),
      estimate: Some(self.value),
      error_estimate: Some(self.error_estimate),
    })
  }
}

fn check_interval(lo: f64, hi: f64) -> Result<()> {
  if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
    return Err(SisError::Domain(format!("invalid integration interval [{lo}, {hi}]")));
  }
  Ok(())
}

fn check_tolerance(abs_tol: f64) -> Result<()> {
  if !(abs_tol.is_finite() && abs_tol > 0.0) {
    return Err(SisError::Domain(format!(
      "absolute tolerance must be finite and positive, got {abs_tol}"
    )));
  }
  Ok(())
}

fn gauss_legendre(degree: usize) -> Result<GaussLegendre> {
  GaussLegendre::new(degree)
    .map_err(|e| SisError::Domain(format!("invalid Gauss-Legendre degree {degree}: {e:?}")))
}

/// Bisects panels depth-first. A split is accepted once `|left + right - whole|`
/// is within the panel's share of `abs_tol`; that difference is added to the
/// error estimate.
fn adaptive_gauss_legendre<G>(
  degree: usize,
  panels: usize,
  lo: f64,
  hi: f64,
  g: &G,
  abs_tol: f64,
) -> Result<QuadratureOutput>
where
  G: Fn(f64) -> f64,
{
  if panels == 0 {
    return Err(SisError::Domain("adaptive quadrature needs at least one panel".into()));
  }
  let rule = gauss_legendre(degree)?;
  let width = hi - lo;
  let step = width / panels as f64;

  let mut stack: Vec<(f64, f64, f64, u32)> = (0..panels)
    .map(|k| {
      let a = lo + k as f64 * step;
      let b = if k + 1 == panels { hi } else { lo + (k + 1) as f64 * step };
      (a, b, rule.integrate(a, b, g), 0)
    })
    .collect();

  let mut evaluations = panels * degree;
  let mut value = 0.0;
  let mut error_estimate = 0.0;
  let mut converged = true;

  while let Some((a, b, whole, depth)) = stack.pop() {
    let mid = 0.5 * (a + b);
    let left = rule.integrate(a, mid, g);
    let right = rule.integrate(mid, b, g);
    evaluations += 2 * degree;

    let refined = left + right;
    let diff = (refined - whole).abs();
    let settled = diff <= abs_tol * (b - a) / width || !diff.is_finite();
    let exhausted = depth >= MAX_BISECTION_DEPTH || evaluations >= MAX_ADAPTIVE_EVALUATIONS;

    if settled || exhausted {
      if !settled {
        converged = false;
      }
      value += refined;
      error_estimate += diff;
      continue;
    }

    stack.push((a, mid, left, depth + 1));
    stack.push((mid, b, right, depth + 1));
  }

  Ok(QuadratureOutput {
    value,
    error_estimate,
    evaluations,
    converged,
  })
}

fn quadrature<G>(rule: QuadratureRule, lo: f64, hi: f64, g: G, abs_tol: f64) -> Result<QuadratureOutput>
where
  G: Fn(f64) -> f64,
{
  if lo == hi {
    return Ok(QuadratureOutput {
      value: 0.0,
      error_estimate: 0.0,
      evaluations: 0,
      converged: true,
    });
  }

  // first non-finite sample; the quadrature crate skips them silently
  let non_finite: Cell<Option<(f64, f64)>> = Cell::new(None);
  let h = |x: f64| {
    let y = g(x);
    if !y.is_finite() && non_finite.get().is_none() {
      non_finite.set(Some((x, y)));
    }
    y
  };

  let out = match rule {
    QuadratureRule::AdaptiveGaussLegendre { degree, panels } => {
      adaptive_gauss_legendre(degree, panels, lo, hi, &h, abs_tol)?
    }
    QuadratureRule::DoubleExponential => {
      let out = double_exponential::integrate(&h, lo, hi, abs_tol);
      QuadratureOutput {
        value: out.integral,
        error_estimate: out.error_estimate,
        evaluations: out.num_function_evaluations as usize,
        converged: out.error_estimate <= abs_tol,
      }
    }
    QuadratureRule::ClenshawCurtis => {
      let out = clenshaw_curtis::integrate(&h, lo, hi, abs_tol);
      QuadratureOutput {
        value: out.integral,
        error_estimate: out.error_estimate,
        evaluations: out.num_function_evaluations as usize,
        converged: out.error_estimate <= abs_tol,
      }
    }
    QuadratureRule::GaussLegendre { degree } => {
      let low = gauss_legendre(degree)?.integrate(lo, hi, &h);
      let high = gauss_legendre(2 * degree)?.integrate(lo, hi, &h);
      let error_estimate = (high - low).abs();
      QuadratureOutput {
        value: high,
        error_estimate,
        evaluations: 3 * degree,
        converged: error_estimate <= abs_tol,
      }
    }
  };

  if let Some((x, y)) = non_finite.get() {
    return Err(SisError::Numerical {
      message: format!("integrand is {y} at {x} on [{lo}, {hi}]"),
      estimate: None,
      error_estimate: None,
    });
  }
  if !out.value.is_finite() {
    return Err(SisError::Numerical {
      message: format!("quadrature over [{lo}, {hi}] produced {}", out.value),
      estimate: None,
      error_estimate: Some(out.error_estimate),
    });
  }

  Ok(out)
}

pub fn integrate_1d<F>(lo: f64, hi: f64, f: &F, abs_tol: f64) -> Result<QuadratureOutput>
where
  F: Integrand1D + ?Sized,
{
  integrate_1d_with_rule(QuadratureRule::default(), lo, hi, f, abs_tol)
}

pub fn integrate_1d_with_rule<F>(
  rule: QuadratureRule,
  lo: f64,
  hi: f64,
  f: &F,
  abs_tol: f64,
) -> Result<QuadratureOutput>
where
  F: Integrand1D + ?Sized,
{
  check_interval(lo, hi)?;
  check_tolerance(abs_tol)?;

  let out = quadrature(rule, lo, hi, |x| f.eval(x), abs_tol)?;
  if !out.converged {
    warn!(
      lo,
      hi,
      value = out.value,
      error_estimate = out.error_estimate,
      abs_tol,
      "1-D quadrature missed tolerance"
    );
  }
  Ok(out)
}

pub fn integrate_2d<F>(
  beta_lo: f64,
  beta_hi: f64,
  gamma_lo: f64,
  gamma_hi: f64,
  f: &F,
  abs_tol: f64,
) -> Result<QuadratureOutput>
where
  F: Integrand2D + ?Sized,
{
  integrate_2d_with_rule(QuadratureRule::default(), beta_lo, beta_hi, gamma_lo, gamma_hi, f, abs_tol)
}

/// Outer integral over `gamma`, inner over `beta`.
///
/// Half of `abs_tol` goes to the outer integral; every inner integral gets
/// the other half divided by the outer interval length. The reported error
/// adds the outer estimate to the worst inner estimate scaled by that
/// length. The output is converged only if every inner integral and the
/// outer one met their share.
pub fn integrate_2d_with_rule<F>(
  rule: QuadratureRule,
  beta_lo: f64,
  beta_hi: f64,
  gamma_lo: f64,
  gamma_hi: f64,
  f: &F,
  abs_tol: f64,
) -> Result<QuadratureOutput>
where
  F: Integrand2D + ?Sized,
{
  check_interval(beta_lo, beta_hi)?;
  check_interval(gamma_lo, gamma_hi)?;
  check_tolerance(abs_tol)?;

  let gamma_width = gamma_hi - gamma_lo;
  let outer_tol = 0.5 * abs_tol;
  let inner_tol = if gamma_width > 0.0 {
    outer_tol / gamma_width
  } else {
    abs_tol
  };

  let evaluations = Cell::new(0usize);
  let worst_inner = Cell::new(0.0_f64);
  let inner_converged = Cell::new(true);
  let failure: RefCell<Option<SisError>> = RefCell::new(None);

  let outer = quadrature(
    rule,
    gamma_lo,
    gamma_hi,
    |gamma| {
      if failure.borrow().is_some() {
        return f64::NAN;
      }
      match quadrature(rule, beta_lo, beta_hi, |beta| f.eval(beta, gamma), inner_tol) {
        Ok(inner) => {
          evaluations.set(evaluations.get() + inner.evaluations);
          worst_inner.set(worst_inner.get().max(inner.error_estimate));
          if !inner.converged {
            inner_converged.set(false);
          }
          inner.value
        }
        Err(e) => {
          *failure.borrow_mut() = Some(e);
          f64::NAN
        }
      }
    },
    outer_tol,
  );

  if let Some(e) = failure.into_inner() {
    return Err(e);
  }
  let outer = outer?;

  let out = QuadratureOutput {
    value: outer.value,
    error_estimate: outer.error_estimate + gamma_width * worst_inner.get(),
    evaluations: evaluations.get(),
    converged: outer.converged && inner_converged.get(),
  };

  if !out.converged {
    warn!(
      value = out.value,
      error_estimate = out.error_estimate,
      abs_tol,
      "2-D quadrature missed tolerance"
    );
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;

  use super::*;
  use crate::stats::likelihood::SisLikelihood;

  #[test]
  fn polynomial_1d() {
    let out = integrate_1d(0.0, 1.0, &|x: f64| x * x, 1e-12).unwrap();

    assert_abs_diff_eq!(out.value, 1.0 / 3.0, epsilon = 1e-10);
    assert!(out.converged);
    assert!(out.evaluations > 0);
  }

  #[test]
  fn every_rule_integrates_exponential() {
    let expected = 1.0 - (-1.0_f64).exp();
    for rule in [
      QuadratureRule::default(),
      QuadratureRule::DoubleExponential,
      QuadratureRule::ClenshawCurtis,
      QuadratureRule::GaussLegendre { degree: 10 },
    ] {
      let out = integrate_1d_with_rule(rule, 0.0, 1.0, &|x: f64| (-x).exp(), 1e-8).unwrap();
      assert_abs_diff_eq!(out.value, expected, epsilon = 1e-8);
    }
  }

  #[test]
  fn product_over_rectangle() {
    let out = integrate_2d(0.0, 1.0, 0.0, 2.0, &|b: f64, g: f64| b * g, 1e-10).unwrap();

    assert_abs_diff_eq!(out.value, 1.0, epsilon = 1e-8);
    assert!(out.converged);
  }

  #[test]
  fn outer_variable_is_gamma() {
    // integrand depends on gamma only; beta interval has length 0.5
    let out = integrate_2d(0.0, 0.5, 0.0, 3.0, &|_b: f64, g: f64| g, 1e-10).unwrap();

    assert_abs_diff_eq!(out.value, 0.5 * 4.5, epsilon = 1e-8);
  }

  #[test]
  fn marginal_fixes_one_parameter() {
    let f = |b: f64, g: f64| b * g;

    let in_beta = integrate_1d(0.0, 1.0, &Marginal::at_gamma(f, 2.0), 1e-10).unwrap();
    let in_gamma = integrate_1d(0.0, 2.0, &Marginal::at_beta(f, 3.0), 1e-10).unwrap();

    assert_abs_diff_eq!(in_beta.value, 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(in_gamma.value, 6.0, epsilon = 1e-9);
  }

  #[test]
  fn empty_interval_integrates_to_zero() {
    let out = integrate_1d(2.0, 2.0, &|x: f64| x, 1e-10).unwrap();

    assert_eq!(out.value, 0.0);
  }

  #[test]
  fn invalid_inputs_are_domain_errors() {
    assert!(matches!(
      integrate_1d(1.0, 0.0, &|x: f64| x, 1e-8),
      Err(SisError::Domain(_))
    ));
    assert!(matches!(
      integrate_1d(0.0, 1.0, &|x: f64| x, 0.0),
      Err(SisError::Domain(_))
    ));
    assert!(Normalized::new(|x: f64| x, 0.0).is_err());
  }

  #[test]
  fn non_finite_integrand_is_numerical_error() {
    let out = integrate_2d(0.0, 1.0, 0.0, 1.0, &|_b: f64, _g: f64| f64::NAN, 1e-8);

    assert!(matches!(out, Err(SisError::Numerical { .. })));
  }

  #[test]
  fn isolated_nan_samples_are_not_dropped() {
    let f = |x: f64| if x < 0.25 { f64::NAN } else { x };

    for rule in [
      QuadratureRule::default(),
      QuadratureRule::DoubleExponential,
      QuadratureRule::ClenshawCurtis,
      QuadratureRule::GaussLegendre { degree: 10 },
    ] {
      let out = integrate_1d_with_rule(rule, 0.0, 1.0, &f, 1e-8);
      assert!(
        matches!(out, Err(SisError::Numerical { .. })),
        "{rule:?} gave {out:?}"
      );
    }
  }

  #[test]
  fn adaptive_rule_needs_a_panel() {
    let rule = QuadratureRule::AdaptiveGaussLegendre { degree: 8, panels: 0 };

    assert!(matches!(
      integrate_1d_with_rule(rule, 0.0, 1.0, &|x: f64| x, 1e-8),
      Err(SisError::Domain(_))
    ));
  }

  #[test]
  fn narrow_peak_is_resolved_on_both_axes() {
    // unit-mass Gaussian scaled to 1e-16, centred near the SIS likelihood mode
    let (mb, sb, mg, sg) = (0.003, 0.0004, 0.1, 0.015);
    let mass = 1e-16;
    let peak = |b: f64, g: f64| {
      let zb = (b - mb) / sb;
      let zg = (g - mg) / sg;
      mass * (-0.5 * (zb * zb + zg * zg)).exp() / (2.0 * std::f64::consts::PI * sb * sg)
    };

    let w = integrate_2d(0.0, 0.06, 0.0, 2.0, &peak, 1e-20).unwrap();

    assert!(w.converged);
    assert!(w.error_estimate <= 1e-20, "error estimate {}", w.error_estimate);
    assert_relative_eq!(w.value, mass, epsilon = 0.0, max_relative = 1e-6);
  }

  #[test]
  fn unconverged_output_keeps_estimate() {
    let out = QuadratureOutput {
      value: 0.25,
      error_estimate: 1e-3,
      evaluations: 40,
      converged: false,
    };

    match out.into_result() {
      Err(SisError::Numerical { estimate, error_estimate, .. }) => {
        assert_eq!(estimate, Some(0.25));
        assert_eq!(error_estimate, Some(1e-3));
      }
      other => panic!("expected numerical error, got {other:?}"),
    }
  }

  #[test]
  fn normalized_likelihood_integrates_to_one() {
    let l = SisLikelihood::new(4, 1.0, vec![3, 3, 2]).unwrap();
    let w = integrate_2d(0.0, 1.0, 0.0, 1.0, &l, 1e-10).unwrap();
    assert!(w.value > 0.0);

    let posterior = Normalized::new(l, w.value).unwrap();
    let z = integrate_2d(0.0, 1.0, 0.0, 1.0, &posterior, 1e-8).unwrap();

    assert_abs_diff_eq!(z.value, 1.0, epsilon = 1e-6);
  }

  #[test]
  #[ignore = "full-size 2-D integral is slow"]
  fn observed_series_normalizing_constant() {
    let y = vec![100, 98, 95, 87, 74, 59, 44, 35, 39, 32, 38];
    let l = SisLikelihood::new(101, 4.0, y).unwrap();

    let w = integrate_2d(0.0, 0.06, 0.0, 2.0, &l, 1e-19).unwrap();

    assert_relative_eq!(w.value, 1.0783711147429725e-16, epsilon = 0.0, max_relative = 1e-3);
  }
}
