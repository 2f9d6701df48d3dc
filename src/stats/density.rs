//! # Density
//!
//! $$
//! \pi(\theta)=\prod_{i}\frac{\mathbf{1}_{a_i\le\theta_i\le b_i}}{b_i-a_i},\qquad
//! K(\theta^*\mid\theta)=\prod_{i}\frac{1}{\sqrt{2\pi}\sigma_i}
//! e^{-(\theta^*_i-\theta_i)^2/2\sigma_i^2}
//! $$
//!
//! Independent per-coordinate uniform prior and Gaussian perturbation
//! kernel. Densities are products of the one-dimensional ones.
//!
use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::Continuous;

use crate::error::Result;
use crate::error::SisError;

#[derive(Clone, Debug)]
pub struct UniformPrior {
  bounds: Vec<(f64, f64)>,
  samplers: Vec<rand_distr::Uniform<f64>>,
  densities: Vec<statrs::distribution::Uniform>,
}

impl UniformPrior {
  /// One `(low, high)` pair per coordinate, with `low < high`.
  pub fn new(bounds: Vec<(f64, f64)>) -> Result<Self> {
    if bounds.is_empty() {
      return Err(SisError::Domain("prior needs at least one coordinate".into()));
    }

    let mut samplers = Vec::with_capacity(bounds.len());
    let mut densities = Vec::with_capacity(bounds.len());
    for &(low, high) in &bounds {
      if !(low.is_finite() && high.is_finite() && low < high) {
        return Err(SisError::Domain(format!(
          "prior bounds must be finite with low < high, got [{low}, {high}]"
        )));
      }
      samplers.push(
        rand_distr::Uniform::new(low, high)
          .map_err(|e| SisError::Domain(format!("uniform [{low}, {high}): {e}")))?,
      );
      densities.push(
        statrs::distribution::Uniform::new(low, high)
          .map_err(|e| SisError::Domain(format!("uniform [{low}, {high}]: {e}")))?,
      );
    }

    Ok(Self {
      bounds,
      samplers,
      densities,
    })
  }

  pub fn dimension(&self) -> usize {
    self.bounds.len()
  }

  pub fn bounds(&self) -> &[(f64, f64)] {
    &self.bounds
  }

  pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
    self.samplers.iter().map(|u| u.sample(rng)).collect()
  }

  /// Product density; zero outside the (inclusive) bounds.
  pub fn pdf(&self, theta: &[f64]) -> Result<f64> {
    check_dimension(self.dimension(), theta.len())?;
    Ok(
      self
        .densities
        .iter()
        .zip(theta)
        .map(|(d, &x)| d.pdf(x))
        .product(),
    )
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GaussianKernel {
  stdevs: Vec<f64>,
}

impl GaussianKernel {
  pub fn new(stdevs: Vec<f64>) -> Result<Self> {
    if stdevs.is_empty() {
      return Err(SisError::Domain("kernel needs at least one coordinate".into()));
    }
    if let Some(&s) = stdevs.iter().find(|&&s| !(s.is_finite() && s > 0.0)) {
      return Err(SisError::Domain(format!(
        "standard deviations must be finite and positive, got {s}"
      )));
    }
    Ok(Self { stdevs })
  }

  pub fn dimension(&self) -> usize {
    self.stdevs.len()
  }

  pub fn stdevs(&self) -> &[f64] {
    &self.stdevs
  }

  /// Draws each coordinate from a normal centred on `theta`.
  pub fn perturb<R: Rng + ?Sized>(&self, theta: &[f64], rng: &mut R) -> Result<Vec<f64>> {
    check_dimension(self.dimension(), theta.len())?;
    theta
      .iter()
      .zip(&self.stdevs)
      .map(|(&mu, &sigma)| {
        rand_distr::Normal::new(mu, sigma)
          .map(|n| n.sample(rng))
          .map_err(|e| SisError::Domain(format!("normal({mu}, {sigma}): {e}")))
      })
      .collect()
  }

  /// Density of moving from `center` to `perturbed`.
  pub fn pdf(&self, perturbed: &[f64], center: &[f64]) -> Result<f64> {
    check_dimension(self.dimension(), perturbed.len())?;
    check_dimension(self.dimension(), center.len())?;

    let mut density = 1.0;
    for ((&x, &mu), &sigma) in perturbed.iter().zip(center).zip(&self.stdevs) {
      let normal = statrs::distribution::Normal::new(mu, sigma)
        .map_err(|e| SisError::Domain(format!("normal({mu}, {sigma}): {e}")))?;
      density *= normal.pdf(x);
    }
    Ok(density)
  }
}

fn check_dimension(expected: usize, got: usize) -> Result<()> {
  if expected != got {
    return Err(SisError::Domain(format!(
      "expected {expected} parameters, got {got}"
    )));
  }
  Ok(())
}
