use ndarray::ArrayD;
use ndarray::IxDyn;
use ndarray::Zip;

use crate::error::Result;
use crate::error::SisError;

/// Expands a 0-dimensional operand to the shape of the other one.
///
/// Equal shapes pass through unchanged. Any other combination is a domain
/// error.
pub fn broadcast_pair(a: ArrayD<f64>, b: ArrayD<f64>) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
  if a.shape() == b.shape() {
    return Ok((a, b));
  }
  if a.ndim() == 0 {
    let a = expand_scalar(&a, b.shape())?;
    return Ok((a, b));
  }
  if b.ndim() == 0 {
    let b = expand_scalar(&b, a.shape())?;
    return Ok((a, b));
  }

  Err(SisError::Domain(format!(
    "cannot broadcast shapes {:?} and {:?}",
    a.shape(),
    b.shape()
  )))
}

fn expand_scalar(scalar: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>> {
  scalar
    .broadcast(IxDyn(shape))
    .map(|view| view.to_owned())
    .ok_or_else(|| SisError::Domain(format!("cannot broadcast scalar to {shape:?}")))
}

/// Equal-shaped `beta` and `gamma` arrays; one parameter point per element.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterGrid {
  beta: ArrayD<f64>,
  gamma: ArrayD<f64>,
}

impl ParameterGrid {
  pub fn new(beta: ArrayD<f64>, gamma: ArrayD<f64>) -> Result<Self> {
    let (beta, gamma) = broadcast_pair(beta, gamma)?;
    let grid = Self { beta, gamma };
    grid.validate()?;
    Ok(grid)
  }

  /// A 0-dimensional grid holding a single point.
  pub fn scalar(beta: f64, gamma: f64) -> Result<Self> {
    Self::new(ArrayD::from_elem(IxDyn(&[]), beta), ArrayD::from_elem(IxDyn(&[]), gamma))
  }

  /// Cartesian product with shape `[betas.len(), gammas.len()]`.
  pub fn mesh(betas: &[f64], gammas: &[f64]) -> Result<Self> {
    let shape = IxDyn(&[betas.len(), gammas.len()]);
    let beta = ArrayD::from_shape_fn(shape.clone(), |idx| betas[idx[0]]);
    let gamma = ArrayD::from_shape_fn(shape, |idx| gammas[idx[1]]);
    Self::new(beta, gamma)
  }

  fn validate(&self) -> Result<()> {
    let mut bad = None;
    Zip::from(&self.beta).and(&self.gamma).for_each(|&b, &g| {
      if bad.is_none() && !(b.is_finite() && g.is_finite() && b >= 0.0 && g >= 0.0) {
        bad = Some((b, g));
      }
    });

    match bad {
      Some((b, g)) => Err(SisError::Domain(format!(
        "parameters must be finite and non-negative, got beta = {b}, gamma = {g}"
      ))),
      None => Ok(()),
    }
  }

  pub fn shape(&self) -> &[usize] {
    self.beta.shape()
  }

  pub fn len(&self) -> usize {
    self.beta.len()
  }

  pub fn is_empty(&self) -> bool {
    self.beta.is_empty()
  }

  pub fn beta(&self) -> &ArrayD<f64> {
    &self.beta
  }

  pub fn gamma(&self) -> &ArrayD<f64> {
    &self.gamma
  }

  /// Parameter points in logical (row-major) order.
  pub fn points(&self) -> Vec<(f64, f64)> {
    self
      .beta
      .iter()
      .zip(self.gamma.iter())
      .map(|(&b, &g)| (b, g))
      .collect()
  }
}
