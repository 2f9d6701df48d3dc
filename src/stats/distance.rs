//! # Distance
//!
//! $$
//! d(y, \hat y)=\sqrt{\sum_{k=1}^{n}(y_k-\hat y_k)^2}
//! $$
//!
use crate::error::Result;
use crate::error::SisError;

/// Euclidean distance between an observed and a simulated count series.
pub fn euclidean_distance(observed: &[usize], simulated: &[usize]) -> Result<f64> {
  if observed.len() != simulated.len() {
    return Err(SisError::Domain(format!(
      "observed ({}) and simulated ({}) series must have the same length",
      observed.len(),
      simulated.len()
    )));
  }

  let sum: f64 = observed
    .iter()
    .zip(simulated)
    .map(|(&o, &s)| {
      let d = o as f64 - s as f64;
      d * d
    })
    .sum();

  Ok(sum.sqrt())
}
