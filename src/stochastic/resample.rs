use crate::error::Result;
use crate::error::SisError;
use crate::stochastic::gillespie::Trajectory;

/// Uniform observation times `dt, 2 dt, ..., n_obs dt` with `dt = t_end / n_obs`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservationGrid {
  t_end: f64,
  n_obs: usize,
}

impl ObservationGrid {
  pub fn new(t_end: f64, n_obs: usize) -> Result<Self> {
    if !(t_end.is_finite() && t_end > 0.0) {
      return Err(SisError::Domain(format!(
        "observation horizon must be finite and positive, got {t_end}"
      )));
    }
    if n_obs == 0 {
      return Err(SisError::Domain(
        "observation grid needs at least one point".into(),
      ));
    }
    Ok(Self { t_end, n_obs })
  }

  pub fn t_end(&self) -> f64 {
    self.t_end
  }

  pub fn n_obs(&self) -> usize {
    self.n_obs
  }

  pub fn dt(&self) -> f64 {
    self.t_end / self.n_obs as f64
  }

  /// Time of the `k`-th observation, `k = 1..=n_obs`.
  pub fn point(&self, k: usize) -> f64 {
    k as f64 * self.dt()
  }

  pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
    (1..=self.n_obs).map(move |k| self.point(k))
  }

  /// Samples the susceptible count of `trajectory` at every grid point.
  ///
  /// A grid point `t_k` takes the count of the segment `[t_j, t_{j+1})` with
  /// `t_j < t_k <= t_{j+1}`. Points past the last recorded event repeat the
  /// final count. The output always has `n_obs` entries.
  pub fn resample(&self, trajectory: &Trajectory) -> Vec<usize> {
    let times = trajectory.times();
    let susceptible = trajectory.susceptible();

    let mut out = Vec::with_capacity(self.n_obs);
    let mut j = 0;
    while out.len() < self.n_obs && j + 1 < times.len() {
      let t_k = self.point(out.len() + 1);
      if times[j] < t_k && t_k <= times[j + 1] {
        out.push(susceptible[j]);
      } else {
        j += 1;
      }
    }

    let last = trajectory.final_state().s;
    out.resize(self.n_obs, last);
    out
  }
}

/// Convenience wrapper over [`ObservationGrid::resample`].
pub fn resample(trajectory: &Trajectory, t_end: f64, n_obs: usize) -> Result<Vec<usize>> {
  Ok(ObservationGrid::new(t_end, n_obs)?.resample(trajectory))
}
