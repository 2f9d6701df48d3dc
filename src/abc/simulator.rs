use rand::Rng;
use rand_distr::Binomial;
use rand_distr::Distribution;
use tracing::debug;
use tracing::warn;

use crate::error::Result;
use crate::error::SisError;
use crate::stats::distance::euclidean_distance;
use crate::stochastic::gillespie::SisGillespie;
use crate::stochastic::resample::ObservationGrid;
use crate::stochastic::trace::TraceSink;
use crate::stochastic::I0;
use crate::stochastic::N_OBS;
use crate::stochastic::S0;
use crate::stochastic::T_END;
use crate::traits::SimulatorExt;

/// Fixed settings of an SIS simulator run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulatorConfig {
  pub s0: usize,
  pub i0: usize,
  pub t_end: f64,
  pub n_obs: usize,
}

impl Default for SimulatorConfig {
  fn default() -> Self {
    Self {
      s0: S0,
      i0: I0,
      t_end: T_END,
      n_obs: N_OBS,
    }
  }
}

/// SIS simulator scored on the susceptible series at the observation grid.
///
/// `theta = [beta, gamma]`.
#[derive(Clone, Copy, Debug)]
pub struct SisSimulator {
  config: SimulatorConfig,
  grid: ObservationGrid,
}

impl SisSimulator {
  pub fn new(config: SimulatorConfig) -> Result<Self> {
    let grid = ObservationGrid::new(config.t_end, config.n_obs)?;
    Ok(Self { config, grid })
  }

  pub fn config(&self) -> SimulatorConfig {
    self.config
  }

  pub fn grid(&self) -> ObservationGrid {
    self.grid
  }
}

impl SimulatorExt for SisSimulator {
  type Data = Vec<usize>;

  fn dimension(&self) -> usize {
    2
  }

  /// Takes the first `n_obs` counts; anything after them is ignored.
  fn parse_observed(&self, input: &str) -> Result<Self::Data> {
    let n_obs = self.config.n_obs;
    let mut tokens = input.split_whitespace();
    let values = tokens
      .by_ref()
      .take(n_obs)
      .map(|token| {
        token
          .parse::<usize>()
          .map_err(|e| SisError::InputFormat(format!("invalid count {token:?}: {e}")))
      })
      .collect::<Result<Vec<usize>>>()?;

    if values.len() < n_obs {
      return Err(SisError::InputFormat(format!(
        "expected {n_obs} observations, found {}",
        values.len()
      )));
    }
    let extra = tokens.count();
    if extra > 0 {
      warn!(n_obs, extra, "ignoring values after the observed series");
    }
    Ok(values)
  }

  fn simulate<R: Rng + ?Sized>(
    &self,
    theta: &[f64],
    rng: &mut R,
    sink: Option<&mut dyn TraceSink>,
  ) -> Result<Self::Data> {
    let [beta, gamma] = theta else {
      return Err(SisError::Domain(format!(
        "SIS simulator expects [beta, gamma], got {} parameters",
        theta.len()
      )));
    };

    let model = SisGillespie::new(*beta, *gamma, self.config.s0, self.config.i0, self.config.t_end);
    let trajectory = model.simulate_traced(rng, sink)?;

    Ok(self.grid.resample(&trajectory))
  }

  fn distance(&self, observed: &Self::Data, simulated: &Self::Data) -> Result<f64> {
    euclidean_distance(observed, simulated)
  }
}

/// Number of heads in `trials` flips of a coin with heads probability `q`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoinFlipSimulator {
  pub trials: u64,
}

impl Default for CoinFlipSimulator {
  fn default() -> Self {
    Self { trials: 20 }
  }
}

impl SimulatorExt for CoinFlipSimulator {
  type Data = u64;

  fn dimension(&self) -> usize {
    1
  }

  fn parse_observed(&self, input: &str) -> Result<Self::Data> {
    let token = input.trim();
    let heads = token
      .parse::<u64>()
      .map_err(|e| SisError::InputFormat(format!("invalid head count {token:?}: {e}")))?;
    if heads > self.trials {
      return Err(SisError::Domain(format!(
        "observed {heads} heads in {} trials",
        self.trials
      )));
    }
    Ok(heads)
  }

  /// Flips carry no time axis, so `sink` is not written to.
  fn simulate<R: Rng + ?Sized>(
    &self,
    theta: &[f64],
    rng: &mut R,
    _sink: Option<&mut dyn TraceSink>,
  ) -> Result<Self::Data> {
    let [q] = theta else {
      return Err(SisError::Domain(format!(
        "coin simulator expects [q], got {} parameters",
        theta.len()
      )));
    };

    let binomial = Binomial::new(self.trials, *q)
      .map_err(|e| SisError::Domain(format!("heads probability {q}: {e}")))?;
    let heads = binomial.sample(rng);
    debug!(q, heads, "coin flips simulated");

    Ok(heads)
  }

  fn distance(&self, observed: &Self::Data, simulated: &Self::Data) -> Result<f64> {
    Ok(observed.abs_diff(*simulated) as f64)
  }
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use tracing_test::traced_test;

  use super::*;

  #[test]
  fn default_config_matches_reference_run() {
    let config = SimulatorConfig::default();

    assert_eq!((config.s0, config.i0, config.n_obs), (100, 1, 10));
    assert_eq!(config.t_end, 40.0);
  }

  #[test]
  fn sis_same_seed_gives_same_series() {
    let sim = SisSimulator::new(SimulatorConfig::default()).unwrap();

    let a = sim
      .simulate(&[0.003, 0.1], &mut StdRng::seed_from_u64(2024), None)
      .unwrap();
    let b = sim
      .simulate(&[0.003, 0.1], &mut StdRng::seed_from_u64(2024), None)
      .unwrap();

    assert_eq!(a, b);
    assert_eq!(a.len(), 10);
    assert!(a.iter().all(|&s| s <= 101));
  }

  #[test]
  fn sis_trace_starts_at_initial_state() {
    let sim = SisSimulator::new(SimulatorConfig::default()).unwrap();
    let mut trace: Vec<(f64, usize)> = Vec::new();

    sim
      .simulate(&[0.003, 0.1], &mut StdRng::seed_from_u64(5), Some(&mut trace))
      .unwrap();

    assert_eq!(trace[0], (0.0, 100));
    assert!(trace.windows(2).all(|w| w[0].0 < w[1].0));
  }

  #[test]
  fn sis_rejects_wrong_parameter_count() {
    let sim = SisSimulator::new(SimulatorConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    assert!(sim.simulate(&[0.003], &mut rng, None).is_err());
    assert!(sim.simulate(&[-0.003, 0.1], &mut rng, None).is_err());
  }

  #[test]
  fn sis_observed_data_needs_enough_counts() {
    let sim = SisSimulator::new(SimulatorConfig::default()).unwrap();

    let ok = sim.parse_observed("98\n95\n87\n74\n59\n44\n35\n39\n32\n38\n").unwrap();
    assert_eq!(ok[0], 98);
    assert!(matches!(sim.parse_observed("1\n2\n"), Err(SisError::InputFormat(_))));
    assert!(matches!(sim.parse_observed("x"), Err(SisError::InputFormat(_))));
  }

  #[test]
  #[traced_test]
  fn sis_observed_data_ignores_trailing_values() {
    let sim = SisSimulator::new(SimulatorConfig::default()).unwrap();

    let series = sim
      .parse_observed("98 95 87 74 59 44 35 39 32 38\n12 13\n")
      .unwrap();

    assert_eq!(series, vec![98, 95, 87, 74, 59, 44, 35, 39, 32, 38]);
    assert!(logs_contain("ignoring values after the observed series"));
  }

  #[test]
  fn coin_distance_is_absolute_difference() {
    let coin = CoinFlipSimulator::default();

    assert_eq!(coin.distance(&10, &13).unwrap(), 3.0);
    assert_eq!(coin.distance(&13, &10).unwrap(), 3.0);
  }

  #[test]
  fn coin_extremes_are_deterministic() {
    let coin = CoinFlipSimulator::default();
    let mut rng = StdRng::seed_from_u64(9);

    assert_eq!(coin.simulate(&[0.0], &mut rng, None).unwrap(), 0);
    assert_eq!(coin.simulate(&[1.0], &mut rng, None).unwrap(), 20);
    assert!(coin.simulate(&[1.5], &mut rng, None).is_err());
  }
}
