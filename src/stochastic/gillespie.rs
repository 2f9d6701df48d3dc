//! # Gillespie SSA
//!
//! $$
//! \tau = -\frac{\ln r_1}{a_0},\qquad
//! \text{reaction}=\begin{cases}\text{infection} & r_2 a_0 < a_1\\ \text{recovery} & \text{otherwise}\end{cases}
//! $$
//!
use impl_new_derive::ImplNew;
use rand::distr::Distribution;
use rand::distr::Open01;
use rand::Rng;
use tracing::debug;
use tracing::trace;

use crate::error::Result;
use crate::error::SisError;
use crate::model::SisRates;
use crate::model::SisState;
use crate::stochastic::trace::TraceSink;
use crate::traits::ProcessExt;

/// Direct-method SSA for the SIS model.
#[derive(ImplNew, Clone, Copy, Debug)]
pub struct SisGillespie {
  /// Contact rate.
  pub beta: f64,
  /// Recovery rate.
  pub gamma: f64,
  /// Initial susceptible count.
  pub s0: usize,
  /// Initial infected count.
  pub i0: usize,
  /// Simulation horizon.
  pub t_end: f64,
}

impl SisGillespie {
  pub fn rates(&self) -> SisRates {
    SisRates::new(self.beta, self.gamma)
  }

  pub fn population(&self) -> usize {
    self.s0 + self.i0
  }

  pub fn validate(&self) -> Result<()> {
    if !self.rates().is_valid() {
      return Err(SisError::Domain(format!(
        "beta and gamma must be finite and non-negative, got beta = {}, gamma = {}",
        self.beta, self.gamma
      )));
    }
    if !(self.t_end.is_finite() && self.t_end >= 0.0) {
      return Err(SisError::Domain(format!(
        "t_end must be finite and non-negative, got {}",
        self.t_end
      )));
    }
    Ok(())
  }

  pub fn simulate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Trajectory> {
    self.simulate_traced(rng, None)
  }

  /// Runs the SSA, handing every recorded state to `sink` when present.
  ///
  /// The event that first crosses `t_end` is kept, so the last recorded time
  /// exceeds the horizon unless the epidemic died out first. Invalid rates
  /// or horizon fail before anything reaches `sink`.
  pub fn simulate_traced<R: Rng + ?Sized>(
    &self,
    rng: &mut R,
    mut sink: Option<&mut dyn TraceSink>,
  ) -> Result<Trajectory> {
    self.validate()?;

    let rates = self.rates();
    let mut trajectory = Trajectory::start(self.s0, self.i0);
    if let Some(sink) = sink.as_mut() {
      sink.record_state(0.0, self.s0);
    }

    let (mut t, mut s, mut i) = (0.0, self.s0, self.i0);

    while t <= self.t_end && i > 0 {
      let r1: f64 = Open01.sample(rng);
      let r2: f64 = Open01.sample(rng);

      let a = rates.propensities(s, i);
      if a.is_absorbing() {
        debug!(t, s, i, "zero total propensity, stopping");
        break;
      }

      t += -r1.ln() / a.total();
      let reaction = a.select(r2);
      (s, i) = reaction.apply(s, i);
      trace!(t, s, i, ?reaction, "fired");

      trajectory.push(t, s, i);
      if let Some(sink) = sink.as_mut() {
        sink.record_state(t, s);
      }
    }

    debug!(
      events = trajectory.len() - 1,
      absorbed = trajectory.is_absorbed(),
      t_last = t,
      "simulation finished"
    );

    Ok(trajectory)
  }
}

impl ProcessExt for SisGillespie {
  type Output = Result<Trajectory>;

  fn sample(&self) -> Self::Output {
    self.simulate(&mut rand::rng())
  }
}

/// Event times with the compartment counts that hold from each time onward.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
  times: Vec<f64>,
  susceptible: Vec<usize>,
  infected: Vec<usize>,
}

impl Trajectory {
  fn start(s0: usize, i0: usize) -> Self {
    Self {
      times: vec![0.0],
      susceptible: vec![s0],
      infected: vec![i0],
    }
  }

  fn push(&mut self, t: f64, s: usize, i: usize) {
    self.times.push(t);
    self.susceptible.push(s);
    self.infected.push(i);
  }

  /// Builds a trajectory from recorded columns.
  ///
  /// The columns must be non-empty, of equal length, start at `t = 0`,
  /// be strictly increasing in time and conserve `S + I`.
  pub fn from_parts(times: Vec<f64>, susceptible: Vec<usize>, infected: Vec<usize>) -> Result<Self> {
    if times.is_empty() || times.len() != susceptible.len() || times.len() != infected.len() {
      return Err(SisError::Domain(
        "trajectory columns must be non-empty and of equal length".into(),
      ));
    }
    if times[0] != 0.0 {
      return Err(SisError::Domain("trajectory must start at t = 0".into()));
    }
    if times.windows(2).any(|w| !(w[1] > w[0])) {
      return Err(SisError::Domain(
        "trajectory times must be strictly increasing".into(),
      ));
    }
    let n = susceptible[0] + infected[0];
    if susceptible.iter().zip(&infected).any(|(s, i)| s + i != n) {
      return Err(SisError::Domain(
        "trajectory must conserve the population size".into(),
      ));
    }

    Ok(Self {
      times,
      susceptible,
      infected,
    })
  }

  pub fn len(&self) -> usize {
    self.times.len()
  }

  pub fn is_empty(&self) -> bool {
    self.times.is_empty()
  }

  pub fn times(&self) -> &[f64] {
    &self.times
  }

  pub fn susceptible(&self) -> &[usize] {
    &self.susceptible
  }

  pub fn infected(&self) -> &[usize] {
    &self.infected
  }

  pub fn population(&self) -> usize {
    self.susceptible[0] + self.infected[0]
  }

  pub fn final_state(&self) -> SisState {
    let last = self.len() - 1;
    SisState {
      t: self.times[last],
      s: self.susceptible[last],
      i: self.infected[last],
    }
  }

  pub fn is_absorbed(&self) -> bool {
    self.final_state().i == 0
  }

  pub fn states(&self) -> impl Iterator<Item = SisState> + '_ {
    self
      .times
      .iter()
      .zip(&self.susceptible)
      .zip(&self.infected)
      .map(|((&t, &s), &i)| SisState { t, s, i })
  }
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use tracing_test::traced_test;

  use super::SisGillespie;
  use super::Trajectory;
  use crate::error::SisError;
  use crate::traits::ProcessExt;

  fn scenario() -> SisGillespie {
    SisGillespie::new(0.003, 0.1, 100, 1, 40.0)
  }

  #[test]
  fn trajectory_conserves_population() {
    let model = scenario();
    for seed in 0..50 {
      let path = model.simulate(&mut StdRng::seed_from_u64(seed)).unwrap();
      assert!(path.states().all(|state| state.population() == 101));
    }
  }

  #[test]
  fn trajectory_times_strictly_increase_from_zero() {
    let path = scenario().simulate(&mut StdRng::seed_from_u64(3)).unwrap();

    assert_eq!(path.times()[0], 0.0);
    assert!(path.times().windows(2).all(|w| w[1] > w[0]));
  }

  #[test]
  fn trajectory_ends_absorbed_or_past_horizon() {
    let model = scenario();
    for seed in 0..50 {
      let path = model.simulate(&mut StdRng::seed_from_u64(seed)).unwrap();
      let last = path.final_state();
      assert!(last.i == 0 || last.t > model.t_end);
    }
  }

  #[test]
  fn same_seed_reproduces_trajectory() {
    let model = scenario();
    let a = model.simulate(&mut StdRng::seed_from_u64(2024)).unwrap();
    let b = model.simulate(&mut StdRng::seed_from_u64(2024)).unwrap();

    assert_eq!(a, b);
  }

  #[test]
  fn no_infected_yields_single_state() {
    let model = SisGillespie::new(0.003, 0.1, 101, 0, 40.0);
    let path = model.simulate(&mut StdRng::seed_from_u64(1)).unwrap();

    assert_eq!(path.len(), 1);
    assert!(path.is_absorbed());
  }

  #[test]
  #[traced_test]
  fn zero_rates_stop_without_dividing_by_zero() {
    let model = SisGillespie::new(0.0, 0.0, 100, 1, 40.0);
    let path = model.simulate(&mut StdRng::seed_from_u64(1)).unwrap();

    assert_eq!(path.len(), 1);
    assert_eq!(path.final_state().s, 100);
    assert!(logs_contain("zero total propensity"));
  }

  #[test]
  fn pure_recovery_drains_infected() {
    let model = SisGillespie::new(0.0, 1.0, 0, 5, 1.0e6);
    let path = model.simulate(&mut StdRng::seed_from_u64(9)).unwrap();

    assert_eq!(path.len(), 6);
    assert_eq!(path.final_state().s, 5);
    assert!(path.is_absorbed());
  }

  #[test]
  fn sink_sees_every_recorded_state() {
    let model = scenario();
    let mut sink: Vec<(f64, usize)> = Vec::new();
    let path = model
      .simulate_traced(&mut StdRng::seed_from_u64(5), Some(&mut sink))
      .unwrap();

    assert_eq!(sink.len(), path.len());
    for ((t, s), state) in sink.iter().zip(path.states()) {
      assert_eq!(*t, state.t);
      assert_eq!(*s, state.s);
    }
  }

  #[test]
  fn sample_par_returns_requested_count() {
    let paths = scenario().sample_par(16);

    assert_eq!(paths.len(), 16);
    assert!(paths
      .iter()
      .all(|p| p.as_ref().is_ok_and(|p| p.population() == 101)));
  }

  #[test]
  fn validate_rejects_negative_rates() {
    assert!(SisGillespie::new(-0.1, 0.1, 10, 1, 1.0).validate().is_err());
    assert!(SisGillespie::new(0.1, 0.1, 10, 1, f64::NAN).validate().is_err());
    assert!(scenario().validate().is_ok());
  }

  #[test]
  fn invalid_model_fails_before_tracing() {
    let mut sink: Vec<(f64, usize)> = Vec::new();
    let model = SisGillespie::new(f64::NAN, 0.1, 100, 1, 40.0);

    let out = model.simulate_traced(&mut StdRng::seed_from_u64(5), Some(&mut sink));

    assert!(matches!(out, Err(SisError::Domain(_))));
    assert!(sink.is_empty());
    assert!(SisGillespie::new(0.003, 0.1, 100, 1, f64::INFINITY)
      .simulate(&mut StdRng::seed_from_u64(5))
      .is_err());
  }

  #[test]
  fn from_parts_rejects_broken_columns() {
    assert!(Trajectory::from_parts(vec![], vec![], vec![]).is_err());
    assert!(Trajectory::from_parts(vec![0.0, 1.0], vec![1, 2], vec![1]).is_err());
    assert!(Trajectory::from_parts(vec![0.0, 0.0], vec![1, 2], vec![1, 0]).is_err());
    assert!(Trajectory::from_parts(vec![0.0, 1.0], vec![1, 2], vec![1, 1]).is_err());
    assert!(Trajectory::from_parts(vec![0.0, 1.0], vec![1, 2], vec![1, 0]).is_ok());
  }
}
