//! # SIS reaction model
//!
//! $$
//! S + I \xrightarrow{\beta} 2I,\qquad I \xrightarrow{\gamma} S
//! $$
//!
//! Propensities of the two reactions for a closed population of size
//! $N = S + I$:
//!
//! $$
//! a_1 = \beta S I,\qquad a_2 = \gamma I,\qquad a_0 = a_1 + a_2
//! $$
//!
use impl_new_derive::ImplNew;

/// Snapshot of the epidemic at time `t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SisState {
  pub t: f64,
  /// Susceptible count.
  pub s: usize,
  /// Infected count.
  pub i: usize,
}

impl SisState {
  pub fn population(&self) -> usize {
    self.s + self.i
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
  /// `(S, I) -> (S - 1, I + 1)`
  Infection,
  /// `(S, I) -> (S + 1, I - 1)`
  Recovery,
}

impl Reaction {
  /// Applies the reaction to `(s, i)`.
  ///
  /// Callers only fire a reaction whose propensity is positive, so the
  /// decremented compartment is never empty.
  pub fn apply(self, s: usize, i: usize) -> (usize, usize) {
    match self {
      Reaction::Infection => (s - 1, i + 1),
      Reaction::Recovery => (s + 1, i - 1),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Propensities {
  pub infection: f64,
  pub recovery: f64,
}

impl Propensities {
  pub fn total(&self) -> f64 {
    self.infection + self.recovery
  }

  /// No reaction can fire.
  pub fn is_absorbing(&self) -> bool {
    self.total() <= 0.0
  }

  /// Chooses the reaction for a uniform draw `u` in `(0, 1)`.
  ///
  /// Infection fires when `u * a0 < a1`, recovery otherwise.
  pub fn select(&self, u: f64) -> Reaction {
    if u * self.total() < self.infection {
      Reaction::Infection
    } else {
      Reaction::Recovery
    }
  }
}

/// Rate constants of the SIS model.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct SisRates {
  /// Contact rate.
  pub beta: f64,
  /// Recovery rate.
  pub gamma: f64,
}

impl SisRates {
  pub fn propensities(&self, s: usize, i: usize) -> Propensities {
    let s = s as f64;
    let i = i as f64;

    Propensities {
      infection: self.beta * s * i,
      recovery: self.gamma * i,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.beta.is_finite() && self.gamma.is_finite() && self.beta >= 0.0 && self.gamma >= 0.0
  }
}
