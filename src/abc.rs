//! # ABC backend
//!
//! Simulators, seed persistence and the line protocol spoken with an
//! approximate Bayesian computation outer loop.
//!
//! | Module        | Description                                                      |
//! |---------------|------------------------------------------------------------------|
//! | [`simulator`] | SIS and biased-coin simulators behind `SimulatorExt`.            |
//! | [`protocol`]  | Simulator, perturber, prior and density drivers over text streams. |
//! | [`seed`]      | Seed counter persisted between invocations.                      |
//!
pub mod protocol;
pub mod seed;
pub mod simulator;
