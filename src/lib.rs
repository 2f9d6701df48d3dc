//! # sis-abc
//!
//! Stochastic SIS epidemic simulation and exact likelihood evaluation.
//!
//! - [`stochastic`]: Gillespie simulation, resampling onto an observation grid, tracing.
//! - [`stats`]: generator matrix, likelihood, quadrature, distances and densities.
//! - [`abc`]: simulators, line protocol and seed persistence for an ABC outer loop.
//!
pub mod abc;
pub mod error;
pub mod model;
pub mod stats;
pub mod stochastic;
pub mod traits;

pub use error::Result;
pub use error::SisError;
pub use traits::ProcessExt;
pub use traits::SimulatorExt;
