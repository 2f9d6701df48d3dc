//! # Stochastic simulation
//!
//! `stochastic` holds the exact simulator of the SIS epidemic and the tools
//! that turn its continuous-time output into data comparable with
//! observations.
//!
//! ## Modules
//!
//! | Module          | Description                                                                 |
//! |-----------------|-----------------------------------------------------------------------------|
//! | [`gillespie`]   | Direct-method SSA producing event-time trajectories.                        |
//! | [`resample`]    | Maps trajectories onto a uniform observation grid (half-open segments).     |
//! | [`trace`]       | Optional per-event recording sinks.                                         |
//!
//! ## Parallelism
//!
//! `sample_par()` draws independent trajectories with `rayon`. A single
//! trajectory is always simulated sequentially.
//!
//! ## Example Usage
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sis_abc::stochastic::gillespie::SisGillespie;
//! use sis_abc::stochastic::resample::ObservationGrid;
//!
//! let model = SisGillespie::new(0.003, 0.1, 100, 1, 40.0);
//! let path = model.simulate(&mut StdRng::seed_from_u64(42)).unwrap();
//! let series = ObservationGrid::new(40.0, 10).unwrap().resample(&path);
//! ```

pub mod gillespie;
pub mod resample;
pub mod trace;

/// Default initial susceptible count
pub const S0: usize = 100;
/// Default initial infected count
pub const I0: usize = 1;
/// Default simulation horizon
pub const T_END: f64 = 40.0;
/// Default number of observations
pub const N_OBS: usize = 10;
