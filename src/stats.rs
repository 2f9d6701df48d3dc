//! # Stats
//!
//! $$
//! L(\beta,\gamma\mid y)=\prod_k \left[e^{Q\Delta t}\right]_{y_k,y_{k+1}},\qquad
//! d(y,\hat y)=\lVert y-\hat y\rVert_2
//! $$
//!
//! Exact likelihood of the SIS chain, its integral over a parameter domain,
//! and the distances and densities used by an ABC loop.
//!
pub mod density;
pub mod distance;
pub mod generator;
pub mod grid;
pub mod integrate;
pub mod likelihood;
