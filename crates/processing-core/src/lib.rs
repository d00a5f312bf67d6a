//! Vivitag Processing Core
//!
//! Placement algorithms for text tags:
//! - **Layout:** Scatter N tags across an image on a jittered grid
//! - **Physics:** Bounce floating tags inside a video frame
//!
//! This crate is pure computation: no I/O and no rendering.
//! Randomness is injected so results are reproducible under a seed.

pub mod layout;
pub mod physics;

pub use layout::{scatter, scatter_floating, scatter_into_project, ScatterTemplate};
pub use physics::{PhysicsState, PhysicsTable, TextExtent};
