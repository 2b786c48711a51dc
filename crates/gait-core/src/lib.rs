//! # Gait-Core
//!
//! Core types for phase-indexed gait-cycle data: the error taxonomy, the
//! feature-name vocabulary and its classification, and the table loader
//! seam with schema normalisation.
//!
//! ## Data Layout
//!
//! A gait table is a flat run of rows `(subject, task, phase, features...)`.
//! Every (subject, task) pair holds whole gait cycles, each resampled to a
//! fixed number of phase points, stacked cycle after cycle.

pub mod error;
pub mod feature;
pub mod naming;
pub mod table;

pub use error::{Error, Result};
pub use feature::*;
pub use naming::*;
pub use table::*;
