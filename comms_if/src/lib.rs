//! # Communications interface crate.
//!
//! Provides the interfaces shared between the arm control software and the outside world: the
//! motion driver boundary and the telecommands accepted by the executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Command and telemetry definitions for equipment (like the arm)
pub mod eqpt;
