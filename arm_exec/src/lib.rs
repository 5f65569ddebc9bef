//! # Arm library.
//!
//! This library allows other crates in the workspace to access items defined inside the arm
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm control module - IK, target storage, mode sequencing and dispatch to the arm
pub mod arm_ctrl;

/// Executable parameters
pub mod params;

/// Simulated arm - stands in for the vendor driver when no arm is attached
pub mod sim_arm;
