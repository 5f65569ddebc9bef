//! # Arm Executable Parameters
//!
//! This module provide parameters for the arm executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmExecParams {
    /// Name of the CAN interface the arm is attached to
    pub can_interface: String,

    /// Path of the arm control parameter file, relative to the params directory
    pub arm_ctrl_params: String,

    /// Period between two checks of the script for pending TCs
    ///
    /// Units: seconds
    pub script_poll_period_s: f64,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
