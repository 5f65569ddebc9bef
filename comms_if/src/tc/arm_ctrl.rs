//! # Arm control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::eqpt::arm::NUM_AXES;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A motion target update that can be completed by arm control.
///
/// Speeds are a percentage of the arm's maximum, values above 100 are clamped. If no speed is
/// given, or the speed is 0, the current speed is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ArmCmd {
    /// Move each joint to the given angle.
    Joints {
        /// Joint angles in degrees.
        joints_deg: [f64; NUM_AXES],

        speed_pct: Option<u8>,
    },

    /// Move the end effector to the given pose, the arm chooses the path.
    Pose {
        /// `[x, y, z, rx, ry, rz]` in millimetres and degrees (ZYX Euler angles).
        pose: [f64; NUM_AXES],

        speed_pct: Option<u8>,
    },

    /// Move the end effector to the given pose in a straight line.
    Linear {
        /// `[x, y, z, rx, ry, rz]` in millimetres and degrees (ZYX Euler angles).
        pose: [f64; NUM_AXES],

        speed_pct: Option<u8>,
    },

    /// Open or close the gripper.
    Gripper {
        /// Opening of the gripper jaws in millimetres.
        aperture_mm: f64,

        effort: Option<u16>,
    },
}
