//! # Arm control module
//!
//! Drives the 6 axis arm through a [`MotionDriver`](comms_if::eqpt::arm::MotionDriver). The
//! module is split into:
//!
//! - [`TargetStore`] - the shared joint/pose/gripper targets and motion configuration,
//! - [`ModeController`] - sequences the arm between standby and CAN control,
//! - [`Dispatcher`] - streams the targets to the arm at a fixed rate,
//! - [`IkSolver`] - converts Cartesian poses into joint angles,
//! - [`ArmCtrl`] - ties the above together for the executable.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod dispatcher;
mod inverse_kinematics;
mod mode_ctrl;
mod params;
mod state;
mod target_store;

#[cfg(test)]
pub(crate) mod test_driver;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use comms_if::eqpt::arm::{
    array_to_device_units, array_to_engineering, CtrlMode, DriverError, NUM_AXES,
};
use util::maths;

pub use dispatcher::*;
pub use inverse_kinematics::*;
pub use mode_ctrl::*;
pub use params::*;
pub use state::*;
pub use target_store::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of joints on the arm.
pub const NUM_JOINTS: usize = NUM_AXES;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Joint angles of the arm, base first.
///
/// Units: degrees
pub type JointVector = [f64; NUM_JOINTS];

/// Position and orientation of a frame on the arm, relative to the arm's base.
///
/// The orientation is given as ZYX Euler angles, i.e. the frame is rotated by `rz_deg` about Z,
/// then `ry_deg` about the new Y, then `rx_deg` about the new X.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPose {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
    pub rx_deg: f64,
    pub ry_deg: f64,
    pub rz_deg: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Could not connect to the arm: {0}")]
    Connection(DriverError),

    #[error("The arm is not connected")]
    NotConnected,

    #[error("The axes did not report enabled after {0:?}")]
    EnableTimeout(Duration),

    #[error("The arm did not confirm CAN control, last reported mode was {last_mode:?}")]
    ModeSwitchTimeout { last_mode: Option<CtrlMode> },

    #[error("Arm driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Could not start the dispatcher thread: {0}")]
    DispatcherSpawn(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrlError {
    /// True for errors caused by the arm not responding in time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ArmCtrlError::EnableTimeout(_) | ArmCtrlError::ModeSwitchTimeout { .. }
        )
    }
}

impl CartesianPose {
    /// Build a pose from `[x, y, z, rx, ry, rz]`.
    pub fn from_array(a: &[f64; NUM_AXES]) -> Self {
        Self {
            x_mm: a[0],
            y_mm: a[1],
            z_mm: a[2],
            rx_deg: a[3],
            ry_deg: a[4],
            rz_deg: a[5],
        }
    }

    /// The pose as `[x, y, z, rx, ry, rz]`.
    pub fn to_array(&self) -> [f64; NUM_AXES] {
        [
            self.x_mm,
            self.y_mm,
            self.z_mm,
            self.rx_deg,
            self.ry_deg,
            self.rz_deg,
        ]
    }

    /// Build a pose from the driver's fixed point representation.
    pub fn from_device(d: &[i32; NUM_AXES]) -> Self {
        Self::from_array(&array_to_engineering(d))
    }

    /// The pose in the driver's fixed point representation.
    pub fn to_device(&self) -> [i32; NUM_AXES] {
        array_to_device_units(&self.to_array())
    }

    /// Position of the frame.
    ///
    /// Units: millimetres
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x_mm, self.y_mm, self.z_mm)
    }

    /// Orientation of the frame as a unit quaternion.
    pub fn orientation(&self) -> Quaternion<f64> {
        maths::quat_from_euler(
            self.rx_deg.to_radians(),
            self.ry_deg.to_radians(),
            self.rz_deg.to_radians(),
        )
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pose_conversions() {
        let pose = CartesianPose::from_array(&[150.0, -20.5, 300.25, 180.0, -2.5, 90.0]);

        assert_eq!(pose.y_mm, -20.5);
        assert_eq!(pose.rz_deg, 90.0);
        assert_eq!(
            pose.to_device(),
            [150_000, -20_500, 300_250, 180_000, -2_500, 90_000]
        );
        assert_eq!(CartesianPose::from_device(&pose.to_device()), pose);
        assert_eq!(pose.position(), Vector3::new(150.0, -20.5, 300.25));
    }

    #[test]
    fn test_pose_orientation() {
        let pose = CartesianPose {
            rz_deg: 90.0,
            ..Default::default()
        };
        let h = std::f64::consts::FRAC_1_SQRT_2;

        assert_abs_diff_eq!(
            pose.orientation(),
            Quaternion::new(h, 0.0, 0.0, h),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_timeout_errors() {
        assert!(ArmCtrlError::EnableTimeout(Duration::from_secs(2)).is_timeout());
        assert!(ArmCtrlError::ModeSwitchTimeout { last_mode: None }.is_timeout());
        assert!(!ArmCtrlError::NotConnected.is_timeout());
        assert!(!ArmCtrlError::Driver(DriverError::NotConnected).is_timeout());
    }
}
