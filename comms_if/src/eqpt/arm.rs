//! # Arm Equipment Interface
//!
//! Defines the boundary between the arm control software and the vendor motor/CAN driver. The
//! driver itself is not part of this workspace, anything that can move a 6 axis arm implements
//! [`MotionDriver`].
//!
//! All values crossing this boundary are fixed point integers at 1000x the engineering unit:
//!
//! | Quantity        | Engineering unit | Device unit   |
//! |-----------------|------------------|---------------|
//! | Joint angle     | degrees          | millidegrees  |
//! | Position        | millimetres      | micrometres   |
//! | Rotation        | degrees          | millidegrees  |
//! | Gripper opening | millimetres      | micrometres   |

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of axes on the arm.
pub const NUM_AXES: usize = 6;

/// Scale between engineering units and device units.
pub const DEVICE_UNITS_PER_ENG_UNIT: f64 = 1000.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Commands and telemetry offered by the arm's motion driver.
///
/// Implementations are expected to be internally synchronised, the control software shares one
/// driver between the dispatcher thread and the mode controller.
pub trait MotionDriver: Send + Sync {
    /// Open the connection to the arm.
    fn connect(&self) -> Result<(), DriverError>;

    /// Enable (or disable) the axes selected by `mask`.
    fn set_enable(&self, mask: AxisMask, enable: bool) -> Result<(), DriverError>;

    /// Clear any latched fault flags on the arm.
    fn clear_faults(&self) -> Result<(), DriverError>;

    /// Trigger or release the emergency stop.
    fn set_emergency_stop(&self, action: EmergencyStop) -> Result<(), DriverError>;

    /// Set the control parameters. `reserved` must be zero.
    fn set_motion_params(
        &self,
        ctrl_mode: CtrlMode,
        move_mode: MoveMode,
        speed_pct: u8,
        reserved: u8,
    ) -> Result<(), DriverError>;

    /// Command joint positions.
    ///
    /// Units: millidegrees
    fn set_joint_targets(&self, joints_mdeg: [i32; NUM_AXES]) -> Result<(), DriverError>;

    /// Command an end effector pose, `[x, y, z, rx, ry, rz]`.
    ///
    /// Units: micrometres for position, millidegrees for rotation
    fn set_pose_target(&self, pose: [i32; NUM_AXES]) -> Result<(), DriverError>;

    /// Command the gripper. `reserved` must be zero.
    ///
    /// Units: micrometres for `aperture_um`
    fn set_gripper(
        &self,
        aperture_um: i32,
        effort: u16,
        code: GripperCode,
        reserved: u8,
    ) -> Result<(), DriverError>;

    /// Latest joint positions reported by the arm.
    ///
    /// Units: millidegrees
    fn read_joint_state(&self) -> Result<[i32; NUM_AXES], DriverError>;

    /// Latest end effector pose reported by the arm, `[x, y, z, rx, ry, rz]`.
    ///
    /// Units: micrometres for position, millidegrees for rotation
    fn read_pose_state(&self) -> Result<[i32; NUM_AXES], DriverError>;

    /// Latest gripper opening reported by the arm.
    ///
    /// Units: micrometres
    fn read_gripper_state(&self) -> Result<i32, DriverError>;

    /// Per-axis driver flags.
    fn read_low_level_status(&self) -> Result<LowLevelStatus, DriverError>;

    /// Control mode and status reported by the arm.
    fn read_control_status(&self) -> Result<ControlStatus, DriverError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Control mode reported by (or commanded to) the arm.
///
/// The arm may report values this software has no name for, so this is an integer rather than
/// an enum.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtrlMode(pub u8);

/// Overall arm status word.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmStatus(pub u8);

/// Selection of axes for enable/disable commands.
///
/// `1..=6` select a single axis, [`AxisMask::ALL`] selects every axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisMask(pub u8);

/// Flags of a single axis driver.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisFlags {
    pub enabled: bool,
    pub fault: bool,
}

/// Low level status of all axis drivers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowLevelStatus {
    pub axes: [AxisFlags; NUM_AXES],
}

/// Control status of the arm.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStatus {
    pub ctrl_mode: CtrlMode,
    pub arm_status: ArmStatus,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Motion mode, selects how the arm interprets the motion command.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveMode {
    /// Point-to-point move to a Cartesian pose.
    Pose = 0x00,

    /// Joint space move.
    Joint = 0x01,

    /// Straight line Cartesian move.
    Linear = 0x02,
}

/// Gripper command codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GripperCode {
    Disable = 0x00,
    Enable = 0x01,
    DisableClearFault = 0x02,
    EnableClearFault = 0x03,
}

/// Emergency stop actions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EmergencyStop {
    Stop = 0x01,
    Resume = 0x02,
}

/// Errors raised by a motion driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("Could not open the arm on {interface}: {reason}")]
    ConnectFailed { interface: String, reason: String },

    #[error("The driver is not connected to the arm")]
    NotConnected,

    #[error("Could not send the {0} command: {1}")]
    SendFailed(&'static str, String),

    #[error("No {0} feedback has been received from the arm")]
    NoFeedback(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlMode {
    pub const STANDBY: Self = Self(0x00);
    pub const CAN_CTRL: Self = Self(0x01);
    pub const TEACH: Self = Self(0x02);
    pub const ETHERNET: Self = Self(0x03);
    pub const WIFI: Self = Self(0x04);
    pub const REMOTE: Self = Self(0x05);
    pub const LINKAGE_TEACH: Self = Self(0x06);
    pub const OFFLINE_TRAJ: Self = Self(0x07);
}

impl ArmStatus {
    pub const NORMAL: Self = Self(0x00);
    pub const EMERGENCY_STOP: Self = Self(0x01);
    pub const NO_SOLUTION: Self = Self(0x02);
    pub const SINGULARITY: Self = Self(0x03);
    pub const ANGLE_LIMIT: Self = Self(0x04);
    pub const JOINT_COMMS_ERROR: Self = Self(0x05);
    pub const BRAKE_ENGAGED: Self = Self(0x06);
    pub const COLLISION: Self = Self(0x07);
    pub const TEACH_OVERSPEED: Self = Self(0x08);
    pub const JOINT_STATUS_ERROR: Self = Self(0x09);
    pub const OTHER_ERROR: Self = Self(0x0A);
}

impl AxisMask {
    /// Every axis of the arm.
    pub const ALL: Self = Self(0x07);

    /// Select a single axis, `index` starts at zero.
    pub fn axis(index: usize) -> Option<Self> {
        if index < NUM_AXES {
            Some(Self(index as u8 + 1))
        } else {
            None
        }
    }

    /// Returns true if the mask selects the axis at `index`.
    pub fn contains(&self, index: usize) -> bool {
        *self == Self::ALL || (index < NUM_AXES && self.0 as usize == index + 1)
    }
}

impl LowLevelStatus {
    /// True if every axis driver reports enabled.
    pub fn all_enabled(&self) -> bool {
        self.axes.iter().all(|a| a.enabled)
    }

    /// True if any axis driver reports a fault.
    pub fn any_fault(&self) -> bool {
        self.axes.iter().any(|a| a.fault)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert an engineering value (mm or degrees) into device units.
///
/// Values outside the device range saturate to `i32::MIN` or `i32::MAX`, NaN becomes zero. Either
/// case is logged.
pub fn to_device_units(value: f64) -> i32 {
    let scaled = (value * DEVICE_UNITS_PER_ENG_UNIT).round();

    if scaled.is_nan() || scaled > i32::MAX as f64 || scaled < i32::MIN as f64 {
        warn!("{} is outside the device unit range, saturating", value);
    }

    scaled as i32
}

/// Convert a device value into engineering units (mm or degrees).
pub fn to_engineering(value: i32) -> f64 {
    value as f64 / DEVICE_UNITS_PER_ENG_UNIT
}

/// Convert a full axis array into device units.
pub fn array_to_device_units(values: &[f64; NUM_AXES]) -> [i32; NUM_AXES] {
    let mut out = [0i32; NUM_AXES];
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = to_device_units(*v);
    }
    out
}

/// Convert a full axis array into engineering units.
pub fn array_to_engineering(values: &[i32; NUM_AXES]) -> [f64; NUM_AXES] {
    let mut out = [0f64; NUM_AXES];
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = to_engineering(*v);
    }
    out
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
