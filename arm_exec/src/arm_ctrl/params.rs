//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
///
/// Every field has a default so a parameter file only needs to list the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    // ---- DISPATCH ----
    /// Period between two dispatcher ticks.
    ///
    /// Units: seconds
    pub dispatch_period_s: f64,

    /// Number of active ticks between two diagnostic status reads. Zero disables diagnostics.
    pub diag_interval_ticks: u64,

    // ---- MODE SEQUENCING ----
    /// Time given to the dispatcher to notice standby before the arm is touched.
    ///
    /// Units: seconds
    pub standby_settle_s: f64,

    /// Wait after clearing fault flags.
    ///
    /// Units: seconds
    pub clear_faults_settle_s: f64,

    /// Interval between enable commands while waiting for the axes to enable.
    ///
    /// Units: seconds
    pub enable_poll_s: f64,

    /// Maximum time to wait for every axis to report enabled.
    ///
    /// Units: seconds
    pub enable_timeout_s: f64,

    /// Delay before re-reading joints which all came back as exactly zero.
    ///
    /// Units: seconds
    pub stale_read_retry_s: f64,

    /// Interval between control status reads while waiting for CAN control.
    ///
    /// Units: seconds
    pub mode_confirm_poll_s: f64,

    /// Maximum time to wait for the arm to report CAN control.
    ///
    /// Units: seconds
    pub mode_confirm_timeout_s: f64,

    /// What to do with the dispatcher when the arm doesn't respond in time.
    pub timeout_policy: TimeoutPolicy,

    /// Wait between enabling the axes on connection and reading the first telemetry.
    ///
    /// Units: seconds
    pub connect_settle_s: f64,

    /// Wait after an emergency stop before the targets are resynchronised.
    ///
    /// Units: seconds
    pub estop_settle_s: f64,

    // ---- MOTION ----
    /// Speed used when entering CAN control.
    ///
    /// Units: percent of maximum
    pub safe_speed_pct: u8,

    /// Speed used before any command sets one.
    ///
    /// Units: percent of maximum
    pub default_speed_pct: u8,

    /// Gripper effort used before any command sets one.
    pub gripper_effort: u16,

    // ---- GRIPPER RECOVERY ----
    /// Number of clear-fault commands sent to the gripper when entering CAN control.
    pub gripper_clear_count: usize,

    /// Number of enable commands sent to the gripper after clearing it.
    pub gripper_enable_count: usize,

    /// Delay between two gripper recovery commands.
    ///
    /// Units: seconds
    pub gripper_cmd_delay_s: f64,

    // ---- INVERSE KINEMATICS ----
    pub ik: IkParams,
}

/// Parameters of the inverse kinematics solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkParams {
    /// Maximum number of iterations of a single solve.
    pub max_iter: usize,

    /// Position tolerance for convergence.
    ///
    /// Units: millimetres
    pub pos_tol_mm: f64,

    /// Orientation tolerance for convergence.
    ///
    /// Units: degrees
    pub rot_tol_deg: f64,

    /// Gain applied to the Jacobian transpose update.
    pub step_size: f64,

    /// Joint perturbation used for the finite difference Jacobian.
    ///
    /// Units: radians
    pub perturbation_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Behaviour when the arm fails to confirm a mode change in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    /// Resume dispatching anyway and report the failure.
    FailOpen,

    /// Leave the dispatcher in standby and report the failure.
    FailClosed,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            dispatch_period_s: 0.02,
            diag_interval_ticks: 50,
            standby_settle_s: 0.1,
            clear_faults_settle_s: 0.05,
            enable_poll_s: 0.05,
            enable_timeout_s: 2.0,
            stale_read_retry_s: 0.05,
            mode_confirm_poll_s: 0.02,
            mode_confirm_timeout_s: 1.0,
            timeout_policy: TimeoutPolicy::FailOpen,
            connect_settle_s: 1.0,
            estop_settle_s: 0.05,
            safe_speed_pct: 20,
            default_speed_pct: 50,
            gripper_effort: 1000,
            gripper_clear_count: 3,
            gripper_enable_count: 5,
            gripper_cmd_delay_s: 0.01,
            ik: IkParams::default(),
        }
    }
}

impl Default for IkParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            pos_tol_mm: 0.001,
            rot_tol_deg: 1.0,
            step_size: 5e-4,
            perturbation_rad: 1e-4,
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::FailOpen
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a parameter in seconds to a duration.
///
/// Negative, NaN or infinite values give a zero duration, values too large for a `Duration` are
/// saturated to [`Duration::MAX`].
pub fn secs(s: f64) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)
    } else {
        Duration::from_secs(0)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
