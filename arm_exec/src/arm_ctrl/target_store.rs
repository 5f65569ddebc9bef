//! Shared motion targets
//!
//! The store is written by the target setters and the mode controller, and read by the dispatcher
//! every tick. All access goes through a single mutex which is only ever held long enough to copy
//! or update the values, never across a driver call.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

// Internal
use super::{CartesianPose, JointVector, Params, NUM_JOINTS};
use comms_if::eqpt::arm::{CtrlMode, GripperCode, MoveMode};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Highest speed the arm accepts.
///
/// Units: percent of maximum
pub const MAX_SPEED_PCT: u8 = 100;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The motion configuration sent with every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub ctrl_mode: CtrlMode,
    pub move_mode: MoveMode,

    /// Units: percent of maximum
    pub speed_pct: u8,

    pub gripper_code: GripperCode,
    pub gripper_effort: u16,
}

/// Everything the dispatcher needs for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionTarget {
    /// Whether the dispatcher should be streaming.
    pub mode: ControlMode,

    /// Whether a connection to the arm exists.
    pub connected: bool,

    /// Units: degrees
    pub joints_deg: JointVector,

    pub pose: CartesianPose,

    /// Gripper jaw opening.
    ///
    /// Units: micrometres
    pub gripper_um: i32,

    pub config: MotionConfig,
}

/// Mutex guarded [`MotionTarget`].
#[derive(Debug)]
pub struct TargetStore {
    inner: Mutex<MotionTarget>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Dispatching mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Nothing is sent to the arm.
    Standby,

    /// The targets are streamed to the arm every tick.
    CanControl,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionConfig {
    /// Configuration used before any target has been set.
    pub fn initial(params: &Params) -> Self {
        Self {
            ctrl_mode: CtrlMode::CAN_CTRL,
            move_mode: MoveMode::Joint,
            speed_pct: clamp_speed(params.default_speed_pct),
            gripper_code: GripperCode::Enable,
            gripper_effort: params.gripper_effort,
        }
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::Standby
    }
}

impl TargetStore {
    /// Create a new store in standby, disconnected, with zero targets.
    pub fn new(config: MotionConfig) -> Self {
        Self {
            inner: Mutex::new(MotionTarget {
                mode: ControlMode::Standby,
                connected: false,
                joints_deg: [0.0; NUM_JOINTS],
                pose: CartesianPose::default(),
                gripper_um: 0,
                config,
            }),
        }
    }

    /// Copy of the current contents of the store.
    pub fn snapshot(&self) -> MotionTarget {
        *self.lock()
    }

    /// Current dispatching mode.
    pub fn mode(&self) -> ControlMode {
        self.lock().mode
    }

    /// Set the dispatching mode, returning the previous one.
    pub fn set_mode(&self, mode: ControlMode) -> ControlMode {
        std::mem::replace(&mut self.lock().mode, mode)
    }

    /// Whether a connection to the arm exists.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Set a joint space target.
    ///
    /// A speed of `None` or `Some(0)` keeps the current speed.
    pub fn set_joints(&self, joints_deg: JointVector, speed_pct: Option<u8>) {
        let mut t = self.lock();
        t.joints_deg = joints_deg;
        t.config.move_mode = MoveMode::Joint;
        if let Some(s) = requested_speed(speed_pct) {
            t.config.speed_pct = s;
        }
    }

    /// Set a Cartesian target, `move_mode` selects point to point (`Pose`) or straight line
    /// (`Linear`) motion.
    pub fn set_pose(&self, pose: CartesianPose, move_mode: MoveMode, speed_pct: Option<u8>) {
        let mut t = self.lock();
        t.pose = pose;
        t.config.move_mode = move_mode;
        if let Some(s) = requested_speed(speed_pct) {
            t.config.speed_pct = s;
        }
    }

    /// Set the gripper target, this also (re)enables the gripper.
    pub fn set_gripper(&self, aperture_um: i32, effort: Option<u16>) {
        let mut t = self.lock();
        t.gripper_um = aperture_um;
        t.config.gripper_code = GripperCode::Enable;
        if let Some(e) = effort {
            t.config.gripper_effort = e;
        }
    }

    /// Overwrite all targets with values read from the arm, so that resuming dispatch doesn't make
    /// the arm jump.
    pub fn resync(&self, joints_deg: JointVector, pose: CartesianPose, gripper_um: i32) {
        let mut t = self.lock();
        t.joints_deg = joints_deg;
        t.pose = pose;
        t.gripper_um = gripper_um;
    }

    /// Overwrite only the joint target.
    pub fn resync_joints(&self, joints_deg: JointVector) {
        self.lock().joints_deg = joints_deg;
    }

    /// Put the configuration back into CAN control, joint mode, at the given speed. The gripper
    /// settings are left untouched.
    pub fn reset_config(&self, speed_pct: u8) {
        let mut t = self.lock();
        t.config.ctrl_mode = CtrlMode::CAN_CTRL;
        t.config.move_mode = MoveMode::Joint;
        t.config.speed_pct = clamp_speed(speed_pct);
    }

    /// Apply an arbitrary update under the lock.
    pub fn update<R, F: FnOnce(&mut MotionTarget) -> R>(&self, f: F) -> R {
        f(&mut self.lock())
    }

    /// Lock the store. A panic while holding the lock can't leave the plain data inside in a bad
    /// state, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, MotionTarget> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn clamp_speed(speed_pct: u8) -> u8 {
    speed_pct.min(MAX_SPEED_PCT)
}

/// The speed a setter should apply, zero means "unchanged".
fn requested_speed(speed_pct: Option<u8>) -> Option<u8> {
    speed_pct.filter(|s| *s > 0).map(clamp_speed)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn store() -> TargetStore {
        TargetStore::new(MotionConfig::initial(&Params::default()))
    }

    #[test]
    fn test_initial_state() {
        let s = store().snapshot();

        assert_eq!(s.mode, ControlMode::Standby);
        assert!(!s.connected);
        assert_eq!(s.joints_deg, [0.0; NUM_JOINTS]);
        assert_eq!(s.config.ctrl_mode, CtrlMode::CAN_CTRL);
        assert_eq!(s.config.move_mode, MoveMode::Joint);
        assert_eq!(s.config.speed_pct, 50);
        assert_eq!(s.config.gripper_effort, 1000);
    }

    #[test]
    fn test_setters() {
        let s = store();
        let pose = CartesianPose::from_array(&[100.0, 0.0, 250.0, 180.0, 0.0, 0.0]);

        s.set_pose(pose, MoveMode::Linear, Some(30));
        let t = s.snapshot();
        assert_eq!(t.pose, pose);
        assert_eq!(t.config.move_mode, MoveMode::Linear);
        assert_eq!(t.config.speed_pct, 30);

        // No speed keeps the previous one, too fast is clamped
        s.set_joints([1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None);
        assert_eq!(s.snapshot().config.speed_pct, 30);
        assert_eq!(s.snapshot().config.move_mode, MoveMode::Joint);
        s.set_joints([0.0; NUM_JOINTS], Some(250));
        assert_eq!(s.snapshot().config.speed_pct, MAX_SPEED_PCT);

        // Zero is not a speed, the previous one is kept
        s.set_pose(pose, MoveMode::Pose, Some(40));
        s.set_pose(pose, MoveMode::Linear, Some(0));
        assert_eq!(s.snapshot().config.speed_pct, 40);
        assert_eq!(s.snapshot().config.move_mode, MoveMode::Linear);
        s.set_joints([0.0; NUM_JOINTS], Some(0));
        assert_eq!(s.snapshot().config.speed_pct, 40);

        s.update(|t| t.config.gripper_code = GripperCode::Disable);
        s.set_gripper(35_000, Some(500));
        let t = s.snapshot();
        assert_eq!(t.gripper_um, 35_000);
        assert_eq!(t.config.gripper_code, GripperCode::Enable);
        assert_eq!(t.config.gripper_effort, 500);
    }

    #[test]
    fn test_resync_and_reset() {
        let s = store();
        s.set_pose(CartesianPose::default(), MoveMode::Pose, Some(90));

        let pose = CartesianPose::from_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        s.resync([10.0; NUM_JOINTS], pose, 12_000);
        s.resync_joints([11.0; NUM_JOINTS]);
        s.reset_config(20);

        let t = s.snapshot();
        assert_eq!(t.joints_deg, [11.0; NUM_JOINTS]);
        assert_eq!(t.pose, pose);
        assert_eq!(t.gripper_um, 12_000);
        assert_eq!(t.config.move_mode, MoveMode::Joint);
        assert_eq!(t.config.speed_pct, 20);
        assert_eq!(t.config.ctrl_mode, CtrlMode::CAN_CTRL);
    }

    #[test]
    fn test_mode() {
        let s = store();

        assert_eq!(s.set_mode(ControlMode::CanControl), ControlMode::Standby);
        assert_eq!(s.mode(), ControlMode::CanControl);
        assert_eq!(s.set_mode(ControlMode::Standby), ControlMode::CanControl);

        s.set_connected(true);
        assert!(s.is_connected());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let s = Arc::new(store());
        let s_clone = s.clone();

        let res = thread::spawn(move || {
            s_clone.update(|t| {
                t.gripper_um = 7;
                panic!("panic while holding the store");
            })
        })
        .join();

        assert!(res.is_err());
        assert_eq!(s.snapshot().gripper_um, 7);
    }
}
