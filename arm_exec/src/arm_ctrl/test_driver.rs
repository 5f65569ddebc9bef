//! Recording stub driver for the arm control tests

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use comms_if::eqpt::arm::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Stub [`MotionDriver`] which records every call and answers from configurable state.
pub struct RecordingDriver {
    calls: Mutex<Vec<Call>>,
    state: Mutex<StubState>,
    on_params: Mutex<Option<Box<dyn Fn() + Send>>>,
}

struct StubState {
    enable: EnableBehaviour,
    enable_cmds: usize,
    confirms_mode: bool,
    can_ctrl_requested: bool,
    joint_reads: VecDeque<[i32; NUM_AXES]>,
    joints: [i32; NUM_AXES],
    pose: [i32; NUM_AXES],
    gripper: i32,
    fail_connect: bool,
    fail_motion: bool,
    fail_status: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A call made on the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    SetEnable(AxisMask, bool),
    ClearFaults,
    EmergencyStop(EmergencyStop),
    MotionParams(CtrlMode, MoveMode, u8),
    JointTargets([i32; NUM_AXES]),
    PoseTarget([i32; NUM_AXES]),
    Gripper(i32, u16, GripperCode),
    ReadJoints,
    ReadPose,
    ReadGripper,
    ReadLowLevel,
    ReadControl,
}

/// How the stub's axes respond to enable commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnableBehaviour {
    /// Every axis reports enabled from the start.
    AlreadyEnabled,

    /// The axes report enabled once this many enable commands have been received.
    EnablesAfter(usize),

    /// The axes never report enabled.
    Never,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RecordingDriver {
    pub fn new(enable: EnableBehaviour) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(StubState {
                enable,
                enable_cmds: 0,
                confirms_mode: true,
                can_ctrl_requested: false,
                joint_reads: VecDeque::new(),
                joints: [0; NUM_AXES],
                pose: [0; NUM_AXES],
                gripper: 0,
                fail_connect: false,
                fail_motion: false,
                fail_status: false,
            }),
            on_params: Mutex::new(None),
        }
    }

    /// Whether the stub reports CAN control once it has been requested.
    pub fn confirms_mode(self, confirms: bool) -> Self {
        self.state().confirms_mode = confirms;
        self
    }

    /// Telemetry returned by the read functions.
    pub fn with_telemetry(self, joints: [i32; NUM_AXES], pose: [i32; NUM_AXES], gripper: i32) -> Self {
        {
            let mut s = self.state();
            s.joints = joints;
            s.pose = pose;
            s.gripper = gripper;
        }
        self
    }

    /// Joint reads returned, in order, before falling back to the telemetry joints.
    pub fn with_joint_reads(self, reads: Vec<[i32; NUM_AXES]>) -> Self {
        self.state().joint_reads = reads.into();
        self
    }

    pub fn fail_connect(self) -> Self {
        self.state().fail_connect = true;
        self
    }

    /// Make the motion commands fail (or succeed again).
    pub fn set_fail_motion(&self, fail: bool) {
        self.state().fail_motion = fail;
    }

    /// Make the status reads fail.
    pub fn set_fail_status(&self, fail: bool) {
        self.state().fail_status = fail;
    }

    /// Run `hook` every time the motion parameters are set.
    pub fn on_params<F: Fn() + Send + 'static>(&self, hook: F) {
        *lock(&self.on_params) = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count<P: Fn(&Call) -> bool>(&self, pred: P) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        lock(&self.state)
    }

    fn check_motion(&self, name: &'static str) -> Result<(), DriverError> {
        if self.state().fail_motion {
            Err(DriverError::SendFailed(name, "injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl MotionDriver for RecordingDriver {
    fn connect(&self) -> Result<(), DriverError> {
        self.record(Call::Connect);
        if self.state().fail_connect {
            Err(DriverError::ConnectFailed {
                interface: "stub".into(),
                reason: "injected failure".into(),
            })
        } else {
            Ok(())
        }
    }

    fn set_enable(&self, mask: AxisMask, enable: bool) -> Result<(), DriverError> {
        self.record(Call::SetEnable(mask, enable));
        if enable {
            self.state().enable_cmds += 1;
        }
        Ok(())
    }

    fn clear_faults(&self) -> Result<(), DriverError> {
        self.record(Call::ClearFaults);
        Ok(())
    }

    fn set_emergency_stop(&self, action: EmergencyStop) -> Result<(), DriverError> {
        self.record(Call::EmergencyStop(action));
        Ok(())
    }

    fn set_motion_params(
        &self,
        ctrl_mode: CtrlMode,
        move_mode: MoveMode,
        speed_pct: u8,
        _reserved: u8,
    ) -> Result<(), DriverError> {
        self.record(Call::MotionParams(ctrl_mode, move_mode, speed_pct));
        self.check_motion("motion params")?;

        if ctrl_mode == CtrlMode::CAN_CTRL {
            self.state().can_ctrl_requested = true;
        }

        if let Some(hook) = lock(&self.on_params).as_ref() {
            hook();
        }

        Ok(())
    }

    fn set_joint_targets(&self, joints_mdeg: [i32; NUM_AXES]) -> Result<(), DriverError> {
        self.record(Call::JointTargets(joints_mdeg));
        self.check_motion("joint targets")
    }

    fn set_pose_target(&self, pose: [i32; NUM_AXES]) -> Result<(), DriverError> {
        self.record(Call::PoseTarget(pose));
        self.check_motion("pose target")
    }

    fn set_gripper(
        &self,
        aperture_um: i32,
        effort: u16,
        code: GripperCode,
        _reserved: u8,
    ) -> Result<(), DriverError> {
        self.record(Call::Gripper(aperture_um, effort, code));
        self.check_motion("gripper")
    }

    fn read_joint_state(&self) -> Result<[i32; NUM_AXES], DriverError> {
        self.record(Call::ReadJoints);
        let mut s = self.state();
        Ok(match s.joint_reads.pop_front() {
            Some(j) => j,
            None => s.joints,
        })
    }

    fn read_pose_state(&self) -> Result<[i32; NUM_AXES], DriverError> {
        self.record(Call::ReadPose);
        Ok(self.state().pose)
    }

    fn read_gripper_state(&self) -> Result<i32, DriverError> {
        self.record(Call::ReadGripper);
        Ok(self.state().gripper)
    }

    fn read_low_level_status(&self) -> Result<LowLevelStatus, DriverError> {
        self.record(Call::ReadLowLevel);
        let s = self.state();
        let enabled = match s.enable {
            EnableBehaviour::AlreadyEnabled => true,
            EnableBehaviour::EnablesAfter(n) => s.enable_cmds >= n,
            EnableBehaviour::Never => false,
        };

        let mut status = LowLevelStatus::default();
        for a in status.axes.iter_mut() {
            a.enabled = enabled;
        }
        Ok(status)
    }

    fn read_control_status(&self) -> Result<ControlStatus, DriverError> {
        self.record(Call::ReadControl);
        let s = self.state();
        if s.fail_status {
            return Err(DriverError::NoFeedback("control status"));
        }

        Ok(ControlStatus {
            ctrl_mode: if s.confirms_mode && s.can_ctrl_requested {
                CtrlMode::CAN_CTRL
            } else {
                CtrlMode::STANDBY
            },
            arm_status: ArmStatus::NORMAL,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(e) => e.into_inner(),
    }
}
