//! # Simulated arm
//!
//! A [`MotionDriver`] which stands in for the real arm. Commands are accepted the way the arm
//! accepts them, and once the arm is enabled, in CAN control and not emergency stopped, the
//! commanded joints, pose and gripper opening are reported straight back as telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use std::sync::{Mutex, MutexGuard};

use comms_if::eqpt::arm::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated 6 axis arm.
#[derive(Debug)]
pub struct SimArm {
    interface: String,
    state: Mutex<SimState>,
}

#[derive(Debug, Default)]
struct SimState {
    connected: bool,
    low_level: LowLevelStatus,
    ctrl_mode: Option<CtrlMode>,
    estop: bool,
    joints: [i32; NUM_AXES],
    pose: [i32; NUM_AXES],
    gripper: i32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimArm {
    /// Create a new simulated arm, `interface` is only used in log messages.
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Start the simulation from the given joint angles and pose.
    pub fn with_telemetry(self, joints: [i32; NUM_AXES], pose: [i32; NUM_AXES]) -> Self {
        {
            let mut s = self.lock();
            s.joints = joints;
            s.pose = pose;
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    /// Lock the state, failing if the arm hasn't been connected.
    fn connected(&self) -> Result<MutexGuard<'_, SimState>, DriverError> {
        let s = self.lock();
        if s.connected {
            Ok(s)
        } else {
            Err(DriverError::NotConnected)
        }
    }
}

impl SimState {
    /// True if motion commands should move the arm.
    fn accepts_motion(&self) -> bool {
        !self.estop && self.ctrl_mode == Some(CtrlMode::CAN_CTRL) && self.low_level.all_enabled()
    }
}

impl MotionDriver for SimArm {
    fn connect(&self) -> Result<(), DriverError> {
        info!("Simulated arm connected on {}", self.interface);
        self.lock().connected = true;
        Ok(())
    }

    fn set_enable(&self, mask: AxisMask, enable: bool) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        for (i, axis) in s.low_level.axes.iter_mut().enumerate() {
            if mask.contains(i) {
                axis.enabled = enable;
            }
        }
        Ok(())
    }

    fn clear_faults(&self) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        for axis in s.low_level.axes.iter_mut() {
            axis.fault = false;
        }
        Ok(())
    }

    fn set_emergency_stop(&self, action: EmergencyStop) -> Result<(), DriverError> {
        debug!("Simulated arm emergency stop: {:?}", action);
        self.connected()?.estop = action == EmergencyStop::Stop;
        Ok(())
    }

    fn set_motion_params(
        &self,
        ctrl_mode: CtrlMode,
        _move_mode: MoveMode,
        _speed_pct: u8,
        _reserved: u8,
    ) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        if s.ctrl_mode != Some(ctrl_mode) {
            debug!("Simulated arm mode {:?} -> {:?}", s.ctrl_mode, ctrl_mode);
            s.ctrl_mode = Some(ctrl_mode);
        }
        Ok(())
    }

    fn set_joint_targets(&self, joints_mdeg: [i32; NUM_AXES]) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        if s.accepts_motion() {
            s.joints = joints_mdeg;
        }
        Ok(())
    }

    fn set_pose_target(&self, pose: [i32; NUM_AXES]) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        if s.accepts_motion() {
            s.pose = pose;
        }
        Ok(())
    }

    fn set_gripper(
        &self,
        aperture_um: i32,
        _effort: u16,
        code: GripperCode,
        _reserved: u8,
    ) -> Result<(), DriverError> {
        let mut s = self.connected()?;
        let enabled = matches!(code, GripperCode::Enable | GripperCode::EnableClearFault);
        if enabled && s.accepts_motion() {
            s.gripper = aperture_um;
        }
        Ok(())
    }

    fn read_joint_state(&self) -> Result<[i32; NUM_AXES], DriverError> {
        Ok(self.connected()?.joints)
    }

    fn read_pose_state(&self) -> Result<[i32; NUM_AXES], DriverError> {
        Ok(self.connected()?.pose)
    }

    fn read_gripper_state(&self) -> Result<i32, DriverError> {
        Ok(self.connected()?.gripper)
    }

    fn read_low_level_status(&self) -> Result<LowLevelStatus, DriverError> {
        Ok(self.connected()?.low_level)
    }

    fn read_control_status(&self) -> Result<ControlStatus, DriverError> {
        let s = self.connected()?;
        Ok(ControlStatus {
            ctrl_mode: s.ctrl_mode.unwrap_or(CtrlMode::STANDBY),
            arm_status: if s.estop {
                ArmStatus::EMERGENCY_STOP
            } else {
                ArmStatus::NORMAL
            },
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
