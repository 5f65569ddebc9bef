//! Mode sequencing of the arm
//!
//! The mode controller is responsible for moving the arm from standby into CAN control without
//! making it jump. The dispatcher is parked while the sequence runs, and is always released again
//! (subject to the [`TimeoutPolicy`]) once the sequence ends, whatever the outcome.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread;

// Internal
use super::{
    secs, ArmCtrlError, CartesianPose, ControlMode, JointVector, Params, TargetStore,
    TimeoutPolicy,
};
use comms_if::eqpt::arm::{
    array_to_engineering, AxisMask, CtrlMode, DriverError, EmergencyStop, GripperCode,
    MotionDriver, MoveMode,
};
use util::time::{poll_until, PollError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sequences the arm between standby and CAN control.
pub struct ModeController {
    driver: Arc<dyn MotionDriver>,
    store: Arc<TargetStore>,
    params: Params,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModeController {
    pub fn new(driver: Arc<dyn MotionDriver>, store: Arc<TargetStore>, params: Params) -> Self {
        Self {
            driver,
            store,
            params,
        }
    }

    /// Move the arm into CAN control.
    ///
    /// The dispatcher is parked in standby for the whole sequence. When the sequence ends the
    /// dispatcher is resumed in CAN control, unless the arm failed to respond in time and the
    /// timeout policy is [`TimeoutPolicy::FailClosed`], in which case it stays in standby.
    pub fn enable_can_mode(&self) -> Result<(), ArmCtrlError> {
        info!("Enabling CAN control");

        self.store.set_mode(ControlMode::Standby);
        thread::sleep(secs(self.params.standby_settle_s));

        let result = self.enable_sequence();

        match result {
            Ok(()) => info!("Arm confirmed CAN control"),
            Err(ref e) if e.is_timeout() && self.params.timeout_policy == TimeoutPolicy::FailClosed => {
                self.store.set_mode(ControlMode::Standby);
                error!("Could not enable CAN control ({}), dispatcher left in standby", e);
            }
            Err(ref e) => {
                self.store.set_mode(ControlMode::CanControl);
                warn!("Could not enable CAN control ({}), dispatcher resumed anyway", e);
            }
        }

        result
    }

    /// Emergency stop the arm, then make it hold its current position.
    ///
    /// The dispatcher is parked while the arm stops and the targets are resynchronised, then
    /// returned to whichever mode it was in before.
    pub fn stop(&self) -> Result<(), ArmCtrlError> {
        info!("Stopping the arm");

        let prev_mode = self.store.set_mode(ControlMode::Standby);

        let result = self.stop_sequence();

        self.store.set_mode(prev_mode);

        match result {
            Ok(()) => info!("Arm stopped"),
            Err(ref e) => error!("Error while stopping the arm: {}", e),
        }

        result
    }

    /// Overwrite the targets with the arm's current joints, pose and gripper opening.
    ///
    /// If every joint reads exactly zero the read is assumed to be stale and is repeated once.
    pub fn sync_targets(&self) -> Result<(), ArmCtrlError> {
        let joints_deg = self.read_joints()?;
        let pose = CartesianPose::from_device(&self.driver.read_pose_state()?);
        let gripper_um = self.driver.read_gripper_state()?.abs();

        debug!(
            "Targets resynchronised: joints {:?} deg, pose {:?}, gripper {} um",
            joints_deg, pose, gripper_um
        );

        self.store.resync(joints_deg, pose, gripper_um);

        Ok(())
    }

    /// The steps of [`stop`](Self::stop) run while the dispatcher is parked.
    fn stop_sequence(&self) -> Result<(), ArmCtrlError> {
        self.driver.set_emergency_stop(EmergencyStop::Stop)?;
        thread::sleep(secs(self.params.estop_settle_s));
        self.sync_targets()?;
        self.driver.set_emergency_stop(EmergencyStop::Resume)?;
        Ok(())
    }

    /// The steps of [`enable_can_mode`](Self::enable_can_mode) run while the dispatcher is parked.
    fn enable_sequence(&self) -> Result<(), ArmCtrlError> {
        // ---- ENABLE ----

        let status = self.driver.read_low_level_status()?;

        if status.any_fault() {
            warn!("Axis faults latched before enabling: {:?}", status.axes);
        }

        if status.all_enabled() {
            debug!("All axes already enabled, clearing faults");
        } else {
            info!("Axes not enabled, clearing faults and enabling");
        }

        self.driver.clear_faults()?;
        thread::sleep(secs(self.params.clear_faults_settle_s));

        self.wait_for_enable()?;

        // ---- RESYNC ----

        self.sync_targets()?;

        // ---- MODE SWITCH ----

        self.store.reset_config(self.params.safe_speed_pct);
        let config = self.store.snapshot().config;
        self.driver.set_motion_params(
            CtrlMode::CAN_CTRL,
            MoveMode::Joint,
            config.speed_pct,
            0,
        )?;

        self.recover_gripper()?;

        // Joints may have drifted during the gripper recovery
        self.store.resync_joints(self.read_joints()?);

        // ---- RESUME ----

        self.store.set_mode(ControlMode::CanControl);

        self.confirm_can_mode()
    }

    /// Send the enable command until every axis reports enabled.
    fn wait_for_enable(&self) -> Result<(), ArmCtrlError> {
        let driver = &self.driver;

        poll_until(
            secs(self.params.enable_poll_s),
            secs(self.params.enable_timeout_s),
            || -> Result<bool, DriverError> {
                driver.set_enable(AxisMask::ALL, true)?;
                Ok(driver.read_low_level_status()?.all_enabled())
            },
        )
        .map_err(|e| match e {
            PollError::Timeout(d) => {
                error!("Axes did not enable within {:?}", d);
                ArmCtrlError::EnableTimeout(d)
            }
            PollError::Check(e) => ArmCtrlError::Driver(e),
        })
    }

    /// Poll the arm's control status until it reports CAN control.
    fn confirm_can_mode(&self) -> Result<(), ArmCtrlError> {
        let driver = &self.driver;
        let mut last_mode = None;

        let result = poll_until(
            secs(self.params.mode_confirm_poll_s),
            secs(self.params.mode_confirm_timeout_s),
            || -> Result<bool, DriverError> {
                let mode = driver.read_control_status()?.ctrl_mode;
                last_mode = Some(mode);
                Ok(mode == CtrlMode::CAN_CTRL)
            },
        );

        result.map_err(|e| match e {
            PollError::Timeout(d) => {
                warn!(
                    "Arm did not report CAN control within {:?}, last mode {:?}",
                    d, last_mode
                );
                ArmCtrlError::ModeSwitchTimeout { last_mode }
            }
            PollError::Check(e) => ArmCtrlError::Driver(e),
        })
    }

    /// Clear then re-enable the gripper, which recovers it from a latched fault.
    fn recover_gripper(&self) -> Result<(), ArmCtrlError> {
        let target = self.store.snapshot();
        let aperture_um = target.gripper_um.abs();
        let effort = self.params.gripper_effort;
        let delay = secs(self.params.gripper_cmd_delay_s);

        debug!("Recovering gripper");

        for _ in 0..self.params.gripper_clear_count {
            self.driver
                .set_gripper(aperture_um, effort, GripperCode::DisableClearFault, 0)?;
            thread::sleep(delay);
        }
        for _ in 0..self.params.gripper_enable_count {
            self.driver
                .set_gripper(aperture_um, effort, GripperCode::EnableClearFault, 0)?;
            thread::sleep(delay);
        }

        Ok(())
    }

    /// Read the joints, retrying once if the read looks stale.
    fn read_joints(&self) -> Result<JointVector, ArmCtrlError> {
        let mut joints_mdeg = self.driver.read_joint_state()?;

        if joints_mdeg.iter().all(|&j| j == 0) {
            warn!("All joints read as zero, re-reading");
            thread::sleep(secs(self.params.stale_read_retry_s));
            joints_mdeg = self.driver.read_joint_state()?;
        }

        Ok(array_to_engineering(&joints_mdeg))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
