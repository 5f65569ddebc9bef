//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;

// Internal
use super::{
    secs, ArmCtrlError, CartesianPose, ControlMode, Dispatcher, ForwardKinematics, IkSolver,
    JointVector, ModeController, MotionConfig, MotionTarget, Params, SolveResult, TargetStore,
};
use comms_if::eqpt::arm::{
    array_to_engineering, to_device_units, to_engineering, ArmStatus, AxisMask, ControlStatus,
    CtrlMode, MotionDriver, MoveMode,
};
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state
pub struct ArmCtrl {
    params: Params,

    driver: Arc<dyn MotionDriver>,

    store: Arc<TargetStore>,

    mode_ctrl: ModeController,

    dispatcher: Option<Dispatcher>,
}

/// Snapshot of the arm's telemetry, in engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    /// Units: degrees
    pub joints_deg: JointVector,

    pub pose: CartesianPose,

    /// Units: millimetres
    pub gripper_mm: f64,

    pub ctrl_mode: CtrlMode,

    pub arm_status: ArmStatus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Create a new controller around the given driver. Nothing is sent to the arm until
    /// [`connect`](Self::connect) is called.
    pub fn new(driver: Arc<dyn MotionDriver>, params: Params) -> Self {
        let store = Arc::new(TargetStore::new(MotionConfig::initial(&params)));
        let mode_ctrl = ModeController::new(driver.clone(), store.clone(), params.clone());

        Self {
            params,
            driver,
            store,
            mode_ctrl,
            dispatcher: None,
        }
    }

    /// Create a new controller, loading the parameters from the given file (relative to the
    /// params directory).
    pub fn init(
        param_file_path: &str,
        driver: Arc<dyn MotionDriver>,
    ) -> Result<Self, params::LoadError> {
        let params: Params = params::load(param_file_path)?;

        Ok(Self::new(driver, params))
    }

    /// Connect to the arm, synchronise the targets with the arm's telemetry and start the
    /// dispatcher.
    ///
    /// The dispatcher starts in standby, use [`enable_can_mode`](Self::enable_can_mode) to start
    /// streaming the targets.
    pub fn connect(&mut self) -> Result<(), ArmCtrlError> {
        info!("Connecting to the arm");

        self.driver.connect().map_err(ArmCtrlError::Connection)?;
        self.driver.set_enable(AxisMask::ALL, true)?;
        thread::sleep(secs(self.params.connect_settle_s));

        self.mode_ctrl.sync_targets()?;
        self.store.set_connected(true);

        if self.dispatcher.is_none() {
            self.dispatcher = Some(Dispatcher::start(
                self.driver.clone(),
                self.store.clone(),
                &self.params,
            )?);
        }

        info!("Arm connected");

        Ok(())
    }

    /// Stop the dispatcher and mark the arm disconnected.
    pub fn shutdown(&mut self) {
        if let Some(mut d) = self.dispatcher.take() {
            d.stop();
        }
        self.store.set_mode(ControlMode::Standby);
        self.store.set_connected(false);

        info!("Arm control shut down");
    }

    /// Move the arm into CAN control, see [`ModeController::enable_can_mode`].
    pub fn enable_can_mode(&self) -> Result<(), ArmCtrlError> {
        self.check_connected()?;
        self.mode_ctrl.enable_can_mode()
    }

    /// Emergency stop the arm then hold the current position, see [`ModeController::stop`].
    pub fn stop(&self) -> Result<(), ArmCtrlError> {
        self.check_connected()?;
        self.mode_ctrl.stop()
    }

    /// Move each joint to the given angle.
    pub fn set_joint_target(&self, joints_deg: JointVector, speed_pct: Option<u8>) {
        debug!("New joint target: {:?} deg", joints_deg);
        self.store.set_joints(joints_deg, speed_pct);
    }

    /// Move the end effector to the given pose, the arm chooses the path.
    pub fn set_pose_target(&self, pose: CartesianPose, speed_pct: Option<u8>) {
        debug!("New pose target: {:?}", pose);
        self.store.set_pose(pose, MoveMode::Pose, speed_pct);
    }

    /// Move the end effector to the given pose in a straight line.
    pub fn set_linear_target(&self, pose: CartesianPose, speed_pct: Option<u8>) {
        debug!("New linear target: {:?}", pose);
        self.store.set_pose(pose, MoveMode::Linear, speed_pct);
    }

    /// Open the gripper to the given aperture.
    pub fn set_gripper_target(&self, aperture_mm: f64, effort: Option<u16>) {
        debug!("New gripper target: {} mm", aperture_mm);
        self.store.set_gripper(to_device_units(aperture_mm.abs()), effort);
    }

    /// Solve for the joints reaching `pose`, starting from the current joint target, then use the
    /// solution as the new joint target.
    ///
    /// The solution is used even if the solver didn't converge.
    pub fn move_to_pose<F: ForwardKinematics>(
        &self,
        solver: &IkSolver<F>,
        pose: &CartesianPose,
        speed_pct: Option<u8>,
    ) -> SolveResult {
        let seed = self.store.snapshot().joints_deg;
        let result = solver.solve(pose, &seed);

        if result.converged {
            debug!("IK converged after {} iterations", result.iterations);
        } else {
            warn!(
                "IK did not converge after {} iterations, using best effort joints",
                result.iterations
            );
        }

        self.set_joint_target(result.joints_deg, speed_pct);

        result
    }

    /// Read the arm's telemetry.
    pub fn read_state(&self) -> Result<ArmState, ArmCtrlError> {
        self.check_connected()?;

        let status: ControlStatus = self.driver.read_control_status()?;

        Ok(ArmState {
            joints_deg: array_to_engineering(&self.driver.read_joint_state()?),
            pose: CartesianPose::from_device(&self.driver.read_pose_state()?),
            gripper_mm: to_engineering(self.driver.read_gripper_state()?),
            ctrl_mode: status.ctrl_mode,
            arm_status: status.arm_status,
        })
    }

    /// Copy of the current targets.
    pub fn targets(&self) -> MotionTarget {
        self.store.snapshot()
    }

    /// Current dispatching mode.
    pub fn mode(&self) -> ControlMode {
        self.store.mode()
    }

    /// Control status from the dispatcher's last diagnostic read.
    pub fn last_status(&self) -> Option<ControlStatus> {
        self.dispatcher.as_ref().and_then(|d| d.last_status())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn check_connected(&self) -> Result<(), ArmCtrlError> {
        if self.store.is_connected() {
            Ok(())
        } else {
            Err(ArmCtrlError::NotConnected)
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
