//! Fixed rate dispatch of the motion targets
//!
//! The dispatcher owns a background thread which, once per period, copies the [`TargetStore`] and
//! sends the copy to the arm. Driver errors never stop the thread, the next tick simply retries
//! with the latest targets.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Instant;

// Internal
use super::{secs, ArmCtrlError, ControlMode, Params, TargetStore};
use comms_if::eqpt::arm::{array_to_device_units, ControlStatus, DriverError, MotionDriver, MoveMode};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to the dispatcher thread.
///
/// The thread is stopped and joined when the handle is dropped.
pub struct Dispatcher {
    run: Arc<AtomicBool>,
    last_status: Arc<Mutex<Option<ControlStatus>>>,
    jh: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Standby or not connected, nothing was sent.
    Idle,

    /// The targets were sent to the arm.
    Dispatched,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Dispatcher {
    /// Start the dispatcher thread.
    pub fn start(
        driver: Arc<dyn MotionDriver>,
        store: Arc<TargetStore>,
        params: &Params,
    ) -> Result<Self, ArmCtrlError> {
        let run = Arc::new(AtomicBool::new(true));
        let last_status = Arc::new(Mutex::new(None));

        let run_clone = run.clone();
        let last_status_clone = last_status.clone();
        let params = params.clone();

        let jh = thread::Builder::new()
            .name("dispatcher".into())
            .spawn(move || bg_thread(driver, store, params, run_clone, last_status_clone))
            .map_err(ArmCtrlError::DispatcherSpawn)?;

        Ok(Self {
            run,
            last_status,
            jh: Some(jh),
        })
    }

    /// Signal the thread to stop and wait for it to exit. The current tick is always completed.
    pub fn stop(&mut self) {
        self.run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                warn!("Dispatcher thread panicked");
            }
        }
    }

    /// True until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        self.jh.is_some()
    }

    /// The most recent control status read by the periodic diagnostics.
    pub fn last_status(&self) -> Option<ControlStatus> {
        match self.last_status.lock() {
            Ok(s) => *s,
            Err(e) => *e.into_inner(),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Perform a single dispatch.
///
/// Nothing is sent unless the store is connected and in CAN control. Otherwise the store is
/// copied and the copy sent as one motion parameter command, one motion command chosen by the
/// move mode, and one gripper command, in that order. The store is not locked while sending.
pub fn tick(driver: &dyn MotionDriver, store: &TargetStore) -> Result<TickOutcome, DriverError> {
    let target = store.snapshot();

    if !target.connected || target.mode != ControlMode::CanControl {
        return Ok(TickOutcome::Idle);
    }

    let cfg = target.config;

    driver.set_motion_params(cfg.ctrl_mode, cfg.move_mode, cfg.speed_pct, 0)?;

    match cfg.move_mode {
        MoveMode::Joint => driver.set_joint_targets(array_to_device_units(&target.joints_deg))?,
        MoveMode::Pose | MoveMode::Linear => driver.set_pose_target(target.pose.to_device())?,
    }

    driver.set_gripper(
        target.gripper_um.abs(),
        cfg.gripper_effort,
        cfg.gripper_code,
        0,
    )?;

    Ok(TickOutcome::Dispatched)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Background thread, ticks at the dispatch period until `run` is cleared.
fn bg_thread(
    driver: Arc<dyn MotionDriver>,
    store: Arc<TargetStore>,
    params: Params,
    run: Arc<AtomicBool>,
    last_status: Arc<Mutex<Option<ControlStatus>>>,
) {
    let period = secs(params.dispatch_period_s);
    let mut num_active_ticks: u64 = 0;

    info!("Dispatcher started, period {:?}", period);

    while run.load(Ordering::Relaxed) {
        let tick_start = Instant::now();

        // Failed ticks count as active
        let active = match tick(&*driver, &store) {
            Ok(TickOutcome::Dispatched) => true,
            Ok(TickOutcome::Idle) => false,
            Err(e) => {
                warn!("Dispatch failed: {}", e);
                true
            }
        };

        if active {
            num_active_ticks += 1;

            if params.diag_interval_ticks > 0 && num_active_ticks % params.diag_interval_ticks == 0 {
                match driver.read_control_status() {
                    Ok(status) => {
                        trace!(
                            "Arm status: mode {:?}, status {:?}",
                            status.ctrl_mode,
                            status.arm_status
                        );
                        match last_status.lock() {
                            Ok(mut s) => *s = Some(status),
                            Err(e) => *e.into_inner() = Some(status),
                        }
                    }
                    Err(e) => debug!("Diagnostic status read failed: {}", e),
                }
            }
        }

        let tick_dur = tick_start.elapsed();
        match period.checked_sub(tick_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Dispatch overran by {:.06} s",
                tick_dur.as_secs_f64() - period.as_secs_f64()
            ),
        }
    }

    info!("Dispatcher stopped after {} active ticks", num_active_ticks);
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
