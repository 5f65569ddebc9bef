//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from the script.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use arm_lib::arm_ctrl::{ArmCtrl, CartesianPose};
use comms_if::tc::{arm_ctrl::ArmCmd, Tc};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Failures are logged, the arm is left as arm control left it.
pub(crate) fn exec(arm: &ArmCtrl, tc: &Tc) {
    match tc {
        Tc::EnableCan => {
            debug!("Recieved EnableCan command");
            if let Err(e) = arm.enable_can_mode() {
                warn!("EnableCan failed: {}", e);
            }
        }
        Tc::Stop => {
            debug!("Recieved Stop command");
            if let Err(e) = arm.stop() {
                warn!("Stop failed: {}", e);
            }
        }
        Tc::State => match arm.read_state() {
            Ok(state) => match serde_json::to_string(&state) {
                Ok(s) => info!("Arm state: {}", s),
                Err(_) => info!("Arm state: {:?}", state),
            },
            Err(e) => warn!("Could not read the arm state: {}", e),
        },
        Tc::Arm(cmd) => exec_arm_cmd(arm, cmd),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn exec_arm_cmd(arm: &ArmCtrl, cmd: &ArmCmd) {
    match cmd {
        ArmCmd::Joints {
            joints_deg,
            speed_pct,
        } => arm.set_joint_target(*joints_deg, *speed_pct),
        ArmCmd::Pose { pose, speed_pct } => {
            arm.set_pose_target(CartesianPose::from_array(pose), *speed_pct)
        }
        ArmCmd::Linear { pose, speed_pct } => {
            arm.set_linear_target(CartesianPose::from_array(pose), *speed_pct)
        }
        ArmCmd::Gripper {
            aperture_mm,
            effort,
        } => arm.set_gripper_target(*aperture_mm, *effort),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use arm_lib::arm_ctrl::{ControlMode, Params};
    use arm_lib::sim_arm::SimArm;
    use comms_if::eqpt::arm::MoveMode;
    use std::sync::Arc;

    #[test]
    fn test_exec_tcs() {
        let params = Params {
            connect_settle_s: 0.0,
            standby_settle_s: 0.0,
            gripper_cmd_delay_s: 0.0,
            ..Default::default()
        };
        let mut arm = ArmCtrl::new(
            Arc::new(SimArm::new("sim0").with_telemetry([1_000; 6], [0; 6])),
            params,
        );

        // Not connected, logged and ignored
        exec(&arm, &Tc::EnableCan);
        assert_eq!(arm.mode(), ControlMode::Standby);

        arm.connect().unwrap();
        exec(&arm, &Tc::EnableCan);
        assert_eq!(arm.mode(), ControlMode::CanControl);

        exec(
            &arm,
            &Tc::Arm(ArmCmd::Linear {
                pose: [100.0, 0.0, 200.0, 180.0, 0.0, 0.0],
                speed_pct: Some(25),
            }),
        );
        let t = arm.targets();
        assert_eq!(t.config.move_mode, MoveMode::Linear);
        assert_eq!(t.config.speed_pct, 25);
        assert_eq!(t.pose.z_mm, 200.0);

        exec(
            &arm,
            &Tc::Arm(ArmCmd::Gripper {
                aperture_mm: 15.0,
                effort: None,
            }),
        );
        assert_eq!(arm.targets().gripper_um, 15_000);

        exec(&arm, &Tc::State);
        exec(&arm, &Tc::Stop);
        assert_eq!(arm.mode(), ControlMode::CanControl);

        arm.shutdown();
    }
}
