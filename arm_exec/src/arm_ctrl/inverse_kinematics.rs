//! Arm inverse kinematics calculations
//!
//! The solver uses a damped Jacobian transpose iteration. Each iteration the Jacobian of the end
//! effector pose is estimated by finite differences of the forward kinematics, and the joints are
//! moved a small step along `J^T * error`. This needs no matrix inversion and so keeps working
//! through singularities, at the cost of first order convergence. It is intended to be warm
//! started from the previous solution, for small corrections rather than large jumps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{Matrix6, Vector6};
use serde::{Deserialize, Serialize};

// Internal imports
use super::{CartesianPose, IkParams, JointVector, NUM_JOINTS};
use util::maths;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Forward kinematics model of the arm.
///
/// Must be deterministic and free of side effects, the solver evaluates it many times per solve.
pub trait ForwardKinematics {
    /// Poses of each link frame for the given joint angles, base first. The last entry is the end
    /// effector.
    fn link_poses(&self, joints_deg: &JointVector) -> [CartesianPose; NUM_JOINTS];

    /// Pose of the end effector for the given joint angles.
    fn end_effector(&self, joints_deg: &JointVector) -> CartesianPose {
        self.link_poses(joints_deg)[NUM_JOINTS - 1]
    }
}

impl<F> ForwardKinematics for F
where
    F: Fn(&JointVector) -> [CartesianPose; NUM_JOINTS],
{
    fn link_poses(&self, joints_deg: &JointVector) -> [CartesianPose; NUM_JOINTS] {
        self(joints_deg)
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Iterative inverse kinematics solver.
pub struct IkSolver<F> {
    fk: F,
    params: IkParams,
}

/// Outcome of a single solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    /// Best joint angles found.
    ///
    /// Units: degrees
    pub joints_deg: JointVector,

    /// True if the pose error is within tolerance at `joints_deg`.
    pub converged: bool,

    /// Number of update steps taken.
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F: ForwardKinematics> IkSolver<F> {
    /// Create a new solver around the given forward kinematics model.
    pub fn new(fk: F, params: IkParams) -> Self {
        Self { fk, params }
    }

    /// The forward kinematics model used by the solver.
    pub fn fk(&self) -> &F {
        &self.fk
    }

    /// Solve for the joint angles which put the end effector at `target`, starting from `seed`.
    ///
    /// Uses the iteration limit and tolerances from the solver's parameters.
    pub fn solve(&self, target: &CartesianPose, seed: &JointVector) -> SolveResult {
        self.solve_with(
            target,
            seed,
            self.params.max_iter,
            self.params.pos_tol_mm,
            self.params.rot_tol_deg,
        )
    }

    /// Solve with an explicit iteration limit and tolerances.
    ///
    /// Never fails, if the tolerances are not met within `max_iter` iterations the last joint
    /// vector is returned with `converged` set to false.
    pub fn solve_with(
        &self,
        target: &CartesianPose,
        seed: &JointVector,
        max_iter: usize,
        pos_tol_mm: f64,
        rot_tol_deg: f64,
    ) -> SolveResult {
        let target_pos = target.position();
        let target_quat = target.orientation();
        let rot_tol_rad = rot_tol_deg.to_radians();
        let delta_rad = self.params.perturbation_rad;

        // Joints are kept in degrees since that's what the FK model takes, steps are computed in
        // radians and converted.
        let mut joints_deg: JointVector = *seed;

        for iteration in 0..max_iter {
            let current = self.fk.end_effector(&joints_deg);
            let current_pos = current.position();
            let current_quat = current.orientation();

            let pos_err = target_pos - current_pos;
            let rot_err = maths::rotation_error(&target_quat, &current_quat);

            trace!(
                "IK iteration {}: |pos_err| = {:.6} mm, |rot_err| = {:.6} rad",
                iteration,
                pos_err.norm(),
                rot_err.norm()
            );

            if pos_err.norm() < pos_tol_mm && rot_err.norm() < rot_tol_rad {
                return SolveResult {
                    joints_deg,
                    converged: true,
                    iterations: iteration,
                };
            }

            // Forward difference Jacobian, rows 0-2 position, rows 3-5 rotation
            let mut jacobian = Matrix6::<f64>::zeros();
            for j in 0..NUM_JOINTS {
                let mut perturbed = joints_deg;
                perturbed[j] += delta_rad.to_degrees();

                let p = self.fk.end_effector(&perturbed);
                let d_pos = (p.position() - current_pos) / delta_rad;
                let d_rot = maths::rotation_error(&p.orientation(), &current_quat) / delta_rad;

                for r in 0..3 {
                    jacobian[(r, j)] = d_pos[r];
                    jacobian[(r + 3, j)] = d_rot[r];
                }
            }

            let error = Vector6::new(
                pos_err[0], pos_err[1], pos_err[2], rot_err[0], rot_err[1], rot_err[2],
            );
            let update_rad = jacobian.transpose() * error;

            for (joint, step) in joints_deg.iter_mut().zip(update_rad.iter()) {
                *joint += (self.params.step_size * step).to_degrees();
            }
        }

        SolveResult {
            joints_deg,
            converged: false,
            iterations: max_iter,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix4;
    use std::f64::consts::FRAC_PI_2;

    /// Cartesian gantry driven by lead screws (40 mm per radian) with a ZYX wrist, joints 4-6 set
    /// the end effector's Euler angles directly.
    pub(crate) fn gantry_fk(joints_deg: &JointVector) -> [CartesianPose; NUM_JOINTS] {
        const MM_PER_RAD: f64 = 40.0;

        let ee = CartesianPose {
            x_mm: 100.0 + MM_PER_RAD * joints_deg[0].to_radians(),
            y_mm: -50.0 + MM_PER_RAD * joints_deg[1].to_radians(),
            z_mm: 200.0 + MM_PER_RAD * joints_deg[2].to_radians(),
            rx_deg: joints_deg[3],
            ry_deg: joints_deg[4],
            rz_deg: joints_deg[5],
        };

        [ee; NUM_JOINTS]
    }

    /// Small revolute arm described by modified DH parameters, reach is well under 100 mm.
    pub(crate) fn dh_fk(joints_deg: &JointVector) -> [CartesianPose; NUM_JOINTS] {
        const A_MM: [f64; NUM_JOINTS] = [0.0, 0.0, 20.0, 0.0, 0.0, 0.0];
        const ALPHA_RAD: [f64; NUM_JOINTS] = [0.0, -FRAC_PI_2, 0.0, -FRAC_PI_2, FRAC_PI_2, -FRAC_PI_2];
        const D_MM: [f64; NUM_JOINTS] = [10.0, 0.0, 0.0, 17.5, 0.0, 0.0];
        const THETA_OFFSET_RAD: [f64; NUM_JOINTS] = [0.0, -FRAC_PI_2, 0.0, 0.0, 0.0, 0.0];

        let mut t = Matrix4::<f64>::identity();
        let mut poses = [CartesianPose::default(); NUM_JOINTS];

        for i in 0..NUM_JOINTS {
            let theta = joints_deg[i].to_radians() + THETA_OFFSET_RAD[i];
            let (st, ct) = theta.sin_cos();
            let (sa, ca) = ALPHA_RAD[i].sin_cos();

            let link = Matrix4::new(
                ct, -st, 0.0, A_MM[i],
                st * ca, ct * ca, -sa, -sa * D_MM[i],
                st * sa, ct * sa, ca, ca * D_MM[i],
                0.0, 0.0, 0.0, 1.0,
            );
            t *= link;

            poses[i] = CartesianPose {
                x_mm: t[(0, 3)],
                y_mm: t[(1, 3)],
                z_mm: t[(2, 3)],
                rx_deg: t[(2, 1)].atan2(t[(2, 2)]).to_degrees(),
                ry_deg: (-t[(2, 0)]).atan2(t[(2, 1)].hypot(t[(2, 2)])).to_degrees(),
                rz_deg: t[(1, 0)].atan2(t[(0, 0)]).to_degrees(),
            };
        }

        poses
    }

    #[test]
    fn test_seed_is_fixed_point() {
        let seeds = [
            [10.0, -5.0, 20.0, 30.0, -15.0, 45.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];

        let solver = IkSolver::new(gantry_fk, IkParams::default());
        for seed in seeds.iter() {
            let target = solver.fk().end_effector(seed);
            let res = solver.solve(&target, seed);

            assert!(res.converged);
            assert_eq!(res.iterations, 0);
            assert_eq!(res.joints_deg, *seed);
        }

        let solver = IkSolver::new(dh_fk, IkParams::default());
        let seed = [10.0, 20.0, -30.0, 15.0, 40.0, -20.0];
        let res = solver.solve(&dh_fk(&seed)[5], &seed);

        assert!(res.converged);
        assert_eq!(res.iterations, 0);
        assert_eq!(res.joints_deg, seed);
    }

    #[test]
    fn test_small_correction_converges() {
        let solver = IkSolver::new(gantry_fk, IkParams::default());
        let seed = [10.0, -5.0, 20.0, 30.0, -15.0, 45.0];
        let seed_copy = seed;

        let mut target = gantry_fk(&seed)[5];
        target.x_mm += 5.0;

        let res = solver.solve(&target, &seed);

        assert!(res.converged);
        assert!(res.iterations > 0 && res.iterations <= 100);
        assert_eq!(seed, seed_copy);

        let reached = gantry_fk(&res.joints_deg)[5];
        assert!((reached.position() - target.position()).norm() < 0.001);
        assert!(maths::rotation_error(&target.orientation(), &reached.orientation()).norm() < 1f64.to_radians());

        // Only the x screw needed to move
        assert_abs_diff_eq!(res.joints_deg[0], 10.0 + 5f64.to_degrees() / 40.0, epsilon = 0.01);
        assert_abs_diff_eq!(res.joints_deg[1], -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(res.joints_deg[5], 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unreachable_target() {
        let solver = IkSolver::new(dh_fk, IkParams::default());
        let seed = [10.0, 20.0, -30.0, 15.0, 40.0, -20.0];
        let target = CartesianPose::from_array(&[5000.0, 5000.0, 5000.0, 0.0, 0.0, 0.0]);

        let res = solver.solve(&target, &seed);

        assert!(!res.converged);
        assert_eq!(res.iterations, 100);
        assert!(res.joints_deg.iter().all(|j| j.is_finite()));

        let res = solver.solve_with(&target, &seed, 7, 0.001, 1.0);
        assert!(!res.converged);
        assert_eq!(res.iterations, 7);
    }

    #[test]
    fn test_closure_fk() {
        let offset = 3.0;
        let fk = move |j: &JointVector| {
            let mut poses = gantry_fk(j);
            for p in poses.iter_mut() {
                p.z_mm += offset;
            }
            poses
        };

        let solver = IkSolver::new(fk, IkParams::default());
        let seed = [0.0; NUM_JOINTS];
        assert_eq!(solver.fk().end_effector(&seed).z_mm, 203.0);
        assert!(solver.solve(&solver.fk().end_effector(&seed), &seed).converged);
    }
}
