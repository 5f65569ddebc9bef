//! Utility maths functions
//!
//! Vector and quaternion helpers used by the arm's pose error computations. The types themselves
//! come from nalgebra, this module adds the conventions the arm uses on top of them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Quaternion, Vector3};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Squared norm below which a quaternion is treated as having no inverse.
pub const QUAT_NORM_SQ_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Normalise the vector in place.
///
/// A zero length vector is left untouched.
pub fn normalize_mut(v: &mut Vector3<f64>) {
    v.try_normalize_mut(0.0);
}

/// Build a quaternion from ZYX Euler angles (`q = qz * qy * qx`).
///
/// Units: radians
pub fn quat_from_euler(roll: f64, pitch: f64, yaw: f64) -> Quaternion<f64> {
    let (s_y, c_y) = (yaw * 0.5).sin_cos();
    let (s_p, c_p) = (pitch * 0.5).sin_cos();
    let (s_r, c_r) = (roll * 0.5).sin_cos();

    Quaternion::new(
        c_y * c_p * c_r + s_y * s_p * s_r,
        c_y * c_p * s_r - s_y * s_p * c_r,
        c_y * s_p * c_r + s_y * c_p * s_r,
        s_y * c_p * c_r - c_y * s_p * s_r,
    )
}

/// Inverse of a quaternion, the conjugate divided by the squared norm.
///
/// Returns `None` if the quaternion's squared norm is below [`QUAT_NORM_SQ_EPSILON`].
pub fn quat_inverse(q: &Quaternion<f64>) -> Option<Quaternion<f64>> {
    let norm_sq = q.norm_squared();

    if norm_sq < QUAT_NORM_SQ_EPSILON {
        None
    } else {
        Some(q.conjugate() / norm_sq)
    }
}

/// Flip the sign of all components if `w < 0`, so the quaternion describes the shorter of the two
/// equivalent rotations.
pub fn canonicalize_sign(q: Quaternion<f64>) -> Quaternion<f64> {
    if q.w < 0.0 {
        -q
    } else {
        q
    }
}

/// Small angle rotation vector taking `from` onto `to`.
///
/// Both quaternions must be unit quaternions. The result approximates axis * angle in radians.
pub fn rotation_error(to: &Quaternion<f64>, from: &Quaternion<f64>) -> Vector3<f64> {
    let from_inv = quat_inverse(from).unwrap_or_else(Quaternion::identity);
    let q_err = canonicalize_sign(to * from_inv);

    Vector3::new(q_err.i, q_err.j, q_err.k) * 2.0
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
