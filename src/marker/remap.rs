//! Solver pose → device-world convention.
//!
//! The solver works in a computer-vision camera frame; the tracking session
//! uses a graphics camera frame whose axes additionally depend on how the
//! device is held. The per-orientation sign flips and axis swaps come from
//! [`super::orientation`]; this module only applies them.

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

use super::orientation::OrientationProfile;
use super::solver::RawPose;
use crate::error::{Result, SyncError};
use crate::geometry::RigidTransform;

/// Allowed deviation from unit length before the solver contract is
/// considered broken (debug builds only).
const UNIT_QUATERNION_TOLERANCE: f64 = 1e-3;

/// Rotation block of a unit quaternion, column-vector convention
/// (`p' = R p`). Row-vector scene graphs list the transpose of this.
///
/// ```text
/// R = | 1-2qy²-2qz²   2qxqy-2qzqw   2qxqz+2qyqw |
///     | 2qxqy+2qzqw   1-2qx²-2qz²   2qyqz-2qxqw |
///     | 2qxqz-2qyqw   2qyqz+2qxqw   1-2qx²-2qy² |
/// ```
#[rustfmt::skip]
pub fn quaternion_rotation_block(qw: f64, qx: f64, qy: f64, qz: f64) -> Matrix3<f64> {
    Matrix3::new(
        1.0 - 2.0 * qy * qy - 2.0 * qz * qz, 2.0 * qx * qy - 2.0 * qz * qw,       2.0 * qx * qz + 2.0 * qy * qw,
        2.0 * qx * qy + 2.0 * qz * qw,       1.0 - 2.0 * qx * qx - 2.0 * qz * qz, 2.0 * qy * qz - 2.0 * qx * qw,
        2.0 * qx * qz - 2.0 * qy * qw,       2.0 * qy * qz + 2.0 * qx * qw,       1.0 - 2.0 * qx * qx - 2.0 * qy * qy,
    )
}

/// Remap a raw solver pose into the device camera frame (T_cam_marker).
///
/// The quaternion must already be unit length; it is not renormalized. The
/// rotation is assembled from [`quaternion_rotation_block`] of the
/// sign-flipped quaternion.
pub fn remap_pose(raw: &RawPose, profile: &OrientationProfile) -> Result<RigidTransform> {
    let remap = profile
        .pose_remap
        .ok_or(SyncError::UnsupportedOrientation(profile.orientation))?;

    debug_assert!(
        (raw.quaternion_norm() - 1.0).abs() < UNIT_QUATERNION_TOLERANCE,
        "solver returned a non-unit quaternion (|q| = {})",
        raw.quaternion_norm()
    );

    let [sx, sy, sz] = remap.quaternion_sign_flip;
    let (qx, qy, qz) = (sx * raw.qx, sy * raw.qy, sz * raw.qz);
    let block = quaternion_rotation_block(raw.qw, qx, qy, qz);
    let mut rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(block));
    // Keep the solver's hemisphere so unmap_pose hands back the same components.
    if rotation.coords.dot(&Quaternion::new(raw.qw, qx, qy, qz).coords) < 0.0 {
        rotation = UnitQuaternion::new_unchecked(-rotation.into_inner());
    }

    let map = remap.translation_axis_map;
    let translation = Vector3::new(
        map[0].sign * raw.t[map[0].source],
        map[1].sign * raw.t[map[1].source],
        map[2].sign * raw.t[map[2].source],
    );

    Ok(RigidTransform {
        rotation,
        translation,
    })
}

/// Inverse of [`remap_pose`]: the raw pose a solver would have to report
/// to yield `device_marker` under `profile`.
pub fn unmap_pose(device_marker: &RigidTransform, profile: &OrientationProfile) -> Result<RawPose> {
    let remap = profile
        .pose_remap
        .ok_or(SyncError::UnsupportedOrientation(profile.orientation))?;

    let q = device_marker.rotation.quaternion();
    let [sx, sy, sz] = remap.quaternion_sign_flip;

    let mut t = [0.0; 3];
    for (i, axis) in remap.translation_axis_map.iter().enumerate() {
        // sign is ±1, so it is its own inverse
        t[axis.source] = axis.sign * device_marker.translation[i];
    }

    Ok(RawPose {
        qw: q.w,
        qx: sx * q.i,
        qy: sy * q.j,
        qz: sz * q.k,
        t,
    })
}
