//! Marker pose estimation for one detection.
//!
//! Chains the stages that run off the serialized queue:
//! 1. Corner normalization (orientation-aware, pixel space)
//! 2. External PnP solve
//! 3. Remap into the device camera frame

use crate::error::{Result, SyncError};
use crate::geometry::RigidTransform;

use super::corners::{normalize_corners, DetectorCorners, ViewGeometry};
use super::orientation::OrientationProfile;
use super::remap::remap_pose;
use super::solver::{CameraIntrinsics, PoseSolver};

/// Estimate T_cam_marker for a single detector quad.
///
/// Orientations without a pose remap are rejected before the solver runs.
pub fn estimate_marker_pose(
    detection: &DetectorCorners,
    profile: &OrientationProfile,
    view: &ViewGeometry,
    intrinsics: &CameraIntrinsics,
    half_size: f64,
    solver: &mut dyn PoseSolver,
) -> Result<RigidTransform> {
    if !profile.supports_pose() {
        return Err(SyncError::UnsupportedOrientation(profile.orientation));
    }

    let quad = normalize_corners(detection, profile, view);
    if quad.is_degenerate() {
        return Err(SyncError::DegenerateSolve);
    }

    let raw = solver
        .solve(&quad, half_size, intrinsics)
        .ok_or(SyncError::DegenerateSolve)?;

    remap_pose(&raw, profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::corners::QuadCorners;
    use crate::marker::orientation::{profile_for, DeviceOrientation};
    use crate::marker::solver::RawPose;
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector3};

    fn detection() -> DetectorCorners {
        DetectorCorners {
            top_left: Point2::new(0.4, 0.6),
            top_right: Point2::new(0.6, 0.6),
            bottom_right: Point2::new(0.6, 0.4),
            bottom_left: Point2::new(0.4, 0.4),
        }
    }

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(1500.0, 1500.0, 960.0, 720.0)
    }

    #[test]
    fn test_solver_receives_canonical_quad_and_half_size() {
        let view = ViewGeometry::view_only(1000.0, 1000.0);
        let mut seen: Option<(QuadCorners, f64)> = None;
        let mut solver = |quad: &QuadCorners, half: f64, _k: &CameraIntrinsics| -> Option<RawPose> {
            seen = Some((*quad, half));
            Some(RawPose {
                qw: 1.0,
                qx: 0.0,
                qy: 0.0,
                qz: 0.0,
                t: [0.0, 0.0, 0.4],
            })
        };

        let pose = estimate_marker_pose(
            &detection(),
            profile_for(DeviceOrientation::Portrait),
            &view,
            &intrinsics(),
            0.05,
            &mut solver,
        )
        .unwrap();

        let (quad, half) = seen.unwrap();
        assert_eq!(half, 0.05);
        assert_relative_eq!(quad.0[0], Point2::new(600.0, 600.0), epsilon = 1e-9);
        assert_relative_eq!(pose.translation, Vector3::new(0.0, 0.0, -0.4), epsilon = 1e-12);
    }

    #[test]
    fn test_solver_failure_is_degenerate_solve() {
        let view = ViewGeometry::view_only(1000.0, 1000.0);
        let mut solver = |_: &QuadCorners, _: f64, _: &CameraIntrinsics| -> Option<RawPose> { None };
        let result = estimate_marker_pose(
            &detection(),
            profile_for(DeviceOrientation::LandscapeLeft),
            &view,
            &intrinsics(),
            0.05,
            &mut solver,
        );
        assert_eq!(result, Err(SyncError::DegenerateSolve));
    }

    #[test]
    fn test_collapsed_quad_never_reaches_solver() {
        let view = ViewGeometry::view_only(1000.0, 1000.0);
        let collapsed = DetectorCorners {
            top_left: Point2::new(0.5, 0.5),
            top_right: Point2::new(0.5, 0.5),
            bottom_right: Point2::new(0.5, 0.5),
            bottom_left: Point2::new(0.5, 0.5),
        };
        let mut calls = 0;
        let mut solver = |_: &QuadCorners, _: f64, _: &CameraIntrinsics| -> Option<RawPose> {
            calls += 1;
            None
        };
        let result = estimate_marker_pose(
            &collapsed,
            profile_for(DeviceOrientation::Portrait),
            &view,
            &intrinsics(),
            0.05,
            &mut solver,
        );
        assert_eq!(result, Err(SyncError::DegenerateSolve));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_upside_down_is_reported_not_solved() {
        let view = ViewGeometry::view_only(1000.0, 1000.0);
        let mut solver = |_: &QuadCorners, _: f64, _: &CameraIntrinsics| -> Option<RawPose> {
            panic!("solver must not run without a pose remap")
        };
        let result = estimate_marker_pose(
            &detection(),
            profile_for(DeviceOrientation::PortraitUpsideDown),
            &view,
            &intrinsics(),
            0.05,
            &mut solver,
        );
        assert_eq!(
            result,
            Err(SyncError::UnsupportedOrientation(DeviceOrientation::PortraitUpsideDown))
        );
    }
}
