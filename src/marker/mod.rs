//! Marker observation: orientation rules, corner normalization, solver
//! contract and pose remapping.

pub mod corners;
pub mod orientation;
pub mod pose_estimation;
pub mod remap;
pub mod solver;

pub use corners::{normalize_corners, DetectorCorners, QuadCorners, ViewGeometry};
pub use orientation::{profile_for, CornerRole, DeviceOrientation, OrientationProfile, PoseRemap};
pub use pose_estimation::estimate_marker_pose;
pub use remap::{remap_pose, unmap_pose};
pub use solver::{CameraIntrinsics, PoseSolver, RawPose};
