//! Shared fixtures for unit and scenario tests.
//!
//! Devices are simulated against a fixed physical "room" frame: the marker
//! is fixed in the room, and each device's tracking session has its own
//! arbitrary world origin T_world_room.

use std::collections::VecDeque;

use nalgebra::{Point2, UnitQuaternion, Vector3};

use crate::geometry::RigidTransform;
use crate::marker::{
    profile_for, unmap_pose, CameraIntrinsics, DetectorCorners, DeviceOrientation, PoseSolver,
    QuadCorners, RawPose, ViewGeometry,
};
use crate::system::{FrameInput, MarkerObservation};

/// One device's view of the shared room.
#[derive(Debug, Clone, Copy)]
pub struct DeviceWorld {
    /// Device world origin relative to the room (T_world_room).
    pub t_world_room: RigidTransform,
    /// Printed marker in the room.
    pub t_room_marker: RigidTransform,
    /// Where the device camera currently is, in the room.
    pub t_room_camera: RigidTransform,
}

impl DeviceWorld {
    pub fn camera_pose(&self) -> RigidTransform {
        self.t_world_room * self.t_room_camera
    }

    pub fn marker_pose(&self) -> RigidTransform {
        self.t_world_room * self.t_room_marker
    }

    /// T_cam_marker as the remapped solver output should report it.
    pub fn marker_in_camera(&self) -> RigidTransform {
        self.camera_pose().inverse() * self.marker_pose()
    }

    /// Device-world pose of something placed in the room.
    pub fn from_room(&self, t_room_x: &RigidTransform) -> RigidTransform {
        self.t_world_room * *t_room_x
    }

    pub fn with_camera(mut self, t_room_camera: RigidTransform) -> Self {
        self.t_room_camera = t_room_camera;
        self
    }
}

fn marker_in_room() -> RigidTransform {
    RigidTransform {
        rotation: UnitQuaternion::from_euler_angles(-std::f64::consts::FRAC_PI_2, 0.0, 0.3),
        translation: Vector3::new(0.4, 0.75, -1.2),
    }
}

fn camera_in_room() -> RigidTransform {
    RigidTransform {
        rotation: UnitQuaternion::from_euler_angles(-0.2, 0.1, 0.0),
        translation: Vector3::new(0.3, 1.4, 0.0),
    }
}

/// Device whose tracking origin is rotated and offset from the room.
pub fn rotated_world() -> DeviceWorld {
    DeviceWorld {
        t_world_room: RigidTransform {
            rotation: UnitQuaternion::from_euler_angles(0.0, 0.8, 0.0),
            translation: Vector3::new(1.0, -1.4, 2.0),
        },
        t_room_marker: marker_in_room(),
        t_room_camera: camera_in_room(),
    }
}

/// A second device with an unrelated origin, standing elsewhere.
pub fn shifted_world() -> DeviceWorld {
    DeviceWorld {
        t_world_room: RigidTransform {
            rotation: UnitQuaternion::from_euler_angles(0.1, -2.1, 0.05),
            translation: Vector3::new(-3.0, 0.2, 0.5),
        },
        t_room_marker: marker_in_room(),
        t_room_camera: RigidTransform {
            rotation: UnitQuaternion::from_euler_angles(-0.1, -0.6, 0.0),
            translation: Vector3::new(-0.5, 1.2, -0.3),
        },
    }
}

/// Observation of the world's marker from `camera`.
pub fn marker_observation(world: &DeviceWorld, camera: &RigidTransform) -> MarkerObservation {
    MarkerObservation {
        device_marker: camera.inverse() * world.marker_pose(),
        camera_pose: *camera,
    }
}

pub fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(1500.0, 1500.0, 960.0, 540.0)
}

pub fn view() -> ViewGeometry {
    ViewGeometry::new(375.0, 667.0, 1080.0, 1920.0)
}

/// A well-formed detection near the middle of the frame.
pub fn centered_detection() -> DetectorCorners {
    DetectorCorners {
        top_left: Point2::new(0.4, 0.6),
        top_right: Point2::new(0.6, 0.6),
        bottom_right: Point2::new(0.6, 0.4),
        bottom_left: Point2::new(0.4, 0.4),
    }
}

/// Portrait frame at `camera_pose` without detections.
pub fn frame_at(camera_pose: RigidTransform) -> FrameInput {
    FrameInput {
        camera_pose,
        intrinsics: intrinsics(),
        view: view(),
        orientation: DeviceOrientation::Portrait,
        detections: Vec::new(),
    }
}

/// Frame of `world` showing the marker once.
pub fn frame_with_marker(world: &DeviceWorld, orientation: DeviceOrientation) -> FrameInput {
    FrameInput {
        orientation,
        detections: vec![centered_detection()],
        ..frame_at(world.camera_pose())
    }
}

/// Solver replaying a fixed script; the last entry repeats forever.
pub struct ScriptedSolver {
    script: VecDeque<Option<RawPose>>,
}

impl ScriptedSolver {
    pub fn new(script: impl IntoIterator<Item = Option<RawPose>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Solver that always reports the world's marker as seen under
    /// `orientation`.
    pub fn for_world(world: &DeviceWorld, orientation: DeviceOrientation) -> Self {
        let raw = unmap_pose(&world.marker_in_camera(), profile_for(orientation)).ok();
        Self::new([raw])
    }

    pub fn failing() -> Self {
        Self::new([None])
    }
}

impl PoseSolver for ScriptedSolver {
    fn solve(
        &mut self,
        _corners: &QuadCorners,
        _half_size: f64,
        _intrinsics: &CameraIntrinsics,
    ) -> Option<RawPose> {
        if self.script.len() > 1 {
            self.script.pop_front().flatten()
        } else {
            self.script.front().copied().flatten()
        }
    }
}
