//! Coordinate frames and the shared anchor frame.
//!
//! # Overview
//!
//! Every device runs its own tracking session with its own arbitrary world
//! origin ("device world"). The only thing two devices physically share is
//! the printed marker. Once a device has seen the marker, it knows where the
//! marker sits in its own device world; that pose is the **anchor frame**.
//!
//! ```text
//!   device A world              device B world
//!        │                           │
//!        ▼ T_wa_anchor               ▼ T_wb_anchor
//!        └────────► marker ◄─────────┘
//! ```
//!
//! Nodes are exchanged *relative to the anchor*:
//!
//! ```text
//! sender:   T_anchor_node = T_wa_anchor⁻¹ · T_wa_node      (relative_to_anchor)
//! receiver: T_wb_node     = T_wb_anchor  · T_anchor_node   (to_device_world)
//! ```
//!
//! so `T_wa_anchor` and `T_wb_anchor` can be completely unrelated matrices and
//! both devices still place the node at the same physical spot.
//!
//! # Transformation Naming Convention
//!
//! `T_target_source` maps points from `source` into `target`, as in
//! `p_world = T_world_cam * p_cam`.

use super::RigidTransform;
use crate::error::{Result, SyncError};

/// Device-world pose of the marker-defined shared origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorFrame {
    /// T_world_anchor.
    pub t_world_anchor: RigidTransform,
}

impl AnchorFrame {
    pub fn new(t_world_anchor: RigidTransform) -> Self {
        Self { t_world_anchor }
    }
}

/// Compose the live camera pose with the camera-relative marker pose.
///
/// Given T_world_cam (tracking session) and T_cam_marker (remapped solver
/// output), returns T_world_marker = T_world_cam * T_cam_marker.
pub fn establish_anchor(
    device_marker: &RigidTransform,
    live_camera: &RigidTransform,
) -> AnchorFrame {
    AnchorFrame::new(live_camera.compose(device_marker))
}

/// Express a device-world pose relative to the anchor.
///
/// Formula: T_anchor_node = T_world_anchor⁻¹ * T_world_node
pub fn relative_to_anchor(node_world: &RigidTransform, anchor: &AnchorFrame) -> RigidTransform {
    anchor.t_world_anchor.inverse().compose(node_world)
}

/// Inverse of [`relative_to_anchor`]: bring an anchor-relative pose into
/// this device's world.
///
/// Formula: T_world_node = T_world_anchor * T_anchor_node
pub fn to_device_world(relative: &RigidTransform, anchor: &AnchorFrame) -> RigidTransform {
    anchor.t_world_anchor.compose(relative)
}

/// The anchor as seen by one tracking session.
///
/// Empty until the first marker detection; afterwards the most recent
/// detection wins. The last anchor stays in effect when the marker leaves
/// the view.
#[derive(Debug, Clone, Default)]
pub struct AnchorState {
    current: Option<AnchorFrame>,
    detections: u64,
}

impl AnchorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the anchor with a fresh detection.
    pub fn establish(
        &mut self,
        device_marker: &RigidTransform,
        live_camera: &RigidTransform,
    ) -> AnchorFrame {
        let anchor = establish_anchor(device_marker, live_camera);
        self.current = Some(anchor);
        self.detections += 1;
        anchor
    }

    pub fn current(&self) -> Option<&AnchorFrame> {
        self.current.as_ref()
    }

    pub fn is_established(&self) -> bool {
        self.current.is_some()
    }

    /// Number of detections that have (re)established the anchor.
    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn relative_to_anchor(&self, node_world: &RigidTransform) -> Result<RigidTransform> {
        self.current
            .as_ref()
            .map(|anchor| relative_to_anchor(node_world, anchor))
            .ok_or(SyncError::AnchorUnavailable)
    }

    pub fn to_device_world(&self, relative: &RigidTransform) -> Result<RigidTransform> {
        self.current
            .as_ref()
            .map(|anchor| to_device_world(relative, anchor))
            .ok_or(SyncError::AnchorUnavailable)
    }

    /// Forget the anchor (tracking session restarted).
    pub fn clear(&mut self) {
        self.current = None;
        self.detections = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Unit, UnitQuaternion, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_transform(rng: &mut StdRng) -> RigidTransform {
        let axis = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(0.1..1.0),
        );
        RigidTransform {
            rotation: UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(axis),
                rng.gen_range(-3.0..3.0),
            ),
            translation: Vector3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            ),
        }
    }

    #[test]
    fn test_relative_round_trip_law() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let anchor = AnchorFrame::new(random_transform(&mut rng));
            let t = random_transform(&mut rng);
            let back = relative_to_anchor(&to_device_world(&t, &anchor), &anchor);
            assert!(back.approx_eq(&t, 1e-5));
        }
    }

    #[test]
    fn test_establish_anchor_is_camera_times_marker() {
        let camera = RigidTransform::from_translation(Vector3::new(0.0, 1.5, 0.0));
        let marker = RigidTransform::from_translation(Vector3::new(0.0, 0.0, -0.5));
        let anchor = establish_anchor(&marker, &camera);
        assert!(anchor
            .t_world_anchor
            .approx_eq(&RigidTransform::from_translation(Vector3::new(0.0, 1.5, -0.5)), 1e-12));
    }

    #[test]
    fn test_two_devices_agree_through_anchor() {
        let mut rng = StdRng::seed_from_u64(11);
        // Physical marker in an (unobservable) room frame.
        let t_room_marker = random_transform(&mut rng);
        // Each device world relates to the room differently.
        let t_a_room = random_transform(&mut rng);
        let t_b_room = random_transform(&mut rng);
        let anchor_a = AnchorFrame::new(t_a_room * t_room_marker);
        let anchor_b = AnchorFrame::new(t_b_room * t_room_marker);
        assert!(!anchor_a.t_world_anchor.approx_eq(&anchor_b.t_world_anchor, 1e-3));

        let t_room_object = random_transform(&mut rng);
        let on_a = t_a_room * t_room_object;
        let relative = relative_to_anchor(&on_a, &anchor_a);
        let on_b = to_device_world(&relative, &anchor_b);

        // Same physical pose once mapped back to the room.
        assert!((t_b_room.inverse() * on_b).approx_eq(&t_room_object, 1e-9));
    }

    #[test]
    fn test_anchor_state_unavailable_before_detection() {
        let state = AnchorState::new();
        assert!(!state.is_established());
        assert_eq!(
            state.relative_to_anchor(&RigidTransform::identity()),
            Err(SyncError::AnchorUnavailable)
        );
        assert_eq!(
            state.to_device_world(&RigidTransform::identity()),
            Err(SyncError::AnchorUnavailable)
        );
    }

    #[test]
    fn test_anchor_state_last_detection_wins() {
        let mut state = AnchorState::new();
        let camera = RigidTransform::identity();
        state.establish(&RigidTransform::from_translation(Vector3::x()), &camera);
        let second = state.establish(&RigidTransform::from_translation(Vector3::y()), &camera);

        assert_eq!(state.detections(), 2);
        assert_eq!(state.current(), Some(&second));

        state.clear();
        assert!(state.current().is_none());
        assert_eq!(state.detections(), 0);
    }
}
