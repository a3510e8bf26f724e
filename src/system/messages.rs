//! Inter-thread message types.
//!
//! Everything that touches the anchor or the node registry is funneled onto
//! the coordinator's single queue as a [`SessionEvent`]. Frames take a detour
//! through the detection worker first, which runs the solver off-queue and
//! then forwards the results in frame order.

use crossbeam_channel::Sender;

use crate::geometry::RigidTransform;
use crate::marker::{CameraIntrinsics, DetectorCorners, DeviceOrientation, ViewGeometry};
use crate::scene::{NodeKind, PeerId};

/// Per-frame snapshot from the tracking session and the detector.
#[derive(Debug, Clone)]
pub struct FrameInput {
    /// T_world_cam from the tracking session.
    pub camera_pose: RigidTransform,

    /// Intrinsics valid for this frame only.
    pub intrinsics: CameraIntrinsics,

    pub view: ViewGeometry,

    /// Display orientation at capture time.
    pub orientation: DeviceOrientation,

    /// Zero or more marker detections in this frame.
    pub detections: Vec<DetectorCorners>,
}

/// A successful marker solve, ready to (re)establish the anchor.
#[derive(Debug, Clone, Copy)]
pub struct MarkerObservation {
    /// T_cam_marker after orientation remapping.
    pub device_marker: RigidTransform,

    /// Camera pose of the frame the marker was seen in.
    pub camera_pose: RigidTransform,
}

/// Work item for the detection worker.
pub enum DetectionJob {
    Frame(FrameInput),
    /// Forwarded to the coordinator once all earlier frames are through.
    Flush(Sender<()>),
}

/// Event processed by the coordinator, in arrival order.
pub enum SessionEvent {
    /// Frame tick after its detections have been forwarded.
    FrameTick(FrameInput),
    MarkerSolved(MarkerObservation),
    /// User action: place an object in front of the camera.
    CreateObject(NodeKind),
    /// Text received from the transport.
    PeerMessage { from: PeerId, text: String },
    PeersChanged(Vec<PeerId>),
    /// Tracking session restarted.
    Reset,
    /// Reply once every earlier event has been handled.
    Flush(Sender<()>),
    Shutdown,
}
