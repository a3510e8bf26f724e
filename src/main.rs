use std::sync::Arc;

use anyhow::{Context, Result};
use nalgebra::{Point2, UnitQuaternion, Vector3};
use tracing_subscriber::EnvFilter;

use rust_shared_ar::config::SyncConfig;
use rust_shared_ar::geometry::RigidTransform;
use rust_shared_ar::marker::{
    profile_for, unmap_pose, CameraIntrinsics, DetectorCorners, DeviceOrientation, QuadCorners,
    RawPose, ViewGeometry,
};
use rust_shared_ar::scene::{NodeKey, NodeKind, PeerId};
use rust_shared_ar::sync::LoopbackHub;
use rust_shared_ar::system::{DeviceSession, FrameInput, SceneSnapshot};

/// A simulated device: its tracking origin and camera, both in room coordinates.
struct SimulatedDevice {
    name: &'static str,
    t_world_room: RigidTransform,
    t_room_camera: RigidTransform,
    orientation: DeviceOrientation,
}

impl SimulatedDevice {
    fn camera_pose(&self) -> RigidTransform {
        self.t_world_room * self.t_room_camera
    }

    fn marker_in_camera(&self, t_room_marker: &RigidTransform) -> RigidTransform {
        self.camera_pose().inverse() * (self.t_world_room * *t_room_marker)
    }

    /// Stand-in for the PnP solver: reports the true marker pose in the
    /// solver's axis convention for this device's orientation.
    fn solver(
        &self,
        t_room_marker: &RigidTransform,
    ) -> Result<impl FnMut(&QuadCorners, f64, &CameraIntrinsics) -> Option<RawPose> + Send> {
        let raw = unmap_pose(
            &self.marker_in_camera(t_room_marker),
            profile_for(self.orientation),
        )?;
        Ok(move |_: &QuadCorners, _: f64, _: &CameraIntrinsics| Some(raw))
    }

    fn frame(&self) -> FrameInput {
        FrameInput {
            camera_pose: self.camera_pose(),
            intrinsics: CameraIntrinsics::new(1500.0, 1500.0, 960.0, 540.0),
            view: ViewGeometry::new(375.0, 667.0, 1080.0, 1920.0),
            orientation: self.orientation,
            detections: vec![DetectorCorners {
                top_left: Point2::new(0.4, 0.6),
                top_right: Point2::new(0.6, 0.6),
                bottom_right: Point2::new(0.6, 0.4),
                bottom_left: Point2::new(0.4, 0.4),
            }],
        }
    }
}

fn print_node(device: &SimulatedDevice, snapshot: &SceneSnapshot, key: &NodeKey) {
    let Some(world) = snapshot.node(key).and_then(|node| node.world) else {
        println!("  {:<6} {} not rendered", device.name, key);
        return;
    };
    let room = device.t_world_room.inverse() * world;
    println!(
        "  {:<6} {}  world [{:+.3}, {:+.3}, {:+.3}]  room [{:+.3}, {:+.3}, {:+.3}]",
        device.name,
        key,
        world.translation.x,
        world.translation.y,
        world.translation.z,
        room.translation.x,
        room.translation.y,
        room.translation.z,
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::from_toml_file(&path)?,
        None => SyncConfig::default(),
    };

    let t_room_marker = RigidTransform {
        rotation: UnitQuaternion::from_euler_angles(-std::f64::consts::FRAC_PI_2, 0.0, 0.3),
        translation: Vector3::new(0.4, 0.75, -1.2),
    };
    let devices = [
        SimulatedDevice {
            name: "ipad",
            t_world_room: RigidTransform {
                rotation: UnitQuaternion::from_euler_angles(0.0, 0.8, 0.0),
                translation: Vector3::new(1.0, -1.4, 2.0),
            },
            t_room_camera: RigidTransform {
                rotation: UnitQuaternion::from_euler_angles(-0.2, 0.1, 0.0),
                translation: Vector3::new(0.3, 1.4, 0.0),
            },
            orientation: DeviceOrientation::Portrait,
        },
        SimulatedDevice {
            name: "iphone",
            t_world_room: RigidTransform {
                rotation: UnitQuaternion::from_euler_angles(0.1, -2.1, 0.05),
                translation: Vector3::new(-3.0, 0.2, 0.5),
            },
            t_room_camera: RigidTransform {
                rotation: UnitQuaternion::from_euler_angles(-0.1, -0.6, 0.0),
                translation: Vector3::new(-0.5, 1.2, -0.3),
            },
            orientation: DeviceOrientation::LandscapeLeft,
        },
    ];

    let hub = LoopbackHub::new();
    let mut sessions = Vec::new();
    let mut inbound = Vec::new();
    for device in &devices {
        let (endpoint, rx) = hub.join(PeerId::new(device.name));
        let session = DeviceSession::spawn(
            base_config.clone().with_device_name(device.name),
            Arc::new(endpoint),
            Box::new(device.solver(&t_room_marker)?),
        )
        .with_context(|| format!("starting session {}", device.name))?;
        sessions.push(session);
        inbound.push(rx);
    }
    let handles: Vec<_> = sessions.iter().map(DeviceSession::handle).collect();

    // Everyone sees the marker, then the first device places an object.
    for ((device, handle), rx) in devices.iter().zip(&handles).zip(&inbound) {
        handle.forward_hub_events(rx)?;
        handle.submit_frame(device.frame())?;
        handle.flush()?;
    }
    handles[0].create_object()?;
    handles[0].flush()?;

    // One more frame each so camera proxies move, then deliver everything.
    for (device, handle) in devices.iter().zip(&handles) {
        handle.submit_frame(device.frame())?;
        handle.flush()?;
    }
    for (handle, rx) in handles.iter().zip(&inbound) {
        handle.forward_hub_events(rx)?;
        handle.flush()?;
    }

    let object = NodeKey::new(base_config.object_kind, "0");
    println!("Object placed by {}:", devices[0].name);
    for (device, handle) in devices.iter().zip(&handles) {
        print_node(device, &handle.snapshot(), &object);
    }

    println!("Camera proxies:");
    for (device, handle) in devices.iter().zip(&handles) {
        let snapshot = handle.snapshot();
        for node in snapshot.nodes.iter().filter(|n| n.key.kind == NodeKind::Camera) {
            print_node(device, &snapshot, &node.key);
        }
    }

    for session in &mut sessions {
        session.shutdown();
    }
    Ok(())
}
