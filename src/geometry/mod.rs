//! Geometry utilities: rigid transforms and the shared anchor frame.

pub mod frames;
pub mod se3;

pub use frames::{establish_anchor, relative_to_anchor, to_device_world, AnchorFrame, AnchorState};
pub use se3::RigidTransform;
