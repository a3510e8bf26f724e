//! Per-device session orchestration.
//!
//! This module contains the `DeviceSession` that spawns the detection worker
//! and the coordinator, the state the coordinator owns, and the messages
//! passed between them.

pub mod messages;
mod session;
pub mod state;


pub use messages::{DetectionJob, FrameInput, MarkerObservation, SessionEvent};
pub use session::{DetectionStage, DeviceSession, SessionHandle};
pub use state::{RenderedNode, SceneSnapshot, SessionState, SessionStats};
