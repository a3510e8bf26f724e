//! Error taxonomy for the synchronization pipeline.
//!
//! Every variant is recoverable: the pipeline degrades to "skip this frame's
//! update" or "discard this message" and keeps running.

use thiserror::Error;

use crate::marker::DeviceOrientation;

/// Errors produced by the marker, frame and sync stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Wire text does not parse as a known message shape.
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// A message referenced a node that has not been created on this device.
    #[error("unknown node reference: {0}")]
    UnknownNodeReference(String),

    /// No marker has been detected yet, so there is no shared frame.
    #[error("anchor frame unavailable: no marker detected yet")]
    AnchorUnavailable,

    /// The external solver could not produce a pose from the corners.
    #[error("degenerate marker solve")]
    DegenerateSolve,

    /// No peers are connected; there is nobody to broadcast to.
    #[error("no connected peers")]
    TransportUnavailable,

    /// The orientation has no pose remap defined.
    #[error("no pose remap defined for orientation {0:?}")]
    UnsupportedOrientation(DeviceOrientation),

    /// The transport layer rejected a send.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SyncError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Whether the pipeline can continue after this error.
    ///
    /// Always true; kept as an explicit query so callers do not have to
    /// encode the policy themselves.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Result alias for pipeline stages.
pub type Result<T> = std::result::Result<T, SyncError>;
