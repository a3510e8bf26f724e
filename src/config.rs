//! Session configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no file)
//! gives the stock behaviour:
//!
//! ```toml
//! device_name = "ipad-kitchen"
//! marker_half_size_m = 0.05
//! object_placement_distance_m = 0.1
//! object_kind = "sphere"
//! broadcast_camera_every_frame = true
//! event_queue_capacity = 64
//! detection_queue_capacity = 2
//! rigid_tolerance = 1e-3
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::scene::{NodeKind, PeerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Peer id this device announces on the transport.
    pub device_name: String,
    /// Half the printed edge length of the marker, in metres.
    pub marker_half_size_m: f64,
    /// New objects appear this far in front of the camera.
    pub object_placement_distance_m: f64,
    /// Kind of node created by a user "place object" action.
    pub object_kind: NodeKind,
    /// Send the camera proxy transform on every frame with an anchor.
    pub broadcast_camera_every_frame: bool,
    /// Capacity of the coordinator's event queue.
    pub event_queue_capacity: usize,
    /// Capacity of the detection worker's frame queue.
    pub detection_queue_capacity: usize,
    /// Orthonormality tolerance for matrices received from peers.
    pub rigid_tolerance: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_name: "device".to_string(),
            marker_half_size_m: 0.05,
            object_placement_distance_m: 0.1,
            object_kind: NodeKind::Sphere,
            broadcast_camera_every_frame: true,
            event_queue_capacity: 64,
            detection_queue_capacity: 2,
            rigid_tolerance: 1e-3,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(text).context("parsing sync config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Same configuration under another peer id.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::new(self.device_name.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.trim().is_empty() || self.device_name.contains(char::is_whitespace) {
            bail!("device_name must be a single non-empty token, got {:?}", self.device_name);
        }
        if !(self.marker_half_size_m.is_finite() && self.marker_half_size_m > 0.0) {
            bail!("marker_half_size_m must be positive, got {}", self.marker_half_size_m);
        }
        if !self.object_placement_distance_m.is_finite() {
            bail!("object_placement_distance_m must be finite");
        }
        if !self.object_kind.is_object() {
            bail!("object_kind must be an object kind, got {}", self.object_kind);
        }
        if self.event_queue_capacity == 0 || self.detection_queue_capacity == 0 {
            bail!("queue capacities must be at least 1");
        }
        if !(self.rigid_tolerance.is_finite() && self.rigid_tolerance > 0.0) {
            bail!("rigid_tolerance must be positive, got {}", self.rigid_tolerance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = SyncConfig::default();
        assert_eq!(config.marker_half_size_m, 0.05);
        assert_eq!(config.object_placement_distance_m, 0.1);
        assert_eq!(config.object_kind, NodeKind::Sphere);
        assert!(config.broadcast_camera_every_frame);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = SyncConfig::from_toml_str(
            r#"
            device_name = "ipad-2"
            marker_half_size_m = 0.075
            broadcast_camera_every_frame = false
            "#,
        )
        .unwrap();
        assert_eq!(config.peer_id(), PeerId::new("ipad-2"));
        assert_eq!(config.marker_half_size_m, 0.075);
        assert!(!config.broadcast_camera_every_frame);
        assert_eq!(config.event_queue_capacity, 64);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SyncConfig::from_toml_str("marker_half_size_m = -1.0").is_err());
        assert!(SyncConfig::from_toml_str("object_kind = \"camera\"").is_err());
        assert!(SyncConfig::from_toml_str("device_name = \"two words\"").is_err());
        assert!(SyncConfig::from_toml_str("event_queue_capacity = 0").is_err());
        assert!(SyncConfig::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(SyncConfig::from_toml_file("/nonexistent/sync.toml").is_err());
    }
}
