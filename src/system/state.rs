//! Per-session state owned by the coordinator thread.
//!
//! `SessionState` is the only writer of the anchor and the node registry.
//! Its handlers are plain synchronous methods, so they can be driven
//! directly in tests without any threads.

use std::collections::BTreeSet;

use nalgebra::Vector3;
use tracing::{debug, info, trace, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::geometry::{AnchorState, RigidTransform};
use crate::scene::{NodeKey, NodeKind, NodeOrigin, NodeRegistry, PeerId, UpdateOutcome};
use crate::sync::{decode, encode, transform_from_matrix, Broadcaster, Delivery, WireMessage};

use super::messages::{FrameInput, MarkerObservation};

/// Running counters, exposed through [`SceneSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub markers_solved: u64,
    pub messages_received: u64,
    /// Inbound messages discarded as malformed or non-rigid.
    pub messages_dropped: u64,
    /// Nodes created because a transform arrived before (or without) its
    /// creation message.
    pub nodes_created_on_the_fly: u64,
    pub messages_sent: u64,
}

/// A node as the render side should draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub key: NodeKey,
    pub origin: NodeOrigin,
    /// T_anchor_node, shared across devices.
    pub relative: Option<RigidTransform>,
    /// T_world_node in this device's world; `None` without an anchor.
    pub world: Option<RigidTransform>,
}

/// Read-only view of the session published after every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSnapshot {
    /// T_world_anchor, once a marker has been seen.
    pub anchor: Option<RigidTransform>,
    pub camera_pose: Option<RigidTransform>,
    /// Sorted by key.
    pub nodes: Vec<RenderedNode>,
    pub peers: Vec<PeerId>,
    pub stats: SessionStats,
}

impl SceneSnapshot {
    pub fn node(&self, key: &NodeKey) -> Option<&RenderedNode> {
        self.nodes.iter().find(|node| &node.key == key)
    }
}

/// Anchor, registry and outbound sync for one tracking session.
pub struct SessionState {
    config: SyncConfig,
    anchor: AnchorState,
    registry: NodeRegistry,
    broadcaster: Broadcaster,
    camera_pose: Option<RigidTransform>,
    peers: BTreeSet<PeerId>,
    stats: SessionStats,
}

impl SessionState {
    pub fn new(config: SyncConfig, broadcaster: Broadcaster) -> Self {
        Self {
            config,
            anchor: AnchorState::new(),
            registry: NodeRegistry::new(),
            broadcaster,
            camera_pose: None,
            peers: BTreeSet::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn anchor(&self) -> &AnchorState {
        &self.anchor
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn camera_pose(&self) -> Option<&RigidTransform> {
        self.camera_pose.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Re-establish the anchor from a solved marker (last detection wins).
    pub fn on_marker(&mut self, observation: &MarkerObservation) {
        let first = !self.anchor.is_established();
        let anchor = self
            .anchor
            .establish(&observation.device_marker, &observation.camera_pose);
        self.camera_pose = Some(observation.camera_pose);
        self.stats.markers_solved += 1;

        let t = anchor.t_world_anchor.translation;
        if first {
            info!("Anchor established at ({:.3}, {:.3}, {:.3})", t.x, t.y, t.z);
        } else {
            debug!(
                detections = self.anchor.detections(),
                "Anchor re-established at ({:.3}, {:.3}, {:.3})",
                t.x,
                t.y,
                t.z
            );
        }
    }

    /// Frame tick: remember the camera and broadcast its anchor-relative pose.
    pub fn on_frame(&mut self, frame: &FrameInput) {
        self.stats.frames += 1;
        self.camera_pose = Some(frame.camera_pose);

        if self.config.broadcast_camera_every_frame {
            match self.anchor.relative_to_anchor(&frame.camera_pose) {
                Ok(relative) => {
                    let camera = NodeKey::camera(&self.config.peer_id());
                    self.send(&WireMessage::transform(&camera, &relative));
                }
                Err(err) => trace!("Camera sync skipped: {}", err),
            }
        }
    }

    /// Place a new object in front of the camera and announce it.
    ///
    /// The object sits `object_placement_distance_m` along the camera's
    /// viewing direction (-Z), axis-aligned with the device world. Without an
    /// anchor there is nothing to express it against, so the action is
    /// skipped.
    pub fn create_object(&mut self, kind: NodeKind) -> Result<NodeKey> {
        if !kind.is_object() {
            return Err(SyncError::malformed(format!("{kind} is not a placeable object")));
        }
        let camera = self.camera_pose.ok_or(SyncError::AnchorUnavailable)?;

        let forward = camera.rotation * -Vector3::z();
        let position = camera.translation + forward * self.config.object_placement_distance_m;
        let relative = self
            .anchor
            .relative_to_anchor(&RigidTransform::from_translation(position))?;

        let key = self.registry.create_local(kind, relative).key.clone();
        info!(
            "Created {} at ({:.3}, {:.3}, {:.3})",
            key, position.x, position.y, position.z
        );

        self.announce(&key, &relative);
        Ok(key)
    }

    /// Apply one message received from `from`.
    ///
    /// Returns the key of the node it touched, `None` for messages this
    /// version ignores. The registry is left untouched on error.
    pub fn on_peer_message(&mut self, from: &PeerId, text: &str) -> Result<Option<NodeKey>> {
        self.stats.messages_received += 1;

        let message = match decode(text) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Ignoring unrecognized message from {}", from);
                return Ok(None);
            }
            Err(err) => {
                self.stats.messages_dropped += 1;
                return Err(err);
            }
        };

        match message {
            WireMessage::Create { kind, id } => {
                if self.registry.create_remote(kind, &id, from) {
                    debug!("{} created {} {}", from, kind, id);
                }
                Ok(Some(NodeKey::new(kind, id)))
            }
            WireMessage::Transform { matrix, kind, id } => {
                let key = match (kind, id) {
                    // Camera proxies are per sender.
                    (NodeKind::Camera, _) => NodeKey::camera(from),
                    (kind, Some(id)) => NodeKey::new(kind, id),
                    (kind, None) => {
                        self.stats.messages_dropped += 1;
                        return Err(SyncError::malformed(format!("{kind} transform without id")));
                    }
                };

                let Some(relative) = transform_from_matrix(&matrix, self.config.rigid_tolerance)
                else {
                    self.stats.messages_dropped += 1;
                    warn!("Dropping non-rigid transform for {} from {}", key, from);
                    return Err(SyncError::malformed("matrix is not a rigid transform"));
                };

                let origin = NodeOrigin::Remote(from.clone());
                if self.registry.update_transform(&key, relative, origin) == UpdateOutcome::Created {
                    self.stats.nodes_created_on_the_fly += 1;
                    debug!(
                        "{}; created on the fly",
                        SyncError::UnknownNodeReference(key.to_string())
                    );
                }
                Ok(Some(key))
            }
        }
    }

    /// New connected-peer set from the transport.
    ///
    /// Newly joined peers get every local object replayed, so objects placed
    /// before they connected still show up on their side.
    pub fn on_peers_changed(&mut self, peers: Vec<PeerId>) {
        let peers: BTreeSet<PeerId> = peers.into_iter().collect();
        let joined: Vec<&PeerId> = peers.difference(&self.peers).collect();
        let replay = !joined.is_empty();

        info!(
            "Peers changed: {:?}",
            peers.iter().map(PeerId::as_str).collect::<Vec<_>>()
        );
        self.peers = peers;

        if replay {
            self.replay_local_objects();
        }
    }

    /// Tracking session restarted: forget the anchor and every node.
    pub fn reset(&mut self) {
        self.anchor.clear();
        self.registry.clear();
        self.camera_pose = None;
        info!("Session reset");
    }

    pub fn scene_snapshot(&self) -> SceneSnapshot {
        let mut nodes: Vec<RenderedNode> = self
            .registry
            .iter()
            .map(|node| RenderedNode {
                key: node.key.clone(),
                origin: node.origin.clone(),
                relative: node.transform,
                world: node
                    .transform
                    .and_then(|relative| self.anchor.to_device_world(&relative).ok()),
            })
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        SceneSnapshot {
            anchor: self.anchor.current().map(|anchor| anchor.t_world_anchor),
            camera_pose: self.camera_pose,
            nodes,
            peers: self.peers.iter().cloned().collect(),
            stats: self.stats.clone(),
        }
    }

    fn replay_local_objects(&mut self) {
        let mut local: Vec<(NodeKey, RigidTransform)> = self
            .registry
            .iter()
            .filter(|node| node.is_local() && node.kind().is_object())
            .filter_map(|node| node.transform.map(|t| (node.key.clone(), t)))
            .collect();
        if local.is_empty() {
            return;
        }
        local.sort_by(|a, b| a.0.cmp(&b.0));

        debug!("Replaying {} local objects to new peers", local.len());
        for (key, relative) in &local {
            self.announce(key, relative);
        }
    }

    /// Creation message followed by the current transform.
    fn announce(&mut self, key: &NodeKey, relative: &RigidTransform) {
        self.send(&WireMessage::Create {
            kind: key.kind,
            id: key.id.clone(),
        });
        self.send(&WireMessage::transform(key, relative));
    }

    fn send(&mut self, message: &WireMessage) {
        if let Delivery::Sent { .. } = self.broadcaster.send(&encode(message)) {
            self.stats.messages_sent += 1;
        }
    }
}
