//! NodeRegistry - every synthetic node known to this device.
//!
//! Nodes are keyed by [`NodeKey`] and carry their pose relative to the anchor
//! frame, never in device-world coordinates, so a re-detected marker moves
//! them consistently on every device. Nodes are never removed individually;
//! the whole registry is cleared when the tracking session restarts.

use std::collections::HashMap;

use crate::geometry::RigidTransform;

use super::types::{Node, NodeKey, NodeKind, NodeOrigin, PeerId};

/// Result of [`NodeRegistry::update_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The node existed and its transform was replaced.
    Updated,
    /// The node was unknown and has been created on the fly.
    Created,
}

/// Container of local and remote nodes.
pub struct NodeRegistry {
    nodes: HashMap<NodeKey, Node>,
    /// Next candidate id for locally created objects.
    next_local_id: u64,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_local_id: 0,
        }
    }

    /// Allocate a locally-unique id, insert the node and return it.
    ///
    /// Ids come from a monotonic counter. Ids already taken (for example by
    /// a remote peer using the same counter) are skipped rather than
    /// overwritten.
    pub fn create_local(&mut self, kind: NodeKind, transform: RigidTransform) -> &Node {
        let key = loop {
            let candidate = NodeKey::new(kind, self.next_local_id.to_string());
            self.next_local_id += 1;
            if !self.nodes.contains_key(&candidate) {
                break candidate;
            }
        };

        let mut node = Node::new(key.clone(), NodeOrigin::Local);
        node.transform = Some(transform);
        node.revision = 1;
        self.nodes.entry(key).or_insert(node)
    }

    /// Insert a remote node if absent.
    ///
    /// Returns `true` when a node was inserted; repeated creation messages
    /// for the same key are no-ops.
    pub fn create_remote(&mut self, kind: NodeKind, id: &str, peer: &PeerId) -> bool {
        let key = NodeKey::new(kind, id);
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes
            .insert(key.clone(), Node::new(key, NodeOrigin::Remote(peer.clone())));
        true
    }

    /// Replace a node's anchor-relative transform.
    ///
    /// Unknown keys are created on the fly with `origin`; out-of-order
    /// delivery can put a transform ahead of its creation message.
    pub fn update_transform(
        &mut self,
        key: &NodeKey,
        transform: RigidTransform,
        origin: NodeOrigin,
    ) -> UpdateOutcome {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.transform = Some(transform);
                node.revision += 1;
                UpdateOutcome::Updated
            }
            None => {
                let mut node = Node::new(key.clone(), origin);
                node.transform = Some(transform);
                node.revision = 1;
                self.nodes.insert(key.clone(), node);
                UpdateOutcome::Created
            }
        }
    }

    /// Current anchor-relative transform for outbound sync.
    pub fn snapshot_for_broadcast(&self, key: &NodeKey) -> Option<RigidTransform> {
        self.nodes.get(key).and_then(|node| node.transform)
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Local nodes of one kind.
    pub fn local_nodes(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes
            .values()
            .filter(move |node| node.is_local() && node.kind() == kind)
    }

    /// Drop every node and restart the local id counter.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_local_id = 0;
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn at(x: f64) -> RigidTransform {
        RigidTransform::from_translation(Vector3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_create_local_assigns_monotonic_ids() {
        let mut registry = NodeRegistry::new();
        let first = registry.create_local(NodeKind::Sphere, at(1.0)).key.clone();
        let second = registry.create_local(NodeKind::Sphere, at(2.0)).key.clone();

        assert_eq!(first, NodeKey::new(NodeKind::Sphere, "0"));
        assert_eq!(second, NodeKey::new(NodeKind::Sphere, "1"));
        assert_eq!(registry.snapshot_for_broadcast(&second), Some(at(2.0)));
        assert_eq!(registry.local_nodes(NodeKind::Sphere).count(), 2);
    }

    #[test]
    fn test_create_local_skips_ids_taken_by_peers() {
        let mut registry = NodeRegistry::new();
        let peer = PeerId::new("other");
        registry.create_remote(NodeKind::Sphere, "0", &peer);

        let key = registry.create_local(NodeKind::Sphere, at(0.5)).key.clone();
        assert_eq!(key.id, "1");
        // Remote node untouched.
        let remote = registry.get(&NodeKey::new(NodeKind::Sphere, "0")).unwrap();
        assert_eq!(remote.origin, NodeOrigin::Remote(peer));
        assert!(remote.transform.is_none());
    }

    #[test]
    fn test_create_remote_is_idempotent() {
        let peer = PeerId::new("ipad");
        let once = {
            let mut registry = NodeRegistry::new();
            registry.create_remote(NodeKind::Sphere, "3", &peer);
            registry.len()
        };

        let mut registry = NodeRegistry::new();
        assert!(registry.create_remote(NodeKind::Sphere, "3", &peer));
        assert!(!registry.create_remote(NodeKind::Sphere, "3", &peer));
        assert_eq!(registry.len(), once);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_repeated_create_keeps_transform() {
        let peer = PeerId::new("ipad");
        let key = NodeKey::new(NodeKind::Sphere, "3");
        let mut registry = NodeRegistry::new();
        registry.create_remote(NodeKind::Sphere, "3", &peer);
        registry.update_transform(&key, at(4.0), NodeOrigin::Remote(peer.clone()));
        registry.create_remote(NodeKind::Sphere, "3", &peer);

        assert_eq!(registry.snapshot_for_broadcast(&key), Some(at(4.0)));
    }

    #[test]
    fn test_update_unknown_creates_on_the_fly() {
        let mut registry = NodeRegistry::new();
        let peer = PeerId::new("ipad");
        let key = NodeKey::camera(&peer);

        let outcome = registry.update_transform(&key, at(1.0), NodeOrigin::Remote(peer.clone()));
        assert_eq!(outcome, UpdateOutcome::Created);

        let outcome = registry.update_transform(&key, at(2.0), NodeOrigin::Remote(peer));
        assert_eq!(outcome, UpdateOutcome::Updated);

        let node = registry.get(&key).unwrap();
        assert_eq!(node.revision, 2);
        assert_eq!(node.transform, Some(at(2.0)));
    }

    #[test]
    fn test_clear_resets_counter() {
        let mut registry = NodeRegistry::new();
        registry.create_local(NodeKind::Sphere, at(0.0));
        registry.create_local(NodeKind::Sphere, at(0.0));
        registry.clear();
        assert!(registry.is_empty());
        let key = registry.create_local(NodeKind::Sphere, at(0.0)).key.clone();
        assert_eq!(key.id, "0");
    }
}
