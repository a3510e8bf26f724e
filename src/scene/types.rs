//! Core ID and node types for the shared scene.

use serde::{Deserialize, Serialize};

use crate::geometry::RigidTransform;

/// Identifier of a connected peer, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Proxy for a device camera; updated every frame.
    Camera,
    /// User-placed sphere object; updated on demand.
    Sphere,
}

impl NodeKind {
    pub const CAMERA_WIRE_NAME: &'static str = "cameraNode";
    pub const SPHERE_WIRE_NAME: &'static str = "sphereNode";

    pub fn wire_name(self) -> &'static str {
        match self {
            NodeKind::Camera => Self::CAMERA_WIRE_NAME,
            NodeKind::Sphere => Self::SPHERE_WIRE_NAME,
        }
    }

    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            Self::CAMERA_WIRE_NAME => Some(NodeKind::Camera),
            Self::SPHERE_WIRE_NAME => Some(NodeKind::Sphere),
            _ => None,
        }
    }

    /// Object kinds carry an explicit id on the wire; camera proxies are
    /// identified by the sending peer.
    pub fn is_object(self) -> bool {
        !matches!(self, NodeKind::Camera)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Stable name of a node: kind plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn camera(peer: &PeerId) -> Self {
        Self::new(NodeKind::Camera, peer.as_str())
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Where a node was created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeOrigin {
    Local,
    Remote(PeerId),
}

/// A synthetic object tracked relative to the anchor frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: NodeKey,
    pub origin: NodeOrigin,
    /// T_anchor_node; `None` until the first transform is known.
    pub transform: Option<RigidTransform>,
    /// Number of transform updates applied.
    pub revision: u64,
}

impl Node {
    pub fn new(key: NodeKey, origin: NodeOrigin) -> Self {
        Self {
            key,
            origin,
            transform: None,
            revision: 0,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.key.kind
    }

    pub fn is_local(&self) -> bool {
        self.origin == NodeOrigin::Local
    }
}
