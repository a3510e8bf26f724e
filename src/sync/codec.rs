//! Text wire protocol between peers.
//!
//! Two message shapes, one per transport send:
//!
//! ```text
//! addNode <kind> <id>
//! m11 m12 m13 m14 m21 ... m44 <kind> [<id>]
//! ```
//!
//! The 16 floats are the scene-graph (row-vector) matrix in row-major order:
//! each group of four is one basis vector, and entries 12..14 hold the
//! translation. For our column-vector matrices that is exactly column-major
//! storage. The id follows only for object kinds.
//!
//! Messages are told apart by field count alone (more than 10 fields means a
//! transform). Shapes or kinds this version does not know are dropped
//! silently, so older and newer peers can share a session.

use nalgebra::Matrix4;

use crate::error::{Result, SyncError};
use crate::geometry::RigidTransform;
use crate::scene::{NodeKey, NodeKind};

/// Keyword of the creation message.
pub const ADD_NODE: &str = "addNode";

/// Field count above which a message is read as a transform update.
const TRANSFORM_FIELD_THRESHOLD: usize = 10;

/// Number of matrix entries in a transform update.
pub const MATRIX_FIELDS: usize = 16;

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A peer created a node.
    Create { kind: NodeKind, id: String },
    /// Anchor-relative transform of a node.
    Transform {
        matrix: [f64; MATRIX_FIELDS],
        kind: NodeKind,
        /// Present for object kinds only.
        id: Option<String>,
    },
}

impl WireMessage {
    /// Build a transform update for `key` from its anchor-relative pose.
    ///
    /// Camera ids stay off the wire; receivers key camera proxies by sender.
    pub fn transform(key: &NodeKey, relative: &RigidTransform) -> Self {
        WireMessage::Transform {
            matrix: matrix_from_transform(relative),
            kind: key.kind,
            id: key.kind.is_object().then(|| key.id.clone()),
        }
    }
}

/// Serialize a message to its wire text.
pub fn encode(message: &WireMessage) -> String {
    match message {
        WireMessage::Create { kind, id } => format!("{ADD_NODE} {kind} {id}"),
        WireMessage::Transform { matrix, kind, id } => {
            let mut fields: Vec<String> = matrix.iter().map(|v| format!("{v:?}")).collect();
            fields.push(kind.wire_name().to_string());
            debug_assert!(
                !kind.is_object() || id.is_some(),
                "{kind} transform must carry an id"
            );
            if kind.is_object() {
                if let Some(id) = id {
                    fields.push(id.clone());
                }
            }
            fields.join(" ")
        }
    }
}

/// Parse wire text.
///
/// `Ok(None)` means the message was understood to be something this
/// version ignores; `Err(MalformedMessage)` means it claimed a known shape
/// but did not fit it.
pub fn decode(text: &str) -> Result<Option<WireMessage>> {
    let fields: Vec<&str> = text.split_whitespace().collect();

    if fields.len() > TRANSFORM_FIELD_THRESHOLD {
        return decode_transform(&fields);
    }

    if fields.first() == Some(&ADD_NODE) {
        return decode_create(&fields);
    }

    Ok(None)
}

fn decode_transform(fields: &[&str]) -> Result<Option<WireMessage>> {
    if fields.len() < MATRIX_FIELDS {
        return Err(SyncError::malformed(format!(
            "transform needs {MATRIX_FIELDS} floats, got {} fields",
            fields.len()
        )));
    }

    let mut matrix = [0.0; MATRIX_FIELDS];
    for (slot, field) in matrix.iter_mut().zip(fields.iter()) {
        let value: f64 = field
            .parse()
            .map_err(|_| SyncError::malformed(format!("not a float: {field:?}")))?;
        if !value.is_finite() {
            return Err(SyncError::malformed(format!("non-finite matrix entry: {field:?}")));
        }
        *slot = value;
    }

    let kind_field = fields
        .get(MATRIX_FIELDS)
        .ok_or_else(|| SyncError::malformed("transform without node kind"))?;
    let Some(kind) = NodeKind::from_wire(kind_field) else {
        return Ok(None);
    };

    let id = if kind.is_object() {
        let id = fields
            .get(MATRIX_FIELDS + 1)
            .ok_or_else(|| SyncError::malformed(format!("{kind} transform without id")))?;
        Some((*id).to_string())
    } else {
        None
    };

    Ok(Some(WireMessage::Transform { matrix, kind, id }))
}

fn decode_create(fields: &[&str]) -> Result<Option<WireMessage>> {
    let (Some(kind_field), Some(id)) = (fields.get(1), fields.get(2)) else {
        return Err(SyncError::malformed("addNode needs a kind and an id"));
    };
    Ok(NodeKind::from_wire(kind_field).map(|kind| WireMessage::Create {
        kind,
        id: (*id).to_string(),
    }))
}

/// Wire layout of a rigid transform.
pub fn matrix_from_transform(transform: &RigidTransform) -> [f64; MATRIX_FIELDS] {
    let mut out = [0.0; MATRIX_FIELDS];
    out.copy_from_slice(transform.to_matrix().as_slice());
    out
}

/// Homogeneous matrix from its wire layout. No rigidity check.
pub fn homogeneous_from_wire(matrix: &[f64; MATRIX_FIELDS]) -> Matrix4<f64> {
    Matrix4::from_column_slice(matrix)
}

/// Rigid transform from its wire layout.
///
/// `None` when the entries do not describe a rigid motion within
/// `tolerance` (scale, shear, projective bottom row).
pub fn transform_from_matrix(
    matrix: &[f64; MATRIX_FIELDS],
    tolerance: f64,
) -> Option<RigidTransform> {
    RigidTransform::try_from_matrix(&homogeneous_from_wire(matrix), tolerance)
}
