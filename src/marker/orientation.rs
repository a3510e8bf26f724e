//! Per-orientation axis and ordering rules.
//!
//! The detector reports corners in its own unit square and the solver reports
//! poses in its own axis convention; neither knows how the device is being
//! held. Everything orientation-dependent lives in one static table consulted
//! once per frame.

/// Display orientation reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    Unknown,
}

impl DeviceOrientation {
    pub const ALL: [DeviceOrientation; 5] = [
        DeviceOrientation::Portrait,
        DeviceOrientation::PortraitUpsideDown,
        DeviceOrientation::LandscapeLeft,
        DeviceOrientation::LandscapeRight,
        DeviceOrientation::Unknown,
    ];
}

/// Role of a corner as labelled by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

/// One component of a 2D unit-square mapping: `u` or `1 - u` for a chosen
/// source axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAxis {
    X,
    OneMinusX,
    Y,
    OneMinusY,
}

impl UnitAxis {
    #[inline]
    pub fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            UnitAxis::X => x,
            UnitAxis::OneMinusX => 1.0 - x,
            UnitAxis::Y => y,
            UnitAxis::OneMinusY => 1.0 - y,
        }
    }
}

/// Maps detector unit-square coordinates to view fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorAxes {
    pub x: UnitAxis,
    pub y: UnitAxis,
}

/// Signed source axis for one translation component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSign {
    pub source: usize,
    pub sign: f64,
}

impl AxisSign {
    pub const fn new(source: usize, sign: f64) -> Self {
        Self { source, sign }
    }
}

/// Solver-to-device axis remap for one orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRemap {
    /// Multipliers for (qx, qy, qz); qw is never flipped.
    pub quaternion_sign_flip: [f64; 3],
    /// `t_device[i] = sign * t_solver[source]`.
    pub translation_axis_map: [AxisSign; 3],
}

/// Immutable orientation record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationProfile {
    pub orientation: DeviceOrientation,
    pub detector_axes: DetectorAxes,
    /// Detector corner role that fills canonical slot 0..3
    /// (bottom-right, top-right, top-left, bottom-left).
    pub corner_permutation: [CornerRole; 4],
    /// `None` where no remap is known.
    pub pose_remap: Option<PoseRemap>,
}

impl OrientationProfile {
    pub fn supports_pose(&self) -> bool {
        self.pose_remap.is_some()
    }
}

use CornerRole::{BottomLeft, BottomRight, TopLeft, TopRight};

const UPRIGHT_ORDER: [CornerRole; 4] = [BottomRight, TopRight, TopLeft, BottomLeft];
const HALF_TURN_ORDER: [CornerRole; 4] = [TopLeft, BottomLeft, BottomRight, TopRight];

static PORTRAIT: OrientationProfile = OrientationProfile {
    orientation: DeviceOrientation::Portrait,
    detector_axes: DetectorAxes {
        x: UnitAxis::X,
        y: UnitAxis::OneMinusY,
    },
    corner_permutation: UPRIGHT_ORDER,
    pose_remap: Some(PoseRemap {
        quaternion_sign_flip: [-1.0, -1.0, -1.0],
        translation_axis_map: [
            AxisSign::new(1, 1.0),
            AxisSign::new(0, 1.0),
            AxisSign::new(2, -1.0),
        ],
    }),
};

// TODO: derive the upside-down pose remap on hardware; until then pose
// updates in this orientation are skipped and reported as unsupported.
static PORTRAIT_UPSIDE_DOWN: OrientationProfile = OrientationProfile {
    orientation: DeviceOrientation::PortraitUpsideDown,
    detector_axes: DetectorAxes {
        x: UnitAxis::OneMinusX,
        y: UnitAxis::Y,
    },
    corner_permutation: HALF_TURN_ORDER,
    pose_remap: None,
};

static LANDSCAPE_LEFT: OrientationProfile = OrientationProfile {
    orientation: DeviceOrientation::LandscapeLeft,
    detector_axes: DetectorAxes {
        x: UnitAxis::Y,
        y: UnitAxis::X,
    },
    corner_permutation: UPRIGHT_ORDER,
    pose_remap: Some(PoseRemap {
        quaternion_sign_flip: [-1.0, 1.0, -1.0],
        translation_axis_map: [
            AxisSign::new(0, -1.0),
            AxisSign::new(1, 1.0),
            AxisSign::new(2, -1.0),
        ],
    }),
};

static LANDSCAPE_RIGHT: OrientationProfile = OrientationProfile {
    orientation: DeviceOrientation::LandscapeRight,
    detector_axes: DetectorAxes {
        x: UnitAxis::OneMinusY,
        y: UnitAxis::OneMinusX,
    },
    corner_permutation: HALF_TURN_ORDER,
    pose_remap: Some(PoseRemap {
        quaternion_sign_flip: [1.0, -1.0, -1.0],
        translation_axis_map: [
            AxisSign::new(0, 1.0),
            AxisSign::new(1, -1.0),
            AxisSign::new(2, -1.0),
        ],
    }),
};

// Corner handling falls back to portrait; the pose is never trusted.
static UNKNOWN: OrientationProfile = OrientationProfile {
    orientation: DeviceOrientation::Unknown,
    detector_axes: DetectorAxes {
        x: UnitAxis::X,
        y: UnitAxis::OneMinusY,
    },
    corner_permutation: UPRIGHT_ORDER,
    pose_remap: None,
};

/// Profile lookup. Total over [`DeviceOrientation`].
pub fn profile_for(orientation: DeviceOrientation) -> &'static OrientationProfile {
    match orientation {
        DeviceOrientation::Portrait => &PORTRAIT,
        DeviceOrientation::PortraitUpsideDown => &PORTRAIT_UPSIDE_DOWN,
        DeviceOrientation::LandscapeLeft => &LANDSCAPE_LEFT,
        DeviceOrientation::LandscapeRight => &LANDSCAPE_RIGHT,
        DeviceOrientation::Unknown => &UNKNOWN,
    }
}
