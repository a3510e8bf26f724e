//! Detector corners → canonical solver quad.
//!
//! ```text
//!    c2 (TL) ───────── c1 (TR)
//!     │                  │
//!     │     marker       │
//!     │                  │
//!    c3 (BL) ───────── c0 (BR)
//! ```
//!
//! The solver expects `[c0, c1, c2, c3]` in this winding no matter how the
//! device is held; the orientation profile supplies both the coordinate
//! mapping and the reordering.

use nalgebra::Point2;

use super::orientation::{CornerRole, OrientationProfile};

/// Minimum |area| (px²) for a quad to be worth solving.
const MIN_QUAD_AREA_PX2: f64 = 1e-6;

/// Raw corners from the barcode detector, in its unit square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorCorners {
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
}

impl DetectorCorners {
    pub fn corner(&self, role: CornerRole) -> Point2<f64> {
        match role {
            CornerRole::TopLeft => self.top_left,
            CornerRole::TopRight => self.top_right,
            CornerRole::BottomRight => self.bottom_right,
            CornerRole::BottomLeft => self.bottom_left,
        }
    }
}

/// View and camera image dimensions in pixels.
///
/// Corners are first placed in view pixels and then rescaled to the camera
/// image resolution, which is what the intrinsics refer to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    pub view_width: f64,
    pub view_height: f64,
    pub image_width: f64,
    pub image_height: f64,
}

impl ViewGeometry {
    pub fn new(view_width: f64, view_height: f64, image_width: f64, image_height: f64) -> Self {
        Self {
            view_width,
            view_height,
            image_width,
            image_height,
        }
    }

    /// View and image share the same pixel grid.
    pub fn view_only(width: f64, height: f64) -> Self {
        Self::new(width, height, width, height)
    }

    fn x_scale(&self) -> f64 {
        self.image_width / self.view_width
    }

    fn y_scale(&self) -> f64 {
        self.image_height / self.view_height
    }
}

/// Four pixel-space corners in canonical order (BR, TR, TL, BL).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadCorners(pub [Point2<f64>; 4]);

impl QuadCorners {
    pub fn points(&self) -> &[Point2<f64>; 4] {
        &self.0
    }

    /// Shoelace area; the sign encodes the winding.
    pub fn signed_area(&self) -> f64 {
        let p = &self.0;
        let mut acc = 0.0;
        for i in 0..4 {
            let a = p[i];
            let b = p[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        0.5 * acc
    }

    /// Coincident or collinear corners; the solver has nothing to work with.
    pub fn is_degenerate(&self) -> bool {
        if !self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return true;
        }
        let coincident = (0..4).any(|i| {
            ((i + 1)..4).any(|j| (self.0[i] - self.0[j]).norm_squared() < MIN_QUAD_AREA_PX2)
        });
        coincident || self.signed_area().abs() < MIN_QUAD_AREA_PX2
    }
}

/// Map detector corners to pixel space and reorder them for the solver.
pub fn normalize_corners(
    raw: &DetectorCorners,
    profile: &OrientationProfile,
    view: &ViewGeometry,
) -> QuadCorners {
    let to_pixels = |p: Point2<f64>| {
        let axes = profile.detector_axes;
        let view_x = axes.x.apply(p.x, p.y) * view.view_width;
        let view_y = axes.y.apply(p.x, p.y) * view.view_height;
        Point2::new(view_x * view.x_scale(), view_y * view.y_scale())
    };

    QuadCorners(profile.corner_permutation.map(|role| to_pixels(raw.corner(role))))
}
