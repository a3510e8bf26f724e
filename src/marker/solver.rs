//! Contract of the external perspective-n-point solver.
//!
//! The numerical solve itself lives outside this crate; the pipeline only
//! depends on this trait and on the shape of its output.

use super::corners::QuadCorners;

/// Pinhole intrinsics for one frame, in camera image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x.
    pub cx: f64,
    /// Principal point y.
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }
}

/// Solver output in the solver's own axis convention (origin at camera).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPose {
    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub t: [f64; 3],
}

impl RawPose {
    pub fn quaternion_norm(&self) -> f64 {
        (self.qw * self.qw + self.qx * self.qx + self.qy * self.qy + self.qz * self.qz).sqrt()
    }
}

/// External PnP solver for a square marker.
///
/// `half_size` is half the printed edge length in meters. Implementations
/// return `None` when the quad is degenerate or the solve fails; the
/// pipeline treats that as "no detection this frame".
pub trait PoseSolver: Send {
    fn solve(
        &mut self,
        corners: &QuadCorners,
        half_size: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Option<RawPose>;
}

impl<F> PoseSolver for F
where
    F: FnMut(&QuadCorners, f64, &CameraIntrinsics) -> Option<RawPose> + Send,
{
    fn solve(
        &mut self,
        corners: &QuadCorners,
        half_size: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Option<RawPose> {
        self(corners, half_size, intrinsics)
    }
}
