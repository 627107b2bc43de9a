//! Global page skew and the deskewing rotation.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Global skew of the page, measured as the mean slope dy/dx of the longest
/// staff line filaments.
///
/// `deskewed` rotates a point so that staff lines become horizontal; ordering
/// clusters by their deskewed ordinate is then stable even on tilted scans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skew {
    pub slope: f64,
}

impl Skew {
    pub fn new(slope: f64) -> Self {
        Self { slope }
    }

    /// Rotates `p` by minus the skew angle around the origin.
    pub fn deskewed(&self, p: Point2<f64>) -> Point2<f64> {
        let angle = self.slope.atan();
        let (sin, cos) = angle.sin_cos();
        Point2::new(p.x * cos + p.y * sin, -p.x * sin + p.y * cos)
    }
}
