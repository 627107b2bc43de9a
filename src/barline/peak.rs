//! Bar peak candidates and their quality bookkeeping.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geom;

/// Attribute bits of a staff peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakAttrs(pub u16);

impl PeakAttrs {
    /// Thin bar candidate.
    pub const THIN: PeakAttrs = PeakAttrs(1);
    /// Thick bar candidate.
    pub const THICK: PeakAttrs = PeakAttrs(1 << 1);
    /// Peak defines the left end of its staff.
    pub const STAFF_LEFT_END: PeakAttrs = PeakAttrs(1 << 2);
    /// Peak defines the right end of its staff.
    pub const STAFF_RIGHT_END: PeakAttrs = PeakAttrs(1 << 3);
    /// Curved core, likely part of a brace.
    pub const BRACE: PeakAttrs = PeakAttrs(1 << 4);
    /// Part of a bracket, not a plain bar.
    pub const BRACKET: PeakAttrs = PeakAttrs(1 << 5);

    #[inline]
    pub fn empty() -> PeakAttrs {
        PeakAttrs(0)
    }

    #[inline]
    pub fn contains(self, other: PeakAttrs) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: PeakAttrs) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: PeakAttrs) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for PeakAttrs {
    type Output = PeakAttrs;

    fn bitor(self, rhs: PeakAttrs) -> PeakAttrs {
        PeakAttrs(self.0 | rhs.0)
    }
}

/// Quality components of a peak, each in [0, 1] once clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakImpacts {
    /// Projection strength above the bar threshold.
    pub core: f64,
    /// Smallness of the largest vertical white gap.
    pub gap: f64,
    /// Derivative sharpness on the start side.
    pub start_der: f64,
    /// Derivative sharpness on the stop side.
    pub stop_der: f64,
    /// Cleanness of the area left of the peak.
    pub start_chunk: f64,
    /// Cleanness of the area right of the peak.
    pub stop_chunk: f64,
}

impl PeakImpacts {
    /// Combined quality, the mean of the clamped impacts.
    pub fn grade(&self) -> f64 {
        let vals = [
            self.core,
            self.gap,
            self.start_der,
            self.stop_der,
            self.start_chunk,
            self.stop_chunk,
        ];
        vals.iter().map(|v| v.clamp(0.0, 1.0)).sum::<f64>() / vals.len() as f64
    }
}

/// Vertical pixel stick backing a peak: mean abscissa per covered row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarStick {
    /// One point per covered row, top to bottom.
    pub points: Vec<Point2<f64>>,
    /// Ink pixels backing the stick.
    pub weight: i32,
}

impl BarStick {
    #[inline]
    pub fn top(&self) -> &Point2<f64> {
        &self.points[0]
    }

    #[inline]
    pub fn bottom(&self) -> &Point2<f64> {
        &self.points[self.points.len() - 1]
    }

    /// Radius of the circle through the stick ends and its middle point;
    /// straight sticks answer infinity.
    pub fn curvature_radius(&self) -> f64 {
        if self.points.len() < 3 {
            return f64::INFINITY;
        }
        let mid = &self.points[self.points.len() / 2];
        geom::circumradius(self.top(), mid, self.bottom())
    }
}

/// A candidate bar line within one staff, spanning the staff height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffPeak {
    /// Owning staff id.
    pub staff: u32,
    /// First abscissa, inclusive.
    pub start: i32,
    /// Last abscissa, inclusive.
    pub stop: i32,
    /// Staff top line ordinate at the peak.
    pub top: f64,
    /// Staff bottom line ordinate at the peak.
    pub bottom: f64,
    /// Projection maximum inside the peak.
    pub value: i32,
    pub impacts: PeakImpacts,
    pub attrs: PeakAttrs,
    /// Pixel core, fitted by the peak graph.
    pub core: Option<BarStick>,
}

impl StaffPeak {
    #[inline]
    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        (self.start + self.stop) as f64 / 2.0
    }

    pub fn grade(&self) -> f64 {
        self.impacts.grade()
    }

    #[inline]
    pub fn is(&self, attr: PeakAttrs) -> bool {
        self.attrs.contains(attr)
    }

    #[inline]
    pub fn set(&mut self, attr: PeakAttrs) {
        self.attrs.insert(attr);
    }

    /// Facing anchor point on the top or bottom edge of the given side.
    pub fn anchor(&self, bottom: bool, right: bool) -> Point2<f64> {
        let x = if right { self.stop as f64 } else { self.start as f64 };
        let y = if bottom { self.bottom } else { self.top };
        Point2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_combine_and_clear() {
        let mut attrs = PeakAttrs::empty();
        assert!(attrs.is_empty());
        attrs.insert(PeakAttrs::THIN | PeakAttrs::STAFF_LEFT_END);
        assert!(attrs.contains(PeakAttrs::THIN));
        assert!(attrs.contains(PeakAttrs::STAFF_LEFT_END));
        assert!(!attrs.contains(PeakAttrs::THICK));
        attrs.remove(PeakAttrs::THIN);
        assert!(!attrs.contains(PeakAttrs::THIN));
        assert!(attrs.contains(PeakAttrs::STAFF_LEFT_END));
    }

    #[test]
    fn straight_stick_has_infinite_radius() {
        let stick = BarStick {
            points: (0..20).map(|y| Point2::new(50.0, y as f64)).collect(),
            weight: 40,
        };
        assert!(stick.curvature_radius().is_infinite());
    }

    #[test]
    fn bowed_stick_has_small_radius() {
        // Brace-like bulge: 10 px deflection over an 80 px span.
        let points: Vec<Point2<f64>> = (0..=80)
            .map(|y| {
                let t = y as f64 / 80.0;
                Point2::new(50.0 - 40.0 * t * (1.0 - t), y as f64)
            })
            .collect();
        let stick = BarStick { points, weight: 160 };
        let radius = stick.curvature_radius();
        assert!(radius < 100.0, "radius {radius}");
    }

    #[test]
    fn grade_is_the_clamped_mean() {
        let impacts = PeakImpacts {
            core: 2.0, // clamps to 1
            gap: 1.0,
            start_der: 0.5,
            stop_der: 0.5,
            start_chunk: 1.0,
            stop_chunk: 0.0,
        };
        assert!((impacts.grade() - 4.0 / 6.0).abs() < 1e-9);
    }
}
