//! Small integer-rectangle and line helpers shared across the pipeline.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle with integer pixel coordinates.
///
/// `x`/`y` is the top-left corner; `right()`/`bottom()` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64 && x < self.right() as f64 && y >= self.y as f64 && y < self.bottom() as f64
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            w: self.right().max(other.right()) - x,
            h: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Grows the rectangle by `dx` on both horizontal sides and `dy` on both
    /// vertical sides.
    pub fn grow(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x: self.x - dx,
            y: self.y - dy,
            w: self.w + 2 * dx,
            h: self.h + 2 * dy,
        }
    }

    /// Length of the common x-range, negative when the rectangles are
    /// horizontally apart.
    pub fn x_overlap(&self, other: &Rect) -> i32 {
        self.right().min(other.right()) - self.x.max(other.x)
    }

    /// Horizontal white distance between the rectangles, negative when they
    /// overlap.
    pub fn x_gap(&self, other: &Rect) -> i32 {
        -self.x_overlap(other)
    }

    pub fn y_overlap(&self, other: &Rect) -> i32 {
        self.bottom().min(other.bottom()) - self.y.max(other.y)
    }
}

/// Slope dy/dx of the line through `p1` and `p2`.
pub fn slope(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    (p2.y - p1.y) / (p2.x - p1.x)
}

/// Inverted slope dx/dy, the natural measure for near-vertical sticks.
pub fn inverted_slope(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    (p2.x - p1.x) / (p2.y - p1.y)
}

/// Radius of the circle through three points, `f64::INFINITY` for collinear
/// input.
pub fn circumradius(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let ab = (b - a).norm();
    let bc = (c - b).norm();
    let ca = (a - c).norm();
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    let area2 = cross.abs();
    if area2 < 1e-12 {
        return f64::INFINITY;
    }
    ab * bc * ca / (2.0 * area2)
}

/// Angle (radians) by which the chord `start -> stop` is bent at `mid`.
pub fn bend_angle(start: &Point2<f64>, mid: &Point2<f64>, stop: &Point2<f64>) -> f64 {
    let a1 = (mid.y - start.y).atan2(mid.x - start.x);
    let a2 = (stop.y - mid.y).atan2(stop.x - mid.x);
    let mut d = a2 - a1;
    while d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    }
    while d < -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_and_gap_are_opposite() {
        let a = Rect::new(0, 0, 10, 5);
        let b = Rect::new(8, 0, 10, 5);
        assert_eq!(a.x_overlap(&b), 2);
        assert_eq!(a.x_gap(&b), -2);

        let c = Rect::new(15, 0, 4, 5);
        assert_eq!(a.x_overlap(&c), -5);
        assert_eq!(a.x_gap(&c), 5);
    }

    #[test]
    fn union_covers_both() {
        let a = Rect::new(0, 0, 10, 5);
        let b = Rect::new(20, 3, 5, 10);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0, 0, 25, 13));
    }

    #[test]
    fn circumradius_of_flat_arc_is_large() {
        let r = circumradius(
            &Point2::new(0.0, 0.0),
            &Point2::new(50.0, 0.5),
            &Point2::new(100.0, 0.0),
        );
        assert!(r > 1000.0, "flat arc should have a large radius, got {r}");

        let tight = circumradius(
            &Point2::new(0.0, 0.0),
            &Point2::new(10.0, 10.0),
            &Point2::new(20.0, 0.0),
        );
        assert!(tight < 20.0, "tight arc radius was {tight}");
    }

    #[test]
    fn bend_angle_of_straight_chord_is_zero() {
        let d = bend_angle(
            &Point2::new(0.0, 0.0),
            &Point2::new(5.0, 1.0),
            &Point2::new(10.0, 2.0),
        );
        assert!(d < 1e-9);
    }
}
