//! Staff model: line curves, abscissa range and side bars.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::cluster::LineCluster;
use crate::filament::{FilamentArena, FilamentId};
use crate::geom::{self, Rect};

/// Horizontal side of a staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalSide {
    Left,
    Right,
}

impl HorizontalSide {
    /// Outward abscissa direction: -1 on the left, +1 on the right.
    #[inline]
    pub fn direction(self) -> i32 {
        match self {
            HorizontalSide::Left => -1,
            HorizontalSide::Right => 1,
        }
    }
}

/// Vertical side of a staff or peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalSide {
    Top,
    Bottom,
}

impl VerticalSide {
    /// Outward ordinate direction: -1 on top, +1 at the bottom.
    #[inline]
    pub fn direction(self) -> i32 {
        match self {
            VerticalSide::Top => -1,
            VerticalSide::Bottom => 1,
        }
    }
}

/// Abscissa range of a vertical stick kept as a staff side bar or brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarInfo {
    pub start: i32,
    pub stop: i32,
}

/// One staff line, sampled from its filament about once per interline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInfo {
    /// Defining points, left to right.
    pub points: Vec<Point2<f64>>,
    /// Mean ink thickness of the line.
    pub thickness: f64,
}

impl LineInfo {
    /// Samples the filament curve at roughly one point per interline,
    /// keeping both extreme abscissae.
    pub fn from_filament(arena: &FilamentArena, fil: FilamentId, interline: i32) -> LineInfo {
        let geom = arena.geometry(fil);
        let b = geom.bounds;
        let count = ((b.w as f64 / interline as f64).round() as i32).max(1);
        let x0 = b.x as f64;
        let x1 = (b.x + b.w - 1) as f64;
        let mut points = Vec::with_capacity(count as usize + 1);
        for k in 0..=count {
            let x = x0 + k as f64 * (x1 - x0) / count as f64;
            points.push(Point2::new(x, arena.y_at(fil, x)));
        }
        LineInfo { points, thickness: geom.mean_thickness }
    }

    #[inline]
    pub fn start(&self) -> Point2<f64> {
        self.points[0]
    }

    #[inline]
    pub fn stop(&self) -> Point2<f64> {
        self.points[self.points.len() - 1]
    }

    /// Line ordinate at `x`: linear between samples, extended along the end
    /// tangents outside the sampled range.
    pub fn y_at(&self, x: f64) -> f64 {
        let pts = &self.points;
        let n = pts.len();
        if n == 1 {
            return pts[0].y;
        }
        if x <= pts[0].x {
            return pts[0].y + (x - pts[0].x) * geom::slope(&pts[0], &pts[1]);
        }
        if x >= pts[n - 1].x {
            return pts[n - 1].y + (x - pts[n - 1].x) * geom::slope(&pts[n - 2], &pts[n - 1]);
        }
        let i = pts.partition_point(|p| p.x <= x).min(n - 1);
        let (a, b) = (&pts[i - 1], &pts[i]);
        a.y + (x - a.x) * (b.y - a.y) / (b.x - a.x)
    }
}

/// A staff: its lines top to bottom, abscissa range, and the bars or brace
/// found at its sides. Immutable after creation except for the side
/// refinement performed by the projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffInfo {
    pub id: u32,
    /// Lines ordered top to bottom.
    pub lines: Vec<LineInfo>,
    /// Leftmost abscissa, refined once side peaks are known.
    pub left: i32,
    /// Rightmost abscissa, inclusive.
    pub right: i32,
    pub left_bar: Option<BarInfo>,
    pub right_bar: Option<BarInfo>,
    pub brace: Option<BarInfo>,
}

impl StaffInfo {
    pub fn from_cluster(id: u32, arena: &FilamentArena, cluster: &LineCluster) -> StaffInfo {
        let lines: Vec<LineInfo> = cluster
            .lines
            .values()
            .map(|&fil| LineInfo::from_filament(arena, fil, cluster.interline))
            .collect();
        let mut left = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        for line in &lines {
            left = left.min(line.start().x);
            right = right.max(line.stop().x);
        }
        StaffInfo {
            id,
            lines,
            left: left.round() as i32,
            right: right.round() as i32,
            left_bar: None,
            right_bar: None,
            brace: None,
        }
    }

    #[inline]
    pub fn first_line(&self) -> &LineInfo {
        &self.lines[0]
    }

    #[inline]
    pub fn last_line(&self) -> &LineInfo {
        &self.lines[self.lines.len() - 1]
    }

    #[inline]
    pub fn abscissa(&self, side: HorizontalSide) -> i32 {
        match side {
            HorizontalSide::Left => self.left,
            HorizontalSide::Right => self.right,
        }
    }

    pub fn set_abscissa(&mut self, side: HorizontalSide, x: i32) {
        match side {
            HorizontalSide::Left => self.left = x,
            HorizontalSide::Right => self.right = x,
        }
    }

    pub fn set_bar(&mut self, side: HorizontalSide, bar: BarInfo) {
        match side {
            HorizontalSide::Left => self.left_bar = Some(bar),
            HorizontalSide::Right => self.right_bar = Some(bar),
        }
    }

    /// Mean abscissa of the line endings on `side`.
    pub fn lines_end(&self, side: HorizontalSide) -> f64 {
        let sum: f64 = self
            .lines
            .iter()
            .map(|l| match side {
                HorizontalSide::Left => l.start().x,
                HorizontalSide::Right => l.stop().x,
            })
            .sum();
        sum / self.lines.len() as f64
    }

    /// Vertical distance between consecutive lines, measured mid-staff.
    pub fn mean_interline(&self) -> f64 {
        let n = self.lines.len();
        if n < 2 {
            return 0.0;
        }
        let xm = (self.left + self.right) as f64 / 2.0;
        (self.last_line().y_at(xm) - self.first_line().y_at(xm)) / (n as f64 - 1.0)
    }

    /// Box around the staff lines between the current abscissa bounds.
    pub fn bounds(&self) -> Rect {
        let mut y0 = f64::INFINITY;
        let mut y1 = f64::NEG_INFINITY;
        for line in &self.lines {
            for p in &line.points {
                y0 = y0.min(p.y);
                y1 = y1.max(p.y);
            }
        }
        let top = y0.floor() as i32;
        let bot = y1.ceil() as i32;
        Rect::new(self.left, top, self.right - self.left + 1, (bot - top + 1).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comb::harvest_combs;
    use crate::params::{ClusterParams, CombParams};
    use crate::scale::Scale;
    use crate::section::{Run, Section, SectionId};
    use crate::skew::Skew;

    #[test]
    fn line_interpolates_between_samples_and_extends_outside() {
        let line = LineInfo {
            points: vec![
                Point2::new(10.0, 100.0),
                Point2::new(30.0, 102.0),
                Point2::new(50.0, 104.0),
            ],
            thickness: 2.0,
        };
        assert!((line.y_at(20.0) - 101.0).abs() < 1e-9);
        assert!((line.y_at(30.0) - 102.0).abs() < 1e-9);
        // Tangent extension beyond both ends.
        assert!((line.y_at(0.0) - 99.0).abs() < 1e-9);
        assert!((line.y_at(60.0) - 105.0).abs() < 1e-9);
    }

    #[test]
    fn staff_from_cluster_reads_top_down() {
        let scale = Scale::from_interline(20);
        let sections: Vec<Section> = (0..5)
            .map(|i| Section::new(SectionId(i), 20 + 20 * i as i32, vec![Run { x: 0, len: 301 }]))
            .collect();
        let mut arena = FilamentArena::new(sections, &scale, 2 * scale.interline);
        let filaments: Vec<FilamentId> = (0..5).map(|i| arena.add(vec![SectionId(i)])).collect();
        let mut harvest =
            harvest_combs(&mut arena, &filaments, 301, &CombParams::default()).unwrap();
        let outcome = crate::cluster::build_clusters(
            &mut arena,
            &mut harvest,
            &filaments,
            &Skew::new(0.0),
            &ClusterParams::default(),
            &scale,
        );
        let staff = StaffInfo::from_cluster(0, &arena, &outcome.clusters[0]);

        assert_eq!(staff.lines.len(), 5);
        assert_eq!((staff.left, staff.right), (0, 300));
        assert!(staff.first_line().y_at(150.0) < staff.last_line().y_at(150.0));
        let interline = staff.mean_interline();
        assert!((interline - 20.0).abs() < 0.2, "mean interline {interline}");
        assert_eq!(staff.bounds().y, 20);
    }
}
