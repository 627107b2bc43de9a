//! Filament arena with union-find merging and lazily computed geometry.

use std::cell::{Cell, OnceCell};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::filament::spline::NaturalSpline;
use crate::geom::Rect;
use crate::scale::Scale;
use crate::section::{Section, SectionId};

/// Index of a filament in its arena.
///
/// Merging never invalidates ids: a merged filament keeps its slot and
/// forwards to its winner through `FilamentArena::ancestor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilamentId(pub u32);

/// A chain of sections treated as one candidate staff line fragment.
#[derive(Debug)]
pub struct Filament {
    pub id: FilamentId,
    members: Vec<SectionId>,
    geom: OnceCell<FilamentGeometry>,
}

/// Geometry derived from the member sections, cached until the next merge.
#[derive(Debug, Clone)]
pub struct FilamentGeometry {
    pub bounds: Rect,
    pub weight: i32,
    /// Sample points, abscissa ascending.
    pub points: Vec<Point2<f64>>,
    pub spline: Option<NaturalSpline>,
    pub start_point: Point2<f64>,
    pub stop_point: Point2<f64>,
    pub mean_thickness: f64,
    /// Weight divided by the typical line thickness, rounded. A better
    /// length estimate than the bounding width for dashed material.
    pub true_length: i32,
}

/// Owns the sections and the filaments built on top of them.
pub struct FilamentArena {
    sections: Vec<Section>,
    filaments: Vec<Filament>,
    parent: Vec<Cell<u32>>,
    interline: i32,
    main_fore: i32,
    /// Spacing between spline sample points, in pixels.
    probe_spacing: i32,
}

impl FilamentArena {
    pub fn new(sections: Vec<Section>, scale: &Scale, probe_spacing: i32) -> Self {
        Self {
            sections,
            filaments: Vec::new(),
            parent: Vec::new(),
            interline: scale.interline,
            main_fore: scale.main_fore,
            probe_spacing: probe_spacing.max(2),
        }
    }

    #[inline]
    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0 as usize]
    }

    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filaments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filaments.is_empty()
    }

    /// Wraps sections into a new filament and returns its id.
    pub fn add(&mut self, members: Vec<SectionId>) -> FilamentId {
        let id = FilamentId(self.filaments.len() as u32);
        self.filaments.push(Filament { id, members, geom: OnceCell::new() });
        self.parent.push(Cell::new(id.0));
        id
    }

    /// Resolves the surviving filament for `id`, compressing the path.
    pub fn ancestor(&self, id: FilamentId) -> FilamentId {
        let mut i = id.0;
        loop {
            let p = self.parent[i as usize].get();
            if p == i {
                return FilamentId(i);
            }
            let gp = self.parent[p as usize].get();
            self.parent[i as usize].set(gp);
            i = p;
        }
    }

    #[inline]
    pub fn is_root(&self, id: FilamentId) -> bool {
        self.parent[id.0 as usize].get() == id.0
    }

    /// All surviving filaments.
    pub fn roots(&self) -> Vec<FilamentId> {
        self.filaments
            .iter()
            .filter(|f| self.is_root(f.id) && !f.members.is_empty())
            .map(|f| f.id)
            .collect()
    }

    /// Makes `winner` absorb `loser`. Both must be surviving filaments.
    pub fn merge(&mut self, winner: FilamentId, loser: FilamentId) {
        debug_assert!(self.is_root(winner) && self.is_root(loser));
        debug_assert_ne!(winner, loser);
        self.parent[loser.0 as usize].set(winner.0);
        let moved = std::mem::take(&mut self.filaments[loser.0 as usize].members);
        let w = &mut self.filaments[winner.0 as usize];
        w.members.extend(moved);
        w.geom = OnceCell::new();
    }

    pub fn members(&self, id: FilamentId) -> &[SectionId] {
        &self.filaments[self.ancestor(id).0 as usize].members
    }

    /// Cached geometry of the surviving filament for `id`.
    pub fn geometry(&self, id: FilamentId) -> &FilamentGeometry {
        let root = self.ancestor(id);
        self.filaments[root.0 as usize]
            .geom
            .get_or_init(|| self.compute_geometry(root))
    }

    #[inline]
    pub fn bounds(&self, id: FilamentId) -> Rect {
        self.geometry(id).bounds
    }

    #[inline]
    pub fn weight(&self, id: FilamentId) -> i32 {
        self.geometry(id).weight
    }

    #[inline]
    pub fn length(&self, id: FilamentId) -> i32 {
        self.geometry(id).bounds.w
    }

    #[inline]
    pub fn true_length(&self, id: FilamentId) -> i32 {
        self.geometry(id).true_length
    }

    #[inline]
    pub fn start_point(&self, id: FilamentId) -> Point2<f64> {
        self.geometry(id).start_point
    }

    #[inline]
    pub fn stop_point(&self, id: FilamentId) -> Point2<f64> {
        self.geometry(id).stop_point
    }

    /// Curve ordinate at `x`, extrapolated past the filament ends.
    pub fn y_at(&self, id: FilamentId, x: f64) -> f64 {
        let geom = self.geometry(id);
        match &geom.spline {
            Some(spline) => spline.y_at(x),
            None => geom.start_point.y,
        }
    }

    /// Curve slope at `x`.
    pub fn slope_at(&self, id: FilamentId, x: f64) -> f64 {
        let geom = self.geometry(id);
        match &geom.spline {
            Some(spline) => spline.slope_at(x),
            None => 0.0,
        }
    }

    /// Ink rows of the filament at abscissa `x`.
    pub fn thickness_at(&self, id: FilamentId, x: i32) -> f64 {
        self.members(id)
            .iter()
            .map(|&sid| self.section(sid).thickness_at(x))
            .sum::<i32>() as f64
    }

    /// Lowest and highest covered row at abscissa `x`, if any ink there.
    pub fn row_span_at(&self, id: FilamentId, x: i32) -> Option<(i32, i32)> {
        let mut span: Option<(i32, i32)> = None;
        for &sid in self.members(id) {
            let s = self.section(sid);
            for (row, run) in s.runs().iter().enumerate() {
                if run.covers(x) {
                    let y = s.y_top() + row as i32;
                    span = Some(match span {
                        None => (y, y),
                        Some((lo, hi)) => (lo.min(y), hi.max(y)),
                    });
                }
            }
        }
        span
    }

    /// True when some member sections of the two filaments are adjacent.
    pub fn in_contact(&self, a: FilamentId, b: FilamentId) -> bool {
        for &sa in self.members(a) {
            let section_a = self.section(sa);
            for &sb in self.members(b) {
                if section_a.touches(self.section(sb)) {
                    return true;
                }
            }
        }
        false
    }

    fn compute_geometry(&self, root: FilamentId) -> FilamentGeometry {
        let members = &self.filaments[root.0 as usize].members;
        debug_assert!(!members.is_empty());
        let mut bounds = self.section(members[0]).bounds();
        let mut weight = 0;
        for &sid in members {
            let s = self.section(sid);
            bounds = bounds.union(&s.bounds());
            weight += s.weight();
        }

        // Per column ink count and ordinate sum over all members.
        let w = bounds.w as usize;
        let mut col_w = vec![0i64; w];
        let mut col_y = vec![0f64; w];
        for &sid in members {
            let s = self.section(sid);
            for (row, run) in s.runs().iter().enumerate() {
                let y = (s.y_top() + row as i32) as f64;
                for x in run.x..=run.stop() {
                    let c = (x - bounds.x) as usize;
                    col_w[c] += 1;
                    col_y[c] += y;
                }
            }
        }

        // Probe windows at regular spacing, tied to both ends.
        let segments = ((bounds.w as f64 / self.probe_spacing as f64).round() as i32).max(1);
        let dx = (bounds.w - 1) as f64 / segments as f64;
        let half = (self.probe_spacing / 2).max(1);
        let mut points: Vec<Point2<f64>> = Vec::with_capacity(segments as usize + 1);
        for k in 0..=segments {
            let px = (k as f64 * dx).round() as i32;
            let lo = (px - half).max(0) as usize;
            let hi = ((px + half) as usize).min(w - 1);
            let mut ink = 0i64;
            let mut sum = 0.0;
            for c in lo..=hi {
                ink += col_w[c];
                sum += col_y[c];
            }
            if ink == 0 {
                continue;
            }
            let x = (bounds.x + px) as f64;
            if points.last().is_some_and(|p| p.x >= x) {
                continue;
            }
            points.push(Point2::new(x, sum / ink as f64));
        }

        let spline = NaturalSpline::fit(&points);
        let x_start = bounds.x as f64;
        let x_stop = (bounds.x + bounds.w - 1) as f64;
        let (y_start, y_stop) = match &spline {
            Some(s) => (s.y_at(x_start), s.y_at(x_stop)),
            None => {
                let y = points.first().map_or(bounds.center().y, |p| p.y);
                (y, y)
            }
        };
        let mean_thickness = weight as f64 / bounds.w as f64;
        let true_length = (weight as f64 / self.main_fore as f64).round() as i32;
        FilamentGeometry {
            bounds,
            weight,
            points,
            spline,
            start_point: Point2::new(x_start, y_start),
            stop_point: Point2::new(x_stop, y_stop),
            mean_thickness,
            true_length,
        }
    }

    #[inline]
    pub fn interline(&self) -> i32 {
        self.interline
    }

    #[inline]
    pub fn main_fore(&self) -> i32 {
        self.main_fore
    }
}
