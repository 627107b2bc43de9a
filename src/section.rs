//! Horizontal pixel run sections, the raw material of staff line tracking.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geom::Rect;
use crate::image::BitImage;

/// Integer identifier of a section. Doubles as the index into the section
/// arena built by `sections_from_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

/// One horizontal foreground run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Starting abscissa.
    pub x: i32,
    /// Run length in pixels.
    pub len: i32,
}

impl Run {
    #[inline]
    pub fn stop(&self) -> i32 {
        self.x + self.len - 1
    }

    #[inline]
    pub fn covers(&self, x: i32) -> bool {
        x >= self.x && x <= self.stop()
    }
}

/// A vertical stack of horizontal runs on consecutive rows.
///
/// Sections are immutable once built; bounds and weight are precomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    y_top: i32,
    runs: Vec<Run>,
    bounds: Rect,
    weight: i32,
}

impl Section {
    pub fn new(id: SectionId, y_top: i32, runs: Vec<Run>) -> Self {
        debug_assert!(!runs.is_empty());
        let x0 = runs.iter().map(|r| r.x).min().unwrap_or(0);
        let x1 = runs.iter().map(|r| r.stop()).max().unwrap_or(0);
        let weight = runs.iter().map(|r| r.len).sum();
        let bounds = Rect::new(x0, y_top, x1 - x0 + 1, runs.len() as i32);
        Self { id, y_top, runs, bounds, weight }
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    #[inline]
    pub fn weight(&self) -> i32 {
        self.weight
    }

    #[inline]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    #[inline]
    pub fn y_top(&self) -> i32 {
        self.y_top
    }

    /// First covered abscissa.
    #[inline]
    pub fn start(&self) -> i32 {
        self.bounds.x
    }

    /// Last covered abscissa, inclusive.
    #[inline]
    pub fn stop(&self) -> i32 {
        self.bounds.x + self.bounds.w - 1
    }

    /// Horizontal extent in pixels.
    #[inline]
    pub fn length(&self) -> i32 {
        self.bounds.w
    }

    /// Mean vertical thickness over the covered abscissa range.
    pub fn mean_thickness(&self) -> f64 {
        self.weight as f64 / self.bounds.w as f64
    }

    /// Length over mean thickness; staff line material is strongly elongated.
    pub fn aspect(&self) -> f64 {
        self.bounds.w as f64 / self.mean_thickness()
    }

    /// Ink-weighted centroid.
    pub fn centroid(&self) -> Point2<f64> {
        let mut sx = 0.0;
        let mut sy = 0.0;
        for (row, run) in self.runs.iter().enumerate() {
            let y = (self.y_top + row as i32) as f64;
            sx += run.len as f64 * (run.x as f64 + (run.len as f64 - 1.0) / 2.0);
            sy += run.len as f64 * y;
        }
        let w = self.weight as f64;
        Point2::new(sx / w, sy / w)
    }

    /// Number of rows covering abscissa `x`.
    pub fn thickness_at(&self, x: i32) -> i32 {
        self.runs.iter().filter(|r| r.covers(x)).count() as i32
    }

    /// Mean ordinate of the rows covering abscissa `x`.
    pub fn y_mean_at(&self, x: i32) -> Option<f64> {
        let mut count = 0;
        let mut sum = 0.0;
        for (row, run) in self.runs.iter().enumerate() {
            if run.covers(x) {
                count += 1;
                sum += (self.y_top + row as i32) as f64;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// True when the two sections share an edge or a corner-free 4-adjacency:
    /// runs on the same row touching end to end, or runs on adjacent rows
    /// with a common abscissa range.
    pub fn touches(&self, other: &Section) -> bool {
        if self.bounds.grow(1, 1).x_overlap(&other.bounds) <= 0
            || self.bounds.grow(1, 1).y_overlap(&other.bounds) <= 0
        {
            return false;
        }
        for (row_a, a) in self.runs.iter().enumerate() {
            let ya = self.y_top + row_a as i32;
            for (row_b, b) in other.runs.iter().enumerate() {
                let yb = other.y_top + row_b as i32;
                let dy = (ya - yb).abs();
                if dy > 1 {
                    continue;
                }
                let x_overlap = a.stop().min(b.stop()) - a.x.max(b.x);
                if dy == 1 && x_overlap >= 0 {
                    return true;
                }
                if dy == 0 && (a.stop() + 1 == b.x || b.stop() + 1 == a.x) {
                    return true;
                }
            }
        }
        false
    }
}

/// Maximum length ratio between two runs joined into the same section.
/// A larger jump means a junction with other material and starts a new
/// section, which keeps line sections from absorbing blobs.
const MAX_LENGTH_RATIO: f64 = 1.5;

/// Extracts horizontal run sections from a binary image.
///
/// Runs on consecutive rows are chained into one section as long as the
/// continuation is one-to-one and the run lengths stay comparable; any
/// junction (fork, join, big length jump) starts a new section.
pub fn sections_from_image(img: &BitImage) -> Vec<Section> {
    // Row runs, then per-row index ranges into the flat run list.
    let mut runs: Vec<Run> = Vec::new();
    let mut rows: Vec<(usize, usize)> = Vec::with_capacity(img.h);
    for y in 0..img.h {
        let first = runs.len();
        let mut x = 0usize;
        while x < img.w {
            if !img.get(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x < img.w && img.get(x, y) {
                x += 1;
            }
            runs.push(Run { x: start as i32, len: (x - start) as i32 });
        }
        rows.push((first, runs.len()));
    }

    // chain[i] = run continued one-to-one by run i, usize::MAX at junctions
    let mut chain = vec![usize::MAX; runs.len()];
    for y in 1..img.h {
        let (p0, p1) = rows[y - 1];
        let (c0, c1) = rows[y];
        // Count overlaps in both directions to detect junctions.
        let mut prev_out = vec![0u8; p1 - p0];
        let mut cur_in = vec![0u8; c1 - c0];
        let mut link = vec![usize::MAX; c1 - c0];
        for ci in c0..c1 {
            for pi in p0..p1 {
                if runs[ci].stop().min(runs[pi].stop()) >= runs[ci].x.max(runs[pi].x) {
                    prev_out[pi - p0] = prev_out[pi - p0].saturating_add(1);
                    cur_in[ci - c0] = cur_in[ci - c0].saturating_add(1);
                    link[ci - c0] = pi;
                }
            }
        }
        for ci in c0..c1 {
            let pi = link[ci - c0];
            if pi == usize::MAX || cur_in[ci - c0] != 1 || prev_out[pi - p0] != 1 {
                continue;
            }
            let (la, lb) = (runs[pi].len as f64, runs[ci].len as f64);
            if la.max(lb) / la.min(lb) > MAX_LENGTH_RATIO {
                continue;
            }
            chain[ci] = pi;
        }
    }

    // Materialize sections row by row: a chained run lands in the slot its
    // predecessor already owns, everything else opens a new slot.
    let mut owner = vec![usize::MAX; runs.len()];
    let mut slots: Vec<(i32, Vec<Run>)> = Vec::new(); // (y_top, runs)
    for y in 0..img.h {
        let (c0, c1) = rows[y];
        for ci in c0..c1 {
            if chain[ci] != usize::MAX {
                owner[ci] = owner[chain[ci]];
            } else {
                owner[ci] = slots.len();
                slots.push((y as i32, Vec::new()));
            }
            slots[owner[ci]].1.push(runs[ci]);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, (y_top, runs))| Section::new(SectionId(i as u32), y_top, runs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BinaryBuffer;

    fn line_page() -> BinaryBuffer {
        let mut buf = BinaryBuffer::new(60, 20);
        for y in 4..6 {
            for x in 5..55 {
                buf.set(x, y, true);
            }
        }
        buf
    }

    #[test]
    fn straight_line_is_one_section() {
        let buf = line_page();
        let sections = sections_from_image(&buf.as_view());
        assert_eq!(sections.len(), 1);
        let s = &sections[0];
        assert_eq!(s.length(), 50);
        assert_eq!(s.bounds().h, 2);
        assert_eq!(s.weight(), 100);
        assert!((s.mean_thickness() - 2.0).abs() < 1e-9);
        assert!((s.centroid().y - 4.5).abs() < 1e-9);
    }

    #[test]
    fn crossing_bar_is_cut_into_fragments() {
        let mut buf = line_page();
        // Vertical 3px bar through the line.
        for y in 0..20 {
            for x in 20..23 {
                buf.set(x, y, true);
            }
        }
        let sections = sections_from_image(&buf.as_view());
        // The line rows absorb the bar pixels, so the line stays whole and
        // the bar is cut into a stub above and a stub below.
        assert_eq!(sections.len(), 3, "{sections:?}");
        let long: Vec<_> = sections.iter().filter(|s| s.length() >= 10).collect();
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].length(), 50);
        assert!(sections.iter().any(|s| s.length() == 3 && s.bounds().h == 4));
        assert!(sections.iter().any(|s| s.length() == 3 && s.bounds().h == 14));
    }

    #[test]
    fn thickness_probe_matches_rows() {
        let buf = line_page();
        let sections = sections_from_image(&buf.as_view());
        let s = &sections[0];
        assert_eq!(s.thickness_at(30), 2);
        assert_eq!(s.thickness_at(2), 0);
        assert_eq!(s.y_mean_at(30), Some(4.5));
    }

    #[test]
    fn adjacent_sections_touch() {
        let a = Section::new(SectionId(0), 0, vec![Run { x: 0, len: 5 }]);
        let b = Section::new(SectionId(1), 1, vec![Run { x: 3, len: 5 }]);
        let c = Section::new(SectionId(2), 0, vec![Run { x: 5, len: 2 }]);
        let far = Section::new(SectionId(3), 4, vec![Run { x: 0, len: 5 }]);
        assert!(a.touches(&b));
        assert!(a.touches(&c), "end-to-end runs on the same row touch");
        assert!(!a.touches(&far));
    }
}
