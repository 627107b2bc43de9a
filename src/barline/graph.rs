//! Graph of bar peaks across staves: alignments, connections, merged-peak
//! splitting and system membership.

use log::{debug, warn};
use nalgebra::Point2;

use crate::barline::{BarStick, PeakAttrs, StaffPeak};
use crate::geom;
use crate::image::{vertical_core, BitImage};
use crate::params::GraphParams;
use crate::scale::Scale;
use crate::skew::Skew;
use crate::staff::{HorizontalSide, StaffInfo, VerticalSide};

/// Edge flavour: geometric candidate, or candidate verified by pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeKind {
    Alignment,
    Connection { gap: i32, white_ratio: f64 },
}

/// Directed edge between a peak and a peak in the staff below.
#[derive(Debug, Clone)]
pub struct BarEdge {
    pub top: usize,
    pub bottom: usize,
    pub kind: EdgeKind,
    /// Slope compatibility impact.
    pub align: f64,
    /// Width compatibility impact.
    pub width: f64,
    pub grade: f64,
    pub alive: bool,
}

impl BarEdge {
    #[inline]
    pub fn is_connection(&self) -> bool {
        matches!(self.kind, EdgeKind::Connection { .. })
    }
}

/// Pixel-resolved graph thresholds.
struct Px {
    max_alignment_slope: f64,
    max_alignment_dwidth: f64,
    max_connection_gap: i32,
    max_connection_white: f64,
    min_bar_curvature: f64,
    max_width_ratio: f64,
    max_close_gap: i32,
    max_first_offset: i32,
    max_split_rounds: usize,
}

impl Px {
    fn new(scale: &Scale, params: &GraphParams) -> Px {
        Px {
            max_alignment_slope: params.max_alignment_slope,
            max_alignment_dwidth: scale.to_pixels_f(params.max_alignment_dwidth),
            max_connection_gap: scale.to_pixels(params.max_connection_gap),
            max_connection_white: params.max_connection_white_ratio,
            min_bar_curvature: scale.to_pixels_f(params.min_bar_curvature),
            max_width_ratio: params.max_width_ratio,
            max_close_gap: scale.to_pixels(params.max_close_gap),
            max_first_offset: scale.to_pixels(params.max_first_offset),
            max_split_rounds: params.max_split_rounds,
        }
    }
}

/// Peak arena plus the alignment/connection graph over adjacent staves.
///
/// Peaks and edges are never freed, only marked dead; the per-staff and
/// per-peak adjacency lists always hold live entries only.
pub struct PeakGraph {
    vert_slope: f64,
    px: Px,
    peaks: Vec<StaffPeak>,
    alive: Vec<bool>,
    /// Live peak ids per staff, sorted by start abscissa.
    staff_peaks: Vec<Vec<usize>>,
    edges: Vec<BarEdge>,
    /// Live edge ids leaving each peak downward.
    outs: Vec<Vec<usize>>,
    /// Live edge ids entering each peak from above.
    ins: Vec<Vec<usize>>,
    tops: Vec<u32>,
}

impl PeakGraph {
    /// Runs the whole graph sequence over the staves' peaks.
    pub fn process(
        img: &BitImage,
        staves: &[StaffInfo],
        peaks_by_staff: Vec<Vec<StaffPeak>>,
        skew: &Skew,
        scale: &Scale,
        params: &GraphParams,
    ) -> PeakGraph {
        let mut g = PeakGraph {
            vert_slope: -skew.slope,
            px: Px::new(scale, params),
            peaks: Vec::new(),
            alive: Vec::new(),
            staff_peaks: vec![Vec::new(); staves.len()],
            edges: Vec::new(),
            outs: Vec::new(),
            ins: Vec::new(),
            tops: Vec::new(),
        };
        for (staff, peaks) in peaks_by_staff.into_iter().enumerate() {
            for peak in peaks {
                let id = g.push_peak(peak);
                g.staff_peaks[staff].push(id);
            }
            g.staff_peaks[staff].sort_by_key(|&id| g.peaks[id].start);
        }

        g.build_sticks(img);
        g.detect_curved();
        g.find_alignments();
        g.find_connections(img);
        g.split_merged_groups(img);
        g.purge_multiple_edges();
        g.tops = g.compute_system_tops(staves);
        g.purge_cross_edges();
        g
    }

    // ----- accessors ------------------------------------------------------

    #[inline]
    pub fn peak(&self, id: usize) -> &StaffPeak {
        &self.peaks[id]
    }

    #[inline]
    pub fn peak_mut(&mut self, id: usize) -> &mut StaffPeak {
        &mut self.peaks[id]
    }

    /// Live peak ids of one staff, left to right.
    pub fn staff_peaks(&self, staff: usize) -> &[usize] {
        &self.staff_peaks[staff]
    }

    /// All live peak ids, grouped by staff.
    pub fn alive_peaks(&self) -> Vec<usize> {
        self.staff_peaks.iter().flatten().copied().collect()
    }

    /// End peak of a staff: leftmost non-brace material on the left side,
    /// rightmost peak on the right side.
    pub fn end_peak(&self, staff: usize, side: HorizontalSide) -> Option<usize> {
        let list = &self.staff_peaks[staff];
        match side {
            HorizontalSide::Left => list.iter().copied().find(|&p| {
                !self.peaks[p].is(PeakAttrs::BRACE) && !self.peaks[p].is(PeakAttrs::BRACKET)
            }),
            HorizontalSide::Right => list.last().copied(),
        }
    }

    pub fn live_edges(&self) -> impl Iterator<Item = &BarEdge> + '_ {
        self.edges.iter().filter(|e| e.alive)
    }

    /// System top staff id for every staff.
    pub fn system_tops(&self) -> &[u32] {
        &self.tops
    }

    // ----- arena upkeep ---------------------------------------------------

    fn push_peak(&mut self, peak: StaffPeak) -> usize {
        self.peaks.push(peak);
        self.alive.push(true);
        self.outs.push(Vec::new());
        self.ins.push(Vec::new());
        self.peaks.len() - 1
    }

    fn add_edge(&mut self, edge: BarEdge) -> usize {
        let idx = self.edges.len();
        self.outs[edge.top].push(idx);
        self.ins[edge.bottom].push(idx);
        self.edges.push(edge);
        idx
    }

    fn kill_edge(&mut self, e: usize) {
        if !self.edges[e].alive {
            return;
        }
        self.edges[e].alive = false;
        let (t, b) = (self.edges[e].top, self.edges[e].bottom);
        self.outs[t].retain(|&x| x != e);
        self.ins[b].retain(|&x| x != e);
    }

    fn kill_peak(&mut self, p: usize) {
        self.alive[p] = false;
        let staff = self.peaks[p].staff as usize;
        self.staff_peaks[staff].retain(|&q| q != p);
        let edges: Vec<usize> = self.ins[p].iter().chain(self.outs[p].iter()).copied().collect();
        for e in edges {
            self.kill_edge(e);
        }
    }

    // ----- stick building and curvature ----------------------------------

    fn build_sticks(&mut self, img: &BitImage) {
        let mut dropped = 0;
        for p in 0..self.peaks.len() {
            match build_stick(img, &self.peaks[p]) {
                Some(stick) => self.peaks[p].core = Some(stick),
                None => {
                    self.kill_peak(p);
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            debug!("peak-graph: {dropped} peaks without pixel core dropped");
        }
    }

    fn detect_curved(&mut self) {
        let mut curved = 0;
        for p in 0..self.peaks.len() {
            if !self.alive[p] {
                continue;
            }
            let radius = match &self.peaks[p].core {
                Some(stick) => stick.curvature_radius(),
                None => continue,
            };
            if radius < self.px.min_bar_curvature {
                self.peaks[p].attrs.insert(PeakAttrs::BRACE);
                curved += 1;
            }
        }
        if curved > 0 {
            debug!("peak-graph: {curved} curved peaks flagged");
        }
    }

    // ----- alignments and connections ------------------------------------

    fn find_alignments(&mut self) {
        let mut found: Vec<BarEdge> = Vec::new();
        for staff in 0..self.staff_peaks.len().saturating_sub(1) {
            for &p1 in &self.staff_peaks[staff] {
                for &p2 in &self.staff_peaks[staff + 1] {
                    if let Some(edge) = self.check_alignment(p1, p2) {
                        found.push(edge);
                    }
                }
            }
        }
        let n = found.len();
        for edge in found {
            self.add_edge(edge);
        }
        debug!("peak-graph: {n} alignments");
    }

    /// Slope and width compatibility of a peak pair in adjacent staves.
    fn check_alignment(&self, p1: usize, p2: usize) -> Option<BarEdge> {
        let a = &self.peaks[p1];
        let b = &self.peaks[p2];
        let d_start =
            (geom::inverted_slope(&a.anchor(true, false), &b.anchor(false, false))
                - self.vert_slope)
                .abs();
        let d_stop = (geom::inverted_slope(&a.anchor(true, true), &b.anchor(false, true))
            - self.vert_slope)
            .abs();
        let d_slope = d_start.min(d_stop);
        if d_slope > self.px.max_alignment_slope {
            return None;
        }
        let d_width = (b.width() - a.width()).abs() as f64;
        if d_width > self.px.max_alignment_dwidth {
            return None;
        }
        let align = 1.0 - d_slope / self.px.max_alignment_slope;
        let width = 1.0 - d_width / self.px.max_alignment_dwidth;
        let grade = (align + width) / 2.0;
        Some(BarEdge { top: p1, bottom: p2, kind: EdgeKind::Alignment, align, width, grade, alive: true })
    }

    fn find_connections(&mut self, img: &BitImage) {
        let mut upgraded = 0;
        for e in 0..self.edges.len() {
            if self.edges[e].alive && self.try_upgrade(img, e) {
                upgraded += 1;
            }
        }
        debug!("peak-graph: {upgraded} connections");
    }

    /// Verifies one alignment against the pixels between the two peaks.
    fn try_upgrade(&mut self, img: &BitImage, e: usize) -> bool {
        let edge = &self.edges[e];
        let a = &self.peaks[edge.top];
        let b = &self.peaks[edge.bottom];
        let data = vertical_core(
            img,
            (a.anchor(true, false), b.anchor(false, false)),
            (a.anchor(true, true), b.anchor(false, true)),
        );
        if data.gap > self.px.max_connection_gap
            || data.white_ratio > self.px.max_connection_white
        {
            return false;
        }
        let gap_impact = 1.0 - data.gap as f64 / self.px.max_connection_gap as f64;
        let white_impact = 1.0 - data.white_ratio / self.px.max_connection_white;
        let edge = &mut self.edges[e];
        edge.kind = EdgeKind::Connection { gap: data.gap, white_ratio: data.white_ratio };
        edge.grade = (edge.align + edge.width + gap_impact + white_impact) / 4.0;
        true
    }

    // ----- merged peak splitting -----------------------------------------

    /// Splits peaks that merged a double bar into one wide column, to a
    /// fixed point with a bounded round count.
    fn split_merged_groups(&mut self, img: &BitImage) {
        let mut candidates: Vec<usize> =
            (0..self.peaks.len()).filter(|&p| self.check_for_split(p).is_some()).collect();
        let mut round = 0;
        while !candidates.is_empty() {
            round += 1;
            if round > self.px.max_split_rounds {
                warn!(
                    "peak-graph: split search stopped after {} rounds",
                    self.px.max_split_rounds
                );
                break;
            }
            let mut impacted: Vec<usize> = Vec::new();
            for p in candidates {
                let Some(mid) = self.check_for_split(p) else { continue };
                if let Some(subs) = self.split_peak(img, p, mid) {
                    for s in subs {
                        impacted.push(s);
                        for &e in self.ins[s].iter().chain(self.outs[s].iter()) {
                            impacted.push(self.edges[e].top);
                            impacted.push(self.edges[e].bottom);
                        }
                    }
                }
            }
            impacted.sort_unstable();
            impacted.dedup();
            candidates =
                impacted.into_iter().filter(|&p| self.check_for_split(p).is_some()).collect();
        }
    }

    /// A split candidate is an isolated peak facing, on one vertical side,
    /// exactly two close partners whose total or span approximates its own
    /// width. Answers the split abscissa.
    fn check_for_split(&self, p: usize) -> Option<i32> {
        if !self.alive[p] || self.is_in_close_group(p) {
            return None;
        }
        let peak = &self.peaks[p];
        let width = peak.width();
        for vertical in [VerticalSide::Top, VerticalSide::Bottom] {
            let edge_ids = match vertical {
                VerticalSide::Top => &self.ins[p],
                VerticalSide::Bottom => &self.outs[p],
            };
            if edge_ids.len() != 2 {
                continue;
            }
            let mut partners: Vec<&StaffPeak> = edge_ids
                .iter()
                .map(|&e| {
                    let edge = &self.edges[e];
                    let q = match vertical {
                        VerticalSide::Top => edge.top,
                        VerticalSide::Bottom => edge.bottom,
                    };
                    &self.peaks[q]
                })
                .collect();
            partners.sort_by_key(|q| q.start);
            let (q1, q2) = (partners[0], partners[1]);
            let (w1, w2) = (q1.width(), q2.width());
            if width <= w1.max(w2) + 2 {
                continue;
            }
            if q2.start - q1.stop + 1 > self.px.max_close_gap {
                continue;
            }
            let total = w1 + w2;
            let span = q2.stop - q1.start + 1;
            let r_total = (total - width).abs() as f64 / total.max(width) as f64;
            let r_span = (span - width).abs() as f64 / span.max(width) as f64;
            if r_total.min(r_span) > self.px.max_width_ratio {
                continue;
            }
            let mid = peak.start + (width as f64 * w1 as f64 / total as f64).round() as i32;
            if mid < peak.start + 1 || mid > peak.stop - 1 {
                continue;
            }
            return Some(mid);
        }
        None
    }

    /// True when the peak stands close to a neighbor inside its own staff.
    fn is_in_close_group(&self, p: usize) -> bool {
        let staff = self.peaks[p].staff as usize;
        let list = &self.staff_peaks[staff];
        let Some(pos) = list.iter().position(|&q| q == p) else {
            return false;
        };
        let close =
            |a: usize, b: usize| self.peaks[b].start - self.peaks[a].stop + 1 <= self.px.max_close_gap;
        (pos > 0 && close(list[pos - 1], p)) || (pos + 1 < list.len() && close(p, list[pos + 1]))
    }

    /// Replaces one wide peak by two sub-peaks split at `mid`, rebuilding
    /// their pixel cores and rediscovering their edges. Aborts (keeping the
    /// original) when a sub-peak yields no core.
    fn split_peak(&mut self, img: &BitImage, p: usize, mid: i32) -> Option<[usize; 2]> {
        let original = self.peaks[p].clone();
        let mut left = original.clone();
        left.stop = mid - 1;
        let mut right = original.clone();
        right.start = mid + 1;
        let left_stick = build_stick(img, &left)?;
        let right_stick = build_stick(img, &right)?;
        left.core = Some(left_stick);
        right.core = Some(right_stick);
        debug!(
            "peak-graph: splitting staff {} peak [{}, {}] at {}",
            original.staff, original.start, original.stop, mid
        );

        self.kill_peak(p);
        let subs = [self.push_peak(left), self.push_peak(right)];
        let staff = original.staff as usize;
        for &np in &subs {
            let start = self.peaks[np].start;
            let pos = self.staff_peaks[staff].partition_point(|&q| self.peaks[q].start < start);
            self.staff_peaks[staff].insert(pos, np);
        }

        let mut new_edges: Vec<usize> = Vec::new();
        for &np in &subs {
            if staff > 0 {
                for q in self.staff_peaks[staff - 1].clone() {
                    if let Some(edge) = self.check_alignment(q, np) {
                        new_edges.push(self.add_edge(edge));
                    }
                }
            }
            if staff + 1 < self.staff_peaks.len() {
                for q in self.staff_peaks[staff + 1].clone() {
                    if let Some(edge) = self.check_alignment(np, q) {
                        new_edges.push(self.add_edge(edge));
                    }
                }
            }
        }
        for e in new_edges {
            self.try_upgrade(img, e);
        }
        Some(subs)
    }

    // ----- purges and systems --------------------------------------------

    /// Keeps at most one live edge per peak and direction, preferring
    /// connections over alignments, then grade.
    fn purge_multiple_edges(&mut self) {
        let mut killed = 0;
        for p in 0..self.peaks.len() {
            if !self.alive[p] {
                continue;
            }
            for outgoing in [true, false] {
                let live: Vec<usize> =
                    if outgoing { self.outs[p].clone() } else { self.ins[p].clone() };
                if live.len() < 2 {
                    continue;
                }
                let best = live
                    .iter()
                    .copied()
                    .max_by(|&a, &b| {
                        let ra = (self.edges[a].is_connection(), self.edges[a].grade);
                        let rb = (self.edges[b].is_connection(), self.edges[b].grade);
                        ra.partial_cmp(&rb).expect("edge grades are finite")
                    })
                    .expect("at least two edges");
                for e in live {
                    if e != best {
                        self.kill_edge(e);
                        killed += 1;
                    }
                }
            }
        }
        if killed > 0 {
            debug!("peak-graph: {killed} extra edges purged");
        }
    }

    /// Propagates system tops downward along connections. A first
    /// connection far from the staff start is trusted only when both
    /// staves also connect at their last peaks.
    fn compute_system_tops(&self, staves: &[StaffInfo]) -> Vec<u32> {
        let mut conns: Vec<usize> = (0..self.edges.len())
            .filter(|&e| self.edges[e].alive && self.edges[e].is_connection())
            .collect();
        conns.sort_by_key(|&e| (self.peaks[self.edges[e].top].staff, self.peaks[self.edges[e].top].start));

        let mut tops: Vec<Option<u32>> = vec![None; staves.len()];
        for e in conns {
            let edge = &self.edges[e];
            let s1 = self.peaks[edge.top].staff as usize;
            let s2 = self.peaks[edge.bottom].staff as usize;
            if tops[s2].is_some() {
                continue;
            }
            let x_offset = self.peaks[edge.bottom].start - staves[s2].left;
            if x_offset > self.px.max_first_offset {
                let is_last = self.last_alive_peak(s2) == Some(edge.bottom);
                if is_last || !self.last_peaks_connected(s1, s2) {
                    debug!(
                        "peak-graph: ignoring distant first connection between staves {s1} and {s2}"
                    );
                    continue;
                }
            }
            tops[s2] = Some(tops[s1].unwrap_or(s1 as u32));
        }
        tops.iter().enumerate().map(|(i, t)| t.unwrap_or(i as u32)).collect()
    }

    fn last_alive_peak(&self, staff: usize) -> Option<usize> {
        self.staff_peaks[staff].last().copied()
    }

    fn last_peaks_connected(&self, s1: usize, s2: usize) -> bool {
        let (Some(l1), Some(l2)) = (self.last_alive_peak(s1), self.last_alive_peak(s2)) else {
            return false;
        };
        self.outs[l1].iter().any(|&e| {
            let edge = &self.edges[e];
            edge.bottom == l2 && edge.is_connection()
        })
    }

    /// Edges between staves of different systems are coincidental.
    fn purge_cross_edges(&mut self) {
        let dead: Vec<usize> = (0..self.edges.len())
            .filter(|&e| {
                let edge = &self.edges[e];
                edge.alive && {
                    let s1 = self.peaks[edge.top].staff as usize;
                    let s2 = self.peaks[edge.bottom].staff as usize;
                    self.tops[s1] != self.tops[s2]
                }
            })
            .collect();
        let n = dead.len();
        for e in dead {
            self.kill_edge(e);
        }
        if n > 0 {
            debug!("peak-graph: {n} cross-system edges removed");
        }
    }
}

/// Mean-abscissa polyline of the ink inside a peak's column range, one
/// point per covered row. `None` when the coverage is too thin to stand
/// for a bar.
fn build_stick(img: &BitImage, peak: &StaffPeak) -> Option<BarStick> {
    let y1 = peak.top.round() as i32;
    let y2 = peak.bottom.round() as i32;
    let x1 = img.x_clamp(peak.start - 1);
    let x2 = img.x_clamp(peak.stop + 1);
    let mut points = Vec::new();
    let mut weight = 0;
    for y in y1..=y2 {
        let yy = img.y_clamp(y) as usize;
        let mut count = 0;
        let mut sum = 0.0;
        for x in x1..=x2 {
            if img.get(x as usize, yy) {
                count += 1;
                sum += x as f64;
            }
        }
        if count > 0 {
            points.push(Point2::new(sum / count as f64, y as f64));
            weight += count;
        }
    }
    let band = (y2 - y1 + 1).max(1);
    if points.len() < 3 || (points.len() as i32) < band / 2 {
        return None;
    }
    Some(BarStick { points, weight })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barline::PeakImpacts;
    use crate::image::BinaryBuffer;
    use crate::params::GraphParams;
    use crate::staff::LineInfo;

    fn staff(id: u32, y_top: f64, left: i32, right: i32) -> StaffInfo {
        let lines = (0..5)
            .map(|i| LineInfo {
                points: vec![
                    Point2::new(left as f64, y_top + 20.0 * i as f64),
                    Point2::new(right as f64, y_top + 20.0 * i as f64),
                ],
                thickness: 2.0,
            })
            .collect();
        StaffInfo { id, lines, left, right, left_bar: None, right_bar: None, brace: None }
    }

    fn peak(staff: u32, start: i32, stop: i32, top: f64, bottom: f64) -> StaffPeak {
        StaffPeak {
            staff,
            start,
            stop,
            top,
            bottom,
            value: 80,
            impacts: PeakImpacts {
                core: 1.0,
                gap: 1.0,
                start_der: 1.0,
                stop_der: 1.0,
                start_chunk: 1.0,
                stop_chunk: 1.0,
            },
            attrs: PeakAttrs::empty(),
            core: None,
        }
    }

    fn bar(buf: &mut BinaryBuffer, x0: usize, x1: usize, y0: usize, y1: usize) {
        for y in y0..y1 {
            for x in x0..x1 {
                buf.set(x, y, true);
            }
        }
    }

    #[test]
    fn connected_bars_share_one_system() {
        let mut buf = BinaryBuffer::new(400, 260);
        // Bars run through both staves and the gap between them.
        bar(&mut buf, 40, 42, 20, 243);
        bar(&mut buf, 358, 360, 20, 243);
        let staves = vec![staff(0, 20.5, 40, 359), staff(1, 160.5, 40, 359)];
        let peaks = vec![
            vec![peak(0, 40, 41, 20.5, 100.5), peak(0, 358, 359, 20.5, 100.5)],
            vec![peak(1, 40, 41, 160.5, 240.5), peak(1, 358, 359, 160.5, 240.5)],
        ];
        let g = PeakGraph::process(
            &buf.as_view(),
            &staves,
            peaks,
            &Skew::new(0.0),
            &Scale::from_interline(20),
            &GraphParams::default(),
        );

        assert_eq!(g.system_tops(), &[0, 0]);
        let connections: Vec<&BarEdge> = g.live_edges().filter(|e| e.is_connection()).collect();
        assert_eq!(connections.len(), 2, "one connection per bar pair");
        for p in g.alive_peaks() {
            assert!(g.outs[p].len() <= 1, "out degree bound");
            assert!(g.ins[p].len() <= 1, "in degree bound");
        }
    }

    #[test]
    fn unconnected_staves_make_separate_systems() {
        let mut buf = BinaryBuffer::new(400, 260);
        // Bars stay inside their own staff, the gap is white.
        bar(&mut buf, 40, 42, 20, 102);
        bar(&mut buf, 40, 42, 160, 243);
        let staves = vec![staff(0, 20.5, 40, 359), staff(1, 160.5, 40, 359)];
        let peaks = vec![
            vec![peak(0, 40, 41, 20.5, 100.5)],
            vec![peak(1, 40, 41, 160.5, 240.5)],
        ];
        let g = PeakGraph::process(
            &buf.as_view(),
            &staves,
            peaks,
            &Skew::new(0.0),
            &Scale::from_interline(20),
            &GraphParams::default(),
        );

        assert_eq!(g.system_tops(), &[0, 1]);
        assert_eq!(g.live_edges().count(), 0, "cross-system alignment must be purged");
    }

    #[test]
    fn merged_double_bar_is_split() {
        let mut buf = BinaryBuffer::new(500, 400);
        // Two upper staves carry a true double bar.
        for y0 in [20usize, 160] {
            bar(&mut buf, 100, 102, y0, y0 + 82);
            bar(&mut buf, 105, 107, y0, y0 + 82);
        }
        // The third staff scanned the pair as one 8 px blob.
        bar(&mut buf, 100, 108, 300, 382);
        let staves = vec![
            staff(0, 20.5, 40, 459),
            staff(1, 160.5, 40, 459),
            staff(2, 300.5, 40, 459),
        ];
        let peaks = vec![
            vec![peak(0, 100, 101, 20.5, 100.5), peak(0, 105, 106, 20.5, 100.5)],
            vec![peak(1, 100, 101, 160.5, 240.5), peak(1, 105, 106, 160.5, 240.5)],
            vec![peak(2, 100, 107, 300.5, 380.5)],
        ];
        let g = PeakGraph::process(
            &buf.as_view(),
            &staves,
            peaks,
            &Skew::new(0.0),
            &Scale::from_interline(20),
            &GraphParams::default(),
        );

        let third: Vec<(i32, i32)> =
            g.staff_peaks(2).iter().map(|&p| (g.peak(p).start, g.peak(p).stop)).collect();
        assert_eq!(third, vec![(100, 103), (105, 107)], "blob must split at the bar boundary");
        for p in g.alive_peaks() {
            assert!(g.outs[p].len() <= 1 && g.ins[p].len() <= 1, "degree bound after purge");
        }
    }
}
