//! Staff projection analysis: thresholds, blank regions and bar peaks.

pub mod projection;

use log::{debug, warn};
use nalgebra::Point2;

use crate::barline::{PeakAttrs, PeakImpacts, StaffPeak};
use crate::image::{vertical_core, BitImage};
use crate::params::ProjectorParams;
use crate::scale::Scale;
use crate::staff::{BarInfo, HorizontalSide, StaffInfo};

pub use self::projection::Projection;

/// Maximal run of columns at or below the blank threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blank {
    pub start: i32,
    pub stop: i32,
}

impl Blank {
    #[inline]
    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }
}

/// Pixel-resolved projector thresholds.
struct Px {
    staff_margin: i32,
    bar_threshold: i32,
    brace_threshold: i32,
    gap_threshold: i32,
    chunk_extra: i32,
    bar_refine_dx: i32,
    chunk_width: i32,
    max_bar_width: i32,
    max_thin_width: i32,
    min_wide_blank: i32,
    min_small_blank: i32,
    max_extremum_left: i32,
    max_extremum_right: i32,
    derivative_ratio: f64,
    top_derivative_count: usize,
    blank_ratio: f64,
    min_grade: f64,
    interline: i32,
}

impl Px {
    fn new(scale: &Scale, params: &ProjectorParams) -> Px {
        Px {
            staff_margin: scale.to_pixels(params.staff_margin),
            bar_threshold: scale.to_pixels(params.bar_threshold),
            brace_threshold: scale.to_pixels(params.brace_threshold),
            gap_threshold: scale.to_pixels(params.gap_threshold),
            chunk_extra: scale.to_pixels(params.chunk_ratio),
            bar_refine_dx: scale.to_pixels(params.bar_refine_dx),
            chunk_width: scale.to_pixels(params.chunk_width).max(1),
            max_bar_width: scale.to_pixels(params.max_bar_width),
            max_thin_width: scale.to_pixels(params.max_thin_width),
            min_wide_blank: scale.to_pixels(params.min_wide_blank_width),
            min_small_blank: scale.to_pixels(params.min_small_blank_width).max(1),
            max_extremum_left: scale.to_pixels(params.max_left_extremum),
            max_extremum_right: scale.to_pixels(params.max_right_extremum),
            derivative_ratio: params.derivative_ratio,
            top_derivative_count: params.top_derivative_count,
            blank_ratio: params.blank_ratio,
            min_grade: params.min_grade,
            interline: scale.interline,
        }
    }
}

/// Projection analysis of one staff.
///
/// Thresholds derive from the measured cumulative line thickness of this
/// staff rather than page-wide constants, so thick and faint staves get
/// consistent treatment.
pub struct StaffProjector {
    staff_id: u32,
    px: Px,
    projection: Projection,
    lines_threshold: i32,
    blank_threshold: i32,
    chunk_threshold: i32,
    min_derivative: i32,
    all_blanks: Vec<Blank>,
    left_blank: Option<Blank>,
    right_blank: Option<Blank>,
    peaks: Vec<StaffPeak>,
}

impl StaffProjector {
    /// Runs the whole projection sequence for one staff.
    pub fn process(
        img: &BitImage,
        staff: &StaffInfo,
        scale: &Scale,
        params: &ProjectorParams,
    ) -> StaffProjector {
        let px = Px::new(scale, params);
        let projection = compute_projection(img, staff, px.staff_margin);
        let mut p = StaffProjector {
            staff_id: staff.id,
            px,
            projection,
            lines_threshold: 0,
            blank_threshold: 0,
            chunk_threshold: 0,
            min_derivative: 0,
            all_blanks: Vec::new(),
            left_blank: None,
            right_blank: None,
            peaks: Vec::new(),
        };
        p.compute_line_thresholds(staff, scale);
        p.find_all_blanks();
        p.select_ending_blanks(staff);
        p.find_peaks(img, staff);
        debug!("projector: staff {} has {} peaks", staff.id, p.peaks.len());
        p
    }

    #[inline]
    pub fn staff(&self) -> u32 {
        self.staff_id
    }

    #[inline]
    pub fn peaks(&self) -> &[StaffPeak] {
        &self.peaks
    }

    /// Hands the peaks over to the graph stage.
    pub fn take_peaks(&mut self) -> Vec<StaffPeak> {
        std::mem::take(&mut self.peaks)
    }

    // ----- thresholds -----------------------------------------------------

    fn compute_line_thresholds(&mut self, staff: &StaffInfo, scale: &Scale) {
        let lines_cumul: f64 = staff.lines.iter().map(|l| l.thickness).sum();
        self.lines_threshold = lines_cumul.round() as i32;
        self.blank_threshold = (self.px.blank_ratio * lines_cumul).floor() as i32;
        self.chunk_threshold = (4 * scale.max_fore).max(self.lines_threshold + self.px.chunk_extra);
        self.min_derivative = self.compute_min_derivative();
    }

    /// Derivative floor, a fraction of the strongest few steps seen on
    /// this projection.
    fn compute_min_derivative(&self) -> i32 {
        let mut ders: Vec<i32> = (self.projection.x_min() + 1..=self.projection.x_max())
            .map(|x| self.projection.derivative(x).abs())
            .collect();
        ders.sort_unstable_by(|a, b| b.cmp(a));
        ders.truncate(self.px.top_derivative_count);
        if ders.is_empty() {
            return 0;
        }
        let mean = ders.iter().sum::<i32>() as f64 / ders.len() as f64;
        (mean * self.px.derivative_ratio).round() as i32
    }

    // ----- blanks ---------------------------------------------------------

    fn find_all_blanks(&mut self) {
        let mut start: Option<i32> = None;
        for x in self.projection.x_min()..=self.projection.x_max() {
            if self.projection.value(x) <= self.blank_threshold {
                start.get_or_insert(x);
            } else if let Some(s) = start.take() {
                self.all_blanks.push(Blank { start: s, stop: x - 1 });
            }
        }
        if let Some(s) = start {
            self.all_blanks.push(Blank { start: s, stop: self.projection.x_max() });
        }
    }

    /// Picks the widest blank on each side as the outer search bound, or
    /// the farthest one when no blank is wide enough.
    fn select_ending_blanks(&mut self, staff: &StaffInfo) {
        for side in [HorizontalSide::Left, HorizontalSide::Right] {
            let end = staff.lines_end(side).round() as i32;
            let mut widest: Option<Blank> = None;
            let mut farthest: Option<Blank> = None;
            for &blank in &self.all_blanks {
                let on_side = match side {
                    HorizontalSide::Left => blank.stop <= end,
                    HorizontalSide::Right => blank.start >= end,
                };
                if !on_side {
                    continue;
                }
                if blank.width() >= self.px.min_wide_blank
                    && widest.map_or(true, |w| blank.width() > w.width())
                {
                    widest = Some(blank);
                }
                let better = match (side, farthest) {
                    (_, None) => true,
                    (HorizontalSide::Left, Some(f)) => blank.start < f.start,
                    (HorizontalSide::Right, Some(f)) => blank.stop > f.stop,
                };
                if better {
                    farthest = Some(blank);
                }
            }
            let chosen = widest.or(farthest);
            match side {
                HorizontalSide::Left => self.left_blank = chosen,
                HorizontalSide::Right => self.right_blank = chosen,
            }
        }
    }

    /// Nearest blank of acceptable width on the outward side of `x_ref`.
    fn nearest_blank(&self, side: HorizontalSide, x_ref: i32) -> Option<Blank> {
        let mut best: Option<Blank> = None;
        for &blank in &self.all_blanks {
            if blank.width() < self.px.min_small_blank {
                continue;
            }
            match side {
                HorizontalSide::Left => {
                    if blank.start <= x_ref && best.map_or(true, |b| blank.stop > b.stop) {
                        best = Some(blank);
                    }
                }
                HorizontalSide::Right => {
                    if blank.stop >= x_ref && best.map_or(true, |b| blank.start < b.start) {
                        best = Some(blank);
                    }
                }
            }
        }
        best
    }

    // ----- peaks ----------------------------------------------------------

    fn find_peaks(&mut self, img: &BitImage, staff: &StaffInfo) {
        let x_start = self.left_blank.map_or(self.projection.x_min(), |b| b.stop);
        let x_stop = self.right_blank.map_or(self.projection.x_max(), |b| b.start);

        let mut run: Option<(i32, i32)> = None;
        for x in x_start..=x_stop {
            let v = self.projection.value(x);
            if v >= self.px.bar_threshold {
                run = Some(match run {
                    None => (x, v),
                    Some((s, m)) => (s, m.max(v)),
                });
            } else if let Some((s, m)) = run.take() {
                if let Some(peak) = self.create_peak(img, staff, s, x - 1, m) {
                    self.peaks.push(peak);
                }
            }
        }
        if let Some((s, m)) = run {
            if let Some(peak) = self.create_peak(img, staff, s, x_stop, m) {
                self.peaks.push(peak);
            }
        }
    }

    /// Refines a raw projection run into a graded peak, or drops it.
    fn create_peak(
        &self,
        img: &BitImage,
        staff: &StaffInfo,
        rstart: i32,
        rstop: i32,
        value: i32,
    ) -> Option<StaffPeak> {
        let (start, start_der, start_chunk) =
            self.refine_peak_side(rstart, rstop, HorizontalSide::Left)?;
        let (stop, stop_der, stop_chunk) =
            self.refine_peak_side(rstart, rstop, HorizontalSide::Right)?;
        if stop < start {
            return None;
        }
        let width = stop - start + 1;
        if width > self.px.max_bar_width {
            return None;
        }

        let x_mid = (start + stop) as f64 / 2.0;
        let top = staff.first_line().y_at(x_mid);
        let bottom = staff.last_line().y_at(x_mid);
        let core_data = vertical_core(
            img,
            (Point2::new(start as f64, top), Point2::new(start as f64, bottom)),
            (Point2::new(stop as f64, top), Point2::new(stop as f64, bottom)),
        );
        if core_data.gap > self.px.gap_threshold {
            return None;
        }

        let impacts = PeakImpacts {
            core: (value - self.px.bar_threshold) as f64
                / (4 * self.px.interline - self.px.bar_threshold) as f64,
            gap: 1.0 - core_data.gap as f64 / self.px.gap_threshold as f64,
            start_der,
            stop_der,
            start_chunk,
            stop_chunk,
        };
        if impacts.grade() < self.px.min_grade {
            return None;
        }

        let mut attrs = PeakAttrs::empty();
        attrs.insert(if width <= self.px.max_thin_width {
            PeakAttrs::THIN
        } else {
            PeakAttrs::THICK
        });
        Some(StaffPeak {
            staff: staff.id,
            start,
            stop,
            top,
            bottom,
            value,
            impacts,
            attrs,
            core: None,
        })
    }

    /// Walks from the middle of a raw peak outward to the extremum of the
    /// projection derivative. Answers (side abscissa, derivative impact,
    /// chunk impact), or rejects the side entirely.
    fn refine_peak_side(
        &self,
        rstart: i32,
        rstop: i32,
        side: HorizontalSide,
    ) -> Option<(i32, f64, f64)> {
        let dir = side.direction();
        let mid = (rstart + rstop) as f64 / 2.0;
        let (x1, x2) = if dir > 0 {
            (mid.ceil() as i32, self.projection.x_clamp(rstop + self.px.bar_refine_dx))
        } else {
            (mid.floor() as i32, self.projection.x_clamp(rstart - self.px.bar_refine_dx))
        };

        let mut best_der = 0;
        let mut best_x: Option<i32> = None;
        let mut x = x1;
        loop {
            let der = self.projection.derivative(x);
            if dir * (best_der - der) > 0 {
                best_der = der;
                best_x = Some(x);
            }
            if x == x2 {
                break;
            }
            x += dir;
        }

        let denom = (self.px.bar_threshold - self.min_derivative).max(1) as f64;
        if best_der.abs() >= self.min_derivative {
            let best_x = best_x?;
            let x = if dir > 0 { best_x - 1 } else { best_x };
            let der_impact = best_der.abs() as f64 / denom;
            let chunk = self.chunk_beside(x, dir);
            let chunk_impact = if chunk < self.lines_threshold {
                1.0
            } else if chunk > self.chunk_threshold {
                // Too much stray ink against this side.
                return None;
            } else {
                (self.chunk_threshold - chunk) as f64
                    / (self.chunk_threshold - self.lines_threshold) as f64
            };
            return Some((x, der_impact, chunk_impact));
        }

        // The peak may run off the measured range at a page border.
        let border = if dir > 0 { self.projection.x_max() } else { self.projection.x_min() };
        if x2 == border && self.projection.value(border) >= self.min_derivative {
            return Some((border, self.projection.value(border) as f64 / denom, 1.0));
        }
        None
    }

    /// Minimum projection value over the few columns just outside `x`.
    fn chunk_beside(&self, x: i32, dir: i32) -> i32 {
        let from = self.projection.x_clamp(x + dir);
        let to = self.projection.x_clamp(x + dir * self.px.chunk_width);
        let mut min = i32::MAX;
        let mut xx = from;
        loop {
            min = min.min(self.projection.value(xx));
            if xx == to {
                break;
            }
            xx += dir;
        }
        min
    }

    // ----- staff side refinement -----------------------------------------

    /// Sets the final staff abscissa on `side`: the end bar when it stands
    /// at or past the line ends, else the nearest blank region.
    pub fn refine_staff_side(
        &self,
        staff: &mut StaffInfo,
        side: HorizontalSide,
        end_peak: Option<&mut StaffPeak>,
    ) {
        let dir = side.direction();
        let lines_end = staff.lines_end(side).round() as i32;
        let staff_end_attr = match side {
            HorizontalSide::Left => PeakAttrs::STAFF_LEFT_END,
            HorizontalSide::Right => PeakAttrs::STAFF_RIGHT_END,
        };

        if let Some(peak) = end_peak {
            let peak_mid = (peak.start + peak.stop) / 2;
            if dir * (peak_mid - lines_end) >= 0 {
                // Bar at or beyond the line ends: the staff stops at the bar.
                let x = if dir < 0 { peak.start } else { peak.stop };
                staff.set_abscissa(side, x);
                peak.set(staff_end_attr);
                staff.set_bar(side, BarInfo { start: peak.start, stop: peak.stop });
                return;
            }
            match self.nearest_blank(side, lines_end) {
                Some(blank) => {
                    let x = match side {
                        HorizontalSide::Left => blank.stop + 1,
                        HorizontalSide::Right => blank.start - 1,
                    };
                    let peak_end = if dir < 0 { peak.start } else { peak.stop };
                    let max_ext = if dir < 0 {
                        self.px.max_extremum_left
                    } else {
                        self.px.max_extremum_right
                    };
                    if dir * (x - peak_end) > max_ext {
                        // Lines clearly extend past the bar.
                        staff.set_abscissa(side, x);
                    } else {
                        staff.set_abscissa(side, peak_mid);
                        peak.set(staff_end_attr);
                        staff.set_bar(side, BarInfo { start: peak.start, stop: peak.stop });
                    }
                }
                None => warn!("projector: staff {} has no clear {side:?} end", staff.id),
            }
            return;
        }

        match self.nearest_blank(side, lines_end) {
            Some(blank) => {
                let x = match side {
                    HorizontalSide::Left => blank.stop + 1,
                    HorizontalSide::Right => blank.start - 1,
                };
                staff.set_abscissa(side, x);
            }
            None => warn!("projector: staff {} has no clear {side:?} end", staff.id),
        }
    }

    // ----- brace ----------------------------------------------------------

    /// Looks for the curved projection bump of a brace left of the staff,
    /// between `min_left` and `max_right`.
    pub fn find_brace_peak(&self, min_left: i32, max_right: i32) -> Option<BarInfo> {
        let min_left = self.projection.x_clamp(min_left);
        let max_right = self.projection.x_clamp(max_right);
        if max_right <= min_left {
            return None;
        }

        // Rightmost run at or above the brace threshold.
        let mut raw_stop = None;
        let mut x = max_right;
        while x >= min_left {
            if self.projection.value(x) >= self.px.brace_threshold {
                raw_stop = Some(x);
                break;
            }
            x -= 1;
        }
        let raw_stop = raw_stop?;
        let mut raw_start = raw_stop;
        while raw_start > min_left && self.projection.value(raw_start - 1) >= self.px.brace_threshold
        {
            raw_start -= 1;
        }

        // A brace needs a blank on its left.
        let left_blank =
            self.all_blanks.iter().filter(|b| b.stop < raw_start).max_by_key(|b| b.stop).copied()?;
        let mut start = left_blank.stop;
        while start > min_left && self.projection.value(start - 1) < self.projection.value(start) {
            start -= 1;
        }

        // Valley between the brace and whatever stands right of it.
        let mut stop = raw_stop;
        let mut best = self.projection.value(raw_stop);
        for x in raw_stop..=max_right {
            let v = self.projection.value(x);
            if v < best {
                best = v;
                stop = x;
            }
        }
        Some(BarInfo { start, stop })
    }
}

/// Ink count per column inside the staff height band, with a horizontal
/// margin past both staff ends.
fn compute_projection(img: &BitImage, staff: &StaffInfo, margin: i32) -> Projection {
    let x_min = img.x_clamp(staff.left - margin);
    let x_max = img.x_clamp(staff.right + margin);
    let mut projection = Projection::new(x_min, x_max);
    for x in x_min..=x_max {
        let y1 = img.y_clamp(staff.first_line().y_at(x as f64).round() as i32);
        let y2 = img.y_clamp(staff.last_line().y_at(x as f64).round() as i32);
        for y in y1..=y2 {
            if img.get(x as usize, y as usize) {
                projection.increment(x);
            }
        }
    }
    projection
}
