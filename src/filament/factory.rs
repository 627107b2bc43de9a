//! Builds long horizontal filaments out of run sections.
//!
//! The pipeline is: wrap the long slim sections, merge compatible
//! filaments, expand with the leftover short sections, merge once more.
//! Curve and slope purges then weed out material that cannot belong to a
//! staff line.

use std::cmp::Reverse;

use log::debug;
use nalgebra::Point2;

use crate::filament::arena::{FilamentArena, FilamentId};
use crate::geom::{bend_angle, slope};
use crate::params::FilamentParams;
use crate::scale::Scale;
use crate::section::{Section, SectionId};

/// Pixel-resolved merge thresholds.
struct Gaps {
    min_core_length: i32,
    min_section_aspect: f64,
    max_section_thickness: f64,
    max_filament_thickness: f64,
    max_coord_gap: i32,
    max_pos_gap: i32,
    max_overlap_delta_pos: f64,
    max_overlap_space: i32,
    max_expansion_space: i32,
    max_pos_gap_for_slope: f64,
    max_involving_length: f64,
    max_gap_slope: f64,
    max_consistent_ratio: f64,
}

impl Gaps {
    fn new(params: &FilamentParams, scale: &Scale) -> Self {
        Self {
            min_core_length: scale.to_pixels(params.min_core_length),
            min_section_aspect: params.min_section_aspect,
            max_section_thickness: scale.to_line_pixels(params.max_section_thickness) as f64,
            max_filament_thickness: scale.to_line_pixels(params.max_filament_thickness) as f64,
            max_coord_gap: scale.to_pixels(params.max_coord_gap),
            max_pos_gap: scale.to_line_pixels(params.max_pos_gap),
            max_overlap_delta_pos: scale.to_pixels_f(params.max_overlap_delta_pos),
            max_overlap_space: scale.to_pixels(params.max_overlap_space),
            max_expansion_space: scale.to_pixels(params.max_expansion_space),
            max_pos_gap_for_slope: scale.to_pixels_f(params.max_pos_gap_for_slope),
            max_involving_length: scale.to_pixels_f(params.max_involving_length),
            max_gap_slope: params.max_gap_slope,
            max_consistent_ratio: params.max_consistent_ratio,
        }
    }

    fn max_space(&self, expanding: bool) -> i32 {
        if expanding {
            self.max_expansion_space
        } else {
            self.max_overlap_space
        }
    }

    /// Fat sections are compact blobs, not line material.
    fn is_fat(&self, section: &Section) -> bool {
        if section.aspect() >= self.min_section_aspect {
            return false;
        }
        section.mean_thickness() > self.max_section_thickness
    }
}

/// Aggregates the arena sections into candidate staff line filaments.
pub fn build_line_filaments(
    arena: &mut FilamentArena,
    params: &FilamentParams,
    scale: &Scale,
) -> Vec<FilamentId> {
    let gaps = Gaps::new(params, scale);

    // Long slim sections seed the filaments; short slim ones are kept
    // aside for the expansion step; fat ones are out.
    let mut cores: Vec<SectionId> = Vec::new();
    let mut spares: Vec<SectionId> = Vec::new();
    let mut fat = 0usize;
    for s in arena.sections() {
        if gaps.is_fat(s) {
            fat += 1;
        } else if s.length() < gaps.min_core_length {
            spares.push(s.id);
        } else {
            cores.push(s.id);
        }
    }
    debug!(
        "filaments: {} core sections, {} spare, {} fat",
        cores.len(),
        spares.len(),
        fat
    );

    let mut filaments: Vec<FilamentId> =
        cores.into_iter().map(|sid| arena.add(vec![sid])).collect();

    merge_pass(arena, &mut filaments, &gaps);
    expand_pass(arena, &mut filaments, spares, &gaps);
    merge_pass(arena, &mut filaments, &gaps);

    debug!("filaments: {} built", filaments.len());
    filaments
}

/// One round of mutual merges, longest filaments first.
///
/// Each filament is checked against the longer ones only; a successful
/// merge promotes the longer side to candidate and restarts its scan, so
/// chains of dashes collapse into their longest head.
fn merge_pass(arena: &mut FilamentArena, filaments: &mut Vec<FilamentId>, gaps: &Gaps) {
    filaments.sort_by_key(|&id| (Reverse(arena.length(id)), id.0));

    for idx in 0..filaments.len() {
        let current = filaments[idx];
        if !arena.is_root(current) {
            continue;
        }
        let mut candidate = current;
        'candidate: loop {
            let cbox = arena.bounds(candidate).grow(gaps.max_coord_gap, gaps.max_pos_gap);
            for head_idx in 0..idx {
                let head = filaments[head_idx];
                if head == candidate || !arena.is_root(head) {
                    continue;
                }
                if arena.bounds(head).intersects(&cbox)
                    && can_merge(arena, head, candidate, false, gaps)
                {
                    arena.merge(head, candidate);
                    candidate = head;
                    continue 'candidate;
                }
            }
            break;
        }
    }

    filaments.retain(|&id| arena.is_root(id));
}

/// Lets each filament absorb nearby spare sections, longest first.
fn expand_pass(
    arena: &mut FilamentArena,
    filaments: &mut Vec<FilamentId>,
    mut spares: Vec<SectionId>,
    gaps: &Gaps,
) {
    if spares.is_empty() {
        return;
    }
    spares.sort_by_key(|&sid| (arena.section(sid).start(), sid.0));
    let mut spare_fils: Vec<FilamentId> =
        spares.into_iter().map(|sid| arena.add(vec![sid])).collect();

    filaments.sort_by_key(|&id| (Reverse(arena.length(id)), id.0));
    let mut absorbed = 0usize;
    for idx in 0..filaments.len() {
        let fil = filaments[idx];
        loop {
            let fbox = arena.bounds(fil).grow(gaps.max_coord_gap, gaps.max_pos_gap);
            let mut merged_any = false;
            let mut i = 0;
            while i < spare_fils.len() {
                let spare = spare_fils[i];
                let sbox = arena.bounds(spare);
                if sbox.x > fbox.right() {
                    // Spares are sorted on abscissa, none further can fit.
                    break;
                }
                if sbox.intersects(&fbox) && can_merge(arena, fil, spare, true, gaps) {
                    arena.merge(fil, spare);
                    spare_fils.remove(i);
                    absorbed += 1;
                    merged_any = true;
                    break;
                }
                i += 1;
            }
            if !merged_any {
                break;
            }
        }
    }
    debug!("filaments: {} spare sections absorbed", absorbed);
}

/// Whether `one` may absorb `two`.
///
/// `one` is the longer (or expanding) side; thickness consistency is
/// judged against its mean.
fn can_merge(
    arena: &FilamentArena,
    one: FilamentId,
    two: FilamentId,
    expanding: bool,
    gaps: &Gaps,
) -> bool {
    let (one_start, one_stop) = (arena.start_point(one), arena.stop_point(one));
    let (two_start, two_stop) = (arena.start_point(two), arena.stop_point(two));

    let overlap_start = one_start.x.max(two_start.x);
    let overlap_stop = one_stop.x.min(two_stop.x);
    let coord_gap = (overlap_start - overlap_stop) - 1.0;
    if coord_gap > gaps.max_coord_gap as f64 {
        return false;
    }

    if coord_gap < 0.0 {
        // Abscissa overlap: probe a few columns inside it.
        let val_nb = (1.0 - coord_gap / 10.0).min(3.0) as i32;
        for iq in 1..=val_nb {
            let mid = overlap_start - (iq as f64 * coord_gap) / (val_nb as f64 + 1.0);
            let pos_gap = (arena.y_at(one, mid) - arena.y_at(two, mid)).abs();
            if pos_gap > gaps.max_overlap_delta_pos {
                return false;
            }

            let x = mid.round() as i32;
            let (Some((top1, bot1)), Some((top2, bot2))) =
                (arena.row_span_at(one, x), arena.row_span_at(two, x))
            else {
                continue;
            };
            let span = (bot1.max(bot2) - top1.min(top2) + 1) as f64;
            if span > gaps.max_filament_thickness {
                return false;
            }
            if -coord_gap <= gaps.max_involving_length {
                // Short overlaps must not thicken the head inconsistently.
                let mean = arena.geometry(one).mean_thickness;
                let ratio = if mean < 2.0 {
                    2.0 * gaps.max_consistent_ratio
                } else {
                    gaps.max_consistent_ratio
                };
                if span > ratio * mean {
                    return false;
                }
            }
            let space = span - (arena.thickness_at(one, x) + arena.thickness_at(two, x));
            if space > gaps.max_space(expanding) as f64 {
                return false;
            }
        }
        if expanding && gaps.max_expansion_space == 0 && !arena.in_contact(one, two) {
            return false;
        }
    } else {
        // True gap: facing endpoints must be aligned.
        let t1 = arena.geometry(one).mean_thickness;
        let t2 = arena.geometry(two).mean_thickness;
        let pos_margin = (t1.max(t2) / 2.0).round();
        let (stop_pt, start_pt) = if one_start.x < two_start.x {
            (one_stop, two_start)
        } else {
            (two_stop, one_start)
        };
        let pos_gap = (start_pt.y - stop_pt.y).abs() - pos_margin;
        if pos_gap > gaps.max_pos_gap as f64 {
            return false;
        }
        if pos_gap > gaps.max_pos_gap_for_slope {
            let gap_slope = pos_gap / coord_gap;
            if gap_slope > gaps.max_gap_slope {
                return false;
            }
        }
    }

    true
}

/// Removes filaments whose curve bends more than staff lines ever do.
pub fn purge_curved(
    arena: &FilamentArena,
    filaments: &mut Vec<FilamentId>,
    params: &FilamentParams,
) -> usize {
    let before = filaments.len();
    filaments.retain(|&fil| {
        let geom = arena.geometry(fil);
        let x_mid = (geom.start_point.x + geom.stop_point.x) / 2.0;
        let mid = Point2::new(x_mid, arena.y_at(fil, x_mid));
        bend_angle(&geom.start_point, &mid, &geom.stop_point) <= params.max_filament_rotation
    });
    let removed = before - filaments.len();
    if removed > 0 {
        debug!("filaments: purged {removed} curved");
    }
    removed
}

/// Mean slope of the longest filaments, the page-wide line direction.
pub fn global_slope(
    arena: &FilamentArena,
    filaments: &[FilamentId],
    params: &FilamentParams,
) -> f64 {
    if filaments.is_empty() {
        return 0.0;
    }
    let mut by_len = filaments.to_vec();
    by_len.sort_by_key(|&id| (Reverse(arena.length(id)), id.0));
    let top = ((filaments.len() as f64 * params.top_ratio_for_slope).round() as usize)
        .max(1)
        .min(by_len.len());
    let sum: f64 = by_len[..top]
        .iter()
        .map(|&id| {
            let geom = arena.geometry(id);
            slope(&geom.start_point, &geom.stop_point)
        })
        .sum();
    sum / top as f64
}

/// Removes filaments whose slope diverges from the page direction.
///
/// Short filaments get a pass as long as their slope lies between the
/// horizontal and the page slope, since a dash fragment carries little
/// slope information of its own.
pub fn purge_sloped(
    arena: &FilamentArena,
    filaments: &mut Vec<FilamentId>,
    sheet_slope: f64,
    params: &FilamentParams,
    scale: &Scale,
) -> usize {
    let min_length = scale.to_pixels(params.min_length_for_slope_check);
    let half_diff = params.max_slope_diff / 2.0;
    let (min_short, max_short) = if sheet_slope > 0.0 {
        (-half_diff, sheet_slope)
    } else {
        (sheet_slope, half_diff)
    };

    let before = filaments.len();
    filaments.retain(|&fil| {
        let geom = arena.geometry(fil);
        let fil_slope = slope(&geom.start_point, &geom.stop_point);
        if (sheet_slope - fil_slope).abs() <= params.max_slope_diff {
            return true;
        }
        geom.bounds.w < min_length && fil_slope >= min_short && fil_slope <= max_short
    });
    let removed = before - filaments.len();
    if removed > 0 {
        debug!("filaments: purged {removed} off-slope");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BinaryBuffer;
    use crate::section::{sections_from_image, Run};

    fn draw_line(buf: &mut BinaryBuffer, x0: i32, x1: i32, y0: f64, line_slope: f64) {
        for x in x0..x1 {
            let y = (y0 + line_slope * (x - x0) as f64).floor() as i32;
            buf.set(x as usize, y as usize, true);
            buf.set(x as usize, (y + 1) as usize, true);
        }
    }

    fn build(buf: &BinaryBuffer) -> (FilamentArena, Vec<FilamentId>, Scale, FilamentParams) {
        let scale = Scale::from_interline(20);
        let params = FilamentParams::default();
        let sections = sections_from_image(&buf.as_view());
        let mut arena =
            FilamentArena::new(sections, &scale, scale.to_pixels(params.probe_spacing));
        let filaments = build_line_filaments(&mut arena, &params, &scale);
        (arena, filaments, scale, params)
    }

    #[test]
    fn collinear_dashes_merge() {
        let mut buf = BinaryBuffer::new(260, 40);
        draw_line(&mut buf, 0, 100, 10.0, 0.0);
        draw_line(&mut buf, 109, 209, 10.0, 0.0);
        let (arena, filaments, _, _) = build(&buf);
        assert_eq!(filaments.len(), 1, "dashes should merge into one line");
        assert_eq!(arena.length(filaments[0]), 209);
    }

    #[test]
    fn parallel_lines_stay_apart() {
        let mut buf = BinaryBuffer::new(260, 80);
        draw_line(&mut buf, 0, 200, 10.0, 0.0);
        draw_line(&mut buf, 0, 200, 40.0, 0.0);
        let (_, filaments, _, _) = build(&buf);
        assert_eq!(filaments.len(), 2);
    }

    #[test]
    fn expansion_absorbs_short_pieces() {
        let mut buf = BinaryBuffer::new(200, 40);
        draw_line(&mut buf, 0, 150, 10.0, 0.0);
        // Too short to seed a filament on its own.
        draw_line(&mut buf, 158, 170, 10.0, 0.0);
        let (arena, filaments, _, _) = build(&buf);
        assert_eq!(filaments.len(), 1);
        assert_eq!(arena.length(filaments[0]), 170);
        assert_eq!(arena.roots().len(), 1, "the spare piece must be absorbed");
    }

    #[test]
    fn purge_curved_drops_bent_filaments() {
        let scale = Scale::from_interline(20);
        let params = FilamentParams::default();
        let sections = vec![
            Section::new(SectionId(0), 20, vec![Run { x: 0, len: 61 }]),
            Section::new(SectionId(1), 12, vec![Run { x: 70, len: 61 }]),
            Section::new(SectionId(2), 20, vec![Run { x: 140, len: 61 }]),
            Section::new(SectionId(3), 30, vec![Run { x: 0, len: 201 }]),
        ];
        let mut arena =
            FilamentArena::new(sections, &scale, scale.to_pixels(params.probe_spacing));
        let bent = arena.add(vec![SectionId(0), SectionId(1), SectionId(2)]);
        let straight = arena.add(vec![SectionId(3)]);
        let mut filaments = vec![bent, straight];
        let removed = purge_curved(&arena, &mut filaments, &params);
        assert_eq!(removed, 1);
        assert_eq!(filaments, vec![straight]);
    }

    #[test]
    fn page_slope_and_sloped_purge() {
        let mut buf = BinaryBuffer::new(320, 200);
        draw_line(&mut buf, 0, 300, 10.0, 0.02);
        draw_line(&mut buf, 0, 300, 60.0, 0.02);
        // Strongly off the page direction.
        draw_line(&mut buf, 0, 300, 150.0, 0.08);
        let (arena, mut filaments, scale, params) = build(&buf);
        assert_eq!(filaments.len(), 3, "each drawn line should yield one filament");

        let page_slope = global_slope(&arena, &filaments, &params);
        assert!(
            (page_slope - 0.02).abs() < 0.005,
            "page slope should follow the long lines, got {page_slope}"
        );

        let removed = purge_sloped(&arena, &mut filaments, page_slope, &params, &scale);
        assert_eq!(removed, 1, "the off-slope line must go");
        assert_eq!(filaments.len(), 2);
    }
}
