//! Parameter types configuring the grid pipeline stages.
//!
//! Most distances are expressed as interline fractions and resolved to
//! pixels against the page [`Scale`](crate::scale::Scale) when a stage
//! starts, so one set of defaults serves every resolution. Thickness-like
//! knobs use line fractions (multiples of the main line thickness) instead.
//!
//! Defaults come from engraving practice and survive sheet music scanned
//! anywhere between 150 and 600 dpi. For tuning, start with the comb
//! jitter and the bar thresholds.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Parameters for building long horizontal filaments out of runs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilamentParams {
    /// Minimum length for a core section, in interline fractions.
    pub min_core_length: f64,
    /// Minimum width / height ratio for a core section.
    pub min_section_aspect: f64,
    /// Maximum thickness for a core section, in line fractions.
    pub max_section_thickness: f64,
    /// Maximum filament thickness at a merge point, in line fractions.
    pub max_filament_thickness: f64,
    /// Maximum vertical shift between two chained candidates, in line
    /// fractions.
    pub max_pos_gap: f64,
    /// Maximum horizontal gap between two chained candidates, in interline
    /// fractions.
    pub max_coord_gap: f64,
    /// Maximum vertical shift when candidates overlap horizontally, in
    /// interline fractions.
    pub max_overlap_delta_pos: f64,
    /// Maximum white space inside a horizontal overlap, in interline
    /// fractions.
    pub max_overlap_space: f64,
    /// Maximum white space when expanding a filament, in interline
    /// fractions.
    pub max_expansion_space: f64,
    /// Position gap below which the slope test is skipped, in interline
    /// fractions.
    pub max_pos_gap_for_slope: f64,
    /// Filament span involved in the gap slope estimate, in interline
    /// fractions.
    pub max_involving_length: f64,
    /// Maximum slope of the virtual line joining two candidates across a gap.
    pub max_gap_slope: f64,
    /// Maximum thickness ratio between merged candidates.
    pub max_consistent_ratio: f64,
    /// Share of the longest filaments used for the global slope estimate.
    pub top_ratio_for_slope: f64,
    /// Maximum bend angle along a kept filament, in radians.
    pub max_filament_rotation: f64,
    /// Maximum deviation from the global slope for a kept filament.
    pub max_slope_diff: f64,
    /// Minimum filament length for the slope check to apply, in interline
    /// fractions.
    pub min_length_for_slope_check: f64,
    /// Spacing between spline probes, in interline fractions.
    pub probe_spacing: f64,
}

impl Default for FilamentParams {
    fn default() -> Self {
        Self {
            min_core_length: 1.0,
            min_section_aspect: 3.0,
            max_section_thickness: 1.5,
            max_filament_thickness: 1.5,
            max_pos_gap: 0.75,
            max_coord_gap: 1.0,
            max_overlap_delta_pos: 0.5,
            max_overlap_space: 0.16,
            max_expansion_space: 0.02,
            max_pos_gap_for_slope: 0.1,
            max_involving_length: 2.0,
            max_gap_slope: 0.5,
            max_consistent_ratio: 1.7,
            top_ratio_for_slope: 0.1,
            max_filament_rotation: 0.1,
            max_slope_diff: 0.025,
            min_length_for_slope_check: 4.0,
            probe_spacing: 2.0,
        }
    }
}

/// Parameters for sampling filament combs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CombParams {
    /// Abscissa step between sample columns, in interline fractions.
    pub sampling_dx: f64,
    /// Tolerated relative deviation around one interline between comb
    /// neighbors.
    pub max_jitter: f64,
    /// Smallest acceptable popular comb length.
    pub min_line_count: usize,
    /// Largest acceptable popular comb length.
    pub max_line_count: usize,
}

impl Default for CombParams {
    fn default() -> Self {
        Self { sampling_dx: 1.0, max_jitter: 0.1, min_line_count: 4, max_line_count: 6 }
    }
}

/// Parameters for aggregating combs into line clusters.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Horizontal margin when looking up cluster ordinates for an isolated
    /// filament, in interline fractions.
    pub max_expand_dx: f64,
    /// Maximum ordinate shift for absorbing an isolated filament, in
    /// interline fractions.
    pub max_expand_dy: f64,
    /// Maximum horizontal gap between merged clusters, in interline
    /// fractions.
    pub max_merge_dx: f64,
    /// Maximum line-to-line ordinate shift between merged clusters, in
    /// interline fractions.
    pub max_merge_dy: f64,
    /// Maximum center ordinate shift when pairing trimmed clusters, in
    /// interline fractions.
    pub max_merge_center_dy: f64,
    /// Vertical margin around a cluster box during expansion, in interline
    /// fractions.
    pub cluster_y_margin: f64,
    /// Minimum cluster true length, as a ratio of the median cluster
    /// length.
    pub min_cluster_length_ratio: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_expand_dx: 2.0,
            max_expand_dy: 0.175,
            max_merge_dx: 10.0,
            max_merge_dy: 0.4,
            max_merge_center_dy: 1.0,
            cluster_y_margin: 2.0,
            min_cluster_length_ratio: 0.3,
        }
    }
}

/// Parameters for the per-staff vertical projection and peak extraction.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProjectorParams {
    /// Abscissa margin explored beyond the staff ends, in interline
    /// fractions.
    pub staff_margin: f64,
    /// Share of the cumulated line thickness below which a column reads as
    /// blank.
    pub blank_ratio: f64,
    /// Extra height over the staff lines for the chunk threshold, in
    /// interline fractions.
    pub chunk_ratio: f64,
    /// Minimum cumulated height for a peak column, in interline fractions.
    pub bar_threshold: f64,
    /// Minimum cumulated height for brace material, in interline fractions.
    pub brace_threshold: f64,
    /// Maximum vertical white gap inside a bar, in interline fractions.
    pub gap_threshold: f64,
    /// Share of the mean top derivative kept as the minimum side
    /// derivative.
    pub derivative_ratio: f64,
    /// Number of top derivatives averaged for the derivative threshold.
    pub top_derivative_count: usize,
    /// Abscissa margin explored when refining a peak side, in interline
    /// fractions.
    pub bar_refine_dx: f64,
    /// Width of the chunk window beside a peak, in interline fractions.
    pub chunk_width: f64,
    /// Maximum width for any bar peak, in interline fractions.
    pub max_bar_width: f64,
    /// Maximum width for a thin bar peak, in interline fractions.
    pub max_thin_width: f64,
    /// Minimum width for an ending blank region, in interline fractions.
    pub min_wide_blank_width: f64,
    /// Minimum width for any usable blank region, in interline fractions.
    pub min_small_blank_width: f64,
    /// Maximum distance of a left end peak past the staff lines, in
    /// interline fractions.
    pub max_left_extremum: f64,
    /// Maximum distance of a right end peak past the staff lines, in
    /// interline fractions.
    pub max_right_extremum: f64,
    /// Minimum peak grade.
    pub min_grade: f64,
}

impl Default for ProjectorParams {
    fn default() -> Self {
        Self {
            staff_margin: 10.0,
            blank_ratio: 0.5,
            chunk_ratio: 0.4,
            bar_threshold: 2.5,
            brace_threshold: 1.1,
            gap_threshold: 0.6,
            derivative_ratio: 0.3,
            top_derivative_count: 5,
            bar_refine_dx: 0.25,
            chunk_width: 0.15,
            max_bar_width: 1.5,
            max_thin_width: 0.3,
            min_wide_blank_width: 2.0,
            min_small_blank_width: 0.1,
            max_left_extremum: 0.15,
            max_right_extremum: 0.3,
            min_grade: 0.1,
        }
    }
}

/// Parameters for the cross-staff peak graph.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    /// Maximum deviation between a peak alignment and the vertical slope.
    pub max_alignment_slope: f64,
    /// Maximum width difference between aligned peaks, in interline
    /// fractions.
    pub max_alignment_dwidth: f64,
    /// Maximum vertical white gap inside a connection, in interline
    /// fractions.
    pub max_connection_gap: f64,
    /// Maximum white ratio inside a connection.
    pub max_connection_white_ratio: f64,
    /// Curvature radius below which a peak reads as brace material, in
    /// interline fractions.
    pub min_bar_curvature: f64,
    /// Maximum relative width excess for splitting a merged peak.
    pub max_width_ratio: f64,
    /// Maximum abscissa gap inside a close peak group, in interline
    /// fractions.
    pub max_close_gap: f64,
    /// Maximum abscissa offset of a trusted first connection, in interline
    /// fractions.
    pub max_first_offset: f64,
    /// Hard bound on merged-peak split rounds.
    pub max_split_rounds: usize,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            max_alignment_slope: 0.06,
            max_alignment_dwidth: 0.6,
            max_connection_gap: 2.0,
            max_connection_white_ratio: 0.35,
            min_bar_curvature: 10.0,
            max_width_ratio: 0.3,
            max_close_gap: 0.4,
            max_first_offset: 2.0,
            max_split_rounds: 10,
        }
    }
}

/// Engine-wide parameters grouping every pipeline stage.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub filament: FilamentParams,
    pub comb: CombParams,
    pub cluster: ClusterParams,
    pub projector: ProjectorParams,
    pub graph: GraphParams,
}

impl GridParams {
    /// Loads parameters from a JSON file; absent fields keep their
    /// defaults.
    pub fn from_json_file(path: &Path) -> Result<GridParams, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read params {}: {e}", path.display()))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse params {}: {e}", path.display()))
    }
}
