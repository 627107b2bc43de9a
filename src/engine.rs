//! End-to-end grid engine: filaments, combs, clusters, staves, projection
//! peaks, cross-staff graph, systems.

use std::time::Instant;

use log::debug;
use serde::Serialize;

use crate::barline::{PeakAttrs, PeakGraph, StaffPeak};
use crate::cluster::build_clusters;
use crate::comb::harvest_combs;
use crate::error::GridError;
use crate::filament::{
    build_line_filaments, global_slope, purge_curved, purge_sloped, FilamentArena, FilamentId,
};
use crate::image::BitImage;
use crate::params::GridParams;
use crate::projector::StaffProjector;
use crate::scale::Scale;
use crate::section::Section;
use crate::skew::Skew;
use crate::staff::{HorizontalSide, StaffInfo};
use crate::system::{systems_from_tops, SystemFrame};

/// One surviving bar line peak, in page coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct PeakRecord {
    pub staff: u32,
    pub start: i32,
    pub stop: i32,
    pub grade: f64,
    pub attrs: PeakAttrs,
}

/// One surviving edge between peaks of vertically adjacent staves.
#[derive(Debug, Clone, Serialize)]
pub struct BarLink {
    pub top_staff: u32,
    pub bottom_staff: u32,
    /// Mid abscissa of the upper peak.
    pub x: f64,
    /// Pixel-verified connection, as opposed to a bare geometric alignment.
    pub connection: bool,
    pub grade: f64,
}

/// Full result of the grid pipeline on one page.
#[derive(Debug, Serialize)]
pub struct GridModel {
    pub skew: Skew,
    pub staves: Vec<StaffInfo>,
    pub systems: Vec<SystemFrame>,
    pub peaks: Vec<PeakRecord>,
    pub connections: Vec<BarLink>,
    /// Filaments left out of every cluster, candidates for a second pass
    /// at another interline.
    pub discarded_filaments: Vec<FilamentId>,
    pub elapsed_ms: f64,
}

/// Staff grid inference engine. One instance serves any number of pages.
pub struct GridEngine {
    params: GridParams,
}

impl GridEngine {
    pub fn new(params: GridParams) -> GridEngine {
        GridEngine { params }
    }

    /// Runs the whole pipeline on one binarized page.
    ///
    /// `sections` are the horizontal run sections of the page, typically
    /// from [`sections_from_image`](crate::section::sections_from_image).
    pub fn process(
        &self,
        img: &BitImage,
        scale: &Scale,
        sections: Vec<Section>,
    ) -> Result<GridModel, GridError> {
        let started = Instant::now();
        let p = &self.params;

        // 1. Chain slim sections into long horizontal filaments.
        let probe_spacing = scale.to_pixels(p.filament.probe_spacing);
        let mut arena = FilamentArena::new(sections, scale, probe_spacing);
        let mut filaments = build_line_filaments(&mut arena, &p.filament, scale);
        purge_curved(&arena, &mut filaments, &p.filament);

        // 2. Global skew, then drop filaments fighting it.
        let slope = global_slope(&arena, &filaments, &p.filament);
        let skew = Skew::new(slope);
        purge_sloped(&arena, &mut filaments, slope, &p.filament, scale);
        debug!("grid: skew slope {slope:.5}, {} filaments kept", filaments.len());

        // 3. Sample combs, then aggregate them into line clusters.
        let Some(mut harvest) = harvest_combs(&mut arena, &filaments, img.w as i32, &p.comb)
        else {
            return Err(GridError::NoSystemFound);
        };
        let outcome =
            build_clusters(&mut arena, &mut harvest, &filaments, &skew, &p.cluster, scale);
        if outcome.clusters.is_empty() {
            return Err(GridError::NoSystemFound);
        }

        // 4. Staves out of clusters, numbered top-down.
        let mut staves: Vec<StaffInfo> = outcome
            .clusters
            .iter()
            .map(|cluster| StaffInfo::from_cluster(cluster.id, &arena, cluster))
            .collect();

        // 5. Per-staff vertical projection and bar peak extraction.
        let mut projectors: Vec<StaffProjector> = staves
            .iter()
            .map(|staff| StaffProjector::process(img, staff, scale, &p.projector))
            .collect();
        let peaks_by_staff: Vec<Vec<StaffPeak>> =
            projectors.iter_mut().map(|pr| pr.take_peaks()).collect();

        // 6. Cross-staff graph: alignments, connections, splits, systems.
        let mut graph = PeakGraph::process(img, &staves, peaks_by_staff, &skew, scale, &p.graph);
        let systems = systems_from_tops(graph.system_tops());
        if systems.is_empty() {
            return Err(GridError::NoSystemFound);
        }

        // 7. Pin staff sides to their end bars and look for braces.
        for (staff, projector) in staves.iter_mut().zip(projectors.iter()) {
            for side in [HorizontalSide::Left, HorizontalSide::Right] {
                match graph.end_peak(staff.id as usize, side) {
                    Some(id) => projector.refine_staff_side(staff, side, Some(graph.peak_mut(id))),
                    None => projector.refine_staff_side(staff, side, None),
                }
            }
            if let Some(bar) = staff.left_bar {
                staff.brace = projector.find_brace_peak(0, bar.start - 1);
            }
        }

        let peaks: Vec<PeakRecord> = graph
            .alive_peaks()
            .into_iter()
            .map(|id| {
                let peak = graph.peak(id);
                PeakRecord {
                    staff: peak.staff,
                    start: peak.start,
                    stop: peak.stop,
                    grade: peak.grade(),
                    attrs: peak.attrs,
                }
            })
            .collect();
        let connections: Vec<BarLink> = graph
            .live_edges()
            .map(|edge| {
                let top = graph.peak(edge.top);
                let bottom = graph.peak(edge.bottom);
                BarLink {
                    top_staff: top.staff,
                    bottom_staff: bottom.staff,
                    x: top.mid(),
                    connection: edge.is_connection(),
                    grade: edge.grade,
                }
            })
            .collect();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
        debug!(
            "grid: {} staves, {} systems, {} peaks in {elapsed_ms:.1} ms",
            staves.len(),
            systems.len(),
            peaks.len()
        );
        Ok(GridModel {
            skew,
            staves,
            systems,
            peaks,
            connections,
            discarded_filaments: outcome.discarded,
            elapsed_ms,
        })
    }
}
