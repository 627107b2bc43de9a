#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod engine;
pub mod error;
pub mod image;
pub mod params;
pub mod scale;
pub mod section;
pub mod skew;
pub mod staff;
pub mod system;

// “Expert” modules – still public, but considered unstable internals.
// (You can tighten or feature-gate these later.)
pub mod barline;
pub mod cluster;
pub mod comb;
pub mod filament;
pub mod geom;
pub mod projector;

// --- High-level re-exports -------------------------------------------------

// Main entry points: engine + results.
pub use crate::engine::{BarLink, GridEngine, GridModel, PeakRecord};
pub use crate::error::GridError;
pub use crate::params::GridParams;

// Page-level inputs most callers need.
pub use crate::scale::{estimate_scale, Scale};
pub use crate::section::sections_from_image;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use staff_grid::prelude::*;
///
/// # fn main() -> Result<(), staff_grid::GridError> {
/// let (w, h) = (1200usize, 800usize);
/// let page = vec![0u8; w * h];
/// let img = BitImage { w, h, stride: w, data: &page };
///
/// let scale = Scale::from_interline(20);
/// let sections = sections_from_image(&img);
/// let engine = GridEngine::new(GridParams::default());
///
/// let model = engine.process(&img, &scale, sections)?;
/// println!("staves={} systems={}", model.staves.len(), model.systems.len());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::BitImage;
    pub use crate::{
        sections_from_image, GridEngine, GridError, GridModel, GridParams, Scale,
    };
}

// --- Stage-level API (for tools & advanced users) --------------------------

pub mod stages {
    // Stage runners, in pipeline order.
    pub use crate::barline::PeakGraph;
    pub use crate::cluster::{build_clusters, ClusterOutcome, LineCluster};
    pub use crate::comb::{harvest_combs, CombHarvest};
    pub use crate::filament::{
        build_line_filaments, global_slope, purge_curved, purge_sloped, FilamentArena,
    };
    pub use crate::projector::StaffProjector;
    pub use crate::system::systems_from_tops;
}
