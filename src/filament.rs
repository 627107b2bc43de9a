//! Staff line filaments: section aggregation, merging and purging.

pub mod arena;
pub mod factory;
pub mod spline;

pub use self::arena::{Filament, FilamentArena, FilamentGeometry, FilamentId};
pub use self::factory::{build_line_filaments, global_slope, purge_curved, purge_sloped};
pub use self::spline::NaturalSpline;
