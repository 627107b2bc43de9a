//! Bar line peaks and the cross-staff graph built on top of them.

pub mod graph;
pub mod peak;

pub use self::graph::{BarEdge, EdgeKind, PeakGraph};
pub use self::peak::{BarStick, PeakAttrs, PeakImpacts, StaffPeak};
