//! Line clusters: vertical stacks of staff line filaments.

pub mod builder;

use std::collections::BTreeMap;

use crate::filament::{FilamentArena, FilamentId};
use crate::geom::Rect;
use crate::skew::Skew;

pub use self::builder::{build_clusters, ClusterOutcome};

/// A finished cluster: one filament per line position, top down.
///
/// After building, keys always run 0 to line count minus one.
#[derive(Debug, Clone)]
pub struct LineCluster {
    pub id: u32,
    pub interline: i32,
    pub lines: BTreeMap<i32, FilamentId>,
}

impl LineCluster {
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    /// Union of the line filament bounds.
    pub fn bounds(&self, arena: &FilamentArena) -> Rect {
        let mut it = self.lines.values();
        let first = it.next().expect("a cluster always has lines");
        let mut bounds = arena.bounds(*first);
        for &fil in it {
            bounds = bounds.union(&arena.bounds(fil));
        }
        bounds
    }

    /// Mean ink-based length of the lines.
    pub fn true_length(&self, arena: &FilamentArena) -> f64 {
        let sum: i32 = self.lines.values().map(|&f| arena.true_length(f)).sum();
        sum as f64 / self.lines.len() as f64
    }

    /// Deskewed ordinate of the cluster center, used for top-down ordering.
    pub fn ordinate(&self, arena: &FilamentArena, skew: &Skew) -> f64 {
        skew.deskewed(self.bounds(arena).center()).y
    }
}
