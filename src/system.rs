//! Systems: vertical groups of staves tied together by connected bar lines.

use serde::{Deserialize, Serialize};

/// A maximal run of consecutive staves sharing the same top staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFrame {
    pub id: u32,
    /// First (top) staff of the system.
    pub first_staff: u32,
    /// Last (bottom) staff, inclusive.
    pub last_staff: u32,
}

impl SystemFrame {
    #[inline]
    pub fn staff_count(&self) -> usize {
        (self.last_staff - self.first_staff + 1) as usize
    }

    #[inline]
    pub fn contains(&self, staff: u32) -> bool {
        (self.first_staff..=self.last_staff).contains(&staff)
    }
}

/// Groups consecutive staves with an equal top staff into systems.
///
/// `tops[i]` is the id of the top staff of the system staff `i` belongs to,
/// as propagated along bar connections.
pub fn systems_from_tops(tops: &[u32]) -> Vec<SystemFrame> {
    let mut systems: Vec<SystemFrame> = Vec::new();
    let mut start = 0usize;
    for i in 0..tops.len() {
        let run_ends = i + 1 == tops.len() || tops[i + 1] != tops[start];
        if run_ends {
            systems.push(SystemFrame {
                id: systems.len() as u32,
                first_staff: start as u32,
                last_staff: i as u32,
            });
            start = i + 1;
        }
    }
    systems
}
