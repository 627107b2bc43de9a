//! Per-column foreground counts over an abscissa range.

use serde::{Deserialize, Serialize};

/// Column projection vector, addressed by absolute abscissa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    x_min: i32,
    values: Vec<i32>,
}

impl Projection {
    /// Zeroed projection over `[x_min, x_max]`, both inclusive.
    pub fn new(x_min: i32, x_max: i32) -> Projection {
        debug_assert!(x_max >= x_min);
        Projection { x_min, values: vec![0; (x_max - x_min + 1) as usize] }
    }

    #[inline]
    pub fn x_min(&self) -> i32 {
        self.x_min
    }

    #[inline]
    pub fn x_max(&self) -> i32 {
        self.x_min + self.values.len() as i32 - 1
    }

    /// Clamps an abscissa into the projection range.
    #[inline]
    pub fn x_clamp(&self, x: i32) -> i32 {
        x.clamp(self.x_min(), self.x_max())
    }

    #[inline]
    pub fn increment(&mut self, x: i32) {
        self.values[(x - self.x_min) as usize] += 1;
    }

    /// Column value; zero outside the range.
    #[inline]
    pub fn value(&self, x: i32) -> i32 {
        if x < self.x_min() || x > self.x_max() {
            return 0;
        }
        self.values[(x - self.x_min) as usize]
    }

    /// Discrete first derivative `value(x) - value(x - 1)`.
    #[inline]
    pub fn derivative(&self, x: i32) -> i32 {
        self.value(x) - self.value(x - 1)
    }
}
