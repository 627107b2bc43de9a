//! Page scale: interline spacing and staff line thickness.

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::image::BitImage;

/// Pre-measured page scale.
///
/// All pipeline thresholds are expressed as fractions of these three values,
/// so the engine adapts to scan resolution without retuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Vertical distance in pixels between two adjacent staff lines.
    pub interline: i32,
    /// Most common staff line thickness in pixels.
    pub main_fore: i32,
    /// Maximum staff line thickness in pixels.
    pub max_fore: i32,
}

impl Scale {
    pub fn new(interline: i32, main_fore: i32, max_fore: i32) -> Result<Self, GridError> {
        if interline <= 0 {
            return Err(GridError::InvalidScale(format!("interline {interline}")));
        }
        if main_fore <= 0 || max_fore < main_fore {
            return Err(GridError::InvalidScale(format!(
                "line thickness main={main_fore} max={max_fore}"
            )));
        }
        Ok(Self { interline, main_fore, max_fore })
    }

    /// Builds a scale from the interline alone, assuming the usual engraving
    /// ratio of one tenth between line thickness and interline.
    pub fn from_interline(interline: i32) -> Self {
        let interline = interline.max(2);
        let main_fore = ((interline as f64 / 10.0).round() as i32).max(1);
        Self { interline, main_fore, max_fore: main_fore + 1 }
    }

    /// Rounded pixel count for an interline fraction.
    #[inline]
    pub fn to_pixels(&self, frac: f64) -> i32 {
        (frac * self.interline as f64).round() as i32
    }

    /// Exact pixel value for an interline fraction.
    #[inline]
    pub fn to_pixels_f(&self, frac: f64) -> f64 {
        frac * self.interline as f64
    }

    /// Rounded pixel count for a fraction of the typical line thickness.
    #[inline]
    pub fn to_line_pixels(&self, frac: f64) -> i32 {
        (frac * self.main_fore as f64).round() as i32
    }
}

/// Estimates the page scale from vertical run statistics.
///
/// For every column the image is cut into black and white runs. The mode of
/// the black run lengths gives the typical line thickness, the mode of
/// black-plus-following-white periods gives the interline. Returns `None`
/// when the page has too little ink to measure.
pub fn estimate_scale(img: &BitImage) -> Option<Scale> {
    let mut black = vec![0u32; img.h + 2];
    let mut combo = vec![0u32; img.h + 2];
    let mut total_black = 0u64;

    for x in 0..img.w {
        let mut y = 0usize;
        while y < img.h {
            if !img.get(x, y) {
                y += 1;
                continue;
            }
            let run_start = y;
            while y < img.h && img.get(x, y) {
                y += 1;
            }
            let black_len = y - run_start;
            black[black_len.min(img.h + 1)] += 1;
            total_black += 1;
            let white_start = y;
            while y < img.h && !img.get(x, y) {
                y += 1;
            }
            // Period counts only when the next line actually follows.
            if y < img.h {
                let period = black_len + (y - white_start);
                combo[period.min(img.h + 1)] += 1;
            }
        }
    }

    if total_black < 100 {
        return None;
    }

    let main_fore = argmax(&black)? as i32;
    let interline = argmax(&combo)? as i32;
    if interline <= main_fore {
        return None;
    }

    // Upper thickness bound: smallest length covering 95% of the black runs.
    let want = (total_black as f64 * 0.95) as u64;
    let mut seen = 0u64;
    let mut max_fore = main_fore;
    for (len, &count) in black.iter().enumerate() {
        seen += count as u64;
        if seen >= want {
            max_fore = (len as i32).max(main_fore);
            break;
        }
    }
    max_fore = max_fore.min(interline / 2).max(main_fore);

    Scale::new(interline, main_fore, max_fore).ok()
}

fn argmax(hist: &[u32]) -> Option<usize> {
    let (best, &count) = hist.iter().enumerate().max_by_key(|&(_, &c)| c)?;
    if count == 0 {
        None
    } else {
        Some(best)
    }
}
