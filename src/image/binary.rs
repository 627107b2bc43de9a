//! Borrowed and owned binary rasters.

use nalgebra::Point2;

/// Borrowed binary image view, one byte per pixel, non-zero = foreground ink.
///
/// `stride` is the row pitch in bytes and may exceed `w`.
#[derive(Debug, Clone, Copy)]
pub struct BitImage<'a> {
    pub w: usize,
    pub h: usize,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> BitImage<'a> {
    pub fn new(w: usize, h: usize, stride: usize, data: &'a [u8]) -> Option<Self> {
        if stride < w || data.len() < stride * h {
            return None;
        }
        Some(Self { w, h, stride, data })
    }

    /// True when the pixel at (x, y) is foreground.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.stride + x] != 0
    }

    /// Clamps an abscissa into `[0, w-1]`.
    #[inline]
    pub fn x_clamp(&self, x: i32) -> i32 {
        x.clamp(0, self.w as i32 - 1)
    }

    /// Clamps an ordinate into `[0, h-1]`.
    #[inline]
    pub fn y_clamp(&self, y: i32) -> i32 {
        y.clamp(0, self.h as i32 - 1)
    }
}

/// Owned binary buffer that produces `BitImage` views.
#[derive(Debug, Clone)]
pub struct BinaryBuffer {
    pub w: usize,
    pub h: usize,
    pub data: Vec<u8>,
}

impl BinaryBuffer {
    /// All-background buffer.
    pub fn new(w: usize, h: usize) -> Self {
        Self { w, h, data: vec![0; w * h] }
    }

    pub fn as_view(&self) -> BitImage<'_> {
        BitImage { w: self.w, h: self.h, stride: self.w, data: &self.data }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.w + x] = u8::from(on);
    }
}

/// Ink statistics of a quadrilateral band between two near-vertical edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreData {
    /// Largest vertical run of rows without any ink, in pixels.
    pub gap: i32,
    /// Fraction of rows without any ink.
    pub white_ratio: f64,
}

/// Scans the rows between a left and a right edge segment (each given as
/// top point then bottom point) and reports the largest white gap and the
/// white row ratio. A row counts as inked when any pixel between the two
/// edges at that ordinate is foreground.
pub fn vertical_core(
    img: &BitImage,
    left: (Point2<f64>, Point2<f64>),
    right: (Point2<f64>, Point2<f64>),
) -> CoreData {
    let y_top = left.0.y.max(right.0.y).ceil() as i32;
    let y_bot = left.1.y.min(right.1.y).floor() as i32;
    if y_bot < y_top {
        return CoreData { gap: 0, white_ratio: 0.0 };
    }

    let mut white_rows = 0;
    let mut gap = 0;
    let mut run = 0;
    for y in y_top..=y_bot {
        let xl = x_at(left, y).round() as i32;
        let xr = x_at(right, y).round() as i32;
        let x0 = img.x_clamp(xl.min(xr));
        let x1 = img.x_clamp(xl.max(xr));
        let yy = img.y_clamp(y) as usize;
        let inked = (x0..=x1).any(|x| img.get(x as usize, yy));
        if inked {
            run = 0;
        } else {
            white_rows += 1;
            run += 1;
            gap = gap.max(run);
        }
    }

    let total = (y_bot - y_top + 1) as f64;
    CoreData { gap, white_ratio: white_rows as f64 / total }
}

fn x_at(seg: (Point2<f64>, Point2<f64>), y: i32) -> f64 {
    let (a, b) = seg;
    if (b.y - a.y).abs() < 1e-9 {
        return a.x;
    }
    a.x + (b.x - a.x) * (y as f64 - a.y) / (b.y - a.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_of_solid_strip_has_no_gap() {
        let mut buf = BinaryBuffer::new(20, 30);
        for y in 5..25 {
            for x in 8..11 {
                buf.set(x, y, true);
            }
        }
        let img = buf.as_view();
        let data = vertical_core(
            &img,
            (Point2::new(8.0, 5.0), Point2::new(8.0, 24.0)),
            (Point2::new(10.0, 5.0), Point2::new(10.0, 24.0)),
        );
        assert_eq!(data.gap, 0);
        assert!(data.white_ratio < 1e-9);
    }

    #[test]
    fn core_reports_the_largest_gap() {
        let mut buf = BinaryBuffer::new(20, 30);
        for y in 0..30 {
            if (10..14).contains(&y) {
                continue; // 4-row hole
            }
            buf.set(9, y, true);
        }
        let img = buf.as_view();
        let data = vertical_core(
            &img,
            (Point2::new(9.0, 0.0), Point2::new(9.0, 29.0)),
            (Point2::new(9.0, 0.0), Point2::new(9.0, 29.0)),
        );
        assert_eq!(data.gap, 4);
        assert!((data.white_ratio - 4.0 / 30.0).abs() < 1e-9);
    }
}
