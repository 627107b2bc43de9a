//! Renders synthetic staff pages into one-byte-per-pixel binary buffers.
#![allow(dead_code)]

use staff_grid::image::BinaryBuffer;
use staff_grid::Scale;

struct StaffDef {
    x0: i32,
    x1: i32,
    y_top: i32,
    lines: usize,
}

struct BarDef {
    x: i32,
    width: i32,
    y0: i32,
    y1: i32,
}

struct HoleDef {
    x0: i32,
    x1: i32,
    y0: i32,
    y1: i32,
}

/// Builds pages of staves, bar lines and erased holes, all rendered with a
/// fixed interline of 20 px and a line thickness of 2 px.
pub struct PageBuilder {
    w: usize,
    h: usize,
    interline: i32,
    thickness: i32,
    slope: f64,
    staves: Vec<StaffDef>,
    bars: Vec<BarDef>,
    holes: Vec<HoleDef>,
}

impl PageBuilder {
    pub fn new(w: usize, h: usize) -> PageBuilder {
        PageBuilder {
            w,
            h,
            interline: 20,
            thickness: 2,
            slope: 0.0,
            staves: Vec::new(),
            bars: Vec::new(),
            holes: Vec::new(),
        }
    }

    /// Slope applied to every staff line, in pixels of rise per pixel.
    pub fn slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    /// Five-line staff whose top line starts at `(x0, y_top)`.
    pub fn staff(self, x0: i32, x1: i32, y_top: i32) -> Self {
        self.staff_lines(x0, x1, y_top, 5)
    }

    pub fn staff_lines(mut self, x0: i32, x1: i32, y_top: i32, lines: usize) -> Self {
        self.staves.push(StaffDef { x0, x1, y_top, lines });
        self
    }

    /// Vertical bar of `width` columns starting at `x`, rows `y0..=y1`.
    pub fn bar(mut self, x: i32, width: i32, y0: i32, y1: i32) -> Self {
        self.bars.push(BarDef { x, width, y0, y1 });
        self
    }

    /// Erases the rectangle `x0..=x1` by `y0..=y1` after drawing, which
    /// cuts whatever crosses it into separate pieces.
    pub fn hole(mut self, x0: i32, x1: i32, y0: i32, y1: i32) -> Self {
        self.holes.push(HoleDef { x0, x1, y0, y1 });
        self
    }

    pub fn scale(&self) -> Scale {
        Scale::from_interline(self.interline)
    }

    pub fn render(&self) -> BinaryBuffer {
        let mut buf = BinaryBuffer::new(self.w, self.h);
        for staff in &self.staves {
            for line in 0..staff.lines {
                let y_base = (staff.y_top + line as i32 * self.interline) as f64;
                for x in staff.x0..=staff.x1 {
                    let y_line = (y_base + self.slope * (x - staff.x0) as f64).round() as i32;
                    for t in 0..self.thickness {
                        self.set(&mut buf, x, y_line + t);
                    }
                }
            }
        }
        for bar in &self.bars {
            for x in bar.x..bar.x + bar.width {
                for y in bar.y0..=bar.y1 {
                    self.set(&mut buf, x, y);
                }
            }
        }
        for hole in &self.holes {
            for x in hole.x0..=hole.x1 {
                for y in hole.y0..=hole.y1 {
                    self.clear(&mut buf, x, y);
                }
            }
        }
        buf
    }

    fn set(&self, buf: &mut BinaryBuffer, x: i32, y: i32) {
        if x >= 0 && (x as usize) < self.w && y >= 0 && (y as usize) < self.h {
            buf.set(x as usize, y as usize, true);
        }
    }

    fn clear(&self, buf: &mut BinaryBuffer, x: i32, y: i32) {
        if x >= 0 && (x as usize) < self.w && y >= 0 && (y as usize) < self.h {
            buf.set(x as usize, y as usize, false);
        }
    }
}
