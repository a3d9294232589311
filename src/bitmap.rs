#![deny(missing_docs)]

//! Bitmap font handling.

pub mod ebdt;

use std::convert::TryFrom;

use crate::error::ParseError;

/// Bit depth of bitmap data.
#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd)]
pub enum BitDepth {
    /// 1-bit per pixel.
    One = 1,
    /// 2-bits per pixel.
    Two = 2,
    /// 4-bits per pixel.
    Four = 4,
    /// 8-bits per pixel.
    Eight = 8,
    /// 32-bits per pixel (RGBA), used by colour strikes.
    ThirtyTwo = 32,
}

impl TryFrom<u8> for BitDepth {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BitDepth::One),
            2 => Ok(BitDepth::Two),
            4 => Ok(BitDepth::Four),
            8 => Ok(BitDepth::Eight),
            32 => Ok(BitDepth::ThirtyTwo),
            _ => Err(ParseError::BadValue),
        }
    }
}

/// A monochrome bitmap with one byte per pixel, each 0 or 1, in row-major
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl MonoBitmap {
    /// Allocate a blank `width` x `height` bitmap.
    pub fn new(width: usize, height: usize) -> MonoBitmap {
        MonoBitmap {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// The width of the bitmap in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of the bitmap in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The value of the pixel at (`x`, `y`), 0 or 1.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Set the pixel at (`x`, `y`).
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// One row of pixels.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Iterate over the rows of the bitmap, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.width.max(1))
    }

    /// Draw the set pixels of `source` onto this bitmap with its top-left
    /// corner at (`x`, `y`).
    ///
    /// Pixels that fall outside this bitmap are clipped. Blank pixels of
    /// `source` leave the destination untouched, so overlapping draws
    /// accumulate.
    pub fn draw(&mut self, source: &MonoBitmap, x: i32, y: i32) {
        for sy in 0..source.height {
            for sx in 0..source.width {
                if source.get(sx, sy) == 0 {
                    continue;
                }
                let tx = x + sx as i32;
                let ty = y + sy as i32;
                if tx < 0 || ty < 0 || tx as usize >= self.width || ty as usize >= self.height {
                    continue;
                }
                self.set(tx as usize, ty as usize, 1);
            }
        }
    }
}

/// Offset from a glyph origin to the rendering origin of its bitmap, per axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OriginOffset {
    /// The horizontal (x-axis) offset.
    pub x: i16,
    /// The vertical (y-axis) offset.
    pub y: i16,
}

/// Per-glyph metrics in a single sign and axis convention.
///
/// Produced from either metrics shape stored in the bitmap data table,
/// regardless of which axis the strike natively stores.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NormalizedMetrics {
    /// The width of the glyph bitmap in pixels.
    pub width: u8,
    /// The height of the glyph bitmap in pixels.
    pub height: u8,
    /// Offset from the horizontal origin to the bottom left of the bitmap.
    pub hori_origin: OriginOffset,
    /// Horizontal advance in pixels.
    pub hori_advance: u8,
    /// Offset from the vertical origin to the bitmap.
    pub vert_origin: OriginOffset,
    /// Vertical advance in pixels.
    pub vert_advance: u8,
}

/// A fully decoded glyph: normalized metrics plus a flat monochrome bitmap.
///
/// Composite glyphs are resolved into this same shape; there is no
/// structural difference between a direct and a composite glyph once
/// decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGlyph {
    /// The glyph identifier this glyph was stored under.
    pub glyph_id: u16,
    /// Glyph name for output fonts.
    pub name: String,
    /// Normalized metrics.
    pub metrics: NormalizedMetrics,
    /// The glyph image.
    pub bitmap: MonoBitmap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_clipped() {
        let mut source = MonoBitmap::new(2, 2);
        source.set(0, 0, 1);
        source.set(1, 1, 1);

        let mut canvas = MonoBitmap::new(2, 2);
        canvas.draw(&source, 1, 1);
        assert_eq!(canvas.get(1, 1), 1);
        assert_eq!(canvas.get(0, 0), 0);
        // (2, 2) falls outside the canvas and is dropped
    }

    #[test]
    fn test_draw_accumulates() {
        let mut base = MonoBitmap::new(2, 1);
        base.set(0, 0, 1);
        let mut accent = MonoBitmap::new(2, 1);
        accent.set(1, 0, 1);

        let mut canvas = MonoBitmap::new(2, 1);
        canvas.draw(&base, 0, 0);
        canvas.draw(&accent, 0, 0);
        assert_eq!(canvas.row(0), &[1, 1]);
    }

    #[test]
    fn test_empty_bitmap_rows() {
        let bitmap = MonoBitmap::new(0, 0);
        assert_eq!(bitmap.rows().count(), 0);
    }
}
