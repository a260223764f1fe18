// SPDX-License-Identifier: GPL-3.0-only

//! Inverted grayscale
//!
//! Each pixel becomes the bitwise complement of its opaque Rec. 709 gray:
//!
//! ```text
//! luma = round(0.0722*B + 0.7152*G + 0.2126*R)
//! out  = !(0xFF000000 | luma * 0x010101)
//! ```
//!
//! The complement clears the alpha byte, so output words carry alpha 0.
//! There is no cross-pixel state; rows are processed in parallel.

use rayon::prelude::*;

use super::Stage;
use crate::backends::camera::types::StreamGeometry;
use crate::errors::RenderError;

/// Map one BGRA word to its inverted gray
#[inline]
pub fn invert_grayscale(pixel: u32) -> u32 {
    let b = (pixel & 0xFF) as f64;
    let g = ((pixel >> 8) & 0xFF) as f64;
    let r = ((pixel >> 16) & 0xFF) as f64;

    let luma = (0.0722 * b + 0.7152 * g + 0.2126 * r).round().min(255.0) as u32;
    let gray = 0xFF00_0000 | luma * 0x0001_0101;
    !gray
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InvertedGrayscale;

impl InvertedGrayscale {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for InvertedGrayscale {
    fn name(&self) -> &str {
        "InvertedGrayscale"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        pixels
            .par_chunks_mut(geometry.width as usize)
            .for_each(|row| {
                for pixel in row {
                    *pixel = invert_grayscale(*pixel);
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::formats::pack_bgra;

    #[test]
    fn test_reference_pixel() {
        // B=200, G=100, R=50: luma 96.59 rounds to 97 (0x61)
        let pixel = pack_bgra(50, 100, 200, 0xFF);
        assert_eq!(invert_grayscale(pixel), 0x009E_9E9E);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(invert_grayscale(0xFF00_0000), 0x00FF_FFFF);
        assert_eq!(invert_grayscale(0xFFFF_FFFF), 0x0000_0000);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let opaque = pack_bgra(10, 20, 30, 0xFF);
        let clear = pack_bgra(10, 20, 30, 0x00);
        assert_eq!(invert_grayscale(opaque), invert_grayscale(clear));
    }

    #[test]
    fn test_stage_matches_per_pixel_function() {
        let geometry = StreamGeometry::bgra(5, 3);
        let original: Vec<u32> = (0..15u32).map(|i| 0xFF00_0000 | i.wrapping_mul(0x0011_2233)).collect();
        let mut pixels = original.clone();

        InvertedGrayscale::new().apply(&mut pixels, geometry).unwrap();

        for (out, input) in pixels.iter().zip(&original) {
            assert_eq!(*out, invert_grayscale(*input));
        }
    }
}
