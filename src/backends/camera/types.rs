// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture side of the pipeline

//! Shared types for frame sources

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::PIXEL_STRIDE;

/// Pixel format of frames flowing through the pipeline
///
/// Only packed 32-bit formats are negotiated; each pixel is one `u32` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// BGRA - 32-bit packed, B in the low byte, A in the high byte
    /// (`0xAARRGGBB` when read as a little-endian word)
    #[default]
    Bgra8888,
}

impl PixelFormat {
    /// FourCC code declared to the rendering sink
    pub fn fourcc(&self) -> &'static str {
        match self {
            Self::Bgra8888 => "BGRA",
        }
    }

    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Bgra8888 => PIXEL_STRIDE,
        }
    }

    /// Parse format from a FourCC string
    pub fn from_fourcc(fourcc: &str) -> Option<Self> {
        match fourcc {
            "BGRA" | "BGRx" => Some(Self::Bgra8888),
            _ => None,
        }
    }
}

/// Negotiated stream geometry
///
/// Immutable once negotiated: the arena refuses a second, different geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl StreamGeometry {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }

    /// BGRA geometry of the given size
    pub fn bgra(width: u32, height: u32) -> Self {
        Self::new(width, height, PixelFormat::Bgra8888)
    }

    /// Number of pixels in one frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes in one row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Bytes in one frame
    pub fn frame_bytes(&self) -> usize {
        self.pixel_count() * self.pixel_format.bytes_per_pixel()
    }

    /// Whether both dimensions are non-zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for StreamGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} {}",
            self.width,
            self.height,
            self.pixel_format.fourcc()
        )
    }
}

/// Frame rate as an exact fraction, so 59.94fps is 60000/1001
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// A zero denominator is treated as 1
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Duration of one frame; zero-rate framerates fall back to 30fps
    pub fn frame_interval(&self) -> Duration {
        if self.num == 0 {
            return Framerate::default().frame_interval();
        }
        Duration::from_nanos(1_000_000_000u64 * self.denom as u64 / self.num as u64)
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.denom {
            1 => write!(f, "{}", self.num),
            _ => write!(f, "{:.2}", self.as_f64()),
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_sizes() {
        let g = StreamGeometry::bgra(640, 480);
        assert_eq!(g.pixel_count(), 307_200);
        assert_eq!(g.row_bytes(), 2_560);
        assert_eq!(g.frame_bytes(), 1_228_800);
        assert!(g.is_valid());
        assert!(!StreamGeometry::bgra(0, 480).is_valid());
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(
            Framerate::from_int(30).frame_interval(),
            Duration::from_nanos(33_333_333)
        );
        assert_eq!(
            Framerate::new(60000, 1001).frame_interval(),
            Duration::from_nanos(16_683_333)
        );
        assert_eq!(
            Framerate::from_int(0).frame_interval(),
            Framerate::default().frame_interval()
        );
    }
}
