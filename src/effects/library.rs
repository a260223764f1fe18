// SPDX-License-Identifier: GPL-3.0-only

//! Stock photo effects
//!
//! Each stage binds its parameters at construction and validates them
//! there, so a registered effect can never fail because of its arguments.
//! Stages that look at neighbouring pixels keep their scratch planes
//! between frames instead of allocating per pass.

use rayon::prelude::*;

use super::{Stage, center_distance, luma_plane, luminance, map_rows, sample, smoothstep, sobel};
use crate::backends::camera::types::StreamGeometry;
use crate::errors::{ConfigurationError, RenderError};
use crate::media::formats::{pack_rgb_f32, unpack_rgb_f32};

fn invalid(name: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidEffect {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Scale saturation around the pixel's luminance
#[inline]
fn saturate(r: f32, g: f32, b: f32, amount: f32) -> (f32, f32, f32) {
    let l = 0.299 * r + 0.587 * g + 0.114 * b;
    (l + (r - l) * amount, l + (g - l) * amount, l + (b - l) * amount)
}

/// Colour cast applied by [`Lomo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LomoStyle {
    Neutral,
    Red,
    Green,
    Blue,
    Yellow,
}

impl LomoStyle {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Neutral" => Some(Self::Neutral),
            "Red" => Some(Self::Red),
            "Green" => Some(Self::Green),
            "Blue" => Some(Self::Blue),
            "Yellow" => Some(Self::Yellow),
            _ => None,
        }
    }

    /// Per-channel gain (r, g, b)
    fn tint(&self) -> (f32, f32, f32) {
        match self {
            Self::Neutral => (1.0, 1.0, 1.0),
            Self::Red => (1.15, 0.95, 0.95),
            Self::Green => (0.95, 1.12, 0.95),
            Self::Blue => (0.92, 0.97, 1.15),
            Self::Yellow => (1.1, 1.06, 0.82),
        }
    }
}

/// Strength of the darkened corners applied by [`Lomo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LomoVignetting {
    Low,
    Medium,
    High,
}

impl LomoVignetting {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    /// Inner radius where darkening starts
    fn inner_radius(&self) -> f32 {
        match self {
            Self::Low => 0.45,
            Self::Medium => 0.35,
            Self::High => 0.22,
        }
    }
}

/// Toy-camera look: punchy contrast, colour cast and heavy vignette
#[derive(Debug, Clone)]
pub struct Lomo {
    brightness: f32,
    saturation: f32,
    vignetting: LomoVignetting,
    style: LomoStyle,
}

impl Lomo {
    /// `brightness` and `saturation` are in 0..=1, 0.5 being neutral
    pub fn new(
        brightness: f64,
        saturation: f64,
        vignetting: LomoVignetting,
        style: LomoStyle,
    ) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&brightness) {
            return Err(invalid("Lomo", format!("brightness {} outside 0..=1", brightness)));
        }
        if !(0.0..=1.0).contains(&saturation) {
            return Err(invalid("Lomo", format!("saturation {} outside 0..=1", saturation)));
        }
        Ok(Self {
            brightness: brightness as f32,
            saturation: saturation as f32,
            vignetting,
            style,
        })
    }
}

impl Stage for Lomo {
    fn name(&self) -> &str {
        "Lomo"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        let offset = (self.brightness - 0.5) * 0.4;
        let saturation = 0.5 + self.saturation;
        let (tr, tg, tb) = self.style.tint();
        let inner = self.vignetting.inner_radius();

        map_rows(pixels, geometry, |pixel, x, y| {
            let (r, g, b) = unpack_rgb_f32(pixel);
            let (r, g, b) = saturate(r, g, b, saturation);
            let contrast = |v: f32| (v - 0.5) * 1.3 + 0.5 + offset;
            let vignette = 1.0 - smoothstep(inner, 0.75, center_distance(x, y, geometry));
            pack_rgb_f32(
                contrast(r) * tr * vignette,
                contrast(g) * tg * vignette,
                contrast(b) * tb * vignette,
                pixel,
            )
        });
        Ok(())
    }
}

/// Glowing coloured strokes along edges on a dark background
#[derive(Debug, Default)]
pub struct MagicPen {
    luma: Vec<f32>,
}

impl MagicPen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for MagicPen {
    fn name(&self) -> &str {
        "MagicPen"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        let width = geometry.width as usize;
        let height = geometry.height as usize;
        luma_plane(pixels, &mut self.luma);
        let luma = &self.luma;

        map_rows(pixels, geometry, |pixel, x, y| {
            let edge = (sobel(luma, width, height, x, y) * 1.5).clamp(0.0, 1.0);
            let (r, g, b) = unpack_rgb_f32(pixel);
            // Strokes keep the hue of the scene, boosted to full saturation
            let peak = r.max(g).max(b).max(f32::EPSILON);
            pack_rgb_f32(
                (r / peak) * edge,
                (g / peak) * edge,
                (b / peak) * edge,
                pixel,
            )
        });
        Ok(())
    }
}

/// Luminance only
#[derive(Debug, Default, Clone, Copy)]
pub struct Grayscale;

impl Stage for Grayscale {
    fn name(&self) -> &str {
        "Grayscale"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        map_rows(pixels, geometry, |pixel, _, _| {
            let gray = luminance(pixel);
            pack_rgb_f32(gray, gray, gray, pixel)
        });
        Ok(())
    }
}

/// Warm brown tones
#[derive(Debug, Default, Clone, Copy)]
pub struct Sepia;

#[inline]
fn sepia_tone(luminance: f32) -> (f32, f32, f32) {
    (luminance * 1.2 + 0.1, luminance * 0.9 + 0.05, luminance * 0.7)
}

impl Stage for Sepia {
    fn name(&self) -> &str {
        "Sepia"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        map_rows(pixels, geometry, |pixel, _, _| {
            let (r, g, b) = sepia_tone(luminance(pixel));
            pack_rgb_f32(r, g, b, pixel)
        });
        Ok(())
    }
}

/// Faded old-print look: sepia blended with the original, lifted blacks
/// and soft corners
#[derive(Debug, Default, Clone, Copy)]
pub struct Antique;

impl Stage for Antique {
    fn name(&self) -> &str {
        "Antique"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        map_rows(pixels, geometry, |pixel, x, y| {
            let (r, g, b) = unpack_rgb_f32(pixel);
            let (sr, sg, sb) = sepia_tone(luminance(pixel));
            let mix = |orig: f32, tone: f32| (orig * 0.3 + tone * 0.7) * 0.85 + 0.08;
            let vignette = 1.0 - 0.5 * smoothstep(0.35, 0.8, center_distance(x, y, geometry));
            pack_rgb_f32(
                mix(r, sr) * vignette,
                mix(g, sg) * vignette,
                mix(b, sb) * vignette,
                pixel,
            )
        });
        Ok(())
    }
}

/// Black and white rubber-stamp print
///
/// The luminance is box-blurred over `radius` pixels, then thresholded.
#[derive(Debug)]
pub struct Stamp {
    radius: usize,
    threshold: f32,
    luma: Vec<f32>,
    blurred: Vec<f32>,
}

impl Stamp {
    /// Largest accepted smoothing radius
    pub const MAX_RADIUS: i64 = 16;

    pub fn new(radius: i64, threshold: f64) -> Result<Self, ConfigurationError> {
        if !(0..=Self::MAX_RADIUS).contains(&radius) {
            return Err(invalid(
                "Stamp",
                format!("radius {} outside 0..={}", radius, Self::MAX_RADIUS),
            ));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid("Stamp", format!("threshold {} outside 0..=1", threshold)));
        }
        Ok(Self {
            radius: radius as usize,
            threshold: threshold as f32,
            luma: Vec::new(),
            blurred: Vec::new(),
        })
    }
}

impl Stage for Stamp {
    fn name(&self) -> &str {
        "Stamp"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        let width = geometry.width as usize;
        let height = geometry.height as usize;
        let radius = self.radius as isize;
        luma_plane(pixels, &mut self.luma);

        let luma = &self.luma;
        self.blurred.resize(luma.len(), 0.0);
        self.blurred
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let count = ((2 * radius + 1) * (2 * radius + 1)) as f32;
                for (x, out) in row.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for dy in -radius..=radius {
                        for dx in -radius..=radius {
                            sum += sample(luma, width, height, x as isize + dx, y as isize + dy);
                        }
                    }
                    *out = sum / count;
                }
            });

        let blurred = &self.blurred;
        let threshold = self.threshold;
        map_rows(pixels, geometry, |pixel, x, y| {
            let ink = if blurred[y * width + x] < threshold { 0.0 } else { 1.0 };
            pack_rgb_f32(ink, ink, ink, pixel)
        });
        Ok(())
    }
}

/// Flat posterized colours with dark outlines
#[derive(Debug)]
pub struct Cartoon {
    distinct_edges: bool,
    luma: Vec<f32>,
}

impl Cartoon {
    const LEVELS: f32 = 6.0;

    pub fn new(distinct_edges: bool) -> Self {
        Self {
            distinct_edges,
            luma: Vec::new(),
        }
    }
}

impl Stage for Cartoon {
    fn name(&self) -> &str {
        "Cartoon"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        let width = geometry.width as usize;
        let height = geometry.height as usize;
        let edge_threshold = if self.distinct_edges { 0.25 } else { 0.5 };
        luma_plane(pixels, &mut self.luma);
        let luma = &self.luma;

        map_rows(pixels, geometry, |pixel, x, y| {
            if sobel(luma, width, height, x, y) > edge_threshold {
                return pack_rgb_f32(0.0, 0.0, 0.0, pixel);
            }
            let (r, g, b) = unpack_rgb_f32(pixel);
            let poster = |v: f32| ((v * Self::LEVELS).floor() / (Self::LEVELS - 1.0)).min(1.0);
            pack_rgb_f32(poster(r), poster(g), poster(b), pixel)
        });
        Ok(())
    }
}

/// Unsharp mask with a 3x3 Laplacian, `level` 0 (off) to 7 (strongest)
#[derive(Debug)]
pub struct Sharpness {
    level: u8,
    source: Vec<u32>,
}

impl Sharpness {
    pub const MAX_LEVEL: i64 = 7;

    pub fn new(level: i64) -> Result<Self, ConfigurationError> {
        if !(0..=Self::MAX_LEVEL).contains(&level) {
            return Err(invalid(
                "Sharpness",
                format!("level {} outside 0..={}", level, Self::MAX_LEVEL),
            ));
        }
        Ok(Self {
            level: level as u8,
            source: Vec::new(),
        })
    }
}

impl Stage for Sharpness {
    fn name(&self) -> &str {
        "Sharpness"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        if self.level == 0 {
            return Ok(());
        }
        let width = geometry.width as isize;
        let height = geometry.height as isize;
        let amount = self.level as f32 / Self::MAX_LEVEL as f32;

        self.source.clear();
        self.source.extend_from_slice(pixels);
        let source = &self.source;
        let at = |x: isize, y: isize| {
            let x = x.clamp(0, width - 1) as usize;
            let y = y.clamp(0, height - 1) as usize;
            unpack_rgb_f32(source[y * width as usize + x])
        };

        map_rows(pixels, geometry, |pixel, x, y| {
            let (x, y) = (x as isize, y as isize);
            let (cr, cg, cb) = unpack_rgb_f32(pixel);
            let neighbours = [at(x - 1, y), at(x + 1, y), at(x, y - 1), at(x, y + 1)];
            let (mut nr, mut ng, mut nb) = (0.0, 0.0, 0.0);
            for (r, g, b) in neighbours {
                nr += r;
                ng += g;
                nb += b;
            }
            let sharpen = |c: f32, n: f32| c + amount * (4.0 * c - n);
            pack_rgb_f32(sharpen(cr, nr), sharpen(cg, ng), sharpen(cb, nb), pixel)
        });
        Ok(())
    }
}

/// Automatic levels: stretches the frame's luminance range to full scale
/// and adds a little saturation
#[derive(Debug, Default)]
pub struct AutoEnhance {
    histogram: Vec<u32>,
}

impl AutoEnhance {
    /// Fraction of pixels clipped at each end of the range
    const CLIP: f32 = 0.01;
    /// Ranges narrower than this are left alone (flat frames)
    const MIN_RANGE: f32 = 0.02;

    pub fn new() -> Self {
        Self::default()
    }

    fn levels(&mut self, pixels: &[u32]) -> (f32, f32) {
        self.histogram.clear();
        self.histogram.resize(256, 0);
        for &pixel in pixels {
            let bin = (luminance(pixel) * 255.0).round() as usize;
            self.histogram[bin.min(255)] += 1;
        }

        let clip = (pixels.len() as f32 * Self::CLIP) as u32;
        let mut low = 0;
        let mut seen = 0;
        for (bin, &count) in self.histogram.iter().enumerate() {
            seen += count;
            if seen > clip {
                low = bin;
                break;
            }
        }
        let mut high = 255;
        seen = 0;
        for (bin, &count) in self.histogram.iter().enumerate().rev() {
            seen += count;
            if seen > clip {
                high = bin;
                break;
            }
        }
        (low as f32 / 255.0, high as f32 / 255.0)
    }
}

impl Stage for AutoEnhance {
    fn name(&self) -> &str {
        "AutoEnhance"
    }

    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        let (low, high) = self.levels(pixels);
        if high - low < Self::MIN_RANGE {
            return Ok(());
        }
        let scale = 1.0 / (high - low);

        map_rows(pixels, geometry, |pixel, _, _| {
            let (r, g, b) = unpack_rgb_f32(pixel);
            let stretch = |v: f32| (v - low) * scale;
            let (r, g, b) = saturate(stretch(r), stretch(g), stretch(b), 1.1);
            pack_rgb_f32(r, g, b, pixel)
        });
        Ok(())
    }
}
