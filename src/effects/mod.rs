// SPDX-License-Identifier: GPL-3.0-only

//! Effect chains applied to preview frames
//!
//! An [`EffectChain`] is an ordered list of [`Stage`]s that rewrite one BGRA
//! frame in place. Stage parameters are fixed when the stage is built; the
//! [`registry`] maps each selectable effect to the chain it builds.
//!
//! # Modules
//!
//! - [`library`]: Stock photo effects (lomo, sepia, stamp, ...)
//! - [`custom`]: The inverted grayscale stage
//! - [`registry`]: Selectable effect table

pub mod custom;
pub mod library;
pub mod registry;

use rayon::prelude::*;

use crate::backends::camera::types::StreamGeometry;
use crate::errors::RenderError;

pub use custom::InvertedGrayscale;
pub use registry::{EffectDescriptor, EffectId, EffectRegistry, ParamValue};

/// One pixel transform in an effect chain
pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Rewrite `pixels` in place
    ///
    /// `pixels` always holds exactly `geometry.pixel_count()` words; the
    /// chain checks this before any stage runs.
    fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError>;
}

/// Ordered stages applied to one frame per pass
#[derive(Default)]
pub struct EffectChain {
    stages: Vec<Box<dyn Stage>>,
}

impl EffectChain {
    /// A chain with no stages; applying it leaves the frame untouched
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn single(stage: impl Stage + 'static) -> Self {
        Self::identity().with_stage(stage)
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over `pixels`, in the order they were added
    pub fn apply(&mut self, pixels: &mut [u32], geometry: StreamGeometry) -> Result<(), RenderError> {
        if pixels.len() != geometry.pixel_count() {
            return Err(RenderError::Stage {
                stage: "chain".to_string(),
                reason: format!(
                    "frame holds {} pixels, {} needs {}",
                    pixels.len(),
                    geometry,
                    geometry.pixel_count()
                ),
            });
        }

        for stage in &mut self.stages {
            stage.apply(pixels, geometry)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Apply a per-pixel function to every pixel, one row per task
///
/// The function receives the pixel and its (x, y) position.
pub(crate) fn map_rows<F>(pixels: &mut [u32], geometry: StreamGeometry, f: F)
where
    F: Fn(u32, usize, usize) -> u32 + Sync,
{
    let width = geometry.width as usize;
    pixels
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = f(*pixel, x, y);
            }
        });
}

/// BT.601 luminance of a BGRA word, normalized to 0..=1
#[inline]
pub(crate) fn luminance(pixel: u32) -> f32 {
    let (r, g, b) = crate::media::formats::unpack_rgb_f32(pixel);
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Fill `plane` with the luminance of every pixel
pub(crate) fn luma_plane(pixels: &[u32], plane: &mut Vec<f32>) {
    plane.clear();
    plane.par_extend(pixels.par_iter().map(|&p| luminance(p)));
}

/// Sample a single-channel plane with edge clamping
#[inline]
pub(crate) fn sample(plane: &[f32], width: usize, height: usize, x: isize, y: isize) -> f32 {
    let x = x.clamp(0, width as isize - 1) as usize;
    let y = y.clamp(0, height as isize - 1) as usize;
    plane[y * width + x]
}

/// Sobel gradient magnitude at (x, y)
#[inline]
pub(crate) fn sobel(plane: &[f32], width: usize, height: usize, x: usize, y: usize) -> f32 {
    let x = x as isize;
    let y = y as isize;
    let at = |dx: isize, dy: isize| sample(plane, width, height, x + dx, y + dy);

    let tl = at(-1, -1);
    let tm = at(0, -1);
    let tr = at(1, -1);
    let ml = at(-1, 0);
    let mr = at(1, 0);
    let bl = at(-1, 1);
    let bm = at(0, 1);
    let br = at(1, 1);

    let gx = -tl - 2.0 * ml - bl + tr + 2.0 * mr + br;
    let gy = -tl - 2.0 * tm - tr + bl + 2.0 * bm + br;
    (gx * gx + gy * gy).sqrt()
}

/// Smoothstep used for vignettes
#[inline]
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Distance from the frame centre, 0 at the centre and ~0.707 at a corner
#[inline]
pub(crate) fn center_distance(x: usize, y: usize, geometry: StreamGeometry) -> f32 {
    let dx = x as f32 / geometry.width as f32 - 0.5;
    let dy = y as f32 / geometry.height as f32 - 0.5;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOne;

    impl Stage for AddOne {
        fn name(&self) -> &str {
            "add-one"
        }

        fn apply(&mut self, pixels: &mut [u32], _geometry: StreamGeometry) -> Result<(), RenderError> {
            pixels.iter_mut().for_each(|p| *p += 1);
            Ok(())
        }
    }

    struct Double;

    impl Stage for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn apply(&mut self, pixels: &mut [u32], _geometry: StreamGeometry) -> Result<(), RenderError> {
            pixels.iter_mut().for_each(|p| *p *= 2);
            Ok(())
        }
    }

    #[test]
    fn test_identity_leaves_frame_untouched() {
        let geometry = StreamGeometry::bgra(3, 2);
        let original: Vec<u32> = (0..6).map(|i| 0xFF00_0000 | i * 0x0102_03).collect();
        let mut pixels = original.clone();

        let mut chain = EffectChain::identity();
        chain.apply(&mut pixels, geometry).unwrap();

        assert!(chain.is_identity());
        assert_eq!(pixels, original);
    }

    #[test]
    fn test_stages_run_in_order() {
        let geometry = StreamGeometry::bgra(2, 1);
        let mut pixels = vec![1, 2];

        let mut chain = EffectChain::single(AddOne).with_stage(Double);
        chain.apply(&mut pixels, geometry).unwrap();

        assert_eq!(pixels, vec![4, 6]);
        assert_eq!(chain.stage_names(), vec!["add-one", "double"]);
    }

    #[test]
    fn test_wrong_length_is_rejected_before_any_stage() {
        let geometry = StreamGeometry::bgra(2, 2);
        let mut pixels = vec![1, 2, 3];

        let mut chain = EffectChain::single(AddOne);
        assert!(matches!(
            chain.apply(&mut pixels, geometry),
            Err(RenderError::Stage { .. })
        ));
        assert_eq!(pixels, vec![1, 2, 3]);
    }

    #[test]
    fn test_map_rows_passes_coordinates() {
        let geometry = StreamGeometry::bgra(3, 2);
        let mut pixels = vec![0u32; 6];
        map_rows(&mut pixels, geometry, |_, x, y| (y * 10 + x) as u32);
        assert_eq!(pixels, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_sobel_flat_plane_has_no_edges() {
        let plane = vec![0.5f32; 9];
        assert_eq!(sobel(&plane, 3, 3, 1, 1), 0.0);
    }
}
