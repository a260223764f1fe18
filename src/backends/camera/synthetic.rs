// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic frame source
//!
//! Generates test patterns without any hardware, for headless runs, CI and
//! tests. A [`FaultInjector`] lets callers make individual captures fail so
//! the pipeline's recovery paths can be exercised deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info};

use super::{FrameSource, StreamGeometry, check_buffer};
use crate::errors::CaptureError;
use crate::media::formats::pack_bgra;

/// SMPTE-style bar colours, left to right
const BARS: [(u8, u8, u8); 8] = [
    (192, 192, 192),
    (192, 192, 0),
    (0, 192, 192),
    (0, 192, 0),
    (192, 0, 192),
    (192, 0, 0),
    (0, 0, 192),
    (16, 16, 16),
];

/// Picture generated by [`SyntheticSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// Vertical colour bars scrolling one pixel per frame
    ColorBars,
    /// Horizontal red ramp, vertical green ramp, blue follows the frame count
    Gradient,
    /// Every pixel the same BGRA word
    Solid(u32),
}

/// Handle for making synthetic captures fail on demand
///
/// Clones share state, so a test can keep one handle while the source
/// itself moves into the pipeline.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    fail_next: Arc<AtomicU32>,
    fail_every: Arc<AtomicU32>,
    attempts: Arc<AtomicU64>,
}

impl FaultInjector {
    /// Fail the next `count` captures
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every `period`-th capture (0 disables)
    pub fn fail_every(&self, period: u32) {
        self.fail_every.store(period, Ordering::SeqCst);
    }

    /// Capture attempts seen so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let pending = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return true;
        }

        let period = self.fail_every.load(Ordering::SeqCst) as u64;
        period != 0 && attempt % period == 0
    }
}

/// Frame source that draws test patterns
pub struct SyntheticSource {
    geometry: StreamGeometry,
    pattern: TestPattern,
    started: bool,
    frame: u64,
    faults: FaultInjector,
}

impl SyntheticSource {
    pub fn new(geometry: StreamGeometry, pattern: TestPattern) -> Self {
        Self {
            geometry,
            pattern,
            started: false,
            frame: 0,
            faults: FaultInjector::default(),
        }
    }

    /// Handle for injecting capture failures
    pub fn faults(&self) -> FaultInjector {
        self.faults.clone()
    }

    /// Frames generated so far
    pub fn frames_generated(&self) -> u64 {
        self.frame
    }

    fn draw(&self, pixels: &mut [u32]) {
        let width = self.geometry.width as usize;
        let height = self.geometry.height as usize;

        match self.pattern {
            TestPattern::Solid(color) => pixels.fill(color),
            TestPattern::ColorBars => {
                let shift = self.frame as usize;
                for row in pixels.chunks_exact_mut(width) {
                    for (x, pixel) in row.iter_mut().enumerate() {
                        let bar = ((x + shift) % width) * BARS.len() / width;
                        let (r, g, b) = BARS[bar];
                        *pixel = pack_bgra(r, g, b, 0xFF);
                    }
                }
            }
            TestPattern::Gradient => {
                let blue = (self.frame % 256) as u8;
                for (y, row) in pixels.chunks_exact_mut(width).enumerate() {
                    let g = (y * 255 / height.saturating_sub(1).max(1)) as u8;
                    for (x, pixel) in row.iter_mut().enumerate() {
                        let r = (x * 255 / width.saturating_sub(1).max(1)) as u8;
                        *pixel = pack_bgra(r, g, blue, 0xFF);
                    }
                }
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "Synthetic test pattern"
    }

    fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if !self.started {
            info!(geometry = %self.geometry, pattern = ?self.pattern, "Synthetic source started");
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.started {
            debug!(frames = self.frame, "Synthetic source stopped");
        }
        self.started = false;
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn capture_into(&mut self, pixels: &mut [u32]) -> Result<(), CaptureError> {
        if !self.started {
            return Err(CaptureError::NotStarted);
        }
        check_buffer(self.geometry, pixels)?;

        if self.faults.should_fail() {
            return Err(CaptureError::Device("injected capture failure".to_string()));
        }

        self.draw(pixels);
        self.frame += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::formats::unpack_bgra;

    fn started(pattern: TestPattern) -> SyntheticSource {
        let mut source = SyntheticSource::new(StreamGeometry::bgra(8, 2), pattern);
        source.start().unwrap();
        source
    }

    #[test]
    fn test_capture_requires_start() {
        let mut source = SyntheticSource::new(StreamGeometry::bgra(8, 2), TestPattern::ColorBars);
        let mut pixels = vec![0u32; 16];
        assert_eq!(source.capture_into(&mut pixels), Err(CaptureError::NotStarted));
    }

    #[test]
    fn test_solid_pattern() {
        let mut source = started(TestPattern::Solid(0xFF10_2030));
        let mut pixels = vec![0u32; 16];
        source.capture_into(&mut pixels).unwrap();
        assert!(pixels.iter().all(|&p| p == 0xFF10_2030));
    }

    #[test]
    fn test_color_bars_scroll() {
        let mut source = started(TestPattern::ColorBars);
        let mut first = vec![0u32; 16];
        let mut second = vec![0u32; 16];
        source.capture_into(&mut first).unwrap();
        source.capture_into(&mut second).unwrap();

        assert_eq!(unpack_bgra(first[0]), (192, 192, 192, 255));
        assert_eq!(second[0], first[1]);
        assert_eq!(source.frames_generated(), 2);
    }

    #[test]
    fn test_fail_next() {
        let mut source = started(TestPattern::Solid(0));
        let faults = source.faults();
        faults.fail_next(2);

        let mut pixels = vec![0u32; 16];
        assert!(source.capture_into(&mut pixels).is_err());
        assert!(source.capture_into(&mut pixels).is_err());
        assert!(source.capture_into(&mut pixels).is_ok());
        assert_eq!(faults.attempts(), 3);
    }

    #[test]
    fn test_fail_every() {
        let mut source = started(TestPattern::Solid(0));
        source.faults().fail_every(3);

        let mut pixels = vec![0u32; 16];
        let outcomes: Vec<bool> = (0..6).map(|_| source.capture_into(&mut pixels).is_ok()).collect();
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_wrong_buffer_size() {
        let mut source = started(TestPattern::Solid(0));
        let mut pixels = vec![0u32; 3];
        assert!(matches!(
            source.capture_into(&mut pixels),
            Err(CaptureError::BufferSize { expected: 16, actual: 3 })
        ));
    }
}
