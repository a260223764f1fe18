// SPDX-License-Identifier: GPL-3.0-only

//! Latest-frame handoff between a capture thread and the render pass
//!
//! A live device delivers frames on its own schedule. The capture thread
//! converts each one into a private staging buffer and then publishes it to
//! a [`PreviewSlot`]; the render pass copies whatever was published last.
//! Publishing swaps whole frames under a short lock, so a reader never sees
//! half of one frame and half of the next.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::capture_loop::{CaptureLoopController, LoopAction};
use super::{FrameSource, StreamGeometry, check_buffer};
use crate::backends::camera::types::Framerate;
use crate::errors::CaptureError;

struct LatestFrame {
    pixels: Vec<u32>,
    sequence: u64,
}

/// Shared slot holding the most recently captured frame
#[derive(Clone)]
pub struct PreviewSlot {
    inner: Arc<Mutex<LatestFrame>>,
}

impl PreviewSlot {
    pub fn new(geometry: StreamGeometry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LatestFrame {
                pixels: vec![0; geometry.pixel_count()],
                sequence: 0,
            })),
        }
    }

    /// Publish a complete frame
    ///
    /// Frames of the wrong size are dropped with a warning.
    pub fn publish(&self, pixels: &[u32]) {
        let mut latest = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.pixels.len() != pixels.len() {
            warn!(
                expected = latest.pixels.len(),
                actual = pixels.len(),
                "Dropping preview frame of unexpected size"
            );
            return;
        }
        latest.pixels.copy_from_slice(pixels);
        latest.sequence += 1;
    }

    /// Copy the latest frame into `dst`, returning its sequence number
    pub fn copy_latest(&self, dst: &mut [u32]) -> Result<u64, CaptureError> {
        let latest = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.sequence == 0 {
            return Err(CaptureError::NoFrame);
        }
        if dst.len() != latest.pixels.len() {
            return Err(CaptureError::BufferSize {
                expected: latest.pixels.len(),
                actual: dst.len(),
            });
        }
        dst.copy_from_slice(&latest.pixels);
        Ok(latest.sequence)
    }

    /// Number of frames published so far
    pub fn sequence(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence
    }
}

type Starter = Box<dyn FnMut(PreviewSlot) -> Result<CaptureLoopController, CaptureError> + Send>;
type Stopper = Box<dyn FnMut() + Send>;

/// Frame source backed by a capture thread
///
/// `capture_into` never blocks on the device: it returns the newest
/// published frame, or [`CaptureError::NoFrame`] until the first arrives.
pub struct LivePreviewSource {
    name: String,
    geometry: StreamGeometry,
    slot: PreviewSlot,
    starter: Starter,
    stopper: Option<Stopper>,
    controller: Option<CaptureLoopController>,
}

impl LivePreviewSource {
    /// Build a live source from a function that spawns its capture thread
    ///
    /// `starter` receives the slot the thread must publish into.
    pub fn new<F>(name: impl Into<String>, geometry: StreamGeometry, starter: F) -> Self
    where
        F: FnMut(PreviewSlot) -> Result<CaptureLoopController, CaptureError> + Send + 'static,
    {
        Self {
            name: name.into(),
            geometry,
            slot: PreviewSlot::new(geometry),
            starter: Box::new(starter),
            stopper: None,
            controller: None,
        }
    }

    /// Drive a pull-only source from a thread at a fixed frame rate
    ///
    /// Used for the synthetic source so the interactive preview sees frames
    /// arrive the way a camera delivers them.
    pub fn paced(inner: Box<dyn FrameSource>, framerate: Framerate) -> Self {
        let name = format!("{} (live)", inner.name());
        let geometry = inner.geometry();
        let interval = framerate.frame_interval();
        let inner = Arc::new(Mutex::new(inner));
        let stop_handle = Arc::clone(&inner);
        let loop_name = name.clone();

        let starter = move |slot: PreviewSlot| -> Result<CaptureLoopController, CaptureError> {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .start()?;

            let source = Arc::clone(&inner);
            let mut staging = vec![0u32; geometry.pixel_count()];
            let mut next_frame = Instant::now();

            Ok(CaptureLoopController::start(&loop_name, move || {
                let captured = source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .capture_into(&mut staging);
                match captured {
                    Ok(()) => slot.publish(&staging),
                    Err(e) => debug!(error = %e, "Paced capture skipped a frame"),
                }

                next_frame += interval;
                let now = Instant::now();
                if next_frame > now {
                    std::thread::sleep(next_frame - now);
                } else {
                    // Fell behind, do not try to catch up
                    next_frame = now;
                }
                LoopAction::Continue
            }))
        };

        let stopper = move || {
            stop_handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .stop();
        };

        let mut source = Self::new(name, geometry, starter);
        source.stopper = Some(Box::new(stopper));
        source
    }

    /// The slot the capture thread publishes into
    pub fn slot(&self) -> &PreviewSlot {
        &self.slot
    }
}

impl FrameSource for LivePreviewSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.controller.is_some() {
            return Ok(());
        }
        info!(name = %self.name, "Starting live preview");
        self.controller = Some((self.starter)(self.slot.clone())?);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            if let Some(stopper) = self.stopper.as_mut() {
                stopper();
            }
            info!(name = %self.name, "Live preview stopped");
        }
    }

    fn is_started(&self) -> bool {
        self.controller.is_some()
    }

    fn capture_into(&mut self, pixels: &mut [u32]) -> Result<(), CaptureError> {
        check_buffer(self.geometry, pixels)?;
        let Some(controller) = self.controller.as_ref() else {
            return Err(CaptureError::NotStarted);
        };
        if !controller.is_running() {
            return Err(CaptureError::Device(format!(
                "{} capture thread is not running",
                self.name
            )));
        }
        self.slot.copy_latest(pixels).map(|_| ())
    }
}

impl Drop for LivePreviewSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::{SyntheticSource, TestPattern};
    use std::time::Duration;

    #[test]
    fn test_slot_requires_a_published_frame() {
        let slot = PreviewSlot::new(StreamGeometry::bgra(2, 2));
        let mut dst = [0u32; 4];
        assert_eq!(slot.copy_latest(&mut dst), Err(CaptureError::NoFrame));

        slot.publish(&[7; 4]);
        assert_eq!(slot.copy_latest(&mut dst), Ok(1));
        assert_eq!(dst, [7; 4]);
    }

    #[test]
    fn test_slot_drops_wrong_sized_frames() {
        let slot = PreviewSlot::new(StreamGeometry::bgra(2, 2));
        slot.publish(&[1; 3]);
        assert_eq!(slot.sequence(), 0);
    }

    #[test]
    fn test_not_started_source_refuses_capture() {
        let synthetic = SyntheticSource::new(StreamGeometry::bgra(4, 4), TestPattern::Solid(0xFF00_FF00));
        let mut live = LivePreviewSource::paced(Box::new(synthetic), Framerate::from_int(60));
        let mut dst = vec![0u32; 16];
        assert_eq!(live.capture_into(&mut dst), Err(CaptureError::NotStarted));
    }

    #[test]
    fn test_paced_source_publishes_frames() {
        let synthetic = SyntheticSource::new(StreamGeometry::bgra(4, 4), TestPattern::Solid(0xFF00_FF00));
        let mut live = LivePreviewSource::paced(Box::new(synthetic), Framerate::from_int(100));
        live.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while live.slot().sequence() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut dst = vec![0u32; 16];
        live.capture_into(&mut dst).unwrap();
        assert!(dst.iter().all(|&p| p == 0xFF00_FF00));

        live.stop();
        assert!(!live.is_started());
    }
}
