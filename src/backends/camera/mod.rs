// SPDX-License-Identifier: MPL-2.0

//! Frame source abstraction
//!
//! The pipeline never talks to a capture device directly; it asks a
//! [`FrameSource`] to copy the current preview frame into a buffer it lends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Effect Manager    │  ← holds the pipeline lock while capturing
//! └──────────┬──────────┘
//!            │ capture_into(&mut [u32])
//!            ▼
//! ┌─────────────────────┐
//! │  FrameSource Trait  │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┬──────────────┐
//!      ▼            ▼              ▼
//! ┌─────────┐ ┌───────────┐ ┌────────────┐
//! │Synthetic│ │LivePreview│ │ V4L2 device│
//! └─────────┘ └───────────┘ └────────────┘
//! ```

pub mod capture_loop;
pub mod preview;
pub mod synthetic;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use preview::{LivePreviewSource, PreviewSlot};
pub use synthetic::{FaultInjector, SyntheticSource, TestPattern};
pub use types::*;

use crate::config::{Config, SourceConfig};
use crate::errors::{CaptureError, PipelineError};

/// Capture device capability
///
/// Implementations must tolerate `capture_into` being called repeatedly at
/// any rate. A transient failure returns [`CaptureError`]; the pipeline
/// skips the frame and keeps going.
pub trait FrameSource: Send {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Geometry of the frames this source produces
    fn geometry(&self) -> StreamGeometry;

    /// Start the preview
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop the preview (best effort, never fails)
    fn stop(&mut self);

    /// Whether the preview is running
    fn is_started(&self) -> bool;

    /// Copy the most recent preview frame into `pixels`
    ///
    /// `pixels` must hold exactly `geometry().pixel_count()` BGRA words.
    fn capture_into(&mut self, pixels: &mut [u32]) -> Result<(), CaptureError>;
}

/// Check a caller buffer against a source geometry
pub fn check_buffer(geometry: StreamGeometry, pixels: &[u32]) -> Result<(), CaptureError> {
    let expected = geometry.pixel_count();
    if pixels.len() != expected {
        return Err(CaptureError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Build the frame source a configuration asks for
pub fn open_source(config: &Config) -> Result<Box<dyn FrameSource>, PipelineError> {
    let geometry = config.geometry();

    match &config.source {
        SourceConfig::Synthetic => {
            let synthetic = SyntheticSource::new(geometry, TestPattern::ColorBars);
            Ok(Box::new(LivePreviewSource::paced(
                Box::new(synthetic),
                config.framerate(),
            )))
        }
        #[cfg(feature = "v4l2")]
        SourceConfig::V4l2 { device } => Ok(Box::new(v4l2::open(device, geometry, config.framerate()))),
        #[cfg(not(feature = "v4l2"))]
        SourceConfig::V4l2 { device } => Err(PipelineError::InvalidState(format!(
            "V4L2 capture from {} requires the `v4l2` feature",
            device
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_buffer() {
        let geometry = StreamGeometry::bgra(4, 4);
        assert!(check_buffer(geometry, &[0; 16]).is_ok());
        assert_eq!(
            check_buffer(geometry, &[0; 15]),
            Err(CaptureError::BufferSize {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_open_default_source() {
        let config = Config::default();
        let source = open_source(&config).unwrap();
        assert_eq!(source.geometry(), config.geometry());
        assert!(!source.is_started());
    }
}
