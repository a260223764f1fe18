// SPDX-License-Identifier: MPL-2.0

//! Error types for the filtered preview pipeline
//!
//! The taxonomy follows how each failure is recovered:
//!
//! - [`ConfigurationError`]: fatal to initialization, surfaced to the caller
//! - [`CaptureError`]: transient device failure, the frame is skipped
//! - [`RenderError`]: a render pass failed, the previous frame stays displayed
//! - [`LockTimeoutError`]: one request could not get the pipeline lock in time

use std::fmt;
use std::time::Duration;

use crate::backends::camera::types::StreamGeometry;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main pipeline error type
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Configuration errors (geometry negotiation, bad parameters)
    Configuration(ConfigurationError),
    /// Capture device errors
    Capture(CaptureError),
    /// Render pass errors
    Render(RenderError),
    /// Lock acquisition timed out
    LockTimeout(LockTimeoutError),
    /// Operation not valid in the current manager state
    InvalidState(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A second, different geometry was requested after the arena was sized
    GeometryChanged {
        current: StreamGeometry,
        requested: StreamGeometry,
    },
    /// Width or height of zero, or a size that does not fit in memory
    InvalidGeometry(StreamGeometry),
    /// The arena was used before `initialize`
    NotInitialized,
    /// An effect could not be built from its parameter tuple
    InvalidEffect { name: String, reason: String },
    /// Config file could not be parsed
    Parse(String),
}

/// Capture device errors (transient, recovered by skipping the frame)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Source has not been started or was stopped
    NotStarted,
    /// No preview frame has arrived yet
    NoFrame,
    /// Caller buffer does not match the source geometry
    BufferSize { expected: usize, actual: usize },
    /// Hardware or driver failure
    Device(String),
}

/// Render pass errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The pipeline lock was held by an effect switch; frame dropped
    Busy(LockTimeoutError),
    /// The capture step failed
    Capture(CaptureError),
    /// A stage rejected the frame
    Stage { stage: String, reason: String },
    /// A stage panicked while processing pixels
    Panicked(String),
    /// The manager is not in a state that renders
    NotReady,
    /// The arena has not been sized for this stream
    Arena(ConfigurationError),
}

/// Lock acquisition timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeoutError {
    /// What tried to take the lock
    pub operation: &'static str,
    /// How long it waited
    pub waited: Duration,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(e) => write!(f, "Configuration error: {}", e),
            PipelineError::Capture(e) => write!(f, "Capture error: {}", e),
            PipelineError::Render(e) => write!(f, "Render error: {}", e),
            PipelineError::LockTimeout(e) => write!(f, "{}", e),
            PipelineError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            PipelineError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::GeometryChanged { current, requested } => write!(
                f,
                "Frame geometry cannot change after initialization ({} requested, {} in use)",
                requested, current
            ),
            ConfigurationError::InvalidGeometry(g) => write!(f, "Invalid frame geometry: {}", g),
            ConfigurationError::NotInitialized => write!(f, "Frame buffer arena not initialized"),
            ConfigurationError::InvalidEffect { name, reason } => {
                write!(f, "Invalid effect '{}': {}", name, reason)
            }
            ConfigurationError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotStarted => write!(f, "Capture source not started"),
            CaptureError::NoFrame => write!(f, "No preview frame available yet"),
            CaptureError::BufferSize { expected, actual } => write!(
                f,
                "Buffer holds {} pixels, source produces {}",
                actual, expected
            ),
            CaptureError::Device(msg) => write!(f, "Device error: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Busy(e) => write!(f, "Frame dropped: {}", e),
            RenderError::Capture(e) => write!(f, "Capture failed: {}", e),
            RenderError::Stage { stage, reason } => write!(f, "Stage '{}' failed: {}", stage, reason),
            RenderError::Panicked(msg) => write!(f, "Render pass panicked: {}", msg),
            RenderError::NotReady => write!(f, "Effect manager is not ready"),
            RenderError::Arena(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for LockTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} could not acquire the pipeline lock within {}ms",
            self.operation,
            self.waited.as_millis()
        )
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for ConfigurationError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RenderError {}
impl std::error::Error for LockTimeoutError {}

// Conversions from sub-errors to PipelineError
impl From<ConfigurationError> for PipelineError {
    fn from(err: ConfigurationError) -> Self {
        PipelineError::Configuration(err)
    }
}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::Capture(err)
    }
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        PipelineError::Render(err)
    }
}

impl From<LockTimeoutError> for PipelineError {
    fn from(err: LockTimeoutError) -> Self {
        PipelineError::LockTimeout(err)
    }
}

impl From<CaptureError> for RenderError {
    fn from(err: CaptureError) -> Self {
        RenderError::Capture(err)
    }
}

impl From<LockTimeoutError> for RenderError {
    fn from(err: LockTimeoutError) -> Self {
        RenderError::Busy(err)
    }
}

impl From<ConfigurationError> for RenderError {
    fn from(err: ConfigurationError) -> Self {
        RenderError::Arena(err)
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Storage(err.to_string())
    }
}
