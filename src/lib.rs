// SPDX-License-Identifier: MPL-2.0

//! Filter Preview - real-time filtered camera preview
//!
//! Frames are pulled by a rendering sink, captured from a frame source,
//! run through the selected effect chain and delivered out of a shared
//! frame buffer arena. Effects can be switched while the preview runs.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources (synthetic test pattern, V4L2)
//! - [`effects`]: Effect stages, chains and the effect registry
//! - [`media`]: Frame buffer arena and pixel format conversion
//! - [`pipelines`]: Effect manager, stream adapter and frame-rate reports
//! - [`config`]: User configuration handling
//! - [`storage`]: Snapshot saving
//! - [`terminal`]: Terminal preview sink
//!
//! # Example
//!
//! ```ignore
//! let config = Config::default();
//! let mut stream = pipelines::open_preview(&config, FrameBufferArena::global()).await?;
//! let sample = stream.get_sample().await;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod effects;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::{FrameSource, StreamGeometry};
pub use config::Config;
pub use effects::{EffectChain, EffectRegistry};
pub use errors::{PipelineError, PipelineResult};
pub use media::FrameBufferArena;
pub use pipelines::{EffectManager, FrameSample, StreamAdapter};
