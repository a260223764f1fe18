// SPDX-License-Identifier: MPL-2.0

//! Preview pipeline
//!
//! ```text
//! ┌──────────┐ get_sample ┌───────────────┐ render_one_frame ┌───────────────┐
//! │   Sink   │ ─────────▶ │ StreamAdapter │ ───────────────▶ │ EffectManager │
//! └──────────┘            └───────┬───────┘                  └───────┬───────┘
//!      ▲                          │ FrameSample                      │ lock held:
//!      │                          ▼                                  │ capture + chain
//!      │                  ┌───────────────┐                          ▼
//!      └──── reads ────── │ FrameBuffer   │ ◀────── commit ──── back slot
//!                         │    Arena      │
//!                         └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`effect_manager`]: Effect selection and the locked render pass
//! - [`stream`]: Pull protocol, sample timing and failure accounting
//! - [`frame_rate`]: Once-per-second frame-rate reports

pub mod effect_manager;
pub mod frame_rate;
pub mod stream;

pub use effect_manager::{EffectManager, LockTimeouts, ManagerState, RenderedFrame};
pub use frame_rate::{FrameRateCounter, FrameRateReport};
pub use stream::{FrameSample, OpenedStream, StreamAdapter, StreamDescription, StreamStats};

use std::sync::Arc;
use tracing::info;

use crate::backends::camera::{FrameSource, open_source};
use crate::config::Config;
use crate::effects::EffectRegistry;
use crate::errors::PipelineResult;
use crate::media::FrameBufferArena;

/// Build and open a preview stream from `config`
pub async fn open_preview(config: &Config, arena: Arc<FrameBufferArena>) -> PipelineResult<StreamAdapter> {
    config.validate()?;
    let source = open_source(config)?;
    open_preview_with(config, source, arena).await
}

/// Build and open a preview stream around an existing frame source
pub async fn open_preview_with(
    config: &Config,
    source: Box<dyn FrameSource>,
    arena: Arc<FrameBufferArena>,
) -> PipelineResult<StreamAdapter> {
    let registry = Arc::new(EffectRegistry::standard()?);
    let manager = Arc::new(EffectManager::new(
        registry,
        config.effect_index,
        config.lock_timeouts(),
    )?);
    manager.start(source).await?;

    let mut stream = StreamAdapter::new(arena, manager, config.framerate())
        .with_failure_threshold(config.status_failure_threshold);
    if let Err(e) = stream.open(config.geometry()) {
        stream.manager().dispose().await;
        return Err(e.into());
    }

    info!(
        effect = %stream.manager().current_label(),
        "Preview pipeline ready"
    );
    Ok(stream)
}
