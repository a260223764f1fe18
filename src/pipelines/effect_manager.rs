// SPDX-License-Identifier: GPL-3.0-only

//! Effect selection and the render pass
//!
//! The manager owns the selected effect, its built chain and the bound frame
//! source. One async mutex serializes the two things that touch them: an
//! effect switch and a render pass. Both wait a bounded time for the lock;
//! a switch that times out fails that one call, and a render that times out
//! drops its frame.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──start──▶ Ready ──select_*──▶ Switching ──▶ Ready
//!                            │
//!                            └──dispose──▶ Disposed
//! ```
//!
//! A render pass holds the lock for capture and effect together and runs on
//! the blocking pool with an owned guard. Dropping the future that awaits
//! it does not cancel the pass: it still finishes (or fails) and releases
//! the lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backends::camera::FrameSource;
use crate::constants::timing;
use crate::effects::{EffectChain, EffectRegistry};
use crate::errors::{
    ConfigurationError, LockTimeoutError, PipelineError, PipelineResult, RenderError,
};
use crate::media::{CommittedFrame, FrameBufferArena};

/// Lifecycle state of an [`EffectManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManagerState {
    Uninitialized = 0,
    Ready = 1,
    Switching = 2,
    Disposed = 3,
}

impl ManagerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ready,
            2 => Self::Switching,
            3 => Self::Disposed,
            _ => Self::Uninitialized,
        }
    }
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Switching => write!(f, "switching"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Bounded waits for the pipeline lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeouts {
    pub switch: Duration,
    pub render: Duration,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        Self {
            switch: timing::SWITCH_LOCK_TIMEOUT,
            render: timing::RENDER_LOCK_TIMEOUT,
        }
    }
}

/// Index of the selected effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectSelection {
    pub index: usize,
}

impl EffectSelection {
    pub fn next(self, count: usize) -> Self {
        Self {
            index: (self.index + 1) % count,
        }
    }

    pub fn previous(self, count: usize) -> Self {
        Self {
            index: (self.index + count - 1) % count,
        }
    }
}

/// Result of a successful render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedFrame {
    /// Where the frame landed in the arena
    pub frame: CommittedFrame,
    /// Effect the frame was rendered with
    pub effect_index: usize,
}

/// Everything guarded by the pipeline lock
struct Pipeline {
    selection: EffectSelection,
    chain: Option<EffectChain>,
    source: Option<Box<dyn FrameSource>>,
}

impl Pipeline {
    fn render_pass(&mut self, arena: &FrameBufferArena) -> Result<RenderedFrame, RenderError> {
        let (Some(source), Some(chain)) = (self.source.as_mut(), self.chain.as_mut()) else {
            return Err(RenderError::NotReady);
        };

        let mut writer = arena.write_slot()?;
        let geometry = writer.geometry();
        if source.geometry() != geometry {
            return Err(RenderError::Arena(ConfigurationError::GeometryChanged {
                current: geometry,
                requested: source.geometry(),
            }));
        }

        // Both steps write the back slot; only commit makes it visible
        source.capture_into(writer.pixels_mut())?;
        chain.apply(writer.pixels_mut(), geometry)?;

        Ok(RenderedFrame {
            frame: writer.commit(),
            effect_index: self.selection.index,
        })
    }
}

/// Owns the selected effect and renders frames with it
pub struct EffectManager {
    registry: Arc<EffectRegistry>,
    pipeline: Arc<Mutex<Pipeline>>,
    /// Mirrors of locked state for lock-free display reads
    selected: AtomicUsize,
    state: AtomicU8,
    timeouts: LockTimeouts,
}

impl EffectManager {
    /// Create a manager starting at `start_index`
    ///
    /// The index comes from the host's persisted state and is wrapped into
    /// range rather than rejected.
    pub fn new(
        registry: Arc<EffectRegistry>,
        start_index: usize,
        timeouts: LockTimeouts,
    ) -> Result<Self, ConfigurationError> {
        if registry.is_empty() {
            return Err(ConfigurationError::InvalidEffect {
                name: "registry".to_string(),
                reason: "no effects registered".to_string(),
            });
        }
        let index = start_index % registry.len();
        if index != start_index {
            warn!(start_index, count = registry.len(), "Start index out of range, wrapping");
        }

        Ok(Self {
            registry,
            pipeline: Arc::new(Mutex::new(Pipeline {
                selection: EffectSelection { index },
                chain: None,
                source: None,
            })),
            selected: AtomicUsize::new(index),
            state: AtomicU8::new(ManagerState::Uninitialized as u8),
            timeouts,
        })
    }

    fn set_state(&self, state: ManagerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn state(&self) -> ManagerState {
        ManagerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    pub fn timeouts(&self) -> LockTimeouts {
        self.timeouts
    }

    async fn lock_for_switch(&self, operation: &'static str) -> PipelineResult<tokio::sync::MutexGuard<'_, Pipeline>> {
        tokio::time::timeout(self.timeouts.switch, self.pipeline.lock())
            .await
            .map_err(|_| {
                warn!(operation, waited_ms = self.timeouts.switch.as_millis() as u64, "Pipeline lock timed out");
                PipelineError::LockTimeout(LockTimeoutError {
                    operation,
                    waited: self.timeouts.switch,
                })
            })
    }

    /// Bind a started source and build the initial chain
    pub async fn start(&self, mut source: Box<dyn FrameSource>) -> PipelineResult<()> {
        let mut pipeline = self.lock_for_switch("start").await?;

        let state = self.state();
        if state != ManagerState::Uninitialized {
            return Err(PipelineError::InvalidState(format!("cannot start while {}", state)));
        }

        let chain = self.registry.build(pipeline.selection.index)?;
        source.start()?;

        info!(
            source = source.name(),
            geometry = %source.geometry(),
            effect = %self.current_effect_name(),
            "Effect manager ready"
        );

        pipeline.chain = Some(chain);
        pipeline.source = Some(source);
        self.set_state(ManagerState::Ready);
        Ok(())
    }

    /// Select the next effect, wrapping to the first
    pub async fn select_next(&self) -> PipelineResult<usize> {
        let count = self.registry.len();
        self.switch("select_next", |s| s.next(count)).await
    }

    /// Select the previous effect, wrapping to the last
    pub async fn select_previous(&self) -> PipelineResult<usize> {
        let count = self.registry.len();
        self.switch("select_previous", |s| s.previous(count)).await
    }

    /// Select an effect by index
    pub async fn select(&self, index: usize) -> PipelineResult<usize> {
        if index >= self.registry.len() {
            return Err(ConfigurationError::InvalidEffect {
                name: index.to_string(),
                reason: format!("index outside 0..{}", self.registry.len()),
            }
            .into());
        }
        self.switch("select", |_| EffectSelection { index }).await
    }

    async fn switch<F>(&self, operation: &'static str, advance: F) -> PipelineResult<usize>
    where
        F: FnOnce(EffectSelection) -> EffectSelection,
    {
        let mut pipeline = self.lock_for_switch(operation).await?;

        let state = self.state();
        if state != ManagerState::Ready {
            return Err(PipelineError::InvalidState(format!(
                "cannot switch effects while {}",
                state
            )));
        }
        self.set_state(ManagerState::Switching);

        let previous = pipeline.selection;
        let target = advance(previous);

        // Keep the old chain until the new one builds so a failure can roll back
        let old_chain = pipeline.chain.take();
        match self.registry.build(target.index) {
            Ok(chain) => {
                drop(old_chain);
                pipeline.chain = Some(chain);
                pipeline.selection = target;
                self.selected.store(target.index, Ordering::SeqCst);
                self.set_state(ManagerState::Ready);
                info!(
                    from = previous.index,
                    to = target.index,
                    effect = %self.current_effect_name(),
                    "Effect switched"
                );
                Ok(target.index)
            }
            Err(e) => {
                pipeline.chain = old_chain;
                self.set_state(ManagerState::Ready);
                error!(error = %e, index = target.index, "Failed to build effect, keeping previous");
                Err(e.into())
            }
        }
    }

    /// Capture one frame into the arena and apply the current effect
    ///
    /// On any error the arena's front frame is the previous fully rendered
    /// one.
    pub async fn render_one_frame(&self, arena: &Arc<FrameBufferArena>) -> Result<RenderedFrame, RenderError> {
        let pipeline = tokio::time::timeout(self.timeouts.render, Arc::clone(&self.pipeline).lock_owned())
            .await
            .map_err(|_| {
                debug!("Render skipped, pipeline busy");
                RenderError::Busy(LockTimeoutError {
                    operation: "render",
                    waited: self.timeouts.render,
                })
            })?;

        if self.state() != ManagerState::Ready {
            return Err(RenderError::NotReady);
        }

        let arena = Arc::clone(arena);
        let pass = tokio::task::spawn_blocking(move || {
            let mut pipeline = pipeline;
            pipeline.render_pass(&arena)
        });

        match pass.await {
            Ok(result) => result,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!(error = %message, "Render pass panicked");
                Err(RenderError::Panicked(message))
            }
        }
    }

    /// Release the chain and stop the source
    ///
    /// Waits for an in-flight render pass to finish first. Calling it again
    /// is a no-op.
    pub async fn dispose(&self) {
        let mut pipeline = self.pipeline.lock().await;
        if self.state() == ManagerState::Disposed {
            return;
        }

        pipeline.chain = None;
        if let Some(mut source) = pipeline.source.take() {
            source.stop();
        }
        self.set_state(ManagerState::Disposed);
        info!("Effect manager disposed");
    }

    pub fn current_index(&self) -> usize {
        self.selected.load(Ordering::SeqCst)
    }

    pub fn current_effect_name(&self) -> String {
        self.registry
            .descriptor(self.current_index())
            .map(|d| d.name.clone())
            .unwrap_or_default()
    }

    /// "3/11 - Grayscale"
    pub fn current_label(&self) -> String {
        self.registry.label(self.current_index()).unwrap_or_default()
    }

    pub fn effect_count(&self) -> usize {
        self.registry.len()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
