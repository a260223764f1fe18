// SPDX-License-Identifier: GPL-3.0-only

//! Pull-based sample delivery
//!
//! [`StreamAdapter`] is the source side of a live media stream. A sink
//! opens it once, then asks for samples at whatever pace it likes. Each
//! request renders one frame through the [`EffectManager`] into the shared
//! arena and answers with a sample that points at the committed slot.
//!
//! Timing follows a fixed frame interval. Only delivered frames advance the
//! presentation time; a failed pull repeats the last time with an empty
//! payload, so the sink never sees time jump or run backwards.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::effect_manager::EffectManager;
use super::frame_rate::{FrameRateCounter, FrameRateReport, FrameRateTicker, report_channel};
use crate::backends::camera::types::{Framerate, StreamGeometry};
use crate::constants::{status, timing};
use crate::errors::{ConfigurationError, RenderError};
use crate::media::FrameBufferArena;

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
}

/// One stream-level attribute declared at open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAttribute {
    FourCC(&'static str),
    Width(u32),
    Height(u32),
    FrameRate(Framerate),
}

/// What the sink is told about the stream when it opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub stream_type: StreamType,
    pub geometry: StreamGeometry,
    pub attributes: Vec<StreamAttribute>,
}

impl StreamDescription {
    fn video(geometry: StreamGeometry, framerate: Framerate) -> Self {
        Self {
            stream_type: StreamType::Video,
            geometry,
            attributes: vec![
                StreamAttribute::FourCC(geometry.pixel_format.fourcc()),
                StreamAttribute::Width(geometry.width),
                StreamAttribute::Height(geometry.height),
                StreamAttribute::FrameRate(framerate),
            ],
        }
    }
}

/// Answer to `open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    pub description: StreamDescription,
    /// Always false, a live preview cannot seek
    pub can_seek: bool,
    /// Zero marks an unbounded live stream
    pub duration: Duration,
}

/// Per-sample metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleAttributes {
    /// Effect the frame was rendered with
    pub effect_index: usize,
    /// Number of frames delivered before this one
    pub sequence: u64,
}

/// One answer to a sample request
///
/// `buffer_offset` and `length` address bytes in the shared arena. The
/// bytes are only valid until the next pull renders over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    pub buffer_offset: usize,
    pub length: usize,
    pub presentation_time: Duration,
    pub attributes: SampleAttributes,
}

impl FrameSample {
    /// An empty sample carries no frame; the sink keeps showing the last one
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Pull outcome counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    pub delivered: u64,
    /// Pulls answered with an empty sample, for any reason
    pub dropped: u64,
    pub capture_failures: u64,
    pub render_failures: u64,
    /// Pulls skipped because an effect switch held the lock
    pub busy_skips: u64,
    /// Capture and render failures since the last delivered frame
    pub consecutive_failures: u32,
}

/// State that lives from `open` to `close`
struct OpenState {
    description: StreamDescription,
    ticker: Option<FrameRateTicker>,
}

/// Source side of the pull protocol
pub struct StreamAdapter {
    arena: Arc<FrameBufferArena>,
    manager: Arc<EffectManager>,
    framerate: Framerate,
    frame_interval: Duration,
    failure_threshold: u32,
    open: Option<OpenState>,
    presentation_time: Duration,
    stats: StreamStats,
    status: Option<String>,
    counter: FrameRateCounter,
    report_tx: Sender<FrameRateReport>,
    report_rx: Option<Receiver<FrameRateReport>>,
}

impl StreamAdapter {
    pub fn new(arena: Arc<FrameBufferArena>, manager: Arc<EffectManager>, framerate: Framerate) -> Self {
        let (report_tx, report_rx) = report_channel();
        Self {
            arena,
            manager,
            framerate,
            frame_interval: framerate.frame_interval(),
            failure_threshold: status::FAILURE_THRESHOLD,
            open: None,
            presentation_time: Duration::ZERO,
            stats: StreamStats::default(),
            status: None,
            counter: FrameRateCounter::new(),
            report_tx,
            report_rx: Some(report_rx),
        }
    }

    /// Consecutive failures before a status message is raised
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Declare the stream and start frame-rate reporting
    ///
    /// Sizes the shared arena for `geometry`. Asking for a geometry other
    /// than the one the arena already holds fails and leaves the stream
    /// closed. Opening an open stream returns the existing description.
    pub fn open(&mut self, geometry: StreamGeometry) -> Result<OpenedStream, ConfigurationError> {
        if let Some(open) = &self.open {
            if open.description.geometry != geometry {
                return Err(ConfigurationError::GeometryChanged {
                    current: open.description.geometry,
                    requested: geometry,
                });
            }
            return Ok(self.opened(open.description.clone()));
        }

        self.arena.initialize(geometry)?;

        let description = StreamDescription::video(geometry, self.framerate);
        let ticker = FrameRateTicker::spawn(
            self.counter.clone(),
            timing::FRAME_RATE_REPORT_PERIOD,
            self.report_tx.clone(),
        );

        info!(
            %geometry,
            framerate = %self.framerate,
            interval_us = self.frame_interval.as_micros() as u64,
            "Stream opened"
        );

        self.open = Some(OpenState {
            description: description.clone(),
            ticker,
        });
        Ok(self.opened(description))
    }

    fn opened(&self, description: StreamDescription) -> OpenedStream {
        OpenedStream {
            description,
            can_seek: false,
            duration: Duration::ZERO,
        }
    }

    /// Answer one sample request
    ///
    /// Never fails: errors are counted and answered with an empty sample at
    /// the previous presentation time.
    pub async fn get_sample(&mut self) -> FrameSample {
        if self.open.is_none() {
            self.stats.dropped += 1;
            return self.empty_sample();
        }

        match self.manager.render_one_frame(&self.arena).await {
            Ok(rendered) => {
                let sequence = self.stats.delivered;
                self.presentation_time += self.frame_interval;
                self.stats.delivered += 1;
                self.counter.record();
                self.recovered();

                if self.stats.delivered % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        delivered = self.stats.delivered,
                        dropped = self.stats.dropped,
                        pts_ms = self.presentation_time.as_millis() as u64,
                        "Stream progress"
                    );
                }

                FrameSample {
                    buffer_offset: rendered.frame.offset,
                    length: rendered.frame.length,
                    presentation_time: self.presentation_time,
                    attributes: SampleAttributes {
                        effect_index: rendered.effect_index,
                        sequence,
                    },
                }
            }
            Err(e) => {
                self.record_failure(&e);
                self.empty_sample()
            }
        }
    }

    fn empty_sample(&self) -> FrameSample {
        FrameSample {
            buffer_offset: 0,
            length: 0,
            presentation_time: self.presentation_time,
            attributes: SampleAttributes {
                effect_index: self.manager.current_index(),
                sequence: self.stats.delivered,
            },
        }
    }

    fn record_failure(&mut self, error: &RenderError) {
        self.stats.dropped += 1;
        match error {
            RenderError::Busy(_) => {
                // The pipeline is healthy, a switch just held the lock
                self.stats.busy_skips += 1;
                debug!(error = %error, "Sample skipped");
                return;
            }
            RenderError::Capture(_) => self.stats.capture_failures += 1,
            _ => self.stats.render_failures += 1,
        }

        self.stats.consecutive_failures += 1;
        debug!(
            error = %error,
            consecutive = self.stats.consecutive_failures,
            "Sample dropped"
        );

        if self.stats.consecutive_failures == self.failure_threshold {
            let message = format!(
                "{} consecutive frames failed, last error: {}",
                self.stats.consecutive_failures, error
            );
            warn!(%message, "Preview degraded");
            self.status = Some(message);
        } else if let Some(status) = self.status.as_mut() {
            if self.stats.consecutive_failures > self.failure_threshold {
                *status = format!(
                    "{} consecutive frames failed, last error: {}",
                    self.stats.consecutive_failures, error
                );
            }
        }
    }

    fn recovered(&mut self) {
        if self.status.take().is_some() {
            info!(
                after = self.stats.consecutive_failures,
                "Preview recovered"
            );
        }
        self.stats.consecutive_failures = 0;
    }

    /// Acknowledge a seek request
    ///
    /// A live stream has nothing to seek to; timing is left as it is.
    pub fn seek(&mut self, time: Duration) -> Duration {
        debug!(requested_ms = time.as_millis() as u64, "Seek acknowledged, live stream unchanged");
        time
    }

    /// Release per-open state
    ///
    /// Stops frame-rate reporting, resets timing and clears the degraded
    /// status. The arena keeps its memory and its last frame.
    pub fn close(&mut self) {
        if let Some(open) = self.open.take() {
            if let Some(ticker) = open.ticker {
                ticker.stop();
            }
            info!(
                delivered = self.stats.delivered,
                dropped = self.stats.dropped,
                "Stream closed"
            );
        }
        self.presentation_time = Duration::ZERO;
        self.stats.consecutive_failures = 0;
        self.status = None;
        self.counter.take();
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn description(&self) -> Option<&StreamDescription> {
        self.open.as_ref().map(|o| &o.description)
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Time of the last delivered sample
    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Set while `failure_threshold` or more pulls in a row have failed
    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Frame-rate reports, one per second while open
    ///
    /// The receiver can be taken once.
    pub fn frame_rate_reports(&mut self) -> Option<Receiver<FrameRateReport>> {
        self.report_rx.take()
    }

    pub fn arena(&self) -> &Arc<FrameBufferArena> {
        &self.arena
    }

    pub fn manager(&self) -> &Arc<EffectManager> {
        &self.manager
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{FaultInjector, SyntheticSource, TestPattern};
    use crate::effects::EffectRegistry;
    use crate::pipelines::effect_manager::LockTimeouts;
    use futures::{FutureExt, StreamExt};

    fn geometry() -> StreamGeometry {
        StreamGeometry::bgra(16, 8)
    }

    async fn adapter(start_index: usize) -> (StreamAdapter, FaultInjector) {
        let registry = Arc::new(EffectRegistry::standard().unwrap());
        let manager = Arc::new(EffectManager::new(registry, start_index, LockTimeouts::default()).unwrap());
        let source = SyntheticSource::new(geometry(), TestPattern::Solid(0xFF80_4020));
        let faults = source.faults();
        manager.start(Box::new(source)).await.unwrap();

        let arena = Arc::new(FrameBufferArena::new());
        (StreamAdapter::new(arena, manager, Framerate::from_int(30)), faults)
    }

    #[tokio::test]
    async fn test_open_declares_live_stream() {
        let (mut stream, _) = adapter(9).await;
        let opened = stream.open(geometry()).unwrap();

        assert!(!opened.can_seek);
        assert_eq!(opened.duration, Duration::ZERO);
        assert_eq!(opened.description.stream_type, StreamType::Video);
        assert!(opened.description.attributes.contains(&StreamAttribute::FourCC("BGRA")));
        assert!(opened.description.attributes.contains(&StreamAttribute::Width(16)));
        assert!(opened.description.attributes.contains(&StreamAttribute::Height(8)));
        assert_eq!(stream.arena().geometry(), Some(geometry()));
    }

    #[tokio::test]
    async fn test_open_rejects_new_geometry() {
        let (mut stream, _) = adapter(9).await;
        stream.open(geometry()).unwrap();
        assert!(matches!(
            stream.open(StreamGeometry::bgra(32, 32)),
            Err(ConfigurationError::GeometryChanged { .. })
        ));
        assert!(stream.is_open());
    }

    #[tokio::test]
    async fn test_sample_references_arena_frame() {
        let (mut stream, _) = adapter(9).await;
        stream.open(geometry()).unwrap();

        let sample = stream.get_sample().await;

        assert_eq!(sample.length, geometry().frame_bytes());
        assert_eq!(sample.presentation_time, stream.frame_interval());
        assert_eq!(sample.attributes.sequence, 0);
        let view = stream.arena().view(sample.buffer_offset, sample.length).unwrap();
        assert!(view.pixels().iter().all(|&p| p == 0xFF80_4020));
    }

    #[tokio::test]
    async fn test_timing_survives_failures() {
        let (mut stream, faults) = adapter(2).await;
        stream.open(geometry()).unwrap();
        faults.fail_every(3);

        let interval = stream.frame_interval();
        let mut last = Duration::ZERO;
        let mut delivered = 0u32;
        for _ in 0..30 {
            let sample = stream.get_sample().await;
            if sample.is_empty() {
                assert_eq!(sample.presentation_time, last);
            } else {
                delivered += 1;
                assert_eq!(sample.presentation_time, last + interval);
                assert_eq!(sample.presentation_time, interval * delivered);
                last = sample.presentation_time;
            }
        }

        let stats = stream.stats();
        assert_eq!(stats.delivered, 20);
        assert_eq!(stats.capture_failures, 10);
        assert_eq!(stats.dropped, 10);
    }

    #[tokio::test]
    async fn test_status_message_after_repeated_failures() {
        let (stream, faults) = adapter(9).await;
        let mut stream = stream.with_failure_threshold(3);
        stream.open(geometry()).unwrap();

        faults.fail_next(2);
        stream.get_sample().await;
        stream.get_sample().await;
        assert!(stream.status_message().is_none());

        faults.fail_next(1);
        stream.get_sample().await;
        assert!(stream.status_message().unwrap().contains("3 consecutive"));

        assert!(!stream.get_sample().await.is_empty());
        assert!(stream.status_message().is_none());
        assert_eq!(stream.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_reopen_starts_without_degraded_status() {
        let (stream, faults) = adapter(9).await;
        let mut stream = stream.with_failure_threshold(2);
        stream.open(geometry()).unwrap();

        faults.fail_next(3);
        for _ in 0..3 {
            stream.get_sample().await;
        }
        assert!(stream.status_message().is_some());

        stream.close();
        assert!(stream.status_message().is_none());
        assert_eq!(stream.stats().consecutive_failures, 0);

        stream.open(geometry()).unwrap();
        assert!(stream.status_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_without_listener_stay_bounded() {
        let (mut stream, _) = adapter(9).await;
        stream.open(geometry()).unwrap();

        for _ in 0..600 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let mut reports = stream.frame_rate_reports().unwrap();
        let mut queued = 0;
        while let Some(Some(_)) = reports.next().now_or_never() {
            queued += 1;
        }
        assert!(queued <= 1, "{} reports queued", queued);
    }

    #[tokio::test]
    async fn test_seek_is_acknowledged_only() {
        let (mut stream, _) = adapter(9).await;
        stream.open(geometry()).unwrap();
        let before = stream.get_sample().await.presentation_time;

        assert_eq!(stream.seek(Duration::from_secs(42)), Duration::from_secs(42));
        assert_eq!(stream.presentation_time(), before);
        assert_eq!(stream.get_sample().await.presentation_time, before + stream.frame_interval());
    }

    #[tokio::test]
    async fn test_close_keeps_arena() {
        let (mut stream, _) = adapter(9).await;
        stream.open(geometry()).unwrap();
        stream.get_sample().await;
        let id = stream.arena().buffer_id();
        let generation = stream.arena().generation();

        stream.close();

        assert!(!stream.is_open());
        assert!(stream.description().is_none());
        assert_eq!(stream.arena().buffer_id(), id);
        assert_eq!(stream.arena().generation(), generation);

        let closed = stream.get_sample().await;
        assert!(closed.is_empty());
        assert_eq!(closed.presentation_time, Duration::ZERO);

        // Reopening reuses the same memory
        stream.open(geometry()).unwrap();
        assert_eq!(stream.arena().buffer_id(), id);
        assert!(!stream.get_sample().await.is_empty());
    }
}
