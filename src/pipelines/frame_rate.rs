// SPDX-License-Identifier: GPL-3.0-only

//! Once-per-second frame-rate reporting
//!
//! The render path only bumps an atomic counter. A separate ticker task
//! drains it on a fixed period and sends the count to whoever listens; the
//! two never wait on each other. At most one report waits in the channel:
//! a tick that finds the previous report unread drops its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::channel::mpsc::{Receiver, Sender, channel};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Frames completed during one report period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateReport {
    pub frames: u64,
    pub period: Duration,
}

impl FrameRateReport {
    pub fn fps(&self) -> f64 {
        if self.period.is_zero() {
            return 0.0;
        }
        self.frames as f64 / self.period.as_secs_f64()
    }
}

/// Completed-frame counter shared between the render path and the ticker
#[derive(Debug, Clone, Default)]
pub struct FrameRateCounter {
    completed: Arc<AtomicU64>,
}

impl FrameRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed frame
    pub fn record(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames counted since the last `take`
    pub fn peek(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Read and reset the counter
    pub fn take(&self) -> u64 {
        self.completed.swap(0, Ordering::Relaxed)
    }
}

/// Create the channel reports are delivered on
///
/// Zero buffer: each sender gets a single guaranteed slot, so one ticker
/// can never queue more than one report.
pub fn report_channel() -> (Sender<FrameRateReport>, Receiver<FrameRateReport>) {
    channel(0)
}

/// Background task emitting a [`FrameRateReport`] every period
pub struct FrameRateTicker {
    handle: JoinHandle<()>,
}

impl FrameRateTicker {
    /// Spawn the ticker on the current tokio runtime
    ///
    /// Returns `None` outside a runtime; the stream then simply runs without
    /// frame-rate reports.
    pub fn spawn(
        counter: FrameRateCounter,
        period: Duration,
        mut reports: Sender<FrameRateReport>,
    ) -> Option<Self> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime, frame-rate reporting disabled");
                return None;
            }
        };

        // Start clean so the first report covers exactly one period
        counter.take();

        let handle = runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let frames = counter.take();
                trace!(frames, "Frame-rate tick");
                match reports.try_send(FrameRateReport { frames, period }) {
                    Ok(()) => {}
                    Err(e) if e.is_disconnected() => {
                        debug!("Frame-rate listener gone, stopping ticker");
                        break;
                    }
                    Err(_) => trace!(frames, "Previous report unread, dropping this one"),
                }
            }
        });

        Some(Self { handle })
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for FrameRateTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};

    #[test]
    fn test_take_resets() {
        let counter = FrameRateCounter::new();
        for _ in 0..30 {
            counter.record();
        }
        assert_eq!(counter.peek(), 30);
        assert_eq!(counter.take(), 30);
        assert_eq!(counter.take(), 0);
    }

    #[test]
    fn test_clones_share_count() {
        let counter = FrameRateCounter::new();
        let clone = counter.clone();
        clone.record();
        assert_eq!(counter.take(), 1);
    }

    #[test]
    fn test_fps() {
        let report = FrameRateReport {
            frames: 15,
            period: Duration::from_millis(500),
        };
        assert_eq!(report.fps(), 30.0);
    }

    #[test]
    fn test_spawn_without_runtime() {
        let (tx, _rx) = report_channel();
        assert!(FrameRateTicker::spawn(FrameRateCounter::new(), Duration::from_secs(1), tx).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_reports_and_resets() {
        let counter = FrameRateCounter::new();
        let (tx, mut rx) = report_channel();
        let _ticker = FrameRateTicker::spawn(counter.clone(), Duration::from_secs(1), tx).unwrap();

        for _ in 0..30 {
            counter.record();
        }

        let first = rx.next().await.unwrap();
        assert_eq!(first.frames, 30);

        let second = rx.next().await.unwrap();
        assert_eq!(second.frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_reports_do_not_pile_up() {
        let counter = FrameRateCounter::new();
        let (tx, mut rx) = report_channel();
        let _ticker = FrameRateTicker::spawn(counter.clone(), Duration::from_secs(1), tx).unwrap();

        for _ in 0..120 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let mut queued = 0;
        while let Some(Some(_)) = rx.next().now_or_never() {
            queued += 1;
        }
        assert_eq!(queued, 1);

        // Still ticking once the listener catches up
        counter.record();
        let fresh = rx.next().await.unwrap();
        assert_eq!(fresh.frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_channel() {
        let (tx, mut rx) = report_channel();
        let ticker = FrameRateTicker::spawn(FrameRateCounter::new(), Duration::from_secs(1), tx).unwrap();
        ticker.stop();
        assert_eq!(rx.next().await, None);
    }
}
