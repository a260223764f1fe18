// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Bytes per pixel: one packed 32-bit BGRA word
pub const PIXEL_STRIDE: usize = 4;

/// Frame slots held by the arena (front + back)
///
/// A render pass writes the back slot and only becomes visible on commit,
/// so an aborted pass never leaves a half-written frame on screen.
pub const BUFFERED_FRAMES: usize = 2;

/// Default preview width
pub const DEFAULT_WIDTH: u32 = 640;

/// Default preview height
pub const DEFAULT_HEIGHT: u32 = 480;

/// Default preview frame rate
pub const DEFAULT_FRAMERATE: u32 = 30;

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Bounded wait for an effect switch to take the pipeline lock
    pub const SWITCH_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

    /// Bounded wait for a render pass to take the pipeline lock
    pub const RENDER_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

    /// Frame-rate report period
    pub const FRAME_RATE_REPORT_PERIOD: Duration = Duration::from_secs(1);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Sleep between retries when a live capture loop fails to read a frame
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(10);
}

/// Status reporting
pub mod status {
    /// Consecutive failed pulls before a status message is raised
    pub const FAILURE_THRESHOLD: u32 = 5;
}
