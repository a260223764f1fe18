// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for live capture loops
//!
//! Live sources read from hardware that blocks until the next frame is
//! ready, so they run on a dedicated thread and leave the latest frame in a
//! [`PreviewSlot`](super::preview::PreviewSlot). This controller owns that
//! thread: it starts it, signals it to stop and joins it on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::start("synthetic-preview", move || {
///     match source.capture_into(&mut staging) {
///         Ok(()) => slot.publish(&staging),
///         Err(e) => warn!("Capture error: {}", e),
///     }
///     LoopAction::Continue
/// });
///
/// // Later, stop the loop
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a separate thread
    ///
    /// The provided closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Start a capture loop with initialization
    ///
    /// The `init_fn` runs once on the capture thread itself, so the state it
    /// returns (a device handle, a mapped stream) never crosses threads. If
    /// initialization fails, the thread exits immediately.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Initialization failed");
                    return;
                }
            };

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::preview::PreviewSlot;
    use crate::backends::camera::types::StreamGeometry;
    use crate::errors::CaptureError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    fn geometry() -> StreamGeometry {
        StreamGeometry::bgra(4, 2)
    }

    #[test]
    fn test_thread_local_device_state_publishes_frames() {
        let slot = PreviewSlot::new(geometry());
        let publisher = slot.clone();

        // Rc<RefCell<_>> is not Send: it only works because init runs on
        // the capture thread
        let mut controller = CaptureLoopController::start_with_init(
            "local-device",
            || Ok(Rc::new(RefCell::new(0u32))),
            move |device: &mut Rc<RefCell<u32>>| {
                let mut frame = device.borrow_mut();
                *frame += 1;
                publisher.publish(&vec![0xFF00_0000 | *frame; geometry().pixel_count()]);
                if *frame == 3 { LoopAction::Stop } else { LoopAction::Continue }
            },
        );
        controller.join();

        let mut pixels = vec![0u32; geometry().pixel_count()];
        assert_eq!(slot.copy_latest(&mut pixels), Ok(3));
        assert!(pixels.iter().all(|&p| p == 0xFF00_0003));
    }

    #[test]
    fn test_stop_interrupts_paced_loop() {
        let slot = PreviewSlot::new(geometry());
        let publisher = slot.clone();
        let staging = vec![0xFF12_3456; geometry().pixel_count()];

        let mut controller = CaptureLoopController::start("paced", move || {
            publisher.publish(&staging);
            thread::sleep(Duration::from_millis(100));
            LoopAction::Continue
        });

        while slot.sequence() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        // The stop flag is seen after the current sleep, never a whole
        // second later
        let asked = Instant::now();
        controller.stop();
        assert!(asked.elapsed() < Duration::from_secs(1));
        assert!(!controller.is_running());

        let published = slot.sequence();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(slot.sequence(), published);
    }

    #[test]
    fn test_device_open_failure_leaves_slot_empty() {
        let slot = PreviewSlot::new(geometry());
        let publisher = slot.clone();

        let mut controller = CaptureLoopController::start_with_init(
            "missing-device",
            || Err::<(), _>("No such device: /dev/video9".to_string()),
            move |_: &mut ()| {
                publisher.publish(&[0; 8]);
                LoopAction::Continue
            },
        );
        controller.join();

        assert!(!controller.is_running());
        let mut pixels = vec![0u32; geometry().pixel_count()];
        assert_eq!(slot.copy_latest(&mut pixels), Err(CaptureError::NoFrame));
    }

    #[test]
    fn test_drop_joins_capture_thread() {
        let slot = PreviewSlot::new(geometry());
        let publisher = slot.clone();
        let staging = vec![0u32; geometry().pixel_count()];

        let controller = CaptureLoopController::start("dropped", move || {
            publisher.publish(&staging);
            thread::sleep(Duration::from_millis(2));
            LoopAction::Continue
        });
        while slot.sequence() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(controller);

        let published = slot.sequence();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(slot.sequence(), published);
    }
}
