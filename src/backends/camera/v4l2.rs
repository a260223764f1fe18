// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture source
//!
//! Opens a Video4Linux device in YUYV mode and streams it through
//! memory-mapped buffers on a capture thread. Each frame is converted to
//! BGRA and published to the source's [`PreviewSlot`](super::PreviewSlot).

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use super::capture_loop::{CaptureLoopController, LoopAction};
use super::preview::{LivePreviewSource, PreviewSlot};
use super::{Framerate, StreamGeometry};
use crate::constants::timing;
use crate::media::formats::conversions::yuyv_to_bgra;

/// Memory-mapped buffers queued with the driver
const STREAM_BUFFERS: u32 = 4;

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Build a live source for the V4L2 device at `device`
///
/// The device is opened when the source starts, on the capture thread.
pub fn open(device: &str, geometry: StreamGeometry, framerate: Framerate) -> LivePreviewSource {
    let path = device.to_string();
    let name = format!("V4L2 {}", device);
    let loop_name = name.clone();

    LivePreviewSource::new(name, geometry, move |slot: PreviewSlot| {
        let path = path.clone();
        let width = geometry.width as usize;
        let height = geometry.height as usize;
        let mut staging = vec![0u32; geometry.pixel_count()];

        Ok(CaptureLoopController::start_with_init(
            &loop_name,
            move || {
                let dev = Device::with_path(&path)
                    .map_err(|e| format!("Failed to open {}: {}", path, e))?;

                let mut format = dev
                    .format()
                    .map_err(|e| format!("Failed to query format: {}", e))?;
                format.width = geometry.width;
                format.height = geometry.height;
                format.fourcc = FourCC::new(b"YUYV");

                let negotiated = dev
                    .set_format(&format)
                    .map_err(|e| format!("Failed to set format: {}", e))?;
                if negotiated.fourcc != FourCC::new(b"YUYV")
                    || negotiated.width != geometry.width
                    || negotiated.height != geometry.height
                {
                    return Err(format!(
                        "Device offered {}x{} {}, need {}",
                        negotiated.width, negotiated.height, negotiated.fourcc, geometry
                    ));
                }

                if let Err(e) = dev.set_params(&v4l::video::capture::Parameters::with_fps(
                    framerate.as_f64().round() as u32,
                )) {
                    warn!(error = %e, %framerate, "Could not set frame rate, using device default");
                }

                let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|e| format!("Failed to create buffer stream: {}", e))?;

                info!(
                    device = %path,
                    width = negotiated.width,
                    height = negotiated.height,
                    stride = negotiated.stride,
                    "V4L2 capture stream started"
                );
                Ok((dev, stream, negotiated.stride as usize))
            },
            move |(_dev, stream, stride)| {
                match stream.next() {
                    Ok((buf, meta)) => {
                        let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                        if yuyv_to_bgra(buf, *stride, width, height, &mut staging) {
                            slot.publish(&staging);
                        } else if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                            warn!(
                                frame = frame_num,
                                got = buf.len(),
                                "Short YUYV buffer from driver"
                            );
                        }
                        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                            debug!(frame = frame_num, sequence = meta.sequence, "V4L2 frame");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "V4L2 dequeue failed");
                        std::thread::sleep(timing::CAPTURE_RETRY_DELAY);
                    }
                }
                LoopAction::Continue
            },
        ))
    })
}
