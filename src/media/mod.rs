// SPDX-License-Identifier: MPL-2.0

//! Frame memory and pixel format utilities
//!
//! # Modules
//!
//! - [`arena`]: Process-wide frame buffer shared by every stream
//! - [`formats`]: BGRA word packing and capture format conversions

pub mod arena;
pub mod formats;

// Re-export commonly used types
pub use arena::{ArenaView, ArenaWriter, CommittedFrame, FrameBufferArena};
