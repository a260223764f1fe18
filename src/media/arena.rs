// SPDX-License-Identifier: GPL-3.0-only

//! Process-wide frame buffer arena
//!
//! The arena owns the one pixel allocation every stream shares. It is sized
//! once, on the first `initialize`, and is never torn down by a stream
//! closing: hosts are free to recreate stream adapters (and to forget to
//! drop the old ones) without the frame memory being reallocated or leaked.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────── one Box<[u32]> ────────────────┐
//! │  slot 0 (width*height words) │  slot 1 (…)     │
//! └──────────────────────────────┴─────────────────┘
//!          ▲ front (cursor)           ▲ back
//! ```
//!
//! A render pass borrows the back slot through [`ArenaWriter`]. Only
//! [`ArenaWriter::commit`] moves the cursor, so a pass that fails part-way
//! leaves the front slot holding the last fully rendered frame. Samples
//! refer to a slot by byte offset; the allocation address never changes.
//!
//! Views returned by [`FrameBufferArena::front`] and
//! [`FrameBufferArena::view`] hold the arena lock. They are meant for
//! synchronous use only and go stale as soon as the next pass commits.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

use crate::backends::camera::types::StreamGeometry;
use crate::constants::{BUFFERED_FRAMES, PIXEL_STRIDE};
use crate::errors::ConfigurationError;

/// Opaque black, the contents of a freshly allocated slot
const CLEAR_PIXEL: u32 = 0xFF00_0000;

static GLOBAL_ARENA: OnceLock<Arc<FrameBufferArena>> = OnceLock::new();

struct ArenaInner {
    geometry: Option<StreamGeometry>,
    pixels: Box<[u32]>,
    /// Index of the front (last committed) slot
    cursor: usize,
    /// Number of commits since allocation
    generation: u64,
}

impl ArenaInner {
    fn slot_len(&self) -> usize {
        self.geometry.map(|g| g.pixel_count()).unwrap_or(0)
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let len = self.slot_len();
        slot * len..(slot + 1) * len
    }
}

/// Reusable frame memory shared by every stream in the process
pub struct FrameBufferArena {
    inner: Mutex<ArenaInner>,
}

impl FrameBufferArena {
    /// Create an unallocated arena
    ///
    /// Most callers want [`FrameBufferArena::global`]; separate instances are
    /// useful where several independent pipelines must not share geometry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                geometry: None,
                pixels: Box::new([]),
                cursor: 0,
                generation: 0,
            }),
        }
    }

    /// The process-wide arena
    ///
    /// Created on first use and kept until process exit.
    pub fn global() -> Arc<FrameBufferArena> {
        Arc::clone(GLOBAL_ARENA.get_or_init(|| Arc::new(FrameBufferArena::new())))
    }

    fn lock(&self) -> MutexGuard<'_, ArenaInner> {
        // A panicking render pass never commits, so the front slot is intact
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Size the arena for `geometry`
    ///
    /// Idempotent for the same geometry. A different geometry after the first
    /// successful call fails with [`ConfigurationError::GeometryChanged`] and
    /// leaves the existing buffer untouched.
    pub fn initialize(&self, geometry: StreamGeometry) -> Result<(), ConfigurationError> {
        let mut inner = self.lock();

        if let Some(current) = inner.geometry {
            if current == geometry {
                debug!(%geometry, "Frame buffer arena already initialized");
                return Ok(());
            }
            warn!(%current, requested = %geometry, "Rejecting frame geometry change");
            return Err(ConfigurationError::GeometryChanged {
                current,
                requested: geometry,
            });
        }

        if !geometry.is_valid() {
            return Err(ConfigurationError::InvalidGeometry(geometry));
        }

        let words = geometry
            .pixel_count()
            .checked_mul(BUFFERED_FRAMES)
            .filter(|w| w.checked_mul(PIXEL_STRIDE).is_some())
            .ok_or(ConfigurationError::InvalidGeometry(geometry))?;

        inner.pixels = vec![CLEAR_PIXEL; words].into_boxed_slice();
        inner.geometry = Some(geometry);
        inner.cursor = 0;
        inner.generation = 0;

        info!(
            %geometry,
            bytes = words * PIXEL_STRIDE,
            slots = BUFFERED_FRAMES,
            "Frame buffer arena allocated"
        );
        Ok(())
    }

    /// Negotiated geometry, if initialized
    pub fn geometry(&self) -> Option<StreamGeometry> {
        self.lock().geometry
    }

    /// Whether `initialize` has succeeded
    pub fn is_initialized(&self) -> bool {
        self.lock().geometry.is_some()
    }

    /// Identity of the backing allocation (its address)
    pub fn buffer_id(&self) -> Option<usize> {
        let inner = self.lock();
        inner.geometry.map(|_| inner.pixels.as_ptr() as usize)
    }

    /// Bytes in one frame slot
    pub fn frame_len(&self) -> usize {
        self.lock().slot_len() * PIXEL_STRIDE
    }

    /// Number of committed frames since allocation
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Lend the back slot for one render pass
    pub fn write_slot(&self) -> Result<ArenaWriter<'_>, ConfigurationError> {
        let guard = self.lock();
        let geometry = guard.geometry.ok_or(ConfigurationError::NotInitialized)?;
        let slot = (guard.cursor + 1) % BUFFERED_FRAMES;
        Ok(ArenaWriter {
            guard,
            geometry,
            slot,
        })
    }

    /// Read view of the last committed frame
    pub fn front(&self) -> Result<ArenaView<'_>, ConfigurationError> {
        let guard = self.lock();
        let geometry = guard.geometry.ok_or(ConfigurationError::NotInitialized)?;
        let range = guard.slot_range(guard.cursor);
        Ok(ArenaView {
            guard,
            geometry,
            range,
        })
    }

    /// Read view of the bytes a sample references
    ///
    /// `offset` and `length` must be whole pixels inside the allocation.
    pub fn view(&self, offset: usize, length: usize) -> Result<ArenaView<'_>, ConfigurationError> {
        let guard = self.lock();
        let geometry = guard.geometry.ok_or(ConfigurationError::NotInitialized)?;

        let total = guard.pixels.len() * PIXEL_STRIDE;
        let in_bounds = offset % PIXEL_STRIDE == 0
            && length % PIXEL_STRIDE == 0
            && offset.checked_add(length).is_some_and(|end| end <= total);
        if !in_bounds {
            return Err(ConfigurationError::InvalidGeometry(geometry));
        }

        let start = offset / PIXEL_STRIDE;
        let range = start..start + length / PIXEL_STRIDE;
        Ok(ArenaView {
            guard,
            geometry,
            range,
        })
    }
}

impl Default for FrameBufferArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBufferArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FrameBufferArena")
            .field("geometry", &inner.geometry)
            .field("cursor", &inner.cursor)
            .field("generation", &inner.generation)
            .finish()
    }
}

/// Where a committed frame lives inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedFrame {
    /// Byte offset of the slot
    pub offset: usize,
    /// Bytes in the frame
    pub length: usize,
    /// Commit counter after this frame
    pub generation: u64,
}

/// Exclusive, single-pass access to the back slot
pub struct ArenaWriter<'a> {
    guard: MutexGuard<'a, ArenaInner>,
    geometry: StreamGeometry,
    slot: usize,
}

impl ArenaWriter<'_> {
    pub fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    /// Pixels of the back slot
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        let range = self.guard.slot_range(self.slot);
        &mut self.guard.pixels[range]
    }

    /// Publish the back slot as the new front frame
    pub fn commit(mut self) -> CommittedFrame {
        let length = self.geometry.frame_bytes();
        self.guard.cursor = self.slot;
        self.guard.generation += 1;
        CommittedFrame {
            offset: self.slot * length,
            length,
            generation: self.guard.generation,
        }
    }
}

/// Read access to a range of arena pixels
pub struct ArenaView<'a> {
    guard: MutexGuard<'a, ArenaInner>,
    geometry: StreamGeometry,
    range: std::ops::Range<usize>,
}

impl ArenaView<'_> {
    pub fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    /// Byte offset of the view inside the arena
    pub fn offset(&self) -> usize {
        self.range.start * PIXEL_STRIDE
    }

    pub fn pixels(&self) -> &[u32] {
        &self.guard.pixels[self.range.clone()]
    }

    /// Pixels as bytes (B, G, R, A order on little-endian hosts)
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.pixels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> StreamGeometry {
        StreamGeometry::bgra(4, 2)
    }

    fn write_frame(arena: &FrameBufferArena, value: u32) -> CommittedFrame {
        let mut writer = arena.write_slot().unwrap();
        writer.pixels_mut().fill(value);
        writer.commit()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        let id = arena.buffer_id();
        write_frame(&arena, 0xFF11_2233);

        arena.initialize(geometry()).unwrap();

        assert_eq!(arena.buffer_id(), id);
        assert!(arena.front().unwrap().pixels().iter().all(|&p| p == 0xFF11_2233));
    }

    #[test]
    fn test_geometry_change_is_rejected() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        write_frame(&arena, 0xFF00_00FF);
        let id = arena.buffer_id();

        let err = arena.initialize(StreamGeometry::bgra(8, 8)).unwrap_err();

        assert!(matches!(err, ConfigurationError::GeometryChanged { .. }));
        assert_eq!(arena.geometry(), Some(geometry()));
        assert_eq!(arena.buffer_id(), id);
        assert!(arena.front().unwrap().pixels().iter().all(|&p| p == 0xFF00_00FF));
    }

    #[test]
    fn test_zero_geometry_is_invalid() {
        let arena = FrameBufferArena::new();
        assert!(matches!(
            arena.initialize(StreamGeometry::bgra(0, 10)),
            Err(ConfigurationError::InvalidGeometry(_))
        ));
        assert!(!arena.is_initialized());
    }

    #[test]
    fn test_uninitialized_arena_refuses_access() {
        let arena = FrameBufferArena::new();
        assert!(matches!(
            arena.write_slot(),
            Err(ConfigurationError::NotInitialized)
        ));
        assert!(arena.front().is_err());
        assert_eq!(arena.buffer_id(), None);
    }

    #[test]
    fn test_uncommitted_write_leaves_front_intact() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        write_frame(&arena, 0xFFAA_AAAA);

        {
            let mut writer = arena.write_slot().unwrap();
            writer.pixels_mut()[..3].fill(0x1234_5678);
            // dropped without commit
        }

        let front = arena.front().unwrap();
        assert!(front.pixels().iter().all(|&p| p == 0xFFAA_AAAA));
        assert_eq!(arena_generation_of(&front), 1);
    }

    fn arena_generation_of(view: &ArenaView<'_>) -> u64 {
        view.guard.generation
    }

    #[test]
    fn test_commit_alternates_slots() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        let frame_bytes = geometry().frame_bytes();

        let first = write_frame(&arena, 1);
        let second = write_frame(&arena, 2);
        let third = write_frame(&arena, 3);

        assert_eq!(first.offset, frame_bytes);
        assert_eq!(second.offset, 0);
        assert_eq!(third.offset, frame_bytes);
        assert_eq!(third.generation, 3);

        let view = arena.view(third.offset, third.length).unwrap();
        assert!(view.pixels().iter().all(|&p| p == 3));
        assert_eq!(view.bytes().len(), frame_bytes);
    }

    #[test]
    fn test_view_bounds_are_checked() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        let total = geometry().frame_bytes() * BUFFERED_FRAMES;

        assert!(arena.view(0, total).is_ok());
        assert!(arena.view(4, total).is_err());
        assert!(arena.view(2, 4).is_err());
        assert_eq!(arena.view(0, 0).unwrap().bytes().len(), 0);
    }

    #[test]
    fn test_fresh_slot_is_opaque_black() {
        let arena = FrameBufferArena::new();
        arena.initialize(geometry()).unwrap();
        let front = arena.front().unwrap();
        assert_eq!(front.bytes()[..4], CLEAR_PIXEL.to_ne_bytes());
    }
}
