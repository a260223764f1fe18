// SPDX-License-Identifier: MPL-2.0

//! Pixel packing and format conversion utilities
//!
//! Frames are handled as packed 32-bit BGRA words: blue in bits 0-7,
//! green in 8-15, red in 16-23 and alpha in 24-31.

pub mod conversions;

/// Pack 8-bit channels into a BGRA word
#[inline]
pub fn pack_bgra(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Split a BGRA word into (r, g, b, a)
#[inline]
pub fn unpack_bgra(pixel: u32) -> (u8, u8, u8, u8) {
    (
        (pixel >> 16) as u8,
        (pixel >> 8) as u8,
        pixel as u8,
        (pixel >> 24) as u8,
    )
}

/// Split a BGRA word into normalized (r, g, b) floats
#[inline]
pub fn unpack_rgb_f32(pixel: u32) -> (f32, f32, f32) {
    let (r, g, b, _) = unpack_bgra(pixel);
    (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
}

/// Pack normalized (r, g, b) floats, keeping the alpha of `original`
#[inline]
pub fn pack_rgb_f32(r: f32, g: f32, b: f32, original: u32) -> u32 {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    (original & 0xFF00_0000) | (to_u8(r) as u32) << 16 | (to_u8(g) as u32) << 8 | to_u8(b) as u32
}
