// SPDX-License-Identifier: MPL-2.0

//! Format conversion utilities
//!
//! Conversions between capture formats, the pipeline's BGRA words and the
//! byte layouts image encoders expect.

use super::pack_bgra;

/// Convert YUV (BT.601) to RGB
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Convert a packed YUYV 4:2:2 frame into BGRA words
///
/// `stride` is the source row length in bytes (at least `width * 2`).
/// Returns false when `src` or `dst` is too small for the frame.
pub fn yuyv_to_bgra(src: &[u8], stride: usize, width: usize, height: usize, dst: &mut [u32]) -> bool {
    if stride < width * 2 || src.len() < stride * height || dst.len() < width * height {
        return false;
    }

    for (row, out) in dst.chunks_exact_mut(width).take(height).enumerate() {
        let line = &src[row * stride..row * stride + width * 2];
        for (x, pixel) in out.iter_mut().enumerate() {
            // Y0 U Y1 V: two pixels share chroma
            let base = (x & !1) * 2;
            let luma = if x & 1 == 0 { line[base] } else { line[base + 2] };
            let u = line[base + 1];
            let v = line.get(base + 3).copied().unwrap_or(128);
            let (r, g, b) = yuv_to_rgb(luma, u, v);
            *pixel = pack_bgra(r, g, b, 0xFF);
        }
    }

    true
}

/// Convert BGRA words into tightly packed RGB bytes for image encoders
///
/// Alpha is dropped: preview frames are always displayed opaque, whatever
/// an effect left in the alpha byte.
pub fn bgra_to_rgb(pixels: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() * 3);
    for &pixel in pixels {
        let (r, g, b, _) = super::unpack_bgra(pixel);
        rgb.extend_from_slice(&[r, g, b]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::formats::unpack_bgra;

    #[test]
    fn test_yuyv_gray_maps_to_gray() {
        // 2x1 frame, mid gray with neutral chroma
        let src = [128u8, 128, 128, 128];
        let mut dst = [0u32; 2];
        assert!(yuyv_to_bgra(&src, 4, 2, 1, &mut dst));
        assert_eq!(unpack_bgra(dst[0]), (128, 128, 128, 255));
        assert_eq!(unpack_bgra(dst[1]), (128, 128, 128, 255));
    }

    #[test]
    fn test_yuyv_rejects_short_buffers() {
        let src = [0u8; 4];
        let mut dst = [0u32; 4];
        assert!(!yuyv_to_bgra(&src, 4, 2, 2, &mut dst));
    }

    #[test]
    fn test_bgra_to_rgb_drops_alpha() {
        let rgb = bgra_to_rgb(&[0x0011_2233, 0xFF44_5566]);
        assert_eq!(rgb, vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }
}
