// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU pixel surfaces and toroidal buffer rotation.
//!
//! A [`PixelSurface`] is the unit of pixel ownership in the compositing
//! protocol: painted layers hand complete surfaces across the
//! content/compositor boundary, and buffer swaps exchange them whole. The
//! core treats the pixel data as opaque; only dimensions, format, and byte
//! length are interpreted.

use alloc::vec;
use alloc::vec::Vec;

use kurbo::Rect;

/// Pixel layout of a [`PixelSurface`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    /// 8-bit RGBA, 4 bytes per pixel.
    #[default]
    Rgba8888,
    /// 8-bit BGRA, 4 bytes per pixel.
    Bgra8888,
}

impl SurfaceFormat {
    /// Returns the number of bytes per pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 | Self::Bgra8888 => 4,
        }
    }
}

/// An owned CPU pixel buffer with known dimensions and format.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    format: SurfaceFormat,
    data: Vec<u8>,
}

impl core::fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelSurface {
    /// Creates a zero-filled surface.
    #[must_use]
    pub fn new(width: u32, height: u32, format: SurfaceFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; len],
        }
    }

    /// Creates a surface from raw bytes.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not match `width * height * bpp`.
    #[must_use]
    pub fn from_bytes(width: u32, height: u32, format: SurfaceFormat, data: Vec<u8>) -> Self {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        assert!(
            data.len() == expected,
            "surface byte length {} does not match {width}x{height} ({expected})",
            data.len()
        );
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Returns the width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel format.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> SurfaceFormat {
        self.format
    }

    /// Returns the row stride in bytes.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Returns the raw pixel bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw pixel bytes mutably.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns whether `other` has the same dimensions and format.
    #[inline]
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Copies the pixel rectangle `(x, y, w, h)` from `src` into the same
    /// position in `self`.
    ///
    /// The rectangle is clamped to both surfaces. Returns `false` (copying
    /// nothing) when the formats differ; callers are expected to fall back to
    /// full invalidation rather than convert.
    pub fn copy_rect_from(&mut self, src: &Self, x: u32, y: u32, w: u32, h: u32) -> bool {
        if self.format != src.format {
            return false;
        }
        let bpp = self.format.bytes_per_pixel();
        let x_end = (x + w).min(self.width).min(src.width);
        let y_end = (y + h).min(self.height).min(src.height);
        if x >= x_end || y >= y_end {
            return true;
        }
        let row_bytes = (x_end - x) as usize * bpp;
        for row in y..y_end {
            let dst_off = row as usize * self.stride() + x as usize * bpp;
            let src_off = row as usize * src.stride() + x as usize * bpp;
            self.data[dst_off..dst_off + row_bytes]
                .copy_from_slice(&src.data[src_off..src_off + row_bytes]);
        }
        true
    }
}

/// Toroidal wrap offset of a painted buffer.
///
/// Scrolling a painted layer shifts where the origin of the layer's visible
/// rect lives inside its retained buffer instead of repainting everything.
/// The rotation records that origin; compositing splits the buffer into up to
/// four wrapped sub-quads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferRotation {
    /// Horizontal offset of the layer origin inside the buffer, in pixels.
    pub x: u32,
    /// Vertical offset of the layer origin inside the buffer, in pixels.
    pub y: u32,
}

impl BufferRotation {
    /// No rotation; the buffer origin coincides with the layer origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Returns whether the buffer is unrotated.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Splits a `width`×`height` buffer drawn at `dst_origin` into
    /// `(source, destination)` rect pairs, honoring the wrap offset.
    ///
    /// Produces one pair for an unrotated buffer and up to four otherwise.
    #[must_use]
    pub fn wrapped_quads(self, width: u32, height: u32, dst_origin: (f64, f64)) -> Vec<(Rect, Rect)> {
        let (w, h) = (f64::from(width), f64::from(height));
        let rx = f64::from(self.x % width.max(1));
        let ry = f64::from(self.y % height.max(1));
        let (ox, oy) = dst_origin;

        // Horizontal strips: [rx, w) maps to the left of the destination,
        // [0, rx) wraps to the right. Same split vertically.
        let xs = [(rx, w, 0.0), (0.0, rx, w - rx)];
        let ys = [(ry, h, 0.0), (0.0, ry, h - ry)];

        let mut quads = Vec::with_capacity(4);
        for &(sy0, sy1, dy) in &ys {
            if sy1 <= sy0 {
                continue;
            }
            for &(sx0, sx1, dx) in &xs {
                if sx1 <= sx0 {
                    continue;
                }
                let src = Rect::new(sx0, sy0, sx1, sy1);
                let dst = Rect::new(
                    ox + dx,
                    oy + dy,
                    ox + dx + (sx1 - sx0),
                    oy + dy + (sy1 - sy0),
                );
                quads.push((src, dst));
            }
        }
        quads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_zeroed() {
        let s = PixelSurface::new(4, 2, SurfaceFormat::Rgba8888);
        assert_eq!(s.bytes().len(), 32);
        assert!(s.bytes().iter().all(|&b| b == 0));
        assert_eq!(s.stride(), 16);
    }

    #[test]
    #[should_panic(expected = "surface byte length")]
    fn from_bytes_checks_length() {
        let _ = PixelSurface::from_bytes(2, 2, SurfaceFormat::Rgba8888, vec![0; 3]);
    }

    #[test]
    fn copy_rect_from_copies_pixels() {
        let mut src = PixelSurface::new(4, 4, SurfaceFormat::Rgba8888);
        src.bytes_mut().fill(0xAB);
        let mut dst = PixelSurface::new(4, 4, SurfaceFormat::Rgba8888);
        assert!(dst.copy_rect_from(&src, 1, 1, 2, 2));
        // Inside the copied rect.
        let off = dst.stride() + 4;
        assert_eq!(dst.bytes()[off], 0xAB);
        // Outside it.
        assert_eq!(dst.bytes()[0], 0);
    }

    #[test]
    fn copy_rect_from_rejects_format_mismatch() {
        let src = PixelSurface::new(4, 4, SurfaceFormat::Bgra8888);
        let mut dst = PixelSurface::new(4, 4, SurfaceFormat::Rgba8888);
        assert!(!dst.copy_rect_from(&src, 0, 0, 4, 4));
    }

    #[test]
    fn copy_rect_from_clamps_to_bounds() {
        let mut src = PixelSurface::new(2, 2, SurfaceFormat::Rgba8888);
        src.bytes_mut().fill(0xFF);
        let mut dst = PixelSurface::new(4, 4, SurfaceFormat::Rgba8888);
        assert!(dst.copy_rect_from(&src, 0, 0, 4, 4));
        assert_eq!(dst.bytes()[0], 0xFF);
        let off = 3 * dst.stride();
        assert_eq!(dst.bytes()[off], 0);
    }

    #[test]
    fn unrotated_buffer_is_one_quad() {
        let quads = BufferRotation::ZERO.wrapped_quads(100, 50, (10.0, 20.0));
        assert_eq!(quads.len(), 1);
        let (src, dst) = quads[0];
        assert_eq!(src, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(dst, Rect::new(10.0, 20.0, 110.0, 70.0));
    }

    #[test]
    fn rotated_buffer_splits_into_four() {
        let rot = BufferRotation { x: 30, y: 10 };
        let quads = rot.wrapped_quads(100, 50, (0.0, 0.0));
        assert_eq!(quads.len(), 4);
        // Total destination area covers the whole buffer exactly once.
        let area: f64 = quads.iter().map(|(_, d)| d.area()).sum();
        assert_eq!(area, 5000.0);
        // The first quad maps the unwrapped interior to the top-left.
        let (src, dst) = quads[0];
        assert_eq!(src, Rect::new(30.0, 10.0, 100.0, 50.0));
        assert_eq!(dst, Rect::new(0.0, 0.0, 70.0, 40.0));
    }

    #[test]
    fn horizontal_only_rotation_splits_into_two() {
        let rot = BufferRotation { x: 25, y: 0 };
        let quads = rot.wrapped_quads(100, 50, (0.0, 0.0));
        assert_eq!(quads.len(), 2);
    }
}
