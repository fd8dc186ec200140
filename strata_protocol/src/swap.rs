// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side double-buffer bookkeeping.
//!
//! Each paintable layer owns a front/back surface pair split across the
//! process boundary: the compositor retains the front (last composited
//! pixels), content owns the back (the one it paints into). A swap installs
//! the incoming surface as the new front and relinquishes the old front to
//! the sender. Exactly one surface changes hands per swap; on the very
//! first swap, when no front exists yet, a zeroed surface of the same shape
//! is returned so the conservation property holds from the start.
//!
//! The incoming surface is only trusted inside the supplied `rect`: content
//! repaints incrementally into a back buffer that does not hold the last
//! frame, so everything outside `rect` is stale. The old front holds the
//! last-composited pixels and is blitted into the new front outside `rect`
//! before the install.
//!
//! # Retention
//!
//! When a painted layer's buffer dimensions change, repainting everything is
//! wasteful if the change is small (window resize drags). If both dimensions
//! change by at most [`RETENTION_THRESHOLD_PX`], the old front's overlapping
//! pixels are blitted into the new front and the previously valid area stays
//! valid. Beyond the threshold, or when the blit is impossible (format
//! change), the retained content is dropped and the valid region cleared —
//! a full repaint next cycle, never an error.

use kurbo::Rect;

use strata_core::layer::{LayerId, LayerStore};
use strata_core::region::Region;
use strata_core::surface::{BufferRotation, PixelSurface};

/// Maximum per-axis dimension change under which the old front buffer's
/// pixels are carried forward across a resize. A tunable, not a correctness
/// invariant: any value only shifts where "blit forward" turns into "full
/// repaint".
pub const RETENTION_THRESHOLD_PX: u32 = 64;

fn within_retention_threshold(old: &PixelSurface, new: &PixelSurface) -> bool {
    old.width().abs_diff(new.width()) <= RETENTION_THRESHOLD_PX
        && old.height().abs_diff(new.height()) <= RETENTION_THRESHOLD_PX
}

/// Blits `old`'s pixels into `dst`, skipping the freshly supplied `rect` so
/// new content is never overwritten by retained content.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "buffer coordinates are non-negative and fit u32"
)]
fn blit_outside(dst: &mut PixelSurface, old: &PixelSurface, rect: Rect) {
    let mut keep = Region::from_rect(Rect::new(
        0.0,
        0.0,
        f64::from(old.width()),
        f64::from(old.height()),
    ));
    keep.subtract_rect(rect);
    for r in keep.rects() {
        let x = r.x0.max(0.0).floor() as u32;
        let y = r.y0.max(0.0).floor() as u32;
        let w = r.width().ceil() as u32;
        let h = r.height().ceil() as u32;
        let _ = dst.copy_rect_from(old, x, y, w, h);
    }
}

/// Swaps a painted layer's front buffer.
///
/// Installs `new_front` (whose pixels are current inside `rect`, toroidally
/// rotated by `rotation`), carries the old front's pixels forward outside
/// `rect`, updates the valid region to the supplied `rect` (clamped to the
/// visible region and unioned with the previously valid area), and returns
/// the relinquished front buffer for the sender to paint into next.
///
/// `rect` is in layer coordinates; the buffer covers the visible bounds, so
/// the blit translates by the visible-bounds origin.
///
/// # Panics
///
/// Panics if `id` is stale or not a painted layer.
pub fn swap_painted_buffer(
    store: &mut LayerStore,
    id: LayerId,
    new_front: PixelSurface,
    rect: Rect,
    rotation: BufferRotation,
) -> PixelSurface {
    let old_valid = store.valid_region(id).clone();
    let old_front = store.take_buffer(id);
    let local_rect = rect - store.common(id).visible.bounds().origin().to_vec2();

    let mut new_front = new_front;
    let (returned, valid) = match old_front {
        Some(old) => {
            if old.same_shape(&new_front) {
                blit_outside(&mut new_front, &old, local_rect);
                let mut valid = old_valid;
                valid.union_rect(rect);
                (old, valid)
            } else if within_retention_threshold(&old, &new_front)
                && old.format() == new_front.format()
            {
                blit_outside(&mut new_front, &old, local_rect);
                tracing::debug!(layer = ?id, "retained front buffer across resize");
                let mut valid = old_valid;
                valid.union_rect(rect);
                (old, valid)
            } else {
                // Resize beyond the threshold (or an impossible blit): drop
                // retained content and force a full repaint next cycle.
                tracing::debug!(layer = ?id, "dropped retained content on resize");
                (old, Region::new())
            }
        }
        None => {
            let zeroed = PixelSurface::new(new_front.width(), new_front.height(), new_front.format());
            (zeroed, Region::from_rect(rect))
        }
    };

    store.set_buffer(id, new_front);
    store.set_rotation(id, rotation);
    store.set_valid_region(id, valid);
    returned
}

/// Swaps a canvas or image layer's source surface.
///
/// Returns the previous surface, or a zeroed same-shape surface on the first
/// swap so exactly one surface always changes hands.
///
/// # Panics
///
/// Panics if `id` is stale or has no picture content.
pub fn swap_picture_buffer(
    store: &mut LayerStore,
    id: LayerId,
    new_source: PixelSurface,
) -> PixelSurface {
    let returned = store.take_buffer(id).unwrap_or_else(|| {
        PixelSurface::new(new_source.width(), new_source.height(), new_source.format())
    });
    store.set_buffer(id, new_source);
    returned
}

#[cfg(test)]
mod tests {
    use strata_core::layer::{LayerKind, PaintedState, PictureState};
    use strata_core::surface::SurfaceFormat;

    use super::*;

    fn painted_store() -> (LayerStore, LayerId) {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Painted(PaintedState::default()));
        store.set_visible_region(id, Region::from_rect(Rect::new(0.0, 0.0, 500.0, 500.0)));
        (store, id)
    }

    fn surface(w: u32, h: u32, fill: u8) -> PixelSurface {
        let mut s = PixelSurface::new(w, h, SurfaceFormat::Rgba8888);
        s.bytes_mut().fill(fill);
        s
    }

    #[test]
    fn first_swap_returns_zeroed_same_shape() {
        let (mut store, id) = painted_store();
        let back = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 0xAA),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        assert_eq!(back.width(), 100);
        assert!(back.bytes().iter().all(|&b| b == 0));
        assert_eq!(
            *store.valid_region(id),
            Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0))
        );
        assert_eq!(store.buffer(id).unwrap().bytes()[0], 0xAA);
    }

    #[test]
    fn same_shape_swap_accumulates_valid() {
        let (mut store, id) = painted_store();
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 1),
            Rect::new(0.0, 0.0, 50.0, 100.0),
            BufferRotation::ZERO,
        );
        let back = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 2),
            Rect::new(50.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        // The returned buffer is the previous front.
        assert_eq!(back.bytes()[0], 1);
        assert_eq!(
            *store.valid_region(id),
            Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0))
        );
    }

    #[test]
    fn same_shape_swap_carries_front_outside_rect() {
        let (mut store, id) = painted_store();
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 1),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        // Incremental repaint: the incoming surface is only current inside
        // the supplied strip.
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 2),
            Rect::new(0.0, 0.0, 25.0, 100.0),
            BufferRotation::ZERO,
        );
        let front = store.buffer(id).unwrap();
        // Inside the strip: the new pixels.
        assert_eq!(front.bytes()[0], 2);
        // Outside the strip: the previous front's pixels, not the stale
        // contents of the incoming back buffer.
        assert_eq!(front.bytes()[50 * 4], 1);
    }

    #[test]
    fn small_resize_retains_valid_region() {
        let (mut store, id) = painted_store();
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 1),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        // Grow by less than the threshold; disjoint supplied rect.
        let back = swap_painted_buffer(
            &mut store,
            id,
            surface(100 + RETENTION_THRESHOLD_PX, 100, 2),
            Rect::new(100.0, 0.0, 164.0, 100.0),
            BufferRotation::ZERO,
        );
        assert_eq!(back.bytes()[0], 1);
        assert!(!store.valid_region(id).is_empty());
        // Old content plus the newly supplied strip are both valid.
        assert!(
            store
                .valid_region(id)
                .contains_rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
            "retained area must stay valid"
        );
        assert!(
            store
                .valid_region(id)
                .contains_rect(Rect::new(100.0, 0.0, 164.0, 100.0)),
            "supplied area must be valid"
        );
        // The retained pixels were blitted forward.
        assert_eq!(store.buffer(id).unwrap().bytes()[0], 1);
    }

    #[test]
    fn large_resize_drops_retained_content() {
        let (mut store, id) = painted_store();
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 1),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        let back = swap_painted_buffer(
            &mut store,
            id,
            surface(100 + RETENTION_THRESHOLD_PX + 1, 100, 2),
            Rect::new(0.0, 0.0, 165.0, 100.0),
            BufferRotation::ZERO,
        );
        assert_eq!(back.bytes()[0], 1);
        assert!(store.valid_region(id).is_empty());
    }

    #[test]
    fn format_change_drops_retained_content() {
        let (mut store, id) = painted_store();
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(100, 100, 1),
            Rect::new(0.0, 0.0, 100.0, 100.0),
            BufferRotation::ZERO,
        );
        let mut bgra = PixelSurface::new(100, 120, SurfaceFormat::Bgra8888);
        bgra.bytes_mut().fill(2);
        let _ = swap_painted_buffer(
            &mut store,
            id,
            bgra,
            Rect::new(0.0, 0.0, 100.0, 120.0),
            BufferRotation::ZERO,
        );
        assert!(store.valid_region(id).is_empty());
    }

    #[test]
    fn swap_conservation() {
        let (mut store, id) = painted_store();
        let mut returned = 0;
        for i in 0..5_u8 {
            let back = swap_painted_buffer(
                &mut store,
                id,
                surface(64, 64, i + 1),
                Rect::new(0.0, 0.0, 64.0, 64.0),
                BufferRotation::ZERO,
            );
            assert_eq!(back.width(), 64);
            returned += 1;
        }
        assert_eq!(returned, 5);
        // The retained front is the last supplied surface.
        assert_eq!(store.buffer(id).unwrap().bytes()[0], 5);
    }

    #[test]
    fn rotation_is_recorded() {
        let (mut store, id) = painted_store();
        let rot = BufferRotation { x: 16, y: 4 };
        let _ = swap_painted_buffer(
            &mut store,
            id,
            surface(64, 64, 1),
            Rect::new(0.0, 0.0, 64.0, 64.0),
            rot,
        );
        assert_eq!(store.rotation(id), rot);
    }

    #[test]
    fn picture_swap_exchanges_surfaces() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Canvas(PictureState::default()));
        let first = swap_picture_buffer(&mut store, id, surface(10, 10, 7));
        assert!(first.bytes().iter().all(|&b| b == 0));
        let second = swap_picture_buffer(&mut store, id, surface(10, 10, 8));
        assert_eq!(second.bytes()[0], 7);
        assert_eq!(store.buffer(id).unwrap().bytes()[0], 8);
    }
}
