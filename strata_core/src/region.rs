// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel regions as sets of non-overlapping rectangles.
//!
//! A [`Region`] describes an area of a layer as a union of axis-aligned
//! [`kurbo::Rect`]s. Visible regions, valid regions, and repaint accumulation
//! are all expressed as regions. The representation keeps the component
//! rectangles pairwise disjoint so that area sums and containment checks are
//! exact; no attempt is made to keep the decomposition minimal.

use alloc::vec::Vec;

use kurbo::Rect;

/// A set of non-overlapping axis-aligned rectangles.
///
/// The empty region contains no rectangles. Degenerate rectangles (zero or
/// negative width/height) are never stored.
#[derive(Clone, Debug, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

/// Returns whether `r` encloses a positive area.
fn is_meaningful(r: &Rect) -> bool {
    r.width() > 0.0 && r.height() > 0.0
}

/// Splits `a` into the (at most four) pieces not covered by `b`.
fn rect_minus(a: Rect, b: Rect, out: &mut Vec<Rect>) {
    let overlap = a.intersect(b);
    if !is_meaningful(&overlap) {
        if is_meaningful(&a) {
            out.push(a);
        }
        return;
    }
    // Strip above the overlap.
    if overlap.y0 > a.y0 {
        out.push(Rect::new(a.x0, a.y0, a.x1, overlap.y0));
    }
    // Strip below the overlap.
    if overlap.y1 < a.y1 {
        out.push(Rect::new(a.x0, overlap.y1, a.x1, a.y1));
    }
    // Left and right strips beside the overlap.
    if overlap.x0 > a.x0 {
        out.push(Rect::new(a.x0, overlap.y0, overlap.x0, overlap.y1));
    }
    if overlap.x1 < a.x1 {
        out.push(Rect::new(overlap.x1, overlap.y0, a.x1, overlap.y1));
    }
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering a single rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Returns whether the region covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Returns the component rectangles (pairwise disjoint, unspecified order).
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns the tight bounding rectangle, or [`Rect::ZERO`] if empty.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(*first, |acc, r| acc.union(*r))
    }

    /// Returns the total covered area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// Removes all rectangles.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: Rect) {
        if !is_meaningful(&rect) {
            return;
        }
        // Only the pieces of `rect` not already covered are inserted, keeping
        // the component rectangles disjoint.
        let mut pending = Vec::with_capacity(1);
        pending.push(rect);
        for existing in &self.rects {
            let mut next = Vec::with_capacity(pending.len());
            for piece in pending {
                rect_minus(piece, *existing, &mut next);
            }
            pending = next;
            if pending.is_empty() {
                return;
            }
        }
        self.rects.extend(pending);
    }

    /// Adds every rectangle of `other` to the region.
    pub fn union(&mut self, other: &Self) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: Rect) {
        if !is_meaningful(&rect) || self.rects.is_empty() {
            return;
        }
        let mut remaining = Vec::with_capacity(self.rects.len());
        for r in self.rects.drain(..) {
            rect_minus(r, rect, &mut remaining);
        }
        self.rects = remaining;
    }

    /// Removes every rectangle of `other` from the region.
    pub fn subtract(&mut self, other: &Self) {
        for rect in &other.rects {
            self.subtract_rect(*rect);
        }
    }

    /// Restricts the region to `rect`.
    pub fn intersect_rect(&mut self, rect: Rect) {
        self.rects.retain_mut(|r| {
            *r = r.intersect(rect);
            is_meaningful(r)
        });
    }

    /// Returns the intersection of this region with `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for a in &self.rects {
            for b in &other.rects {
                let overlap = a.intersect(*b);
                if is_meaningful(&overlap) {
                    // Components of the operands are disjoint, so pairwise
                    // intersections are disjoint too.
                    out.rects.push(overlap);
                }
            }
        }
        out
    }

    /// Returns whether `rect` is entirely covered by the region.
    #[must_use]
    pub fn contains_rect(&self, rect: Rect) -> bool {
        if !is_meaningful(&rect) {
            return true;
        }
        let mut uncovered = Vec::with_capacity(1);
        uncovered.push(rect);
        for existing in &self.rects {
            let mut next = Vec::with_capacity(uncovered.len());
            for piece in uncovered {
                rect_minus(piece, *existing, &mut next);
            }
            uncovered = next;
            if uncovered.is_empty() {
                return true;
            }
        }
        uncovered.is_empty()
    }

    /// Returns whether every rectangle of `other` is covered by this region.
    #[must_use]
    pub fn contains_region(&self, other: &Self) -> bool {
        other.rects.iter().all(|r| self.contains_rect(*r))
    }

    /// Translates the region by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for r in &mut self.rects {
            *r = Rect::new(r.x0 + dx, r.y0 + dy, r.x1 + dx, r.y1 + dy);
        }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl PartialEq for Region {
    /// Set equality: two regions are equal when they cover exactly the same
    /// area, regardless of how that area is decomposed into rectangles.
    fn eq(&self, other: &Self) -> bool {
        self.contains_region(other) && other.contains_region(self)
    }
}
