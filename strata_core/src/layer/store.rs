// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena layer storage with allocation, topology, and attribute management.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;

use kurbo::Rect;
use understory_dirty::{CycleHandling, DirtyTracker};

use crate::backend::{TextureBinding, TextureId};
use crate::color::Color;
use crate::dirty;
use crate::region::Region;
use crate::surface::{BufferRotation, PixelSurface};
use crate::transform::Transform3d;

use super::id::{INVALID, LayerId};
use super::kind::{CommonAttrs, LayerKind, PaintedState, PictureState, SamplingFilter};
use super::traverse::{Children, Preorder};

/// Arena storage for all layers of one manager.
///
/// Layers are addressed by [`LayerId`] handles. Topology lives in parallel
/// index arrays (parent, first-child, sibling links) giving O(1)
/// insert-after/remove given a sibling handle; attributes live in per-slot
/// structs. Destroyed layers are recycled via a free list, and generation
/// counters prevent stale handle access.
///
/// Attribute mutators mark dirty channels (see [`crate::dirty`]); the shadow
/// forwarder drains them once per transaction through
/// [`drain_mutated`](Self::drain_mutated).
#[derive(Debug)]
pub struct LayerStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Attributes --
    common: Vec<CommonAttrs>,
    kind: Vec<LayerKind>,
    user_data: Vec<Option<Box<dyn Any>>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    free_list: Vec<u32>,
    len: u32,

    // -- Dirty tracking --
    dirty: DirtyTracker<u32>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            common: Vec::new(),
            kind: Vec::new(),
            user_data: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Allocation API --

    /// Creates a new layer of the given kind and returns its handle.
    ///
    /// The layer starts unparented with default attributes: empty visible
    /// region, no clip, full opacity, identity transform.
    pub fn create_layer(&mut self, kind: LayerKind) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            self.generation[idx as usize] += 1;
            self.parent[idx as usize] = INVALID;
            self.first_child[idx as usize] = INVALID;
            self.next_sibling[idx as usize] = INVALID;
            self.prev_sibling[idx as usize] = INVALID;
            self.common[idx as usize] = CommonAttrs::default();
            self.kind[idx as usize] = kind;
            self.user_data[idx as usize] = None;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.common.push(CommonAttrs::default());
            self.kind.push(kind);
            self.user_data.push(None);
            self.generation.push(0);
            idx
        };

        self.dirty.mark(idx, dirty::TOPOLOGY);

        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a layer, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the layer still has children (remove them first) or if the
    /// handle is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy layer with children"
        );

        if self.parent[idx as usize] != INVALID {
            self.unlink_from_parent(idx);
        }

        self.dirty.remove_key(idx);
        self.user_data[idx as usize] = None;
        self.kind[idx as usize] = LayerKind::Container;

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Returns the number of live layers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology API --

    /// Inserts `child` into `container`'s child list, directly after `after`,
    /// or as the first (bottom-most) child when `after` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, `container` is not a container layer,
    /// `child` already has a parent, `after` is not a current child of
    /// `container`, or the insertion would create a cycle (`container` is
    /// inside `child`'s subtree).
    pub fn insert_after(&mut self, container: LayerId, child: LayerId, after: Option<LayerId>) {
        self.validate(container);
        self.validate(child);
        assert!(
            self.kind[container.idx as usize].is_container(),
            "insert_after target is not a container layer"
        );
        let p = container.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        // `child` may be a detached subtree root whose descendants include
        // `container`; linking would then create a cycle.
        let mut cursor = p;
        while cursor != INVALID {
            assert!(cursor != c, "insert_after would create a cycle");
            cursor = self.parent[cursor as usize];
        }

        match after {
            None => {
                // Insert at the head of the child list.
                let old_first = self.first_child[p as usize];
                self.parent[c as usize] = p;
                self.prev_sibling[c as usize] = INVALID;
                self.next_sibling[c as usize] = old_first;
                if old_first != INVALID {
                    self.prev_sibling[old_first as usize] = c;
                }
                self.first_child[p as usize] = c;
            }
            Some(after) => {
                self.validate(after);
                let a = after.idx;
                assert!(
                    self.parent[a as usize] == p,
                    "insert_after sibling is not a child of the container"
                );
                let next = self.next_sibling[a as usize];
                self.parent[c as usize] = p;
                self.prev_sibling[c as usize] = a;
                self.next_sibling[c as usize] = next;
                self.next_sibling[a as usize] = c;
                if next != INVALID {
                    self.prev_sibling[next as usize] = c;
                }
            }
        }

        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `child` from `container`'s child list.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or `child` is not a current child of
    /// `container`.
    pub fn remove_child(&mut self, container: LayerId, child: LayerId) {
        self.validate(container);
        self.validate(child);
        assert!(
            self.parent[child.idx as usize] == container.idx,
            "remove_child: layer is not a child of the container"
        );
        self.unlink_from_parent(child.idx);
        self.dirty.mark(container.idx, dirty::TOPOLOGY);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| LayerId {
            idx: p,
            generation: self.generation[p as usize],
        })
    }

    /// Returns an iterator over the direct children of a layer, in
    /// back-to-front order.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns a depth-first pre-order iterator over the subtree rooted at
    /// `id` — the order used for compositing and paint callbacks.
    #[must_use]
    pub fn preorder(&self, id: LayerId) -> Preorder<'_> {
        self.validate(id);
        Preorder::new(self, id.idx)
    }

    // -- Common attributes --

    /// Returns the common attributes of a layer.
    #[must_use]
    pub fn common(&self, id: LayerId) -> &CommonAttrs {
        self.validate(id);
        &self.common[id.idx as usize]
    }

    /// Returns the kind of a layer.
    #[must_use]
    pub fn kind(&self, id: LayerId) -> &LayerKind {
        self.validate(id);
        &self.kind[id.idx as usize]
    }

    /// Sets the visible region.
    ///
    /// For painted layers the valid region is clamped so it never exceeds
    /// the new visible region.
    pub fn set_visible_region(&mut self, id: LayerId, visible: Region) {
        self.validate(id);
        if let LayerKind::Painted(state) = &mut self.kind[id.idx as usize] {
            let mut valid = core::mem::take(&mut state.valid);
            valid = valid.intersect(&visible);
            state.valid = valid;
        }
        self.common[id.idx as usize].visible = visible;
        self.dirty.mark(id.idx, dirty::ATTRIBUTES);
    }

    /// Sets or clears the clip rect.
    pub fn set_clip(&mut self, id: LayerId, clip: Option<Rect>) {
        self.validate(id);
        self.common[id.idx as usize].clip = clip;
        self.dirty.mark(id.idx, dirty::ATTRIBUTES);
    }

    /// Sets the layer opacity.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        self.validate(id);
        self.common[id.idx as usize].opacity = opacity.clamp(0.0, 1.0);
        self.dirty.mark(id.idx, dirty::ATTRIBUTES);
    }

    /// Sets the layer transform.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.common[id.idx as usize].transform = transform;
        self.dirty.mark(id.idx, dirty::ATTRIBUTES);
    }

    /// Sets the opaque-content flag.
    pub fn set_opaque_content(&mut self, id: LayerId, opaque: bool) {
        self.validate(id);
        self.common[id.idx as usize].opaque_content = opaque;
        self.dirty.mark(id.idx, dirty::ATTRIBUTES);
    }

    // -- Painted-layer attributes --

    /// Returns the valid region of a painted layer.
    ///
    /// # Panics
    ///
    /// Panics if the layer is not a painted layer.
    #[must_use]
    pub fn valid_region(&self, id: LayerId) -> &Region {
        &self.painted(id).valid
    }

    /// Replaces the valid region of a painted layer, clamping it to the
    /// visible region.
    pub fn set_valid_region(&mut self, id: LayerId, valid: Region) {
        self.validate(id);
        let visible = self.common[id.idx as usize].visible.clone();
        let state = self.painted_mut(id);
        state.valid = valid.intersect(&visible);
        self.dirty.mark(id.idx, dirty::KIND);
    }

    /// Removes `region` from a painted layer's valid region, scheduling it
    /// for repaint.
    pub fn invalidate_region(&mut self, id: LayerId, region: &Region) {
        self.validate(id);
        self.painted_mut(id).valid.subtract(region);
        self.dirty.mark(id.idx, dirty::KIND);
    }

    /// Sets the fill color of a color layer.
    ///
    /// # Panics
    ///
    /// Panics if the layer is not a color layer.
    pub fn set_color(&mut self, id: LayerId, color: Color) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            LayerKind::Color(c) => *c = color,
            other => panic!("set_color on {} layer", other.name()),
        }
        self.dirty.mark(id.idx, dirty::KIND);
    }

    /// Sets the sampling filter of a canvas or image layer.
    ///
    /// # Panics
    ///
    /// Panics if the layer has no picture content.
    pub fn set_filter(&mut self, id: LayerId, filter: SamplingFilter) {
        self.validate(id);
        self.picture_mut(id).filter = filter;
        self.dirty.mark(id.idx, dirty::KIND);
    }

    // -- Pixel buffer plumbing (painted, canvas, image) --
    //
    // Buffer installation and removal deliberately do not mark dirty
    // channels: pixel transport is recorded as explicit paint edits by the
    // forwarder, not discovered by diffing.

    /// Returns the currently held pixel buffer, if any.
    #[must_use]
    pub fn buffer(&self, id: LayerId) -> Option<&PixelSurface> {
        self.validate(id);
        match &self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s.buffer.as_ref(),
            LayerKind::Canvas(s) | LayerKind::Image(s) => s.buffer.as_ref(),
            other => panic!("buffer access on {} layer", other.name()),
        }
    }

    /// Returns the currently held pixel buffer mutably.
    pub fn buffer_mut(&mut self, id: LayerId) -> Option<&mut PixelSurface> {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s.buffer.as_mut(),
            LayerKind::Canvas(s) | LayerKind::Image(s) => s.buffer.as_mut(),
            other => panic!("buffer access on {} layer", other.name()),
        }
    }

    /// Takes ownership of the held pixel buffer, leaving `None`.
    pub fn take_buffer(&mut self, id: LayerId) -> Option<PixelSurface> {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s.buffer.take(),
            LayerKind::Canvas(s) | LayerKind::Image(s) => s.buffer.take(),
            other => panic!("buffer access on {} layer", other.name()),
        }
    }

    /// Installs a pixel buffer, dropping any previously held one and any
    /// stale texture binding.
    pub fn set_buffer(&mut self, id: LayerId, buffer: PixelSurface) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            LayerKind::Painted(s) => {
                s.buffer = Some(buffer);
                s.texture = None;
            }
            LayerKind::Canvas(s) | LayerKind::Image(s) => {
                s.buffer = Some(buffer);
                s.texture = None;
            }
            other => panic!("buffer access on {} layer", other.name()),
        }
    }

    /// Returns the buffer rotation of a painted layer.
    #[must_use]
    pub fn rotation(&self, id: LayerId) -> BufferRotation {
        self.painted(id).rotation
    }

    /// Sets the buffer rotation of a painted layer.
    pub fn set_rotation(&mut self, id: LayerId, rotation: BufferRotation) {
        self.validate(id);
        self.painted_mut(id).rotation = rotation;
    }

    /// Returns the texture binding of a painted/canvas/image layer.
    #[must_use]
    pub fn texture(&self, id: LayerId) -> Option<TextureBinding> {
        self.validate(id);
        match &self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s.texture,
            LayerKind::Canvas(s) | LayerKind::Image(s) => s.texture,
            _ => None,
        }
    }

    /// Installs or clears a texture binding.
    pub fn set_texture(&mut self, id: LayerId, texture: Option<TextureBinding>) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s.texture = texture,
            LayerKind::Canvas(s) | LayerKind::Image(s) => s.texture = texture,
            other => panic!("texture access on {} layer", other.name()),
        }
    }

    /// Drops every retained texture binding and clears every painted valid
    /// region, returning the freed texture ids.
    ///
    /// Called on device loss; the cleared valid regions make the next
    /// transaction repaint everything without replaying anything.
    pub fn clear_device_state(&mut self) -> Vec<TextureId> {
        let mut freed = Vec::new();
        for idx in 0..self.len {
            if self.free_list.contains(&idx) {
                continue;
            }
            match &mut self.kind[idx as usize] {
                LayerKind::Painted(s) => {
                    if let Some(binding) = s.texture.take() {
                        freed.push(binding.id);
                    }
                    s.valid.clear();
                }
                LayerKind::Canvas(s) | LayerKind::Image(s) => {
                    if let Some(binding) = s.texture.take() {
                        freed.push(binding.id);
                    }
                }
                _ => {}
            }
        }
        freed
    }

    // -- User data --

    /// Attaches opaque user data to a layer.
    pub fn set_user_data(&mut self, id: LayerId, data: Box<dyn Any>) {
        self.validate(id);
        self.user_data[id.idx as usize] = Some(data);
    }

    /// Returns the user data attached to a layer, if any.
    #[must_use]
    pub fn user_data(&self, id: LayerId) -> Option<&(dyn Any + 'static)> {
        self.validate(id);
        self.user_data[id.idx as usize].as_deref()
    }

    // -- Dirty draining --

    /// Drains the attribute dirty channels, returning the live layers whose
    /// attributes changed since the last drain.
    ///
    /// Structural dirtiness is discarded here; tree mutations are recorded
    /// explicitly, in order, by the forwarder.
    pub fn drain_mutated(&mut self) -> Vec<LayerId> {
        let mut indices: Vec<u32> = self
            .dirty
            .drain(dirty::ATTRIBUTES)
            .deterministic()
            .run()
            .collect();
        indices.extend(self.dirty.drain(dirty::KIND).deterministic().run());
        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter(|idx| *idx < self.len && !self.free_list.contains(idx))
            .map(|idx| LayerId {
                idx,
                generation: self.generation[idx as usize],
            })
            .collect()
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    fn validate(&self, id: LayerId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale LayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn painted(&self, id: LayerId) -> &PaintedState {
        self.validate(id);
        match &self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s,
            other => panic!("painted-layer access on {} layer", other.name()),
        }
    }

    fn painted_mut(&mut self, id: LayerId) -> &mut PaintedState {
        match &mut self.kind[id.idx as usize] {
            LayerKind::Painted(s) => s,
            other => panic!("painted-layer access on {} layer", other.name()),
        }
    }

    fn picture_mut(&mut self, id: LayerId) -> &mut PictureState {
        match &mut self.kind[id.idx as usize] {
            LayerKind::Canvas(s) | LayerKind::Image(s) => s,
            other => panic!("picture access on {} layer", other.name()),
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty
    /// state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    #[test]
    fn create_and_destroy() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Container);
        assert!(store.is_alive(id));
        store.destroy_layer(id);
        assert!(!store.is_alive(id));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = LayerStore::new();
        let id1 = store.create_layer(LayerKind::Container);
        store.destroy_layer(id1);
        let id2 = store.create_layer(LayerKind::Container);
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn insert_after_none_prepends() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let a = store.create_layer(LayerKind::Container);
        let b = store.create_layer(LayerKind::Container);

        store.insert_after(root, a, None);
        store.insert_after(root, b, None);

        let kids: Vec<_> = store.children(root).collect();
        assert_eq!(kids, vec![b, a]);
    }

    #[test]
    fn insert_after_sibling_orders_children() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let a = store.create_layer(LayerKind::Container);
        let b = store.create_layer(LayerKind::Container);
        let c = store.create_layer(LayerKind::Container);

        store.insert_after(root, a, None);
        store.insert_after(root, c, Some(a));
        store.insert_after(root, b, Some(a));

        let kids: Vec<_> = store.children(root).collect();
        assert_eq!(kids, vec![a, b, c]);
        assert_eq!(store.parent(b), Some(root));
    }

    #[test]
    fn remove_child_unlinks() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let a = store.create_layer(LayerKind::Container);
        let b = store.create_layer(LayerKind::Container);
        store.insert_after(root, a, None);
        store.insert_after(root, b, Some(a));

        store.remove_child(root, a);
        let kids: Vec<_> = store.children(root).collect();
        assert_eq!(kids, vec![b]);
        assert_eq!(store.parent(a), None);
    }

    #[test]
    #[should_panic(expected = "not a container layer")]
    fn insert_into_non_container_panics() {
        let mut store = LayerStore::new();
        let painted = store.create_layer(LayerKind::Painted(PaintedState::default()));
        let child = store.create_layer(LayerKind::Container);
        store.insert_after(painted, child, None);
    }

    #[test]
    #[should_panic(expected = "child already has a parent")]
    fn double_insert_panics() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let other = store.create_layer(LayerKind::Container);
        let child = store.create_layer(LayerKind::Container);
        store.insert_after(root, child, None);
        store.insert_after(other, child, None);
    }

    #[test]
    #[should_panic(expected = "would create a cycle")]
    fn inserting_ancestor_into_descendant_panics() {
        let mut store = LayerStore::new();
        let a = store.create_layer(LayerKind::Container);
        let b = store.create_layer(LayerKind::Container);
        store.insert_after(a, b, None);
        // `a` is a detached root, so the no-parent assert alone would let
        // this through and hang every traversal.
        store.insert_after(b, a, None);
    }

    #[test]
    #[should_panic(expected = "would create a cycle")]
    fn inserting_layer_into_itself_panics() {
        let mut store = LayerStore::new();
        let a = store.create_layer(LayerKind::Container);
        store.insert_after(a, a, None);
    }

    #[test]
    #[should_panic(expected = "not a child of the container")]
    fn insert_after_foreign_sibling_panics() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let other = store.create_layer(LayerKind::Container);
        let stranger = store.create_layer(LayerKind::Container);
        let child = store.create_layer(LayerKind::Container);
        store.insert_after(other, stranger, None);
        store.insert_after(root, child, Some(stranger));
    }

    #[test]
    #[should_panic(expected = "cannot destroy layer with children")]
    fn destroy_with_children_panics() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let child = store.create_layer(LayerKind::Container);
        store.insert_after(root, child, None);
        store.destroy_layer(root);
    }

    #[test]
    #[should_panic(expected = "stale LayerId")]
    fn destroyed_handle_panics() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Container);
        store.destroy_layer(id);
        let _ = store.common(id);
    }

    #[test]
    fn valid_region_clamped_to_visible() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Painted(PaintedState::default()));
        store.set_visible_region(id, Region::from_rect(rect(0.0, 0.0, 100.0, 100.0)));
        store.set_valid_region(id, Region::from_rect(rect(50.0, 50.0, 200.0, 200.0)));
        assert_eq!(
            *store.valid_region(id),
            Region::from_rect(rect(50.0, 50.0, 100.0, 100.0))
        );

        // Shrinking the visible region shrinks valid with it.
        store.set_visible_region(id, Region::from_rect(rect(0.0, 0.0, 60.0, 60.0)));
        assert_eq!(
            *store.valid_region(id),
            Region::from_rect(rect(50.0, 50.0, 60.0, 60.0))
        );
    }

    #[test]
    fn invalidate_region_subtracts() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Painted(PaintedState::default()));
        store.set_visible_region(id, Region::from_rect(rect(0.0, 0.0, 100.0, 100.0)));
        store.set_valid_region(id, Region::from_rect(rect(0.0, 0.0, 100.0, 100.0)));
        store.invalidate_region(id, &Region::from_rect(rect(0.0, 0.0, 50.0, 100.0)));
        assert_eq!(
            *store.valid_region(id),
            Region::from_rect(rect(50.0, 0.0, 100.0, 100.0))
        );
    }

    #[test]
    #[should_panic(expected = "painted-layer access on color layer")]
    fn valid_region_on_color_layer_panics() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Color(Color::TRANSPARENT));
        let _ = store.valid_region(id);
    }

    #[test]
    fn drain_mutated_reports_each_layer_once() {
        let mut store = LayerStore::new();
        let a = store.create_layer(LayerKind::Painted(PaintedState::default()));
        let b = store.create_layer(LayerKind::Container);
        let _ = store.drain_mutated();

        store.set_opacity(a, 0.5);
        store.set_visible_region(a, Region::from_rect(rect(0.0, 0.0, 10.0, 10.0)));
        store.set_valid_region(a, Region::new());
        store.set_transform(b, Transform3d::from_translation(1.0, 0.0));

        let mutated = store.drain_mutated();
        assert_eq!(mutated.len(), 2);
        assert!(mutated.contains(&a));
        assert!(mutated.contains(&b));

        // A second drain is empty.
        assert!(store.drain_mutated().is_empty());
    }

    #[test]
    fn drain_mutated_skips_destroyed_layers() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Container);
        store.set_opacity(id, 0.25);
        store.destroy_layer(id);
        assert!(store.drain_mutated().is_empty());
    }

    #[test]
    fn buffer_take_and_set() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Painted(PaintedState::default()));
        assert!(store.buffer(id).is_none());

        store.set_buffer(id, PixelSurface::new(8, 8, crate::surface::SurfaceFormat::Rgba8888));
        assert!(store.buffer(id).is_some());

        let taken = store.take_buffer(id).unwrap();
        assert_eq!(taken.width(), 8);
        assert!(store.buffer(id).is_none());
    }

    #[test]
    fn set_buffer_drops_texture_binding() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Painted(PaintedState::default()));
        store.set_texture(
            id,
            Some(TextureBinding {
                id: TextureId(7),
                width: 8,
                height: 8,
            }),
        );
        store.set_buffer(id, PixelSurface::new(8, 8, crate::surface::SurfaceFormat::Rgba8888));
        assert!(store.texture(id).is_none());
    }

    #[test]
    fn clear_device_state_frees_textures_and_valid_regions() {
        let mut store = LayerStore::new();
        let painted = store.create_layer(LayerKind::Painted(PaintedState::default()));
        let image = store.create_layer(LayerKind::Image(PictureState::default()));
        store.set_visible_region(painted, Region::from_rect(rect(0.0, 0.0, 10.0, 10.0)));
        store.set_valid_region(painted, Region::from_rect(rect(0.0, 0.0, 10.0, 10.0)));
        store.set_texture(
            painted,
            Some(TextureBinding {
                id: TextureId(1),
                width: 10,
                height: 10,
            }),
        );
        store.set_texture(
            image,
            Some(TextureBinding {
                id: TextureId(2),
                width: 4,
                height: 4,
            }),
        );

        let freed = store.clear_device_state();
        assert_eq!(freed.len(), 2);
        assert!(store.valid_region(painted).is_empty());
        assert!(store.texture(painted).is_none());
        assert!(store.texture(image).is_none());
    }

    #[test]
    fn user_data_round_trip() {
        let mut store = LayerStore::new();
        let id = store.create_layer(LayerKind::Container);
        store.set_user_data(id, Box::new(42_u32));
        let data = store.user_data(id).unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&42));
    }
}
