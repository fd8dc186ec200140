// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transaction engine and compositing walk.
//!
//! A [`LayerManager`] owns one [`LayerStore`] and drives it through a strict
//! transaction cycle:
//!
//! ```text
//! Idle --begin_transaction--> Constructing --end_transaction--> Drawing --> Idle
//! ```
//!
//! All tree and attribute mutations must happen between `begin_transaction`
//! and `end_transaction`; the phase is asserted on every mutation entry
//! point, so a mutation outside a transaction is a programmer error that
//! panics rather than a runtime condition that propagates.
//!
//! During `end_transaction` the manager runs the *drawing* phase: every
//! painted layer with a non-empty visible region gets its retained buffer
//! (re)allocated if needed, the region still needing paint is computed as
//! `visible − valid`, and the caller's paint callback fills it in. A manager
//! constructed with a [`RenderBackend`] then composites the tree back to
//! front into the backend.
//!
//! Destroying a manager is terminal: the transaction machinery and backend
//! are gone, but the arena survives so user-data accessors keep working
//! during teardown.

use alloc::boxed::Box;
use alloc::vec::Vec;

use kurbo::{Point, Rect};

use crate::backend::{BackendError, Quad, RenderBackend, TextureBinding, TextureId};
use crate::color::Color;
use crate::layer::{LayerId, LayerKind, LayerStore, PaintedState, PictureState};
use crate::region::Region;
use crate::surface::{PixelSurface, SurfaceFormat};
use crate::transform::Transform3d;

/// Where the manager is in its transaction cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionPhase {
    /// No transaction open; mutations are forbidden.
    Idle,
    /// Between `begin_transaction` and `end_transaction`; mutations allowed.
    Constructing,
    /// Inside `end_transaction`, running paint callbacks and compositing.
    Drawing,
    /// The manager was destroyed; only read accessors remain usable.
    Destroyed,
}

/// Callback invoked once per painted layer that has pixels to produce.
///
/// Receives the layer, its retained buffer, and the region (in layer
/// coordinates) that must be painted; the callback must cover all of it.
/// Pixel `(0, 0)` of the buffer corresponds to the origin of the visible
/// region's bounding box. The final argument is an out-parameter: any area
/// the callback adds to it is re-invalidated after the paint (used when the
/// callback discovers content it could not render correctly this cycle).
pub type PaintCallback<'a> = dyn FnMut(LayerId, &mut PixelSurface, &Region, &mut Region) + 'a;

/// The transaction engine: owns the layer arena, enforces the transaction
/// state machine, and (when constructed with a backend) composites.
#[derive(Debug)]
pub struct LayerManager {
    store: LayerStore,
    root: Option<LayerId>,
    phase: TransactionPhase,
    backend: Option<Box<dyn RenderBackend>>,
    target: Option<TextureId>,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerManager {
    /// Creates a manager with no backend.
    ///
    /// `end_transaction` runs paint callbacks but composites nothing; this
    /// is the configuration used on the content side of a shadow pair.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: LayerStore::new(),
            root: None,
            phase: TransactionPhase::Idle,
            backend: None,
            target: None,
        }
    }

    /// Creates a manager that composites into the given backend at the end
    /// of every transaction.
    #[must_use]
    pub fn with_backend(backend: Box<dyn RenderBackend>) -> Self {
        Self {
            store: LayerStore::new(),
            root: None,
            phase: TransactionPhase::Idle,
            backend: Some(backend),
            target: None,
        }
    }

    /// Returns the current transaction phase.
    #[must_use]
    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    /// Returns the backend's diagnostic name, if a backend is attached.
    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_deref().map(RenderBackend::name)
    }

    /// Read access to the layer arena. Valid in every phase, including after
    /// [`destroy`](Self::destroy).
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Mutable access to the layer arena.
    ///
    /// # Panics
    ///
    /// Panics unless a transaction is open.
    pub fn store_mut(&mut self) -> &mut LayerStore {
        assert!(
            self.phase == TransactionPhase::Constructing,
            "layer mutation outside a transaction (phase: {:?})",
            self.phase
        );
        &mut self.store
    }

    /// Returns the root layer, if one is set.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        self.root
    }

    // -- Layer factories --

    /// Creates a container layer.
    pub fn create_container_layer(&mut self) -> LayerId {
        self.assert_usable();
        self.store.create_layer(LayerKind::Container)
    }

    /// Creates a painted layer.
    pub fn create_painted_layer(&mut self) -> LayerId {
        self.assert_usable();
        self.store.create_layer(LayerKind::Painted(PaintedState::default()))
    }

    /// Creates a color layer with the given fill.
    pub fn create_color_layer(&mut self, color: Color) -> LayerId {
        self.assert_usable();
        self.store.create_layer(LayerKind::Color(color))
    }

    /// Creates a canvas layer.
    pub fn create_canvas_layer(&mut self) -> LayerId {
        self.assert_usable();
        self.store.create_layer(LayerKind::Canvas(PictureState::default()))
    }

    /// Creates an image layer.
    pub fn create_image_layer(&mut self) -> LayerId {
        self.assert_usable();
        self.store.create_layer(LayerKind::Image(PictureState::default()))
    }

    // -- Transaction cycle --

    /// Opens a transaction.
    ///
    /// # Panics
    ///
    /// Panics if a transaction is already open or the manager was destroyed.
    pub fn begin_transaction(&mut self) {
        self.begin_transaction_with_target(None);
    }

    /// Opens a transaction whose composite goes to an offscreen target
    /// instead of the output surface.
    ///
    /// # Panics
    ///
    /// Panics if a transaction is already open or the manager was destroyed.
    pub fn begin_transaction_with_target(&mut self, target: Option<TextureId>) {
        assert!(
            self.phase == TransactionPhase::Idle,
            "begin_transaction in phase {:?}",
            self.phase
        );
        self.target = target;
        self.phase = TransactionPhase::Constructing;
    }

    /// Sets or clears the root of the composited tree.
    ///
    /// # Panics
    ///
    /// Panics outside a transaction, or if the handle is stale.
    pub fn set_root(&mut self, root: Option<LayerId>) {
        assert!(
            self.phase == TransactionPhase::Constructing,
            "set_root outside a transaction"
        );
        if let Some(id) = root {
            assert!(self.store.is_alive(id), "set_root with stale handle");
        }
        self.root = root;
    }

    /// Closes the transaction: runs the drawing phase, then composites if a
    /// backend is attached.
    ///
    /// The callback is invoked once per painted layer whose visible region
    /// has pixels not yet covered by its valid region. After the callback
    /// returns, that layer's valid region equals its visible region.
    ///
    /// # Panics
    ///
    /// Panics if no transaction is open.
    pub fn end_transaction(&mut self, mut callback: Option<&mut PaintCallback<'_>>) {
        assert!(
            self.phase == TransactionPhase::Constructing,
            "end_transaction in phase {:?}",
            self.phase
        );
        self.phase = TransactionPhase::Drawing;

        if let Some(root) = self.root {
            let layers: Vec<LayerId> = self.store.preorder(root).collect();
            for id in layers {
                if matches!(self.store.kind(id), LayerKind::Painted(_)) {
                    self.paint_layer(id, callback.as_deref_mut());
                }
            }

            if self.backend.is_some() && self.composite(root).is_err() {
                // Device lost mid-frame: drop retained device state and show
                // nothing this cycle. The cleared valid regions force a full
                // repaint on the next transaction.
                self.handle_device_reset();
            }
        }

        self.phase = TransactionPhase::Idle;
    }

    /// Destroys the manager: drops the backend and locks out transactions.
    ///
    /// The arena is retained so handle-based read accessors (user data in
    /// particular) remain valid during teardown. Calling destroy twice is a
    /// no-op.
    pub fn destroy(&mut self) {
        if self.phase == TransactionPhase::Destroyed {
            return;
        }
        if let Some(mut backend) = self.backend.take() {
            for texture in self.store.clear_device_state() {
                backend.free_texture(texture);
            }
        }
        self.root = None;
        self.phase = TransactionPhase::Destroyed;
    }

    /// Drops all retained device state after a device reset.
    ///
    /// Nothing is replayed; the cleared valid regions make the next
    /// transaction repaint and re-upload everything.
    pub fn handle_device_reset(&mut self) {
        let _ = self.store.clear_device_state();
    }

    // -- Internal: drawing phase --

    /// Ensures the layer's buffer matches its visible bounds, computes the
    /// region needing paint, and runs the callback over it.
    fn paint_layer(&mut self, id: LayerId, callback: Option<&mut PaintCallback<'_>>) {
        let visible = self.store.common(id).visible.clone();
        if visible.is_empty() {
            return;
        }
        let bounds = visible.bounds();
        let width = bounds.width().ceil() as u32;
        let height = bounds.height().ceil() as u32;

        let needs_alloc = match self.store.buffer(id) {
            Some(buffer) => buffer.width() != width || buffer.height() != height,
            None => true,
        };
        if needs_alloc {
            self.store
                .set_buffer(id, PixelSurface::new(width, height, SurfaceFormat::Rgba8888));
            self.store.set_valid_region(id, Region::new());
            self.store.set_rotation(id, crate::surface::BufferRotation::ZERO);
        }

        let valid = self.store.valid_region(id).clone();
        let mut to_draw = visible.clone();
        to_draw.subtract(&valid);
        if to_draw.is_empty() {
            return;
        }
        if let Some(callback) = callback {
            let mut buffer = self.store.take_buffer(id).unwrap_or_else(|| {
                PixelSurface::new(width, height, SurfaceFormat::Rgba8888)
            });
            let mut extra_invalid = Region::new();
            callback(id, &mut buffer, &to_draw, &mut extra_invalid);
            self.store.set_buffer(id, buffer);
            let mut valid = visible;
            valid.subtract(&extra_invalid);
            self.store.set_valid_region(id, valid);
        }
    }

    // -- Internal: compositing --

    /// Uploads out-of-date buffers, then walks the tree emitting draws.
    fn composite(&mut self, root: LayerId) -> Result<(), BackendError> {
        let mut backend = self.backend.take().unwrap();
        let target = self.target;
        let result = self.upload_pass(root, backend.as_mut()).and_then(|()| {
            backend.bind_target(target)?;
            walk(
                &self.store,
                backend.as_mut(),
                root,
                Transform3d::IDENTITY,
                1.0,
                None,
            )
        });
        self.backend = Some(backend);
        match result {
            Err(BackendError::DeviceLost) => Err(BackendError::DeviceLost),
            // Out-of-resources is handled per layer in the upload pass; a
            // draw-time occurrence just drops the rest of the frame.
            Err(BackendError::OutOfResources) | Ok(()) => Ok(()),
        }
    }

    /// Uploads every content buffer whose texture is missing or stale.
    ///
    /// Out-of-resources on one layer clears that layer's retained state and
    /// moves on; device loss aborts.
    fn upload_pass(
        &mut self,
        root: LayerId,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        let layers: Vec<LayerId> = self.store.preorder(root).collect();
        for id in layers {
            let has_buffer = match self.store.kind(id) {
                LayerKind::Painted(s) => s.buffer.is_some(),
                LayerKind::Canvas(s) | LayerKind::Image(s) => s.buffer.is_some(),
                _ => false,
            };
            if !has_buffer {
                continue;
            }
            let (width, height) = {
                let buffer = self.store.buffer(id).unwrap();
                (buffer.width(), buffer.height())
            };
            // Installing a new buffer drops the binding, so a present
            // texture means the content has not changed since last upload.
            if let Some(old) = self.store.texture(id) {
                if old.width == width && old.height == height {
                    continue;
                }
                backend.free_texture(old.id);
            }
            let buffer = self.store.take_buffer(id).unwrap();
            match backend.upload_surface(&buffer) {
                Ok(texture) => {
                    self.store.set_buffer(id, buffer);
                    self.store
                        .set_texture(id, Some(TextureBinding { id: texture, width, height }));
                }
                Err(BackendError::OutOfResources) => {
                    self.store.set_buffer(id, buffer);
                    self.store.set_texture(id, None);
                    if matches!(self.store.kind(id), LayerKind::Painted(_)) {
                        self.store.set_valid_region(id, Region::new());
                    }
                }
                Err(BackendError::DeviceLost) => {
                    self.store.set_buffer(id, buffer);
                    return Err(BackendError::DeviceLost);
                }
            }
        }
        Ok(())
    }

    fn assert_usable(&self) {
        assert!(
            self.phase != TransactionPhase::Destroyed,
            "layer manager was destroyed"
        );
    }
}

/// Maps a rect through a transform by its corner bounding box.
fn map_rect(transform: &Transform3d, rect: Rect) -> Rect {
    let corners = [
        transform.transform_point(Point::new(rect.x0, rect.y0)),
        transform.transform_point(Point::new(rect.x1, rect.y0)),
        transform.transform_point(Point::new(rect.x0, rect.y1)),
        transform.transform_point(Point::new(rect.x1, rect.y1)),
    ];
    let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
    for c in &corners[1..] {
        out.x0 = out.x0.min(c.x);
        out.y0 = out.y0.min(c.y);
        out.x1 = out.x1.max(c.x);
        out.y1 = out.y1.max(c.y);
    }
    out
}

fn intersect_clips(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.intersect(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Recursive back-to-front composite of one layer and its subtree.
fn walk(
    store: &LayerStore,
    backend: &mut dyn RenderBackend,
    id: LayerId,
    parent_transform: Transform3d,
    parent_opacity: f32,
    parent_clip: Option<Rect>,
) -> Result<(), BackendError> {
    let common = store.common(id);
    let transform = parent_transform * common.transform;
    let opacity = parent_opacity * common.opacity;
    let clip = intersect_clips(
        parent_clip,
        common.clip.map(|c| map_rect(&parent_transform, c)),
    );

    if opacity <= 0.0 {
        return Ok(());
    }

    match store.kind(id) {
        LayerKind::Container => {}
        LayerKind::Color(color) => {
            if !common.visible.is_empty() {
                backend.draw_solid(*color, common.visible.bounds(), &transform, opacity, clip)?;
            }
        }
        LayerKind::Painted(state) => {
            if let Some(texture) = state.texture {
                let origin = common.visible.bounds().origin();
                for (src, dst) in
                    state
                        .rotation
                        .wrapped_quads(texture.width, texture.height, (origin.x, origin.y))
                {
                    backend.draw_quad(&Quad {
                        texture: texture.id,
                        src,
                        dst,
                        transform,
                        opacity,
                        clip,
                        opaque: common.opaque_content,
                        filter: crate::layer::SamplingFilter::Linear,
                    })?;
                }
            }
        }
        LayerKind::Canvas(state) | LayerKind::Image(state) => {
            if let Some(texture) = state.texture {
                backend.draw_quad(&Quad {
                    texture: texture.id,
                    src: Rect::new(0.0, 0.0, f64::from(texture.width), f64::from(texture.height)),
                    dst: common.visible.bounds(),
                    transform,
                    opacity,
                    clip,
                    opaque: common.opaque_content,
                    filter: state.filter,
                })?;
            }
        }
    }

    for child in store.children(id) {
        walk(store, backend, child, transform, opacity, clip)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use core::cell::RefCell;

    use super::*;
    use crate::backend::TextureId;

    /// Records every backend call; can be told to fail uploads.
    struct MockBackend {
        log: Rc<RefCell<Vec<String>>>,
        next_texture: u64,
        fail_upload: Option<BackendError>,
    }

    impl MockBackend {
        fn new(log: Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                log,
                next_texture: 1,
                fail_upload: None,
            }
        }
    }

    impl RenderBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn upload_surface(&mut self, surface: &PixelSurface) -> Result<TextureId, BackendError> {
            if let Some(err) = self.fail_upload {
                return Err(err);
            }
            let id = TextureId(self.next_texture);
            self.next_texture += 1;
            self.log.borrow_mut().push(alloc::format!(
                "upload {}x{} -> {:?}",
                surface.width(),
                surface.height(),
                id
            ));
            Ok(id)
        }

        fn create_offscreen_target(
            &mut self,
            _width: u32,
            _height: u32,
            _format: SurfaceFormat,
        ) -> Result<TextureId, BackendError> {
            let id = TextureId(self.next_texture);
            self.next_texture += 1;
            Ok(id)
        }

        fn bind_target(&mut self, _target: Option<TextureId>) -> Result<(), BackendError> {
            Ok(())
        }

        fn draw_quad(&mut self, quad: &Quad) -> Result<(), BackendError> {
            self.log
                .borrow_mut()
                .push(alloc::format!("quad {:?}", quad.texture));
            Ok(())
        }

        fn draw_solid(
            &mut self,
            color: Color,
            _dst: Rect,
            _transform: &Transform3d,
            opacity: f32,
            _clip: Option<Rect>,
        ) -> Result<(), BackendError> {
            self.log
                .borrow_mut()
                .push(alloc::format!("solid a={} op={}", color.a, opacity));
            Ok(())
        }

        fn free_texture(&mut self, texture: TextureId) {
            self.log
                .borrow_mut()
                .push(alloc::format!("free {texture:?}"));
        }
    }

    fn region(x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        Region::from_rect(Rect::new(x0, y0, x1, y1))
    }

    #[test]
    fn transaction_cycle_returns_to_idle() {
        let mut mgr = LayerManager::new();
        assert_eq!(mgr.phase(), TransactionPhase::Idle);
        mgr.begin_transaction();
        assert_eq!(mgr.phase(), TransactionPhase::Constructing);
        mgr.end_transaction(None);
        assert_eq!(mgr.phase(), TransactionPhase::Idle);
    }

    #[test]
    #[should_panic(expected = "begin_transaction in phase")]
    fn nested_begin_panics() {
        let mut mgr = LayerManager::new();
        mgr.begin_transaction();
        mgr.begin_transaction();
    }

    #[test]
    #[should_panic(expected = "end_transaction in phase")]
    fn end_without_begin_panics() {
        let mut mgr = LayerManager::new();
        mgr.end_transaction(None);
    }

    #[test]
    #[should_panic(expected = "layer mutation outside a transaction")]
    fn mutation_outside_transaction_panics() {
        let mut mgr = LayerManager::new();
        let id = mgr.create_container_layer();
        mgr.store_mut().set_opacity(id, 0.5);
    }

    #[test]
    fn paint_callback_covers_visible_minus_valid() {
        let mut mgr = LayerManager::new();
        let root = mgr.create_container_layer();
        let painted = mgr.create_painted_layer();

        mgr.begin_transaction();
        mgr.store_mut().insert_after(root, painted, None);
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 100.0, 50.0));
        mgr.set_root(Some(root));

        let painted_regions = Rc::new(RefCell::new(Vec::new()));
        let sink = painted_regions.clone();
        let mut cb = move |_id: LayerId, _buf: &mut PixelSurface, to_draw: &Region, _: &mut Region| {
            sink.borrow_mut().push(to_draw.clone());
        };
        mgr.end_transaction(Some(&mut cb));

        // First paint covers the full visible region.
        assert_eq!(painted_regions.borrow().len(), 1);
        assert_eq!(painted_regions.borrow()[0], region(0.0, 0.0, 100.0, 50.0));
        assert_eq!(
            *mgr.store().valid_region(painted),
            region(0.0, 0.0, 100.0, 50.0)
        );

        // A second transaction with nothing invalidated paints nothing.
        mgr.begin_transaction();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let mut cb = move |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {
            *sink.borrow_mut() += 1;
        };
        mgr.end_transaction(Some(&mut cb));
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn invalidation_triggers_partial_repaint() {
        let mut mgr = LayerManager::new();
        let painted = mgr.create_painted_layer();
        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 100.0, 100.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        mgr.begin_transaction();
        mgr.store_mut()
            .invalidate_region(painted, &region(0.0, 0.0, 30.0, 100.0));
        let painted_regions = Rc::new(RefCell::new(Vec::new()));
        let sink = painted_regions.clone();
        let mut cb = move |_: LayerId, _: &mut PixelSurface, to_draw: &Region, _: &mut Region| {
            sink.borrow_mut().push(to_draw.clone());
        };
        mgr.end_transaction(Some(&mut cb));

        assert_eq!(painted_regions.borrow().len(), 1);
        assert_eq!(painted_regions.borrow()[0], region(0.0, 0.0, 30.0, 100.0));
    }

    #[test]
    fn callback_extra_invalidation_is_honored() {
        let mut mgr = LayerManager::new();
        let painted = mgr.create_painted_layer();
        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 100.0, 100.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, extra: &mut Region| {
            extra.union_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        };
        mgr.end_transaction(Some(&mut cb));

        let mut expected = region(0.0, 0.0, 100.0, 100.0);
        expected.subtract_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(*mgr.store().valid_region(painted), expected);
    }

    #[test]
    fn resize_reallocates_and_fully_repaints() {
        let mut mgr = LayerManager::new();
        let painted = mgr.create_painted_layer();
        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 50.0, 50.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));
        assert_eq!(mgr.store().buffer(painted).unwrap().width(), 50);

        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 80.0, 50.0));
        let painted_regions = Rc::new(RefCell::new(Vec::new()));
        let sink = painted_regions.clone();
        let mut cb = move |_: LayerId, _: &mut PixelSurface, to_draw: &Region, _: &mut Region| {
            sink.borrow_mut().push(to_draw.clone());
        };
        mgr.end_transaction(Some(&mut cb));

        assert_eq!(mgr.store().buffer(painted).unwrap().width(), 80);
        assert_eq!(painted_regions.borrow()[0], region(0.0, 0.0, 80.0, 50.0));
    }

    #[test]
    fn composite_emits_back_to_front() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = LayerManager::with_backend(Box::new(MockBackend::new(log.clone())));
        let root = mgr.create_container_layer();
        let below = mgr.create_color_layer(Color::rgb(1.0, 0.0, 0.0));
        let above = mgr.create_painted_layer();

        mgr.begin_transaction();
        mgr.store_mut().insert_after(root, below, None);
        mgr.store_mut().insert_after(root, above, Some(below));
        mgr.store_mut()
            .set_visible_region(below, region(0.0, 0.0, 10.0, 10.0));
        mgr.store_mut()
            .set_visible_region(above, region(0.0, 0.0, 10.0, 10.0));
        mgr.set_root(Some(root));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        let log = log.borrow();
        let solid_pos = log.iter().position(|l| l.starts_with("solid")).unwrap();
        let quad_pos = log.iter().position(|l| l.starts_with("quad")).unwrap();
        assert!(solid_pos < quad_pos, "color layer must draw first: {log:?}");
    }

    #[test]
    fn opacity_multiplies_down_the_tree() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = LayerManager::with_backend(Box::new(MockBackend::new(log.clone())));
        let root = mgr.create_container_layer();
        let color = mgr.create_color_layer(Color::rgb(0.0, 0.0, 0.0));

        mgr.begin_transaction();
        mgr.store_mut().insert_after(root, color, None);
        mgr.store_mut().set_opacity(root, 0.5);
        mgr.store_mut().set_opacity(color, 0.5);
        mgr.store_mut()
            .set_visible_region(color, region(0.0, 0.0, 1.0, 1.0));
        mgr.set_root(Some(root));
        mgr.end_transaction(None);

        assert_eq!(log.borrow()[0], "solid a=1 op=0.25");
    }

    #[test]
    fn out_of_resources_clears_valid_and_continues() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = MockBackend::new(log.clone());
        backend.fail_upload = Some(BackendError::OutOfResources);
        let mut mgr = LayerManager::with_backend(Box::new(backend));
        let painted = mgr.create_painted_layer();

        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 10.0, 10.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        // The failed layer is queued for a full repaint next cycle.
        assert!(mgr.store().valid_region(painted).is_empty());
        assert!(mgr.store().texture(painted).is_none());
        assert_eq!(mgr.phase(), TransactionPhase::Idle);
    }

    #[test]
    fn device_lost_resets_retained_state() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = MockBackend::new(log.clone());
        backend.fail_upload = Some(BackendError::DeviceLost);
        let mut mgr = LayerManager::with_backend(Box::new(backend));
        let painted = mgr.create_painted_layer();

        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 10.0, 10.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        assert!(mgr.store().valid_region(painted).is_empty());
        assert!(mgr.store().texture(painted).is_none());
        assert_eq!(mgr.phase(), TransactionPhase::Idle);
    }

    #[test]
    fn destroy_keeps_user_data_readable() {
        let mut mgr = LayerManager::new();
        let id = mgr.create_container_layer();
        mgr.begin_transaction();
        mgr.store_mut().set_user_data(id, Box::new(7_i32));
        mgr.end_transaction(None);

        mgr.destroy();
        mgr.destroy(); // double destroy is a no-op

        assert_eq!(mgr.phase(), TransactionPhase::Destroyed);
        assert_eq!(
            mgr.store().user_data(id).unwrap().downcast_ref::<i32>(),
            Some(&7)
        );
    }

    #[test]
    #[should_panic(expected = "layer manager was destroyed")]
    fn create_after_destroy_panics() {
        let mut mgr = LayerManager::new();
        mgr.destroy();
        let _ = mgr.create_container_layer();
    }

    #[test]
    fn empty_transaction_is_harmless() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = LayerManager::with_backend(Box::new(MockBackend::new(log.clone())));
        mgr.begin_transaction();
        mgr.end_transaction(None);
        assert!(log.borrow().is_empty());
        assert_eq!(mgr.phase(), TransactionPhase::Idle);
    }

    #[test]
    fn rotated_buffer_splits_into_quads() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = LayerManager::with_backend(Box::new(MockBackend::new(log.clone())));
        let painted = mgr.create_painted_layer();

        mgr.begin_transaction();
        mgr.store_mut()
            .set_visible_region(painted, region(0.0, 0.0, 10.0, 10.0));
        mgr.set_root(Some(painted));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        mgr.begin_transaction();
        mgr.store_mut()
            .set_rotation(painted, crate::surface::BufferRotation { x: 3, y: 0 });
        // Force a repaint so the texture is fresh.
        mgr.store_mut()
            .invalidate_region(painted, &region(0.0, 0.0, 1.0, 1.0));
        let mut cb = |_: LayerId, _: &mut PixelSurface, _: &Region, _: &mut Region| {};
        mgr.end_transaction(Some(&mut cb));

        let quads = log.borrow().iter().filter(|l| l.starts_with("quad")).count();
        // One quad for the unrotated first frame, two for the rotated one.
        assert_eq!(quads, 3);
    }
}
