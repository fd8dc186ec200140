// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-side transaction forwarding.
//!
//! A [`ShadowForwarder`] sits next to the content-side [`LayerStore`] and
//! turns one transaction's worth of direct tree mutations into an ordered
//! [`Edit`] batch. Every mutation the content makes, it also tells the
//! forwarder about; the forwarder records tree operations 1:1 in call
//! order, drains the store's dirty channels into full-snapshot
//! `SetAttributes` edits, and appends pixel transfers last.
//!
//! `end_transaction` is the single blocking point of the protocol: the
//! batch goes out as one message and the call parks until the reply batch
//! arrives, because the returned back buffers must be in content's hands
//! before it paints the next frame.
//!
//! Emission order within a batch is: creates and tree operations in call
//! order, then attribute snapshots, then paints. Receivers apply strictly
//! in that order, so a handle is always bound before anything references
//! it.

use std::collections::HashMap;

use strata_core::layer::{LayerId, LayerKind, LayerStore};
use strata_core::manager::PaintCallback;
use strata_core::region::Region;
use strata_core::surface::{PixelSurface, SurfaceFormat};

use crate::edit::{Edit, EditReply, LayerAttrs, PROTOCOL_VERSION, TransactionUpdate};
use crate::error::TransportError;
use crate::handle::ShadowHandle;
use crate::transport::Transport;
use crate::wire;

/// Batches one transaction's mutations into an ordered edit list and drives
/// the synchronous round trip that ships them.
#[derive(Debug, Default)]
pub struct ShadowForwarder {
    open: bool,
    next_handle: u64,
    handles: HashMap<LayerId, ShadowHandle>,
    layers: HashMap<ShadowHandle, LayerId>,
    edits: Vec<Edit>,
    updated_pictures: Vec<LayerId>,
}

impl ShadowForwarder {
    /// Creates a forwarder with no shadowed layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction.
    ///
    /// # Panics
    ///
    /// Panics if a transaction is already open — transactions never nest.
    pub fn begin_transaction(&mut self) {
        assert!(!self.open, "shadow transaction already open");
        self.open = true;
    }

    /// Returns the wire handle bound to `id`.
    ///
    /// # Panics
    ///
    /// Panics if the layer was never announced through a `created_*_layer`
    /// call.
    #[must_use]
    pub fn handle_for(&self, id: LayerId) -> ShadowHandle {
        *self
            .handles
            .get(&id)
            .unwrap_or_else(|| panic!("layer {id:?} has no shadow handle"))
    }

    // -- Layer creation --
    //
    // Must be announced before any other edit references the layer; the
    // Create edit is recorded immediately so emission order guarantees the
    // receiver binds the handle first.

    /// Announces a freshly created container layer.
    pub fn created_container_layer(&mut self, id: LayerId) -> ShadowHandle {
        self.created(id, Edit::CreateContainer)
    }

    /// Announces a freshly created painted layer.
    pub fn created_painted_layer(&mut self, id: LayerId) -> ShadowHandle {
        self.created(id, Edit::CreatePainted)
    }

    /// Announces a freshly created color layer.
    pub fn created_color_layer(&mut self, id: LayerId) -> ShadowHandle {
        self.created(id, Edit::CreateColor)
    }

    /// Announces a freshly created canvas layer.
    pub fn created_canvas_layer(&mut self, id: LayerId) -> ShadowHandle {
        self.created(id, Edit::CreateCanvas)
    }

    /// Announces a freshly created image layer.
    pub fn created_image_layer(&mut self, id: LayerId) -> ShadowHandle {
        self.created(id, Edit::CreateImage)
    }

    fn created(&mut self, id: LayerId, make: fn(ShadowHandle) -> Edit) -> ShadowHandle {
        assert!(self.open, "layer created outside a shadow transaction");
        assert!(
            !self.handles.contains_key(&id),
            "layer {id:?} already has a shadow handle"
        );
        self.next_handle += 1;
        let handle = ShadowHandle::new(self.next_handle);
        self.handles.insert(id, handle);
        self.layers.insert(handle, id);
        self.edits.push(make(handle));
        handle
    }

    // -- Tree operations, mirrored 1:1 --

    /// Mirrors a `set_root` call.
    pub fn set_root(&mut self, root: LayerId) {
        assert!(self.open, "tree edit outside a shadow transaction");
        let handle = self.handle_for(root);
        self.edits.push(Edit::SetRoot(handle));
    }

    /// Mirrors an `insert_after` call.
    pub fn insert_after(&mut self, container: LayerId, child: LayerId, after: Option<LayerId>) {
        assert!(self.open, "tree edit outside a shadow transaction");
        self.edits.push(Edit::InsertAfter {
            container: self.handle_for(container),
            child: self.handle_for(child),
            after: after.map(|a| self.handle_for(a)),
        });
    }

    /// Mirrors a `remove_child` call.
    pub fn remove_child(&mut self, container: LayerId, child: LayerId) {
        assert!(self.open, "tree edit outside a shadow transaction");
        self.edits.push(Edit::RemoveChild {
            container: self.handle_for(container),
            child: self.handle_for(child),
        });
    }

    /// Marks a canvas or image layer as having a replaced source surface;
    /// the surface is shipped at `end_transaction`.
    pub fn updated_picture(&mut self, id: LayerId) {
        assert!(self.open, "picture update outside a shadow transaction");
        let _ = self.handle_for(id);
        if !self.updated_pictures.contains(&id) {
            self.updated_pictures.push(id);
        }
    }

    /// Closes the transaction: runs the drawing phase over shadowed painted
    /// layers, serializes the batch, performs the blocking round trip, and
    /// installs the returned back buffers.
    ///
    /// The paint callback is invoked once per shadowed painted layer whose
    /// visible region has unpainted area, exactly as
    /// [`LayerManager::end_transaction`](strata_core::manager::LayerManager::end_transaction)
    /// would.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] when the compositor side is
    /// gone; the transaction's local mutations remain applied.
    ///
    /// # Panics
    ///
    /// Panics if no transaction is open, or if the reply batch is malformed
    /// (a fatal protocol violation).
    pub fn end_transaction(
        &mut self,
        store: &mut LayerStore,
        mut callback: Option<&mut PaintCallback<'_>>,
        transport: &mut dyn Transport,
    ) -> Result<usize, TransportError> {
        assert!(self.open, "end_transaction without begin_transaction");

        let span = tracing::debug_span!("shadow_transaction");
        let _guard = span.enter();

        // Drawing phase: paint shadowed painted layers, queueing one buffer
        // transfer per repainted layer. Handle order keeps this
        // deterministic.
        let mut paints = Vec::new();
        let mut shadowed: Vec<(ShadowHandle, LayerId)> =
            self.layers.iter().map(|(h, id)| (*h, *id)).collect();
        shadowed.sort_unstable_by_key(|(h, _)| *h);
        for (handle, id) in &shadowed {
            if !store.is_alive(*id) || !matches!(store.kind(*id), LayerKind::Painted(_)) {
                continue;
            }
            if let Some(edit) = paint_painted(store, *id, *handle, callback.as_deref_mut()) {
                paints.push(edit);
            }
        }
        for id in std::mem::take(&mut self.updated_pictures) {
            // The layer may have been destroyed later in the same
            // transaction; its handle stays bound but there is nothing to
            // ship.
            if !store.is_alive(id) {
                continue;
            }
            let handle = self.handle_for(id);
            if let Some(surface) = store.take_buffer(id) {
                paints.push(match store.kind(id) {
                    LayerKind::Canvas(_) => Edit::PaintCanvas { layer: handle, surface },
                    LayerKind::Image(_) => Edit::PaintImage { layer: handle, surface },
                    other => panic!("picture update on {} layer", other.name()),
                });
            }
        }

        // Attribute snapshots for every layer that mutated this transaction,
        // including valid-region changes made by the drawing phase above.
        let mut edits = std::mem::take(&mut self.edits);
        for id in store.drain_mutated() {
            if let Some(&handle) = self.handles.get(&id) {
                edits.push(Edit::SetAttributes {
                    layer: handle,
                    attrs: LayerAttrs::capture(store, id),
                });
            }
        }
        edits.extend(paints);

        tracing::debug!(edits = edits.len(), "sending transaction");
        let bytes = wire::encode_update(&TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits,
        });

        self.open = false;
        let reply_bytes = transport.round_trip(bytes)?;

        let replies = match wire::decode_replies(&reply_bytes) {
            Ok(replies) => replies,
            Err(err) => panic!("fatal protocol violation in reply batch: {err}"),
        };
        let count = replies.replies.len();
        for reply in replies.replies {
            let EditReply::BufferSwapped { layer, back_buffer } = reply;
            let id = match self.layers.get(&layer) {
                Some(id) => *id,
                None => panic!("fatal protocol violation: reply for unbound {layer:?}"),
            };
            if store.is_alive(id) {
                store.set_buffer(id, back_buffer);
            }
        }
        tracing::debug!(replies = count, "transaction acknowledged");
        Ok(count)
    }
}

/// Runs the drawing phase for one painted layer and queues its buffer
/// transfer when anything was repainted.
fn paint_painted(
    store: &mut LayerStore,
    id: LayerId,
    handle: ShadowHandle,
    callback: Option<&mut PaintCallback<'_>>,
) -> Option<Edit> {
    let visible = store.common(id).visible.clone();
    if visible.is_empty() {
        return None;
    }
    let bounds = visible.bounds();
    #[expect(clippy::cast_possible_truncation, reason = "layer sizes fit u32")]
    let (width, height) = (bounds.width().ceil() as u32, bounds.height().ceil() as u32);

    let needs_alloc = match store.buffer(id) {
        Some(buffer) => buffer.width() != width || buffer.height() != height,
        None => true,
    };
    if needs_alloc {
        store.set_buffer(id, PixelSurface::new(width, height, SurfaceFormat::Rgba8888));
        store.set_valid_region(id, Region::new());
    }

    let valid = store.valid_region(id).clone();
    let mut to_draw = visible.clone();
    to_draw.subtract(&valid);
    if to_draw.is_empty() {
        return None;
    }

    let callback = callback?;
    let mut buffer = store
        .take_buffer(id)
        .unwrap_or_else(|| PixelSurface::new(width, height, SurfaceFormat::Rgba8888));
    let mut extra_invalid = Region::new();
    callback(id, &mut buffer, &to_draw, &mut extra_invalid);
    let mut new_valid = visible;
    new_valid.subtract(&extra_invalid);
    store.set_valid_region(id, new_valid);

    let rotation = store.rotation(id);
    // The back buffer this was painted into does not hold the last frame,
    // so only the freshly painted area is trustworthy; the receiver carries
    // its own front forward outside this rect.
    Some(Edit::PaintPaintedBuffer {
        layer: handle,
        surface: buffer,
        rect: to_draw.bounds(),
        rotation,
    })
}
