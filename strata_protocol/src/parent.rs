// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor-side receiver: the mirrored tree and the apply loop.
//!
//! A [`ShadowLayersParent`] owns the shadow [`LayerManager`] and the handle
//! table mapping wire identities to arena handles.
//! [`ShadowLayersParent::recv_update`] applies one transaction: every edit in
//! emission order, inside one manager transaction, so the compositor never
//! observes a half-applied batch — compositing happens only after the full
//! batch is walked.
//!
//! # Failure semantics
//!
//! A destroyed parent acknowledges and no-ops; that is the expected
//! shutdown race, not an error. Everything else — unknown tag, version
//! skew, unbound handle, kind mismatch — is a fatal protocol violation and
//! panics: silently dropping an edit would leave the two trees
//! desynchronized forever.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use strata_core::color::Color;
use strata_core::layer::LayerId;
use strata_core::manager::LayerManager;

use crate::edit::{Edit, EditReply, TransactionReplies};
use crate::handle::ShadowHandle;
use crate::swap;
use crate::wire;

/// The receiver side of the shadow protocol.
#[derive(Debug)]
pub struct ShadowLayersParent {
    manager: LayerManager,
    table: HashMap<ShadowHandle, LayerId>,
    destroyed: bool,
}

impl ShadowLayersParent {
    /// Wraps a manager (typically one constructed with a backend) as the
    /// shadow-tree receiver.
    #[must_use]
    pub fn new(manager: LayerManager) -> Self {
        Self {
            manager,
            table: HashMap::new(),
            destroyed: false,
        }
    }

    /// Read access to the mirrored manager.
    #[must_use]
    pub fn manager(&self) -> &LayerManager {
        &self.manager
    }

    /// Looks up the arena handle bound to a wire handle.
    #[must_use]
    pub fn lookup(&self, handle: ShadowHandle) -> Option<LayerId> {
        self.table.get(&handle).copied()
    }

    /// Returns whether [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Tears down the receiver. Subsequent updates are acknowledged as
    /// no-ops; calling destroy again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.manager.destroy();
        self.destroyed = true;
    }

    /// Applies one encoded transaction and returns the encoded reply batch.
    ///
    /// # Panics
    ///
    /// Panics on any protocol violation: undecodable bytes, an edit
    /// referencing an unbound handle, a Create edit re-binding a live
    /// handle, or kind-mismatched attributes.
    pub fn recv_update(&mut self, bytes: &[u8]) -> Vec<u8> {
        if self.destroyed {
            // Expected shutdown race: acknowledge and do nothing.
            return wire::encode_replies(&TransactionReplies::default());
        }

        let update = match wire::decode_update(bytes) {
            Ok(update) => update,
            Err(err) => panic!("fatal protocol violation: {err}"),
        };

        let span = tracing::debug_span!("recv_update", edits = update.edits.len());
        let _guard = span.enter();

        self.manager.begin_transaction_with_target(None);
        let mut replies = TransactionReplies::default();
        for edit in update.edits {
            tracing::trace!(edit = edit.name(), "applying");
            self.apply(edit, &mut replies);
        }
        self.manager.end_transaction(None);

        wire::encode_replies(&replies)
    }

    fn apply(&mut self, edit: Edit, replies: &mut TransactionReplies) {
        match edit {
            Edit::CreateContainer(h) => {
                let id = self.manager.create_container_layer();
                self.bind(h, id);
            }
            Edit::CreatePainted(h) => {
                let id = self.manager.create_painted_layer();
                self.bind(h, id);
            }
            Edit::CreateColor(h) => {
                let id = self.manager.create_color_layer(Color::TRANSPARENT);
                self.bind(h, id);
            }
            Edit::CreateCanvas(h) => {
                let id = self.manager.create_canvas_layer();
                self.bind(h, id);
            }
            Edit::CreateImage(h) => {
                let id = self.manager.create_image_layer();
                self.bind(h, id);
            }
            Edit::SetRoot(h) => {
                let id = self.resolve(h);
                self.manager.set_root(Some(id));
            }
            Edit::InsertAfter {
                container,
                child,
                after,
            } => {
                let container = self.resolve(container);
                let child = self.resolve(child);
                let after = after.map(|a| self.resolve(a));
                self.manager.store_mut().insert_after(container, child, after);
            }
            Edit::RemoveChild { container, child } => {
                let container = self.resolve(container);
                let child = self.resolve(child);
                self.manager.store_mut().remove_child(container, child);
            }
            Edit::SetAttributes { layer, attrs } => {
                let id = self.resolve(layer);
                attrs.apply(self.manager.store_mut(), id);
            }
            Edit::PaintPaintedBuffer {
                layer,
                surface,
                rect,
                rotation,
            } => {
                let id = self.resolve(layer);
                let back = swap::swap_painted_buffer(
                    self.manager.store_mut(),
                    id,
                    surface,
                    rect,
                    rotation,
                );
                replies.replies.push(EditReply::BufferSwapped {
                    layer,
                    back_buffer: back,
                });
            }
            Edit::PaintCanvas { layer, surface } | Edit::PaintImage { layer, surface } => {
                let id = self.resolve(layer);
                let back = swap::swap_picture_buffer(self.manager.store_mut(), id, surface);
                replies.replies.push(EditReply::BufferSwapped {
                    layer,
                    back_buffer: back,
                });
            }
        }
    }

    fn bind(&mut self, handle: ShadowHandle, id: LayerId) {
        match self.table.entry(handle) {
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
            Entry::Occupied(_) => {
                panic!("fatal protocol violation: {handle:?} bound twice");
            }
        }
    }

    fn resolve(&self, handle: ShadowHandle) -> LayerId {
        match self.table.get(&handle) {
            Some(id) => *id,
            None => panic!("fatal protocol violation: edit references unbound {handle:?}"),
        }
    }
}
