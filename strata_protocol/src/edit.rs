// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transaction edit records.
//!
//! An [`Edit`] is one serialized mutation shipped from content to
//! compositor. Edits live only for the duration of one transaction: the
//! forwarder accumulates them between `begin_transaction` and
//! `end_transaction`, the receiver consumes them in emission order, and
//! nothing is persisted beyond the batch.
//!
//! Attribute updates are full snapshots. A dirty layer's *complete*
//! [`LayerAttrs`] is re-sent in one [`Edit::SetAttributes`] rather than a
//! delta, trading bandwidth for the impossibility of partial-update skew.

use kurbo::Rect;

use strata_core::color::Color;
use strata_core::layer::{LayerId, LayerKind, LayerStore, SamplingFilter};
use strata_core::region::Region;
use strata_core::surface::{BufferRotation, PixelSurface};
use strata_core::transform::Transform3d;

use crate::handle::ShadowHandle;

/// The protocol version both sides must agree on exactly.
pub const PROTOCOL_VERSION: u32 = 1;

/// Kind-specific half of an attribute snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum KindAttrs {
    /// No kind-specific attributes.
    Container,
    /// Valid region of a painted layer.
    Painted {
        /// Subset of the visible region whose pixels are current.
        valid: Region,
    },
    /// Fill color of a color layer.
    Color(Color),
    /// Sampling filter of a canvas layer.
    Canvas(SamplingFilter),
    /// Sampling filter of an image layer.
    Image(SamplingFilter),
}

/// A complete attribute snapshot for one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerAttrs {
    /// Visible region in layer coordinates.
    pub visible: Region,
    /// Optional clip rect in the parent's coordinate space.
    pub clip: Option<Rect>,
    /// Layer opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Layer-to-parent transform.
    pub transform: Transform3d,
    /// Whether the layer promises fully opaque content.
    pub opaque_content: bool,
    /// Kind-specific attributes.
    pub kind: KindAttrs,
}

impl LayerAttrs {
    /// Snapshots the current attributes of `id`.
    #[must_use]
    pub fn capture(store: &LayerStore, id: LayerId) -> Self {
        let common = store.common(id);
        let kind = match store.kind(id) {
            LayerKind::Container => KindAttrs::Container,
            LayerKind::Painted(s) => KindAttrs::Painted {
                valid: s.valid.clone(),
            },
            LayerKind::Color(c) => KindAttrs::Color(*c),
            LayerKind::Canvas(s) => KindAttrs::Canvas(s.filter),
            LayerKind::Image(s) => KindAttrs::Image(s.filter),
        };
        Self {
            visible: common.visible.clone(),
            clip: common.clip,
            opacity: common.opacity,
            transform: common.transform,
            opaque_content: common.opaque_content,
            kind,
        }
    }

    /// Applies this snapshot to `id`: common attributes first, then
    /// kind-specific ones.
    ///
    /// # Panics
    ///
    /// Panics if the kind-specific attributes do not match the layer's kind;
    /// that is a protocol-level disagreement about what the layer is.
    pub fn apply(&self, store: &mut LayerStore, id: LayerId) {
        store.set_visible_region(id, self.visible.clone());
        store.set_clip(id, self.clip);
        store.set_opacity(id, self.opacity);
        store.set_transform(id, self.transform);
        store.set_opaque_content(id, self.opaque_content);
        match &self.kind {
            KindAttrs::Container => {}
            KindAttrs::Painted { valid } => store.set_valid_region(id, valid.clone()),
            KindAttrs::Color(color) => store.set_color(id, *color),
            KindAttrs::Canvas(filter) | KindAttrs::Image(filter) => {
                store.set_filter(id, *filter);
            }
        }
    }
}

/// One mutation record in a transaction batch.
#[derive(Clone, Debug)]
pub enum Edit {
    /// Create a container layer and bind it to the handle.
    CreateContainer(ShadowHandle),
    /// Create a painted layer and bind it to the handle.
    CreatePainted(ShadowHandle),
    /// Create a color layer and bind it to the handle.
    CreateColor(ShadowHandle),
    /// Create a canvas layer and bind it to the handle.
    CreateCanvas(ShadowHandle),
    /// Create an image layer and bind it to the handle.
    CreateImage(ShadowHandle),
    /// Make the layer the root of the shadow tree.
    SetRoot(ShadowHandle),
    /// Insert `child` into `container` after `after` (or first when `None`).
    InsertAfter {
        /// The container receiving the child.
        container: ShadowHandle,
        /// The layer being inserted.
        child: ShadowHandle,
        /// Existing child to insert after, or `None` for first position.
        after: Option<ShadowHandle>,
    },
    /// Remove `child` from `container`.
    RemoveChild {
        /// The container losing the child.
        container: ShadowHandle,
        /// The layer being removed.
        child: ShadowHandle,
    },
    /// Replace the layer's complete attribute set.
    SetAttributes {
        /// The layer whose attributes changed.
        layer: ShadowHandle,
        /// The full snapshot.
        attrs: LayerAttrs,
    },
    /// Swap in a newly painted front buffer for a painted layer.
    PaintPaintedBuffer {
        /// The painted layer.
        layer: ShadowHandle,
        /// The new front buffer. Only the pixels inside `rect` are current;
        /// the receiver fills the rest from its previous front.
        surface: PixelSurface,
        /// The freshly painted area, in layer coordinates.
        rect: Rect,
        /// Toroidal wrap offset of the buffer.
        rotation: BufferRotation,
    },
    /// Swap in a new source surface for a canvas layer.
    PaintCanvas {
        /// The canvas layer.
        layer: ShadowHandle,
        /// The new source surface.
        surface: PixelSurface,
    },
    /// Swap in a new source surface for an image layer.
    PaintImage {
        /// The image layer.
        layer: ShadowHandle,
        /// The new source surface.
        surface: PixelSurface,
    },
}

impl Edit {
    /// Returns a short name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateContainer(_) => "create_container",
            Self::CreatePainted(_) => "create_painted",
            Self::CreateColor(_) => "create_color",
            Self::CreateCanvas(_) => "create_canvas",
            Self::CreateImage(_) => "create_image",
            Self::SetRoot(_) => "set_root",
            Self::InsertAfter { .. } => "insert_after",
            Self::RemoveChild { .. } => "remove_child",
            Self::SetAttributes { .. } => "set_attributes",
            Self::PaintPaintedBuffer { .. } => "paint_painted_buffer",
            Self::PaintCanvas { .. } => "paint_canvas",
            Self::PaintImage { .. } => "paint_image",
        }
    }
}

/// One acknowledgement record in a transaction's reply batch.
#[derive(Clone, Debug)]
pub enum EditReply {
    /// A buffer swap completed; the relinquished front buffer comes back as
    /// the sender's new back buffer.
    BufferSwapped {
        /// The layer whose buffers were swapped.
        layer: ShadowHandle,
        /// The surface the receiver gave up.
        back_buffer: PixelSurface,
    },
}

/// One transaction's worth of edits, as sent on the wire.
#[derive(Clone, Debug)]
pub struct TransactionUpdate {
    /// Protocol version of the sender.
    pub version: u32,
    /// Edits in emission order.
    pub edits: Vec<Edit>,
}

/// The reply batch for one transaction.
#[derive(Clone, Debug, Default)]
pub struct TransactionReplies {
    /// Replies in the order the corresponding edits were applied.
    pub replies: Vec<EditReply>,
}
