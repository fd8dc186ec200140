// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer variants and their per-kind state.
//!
//! Every layer carries the same [`CommonAttrs`]; what distinguishes the
//! variants is the content they composite:
//!
//! - **Container** — no content of its own, owns an ordered child list.
//! - **Painted** — a retained pixel buffer painted incrementally by the
//!   content side, with a *valid region* tracking which pixels are current.
//! - **Color** — a solid fill over its visible region.
//! - **Canvas** / **Image** — an externally rendered pixel source replaced
//!   wholesale rather than painted incrementally.

use kurbo::Rect;

use crate::backend::TextureBinding;
use crate::color::Color;
use crate::region::Region;
use crate::surface::{BufferRotation, PixelSurface};
use crate::transform::Transform3d;

/// Texture sampling filter for canvas and image layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplingFilter {
    /// Bilinear sampling.
    #[default]
    Linear,
    /// Nearest-neighbor sampling.
    Nearest,
}

/// Attributes shared by every layer kind.
#[derive(Clone, Debug, PartialEq)]
pub struct CommonAttrs {
    /// The region of this layer that will be visible, in layer coordinates.
    pub visible: Region,
    /// Optional clip applied to this layer and its subtree, in the parent's
    /// coordinate space.
    pub clip: Option<Rect>,
    /// Layer opacity in `0.0..=1.0`, multiplied down the tree.
    pub opacity: f32,
    /// Transform from layer space into the parent's space.
    pub transform: Transform3d,
    /// Whether the layer promises fully opaque content over its visible
    /// region, allowing blending to be skipped.
    pub opaque_content: bool,
}

impl Default for CommonAttrs {
    fn default() -> Self {
        Self {
            visible: Region::new(),
            clip: None,
            opacity: 1.0,
            transform: Transform3d::IDENTITY,
            opaque_content: false,
        }
    }
}

/// State owned by a painted layer.
#[derive(Clone, Debug, Default)]
pub struct PaintedState {
    /// The subset of the visible region whose buffer pixels are current.
    ///
    /// Invariant: always contained in the layer's visible region.
    pub valid: Region,
    /// The pixel buffer currently owned by this side of the boundary: the
    /// back buffer on the content side, the front buffer on the compositor
    /// side. `None` until the first paint.
    pub buffer: Option<PixelSurface>,
    /// Toroidal wrap offset of `buffer`.
    pub rotation: BufferRotation,
    /// Backend texture holding the last uploaded buffer contents.
    pub texture: Option<TextureBinding>,
}

/// State owned by a canvas or image layer.
#[derive(Clone, Debug, Default)]
pub struct PictureState {
    /// The current source surface. `None` until first supplied.
    pub buffer: Option<PixelSurface>,
    /// Sampling filter used when compositing.
    pub filter: SamplingFilter,
    /// Backend texture holding the last uploaded surface.
    pub texture: Option<TextureBinding>,
}

/// The tagged variant distinguishing layer kinds.
#[derive(Clone, Debug)]
pub enum LayerKind {
    /// An interior node with an ordered child list.
    Container,
    /// A retained, incrementally painted pixel buffer.
    Painted(PaintedState),
    /// A solid color fill.
    Color(Color),
    /// An externally rendered surface updated by the application.
    Canvas(PictureState),
    /// A decoded image surface.
    Image(PictureState),
}

impl LayerKind {
    /// Returns a short name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Painted(_) => "painted",
            Self::Color(_) => "color",
            Self::Canvas(_) => "canvas",
            Self::Image(_) => "image",
        }
    }

    /// Returns whether this kind may own child layers.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Container)
    }
}
