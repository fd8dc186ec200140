// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for rendering integrations.
//!
//! Strata splits GPU- and platform-specific work into *backend*
//! implementations of the [`RenderBackend`] trait. The core depends only on
//! this minimal capability set — upload a surface, draw a textured or solid
//! quad, create an offscreen target — never on a specific GPU API. A
//! software rasterizer, a GL context, or a test double all fit behind the
//! same trait.
//!
//! # Failure model
//!
//! Backends report two recoverable conditions:
//!
//! - [`BackendError::OutOfResources`] — an allocation failed. The manager
//!   responds by dropping the retained state for the affected layer and
//!   clearing its valid region, which forces a full repaint next cycle
//!   instead of failing the transaction.
//! - [`BackendError::DeviceLost`] — the device was reset. The manager drops
//!   every retained texture; nothing is replayed, because cleared valid
//!   regions make the next transaction repaint everything.
//!
//! Neither condition is surfaced to callers of
//! [`LayerManager::end_transaction`](crate::manager::LayerManager) as a hard
//! failure; the worst user-visible outcome is a repaint flash.

use core::fmt;

use kurbo::Rect;

use crate::color::Color;
use crate::layer::SamplingFilter;
use crate::surface::{PixelSurface, SurfaceFormat};
use crate::transform::Transform3d;

/// An opaque handle to a backend-managed texture.
///
/// Assigned by backends and passed through without interpretation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

/// A texture handle together with the dimensions it was created at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    /// The backend handle.
    pub id: TextureId,
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
}

/// Recoverable backend failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// A texture or target allocation failed.
    OutOfResources,
    /// The rendering device was reset; retained resources are gone.
    DeviceLost,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfResources => write!(f, "backend out of resources"),
            Self::DeviceLost => write!(f, "rendering device lost"),
        }
    }
}

impl core::error::Error for BackendError {}

/// One textured draw, in back-to-front emission order.
///
/// The source rect is in texture pixels; the destination rect is in layer
/// coordinates, mapped to the output by `transform`.
#[derive(Clone, Debug)]
pub struct Quad {
    /// Texture to sample.
    pub texture: TextureId,
    /// Source rectangle in texture pixels.
    pub src: Rect,
    /// Destination rectangle in layer coordinates.
    pub dst: Rect,
    /// Cumulative layer-to-output transform.
    pub transform: Transform3d,
    /// Cumulative opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Optional clip rectangle in output coordinates.
    pub clip: Option<Rect>,
    /// Whether blending may be skipped.
    pub opaque: bool,
    /// Sampling filter.
    pub filter: SamplingFilter,
}

/// The capability set the compositor needs from a rendering backend.
pub trait RenderBackend {
    /// Returns a short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Uploads a CPU surface into a new backend texture.
    fn upload_surface(&mut self, surface: &PixelSurface) -> Result<TextureId, BackendError>;

    /// Creates an offscreen render target.
    fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
    ) -> Result<TextureId, BackendError>;

    /// Directs subsequent draws at `target`, or at the output surface for
    /// `None`.
    fn bind_target(&mut self, target: Option<TextureId>) -> Result<(), BackendError>;

    /// Draws one textured quad.
    fn draw_quad(&mut self, quad: &Quad) -> Result<(), BackendError>;

    /// Draws a solid-color rectangle.
    fn draw_solid(
        &mut self,
        color: Color,
        dst: Rect,
        transform: &Transform3d,
        opacity: f32,
        clip: Option<Rect>,
    ) -> Result<(), BackendError>;

    /// Releases a texture or target previously returned by this backend.
    fn free_texture(&mut self, texture: TextureId);
}

impl fmt::Debug for dyn RenderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderBackend({})", self.name())
    }
}
