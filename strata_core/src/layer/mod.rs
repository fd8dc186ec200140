// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a node in a compositing tree. Each layer has:
//!
//! - An identity ([`LayerId`]) — a generational handle that becomes stale when
//!   the layer is destroyed, preventing use-after-free bugs at the API level.
//! - Topology — parent, first-child, and sibling links forming an ordered
//!   tree. Children are kept back to front: the first child composites first
//!   and later siblings draw over it.
//! - A kind ([`LayerKind`]) — what content the layer composites: a child
//!   list, a retained painted buffer, a solid color, or an external surface.
//! - Common attributes ([`CommonAttrs`]) — visible region, clip, opacity,
//!   transform, and the opaque-content hint, shared by every kind.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles
//! for cache-friendly traversal.
//!
//! # Dirty tracking
//!
//! Attribute mutations automatically mark the corresponding dirty channel
//! (see [`dirty`](crate::dirty)); the transaction machinery drains the
//! channels once per transaction to decide which layers need their
//! attributes re-sent across the process boundary.

mod id;
mod kind;
mod store;
mod traverse;

pub use id::LayerId;
pub use kind::{CommonAttrs, LayerKind, PaintedState, PictureState, SamplingFilter};
pub use store::LayerStore;
pub use traverse::{Children, Preorder};
