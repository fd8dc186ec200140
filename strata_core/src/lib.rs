// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained layer tree and transaction engine for cross-process compositing.
//!
//! `strata_core` provides the data model shared by both sides of a shadow
//! layer pair: an arena-backed tree of compositing layers, the transaction
//! state machine that batches mutations, and the backend contract a
//! compositor renders through. It is `no_std` compatible (with `alloc`) and
//! uses struct-of-arrays storage with generational index handles for
//! cache-friendly traversal.
//!
//! # Architecture
//!
//! The crate is organized around the transaction cycle that turns scene
//! mutations into composited frames:
//!
//! ```text
//!   LayerManager::begin_transaction()
//!       │
//!       ▼
//!   LayerStore mutations (create / insert / attributes / invalidate)
//!       │
//!       ▼
//!   LayerManager::end_transaction(paint callback)
//!       │                │
//!       ▼                ▼
//!   paint visible−valid  composite via RenderBackend
//! ```
//!
//! **[`layer`]** — Struct-of-arrays layer tree with generational handles.
//! Five kinds: container, painted, color, canvas, image.
//!
//! **[`manager`]** — The [`LayerManager`](manager::LayerManager) transaction
//! engine: phase state machine, paint-callback drawing phase, and the
//! back-to-front composite walk.
//!
//! **[`region`]** — Disjoint-rectangle pixel regions used for visible and
//! valid areas and repaint accumulation.
//!
//! **[`surface`]** — CPU pixel buffers and the toroidal buffer rotation used
//! by scrolled painted layers.
//!
//! **[`dirty`]** — Multi-channel dirty tracking via `understory_dirty`.
//! Attribute mutations automatically mark the appropriate channel; the
//! transaction machinery drains them to decide what to re-send.
//!
//! **[`backend`]** — The [`RenderBackend`](backend::RenderBackend) trait a
//! compositor implements, plus its recoverable error model.
//!
//! **[`transform`]** — 3D affine transform type for layer positioning.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod color;
pub mod dirty;
pub mod layer;
pub mod manager;
pub mod region;
pub mod surface;
pub mod transform;
