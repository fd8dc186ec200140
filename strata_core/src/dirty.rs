// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Strata uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! record which layers mutated during a transaction's construction phase.
//! The channels map to how mutations travel on the wire:
//!
//! - [`ATTRIBUTES`] — any common attribute changed (visible region, clip,
//!   opacity, transform, opaque-content flag). A layer marked here has its
//!   *complete* attribute set re-serialized into one `SetAttributes` edit;
//!   deltas are never computed.
//! - [`KIND`] — a kind-specific attribute changed (valid region, fill
//!   color, sampling filter). Folded into the same `SetAttributes` edit.
//! - [`TOPOLOGY`] — structural mutations (create/destroy, insert/remove).
//!   Tree edits are recorded explicitly in emission order by the forwarder,
//!   so this channel is drained and discarded; it exists so a transaction
//!   can cheaply tell whether the tree shape changed at all.
//!
//! Channels are drained exactly once per transaction by
//! [`LayerStore::drain_mutated`](crate::layer::LayerStore::drain_mutated).

use understory_dirty::Channel;

/// A common attribute changed — the layer's full attribute set is resent.
pub const ATTRIBUTES: Channel = Channel::new(0);

/// A kind-specific attribute changed (valid region, color, filter).
pub const KIND: Channel = Channel::new(1);

/// Tree topology changed (create/destroy layer, insert/remove child).
pub const TOPOLOGY: Channel = Channel::new(2);
