// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the edit protocol.
//!
//! The split mirrors the failure semantics of the boundary: a
//! [`ProtocolError`] means the two sides disagree about the wire format and
//! is treated as fatal by receivers (the shadow trees can no longer be
//! trusted to match); a [`TransportError`] means the peer went away, which
//! is an ordinary shutdown condition.

use thiserror::Error;

use crate::handle::ShadowHandle;

/// A malformed or out-of-protocol update.
///
/// Receivers treat every variant as fatal: recovering from a protocol
/// disagreement would leave the two trees silently desynchronized.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The update header carries a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// The version this side speaks.
        expected: u32,
        /// The version found in the header.
        got: u32,
    },

    /// An edit record starts with a tag this side does not know.
    #[error("unknown edit tag {0:#04x}")]
    UnknownTag(u8),

    /// The byte stream ended in the middle of a record.
    #[error("record truncated while reading {0}")]
    Truncated(&'static str),

    /// An edit references a handle no Create edit has bound.
    #[error("edit references unbound handle {0:?}")]
    UnboundHandle(ShadowHandle),

    /// A field holds a value outside its domain.
    #[error("malformed field: {0}")]
    Malformed(&'static str),

    /// Bytes remain after the last record.
    #[error("trailing bytes after the last record")]
    TrailingBytes,
}

/// The peer endpoint is gone.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel to the other side is disconnected.
    #[error("transport disconnected")]
    Disconnected,
}
