// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire identity for remote layers.

use core::fmt;

/// The opaque identity both sides use to refer to one remote layer.
///
/// Allocated by the content-side forwarder when the layer's Create edit is
/// emitted and valid for the lifetime of the remote layer. Handles are
/// never zero; zero is the wire encoding of "no layer".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShadowHandle(u64);

impl ShadowHandle {
    /// Wraps a raw handle value.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is zero.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        assert!(raw != 0, "shadow handles are non-zero");
        Self(raw)
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ShadowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShadowHandle({})", self.0)
    }
}
