// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Request/reply transport between the two sides.
//!
//! The protocol needs exactly one synchronous round trip per transaction,
//! so the transport surface is a single call: send the encoded update,
//! block, get the encoded replies. Two implementations:
//!
//! - [`ChannelTransport`] — a `crossbeam-channel` pair for a compositor
//!   running on its own thread; the paired [`CompositorEndpoint`] services
//!   requests there.
//! - [`LoopbackTransport`] — applies updates to an in-process
//!   [`ShadowLayersParent`] directly. No threads; useful for tests and for
//!   single-process embeddings.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::TransportError;
use crate::parent::ShadowLayersParent;

/// One blocking request/reply exchange per transaction.
pub trait Transport {
    /// Sends an encoded update and blocks until the encoded reply batch
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] when the peer is gone.
    fn round_trip(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transport")
    }
}

/// Content-side endpoint of a cross-thread channel pair.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Compositor-side endpoint of a cross-thread channel pair.
#[derive(Debug)]
pub struct CompositorEndpoint {
    rx: Receiver<Vec<u8>>,
    tx: Sender<Vec<u8>>,
}

/// Creates a connected transport pair.
#[must_use]
pub fn channel_pair() -> (ChannelTransport, CompositorEndpoint) {
    let (update_tx, update_rx) = unbounded();
    let (reply_tx, reply_rx) = unbounded();
    (
        ChannelTransport {
            tx: update_tx,
            rx: reply_rx,
        },
        CompositorEndpoint {
            rx: update_rx,
            tx: reply_tx,
        },
    )
}

impl Transport for ChannelTransport {
    fn round_trip(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        self.tx
            .send(bytes)
            .map_err(|_| TransportError::Disconnected)?;
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }
}

impl CompositorEndpoint {
    /// Services one transaction against `parent`.
    ///
    /// Returns `false` when the content side has hung up.
    pub fn serve_one(&self, parent: &mut ShadowLayersParent) -> bool {
        match self.rx.recv() {
            Ok(bytes) => {
                let reply = parent.recv_update(&bytes);
                self.tx.send(reply).is_ok()
            }
            Err(_) => false,
        }
    }

    /// Services transactions until the content side hangs up.
    pub fn serve(&self, parent: &mut ShadowLayersParent) {
        while self.serve_one(parent) {}
    }
}

/// A transport that applies updates to an in-process parent.
#[derive(Debug)]
pub struct LoopbackTransport {
    parent: ShadowLayersParent,
}

impl LoopbackTransport {
    /// Wraps a parent for same-process use.
    #[must_use]
    pub fn new(parent: ShadowLayersParent) -> Self {
        Self { parent }
    }

    /// Read access to the wrapped parent.
    #[must_use]
    pub fn parent(&self) -> &ShadowLayersParent {
        &self.parent
    }

    /// Mutable access to the wrapped parent (for teardown).
    pub fn parent_mut(&mut self) -> &mut ShadowLayersParent {
        &mut self.parent
    }

    /// Unwraps the parent.
    #[must_use]
    pub fn into_parent(self) -> ShadowLayersParent {
        self.parent
    }
}

impl Transport for LoopbackTransport {
    fn round_trip(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        Ok(self.parent.recv_update(&bytes))
    }
}
