// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shadow-layer edit protocol: diffing, wire format, apply loop, and
//! double-buffer ownership transfer.
//!
//! `strata_protocol` connects two [`strata_core`] layer trees across a
//! process or thread boundary. The content side mutates its tree directly
//! and mirrors every mutation into a [`ShadowForwarder`], which batches one
//! transaction's worth of [`Edit`] records and ships them as a single
//! message. The compositor side's [`ShadowLayersParent`] applies the batch
//! in emission order to its mirrored tree and answers with the buffer-swap
//! acknowledgements that hand painted surfaces back for reuse.
//!
//! ```text
//!   content LayerStore          compositor LayerManager
//!        │ mutate                        ▲ composite
//!        ▼                               │
//!   ShadowForwarder ──encode──► ShadowLayersParent
//!        ▲                               │
//!        └────────── replies ◄───────────┘
//!              (returned back buffers)
//! ```
//!
//! One transaction is one atomic unit: the receiver walks the full batch
//! before compositing, transactions apply in send order, and
//! `end_transaction` on the content side is the protocol's single blocking
//! point. Protocol violations (unknown tag, version skew, unbound handle)
//! are fatal by contract; a destroyed receiver acknowledges and no-ops.
//!
//! [`Edit`]: edit::Edit
//! [`ShadowForwarder`]: forwarder::ShadowForwarder
//! [`ShadowLayersParent`]: parent::ShadowLayersParent

pub mod edit;
pub mod error;
pub mod forwarder;
pub mod handle;
pub mod parent;
pub mod swap;
pub mod transport;
pub mod wire;

pub use edit::{Edit, EditReply, KindAttrs, LayerAttrs, PROTOCOL_VERSION};
pub use error::{ProtocolError, TransportError};
pub use forwarder::ShadowForwarder;
pub use handle::ShadowHandle;
pub use parent::ShadowLayersParent;
pub use swap::RETENTION_THRESHOLD_PX;
pub use transport::{ChannelTransport, CompositorEndpoint, LoopbackTransport, Transport, channel_pair};
