// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics for strata layer trees and transactions.
//!
//! Two exporters, both offline:
//!
//! - [`pretty`] — indented layer-tree dumps for logs and test failures.
//! - [`json`] — JSON export of an encoded transaction update, for diffing
//!   captured protocol traffic.
//!
//! Nothing here is on the compositing hot path; this crate exists so the
//! core crates never grow ad-hoc `Debug` formatting for humans.

pub mod json;
pub mod pretty;

pub use json::update_to_json;
pub use pretty::{dump_tree, tree_to_string};
