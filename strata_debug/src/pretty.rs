// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable layer-tree dumps.
//!
//! One line per layer, indented by depth: kind, handle, visible bounds,
//! opacity, and for painted layers the valid bounds. Intended for log
//! output and test failure messages, not for machine consumption.

use std::io::Write;

use strata_core::layer::{LayerId, LayerKind, LayerStore};
use strata_core::region::Region;

fn region_summary(region: &Region) -> String {
    if region.is_empty() {
        return "empty".to_owned();
    }
    let b = region.bounds();
    format!(
        "[{},{} {}x{}] ({} rects)",
        b.x0,
        b.y0,
        b.width(),
        b.height(),
        region.rects().len()
    )
}

fn dump_layer(
    store: &LayerStore,
    id: LayerId,
    depth: usize,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    let common = store.common(id);
    let indent = "  ".repeat(depth);
    write!(
        out,
        "{indent}{} {:?} visible={} opacity={}",
        store.kind(id).name(),
        id,
        region_summary(&common.visible),
        common.opacity,
    )?;
    match store.kind(id) {
        LayerKind::Painted(state) => {
            write!(out, " valid={}", region_summary(&state.valid))?;
            if let Some(buffer) = &state.buffer {
                write!(out, " buffer={}x{}", buffer.width(), buffer.height())?;
            }
        }
        LayerKind::Color(color) => {
            write!(
                out,
                " color=({}, {}, {}, {})",
                color.r, color.g, color.b, color.a
            )?;
        }
        _ => {}
    }
    writeln!(out)?;
    for child in store.children(id) {
        dump_layer(store, child, depth + 1, out)?;
    }
    Ok(())
}

/// Writes an indented dump of the subtree rooted at `root`.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn dump_tree(store: &LayerStore, root: LayerId, out: &mut dyn Write) -> std::io::Result<()> {
    dump_layer(store, root, 0, out)
}

/// Renders the subtree rooted at `root` as a string.
#[must_use]
pub fn tree_to_string(store: &LayerStore, root: LayerId) -> String {
    let mut buf = Vec::new();
    dump_tree(store, root, &mut buf).expect("writing to a Vec cannot fail");
    String::from_utf8(buf).expect("dump output is UTF-8")
}
