// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON export of encoded transaction updates.
//!
//! [`export`] decodes wire bytes and writes one JSON object per edit,
//! suitable for offline diffing of captured transactions. Pixel payloads
//! are summarized (dimensions, format, byte count), not dumped.

use std::io::{self, Write};

use kurbo::Rect;
use serde_json::{Value, json};

use strata_core::region::Region;
use strata_protocol::edit::{Edit, KindAttrs, LayerAttrs, TransactionUpdate};
use strata_protocol::error::ProtocolError;
use strata_protocol::wire::decode_update;

fn rect_json(rect: &Rect) -> Value {
    json!([rect.x0, rect.y0, rect.x1, rect.y1])
}

fn region_json(region: &Region) -> Value {
    Value::Array(region.rects().iter().map(rect_json).collect())
}

fn kind_json(kind: &KindAttrs) -> Value {
    match kind {
        KindAttrs::Container => json!({ "kind": "container" }),
        KindAttrs::Painted { valid } => json!({
            "kind": "painted",
            "valid": region_json(valid),
        }),
        KindAttrs::Color(c) => json!({
            "kind": "color",
            "color": [c.r, c.g, c.b, c.a],
        }),
        KindAttrs::Canvas(filter) => json!({
            "kind": "canvas",
            "filter": format!("{filter:?}"),
        }),
        KindAttrs::Image(filter) => json!({
            "kind": "image",
            "filter": format!("{filter:?}"),
        }),
    }
}

fn attrs_json(attrs: &LayerAttrs) -> Value {
    json!({
        "visible": region_json(&attrs.visible),
        "clip": attrs.clip.as_ref().map(rect_json),
        "opacity": attrs.opacity,
        "transform": attrs.transform.to_cols_array_2d(),
        "opaque_content": attrs.opaque_content,
        "kind": kind_json(&attrs.kind),
    })
}

fn edit_json(edit: &Edit) -> Value {
    let mut value = match edit {
        Edit::CreateContainer(h)
        | Edit::CreatePainted(h)
        | Edit::CreateColor(h)
        | Edit::CreateCanvas(h)
        | Edit::CreateImage(h)
        | Edit::SetRoot(h) => json!({ "layer": h.raw() }),
        Edit::InsertAfter {
            container,
            child,
            after,
        } => json!({
            "container": container.raw(),
            "child": child.raw(),
            "after": after.map(|h| h.raw()),
        }),
        Edit::RemoveChild { container, child } => json!({
            "container": container.raw(),
            "child": child.raw(),
        }),
        Edit::SetAttributes { layer, attrs } => json!({
            "layer": layer.raw(),
            "attrs": attrs_json(attrs),
        }),
        Edit::PaintPaintedBuffer {
            layer,
            surface,
            rect,
            rotation,
        } => json!({
            "layer": layer.raw(),
            "surface": {
                "width": surface.width(),
                "height": surface.height(),
                "format": format!("{:?}", surface.format()),
                "bytes": surface.bytes().len(),
            },
            "rect": rect_json(rect),
            "rotation": [rotation.x, rotation.y],
        }),
        Edit::PaintCanvas { layer, surface } | Edit::PaintImage { layer, surface } => json!({
            "layer": layer.raw(),
            "surface": {
                "width": surface.width(),
                "height": surface.height(),
                "format": format!("{:?}", surface.format()),
                "bytes": surface.bytes().len(),
            },
        }),
    };
    value["edit"] = Value::from(edit.name());
    value
}

/// Converts a decoded update to a JSON value.
#[must_use]
pub fn update_to_json(update: &TransactionUpdate) -> Value {
    json!({
        "version": update.version,
        "edits": update.edits.iter().map(edit_json).collect::<Vec<_>>(),
    })
}

/// Decodes `bytes` and writes the transaction as pretty-printed JSON.
///
/// # Errors
///
/// Returns the decode error for malformed input, or an I/O error from the
/// writer.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let update = decode_update(bytes).map_err(|err: ProtocolError| {
        io::Error::new(io::ErrorKind::InvalidData, err.to_string())
    })?;
    serde_json::to_writer_pretty(&mut *writer, &update_to_json(&update))?;
    writeln!(writer)
}
