// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary encoding of transaction updates and replies.
//!
//! Each record is a tag byte followed by fixed-size little-endian fields;
//! pixel payloads are length-prefixed. The update header carries
//! [`PROTOCOL_VERSION`] and the edit count, so a version skew or unknown
//! tag is detected at decode time as a [`ProtocolError`] — which receivers
//! treat as fatal, never recoverable.

use kurbo::Rect;

use strata_core::color::Color;
use strata_core::layer::SamplingFilter;
use strata_core::region::Region;
use strata_core::surface::{BufferRotation, PixelSurface, SurfaceFormat};
use strata_core::transform::Transform3d;

use crate::edit::{
    Edit, EditReply, KindAttrs, LayerAttrs, PROTOCOL_VERSION, TransactionReplies,
    TransactionUpdate,
};
use crate::error::ProtocolError;
use crate::handle::ShadowHandle;

// ---------------------------------------------------------------------------
// Record discriminants
// ---------------------------------------------------------------------------

const TAG_CREATE_CONTAINER: u8 = 1;
const TAG_CREATE_PAINTED: u8 = 2;
const TAG_CREATE_COLOR: u8 = 3;
const TAG_CREATE_CANVAS: u8 = 4;
const TAG_CREATE_IMAGE: u8 = 5;
const TAG_SET_ROOT: u8 = 6;
const TAG_INSERT_AFTER: u8 = 7;
const TAG_REMOVE_CHILD: u8 = 8;
const TAG_SET_ATTRIBUTES: u8 = 9;
const TAG_PAINT_PAINTED_BUFFER: u8 = 10;
const TAG_PAINT_CANVAS: u8 = 11;
const TAG_PAINT_IMAGE: u8 = 12;

const TAG_BUFFER_SWAPPED: u8 = 128;

const KIND_CONTAINER: u8 = 0;
const KIND_PAINTED: u8 = 1;
const KIND_COLOR: u8 = 2;
const KIND_CANVAS: u8 = 3;
const KIND_IMAGE: u8 = 4;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_handle(&mut self, h: ShadowHandle) {
        self.write_u64(h.raw());
    }

    fn write_option_handle(&mut self, h: Option<ShadowHandle>) {
        // Handles are non-zero, so zero encodes None.
        self.write_u64(h.map_or(0, ShadowHandle::raw));
    }

    fn write_rect(&mut self, r: Rect) {
        self.write_f64(r.x0);
        self.write_f64(r.y0);
        self.write_f64(r.x1);
        self.write_f64(r.y1);
    }

    fn write_option_rect(&mut self, r: Option<Rect>) {
        match r {
            Some(r) => {
                self.write_u8(1);
                self.write_rect(r);
            }
            None => self.write_u8(0),
        }
    }

    fn write_region(&mut self, region: &Region) {
        #[expect(clippy::cast_possible_truncation, reason = "rect counts fit u32")]
        self.write_u32(region.rects().len() as u32);
        for r in region.rects() {
            self.write_rect(*r);
        }
    }

    fn write_transform(&mut self, t: &Transform3d) {
        for col in t.to_cols_array_2d() {
            for v in col {
                self.write_f64(v);
            }
        }
    }

    fn write_filter(&mut self, f: SamplingFilter) {
        self.write_u8(match f {
            SamplingFilter::Linear => 0,
            SamplingFilter::Nearest => 1,
        });
    }

    fn write_surface(&mut self, s: &PixelSurface) {
        self.write_u32(s.width());
        self.write_u32(s.height());
        self.write_u8(match s.format() {
            SurfaceFormat::Rgba8888 => 0,
            SurfaceFormat::Bgra8888 => 1,
        });
        self.write_u64(s.bytes().len() as u64);
        self.buf.extend_from_slice(s.bytes());
    }

    fn write_attrs(&mut self, attrs: &LayerAttrs) {
        self.write_region(&attrs.visible);
        self.write_option_rect(attrs.clip);
        self.write_f32(attrs.opacity);
        self.write_transform(&attrs.transform);
        self.write_u8(u8::from(attrs.opaque_content));
        match &attrs.kind {
            KindAttrs::Container => self.write_u8(KIND_CONTAINER),
            KindAttrs::Painted { valid } => {
                self.write_u8(KIND_PAINTED);
                self.write_region(valid);
            }
            KindAttrs::Color(color) => {
                self.write_u8(KIND_COLOR);
                self.write_f32(color.r);
                self.write_f32(color.g);
                self.write_f32(color.b);
                self.write_f32(color.a);
            }
            KindAttrs::Canvas(filter) => {
                self.write_u8(KIND_CANVAS);
                self.write_filter(*filter);
            }
            KindAttrs::Image(filter) => {
                self.write_u8(KIND_IMAGE);
                self.write_filter(*filter);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ProtocolError> {
        if self.data.len() - self.pos < n {
            return Err(ProtocolError::Truncated(what));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, ProtocolError> {
        let s = self.take(4, what)?;
        Ok(u32::from_le_bytes(s.try_into().expect("sized slice")))
    }

    fn read_u64(&mut self, what: &'static str) -> Result<u64, ProtocolError> {
        let s = self.take(8, what)?;
        Ok(u64::from_le_bytes(s.try_into().expect("sized slice")))
    }

    fn read_f32(&mut self, what: &'static str) -> Result<f32, ProtocolError> {
        let s = self.take(4, what)?;
        Ok(f32::from_le_bytes(s.try_into().expect("sized slice")))
    }

    fn read_f64(&mut self, what: &'static str) -> Result<f64, ProtocolError> {
        let s = self.take(8, what)?;
        Ok(f64::from_le_bytes(s.try_into().expect("sized slice")))
    }

    fn read_handle(&mut self) -> Result<ShadowHandle, ProtocolError> {
        let raw = self.read_u64("handle")?;
        if raw == 0 {
            return Err(ProtocolError::Malformed("zero handle"));
        }
        Ok(ShadowHandle::new(raw))
    }

    fn read_option_handle(&mut self) -> Result<Option<ShadowHandle>, ProtocolError> {
        let raw = self.read_u64("handle")?;
        Ok((raw != 0).then(|| ShadowHandle::new(raw)))
    }

    fn read_rect(&mut self) -> Result<Rect, ProtocolError> {
        Ok(Rect::new(
            self.read_f64("rect")?,
            self.read_f64("rect")?,
            self.read_f64("rect")?,
            self.read_f64("rect")?,
        ))
    }

    fn read_option_rect(&mut self) -> Result<Option<Rect>, ProtocolError> {
        match self.read_u8("clip flag")? {
            0 => Ok(None),
            1 => Ok(Some(self.read_rect()?)),
            _ => Err(ProtocolError::Malformed("clip flag")),
        }
    }

    fn read_region(&mut self) -> Result<Region, ProtocolError> {
        let count = self.read_u32("region count")?;
        let mut region = Region::new();
        for _ in 0..count {
            region.union_rect(self.read_rect()?);
        }
        Ok(region)
    }

    fn read_transform(&mut self) -> Result<Transform3d, ProtocolError> {
        let mut cols = [[0.0; 4]; 4];
        for col in &mut cols {
            for v in col.iter_mut() {
                *v = self.read_f64("transform")?;
            }
        }
        Ok(Transform3d::from_cols_array_2d(cols))
    }

    fn read_filter(&mut self) -> Result<SamplingFilter, ProtocolError> {
        match self.read_u8("sampling filter")? {
            0 => Ok(SamplingFilter::Linear),
            1 => Ok(SamplingFilter::Nearest),
            _ => Err(ProtocolError::Malformed("sampling filter")),
        }
    }

    fn read_surface(&mut self) -> Result<PixelSurface, ProtocolError> {
        let width = self.read_u32("surface width")?;
        let height = self.read_u32("surface height")?;
        let format = match self.read_u8("surface format")? {
            0 => SurfaceFormat::Rgba8888,
            1 => SurfaceFormat::Bgra8888,
            _ => return Err(ProtocolError::Malformed("surface format")),
        };
        let len = usize::try_from(self.read_u64("surface length")?)
            .map_err(|_| ProtocolError::Malformed("surface length"))?;
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if len != expected {
            return Err(ProtocolError::Malformed("surface length"));
        }
        let bytes = self.take(len, "surface bytes")?.to_vec();
        Ok(PixelSurface::from_bytes(width, height, format, bytes))
    }

    fn read_rotation(&mut self) -> Result<BufferRotation, ProtocolError> {
        Ok(BufferRotation {
            x: self.read_u32("rotation")?,
            y: self.read_u32("rotation")?,
        })
    }

    fn read_attrs(&mut self) -> Result<LayerAttrs, ProtocolError> {
        let visible = self.read_region()?;
        let clip = self.read_option_rect()?;
        let opacity = self.read_f32("opacity")?;
        let transform = self.read_transform()?;
        let opaque_content = match self.read_u8("opaque flag")? {
            0 => false,
            1 => true,
            _ => return Err(ProtocolError::Malformed("opaque flag")),
        };
        let kind = match self.read_u8("kind attrs")? {
            KIND_CONTAINER => KindAttrs::Container,
            KIND_PAINTED => KindAttrs::Painted {
                valid: self.read_region()?,
            },
            KIND_COLOR => KindAttrs::Color(Color::rgba(
                self.read_f32("color")?,
                self.read_f32("color")?,
                self.read_f32("color")?,
                self.read_f32("color")?,
            )),
            KIND_CANVAS => KindAttrs::Canvas(self.read_filter()?),
            KIND_IMAGE => KindAttrs::Image(self.read_filter()?),
            _ => return Err(ProtocolError::Malformed("kind attrs")),
        };
        Ok(LayerAttrs {
            visible,
            clip,
            opacity,
            transform,
            opaque_content,
            kind,
        })
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Encodes a transaction update into wire bytes.
#[must_use]
pub fn encode_update(update: &TransactionUpdate) -> Vec<u8> {
    let mut w = Writer::default();
    w.write_u32(update.version);
    #[expect(clippy::cast_possible_truncation, reason = "edit counts fit u32")]
    w.write_u32(update.edits.len() as u32);
    for edit in &update.edits {
        match edit {
            Edit::CreateContainer(h) => {
                w.write_u8(TAG_CREATE_CONTAINER);
                w.write_handle(*h);
            }
            Edit::CreatePainted(h) => {
                w.write_u8(TAG_CREATE_PAINTED);
                w.write_handle(*h);
            }
            Edit::CreateColor(h) => {
                w.write_u8(TAG_CREATE_COLOR);
                w.write_handle(*h);
            }
            Edit::CreateCanvas(h) => {
                w.write_u8(TAG_CREATE_CANVAS);
                w.write_handle(*h);
            }
            Edit::CreateImage(h) => {
                w.write_u8(TAG_CREATE_IMAGE);
                w.write_handle(*h);
            }
            Edit::SetRoot(h) => {
                w.write_u8(TAG_SET_ROOT);
                w.write_handle(*h);
            }
            Edit::InsertAfter {
                container,
                child,
                after,
            } => {
                w.write_u8(TAG_INSERT_AFTER);
                w.write_handle(*container);
                w.write_handle(*child);
                w.write_option_handle(*after);
            }
            Edit::RemoveChild { container, child } => {
                w.write_u8(TAG_REMOVE_CHILD);
                w.write_handle(*container);
                w.write_handle(*child);
            }
            Edit::SetAttributes { layer, attrs } => {
                w.write_u8(TAG_SET_ATTRIBUTES);
                w.write_handle(*layer);
                w.write_attrs(attrs);
            }
            Edit::PaintPaintedBuffer {
                layer,
                surface,
                rect,
                rotation,
            } => {
                w.write_u8(TAG_PAINT_PAINTED_BUFFER);
                w.write_handle(*layer);
                w.write_rect(*rect);
                w.write_u32(rotation.x);
                w.write_u32(rotation.y);
                w.write_surface(surface);
            }
            Edit::PaintCanvas { layer, surface } => {
                w.write_u8(TAG_PAINT_CANVAS);
                w.write_handle(*layer);
                w.write_surface(surface);
            }
            Edit::PaintImage { layer, surface } => {
                w.write_u8(TAG_PAINT_IMAGE);
                w.write_handle(*layer);
                w.write_surface(surface);
            }
        }
    }
    w.buf
}

/// Decodes a transaction update from wire bytes.
///
/// # Errors
///
/// Returns a [`ProtocolError`] on version skew, unknown tags, truncation, or
/// malformed fields. Receivers treat all of these as fatal.
pub fn decode_update(bytes: &[u8]) -> Result<TransactionUpdate, ProtocolError> {
    let mut r = Reader::new(bytes);
    let version = r.read_u32("version")?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: version,
        });
    }
    let count = r.read_u32("edit count")?;
    let mut edits = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let tag = r.read_u8("edit tag")?;
        let edit = match tag {
            TAG_CREATE_CONTAINER => Edit::CreateContainer(r.read_handle()?),
            TAG_CREATE_PAINTED => Edit::CreatePainted(r.read_handle()?),
            TAG_CREATE_COLOR => Edit::CreateColor(r.read_handle()?),
            TAG_CREATE_CANVAS => Edit::CreateCanvas(r.read_handle()?),
            TAG_CREATE_IMAGE => Edit::CreateImage(r.read_handle()?),
            TAG_SET_ROOT => Edit::SetRoot(r.read_handle()?),
            TAG_INSERT_AFTER => Edit::InsertAfter {
                container: r.read_handle()?,
                child: r.read_handle()?,
                after: r.read_option_handle()?,
            },
            TAG_REMOVE_CHILD => Edit::RemoveChild {
                container: r.read_handle()?,
                child: r.read_handle()?,
            },
            TAG_SET_ATTRIBUTES => Edit::SetAttributes {
                layer: r.read_handle()?,
                attrs: r.read_attrs()?,
            },
            TAG_PAINT_PAINTED_BUFFER => {
                let layer = r.read_handle()?;
                let rect = r.read_rect()?;
                let rotation = r.read_rotation()?;
                let surface = r.read_surface()?;
                Edit::PaintPaintedBuffer {
                    layer,
                    surface,
                    rect,
                    rotation,
                }
            }
            TAG_PAINT_CANVAS => Edit::PaintCanvas {
                layer: r.read_handle()?,
                surface: r.read_surface()?,
            },
            TAG_PAINT_IMAGE => Edit::PaintImage {
                layer: r.read_handle()?,
                surface: r.read_surface()?,
            },
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        edits.push(edit);
    }
    if !r.is_done() {
        return Err(ProtocolError::TrailingBytes);
    }
    Ok(TransactionUpdate { version, edits })
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Encodes a reply batch into wire bytes.
#[must_use]
pub fn encode_replies(replies: &TransactionReplies) -> Vec<u8> {
    let mut w = Writer::default();
    #[expect(clippy::cast_possible_truncation, reason = "reply counts fit u32")]
    w.write_u32(replies.replies.len() as u32);
    for reply in &replies.replies {
        match reply {
            EditReply::BufferSwapped { layer, back_buffer } => {
                w.write_u8(TAG_BUFFER_SWAPPED);
                w.write_handle(*layer);
                w.write_surface(back_buffer);
            }
        }
    }
    w.buf
}

/// Decodes a reply batch from wire bytes.
///
/// # Errors
///
/// Returns a [`ProtocolError`] on unknown tags, truncation, or malformed
/// fields.
pub fn decode_replies(bytes: &[u8]) -> Result<TransactionReplies, ProtocolError> {
    let mut r = Reader::new(bytes);
    let count = r.read_u32("reply count")?;
    let mut replies = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        match r.read_u8("reply tag")? {
            TAG_BUFFER_SWAPPED => replies.push(EditReply::BufferSwapped {
                layer: r.read_handle()?,
                back_buffer: r.read_surface()?,
            }),
            other => return Err(ProtocolError::UnknownTag(other)),
        }
    }
    if !r.is_done() {
        return Err(ProtocolError::TrailingBytes);
    }
    Ok(TransactionReplies { replies })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_survives_the_wire() {
        let h = ShadowHandle::new(1);
        let child = ShadowHandle::new(2);
        let update = TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits: vec![
                Edit::CreateContainer(h),
                Edit::CreatePainted(child),
                Edit::SetRoot(h),
                Edit::InsertAfter {
                    container: h,
                    child,
                    after: None,
                },
                Edit::SetAttributes {
                    layer: child,
                    attrs: LayerAttrs {
                        visible: Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
                        clip: Some(Rect::new(0.0, 0.0, 50.0, 50.0)),
                        opacity: 0.75,
                        transform: Transform3d::from_translation(3.0, 4.0),
                        opaque_content: true,
                        kind: KindAttrs::Painted {
                            valid: Region::new(),
                        },
                    },
                },
            ],
        };

        let decoded = decode_update(&encode_update(&update)).unwrap();
        assert_eq!(decoded.edits.len(), 5);
        match &decoded.edits[4] {
            Edit::SetAttributes { layer, attrs } => {
                assert_eq!(*layer, child);
                assert_eq!(attrs.opacity, 0.75);
                assert!(attrs.opaque_content);
                assert_eq!(attrs.clip, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
                assert_eq!(
                    attrs.visible,
                    Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0))
                );
                assert_eq!(attrs.transform, Transform3d::from_translation(3.0, 4.0));
            }
            other => panic!("wrong edit: {other:?}"),
        }
        match &decoded.edits[3] {
            Edit::InsertAfter { after, .. } => assert!(after.is_none()),
            other => panic!("wrong edit: {other:?}"),
        }
    }

    #[test]
    fn paint_edit_carries_pixels() {
        let mut surface = PixelSurface::new(2, 2, SurfaceFormat::Rgba8888);
        surface.bytes_mut()[0] = 0xCC;
        let update = TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits: vec![Edit::PaintPaintedBuffer {
                layer: ShadowHandle::new(9),
                surface,
                rect: Rect::new(0.0, 0.0, 2.0, 2.0),
                rotation: BufferRotation { x: 1, y: 0 },
            }],
        };
        let decoded = decode_update(&encode_update(&update)).unwrap();
        match &decoded.edits[0] {
            Edit::PaintPaintedBuffer {
                surface, rotation, ..
            } => {
                assert_eq!(surface.bytes()[0], 0xCC);
                assert_eq!(*rotation, BufferRotation { x: 1, y: 0 });
            }
            other => panic!("wrong edit: {other:?}"),
        }
    }

    #[test]
    fn version_mismatch_is_detected() {
        let update = TransactionUpdate {
            version: PROTOCOL_VERSION + 1,
            edits: vec![],
        };
        let err = decode_update(&encode_update(&update)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: PROTOCOL_VERSION + 1,
            }
        );
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let mut bytes = encode_update(&TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits: vec![Edit::SetRoot(ShadowHandle::new(1))],
        });
        // Corrupt the tag byte (version u32 + count u32 precede it).
        bytes[8] = 0xEE;
        assert_eq!(
            decode_update(&bytes).unwrap_err(),
            ProtocolError::UnknownTag(0xEE)
        );
    }

    #[test]
    fn truncated_record_is_detected() {
        let bytes = encode_update(&TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits: vec![Edit::SetRoot(ShadowHandle::new(1))],
        });
        let err = decode_update(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated(_)), "got {err:?}");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_update(&TransactionUpdate {
            version: PROTOCOL_VERSION,
            edits: vec![],
        });
        bytes.push(0);
        assert_eq!(
            decode_update(&bytes).unwrap_err(),
            ProtocolError::TrailingBytes
        );
    }

    #[test]
    fn replies_survive_the_wire() {
        let replies = TransactionReplies {
            replies: vec![EditReply::BufferSwapped {
                layer: ShadowHandle::new(4),
                back_buffer: PixelSurface::new(8, 8, SurfaceFormat::Rgba8888),
            }],
        };
        let decoded = decode_replies(&encode_replies(&replies)).unwrap();
        assert_eq!(decoded.replies.len(), 1);
        let EditReply::BufferSwapped { layer, back_buffer } = &decoded.replies[0];
        assert_eq!(*layer, ShadowHandle::new(4));
        assert_eq!(back_buffer.width(), 8);
    }
}
