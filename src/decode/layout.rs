//! Per-manifest decode table for fixed-stride point records
//!
//! Built once per manifest: every schema attribute gets its byte offset, a
//! reader chosen by (kind, size, endianness), the output channel it feeds and
//! the scale/offset applied to it.

use crate::dataset::manifest::{AttributeDescriptor, Endianness, Manifest, NumericKind};

/// Reads one raw value from the start of a slice
pub type ReadFn = fn(&[u8]) -> f64;

macro_rules! field_readers {
    ($($le:ident, $be:ident: $ty:ty, $n:expr;)*) => {
        $(
            fn $le(bytes: &[u8]) -> f64 {
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&bytes[..$n]);
                <$ty>::from_le_bytes(raw) as f64
            }

            fn $be(bytes: &[u8]) -> f64 {
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&bytes[..$n]);
                <$ty>::from_be_bytes(raw) as f64
            }
        )*
    };
}

field_readers! {
    read_i8_le, read_i8_be: i8, 1;
    read_i16_le, read_i16_be: i16, 2;
    read_i32_le, read_i32_be: i32, 4;
    read_i64_le, read_i64_be: i64, 8;
    read_u8_le, read_u8_be: u8, 1;
    read_u16_le, read_u16_be: u16, 2;
    read_u32_le, read_u32_be: u32, 4;
    read_u64_le, read_u64_be: u64, 8;
    read_f32_le, read_f32_be: f32, 4;
    read_f64_le, read_f64_be: f64, 8;
}

/// Reader for a (kind, size) pair, or `None` when the pair has no numeric
/// interpretation (e.g. a 2-byte float)
pub fn reader_for(kind: NumericKind, size: usize, endianness: Endianness) -> Option<ReadFn> {
    let little = endianness == Endianness::Little;
    let pick = |le: ReadFn, be: ReadFn| Some(if little { le } else { be });
    match (kind, size) {
        (NumericKind::Signed | NumericKind::Scaled, 1) => pick(read_i8_le, read_i8_be),
        (NumericKind::Signed | NumericKind::Scaled, 2) => pick(read_i16_le, read_i16_be),
        (NumericKind::Signed | NumericKind::Scaled, 4) => pick(read_i32_le, read_i32_be),
        (NumericKind::Signed | NumericKind::Scaled, 8) => pick(read_i64_le, read_i64_be),
        (NumericKind::Unsigned, 1) => pick(read_u8_le, read_u8_be),
        (NumericKind::Unsigned, 2) => pick(read_u16_le, read_u16_be),
        (NumericKind::Unsigned, 4) => pick(read_u32_le, read_u32_be),
        (NumericKind::Unsigned, 8) => pick(read_u64_le, read_u64_be),
        (NumericKind::Float, 4) => pick(read_f32_le, read_f32_be),
        (NumericKind::Float, 8) => pick(read_f64_le, read_f64_be),
        _ => None,
    }
}

/// Output channel an attribute feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Position axis 0-2
    Position(usize),
    /// Color component 0-2
    Color(usize),
    Intensity,
    Classification,
}

impl Channel {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x" => Some(Channel::Position(0)),
            "y" => Some(Channel::Position(1)),
            "z" => Some(Channel::Position(2)),
            "red" => Some(Channel::Color(0)),
            "green" => Some(Channel::Color(1)),
            "blue" => Some(Channel::Color(2)),
            "intensity" => Some(Channel::Intensity),
            "classification" => Some(Channel::Classification),
            _ => None,
        }
    }
}

/// Decode instructions for one attribute
#[derive(Clone, Copy, Debug)]
pub struct FieldDecoder {
    pub offset: usize,
    pub size: usize,
    pub channel: Channel,
    pub read: ReadFn,
    pub scale: f64,
    pub shift: f64,
}

/// Decode table for one manifest
#[derive(Clone, Debug)]
pub struct RecordLayout {
    pub stride: usize,
    pub fields: Vec<FieldDecoder>,
}

impl RecordLayout {
    pub fn new(manifest: &Manifest) -> Self {
        let mut fields = Vec::new();
        let mut offset = 0;
        for attr in &manifest.schema {
            if let Some(field) = Self::field(manifest, attr, offset) {
                fields.push(field);
            }
            offset += attr.size;
        }
        Self { stride: offset, fields }
    }

    fn field(manifest: &Manifest, attr: &AttributeDescriptor, offset: usize) -> Option<FieldDecoder> {
        let channel = Channel::from_name(&attr.name)?;
        let read = match reader_for(attr.kind, attr.size, manifest.endianness) {
            Some(read) => read,
            None => {
                log::debug!(
                    "Attribute {} ({:?}, {} bytes) has no reader, skipping",
                    attr.name,
                    attr.kind,
                    attr.size
                );
                return None;
            }
        };
        let (scale, shift) = match channel {
            Channel::Position(axis) => (
                manifest.scale.map(|s| s[axis]).or(attr.scale).unwrap_or(1.0),
                manifest.offset.map(|o| o[axis]).or(attr.offset).unwrap_or(0.0),
            ),
            _ => (1.0, 0.0),
        };
        Some(FieldDecoder { offset, size: attr.size, channel, read, scale, shift })
    }
}
