//! Packet type, header layout and codec errors.

use bytes::Bytes;
use thiserror::Error;

/// Width of the little-endian length field.
pub const LENGTH_FIELD_SIZE: usize = 2;

/// Length field plus the type id byte.
pub const HEADER_SIZE: usize = LENGTH_FIELD_SIZE + 1;

/// Offset of the type id byte.
pub const TYPE_OFFSET: usize = LENGTH_FIELD_SIZE;

/// Errors raised while encoding or decoding packet fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A read needed more bytes than the payload has left.
    #[error("Unexpected end of packet: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// Input is too short to hold the length and type header.
    #[error("Packet truncated: {0} bytes is shorter than the 3 byte header")]
    Truncated(usize),

    /// A header declared a length too short to hold the type byte.
    #[error("Malformed packet header: declared length {0} is shorter than the 3 byte header")]
    MalformedHeader(usize),

    /// Strings carry a 1-byte length prefix.
    #[error("String of {0} bytes exceeds the 255 byte limit")]
    StringTooLong(usize),

    /// The encoded packet does not fit the 2-byte length field.
    #[error("Packet of {0} bytes exceeds the 65535 byte limit")]
    PacketTooLarge(usize),

    /// Hex text input could not be decoded.
    #[error("Invalid hex input: {0}")]
    InvalidHex(String),
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    type_id: u8,
    data: Bytes,
}

impl Packet {
    /// Wrap a complete encoded packet. The caller guarantees the header is present.
    pub(crate) fn from_encoded(data: Bytes) -> Self {
        let type_id = data.get(TYPE_OFFSET).copied().unwrap_or(0);
        Self { type_id, data }
    }

    /// Parse a complete encoded packet, checking the header against the byte count.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self, CodecError> {
        let data = data.into();
        if data.len() < HEADER_SIZE {
            return Err(CodecError::Truncated(data.len()));
        }
        let declared = read_length(&data) as usize;
        if declared != data.len() {
            return Err(CodecError::UnexpectedEof {
                needed: declared,
                remaining: data.len(),
            });
        }
        Ok(Self::from_encoded(data))
    }

    /// Packet type id.
    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    /// Total encoded length, header included.
    pub fn total_length(&self) -> usize {
        self.data.len()
    }

    /// Bytes after the type id.
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE..]
    }

    /// Complete encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into the encoded bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Hex rendering for logs.
    pub fn to_hex(&self) -> String {
        to_hex(&self.data)
    }
}

/// Read the little-endian length field at the start of `buf`.
///
/// `buf` must hold at least [`LENGTH_FIELD_SIZE`] bytes.
pub(crate) fn read_length(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

/// Lowercase hex, two characters per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Decode hex text (two characters per byte, either case).
pub fn from_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    if text.len() % 2 != 0 {
        return Err(CodecError::InvalidHex(format!(
            "odd number of digits ({})",
            text.len()
        )));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CodecError::InvalidHex(format!("bad digit pair at offset {}", i)))
        })
        .collect()
}
