//! Incremental packet encoder.
//!
//! # Responsibilities
//! - Append typed fields in wire order
//! - Keep the length header current after every append
//! - Produce the finished [`Packet`]
//!
//! # Design Decisions
//! - The header is rewritten after each operation, so `data()` is a readable
//!   packet at every point of construction
//! - Negative (and oversized) `int32` values clamp to `u32::MAX` instead of wrapping;
//!   deployed backends depend on this encoding

use bytes::Bytes;

use crate::protocol::packet::{from_hex, to_hex, CodecError, Packet, LENGTH_FIELD_SIZE, TYPE_OFFSET};

/// Builds one outgoing packet.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// An empty packet: only the length field, holding zero.
    pub fn new() -> Self {
        Self {
            buf: vec![0; LENGTH_FIELD_SIZE],
        }
    }

    /// Start a packet with the given type id.
    pub fn with_type(type_id: u8) -> Self {
        let mut writer = Self::new();
        writer.set_type(type_id);
        writer
    }

    /// Overwrite the type id byte.
    pub fn set_type(&mut self, type_id: u8) -> &mut Self {
        if self.buf.len() > TYPE_OFFSET {
            self.buf[TYPE_OFFSET] = type_id;
        } else {
            self.buf.push(type_id);
        }
        self.update_length()
    }

    /// Append a 1-byte length prefix followed by the string's UTF-8 bytes.
    pub fn pack_string(&mut self, s: &str) -> Result<&mut Self, CodecError> {
        let bytes = s.as_bytes();
        let len = u8::try_from(bytes.len()).map_err(|_| CodecError::StringTooLong(bytes.len()))?;
        self.buf.push(len);
        self.buf.extend_from_slice(bytes);
        Ok(self.update_length())
    }

    /// Append already-encoded bytes verbatim.
    pub fn pack_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self.update_length()
    }

    /// Append already-encoded bytes given as hex text.
    pub fn pack_hex(&mut self, hex: &str) -> Result<&mut Self, CodecError> {
        let bytes = from_hex(hex)?;
        Ok(self.pack_bytes(&bytes))
    }

    pub fn pack_byte(&mut self, b: u8) -> &mut Self {
        self.buf.push(b);
        self.update_length()
    }

    pub fn pack_int16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.update_length()
    }

    /// Append 4 bytes little-endian. Values outside `0..=u32::MAX` encode as `u32::MAX`.
    pub fn pack_int32(&mut self, v: i64) -> &mut Self {
        let v = u32::try_from(v).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&v.to_le_bytes());
        self.update_length()
    }

    /// Append an IEEE-754 single, little-endian.
    pub fn pack_single(&mut self, f: f32) -> &mut Self {
        self.buf.extend_from_slice(&f.to_le_bytes());
        self.update_length()
    }

    pub fn pack_color(&mut self, r: u8, g: u8, b: u8) -> &mut Self {
        self.pack_byte(r).pack_byte(g).pack_byte(b)
    }

    /// Current encoded bytes, header included.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Hex rendering of the current bytes.
    pub fn to_hex(&self) -> String {
        to_hex(&self.buf)
    }

    /// Finish the packet.
    pub fn finish(&self) -> Result<Packet, CodecError> {
        if self.buf.len() > u16::MAX as usize {
            return Err(CodecError::PacketTooLarge(self.buf.len()));
        }
        Packet::parse(Bytes::copy_from_slice(&self.buf))
    }

    fn update_length(&mut self) -> &mut Self {
        let len = u16::try_from(self.buf.len()).unwrap_or(u16::MAX);
        self.buf[..LENGTH_FIELD_SIZE].copy_from_slice(&len.to_le_bytes());
        self
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}
