//! Cursor-based packet decoder.

use crate::protocol::packet::{CodecError, Packet, HEADER_SIZE, TYPE_OFFSET};

/// Reads typed fields from one complete packet, front to back.
///
/// The cursor only advances on a successful read.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    type_id: u8,
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Skip the length field, record the type id and position the cursor at the payload.
    pub fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_SIZE {
            return Err(CodecError::Truncated(data.len()));
        }
        Ok(Self {
            type_id: data[TYPE_OFFSET],
            payload: &data[HEADER_SIZE..],
            pos: 0,
        })
    }

    pub fn from_packet(packet: &'a Packet) -> Self {
        Self {
            type_id: packet.type_id(),
            payload: packet.payload(),
            pos: 0,
        }
    }

    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    /// Unread payload bytes.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    /// Signed byte, decoded the way deployed servers encode it: with bit 7 set the
    /// value is exactly -128, otherwise it is the value of the lower seven bits.
    /// This is not two's complement (0xFF reads as -128, not -1).
    pub fn read_sbyte(&mut self) -> Result<i8, CodecError> {
        let byte = self.read_byte()?;
        if byte & 0x80 != 0 {
            Ok(i8::MIN)
        } else {
            Ok((byte & 0x7f) as i8)
        }
    }

    pub fn read_int16(&mut self) -> Result<u16, CodecError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    pub fn read_int32(&mut self) -> Result<u32, CodecError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub fn read_single(&mut self) -> Result<f32, CodecError> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// 1-byte length prefix, then that many bytes of UTF-8 (invalid sequences replaced).
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.peek_byte()? as usize;
        if self.remaining() < 1 + len {
            return Err(CodecError::UnexpectedEof {
                needed: 1 + len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos + 1;
        let text = String::from_utf8_lossy(&self.payload[start..start + len]).into_owned();
        self.pos = start + len;
        Ok(text)
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(n)?;
        let out = &self.payload[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn peek_byte(&self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.payload[self.pos])
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.payload[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::writer::PacketWriter;
    use proptest::prelude::*;

    #[test]
    fn reads_back_every_field_type() {
        let mut w = PacketWriter::with_type(0x2a);
        w.pack_byte(200)
            .pack_int16(65_000)
            .pack_int32(3_000_000_000)
            .pack_single(-2.5)
            .pack_color(10, 20, 30);
        w.pack_string("player one").unwrap();
        let packet = w.finish().unwrap();

        let mut r = PacketReader::from_packet(&packet);
        assert_eq!(r.type_id(), 0x2a);
        assert_eq!(r.read_byte().unwrap(), 200);
        assert_eq!(r.read_int16().unwrap(), 65_000);
        assert_eq!(r.read_int32().unwrap(), 3_000_000_000);
        assert_eq!(r.read_single().unwrap(), -2.5);
        assert_eq!(r.read_bytes(3).unwrap(), &[10, 20, 30]);
        assert_eq!(r.read_string().unwrap(), "player one");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn sbyte_uses_literal_decoding() {
        let packet = PacketWriter::with_type(1)
            .pack_bytes(&[0x00, 0x05, 0x7f, 0x80, 0xff, 0x81])
            .finish()
            .unwrap();
        let mut r = PacketReader::from_packet(&packet);
        assert_eq!(r.read_sbyte().unwrap(), 0);
        assert_eq!(r.read_sbyte().unwrap(), 5);
        assert_eq!(r.read_sbyte().unwrap(), 127);
        assert_eq!(r.read_sbyte().unwrap(), -128);
        assert_eq!(r.read_sbyte().unwrap(), -128);
        assert_eq!(r.read_sbyte().unwrap(), -128);
    }

    #[test]
    fn clamped_int32_reads_as_max_unsigned() {
        let packet = PacketWriter::with_type(1).pack_int32(-7).finish().unwrap();
        let mut r = PacketReader::from_packet(&packet);
        assert_eq!(r.read_int32().unwrap(), 4_294_967_295);
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let packet = PacketWriter::with_type(1).pack_byte(9).finish().unwrap();
        let mut r = PacketReader::from_packet(&packet);
        assert_eq!(
            r.read_int16(),
            Err(CodecError::UnexpectedEof { needed: 2, remaining: 1 })
        );
        // cursor untouched by the failed read
        assert_eq!(r.read_byte().unwrap(), 9);
        assert!(r.read_byte().is_err());
    }

    #[test]
    fn truncated_string_is_an_error() {
        let packet = PacketWriter::with_type(1).pack_bytes(&[5, b'a', b'b']).finish().unwrap();
        let mut r = PacketReader::from_packet(&packet);
        assert_eq!(
            r.read_string(),
            Err(CodecError::UnexpectedEof { needed: 6, remaining: 3 })
        );
    }

    #[test]
    fn new_rejects_short_input() {
        assert_eq!(PacketReader::new(&[3, 0]).unwrap_err(), CodecError::Truncated(2));
        let r = PacketReader::new(&[3, 0, 0x44]).unwrap();
        assert_eq!(r.type_id(), 0x44);
        assert_eq!(r.remaining(), 0);
    }

    proptest! {
        #[test]
        fn mixed_fields_round_trip(
            type_id in any::<u8>(),
            b in any::<u8>(),
            s in any::<u16>(),
            i in 0i64..=u32::MAX as i64,
            f in -1.0e6f32..1.0e6,
            text in "[a-zA-Z0-9 ]{0,40}",
        ) {
            let mut w = PacketWriter::with_type(type_id);
            w.pack_byte(b).pack_int16(s).pack_int32(i).pack_single(f);
            w.pack_string(&text).unwrap();
            let packet = w.finish().unwrap();

            let mut r = PacketReader::from_packet(&packet);
            prop_assert_eq!(r.type_id(), type_id);
            prop_assert_eq!(r.read_byte().unwrap(), b);
            prop_assert_eq!(r.read_int16().unwrap(), s);
            prop_assert_eq!(r.read_int32().unwrap() as i64, i);
            prop_assert_eq!(r.read_single().unwrap(), f);
            prop_assert_eq!(r.read_string().unwrap(), text);
            prop_assert_eq!(r.remaining(), 0);
        }
    }
}
