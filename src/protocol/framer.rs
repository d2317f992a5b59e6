//! Stream framing: raw socket bytes → discrete packets.
//!
//! # Responsibilities
//! - Carry incomplete trailing bytes from one read to the next
//! - Split every complete packet out of the accumulated bytes
//! - Report malformed headers without failing the connection
//!
//! # Design Decisions
//! - One framer per connection; the pending buffer is never shared
//! - A zero length field ends framing for the buffer and drops what follows
//! - A nonzero length shorter than the header cannot be resolved; the bytes stay
//!   pending and the batch is flagged as malformed
//! - While a malformed header is held, further chunks are dropped, so pending never
//!   grows past one maximum-size packet

use bytes::{Bytes, BytesMut};

use crate::protocol::packet::{read_length, Packet, HEADER_SIZE, LENGTH_FIELD_SIZE};

/// Result of one [`PacketFramer::push`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FrameBatch {
    /// Complete packets in stream order.
    pub packets: Vec<Packet>,
    /// Bytes dropped after a zero length field, or received behind a malformed header.
    pub discarded: usize,
    /// Declared length of a header that cannot hold a packet.
    pub malformed: Option<usize>,
}

/// Per-connection framing state.
#[derive(Debug, Default)]
pub struct PacketFramer {
    pending: BytesMut,
}

impl PacketFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and extract every packet that is now complete.
    ///
    /// Never waits for more data; whatever cannot be framed yet stays pending.
    pub fn push(&mut self, chunk: &[u8]) -> FrameBatch {
        let mut batch = FrameBatch::default();

        if let Some(length) = self.held_malformed_length() {
            batch.discarded = chunk.len();
            batch.malformed = Some(length);
            return batch;
        }

        self.pending.extend_from_slice(chunk);
        while self.pending.len() >= LENGTH_FIELD_SIZE {
            let length = read_length(&self.pending) as usize;

            if length == 0 {
                batch.discarded = self.pending.len();
                self.pending.clear();
                break;
            }

            if length < HEADER_SIZE {
                tracing::warn!(
                    declared_length = length,
                    pending = self.pending.len(),
                    "Malformed packet header, holding bytes"
                );
                batch.malformed = Some(length);
                break;
            }

            if self.pending.len() < length {
                break;
            }

            let data = self.pending.split_to(length).freeze();
            batch.packets.push(Packet::from_encoded(data));
        }

        if batch.discarded > 0 {
            tracing::debug!(discarded = batch.discarded, "Zero length header, dropped remaining bytes");
        }

        batch
    }

    /// Bytes carried over to the next push.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop carried bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn held_malformed_length(&self) -> Option<usize> {
        if self.pending.len() < LENGTH_FIELD_SIZE {
            return None;
        }
        let length = read_length(&self.pending) as usize;
        (length != 0 && length < HEADER_SIZE).then_some(length)
    }
}

/// Frame a single buffer, returning the packets and the unconsumed tail.
pub fn frame_packets(buf: &[u8]) -> (Vec<Packet>, Bytes) {
    let mut framer = PacketFramer::new();
    let batch = framer.push(buf);
    (batch.packets, framer.pending.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::writer::PacketWriter;
    use proptest::prelude::*;

    fn encode(type_id: u8, payload: &[u8]) -> Vec<u8> {
        PacketWriter::with_type(type_id)
            .pack_bytes(payload)
            .finish()
            .unwrap()
            .into_bytes()
            .to_vec()
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (packets, pending) = frame_packets(&[]);
        assert!(packets.is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn several_packets_in_one_read() {
        let mut stream = encode(1, &[0xaa]);
        stream.extend(encode(2, &[]));
        stream.extend(encode(3, &[1, 2, 3, 4]));

        let (packets, pending) = frame_packets(&stream);
        let types: Vec<u8> = packets.iter().map(|p| p.type_id()).collect();
        assert_eq!(types, vec![1, 2, 3]);
        assert_eq!(packets[2].payload(), &[1, 2, 3, 4]);
        assert!(pending.is_empty());
    }

    #[test]
    fn packet_split_across_reads() {
        let stream = encode(7, b"hello world");
        let mut framer = PacketFramer::new();

        assert!(framer.push(&stream[..1]).packets.is_empty());
        assert_eq!(framer.pending(), &stream[..1]);
        assert!(framer.push(&stream[1..6]).packets.is_empty());

        let batch = framer.push(&stream[6..]);
        assert_eq!(batch.packets.len(), 1);
        assert_eq!(batch.packets[0].payload(), b"hello world");
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn zero_length_stops_and_drops_the_rest() {
        let mut stream = encode(1, &[9]);
        stream.extend([0x00, 0x00, 0x05, 0x06]);

        let mut framer = PacketFramer::new();
        let batch = framer.push(&stream);
        assert_eq!(batch.packets.len(), 1);
        assert_eq!(batch.discarded, 4);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn short_declared_length_is_held_as_malformed() {
        let mut framer = PacketFramer::new();
        let batch = framer.push(&[0x02, 0x00, 0x01]);
        assert_eq!(batch.malformed, Some(2));
        assert!(batch.packets.is_empty());
        assert_eq!(framer.pending(), &[0x02, 0x00, 0x01]);
    }

    #[test]
    fn malformed_header_stops_accumulating() {
        let mut framer = PacketFramer::new();
        assert_eq!(framer.push(&[0x01, 0x00, 0x05]).malformed, Some(1));

        let chunk = [0xabu8; 1024];
        for _ in 0..1024 {
            let batch = framer.push(&chunk);
            assert_eq!(batch.malformed, Some(1));
            assert_eq!(batch.discarded, chunk.len());
            assert!(batch.packets.is_empty());
        }
        assert_eq!(framer.pending(), &[0x01, 0x00, 0x05]);
        assert!(framer.pending_len() <= u16::MAX as usize);
    }

    #[test]
    fn clear_recovers_from_malformed_header() {
        let mut framer = PacketFramer::new();
        framer.push(&[0x02, 0x00]);
        framer.clear();

        let batch = framer.push(&encode(4, &[1]));
        assert_eq!(batch.malformed, None);
        assert_eq!(batch.packets.len(), 1);
    }

    proptest! {
        #[test]
        fn arbitrary_chunking_preserves_packets(
            specs in proptest::collection::vec(
                (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..48)),
                0..12,
            ),
            cuts in proptest::collection::vec(1usize..64, 1..24),
        ) {
            let encoded: Vec<Vec<u8>> = specs.iter().map(|(t, p)| encode(*t, p)).collect();
            let stream: Vec<u8> = encoded.concat();

            let mut framer = PacketFramer::new();
            let mut framed = Vec::new();
            let mut offset = 0;
            let mut i = 0;
            while offset < stream.len() {
                let end = (offset + cuts[i % cuts.len()]).min(stream.len());
                framed.extend(framer.push(&stream[offset..end]).packets);
                offset = end;
                i += 1;
            }

            prop_assert_eq!(framed.len(), encoded.len());
            for (packet, expected) in framed.iter().zip(&encoded) {
                prop_assert_eq!(packet.as_bytes(), expected.as_slice());
            }
            prop_assert_eq!(framer.pending_len(), 0);
        }

        #[test]
        fn trailing_partial_bytes_stay_pending(
            first in proptest::collection::vec(any::<u8>(), 0..32),
            second in proptest::collection::vec(any::<u8>(), 1..32),
            keep in 1usize..32,
        ) {
            let complete = encode(1, &first);
            let next = encode(2, &second);
            let m = keep.min(next.len() - 1);

            let mut stream = complete.clone();
            stream.extend_from_slice(&next[..m]);

            let (packets, pending) = frame_packets(&stream);
            prop_assert_eq!(packets.len(), 1);
            prop_assert_eq!(packets[0].as_bytes(), complete.as_slice());
            prop_assert_eq!(pending.as_ref(), &next[..m]);
        }
    }
}
