//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Socket read (arbitrary chunk)
//!     → framer.rs (append to pending bytes, split complete packets)
//!     → packet.rs (Packet: length header + type id + payload)
//!     → reader.rs (typed field decoding for session logic)
//!
//! Outgoing packet:
//!     writer.rs (typed field encoding, header kept current)
//!     → Packet → socket write
//! ```
//!
//! # Wire Layout
//! ```text
//! ┌──────────────┬─────────┬─────────────────────┐
//! │ Length       │ Type ID │ Payload             │
//! │ 2 bytes LE   │ 1 byte  │ length - 3 bytes    │
//! └──────────────┴─────────┴─────────────────────┘
//! ```
//!
//! The length field counts itself, the type byte and the payload.
//!
//! # Design Decisions
//! - Raw bytes internally; hex text only for logging and hex input
//! - The framer never blocks and never fails; malformed input stays pending
//! - Reader bounds violations are explicit `CodecError`s

pub mod framer;
pub mod packet;
pub mod reader;
pub mod writer;

pub use framer::{frame_packets, FrameBatch, PacketFramer};
pub use packet::{CodecError, Packet, HEADER_SIZE, LENGTH_FIELD_SIZE};
pub use reader::PacketReader;
pub use writer::PacketWriter;
