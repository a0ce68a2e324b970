//! Typed packet codec for the KLF200 gateway control protocol.
//!
//! Pure data handling only: command table, packet encode/decode with
//! length and XOR-checksum validation, and bit-level payload field access.
//! No I/O and no connection state live here.

pub mod bitfield;
pub mod command;
pub mod error;
pub mod packet;

pub use command::Command;
pub use error::{PacketError, Result};
pub use packet::{Packet, MAX_PAYLOAD, PROTOCOL_ID};
