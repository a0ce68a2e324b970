//! Typed protocol packets and their wire form.
//!
//! Wire layout:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────┬───────────┬───────────┐
//! │ ProtocolID   │ Length   │ Command      │ Payload   │ Checksum  │
//! │ 0x00         │ size − 2 │ (2B BE)      │ 0..252 B  │ XOR of    │
//! │              │          │              │           │ the rest  │
//! └──────────────┴──────────┴──────────────┴───────────┴───────────┘
//! ```
//!
//! The checksum is the running XOR of every byte before it, including the
//! protocol-id byte. Packets are immutable once shared; the wire image is
//! materialized lazily and cached.

use std::fmt;
use std::sync::OnceLock;

use crate::bitfield;
use crate::command::Command;
use crate::error::{PacketError, Result};

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = 252;

/// Wire protocol-id byte.
pub const PROTOCOL_ID: u8 = 0x00;

/// A decoded (or to-be-encoded) protocol message.
#[derive(Debug)]
pub struct Packet {
    command: Command,
    payload: Vec<u8>,
    node_id: Option<u8>,
    wire: OnceLock<Vec<u8>>,
}

impl Packet {
    /// Build a packet from a command and payload.
    pub fn new(command: Command, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let node_id = derive_node_id(command, &payload);
        Ok(Self {
            command,
            payload,
            node_id,
            wire: OnceLock::new(),
        })
    }

    /// Decode a packet from its wire form.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(PacketError::TooSmall { len: bytes.len() });
        }
        if bytes[0] != PROTOCOL_ID {
            return Err(PacketError::InvalidProtocolId(bytes[0]));
        }
        let declared = bytes[1];
        if bytes.len() - 2 != declared as usize {
            return Err(PacketError::InvalidLength {
                declared,
                actual: bytes.len(),
            });
        }
        let computed = xor_checksum(&bytes[..bytes.len() - 1]);
        let found = bytes[bytes.len() - 1];
        if computed != found {
            return Err(PacketError::InvalidChecksum { found, computed });
        }

        let raw_command = u16::from_be_bytes([bytes[2], bytes[3]]);
        let command =
            Command::from_u16(raw_command).ok_or(PacketError::UnknownCommand(raw_command))?;
        // A 4-byte packet has no payload and no dedicated checksum byte.
        let payload = if bytes.len() > 4 {
            bytes[4..bytes.len() - 1].to_vec()
        } else {
            Vec::new()
        };
        let node_id = derive_node_id(command, &payload);

        let wire = OnceLock::new();
        let _ = wire.set(bytes.to_vec());
        Ok(Self {
            command,
            payload,
            node_id,
            wire,
        })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The node id referenced by this packet, for node-scoped commands.
    pub fn node_id(&self) -> Option<u8> {
        self.node_id
    }

    /// The confirm command expected in reply, if this is a request.
    pub fn confirm_command(&self) -> Command {
        self.command.confirm()
    }

    /// The wire form of this packet, materialized on first use.
    pub fn wire(&self) -> &[u8] {
        self.wire.get_or_init(|| encode(self.command, &self.payload))
    }

    /// Read `bit_count` bits at `bit_offset` within the payload.
    pub fn bit_field(&self, bit_offset: usize, bit_count: usize) -> Vec<u8> {
        bitfield::get_bits(&self.payload, bit_offset, bit_count)
    }

    /// Overwrite `bit_count` bits at `bit_offset` within the payload.
    ///
    /// Invalidates the cached wire image; the next [`Packet::wire`] call
    /// re-encodes.
    pub fn set_bit_field(
        &mut self,
        bit_offset: usize,
        bit_count: usize,
        source: &[u8],
    ) -> Result<()> {
        bitfield::set_bits(&mut self.payload, bit_offset, bit_count, source);
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        self.node_id = derive_node_id(self.command, &self.payload);
        self.wire.take();
        Ok(())
    }
}

impl fmt::Display for Packet {
    /// Hex dump of the wire form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.wire() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

fn encode(command: Command, payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(payload.len() + 5);
    wire.push(PROTOCOL_ID);
    wire.push((payload.len() + 3) as u8);
    wire.extend_from_slice(&command.as_u16().to_be_bytes());
    wire.extend_from_slice(payload);
    wire.push(xor_checksum(&wire));
    wire
}

fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

fn derive_node_id(command: Command, payload: &[u8]) -> Option<u8> {
    command
        .node_id_offset()
        .and_then(|offset| payload.get(offset).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let packet = Packet::new(Command::GetStateReq, vec![]).unwrap();
        let decoded = Packet::from_wire(packet.wire()).unwrap();
        assert_eq!(decoded.command(), Command::GetStateReq);
        assert!(decoded.payload().is_empty());

        let packet = Packet::new(Command::PasswordEnterReq, vec![0xAA; 32]).unwrap();
        let decoded = Packet::from_wire(packet.wire()).unwrap();
        assert_eq!(decoded.command(), Command::PasswordEnterReq);
        assert_eq!(decoded.payload(), &[0xAA; 32]);
    }

    #[test]
    fn roundtrip_at_max_payload() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| i as u8).collect();
        let packet = Packet::new(Command::CommandSendReq, payload.clone()).unwrap();
        let decoded = Packet::from_wire(packet.wire()).unwrap();
        assert_eq!(decoded.payload(), payload.as_slice());
    }

    #[test]
    fn wire_layout() {
        let packet = Packet::new(Command::GetVersionReq, vec![0x01, 0x02]).unwrap();
        let wire = packet.wire();
        assert_eq!(wire[0], 0x00);
        assert_eq!(wire[1], 5); // payload + 3
        assert_eq!(&wire[2..4], &[0x00, 0x08]); // command, big-endian
        assert_eq!(&wire[4..6], &[0x01, 0x02]);
        assert_eq!(wire[6], 0x00 ^ 5 ^ 0x00 ^ 0x08 ^ 0x01 ^ 0x02);
        assert_eq!(wire.len(), 7);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = Packet::new(Command::CommandSendReq, vec![0; MAX_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, PacketError::PayloadTooLarge { .. }));
    }

    #[test]
    fn too_small_is_rejected() {
        for len in 0..4 {
            let err = Packet::from_wire(&vec![0u8; len]).unwrap_err();
            assert_eq!(err, PacketError::TooSmall { len });
        }
    }

    #[test]
    fn nonzero_protocol_id_is_rejected() {
        let mut wire = Packet::new(Command::GetStateReq, vec![]).unwrap().wire().to_vec();
        wire[0] = 0x01;
        let err = Packet::from_wire(&wire).unwrap_err();
        assert_eq!(err, PacketError::InvalidProtocolId(0x01));
    }

    #[test]
    fn tampered_length_is_rejected() {
        // Recompute the checksum after tampering so only the length check fires.
        let mut wire = Packet::new(Command::GetStateReq, vec![0x01]).unwrap().wire().to_vec();
        wire[1] = wire[1].wrapping_add(1);
        let len = wire.len();
        wire[len - 1] = xor_checksum(&wire[..len - 1]);
        let err = Packet::from_wire(&wire).unwrap_err();
        assert!(matches!(err, PacketError::InvalidLength { .. }));
    }

    #[test]
    fn flipped_bits_fail_the_checksum() {
        let wire = Packet::new(Command::GetVersionCfm, vec![1, 2, 3, 4, 5, 6, 7, 14, 3])
            .unwrap()
            .wire()
            .to_vec();
        // A handful of fixed single-bit flips across the packet body.
        for (index, bit) in [(2usize, 0u8), (3, 3), (4, 7), (8, 1), (10, 4)] {
            let mut tampered = wire.clone();
            tampered[index] ^= 1 << bit;
            let err = Packet::from_wire(&tampered).unwrap_err();
            assert!(
                matches!(err, PacketError::InvalidChecksum { .. }),
                "flip at byte {index} bit {bit} must fail the checksum"
            );
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut wire = vec![0x00, 0x03, 0x12, 0x34];
        wire.push(xor_checksum(&wire));
        let err = Packet::from_wire(&wire).unwrap_err();
        assert_eq!(err, PacketError::UnknownCommand(0x1234));
    }

    #[test]
    fn node_id_offsets() {
        let packet = Packet::new(Command::GetAllNodesInformationNtf, vec![7, 0, 0]).unwrap();
        assert_eq!(packet.node_id(), Some(7));

        let packet = Packet::new(Command::GetNodeInformationCfm, vec![0, 9]).unwrap();
        assert_eq!(packet.node_id(), Some(9));

        let packet = Packet::new(Command::LimitationStatusNtf, vec![0, 0, 3, 0]).unwrap();
        assert_eq!(packet.node_id(), Some(3));

        let packet = Packet::new(Command::GetStateCfm, vec![2, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(packet.node_id(), None);
    }

    #[test]
    fn short_payload_yields_no_node_id() {
        let packet = Packet::new(Command::LimitationStatusNtf, vec![0, 0]).unwrap();
        assert_eq!(packet.node_id(), None);
    }

    #[test]
    fn set_bit_field_invalidates_cached_wire() {
        let mut packet = Packet::new(Command::CommandSendReq, vec![0u8; 4]).unwrap();
        let before = packet.wire().to_vec();
        packet.set_bit_field(0, 16, &[0x12, 0x34]).unwrap();
        let after = packet.wire().to_vec();
        assert_ne!(before, after);
        assert_eq!(&packet.payload()[..2], &[0x12, 0x34]);
        // The re-encoded image still decodes cleanly.
        Packet::from_wire(&after).unwrap();
    }

    #[test]
    fn display_is_wire_hex() {
        let packet = Packet::new(Command::GetStateReq, vec![]).unwrap();
        // 00 | 03 | 00 0C | checksum 0x00 ^ 0x03 ^ 0x00 ^ 0x0C
        assert_eq!(packet.to_string(), "0003000C0F");
    }
}
