/// Errors raised while decoding or building packets.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    /// The input is shorter than the minimal packet (4 bytes).
    #[error("packet too small ({len} bytes, minimum 4)")]
    TooSmall { len: usize },

    /// The protocol-id byte is not 0.
    #[error("invalid protocol id {0:#04x} (expected 0x00)")]
    InvalidProtocolId(u8),

    /// The length byte does not match the packet size.
    #[error("invalid length byte {declared} (packet holds {actual} bytes)")]
    InvalidLength { declared: u8, actual: usize },

    /// The trailing checksum byte does not match the running XOR.
    #[error("invalid checksum {found:#04x} (computed {computed:#04x})")]
    InvalidChecksum { found: u8, computed: u8 },

    /// The 16-bit command value is not part of the command table.
    #[error("unknown command {0:#06x}")]
    UnknownCommand(u16),

    /// The payload does not fit the one-byte length field.
    #[error("payload too large ({len} bytes, max {max})")]
    PayloadTooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, PacketError>;
