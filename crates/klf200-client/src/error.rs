use klf200_frame::FrameError;
use klf200_proto::{Command, PacketError};

/// Errors surfaced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration is incomplete.
    #[error("incomplete configuration: {0}")]
    Config(&'static str),

    /// No connection to the gateway is established.
    #[error("not connected to the gateway")]
    NotConnected,

    /// The connection stopped while an operation was waiting.
    #[error("connection stopped")]
    ConnectionStopped,

    /// No matching response arrived within the wait bound.
    #[error("no response received (expected {0:?})")]
    NoResponse(Command),

    /// The command has no confirm mapping and cannot be awaited.
    #[error("no confirm command is mapped for {0:?}")]
    NoConfirmMapped(Command),

    /// The remote side violated the protocol contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Packet-level format error.
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// Frame-level transport error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
