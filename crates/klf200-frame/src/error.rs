/// Errors that can occur while reading or writing frames.
///
/// Decoding itself never fails: the byte-stuffing layer recovers from
/// malformed input by dropping bytes and resynchronizing on the next
/// frame boundary.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred on the underlying stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
