use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::slip::SlipDecoder;

const READ_CHUNK_SIZE: usize = 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
/// Timeout-kind I/O errors (`WouldBlock`, `TimedOut`) are passed through
/// so a caller using a socket read timeout can run periodic work between
/// reads; decoder state survives across such calls.
pub struct FrameReader<T> {
    inner: T,
    decoder: SlipDecoder,
    ready: VecDeque<Bytes>,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            decoder: SlipDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.ready.extend(self.decoder.push(&chunk[..read]));
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
