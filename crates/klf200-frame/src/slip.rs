//! SLIP-style byte stuffing.
//!
//! Frames are delimited by the END marker (`0xC0`). Inside a frame body,
//! `0xC0` is written as `0xDB 0xDC` and `0xDB` as `0xDB 0xDD`, so frames
//! are self-delimiting without a length prefix.
//!
//! Decoding is deliberately lenient: an END marker with nothing buffered
//! is boundary noise and skipped, and a malformed escape sequence drops
//! the offending byte rather than failing the stream. Callers rely on the
//! decoder never terminating on line noise; it resynchronizes on the next
//! END marker.

use bytes::{BufMut, Bytes, BytesMut};

/// Frame boundary marker.
pub const END: u8 = 0xC0;
/// Escape introducer.
pub const ESC: u8 = 0xDB;
/// Escaped stand-in for END.
pub const ESC_END: u8 = 0xDC;
/// Escaped stand-in for ESC.
pub const ESC_ESC: u8 = 0xDD;

const INITIAL_FRAME_CAPACITY: usize = 256;

/// Encode one frame into `dst`: END, stuffed body, END.
pub fn encode_frame(data: &[u8], dst: &mut BytesMut) {
    // Worst case doubles the body; reserve for the common case instead.
    dst.reserve(data.len() + data.len() / 5 + 2);
    dst.put_u8(END);
    for &byte in data {
        match byte {
            END => {
                dst.put_u8(ESC);
                dst.put_u8(ESC_END);
            }
            ESC => {
                dst.put_u8(ESC);
                dst.put_u8(ESC_ESC);
            }
            _ => dst.put_u8(byte),
        }
    }
    dst.put_u8(END);
}

/// Convenience wrapper returning a freshly allocated encoded frame.
pub fn encoded(data: &[u8]) -> Vec<u8> {
    let mut dst = BytesMut::new();
    encode_frame(data, &mut dst);
    dst.to_vec()
}

/// Streaming frame decoder.
///
/// Feed it chunks of any size; it hands back every frame completed by the
/// chunk. State (partial frame, pending escape) carries over between
/// calls, so byte-at-a-time input decodes identically to one big slice.
#[derive(Debug, Default)]
pub struct SlipDecoder {
    buf: BytesMut,
    escape: bool,
}

impl SlipDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_FRAME_CAPACITY),
            escape: false,
        }
    }

    /// Consume a chunk and return the frames it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        for &byte in chunk {
            match byte {
                END => {
                    self.escape = false;
                    if !self.buf.is_empty() {
                        frames.push(self.buf.split().freeze());
                    }
                }
                ESC => self.escape = true,
                _ if self.escape => {
                    self.escape = false;
                    match byte {
                        ESC_END => self.buf.put_u8(END),
                        ESC_ESC => self.buf.put_u8(ESC),
                        other => {
                            // Lenient recovery: drop the byte, keep the frame.
                            tracing::trace!(byte = other, "dropping malformed escape sequence");
                        }
                    }
                }
                _ => self.buf.put_u8(byte),
            }
        }
        frames
    }

    /// Discard any partially accumulated frame and pending escape state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escape = false;
    }
}
