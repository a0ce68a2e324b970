//! SLIP-style byte-stuffed framing for the KLF200 gateway protocol.
//!
//! Every packet travels inside a frame delimited by `0xC0` markers, with
//! the two reserved bytes escaped in the body. This crate owns the
//! stuffing/unstuffing and the blocking framed reader/writer; it knows
//! nothing about packet contents.

pub mod error;
pub mod reader;
pub mod slip;
pub mod writer;

pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use slip::{encode_frame, encoded, SlipDecoder, END, ESC, ESC_END, ESC_ESC};
pub use writer::FrameWriter;
