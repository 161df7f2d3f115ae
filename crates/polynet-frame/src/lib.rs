//! Field codec and length-prefixed message framing.
//!
//! Every message travels in a frame:
//! - A 4-byte big-endian length counting everything that follows
//! - A 4-byte big-endian message identifier
//! - The message payload, encoded field by field with [`wire`]
//!
//! [`FrameReader`] and [`FrameWriter`] own the per-connection accumulation
//! and scratch buffers, so callers only ever see complete frames.

pub mod codec;
pub mod error;
pub mod reader;
pub mod wire;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, RawFrame, DEFAULT_MAX_FRAME_SIZE, ID_SIZE,
    LENGTH_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use wire::{WireCursor, WireDecode, WireEncode};
pub use writer::FrameWriter;
