//! # Wire Protocol
//!
//! Every message is one [`Packet`]: a big-endian `u16` type tag followed by a
//! type-specific payload. On the stream transport each packet is additionally wrapped
//! in a `u32` length prefix (see [`framing`]); on the datagram transport one datagram
//! carries exactly one packet.
//!
//! Decoding never panics. Anything that does not parse cleanly comes back as a
//! [`ProtocolError`] and the caller decides whether the connection survives it.

use std::error::Error;
use std::fmt;
use std::io;

pub mod buffer;
pub mod framing;
pub mod packet;
pub mod rle;

pub use buffer::PacketBuffer;
pub use packet::{Packet, PacketType, PlayerAction, PlayerState};

/// Why bytes could not be turned into a [`Packet`], or a packet into bytes.
#[derive(Debug)]
pub enum ProtocolError {
    /// The transport failed underneath a frame read or write.
    Io(io::Error),
    /// A read needed more bytes than the payload had left.
    Truncated { needed: usize, remaining: usize },
    /// The leading tag names no known packet type.
    UnknownPacketType(u16),
    InvalidUtf8,
    /// Encode-side only: a name longer than its `u16` length prefix allows.
    StringTooLong(usize),
    /// A run in the voxel stream carries a type byte outside the palette.
    UnknownVoxelType(u8),
    /// Chunk dimensions or run lengths disagree with each other.
    CorruptChunk(String),
    /// The length prefix is over the configured limit. The payload is not read.
    FrameTooLarge(u32),
    TrailingBytes(usize),
    /// A player input byte that maps to no action.
    InvalidAction(u8),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(err) => write!(f, "IO error: {}", err),
            ProtocolError::Truncated { needed, remaining } => write!(
                f,
                "Truncated payload: needed {} bytes, {} remaining",
                needed, remaining
            ),
            ProtocolError::UnknownPacketType(tag) => write!(f, "Unknown packet type {}", tag),
            ProtocolError::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
            ProtocolError::StringTooLong(len) => {
                write!(f, "String of {} bytes does not fit a u16 length", len)
            }
            ProtocolError::UnknownVoxelType(byte) => write!(f, "Unknown voxel type {}", byte),
            ProtocolError::CorruptChunk(msg) => write!(f, "Corrupt chunk: {}", msg),
            ProtocolError::FrameTooLarge(len) => write!(f, "Frame of {} bytes is too large", len),
            ProtocolError::TrailingBytes(count) => {
                write!(f, "{} unread bytes after the payload", count)
            }
            ProtocolError::InvalidAction(byte) => write!(f, "Unknown player action {}", byte),
        }
    }
}

impl Error for ProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProtocolError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}
