//! Protocol module: stream framing, checksums, and robot protocol engines.
//!
//! # How the pieces fit (for beginners)
//!
//! Bytes from a Bluetooth socket arrive in arbitrary chunks.  A single
//! chunk may hold half a frame, exactly one frame, or several frames plus
//! the start of the next one.  The [`StreamReader`] keeps a carry-over buffer
//! so frames can be cut out regardless of how the stream was chunked.
//!
//! A [`Protocol`] owns one reader, validates each frame (header, length,
//! checksum), and turns valid frames into typed messages.  Invalid frames are
//! dropped without leaving anything behind in the buffer.

pub mod checksum;
pub mod sphero;
pub mod stream;

use thiserror::Error;

pub use stream::StreamReader;

/// Errors raised when a frame payload cannot be decoded into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is shorter than the record layout requires.
    #[error("{context}: need {needed} bytes, got {available}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        available: usize,
    },
}

/// A robot protocol engine fed from one connection's byte stream.
///
/// Implementations are synchronous: every call processes whatever complete
/// frames are available and returns the decoded messages in arrival order.
pub trait Protocol {
    /// Decoded message type produced by this protocol.
    type Message;

    /// Feeds a received chunk and returns every message completed by it.
    fn on_bytes(&mut self, bytes: &[u8]) -> Vec<Self::Message>;

    /// Discards any buffered partial frame.
    fn reset(&mut self);
}
