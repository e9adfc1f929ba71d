//! Sphero 2.0 / SPRK family protocol.
//!
//! Wire format of a response frame:
//! ```text
//! [0xFF][type:1][code:1][seq:1][dlen:1][data:dlen-1][chk:1]
//! ```
//! `type` is `0xFF` for acknowledgements and `0xFE` for asynchronous
//! messages.  `dlen` counts the data bytes plus the checksum, so the total
//! frame length is `dlen + 5`.  The checksum is the inverted modulo-256 sum
//! of every byte from `code` up to the last data byte.

pub mod command;
pub mod constants;
pub mod decoder;
pub mod engine;
pub mod events;

pub use command::{Command, CommandBuffer, CommandError};
pub use engine::{SpheroMessage, SpheroProtocol};
pub use events::SpheroEvent;
