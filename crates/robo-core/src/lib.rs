//! # robo-core
//!
//! Shared library for RoboHub containing the domain entities that describe
//! Bluetooth robots, the generic stream reader used to cut frames out of a
//! byte stream, and the Sphero protocol family (commands, decoders, engine).
//!
//! This crate has zero dependencies on Bluetooth stacks, async runtimes, or
//! sockets.  Everything here is a pure transformation of bytes and values.
//!
//! # Architecture overview (for beginners)
//!
//! RoboHub connects to educational robots (Sphero, EV3, mBot) over Bluetooth
//! serial links.  A robot sends a continuous stream of bytes; the bytes do
//! not arrive in message-sized pieces, so something has to buffer them and
//! cut out complete frames.  That is the job of this crate.
//!
//! - **`domain`** – Addresses, device profiles (how a discovered device is
//!   recognised as a particular robot), and discovery descriptors.
//!
//! - **`protocol`** – The [`protocol::StreamReader`], the checksum, the
//!   [`protocol::Protocol`] trait, and the Sphero implementation of it.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `robo_core::Address` instead of `robo_core::domain::address::Address`.
pub use domain::address::{Address, SocketId};
pub use domain::descriptor::DeviceDescriptor;
pub use domain::profile::{Profile, RobotFamily};
pub use protocol::sphero::command::{Command, CommandBuffer, CommandError};
pub use protocol::sphero::engine::{SpheroMessage, SpheroProtocol};
pub use protocol::sphero::events::SpheroEvent;
pub use protocol::stream::StreamReader;
pub use protocol::{DecodeError, Protocol};
