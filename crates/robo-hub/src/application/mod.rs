//! Application layer use cases for the hub.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure protocol code in `robo_core`
//! and the infrastructure that actually talks to a Bluetooth stack.  Code in
//! this layer depends only on the [`transport::Transport`] trait, so the
//! same logic runs against real hardware, a simulator, or a test double.
//!
//! # Sub-modules
//!
//! - **`transport`**  – The boundary trait plus the completion and
//!   notification events a transport reports back.
//! - **`device`**     – One Bluetooth device and its connection state machine.
//! - **`devices`**    – The registry: discovery, profile matching, socket
//!   routing, and name lookup.
//! - **`throttle`**   – Coalesces bursts of discovery notifications.
//! - **`connection`** – The capability robot APIs use to talk to a device.
//! - **`robot_api`**  – Sphero command execution and response routing.
//! - **`monitoring`** – Periodic location polling while a robot is connected.
//! - **`hub`**        – The event loop that owns all of the above.

pub mod connection;
pub mod device;
pub mod devices;
pub mod events;
pub mod hub;
pub mod monitoring;
pub mod robot_api;
pub mod throttle;
pub mod transport;
