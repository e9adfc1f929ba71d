//! Infrastructure layer for the hub.
//!
//! Contains adapters that sit behind the application's traits: transport
//! implementations and file-system storage for configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `robo_core`, but MUST NOT be imported by the `application` layer.

pub mod storage;
pub mod transport;
