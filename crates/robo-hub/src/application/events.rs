//! Events the hub publishes to its consumer.

use robo_core::{Address, SpheroEvent};

/// Everything observable from outside the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A device finished connecting or lost its connection.
    DeviceState { address: Address, connected: bool },
    /// Raw bytes received from a device, before protocol decoding.
    DataReceived { address: Address, bytes: Vec<u8> },
    /// Progress of a robot API preparing a freshly connected device.
    ConnectProgress {
        address: Address,
        message: String,
        step: u8,
    },
    /// A decoded message from a Sphero.
    Robot { address: Address, event: SpheroEvent },
}
