//! Boundary between the hub and a Bluetooth serial stack.
//!
//! The hub never blocks on the transport.  Calls on [`Transport`] only start
//! an operation; its completion arrives later as a [`TransportEvent`] on the
//! channel the transport was created with, together with unsolicited
//! notifications such as discovery changes and received data.

use robo_core::{Address, DeviceDescriptor, SocketId};
use thiserror::Error;
use uuid::Uuid;

/// Failure to allocate a socket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("socket create failed: {0}")]
    Create(String),
}

/// Options used when allocating a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketProperties {
    pub name: String,
    pub buffer_size: u32,
    /// Whether the socket survives the hub being suspended.
    pub persistent: bool,
}

impl Default for SocketProperties {
    fn default() -> Self {
        Self {
            name: "RoboHub Bluetooth Device".to_string(),
            buffer_size: 4096,
            persistent: false,
        }
    }
}

/// State of one open socket as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketInfo {
    pub socket_id: SocketId,
    /// Peer address; `None` until the socket has been connected once.
    pub address: Option<Address>,
    pub connected: bool,
    pub paused: bool,
}

/// Completions and notifications delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    DeviceAdded(DeviceDescriptor),
    DeviceChanged(DeviceDescriptor),
    DeviceRemoved(DeviceDescriptor),
    ConnectCompleted {
        socket_id: SocketId,
        address: Address,
        result: Result<(), String>,
    },
    DisconnectCompleted {
        socket_id: SocketId,
    },
    Closed {
        socket_id: SocketId,
    },
    SendCompleted {
        socket_id: SocketId,
        result: Result<(), String>,
    },
    SocketInfo {
        socket_id: SocketId,
        result: Result<SocketInfo, String>,
    },
    Received {
        socket_id: SocketId,
        data: Vec<u8>,
    },
    ReceiveError {
        socket_id: SocketId,
        error: String,
    },
}

/// Operations the hub needs from a Bluetooth serial stack.
///
/// Implementations must be cheap to call from the hub task: anything slow is
/// started here and reported later as a [`TransportEvent`].
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Allocates a new, unconnected socket.
    fn create(&self, properties: &SocketProperties) -> Result<SocketId, TransportError>;

    /// Starts connecting `socket_id` to the service `uuid` on `address`.
    /// Completes with [`TransportEvent::ConnectCompleted`].
    fn connect(&self, socket_id: SocketId, address: &Address, uuid: Uuid);

    /// Completes with [`TransportEvent::DisconnectCompleted`].
    fn disconnect(&self, socket_id: SocketId);

    /// Releases the socket.  Completes with [`TransportEvent::Closed`].
    fn close(&self, socket_id: SocketId);

    /// Completes with [`TransportEvent::SendCompleted`].
    fn send(&self, socket_id: SocketId, bytes: &[u8]);

    /// Completes with [`TransportEvent::SocketInfo`].
    fn request_info(&self, socket_id: SocketId);

    fn set_paused(&self, socket_id: SocketId, paused: bool);

    /// Every socket currently open in the stack, including ones left over
    /// from an earlier session.
    fn sockets(&self) -> Vec<SocketInfo>;

    /// Current discovery snapshot.
    fn devices(&self) -> Vec<DeviceDescriptor>;
}
