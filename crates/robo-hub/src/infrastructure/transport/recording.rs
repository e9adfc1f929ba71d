//! Recording transport for tests.
//!
//! Every call is appended to a log that tests inspect afterwards.  Queries
//! (`sockets`, `devices`) answer from data the test installs up front, and
//! `create` hands out increasing socket ids unless told to fail.  Nothing is
//! ever reported back on its own: tests feed the matching
//! [`TransportEvent`](crate::application::transport::TransportEvent)s to the
//! hub themselves.

use std::sync::Mutex;

use robo_core::{Address, DeviceDescriptor, SocketId};
use uuid::Uuid;

use super::lock;
use crate::application::transport::{SocketInfo, SocketProperties, Transport, TransportError};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Create(SocketProperties),
    Connect {
        socket_id: SocketId,
        address: Address,
        uuid: Uuid,
    },
    Disconnect(SocketId),
    Close(SocketId),
    Send {
        socket_id: SocketId,
        bytes: Vec<u8>,
    },
    RequestInfo(SocketId),
    SetPaused {
        socket_id: SocketId,
        paused: bool,
    },
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<TransportCall>,
    devices: Vec<DeviceDescriptor>,
    sockets: Vec<SocketInfo>,
    next_socket: SocketId,
    create_error: Option<String>,
}

/// A [`Transport`] that records calls instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    state: Mutex<RecordingState>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot returned by [`Transport::devices`].
    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        lock(&self.state).devices = devices;
    }

    /// Sets the list returned by [`Transport::sockets`].
    pub fn set_sockets(&self, sockets: Vec<SocketInfo>) {
        lock(&self.state).sockets = sockets;
    }

    /// Makes every following `create` fail with `message`.
    pub fn fail_create(&self, message: &str) {
        lock(&self.state).create_error = Some(message.to_string());
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.state).calls.clone()
    }

    /// Bytes written so far, per call.
    pub fn sent(&self) -> Vec<(SocketId, Vec<u8>)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send { socket_id, bytes } => Some((*socket_id, bytes.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn create_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Create(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    fn record(&self, call: TransportCall) {
        lock(&self.state).calls.push(call);
    }
}

impl Transport for RecordingTransport {
    fn create(&self, properties: &SocketProperties) -> Result<SocketId, TransportError> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::Create(properties.clone()));
        if let Some(message) = &state.create_error {
            return Err(TransportError::Create(message.clone()));
        }
        state.next_socket += 1;
        Ok(state.next_socket)
    }

    fn connect(&self, socket_id: SocketId, address: &Address, uuid: Uuid) {
        self.record(TransportCall::Connect {
            socket_id,
            address: address.clone(),
            uuid,
        });
    }

    fn disconnect(&self, socket_id: SocketId) {
        self.record(TransportCall::Disconnect(socket_id));
    }

    fn close(&self, socket_id: SocketId) {
        self.record(TransportCall::Close(socket_id));
    }

    fn send(&self, socket_id: SocketId, bytes: &[u8]) {
        self.record(TransportCall::Send {
            socket_id,
            bytes: bytes.to_vec(),
        });
    }

    fn request_info(&self, socket_id: SocketId) {
        self.record(TransportCall::RequestInfo(socket_id));
    }

    fn set_paused(&self, socket_id: SocketId, paused: bool) {
        self.record(TransportCall::SetPaused { socket_id, paused });
    }

    fn sockets(&self) -> Vec<SocketInfo> {
        lock(&self.state).sockets.clone()
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        lock(&self.state).devices.clone()
    }
}
