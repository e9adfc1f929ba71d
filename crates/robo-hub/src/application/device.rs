//! A single Bluetooth device and its connection state machine.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!            connect()                 ConnectCompleted(Ok)
//! Idle ─────────────────▶ Connecting ─────────────────────▶ Connected
//!  ▲                          │                                 │
//!  │   ConnectCompleted(Err)  │        DisconnectCompleted,     │
//!  └──────────────────────────┘        fatal error, close       │
//!  ▲                                                            │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A device never retries a failed connect on its own; the caller decides.
//! Every handler that reacts to a transport completion takes the socket the
//! completion is about and ignores it when that socket is no longer the
//! device's current one, so late completions for a replaced socket are
//! harmless.

use robo_core::{Address, DeviceDescriptor, Profile, SocketId};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::{debug, error, info, warn};

use crate::application::events::HubEvent;
use crate::application::transport::{SocketInfo, SocketProperties, Transport};

/// Effect of a handler on the registry's socket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing the registry needs to track changed.
    Unchanged,
    /// The device is now connected through this socket.
    Connected(SocketId),
    /// The device lost its connection; the socket is gone.
    Disconnected(SocketId),
    /// The socket is gone but the device was not connected through it.
    Released(SocketId),
}

/// A Bluetooth device that matched a known robot profile.
#[derive(Debug)]
pub struct Device {
    address: Address,
    name: String,
    profile: Profile,
    paired: bool,
    connected: bool,
    connecting: bool,
    paused: bool,
    socket_id: Option<SocketId>,
    socket_properties: SocketProperties,
    connect_waiter: Option<oneshot::Sender<Address>>,
    disconnect_waiter: Option<oneshot::Sender<()>>,
    events: UnboundedSender<HubEvent>,
}

impl Device {
    /// Creates a disconnected device from a discovery entry.
    pub fn new(
        descriptor: &DeviceDescriptor,
        profile: Profile,
        socket_properties: SocketProperties,
        events: UnboundedSender<HubEvent>,
    ) -> Self {
        Self {
            address: descriptor.address.clone(),
            name: descriptor.name.clone(),
            profile,
            paired: descriptor.paired,
            connected: false,
            connecting: false,
            paused: false,
            socket_id: None,
            socket_properties,
            connect_waiter: None,
            disconnect_waiter: None,
            events,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn socket_id(&self) -> Option<SocketId> {
        self.socket_id
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Starts connecting.
    ///
    /// Does nothing while a connect is already in flight or the device is
    /// already connected (the new `ready` waiter is dropped).  Any leftover socket is closed first and returned
    /// so the caller can forget it.  `ready` fires once, on success only.
    pub fn connect(
        &mut self,
        transport: &dyn Transport,
        ready: Option<oneshot::Sender<Address>>,
    ) -> Option<SocketId> {
        if self.connecting {
            debug!(address = %self.address, "connect already in progress");
            return None;
        }
        if self.connected && self.socket_id.is_some() {
            warn!(address = %self.address, "already connected");
            return None;
        }

        self.connecting = true;
        let stale = self.socket_id.take();
        if let Some(stale) = stale {
            debug!(address = %self.address, socket_id = stale, "closing stale socket");
            transport.close(stale);
        }

        match transport.create(&self.socket_properties) {
            Ok(socket_id) => {
                info!(address = %self.address, socket_id, "connecting to {}", self.name);
                self.socket_id = Some(socket_id);
                self.connect_waiter = ready;
                transport.connect(socket_id, &self.address, self.profile.uuid);
            }
            Err(e) => {
                error!(address = %self.address, "{e}");
                self.connecting = false;
            }
        }
        stale
    }

    /// Starts disconnecting.
    ///
    /// Without a socket there is nothing to do: `done` fires immediately and
    /// the transport is not called.  `force` also clears a pending connect.
    pub fn disconnect(
        &mut self,
        transport: &dyn Transport,
        force: bool,
        done: Option<oneshot::Sender<()>>,
    ) {
        match self.socket_id {
            None => {
                if force {
                    self.connecting = false;
                }
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Some(socket_id) => {
                self.disconnect_waiter = done;
                transport.disconnect(socket_id);
            }
        }
    }

    /// Writes bytes to the device.  Dropped silently when no socket exists.
    pub fn send(&self, transport: &dyn Transport, bytes: &[u8]) {
        match self.socket_id {
            Some(socket_id) => transport.send(socket_id, bytes),
            None => debug!(address = %self.address, len = bytes.len(), "no socket, dropping write"),
        }
    }

    /// Asks the transport for a fresh [`SocketInfo`].
    pub fn update_info(&self, transport: &dyn Transport) {
        if let Some(socket_id) = self.socket_id {
            transport.request_info(socket_id);
        }
    }

    /// Refreshes name and pairing state from a newer discovery entry.
    pub fn refresh(&mut self, descriptor: &DeviceDescriptor) {
        self.name.clone_from(&descriptor.name);
        self.paired = descriptor.paired;
    }

    pub fn pause(&mut self, transport: &dyn Transport) {
        self.set_paused(transport, true);
    }

    pub fn unpause(&mut self, transport: &dyn Transport) {
        self.set_paused(transport, false);
    }

    fn set_paused(&mut self, transport: &dyn Transport, paused: bool) {
        let Some(socket_id) = self.socket_id else {
            return;
        };
        if !self.connected || self.paused == paused {
            return;
        }
        transport.set_paused(socket_id, paused);
        self.paused = paused;
        transport.request_info(socket_id);
    }

    /// Clears per-connection state kept on the socket.
    pub fn reset(&mut self, transport: &dyn Transport) {
        let Some(socket_id) = self.socket_id else {
            return;
        };
        if self.paused {
            transport.set_paused(socket_id, false);
        }
        self.paused = false;
    }

    /// Closes the socket, if any, without waiting for the completion.
    pub fn close(&mut self, transport: &dyn Transport) -> Option<SocketId> {
        let socket_id = self.socket_id.take()?;
        transport.close(socket_id);
        self.connected = false;
        self.connecting = false;
        Some(socket_id)
    }

    /// Adopts an already-open connected socket reported for this address.
    ///
    /// Returns the adopted socket and the one it replaced.
    pub fn adopt_socket(&mut self, sockets: &[SocketInfo]) -> Option<(SocketId, Option<SocketId>)> {
        let found = sockets.iter().find(|s| {
            s.connected
                && s.address.as_ref() == Some(&self.address)
                && Some(s.socket_id) != self.socket_id
        })?;

        info!(address = %self.address, socket_id = found.socket_id, "adopting open socket");
        let previous = self.socket_id.replace(found.socket_id);
        let was_connected = self.connected;
        self.connected = true;
        self.connecting = false;
        self.paused = found.paused;
        if !was_connected {
            self.publish_state();
        }
        Some((found.socket_id, previous))
    }

    // ── Transport completions ─────────────────────────────────────────────────

    /// Completion of [`Device::connect`].  Failures are not retried.
    pub fn handle_connect(
        &mut self,
        transport: &dyn Transport,
        socket_id: SocketId,
        result: Result<(), String>,
    ) -> Transition {
        if self.socket_id != Some(socket_id) {
            debug!(address = %self.address, socket_id, "ignoring connect completion for old socket");
            return Transition::Unchanged;
        }
        self.connecting = false;

        match result {
            Ok(()) => {
                info!(address = %self.address, socket_id, "connected");
                self.connected = true;
                transport.request_info(socket_id);
                if let Some(ready) = self.connect_waiter.take() {
                    let _ = ready.send(self.address.clone());
                }
                self.publish_state();
                Transition::Connected(socket_id)
            }
            Err(message) => {
                error!(address = %self.address, "connection error: {message}");
                self.connect_waiter = None;
                if is_connect_failure(&message) {
                    transport.close(socket_id);
                    self.socket_id = None;
                    return Transition::Released(socket_id);
                }
                Transition::Unchanged
            }
        }
    }

    /// Completion of [`Device::disconnect`], or a fatal error on the link.
    ///
    /// The socket is closed and forgotten; the next connect creates a new one.
    pub fn handle_disconnect(&mut self, transport: &dyn Transport, socket_id: SocketId) -> Transition {
        if self.socket_id != Some(socket_id) {
            return Transition::Unchanged;
        }
        info!(address = %self.address, socket_id, "disconnected");
        self.reset(transport);
        self.connected = false;
        self.connecting = false;
        self.socket_id = None;
        transport.close(socket_id);

        if let Some(done) = self.disconnect_waiter.take() {
            let _ = done.send(());
        }
        self.publish_state();
        Transition::Disconnected(socket_id)
    }

    /// The transport reports the socket as gone.
    pub fn handle_close(&mut self, socket_id: SocketId) -> Transition {
        if self.socket_id != Some(socket_id) {
            return Transition::Unchanged;
        }
        let was_connected = self.connected;
        self.connected = false;
        self.connecting = false;
        self.paused = false;
        self.socket_id = None;
        if let Some(done) = self.disconnect_waiter.take() {
            let _ = done.send(());
        }

        if was_connected {
            info!(address = %self.address, socket_id, "socket closed");
            self.publish_state();
            Transition::Disconnected(socket_id)
        } else {
            Transition::Released(socket_id)
        }
    }

    /// Receive error on the link.  Only disconnect-class errors are fatal.
    pub fn handle_error(
        &mut self,
        transport: &dyn Transport,
        socket_id: SocketId,
        message: &str,
    ) -> Transition {
        if mentions(message, &["disconnected"]) || mentions(message, &["system_error"]) {
            warn!(address = %self.address, "link lost: {message}");
            return self.handle_disconnect(transport, socket_id);
        }
        warn!(address = %self.address, "receive error: {message}");
        self.connecting = false;
        Transition::Unchanged
    }

    /// Completion of [`Device::send`].
    pub fn handle_send(&mut self, transport: &dyn Transport, socket_id: SocketId, result: Result<(), String>) {
        let Err(message) = result else {
            return;
        };
        if self.socket_id != Some(socket_id) {
            return;
        }
        if mentions(&message, &["socket", "not", "connected"])
            || mentions(&message, &["connection", "aborted"])
        {
            debug!(address = %self.address, "send on dead link: {message}");
            self.connected = false;
        } else {
            error!(address = %self.address, "send error: {message}");
            self.update_info(transport);
        }
    }

    /// Completion of [`Device::update_info`].
    pub fn handle_socket_info(
        &mut self,
        transport: &dyn Transport,
        socket_id: SocketId,
        result: Result<SocketInfo, String>,
    ) -> Transition {
        if self.socket_id != Some(socket_id) {
            return Transition::Unchanged;
        }
        match result {
            Ok(info) => {
                if self.connected && !info.connected {
                    return self.handle_disconnect(transport, socket_id);
                }
                self.connected = info.connected;
                self.paused = info.paused;
                Transition::Unchanged
            }
            Err(message) if mentions(&message, &["socket not found"]) => self.handle_close(socket_id),
            Err(message) => {
                warn!(address = %self.address, "socket info error: {message}");
                Transition::Unchanged
            }
        }
    }

    fn publish_state(&self) {
        let _ = self.events.send(HubEvent::DeviceState {
            address: self.address.clone(),
            connected: self.connected,
        });
    }
}

/// Case-insensitive check that every word appears in the message.
fn mentions(message: &str, words: &[&str]) -> bool {
    let message = message.to_lowercase();
    words.iter().all(|w| message.contains(w))
}

/// Connect errors after which the socket is unusable.
fn is_connect_failure(message: &str) -> bool {
    mentions(message, &["connection", "failed"]) || message.contains("0x2743")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::{MockTransport, TransportError};
    use mockall::predicate::eq;
    use robo_core::domain::profile::SERIAL_PORT_UUID;
    use tokio::sync::mpsc;

    fn device() -> (Device, mpsc::UnboundedReceiver<HubEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let descriptor = DeviceDescriptor::new("AA:BB", "Sphero-RGB", 7936, vec![SERIAL_PORT_UUID]);
        let profile = Profile::builtin()[1].clone();
        (Device::new(&descriptor, profile, SocketProperties::default(), tx), rx)
    }

    fn connectable_mock(socket_id: SocketId) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_create().times(1).returning(move |_| Ok(socket_id));
        mock.expect_connect()
            .with(eq(socket_id), eq(Address::from("AA:BB")), eq(SERIAL_PORT_UUID))
            .times(1)
            .return_const(());
        mock
    }

    #[test]
    fn test_connect_twice_while_in_flight_creates_one_socket() {
        // Arrange
        let (mut dev, _rx) = device();
        let mock = connectable_mock(7);

        // Act
        dev.connect(&mock, None);
        dev.connect(&mock, None);

        // Assert (mock verifies create/connect were called exactly once)
        assert!(dev.is_connecting());
        assert_eq!(dev.socket_id(), Some(7));
    }

    #[test]
    fn test_create_failure_clears_connecting() {
        let (mut dev, _rx) = device();
        let mut mock = MockTransport::new();
        mock.expect_create()
            .times(1)
            .returning(|_| Err(TransportError::Create("adapter off".into())));

        dev.connect(&mock, None);

        assert!(!dev.is_connecting());
        assert_eq!(dev.socket_id(), None);
    }

    #[test]
    fn test_successful_connect_fires_waiter_once_and_publishes_state() {
        // Arrange
        let (mut dev, mut events) = device();
        let mut mock = connectable_mock(3);
        mock.expect_request_info().with(eq(3)).times(1).return_const(());
        let (tx, mut rx) = oneshot::channel();

        // Act
        dev.connect(&mock, Some(tx));
        let transition = dev.handle_connect(&mock, 3, Ok(()));

        // Assert
        assert_eq!(transition, Transition::Connected(3));
        assert!(dev.is_connected());
        assert!(!dev.is_connecting());
        assert_eq!(rx.try_recv().unwrap(), Address::from("AA:BB"));
        assert_eq!(
            events.try_recv().unwrap(),
            HubEvent::DeviceState {
                address: Address::from("AA:BB"),
                connected: true
            }
        );
    }

    #[test]
    fn test_connect_when_already_connected_drops_waiter_without_transport_calls() {
        // Arrange
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(3);
        mock.expect_request_info().with(eq(3)).times(1).return_const(());
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 3, Ok(()));
        let (tx, mut rx) = oneshot::channel();

        // Act (mock rejects any further create/connect)
        let stale = dev.connect(&mock, Some(tx));

        // Assert
        assert_eq!(stale, None);
        assert!(dev.is_connected());
        assert_eq!(dev.socket_id(), Some(3));
        assert_eq!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed));
    }

    #[test]
    fn test_connect_failed_closes_socket_and_drops_waiter() {
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(4);
        mock.expect_close().with(eq(4)).times(1).return_const(());
        let (tx, mut rx) = oneshot::channel();

        dev.connect(&mock, Some(tx));
        let transition = dev.handle_connect(&mock, 4, Err("Connection failed".into()));

        assert_eq!(transition, Transition::Released(4));
        assert!(!dev.is_connecting());
        assert_eq!(dev.socket_id(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_other_connect_error_keeps_socket_for_next_attempt() {
        let (mut dev, _events) = device();
        let mock = connectable_mock(4);

        dev.connect(&mock, None);
        let transition = dev.handle_connect(&mock, 4, Err("Operation timed out".into()));

        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(dev.socket_id(), Some(4));
        assert!(!dev.is_connecting());
    }

    #[test]
    fn test_disconnect_without_socket_fires_immediately_without_transport_call() {
        // Arrange: a mock with no expectations panics on any call
        let (mut dev, _events) = device();
        let mock = MockTransport::new();
        let (tx, mut rx) = oneshot::channel();

        // Act
        dev.disconnect(&mock, false, Some(tx));

        // Assert
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[test]
    fn test_handle_disconnect_resets_state_and_fires_waiter() {
        let (mut dev, mut events) = device();
        let mut mock = connectable_mock(5);
        mock.expect_request_info().return_const(());
        mock.expect_disconnect().with(eq(5)).times(1).return_const(());
        mock.expect_close().with(eq(5)).times(1).return_const(());
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 5, Ok(()));
        let _ = events.try_recv();
        let (tx, mut rx) = oneshot::channel();

        dev.disconnect(&mock, false, Some(tx));
        let transition = dev.handle_disconnect(&mock, 5);

        assert_eq!(transition, Transition::Disconnected(5));
        assert!(!dev.is_connected());
        assert_eq!(dev.socket_id(), None);
        assert_eq!(rx.try_recv(), Ok(()));
        assert_eq!(
            events.try_recv().unwrap(),
            HubEvent::DeviceState {
                address: Address::from("AA:BB"),
                connected: false
            }
        );
    }

    #[test]
    fn test_completions_for_old_socket_are_ignored() {
        let (mut dev, _events) = device();
        let mock = connectable_mock(8);
        dev.connect(&mock, None);

        assert_eq!(dev.handle_close(2), Transition::Unchanged);
        assert_eq!(dev.handle_connect(&mock, 2, Ok(())), Transition::Unchanged);
        assert!(dev.is_connecting());
    }

    #[test]
    fn test_send_without_socket_is_dropped() {
        let (dev, _events) = device();
        let mock = MockTransport::new();
        dev.send(&mock, &[0xFF]);
    }

    #[test]
    fn test_send_error_not_connected_marks_disconnected() {
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(6);
        mock.expect_request_info().return_const(());
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 6, Ok(()));

        dev.handle_send(&mock, 6, Err("Socket not connected".into()));

        assert!(!dev.is_connected());
    }

    #[test]
    fn test_socket_not_found_is_treated_as_close() {
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(6);
        mock.expect_request_info().return_const(());
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 6, Ok(()));

        let transition = dev.handle_socket_info(&mock, 6, Err("Socket not found".into()));

        assert_eq!(transition, Transition::Disconnected(6));
        assert_eq!(dev.socket_id(), None);
    }

    #[test]
    fn test_non_fatal_receive_error_keeps_connection() {
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(6);
        mock.expect_request_info().return_const(());
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 6, Ok(()));

        let transition = dev.handle_error(&mock, 6, "timeout");

        assert_eq!(transition, Transition::Unchanged);
        assert!(dev.is_connected());
    }

    #[test]
    fn test_adopt_socket_takes_connected_socket_for_same_address() {
        let (mut dev, mut events) = device();
        let sockets = vec![
            SocketInfo {
                socket_id: 1,
                address: Some(Address::from("CC:DD")),
                connected: true,
                paused: false,
            },
            SocketInfo {
                socket_id: 2,
                address: Some(Address::from("AA:BB")),
                connected: true,
                paused: false,
            },
        ];

        let adopted = dev.adopt_socket(&sockets);

        assert_eq!(adopted, Some((2, None)));
        assert!(dev.is_connected());
        assert!(matches!(events.try_recv(), Ok(HubEvent::DeviceState { connected: true, .. })));
        // Same socket again is not re-adopted
        assert_eq!(dev.adopt_socket(&sockets), None);
    }

    #[test]
    fn test_pause_only_applies_to_connected_device() {
        let (mut dev, _events) = device();
        let mut mock = connectable_mock(9);
        mock.expect_request_info().return_const(());
        mock.expect_set_paused().with(eq(9), eq(true)).times(1).return_const(());

        dev.pause(&mock);
        dev.connect(&mock, None);
        dev.handle_connect(&mock, 9, Ok(()));
        dev.pause(&mock);
        dev.pause(&mock);

        assert!(dev.is_paused());
    }
}
