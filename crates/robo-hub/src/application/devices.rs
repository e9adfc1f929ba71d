//! Device registry: discovery, profile matching, and socket routing.
//!
//! The registry is the hub's in-memory database of every Bluetooth device
//! that matched a known robot profile.  It owns:
//!
//! - the [`Device`] for each address,
//! - the socket index that routes transport completions to a device,
//! - the discovery cache that suppresses identical snapshots,
//! - the [`Throttle`] that coalesces bursts of discovery notifications.
//!
//! # Socket index invariant
//!
//! For every `(socket, address)` entry, the device at `address` currently
//! holds `socket`.  Entries are added when a connect succeeds (or an open
//! socket is adopted) and removed on disconnect, close, and removal.
//!
//! # Outcomes
//!
//! Handlers queue [`RegistryOutcome`]s describing what the hub must react
//! to (attach a robot API, feed received bytes, drop state).  The hub drains
//! them after every call with [`Devices::take_outcomes`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rand::seq::SliceRandom;
use robo_core::domain::descriptor::snapshot_key;
use robo_core::domain::profile::find_profile;
use robo_core::{Address, DeviceDescriptor, Profile, SocketId};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::device::{Device, Transition};
use crate::application::events::HubEvent;
use crate::application::throttle::Throttle;
use crate::application::transport::{SocketInfo, SocketProperties, Transport, TransportEvent};

/// Something the hub must react to after a registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOutcome {
    Connected(Address),
    Disconnected(Address),
    /// The device disappeared from discovery and was dropped.
    Removed(Address),
    Data(Address, Vec<u8>),
}

/// In-memory registry of all recognised devices.
pub struct Devices {
    profiles: Vec<Profile>,
    devices: HashMap<Address, Device>,
    sockets: HashMap<SocketId, Address>,
    discovery_cache: Option<String>,
    unknown_names: HashSet<String>,
    throttle: Throttle,
    socket_properties: SocketProperties,
    events: UnboundedSender<HubEvent>,
    prepared: bool,
    outcomes: Vec<RegistryOutcome>,
}

impl Devices {
    /// Creates an empty registry matching against `profiles` in order.
    pub fn new(
        profiles: Vec<Profile>,
        socket_properties: SocketProperties,
        discovery_interval: Duration,
        events: UnboundedSender<HubEvent>,
    ) -> Self {
        Self {
            profiles,
            devices: HashMap::new(),
            sockets: HashMap::new(),
            discovery_cache: None,
            unknown_names: HashSet::new(),
            throttle: Throttle::new(discovery_interval),
            socket_properties,
            events,
            prepared: false,
            outcomes: Vec::new(),
        }
    }

    /// Closes sockets left over from an earlier session and runs the first
    /// discovery pass.  Only the first call has any effect.
    pub fn prepare(&mut self, transport: &dyn Transport) {
        if self.prepared {
            return;
        }
        info!("preparing bluetooth devices");
        self.prepared = true;
        self.close_sockets(transport);
        self.update_devices(transport);
    }

    /// Closes every socket the transport knows about.
    pub fn close_sockets(&mut self, transport: &dyn Transport) {
        for socket in transport.sockets() {
            debug!(socket_id = socket.socket_id, "closing leftover socket");
            transport.close(socket.socket_id);
        }
    }

    // ── Discovery ─────────────────────────────────────────────────────────────

    /// Pulls a discovery snapshot and processes it.
    pub fn update_devices(&mut self, transport: &dyn Transport) -> bool {
        let snapshot = transport.devices();
        self.handle_devices(transport, snapshot)
    }

    /// Processes a discovery snapshot.
    ///
    /// Returns `false` without touching any device when the sorted snapshot
    /// is identical to the last one processed.
    pub fn handle_devices(&mut self, transport: &dyn Transport, mut snapshot: Vec<DeviceDescriptor>) -> bool {
        let key = match snapshot_key(&mut snapshot) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("could not serialise discovery snapshot: {e}");
                None
            }
        };
        if key.is_some() && key == self.discovery_cache {
            debug!("discovery snapshot unchanged");
            return false;
        }

        if snapshot.is_empty() {
            warn!("no bluetooth devices found");
        }

        let mut open_sockets = None;
        for descriptor in &snapshot {
            if let Some(device) = self.devices.get_mut(&descriptor.address) {
                device.refresh(descriptor);
                device.update_info(transport);
            } else {
                match find_profile(&self.profiles, descriptor) {
                    Some(profile) => {
                        info!(
                            address = %descriptor.address,
                            "found {} ({})",
                            descriptor.name,
                            profile.name
                        );
                        let device = Device::new(
                            descriptor,
                            profile.clone(),
                            self.socket_properties.clone(),
                            self.events.clone(),
                        );
                        self.devices.insert(descriptor.address.clone(), device);
                    }
                    None => {
                        debug!(address = %descriptor.address, "ignoring unknown device {}", descriptor.name);
                        continue;
                    }
                }
            }

            if descriptor.connected {
                let sockets = open_sockets.get_or_insert_with(|| transport.sockets());
                self.adopt(&descriptor.address, sockets);
            }
        }

        self.discovery_cache = key;
        true
    }

    fn adopt(&mut self, address: &Address, sockets: &[SocketInfo]) {
        let Some(device) = self.devices.get_mut(address) else {
            return;
        };
        let was_connected = device.is_connected();
        if let Some((socket_id, previous)) = device.adopt_socket(sockets) {
            if let Some(previous) = previous {
                self.sockets.remove(&previous);
            }
            self.sockets.insert(socket_id, address.clone());
            if !was_connected {
                self.outcomes.push(RegistryOutcome::Connected(address.clone()));
            }
        }
    }

    /// Forgets the last snapshot so the next one is processed in full.
    pub fn invalidate_cache(&mut self) {
        self.discovery_cache = None;
    }

    /// Runs the deferred discovery refresh if it is due.
    pub fn poll_discovery(&mut self, transport: &dyn Transport, now: Instant) -> bool {
        if self.throttle.poll(now) {
            self.update_devices(transport);
            true
        } else {
            false
        }
    }

    /// When the deferred discovery refresh is due, if one is pending.
    pub fn discovery_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    fn request_discovery(&mut self, transport: &dyn Transport, now: Instant) {
        self.invalidate_cache();
        if self.throttle.fire(now) {
            self.update_devices(transport);
        }
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Returns the device at `address`, logging when it is unknown.
    pub fn device(&self, address: &Address) -> Option<&Device> {
        let device = self.devices.get(address);
        if device.is_none() {
            error!(%address, "unknown device");
        }
        device
    }

    /// Mutable variant of [`Devices::device`].
    pub fn device_mut(&mut self, address: &Address) -> Option<&mut Device> {
        let device = self.devices.get_mut(address);
        if device.is_none() {
            error!(%address, "unknown device");
        }
        device
    }

    /// All known devices, in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Address owning `socket_id`, according to the socket index.
    pub fn address_for_socket(&self, socket_id: SocketId) -> Option<&Address> {
        self.sockets.get(&socket_id)
    }

    /// Picks a device whose profile's name prefix contains `name`.
    ///
    /// The device's own advertised name is not consulted, so `"Sphero"`
    /// resolves a `Sphero-ABC` but `"ABC"` does not.  Connected devices are
    /// preferred; within the preferred group the choice is uniformly random.
    /// A name that matches nothing is logged once.
    pub fn device_by_name(&mut self, name: &str) -> Option<Address> {
        let (connected, idle): (Vec<&Device>, Vec<&Device>) = self
            .devices
            .values()
            .filter(|d| d.profile().name_prefix.contains(name))
            .partition(|d| d.is_connected());

        let group = if connected.is_empty() { idle } else { connected };
        match group.choose(&mut rand::thread_rng()) {
            Some(device) => Some(device.address().clone()),
            None => {
                if self.unknown_names.insert(name.to_string()) {
                    error!("no device named {name}");
                }
                None
            }
        }
    }

    // ── Connection management ─────────────────────────────────────────────────

    /// Connects the device at `address`, keeping the socket index in step
    /// when a stale socket is replaced.
    pub fn connect(
        &mut self,
        transport: &dyn Transport,
        address: &Address,
        ready: Option<oneshot::Sender<Address>>,
    ) -> bool {
        let Some(device) = self.devices.get_mut(address) else {
            error!(%address, "unknown device");
            return false;
        };
        if let Some(stale) = device.connect(transport, ready) {
            self.sockets.remove(&stale);
        }
        true
    }

    /// Connects a device by name unless one is already connected.
    ///
    /// `ready` fires with the device's address once it is connected (right
    /// away when it already is).  Returns `false` when no device matches.
    pub fn auto_connect(
        &mut self,
        transport: &dyn Transport,
        name: &str,
        ready: Option<oneshot::Sender<Address>>,
    ) -> bool {
        let Some(address) = self.device_by_name(name) else {
            return false;
        };
        let Some(device) = self.devices.get(&address) else {
            return false;
        };
        if device.is_connected() && device.socket_id().is_some() {
            if let Some(ready) = ready {
                let _ = ready.send(address);
            }
            return true;
        }
        self.connect(transport, &address, ready)
    }

    /// Disconnects the device at `address`.  `done` fires once it is down.
    pub fn disconnect(
        &mut self,
        transport: &dyn Transport,
        address: &Address,
        force: bool,
        done: Option<oneshot::Sender<()>>,
    ) -> bool {
        match self.device_mut(address) {
            Some(device) => {
                device.disconnect(transport, force, done);
                true
            }
            None => false,
        }
    }

    // ── Transport events ──────────────────────────────────────────────────────

    /// Single entry point for transport completions and notifications.
    ///
    /// Returns everything the hub must react to.
    pub fn handle_event(
        &mut self,
        transport: &dyn Transport,
        event: TransportEvent,
        now: Instant,
    ) -> Vec<RegistryOutcome> {
        match event {
            TransportEvent::DeviceAdded(descriptor) => {
                debug!(address = %descriptor.address, "device added");
                self.request_discovery(transport, now);
            }
            TransportEvent::DeviceChanged(descriptor) => {
                debug!(address = %descriptor.address, "device changed");
                self.request_discovery(transport, now);
            }
            TransportEvent::DeviceRemoved(descriptor) => {
                self.remove(transport, &descriptor.address);
                self.request_discovery(transport, now);
            }
            TransportEvent::ConnectCompleted {
                socket_id,
                address,
                result,
            } => {
                if let Some(device) = self.device_mut(&address) {
                    let transition = device.handle_connect(transport, socket_id, result);
                    self.apply(&address, transition);
                }
            }
            TransportEvent::DisconnectCompleted { socket_id } => {
                self.route(socket_id, |device| device.handle_disconnect(transport, socket_id));
            }
            TransportEvent::Closed { socket_id } => {
                self.route(socket_id, |device| device.handle_close(socket_id));
                self.sockets.remove(&socket_id);
            }
            TransportEvent::SendCompleted { socket_id, result } => {
                self.route(socket_id, |device| {
                    device.handle_send(transport, socket_id, result);
                    Transition::Unchanged
                });
            }
            TransportEvent::SocketInfo { socket_id, result } => {
                self.route(socket_id, |device| device.handle_socket_info(transport, socket_id, result));
            }
            TransportEvent::Received { socket_id, data } => self.receive_data(socket_id, data),
            TransportEvent::ReceiveError { socket_id, error } => {
                self.receive_error(transport, socket_id, &error);
            }
        }
        self.take_outcomes()
    }

    /// Routes received bytes to the device owning `socket_id`.
    ///
    /// Bytes for a socket nobody owns are dropped.
    pub fn receive_data(&mut self, socket_id: SocketId, data: Vec<u8>) {
        match self.sockets.get(&socket_id) {
            Some(address) => self.outcomes.push(RegistryOutcome::Data(address.clone(), data)),
            None => debug!(socket_id, len = data.len(), "data for unknown socket"),
        }
    }

    /// Routes a receive error to the device owning `socket_id`.
    pub fn receive_error(&mut self, transport: &dyn Transport, socket_id: SocketId, error: &str) {
        if !self.sockets.contains_key(&socket_id) {
            debug!(socket_id, "error for unknown socket: {error}");
            return;
        }
        self.route(socket_id, |device| device.handle_error(transport, socket_id, error));
    }

    /// Drains queued outcomes.
    pub fn take_outcomes(&mut self) -> Vec<RegistryOutcome> {
        std::mem::take(&mut self.outcomes)
    }

    /// Finds the device owning `socket_id` (through the index, or by scanning
    /// for a socket that has not connected yet) and applies `handler`.
    fn route(&mut self, socket_id: SocketId, handler: impl FnOnce(&mut Device) -> Transition) {
        let address = match self.sockets.get(&socket_id) {
            Some(address) => Some(address.clone()),
            None => self
                .devices
                .values()
                .find(|d| d.socket_id() == Some(socket_id))
                .map(|d| d.address().clone()),
        };
        let Some(address) = address else {
            debug!(socket_id, "event for unknown socket");
            return;
        };
        if let Some(device) = self.devices.get_mut(&address) {
            let transition = handler(device);
            self.apply(&address, transition);
        }
    }

    fn apply(&mut self, address: &Address, transition: Transition) {
        match transition {
            Transition::Unchanged => {}
            Transition::Connected(socket_id) => {
                self.sockets.insert(socket_id, address.clone());
                self.outcomes.push(RegistryOutcome::Connected(address.clone()));
            }
            Transition::Disconnected(socket_id) => {
                self.sockets.remove(&socket_id);
                self.outcomes.push(RegistryOutcome::Disconnected(address.clone()));
            }
            Transition::Released(socket_id) => {
                self.sockets.remove(&socket_id);
            }
        }
    }

    fn remove(&mut self, transport: &dyn Transport, address: &Address) {
        let Some(mut device) = self.devices.remove(address) else {
            return;
        };
        info!(%address, "device removed");
        if let Some(socket_id) = device.close(transport) {
            self.sockets.remove(&socket_id);
        }
        self.outcomes.push(RegistryOutcome::Removed(address.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::MockTransport;
    use mockall::predicate::eq;
    use robo_core::domain::profile::{RobotFamily, SERIAL_PORT_UUID, SPHERO_DEVICE_CLASS};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn registry(profiles: Vec<Profile>) -> (Devices, mpsc::UnboundedReceiver<HubEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Devices::new(profiles, SocketProperties::default(), Duration::from_millis(5000), tx),
            rx,
        )
    }

    fn sphero(address: &str, name: &str) -> DeviceDescriptor {
        DeviceDescriptor::new(address, name, SPHERO_DEVICE_CLASS, vec![SERIAL_PORT_UUID])
    }

    /// Marks `address` connected through `socket_id` the way the hub does.
    fn connect(devices: &mut Devices, mock: &MockTransport, address: &str, socket_id: SocketId) {
        let address = Address::from(address);
        devices.connect(mock, &address, None);
        devices.handle_event(
            mock,
            TransportEvent::ConnectCompleted {
                socket_id,
                address,
                result: Ok(()),
            },
            Instant::now(),
        );
    }

    fn permissive_mock() -> MockTransport {
        let mut mock = MockTransport::new();
        let mut next = 0;
        mock.expect_create().returning(move |_| {
            next += 1;
            Ok(next)
        });
        mock.expect_connect().return_const(());
        mock.expect_request_info().return_const(());
        mock.expect_close().return_const(());
        mock.expect_disconnect().return_const(());
        mock.expect_sockets().returning(Vec::new);
        mock
    }

    #[test]
    fn test_matching_descriptor_creates_disconnected_device() {
        // Arrange
        let profile = Profile {
            name: "Sphero 2.0".to_string(),
            family: RobotFamily::Sphero,
            device_class: 7936,
            uuid: Uuid::parse_str("22bb746f-2bb0-7554-2d6f-726568705327").unwrap(),
            name_prefix: "Sphero".to_string(),
        };
        let (mut devices, _rx) = registry(vec![profile.clone()]);
        let descriptor = DeviceDescriptor::new("AA:BB", "Sphero-XYZ", 7936, vec![profile.uuid]);
        let mock = MockTransport::new();

        // Act
        let processed = devices.handle_devices(&mock, vec![descriptor]);

        // Assert
        assert!(processed);
        assert_eq!(devices.len(), 1);
        let device = devices.device(&Address::from("AA:BB")).unwrap();
        assert!(!device.is_connected());
        assert_eq!(device.profile().family, RobotFamily::Sphero);
    }

    #[test]
    fn test_identical_snapshot_is_processed_once() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = MockTransport::new();
        let a = sphero("AA:01", "Sphero-A");
        let b = sphero("AA:02", "Sphero-B");

        assert!(devices.handle_devices(&mock, vec![a.clone(), b.clone()]));
        // Same content in a different order
        assert!(!devices.handle_devices(&mock, vec![b, a]));
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn test_unknown_descriptor_is_ignored() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = MockTransport::new();

        devices.handle_devices(&mock, vec![DeviceDescriptor::new("AA:01", "Headset", 1028, vec![])]);

        assert!(devices.is_empty());
    }

    #[test]
    fn test_empty_snapshot_is_processed() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = MockTransport::new();
        assert!(devices.handle_devices(&mock, Vec::new()));
        assert!(!devices.handle_devices(&mock, Vec::new()));
    }

    #[test]
    fn test_device_by_name_prefers_connected_device() {
        // Arrange: two idle and one connected device share the name fragment
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(
            &mock,
            vec![sphero("AA:01", "Sphero-A"), sphero("AA:02", "Sphero-B"), sphero("AA:03", "Sphero-C")],
        );
        connect(&mut devices, &mock, "AA:02", 1);

        // Act / Assert: the connected one always wins
        for _ in 0..20 {
            assert_eq!(devices.device_by_name("Sphero"), Some(Address::from("AA:02")));
        }
    }

    #[test]
    fn test_device_by_name_unknown_returns_none() {
        // Arrange
        let (mut devices, _rx) = registry(Profile::builtin());

        // Act
        assert_eq!(devices.device_by_name("EV3"), None);
        assert_eq!(devices.device_by_name("EV3"), None);

        // Assert: remembered once so it is only logged once
        assert_eq!(devices.unknown_names.len(), 1);
        assert!(devices.unknown_names.contains("EV3"));
    }

    #[test]
    fn test_device_by_name_matches_profile_prefix_not_device_name() {
        // Arrange
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:BB", "Sphero-ABC")]);

        // Act / Assert
        assert_eq!(devices.device_by_name("ABC"), None);
        assert_eq!(devices.device_by_name("Sphero"), Some(Address::from("AA:BB")));
        assert_eq!(devices.device_by_name("pher"), Some(Address::from("AA:BB")));
        assert!(devices.unknown_names.contains("ABC"));
    }

    #[test]
    fn test_socket_index_follows_connect_and_disconnect() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);

        connect(&mut devices, &mock, "AA:01", 1);
        assert_eq!(devices.address_for_socket(1), Some(&Address::from("AA:01")));

        let outcomes = devices.handle_event(&mock, TransportEvent::DisconnectCompleted { socket_id: 1 }, Instant::now());

        assert_eq!(outcomes, vec![RegistryOutcome::Disconnected(Address::from("AA:01"))]);
        assert_eq!(devices.address_for_socket(1), None);
    }

    #[test]
    fn test_connect_completion_reports_connected_outcome() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);
        devices.connect(&mock, &Address::from("AA:01"), None);

        let outcomes = devices.handle_event(
            &mock,
            TransportEvent::ConnectCompleted {
                socket_id: 1,
                address: Address::from("AA:01"),
                result: Ok(()),
            },
            Instant::now(),
        );

        assert_eq!(outcomes, vec![RegistryOutcome::Connected(Address::from("AA:01"))]);
    }

    #[test]
    fn test_received_data_routes_by_socket() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);
        connect(&mut devices, &mock, "AA:01", 1);

        let known = devices.handle_event(&mock, TransportEvent::Received { socket_id: 1, data: vec![1, 2] }, Instant::now());
        let unknown = devices.handle_event(&mock, TransportEvent::Received { socket_id: 9, data: vec![3] }, Instant::now());

        assert_eq!(known, vec![RegistryOutcome::Data(Address::from("AA:01"), vec![1, 2])]);
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_fatal_receive_error_disconnects() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);
        connect(&mut devices, &mock, "AA:01", 1);

        let outcomes = devices.handle_event(
            &mock,
            TransportEvent::ReceiveError {
                socket_id: 1,
                error: "disconnected".into(),
            },
            Instant::now(),
        );

        assert_eq!(outcomes, vec![RegistryOutcome::Disconnected(Address::from("AA:01"))]);
        assert!(!devices.device(&Address::from("AA:01")).unwrap().is_connected());
    }

    #[test]
    fn test_removal_drops_device_and_closes_socket() {
        // Arrange
        let (mut devices, _rx) = registry(Profile::builtin());
        let mut mock = permissive_mock();
        let descriptor = sphero("AA:01", "Sphero-A");
        devices.handle_devices(&mock, vec![descriptor.clone()]);
        connect(&mut devices, &mock, "AA:01", 1);
        mock.expect_devices().returning(Vec::new);

        // Act
        let outcomes = devices.handle_event(&mock, TransportEvent::DeviceRemoved(descriptor), Instant::now());

        // Assert
        assert_eq!(outcomes, vec![RegistryOutcome::Removed(Address::from("AA:01"))]);
        assert!(devices.is_empty());
        assert_eq!(devices.address_for_socket(1), None);
    }

    #[test]
    fn test_notification_burst_triggers_one_immediate_refresh() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mut mock = MockTransport::new();
        mock.expect_devices().times(1).returning(|| vec![sphero("AA:01", "Sphero-A")]);
        let start = Instant::now();

        for i in 0..5 {
            devices.handle_event(
                &mock,
                TransportEvent::DeviceAdded(sphero("AA:01", "Sphero-A")),
                start + Duration::from_millis(i * 10),
            );
        }

        assert_eq!(devices.len(), 1);
        assert_eq!(devices.discovery_deadline(), Some(start + Duration::from_millis(5000)));
    }

    #[test]
    fn test_connected_descriptor_adopts_open_socket() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mut mock = MockTransport::new();
        mock.expect_sockets().times(1).returning(|| {
            vec![SocketInfo {
                socket_id: 4,
                address: Some(Address::from("AA:01")),
                connected: true,
                paused: false,
            }]
        });
        let mut descriptor = sphero("AA:01", "Sphero-A");
        descriptor.connected = true;

        devices.handle_devices(&mock, vec![descriptor]);

        assert_eq!(devices.address_for_socket(4), Some(&Address::from("AA:01")));
        assert_eq!(devices.take_outcomes(), vec![RegistryOutcome::Connected(Address::from("AA:01"))]);
    }

    #[test]
    fn test_auto_connect_fires_ready_for_connected_device() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mock = permissive_mock();
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);
        connect(&mut devices, &mock, "AA:01", 1);
        let (tx, mut rx) = oneshot::channel();

        assert!(devices.auto_connect(&mock, "Sphero", Some(tx)));

        assert_eq!(rx.try_recv().unwrap(), Address::from("AA:01"));
    }

    #[test]
    fn test_auto_connect_starts_connect_for_idle_device() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mut mock = MockTransport::new();
        mock.expect_create().times(1).returning(|_| Ok(3));
        mock.expect_connect()
            .with(eq(3), eq(Address::from("AA:01")), eq(SERIAL_PORT_UUID))
            .times(1)
            .return_const(());
        devices.handle_devices(&mock, vec![sphero("AA:01", "Sphero-A")]);

        assert!(devices.auto_connect(&mock, "Sphero", None));
        assert!(!devices.auto_connect(&mock, "EV3", None));
        assert!(devices.device(&Address::from("AA:01")).unwrap().is_connecting());
    }

    #[test]
    fn test_prepare_closes_leftover_sockets_once() {
        let (mut devices, _rx) = registry(Profile::builtin());
        let mut mock = MockTransport::new();
        mock.expect_sockets().times(1).returning(|| {
            vec![SocketInfo {
                socket_id: 11,
                address: None,
                connected: false,
                paused: false,
            }]
        });
        mock.expect_close().with(eq(11)).times(1).return_const(());
        mock.expect_devices().times(1).returning(Vec::new);

        devices.prepare(&mock);
        devices.prepare(&mock);
    }
}
