//! The hub: a single task that owns every device and robot API.
//!
//! # Why one task? (for beginners)
//!
//! Transport completions, discovery notifications, monitoring ticks and
//! user commands all mutate the same state.  Instead of sharing that state
//! behind locks, the hub owns it outright and processes one input at a time
//! from its channels:
//!
//! ```text
//! TransportEvent ──┐
//! HubRequest ──────┼──▶ Hub::run ──▶ Devices / SpheroApi ──▶ HubEvent
//! throttle timer ──┘
//! ```
//!
//! Every handler runs to completion before the next input is taken, so no
//! two handlers ever observe each other half-way through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use robo_core::{Address, Command, CommandError, Profile, RobotFamily, SpheroEvent};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::application::connection::DeviceLink;
use crate::application::devices::{Devices, RegistryOutcome};
use crate::application::events::HubEvent;
use crate::application::robot_api::{SpheroApi, SpheroConfig};
use crate::application::transport::{SocketProperties, Transport, TransportEvent};

/// Errors returned by hub operations addressed at one device.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("unknown device: {0}")]
    UnknownDevice(Address),

    /// The device has no robot API attached (not connected, or not a Sphero).
    #[error("no robot api attached to {0}")]
    NotAttached(Address),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Requests posted to the hub from other tasks.
#[derive(Debug)]
pub enum HubRequest {
    Exec {
        address: Address,
        command: Command,
    },
    AutoConnect {
        name: String,
        ready: Option<oneshot::Sender<Address>>,
    },
    Disconnect {
        address: Address,
        done: Option<oneshot::Sender<()>>,
    },
    Monitor {
        address: Address,
        enable: bool,
    },
    Shutdown,
}

/// Hub-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub socket: SocketProperties,
    pub discovery_interval: Duration,
    pub sphero: SpheroConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            socket: SocketProperties::default(),
            discovery_interval: Duration::from_millis(5000),
            sphero: SpheroConfig::default(),
        }
    }
}

pub struct Hub {
    transport: Arc<dyn Transport>,
    devices: Devices,
    robots: HashMap<Address, SpheroApi>,
    config: HubConfig,
    events: UnboundedSender<HubEvent>,
    requests_tx: UnboundedSender<HubRequest>,
    requests_rx: Option<UnboundedReceiver<HubRequest>>,
}

impl Hub {
    /// Creates a hub and the receiving end of its event stream.
    pub fn new(
        transport: Arc<dyn Transport>,
        profiles: Vec<Profile>,
        config: HubConfig,
    ) -> (Self, UnboundedReceiver<HubEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let devices = Devices::new(
            profiles,
            config.socket.clone(),
            config.discovery_interval,
            events.clone(),
        );
        let hub = Self {
            transport,
            devices,
            robots: HashMap::new(),
            config,
            events,
            requests_tx,
            requests_rx: Some(requests_rx),
        };
        (hub, events_rx)
    }

    /// Sender for posting [`HubRequest`]s from other tasks.
    pub fn requests(&self) -> UnboundedSender<HubRequest> {
        self.requests_tx.clone()
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    /// Robot API attached to `address`, if any.
    pub fn robot(&self, address: &Address) -> Option<&SpheroApi> {
        self.robots.get(address)
    }

    /// Closes leftover sockets and runs the first discovery pass.
    pub fn prepare(&mut self) {
        self.devices.prepare(self.transport.as_ref());
        self.drain_outcomes();
    }

    /// Connects a device by name.
    ///
    /// Returns a receiver that yields the device address once it is
    /// connected, or `None` when no device matches.
    pub fn auto_connect(&mut self, name: &str) -> Option<oneshot::Receiver<Address>> {
        let (tx, rx) = oneshot::channel();
        let found = self.devices.auto_connect(self.transport.as_ref(), name, Some(tx));
        found.then_some(rx)
    }

    /// Executes a command on the robot at `address`.
    pub fn exec(&mut self, address: &Address, command: Command) -> Result<(), HubError> {
        let transport = self.transport.as_ref();
        let device = self
            .devices
            .device_mut(address)
            .ok_or_else(|| HubError::UnknownDevice(address.clone()))?;
        let api = self
            .robots
            .get_mut(address)
            .ok_or_else(|| HubError::NotAttached(address.clone()))?;
        api.exec(&mut DeviceLink::new(device, transport), command);
        Ok(())
    }

    /// Executes a command given by its script name.
    ///
    /// # Errors
    ///
    /// [`HubError::Command`] for an unknown command name or bad parameters,
    /// in addition to the errors of [`Hub::exec`].
    pub fn exec_named(
        &mut self,
        address: &Address,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<(), HubError> {
        let command = Command::from_name(name, params)?;
        self.exec(address, command)
    }

    /// Executes a command and returns a receiver for its acknowledgement.
    pub fn exec_with_reply(
        &mut self,
        address: &Address,
        command: Command,
    ) -> Result<oneshot::Receiver<SpheroEvent>, HubError> {
        let transport = self.transport.as_ref();
        let device = self
            .devices
            .device_mut(address)
            .ok_or_else(|| HubError::UnknownDevice(address.clone()))?;
        let api = self
            .robots
            .get_mut(address)
            .ok_or_else(|| HubError::NotAttached(address.clone()))?;
        Ok(api.exec_with_reply(&mut DeviceLink::new(device, transport), command))
    }

    /// Turns location polling on or off for the robot at `address`.
    pub fn monitor(&mut self, address: &Address, enable: bool) -> Result<(), HubError> {
        let transport = self.transport.as_ref();
        let device = self
            .devices
            .device_mut(address)
            .ok_or_else(|| HubError::UnknownDevice(address.clone()))?;
        let api = self
            .robots
            .get_mut(address)
            .ok_or_else(|| HubError::NotAttached(address.clone()))?;
        api.monitor(&DeviceLink::new(device, transport), enable);
        Ok(())
    }

    /// Disconnects the device at `address`, stopping its robot first.
    pub fn disconnect(&mut self, address: &Address, done: Option<oneshot::Sender<()>>) -> Result<(), HubError> {
        let transport = self.transport.as_ref();
        let device = self
            .devices
            .device_mut(address)
            .ok_or_else(|| HubError::UnknownDevice(address.clone()))?;
        match self.robots.get_mut(address) {
            Some(api) => api.disconnect(&mut DeviceLink::new(device, transport), done),
            None => device.disconnect(transport, false, done),
        }
        Ok(())
    }

    // ── Event handling ────────────────────────────────────────────────────────

    /// Processes one transport completion or notification.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let outcomes = self
            .devices
            .handle_event(self.transport.as_ref(), event, Instant::now());
        for outcome in outcomes {
            self.apply(outcome);
        }
    }

    /// Processes one posted request.  Returns `false` on shutdown.
    pub fn handle_request(&mut self, request: HubRequest) -> bool {
        match request {
            HubRequest::Exec { address, command } => {
                if let Err(e) = self.exec(&address, command) {
                    debug!("dropping {}: {e}", command.name());
                }
            }
            HubRequest::AutoConnect { name, ready } => {
                if !self.devices.auto_connect(self.transport.as_ref(), &name, ready) {
                    warn!("auto-connect found no device named {name}");
                }
            }
            HubRequest::Disconnect { address, done } => {
                if let Err(e) = self.disconnect(&address, done) {
                    warn!("disconnect failed: {e}");
                }
            }
            HubRequest::Monitor { address, enable } => {
                if let Err(e) = self.monitor(&address, enable) {
                    debug!("monitor request ignored: {e}");
                }
            }
            HubRequest::Shutdown => return false,
        }
        true
    }

    /// Runs the deferred discovery refresh if it is due.
    pub fn poll_discovery(&mut self) {
        if self
            .devices
            .poll_discovery(self.transport.as_ref(), Instant::now())
        {
            self.drain_outcomes();
        }
    }

    /// Runs the hub until [`HubRequest::Shutdown`] or until the transport
    /// event channel closes.
    pub async fn run(mut self, mut transport_events: UnboundedReceiver<TransportEvent>) {
        let Some(mut requests) = self.requests_rx.take() else {
            warn!("hub is already running");
            return;
        };
        info!("hub running");

        loop {
            let deadline = self.devices.discovery_deadline();
            let discovery = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = transport_events.recv() => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => {
                        info!("transport closed");
                        break;
                    }
                },
                request = requests.recv() => match request {
                    Some(request) => {
                        if !self.handle_request(request) {
                            break;
                        }
                    }
                    None => break,
                },
                () = discovery => self.poll_discovery(),
            }
        }

        self.shutdown();
    }

    /// Stops every robot and releases the monitors.
    pub fn shutdown(&mut self) {
        info!("hub shutting down");
        let transport = self.transport.as_ref();
        for (address, api) in self.robots.iter_mut() {
            if let Some(device) = self.devices.device_mut(address) {
                if device.is_connected() {
                    api.clean_up(&mut DeviceLink::new(device, transport));
                }
            }
            api.reset();
        }
    }

    fn drain_outcomes(&mut self) {
        for outcome in self.devices.take_outcomes() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: RegistryOutcome) {
        match outcome {
            RegistryOutcome::Connected(address) => self.attach(address),
            RegistryOutcome::Disconnected(address) => {
                if let Some(api) = self.robots.get_mut(&address) {
                    api.reset();
                }
            }
            RegistryOutcome::Removed(address) => {
                self.robots.remove(&address);
            }
            RegistryOutcome::Data(address, bytes) => {
                if let Some(api) = self.robots.get_mut(&address) {
                    api.handle_data(&bytes);
                }
                let _ = self.events.send(HubEvent::DataReceived { address, bytes });
            }
        }
    }

    /// Attaches (or re-prepares) the robot API for a newly connected device.
    fn attach(&mut self, address: Address) {
        let transport = self.transport.as_ref();
        let Some(device) = self.devices.device_mut(&address) else {
            return;
        };
        if device.profile().family != RobotFamily::Sphero {
            debug!(%address, "no robot api for {:?}", device.profile().family);
            return;
        }
        let api = self.robots.entry(address.clone()).or_insert_with(|| {
            SpheroApi::new(
                address.clone(),
                self.config.sphero.clone(),
                self.events.clone(),
                self.requests_tx.clone(),
            )
        });
        api.connect(&mut DeviceLink::new(device, transport));
    }
}
