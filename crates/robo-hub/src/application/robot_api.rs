//! Sphero robot API: command execution and response routing.
//!
//! One [`SpheroApi`] exists per connected Sphero.  It owns the connection's
//! protocol engine (and with it the frame buffer), the location monitor, and
//! the table of requests waiting for an acknowledgement.
//!
//! # Request/response matching (for beginners)
//!
//! A Sphero echoes the sequence byte of a command in its acknowledgement.
//! Commands here use that byte to name the *kind* of answer they expect
//! (device info, location, colour), so the pending table holds at most one
//! request per kind.  Issuing a second `GetLocation` before the first is
//! answered replaces the older entry.
//!
//! Requests that stay unanswered longer than the acknowledgement timeout
//! are expired the next time the API executes a command or handles data.
//! Expiring drops the waiter, so a caller awaiting the reply observes a
//! closed channel instead of hanging forever.

use std::collections::HashMap;
use std::time::Duration;

use robo_core::protocol::sphero::command::{BackLedParams, CollisionParams, RgbParams, RollParams};
use robo_core::protocol::sphero::constants::CallbackType;
use robo_core::{Address, Command, CommandError, Protocol, SpheroEvent, SpheroMessage, SpheroProtocol};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::connection::Connection;
use crate::application::events::HubEvent;
use crate::application::hub::HubRequest;
use crate::application::monitoring::Monitoring;

/// Tunables for every Sphero the hub drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpheroConfig {
    pub monitor_interval: Duration,
    pub ack_timeout: Duration,
    /// Run the LED and motor self-test after connecting.
    pub self_test: bool,
}

impl Default for SpheroConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_millis(1000),
            ack_timeout: Duration::from_millis(5000),
            self_test: true,
        }
    }
}

#[derive(Debug)]
struct PendingRequest {
    command: &'static str,
    issued_at: Instant,
    waiter: Option<oneshot::Sender<SpheroEvent>>,
}

/// Per-connection Sphero driver.
pub struct SpheroApi {
    address: Address,
    protocol: SpheroProtocol,
    monitoring: Monitoring,
    pending: HashMap<CallbackType, PendingRequest>,
    prepared: bool,
    config: SpheroConfig,
    events: UnboundedSender<HubEvent>,
    requests: UnboundedSender<HubRequest>,
}

impl SpheroApi {
    pub fn new(
        address: Address,
        config: SpheroConfig,
        events: UnboundedSender<HubEvent>,
        requests: UnboundedSender<HubRequest>,
    ) -> Self {
        Self {
            address,
            protocol: SpheroProtocol::new(),
            monitoring: Monitoring::new(config.monitor_interval),
            pending: HashMap::new(),
            prepared: false,
            config,
            events,
            requests,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.is_started()
    }

    /// Number of requests still waiting for an acknowledgement.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Prepares a freshly connected device.
    ///
    /// Returns `false` when the device is not connected or was already
    /// prepared for this connection.
    pub fn connect(&mut self, conn: &mut dyn Connection) -> bool {
        if !conn.is_connected() || self.prepared {
            return false;
        }
        info!(address = %self.address, "preparing Sphero 2.0 api");
        self.progress("Preparing device ...", 1);
        self.progress(&format!("Prepare Sphero 2.0 api for {}", self.address), 2);
        self.prepare(conn);
        if self.config.self_test {
            self.run_test(conn);
        }
        self.progress("Ready ...", 3);
        true
    }

    fn prepare(&mut self, conn: &mut dyn Connection) {
        self.exec(conn, Command::GetDeviceInfo);
        self.exec(conn, Command::SetCollisionDetection(CollisionParams::default()));
        self.monitoring.start(self.address.clone(), self.requests.clone());
        self.prepared = true;
    }

    /// Cycles the LEDs and parks the robot facing backwards.
    fn run_test(&mut self, conn: &mut dyn Connection) {
        info!(address = %self.address, "running self test");
        let colours = [(255, 0, 0), (0, 255, 0), (0, 0, 255)];
        for (red, green, blue) in colours {
            self.exec(
                conn,
                Command::SetRgb(RgbParams {
                    red,
                    green,
                    blue,
                    persistent: true,
                }),
            );
            self.exec(conn, Command::GetRgb);
        }
        for brightness in [100, 75, 50, 25, 0] {
            self.exec(conn, Command::SetBackLed(BackLedParams { brightness }));
        }
        self.exec(
            conn,
            Command::SetRgb(RgbParams {
                green: 128,
                ..RgbParams::default()
            }),
        );
        self.exec(
            conn,
            Command::Roll(RollParams {
                speed: 0,
                heading: 180,
                state: 1,
            }),
        );
    }

    /// Enables or disables location monitoring.
    pub fn monitor(&mut self, conn: &dyn Connection, enable: bool) {
        if enable && conn.is_connected() {
            info!(address = %self.address, "enable monitoring");
            self.monitoring.start(self.address.clone(), self.requests.clone());
        } else if !enable {
            info!(address = %self.address, "disable monitoring");
            self.monitoring.stop();
        }
    }

    // ── Command execution ─────────────────────────────────────────────────────

    /// Sends `command`, registering a pending slot when it expects a reply.
    pub fn exec(&mut self, conn: &mut dyn Connection, command: Command) {
        self.dispatch(conn, command, None);
    }

    /// Builds a command from its script name and sends it.
    ///
    /// # Errors
    ///
    /// Propagates [`CommandError`] for unknown names or bad parameters;
    /// nothing is sent in that case.
    pub fn exec_named(
        &mut self,
        conn: &mut dyn Connection,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<(), CommandError> {
        let command = Command::from_name(name, params)?;
        self.exec(conn, command);
        Ok(())
    }

    /// Sends `command` and returns a receiver for its acknowledgement.
    ///
    /// The receiver observes a closed channel when the command expects no
    /// reply, the device is not connected, or the request expires.
    pub fn exec_with_reply(
        &mut self,
        conn: &mut dyn Connection,
        command: Command,
    ) -> oneshot::Receiver<SpheroEvent> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(conn, command, Some(tx));
        rx
    }

    fn dispatch(
        &mut self,
        conn: &mut dyn Connection,
        command: Command,
        waiter: Option<oneshot::Sender<SpheroEvent>>,
    ) {
        let now = Instant::now();
        self.expire(now);

        if !conn.is_connected() {
            debug!(address = %self.address, "not connected, dropping {}", command.name());
            return;
        }

        if command.expects_reply() {
            let previous = self.pending.insert(
                command.callback_type(),
                PendingRequest {
                    command: command.name(),
                    issued_at: now,
                    waiter,
                },
            );
            if let Some(previous) = previous {
                debug!(address = %self.address, "{} superseded before reply", previous.command);
            }
        }

        for buffer in command.encode() {
            conn.send(&buffer.bytes);
        }
    }

    /// Drops requests older than the acknowledgement timeout.
    pub fn expire(&mut self, now: Instant) {
        let timeout = self.config.ack_timeout;
        let address = &self.address;
        self.pending.retain(|_, request| {
            let alive = now.duration_since(request.issued_at) < timeout;
            if !alive {
                warn!(%address, "no acknowledgement for {} after {:?}", request.command, timeout);
            }
            alive
        });
    }

    // ── Incoming data ─────────────────────────────────────────────────────────

    /// Feeds received bytes, resolving pending requests and publishing every
    /// decoded event.
    pub fn handle_data(&mut self, bytes: &[u8]) {
        self.expire(Instant::now());

        for message in self.protocol.on_bytes(bytes) {
            let event = match message {
                SpheroMessage::Response { sequence, event } => {
                    self.resolve(sequence, &event);
                    event
                }
                SpheroMessage::Notification(event) => event,
            };
            if let SpheroEvent::DeviceInfo(info) = &event {
                info!(
                    address = %self.address,
                    "name: {} address: {} id: {}",
                    info.name,
                    info.address,
                    info.id_colors
                );
            }
            let _ = self.events.send(HubEvent::Robot {
                address: self.address.clone(),
                event,
            });
        }
    }

    fn resolve(&mut self, sequence: CallbackType, event: &SpheroEvent) {
        match self.pending.remove(&sequence) {
            Some(request) => {
                if let Some(waiter) = request.waiter {
                    let _ = waiter.send(event.clone());
                }
            }
            None => debug!(address = %self.address, ?sequence, "unsolicited acknowledgement"),
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Forgets per-connection state: frame buffer, pending requests, and the
    /// monitor.  The next [`SpheroApi::connect`] prepares from scratch.
    pub fn reset(&mut self) {
        self.protocol.reset();
        self.pending.clear();
        self.monitoring.stop();
        self.prepared = false;
    }

    /// Stops the robot and releases the monitor.
    pub fn clean_up(&mut self, conn: &mut dyn Connection) {
        self.exec(conn, Command::Stop);
        self.monitoring.clean_up();
    }

    /// Stops the robot and disconnects the device.
    pub fn disconnect(&mut self, conn: &mut dyn Connection, done: Option<oneshot::Sender<()>>) {
        self.clean_up(conn);
        conn.disconnect(false, done);
    }

    fn progress(&self, message: &str, step: u8) {
        let _ = self.events.send(HubEvent::ConnectProgress {
            address: self.address.clone(),
            message: message.to_string(),
            step,
        });
    }
}
