//! In-memory transport with one simulated Sphero.
//!
//! The simulated robot is always discoverable, accepts serial-port
//! connections, and answers commands with correctly framed and checksummed
//! acknowledgements.  Rolling changes its velocity; every location request
//! advances its position by one step.
//!
//! Completions are delivered on the channel returned by
//! [`SimulatedTransport::new`], exactly like a hardware transport would.

use std::collections::BTreeMap;
use std::sync::Mutex;

use robo_core::domain::profile::{SERIAL_PORT_UUID, SPHERO_DEVICE_CLASS};
use robo_core::protocol::checksum::{inverted_sum, verify};
use robo_core::protocol::sphero::constants::{core, device, sphero, RESPONSE_ACK, RESPONSE_ASYNC, SOP1};
use robo_core::{Address, DeviceDescriptor, SocketId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};
use uuid::Uuid;

use super::lock;
use crate::application::transport::{SocketInfo, SocketProperties, Transport, TransportError, TransportEvent};

/// Address of the simulated robot.
pub const ROBOT_ADDRESS: &str = "68:86:E7:00:00:01";
/// Advertised name of the simulated robot.
pub const ROBOT_NAME: &str = "Sphero-SIM";

#[derive(Debug, Default, Clone)]
struct SimSocket {
    address: Option<Address>,
    connected: bool,
    paused: bool,
}

#[derive(Debug, Default)]
struct SimRobot {
    x: f64,
    y: f64,
    speed: u8,
    heading: u16,
    rgb: [u8; 3],
    back_led: u8,
}

impl SimRobot {
    fn velocity(&self) -> (f64, f64) {
        let radians = f64::from(self.heading).to_radians();
        let speed = f64::from(self.speed);
        (speed * radians.sin(), speed * radians.cos())
    }

    fn step(&mut self) {
        let (vx, vy) = self.velocity();
        self.x += vx;
        self.y += vy;
    }
}

#[derive(Debug, Default)]
struct SimState {
    sockets: BTreeMap<SocketId, SimSocket>,
    next_socket: SocketId,
    robot: SimRobot,
}

/// A [`Transport`] backed by a simulated Sphero.
pub struct SimulatedTransport {
    state: Mutex<SimState>,
    events: UnboundedSender<TransportEvent>,
}

impl SimulatedTransport {
    /// Creates the transport and the receiver for its completions.
    pub fn new() -> (Self, UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            state: Mutex::new(SimState::default()),
            events,
        };
        (transport, rx)
    }

    /// Pushes a collision notification on every connected socket.
    pub fn simulate_collision(&self) {
        let state = lock(&self.state);
        let mut data = Vec::with_capacity(16);
        for axis in [120i16, -40, 8] {
            data.extend_from_slice(&axis.to_be_bytes());
        }
        data.push(0x01);
        data.extend_from_slice(&200i16.to_be_bytes());
        data.extend_from_slice(&0i16.to_be_bytes());
        data.push(state.robot.speed);
        data.extend_from_slice(&1000u32.to_be_bytes());
        let frame = response(RESPONSE_ASYNC, 0x07, 0x00, &data);
        for (socket_id, _) in state.sockets.iter().filter(|(_, s)| s.connected) {
            self.emit(TransportEvent::Received {
                socket_id: *socket_id,
                data: frame.clone(),
            });
        }
    }

    /// Drops every connected link as if the robot went out of range.
    pub fn drop_links(&self) {
        let mut state = lock(&self.state);
        for (socket_id, socket) in state.sockets.iter_mut().filter(|(_, s)| s.connected) {
            socket.connected = false;
            self.emit(TransportEvent::ReceiveError {
                socket_id: *socket_id,
                error: "disconnected".to_string(),
            });
        }
    }

    fn emit(&self, event: TransportEvent) {
        trace!(?event, "simulated transport event");
        let _ = self.events.send(event);
    }

    fn descriptor(state: &SimState) -> DeviceDescriptor {
        DeviceDescriptor {
            address: Address::from(ROBOT_ADDRESS),
            name: ROBOT_NAME.to_string(),
            device_class: SPHERO_DEVICE_CLASS,
            uuids: vec![SERIAL_PORT_UUID],
            connected: state.sockets.values().any(|s| s.connected),
            paired: true,
        }
    }

    /// Applies a command packet to the robot and builds its acknowledgement.
    fn execute(robot: &mut SimRobot, packet: &[u8]) -> Option<Vec<u8>> {
        if packet.len() < 7 || packet[0] != SOP1 {
            return None;
        }
        let wants_reply = packet[1] == 0xFF;
        let (did, cid, seq, dlen) = (packet[2], packet[3], packet[4], packet[5] as usize);
        if dlen == 0 || packet.len() < dlen + 6 || !verify(&packet[2..dlen + 5], packet[dlen + 5]) {
            debug!("simulated robot ignoring malformed packet");
            return None;
        }
        let data = &packet[6..dlen + 5];

        let mut reply = Vec::new();
        match (did, cid) {
            (device::CORE, core::DEVICE_INFO) => {
                let mut name = ROBOT_NAME.as_bytes().to_vec();
                name.resize(16, 0);
                reply.extend(name);
                reply.extend_from_slice(b"6886e7000001");
                reply.extend_from_slice(b"RGB");
            }
            (device::CORE, core::VERSION) => reply.extend_from_slice(&[2, 3, 1, 3, 1, 4, 2, 1, 1, 0]),
            (device::SPHERO, sphero::GET_LOCATION) => {
                robot.step();
                let (vx, vy) = robot.velocity();
                for value in [robot.x as i16, robot.y as i16, vx as i16, vy as i16] {
                    reply.extend_from_slice(&value.to_be_bytes());
                }
                reply.extend_from_slice(&u16::from(robot.speed).to_be_bytes());
            }
            (device::SPHERO, sphero::GET_RGB_LED) => reply.extend_from_slice(&robot.rgb),
            (device::SPHERO, sphero::SET_RGB_LED) if data.len() >= 3 => {
                robot.rgb.copy_from_slice(&data[..3]);
            }
            (device::SPHERO, sphero::BACK_LED) if !data.is_empty() => robot.back_led = data[0],
            (device::SPHERO, sphero::ROLL) if data.len() >= 4 => {
                robot.speed = if data[3] == 0 { 0 } else { data[0] };
                robot.heading = u16::from_be_bytes([data[1], data[2]]);
            }
            _ => {}
        }

        wants_reply.then(|| response(RESPONSE_ACK, 0x00, seq, &reply))
    }
}

impl Transport for SimulatedTransport {
    fn create(&self, _properties: &SocketProperties) -> Result<SocketId, TransportError> {
        let mut state = lock(&self.state);
        state.next_socket += 1;
        let socket_id = state.next_socket;
        state.sockets.insert(socket_id, SimSocket::default());
        Ok(socket_id)
    }

    fn connect(&self, socket_id: SocketId, address: &Address, uuid: Uuid) {
        let mut state = lock(&self.state);
        let result = match state.sockets.get_mut(&socket_id) {
            None => Err("Socket not found".to_string()),
            Some(_) if address.as_str() != ROBOT_ADDRESS || uuid != SERIAL_PORT_UUID => {
                Err("Connection failed: host is down (0x2743)".to_string())
            }
            Some(socket) => {
                socket.address = Some(address.clone());
                socket.connected = true;
                Ok(())
            }
        };
        self.emit(TransportEvent::ConnectCompleted {
            socket_id,
            address: address.clone(),
            result,
        });
    }

    fn disconnect(&self, socket_id: SocketId) {
        let mut state = lock(&self.state);
        if let Some(socket) = state.sockets.get_mut(&socket_id) {
            socket.connected = false;
        }
        self.emit(TransportEvent::DisconnectCompleted { socket_id });
    }

    fn close(&self, socket_id: SocketId) {
        let mut state = lock(&self.state);
        if state.sockets.remove(&socket_id).is_some() {
            self.emit(TransportEvent::Closed { socket_id });
        }
    }

    fn send(&self, socket_id: SocketId, bytes: &[u8]) {
        let mut state = lock(&self.state);
        let connected = state.sockets.get(&socket_id).map(|s| s.connected);
        match connected {
            Some(true) => {
                self.emit(TransportEvent::SendCompleted {
                    socket_id,
                    result: Ok(()),
                });
                if let Some(reply) = Self::execute(&mut state.robot, bytes) {
                    self.emit(TransportEvent::Received { socket_id, data: reply });
                }
            }
            Some(false) => self.emit(TransportEvent::SendCompleted {
                socket_id,
                result: Err("Socket not connected".to_string()),
            }),
            None => self.emit(TransportEvent::SendCompleted {
                socket_id,
                result: Err("Socket not found".to_string()),
            }),
        }
    }

    fn request_info(&self, socket_id: SocketId) {
        let state = lock(&self.state);
        let result = state
            .sockets
            .get(&socket_id)
            .map(|s| SocketInfo {
                socket_id,
                address: s.address.clone(),
                connected: s.connected,
                paused: s.paused,
            })
            .ok_or_else(|| "Socket not found".to_string());
        self.emit(TransportEvent::SocketInfo { socket_id, result });
    }

    fn set_paused(&self, socket_id: SocketId, paused: bool) {
        if let Some(socket) = lock(&self.state).sockets.get_mut(&socket_id) {
            socket.paused = paused;
        }
    }

    fn sockets(&self) -> Vec<SocketInfo> {
        lock(&self.state)
            .sockets
            .iter()
            .map(|(socket_id, s)| SocketInfo {
                socket_id: *socket_id,
                address: s.address.clone(),
                connected: s.connected,
                paused: s.paused,
            })
            .collect()
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        vec![Self::descriptor(&lock(&self.state))]
    }
}

/// Frames a robot response.
fn response(kind: u8, code: u8, seq: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 6);
    frame.extend_from_slice(&[SOP1, kind, code, seq, data.len() as u8 + 1]);
    frame.extend_from_slice(data);
    frame.push(inverted_sum(&frame[2..]));
    frame
}
