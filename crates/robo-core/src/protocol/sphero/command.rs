//! Sphero command set and its wire encoding.
//!
//! Every command a caller can issue is a variant of [`Command`] carrying a
//! typed parameter record, so an unsupported command cannot be constructed.
//! [`Command::from_name`] bridges the string-named surface used by scripts:
//! an unknown name is a hard error, while missing parameters fall back to
//! each record's defaults.
//!
//! Packet layout:
//! ```text
//! [0xFF][0xFF reply | 0xFE no reply][did:1][cid:1][seq:1][dlen:1][data:N][chk:1]
//! ```
//! with `dlen = N + 1` and `chk` computed over `did..data`.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::checksum::inverted_sum;
use crate::protocol::sphero::constants::{
    core, device, sphero, CallbackType, COMMAND_NO_REPLY, COMMAND_WITH_REPLY, SOP1,
};

/// Errors raised while building a command from its string name.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid parameters for {command}: {source}")]
    InvalidParams {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One encoded write.  Classic serial robots ignore the characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    pub bytes: Vec<u8>,
    pub characteristic: Option<Uuid>,
}

// ── Parameter records ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SleepParams {
    /// Seconds until the robot wakes again; 0 sleeps until woken.
    pub wakeup: u16,
    #[serde(rename = "macro")]
    pub macro_id: u8,
    pub org_basic: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeadingParams {
    pub heading: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StabilizationParams {
    pub enable: bool,
}

impl Default for StabilizationParams {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollisionParams {
    pub method: u8,
    pub threshold_x: u8,
    pub speed_x: u8,
    pub threshold_y: u8,
    pub speed_y: u8,
    /// Quiet period after an impact, in 10 ms units.
    pub dead_time: u8,
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            method: 0x01,
            threshold_x: 0x40,
            speed_x: 0x40,
            threshold_y: 0x50,
            speed_y: 0x50,
            dead_time: 0x50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RgbParams {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub persistent: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackLedParams {
    pub brightness: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RollParams {
    pub speed: u8,
    /// Degrees; values of 360 and above wrap.
    pub heading: u16,
    /// 1 drives, 0 brakes.
    pub state: u8,
}

impl Default for RollParams {
    fn default() -> Self {
        Self {
            speed: 0,
            heading: 0,
            state: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoostParams {
    pub enable: bool,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Every command the hub can send to a Sphero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    GetVersion,
    GetDeviceInfo,
    Sleep(SleepParams),
    SetHeading(HeadingParams),
    SetStabilization(StabilizationParams),
    SetCollisionDetection(CollisionParams),
    GetLocation,
    SetRgb(RgbParams),
    GetRgb,
    SetBackLed(BackLedParams),
    Roll(RollParams),
    Boost(BoostParams),
    /// Brakes and switches the back LED off.
    Stop,
}

impl Command {
    /// Builds a command from its script name and JSON parameters.
    ///
    /// `params` may be `null` or a partial object; absent fields take the
    /// record's defaults.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownCommand`] when `name` is not in the command
    /// set; [`CommandError::InvalidParams`] when a field has the wrong type
    /// or is out of range.
    pub fn from_name(name: &str, params: &serde_json::Value) -> Result<Self, CommandError> {
        let command = match name {
            "ping" => Self::Ping,
            "getVersion" => Self::GetVersion,
            "getDeviceInfo" => Self::GetDeviceInfo,
            "sleep" => Self::Sleep(parse(name, params)?),
            "setHeading" => Self::SetHeading(parse(name, params)?),
            "setStabilization" => Self::SetStabilization(parse(name, params)?),
            "setCollisionDetection" => Self::SetCollisionDetection(parse(name, params)?),
            "getLocation" => Self::GetLocation,
            "setRGB" => Self::SetRgb(parse(name, params)?),
            "getRGB" => Self::GetRgb,
            "setBackLed" => Self::SetBackLed(parse(name, params)?),
            "roll" => Self::Roll(parse(name, params)?),
            "boost" => Self::Boost(parse(name, params)?),
            "stop" => Self::Stop,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }

    /// Script name of the command, as accepted by [`Command::from_name`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::GetVersion => "getVersion",
            Self::GetDeviceInfo => "getDeviceInfo",
            Self::Sleep(_) => "sleep",
            Self::SetHeading(_) => "setHeading",
            Self::SetStabilization(_) => "setStabilization",
            Self::SetCollisionDetection(_) => "setCollisionDetection",
            Self::GetLocation => "getLocation",
            Self::SetRgb(_) => "setRGB",
            Self::GetRgb => "getRGB",
            Self::SetBackLed(_) => "setBackLed",
            Self::Roll(_) => "roll",
            Self::Boost(_) => "boost",
            Self::Stop => "stop",
        }
    }

    /// Kind of acknowledgement this command produces.
    ///
    /// [`CallbackType::None`] means nothing is routed back to the caller.
    pub fn callback_type(&self) -> CallbackType {
        match self {
            Self::GetVersion => CallbackType::Version,
            Self::GetDeviceInfo => CallbackType::DeviceInfo,
            Self::GetLocation => CallbackType::Location,
            Self::GetRgb => CallbackType::Rgb,
            _ => CallbackType::None,
        }
    }

    /// Returns `true` when the robot answers with a routed acknowledgement.
    pub fn expects_reply(&self) -> bool {
        self.callback_type() != CallbackType::None
    }

    /// Encodes the command into the writes to send, in order.
    pub fn encode(&self) -> Vec<CommandBuffer> {
        match *self {
            Self::Ping => vec![packet(true, device::CORE, core::PING, self.callback_type(), &[])],
            Self::GetVersion => vec![packet(true, device::CORE, core::VERSION, self.callback_type(), &[])],
            Self::GetDeviceInfo => vec![packet(true, device::CORE, core::DEVICE_INFO, self.callback_type(), &[])],
            Self::Sleep(p) => {
                let [w_hi, w_lo] = p.wakeup.to_be_bytes();
                let [o_hi, o_lo] = p.org_basic.to_be_bytes();
                vec![no_reply(device::CORE, core::SLEEP, &[w_hi, w_lo, p.macro_id, o_hi, o_lo])]
            }
            Self::SetHeading(p) => {
                vec![no_reply(device::SPHERO, sphero::HEADING, &(p.heading % 360).to_be_bytes())]
            }
            Self::SetStabilization(p) => {
                vec![no_reply(device::SPHERO, sphero::STABILIZATION, &[p.enable as u8])]
            }
            Self::SetCollisionDetection(p) => vec![no_reply(
                device::SPHERO,
                sphero::COLLISION_DETECTION,
                &[p.method, p.threshold_x, p.speed_x, p.threshold_y, p.speed_y, p.dead_time],
            )],
            Self::GetLocation => vec![packet(true, device::SPHERO, sphero::GET_LOCATION, self.callback_type(), &[])],
            Self::SetRgb(p) => vec![no_reply(
                device::SPHERO,
                sphero::SET_RGB_LED,
                &[p.red, p.green, p.blue, p.persistent as u8],
            )],
            Self::GetRgb => vec![packet(true, device::SPHERO, sphero::GET_RGB_LED, self.callback_type(), &[])],
            Self::SetBackLed(p) => vec![no_reply(device::SPHERO, sphero::BACK_LED, &[p.brightness])],
            Self::Roll(p) => vec![roll(p)],
            Self::Boost(p) => vec![no_reply(device::SPHERO, sphero::BOOST, &[p.enable as u8])],
            Self::Stop => vec![
                roll(RollParams {
                    speed: 0,
                    heading: 0,
                    state: 0,
                }),
                no_reply(device::SPHERO, sphero::BACK_LED, &[0]),
            ],
        }
    }
}

fn parse<T>(command: &str, params: &serde_json::Value) -> Result<T, CommandError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|source| CommandError::InvalidParams {
        command: command.to_string(),
        source,
    })
}

fn roll(p: RollParams) -> CommandBuffer {
    let [h_hi, h_lo] = (p.heading % 360).to_be_bytes();
    no_reply(device::SPHERO, sphero::ROLL, &[p.speed, h_hi, h_lo, p.state])
}

fn no_reply(did: u8, cid: u8, data: &[u8]) -> CommandBuffer {
    packet(false, did, cid, CallbackType::None, data)
}

fn packet(reply: bool, did: u8, cid: u8, seq: CallbackType, data: &[u8]) -> CommandBuffer {
    let mut bytes = Vec::with_capacity(7 + data.len());
    bytes.push(SOP1);
    bytes.push(if reply { COMMAND_WITH_REPLY } else { COMMAND_NO_REPLY });
    bytes.push(did);
    bytes.push(cid);
    bytes.push(seq as u8);
    bytes.push(data.len() as u8 + 1);
    bytes.extend_from_slice(data);
    let chk = inverted_sum(&bytes[2..]);
    bytes.push(chk);
    CommandBuffer {
        bytes,
        characteristic: None,
    }
}
