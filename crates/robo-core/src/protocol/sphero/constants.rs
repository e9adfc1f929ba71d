//! Byte codes for the Sphero protocol.

/// Start-of-packet byte shared by every frame.
pub const SOP1: u8 = 0xFF;

/// Second header byte of a command that wants an acknowledgement.
pub const COMMAND_WITH_REPLY: u8 = 0xFF;
/// Second header byte of a command sent without acknowledgement.
pub const COMMAND_NO_REPLY: u8 = 0xFE;

/// Second header byte of an acknowledgement frame.
pub const RESPONSE_ACK: u8 = 0xFF;
/// Second header byte of an asynchronous frame.
pub const RESPONSE_ASYNC: u8 = 0xFE;

/// Recognised frame headers.
pub const HEADERS: [&[u8]; 2] = [&[SOP1, RESPONSE_ACK], &[SOP1, RESPONSE_ASYNC]];

/// Smallest valid frame: header, code, seq, dlen and checksum.
pub const MINIMUM_FRAME_SIZE: usize = 6;

/// Response code carried by a one-byte acknowledgement announcing sleep.
pub const ACK_PRE_SLEEP: u8 = 0x05;

/// Unlock sequence that puts a SPRK+ into developer mode.
pub const DEVELOPER_MODE: [u8; 5] = [0x30, 0x31, 0x31, 0x69, 0x33];

/// Device identifiers (first byte of a command id).
pub mod device {
    pub const CORE: u8 = 0x00;
    pub const SPHERO: u8 = 0x02;
}

/// Command identifiers within the core device.
pub mod core {
    pub const PING: u8 = 0x01;
    pub const VERSION: u8 = 0x02;
    pub const SET_DEVICE_NAME: u8 = 0x10;
    pub const DEVICE_INFO: u8 = 0x11;
    pub const SET_AUTO_RECONNECT: u8 = 0x12;
    pub const GET_AUTO_RECONNECT: u8 = 0x13;
    pub const POWER_STATE: u8 = 0x20;
    pub const SLEEP: u8 = 0x22;
    pub const INACTIVITY_TIMEOUT: u8 = 0x25;
}

/// Command identifiers within the Sphero device.
pub mod sphero {
    pub const HEADING: u8 = 0x01;
    pub const STABILIZATION: u8 = 0x02;
    pub const ROTATION_RATE: u8 = 0x03;
    pub const SELF_LEVEL: u8 = 0x09;
    pub const DATA_STREAMING: u8 = 0x11;
    pub const COLLISION_DETECTION: u8 = 0x12;
    pub const SET_LOCATION: u8 = 0x13;
    pub const GET_LOCATION: u8 = 0x15;
    pub const SET_RGB_LED: u8 = 0x20;
    pub const BACK_LED: u8 = 0x21;
    pub const GET_RGB_LED: u8 = 0x22;
    pub const ROLL: u8 = 0x30;
    pub const BOOST: u8 = 0x31;
    pub const MOVE: u8 = 0x32;
    pub const RAW_MOTOR: u8 = 0x33;
    pub const MOTION_TIMEOUT: u8 = 0x34;
}

/// Sequence byte of a command, echoed back in its acknowledgement.
///
/// The protocol uses the sequence byte to name the kind of response expected
/// rather than as a counter, so at most one request per kind is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallbackType {
    None = 0x00,
    DeviceInfo = 0x05,
    Location = 0x10,
    Rgb = 0x15,
    Version = 0x20,
    Unknown = 0xF0,
}

impl From<u8> for CallbackType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::None,
            0x05 => Self::DeviceInfo,
            0x10 => Self::Location,
            0x15 => Self::Rgb,
            0x20 => Self::Version,
            _ => Self::Unknown,
        }
    }
}

/// Identifier code of an asynchronous message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AsyncId {
    PreSleep = 0x05,
    CollisionDetected = 0x07,
}

impl TryFrom<u8> for AsyncId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x05 => Ok(Self::PreSleep),
            0x07 => Ok(Self::CollisionDetected),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_type_maps_unassigned_bytes_to_unknown() {
        assert_eq!(CallbackType::from(0x05), CallbackType::DeviceInfo);
        assert_eq!(CallbackType::from(0x42), CallbackType::Unknown);
    }

    #[test]
    fn test_async_id_rejects_unknown_code() {
        assert_eq!(AsyncId::try_from(0x07), Ok(AsyncId::CollisionDetected));
        assert_eq!(AsyncId::try_from(0x09), Err(0x09));
    }
}
