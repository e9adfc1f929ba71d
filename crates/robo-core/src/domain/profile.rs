//! Device profiles: how a discovered Bluetooth device is recognised as a robot.
//!
//! # How matching works (for beginners)
//!
//! A Bluetooth scan returns a list of nearby devices, each with a name, a
//! numeric *device class*, and the service UUIDs it advertises.  A
//! [`Profile`] is a signature for one robot model.  A device matches when
//! all three hold:
//!
//! 1. its device class equals the profile's class,
//! 2. its advertised UUIDs contain the profile's service UUID,
//! 3. its name contains the profile's name prefix.
//!
//! Profiles are checked in table order and the **first** match wins, so two
//! profiles that share a signature leave the later one unreachable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::descriptor::DeviceDescriptor;

/// Serial Port Profile service UUID used by classic Bluetooth robots.
pub const SERIAL_PORT_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// Device class reported by LEGO Mindstorms EV3 bricks.
pub const EV3_DEVICE_CLASS: u32 = 2052;

/// Device class reported by Sphero 2.0 / SPRK robots.
pub const SPHERO_DEVICE_CLASS: u32 = 7936;

/// Robot model family; selects which protocol stack handles the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotFamily {
    Ev3,
    Sphero,
    Mbot,
    MbotRanger,
}

/// Signature describing how to recognise one robot model in discovery results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Human-readable model name, e.g. `"Sphero 2.0"`.
    pub name: String,
    pub family: RobotFamily,
    pub device_class: u32,
    /// Service UUID that must appear in the device's advertised list.
    pub uuid: Uuid,
    /// Substring that must appear in the device's name.
    pub name_prefix: String,
}

impl Profile {
    /// Returns `true` when `descriptor` carries this profile's signature.
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        descriptor.device_class == self.device_class
            && descriptor.uuids.contains(&self.uuid)
            && descriptor.name.contains(&self.name_prefix)
    }

    /// Built-in profile table, in matching order.
    ///
    /// mBot and mBot Ranger advertise the same signature; the Ranger entry
    /// only becomes reachable when a configured profile with a narrower
    /// prefix is placed ahead of it.
    pub fn builtin() -> Vec<Profile> {
        vec![
            Profile {
                name: "EV3".to_string(),
                family: RobotFamily::Ev3,
                device_class: EV3_DEVICE_CLASS,
                uuid: SERIAL_PORT_UUID,
                name_prefix: "EV3".to_string(),
            },
            Profile {
                name: "Sphero 2.0".to_string(),
                family: RobotFamily::Sphero,
                device_class: SPHERO_DEVICE_CLASS,
                uuid: SERIAL_PORT_UUID,
                name_prefix: "Sphero".to_string(),
            },
            Profile {
                name: "mBot".to_string(),
                family: RobotFamily::Mbot,
                device_class: 0,
                uuid: SERIAL_PORT_UUID,
                name_prefix: "Makeblock".to_string(),
            },
            Profile {
                name: "mBot Ranger".to_string(),
                family: RobotFamily::MbotRanger,
                device_class: 0,
                uuid: SERIAL_PORT_UUID,
                name_prefix: "Makeblock".to_string(),
            },
        ]
    }
}

/// Returns the first profile in `profiles` that matches `descriptor`.
pub fn find_profile<'a>(profiles: &'a [Profile], descriptor: &DeviceDescriptor) -> Option<&'a Profile> {
    profiles.iter().find(|p| p.matches(descriptor))
}
