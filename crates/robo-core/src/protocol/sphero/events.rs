//! Typed records decoded from Sphero frames.

use serde::Serialize;

/// Identity block returned by a device-info request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
    /// Three-letter colour code flashed by the robot when identifying itself.
    pub id_colors: String,
}

/// Firmware and hardware revision block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub record_version: u8,
    pub model: u8,
    pub hardware: u8,
    pub main_app_version: u8,
    pub main_app_revision: u8,
    pub bootloader: u8,
    pub basic: u8,
    pub macros: u8,
    pub api_major: u8,
    pub api_minor: u8,
}

/// Main LED colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Locator reading: position in centimetres and velocity in cm/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub x: i16,
    pub y: i16,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub speed: u16,
}

/// Impact report produced when collision detection is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub axis: u8,
    pub magnitude_x: i16,
    pub magnitude_y: i16,
    pub speed: u8,
    pub timestamp: u32,
}

/// An event produced by the Sphero protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SpheroEvent {
    DeviceInfo(DeviceInfo),
    Version(VersionInfo),
    Rgb(Rgb),
    Location(Location),
    Collision(Collision),
    /// The robot will go to sleep shortly unless it receives a command.
    PreSleep,
}
