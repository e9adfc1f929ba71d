//! Domain entities shared by every RoboHub component.

pub mod address;
pub mod descriptor;
pub mod profile;
