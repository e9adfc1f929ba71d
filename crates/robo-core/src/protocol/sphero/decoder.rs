//! Pure decoders from frame payloads to typed records.
//!
//! Each function takes the data bytes of a frame (header, length and
//! checksum already stripped) and either returns a record or a
//! [`DecodeError`] when the payload is too short.  Extra trailing bytes are
//! ignored so newer firmware that appends fields still decodes.

use crate::protocol::sphero::events::{Collision, DeviceInfo, Location, Rgb, VersionInfo};
use crate::protocol::DecodeError;

const NAME_LEN: usize = 16;
const ADDRESS_LEN: usize = 12;
const ID_COLORS_LEN: usize = 3;

/// Decodes the device-info block: name, Bluetooth address and ID colours.
pub fn device_info(data: &[u8]) -> Result<DeviceInfo, DecodeError> {
    require_len(data, NAME_LEN + ADDRESS_LEN + ID_COLORS_LEN, "device info")?;
    let name = read_text(&data[..NAME_LEN]);
    let address = read_text(&data[NAME_LEN..NAME_LEN + ADDRESS_LEN]);
    let id_colors = read_text(&data[NAME_LEN + ADDRESS_LEN..NAME_LEN + ADDRESS_LEN + ID_COLORS_LEN]);
    Ok(DeviceInfo {
        name,
        address,
        id_colors,
    })
}

/// Decodes the ten-byte version block.
pub fn version(data: &[u8]) -> Result<VersionInfo, DecodeError> {
    require_len(data, 10, "version")?;
    Ok(VersionInfo {
        record_version: data[0],
        model: data[1],
        hardware: data[2],
        main_app_version: data[3],
        main_app_revision: data[4],
        bootloader: data[5],
        basic: data[6],
        macros: data[7],
        api_major: data[8],
        api_minor: data[9],
    })
}

/// Decodes the main LED colour.
pub fn rgb(data: &[u8]) -> Result<Rgb, DecodeError> {
    require_len(data, 3, "rgb")?;
    Ok(Rgb {
        red: data[0],
        green: data[1],
        blue: data[2],
    })
}

/// Decodes a locator reading.
pub fn location(data: &[u8]) -> Result<Location, DecodeError> {
    require_len(data, 10, "location")?;
    Ok(Location {
        x: read_i16(data, 0),
        y: read_i16(data, 2),
        velocity_x: read_i16(data, 4),
        velocity_y: read_i16(data, 6),
        speed: read_u16(data, 8),
    })
}

/// Decodes a collision report.
pub fn collision(data: &[u8]) -> Result<Collision, DecodeError> {
    require_len(data, 16, "collision")?;
    Ok(Collision {
        x: read_i16(data, 0),
        y: read_i16(data, 2),
        z: read_i16(data, 4),
        axis: data[6],
        magnitude_x: read_i16(data, 7),
        magnitude_y: read_i16(data, 9),
        speed: data[11],
        timestamp: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_len(data: &[u8], needed: usize, context: &'static str) -> Result<(), DecodeError> {
    if data.len() < needed {
        Err(DecodeError::InsufficientData {
            context,
            needed,
            available: data.len(),
        })
    } else {
        Ok(())
    }
}

// Callers check the length first.
fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Reads a NUL-padded ASCII field.
fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(text: &str, len: usize) -> Vec<u8> {
        let mut v = text.as_bytes().to_vec();
        v.resize(len, 0);
        v
    }

    #[test]
    fn test_device_info_strips_padding() {
        // Arrange
        let mut data = padded("Sphero-RGB", 16);
        data.extend(padded("6886e7000001", 12));
        data.extend(b"RGB");

        // Act
        let info = device_info(&data).unwrap();

        // Assert
        assert_eq!(info.name, "Sphero-RGB");
        assert_eq!(info.address, "6886e7000001");
        assert_eq!(info.id_colors, "RGB");
    }

    #[test]
    fn test_device_info_rejects_short_payload() {
        let err = device_info(&[0u8; 20]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InsufficientData {
                context: "device info",
                needed: 31,
                available: 20
            }
        );
    }

    #[test]
    fn test_location_reads_signed_big_endian_fields() {
        let data = [0xFF, 0xF6, 0x00, 0x14, 0x00, 0x05, 0xFF, 0xFB, 0x00, 0x07];
        let loc = location(&data).unwrap();
        assert_eq!(loc.x, -10);
        assert_eq!(loc.y, 20);
        assert_eq!(loc.velocity_x, 5);
        assert_eq!(loc.velocity_y, -5);
        assert_eq!(loc.speed, 7);
    }

    #[test]
    fn test_collision_decodes_all_fields() {
        let data = [
            0x00, 0x01, 0xFF, 0xFF, 0x00, 0x02, 0x01, 0x00, 0x10, 0x00, 0x20, 0x30, 0x00, 0x00,
            0x01, 0x00,
        ];
        let c = collision(&data).unwrap();
        assert_eq!((c.x, c.y, c.z), (1, -1, 2));
        assert_eq!(c.axis, 1);
        assert_eq!((c.magnitude_x, c.magnitude_y), (16, 32));
        assert_eq!(c.speed, 0x30);
        assert_eq!(c.timestamp, 256);
    }

    #[test]
    fn test_rgb_ignores_trailing_bytes() {
        let c = rgb(&[1, 2, 3, 4]).unwrap();
        assert_eq!((c.red, c.green, c.blue), (1, 2, 3));
    }

    #[test]
    fn test_version_requires_ten_bytes() {
        assert!(version(&[0u8; 9]).is_err());
        assert_eq!(version(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap().api_minor, 10);
    }
}
