//! Discovery descriptors as reported by the Bluetooth transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::address::Address;

/// One entry in a discovery snapshot.
///
/// Field order matters: the derived `Ord` sorts by address first, which gives
/// snapshots a stable order before they are compared against the cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub address: Address,
    pub name: String,
    pub device_class: u32,
    /// Service UUIDs advertised by the device.
    #[serde(default)]
    pub uuids: Vec<Uuid>,
    /// Whether the platform reports an open link to the device.
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub paired: bool,
}

impl DeviceDescriptor {
    /// Convenience constructor for a paired, disconnected device.
    pub fn new(address: impl Into<Address>, name: &str, device_class: u32, uuids: Vec<Uuid>) -> Self {
        Self {
            address: address.into(),
            name: name.to_string(),
            device_class,
            uuids,
            connected: false,
            paired: true,
        }
    }
}

/// Sorts a discovery snapshot and serialises it into a cache key.
///
/// Two snapshots that differ only in order produce the same key.
pub fn snapshot_key(snapshot: &mut [DeviceDescriptor]) -> Result<String, serde_json::Error> {
    snapshot.sort();
    serde_json::to_string(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_ignores_input_order() {
        let a = DeviceDescriptor::new("AA:01", "Sphero-A", 7936, vec![]);
        let b = DeviceDescriptor::new("AA:02", "Sphero-B", 7936, vec![]);

        let key1 = snapshot_key(&mut [a.clone(), b.clone()]).unwrap();
        let key2 = snapshot_key(&mut [b, a]).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_snapshot_key_changes_with_connection_state() {
        let mut a = DeviceDescriptor::new("AA:01", "Sphero-A", 7936, vec![]);
        let before = snapshot_key(&mut [a.clone()]).unwrap();
        a.connected = true;
        let after = snapshot_key(&mut [a]).unwrap();
        assert_ne!(before, after);
    }
}
