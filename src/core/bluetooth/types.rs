//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use bluest::Device;
use regex::Regex;

/// A train hub seen during a scan. Snapshot of the advertisement plus the
/// platform device handle needed to connect later.
#[derive(Debug, Clone)]
pub struct DiscoveredTrain {
    /// The device handle, used to connect after selection
    pub device: Device,
    /// Platform-specific unique identifier for the device (especially important on macOS)
    pub id: String,
    /// The advertised name, if the hub sent one
    pub name: String,
    /// The address of the device (MAC address where the platform exposes one)
    pub address: String,
    /// The signal strength (RSSI) at discovery time
    pub rssi: Option<i16>,
}

impl DiscoveredTrain {
    /// Builds a snapshot from a scan result. The MAC address is extracted
    /// from the platform id where present; some platforms (macOS) only hand
    /// out opaque identifiers.
    pub fn new(device: Device, name: String, rssi: Option<i16>) -> Self {
        let id = device.id().to_string();
        let address = extract_mac_address(&id).unwrap_or_else(|| "unknown".to_string());
        Self {
            device,
            id,
            name,
            address,
            rssi,
        }
    }
}

impl fmt::Display for DiscoveredTrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.address)?;
        if let Some(rssi) = self.rssi {
            write!(f, " ({rssi} dBm)")?;
        }
        Ok(())
    }
}

/// Pulls a MAC address out of a platform device id string, if one is
/// embedded in it. Windows ids carry the adapter address followed by the
/// device address, so the last match is the one that identifies the hub.
pub fn extract_mac_address(id: &str) -> Option<String> {
    let mac_regex = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").unwrap();
    mac_regex.find_iter(id).last().map(|m| m.as_str().to_uppercase())
}
