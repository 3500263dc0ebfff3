//! Device discovery for Stream Deck style decks

use std::collections::HashSet;
use std::ffi::CString;

use hidapi::HidApi;
use tracing::{debug, info};

use crate::device_registry::{self, DeckKind};
use crate::error::TransportError;
use crate::hid_deck::HidDeck;
use crate::types::{DeckInfo, DiscoveredDeck};
use crate::BoxedDeck;

/// Device discovery abstraction
pub trait DeviceDiscovery: Send + Sync {
    /// List currently available decks, visual or not
    fn list_devices(&self) -> Result<Vec<DiscoveredDeck>, TransportError>;

    /// Open a specific deck
    fn open_device(&self, device: &DiscoveredDeck) -> Result<BoxedDeck, TransportError>;
}

/// HID device discovery
pub struct HidDiscovery {
    /// Known VID/PID pairs to look for
    known_devices: Vec<(u16, u16)>,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Create a discovery instance for every model in the registry
    pub fn new() -> Self {
        Self {
            known_devices: DeckKind::ALL
                .iter()
                .map(|k| (device_registry::VENDOR_ID, k.pid()))
                .collect(),
        }
    }

    /// Check if a device matches our known devices
    fn is_known_device(&self, vid: u16, pid: u16) -> bool {
        self.known_devices.contains(&(vid, pid))
    }

    fn api() -> Result<HidApi, TransportError> {
        HidApi::new().map_err(|e| TransportError::HidError(e.to_string()))
    }
}

impl DeviceDiscovery for HidDiscovery {
    fn list_devices(&self) -> Result<Vec<DiscoveredDeck>, TransportError> {
        let api = Self::api()?;
        let mut seen_paths = HashSet::new();
        let mut devices = Vec::new();

        for device_info in api.device_list() {
            let vid = device_info.vendor_id();
            let pid = device_info.product_id();

            if !self.is_known_device(vid, pid) {
                continue;
            }
            let Some(kind) = DeckKind::from_pid(pid) else {
                continue;
            };

            // hidapi may list one entry per top-level collection on the
            // same node
            let path = device_info.path().to_string_lossy().to_string();
            if !seen_paths.insert(path.clone()) {
                continue;
            }

            let serial = device_info.serial_number().map(|s| s.to_string());
            let product_name = device_info.product_string().map(|s| s.to_string());

            debug!(
                "Found device: VID={:04X} PID={:04X} kind={} path={}",
                vid, pid, kind, path
            );

            devices.push(DiscoveredDeck {
                info: DeckInfo {
                    vid,
                    pid,
                    kind,
                    device_path: path,
                    serial,
                    product_name,
                },
            });
        }

        debug!("Found {} deck(s)", devices.len());
        Ok(devices)
    }

    fn open_device(&self, device: &DiscoveredDeck) -> Result<BoxedDeck, TransportError> {
        let api = Self::api()?;
        let path = CString::new(device.info.device_path.clone()).map_err(|_| {
            TransportError::Internal(format!("invalid device path {:?}", device.info.device_path))
        })?;

        let handle = api.open_path(&path).map_err(|e| match TransportError::from(e) {
            TransportError::HidError(msg) => {
                TransportError::DeviceNotFound(format!("{}: {msg}", device.info.device_path))
            }
            other => other,
        })?;
        let input_handle = api.open_path(&path)?;

        info!(
            "Opened {} at {} ({:04X}:{:04X})",
            device.info.kind, device.info.device_path, device.info.vid, device.info.pid
        );

        Ok(Box::new(HidDeck::new(handle, input_handle, device.info.clone())?))
    }
}
