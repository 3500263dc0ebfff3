//! Common types for the transport layer

use crate::device_registry::DeckKind;

/// Encoding the device expects for key images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    /// Baseline JPEG (protocol generation 2)
    Jpeg,
    /// 24-bit BMP (protocol generation 1)
    Bmp,
}

/// Native key image geometry and orientation for a deck model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyImageFormat {
    /// Key image width in pixels
    pub width: u32,
    /// Key image height in pixels
    pub height: u32,
    /// Wire encoding
    pub encoding: ImageEncoding,
    /// Counter-clockwise rotation in degrees (0, 90, 180, 270), applied before flipping
    pub rotation: u16,
    /// Mirror horizontally
    pub flip_horizontal: bool,
    /// Mirror vertically
    pub flip_vertical: bool,
}

impl KeyImageFormat {
    /// Key image size as (width, height)
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Device identification information
#[derive(Debug, Clone)]
pub struct DeckInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Model, resolved from the product ID
    pub kind: DeckKind,
    /// hidraw path (stable for the lifetime of the connection)
    pub device_path: String,
    /// Serial number as reported by the USB descriptor, if available
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

impl DeckInfo {
    /// Short identifier used in log lines
    pub fn id(&self) -> &str {
        &self.device_path
    }
}

/// A key changed state on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Physical key index, 0-based, row-major from the top-left key
    pub key: u8,
    /// True on the key-down edge, false on release
    pub pressed: bool,
}

/// Discovered device that can be opened
#[derive(Debug, Clone)]
pub struct DiscoveredDeck {
    /// Device information
    pub info: DeckInfo,
}

impl DiscoveredDeck {
    /// Whether the model has per-key displays
    pub fn is_visual(&self) -> bool {
        self.info.kind.is_visual()
    }
}
