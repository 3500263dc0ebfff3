//! Transport error types

use thiserror::Error;

/// Errors that can occur while talking to a deck
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Device handle already closed")]
    Closed,

    #[error("Key {key} out of range (device has {key_count} keys)")]
    KeyOutOfRange { key: u8, key_count: u8 },

    #[error("Device has no key display")]
    NotVisual,

    #[error("Invalid report: {0}")]
    InvalidReport(String),

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
