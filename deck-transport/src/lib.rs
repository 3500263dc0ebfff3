//! Transport layer for Stream Deck style button decks
//!
//! This crate provides a unified interface for the button-grid devices the
//! dispatcher drives:
//!
//! - Device discovery over HID (hidraw on Linux)
//! - A model registry describing key layout and image format per product
//! - Report builders for both wire protocol generations
//! - A reader thread turning input reports into per-key edge events

pub mod device_registry;
pub mod error;
pub mod event_parser;
pub mod protocol;
pub mod types;

mod discovery;
mod hid_deck;

pub use device_registry::{is_supported, DeckKind, Generation, VENDOR_ID};
pub use error::TransportError;
pub use event_parser::{KeyReaderConfig, KeyStateTracker};
pub use types::{DeckInfo, DiscoveredDeck, ImageEncoding, KeyEvent, KeyImageFormat};

pub use discovery::{DeviceDiscovery, HidDiscovery};
pub use hid_deck::HidDeck;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The core device trait - every backend implements this
///
/// Calls are synchronous and cheap relative to human key presses. Callers
/// that need several calls to land as one unit (reset followed by a full
/// page of images) hold a [`SharedDeck`] guard across the batch.
pub trait Deck: Send {
    /// Get device information
    fn info(&self) -> &DeckInfo;

    /// Device model
    fn kind(&self) -> DeckKind {
        self.info().kind
    }

    /// Whether the keys have displays
    fn is_visual(&self) -> bool {
        self.kind().is_visual()
    }

    /// Number of physical keys
    fn key_count(&self) -> u8 {
        self.kind().key_count()
    }

    /// Native key image format, `None` for non-visual devices
    fn image_format(&self) -> Option<KeyImageFormat> {
        self.kind().image_format()
    }

    /// False once [`Deck::close`] has run
    fn is_open(&self) -> bool;

    /// Serial number as reported by the firmware
    fn serial_number(&mut self) -> Result<String, TransportError>;

    /// Firmware version string
    fn firmware_version(&mut self) -> Result<String, TransportError>;

    /// Blank every key
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Set backlight brightness in percent (clamped to 0-100)
    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError>;

    /// Upload an image, already in the device's native encoding, to one key
    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError>;

    /// Subscribe to key edge events
    ///
    /// Events are pushed from a dedicated reader thread. The channel closes
    /// when the device is closed or disappears. Returns `None` if the
    /// backend has no input endpoint.
    fn subscribe_keys(&self) -> Option<broadcast::Receiver<KeyEvent>> {
        None
    }

    /// Release the device. Further writes fail with [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Type alias for a boxed deck
pub type BoxedDeck = Box<dyn Deck>;

/// A deck shared between its session and the teardown handler
///
/// The mutex guard is the exclusive-access scope for a batch of calls.
pub type SharedDeck = Arc<Mutex<BoxedDeck>>;

/// Wrap a deck for shared, exclusive access
pub fn share(deck: BoxedDeck) -> SharedDeck {
    Arc::new(Mutex::new(deck))
}
