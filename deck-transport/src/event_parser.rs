//! Key state parsing for deck input reports
//!
//! Decks report the full state of every key on each change. This module
//! extracts those states and turns them into per-key edge events, and
//! provides the reader loop that the HID transport runs on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hidapi::HidDevice;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::device_registry::{DeckKind, Generation};
use crate::protocol::{self, gen2};
use crate::types::KeyEvent;

/// Extract key states from a raw input report
///
/// Returns `None` for reports that do not carry key states (short reads,
/// dial or touchscreen reports on the Plus).
pub fn parse_key_states(kind: DeckKind, data: &[u8]) -> Option<Vec<bool>> {
    let generation = kind.generation();
    let offset = protocol::key_state_offset(generation);
    let key_count = kind.key_count() as usize;

    if data.len() < offset + key_count {
        return None;
    }
    if generation == Generation::Gen2 && data[1] != gen2::INPUT_TYPE_KEYS {
        return None;
    }

    Some(
        data[offset..offset + key_count]
            .iter()
            .map(|&b| b != 0)
            .collect(),
    )
}

/// Tracks the last known key states and reports edges
#[derive(Debug, Clone)]
pub struct KeyStateTracker {
    states: Vec<bool>,
}

impl KeyStateTracker {
    /// All keys start released
    pub fn new(key_count: u8) -> Self {
        Self {
            states: vec![false; key_count as usize],
        }
    }

    /// Apply a fresh state snapshot, returning one event per changed key
    /// in ascending key order
    pub fn update(&mut self, states: &[bool]) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for (key, (old, &new)) in self.states.iter_mut().zip(states).enumerate() {
            if *old != new {
                *old = new;
                events.push(KeyEvent {
                    key: key as u8,
                    pressed: new,
                });
            }
        }
        events
    }

    /// Current state of a key
    pub fn is_pressed(&self, key: u8) -> bool {
        self.states.get(key as usize).copied().unwrap_or(false)
    }
}

/// Configuration for the key reader loop
#[derive(Debug, Clone)]
pub struct KeyReaderConfig {
    /// Read timeout; bounds how long shutdown takes to be noticed
    pub read_timeout_ms: i32,
    /// Back-off after a read error
    pub error_sleep_ms: u64,
    /// Consecutive errors after which the device is considered gone
    pub max_consecutive_errors: u32,
}

impl Default for KeyReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 50,
            error_sleep_ms: 100,
            max_consecutive_errors: 20,
        }
    }
}

/// Blocking key reader loop
///
/// Reads input reports until the shutdown flag is set or the device keeps
/// failing, broadcasting one [`KeyEvent`] per key edge. Dropping the sender
/// on exit closes the channel, which subscribers see as disconnection.
pub fn run_key_reader_loop(
    input_device: HidDevice,
    kind: DeckKind,
    tx: broadcast::Sender<KeyEvent>,
    shutdown: Arc<AtomicBool>,
    config: KeyReaderConfig,
) {
    debug!("{} key reader thread started", kind);
    let mut buf = vec![0u8; protocol::input_report_len(kind.generation(), kind.key_count()).max(64)];
    let mut tracker = KeyStateTracker::new(kind.key_count());
    let mut consecutive_errors = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match input_device.read_timeout(&mut buf, config.read_timeout_ms) {
            Ok(len) if len > 0 => {
                consecutive_errors = 0;
                let Some(states) = parse_key_states(kind, &buf[..len]) else {
                    debug!("Ignoring {} byte non-key report", len);
                    continue;
                };
                for event in tracker.update(&states) {
                    // Ignore send errors: no subscriber yet is fine
                    let _ = tx.send(event);
                }
            }
            Ok(_) => {
                // Timeout, loop around to check shutdown
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!("{} key reader error: {}", kind, e);
                if consecutive_errors >= config.max_consecutive_errors {
                    warn!("{} key reader giving up after {} errors", kind, consecutive_errors);
                    break;
                }
                std::thread::sleep(Duration::from_millis(config.error_sleep_ms));
            }
        }
    }

    debug!("{} key reader thread exiting", kind);
}
