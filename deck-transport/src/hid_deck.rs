//! HID deck implementation over hidapi

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use hidapi::HidDevice;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::event_parser::{run_key_reader_loop, KeyReaderConfig};
use crate::protocol;
use crate::types::{DeckInfo, KeyEvent};
use crate::Deck;

/// Broadcast channel capacity for key events
const KEY_CHANNEL_CAPACITY: usize = 64;

/// Key reader thread and its stop flag
struct ReaderThread {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderThread {
    /// Start `body` on a named thread; it must return soon after the flag
    /// it is given is set
    fn spawn<F>(name: &str, body: F) -> Result<Self, TransportError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || body(flag))
            .map_err(|e| TransportError::Internal(format!("spawn {name}: {e}")))?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Key reader thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

/// HID transport for a USB connected deck
///
/// Two handles are opened on the same hidraw node: one for feature and
/// output reports, one owned by the key reader thread. Both are released
/// by [`Deck::close`].
pub struct HidDeck {
    /// Handle for feature and output reports, `None` once closed
    device: Option<HidDevice>,
    /// Device information
    info: DeckInfo,
    /// Template receiver; subscribers resubscribe from it. Only the reader
    /// thread holds the sender, so the channel closes when the reader exits.
    key_rx: broadcast::Receiver<KeyEvent>,
    reader: ReaderThread,
}

impl HidDeck {
    /// Create a deck from two handles on the same device and start the
    /// key reader thread
    pub fn new(
        device: HidDevice,
        input_device: HidDevice,
        info: DeckInfo,
    ) -> Result<Self, TransportError> {
        let (key_tx, key_rx) = broadcast::channel(KEY_CHANNEL_CAPACITY);

        let kind = info.kind;
        let reader = ReaderThread::spawn("deck-key-reader", move |shutdown| {
            run_key_reader_loop(
                input_device,
                kind,
                key_tx,
                shutdown,
                KeyReaderConfig::default(),
            );
        })?;

        Ok(Self {
            device: Some(device),
            info,
            key_rx,
            reader,
        })
    }

    fn device(&self) -> Result<&HidDevice, TransportError> {
        self.device.as_ref().ok_or(TransportError::Closed)
    }

    fn send_feature(&self, buf: &[u8]) -> Result<(), TransportError> {
        let device = self.device()?;
        debug!("Feature report: {:02X?}", &buf[..buf.len().min(8)]);
        device.send_feature_report(buf)?;
        Ok(())
    }

    fn read_feature_string(&self, report_id: u8, offset: usize) -> Result<String, TransportError> {
        let device = self.device()?;
        let mut buf = vec![0u8; protocol::feature_report_len(self.info.kind.generation())];
        buf[0] = report_id;
        let len = device.get_feature_report(&mut buf)?;
        if len <= offset {
            return Err(TransportError::InvalidReport(format!(
                "feature report 0x{report_id:02X} too short ({len} bytes)"
            )));
        }
        Ok(protocol::decode_report_string(&buf[offset..len]))
    }
}

impl Deck for HidDeck {
    fn info(&self) -> &DeckInfo {
        &self.info
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn serial_number(&mut self) -> Result<String, TransportError> {
        let (report_id, offset) = protocol::serial_report(self.info.kind.generation());
        self.read_feature_string(report_id, offset)
    }

    fn firmware_version(&mut self) -> Result<String, TransportError> {
        let (report_id, offset) = protocol::firmware_report(self.info.kind.generation());
        self.read_feature_string(report_id, offset)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.send_feature(&protocol::reset_report(self.info.kind.generation()))
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError> {
        self.send_feature(&protocol::brightness_report(
            self.info.kind.generation(),
            percent,
        ))
    }

    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError> {
        let device = self.device()?;
        if !self.is_visual() {
            return Err(TransportError::NotVisual);
        }
        let key_count = self.key_count();
        if key >= key_count {
            return Err(TransportError::KeyOutOfRange { key, key_count });
        }

        let reports = protocol::image_reports(self.info.kind.generation(), key, image);
        debug!("Key {} image: {} bytes in {} reports", key, image.len(), reports.len());
        for report in reports {
            device.write(&report)?;
        }
        Ok(())
    }

    fn subscribe_keys(&self) -> Option<broadcast::Receiver<KeyEvent>> {
        Some(self.key_rx.resubscribe())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // The reader thread owns the input handle and drops it on exit
        self.reader.stop();
        if self.device.take().is_some() {
            debug!("{}: HID handles released", self.info.id());
        }
        Ok(())
    }
}

impl Drop for HidDeck {
    fn drop(&mut self) {
        if self.reader.is_running() {
            debug!("HidDeck dropped, signaling key reader shutdown");
            self.reader.shutdown.store(true, Ordering::SeqCst);
        }
    }
}
