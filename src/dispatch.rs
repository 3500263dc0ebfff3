//! Top-level dispatcher
//!
//! Discovers decks, starts one session task per visual deck and owns the
//! failure handler: if any session or any setup step fails with a device
//! error, every deck opened so far is blanked and released before the error
//! is returned.

use std::sync::Arc;

use deck_transport::{share, Deck, DeviceDiscovery, DiscoveredDeck, SharedDeck, TransportError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::DeckError;
use crate::session::{DeckSession, SessionContext};

type SessionSet = JoinSet<(String, Result<(), DeckError>)>;

pub struct Dispatcher {
    discovery: Box<dyn DeviceDiscovery>,
    ctx: SessionContext,
    opened: Vec<SharedDeck>,
}

impl Dispatcher {
    pub fn new(discovery: Box<dyn DeviceDiscovery>, ctx: SessionContext) -> Self {
        Self {
            discovery,
            ctx,
            opened: Vec::new(),
        }
    }

    /// Drive every visual deck until all sessions end
    ///
    /// Returns the number of decks served. Setting `stop` to true ends all
    /// sessions cleanly.
    pub async fn run(&mut self, stop: watch::Receiver<bool>) -> Result<usize, DeckError> {
        let devices = self.discovery.list_devices()?;
        info!("Found {} stream deck(s)", devices.len());

        let mut sessions = SessionSet::new();
        for device in &devices {
            if !device.is_visual() {
                info!(
                    "Skipping '{}' at {}: no key displays",
                    device.info.kind, device.info.device_path
                );
                continue;
            }
            if let Err(e) = self.start_session(device, &stop, &mut sessions).await {
                error!("Failed to start {}: {}", device.info.device_path, e);
                sessions.shutdown().await;
                self.teardown();
                return Err(e);
            }
        }

        let served = sessions.len();
        if served == 0 {
            warn!("No stream deck with key displays found");
            return Ok(0);
        }

        while let Some(joined) = sessions.join_next().await {
            let (id, result) = match joined {
                Ok(done) => done,
                Err(e) => (
                    "session".to_string(),
                    Err(DeckError::Internal(format!("Session task failed: {e}"))),
                ),
            };
            match result {
                Ok(()) => info!("{}: session ended", id),
                Err(e) => {
                    error!("{}: {}", id, e);
                    sessions.shutdown().await;
                    self.teardown();
                    return Err(e);
                }
            }
        }
        Ok(served)
    }

    async fn start_session(
        &mut self,
        device: &DiscoveredDeck,
        stop: &watch::Receiver<bool>,
        sessions: &mut SessionSet,
    ) -> Result<(), DeckError> {
        let deck = share(self.discovery.open_device(device)?);
        self.opened.push(Arc::clone(&deck));

        let keys = {
            let mut guard = deck.lock();
            let serial = guard.serial_number()?;
            let firmware = guard.firmware_version()?;
            info!(
                "Opened '{}' device (serial number: '{}', fw: '{}')",
                guard.kind(),
                serial,
                firmware
            );
            let id = guard.info().id().to_string();
            // Subscribe before the first draw so no press is missed
            guard
                .subscribe_keys()
                .ok_or_else(|| TransportError::Internal(format!("{id} has no input endpoint")))?
        };

        let session = DeckSession::new(deck, self.ctx.clone())?;
        let (session, started) = session.blocking(DeckSession::start).await?;
        started?;

        let id = session.id().to_string();
        let stop = stop.clone();
        sessions.spawn(async move { (id, session.run(keys, stop).await) });
        Ok(())
    }

    /// Best-effort blank and release of every deck still open
    pub fn teardown(&self) {
        for deck in &self.opened {
            let mut guard = deck.lock();
            if !guard.is_open() {
                continue;
            }
            let id = guard.info().id().to_string();
            if let Err(e) = guard.reset() {
                warn!("{}: reset during teardown failed: {}", id, e);
            }
            if let Err(e) = guard.close() {
                warn!("{}: close during teardown failed: {}", id, e);
            }
        }
    }
}
