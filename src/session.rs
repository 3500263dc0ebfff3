//! Per-device dispatch session
//!
//! A session owns one deck's page cursor and turns its key events into
//! face uploads and effects. Every batch of device calls runs under a
//! single lock of the [`SharedDeck`], so a full-page redraw is observed
//! as one unit.

use std::sync::Arc;

use deck_transport::{Deck, KeyEvent, KeyImageFormat, SharedDeck, TransportError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::{AppGrid, ConfigStore};
use crate::error::DeckError;
use crate::launcher::ActionRunner;
use crate::pager::{Effect, Pager};
use crate::render::FaceRenderer;

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<ConfigStore>,
    pub renderer: Arc<dyn FaceRenderer>,
    pub runner: Arc<dyn ActionRunner>,
    /// Backlight brightness in percent
    pub brightness: u8,
    /// Page wrap policy for new cursors
    pub wrap: bool,
}

/// Whether a session keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct DeckSession {
    deck: SharedDeck,
    ctx: SessionContext,
    pager: Pager,
    format: KeyImageFormat,
    key_count: u8,
    id: String,
}

impl DeckSession {
    /// Bind a session to an open, visual deck
    pub fn new(deck: SharedDeck, ctx: SessionContext) -> Result<Self, DeckError> {
        let (format, key_count, id) = {
            let guard = deck.lock();
            let format = guard.image_format().ok_or(TransportError::NotVisual)?;
            (format, guard.key_count(), guard.info().id().to_string())
        };
        Ok(Self {
            pager: Pager::new(ctx.wrap),
            deck,
            ctx,
            format,
            key_count,
            id,
        })
    }

    /// Device identifier used in logs
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Blank the deck, draw the first page and set the brightness
    pub fn start(&mut self) -> Result<(), DeckError> {
        let grid = self.ctx.store.current();
        self.pager.clamp(grid.page_count());

        let mut deck = self.deck.lock();
        deck.reset()?;
        self.render_page(&mut **deck, &grid)?;
        deck.set_brightness(self.ctx.brightness)?;
        Ok(())
    }

    /// Handle one key edge
    ///
    /// The key's face is refreshed on both edges; the action only fires on
    /// key-down. Per-key failures are logged and swallowed. Device failures
    /// are returned.
    pub fn handle_key(&mut self, event: KeyEvent) -> Result<Flow, DeckError> {
        if event.key >= self.key_count {
            debug!("{}: ignoring event for key {}", self.id, event.key);
            return Ok(Flow::Continue);
        }

        let grid = self.ctx.store.current();
        self.pager.clamp(grid.page_count());
        self.refresh_key(&grid, event.key)?;

        if !event.pressed {
            return Ok(Flow::Continue);
        }

        match self.pager.on_press(&grid, event.key) {
            Ok(effect) => self.apply(effect),
            Err(e) if e.is_per_key() => {
                warn!("{}: {}", self.id, e);
                Ok(Flow::Continue)
            }
            Err(e) => Err(e),
        }
    }

    fn apply(&mut self, effect: Effect) -> Result<Flow, DeckError> {
        debug!("{}: page {} -> {:?}", self.id, self.pager.current_page(), effect);
        match effect {
            Effect::None => {}
            Effect::Shutdown => {
                info!("{}: exit pressed", self.id);
                self.shutdown()?;
                return Ok(Flow::Stop);
            }
            Effect::RerenderAll => {
                let grid = self.ctx.store.current();
                self.redraw(&grid)?;
            }
            Effect::ReloadAndRerenderAll => {
                if let Err(e) = self.ctx.store.reload() {
                    warn!("{}: reload failed, keeping previous app grid: {}", self.id, e);
                }
                let grid = self.ctx.store.current();
                self.pager.clamp(grid.page_count());
                self.redraw(&grid)?;
            }
            Effect::ExternalNavigate(direction) => {
                if let Err(e) = self.ctx.runner.navigate(direction) {
                    warn!("{}: {}", self.id, e);
                }
            }
            Effect::Launch { name, argv } => {
                if let Err(e) = self.ctx.runner.launch(&name, &argv) {
                    warn!("{}: {}", self.id, e);
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Reset and re-render the current page as one batch
    fn redraw(&self, grid: &AppGrid) -> Result<(), DeckError> {
        let mut deck = self.deck.lock();
        deck.reset()?;
        self.render_page(&mut **deck, grid)
    }

    fn render_page(&self, deck: &mut dyn Deck, grid: &AppGrid) -> Result<(), DeckError> {
        for key in 0..self.key_count {
            let slot = self.pager.slot(grid, key);
            if slot.is_empty() {
                continue;
            }
            match self.ctx.renderer.render(slot, &self.format) {
                Ok(Some(image)) => deck.set_key_image(key, &image)?,
                Ok(None) => {}
                Err(e) if e.is_per_key() => warn!("{}: key {}: {}", self.id, key, e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Redraw a single key; empty slots are blanked
    fn refresh_key(&self, grid: &AppGrid, key: u8) -> Result<(), DeckError> {
        let slot = self.pager.slot(grid, key);
        let image = match self.ctx.renderer.render(slot, &self.format) {
            Ok(Some(image)) => image,
            Ok(None) => match self.ctx.renderer.blank(&self.format) {
                Ok(image) => image,
                Err(e) if e.is_per_key() => {
                    warn!("{}: key {}: {}", self.id, key, e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_per_key() => {
                warn!("{}: key {}: {}", self.id, key, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.deck.lock().set_key_image(key, &image)?;
        Ok(())
    }

    /// Blank and release the deck; a no-op once it is closed
    pub fn shutdown(&mut self) -> Result<(), DeckError> {
        let mut deck = self.deck.lock();
        if !deck.is_open() {
            return Ok(());
        }
        deck.reset()?;
        deck.close()?;
        info!("{}: released", self.id);
        Ok(())
    }

    /// Run `f` on the blocking pool and hand the session back
    ///
    /// HID writes and face encoding block, so they stay off the async
    /// workers.
    pub async fn blocking<T, F>(self, f: F) -> Result<(Self, T), DeckError>
    where
        F: FnOnce(&mut Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut session = self;
        tokio::task::spawn_blocking(move || {
            let out = f(&mut session);
            (session, out)
        })
        .await
        .map_err(|e| DeckError::Internal(format!("Session task failed: {e}")))
    }

    /// Consume key events until `exit`, a stop request, or a device failure
    pub async fn run(
        self,
        mut keys: broadcast::Receiver<KeyEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), DeckError> {
        let mut session = self;
        loop {
            if *stop.borrow_and_update() {
                return session.blocking(Self::shutdown).await?.1;
            }

            tokio::select! {
                event = keys.recv() => match event {
                    Ok(event) => {
                        debug!("{}: key {} {}", session.id, event.key,
                            if event.pressed { "down" } else { "up" });
                        let (next, flow) = session
                            .blocking(move |s| s.handle_key(event))
                            .await?;
                        session = next;
                        if flow? == Flow::Stop {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("{}: dropped {} key events", session.id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(TransportError::Disconnected.into());
                    }
                },
                changed = stop.changed() => {
                    // Sender gone: treat as a stop request
                    if changed.is_err() {
                        return session.blocking(Self::shutdown).await?.1;
                    }
                }
            }
        }
    }
}
