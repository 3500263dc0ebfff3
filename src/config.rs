//! App grid document and the store that owns it
//!
//! The document is a JSON array of pages, each page an array of slot
//! objects indexed by physical key number:
//!
//! ```json
//! [
//!   [{"name": "left"}, {"name": "browser", "command": ["firefox"]}, {}],
//!   [{"name": "left"}, {"name": "right"}, {"name": "exit"}]
//! ]
//! ```
//!
//! Slot names are resolved to an [`Action`] once at load time. Reserved
//! names map to control actions; every other name launches its `command`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Focus direction handed to the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Argument passed to the focus command
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// What a key does when pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `exit`: blank and release the device
    Exit,
    /// `reload`: re-read the app grid and redraw
    Reload,
    /// `up` / `down`: move window manager focus
    Focus(Direction),
    /// `left`: previous page
    PagePrev,
    /// `right`: next page
    PageNext,
    /// Any other name: run `command`
    Launch { command: Option<Vec<String>> },
}

impl Action {
    /// Resolve a slot name. Unknown names fall through to `Launch`.
    pub fn resolve(name: &str, command: Option<Vec<String>>) -> Self {
        match name {
            "exit" => Action::Exit,
            "reload" => Action::Reload,
            "up" => Action::Focus(Direction::Up),
            "down" => Action::Focus(Direction::Down),
            "left" => Action::PagePrev,
            "right" => Action::PageNext,
            // An empty argv cannot be spawned; treat it as absent
            _ => Action::Launch {
                command: command.filter(|argv| !argv.is_empty()),
            },
        }
    }

    /// Whether the name was one of the reserved control names
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Action::Launch { .. })
    }
}

/// One button's configuration on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// No `name`: no face, presses are ignored
    Empty,
    /// A named action with its icon (`<name>.png`) and caption
    Action {
        name: String,
        label: String,
        action: Action,
    },
}

static EMPTY_SLOT: Slot = Slot::Empty;

impl Slot {
    /// Check for an empty slot
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    /// Slot name, `None` for empty slots
    pub fn name(&self) -> Option<&str> {
        match self {
            Slot::Empty => None,
            Slot::Action { name, .. } => Some(name),
        }
    }
}

/// Slot as it appears in the document
#[derive(Debug, Deserialize)]
struct SlotDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    label: Option<String>,
}

impl From<SlotDoc> for Slot {
    fn from(doc: SlotDoc) -> Self {
        match doc.name {
            None => Slot::Empty,
            Some(name) => Slot::Action {
                action: Action::resolve(&name, doc.command),
                label: doc.label.unwrap_or_default(),
                name,
            },
        }
    }
}

/// Ordered pages of slots, indexed by physical key number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppGrid {
    pages: Vec<Vec<Slot>>,
}

impl AppGrid {
    /// Build a grid from pages; at least one page is required
    pub fn new(pages: Vec<Vec<Slot>>) -> Option<Self> {
        if pages.is_empty() {
            None
        } else {
            Some(Self { pages })
        }
    }

    /// Parse a document. `path` is only used for error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let doc: Vec<Vec<SlotDoc>> =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let pages = doc
            .into_iter()
            .map(|page| page.into_iter().map(Slot::from).collect())
            .collect();

        let grid = Self::new(pages).ok_or_else(|| ConfigError::NoPages {
            path: path.to_path_buf(),
        })?;
        grid.warn_missing_commands();
        Ok(grid)
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Number of pages (always >= 1)
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Slots of one page, empty for an out-of-range page
    pub fn page(&self, page: usize) -> &[Slot] {
        self.pages.get(page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slot at (page, key); indices past the defined slots are `Empty`
    pub fn slot(&self, page: usize, key: u8) -> &Slot {
        self.page(page).get(key as usize).unwrap_or(&EMPTY_SLOT)
    }

    // Unknown names still launch; a missing command only fails on press,
    // so flag it as soon as the document is read.
    fn warn_missing_commands(&self) {
        for (page, slots) in self.pages.iter().enumerate() {
            for (key, slot) in slots.iter().enumerate() {
                if let Slot::Action {
                    name,
                    action: Action::Launch { command: None },
                    ..
                } = slot
                {
                    warn!(
                        "Page {} key {}: \"{}\" is not a reserved action and has no command",
                        page, key, name
                    );
                }
            }
        }
    }
}

/// Owns the current app grid and swaps it on reload
///
/// Readers take an `Arc` snapshot; a reload never mutates a grid that a
/// render pass may still be reading.
pub struct ConfigStore {
    path: PathBuf,
    grid: RwLock<Arc<AppGrid>>,
}

impl ConfigStore {
    /// Load the document at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let grid = AppGrid::load(&path)?;
        info!(
            "Loaded {} page(s) from {}",
            grid.page_count(),
            path.display()
        );
        Ok(Self {
            path,
            grid: RwLock::new(Arc::new(grid)),
        })
    }

    /// Create a store around an already built grid
    pub fn with_grid(path: impl Into<PathBuf>, grid: AppGrid) -> Self {
        Self {
            path: path.into(),
            grid: RwLock::new(Arc::new(grid)),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current grid
    pub fn current(&self) -> Arc<AppGrid> {
        self.grid.read().clone()
    }

    /// Re-read the document and swap it in
    ///
    /// All-or-nothing: on error the previous grid stays current.
    pub fn reload(&self) -> Result<Arc<AppGrid>, ConfigError> {
        let grid = Arc::new(AppGrid::load(&self.path)?);
        *self.grid.write() = Arc::clone(&grid);
        info!(
            "Reloaded {} page(s) from {}",
            grid.page_count(),
            self.path.display()
        );
        Ok(grid)
    }
}
