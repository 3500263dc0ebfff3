//! Error types for the dispatcher

use std::path::PathBuf;

use deck_transport::TransportError;
use thiserror::Error;

/// Errors loading the app grid document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read app grid {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid app grid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("App grid {} defines no pages", path.display())]
    NoPages { path: PathBuf },
}

/// Errors raised while rendering keys or dispatching presses
#[derive(Error, Debug)]
pub enum DeckError {
    /// App grid could not be (re)loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Icon or font file is absent
    #[error("Missing asset: {}", path.display())]
    AssetMissing { path: PathBuf },

    /// Non-reserved action pressed without a command to run
    #[error("Action \"{name}\" (page {page}, key {key}) has no command")]
    MissingCommand { name: String, page: usize, key: u8 },

    /// External process could not be started
    #[error("Failed to launch \"{program}\": {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Image decode/encode or font failure for one key
    #[error("Render error: {0}")]
    Render(String),

    /// Driver-level failure
    #[error("Device error: {0}")]
    Device(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeckError {
    /// Errors confined to a single key: logged and skipped, never fatal
    pub fn is_per_key(&self) -> bool {
        matches!(
            self,
            DeckError::AssetMissing { .. }
                | DeckError::MissingCommand { .. }
                | DeckError::Launch { .. }
                | DeckError::Render(_)
        )
    }
}

impl From<image::ImageError> for DeckError {
    fn from(e: image::ImageError) -> Self {
        DeckError::Render(e.to_string())
    }
}
