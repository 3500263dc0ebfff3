//! Process-wide settings
//!
//! Read from a TOML file; every field is optional. Relative or unset paths
//! resolve next to the executable, where `apps.json` and `assets/` live in
//! a default install.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::render::{KeyStyle, Margins};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// App grid document (default: `apps.json` beside the executable)
    pub apps_path: Option<PathBuf>,
    /// Icon and font directory (default: `assets/` beside the executable)
    pub assets_dir: Option<PathBuf>,
    /// Caption font file inside the assets directory
    pub font_file: String,
    /// Caption pixel size
    pub font_size: f32,
    /// Height reserved under the icon for the caption
    pub caption_margin: u32,
    /// Backlight brightness in percent
    pub brightness: u8,
    /// Wrap around when paging past either end
    pub wrap: bool,
    /// Focus command; the direction (`up`/`down`) is appended
    pub focus_command: Vec<String>,
    /// Where launched programs write their output
    pub launch_log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            apps_path: None,
            assets_dir: None,
            font_file: "Courier Prime Bold.ttf".to_string(),
            font_size: 14.0,
            caption_margin: 30,
            brightness: 50,
            wrap: true,
            focus_command: vec!["i3-msg".to_string(), "focus".to_string()],
            launch_log_dir: std::env::temp_dir(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deckd")
            .join("deckd.toml")
    }

    /// Load settings from a file, or return defaults if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// App grid path, resolved against `base`
    pub fn apps_path_in(&self, base: &Path) -> PathBuf {
        resolve(base, self.apps_path.as_deref(), "apps.json")
    }

    /// Assets directory, resolved against `base`
    pub fn assets_dir_in(&self, base: &Path) -> PathBuf {
        resolve(base, self.assets_dir.as_deref(), "assets")
    }

    /// Renderer style derived from the caption settings
    pub fn key_style(&self) -> KeyStyle {
        KeyStyle {
            font_file: self.font_file.clone(),
            font_size: self.font_size,
            margins: Margins::caption(self.caption_margin),
        }
    }
}

fn resolve(base: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => base.join(path),
        None => base.join(default),
    }
}

/// Directory of the running executable, falling back to the working directory
pub fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
