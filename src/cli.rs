// CLI definitions using clap

use clap::Parser;
use std::path::{Path, PathBuf};

use deckd::Settings;

#[derive(Parser, Debug)]
#[command(name = "deckd")]
#[command(author, version, about = "Button deck app launcher and page dispatcher")]
pub struct Cli {
    /// Settings file (default: ~/.config/deckd/deckd.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// App grid document (default: apps.json beside the executable)
    #[arg(long, value_name = "FILE")]
    pub apps: Option<PathBuf>,

    /// Icon and font directory (default: assets/ beside the executable)
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Backlight brightness in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// Stop at the first/last page instead of wrapping around
    #[arg(long)]
    pub no_wrap: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Overlay command-line values on file settings
    ///
    /// Relative paths given on the command line are taken from the working
    /// directory, not from the install directory.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(apps) = &self.apps {
            settings.apps_path = Some(from_cwd(apps));
        }
        if let Some(assets) = &self.assets {
            settings.assets_dir = Some(from_cwd(assets));
        }
        if let Some(brightness) = self.brightness {
            settings.brightness = brightness;
        }
        if self.no_wrap {
            settings.wrap = false;
        }
    }
}

fn from_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
