//! deckd - button deck app launcher
//!
//! Finds every attached deck, draws the first page of the app grid and
//! dispatches key presses until `exit` is pressed or the process is
//! interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use deck_transport::HidDiscovery;
use deckd::settings::{install_dir, Settings};
use deckd::{ConfigStore, Dispatcher, KeyRenderer, ProcessLauncher, SessionContext};

// CLI definitions
mod cli;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load settings
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    info!("Loading settings from {:?}", settings_path);
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    let base = install_dir();
    let store = ConfigStore::open(settings.apps_path_in(&base))?;
    let renderer = KeyRenderer::new(settings.assets_dir_in(&base), settings.key_style());
    let launcher = ProcessLauncher::new(
        settings.launch_log_dir.clone(),
        settings.focus_command.clone(),
    );

    let ctx = SessionContext {
        store: Arc::new(store),
        renderer: Arc::new(renderer),
        runner: Arc::new(launcher),
        brightness: settings.brightness,
        wrap: settings.wrap,
    };

    // Set up Ctrl-C / SIGTERM handler
    let (stop_tx, stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Interrupted, releasing decks");
        stop_tx.send(true).ok();
    })
    .context("Failed to install signal handler")?;

    let mut dispatcher = Dispatcher::new(Box::new(HidDiscovery::new()), ctx);
    match dispatcher.run(stop_rx).await {
        Ok(served) => {
            info!("Served {} deck(s), exiting", served);
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {}", e);
            Err(e.into())
        }
    }
}
