//! Fire-and-forget process spawning for launch and focus actions

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Direction;
use crate::error::DeckError;

/// Runs the external side effects of a key press
///
/// Both calls return as soon as the process is started; they never wait
/// for it to finish.
pub trait ActionRunner: Send + Sync {
    /// Start `argv` on behalf of the action `name`
    fn launch(&self, name: &str, argv: &[String]) -> Result<(), DeckError>;

    /// Ask the window manager to move focus
    fn navigate(&self, direction: Direction) -> Result<(), DeckError>;
}

/// Spawns children on the tokio runtime
///
/// Each launch gets its own output file in `log_dir`; children are awaited
/// on a background task so they never linger as zombies. Must be called
/// from within a tokio runtime.
pub struct ProcessLauncher {
    log_dir: PathBuf,
    focus_command: Vec<String>,
    seq: AtomicU64,
}

impl ProcessLauncher {
    pub fn new(log_dir: impl Into<PathBuf>, focus_command: Vec<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            focus_command,
            seq: AtomicU64::new(0),
        }
    }

    /// Directory receiving per-launch output files
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Output file for the next launch of `name`
    fn next_log_path(&self, name: &str) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.log_dir.join(format!("deckd-{name}-{millis}-{seq}.log"))
    }

    /// stdout/stderr pair for a launch; output is discarded if the file
    /// cannot be created
    fn output_for(&self, name: &str) -> (Stdio, Stdio, Option<PathBuf>) {
        let path = self.next_log_path(name);
        let opened = std::fs::create_dir_all(&self.log_dir)
            .and_then(|_| File::create(&path))
            .and_then(|file| Ok((file.try_clone()?, file)));
        match opened {
            Ok((out, err)) => (Stdio::from(out), Stdio::from(err), Some(path)),
            Err(e) => {
                warn!("Cannot create launch log {}: {}", path.display(), e);
                (Stdio::null(), Stdio::null(), None)
            }
        }
    }

    fn spawn(
        &self,
        label: &str,
        argv: &[String],
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<(), DeckError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DeckError::Internal(format!("Empty command for \"{label}\"")))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| DeckError::Launch {
                program: program.clone(),
                source,
            })?;

        let label = label.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("\"{}\" exited with {}", label, status),
                Err(e) => warn!("Failed to wait for \"{}\": {}", label, e),
            }
        });
        Ok(())
    }
}

impl ActionRunner for ProcessLauncher {
    fn launch(&self, name: &str, argv: &[String]) -> Result<(), DeckError> {
        let (stdout, stderr, log_path) = self.output_for(name);
        self.spawn(name, argv, stdout, stderr)?;
        match log_path {
            Some(path) => info!("Launched \"{}\" (output: {})", name, path.display()),
            None => info!("Launched \"{}\"", name),
        }
        Ok(())
    }

    fn navigate(&self, direction: Direction) -> Result<(), DeckError> {
        if self.focus_command.is_empty() {
            debug!("No focus command configured, ignoring {}", direction.as_str());
            return Ok(());
        }
        let mut argv = self.focus_command.clone();
        argv.push(direction.as_str().to_string());
        debug!("Focus {}: {:?}", direction.as_str(), argv);
        self.spawn(
            &format!("focus {}", direction.as_str()),
            &argv,
            Stdio::null(),
            Stdio::null(),
        )
    }
}
