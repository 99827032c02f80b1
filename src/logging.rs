use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

pub fn init_logging(verbosity: u8) {
    // RUST_LOG wins; otherwise each --verbose raises the level
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .try_init();
}

/// Append-only plain-text log of backend messages and transport faults.
///
/// Writes are best effort: a log file that cannot be opened never affects the
/// caller.
#[derive(Debug, Clone)]
pub struct DebugLog {
    path: PathBuf,
}

impl DebugLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DebugLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(log = %self.path.display(), "{message}");

        let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| write!(f, "{stamp}:\n{message}\n"));
        if let Err(err) = result {
            tracing::debug!(error = %err, "debug log write failed");
        }
    }
}
