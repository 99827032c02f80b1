//! Filesystem locations used by the credential store and the debug log.
//!
//! Each location can be overridden from the environment:
//!
//! - `COHESITY_CONFIG_DIR`: per-identity secret files (default `~/.pyhesity`)
//! - `COHESITY_PWFILE`: shared credential store (default `YWRtaW4` next to the executable)
//! - `COHESITY_LOG_FILE`: debug log (default `pyhesity-debug.log` next to the executable)

use std::path::{Path, PathBuf};

/// Hostname of the hosted multi-cluster service.
pub const HELIOS_HOST: &str = "helios.cohesity.com";

pub const CONFIG_DIR_ENV: &str = "COHESITY_CONFIG_DIR";
pub const STORE_FILE_ENV: &str = "COHESITY_PWFILE";
pub const LOG_FILE_ENV: &str = "COHESITY_LOG_FILE";

const CONFIG_DIR_NAME: &str = ".pyhesity";
const STORE_FILE_NAME: &str = "YWRtaW4";
const LOG_FILE_NAME: &str = "pyhesity-debug.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Directory holding one secret file per identity.
    pub config_dir: PathBuf,
    /// Shared colon-delimited credential store.
    pub store_file: PathBuf,
    pub log_file: PathBuf,
}

impl Paths {
    /// Resolve paths from the environment, falling back to the defaults.
    pub fn from_env() -> Self {
        let config_dir = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(CONFIG_DIR_NAME)
            });
        let exe_dir = executable_dir();
        let store_file = std::env::var_os(STORE_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| exe_dir.join(STORE_FILE_NAME));
        let log_file = std::env::var_os(LOG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| exe_dir.join(LOG_FILE_NAME));

        let paths = Paths {
            config_dir,
            store_file,
            log_file,
        };
        paths.ensure_config_dir();
        paths
    }

    /// Lay every file out under a single directory. Used by tests.
    pub fn in_dir(dir: &Path) -> Self {
        Paths {
            config_dir: dir.join(CONFIG_DIR_NAME),
            store_file: dir.join(STORE_FILE_NAME),
            log_file: dir.join(LOG_FILE_NAME),
        }
    }

    /// Create the config directory if possible. A read-only home directory
    /// is not an error; secrets just won't be cached on disk.
    pub fn ensure_config_dir(&self) {
        if !self.config_dir.is_dir() {
            if let Err(err) = std::fs::create_dir_all(&self.config_dir) {
                tracing::debug!(dir = %self.config_dir.display(), error = %err, "cannot create config dir");
            }
        }
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
