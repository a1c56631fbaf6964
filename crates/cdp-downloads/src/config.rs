//! Download configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file, then
//! `CDP_DOWNLOAD_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use cdp_adapter::DownloadBehavior;
use serde::{Deserialize, Serialize};

/// Floor for the poll interval; anything lower is raised to it.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Folder the browser writes into. Downloads fail fast when unset.
    pub downloads_folder: Option<PathBuf>,
    /// Root under which every finished download gets its own folder.
    pub reports_folder: PathBuf,
    pub polling_interval_ms: u64,
    pub timeout_ms: u64,
    pub stall_timeout_ms: u64,
    pub download_behavior: DownloadBehavior,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            downloads_folder: None,
            reports_folder: PathBuf::from("build/downloads"),
            polling_interval_ms: 200,
            timeout_ms: 4_000,
            stall_timeout_ms: 1_000,
            download_behavior: DownloadBehavior::Allow,
        }
    }
}

impl DownloadConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix("CDP_DOWNLOAD").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms).max(MIN_POLLING_INTERVAL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}
