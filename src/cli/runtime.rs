use std::path::PathBuf;

use anyhow::{Context, Result};
use cdp_downloads::DownloadConfig;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // Logs go to stderr so stdout stays machine readable.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: DownloadConfig,
    pub path: Option<PathBuf>,
}

/// Resolve the config file: explicit path, then `./config/cdp-download.toml`, then the
/// user config directory. None of them has to exist unless given explicitly.
pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }

    let local = PathBuf::from("config/cdp-download.toml");
    if local.exists() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("cdp-download").join("config.toml");
    user.exists().then_some(user)
}

pub fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(explicit);
    let config = DownloadConfig::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;
    debug!(?path, ?config, "configuration loaded");
    Ok(LoadedConfig { config, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn explicit_path_is_used_verbatim() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "timeout_ms = 1234").unwrap();
        let path = file.path().to_path_buf();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.timeout_ms, 1234);
    }

    #[test]
    #[serial]
    fn missing_explicit_file_is_reported() {
        let path = PathBuf::from("/nonexistent/cdp-download.toml");
        let err = load_config(Some(&path)).err().unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/cdp-download.toml"));
    }
}
