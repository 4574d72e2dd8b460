//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Paths to all KnowGraph data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Client-side key-value store used in fallback mode (`data/local/`).
    pub local: PathBuf,
    /// Reference backend storage (`data/server/`).
    pub server: PathBuf,
    /// Reference backend graph collection (`data/server/graphs.json`).
    pub server_graphs_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let server = root.join("server");
        let paths = Self {
            local: root.join("local"),
            server_graphs_file: server.join("graphs.json"),
            server,
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.local)?;
        std::fs::create_dir_all(&self.server)?;
        Ok(())
    }
}

/// Top-level KnowGraph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowGraphConfig {
    /// Base URL of the remote graph API; `/graphs` is appended per request.
    pub api_url: String,
    /// Port the reference backend listens on.
    pub port: u16,
    /// How often the availability probe runs while in fallback mode.
    pub probe_interval_secs: u64,
    /// Per-request timeout for remote store calls.
    pub request_timeout_secs: u64,
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl KnowGraphConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let api_url = std::env::var("KNOWGRAPH_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let port = parse_env("PORT", DEFAULT_PORT)?;
        let probe_interval_secs =
            parse_env("KNOWGRAPH_PROBE_INTERVAL_SECS", DEFAULT_PROBE_INTERVAL_SECS)?;
        let request_timeout_secs =
            parse_env("KNOWGRAPH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Self::new(api_url, data_dir).map(|config| Self {
            port,
            probe_interval_secs,
            request_timeout_secs,
            ..config
        })
    }

    /// Create configuration with defaults for everything but the API URL and data root.
    pub fn new(api_url: impl Into<String>, data_dir: impl AsRef<Path>) -> Result<Self> {
        let api_url = api_url.into();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API URL must be http(s): {}",
                api_url
            )));
        }

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            port: DEFAULT_PORT,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_paths: DataPaths::new(data_dir)?,
        })
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
