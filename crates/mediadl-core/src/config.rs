use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What the admission controller does when a storage root cannot be stat'ed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceCheckPolicy {
    /// Treat the root as having enough space (a transient stat failure never wedges the pipeline).
    #[default]
    FailOpen,
    /// Treat the root as full until it can be read again.
    FailClosed,
}

/// aria2 JSON-RPC connection settings (`[aria2]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aria2Config {
    /// JSON-RPC endpoint, e.g. `http://127.0.0.1:6800/jsonrpc`.
    pub rpc_url: String,
    /// Shared RPC secret. Placeholder values are ignored in favour of the environment.
    #[serde(default)]
    pub secret: Option<String>,
    /// Timeout for enqueue/status/pause/remove calls.
    pub request_timeout_secs: u64,
    /// Timeout for the version health probe.
    pub health_timeout_secs: u64,
}

impl Default for Aria2Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:6800/jsonrpc".to_string(),
            secret: None,
            request_timeout_secs: 15,
            health_timeout_secs: 5,
        }
    }
}

/// Jellyfin library refresh target (`[jellyfin]` section, optional).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JellyfinConfig {
    /// Base URL of the Jellyfin server.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Global configuration loaded from `~/.config/mediadl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediadlConfig {
    /// Seconds the scheduler sleeps between passes.
    pub scheduler_interval_secs: u64,
    /// Seconds the worker sleeps between passes.
    pub worker_interval_secs: u64,
    /// Maximum jobs in `starting` + `downloading`. Zero or negative disables the gate.
    pub max_active_downloads: i64,
    /// Minimum free bytes required on every storage root before claiming.
    pub min_free_space_bytes: u64,
    #[serde(default)]
    pub space_check_policy: SpaceCheckPolicy,
    /// Directory aria2 writes into.
    pub staging_dir: PathBuf,
    /// Media library root; completed files are moved under `<library_dir>/<category>/`.
    pub library_dir: PathBuf,
    #[serde(default)]
    pub aria2: Aria2Config,
    #[serde(default)]
    pub jellyfin: Option<JellyfinConfig>,
}

impl Default for MediadlConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_secs: 3,
            worker_interval_secs: 3,
            max_active_downloads: 3,
            min_free_space_bytes: 5 * 1024 * 1024 * 1024,
            space_check_policy: SpaceCheckPolicy::FailOpen,
            staging_dir: PathBuf::from("/var/lib/mediadl/staging"),
            library_dir: PathBuf::from("/var/lib/mediadl/library"),
            aria2: Aria2Config::default(),
            jellyfin: None,
        }
    }
}

impl MediadlConfig {
    /// Storage roots checked by the free-space gate.
    pub fn storage_roots(&self) -> Vec<PathBuf> {
        vec![self.staging_dir.clone(), self.library_dir.clone()]
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mediadl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MediadlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MediadlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Parse the config file at `path`.
pub fn load_from_path(path: &Path) -> Result<MediadlConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: MediadlConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Re-read the config between loop passes. Keeps `current` when the file is
/// missing or invalid so a bad edit never stops a running loop.
pub fn reload_or_keep(path: &Path, current: &MediadlConfig) -> MediadlConfig {
    match load_from_path(path) {
        Ok(cfg) => {
            if &cfg != current {
                tracing::info!("configuration reloaded from {}", path.display());
            }
            cfg
        }
        Err(e) => {
            tracing::warn!("keeping previous configuration: {:#}", e);
            current.clone()
        }
    }
}
