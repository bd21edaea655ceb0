//! Configuration loading and persistence.
//!
//! Reads `config.json` from the shellbridge config directory, then applies
//! environment overrides. Command-line flags are layered on top by `main`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_DIR_NAME, CONFIG_FILE_NAME};
use crate::protocol::Header;

/// Configuration for the shellbridge CLI.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Remote shell endpoint (`ws://`, `wss://`, `http://` or `https://`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Session to join. A fresh UUID is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Header map sent on every envelope.
    pub header: Header,
    /// Send `CONNECT` as soon as the transport opens, before the console attaches.
    pub connect_immediately: bool,
    /// Extra HTTP headers for the WebSocket upgrade request.
    pub http_headers: BTreeMap<String, String>,
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `SHELLBRIDGE_CONFIG_DIR` overrides the platform config dir
    /// (e.g. `~/.config/shellbridge`).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("SHELLBRIDGE_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join(APP_DIR_NAME)
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load from the config dir with environment overrides applied.
    ///
    /// A missing file yields defaults; an unreadable or invalid one is an error.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path. Missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Write as pretty JSON to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Apply `SHELLBRIDGE_URL` and `SHELLBRIDGE_SESSION_ID`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SHELLBRIDGE_URL") {
            self.url = Some(url);
        }
        if let Ok(session_id) = std::env::var("SHELLBRIDGE_SESSION_ID") {
            self.session_id = Some(session_id);
        }
    }

    /// HTTP headers as the pair list the transport takes.
    #[must_use]
    pub fn http_header_pairs(&self) -> Vec<(String, String)> {
        self.http_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Parse a `KEY=VALUE` command-line pair.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty key in {raw:?}");
    }
    Ok((key.to_string(), value.to_string()))
}
