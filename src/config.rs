//! Server configuration.
//!
//! Values come from the command line first; an optional `mypyls.toml` in
//! the workspace root overrides them key by key:
//!
//! ```toml
//! dmypy = "/opt/venv/bin/dmypy"
//! status-file = ".cache/dmypy.json"
//! flags = ["--strict"]
//! ```
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::engine::{DEFAULT_STATUS_FILE, EngineOptions};

/// Name of the per-workspace configuration file.
pub const CONFIG_FILE: &str = "mypyls.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The daemon client executable.
    pub dmypy: String,
    pub status_file: PathBuf,
    /// Extra flags handed to every check.
    pub flags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dmypy: "dmypy".to_string(),
            status_file: PathBuf::from(DEFAULT_STATUS_FILE),
            flags: Vec::new(),
        }
    }
}

/// The on-disk form: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    dmypy: Option<String>,
    status_file: Option<PathBuf>,
    flags: Option<Vec<String>>,
}

impl Config {
    /// Read `mypyls.toml` from `root`, if present, and overlay it on `self`.
    pub fn overlay_file(&self, root: &Path) -> Result<Config, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(self.clone());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;

        Ok(Config {
            dmypy: file.dmypy.unwrap_or_else(|| self.dmypy.clone()),
            status_file: file.status_file.unwrap_or_else(|| self.status_file.clone()),
            flags: file.flags.unwrap_or_else(|| self.flags.clone()),
        })
    }

    /// Like [`overlay_file`](Self::overlay_file), but a broken file only
    /// produces a warning.
    pub fn for_workspace(&self, root: &Path) -> Config {
        match self.overlay_file(root) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring workspace configuration: {}", e);
                self.clone()
            }
        }
    }

    /// Engine options for a workspace.  Column numbers are always on.
    pub fn engine_options(&self, root: &Path) -> EngineOptions {
        EngineOptions {
            root: root.to_path_buf(),
            show_column_numbers: true,
            status_file: root.join(&self.status_file),
            executable: self.dmypy.clone(),
            flags: self.flags.clone(),
        }
    }
}
