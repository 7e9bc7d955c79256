//! Sidecar project configuration.
//!
//! A ledger `books.bean` may sit next to a `books.config` naming the real
//! root file. The format is TOML with a single recognized key:
//!
//! ```toml
//! root = "ledger/main.bean"
//! ```
//!
//! The path is relative to the config file's directory. Unknown keys are
//! rejected rather than ignored, so typos surface immediately.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    root: PathBuf,
}

/// A loaded project configuration.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// The root ledger file, resolved against the config's directory.
    pub root: PathBuf,
}

impl ProjectConfig {
    /// Load a `.config` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let raw: RawConfig =
            toml::from_str(&text).map_err(|err| ConfigError::InvalidConfig(err.to_string()))?;
        let dir = path.parent().unwrap_or(Path::new("."));
        Ok(ProjectConfig {
            root: dir.join(raw.root),
        })
    }

    /// Check for a sibling `<project>.config` of a ledger path and load it
    /// when present.
    pub fn discover(project_path: &Path) -> Result<Option<Self>, ConfigError> {
        let sidecar = project_path.with_extension("config");
        if sidecar.is_file() {
            Ok(Some(Self::load(&sidecar)?))
        } else {
            Ok(None)
        }
    }
}
