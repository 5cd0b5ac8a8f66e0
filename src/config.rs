//! Crate configuration.
//!
//! Precedence: explicit file > `DOCSET_CONFIG` file > `./docset.toml` > environment > defaults.
//! Files that cannot be read or parsed are skipped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::DbError;
use crate::set::DEFAULT_TIMEOUT_SECS;

pub const CONFIG_ENV: &str = "DOCSET_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "docset.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: String,
    pub timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "docset".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_dir: None,
            log_level: None,
            log_retention: None,
        }
    }
}

/// File contents before defaults are applied, so that absent keys fall through to lower layers.
#[derive(Debug, Default, Deserialize)]
struct Layer {
    database: Option<String>,
    timeout_secs: Option<u64>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    log_retention: Option<usize>,
}

impl Layer {
    fn fill(&mut self, lower: Self) {
        self.database = self.database.take().or(lower.database);
        self.timeout_secs = self.timeout_secs.or(lower.timeout_secs);
        self.log_dir = self.log_dir.take().or(lower.log_dir);
        self.log_level = self.log_level.take().or(lower.log_level);
        self.log_retention = self.log_retention.or(lower.log_retention);
    }

    fn from_env() -> Self {
        Self {
            database: std::env::var("DOCSET_DATABASE").ok(),
            timeout_secs: std::env::var("DOCSET_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()),
            ..Self::default()
        }
    }

    fn from_file(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(layer) => Some(layer),
            Err(e) => {
                log::warn!("ignoring malformed config {}: {e}", path.display());
                None
            }
        }
    }
}

impl Config {
    /// Resolve the layered configuration.
    #[must_use]
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut merged = Layer::default();
        for path in candidate_paths(explicit) {
            if let Some(layer) = Layer::from_file(&path) {
                merged.fill(layer);
            }
        }
        merged.fill(Layer::from_env());
        let defaults = Self::default();
        Self {
            database: merged.database.unwrap_or(defaults.database),
            timeout_secs: merged.timeout_secs.unwrap_or(defaults.timeout_secs),
            log_dir: merged.log_dir,
            log_level: merged.log_level,
            log_retention: merged.log_retention,
        }
    }

    /// Parse a single TOML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `DbError::Configuration` for malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, DbError> {
        toml::from_str(text).map_err(|e| DbError::config(format!("invalid config: {e}")))
    }

    /// # Errors
    /// Returns `DbError::Io` if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(LOCAL_CONFIG_FILE));
    }
    paths
}
