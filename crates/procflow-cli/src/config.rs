//! Configuration loading.
//!
//! Reads `config/default.toml` (or the `--config` path), then applies
//! environment overrides. A missing or unreadable file falls back to
//! defaults so the binary works out of the box.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

/// Environment variable overriding `[store] path`.
pub const ENV_DB: &str = "PROCFLOW_DB";
/// Environment variable overriding `[commit] timeout_ms`.
pub const ENV_COMMIT_TIMEOUT_MS: &str = "PROCFLOW_COMMIT_TIMEOUT_MS";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcflowConfig {
    pub store: StoreSection,
    pub commit: CommitSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommitSection {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/procflow.db"),
        }
    }
}

impl Default for CommitSection {
    fn default() -> Self {
        Self {
            timeout_ms: procflow_store::DEFAULT_COMMIT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl ProcflowConfig {
    /// Load `path`, falling back to defaults, then apply process environment
    /// overrides.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::from_file(path);
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Parse `path`; defaults when it is missing or invalid.
    pub fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB).filter(|p| !p.trim().is_empty()) {
            self.store.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_COMMIT_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.commit.timeout_ms = ms,
                Err(e) => warn!(var = ENV_COMMIT_TIMEOUT_MS, value = %raw, error = %e, "ignoring invalid override"),
            }
        }
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
