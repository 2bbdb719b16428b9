//! # Configuration
//!
//! Optional `pantau.toml`, overlaid by environment variables.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [remote]
//! base_url = "https://records.example/api"
//! request_timeout_secs = 45
//!
//! [cache]
//! summary_ttl_secs = 180
//! proposals_ttl_secs = 300
//! fetch_timeout_secs = 45
//! refresh_interval_secs = 600
//!
//! [view]
//! page_size = 10
//! max_transitions = 10000
//! ```
//!
//! Every section and key is optional. `PANTAU_REMOTE_URL` and
//! `PANTAU_REMOTE_API_KEY` override the `[remote]` values so secrets never
//! have to live in the file.

use crate::cache::CacheSettings;
use pantau_core::PantauError;
use pantau_core::primitives::{DEFAULT_PAGE_SIZE, DEFAULT_TRANSITION_CAP};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pantau.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PantauConfig {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_secs: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub summary_ttl_secs: u64,
    pub proposals_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub refresh_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            summary_ttl_secs: CacheSettings::SUMMARY.ttl.as_secs(),
            proposals_ttl_secs: CacheSettings::PROPOSALS.ttl.as_secs(),
            fetch_timeout_secs: CacheSettings::SUMMARY.fetch_timeout.as_secs(),
            refresh_interval_secs: 600,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn summary(&self) -> CacheSettings {
        CacheSettings::from_secs(self.summary_ttl_secs, self.fetch_timeout_secs)
    }

    #[must_use]
    pub fn proposals(&self) -> CacheSettings {
        CacheSettings::from_secs(self.proposals_ttl_secs, self.fetch_timeout_secs)
    }

    /// Background refresh interval (at least one second).
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub page_size: usize,
    /// Stage transitions kept in memory; older ones are dropped.
    pub max_transitions: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_transitions: DEFAULT_TRANSITION_CAP,
        }
    }
}

impl PantauConfig {
    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self, PantauError> {
        toml::from_str(content)
            .map_err(|e| PantauError::DeserializationError(format!("Invalid config: {e}")))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `pantau.toml` in the
    /// working directory is used when present, defaults otherwise.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, PantauError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, PantauError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PantauError::IoError(format!("Cannot read config {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&content)
    }

    fn apply_env(&mut self) {
        if let Some(url) = non_empty_env("PANTAU_REMOTE_URL") {
            self.remote.base_url = Some(url);
        }
        if let Some(key) = non_empty_env("PANTAU_REMOTE_API_KEY") {
            self.remote.api_key = Some(key);
        }
    }

    /// Request timeout for the remote client.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs.max(1))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PantauConfig::from_toml("").expect("parse");
        assert_eq!(config, PantauConfig::default());
        assert_eq!(config.cache.summary(), CacheSettings::SUMMARY);
        assert_eq!(config.cache.proposals(), CacheSettings::PROPOSALS);
        assert_eq!(config.view.page_size, 10);
        assert_eq!(config.view.max_transitions, DEFAULT_TRANSITION_CAP);
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PantauConfig::from_toml(
            r#"
            [server]
            port = 9090

            [cache]
            summary_ttl_secs = 60
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.cache.summary().ttl, Duration::from_secs(60));
        assert_eq!(config.cache.proposals_ttl_secs, 300);
    }

    #[test]
    fn bad_toml_is_deserialization_error() {
        let err = PantauConfig::from_toml("[server\nport = 1").expect_err("invalid");
        assert!(matches!(err, PantauError::DeserializationError(_)));
    }

    #[test]
    fn explicit_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = PantauConfig::load(Some(&dir.path().join("missing.toml"))).expect_err("missing");
        assert!(matches!(err, PantauError::IoError(_)));
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pantau.toml");
        std::fs::write(&path, "[view]\npage_size = 25\nmax_transitions = 500\n").expect("write");
        let config = PantauConfig::load(Some(&path)).expect("load");
        assert_eq!(config.view.page_size, 25);
        assert_eq!(config.view.max_transitions, 500);
    }
}
