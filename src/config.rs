//! Runtime settings loaded from `~/.tairis/config.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.

use crate::safety::red_flags::DEFAULT_RED_FLAGS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub overpass_url: String,
    pub nominatim_url: String,
    /// Sent on every provider request; Nominatim's usage policy requires one.
    pub user_agent: String,
    pub provider_timeout_secs: u64,
    pub fallback_search_term: String,
    pub fallback_limit: u32,
    pub cache_ttl_secs: u64,
    /// File-backed cache location. `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,
    pub default_radius_m: u32,
    /// Endpoint of the reasoning service; triage without it only runs the
    /// local red-flag check.
    pub reasoning_url: Option<String>,
    /// Ordered critical phrases; the first match in this order wins.
    pub red_flags: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".into(),
            nominatim_url: "https://nominatim.openstreetmap.org/search".into(),
            user_agent: concat!("Tairis/", env!("CARGO_PKG_VERSION"), " (facility-triage)").into(),
            provider_timeout_secs: 15,
            fallback_search_term: "hospital".into(),
            fallback_limit: 20,
            cache_ttl_secs: 300,
            cache_path: Some(default_dir().join("cache.json")),
            default_radius_m: 5000,
            reasoning_url: None,
            red_flags: DEFAULT_RED_FLAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Load from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_dir().join("config.toml"))
    }

    /// Load from a specific path (for testing).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tairis")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.cache_ttl(), Duration::from_secs(300));
        assert_eq!(s.fallback_search_term, "hospital");
        assert_eq!(s.red_flags.first().map(String::as_str), Some("unconscious"));
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
provider_timeout_secs = 5
red_flags = ["bewusstlos", "atemnot"]
reasoning_url = "http://localhost:8080/chat"
"#,
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.provider_timeout(), Duration::from_secs(5));
        assert_eq!(s.red_flags, vec!["bewusstlos", "atemnot"]);
        assert_eq!(s.reasoning_url.as_deref(), Some("http://localhost:8080/chat"));
        assert_eq!(s.fallback_limit, 20);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "provider_timeout_secs = \"soon\"").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let s = Settings { provider_timeout_secs: 0, ..Settings::default() };
        assert_eq!(s.provider_timeout(), Duration::from_secs(1));
    }
}
