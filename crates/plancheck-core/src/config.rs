//! Review configuration: validation thresholds, not-found markers, learning
//! file location, and the optional advisor endpoint.
//!
//! Read from a TOML file; every key has a default, so a missing file or a
//! partial file is fine.
//!
//! ```toml
//! learning_path = "learned_mappings.json"
//! default_actor = "reviewer"
//! not_found_markers = ["N/F", "Not Found"]
//!
//! [thresholds]
//! fuzzy_match = 0.85
//! low_confidence = 0.70
//!
//! [advisor]
//! endpoint = "https://api.anthropic.com"
//! model = "claude-sonnet-4-5"
//! timeout_secs = 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("threshold '{name}' must be within [0, 1], got {value}")]
    Threshold { name: &'static str, value: f64 },
}

/// Policy constants for the validator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum similarity for a value to count as a known term (or a typo of one).
    pub fuzzy_match: f64,
    /// Extraction confidence below this gets a `low extraction confidence` warning.
    pub low_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fuzzy_match: 0.85,
            low_confidence: 0.70,
        }
    }
}

impl Thresholds {
    pub fn check(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("fuzzy_match", self.fuzzy_match),
            ("low_confidence", self.low_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        Ok(())
    }
}

/// Settings for the optional LLM advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Base URL of the messages API. No advisor runs when unset.
    pub endpoint: Option<String>,
    pub model: String,
    /// Hard limit for one advisor call; the call is abandoned after this.
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "claude-sonnet-4-5".to_string(),
            timeout_secs: 20,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 512,
        }
    }
}

impl AdvisorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub thresholds: Thresholds,
    /// Extracted values that mean "not found" (compared case-insensitively).
    pub not_found_markers: Vec<String>,
    pub learning_path: PathBuf,
    /// Actor recorded in the learning history when none is given.
    pub default_actor: String,
    pub advisor: AdvisorConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            not_found_markers: vec!["N/F".to_string(), "Not Found".to_string()],
            learning_path: PathBuf::from("learned_mappings.json"),
            default_actor: "user".to_string(),
            advisor: AdvisorConfig::default(),
        }
    }
}

impl ReviewConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.thresholds.check()?;
        Ok(config)
    }

    /// Load a config file. `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text, path)?;
        info!(path = %path.display(), "loaded review config");
        Ok(config)
    }
}
