use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, FUZZY_ACCEPT_SCORE, FUZZY_AMBIGUITY_MARGIN,
    FUZZY_MAX_CANDIDATES, FUZZY_MIN_SCORE, MATCH_TIMEOUT_MS, MAX_RETRIES, MAX_RETRIES_LIMIT,
    PENDING_CAPACITY, POLL_INTERVAL_MS, SITE_CONFIDENCE_THRESHOLD,
};
use crate::shared::ring_buffer::{OverflowPolicy, RingBufferError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid config: {0}")]
    Buffer(#[from] RingBufferError),
}

/// Thresholds for the background fuzzy matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Below this similarity a species is not a candidate at all.
    pub min_score: f64,
    /// Best candidate must reach this to be auto-accepted.
    pub accept_score: f64,
    /// Required lead of the best candidate over the runner-up.
    pub ambiguity_margin: f64,
    pub max_candidates: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_score: FUZZY_MIN_SCORE,
            accept_score: FUZZY_ACCEPT_SCORE,
            ambiguity_margin: FUZZY_AMBIGUITY_MARGIN,
            max_candidates: FUZZY_MAX_CANDIDATES,
        }
    }
}

/// Tunables for both matching tiers. Missing fields in a config file
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub site_confidence_threshold: f32,
    pub pending_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub match_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub fuzzy: FuzzyConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            site_confidence_threshold: SITE_CONFIDENCE_THRESHOLD,
            pending_capacity: PENDING_CAPACITY,
            overflow_policy: OverflowPolicy::OverwriteOldest,
            match_timeout_ms: MATCH_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_retries: MAX_RETRIES,
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl MatcherConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the per-user config file, or returns defaults if it is
    /// missing or unusable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring matcher config: {e}");
                Self::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pending_capacity == 0 {
            return Err(ConfigError::Invalid("pending_capacity must be >= 1".into()));
        }
        if self.match_timeout_ms == 0 {
            return Err(ConfigError::Invalid("match_timeout_ms must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be <= {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            )));
        }
        if !(0.0..=1.0).contains(&self.site_confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "site_confidence_threshold must be in [0, 1], got {}",
                self.site_confidence_threshold
            )));
        }
        let fuzzy = &self.fuzzy;
        for (name, value) in [
            ("fuzzy.min_score", fuzzy.min_score),
            ("fuzzy.accept_score", fuzzy.accept_score),
            ("fuzzy.ambiguity_margin", fuzzy.ambiguity_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if fuzzy.min_score > fuzzy.accept_score {
            return Err(ConfigError::Invalid(
                "fuzzy.min_score must not exceed fuzzy.accept_score".into(),
            ));
        }
        if fuzzy.max_candidates == 0 {
            return Err(ConfigError::Invalid("fuzzy.max_candidates must be >= 1".into()));
        }
        Ok(())
    }

    pub fn match_timeout(&self) -> Duration {
        Duration::from_millis(self.match_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
