//! Configuration loading, validation, and management for Worldview.
//!
//! Loads configuration from `~/.worldview/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.worldview/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Ingestion pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Belief engine tunables
    #[serde(default)]
    pub belief: BeliefConfig,

    /// External services (embedding, stance validation, reputation)
    #[serde(default)]
    pub services: ServicesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
            belief: BeliefConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store", &self.store)
            .field("pipeline", &self.pipeline)
            .field("belief", &self.belief)
            .field("services", &self.services)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (`sqlite::memory:` for ephemeral)
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "worldview.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the rolling seen-set (oldest evicted first)
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,

    /// Items kept per cycle after scoring
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Keyphrases extracted per item
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Jaccard similarity at/above which two items are near-duplicates
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// Jaccard similarity at/above which an item joins a cluster
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,

    /// Exponent of the recency decay in the velocity score
    #[serde(default = "default_velocity_exponent")]
    pub velocity_exponent: f64,

    /// Weight of source trust in the composite score
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,

    /// Weight of topical alignment in the composite score
    #[serde(default = "default_alignment_weight")]
    pub alignment_weight: f64,

    /// Weight of corpus novelty in the composite score
    #[serde(default = "default_novelty_weight")]
    pub novelty_weight: f64,

    /// Cap on an item's mean-IDF novelty
    #[serde(default = "default_novelty_cap")]
    pub novelty_cap: f64,

    /// Width of the burst comparison windows, in hours
    #[serde(default = "default_burst_window_hours")]
    pub burst_window_hours: i64,
}

fn default_seen_capacity() -> usize {
    4096
}
fn default_top_k() -> usize {
    50
}
fn default_max_keywords() -> usize {
    8
}
fn default_dedup_threshold() -> f64 {
    0.65
}
fn default_cluster_threshold() -> f64 {
    0.25
}
fn default_velocity_exponent() -> f64 {
    1.8
}
fn default_trust_weight() -> f64 {
    0.5
}
fn default_alignment_weight() -> f64 {
    0.3
}
fn default_novelty_weight() -> f64 {
    0.4
}
fn default_novelty_cap() -> f64 {
    5.0
}
fn default_burst_window_hours() -> i64 {
    24
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seen_capacity: default_seen_capacity(),
            top_k: default_top_k(),
            max_keywords: default_max_keywords(),
            dedup_threshold: default_dedup_threshold(),
            cluster_threshold: default_cluster_threshold(),
            velocity_exponent: default_velocity_exponent(),
            trust_weight: default_trust_weight(),
            alignment_weight: default_alignment_weight(),
            novelty_weight: default_novelty_weight(),
            novelty_cap: default_novelty_cap(),
            burst_window_hours: default_burst_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefConfig {
    /// Lower clamp on evidence trust weights
    #[serde(default = "default_weight_floor")]
    pub weight_floor: f64,

    /// Upper clamp on evidence trust weights
    #[serde(default = "default_weight_ceiling")]
    pub weight_ceiling: f64,

    /// Confidence gained per unit of weighted evidence
    #[serde(default = "default_confidence_gain")]
    pub confidence_gain: f64,

    /// Confidence is capped below certainty
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,

    /// Evidence text at/below this many chars skips stance validation
    #[serde(default = "default_min_validation_len")]
    pub min_validation_len: usize,

    /// Verdicts below this confidence reject the evidence
    #[serde(default = "default_min_verdict_confidence")]
    pub min_verdict_confidence: f64,

    /// CUSUM slack (half the minimum meaningful shift)
    #[serde(default = "default_cusum_slack")]
    pub cusum_slack: f64,

    /// CUSUM alert threshold
    #[serde(default = "default_cusum_threshold")]
    pub cusum_threshold: f64,

    /// Axes with fewer total evidence entries are skipped by drift detection
    #[serde(default = "default_min_drift_evidence")]
    pub min_drift_evidence: u64,

    /// Cosine similarity at/above which two axes are proposed for merge
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f64,

    /// At most this many new axes may be created per UTC day (0 = no cap)
    #[serde(default = "default_max_new_axes_per_day")]
    pub max_new_axes_per_day: u64,
}

fn default_weight_floor() -> f64 {
    0.5
}
fn default_weight_ceiling() -> f64 {
    2.0
}
fn default_confidence_gain() -> f64 {
    0.025
}
fn default_confidence_cap() -> f64 {
    0.95
}
fn default_min_validation_len() -> usize {
    40
}
fn default_min_verdict_confidence() -> f64 {
    0.50
}
fn default_cusum_slack() -> f64 {
    0.5
}
fn default_cusum_threshold() -> f64 {
    4.0
}
fn default_min_drift_evidence() -> u64 {
    4
}
fn default_merge_threshold() -> f64 {
    0.88
}
fn default_max_new_axes_per_day() -> u64 {
    3
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            weight_floor: default_weight_floor(),
            weight_ceiling: default_weight_ceiling(),
            confidence_gain: default_confidence_gain(),
            confidence_cap: default_confidence_cap(),
            min_validation_len: default_min_validation_len(),
            min_verdict_confidence: default_min_verdict_confidence(),
            cusum_slack: default_cusum_slack(),
            cusum_threshold: default_cusum_threshold(),
            min_drift_evidence: default_min_drift_evidence(),
            merge_threshold: default_merge_threshold(),
            max_new_axes_per_day: default_max_new_axes_per_day(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// OpenAI-compatible embeddings endpoint base URL
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// OpenAI-compatible chat endpoint for stance validation
    #[serde(default = "default_validator_url")]
    pub validator_url: String,

    /// Validator model name
    #[serde(default = "default_validator_model")]
    pub validator_model: String,

    /// API key for both services (env override: WORLDVIEW_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-call timeout for external services, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Static source reputation table (source id -> reputation, [0, 10])
    #[serde(default)]
    pub reputation: HashMap<String, f64>,
}

fn default_embedding_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_validator_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_validator_model() -> String {
    "llama3.1".into()
}
fn default_timeout_secs() -> u64 {
    20
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            validator_url: default_validator_url(),
            validator_model: default_validator_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            reputation: HashMap::new(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ServicesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesConfig")
            .field("embedding_url", &self.embedding_url)
            .field("embedding_model", &self.embedding_model)
            .field("validator_url", &self.validator_url)
            .field("validator_model", &self.validator_model)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("reputation", &self.reputation)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.worldview/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `WORLDVIEW_DB` — database path
    /// - `WORLDVIEW_API_KEY` — service API key
    /// - `WORLDVIEW_EMBEDDING_URL` — embeddings endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(db) = std::env::var("WORLDVIEW_DB") {
            config.store.db_path = db;
        }
        if config.services.api_key.is_none() {
            config.services.api_key = std::env::var("WORLDVIEW_API_KEY").ok();
        }
        if let Ok(url) = std::env::var("WORLDVIEW_EMBEDDING_URL") {
            config.services.embedding_url = url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".worldview")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(name: &str, v: f64) -> Result<(), ConfigError> {
            if !(0.0 < v && v <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in (0, 1], got {v}"
                )));
            }
            Ok(())
        }

        unit("pipeline.dedup_threshold", self.pipeline.dedup_threshold)?;
        unit("pipeline.cluster_threshold", self.pipeline.cluster_threshold)?;
        unit("belief.merge_threshold", self.belief.merge_threshold)?;
        unit("belief.confidence_cap", self.belief.confidence_cap)?;
        unit(
            "belief.min_verdict_confidence",
            self.belief.min_verdict_confidence,
        )?;

        if self.pipeline.velocity_exponent <= 0.0 {
            return Err(ConfigError::ValidationError(
                "pipeline.velocity_exponent must be > 0".into(),
            ));
        }
        if self.belief.weight_floor > self.belief.weight_ceiling {
            return Err(ConfigError::ValidationError(
                "belief.weight_floor must be <= belief.weight_ceiling".into(),
            ));
        }
        if self.belief.cusum_threshold <= 0.0 {
            return Err(ConfigError::ValidationError(
                "belief.cusum_threshold must be > 0".into(),
            ));
        }
        if !(1..=300).contains(&self.services.timeout_secs) {
            return Err(ConfigError::ValidationError(
                "services.timeout_secs must be between 1 and 300".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
