//! Tunable constants for detection and messaging.
//!
//! Every weight, threshold, timer and bound lives here so deployments can
//! tune them from a JSON file. Missing keys fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub channel: ChannelConfig,
}

impl AppConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.detection.scoring;
        if s.full_score == 0 {
            return Err(ConfigError::Invalid("scoring.full_score must be > 0".into()));
        }
        if s.prior_weight_pct + s.field_weight_pct + s.coverage_weight_pct != 100 {
            return Err(ConfigError::Invalid(
                "aggregate weights (prior, field, coverage) must sum to 100".into(),
            ));
        }
        if self.detection.sections.min_fields == 0 {
            return Err(ConfigError::Invalid("sections.min_fields must be > 0".into()));
        }
        if self.detection.max_detection_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_detection_attempts must be > 0".into(),
            ));
        }
        let c = &self.channel;
        if c.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if c.retry.factor < 1.0 {
            return Err(ConfigError::Invalid("retry.factor must be >= 1".into()));
        }
        if c.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        if c.missed_ping_limit == 0 {
            return Err(ConfigError::Invalid("missed_ping_limit must be > 0".into()));
        }
        Ok(())
    }
}

/// Field-classifier and aggregate-confidence weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per pattern matched in label/name/placeholder.
    pub pattern_weight: u32,
    /// Per keyword matched in label/name/placeholder.
    pub keyword_weight: u32,
    /// Percentage of the above applied to matches in nearby free text.
    pub secondary_pct: u32,
    /// Bonus when the input kind fits the category (email input → email).
    pub kind_affinity_weight: u32,
    /// Winning score must reach this, else the field is `other`.
    pub min_score: u32,
    /// Score that maps to confidence 100.
    pub full_score: u32,
    /// Confidence reported for `other`.
    pub fallback_confidence: u8,
    pub prior_weight_pct: u32,
    pub field_weight_pct: u32,
    pub coverage_weight_pct: u32,
    /// Aggregate confidence at which a page counts as a registration form.
    pub form_threshold: u8,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            pattern_weight: 40,
            keyword_weight: 10,
            secondary_pct: 40,
            kind_affinity_weight: 20,
            min_score: 25,
            full_score: 60,
            fallback_confidence: 10,
            prior_weight_pct: 30,
            field_weight_pct: 50,
            coverage_weight_pct: 20,
            form_threshold: 50,
        }
    }
}

/// Section-detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Styled text at or above this prominence is a candidate header.
    pub prominence_threshold: u32,
    /// Fields that must follow a candidate before the next one.
    pub min_fields: usize,
    /// Largest vertical gap tolerated while looking for the next field.
    pub max_gap_px: f32,
    /// Largest element-count gap tolerated while looking for the next field.
    pub max_dom_gap: usize,
    /// Checkboxes closer than this collapse into one group.
    pub checkbox_proximity_px: f32,
    /// Longer text is never a header.
    pub max_header_len: usize,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            prominence_threshold: 5,
            min_fields: 2,
            max_gap_px: 300.0,
            max_dom_gap: 25,
            checkbox_proximity_px: 40.0,
            max_header_len: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub scoring: ScoringWeights,
    pub sections: SectionConfig,
    pub settle_delay_ms: u64,
    /// Snapshot attempts per cycle before reporting exhaustion.
    pub max_detection_attempts: u32,
    pub detection_retry_delay_ms: u64,
    /// Send `progressiveUpdate` previews while stabilizing.
    pub progressive_updates: bool,
    /// Fatal error notifications allowed per page instance.
    pub fatal_report_cap: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            sections: SectionConfig::default(),
            settle_delay_ms: 1500,
            max_detection_attempts: 3,
            detection_retry_delay_ms: 250,
            progressive_updates: false,
            fatal_report_cap: 3,
        }
    }
}

impl DetectionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn detection_retry_delay(&self) -> Duration {
        Duration::from_millis(self.detection_retry_delay_ms)
    }
}

/// Exponential backoff for reconnection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before the channel gives up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 10_000,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at the maximum.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.factor.powi(attempt as i32);
        let delay = delay.min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
    /// Queued messages older than this are dropped undelivered.
    pub queue_ttl_ms: u64,
    pub send_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    /// Consecutive unanswered pings before the peer counts as gone.
    pub missed_ping_limit: u32,
    /// Freshness window of the last-known result.
    pub cache_ttl_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            queue_capacity: 100,
            queue_ttl_ms: 30_000,
            send_timeout_ms: 3_000,
            connect_timeout_ms: 3_000,
            ping_interval_ms: 5_000,
            ping_timeout_ms: 1_000,
            missed_ping_limit: 3,
            cache_ttl_ms: 300_000,
        }
    }
}

impl ChannelConfig {
    pub fn queue_ttl(&self) -> Duration {
        Duration::from_millis(self.queue_ttl_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
