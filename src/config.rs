//! Configuration management
//!
//! Tunables for confidence arithmetic, proposal rate limits, decay and outcome
//! tracking. Every field has a serde default so a partial config file is valid.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Confidence arithmetic and feedback weights
    #[serde(default)]
    pub engine: EngineConfig,
    /// Proposal rate limits
    #[serde(default)]
    pub gate: GateConfig,
    /// Decay cadence and retention
    #[serde(default)]
    pub decay: DecayConfig,
    /// Implicit feedback after autonomous actions
    #[serde(default)]
    pub outcome: OutcomeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Confidence of a pattern on first observation when no seed is given
    #[serde(default = "default_initial_confidence")]
    pub initial_confidence: f64,
    /// Increase applied on every re-observation
    #[serde(default = "default_reinforce_step")]
    pub reinforce_step: f64,
    /// Ceiling enforced on increases
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
    /// Deletion floor; penalties never go below it
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Confidence at which a pattern becomes eligible for a proposal
    #[serde(default = "default_propose_threshold")]
    pub propose_threshold: f64,
    /// Penalty applied when the operator rejects a proposal
    #[serde(default = "default_rejection_penalty")]
    pub rejection_penalty: f64,
    /// Bonus applied on a positive reply after an autonomous action
    #[serde(default = "default_reinforce_step")]
    pub positive_outcome_bonus: f64,
    /// Penalty applied on a negative reply after an autonomous action
    #[serde(default = "default_rejection_penalty")]
    pub negative_outcome_penalty: f64,
}

fn default_initial_confidence() -> f64 {
    0.4
}

fn default_reinforce_step() -> f64 {
    0.05
}

fn default_max_confidence() -> f64 {
    0.95
}

fn default_min_confidence() -> f64 {
    0.1
}

fn default_propose_threshold() -> f64 {
    0.7
}

fn default_rejection_penalty() -> f64 {
    0.15
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_confidence: default_initial_confidence(),
            reinforce_step: default_reinforce_step(),
            max_confidence: default_max_confidence(),
            min_confidence: default_min_confidence(),
            propose_threshold: default_propose_threshold(),
            rejection_penalty: default_rejection_penalty(),
            positive_outcome_bonus: default_reinforce_step(),
            negative_outcome_penalty: default_rejection_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum proposals issued per UTC day
    #[serde(default = "default_max_per_day")]
    pub max_proposals_per_day: usize,
    /// Minimum gap between two proposals on the same topic
    #[serde(default = "default_topic_cooldown_minutes")]
    pub topic_cooldown_minutes: i64,
    /// How long a rejected pattern stays silent
    #[serde(default = "default_rejection_cooldown_hours")]
    pub rejection_cooldown_hours: i64,
    /// Unanswered proposals expire after this long
    #[serde(default = "default_pending_expiry_hours")]
    pub pending_expiry_hours: i64,
}

fn default_max_per_day() -> usize {
    4
}

fn default_topic_cooldown_minutes() -> i64 {
    120
}

fn default_rejection_cooldown_hours() -> i64 {
    72
}

fn default_pending_expiry_hours() -> i64 {
    24
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_proposals_per_day: default_max_per_day(),
            topic_cooldown_minutes: default_topic_cooldown_minutes(),
            rejection_cooldown_hours: default_rejection_cooldown_hours(),
            pending_expiry_hours: default_pending_expiry_hours(),
        }
    }
}

impl GateConfig {
    pub fn topic_cooldown(&self) -> Duration {
        Duration::minutes(self.topic_cooldown_minutes)
    }

    pub fn rejection_cooldown(&self) -> Duration {
        Duration::hours(self.rejection_cooldown_hours)
    }

    pub fn pending_expiry(&self) -> Duration {
        Duration::hours(self.pending_expiry_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Days after the last observation before decay starts counting
    #[serde(default = "default_grace_days")]
    pub grace_days: i64,
    /// Confidence lost per whole week beyond the grace period
    #[serde(default = "default_decay_step")]
    pub step_per_week: f64,
    /// Seconds between scheduled decay passes
    #[serde(default = "default_decay_interval")]
    pub interval_secs: u64,
    /// Resolved proposals older than this are dropped during decay
    #[serde(default = "default_retention_days")]
    pub proposal_retention_days: i64,
}

fn default_grace_days() -> i64 {
    7
}

fn default_decay_step() -> f64 {
    0.05
}

fn default_decay_interval() -> u64 {
    86_400
}

fn default_retention_days() -> i64 {
    30
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            grace_days: default_grace_days(),
            step_per_week: default_decay_step(),
            interval_secs: default_decay_interval(),
            proposal_retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeConfig {
    /// Longer replies are treated as unrelated conversation
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

fn default_max_reply_chars() -> usize {
    50
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings that would break the confidence invariants
    pub fn validate(&self) -> Result<()> {
        let e = &self.engine;
        if !(0.0..1.0).contains(&e.min_confidence) || e.min_confidence >= e.max_confidence {
            anyhow::bail!(
                "engine.min_confidence ({}) must be in [0, 1) and below engine.max_confidence ({})",
                e.min_confidence, e.max_confidence
            );
        }
        if e.max_confidence > 1.0 {
            anyhow::bail!("engine.max_confidence ({}) must not exceed 1.0", e.max_confidence);
        }
        if e.initial_confidence < e.min_confidence || e.initial_confidence > e.max_confidence {
            anyhow::bail!(
                "engine.initial_confidence ({}) must lie between min and max confidence",
                e.initial_confidence
            );
        }
        for (name, value) in [
            ("engine.reinforce_step", e.reinforce_step),
            ("engine.rejection_penalty", e.rejection_penalty),
            ("engine.positive_outcome_bonus", e.positive_outcome_bonus),
            ("engine.negative_outcome_penalty", e.negative_outcome_penalty),
            ("decay.step_per_week", self.decay.step_per_week),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{} must be a non-negative number, got {}", name, value);
            }
        }
        if self.decay.grace_days < 0 || self.decay.interval_secs == 0 {
            anyhow::bail!("decay.grace_days must be >= 0 and decay.interval_secs > 0");
        }
        if self.gate.topic_cooldown_minutes < 0 || self.gate.rejection_cooldown_hours < 0 {
            anyhow::bail!("gate cooldowns must not be negative");
        }
        if self.gate.pending_expiry() < self.gate.topic_cooldown() {
            anyhow::bail!(
                "gate.pending_expiry_hours ({}) must cover the topic cooldown ({} minutes)",
                self.gate.pending_expiry_hours, self.gate.topic_cooldown_minutes
            );
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "adaptive-feedback", "adaptive-feedback")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "adaptive-feedback", "adaptive-feedback")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
