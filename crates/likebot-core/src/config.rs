//! Likebot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LikebotError, Result};
use crate::types::ActionClass;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikebotConfig {
    /// Privileged principal ids (static, loaded at startup).
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// SQLite database path; empty means `~/.likebot/likebot.db`.
    #[serde(default)]
    pub db_path: String,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for LikebotConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            db_path: String::new(),
            quota: QuotaConfig::default(),
            gateway: GatewayConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl LikebotConfig {
    /// Load config from the default path (~/.likebot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LikebotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LikebotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LikebotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Likebot home directory (~/.likebot).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".likebot")
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        if self.db_path.is_empty() {
            Self::home_dir().join("likebot.db")
        } else {
            PathBuf::from(&self.db_path)
        }
    }
}

/// Daily quota defaults and the anchor timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Likes per day when no per-principal override is set.
    #[serde(default = "default_like_limit")]
    pub like_limit: u32,
    /// Auto-task creations per day when no override is set.
    #[serde(default = "default_auto_limit")]
    pub auto_limit: u32,
    /// Anchor timezone as whole hours east of UTC. Daily counters roll
    /// over at local midnight in this zone.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

fn default_like_limit() -> u32 {
    3
}
fn default_auto_limit() -> u32 {
    5
}
fn default_utc_offset() -> i32 {
    6
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            like_limit: default_like_limit(),
            auto_limit: default_auto_limit(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl QuotaConfig {
    /// Class-wide default limit for an action class.
    pub fn default_limit(&self, class: ActionClass) -> u32 {
        match class {
            ActionClass::Like => self.like_limit,
            ActionClass::Auto => self.auto_limit,
        }
    }

    pub fn anchor(&self) -> chrono::FixedOffset {
        crate::clock::anchor_offset(self.utc_offset_hours)
    }
}

/// External like-API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-call timeout; exceeding it counts as a failed attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://likes.example.com/like".into()
}
fn default_server_name() -> String {
    "bd".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            server_name: default_server_name(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Daily trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Local hour (anchor timezone) at which the daily batch fires.
    #[serde(default = "default_run_hour")]
    pub run_hour: u32,
    #[serde(default)]
    pub run_minute: u32,
    /// How often the trigger loop checks whether the fire time passed.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_run_hour() -> u32 {
    7
}
fn default_check_interval() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_hour: default_run_hour(),
            run_minute: 0,
            check_interval_secs: default_check_interval(),
        }
    }
}
