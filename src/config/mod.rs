//! # Configuration Management Module
//!
//! Farmreset reads a single TOML file (default `config.toml`). Every section
//! has defaults, so a file only needs the values an operator wants to change.
//!
//! ```toml
//! [reset]
//! reset_hour = 12            # hour of day (0-23) in the schedule timezone
//! reset_interval_days = 30
//! timezone = "Europe/Berlin" # IANA zone the schedule is kept in
//! check_interval_seconds = 60
//! catch_up_missed = true
//! restart_after_reset = true
//! restart_delay_seconds = 2
//!
//! [storage]
//! data_dir = "./data"
//!
//! [host]
//! worlds_dir = "./worlds"
//! default_world = "world"
//!
//! [progress]
//! enabled = true
//! refresh_seconds = 1
//!
//! [logging]
//! level = "info"
//! file = "farmreset.log"
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use farmreset::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Resets every {} days", config.reset.reset_interval_days);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schedule and reset behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfig {
    /// Hour of day (0-23) at which scheduled resets happen.
    #[serde(default = "default_reset_hour")]
    pub reset_hour: u32,
    /// Days between scheduled resets.
    #[serde(default = "default_interval_days")]
    pub reset_interval_days: u32,
    /// IANA timezone the schedule is kept in, independent of the host machine.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// How often the due-check runs.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Fire a reset that was missed while the server was down on the next check.
    #[serde(default = "default_true")]
    pub catch_up_missed: bool,
    /// Ask the host to restart after an automatic reset pass.
    #[serde(default = "default_true")]
    pub restart_after_reset: bool,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_seconds: u64,
}

fn default_reset_hour() -> u32 {
    12
}

fn default_interval_days() -> u32 {
    30
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_check_interval() -> u64 {
    60
}

fn default_restart_delay() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            reset_hour: default_reset_hour(),
            reset_interval_days: default_interval_days(),
            timezone: default_timezone(),
            check_interval_seconds: default_check_interval(),
            catch_up_missed: true,
            restart_after_reset: true,
            restart_delay_seconds: default_restart_delay(),
        }
    }
}

impl ResetConfig {
    /// The timezone the schedule is evaluated in.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("reset.timezone '{}' is not a known IANA zone: {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

/// Settings for the built-in directory-backed host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub worlds_dir: String,
    /// World players are evacuated to; never reset.
    pub default_world: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worlds_dir: "./worlds".to_string(),
            default_world: "world".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub enabled: bool,
    pub refresh_seconds: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("farmreset.log".to_string()),
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.reset;
        if r.reset_hour > 23 {
            return Err(anyhow!("reset.reset_hour must be 0-23, got {}", r.reset_hour));
        }
        if r.reset_interval_days == 0 {
            return Err(anyhow!("reset.reset_interval_days must be at least 1"));
        }
        r.tz()?;
        if r.check_interval_seconds == 0 || r.check_interval_seconds > 60 {
            // The due window is one minute wide; checking less often can skip it
            return Err(anyhow!(
                "reset.check_interval_seconds must be 1-60, got {}",
                r.check_interval_seconds
            ));
        }
        if self.progress.refresh_seconds == 0 {
            return Err(anyhow!("progress.refresh_seconds must be at least 1"));
        }
        if self.host.default_world.is_empty() {
            return Err(anyhow!("host.default_world cannot be empty"));
        }
        Ok(())
    }
}
