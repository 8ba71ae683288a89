//! Configuration types for the homewatch service

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::{default_profiles, OverflowPolicy, ThresholdProfile};
use crate::field::SensorField;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Remote data channel configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelConfig {
    #[serde(rename = "firebase")]
    Firebase {
        database_url: String,
        #[serde(default)]
        auth_token: Option<String>,
        #[serde(default)]
        auth_token_env: Option<String>,
        #[serde(default)]
        reconnect: ReconnectConfig,
    },
    /// In-process store, optionally seeded with initial values
    #[serde(rename = "memory")]
    Memory {
        #[serde(default)]
        seed: BTreeMap<String, serde_json::Value>,
    },
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig::Memory {
            seed: BTreeMap::new(),
        }
    }
}

impl ChannelConfig {
    pub fn type_name(&self) -> &str {
        match self {
            ChannelConfig::Firebase { .. } => "firebase",
            ChannelConfig::Memory { .. } => "memory",
        }
    }
}

/// Backoff used when a streaming subscription drops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (0-based), doubling up to the max
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Which fields the registry subscribes to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default = "default_fields")]
    pub watch: Vec<SensorField>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            watch: default_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_profiles")]
    pub thresholds: BTreeMap<SensorField, ThresholdProfile>,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            thresholds: default_profiles(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold_cm: f64,
    #[serde(default = "default_fire_threshold")]
    pub fire_threshold_percent: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_cm: default_proximity_threshold(),
            fire_threshold_percent: default_fire_threshold(),
        }
    }
}

/// History retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "retention", rename_all = "snake_case")]
pub enum HistoryConfig {
    /// Keep every entry for the lifetime of the session
    Unbounded,
    /// Keep the most recent `capacity` entries
    Ring { capacity: usize },
    /// Keep entries observed within the last `seconds`
    Window { seconds: u64 },
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig::Ring {
            capacity: default_history_capacity(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Config {
    /// Fill in secrets that are referenced by environment variable name
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        if let ChannelConfig::Firebase {
            auth_token,
            auth_token_env,
            ..
        } = &mut self.channel
        {
            if auth_token.is_none() {
                if let Some(var) = auth_token_env {
                    let token = std::env::var(var.as_str()).map_err(|_| {
                        crate::HomewatchError::Config(format!(
                            "Environment variable {} is not set",
                            var
                        ))
                    })?;
                    *auth_token = Some(token);
                }
            }
        }
        Ok(())
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_fields() -> Vec<SensorField> {
    SensorField::ALL.to_vec()
}

fn default_proximity_threshold() -> f64 {
    20.0
}

fn default_fire_threshold() -> f64 {
    80.0
}

fn default_history_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_refresh_interval_ms() -> u64 {
    2000
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::HomewatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
