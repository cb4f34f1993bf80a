use crate::engine::rules;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Destination for rescued navigations.
    #[serde(default = "default_home_url")]
    pub home_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_click_hops")]
    pub max_click_ancestor_hops: usize,
    #[serde(default = "default_membership_capacity")]
    pub membership_cache_capacity: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_enable")]
    pub enable: bool,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_block_log_sinks")]
    pub block_log_sinks: Vec<String>,
    #[serde(default = "default_memory_log_capacity")]
    pub memory_log_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_enable")]
    pub enable: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// Defaults
fn default_home_url() -> String {
    rules::CANONICAL_HOME_URL.to_string()
}
fn default_sweep_interval() -> u64 {
    3
}
fn default_click_hops() -> usize {
    rules::MAX_CLICK_ANCESTOR_HOPS
}
fn default_membership_capacity() -> u64 {
    10_000
}
fn default_store_backend() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> String {
    "reel-nope.db".to_string()
}
fn default_log_enable() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_block_log_sinks() -> Vec<String> {
    vec!["console".to_string()]
}
fn default_memory_log_capacity() -> usize {
    100
}
fn default_api_enable() -> bool {
    true
}
fn default_api_port() -> u16 {
    8080
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            max_click_ancestor_hops: default_click_hops(),
            membership_cache_capacity: default_membership_capacity(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: default_log_enable(),
            level: default_log_level(),
            format: default_log_format(),
            block_log_sinks: default_block_log_sinks(),
            memory_log_capacity: default_memory_log_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable: default_api_enable(),
            port: default_api_port(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.home_url, rules::CANONICAL_HOME_URL);
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.page.sweep_interval_secs, 3);
    }

    #[test]
    fn sections_override_individually() {
        let config: Config = toml::from_str(
            "[store]\nbackend = \"memory\"\n\n[page]\nsweep_interval_secs = 10\n",
        )
        .unwrap();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.page.sweep_interval_secs, 10);
        assert_eq!(config.api.port, 8080);
    }
}
