use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use crate::forecast::types::DEFAULT_QUANTILE_LEVELS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    pub inference: InferenceConfig,
    pub function: FunctionConfig,
    #[serde(default)]
    pub forecast: ForecastDefaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Clickhouse,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            table: default_table(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    pub base_url: String,
    pub function_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDefaults {
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    #[serde(default = "default_prediction_length")]
    pub prediction_length: u32,
    #[serde(default = "default_quantile_levels")]
    pub quantile_levels: Vec<f64>,
    #[serde(default = "default_history_lookback_days")]
    pub history_lookback_days: u32,
}

impl Default for ForecastDefaults {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            context_length: default_context_length(),
            prediction_length: default_prediction_length(),
            quantile_levels: default_quantile_levels(),
            history_lookback_days: default_history_lookback_days(),
        }
    }
}

fn default_table() -> String { "total_load_data".to_string() }
fn default_sqlite_path() -> String { "total_load.db".to_string() }
fn default_clickhouse_url() -> String { "http://localhost:8123".to_string() }
fn default_database() -> String { "default".to_string() }
fn default_frequency() -> u32 { 15 }
fn default_context_length() -> u32 { 672 }
fn default_prediction_length() -> u32 { 96 }
fn default_quantile_levels() -> Vec<f64> { DEFAULT_QUANTILE_LEVELS.to_vec() }
fn default_history_lookback_days() -> u32 { 14 }

/// Credentials and endpoint overrides, from the environment / `.env`.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub clickhouse_user: String,
    pub clickhouse_password: Option<String>,
    pub clickhouse_url: Option<String>,
    pub inference_api_key: Option<String>,
    pub inference_base_url: Option<String>,
    pub function_api_key: Option<String>,
    pub function_base_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Environment values win over the file.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.clickhouse_url {
            self.clickhouse.url = url.clone();
        }
        if let Some(url) = &env.inference_base_url {
            self.inference.base_url = url.clone();
        }
        if let Some(url) = &env.function_base_url {
            self.function.base_url = url.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            clickhouse_user: std::env::var("CLICKHOUSE_USER")
                .unwrap_or_else(|_| "default".to_string()),
            clickhouse_password: std::env::var("CLICKHOUSE_PASSWORD").ok(),
            clickhouse_url: std::env::var("CLICKHOUSE_URL").ok(),
            inference_api_key: std::env::var("INFERENCE_API_KEY").ok(),
            inference_base_url: std::env::var("INFERENCE_BASE_URL").ok(),
            function_api_key: std::env::var("FUNCTION_API_KEY").ok(),
            function_base_url: std::env::var("FUNCTION_BASE_URL").ok(),
        })
    }
}
