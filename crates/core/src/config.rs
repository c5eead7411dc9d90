use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_http")]
    pub rpc_http: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_inspect_method")]
    pub inspect_method: String,
    #[serde(default = "default_sleep_ms_min")]
    pub sleep_ms_min: u64,
    #[serde(default = "default_sleep_ms_jitter")]
    pub sleep_ms_jitter: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_hits")]
    pub hits: u32,
    #[serde(default = "default_search_sleep_ms_min")]
    pub sleep_ms_min: u64,
    #[serde(default = "default_sleep_ms_jitter")]
    pub sleep_ms_jitter: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default = "default_inspect_hits")]
    pub inspect_hits: u32,
    #[serde(default = "default_gas_price_floor_gwei")]
    pub gas_price_floor_gwei: f64,
    #[serde(default = "default_consolidated_limit")]
    pub consolidated_limit: usize,
    #[serde(default = "default_top_senders_limit")]
    pub top_senders_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_bind")]
    pub metrics_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("POOLSCOUT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_http: default_rpc_http(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            inspect_method: default_inspect_method(),
            sleep_ms_min: default_sleep_ms_min(),
            sleep_ms_jitter: default_sleep_ms_jitter(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hits: default_search_hits(),
            sleep_ms_min: default_search_sleep_ms_min(),
            sleep_ms_jitter: default_sleep_ms_jitter(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            inspect_hits: default_inspect_hits(),
            gas_price_floor_gwei: default_gas_price_floor_gwei(),
            consolidated_limit: default_consolidated_limit(),
            top_senders_limit: default_top_senders_limit(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_bind: default_metrics_bind(),
            log_level: default_log_level(),
        }
    }
}

fn default_rpc_http() -> String {
    "https://rpc.berachain.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_inspect_method() -> String {
    "inspect".to_string()
}

fn default_sleep_ms_min() -> u64 {
    50
}

fn default_sleep_ms_jitter() -> u64 {
    50
}

fn default_search_hits() -> u32 {
    50
}

fn default_search_sleep_ms_min() -> u64 {
    100
}

fn default_samples() -> u32 {
    30
}

fn default_inspect_hits() -> u32 {
    30
}

fn default_gas_price_floor_gwei() -> f64 {
    1.0
}

fn default_consolidated_limit() -> usize {
    50
}

fn default_top_senders_limit() -> usize {
    10
}

fn default_metrics_bind() -> String {
    "127.0.0.1:9464".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
