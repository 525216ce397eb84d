//! Configuration loading.
//!
//! Layered sources: `config.toml` (optional), then `ASHARE_`-prefixed
//! environment variables (`ASHARE_LLM__API_KEY` → `llm.api_key`). Every
//! field has a default so an empty file, or no file at all, still yields
//! a runnable configuration.

use crate::error::Result;
use crate::types::SSE50_SYMBOLS;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ASHARE").separator("__"))
            .build()?;
        let mut cfg: Config = settings.try_deserialize()?;
        cfg.expand_paths();
        Ok(cfg)
    }

    fn expand_paths(&mut self) {
        self.agent.base_log_dir = shellexpand::tilde(&self.agent.base_log_dir).into_owned();
        self.market.price_file = shellexpand::tilde(&self.market.price_file).into_owned();
        self.runtime.path = shellexpand::tilde(&self.runtime.path).into_owned();
    }
}

/// Identity and session behavior of the trading agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Agent signature: names the per-agent data directory.
    #[serde(default = "default_signature")]
    pub signature: String,
    /// First ledger date when registering a fresh agent.
    #[serde(default = "default_init_date")]
    pub init_date: String,
    /// Root under which `<signature>/position` and `<signature>/log` live.
    #[serde(default = "default_base_log_dir")]
    pub base_log_dir: String,
    /// Decision attempts per trading day before falling back to no-trade.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff unit; attempt N sleeps N × this.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            signature: default_signature(),
            init_date: default_init_date(),
            base_log_dir: default_base_log_dir(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl AgentConfig {
    /// `<base_log_dir>/<signature>/position/position.jsonl`
    pub fn position_file(&self, signature: &str) -> PathBuf {
        PathBuf::from(&self.base_log_dir)
            .join(signature)
            .join("position")
            .join("position.jsonl")
    }

    /// `<base_log_dir>/<signature>/log/<date>/log.jsonl`
    pub fn session_log_file(&self, signature: &str, date: &str) -> PathBuf {
        PathBuf::from(&self.base_log_dir)
            .join(signature)
            .join("log")
            .join(date)
            .join("log.jsonl")
    }
}

/// Defaults injected into the ledger: what a synthesized or registered
/// initial snapshot contains.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            symbols: default_symbols(),
        }
    }
}

/// Where the price history lives.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_price_file")]
    pub price_file: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_file: default_price_file(),
        }
    }
}

/// LLM endpoint settings. `model` and `base_url` fall back to
/// per-provider defaults when unset.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: None,
            base_url: None,
        }
    }
}

/// Cross-process runtime context document.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_path")]
    pub path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            path: default_runtime_path(),
        }
    }
}

impl RuntimeConfig {
    /// `RUNTIME_ENV_PATH` overrides the configured location, so separately
    /// launched tool processes can agree on one document.
    pub fn resolved_path(&self) -> PathBuf {
        match std::env::var("RUNTIME_ENV_PATH") {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => PathBuf::from(&self.path),
        }
    }
}

fn default_signature() -> String {
    "deepseek-chat".to_string()
}

fn default_init_date() -> String {
    "2025-10-09".to_string()
}

fn default_base_log_dir() -> String {
    "./data/agent_data_astock".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_initial_cash() -> Decimal {
    dec!(100000.0)
}

fn default_symbols() -> Vec<String> {
    SSE50_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

fn default_price_file() -> String {
    "./data/A_stock_data.jsonl".to_string()
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_runtime_path() -> String {
    "data/.runtime_env.json".to_string()
}
