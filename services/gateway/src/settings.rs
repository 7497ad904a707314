//! Service configuration
//!
//! Built-in defaults, then `config/marketplace.yaml` (or the file named by
//! `MARKETPLACE_CONFIG`), then `MARKETPLACE_*` environment variables with
//! `__` between nested keys, e.g. `MARKETPLACE_ENGINE__SWEEP_INTERVAL_SECS=5`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use config::{Config, ConfigError, Environment, File};
use matching_engine::EngineConfig;
use persistence::{FsyncPolicy, JournalConfig};
use risk_engine::RateTable;
use rust_decimal::Decimal;
use serde::Deserialize;
use types::fee::FeeSchedule;

pub const DEFAULT_CONFIG_FILE: &str = "config/marketplace.yaml";
pub const CONFIG_FILE_VAR: &str = "MARKETPLACE_CONFIG";
const ENV_PREFIX: &str = "MARKETPLACE";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub http: HttpSettings,
    pub engine: EngineSettings,
    pub ledger: LedgerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
    #[serde(default)]
    pub rates: Vec<RateOverride>,
    #[serde(default)]
    pub seed: SeedSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub sweep_interval_secs: u64,
    pub eager_sweep: bool,
    pub system_fee_rate: Decimal,
    pub io_timeout_ms: u64,
    pub dedup_window: usize,
    pub command_buffer: usize,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    pub journal_dir: PathBuf,
    /// `every_write`, `every_n` or `on_rotation`
    pub fsync: String,
    /// Batch size for `every_n`
    pub fsync_every: usize,
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub exchange: String,
    pub routing_key: String,
    pub queue: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateOverride {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
}

/// Wallets and products created at startup when missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedSettings {
    #[serde(default)]
    pub wallets: Vec<SeedWallet>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedWallet {
    pub user_id: i64,
    pub currency: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub product_name: String,
    pub product_count: i64,
    pub currency: String,
    pub base_amount: Decimal,
}

impl Settings {
    /// Load from the default sources
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_FILE_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(&file, None)
    }

    /// Load from `file` (optional) and the environment
    ///
    /// `env` replaces the process environment when given.
    pub fn from_sources(file: &str, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("http.bind", "0.0.0.0:8080")?
            .set_default("engine.sweep_interval_secs", 30)?
            .set_default("engine.eager_sweep", false)?
            .set_default("engine.system_fee_rate", "0")?
            .set_default("engine.io_timeout_ms", 5000)?
            .set_default("engine.dedup_window", 10_000)?
            .set_default("engine.command_buffer", 1024)?
            .set_default("engine.retry_backoff_ms", 200)?
            .set_default("ledger.journal_dir", "data/journal")?
            .set_default("ledger.fsync", "every_write")?
            .set_default("ledger.fsync_every", 64)?
            .set_default("ledger.max_file_size", 64 * 1024 * 1024)?
            .set_default("broker.exchange", "transaction_exchange")?
            .set_default("broker.routing_key", "notify_purchase_product_key")?
            .set_default("broker.queue", "transaction_engine")?
            .set_default("log.filter", "info,tower_http=debug")?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in rates with the configured overrides applied
    pub fn rate_table(&self) -> anyhow::Result<RateTable> {
        let mut table = RateTable::builtin();
        for o in &self.rates {
            table
                .set(&o.from, &o.to, o.rate)
                .with_context(|| format!("rate override {}->{}", o.from, o.to))?;
        }
        Ok(table)
    }
}

impl EngineSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let fees = FeeSchedule::new(self.system_fee_rate)
            .ok_or_else(|| anyhow!("system_fee_rate must be within [0, 1], got {}", self.system_fee_rate))?;
        if self.sweep_interval_secs == 0 {
            return Err(anyhow!("sweep_interval_secs must be positive"));
        }
        Ok(EngineConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            eager_sweep: self.eager_sweep,
            fees,
            io_timeout: self.io_timeout(),
            dedup_window: self.dedup_window,
            command_buffer: self.command_buffer.max(1),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        })
    }
}

impl LedgerSettings {
    pub fn journal_config(&self) -> anyhow::Result<JournalConfig> {
        let fsync_policy = match self.fsync.as_str() {
            "every_write" => FsyncPolicy::EveryWrite,
            "every_n" => FsyncPolicy::EveryN(self.fsync_every.max(1)),
            "on_rotation" => FsyncPolicy::OnRotation,
            other => return Err(anyhow!("unknown fsync policy: {other}")),
        };
        Ok(JournalConfig {
            max_file_size: self.max_file_size,
            fsync_policy,
            ..JournalConfig::new(self.journal_dir.clone())
        })
    }
}
