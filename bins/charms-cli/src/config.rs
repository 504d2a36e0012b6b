//! CLI configuration.
//!
//! Layers, later wins:
//! 1. built-in defaults
//! 2. TOML file (`--config <path>`, or `~/.charms/config.toml` when present)
//! 3. `CHARMS_*` environment variables (`CHARMS_NETWORK`, `CHARMS_FEE_RATE`,
//!    `CHARMS_BLACKLIST=txid:vout,txid:vout`, `CHARMS_PROTECTED=...`, ...)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use charms_core::constants::DEFAULT_CACHE_TTL_SECS;
use charms_core::network::Network;
use charms_core::types::OutPoint;
use charms_wallet::FeeRate;

/// Default fee rate in sat/vB when neither flag nor config sets one.
const DEFAULT_FEE_RATE: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Network name (`mainnet`, `testnet4`, `regtest`).
    pub network: String,
    /// Fee rate in sat/vB.
    pub fee_rate: f64,
    /// Lifetime of the memoized UTXO snapshot, in seconds.
    pub utxo_cache_ttl_secs: u64,
    /// Outpoints never selected (`txid:vout`).
    pub blacklist: Vec<String>,
    /// Outpoints holding charms or runes (`txid:vout`), never spent.
    pub protected: Vec<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Wallet data file. Defaults to `~/.charms/wallet.json`.
    pub data_file: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            network: Network::default().name().to_string(),
            fee_rate: DEFAULT_FEE_RATE,
            utxo_cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            blacklist: Vec::new(),
            protected: Vec::new(),
            log_level: "info".to_string(),
            data_file: None,
        }
    }
}

/// `~/.charms`, if a home directory exists.
pub fn charms_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".charms"))
}

impl CliConfig {
    /// Load the layered configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = CliConfig::default();
        let mut builder = ::config::Config::builder()
            .set_default("network", defaults.network)?
            .set_default("fee_rate", defaults.fee_rate)?
            .set_default("utxo_cache_ttl_secs", defaults.utxo_cache_ttl_secs as i64)?
            .set_default("blacklist", Vec::<String>::new())?
            .set_default("protected", Vec::<String>::new())?
            .set_default("log_level", defaults.log_level)?;

        builder = match path {
            Some(p) => builder.add_source(::config::File::from(p).required(true)),
            None => match charms_dir() {
                Some(dir) => builder.add_source(::config::File::from(dir.join("config.toml")).required(false)),
                None => builder,
            },
        };

        builder = builder.add_source(
            ::config::Environment::with_prefix("CHARMS")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("blacklist")
                .with_list_parse_key("protected"),
        );

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn network(&self) -> Result<Network> {
        self.network
            .parse()
            .with_context(|| format!("invalid network in configuration: {}", self.network))
    }

    pub fn fee_rate(&self) -> Result<FeeRate> {
        FeeRate::new(self.fee_rate).context("invalid fee_rate in configuration")
    }

    pub fn utxo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.utxo_cache_ttl_secs)
    }

    pub fn blacklist(&self) -> Result<Vec<OutPoint>> {
        parse_outpoints(&self.blacklist, "blacklist")
    }

    pub fn protected(&self) -> Result<Vec<OutPoint>> {
        parse_outpoints(&self.protected, "protected")
    }

    /// Data file path, falling back to `~/.charms/wallet.json`.
    pub fn data_file(&self) -> Result<PathBuf> {
        if let Some(p) = &self.data_file {
            return Ok(p.clone());
        }
        let dir = charms_dir().context("could not determine home directory")?;
        Ok(dir.join("wallet.json"))
    }
}

fn parse_outpoints(entries: &[String], key: &str) -> Result<Vec<OutPoint>> {
    entries
        .iter()
        .map(|s| {
            s.parse::<OutPoint>()
                .with_context(|| format!("invalid {key} entry {s:?}"))
        })
        .collect()
}
