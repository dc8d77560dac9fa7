//! Configuration for the Cruxpool monitor service

use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::aggregator::{MinerIdentity, DEFAULT_API_BASE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// General service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Cruxpool wallet to monitor
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// How often to refresh miner status (seconds)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            log_level: default_log_level(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    300 // 5 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// API root, without the coin segment
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Coin ticker as used in the API path (e.g. "eth", "etc", "rvn")
    pub coin: String,

    /// Wallet address to monitor
    pub wallet: String,

    /// Hashrate (H/s) used for the estimated earnings query
    #[serde(default = "default_reference_hashrate")]
    pub reference_hashrate: u64,

    /// Payout threshold configured for the wallet on the pool, in coins
    #[serde(default = "default_min_payout")]
    pub min_payout: Decimal,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Offset from UTC used when displaying times (minutes)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_reference_hashrate() -> u64 {
    100_000_000 // 100 MH/s
}

fn default_min_payout() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

fn default_request_timeout() -> u64 {
    5
}

impl PoolConfig {
    pub fn identity(&self) -> MinerIdentity {
        MinerIdentity {
            coin: self.coin.clone(),
            wallet: self.wallet.clone(),
            reference_hashrate: self.reference_hashrate,
            min_payout: self.min_payout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Display offset; validated in [`Config::validate`]
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&contents)?;

        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&'static str) -> Option<String>,
    {
        if let Some(val) = lookup("CRUXPOOL_API_BASE") {
            self.pool.api_base = val;
        }
        if let Some(val) = lookup("CRUXPOOL_COIN") {
            self.pool.coin = val;
        }
        if let Some(val) = lookup("CRUXPOOL_WALLET") {
            self.pool.wallet = val;
        }
        if let Some(val) = lookup("CRUXPOOL_MIN_PAYOUT") {
            self.pool.min_payout = Decimal::from_str(&val).map_err(|_| ConfigError::InvalidEnv {
                var: "CRUXPOOL_MIN_PAYOUT",
                value: val.clone(),
            })?;
        }
        if let Some(val) = lookup("CRUXPOOL_REFRESH_SECS") {
            self.service.refresh_interval_secs = val.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CRUXPOOL_REFRESH_SECS",
                value: val.clone(),
            })?;
        }
        if let Some(val) = lookup("CRUXPOOL_LOG_LEVEL") {
            self.service.log_level = val;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.coin.trim().is_empty() {
            return Err(ConfigError::Invalid("pool.coin must not be empty".to_string()));
        }
        if self.pool.wallet.trim().is_empty() {
            return Err(ConfigError::Invalid("pool.wallet must not be empty".to_string()));
        }
        if self.service.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "service.refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.pool.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(format!(
                "pool.utc_offset_minutes out of range: {}",
                self.pool.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [pool]
        coin = "eth"
        wallet = "0x1234"
    "#;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.service.refresh_interval_secs, 300);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.pool.api_base, "https://www.cruxpool.com/api");
        assert_eq!(config.pool.reference_hashrate, 100_000_000);
        assert_eq!(config.pool.min_payout, Decimal::new(1, 1));
        assert_eq!(config.pool.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.pool.display_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [service]
            refresh_interval_secs = 60
            log_level = "debug"

            [pool]
            api_base = "http://127.0.0.1:8080/api"
            coin = "rvn"
            wallet = "RAbc"
            reference_hashrate = 25000000
            min_payout = "10.5"
            request_timeout_secs = 3
            utc_offset_minutes = 120
            "#,
        )
        .unwrap();

        let identity = config.pool.identity();
        assert_eq!(identity.coin, "rvn");
        assert_eq!(identity.wallet, "RAbc");
        assert_eq!(identity.reference_hashrate, 25_000_000);
        assert_eq!(identity.min_payout, Decimal::new(105, 1));
        assert_eq!(config.pool.display_offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_rejects_empty_wallet() {
        let err = Config::from_toml_str(
            r#"
            [pool]
            coin = "eth"
            wallet = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_offset() {
        let err = Config::from_toml_str(
            r#"
            [pool]
            coin = "eth"
            wallet = "0x1234"
            utc_offset_minutes = 1440
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            ("CRUXPOOL_WALLET", "0xabcd"),
            ("CRUXPOOL_MIN_PAYOUT", "0.25"),
            ("CRUXPOOL_REFRESH_SECS", "30"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.pool.wallet, "0xabcd");
        assert_eq!(config.pool.coin, "eth");
        assert_eq!(config.pool.min_payout, Decimal::new(25, 2));
        assert_eq!(config.service.refresh_interval_secs, 30);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();

        let err = config
            .apply_env(|var| (var == "CRUXPOOL_REFRESH_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "CRUXPOOL_REFRESH_SECS",
                ..
            }
        ));
    }
}
