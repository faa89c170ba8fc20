use dond_types::{
    game::{normalize_tx_hash, GameSettings},
    Address, AddressError,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::Level;

/// Configuration for the [crate::Backend], read from YAML.
#[derive(Deserialize, Serialize)]
pub struct Config {
    pub port: u16,
    pub log_level: String,

    /// Secret expected in the admin key header. Admin routes are closed without one.
    #[serde(default)]
    pub admin_key: Option<String>,
    /// Append-only journal replayed on start. State is in-memory only without one.
    #[serde(default)]
    pub journal: Option<String>,

    /// Address receiving entry fees.
    pub treasury: String,
    /// Entry fee in cents.
    #[serde(default = "default_entry_fee")]
    pub entry_fee: u64,

    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default = "default_period_check_secs")]
    pub period_check_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaymentConfig {
    /// Verify transfers against a BSC JSON-RPC endpoint.
    Bep20 { rpc_url: String },
    /// Answer from a fixed list. For local runs and tests.
    Static {
        #[serde(default)]
        confirmed: Vec<String>,
        #[serde(default)]
        accept_all: bool,
    },
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self::Static {
            confirmed: Vec::new(),
            accept_all: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Interval after which one request of the burst is replenished.
    pub replenish_ms: u64,
    pub burst: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} is not a valid address: {value}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: AddressError,
    },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("invalid rpc url: {value}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid transaction hash: {value}")]
    InvalidTxHash { value: String },
    #[error("admin_key must not be empty")]
    EmptyAdminKey,
}

pub struct ValidatedConfig {
    pub port: u16,
    pub log_level: Level,

    pub admin_key: Option<String>,
    pub journal: Option<PathBuf>,

    pub settings: GameSettings,
    pub payment: PaymentConfig,
    pub rate_limit: Option<RateLimitConfig>,
    pub period_check: Duration,
}

fn default_entry_fee() -> u64 {
    GameSettings::default().entry_fee
}

fn default_period_check_secs() -> u64 {
    60
}

fn non_zero(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(value)
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        if self.admin_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(ConfigError::EmptyAdminKey);
        }

        let treasury =
            Address::parse(&self.treasury).map_err(|source| ConfigError::InvalidAddress {
                field: "treasury",
                value: self.treasury.clone(),
                source,
            })?;
        let settings = GameSettings {
            entry_fee: non_zero("entry_fee", self.entry_fee)?,
            treasury,
            ..GameSettings::default()
        };

        let payment = match self.payment {
            PaymentConfig::Bep20 { rpc_url } => {
                url::Url::parse(&rpc_url).map_err(|source| ConfigError::InvalidUrl {
                    value: rpc_url.clone(),
                    source,
                })?;
                PaymentConfig::Bep20 { rpc_url }
            }
            PaymentConfig::Static {
                confirmed,
                accept_all,
            } => PaymentConfig::Static {
                confirmed: confirmed
                    .into_iter()
                    .map(|hash| {
                        normalize_tx_hash(&hash).ok_or(ConfigError::InvalidTxHash { value: hash })
                    })
                    .collect::<Result<_, _>>()?,
                accept_all,
            },
        };

        if let Some(limit) = &self.rate_limit {
            non_zero("rate_limit.replenish_ms", limit.replenish_ms)?;
            non_zero("rate_limit.burst", limit.burst as u64)?;
        }
        let period_check_secs = non_zero("period_check_secs", self.period_check_secs)?;

        Ok(ValidatedConfig {
            port: self.port,
            log_level,
            admin_key: self.admin_key,
            journal: self.journal.map(PathBuf::from),
            settings,
            payment,
            rate_limit: self.rate_limit,
            period_check: Duration::from_secs(period_check_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREASURY: &str = "0x00000000000000000000000000000000000000aa";

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(&format!(
            "port: 8080\nlog_level: info\ntreasury: \"{TREASURY}\"\n"
        ))
        .validate()
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.settings.entry_fee, GameSettings::default().entry_fee);
        assert_eq!(config.settings.treasury.to_string(), TREASURY);
        assert_eq!(config.payment, PaymentConfig::default());
        assert!(config.admin_key.is_none());
        assert!(config.journal.is_none());
        assert_eq!(config.period_check, Duration::from_secs(60));
    }

    #[test]
    fn test_full_config() {
        let yaml = format!(
            r#"
port: 9000
log_level: debug
admin_key: secret
journal: /tmp/dond.journal
treasury: "{}"
entry_fee: 2500
payment:
  mode: bep20
  rpc_url: https://bsc-dataseed.binance.org
rate_limit:
  replenish_ms: 100
  burst: 50
period_check_secs: 5
"#,
            TREASURY.to_uppercase().replace("0X", "0x")
        );
        let config = parse(&yaml).validate().unwrap();
        assert_eq!(config.admin_key.as_deref(), Some("secret"));
        assert_eq!(config.journal, Some(PathBuf::from("/tmp/dond.journal")));
        assert_eq!(config.settings.entry_fee, 2_500);
        assert_eq!(config.settings.treasury.to_string(), TREASURY);
        assert!(matches!(config.payment, PaymentConfig::Bep20 { .. }));
        assert_eq!(
            config.rate_limit,
            Some(RateLimitConfig {
                replenish_ms: 100,
                burst: 50
            })
        );
    }

    #[test]
    fn test_static_hashes_are_normalized() {
        let hash = format!("0x{}", "AB".repeat(32));
        let yaml = format!(
            "port: 1\nlog_level: warn\ntreasury: \"{TREASURY}\"\npayment:\n  mode: static\n  confirmed: [\"{hash}\"]\n"
        );
        let config = parse(&yaml).validate().unwrap();
        assert_eq!(
            config.payment,
            PaymentConfig::Static {
                confirmed: vec![format!("0x{}", "ab".repeat(32))],
                accept_all: false,
            }
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let base = format!("port: 1\nlog_level: info\ntreasury: \"{TREASURY}\"\n");

        let err = parse(&base.replace("info", "loud")).validate().err().unwrap();
        assert!(matches!(err, ConfigError::InvalidLogLevel { .. }));

        let err = parse(&base.replace(TREASURY, "0x1234"))
            .validate()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress {
                field: "treasury",
                ..
            }
        ));

        let err = parse(&format!("{base}entry_fee: 0\n"))
            .validate()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::InvalidNonZero {
                field: "entry_fee",
                ..
            }
        ));

        let err = parse(&format!("{base}admin_key: \"  \"\n"))
            .validate()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::EmptyAdminKey));

        let err = parse(&format!(
            "{base}payment:\n  mode: bep20\n  rpc_url: not a url\n"
        ))
        .validate()
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
