//! Configuration types for poly-updown
//!
//! Loaded from TOML and validated before the engine constructs anything.
//! Risk parameters are never silently defaulted: an invalid value fails
//! startup with every problem listed.

use crate::order::OrderType;
use crate::risk::RiskLimits;
use crate::strategy::StrategyConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    pub risk: RiskLimits,
    #[serde(default)]
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    pub persistence: PersistenceConfig,
    pub telemetry: TelemetryConfig,
}

/// Engine loop timing and recovery settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Cryptos to trade (e.g. ["BTC"])
    pub assets: Vec<String>,
    /// Interval between periodic state snapshots
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// Interval between health checks
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// Interval between status log lines
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
    /// Interval between market rollover checks
    #[serde(default = "default_rollover_interval")]
    pub rollover_check_interval_secs: u64,
    /// Tick data older than this fails the heartbeat health dimension
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: i64,
    /// Snapshots older than this are discarded on restart (cold start)
    #[serde(default = "default_snapshot_max_age")]
    pub snapshot_max_age_secs: i64,
}

fn default_snapshot_interval() -> u64 {
    30
}
fn default_health_interval() -> u64 {
    15
}
fn default_status_interval() -> u64 {
    60
}
fn default_rollover_interval() -> u64 {
    5
}
fn default_heartbeat_timeout() -> i64 {
    30
}
fn default_snapshot_max_age() -> i64 {
    3600
}

/// Market data feed settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Spot symbol per crypto (e.g. BTC = "BTCUSDT")
    pub spot_symbols: HashMap<String, String>,
    /// Consecutive failures before a feed stops retrying (0 = forever)
    #[serde(default = "default_max_reconnects")]
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// Bound on each connection attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_reconnects() -> u32 {
    10
}
fn default_reconnect_delay() -> u64 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Paper,
    Live,
}

/// Execution engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    /// Taker fee rate applied by the paper exchange
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Order type used for entries
    #[serde(default = "default_entry_order_type")]
    pub entry_order_type: OrderType,
}

fn default_fee_rate() -> Decimal {
    dec!(0.001)
}
fn default_entry_order_type() -> OrderType {
    OrderType::Fok
}

/// Snapshot storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub snapshot_path: PathBuf,
}

/// Telemetry settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Prometheus exporter port; metrics disabled when unset
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = self.risk.validate();

        if self.engine.assets.is_empty() {
            problems.push("engine.assets must list at least one crypto".to_string());
        }
        for asset in &self.engine.assets {
            if !self.feed.spot_symbols.contains_key(asset) {
                problems.push(format!("feed.spot_symbols is missing an entry for {}", asset));
            }
        }
        if self.engine.snapshot_max_age_secs <= 0 {
            problems.push("engine.snapshot_max_age_secs must be positive".to_string());
        }
        if self.engine.heartbeat_timeout_secs <= 0 {
            problems.push("engine.heartbeat_timeout_secs must be positive".to_string());
        }
        if self.execution.fee_rate < Decimal::ZERO {
            problems.push("execution.fee_rate must not be negative".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [engine]
        assets = ["BTC"]

        [feed]
        spot_symbols = { BTC = "BTCUSDT" }

        [risk]
        max_trade_size = 50
        max_window_size = 100
        max_exposure = 200
        min_time_remaining_secs = 60
        max_spread_pct = 5
        max_hourly_loss = 50
        max_daily_loss = 150

        [strategy]
        name = "threshold"

        [execution]
        mode = "paper"

        [persistence]
        snapshot_path = "./state/engine.json"

        [telemetry]
        log_level = "info"
        metrics_port = 9090
    "#;

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.engine.assets, vec!["BTC"]);
        assert_eq!(config.feed.spot_symbols["BTC"], "BTCUSDT");
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.execution.entry_order_type, OrderType::Fok);
        assert_eq!(config.strategy.name, "threshold");
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        // Defaults applied
        assert_eq!(config.engine.snapshot_interval_secs, 30);
        assert_eq!(config.engine.snapshot_max_age_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_risk_fails_validation() {
        let toml = EXAMPLE.replace("max_exposure = 200", "max_exposure = 0");
        let config: Config = toml::from_str(&toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_exposure"));
    }

    #[test]
    fn test_missing_spot_symbol_fails_validation() {
        let toml = EXAMPLE.replace(r#"{ BTC = "BTCUSDT" }"#, r#"{ ETH = "ETHUSDT" }"#);
        let config: Config = toml::from_str(&toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing an entry for BTC"));
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let toml = EXAMPLE
            .replace("max_trade_size = 50", "max_trade_size = -1")
            .replace("max_hourly_loss = 50", "max_hourly_loss = 0");
        let config: Config = toml::from_str(&toml).unwrap();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("max_trade_size"));
        assert!(message.contains("max_hourly_loss"));
    }

    #[test]
    fn test_live_mode_parses() {
        let toml = EXAMPLE.replace(r#"mode = "paper""#, r#"mode = "live""#);
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Live);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
