//! Risk gate types

use crate::order::OrderId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Hard limits enforced by the risk gate
///
/// Values are validated at startup; the gate never substitutes defaults for
/// missing or invalid risk parameters at runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    /// Maximum size for a single trade
    pub max_trade_size: Decimal,
    /// Maximum cumulative size opened within one window per crypto
    pub max_window_size: Decimal,
    /// Maximum total open exposure across all positions
    pub max_exposure: Decimal,
    /// Reject entries with less than this many seconds to settlement
    pub min_time_remaining_secs: i64,
    /// Reject entries when the quoted spread exceeds this percentage of mid
    pub max_spread_pct: Decimal,
    /// Kill switch: maximum realized loss over a rolling hour
    pub max_hourly_loss: Decimal,
    /// Kill switch: maximum realized loss over a rolling day
    pub max_daily_loss: Decimal,
    /// Circuit breaker cooldown before it may auto-clear
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown_secs: u64,
}

fn default_breaker_cooldown() -> u64 {
    300
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_trade_size: dec!(50),
            max_window_size: dec!(100),
            max_exposure: dec!(200),
            min_time_remaining_secs: 60,
            max_spread_pct: dec!(5),
            max_hourly_loss: dec!(50),
            max_daily_loss: dec!(150),
            breaker_cooldown_secs: 300,
        }
    }
}

impl RiskLimits {
    /// Check limits for internal consistency
    ///
    /// Returns every problem found so the operator can fix them in one pass.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = vec![];
        if self.max_trade_size <= Decimal::ZERO {
            problems.push("risk.max_trade_size must be positive".to_string());
        }
        if self.max_window_size <= Decimal::ZERO {
            problems.push("risk.max_window_size must be positive".to_string());
        }
        if self.max_exposure <= Decimal::ZERO {
            problems.push("risk.max_exposure must be positive".to_string());
        }
        if self.min_time_remaining_secs < 0 {
            problems.push("risk.min_time_remaining_secs must not be negative".to_string());
        }
        if self.max_spread_pct <= Decimal::ZERO {
            problems.push("risk.max_spread_pct must be positive".to_string());
        }
        if self.max_hourly_loss <= Decimal::ZERO {
            problems.push("risk.max_hourly_loss must be positive".to_string());
        }
        if self.max_daily_loss <= Decimal::ZERO {
            problems.push("risk.max_daily_loss must be positive".to_string());
        }
        problems
    }
}

/// A trade the strategy wants to open, as seen by the risk gate
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub crypto: String,
    pub window_epoch: i64,
    pub size: Decimal,
}

/// Market conditions relevant to admission control
#[derive(Debug, Clone)]
pub struct MarketView {
    pub time_remaining_secs: i64,
    pub spread_pct: Decimal,
}

/// One failed risk check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RiskViolation {
    TradeSizeExceeded {
        requested: Decimal,
        max: Decimal,
    },
    WindowSizeExceeded {
        window_total: Decimal,
        requested: Decimal,
        max: Decimal,
    },
    ExposureExceeded {
        exposure: Decimal,
        requested: Decimal,
        max: Decimal,
    },
    TooCloseToSettlement {
        remaining_secs: i64,
        min_secs: i64,
    },
    SpreadTooWide {
        spread_pct: Decimal,
        max_pct: Decimal,
    },
    TradingHalted {
        reason: String,
    },
}

impl std::fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskViolation::TradeSizeExceeded { requested, max } => {
                write!(f, "trade size {} exceeds max {}", requested, max)
            }
            RiskViolation::WindowSizeExceeded {
                window_total,
                requested,
                max,
            } => write!(
                f,
                "window total {} + requested {} exceeds max {}",
                window_total, requested, max
            ),
            RiskViolation::ExposureExceeded {
                exposure,
                requested,
                max,
            } => write!(
                f,
                "exposure {} + requested {} exceeds max {}",
                exposure, requested, max
            ),
            RiskViolation::TooCloseToSettlement {
                remaining_secs,
                min_secs,
            } => write!(
                f,
                "{}s to settlement, minimum is {}s",
                remaining_secs, min_secs
            ),
            RiskViolation::SpreadTooWide {
                spread_pct,
                max_pct,
            } => write!(f, "spread {}% exceeds max {}%", spread_pct, max_pct),
            RiskViolation::TradingHalted { reason } => write!(f, "trading halted: {}", reason),
        }
    }
}

/// The gate's verdict on a trade request
#[derive(Debug, Clone)]
pub struct RiskDecision {
    pub allowed: bool,
    pub violations: Vec<RiskViolation>,
}

impl RiskDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            violations: vec![],
        }
    }

    pub fn block(violations: Vec<RiskViolation>) -> Self {
        Self {
            allowed: false,
            violations,
        }
    }
}

/// Why the kill switch tripped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HaltReason {
    HourlyLossLimit { loss: Decimal, limit: Decimal },
    DailyLossLimit { loss: Decimal, limit: Decimal },
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::HourlyLossLimit { loss, limit } => {
                write!(f, "hourly loss {} crossed limit {}", loss, limit)
            }
            HaltReason::DailyLossLimit { loss, limit } => {
                write!(f, "daily loss {} crossed limit {}", loss, limit)
            }
        }
    }
}

/// A trade the gate is currently counting toward exposure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTrade {
    pub order_id: OrderId,
    pub crypto: String,
    pub window_epoch: i64,
    pub size: Decimal,
}

/// Read-only view of the gate's state, serialized into snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStatus {
    pub trading_allowed: bool,
    pub halt: Option<HaltReason>,
    pub breaker_tripped: bool,
    pub exposure: Decimal,
    pub hourly_loss: Decimal,
    pub daily_loss: Decimal,
    pub open_trades: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default_are_valid() {
        assert!(RiskLimits::default().validate().is_empty());
    }

    #[test]
    fn test_limits_validate_reports_all_problems() {
        let limits = RiskLimits {
            max_trade_size: dec!(0),
            max_exposure: dec!(-5),
            ..Default::default()
        };
        let problems = limits.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("max_trade_size"));
        assert!(problems[1].contains("max_exposure"));
    }

    #[test]
    fn test_violation_display() {
        let v = RiskViolation::ExposureExceeded {
            exposure: dec!(15),
            requested: dec!(10),
            max: dec!(20),
        };
        assert_eq!(v.to_string(), "exposure 15 + requested 10 exceeds max 20");
    }
}
