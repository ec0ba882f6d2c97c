//! Risk management module
//!
//! Admission control for strategy trades, exposure accounting, kill switch
//! and circuit breaker.

mod breaker;
mod gate;
mod types;

pub use breaker::CircuitBreaker;
pub use gate::RiskGate;
pub use types::{
    HaltReason, MarketView, OpenTrade, RiskDecision, RiskLimits, RiskStatus, RiskViolation,
    TradeRequest,
};
