//! Risk gate: mandatory admission control for strategy trades
//!
//! Every entry signal passes through `validate_trade` before an order is
//! created. The gate owns its counters: exposure is the sum of currently open
//! trade sizes, and realized losses feed rolling hourly/daily windows that
//! back the kill switch.

use super::breaker::CircuitBreaker;
use super::types::{
    HaltReason, MarketView, OpenTrade, RiskDecision, RiskLimits, RiskStatus, RiskViolation,
    TradeRequest,
};
use crate::events::{EngineEvent, EventBus};
use crate::order::OrderId;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Rolling sum of realized P&L over a fixed span
#[derive(Debug)]
struct LossWindow {
    span: Duration,
    entries: VecDeque<(DateTime<Utc>, Decimal)>,
}

impl LossWindow {
    fn new(span: Duration) -> Self {
        Self {
            span,
            entries: VecDeque::new(),
        }
    }

    fn record(&mut self, now: DateTime<Utc>, pnl: Decimal) {
        self.entries.push_back((now, pnl));
    }

    /// Cumulative loss (positive number) over the window ending at `now`
    fn loss(&mut self, now: DateTime<Utc>) -> Decimal {
        while let Some(&(ts, _)) = self.entries.front() {
            if now - ts > self.span {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        let sum: Decimal = self.entries.iter().map(|(_, pnl)| *pnl).sum();
        if sum < Decimal::ZERO {
            -sum
        } else {
            Decimal::ZERO
        }
    }
}

/// Stateful admission control for trade requests
pub struct RiskGate {
    limits: RiskLimits,
    open_trades: HashMap<OrderId, OpenTrade>,
    window_totals: HashMap<(String, i64), Decimal>,
    hourly: LossWindow,
    daily: LossWindow,
    halt: Option<HaltReason>,
    breaker: CircuitBreaker,
    events: EventBus,
}

impl RiskGate {
    /// Create a gate with the given limits
    pub fn new(limits: RiskLimits, events: EventBus) -> Self {
        let breaker = CircuitBreaker::new(limits.breaker_cooldown_secs);
        Self {
            limits,
            open_trades: HashMap::new(),
            window_totals: HashMap::new(),
            hourly: LossWindow::new(Duration::hours(1)),
            daily: LossWindow::new(Duration::days(1)),
            halt: None,
            breaker,
            events,
        }
    }

    /// Sum of currently open trade sizes
    pub fn exposure(&self) -> Decimal {
        self.open_trades.values().map(|t| t.size).sum()
    }

    /// Whether either halt gate currently blocks new entries
    pub fn is_trading_allowed(&self, now: DateTime<Utc>) -> bool {
        self.halt.is_none() && !self.breaker.is_tripped(now)
    }

    /// Evaluate every check against a trade request
    ///
    /// All checks run; every failing one is reported.
    pub fn validate_trade(
        &self,
        request: &TradeRequest,
        market: &MarketView,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let mut violations = vec![];

        if let Some(halt) = &self.halt {
            violations.push(RiskViolation::TradingHalted {
                reason: halt.to_string(),
            });
        }
        if self.breaker.is_tripped(now) {
            violations.push(RiskViolation::TradingHalted {
                reason: format!(
                    "circuit breaker open: {}",
                    self.breaker.reason().unwrap_or("unknown")
                ),
            });
        }

        if request.size > self.limits.max_trade_size {
            violations.push(RiskViolation::TradeSizeExceeded {
                requested: request.size,
                max: self.limits.max_trade_size,
            });
        }

        let window_key = (request.crypto.clone(), request.window_epoch);
        let window_total = self
            .window_totals
            .get(&window_key)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if window_total + request.size > self.limits.max_window_size {
            violations.push(RiskViolation::WindowSizeExceeded {
                window_total,
                requested: request.size,
                max: self.limits.max_window_size,
            });
        }

        let exposure = self.exposure();
        if exposure + request.size > self.limits.max_exposure {
            violations.push(RiskViolation::ExposureExceeded {
                exposure,
                requested: request.size,
                max: self.limits.max_exposure,
            });
        }

        if market.time_remaining_secs < self.limits.min_time_remaining_secs {
            violations.push(RiskViolation::TooCloseToSettlement {
                remaining_secs: market.time_remaining_secs,
                min_secs: self.limits.min_time_remaining_secs,
            });
        }

        if market.spread_pct > self.limits.max_spread_pct {
            violations.push(RiskViolation::SpreadTooWide {
                spread_pct: market.spread_pct,
                max_pct: self.limits.max_spread_pct,
            });
        }

        if violations.is_empty() {
            RiskDecision::allow()
        } else {
            RiskDecision::block(violations)
        }
    }

    /// Count a newly opened trade toward exposure and window totals
    ///
    /// Called exactly once per entry order reaching FILLED.
    pub fn record_trade_open(&mut self, trade: OpenTrade) {
        let key = (trade.crypto.clone(), trade.window_epoch);
        *self.window_totals.entry(key).or_insert(Decimal::ZERO) += trade.size;
        self.open_trades.insert(trade.order_id, trade);
    }

    /// Release a trade's exposure and record its realized P&L
    ///
    /// Called exactly once per exit order reaching FILLED. Crossing a loss
    /// limit trips the kill switch.
    pub fn record_trade_close(&mut self, order_id: OrderId, net_pnl: Decimal, now: DateTime<Utc>) {
        if self.open_trades.remove(&order_id).is_none() {
            tracing::warn!(order_id = %order_id, "Trade close for untracked order");
        }
        self.hourly.record(now, net_pnl);
        self.daily.record(now, net_pnl);
        self.check_loss_limits(now);
    }

    /// Trip the circuit breaker from an external failure signal
    pub fn trip_breaker(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        let reason = reason.into();
        self.breaker.trip(reason.clone(), now);
        self.events.emit(EngineEvent::CircuitBreaker {
            tripped: true,
            reason,
        });
    }

    /// Clear the circuit breaker once its triggering condition subsides
    pub fn clear_breaker(&mut self) {
        self.breaker.clear();
        self.events.emit(EngineEvent::CircuitBreaker {
            tripped: false,
            reason: String::new(),
        });
    }

    /// Operator-invoked resume after a kill switch halt
    ///
    /// Returns false and stays halted while the tripping loss condition still
    /// holds; the kill switch never clears on its own.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.halt.is_none() {
            return true;
        }
        let hourly = self.hourly.loss(now);
        let daily = self.daily.loss(now);
        if hourly >= self.limits.max_hourly_loss || daily >= self.limits.max_daily_loss {
            tracing::warn!(
                hourly_loss = %hourly,
                daily_loss = %daily,
                "Resume refused, loss limit still exceeded"
            );
            return false;
        }
        tracing::info!("Kill switch cleared by operator resume");
        self.halt = None;
        true
    }

    /// Serializable view of the gate's state
    pub fn status(&mut self, now: DateTime<Utc>) -> RiskStatus {
        let hourly_loss = self.hourly.loss(now);
        let daily_loss = self.daily.loss(now);
        RiskStatus {
            trading_allowed: self.is_trading_allowed(now),
            halt: self.halt.clone(),
            breaker_tripped: self.breaker.is_tripped(now),
            exposure: self.exposure(),
            hourly_loss,
            daily_loss,
            open_trades: self.open_trades.len(),
        }
    }

    /// Rebuild gate state from a restored snapshot
    ///
    /// Open trades come back from the restored position records; the halt flag
    /// and aggregate losses are re-seeded so the kill switch stays sticky
    /// across a restart.
    pub fn restore(&mut self, status: &RiskStatus, trades: Vec<OpenTrade>, now: DateTime<Utc>) {
        for trade in trades {
            self.record_trade_open(trade);
        }
        if status.hourly_loss > Decimal::ZERO {
            self.hourly.record(now, -status.hourly_loss);
        }
        if status.daily_loss > Decimal::ZERO {
            self.daily.record(now, -status.daily_loss);
        }
        if let Some(halt) = &status.halt {
            tracing::warn!(reason = %halt, "Restored tripped kill switch");
            self.halt = Some(halt.clone());
        }
    }

    fn check_loss_limits(&mut self, now: DateTime<Utc>) {
        if self.halt.is_some() {
            return;
        }
        let hourly = self.hourly.loss(now);
        let daily = self.daily.loss(now);

        let reason = if hourly >= self.limits.max_hourly_loss {
            Some(HaltReason::HourlyLossLimit {
                loss: hourly,
                limit: self.limits.max_hourly_loss,
            })
        } else if daily >= self.limits.max_daily_loss {
            Some(HaltReason::DailyLossLimit {
                loss: daily,
                limit: self.limits.max_daily_loss,
            })
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::error!(reason = %reason, "Kill switch tripped, trading halted");
            self.events.emit(EngineEvent::KillSwitch {
                reason: reason.to_string(),
            });
            self.halt = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn gate(limits: RiskLimits) -> RiskGate {
        RiskGate::new(limits, EventBus::new())
    }

    fn request(size: Decimal) -> TradeRequest {
        TradeRequest {
            crypto: "BTC".to_string(),
            window_epoch: 1_767_638_700,
            size,
        }
    }

    fn calm_market() -> MarketView {
        MarketView {
            time_remaining_secs: 600,
            spread_pct: dec!(1),
        }
    }

    fn open_trade(size: Decimal) -> OpenTrade {
        OpenTrade {
            order_id: Uuid::new_v4(),
            crypto: "BTC".to_string(),
            window_epoch: 1_767_638_700,
            size,
        }
    }

    #[test]
    fn test_allows_within_limits() {
        let gate = gate(RiskLimits::default());
        let decision = gate.validate_trade(&request(dec!(10)), &calm_market(), Utc::now());
        assert!(decision.allowed);
        assert!(decision.violations.is_empty());
    }

    #[test]
    fn test_exposure_limit_boundary() {
        let limits = RiskLimits {
            max_exposure: dec!(20),
            max_trade_size: dec!(20),
            max_window_size: dec!(100),
            ..Default::default()
        };
        let mut gate = gate(limits);
        gate.record_trade_open(open_trade(dec!(15)));
        assert_eq!(gate.exposure(), dec!(15));

        let blocked = gate.validate_trade(&request(dec!(10)), &calm_market(), Utc::now());
        assert!(!blocked.allowed);
        assert!(blocked
            .violations
            .iter()
            .any(|v| matches!(v, RiskViolation::ExposureExceeded { .. })));

        let allowed = gate.validate_trade(&request(dec!(5)), &calm_market(), Utc::now());
        assert!(allowed.allowed);
    }

    #[test]
    fn test_exposure_tracks_open_and_close() {
        let mut gate = gate(RiskLimits::default());
        let a = open_trade(dec!(10));
        let b = open_trade(dec!(20));
        let a_id = a.order_id;

        gate.record_trade_open(a);
        gate.record_trade_open(b);
        assert_eq!(gate.exposure(), dec!(30));

        gate.record_trade_close(a_id, dec!(2), Utc::now());
        assert_eq!(gate.exposure(), dec!(20));
    }

    #[test]
    fn test_all_violations_reported() {
        let limits = RiskLimits {
            max_trade_size: dec!(5),
            max_window_size: dec!(5),
            max_exposure: dec!(5),
            min_time_remaining_secs: 120,
            max_spread_pct: dec!(2),
            ..Default::default()
        };
        let gate = gate(limits);
        let market = MarketView {
            time_remaining_secs: 30,
            spread_pct: dec!(10),
        };
        let decision = gate.validate_trade(&request(dec!(10)), &market, Utc::now());
        assert!(!decision.allowed);
        // trade size, window size, exposure, settlement proximity, spread
        assert_eq!(decision.violations.len(), 5);
    }

    #[test]
    fn test_kill_switch_trips_and_sticks() {
        let limits = RiskLimits {
            max_hourly_loss: dec!(50),
            ..Default::default()
        };
        let mut gate = gate(limits);
        let now = Utc::now();
        let trade = open_trade(dec!(10));
        let id = trade.order_id;
        gate.record_trade_open(trade);
        gate.record_trade_close(id, dec!(-60), now);

        assert!(!gate.is_trading_allowed(now));
        let decision = gate.validate_trade(&request(dec!(1)), &calm_market(), now);
        assert!(!decision.allowed);

        // Resume refused while the hourly window still shows the loss
        assert!(!gate.resume(now + Duration::minutes(10)));
        assert!(!gate.is_trading_allowed(now + Duration::minutes(10)));

        // Once the loss ages out of the rolling hour, resume succeeds
        let later = now + Duration::hours(2);
        assert!(gate.resume(later));
        assert!(gate.is_trading_allowed(later));
    }

    #[test]
    fn test_kill_switch_never_clears_automatically() {
        let limits = RiskLimits {
            max_hourly_loss: dec!(50),
            max_daily_loss: dec!(500),
            ..Default::default()
        };
        let mut gate = gate(limits);
        let now = Utc::now();
        let trade = open_trade(dec!(10));
        let id = trade.order_id;
        gate.record_trade_open(trade);
        gate.record_trade_close(id, dec!(-60), now);

        // Days later, without an operator resume, trading is still halted
        assert!(!gate.is_trading_allowed(now + Duration::days(3)));
    }

    #[test]
    fn test_breaker_blocks_and_auto_clears() {
        let limits = RiskLimits {
            breaker_cooldown_secs: 300,
            ..Default::default()
        };
        let mut gate = gate(limits);
        let now = Utc::now();
        gate.trip_breaker("invariant scan failed", now);

        let decision = gate.validate_trade(&request(dec!(1)), &calm_market(), now);
        assert!(!decision.allowed);
        assert!(!gate.is_trading_allowed(now));

        // Auto-clears after the cooldown, no operator action needed
        let later = now + Duration::seconds(301);
        assert!(gate.is_trading_allowed(later));
        assert!(gate.validate_trade(&request(dec!(1)), &calm_market(), later).allowed);
    }

    #[test]
    fn test_window_total_accumulates_across_trades() {
        let limits = RiskLimits {
            max_window_size: dec!(25),
            ..Default::default()
        };
        let mut gate = gate(limits);
        gate.record_trade_open(open_trade(dec!(20)));

        let decision = gate.validate_trade(&request(dec!(10)), &calm_market(), Utc::now());
        assert!(decision
            .violations
            .iter()
            .any(|v| matches!(v, RiskViolation::WindowSizeExceeded { .. })));

        // A different window is unaffected
        let other = TradeRequest {
            crypto: "BTC".to_string(),
            window_epoch: 1_767_639_600,
            size: dec!(10),
        };
        assert!(gate.validate_trade(&other, &calm_market(), Utc::now()).allowed);
    }

    #[test]
    fn test_status_restore_preserves_halt() {
        let mut gate = gate(RiskLimits::default());
        let now = Utc::now();
        let trade = open_trade(dec!(10));
        let id = trade.order_id;
        gate.record_trade_open(trade);
        gate.record_trade_close(id, dec!(-200), now);
        let status = gate.status(now);
        assert!(!status.trading_allowed);

        let mut restored = RiskGate::new(RiskLimits::default(), EventBus::new());
        restored.restore(&status, vec![open_trade(dec!(7))], now);
        assert!(!restored.is_trading_allowed(now));
        assert_eq!(restored.exposure(), dec!(7));
        // Still refuses resume because the seeded loss is inside the window
        assert!(!restored.resume(now));
    }

    #[tokio::test]
    async fn test_kill_switch_event_fires_once() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut gate = RiskGate::new(
            RiskLimits {
                max_hourly_loss: dec!(10),
                ..Default::default()
            },
            bus,
        );
        let now = Utc::now();
        for _ in 0..3 {
            let trade = open_trade(dec!(5));
            let id = trade.order_id;
            gate.record_trade_open(trade);
            gate.record_trade_close(id, dec!(-20), now);
        }

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::KillSwitch { .. }
        ));
        assert!(rx.try_recv().is_err());
    }
}
