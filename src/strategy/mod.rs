//! Strategy interface
//!
//! Alpha lives behind this trait. The engine hands every synthesized tick to
//! the strategy along with the window's open position (if any) and executes
//! the returned decision, subject to the risk gate. Strategies are selected
//! at construction time.

use crate::engine::Position;
use crate::order::TokenSide;
use crate::tick::Tick;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// What the strategy wants done with the current window
#[derive(Debug, Clone)]
pub enum Action {
    /// Do nothing this tick
    Hold,
    /// Open a position in the given outcome token
    Buy {
        token_side: TokenSide,
        size: Decimal,
        reason: String,
    },
    /// Close the window's open position
    Sell { reason: String },
}

/// A trading strategy driven by synthesized ticks
pub trait Strategy: Send {
    /// Decide what to do with this tick
    fn on_tick(&mut self, tick: &Tick, position: Option<&Position>) -> Action;
    /// Strategy name, recorded on every order it originates
    fn name(&self) -> &str;
}

/// Strategy selection and parameters
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// "hold" or "threshold"
    pub name: String,
    /// Threshold strategy: buy the up token when its ask is at or below this
    #[serde(default = "default_entry_below")]
    pub entry_below: Decimal,
    /// Threshold strategy: exit when the held token's bid is at or above this
    #[serde(default = "default_exit_above")]
    pub exit_above: Decimal,
    /// Order size for entries
    #[serde(default = "default_size")]
    pub size: Decimal,
}

fn default_entry_below() -> Decimal {
    dec!(0.35)
}
fn default_exit_above() -> Decimal {
    dec!(0.65)
}
fn default_size() -> Decimal {
    dec!(10)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "hold".to_string(),
            entry_below: default_entry_below(),
            exit_above: default_exit_above(),
            size: default_size(),
        }
    }
}

/// Build the configured strategy
pub fn build(config: &StrategyConfig) -> anyhow::Result<Box<dyn Strategy>> {
    match config.name.as_str() {
        "hold" => Ok(Box::new(HoldStrategy)),
        "threshold" => Ok(Box::new(ThresholdStrategy::new(
            config.entry_below,
            config.exit_above,
            config.size,
        ))),
        other => anyhow::bail!("unknown strategy: {}", other),
    }
}

/// Never trades; useful for capture-only runs and tests
pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn on_tick(&mut self, _tick: &Tick, _position: Option<&Position>) -> Action {
        Action::Hold
    }

    fn name(&self) -> &str {
        "hold"
    }
}

/// Buys a cheap up token and exits once the bid recovers
///
/// A deliberately plain reference strategy: enough to drive the execution
/// path end to end, not an edge.
pub struct ThresholdStrategy {
    entry_below: Decimal,
    exit_above: Decimal,
    size: Decimal,
}

impl ThresholdStrategy {
    pub fn new(entry_below: Decimal, exit_above: Decimal, size: Decimal) -> Self {
        Self {
            entry_below,
            exit_above,
            size,
        }
    }
}

impl Strategy for ThresholdStrategy {
    fn on_tick(&mut self, tick: &Tick, position: Option<&Position>) -> Action {
        match position {
            Some(position) => {
                if tick.bid(position.token_side) >= self.exit_above {
                    Action::Sell {
                        reason: format!(
                            "bid {} reached exit threshold {}",
                            tick.bid(position.token_side),
                            self.exit_above
                        ),
                    }
                } else {
                    Action::Hold
                }
            }
            None => {
                if tick.up_ask <= self.entry_below {
                    Action::Buy {
                        token_side: TokenSide::Up,
                        size: self.size,
                        reason: format!(
                            "up ask {} at or below entry threshold {}",
                            tick.up_ask, self.entry_below
                        ),
                    }
                } else {
                    Action::Hold
                }
            }
        }
    }

    fn name(&self) -> &str {
        "threshold"
    }
}
