//! Order ledger: the lifecycle state machine for all tracked orders
//!
//! Transitions move forward only. An illegal transition returns an error and
//! leaves the record untouched; every applied transition emits exactly one
//! lifecycle event on the bus.

use super::{Fill, Order, OrderError, OrderId, OrderParams, OrderState};
use crate::events::{EngineEvent, EventBus};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Owns every order record for the session
pub struct OrderLedger {
    orders: HashMap<OrderId, Order>,
    events: EventBus,
}

impl OrderLedger {
    /// Create an empty ledger publishing to the given bus
    pub fn new(events: EventBus) -> Self {
        Self {
            orders: HashMap::new(),
            events,
        }
    }

    /// Allocate an id and track a new order in CREATED
    pub fn create(&mut self, params: OrderParams) -> Order {
        let order = Order {
            id: Uuid::new_v4(),
            token_id: params.token_id,
            market_slug: params.market_slug,
            crypto: params.crypto,
            window_epoch: params.window_epoch,
            side: params.side,
            token_side: params.token_side,
            requested_price: params.price,
            requested_size: params.size,
            order_type: params.order_type,
            state: OrderState::Created,
            exchange_order_id: None,
            filled_size: Decimal::ZERO,
            filled_notional: Decimal::ZERO,
            filled_price: None,
            fees: Decimal::ZERO,
            created_at: Utc::now(),
            submitted_at: None,
            opened_at: None,
            filled_at: None,
            cancelled_at: None,
            terminal_reason: None,
            parent_order_id: params.parent_order_id,
            strategy: params.strategy,
            signal: params.signal,
        };

        self.orders.insert(order.id, order.clone());
        self.events.emit(EngineEvent::OrderCreated(order.clone()));

        tracing::info!(
            order_id = %order.id,
            crypto = %order.crypto,
            side = ?order.side,
            token_side = ?order.token_side,
            price = %order.requested_price,
            size = %order.requested_size,
            order_type = ?order.order_type,
            "Order created"
        );

        order
    }

    /// CREATED → SUBMITTED, recording the exchange-assigned id
    pub fn mark_submitted(
        &mut self,
        id: OrderId,
        exchange_order_id: impl Into<String>,
    ) -> Result<(), OrderError> {
        let order = self.get_mut(id)?;
        if order.state != OrderState::Created {
            return Err(OrderError::IllegalTransition {
                id,
                from: order.state,
                to: OrderState::Submitted,
            });
        }
        order.state = OrderState::Submitted;
        order.exchange_order_id = Some(exchange_order_id.into());
        order.submitted_at = Some(Utc::now());
        Ok(())
    }

    /// SUBMITTED → OPEN for resting orders
    pub fn mark_open(&mut self, id: OrderId) -> Result<(), OrderError> {
        let order = self.get_mut(id)?;
        if order.state != OrderState::Submitted {
            return Err(OrderError::IllegalTransition {
                id,
                from: order.state,
                to: OrderState::Open,
            });
        }
        order.state = OrderState::Open;
        order.opened_at = Some(Utc::now());
        tracing::info!(order_id = %id, "Order resting on book");
        Ok(())
    }

    /// Apply a fill, recomputing the size-weighted mean price
    ///
    /// Fill size is clamped to the remaining quantity so `filled_size` never
    /// exceeds `requested_size`. The order transitions to FILLED once the
    /// requested size is fully covered; partial fills leave it as-is.
    pub fn add_fill(&mut self, id: OrderId, fill: Fill) -> Result<(), OrderError> {
        let order = self.get_mut(id)?;
        if order.state.is_terminal() {
            return Err(OrderError::IllegalTransition {
                id,
                from: order.state,
                to: OrderState::Filled,
            });
        }
        if order.state == OrderState::Created {
            // A fill cannot arrive before submission
            return Err(OrderError::IllegalTransition {
                id,
                from: order.state,
                to: OrderState::Filled,
            });
        }

        let remaining = order.remaining_size();
        let applied = Fill {
            price: fill.price,
            size: fill.size.min(remaining),
            fee: fill.fee,
        };
        if applied.size < fill.size {
            tracing::warn!(
                order_id = %id,
                fill_size = %fill.size,
                applied = %applied.size,
                "Fill exceeds remaining size, clamping"
            );
        }

        order.filled_size += applied.size;
        order.filled_notional += applied.price * applied.size;
        order.fees += applied.fee;
        if order.filled_size > Decimal::ZERO {
            order.filled_price = Some(order.filled_notional / order.filled_size);
        }

        let filled = order.filled_size >= order.requested_size;
        if filled {
            order.state = OrderState::Filled;
            order.filled_at = Some(Utc::now());
        }

        let snapshot = order.clone();
        tracing::info!(
            order_id = %id,
            fill_price = %applied.price,
            fill_size = %applied.size,
            fee = %applied.fee,
            filled_size = %snapshot.filled_size,
            avg_price = ?snapshot.filled_price,
            complete = filled,
            "Fill applied"
        );

        self.events.emit(EngineEvent::OrderFill {
            order: snapshot.clone(),
            fill: applied,
        });
        if filled {
            self.events.emit(EngineEvent::OrderComplete(snapshot));
        }
        Ok(())
    }

    /// Any non-terminal state → REJECTED (permanent, never retried)
    pub fn mark_rejected(
        &mut self,
        id: OrderId,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        self.terminate(id, OrderState::Rejected, reason.into())
    }

    /// Any non-terminal state → FAILED
    ///
    /// Terminal for this id, but distinct from rejection: the operator or
    /// engine may re-attempt the same economic intent under a new order id.
    pub fn mark_failed(&mut self, id: OrderId, reason: impl Into<String>) -> Result<(), OrderError> {
        self.terminate(id, OrderState::Failed, reason.into())
    }

    /// OPEN → CANCELLED
    pub fn mark_cancelled(
        &mut self,
        id: OrderId,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        {
            let order = self.get_mut(id)?;
            if order.state != OrderState::Open {
                return Err(OrderError::IllegalTransition {
                    id,
                    from: order.state,
                    to: OrderState::Cancelled,
                });
            }
        }
        self.terminate(id, OrderState::Cancelled, reason.into())
    }

    fn terminate(
        &mut self,
        id: OrderId,
        target: OrderState,
        reason: String,
    ) -> Result<(), OrderError> {
        let order = self.get_mut(id)?;
        if order.state.is_terminal() {
            return Err(OrderError::IllegalTransition {
                id,
                from: order.state,
                to: target,
            });
        }
        order.state = target;
        order.terminal_reason = Some(reason.clone());
        if target == OrderState::Cancelled {
            order.cancelled_at = Some(Utc::now());
        }

        let snapshot = order.clone();
        tracing::info!(
            order_id = %id,
            state = %target,
            reason = %reason,
            filled_size = %snapshot.filled_size,
            "Order terminal"
        );
        self.events.emit(EngineEvent::OrderComplete(snapshot));
        Ok(())
    }

    /// Look up an order by id
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// All orders not in a terminal state
    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders.values().filter(|o| !o.is_terminal()).collect()
    }

    /// Number of tracked orders
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Full serializable snapshot of all order records
    pub fn export(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Reconstruct records from a snapshot
    ///
    /// Performs no network action. Recovered non-terminal orders are unknown
    /// until reconciled against the exchange's authoritative order list.
    pub fn import(&mut self, orders: Vec<Order>) {
        for order in orders {
            self.orders.insert(order.id, order);
        }
    }

    fn get_mut(&mut self, id: OrderId) -> Result<&mut Order, OrderError> {
        self.orders.get_mut(&id).ok_or(OrderError::Unknown(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderType, Side, TokenSide};
    use rust_decimal_macros::dec;

    fn params() -> OrderParams {
        OrderParams {
            token_id: "up-token".to_string(),
            market_slug: "btc-updown-15m-1767638700".to_string(),
            crypto: "BTC".to_string(),
            window_epoch: 1_767_638_700,
            side: Side::Buy,
            token_side: TokenSide::Up,
            price: dec!(0.50),
            size: dec!(100),
            order_type: OrderType::Fok,
            parent_order_id: None,
            strategy: "threshold".to_string(),
            signal: "up ask below threshold".to_string(),
        }
    }

    fn ledger() -> OrderLedger {
        OrderLedger::new(EventBus::new())
    }

    #[test]
    fn test_create_starts_in_created() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        assert_eq!(order.state, OrderState::Created);
        assert_eq!(order.filled_size, dec!(0));
        assert!(order.filled_price.is_none());
    }

    #[test]
    fn test_happy_path_fok() {
        let mut ledger = ledger();
        let order = ledger.create(params());

        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(100),
                    fee: dec!(0.05),
                },
            )
            .unwrap();

        let order = ledger.get(order.id).unwrap();
        assert_eq!(order.state, OrderState::Filled);
        assert_eq!(order.filled_size, dec!(100));
        assert_eq!(order.filled_price, Some(dec!(0.50)));
        assert_eq!(order.fees, dec!(0.05));
    }

    #[test]
    fn test_weighted_fill_price() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger.mark_open(order.id).unwrap();

        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(60),
                    fee: dec!(0),
                },
            )
            .unwrap();
        assert_eq!(ledger.get(order.id).unwrap().state, OrderState::Open);

        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.52),
                    size: dec!(40),
                    fee: dec!(0),
                },
            )
            .unwrap();

        let order = ledger.get(order.id).unwrap();
        // (0.50*60 + 0.52*40) / 100 = 0.508
        assert_eq!(order.filled_price, Some(dec!(0.508)));
        assert_eq!(order.filled_size, dec!(100));
        assert_eq!(order.state, OrderState::Filled);
    }

    #[test]
    fn test_fill_clamped_to_requested() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();

        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(150),
                    fee: dec!(0),
                },
            )
            .unwrap();

        let order = ledger.get(order.id).unwrap();
        assert_eq!(order.filled_size, dec!(100));
        assert_eq!(order.state, OrderState::Filled);
    }

    #[test]
    fn test_fill_on_terminal_rejected_leaves_state_unchanged() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger.mark_rejected(order.id, "insufficient balance").unwrap();

        let err = ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(10),
                    fee: dec!(0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::IllegalTransition { .. }));

        let order = ledger.get(order.id).unwrap();
        assert_eq!(order.state, OrderState::Rejected);
        assert_eq!(order.filled_size, dec!(0));
        assert_eq!(
            order.terminal_reason.as_deref(),
            Some("insufficient balance")
        );
    }

    #[test]
    fn test_fill_before_submission_is_illegal() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        let err = ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(10),
                    fee: dec!(0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::IllegalTransition { .. }));
        assert_eq!(ledger.get(order.id).unwrap().state, OrderState::Created);
    }

    #[test]
    fn test_cancel_requires_open() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();

        // Submitted but not resting, cancel is illegal
        assert!(ledger.mark_cancelled(order.id, "test").is_err());

        ledger.mark_open(order.id).unwrap();
        ledger.mark_cancelled(order.id, "operator").unwrap();
        assert_eq!(ledger.get(order.id).unwrap().state, OrderState::Cancelled);
    }

    #[test]
    fn test_terminal_reached_exactly_once() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger.mark_failed(order.id, "network").unwrap();

        // Second terminal transition must error
        assert!(ledger.mark_failed(order.id, "again").is_err());
        assert!(ledger.mark_rejected(order.id, "again").is_err());

        let order = ledger.get(order.id).unwrap();
        assert_eq!(order.state, OrderState::Failed);
        assert_eq!(order.terminal_reason.as_deref(), Some("network"));
    }

    #[test]
    fn test_double_submit_is_illegal() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        let err = ledger.mark_submitted(order.id, "ex-2").unwrap_err();
        assert!(matches!(err, OrderError::IllegalTransition { .. }));
        // The first exchange id is preserved
        assert_eq!(
            ledger.get(order.id).unwrap().exchange_order_id.as_deref(),
            Some("ex-1")
        );
    }

    #[test]
    fn test_open_orders_excludes_terminal() {
        let mut ledger = ledger();
        let a = ledger.create(params());
        let b = ledger.create(params());
        ledger.mark_submitted(b.id, "ex-b").unwrap();
        ledger.mark_rejected(b.id, "bad price").unwrap();

        let open = ledger.open_orders();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a.id);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut ledger = ledger();
        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.51),
                    size: dec!(40),
                    fee: dec!(0.02),
                },
            )
            .unwrap();

        let exported = ledger.export();
        assert_eq!(exported.len(), 1);

        let mut restored = OrderLedger::new(EventBus::new());
        restored.import(exported);
        let order = restored.get(order.id).unwrap();
        assert_eq!(order.state, OrderState::Submitted);
        assert_eq!(order.filled_size, dec!(40));
        assert_eq!(order.filled_price, Some(dec!(0.51)));
    }

    #[tokio::test]
    async fn test_events_emitted_once_per_transition() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut ledger = OrderLedger::new(bus);

        let order = ledger.create(params());
        ledger.mark_submitted(order.id, "ex-1").unwrap();
        ledger
            .add_fill(
                order.id,
                Fill {
                    price: dec!(0.50),
                    size: dec!(100),
                    fee: dec!(0),
                },
            )
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::OrderCreated(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::OrderFill { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::OrderComplete(_)
        ));
        // No further events pending
        assert!(rx.try_recv().is_err());
    }
}
