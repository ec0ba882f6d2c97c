//! Paper exchange with simulated fills
//!
//! FOK orders fill immediately and fully at the requested price; GTC orders
//! rest until cancelled. Tests can inject the next submission's failure to
//! exercise rejection and system-error paths.

use super::{
    AckStatus, ApiKeyInfo, Balance, ExchangeClient, ExchangeError, PlaceOrderRequest,
    PlaceOrderResponse,
};
use crate::market::{DiscoveryClient, MarketDef};
use crate::order::{Fill, OrderType};
use crate::orderbook::OrderBook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Simulated exchange for paper trading and tests
pub struct PaperExchange {
    fee_rate: Decimal,
    markets: RwLock<HashMap<String, MarketDef>>,
    books: RwLock<HashMap<String, OrderBook>>,
    resting: RwLock<HashMap<String, PlaceOrderRequest>>,
    fail_next: RwLock<Option<ExchangeError>>,
    discovery: Option<DiscoveryClient>,
    next_id: AtomicU64,
}

impl PaperExchange {
    /// Create a paper exchange with the given taker fee rate
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            markets: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
            resting: RwLock::new(HashMap::new()),
            fail_next: RwLock::new(None),
            discovery: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Resolve markets through live discovery instead of seeded definitions
    pub fn with_discovery(mut self, discovery: DiscoveryClient) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Seed or replace the active market for a crypto
    pub async fn set_market(&self, market: MarketDef) {
        self.markets
            .write()
            .await
            .insert(market.crypto.clone(), market);
    }

    /// Seed the order book served for a token
    pub async fn set_order_book(&self, book: OrderBook) {
        self.books.write().await.insert(book.token_id.clone(), book);
    }

    /// Make the next `place_order` call fail with the given error
    pub async fn fail_next_order(&self, error: ExchangeError) {
        *self.fail_next.write().await = Some(error);
    }

    /// Ids of currently resting orders
    pub async fn resting_order_ids(&self) -> Vec<String> {
        self.resting.read().await.keys().cloned().collect()
    }

    fn allocate_id(&self) -> String {
        format!("paper-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn get_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        Ok(Utc::now())
    }

    async fn get_api_key_info(&self) -> Result<ApiKeyInfo, ExchangeError> {
        Ok(ApiKeyInfo {
            key_id: "paper".to_string(),
            can_trade: true,
        })
    }

    async fn get_balances(&self) -> Result<Vec<Balance>, ExchangeError> {
        Ok(vec![Balance {
            asset: "USDC".to_string(),
            available: Decimal::from(10_000),
        }])
    }

    async fn get_current_market(&self, crypto: &str) -> Result<Option<MarketDef>, ExchangeError> {
        match &self.discovery {
            Some(discovery) => discovery
                .fetch_current_market(crypto)
                .await
                .map_err(|e| ExchangeError::Connectivity(e.to_string())),
            None => Ok(self.markets.read().await.get(crypto).cloned()),
        }
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, ExchangeError> {
        Ok(self
            .books
            .read()
            .await
            .get(token_id)
            .cloned()
            .unwrap_or_else(|| OrderBook::new(token_id)))
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, ExchangeError> {
        if let Some(error) = self.fail_next.write().await.take() {
            return Err(error);
        }

        let order_id = self.allocate_id();
        match req.order_type {
            OrderType::Fok => {
                let fee = req.price * req.size * self.fee_rate;
                let fill = Fill {
                    price: req.price,
                    size: req.size,
                    fee,
                };
                tracing::info!(
                    order_id = %order_id,
                    token_id = %req.token_id,
                    price = %req.price,
                    size = %req.size,
                    "Paper order filled"
                );
                Ok(PlaceOrderResponse {
                    order_id,
                    status: AckStatus::Filled,
                    fills: vec![fill],
                })
            }
            OrderType::Gtc => {
                self.resting
                    .write()
                    .await
                    .insert(order_id.clone(), req.clone());
                tracing::info!(
                    order_id = %order_id,
                    token_id = %req.token_id,
                    price = %req.price,
                    size = %req.size,
                    "Paper order resting"
                );
                Ok(PlaceOrderResponse {
                    order_id,
                    status: AckStatus::Open,
                    fills: vec![],
                })
            }
        }
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.resting.write().await.remove(order_id);
        tracing::info!(order_id = %order_id, "Paper order cancelled");
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), ExchangeError> {
        let mut resting = self.resting.write().await;
        let count = resting.len();
        resting.clear();
        tracing::info!(count, "Cancelled all paper orders");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Side;
    use rust_decimal_macros::dec;

    fn request(order_type: OrderType) -> PlaceOrderRequest {
        PlaceOrderRequest {
            token_id: "up-tok".to_string(),
            price: dec!(0.50),
            size: dec!(100),
            side: Side::Buy,
            order_type,
        }
    }

    #[tokio::test]
    async fn test_fok_fills_immediately() {
        let exchange = PaperExchange::new(dec!(0.001));
        let resp = exchange.place_order(request(OrderType::Fok)).await.unwrap();

        assert_eq!(resp.status, AckStatus::Filled);
        assert_eq!(resp.fills.len(), 1);
        assert_eq!(resp.fills[0].size, dec!(100));
        assert_eq!(resp.fills[0].fee, dec!(0.05)); // 100 * 0.50 * 0.001
    }

    #[tokio::test]
    async fn test_gtc_rests_until_cancelled() {
        let exchange = PaperExchange::new(dec!(0));
        let resp = exchange.place_order(request(OrderType::Gtc)).await.unwrap();

        assert_eq!(resp.status, AckStatus::Open);
        assert!(resp.fills.is_empty());
        assert_eq!(exchange.resting_order_ids().await, vec![resp.order_id.clone()]);

        exchange.cancel_order(&resp.order_id).await.unwrap();
        assert!(exchange.resting_order_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let exchange = PaperExchange::new(dec!(0));
        exchange.place_order(request(OrderType::Gtc)).await.unwrap();
        exchange.place_order(request(OrderType::Gtc)).await.unwrap();
        assert_eq!(exchange.resting_order_ids().await.len(), 2);

        exchange.cancel_all_orders().await.unwrap();
        assert!(exchange.resting_order_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let exchange = PaperExchange::new(dec!(0));
        exchange
            .fail_next_order(ExchangeError::Rejected("insufficient balance".to_string()))
            .await;

        let err = exchange.place_order(request(OrderType::Fok)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Rejected(_)));

        // Next submission succeeds
        assert!(exchange.place_order(request(OrderType::Fok)).await.is_ok());
    }

    #[tokio::test]
    async fn test_market_seeding() {
        let exchange = PaperExchange::new(dec!(0));
        assert!(exchange.get_current_market("BTC").await.unwrap().is_none());

        exchange
            .set_market(MarketDef {
                slug: "btc-updown-15m-1767636000".to_string(),
                crypto: "BTC".to_string(),
                up_token_id: "up".to_string(),
                down_token_id: "down".to_string(),
                window_epoch: 1_767_636_000,
                end_time: Utc::now(),
            })
            .await;

        let market = exchange.get_current_market("BTC").await.unwrap().unwrap();
        assert_eq!(market.up_token_id, "up");
    }
}
