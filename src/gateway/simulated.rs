//! In-memory paper-trading gateway
//!
//! Serves both gateway traits from one in-process book: a random-walk
//! price, limit-order matching against that price, and an idempotent
//! cancel. Live runs can pair this order book with a real market-data
//! gateway so execution stays simulated while prices are real.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::gateway::{MarketDataGateway, OrderGateway};
use crate::types::{Order, OrderId, OrderStatus, Side};

struct SimState {
    price: f64,
    volatility: f64,
    open: HashMap<OrderId, Order>,
    filled: Vec<Order>,
    balance: f64,
    rng: StdRng,
    walk_enabled: bool,
}

pub struct SimulatedGateway {
    state: Mutex<SimState>,
}

impl SimulatedGateway {
    pub fn new(start_price: f64) -> Self {
        Self::with_seed(start_price, rand::random())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(start_price: f64, seed: u64) -> Self {
        Self {
            state: Mutex::new(SimState {
                price: start_price,
                volatility: 0.002,
                open: HashMap::new(),
                filled: Vec::new(),
                balance: 10_000.0,
                rng: StdRng::seed_from_u64(seed),
                walk_enabled: true,
            }),
        }
    }

    /// Freeze the random walk; `set_price` then drives the market by hand.
    pub fn with_static_price(self) -> Self {
        self.state.lock().unwrap().walk_enabled = false;
        self
    }

    /// Force the market to a price and match resting orders against it.
    pub fn set_price(&self, price: f64) {
        let mut state = self.state.lock().unwrap();
        state.price = price;
        Self::match_orders(&mut state);
    }

    /// Orders that have filled since the session started, in fill order.
    pub fn filled_orders(&self) -> Vec<Order> {
        self.state.lock().unwrap().filled.clone()
    }

    fn step(state: &mut SimState) {
        if state.walk_enabled {
            let vol = state.volatility;
            let shock: f64 = state.rng.gen_range(-vol..vol);
            state.price *= 1.0 + shock;
        }
        Self::match_orders(state);
    }

    fn match_orders(state: &mut SimState) {
        let market = state.price;
        let filled_ids: Vec<OrderId> = state
            .open
            .values()
            .filter(|order| match order.side {
                Side::Buy => market <= order.price,
                Side::Sell => market >= order.price,
            })
            .map(|order| order.id.clone())
            .collect();

        for id in filled_ids {
            if let Some(mut order) = state.open.remove(&id) {
                order.status = OrderStatus::Filled;
                let notional = order.price * order.quantity;
                match order.side {
                    Side::Buy => state.balance -= notional,
                    Side::Sell => state.balance += notional,
                }
                debug!(
                    "simulated fill: {} {:.6} {} @ {:.4}",
                    order.side, order.quantity, order.instrument, order.price
                );
                state.filled.push(order);
            }
        }
    }
}

#[async_trait]
impl MarketDataGateway for SimulatedGateway {
    async fn current_price(&self, _instrument: &str) -> EngineResult<f64> {
        let mut state = self.state.lock().unwrap();
        Self::step(&mut state);
        Ok(state.price)
    }

    async fn validate_access(&self, _instrument: &str) -> EngineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl OrderGateway for SimulatedGateway {
    async fn place_order(
        &self,
        instrument: &str,
        side: Side,
        price: f64,
        quantity: f64,
    ) -> EngineResult<OrderId> {
        if price <= 0.0 || !price.is_finite() {
            return Err(EngineError::Rejected(format!("bad price {price}")));
        }
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(EngineError::Rejected(format!("bad quantity {quantity}")));
        }

        let id = Uuid::new_v4().to_string();
        let order = Order {
            id: id.clone(),
            instrument: instrument.to_string(),
            side,
            price,
            quantity,
            status: OrderStatus::Open,
        };
        self.state.lock().unwrap().open.insert(id.clone(), order);
        Ok(id)
    }

    async fn open_orders(&self, instrument: &str) -> EngineResult<Vec<Order>> {
        let state = self.state.lock().unwrap();
        let mut orders: Vec<Order> = state
            .open
            .values()
            .filter(|order| order.instrument == instrument)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
        Ok(orders)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> EngineResult<()> {
        // Unknown ids mean the order already filled or was cancelled;
        // report success either way.
        self.state.lock().unwrap().open.remove(order_id);
        Ok(())
    }

    async fn account_balance(&self) -> EngineResult<f64> {
        Ok(self.state.lock().unwrap().balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_at(price: f64) -> SimulatedGateway {
        SimulatedGateway::with_seed(price, 7).with_static_price()
    }

    #[tokio::test]
    async fn test_place_and_list() {
        let gw = gateway_at(100.0);
        let id = gw
            .place_order("ETH-USDT", Side::Buy, 90.0, 1.0)
            .await
            .unwrap();
        let open = gw.open_orders("ETH-USDT").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, id);
        assert_eq!(open[0].status, OrderStatus::Open);
        assert!(gw.open_orders("BTC-USDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters() {
        let gw = gateway_at(100.0);
        let err = gw
            .place_order("ETH-USDT", Side::Buy, -5.0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
        let err = gw
            .place_order("ETH-USDT", Side::Sell, 100.0, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_buy_fills_when_price_drops_through_limit() {
        let gw = gateway_at(100.0);
        gw.place_order("ETH-USDT", Side::Buy, 95.0, 2.0)
            .await
            .unwrap();
        assert_eq!(gw.open_orders("ETH-USDT").await.unwrap().len(), 1);

        gw.set_price(94.0);
        assert!(gw.open_orders("ETH-USDT").await.unwrap().is_empty());
        let filled = gw.filled_orders();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_sell_fills_when_price_rises_through_limit() {
        let gw = gateway_at(100.0);
        gw.place_order("ETH-USDT", Side::Sell, 105.0, 1.0)
            .await
            .unwrap();
        gw.set_price(106.0);
        assert!(gw.open_orders("ETH-USDT").await.unwrap().is_empty());
        assert_eq!(gw.filled_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let gw = gateway_at(100.0);
        let id = gw
            .place_order("ETH-USDT", Side::Buy, 90.0, 1.0)
            .await
            .unwrap();
        gw.cancel_order(&id).await.unwrap();
        assert!(gw.open_orders("ETH-USDT").await.unwrap().is_empty());
        // Second cancel of the same id still succeeds.
        gw.cancel_order(&id).await.unwrap();
        gw.cancel_order(&"no-such-order".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_balance_moves_on_fill() {
        let gw = gateway_at(100.0);
        let before = gw.account_balance().await.unwrap();
        gw.place_order("ETH-USDT", Side::Buy, 95.0, 2.0)
            .await
            .unwrap();
        gw.set_price(90.0);
        let after = gw.account_balance().await.unwrap();
        assert!((before - after - 95.0 * 2.0).abs() < 1e-9);
    }
}
