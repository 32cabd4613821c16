// Gateway capability traits consumed by the engine
//
// The engine composes over these rather than extending any concrete client;
// real brokerage/exchange SDKs, the paper-trading book and the test mocks
// all sit behind the same two traits.

pub mod rest;
pub mod retry;
pub mod simulated;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::types::{Order, OrderId, Side};

/// Read-only market data. May fail transiently.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Current price for the instrument.
    async fn current_price(&self, instrument: &str) -> EngineResult<f64>;

    /// Confirm the session has the market/account access it needs.
    /// A `Permission` failure here is fatal and never retried.
    async fn validate_access(&self, instrument: &str) -> EngineResult<()>;
}

/// Order placement and management. May fail transiently.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_order(
        &self,
        instrument: &str,
        side: Side,
        price: f64,
        quantity: f64,
    ) -> EngineResult<OrderId>;

    async fn open_orders(&self, instrument: &str) -> EngineResult<Vec<Order>>;

    /// Idempotent: cancelling an already filled or cancelled order is not
    /// an error.
    async fn cancel_order(&self, order_id: &OrderId) -> EngineResult<()>;

    /// Informational only; not required for core correctness.
    async fn account_balance(&self) -> EngineResult<f64>;
}
