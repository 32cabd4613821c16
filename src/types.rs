// Common types used across the engine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gateway-assigned order identifier. The engine only ever holds these by
/// value; the order itself lives on the gateway side.
pub type OrderId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
    Rejected,
}

/// Last-known view of a gateway-owned order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub instrument: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub status: OrderStatus,
}

/// One price point of the grid. Levels form a strictly increasing sequence
/// from the lower to the upper bound of the configured range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLevel {
    pub index: usize,
    pub price: f64,
}

/// Append-only record of a trade the engine believes has happened.
/// Owned exclusively by the engine for the session's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub order_id: OrderId,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}
