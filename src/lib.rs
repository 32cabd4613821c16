// Grid Trading Engine Library
//
// A grid trading engine over pluggable market-data and order gateways:
// level computation, per-level state tracking, a polling state machine
// with bounded retries, and paper-trading / REST gateway implementations.

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod grid;
pub mod report;
pub mod types;

// Re-export core engine types
pub use engine::{EngineState, GridEngine};

// Re-export error types
pub use error::{EngineError, EngineResult};

// Re-export configuration
pub use config::{Config, ConfigError, EngineConfig, EngineMode, GridConfig, ReportConfig};

// Re-export gateway capabilities and implementations
pub use gateway::{
    rest::RestMarketDataGateway, retry::RetryPolicy, simulated::SimulatedGateway,
    MarketDataGateway, OrderGateway,
};

// Re-export grid math and state
pub use grid::{calculator, tracker::GridStateTracker, GridError};

// Re-export common types
pub use types::{GridLevel, Order, OrderId, OrderStatus, Side, TradeRecord};
