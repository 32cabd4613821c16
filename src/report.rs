//! Trade-history export and the end-of-session summary.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::types::{Side, TradeRecord};

/// Net realized cash flow over the session:
/// sell notional minus buy notional.
pub fn realized_profit(trades: &[TradeRecord]) -> f64 {
    trades
        .iter()
        .map(|trade| match trade.side {
            Side::Sell => trade.notional(),
            Side::Buy => -trade.notional(),
        })
        .sum()
}

/// Write the trade history as CSV. Creates parent directories as needed;
/// the header row goes first, then one line per trade in log order.
pub fn export_csv<P: AsRef<Path>>(trades: &[TradeRecord], path: P) -> EngineResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| EngineError::Unknown(format!("create {}: {}", parent.display(), e)))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| EngineError::Unknown(format!("open {}: {}", path.display(), e)))?;

    writeln!(file, "timestamp,instrument,price,quantity,side,order_id")
        .map_err(EngineError::from)?;
    for trade in trades {
        writeln!(
            file,
            "{},{},{:.8},{:.8},{},{}",
            trade.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            trade.instrument,
            trade.price,
            trade.quantity,
            trade.side,
            trade.order_id
        )
        .map_err(EngineError::from)?;
    }

    Ok(())
}

/// Timestamped export path under the configured directory.
pub fn export_path(output_dir: &str, instrument: &str) -> String {
    format!(
        "{}/trades_{}_{}.csv",
        output_dir,
        instrument.replace(['/', ':'], "-"),
        Utc::now().format("%Y%m%d_%H%M%S")
    )
}

/// Log the per-trade table and the realized-profit figure.
pub fn log_summary(trades: &[TradeRecord]) {
    if trades.is_empty() {
        info!("no trades recorded this session");
        return;
    }

    info!("trade history ({} trades):", trades.len());
    for trade in trades {
        info!(
            "  {} {} {:.6} {} @ {:.4} (order {})",
            trade.timestamp.format("%H:%M:%S"),
            trade.side,
            trade.quantity,
            trade.instrument,
            trade.price,
            trade.order_id
        );
    }
    info!("💰 realized profit: {:.2}", realized_profit(trades));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trade(side: Side, price: f64, quantity: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            instrument: "ETH-USDT".to_string(),
            price,
            quantity,
            side,
            order_id: "order-1".to_string(),
        }
    }

    #[test]
    fn test_realized_profit_sells_minus_buys() {
        let trades = vec![
            trade(Side::Buy, 100.0, 2.0),  // -200
            trade(Side::Sell, 110.0, 2.0), // +220
            trade(Side::Buy, 105.0, 1.0),  // -105
        ];
        assert!((realized_profit(&trades) - (-85.0)).abs() < 1e-9);
    }

    #[test]
    fn test_realized_profit_empty_is_zero() {
        assert_eq!(realized_profit(&[]), 0.0);
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("trades.csv");
        let trades = vec![trade(Side::Buy, 100.0, 2.0), trade(Side::Sell, 110.0, 2.0)];

        export_csv(&trades, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,instrument,price,quantity,side,order_id");
        assert!(lines[1].contains("BUY"));
        assert!(lines[2].contains("SELL"));
    }

    #[test]
    fn test_export_path_sanitizes_instrument() {
        let path = export_path("logs/trades", "ETH/USDT");
        assert!(path.starts_with("logs/trades/trades_ETH-USDT_"));
        assert!(path.ends_with(".csv"));
    }
}
