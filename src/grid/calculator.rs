//! Pure grid math: price levels and per-level quantities.
//!
//! No side effects, deterministic functions of their inputs.

use crate::grid::GridError;
use crate::types::GridLevel;

/// Compute the `count + 1` evenly spaced levels of a grid over
/// `[lower, upper]` via linear interpolation. The first level is exactly
/// `lower` and the last exactly `upper`; interior levels are strictly
/// increasing.
pub fn compute_levels(lower: f64, upper: f64, count: usize) -> Result<Vec<GridLevel>, GridError> {
    if upper <= lower || count < 1 || !lower.is_finite() || !upper.is_finite() {
        return Err(GridError::InvalidRange {
            lower,
            upper,
            count,
        });
    }

    let span = upper - lower;
    let levels = (0..=count)
        .map(|i| {
            // Pin the endpoints so float rounding never nudges them.
            let price = if i == 0 {
                lower
            } else if i == count {
                upper
            } else {
                lower + (i as f64) * span / (count as f64)
            };
            GridLevel { index: i, price }
        })
        .collect();

    Ok(levels)
}

/// Spread `total_investment` equally across levels in capital terms: each
/// level gets `total / n` of capital, so the quantity at level `i` is
/// `total / n / price[i]`. Cheaper levels buy more units.
pub fn compute_quantities(
    total_investment: f64,
    levels: &[GridLevel],
) -> Result<Vec<f64>, GridError> {
    if total_investment <= 0.0 || !total_investment.is_finite() {
        return Err(GridError::InvalidInvestment(total_investment));
    }

    let per_level = total_investment / levels.len() as f64;
    Ok(levels.iter().map(|level| per_level / level.price).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_levels_over_hundred_span() {
        let levels = compute_levels(100.0, 200.0, 10).unwrap();
        assert_eq!(levels.len(), 11);
        let expected: Vec<f64> = (0..=10).map(|i| 100.0 + 10.0 * i as f64).collect();
        for (level, want) in levels.iter().zip(expected) {
            assert!((level.price - want).abs() < 1e-9);
        }
        assert_eq!(levels[0].price, 100.0);
        assert_eq!(levels[10].price, 200.0);
    }

    #[test]
    fn test_levels_strictly_increasing_with_exact_endpoints() {
        let levels = compute_levels(0.1, 0.3, 7).unwrap();
        assert_eq!(levels.len(), 8);
        assert_eq!(levels.first().unwrap().price, 0.1);
        assert_eq!(levels.last().unwrap().price, 0.3);
        for pair in levels.windows(2) {
            assert!(pair[0].price < pair[1].price);
        }
        for (i, level) in levels.iter().enumerate() {
            assert_eq!(level.index, i);
        }
    }

    #[test]
    fn test_single_grid() {
        let levels = compute_levels(50.0, 60.0, 1).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, 50.0);
        assert_eq!(levels[1].price, 60.0);
    }

    #[test]
    fn test_rejects_inverted_or_flat_range() {
        assert!(compute_levels(200.0, 100.0, 10).is_err());
        assert!(compute_levels(100.0, 100.0, 10).is_err());
    }

    #[test]
    fn test_rejects_zero_count() {
        assert!(matches!(
            compute_levels(100.0, 200.0, 0),
            Err(GridError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_equal_capital_quantities() {
        let levels = vec![
            GridLevel {
                index: 0,
                price: 100.0,
            },
            GridLevel {
                index: 1,
                price: 200.0,
            },
        ];
        let quantities = compute_quantities(1000.0, &levels).unwrap();
        assert_eq!(quantities, vec![5.0, 2.5]);
    }

    #[test]
    fn test_quantities_recover_total_investment() {
        let levels = compute_levels(80.0, 120.0, 13).unwrap();
        let total = 2500.0;
        let quantities = compute_quantities(total, &levels).unwrap();
        let reinvested: f64 = quantities
            .iter()
            .zip(&levels)
            .map(|(qty, level)| qty * level.price)
            .sum();
        assert!((reinvested - total).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_non_positive_investment() {
        let levels = compute_levels(100.0, 200.0, 4).unwrap();
        assert!(compute_quantities(0.0, &levels).is_err());
        assert!(compute_quantities(-10.0, &levels).is_err());
    }
}
