//! Solvency computation.
//!
//! The health factor is effective collateral over required margin. A position is
//! liquidatable exactly when the ratio drops below the liquidation threshold.
//! Everything here is a pure query with no side effects; the engine reads a
//! price, asks these functions, then mutates.

use crate::position::Position;
use crate::types::Price;
use rust_decimal::Decimal;

/// Computes `(collateral + unrealized_pnl) / (size / leverage)`.
///
/// Required margin is strictly positive because leverage >= 2 is enforced at
/// open and size > 0 while a position is live, so the division is total.
pub fn compute_health_factor(position: &Position, current_price: Price) -> Decimal {
    let effective = position.effective_collateral(current_price);
    let required = position.required_margin();
    effective.value() / required.value()
}

/// `true` iff the health factor is below `threshold` (1.0 in production config).
pub fn is_liquidatable(position: &Position, current_price: Price, threshold: Decimal) -> bool {
    compute_health_factor(position, current_price) < threshold
}
