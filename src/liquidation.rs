// 6.0: liquidation planning. pure math, no state.
// the executor in engine/liquidations.rs applies a plan produced here.
//
// bonus policy is a two-tier step function: 5% of seized collateral for normal
// positions. when the notional liquidated in one call exceeds the large-position
// threshold, the call is capped at 50% of the position and pays 10% instead.
// the cap bounds the market impact of single-shot liquidations of large books
// while the higher rate compensates liquidators for the extra calls needed.

use crate::position::Position;
use crate::types::{Price, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusSchedule {
    // fraction of seized collateral paid to the liquidator, normal tier
    pub base_rate: Decimal,
    // fraction paid above the large-position threshold
    pub large_rate: Decimal,
    // notional above which a single call is capped and the large rate applies
    pub large_position_threshold: Quote,
    // largest fraction of a position one large-tier call may take
    pub max_call_fraction: Decimal,
}

impl Default for BonusSchedule {
    fn default() -> Self {
        Self {
            base_rate: dec!(0.05),
            large_rate: dec!(0.10),
            large_position_threshold: Quote::new(dec!(1_000_000)),
            max_call_fraction: dec!(0.5),
        }
    }
}

// 6.1: the settlement breakdown for one liquidation call.
// seized collateral funds the bonus; what is left after bonus and recognized
// loss goes back to the trader, or becomes bad debt if negative.
#[derive(Debug, Clone)]
pub struct LiquidationPlan {
    // fraction of the position actually taken, after the per-call cap
    pub fraction: Decimal,
    pub seized_collateral: Quote,
    pub closed_size: Quote,
    pub pnl_portion: Quote,
    pub bonus: Quote,
    pub trader_refund: Quote,
    pub bad_debt: Quote,
    // true when the whole position is settled by this call
    pub full: bool,
}

pub fn plan_liquidation(
    position: &Position,
    current_price: Price,
    percentage: Decimal,
    schedule: &BonusSchedule,
) -> LiquidationPlan {
    debug_assert!(percentage > Decimal::ZERO && percentage <= dec!(100));

    let requested_fraction = percentage / dec!(100);
    let requested_notional = position.size.mul(requested_fraction);

    let (fraction, rate) = if requested_notional > schedule.large_position_threshold {
        (
            requested_fraction.min(schedule.max_call_fraction),
            schedule.large_rate,
        )
    } else {
        (requested_fraction, schedule.base_rate)
    };

    let slice = position.pro_rata(fraction);
    let pnl_portion = position.unrealized_pnl(current_price).mul(fraction);
    let bonus = slice.collateral.mul(rate);

    let residual = slice.collateral.add(pnl_portion).sub(bonus);
    let trader_refund = residual.max_zero();
    let bad_debt = residual.mul(dec!(-1)).max_zero();

    LiquidationPlan {
        fraction,
        seized_collateral: slice.collateral,
        closed_size: slice.size,
        pnl_portion,
        bonus,
        trader_refund,
        bad_debt,
        full: fraction == Decimal::ONE,
    }
}
