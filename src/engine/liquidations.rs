//! Liquidation execution.
//!
//! The status check and the status transition happen inside the same atomic
//! step, so of two racing attempts on one position exactly one settles it; the
//! loser finds the status already changed and gets `PositionNotLiquidatable`.
//! Backstop reporting is best-effort: a depleted or failing backstop never
//! blocks the liquidation that produced the shortfall.

use super::core::Engine;
use super::results::{EngineError, LiquidationOutcome};
use crate::events::{
    BadDebtEvent, EventPayload, PartialLiquidationEvent, PositionLiquidatedEvent,
};
use crate::health;
use crate::liquidation::plan_liquidation;
use crate::position::PositionStatus;
use crate::types::{OwnerId, PositionId, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

impl Engine {
    /// Fully liquidates a position (subject to the large-position per-call
    /// cap, which may leave a remainder for follow-up calls).
    pub fn liquidate(
        &mut self,
        id: PositionId,
        caller: OwnerId,
    ) -> Result<LiquidationOutcome, EngineError> {
        self.liquidate_partial(id, caller, dec!(100))
    }

    /// Liquidates `percentage` percent of a position. The caller earns the
    /// tier bonus out of the seized collateral.
    pub fn liquidate_partial(
        &mut self,
        id: PositionId,
        caller: OwnerId,
        percentage: Decimal,
    ) -> Result<LiquidationOutcome, EngineError> {
        self.guarded(|eng| {
            if percentage <= Decimal::ZERO || percentage > dec!(100) {
                return Err(EngineError::InvalidLiquidationPercentage);
            }

            let position = eng
                .positions
                .get(&id)
                .ok_or(EngineError::PositionNotFound(id))?;

            // checked-and-set: a position already settled by a racing call is
            // simply no longer liquidatable
            if !position.is_live() {
                return Err(EngineError::PositionNotLiquidatable(id));
            }

            let quote = eng.read_price()?;
            if !health::is_liquidatable(position, quote.value, eng.params.liquidation_threshold)
            {
                return Err(EngineError::PositionNotLiquidatable(id));
            }

            let plan = plan_liquidation(position, quote.value, percentage, &eng.params.bonus);
            let (owner, token) = (position.owner, position.token);

            // commit the ledger change before any payout leaves custody
            let position = eng
                .positions
                .get_mut(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            let (remaining_collateral, remaining_size) = if plan.full {
                position.collateral = Quote::zero();
                position.size = Quote::zero();
                position.status = PositionStatus::Liquidated;
                (Quote::zero(), Quote::zero())
            } else {
                position.collateral = position.collateral.sub(plan.seized_collateral);
                position.size = position.size.sub(plan.closed_size);
                (position.collateral, position.size)
            };

            eng.custody.release(caller, token, plan.bonus)?;
            if plan.trader_refund.is_positive() {
                eng.custody.release(owner, token, plan.trader_refund)?;
            }

            // advisory. Err means nothing was covered; the liquidation stands.
            let covered = if plan.bad_debt.is_positive() {
                eng.backstop
                    .cover_bad_debt(token, plan.bad_debt, owner)
                    .unwrap_or_else(|_| Quote::zero())
            } else {
                Quote::zero()
            };

            if plan.bad_debt.is_positive() {
                eng.emit_event(EventPayload::BadDebt(BadDebtEvent {
                    position_id: id,
                    token,
                    amount: plan.bad_debt,
                    covered_by_backstop: covered,
                }));
            }

            if plan.full {
                eng.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
                    position_id: id,
                    owner,
                    token,
                    liquidator: caller,
                    price: quote.value,
                    seized_collateral: plan.seized_collateral,
                    bonus: plan.bonus,
                    trader_refund: plan.trader_refund,
                    bad_debt: plan.bad_debt,
                }));
            } else {
                eng.emit_event(EventPayload::PartialLiquidation(PartialLiquidationEvent {
                    position_id: id,
                    owner,
                    token,
                    liquidator: caller,
                    price: quote.value,
                    fraction: plan.fraction,
                    closed_size: plan.closed_size,
                    seized_collateral: plan.seized_collateral,
                    bonus: plan.bonus,
                    trader_refund: plan.trader_refund,
                    bad_debt: plan.bad_debt,
                    remaining_size,
                    remaining_collateral,
                }));
            }

            Ok(LiquidationOutcome {
                position_id: id,
                fraction: plan.fraction,
                seized_collateral: plan.seized_collateral,
                bonus: plan.bonus,
                trader_refund: plan.trader_refund,
                bad_debt: plan.bad_debt,
                covered_by_backstop: covered,
                fully_liquidated: plan.full,
            })
        })
    }
}
