//! Position lifecycle entry points: open, close, partial close, margin changes.
//!
//! Every operation follows the same shape: validate everything against a
//! snapshot, touch custody, then commit the ledger mutation and emit the audit
//! event in the same synchronous step. A failure anywhere leaves no partial
//! state behind.

use super::core::Engine;
use super::results::{CloseResult, EngineError, PartialCloseResult};
use crate::config::MarginTopUpPolicy;
use crate::events::{
    EventPayload, MarginAddedEvent, MarginRemovedEvent, PositionClosedEvent,
    PositionOpenedEvent, PositionPartiallyClosedEvent,
};
use crate::position::{Position, PositionStatus};
use crate::types::{Direction, Leverage, OwnerId, PositionId, Quote, Token};
use rust_decimal::Decimal;

impl Engine {
    /// Opens a leveraged position. Collateral is reserved via custody; size is
    /// `collateral * leverage` and must clear the minimum notional.
    pub fn open_position(
        &mut self,
        owner: OwnerId,
        token: Token,
        collateral: Quote,
        leverage: u32,
        direction: Direction,
    ) -> Result<PositionId, EngineError> {
        self.guarded(|eng| {
            if leverage < eng.params.min_leverage || leverage > eng.params.max_leverage {
                return Err(EngineError::InvalidLeverage {
                    requested: Decimal::from(leverage),
                    min: eng.params.min_leverage,
                    max: eng.params.max_leverage,
                });
            }
            if !collateral.is_positive() {
                return Err(EngineError::ZeroAmount);
            }
            if !eng.params.is_supported(token) {
                return Err(EngineError::TokenNotSupported(token));
            }

            let leverage = Leverage::from_multiplier(leverage).ok_or(
                EngineError::InvalidLeverage {
                    requested: Decimal::from(leverage),
                    min: eng.params.min_leverage,
                    max: eng.params.max_leverage,
                },
            )?;

            let size = Quote::new(collateral.value() * leverage.value());
            if size < eng.params.min_notional {
                return Err(EngineError::BelowMinimumSize {
                    size,
                    minimum: eng.params.min_notional,
                });
            }

            let quote = eng.read_price()?;
            eng.custody.reserve(owner, token, collateral)?;

            let id = PositionId(eng.next_position_id);
            eng.next_position_id += 1;

            let position = Position::new(
                id,
                owner,
                token,
                collateral,
                leverage,
                direction,
                quote.value,
                eng.current_seq,
            );

            eng.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
                position_id: id,
                owner,
                token,
                direction,
                collateral,
                size: position.size,
                leverage: leverage.value(),
                entry_price: quote.value,
            }));

            eng.positions.insert(id, position);
            Ok(id)
        })
    }

    /// Closes the whole position at the current price. Payout is collateral
    /// plus pnl, floored at zero; a shortfall beyond collateral is a loss
    /// event, never drawn from anyone else's funds.
    pub fn close_position(
        &mut self,
        id: PositionId,
        caller: OwnerId,
    ) -> Result<CloseResult, EngineError> {
        self.guarded(|eng| {
            let position = eng
                .positions
                .get(&id)
                .ok_or(EngineError::PositionNotFound(id))?;

            if position.owner != caller {
                return Err(EngineError::Unauthorized);
            }
            if !position.is_live() {
                return Err(EngineError::PositionNotOpen(id));
            }
            if !eng.window_elapsed(position.opened_at_seq, eng.params.min_hold) {
                return Err(EngineError::PositionTooNew {
                    opened_at: position.opened_at_seq,
                    min_hold: eng.params.min_hold,
                });
            }

            let quote = eng.read_price()?;
            let pnl = position.unrealized_pnl(quote.value);
            let payout = position.collateral.add(pnl).max_zero();
            let (owner, token) = (position.owner, position.token);

            let position = eng
                .positions
                .get_mut(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            let prev_status = position.status;
            position.status = PositionStatus::Closed;

            // a failed payout must not leave the position half closed
            if let Err(err) = eng.custody.release(owner, token, payout) {
                if let Some(position) = eng.positions.get_mut(&id) {
                    position.status = prev_status;
                }
                return Err(err.into());
            }

            eng.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                position_id: id,
                owner,
                token,
                exit_price: quote.value,
                pnl,
                payout,
            }));

            Ok(CloseResult { payout, pnl })
        })
    }

    /// Closes `fraction` of the position, settling pro-rated pnl for the
    /// closed slice. The remainder stays live with its original
    /// `opened_at_seq`; partial closes never reset the hold origin.
    pub fn partial_close(
        &mut self,
        id: PositionId,
        caller: OwnerId,
        fraction: Decimal,
    ) -> Result<PartialCloseResult, EngineError> {
        self.guarded(|eng| {
            if fraction <= Decimal::ZERO || fraction >= Decimal::ONE {
                return Err(EngineError::InvalidFraction);
            }

            let position = eng
                .positions
                .get(&id)
                .ok_or(EngineError::PositionNotFound(id))?;

            if position.owner != caller {
                return Err(EngineError::Unauthorized);
            }
            if !position.is_live() {
                return Err(EngineError::PositionNotOpen(id));
            }
            if !eng.window_elapsed(position.opened_at_seq, eng.params.min_hold) {
                return Err(EngineError::PositionTooNew {
                    opened_at: position.opened_at_seq,
                    min_hold: eng.params.min_hold,
                });
            }

            // the remainder stays live, so it must clear the minimum notional
            let remaining = position.size.sub(position.size.mul(fraction));
            if remaining < eng.params.min_notional {
                return Err(EngineError::BelowMinimumSize {
                    size: remaining,
                    minimum: eng.params.min_notional,
                });
            }

            let quote = eng.read_price()?;
            let slice = position.pro_rata(fraction);
            let pnl = position.unrealized_pnl(quote.value).mul(fraction);
            let payout = slice.collateral.add(pnl).max_zero();
            let (owner, token) = (position.owner, position.token);

            let position = eng
                .positions
                .get_mut(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            let (prev_collateral, prev_size, prev_status) =
                (position.collateral, position.size, position.status);
            position.collateral = position.collateral.sub(slice.collateral);
            position.size = position.size.sub(slice.size);
            position.status = PositionStatus::PartiallyClosed;
            let remaining_collateral = position.collateral;
            let remaining_size = position.size;

            if let Err(err) = eng.custody.release(owner, token, payout) {
                if let Some(position) = eng.positions.get_mut(&id) {
                    position.collateral = prev_collateral;
                    position.size = prev_size;
                    position.status = prev_status;
                }
                return Err(err.into());
            }

            eng.emit_event(EventPayload::PositionPartiallyClosed(
                PositionPartiallyClosedEvent {
                    position_id: id,
                    owner,
                    token,
                    fraction,
                    exit_price: quote.value,
                    closed_size: slice.size,
                    closed_collateral: slice.collateral,
                    pnl,
                    payout,
                    remaining_size,
                    remaining_collateral,
                },
            ));

            Ok(PartialCloseResult {
                payout,
                pnl,
                remaining_collateral,
                remaining_size,
            })
        })
    }

    /// Adds collateral to a live position. Permitted at any age. What happens
    /// to the rest of the position depends on the configured top-up policy.
    pub fn add_margin(
        &mut self,
        id: PositionId,
        caller: OwnerId,
        amount: Quote,
    ) -> Result<(), EngineError> {
        self.guarded(|eng| {
            if !amount.is_positive() {
                return Err(EngineError::ZeroAmount);
            }

            let position = eng
                .positions
                .get(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            if position.owner != caller {
                return Err(EngineError::Unauthorized);
            }
            if !position.is_live() {
                return Err(EngineError::PositionNotOpen(id));
            }
            let (owner, token) = (position.owner, position.token);

            eng.custody.reserve(owner, token, amount)?;

            let policy = eng.params.top_up_policy;
            let min_leverage = eng.params.min_leverage;
            let position = eng
                .positions
                .get_mut(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            position.collateral = position.collateral.add(amount);
            apply_top_up_policy(position, policy, min_leverage);

            let event = MarginAddedEvent {
                position_id: id,
                owner,
                token,
                amount,
                new_collateral: position.collateral,
                new_size: position.size,
                new_leverage: position.leverage.value(),
            };
            eng.emit_event(EventPayload::MarginAdded(event));
            Ok(())
        })
    }

    /// Removes collateral from a live position. Requires the hold period to
    /// have elapsed and the post-removal health factor to clear the removal
    /// threshold, both checked before anything mutates.
    pub fn remove_margin(
        &mut self,
        id: PositionId,
        caller: OwnerId,
        amount: Quote,
    ) -> Result<(), EngineError> {
        self.guarded(|eng| {
            if !amount.is_positive() {
                return Err(EngineError::ZeroAmount);
            }

            let position = eng
                .positions
                .get(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            if position.owner != caller {
                return Err(EngineError::Unauthorized);
            }
            if !position.is_live() {
                return Err(EngineError::PositionNotOpen(id));
            }
            if !eng.window_elapsed(position.opened_at_seq, eng.params.min_hold) {
                return Err(EngineError::PositionTooNew {
                    opened_at: position.opened_at_seq,
                    min_hold: eng.params.min_hold,
                });
            }
            if amount >= position.collateral {
                return Err(EngineError::InsufficientMargin {
                    requested: amount,
                    available: position.collateral,
                });
            }

            let quote = eng.read_price()?;

            // health after the hypothetical removal, against current leverage
            let pnl = position.unrealized_pnl(quote.value);
            let effective = position.collateral.sub(amount).add(pnl);
            let health = effective.value() / position.required_margin().value();
            if health < eng.params.removal_threshold {
                return Err(EngineError::InsufficientHealthFactor {
                    health,
                    required: eng.params.removal_threshold,
                });
            }

            match eng.params.top_up_policy {
                // size stays, so the re-derived leverage must not leave the
                // admission bounds
                MarginTopUpPolicy::ReduceLeverage => {
                    let implied =
                        position.size.value() / position.collateral.sub(amount).value();
                    if implied > Decimal::from(eng.params.max_leverage) {
                        return Err(EngineError::InvalidLeverage {
                            requested: implied,
                            min: eng.params.min_leverage,
                            max: eng.params.max_leverage,
                        });
                    }
                }
                // leverage stays, so the shrunken size must still clear the
                // minimum notional
                MarginTopUpPolicy::IncreaseSize => {
                    let new_size = Quote::new(
                        position.collateral.sub(amount).value() * position.leverage.value(),
                    );
                    if new_size < eng.params.min_notional {
                        return Err(EngineError::BelowMinimumSize {
                            size: new_size,
                            minimum: eng.params.min_notional,
                        });
                    }
                }
            }

            let (owner, token) = (position.owner, position.token);
            let policy = eng.params.top_up_policy;
            let min_leverage = eng.params.min_leverage;

            let position = eng
                .positions
                .get_mut(&id)
                .ok_or(EngineError::PositionNotFound(id))?;
            let (prev_collateral, prev_size, prev_leverage) =
                (position.collateral, position.size, position.leverage);
            position.collateral = position.collateral.sub(amount);
            apply_top_up_policy(position, policy, min_leverage);

            let event = MarginRemovedEvent {
                position_id: id,
                owner,
                token,
                amount,
                new_collateral: position.collateral,
                new_size: position.size,
                new_leverage: position.leverage.value(),
                health_after: health,
            };

            if let Err(err) = eng.custody.release(owner, token, amount) {
                if let Some(position) = eng.positions.get_mut(&id) {
                    position.collateral = prev_collateral;
                    position.size = prev_size;
                    position.leverage = prev_leverage;
                }
                return Err(err.into());
            }
            eng.emit_event(EventPayload::MarginRemoved(event));
            Ok(())
        })
    }
}

// re-establishes size == collateral * leverage after a collateral change.
// ReduceLeverage keeps size and re-derives leverage, clamped at min_leverage
// once a position is over-collateralized (remove_margin rejects the other
// direction before calling in here); IncreaseSize keeps leverage and
// recomputes size.
fn apply_top_up_policy(position: &mut Position, policy: MarginTopUpPolicy, min_leverage: u32) {
    match policy {
        MarginTopUpPolicy::ReduceLeverage => {
            let implied = (position.size.value() / position.collateral.value())
                .max(Decimal::from(min_leverage));
            if let Some(leverage) = Leverage::new(implied) {
                position.leverage = leverage;
            }
        }
        MarginTopUpPolicy::IncreaseSize => {
            position.size =
                Quote::new(position.collateral.value() * position.leverage.value());
        }
    }
}
