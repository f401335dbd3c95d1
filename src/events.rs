// 11.0: every ledger mutation produces an event. external indexers reconstruct
// full position and pool history from this stream alone, so each payload
// carries the identifiers and amounts involved, not just a summary.

use crate::types::{Direction, OwnerId, PositionId, Price, Quote, SeqNo, Token};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub seq: SeqNo,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, seq: SeqNo, payload: EventPayload) -> Self {
        Self { id, seq, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // position lifecycle
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    PositionPartiallyClosed(PositionPartiallyClosedEvent),
    MarginAdded(MarginAddedEvent),
    MarginRemoved(MarginRemovedEvent),

    // liquidations
    PositionLiquidated(PositionLiquidatedEvent),
    PartialLiquidation(PartialLiquidationEvent),
    BadDebt(BadDebtEvent),

    // liquidity pool
    LiquidityAdded(LiquidityAddedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),
    FeesDeposited(FeesDepositedEvent),
    FeesClaimed(FeesClaimedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub direction: Direction,
    pub collateral: Quote,
    pub size: Quote,
    pub leverage: Decimal,
    pub entry_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub exit_price: Price,
    pub pnl: Quote,
    pub payout: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPartiallyClosedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub fraction: Decimal,
    pub exit_price: Price,
    pub closed_size: Quote,
    pub closed_collateral: Quote,
    pub pnl: Quote,
    pub payout: Quote,
    pub remaining_size: Quote,
    pub remaining_collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginAddedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub amount: Quote,
    pub new_collateral: Quote,
    pub new_size: Quote,
    pub new_leverage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRemovedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub amount: Quote,
    pub new_collateral: Quote,
    pub new_size: Quote,
    pub new_leverage: Decimal,
    pub health_after: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub liquidator: OwnerId,
    pub price: Price,
    pub seized_collateral: Quote,
    pub bonus: Quote,
    pub trader_refund: Quote,
    pub bad_debt: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialLiquidationEvent {
    pub position_id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub liquidator: OwnerId,
    pub price: Price,
    pub fraction: Decimal,
    pub closed_size: Quote,
    pub seized_collateral: Quote,
    pub bonus: Quote,
    pub trader_refund: Quote,
    pub bad_debt: Quote,
    pub remaining_size: Quote,
    pub remaining_collateral: Quote,
}

// a solvency record, not an error. emitted whether or not the backstop covered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub position_id: PositionId,
    pub token: Token,
    pub amount: Quote,
    pub covered_by_backstop: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityAddedEvent {
    pub owner: OwnerId,
    pub token: Token,
    pub amount: Quote,
    pub shares_minted: Quote,
    pub total_shares: Quote,
    pub total_assets: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub owner: OwnerId,
    pub token: Token,
    pub shares_burned: Quote,
    pub amount_out: Quote,
    pub total_shares: Quote,
    pub total_assets: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesDepositedEvent {
    pub token: Token,
    pub amount: Quote,
    pub lp_amount: Quote,
    pub treasury_amount: Quote,
    pub acc_fee_per_share: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesClaimedEvent {
    pub owner: OwnerId,
    pub token: Token,
    pub amount: Quote,
}
