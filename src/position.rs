// 4.0: leveraged position record and its pnl math.
// pnl is quoted against entry: long = size * (price - entry) / entry.
// 4.2 has the pro-rata slice used by partial close and partial liquidation.

use crate::types::{Direction, Leverage, OwnerId, PositionId, Price, Quote, SeqNo, Token};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Open and PartiallyClosed are the live states. Closed and Liquidated are
// terminal; a position never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
    Liquidated,
}

impl PositionStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, PositionStatus::Open | PositionStatus::PartiallyClosed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: OwnerId,
    pub token: Token,
    pub collateral: Quote,
    // USD notional exposure. equals collateral * leverage at open and stays in
    // step through margin and size adjustments while the position is levered.
    pub size: Quote,
    pub entry_price: Price,
    pub leverage: Leverage,
    pub direction: Direction,
    pub opened_at_seq: SeqNo,
    pub status: PositionStatus,
}

impl Position {
    pub fn new(
        id: PositionId,
        owner: OwnerId,
        token: Token,
        collateral: Quote,
        leverage: Leverage,
        direction: Direction,
        entry_price: Price,
        opened_at_seq: SeqNo,
    ) -> Self {
        let size = Quote::new(collateral.value() * leverage.value());
        Self {
            id,
            owner,
            token,
            collateral,
            size,
            entry_price,
            leverage,
            direction,
            opened_at_seq,
            status: PositionStatus::Open,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    // 4.1: paper gains/losses against the current reference price
    pub fn unrealized_pnl(&self, current_price: Price) -> Quote {
        calculate_unrealized_pnl(self.direction, self.size, self.entry_price, current_price)
    }

    // collateral plus paper pnl. this against required margin is the health check
    pub fn effective_collateral(&self, current_price: Price) -> Quote {
        self.collateral.add(self.unrealized_pnl(current_price))
    }

    // size / leverage. positive by construction since leverage >= 1
    pub fn required_margin(&self) -> Quote {
        Quote::new(self.size.value() / self.leverage.value())
    }

    // 4.2: the slice of a position settled by a partial close or partial
    // liquidation. entry price, direction, and opened_at_seq stay with the
    // remainder; only collateral and size scale.
    pub fn pro_rata(&self, fraction: Decimal) -> PositionSlice {
        debug_assert!(fraction > Decimal::ZERO && fraction <= Decimal::ONE);
        PositionSlice {
            collateral: self.collateral.mul(fraction),
            size: self.size.mul(fraction),
        }
    }
}

// collateral and size carved off a position by a fractional settlement
#[derive(Debug, Clone, Copy)]
pub struct PositionSlice {
    pub collateral: Quote,
    pub size: Quote,
}

// 4.3: the pnl formula. exposure is USD notional, so the return is relative to entry:
//   long:  size * (price - entry) / entry
//   short: size * (entry - price) / entry
pub fn calculate_unrealized_pnl(
    direction: Direction,
    size: Quote,
    entry_price: Price,
    current_price: Price,
) -> Quote {
    let relative_move =
        (current_price.value() - entry_price.value()) / entry_price.value();
    Quote::new(direction.sign() * size.value() * relative_move)
}
