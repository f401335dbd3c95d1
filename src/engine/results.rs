// 8.0.2: result types and the error taxonomy for engine operations.
//
// validation / authorization / state errors reject before any state change.
// dependency errors (oracle, custody) abort the whole operation with no partial
// mutation. bad debt is not an error at all, it rides out in the results and
// the event stream.

use crate::custody::CustodyError;
use crate::oracle::OracleError;
use crate::types::{PositionId, Quote, SeqNo, Token};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct CloseResult {
    pub payout: Quote,
    pub pnl: Quote,
}

#[derive(Debug, Clone)]
pub struct PartialCloseResult {
    pub payout: Quote,
    pub pnl: Quote,
    pub remaining_collateral: Quote,
    pub remaining_size: Quote,
}

#[derive(Debug, Clone)]
pub struct LiquidationOutcome {
    pub position_id: PositionId,
    // fraction of the position settled by this call, after the per-call cap
    pub fraction: Decimal,
    pub seized_collateral: Quote,
    pub bonus: Quote,
    pub trader_refund: Quote,
    pub bad_debt: Quote,
    pub covered_by_backstop: Quote,
    pub fully_liquidated: bool,
}

#[derive(Debug, Clone)]
pub struct WithdrawalResult {
    pub amount_out: Quote,
    pub fees_settled: Quote,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    // validation
    #[error("leverage {requested} outside [{min}, {max}]")]
    InvalidLeverage {
        requested: Decimal,
        min: u32,
        max: u32,
    },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("position size {size} below minimum notional {minimum}")]
    BelowMinimumSize { size: Quote, minimum: Quote },

    #[error("fraction must be strictly between 0 and 1")]
    InvalidFraction,

    #[error("liquidation percentage must be in (0, 100]")]
    InvalidLiquidationPercentage,

    #[error("token {0:?} is not supported")]
    TokenNotSupported(Token),

    // authorization
    #[error("caller is not the position owner")]
    Unauthorized,

    // state
    #[error("position {0:?} not found")]
    PositionNotFound(PositionId),

    #[error("position {0:?} is not open")]
    PositionNotOpen(PositionId),

    #[error("position opened at {opened_at} is still inside the hold period of {min_hold}")]
    PositionTooNew { opened_at: SeqNo, min_hold: u64 },

    #[error("position {0:?} is not liquidatable")]
    PositionNotLiquidatable(PositionId),

    #[error("withdrawal cooldown not passed: last deposit at {last_deposit}, cooldown {cooldown}")]
    CooldownNotPassed { last_deposit: SeqNo, cooldown: u64 },

    #[error("removal would leave health factor {health}, minimum {required}")]
    InsufficientHealthFactor { health: Decimal, required: Decimal },

    #[error("insufficient margin: requested {requested}, available {available}")]
    InsufficientMargin { requested: Quote, available: Quote },

    #[error("re-entrant call rejected: an operation is already in progress")]
    ReentrantCall,

    // dependencies
    #[error("price unavailable: {0}")]
    PriceUnavailable(#[from] OracleError),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Quote, available: Quote },
}

impl From<CustodyError> for EngineError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::InsufficientBalance {
                requested,
                available,
            } => EngineError::InsufficientBalance {
                requested,
                available,
            },
        }
    }
}
