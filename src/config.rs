// 7.0 config.rs: the injected parameter surface. read-only to the engine;
// mutation goes through an out-of-scope, time-delayed multi-party path, so
// nothing in this crate writes to it after construction.

use crate::liquidation::BonusSchedule;
use crate::types::{OwnerId, Quote, Token};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// What add_margin / remove_margin do to the rest of the position.
// ReduceLeverage keeps size and re-derives leverage from the new collateral,
// clamped at min_leverage once the position is over-collateralized; removals
// that would push it past max_leverage are rejected. IncreaseSize keeps
// leverage and recomputes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginTopUpPolicy {
    ReduceLeverage,
    IncreaseSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParams {
    // leverage admission bounds, inclusive
    pub min_leverage: u32,
    pub max_leverage: u32,
    // smallest notional a position may open with
    pub min_notional: Quote,
    // sequence ticks a position must age before close / remove_margin.
    // guards same-transition open/close manipulation.
    pub min_hold: u64,
    // sequence ticks between an LP deposit and the next withdrawal
    pub cooldown: u64,
    // health factor below which a position is liquidatable
    pub liquidation_threshold: Decimal,
    // health factor a position must keep after a margin removal
    pub removal_threshold: Decimal,
    pub bonus: BonusSchedule,
    // fraction of deposited fees routed to LPs; the rest goes to treasury
    pub lp_fee_share: Decimal,
    // custody owner credited with the treasury cut
    pub treasury: OwnerId,
    pub supported_tokens: Vec<Token>,
    pub top_up_policy: MarginTopUpPolicy,
    // event log retention
    pub max_events: usize,
    // print events as they are emitted
    pub verbose: bool,
}

impl EngineParams {
    pub fn is_supported(&self, token: Token) -> bool {
        self.supported_tokens.contains(&token)
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            min_leverage: 2,
            max_leverage: 20,
            min_notional: Quote::new(dec!(10)),
            min_hold: 2,
            cooldown: 10,
            liquidation_threshold: dec!(1.0),
            removal_threshold: dec!(1.5),
            bonus: BonusSchedule::default(),
            lp_fee_share: dec!(0.70),
            treasury: OwnerId(0),
            supported_tokens: vec![Token(1)],
            top_up_policy: MarginTopUpPolicy::ReduceLeverage,
            max_events: 100_000,
            verbose: false,
        }
    }
}
