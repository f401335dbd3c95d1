// 9.0: LP share ledger and the fee-per-share index.
// MasterChef-style accounting: fees accrue into a cumulative per-share index so
// settling any one account is O(1) regardless of how many fee deposits happened
// while it sat idle. reward_debt is the account's snapshot of the index at its
// last settlement; pending = floor(shares * acc / PRECISION) - reward_debt.

use crate::types::{OwnerId, Quote, SeqNo, Token};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// scaling constant for acc_fee_per_share. keeps the index precise while share
// counts are large and per-deposit fee slices are small.
pub fn fee_precision() -> Decimal {
    dec!(1_000_000_000_000)
}

// 9.1: per-token pool totals. invariant: total_shares == 0 iff total_assets == 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub total_shares: Quote,
    pub total_assets: Quote,
    // cumulative fees per share, scaled by fee_precision()
    pub acc_fee_per_share: Decimal,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            total_shares: Quote::zero(),
            total_assets: Quote::zero(),
            acc_fee_per_share: Decimal::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_shares.is_zero()
    }

    // first deposit establishes the 1:1 exchange rate. later deposits floor,
    // which biases rounding toward the pool instead of over-minting.
    pub fn shares_for_deposit(&self, amount: Quote) -> Quote {
        if self.is_empty() {
            amount
        } else {
            Quote::new(
                (amount.value() * self.total_shares.value() / self.total_assets.value()).floor(),
            )
        }
    }

    // floor again on the way out. burning the entire share supply sweeps the
    // remaining assets so an empty pool never strands dust.
    pub fn assets_for_shares(&self, shares: Quote) -> Quote {
        if shares == self.total_shares {
            self.total_assets
        } else {
            Quote::new(
                (shares.value() * self.total_assets.value() / self.total_shares.value()).floor(),
            )
        }
    }

    // bumps the index by lp_amount spread across current shares.
    // caller guarantees the pool is non-empty.
    pub fn accrue(&mut self, lp_amount: Quote) {
        debug_assert!(!self.is_empty());
        self.acc_fee_per_share +=
            lp_amount.value() * fee_precision() / self.total_shares.value();
    }
}

impl Default for PoolState {
    fn default() -> Self {
        Self::new()
    }
}

// 9.2: one provider's stake in one token pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpAccount {
    pub owner: OwnerId,
    pub token: Token,
    pub shares: Quote,
    // index snapshot at last settlement, already multiplied through by shares
    pub reward_debt: Decimal,
    pub last_deposit_seq: SeqNo,
}

impl LpAccount {
    pub fn new(owner: OwnerId, token: Token, seq: SeqNo) -> Self {
        Self {
            owner,
            token,
            shares: Quote::zero(),
            reward_debt: Decimal::ZERO,
            last_deposit_seq: seq,
        }
    }

    pub fn pending_fees(&self, acc_fee_per_share: Decimal) -> Quote {
        let accumulated = (self.shares.value() * acc_fee_per_share / fee_precision()).floor();
        Quote::new(accumulated - self.reward_debt)
    }

    // re-snapshot after any share balance change or claim. new shares cannot
    // retroactively claim fees accrued before the deposit.
    pub fn settle(&mut self, acc_fee_per_share: Decimal) {
        self.reward_debt = (self.shares.value() * acc_fee_per_share / fee_precision()).floor();
    }
}
