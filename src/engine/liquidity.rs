//! Liquidity pool entry points: deposits, withdrawals, fee inflow, claims.
//!
//! Share accounting and the fee index live in `pool.rs`; this module wires
//! them to custody, the cooldown guard, and the event stream. A deposit
//! carries the account's accrued fees across the reward-debt re-snapshot so
//! they stay claimable; withdrawals and claims pay them out. Either way the
//! snapshot never strands or double-counts accrued fees.

use super::core::Engine;
use super::results::{EngineError, WithdrawalResult};
use crate::events::{
    EventPayload, FeesClaimedEvent, FeesDepositedEvent, LiquidityAddedEvent,
    LiquidityRemovedEvent,
};
use crate::pool::{LpAccount, PoolState};
use crate::types::{OwnerId, Quote, Token};

impl Engine {
    /// Deposits `amount` into the token pool, minting shares at the current
    /// exchange rate (1:1 on the first deposit, floored thereafter).
    pub fn add_liquidity(
        &mut self,
        owner: OwnerId,
        token: Token,
        amount: Quote,
    ) -> Result<Quote, EngineError> {
        self.guarded(|eng| {
            if !amount.is_positive() {
                return Err(EngineError::ZeroAmount);
            }
            if !eng.params.is_supported(token) {
                return Err(EngineError::TokenNotSupported(token));
            }

            let pool = eng.pools.entry(token).or_default();
            let acc_index = pool.acc_fee_per_share;
            let minted = pool.shares_for_deposit(amount);
            // a deposit small enough to floor to zero shares would be a donation
            if minted.is_zero() {
                return Err(EngineError::ZeroAmount);
            }

            let seq = eng.current_seq;
            let pending = eng
                .lp_accounts
                .get(&(owner, token))
                .map(|account| account.pending_fees(acc_index))
                .unwrap_or_else(Quote::zero);

            eng.custody.reserve(owner, token, amount)?;

            let account = eng
                .lp_accounts
                .entry((owner, token))
                .or_insert_with(|| LpAccount::new(owner, token, seq));
            account.shares = account.shares.add(minted);
            account.settle(acc_index);
            // fees accrued before this deposit stay claimable; the new shares
            // earn nothing retroactively
            account.reward_debt -= pending.value();
            account.last_deposit_seq = seq;

            let pool = eng.pools.entry(token).or_default();
            pool.total_shares = pool.total_shares.add(minted);
            pool.total_assets = pool.total_assets.add(amount);
            let (total_shares, total_assets) = (pool.total_shares, pool.total_assets);

            eng.emit_event(EventPayload::LiquidityAdded(LiquidityAddedEvent {
                owner,
                token,
                amount,
                shares_minted: minted,
                total_shares,
                total_assets,
            }));

            Ok(minted)
        })
    }

    /// Burns `shares` and pays out the proportional pool assets, after the
    /// cooldown since the account's last deposit has elapsed. Pending fees are
    /// settled implicitly.
    pub fn remove_liquidity(
        &mut self,
        owner: OwnerId,
        token: Token,
        shares: Quote,
    ) -> Result<WithdrawalResult, EngineError> {
        self.guarded(|eng| {
            if !shares.is_positive() {
                return Err(EngineError::ZeroAmount);
            }

            let account = eng.lp_accounts.get(&(owner, token)).ok_or(
                EngineError::InsufficientBalance {
                    requested: shares,
                    available: Quote::zero(),
                },
            )?;
            if shares > account.shares {
                return Err(EngineError::InsufficientBalance {
                    requested: shares,
                    available: account.shares,
                });
            }
            if !eng.window_elapsed(account.last_deposit_seq, eng.params.cooldown) {
                return Err(EngineError::CooldownNotPassed {
                    last_deposit: account.last_deposit_seq,
                    cooldown: eng.params.cooldown,
                });
            }

            let pool = eng
                .pools
                .get(&token)
                .ok_or(EngineError::TokenNotSupported(token))?;
            let acc_index = pool.acc_fee_per_share;
            let pending = account.pending_fees(acc_index);
            let amount_out = pool.assets_for_shares(shares);

            let account = eng
                .lp_accounts
                .get_mut(&(owner, token))
                .ok_or(EngineError::InsufficientBalance {
                    requested: shares,
                    available: Quote::zero(),
                })?;
            let (prev_shares, prev_reward_debt) = (account.shares, account.reward_debt);
            account.shares = account.shares.sub(shares);
            account.settle(acc_index);

            let pool = eng
                .pools
                .get_mut(&token)
                .ok_or(EngineError::TokenNotSupported(token))?;
            let (prev_total_shares, prev_total_assets) =
                (pool.total_shares, pool.total_assets);
            pool.total_shares = pool.total_shares.sub(shares);
            pool.total_assets = pool.total_assets.sub(amount_out);
            let (total_shares, total_assets) = (pool.total_shares, pool.total_assets);

            // principal and accrued fees leave in one transfer, so a custody
            // failure rolls the whole withdrawal back
            if let Err(err) = eng.custody.release(owner, token, amount_out.add(pending)) {
                if let Some(account) = eng.lp_accounts.get_mut(&(owner, token)) {
                    account.shares = prev_shares;
                    account.reward_debt = prev_reward_debt;
                }
                if let Some(pool) = eng.pools.get_mut(&token) {
                    pool.total_shares = prev_total_shares;
                    pool.total_assets = prev_total_assets;
                }
                return Err(err.into());
            }

            if pending.is_positive() {
                eng.emit_event(EventPayload::FeesClaimed(FeesClaimedEvent {
                    owner,
                    token,
                    amount: pending,
                }));
            }
            eng.emit_event(EventPayload::LiquidityRemoved(LiquidityRemovedEvent {
                owner,
                token,
                shares_burned: shares,
                amount_out,
                total_shares,
                total_assets,
            }));

            Ok(WithdrawalResult {
                amount_out,
                fees_settled: pending,
            })
        })
    }

    /// Routes trading fees collected upstream: the LP share goes into the
    /// fee-per-share index, the rest to the treasury. With no LPs present the
    /// whole amount routes to treasury; fee inflow is never blockable. The
    /// host moves `amount` into engine custody before calling.
    pub fn deposit_fees(&mut self, token: Token, amount: Quote) -> Result<(), EngineError> {
        self.guarded(|eng| {
            if !amount.is_positive() {
                return Err(EngineError::ZeroAmount);
            }
            if !eng.params.is_supported(token) {
                return Err(EngineError::TokenNotSupported(token));
            }

            let treasury = eng.params.treasury;
            let lp_share = eng.params.lp_fee_share;
            let pool = eng.pools.entry(token).or_default();
            let prev_acc = pool.acc_fee_per_share;

            let (lp_amount, treasury_amount) = if pool.is_empty() {
                (Quote::zero(), amount)
            } else {
                let lp_amount = amount.mul(lp_share);
                (lp_amount, amount.sub(lp_amount))
            };

            if lp_amount.is_positive() {
                pool.accrue(lp_amount);
            }
            let acc_fee_per_share = pool.acc_fee_per_share;

            if treasury_amount.is_positive() {
                if let Err(err) = eng.custody.release(treasury, token, treasury_amount) {
                    if let Some(pool) = eng.pools.get_mut(&token) {
                        pool.acc_fee_per_share = prev_acc;
                    }
                    return Err(err.into());
                }
            }

            eng.emit_event(EventPayload::FeesDeposited(FeesDepositedEvent {
                token,
                amount,
                lp_amount,
                treasury_amount,
                acc_fee_per_share,
            }));

            Ok(())
        })
    }

    /// Pays out the fees accrued to an LP account since its last settlement.
    /// A no-op returning zero when nothing is pending.
    pub fn claim_fees(&mut self, owner: OwnerId, token: Token) -> Result<Quote, EngineError> {
        self.guarded(|eng| {
            let acc_index = match eng.pools.get(&token) {
                Some(pool) => pool.acc_fee_per_share,
                None => return Ok(Quote::zero()),
            };

            let Some(account) = eng.lp_accounts.get_mut(&(owner, token)) else {
                return Ok(Quote::zero());
            };

            let pending = account.pending_fees(acc_index);
            if !pending.is_positive() {
                return Ok(Quote::zero());
            }
            let prev_reward_debt = account.reward_debt;
            account.settle(acc_index);

            if let Err(err) = eng.custody.release(owner, token, pending) {
                if let Some(account) = eng.lp_accounts.get_mut(&(owner, token)) {
                    account.reward_debt = prev_reward_debt;
                }
                return Err(err.into());
            }
            eng.emit_event(EventPayload::FeesClaimed(FeesClaimedEvent {
                owner,
                token,
                amount: pending,
            }));

            Ok(pending)
        })
    }
}
