// 10.1 custody.rs: the collateral custody port. the engine never touches token
// transfers itself, it only issues reserve/release instructions and treats a
// failed reserve as InsufficientBalance. the in-memory ledger here is just
// balance changes, enough for the sim and tests.

use crate::types::{OwnerId, Quote, Token};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CustodyError {
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Quote, available: Quote },
}

pub trait CustodyPort: Send + Sync {
    // move funds from the owner's wallet into engine custody. the validating
    // direction: fails when the wallet cannot cover the amount.
    fn reserve(&mut self, owner: OwnerId, token: Token, amount: Quote)
        -> Result<(), CustodyError>;

    // pay funds out of engine custody to the owner's wallet. amounts are
    // funds the engine already holds, so a failure signals an implementation
    // fault; the engine rolls the triggering operation's ledger change back.
    fn release(&mut self, owner: OwnerId, token: Token, amount: Quote)
        -> Result<(), CustodyError>;
}

// cloneable in-memory balance ledger. a test keeps one handle to fund wallets
// and inspect balances while the engine holds the other.
#[derive(Debug, Clone)]
pub struct InMemoryCustody {
    state: Arc<Mutex<CustodyState>>,
}

#[derive(Debug, Default)]
struct CustodyState {
    wallets: HashMap<(OwnerId, Token), Decimal>,
    // net amount currently held by the engine, per token
    vault: HashMap<Token, Decimal>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CustodyState::default())),
        }
    }

    pub fn fund(&self, owner: OwnerId, token: Token, amount: Quote) {
        let mut state = self.state.lock().unwrap();
        *state.wallets.entry((owner, token)).or_default() += amount.value();
    }

    // credits the vault directly, modeling an external inflow such as trading
    // fees collected upstream of deposit_fees
    pub fn fund_vault(&self, token: Token, amount: Quote) {
        let mut state = self.state.lock().unwrap();
        *state.vault.entry(token).or_default() += amount.value();
    }

    pub fn balance_of(&self, owner: OwnerId, token: Token) -> Quote {
        let state = self.state.lock().unwrap();
        Quote::new(
            state
                .wallets
                .get(&(owner, token))
                .copied()
                .unwrap_or(Decimal::ZERO),
        )
    }

    pub fn vault_balance(&self, token: Token) -> Quote {
        let state = self.state.lock().unwrap();
        Quote::new(state.vault.get(&token).copied().unwrap_or(Decimal::ZERO))
    }
}

impl Default for InMemoryCustody {
    fn default() -> Self {
        Self::new()
    }
}

impl CustodyPort for InMemoryCustody {
    fn reserve(
        &mut self,
        owner: OwnerId,
        token: Token,
        amount: Quote,
    ) -> Result<(), CustodyError> {
        let mut state = self.state.lock().unwrap();
        let wallet = state.wallets.entry((owner, token)).or_default();
        if *wallet < amount.value() {
            return Err(CustodyError::InsufficientBalance {
                requested: amount,
                available: Quote::new(*wallet),
            });
        }
        *wallet -= amount.value();
        *state.vault.entry(token).or_default() += amount.value();
        Ok(())
    }

    fn release(
        &mut self,
        owner: OwnerId,
        token: Token,
        amount: Quote,
    ) -> Result<(), CustodyError> {
        let mut state = self.state.lock().unwrap();
        *state.vault.entry(token).or_default() -= amount.value();
        *state.wallets.entry((owner, token)).or_default() += amount.value();
        Ok(())
    }
}
