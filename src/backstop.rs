// 10.2 backstop.rs: reserve that may absorb shortfall from under-collateralized
// liquidations. strictly advisory: the engine reports bad debt here best-effort
// and a failure never blocks the liquidation that produced it.

use crate::types::{OwnerId, Quote, Token};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackstopError {
    #[error("backstop reserve is depleted")]
    Depleted,
}

pub trait BackstopPort: Send + Sync {
    // returns the amount actually covered, which may be less than requested
    fn cover_bad_debt(
        &mut self,
        token: Token,
        amount: Quote,
        recipient: OwnerId,
    ) -> Result<Quote, BackstopError>;
}

// in-memory backstop fund. covers min(balance, debt), like an insurance fund.
#[derive(Debug, Clone)]
pub struct BackstopFund {
    state: Arc<Mutex<FundState>>,
}

#[derive(Debug, Default)]
struct FundState {
    balances: HashMap<Token, Decimal>,
    total_covered: Decimal,
}

impl BackstopFund {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FundState::default())),
        }
    }

    pub fn deposit(&self, token: Token, amount: Quote) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(token).or_default() += amount.value();
    }

    pub fn balance(&self, token: Token) -> Quote {
        let state = self.state.lock().unwrap();
        Quote::new(state.balances.get(&token).copied().unwrap_or(Decimal::ZERO))
    }

    pub fn total_covered(&self) -> Quote {
        Quote::new(self.state.lock().unwrap().total_covered)
    }
}

impl Default for BackstopFund {
    fn default() -> Self {
        Self::new()
    }
}

impl BackstopPort for BackstopFund {
    fn cover_bad_debt(
        &mut self,
        token: Token,
        amount: Quote,
        _recipient: OwnerId,
    ) -> Result<Quote, BackstopError> {
        let mut state = self.state.lock().unwrap();
        let balance = state.balances.entry(token).or_default();
        if balance.is_zero() {
            return Err(BackstopError::Depleted);
        }
        let covered = amount.value().min(*balance);
        *balance -= covered;
        state.total_covered += covered;
        Ok(Quote::new(covered))
    }
}
