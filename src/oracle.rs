// 10.0 oracle.rs: the reference price port. validation (staleness, deviation,
// aggregation) happens upstream; the engine trusts what comes back and fails
// closed when the call errors or the feed is paused.

use crate::types::{Price, SeqNo};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// a validated price and the sequence it became effective at. immutable,
// produced externally, read-only to the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceQuote {
    pub value: Price,
    pub source_seq: SeqNo,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("oracle has no price available")]
    Unavailable,

    #[error("oracle feed is paused")]
    Paused,
}

pub trait PriceOracle: Send + Sync {
    fn validated_price(&self) -> Result<PriceQuote, OracleError>;
}

// in-memory oracle for the sim and tests. the handle is cloneable so a test can
// keep moving the price after the engine takes its copy.
#[derive(Debug, Clone)]
pub struct SettableOracle {
    state: Arc<Mutex<OracleState>>,
}

#[derive(Debug)]
struct OracleState {
    quote: Option<PriceQuote>,
    paused: bool,
}

impl SettableOracle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OracleState {
                quote: None,
                paused: false,
            })),
        }
    }

    pub fn with_price(price: Price, seq: SeqNo) -> Self {
        let oracle = Self::new();
        oracle.set_price(price, seq);
        oracle
    }

    pub fn set_price(&self, price: Price, seq: SeqNo) {
        let mut state = self.state.lock().unwrap();
        state.quote = Some(PriceQuote {
            value: price,
            source_seq: seq,
        });
    }

    pub fn pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().unwrap().paused = false;
    }
}

impl Default for SettableOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceOracle for SettableOracle {
    fn validated_price(&self) -> Result<PriceQuote, OracleError> {
        let state = self.state.lock().unwrap();
        if state.paused {
            return Err(OracleError::Paused);
        }
        state.quote.ok_or(OracleError::Unavailable)
    }
}
