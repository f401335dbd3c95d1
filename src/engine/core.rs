// 8.0 engine/core.rs: main engine. holds the position arena, per-token pools,
// LP accounts, the logical clock, the reentrancy guard, and the event log.
// the ports (oracle, custody, backstop) are injected and owned here.

use super::results::EngineError;
use crate::backstop::BackstopPort;
use crate::config::EngineParams;
use crate::custody::CustodyPort;
use crate::events::{Event, EventId, EventPayload};
use crate::health;
use crate::oracle::{PriceOracle, PriceQuote};
use crate::pool::{LpAccount, PoolState};
use crate::position::Position;
use crate::types::{OwnerId, PositionId, Quote, SeqNo, Token};
use rust_decimal::Decimal;
use std::collections::HashMap;

/** 8.1: all engine state lives here. one instance per deployment. */
pub struct Engine {
    pub(super) params: EngineParams,
    pub(super) oracle: Box<dyn PriceOracle>,
    pub(super) custody: Box<dyn CustodyPort>,
    pub(super) backstop: Box<dyn BackstopPort>,
    // arena keyed by opaque handles. ids are monotone and never reused, so a
    // terminal position stays addressable forever.
    pub(super) positions: HashMap<PositionId, Position>,
    pub(super) next_position_id: u64,
    pub(super) pools: HashMap<Token, PoolState>,
    pub(super) lp_accounts: HashMap<(OwnerId, Token), LpAccount>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_seq: SeqNo,
    // in-progress flag. set at entry of every mutating operation, cleared on
    // every exit path, success or failure.
    pub(super) op_in_progress: bool,
}

impl Engine {
    pub fn new(
        params: EngineParams,
        oracle: Box<dyn PriceOracle>,
        custody: Box<dyn CustodyPort>,
        backstop: Box<dyn BackstopPort>,
    ) -> Self {
        Self {
            params,
            oracle,
            custody,
            backstop,
            positions: HashMap::new(),
            next_position_id: 1,
            pools: HashMap::new(),
            lp_accounts: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_seq: SeqNo::zero(),
            op_in_progress: false,
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    // the host advances the clock; the engine never reads wall time
    pub fn set_seq(&mut self, seq: SeqNo) {
        debug_assert!(seq >= self.current_seq);
        self.current_seq = seq;
    }

    pub fn advance_seq(&mut self, ticks: u64) {
        self.current_seq = self.current_seq.plus(ticks);
    }

    pub fn current_seq(&self) -> SeqNo {
        self.current_seq
    }

    pub fn get_position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = (&PositionId, &Position)> {
        self.positions.iter()
    }

    pub fn pool(&self, token: Token) -> Option<&PoolState> {
        self.pools.get(&token)
    }

    pub fn lp_account(&self, owner: OwnerId, token: Token) -> Option<&LpAccount> {
        self.lp_accounts.get(&(owner, token))
    }

    /// Health factor of a live position at the current oracle price.
    pub fn health_factor(&self, id: PositionId) -> Result<Decimal, EngineError> {
        let position = self
            .positions
            .get(&id)
            .ok_or(EngineError::PositionNotFound(id))?;
        let quote = self.read_price()?;
        Ok(health::compute_health_factor(position, quote.value))
    }

    /// Fees claimable right now, without settling anything.
    pub fn pending_fees(&self, owner: OwnerId, token: Token) -> Quote {
        match (self.lp_accounts.get(&(owner, token)), self.pools.get(&token)) {
            (Some(account), Some(pool)) => account.pending_fees(pool.acc_fee_per_share),
            _ => Quote::zero(),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub(super) fn read_price(&self) -> Result<PriceQuote, EngineError> {
        Ok(self.oracle.validated_price()?)
    }

    // seq strictly greater than origin + window. the boundary itself fails.
    pub(super) fn window_elapsed(&self, origin: SeqNo, window: u64) -> bool {
        self.current_seq > origin.plus(window)
    }

    // 8.2: the reentrancy guard. every mutating entry point runs its body
    // through here so the flag is cleared on all exit paths, including errors.
    pub(super) fn guarded<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.op_in_progress {
            return Err(EngineError::ReentrantCall);
        }
        self.op_in_progress = true;
        let result = body(self);
        self.op_in_progress = false;
        result
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_seq, payload);
        self.next_event_id += 1;

        if self.params.verbose {
            println!("[event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.params.max_events {
            let drain_count = self.events.len() - self.params.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("positions", &self.positions.len())
            .field("pools", &self.pools.len())
            .field("lp_accounts", &self.lp_accounts.len())
            .field("events", &self.events.len())
            .field("current_seq", &self.current_seq)
            .finish()
    }
}
