//! End-to-end flows through the engine: the canonical accounting scenarios,
//! boundary-exact timing guards, and event-stream auditability.

use margin_core::*;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const USD: Token = Token(1);

fn setup(price: rust_decimal::Decimal) -> (Engine, SettableOracle, InMemoryCustody, BackstopFund) {
    let oracle = SettableOracle::with_price(Price::new_unchecked(price), SeqNo(0));
    let custody = InMemoryCustody::new();
    let backstop = BackstopFund::new();

    let engine = Engine::new(
        EngineParams::default(),
        Box::new(oracle.clone()),
        Box::new(custody.clone()),
        Box::new(backstop.clone()),
    );

    (engine, oracle, custody, backstop)
}

fn open_default_long(engine: &mut Engine, custody: &InMemoryCustody, owner: OwnerId) -> PositionId {
    custody.fund(owner, USD, Quote::new(dec!(100)));
    engine
        .open_position(owner, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap()
}

#[test]
fn scenario_a_long_close_at_profit() {
    // collateral 100, leverage 10 (size 1000), entry 2000, close at 2200:
    // pnl = 100, payout = 200
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);

    engine.advance_seq(3);
    oracle.set_price(Price::new_unchecked(dec!(2200)), engine.current_seq());

    let result = engine.close_position(id, trader).unwrap();
    assert_eq!(result.pnl.value(), dec!(100));
    assert_eq!(result.payout.value(), dec!(200));
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(200));
    assert_eq!(engine.get_position(id).unwrap().status, PositionStatus::Closed);
}

#[test]
fn scenario_b_health_factor_at_drawdown() {
    // collateral 100, size 1000, leverage 10, upnl -60:
    // required margin 100, health 0.4, liquidatable
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let id = open_default_long(&mut engine, &custody, OwnerId(1));

    oracle.set_price(Price::new_unchecked(dec!(1880)), SeqNo(1));
    assert_eq!(engine.health_factor(id).unwrap(), dec!(0.4));

    let keeper = OwnerId(2);
    assert!(engine.liquidate(id, keeper).is_ok());
}

#[test]
fn scenario_c_fee_split_seventy_thirty() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let lp = OwnerId(10);
    custody.fund(lp, USD, Quote::new(dec!(1000)));
    engine.add_liquidity(lp, USD, Quote::new(dec!(1000))).unwrap();

    custody.fund_vault(USD, Quote::new(dec!(100)));
    engine.deposit_fees(USD, Quote::new(dec!(100))).unwrap();

    let pool = engine.pool(USD).unwrap();
    assert_eq!(pool.acc_fee_per_share, dec!(70) * fee_precision() / dec!(1000));
    // treasury (OwnerId(0) in default params) got the 30
    assert_eq!(custody.balance_of(OwnerId(0), USD).value(), dec!(30));
    assert_eq!(engine.pending_fees(lp, USD).value(), dec!(70));
}

#[test]
fn scenario_d_liquidation_race_resolves_to_one_winner() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let id = open_default_long(&mut engine, &custody, OwnerId(1));
    oracle.set_price(Price::new_unchecked(dec!(1700)), SeqNo(1));

    let first = engine.liquidate(id, OwnerId(2));
    assert!(first.unwrap().fully_liquidated);

    // under the host's total order the second attempt arrives after the status
    // flip and observes a settled position
    let second = engine.liquidate(id, OwnerId(3));
    assert!(matches!(second, Err(EngineError::PositionNotLiquidatable(_))));
    assert_eq!(
        engine.get_position(id).unwrap().status,
        PositionStatus::Liquidated
    );
}

#[test]
fn hold_guard_is_boundary_exact_for_close() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);
    let min_hold = engine.params().min_hold;

    // at opened_at + min_hold (inclusive) the close fails
    engine.set_seq(SeqNo(min_hold));
    assert!(matches!(
        engine.close_position(id, trader),
        Err(EngineError::PositionTooNew { .. })
    ));

    // one tick later it succeeds
    engine.advance_seq(1);
    assert!(engine.close_position(id, trader).is_ok());
}

#[test]
fn hold_guard_is_boundary_exact_for_remove_margin() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(1000)));
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(500)), 2, Direction::Long)
        .unwrap();
    let min_hold = engine.params().min_hold;

    engine.set_seq(SeqNo(min_hold));
    assert!(matches!(
        engine.remove_margin(id, trader, Quote::new(dec!(10))),
        Err(EngineError::PositionTooNew { .. })
    ));

    engine.advance_seq(1);
    // past the hold the next guard to fire is the health check: removing 10
    // from a 2x position with no pnl leaves health 490/500 = 0.98
    assert!(matches!(
        engine.remove_margin(id, trader, Quote::new(dec!(10))),
        Err(EngineError::InsufficientHealthFactor { .. })
    ));
}

#[test]
fn cooldown_guard_is_boundary_exact_for_withdrawal() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let lp = OwnerId(10);
    custody.fund(lp, USD, Quote::new(dec!(500)));
    engine.add_liquidity(lp, USD, Quote::new(dec!(500))).unwrap();
    let cooldown = engine.params().cooldown;

    engine.set_seq(SeqNo(cooldown));
    assert!(matches!(
        engine.remove_liquidity(lp, USD, Quote::new(dec!(500))),
        Err(EngineError::CooldownNotPassed { .. })
    ));

    engine.advance_seq(1);
    let result = engine.remove_liquidity(lp, USD, Quote::new(dec!(500))).unwrap();
    assert_eq!(result.amount_out.value(), dec!(500));
}

#[test]
fn partial_close_keeps_hold_origin_and_invariant() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);

    engine.advance_seq(5);
    oracle.set_price(Price::new_unchecked(dec!(2100)), engine.current_seq());

    let result = engine.partial_close(id, trader, dec!(0.4)).unwrap();
    // closed slice: collateral 40, size 400, pnl = 400 * 0.05 = 20
    assert_eq!(result.pnl.value(), dec!(20));
    assert_eq!(result.payout.value(), dec!(60));

    let position = engine.get_position(id).unwrap();
    assert_eq!(position.status, PositionStatus::PartiallyClosed);
    assert_eq!(position.opened_at_seq, SeqNo(0)); // never reset
    assert_eq!(position.collateral.value(), dec!(60));
    assert_eq!(position.size.value(), dec!(600));
    // size == collateral * leverage still holds
    assert_eq!(
        position.size.value(),
        position.collateral.value() * position.leverage.value()
    );
}

#[test]
fn open_position_validation() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(1000)));

    assert!(matches!(
        engine.open_position(trader, USD, Quote::new(dec!(100)), 1, Direction::Long),
        Err(EngineError::InvalidLeverage { .. })
    ));
    assert!(matches!(
        engine.open_position(trader, USD, Quote::new(dec!(100)), 21, Direction::Long),
        Err(EngineError::InvalidLeverage { .. })
    ));
    assert!(matches!(
        engine.open_position(trader, USD, Quote::zero(), 10, Direction::Long),
        Err(EngineError::ZeroAmount)
    ));
    assert!(matches!(
        engine.open_position(trader, USD, Quote::new(dec!(1)), 2, Direction::Long),
        Err(EngineError::BelowMinimumSize { .. })
    ));
    assert!(matches!(
        engine.open_position(trader, Token(9), Quote::new(dec!(100)), 10, Direction::Long),
        Err(EngineError::TokenNotSupported(_))
    ));
    // no state leaked from the rejected attempts
    assert_eq!(engine.events().len(), 0);
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(1000));
}

#[test]
fn close_requires_owner_and_live_status() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);
    engine.advance_seq(3);

    assert!(matches!(
        engine.close_position(id, OwnerId(99)),
        Err(EngineError::Unauthorized)
    ));
    assert!(matches!(
        engine.close_position(PositionId(42), trader),
        Err(EngineError::PositionNotFound(_))
    ));

    engine.close_position(id, trader).unwrap();
    assert!(matches!(
        engine.close_position(id, trader),
        Err(EngineError::PositionNotOpen(_))
    ));
}

#[test]
fn oracle_failure_aborts_without_mutation() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);
    engine.advance_seq(3);

    oracle.pause();
    assert!(matches!(
        engine.close_position(id, trader),
        Err(EngineError::PriceUnavailable(_))
    ));
    // position untouched, no payout happened
    assert!(engine.get_position(id).unwrap().is_live());
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(0));

    oracle.resume();
    assert!(engine.close_position(id, trader).is_ok());
}

#[test]
fn underwater_close_pays_zero_not_negative() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader);
    engine.advance_seq(3);
    // -15% move on 1000 notional: pnl -150, beyond the 100 collateral
    oracle.set_price(Price::new_unchecked(dec!(1700)), engine.current_seq());

    let result = engine.close_position(id, trader).unwrap();
    assert_eq!(result.pnl.value(), dec!(-150));
    assert!(result.payout.is_zero());
    // the shortfall was not drawn from the trader's wallet
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(0));
}

#[test]
fn add_margin_reduces_leverage_under_default_policy() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(1100)));
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();

    engine.add_margin(id, trader, Quote::new(dec!(100))).unwrap();
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.collateral.value(), dec!(200));
    assert_eq!(position.size.value(), dec!(1000)); // unchanged
    assert_eq!(position.leverage.value(), dec!(5)); // re-derived

    // a large top-up cannot push stored leverage below the admission minimum
    engine.add_margin(id, trader, Quote::new(dec!(800))).unwrap();
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.collateral.value(), dec!(1000));
    assert_eq!(position.size.value(), dec!(1000));
    assert_eq!(position.leverage.value(), dec!(2)); // clamped
}

#[test]
fn add_margin_grows_size_under_increase_size_policy() {
    let oracle = SettableOracle::with_price(Price::new_unchecked(dec!(2000)), SeqNo(0));
    let custody = InMemoryCustody::new();
    let params = EngineParams {
        top_up_policy: MarginTopUpPolicy::IncreaseSize,
        ..EngineParams::default()
    };
    let mut engine = Engine::new(
        params,
        Box::new(oracle),
        Box::new(custody.clone()),
        Box::new(BackstopFund::new()),
    );

    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(300)));
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();

    engine.add_margin(id, trader, Quote::new(dec!(100))).unwrap();
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.size.value(), dec!(2000)); // recomputed
    assert_eq!(position.leverage.value(), dec!(10)); // unchanged
}

#[test]
fn remove_margin_respects_health_threshold() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(300)));
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(200)), 10, Direction::Long)
        .unwrap();
    engine.advance_seq(3);

    // size 2000, required margin 200. at 1900 the pnl is -100, so removing 10
    // leaves health (190 - 100) / 200 = 0.45, below the 1.5 threshold
    oracle.set_price(Price::new_unchecked(dec!(1900)), engine.current_seq());
    assert!(matches!(
        engine.remove_margin(id, trader, Quote::new(dec!(10))),
        Err(EngineError::InsufficientHealthFactor { .. })
    ));

    // whole-collateral removal is an InsufficientMargin, checked first
    assert!(matches!(
        engine.remove_margin(id, trader, Quote::new(dec!(200))),
        Err(EngineError::InsufficientMargin { .. })
    ));

    // with profit on the books the same removal clears the threshold:
    // (190 + 200) / 200 = 1.95
    oracle.set_price(Price::new_unchecked(dec!(2200)), engine.current_seq());
    engine.remove_margin(id, trader, Quote::new(dec!(10))).unwrap();
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.collateral.value(), dec!(190));
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(110));
}

#[test]
fn margin_removal_cannot_over_lever_the_position() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    let id = open_default_long(&mut engine, &custody, trader); // 100 at 10x
    engine.advance_seq(3);
    // deep in profit, so the health gate alone would wave the removal through
    oracle.set_price(Price::new_unchecked(dec!(3000)), engine.current_seq());

    // removing 80 would re-derive leverage to 1000 / 20 = 50
    assert!(matches!(
        engine.remove_margin(id, trader, Quote::new(dec!(80))),
        Err(EngineError::InvalidLeverage { .. })
    ));
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.collateral.value(), dec!(100));
    assert_eq!(position.leverage.value(), dec!(10));
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(0));

    // removal up to exactly the maximum is allowed
    engine.remove_margin(id, trader, Quote::new(dec!(50))).unwrap();
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.leverage.value(), dec!(20));
    assert_eq!(position.size.value(), dec!(1000));
    assert_eq!(custody.balance_of(trader, USD).value(), dec!(50));
}

#[test]
fn partial_close_cannot_leave_dust_remainder() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(3)));

    // size 10, admitted exactly at the minimum notional
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(1)), 10, Direction::Long)
        .unwrap();
    engine.advance_seq(3);

    assert!(matches!(
        engine.partial_close(id, trader, dec!(0.5)),
        Err(EngineError::BelowMinimumSize { .. })
    ));
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.size.value(), dec!(10));
    assert_eq!(position.status, PositionStatus::Open);

    // closing down to exactly the minimum is allowed
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(2)), 10, Direction::Long)
        .unwrap();
    engine.advance_seq(3);
    engine.partial_close(id, trader, dec!(0.5)).unwrap();
    assert_eq!(engine.get_position(id).unwrap().size.value(), dec!(10));
}

#[test]
fn event_stream_reconstructs_wallet_flows() {
    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(500)));

    let id = engine
        .open_position(trader, USD, Quote::new(dec!(200)), 10, Direction::Long)
        .unwrap();
    engine.advance_seq(3);
    oracle.set_price(Price::new_unchecked(dec!(2100)), engine.current_seq());
    engine.partial_close(id, trader, dec!(0.5)).unwrap();
    engine.advance_seq(1);
    engine.close_position(id, trader).unwrap();

    // replay wallet deltas from the events alone
    let mut delta = Quote::zero();
    for event in engine.events() {
        match &event.payload {
            EventPayload::PositionOpened(e) => delta = delta.sub(e.collateral),
            EventPayload::PositionPartiallyClosed(e) => delta = delta.add(e.payout),
            EventPayload::PositionClosed(e) => delta = delta.add(e.payout),
            _ => {}
        }
    }

    let expected = custody.balance_of(trader, USD).sub(Quote::new(dec!(500)));
    assert_eq!(delta, expected);
}

// delegates to the in-memory ledger but can be told to refuse payouts,
// standing in for a custody backend with an internal fault
#[derive(Clone)]
struct RefusingCustody {
    inner: InMemoryCustody,
    refuse_release: Arc<AtomicBool>,
}

impl CustodyPort for RefusingCustody {
    fn reserve(
        &mut self,
        owner: OwnerId,
        token: Token,
        amount: Quote,
    ) -> Result<(), CustodyError> {
        self.inner.reserve(owner, token, amount)
    }

    fn release(
        &mut self,
        owner: OwnerId,
        token: Token,
        amount: Quote,
    ) -> Result<(), CustodyError> {
        if self.refuse_release.load(Ordering::SeqCst) {
            return Err(CustodyError::InsufficientBalance {
                requested: amount,
                available: Quote::zero(),
            });
        }
        self.inner.release(owner, token, amount)
    }
}

fn setup_refusing(
    price: rust_decimal::Decimal,
) -> (Engine, SettableOracle, InMemoryCustody, Arc<AtomicBool>) {
    let oracle = SettableOracle::with_price(Price::new_unchecked(price), SeqNo(0));
    let custody = InMemoryCustody::new();
    let refuse = Arc::new(AtomicBool::new(false));
    let port = RefusingCustody {
        inner: custody.clone(),
        refuse_release: refuse.clone(),
    };

    let engine = Engine::new(
        EngineParams::default(),
        Box::new(oracle.clone()),
        Box::new(port),
        Box::new(BackstopFund::new()),
    );

    (engine, oracle, custody, refuse)
}

#[test]
fn failed_payout_leaves_the_position_open() {
    let (mut engine, _oracle, custody, refuse) = setup_refusing(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(100)));
    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();
    engine.advance_seq(3);

    refuse.store(true, Ordering::SeqCst);
    assert!(matches!(
        engine.close_position(id, trader),
        Err(EngineError::InsufficientBalance { .. })
    ));
    // the status change rolled back with the failed payout
    let position = engine.get_position(id).unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.collateral.value(), dec!(100));

    refuse.store(false, Ordering::SeqCst);
    assert!(engine.close_position(id, trader).is_ok());
}

#[test]
fn failed_withdrawal_leaves_shares_intact() {
    let (mut engine, _oracle, custody, refuse) = setup_refusing(dec!(2000));
    let lp = OwnerId(10);
    custody.fund(lp, USD, Quote::new(dec!(500)));
    engine.add_liquidity(lp, USD, Quote::new(dec!(500))).unwrap();
    engine.advance_seq(20);

    refuse.store(true, Ordering::SeqCst);
    assert!(matches!(
        engine.remove_liquidity(lp, USD, Quote::new(dec!(500))),
        Err(EngineError::InsufficientBalance { .. })
    ));
    // shares and pool totals rolled back
    assert_eq!(engine.lp_account(lp, USD).unwrap().shares.value(), dec!(500));
    let pool = engine.pool(USD).unwrap();
    assert_eq!(pool.total_shares.value(), dec!(500));
    assert_eq!(pool.total_assets.value(), dec!(500));

    refuse.store(false, Ordering::SeqCst);
    let result = engine.remove_liquidity(lp, USD, Quote::new(dec!(500))).unwrap();
    assert_eq!(result.amount_out.value(), dec!(500));
}

#[test]
fn events_serialize_for_indexers() {
    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    open_default_long(&mut engine, &custody, trader);

    let json = serde_json::to_string(engine.events()).unwrap();
    assert!(json.contains("PositionOpened"));

    let parsed: Vec<Event> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), engine.events().len());
}
