//! Margin ledger simulation.
//!
//! Walks the accounting engine through its main flows: opening and closing
//! leveraged positions, margin management, liquidations with bad debt, and the
//! LP fee lifecycle.

use margin_core::*;
use rust_decimal_macros::dec;

const USD: Token = Token(1);

fn main() {
    println!("Margin Core Engine Simulation");
    println!("Positions, Liquidations, Liquidity, One Logical Clock\n");

    scenario_1_position_lifecycle();
    scenario_2_margin_management();
    scenario_3_liquidation_with_bad_debt();
    scenario_4_large_position_tiers();
    scenario_5_lp_fee_lifecycle();

    println!("\nAll simulations completed successfully.");
}

fn setup(
    price: rust_decimal::Decimal,
) -> (Engine, SettableOracle, InMemoryCustody, BackstopFund) {
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

/// Open a 10x long, ride a 10% move, close.
fn scenario_1_position_lifecycle() {
    println!("Scenario 1: Position Lifecycle\n");

    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(1000)));

    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();
    let position = engine.get_position(id).unwrap();
    println!("  Opened {:?}: size {} @ entry {}", id, position.size, position.entry_price);

    engine.advance_seq(3);
    oracle.set_price(Price::new_unchecked(dec!(2200)), engine.current_seq());

    let result = engine.close_position(id, trader).unwrap();
    println!("  Closed at 2200: pnl {}, payout {}", result.pnl, result.payout);
    println!("  Wallet after: {}\n", custody.balance_of(trader, USD));
}

/// Margin top-up reduces leverage; removal is health-gated.
fn scenario_2_margin_management() {
    println!("Scenario 2: Margin Management\n");

    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let trader = OwnerId(1);
    custody.fund(trader, USD, Quote::new(dec!(500)));

    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();

    engine.add_margin(id, trader, Quote::new(dec!(100))).unwrap();
    let position = engine.get_position(id).unwrap();
    println!("  After top-up: collateral {}, leverage {}", position.collateral, position.leverage);

    engine.advance_seq(3);
    match engine.remove_margin(id, trader, Quote::new(dec!(150))) {
        Ok(()) => println!("  Removed 150 of margin"),
        Err(e) => println!("  Removal rejected: {e}"),
    }
    let position = engine.get_position(id).unwrap();
    println!("  Final: collateral {}, health {}\n",
        position.collateral,
        engine.health_factor(id).unwrap());
}

/// A deep drawdown produces bad debt; the backstop absorbs what it can.
fn scenario_3_liquidation_with_bad_debt() {
    println!("Scenario 3: Liquidation With Bad Debt\n");

    let (mut engine, oracle, custody, backstop) = setup(dec!(2000));
    let trader = OwnerId(1);
    let keeper = OwnerId(2);
    custody.fund(trader, USD, Quote::new(dec!(100)));
    backstop.deposit(USD, Quote::new(dec!(50)));

    let id = engine
        .open_position(trader, USD, Quote::new(dec!(100)), 10, Direction::Long)
        .unwrap();

    engine.advance_seq(1);
    oracle.set_price(Price::new_unchecked(dec!(1780)), engine.current_seq());
    println!("  Price gapped 2000 -> 1780, health {}", engine.health_factor(id).unwrap());

    let outcome = engine.liquidate(id, keeper).unwrap();
    println!("  Liquidated: bonus {}, refund {}, bad debt {} (backstop covered {})",
        outcome.bonus, outcome.trader_refund, outcome.bad_debt, outcome.covered_by_backstop);
    println!("  Keeper wallet: {}\n", custody.balance_of(keeper, USD));
}

/// Above the large-position threshold a call is capped at half the position
/// and pays the 10% tier.
fn scenario_4_large_position_tiers() {
    println!("Scenario 4: Large Position Liquidation\n");

    let (mut engine, oracle, custody, _) = setup(dec!(2000));
    let whale = OwnerId(1);
    let keeper = OwnerId(2);
    custody.fund(whale, USD, Quote::new(dec!(200_000)));

    let id = engine
        .open_position(whale, USD, Quote::new(dec!(200_000)), 20, Direction::Long)
        .unwrap();
    println!("  Whale position: size {}", engine.get_position(id).unwrap().size);

    engine.advance_seq(1);
    oracle.set_price(Price::new_unchecked(dec!(1880)), engine.current_seq());

    let first = engine.liquidate(id, keeper).unwrap();
    println!("  First call: fraction {}, bonus {} (10% tier)", first.fraction, first.bonus);

    let second = engine.liquidate(id, keeper).unwrap();
    println!("  Second call: fraction {}, remaining size {}\n",
        second.fraction,
        engine.get_position(id).unwrap().size);
}

/// Deposits, fee accrual through the per-share index, claims, withdrawal.
fn scenario_5_lp_fee_lifecycle() {
    println!("Scenario 5: LP Fee Lifecycle\n");

    let (mut engine, _oracle, custody, _) = setup(dec!(2000));
    let alice = OwnerId(10);
    let bob = OwnerId(11);
    custody.fund(alice, USD, Quote::new(dec!(1000)));
    custody.fund(bob, USD, Quote::new(dec!(1000)));

    engine.add_liquidity(alice, USD, Quote::new(dec!(600))).unwrap();
    engine.add_liquidity(bob, USD, Quote::new(dec!(400))).unwrap();

    // the trading-fee inflow lands in custody before it is booked
    custody.fund_vault(USD, Quote::new(dec!(100)));
    engine.deposit_fees(USD, Quote::new(dec!(100))).unwrap();
    println!("  Deposited 100 in fees: 70 to LPs, 30 to treasury");
    println!("  Alice pending: {}", engine.pending_fees(alice, USD));
    println!("  Bob pending: {}", engine.pending_fees(bob, USD));

    let claimed = engine.claim_fees(alice, USD).unwrap();
    println!("  Alice claimed {claimed}");

    engine.advance_seq(20);
    let result = engine.remove_liquidity(bob, USD, Quote::new(dec!(400))).unwrap();
    println!("  Bob withdrew {} (fees settled: {})", result.amount_out, result.fees_settled);
    println!("  Events recorded: {}", engine.events().len());
}
