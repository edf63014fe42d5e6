//! Perpetual venue core simulation.
//!
//! Walks the full engine lifecycle: listing, a market open/close round trip,
//! a limit fill promoted by an executor sweep, a stop-loss touch, a
//! liquidation, and a cancel refund.

use perps_venue::*;

const ADMIN: AccountId = AccountId(1);
const EXECUTOR: AccountId = AccountId(2);
const ALICE: AccountId = AccountId(10);
const ETH: AssetIndex = AssetIndex(7);

fn usd(v: u128) -> Usd {
    Usd::new(v)
}

fn price(v: u128) -> Price {
    Price::new(v).expect("positive price")
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("Perpetual Venue Core Simulation");
    println!("Oracle-priced fills, bucketed triggers, atomic sweeps\n");

    scenario_1_open_close();
    scenario_2_limit_fill_and_stop();
    scenario_3_liquidation();
    scenario_4_cancel_refund();

    println!("\nAll simulations completed successfully.");
}

fn make_venue() -> Engine<InMemoryStorage, InMemoryVault, StaticOracle> {
    let mut vault = InMemoryVault::new();
    vault.credit_wallet(ALICE, usd(1_000_000_000));
    vault.fund_pool(usd(10_000_000_000));

    let mut engine = Engine::new(
        EngineConfig::new(ADMIN, EXECUTOR),
        InMemoryStorage::new(),
        vault,
        StaticOracle::new(),
    );
    engine
        .list_asset(ADMIN, ETH, 1_000_000, 0)
        .expect("fresh listing");
    engine.set_market_open(ADMIN, 0, true).expect("admin");
    engine
}

fn register(engine: &mut Engine<InMemoryStorage, InMemoryVault, StaticOracle>, proof: &[u8], p: u128) {
    engine
        .oracle_mut()
        .register(proof.to_vec(), vec![PriceAssertion::new(ETH, p)]);
}

/// Open a leveraged long, close it into a rally.
fn scenario_1_open_close() {
    println!("Scenario 1: Long Open and Close\n");

    let mut engine = make_venue();
    register(&mut engine, b"t0", 2_000_000_000);
    register(&mut engine, b"t1", 2_200_000_000);

    let id = engine
        .open_position(
            ALICE,
            ETH,
            b"t0",
            Side::Long,
            10,
            usd(100_000_000),
            None,
            None,
        )
        .expect("open");
    let open = engine.open(id).expect("live");
    println!(
        "  opened {:?}: 10x long at {}, liquidation at {}",
        id, open.open_price, open.liquidation_price
    );

    let pnl = engine.close_position(ALICE, id, b"t1").expect("close");
    println!("  closed at 2200.000000, realized pnl {}", pnl);
    println!("  wallet balance {}\n", engine.vault().wallet_balance(ALICE));
}

/// Park a limit order, promote it by sweep, stop it out.
fn scenario_2_limit_fill_and_stop() {
    println!("Scenario 2: Limit Fill and Stop-Loss Touch\n");

    let mut engine = make_venue();
    let order_id = engine
        .place_order(
            ALICE,
            ETH,
            Side::Long,
            5,
            price(1_950_000_000),
            usd(50_000_000),
            Some(price(1_900_000_000)),
            Some(price(2_100_000_000)),
        )
        .expect("place");
    println!("  parked order {:?} at 1950.000000", order_id);

    register(&mut engine, b"near", 1_950_100_000);
    let fills = engine.execute_orders(EXECUTOR, b"near").expect("sweep");
    let open_id = fills.promoted[0].open_id;
    println!(
        "  promoted to {:?} at {}",
        open_id,
        engine.open(open_id).expect("live").open_price
    );

    register(&mut engine, b"dip", 1_900_050_000);
    let closes = engine.close_all_on_targets(EXECUTOR, b"dip").expect("sweep");
    println!(
        "  stop touched at 1900.050000, realized pnl {}\n",
        closes.closed[0].pnl
    );
}

/// A short blown through its liquidation price.
fn scenario_3_liquidation() {
    println!("Scenario 3: Short Liquidation\n");

    let mut engine = make_venue();
    register(&mut engine, b"t0", 2_000_000_000);
    let id = engine
        .open_position(
            ALICE,
            ETH,
            b"t0",
            Side::Short,
            10,
            usd(100_000_000),
            None,
            None,
        )
        .expect("open");
    println!(
        "  opened {:?}: 10x short, liquidation at {}",
        id,
        engine.open(id).expect("live").liquidation_price
    );

    register(&mut engine, b"pump", 2_200_500_000);
    let report = engine.liquidate_positions(EXECUTOR, b"pump").expect("sweep");
    println!(
        "  liquidated {} position(s), trader pnl {}\n",
        report.liquidated.len(),
        engine.trader_total_pnl(ALICE)
    );
}

/// Cancel returns the margin exactly.
fn scenario_4_cancel_refund() {
    println!("Scenario 4: Cancel Refund\n");

    let mut engine = make_venue();
    let before = engine.vault().wallet_balance(ALICE);
    let order_id = engine
        .place_order(
            ALICE,
            ETH,
            Side::Long,
            5,
            price(1_950_000_000),
            usd(10_000_000),
            None,
            None,
        )
        .expect("place");
    engine.cancel_order(ALICE, order_id).expect("cancel");

    let after = engine.vault().wallet_balance(ALICE);
    println!("  wallet before {}, after {}: net zero", before, after);
    assert_eq!(before, after);
}
