use lotledger::{
    Decimal, Direction, EngineConfig, LotEngine, NoPrices, RawEvent, Symbol, TransferPool,
};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn event(action: &str, instrument: &str, qty: f64, price: Option<f64>, time_ms: i64) -> RawEvent {
    RawEvent {
        time_ms,
        action: action.to_string(),
        instrument: instrument.to_string(),
        direction: None,
        quantity: Some(qty),
        unit_price: price,
        price_currency: Some("USDT".to_string()),
        fee_amount: None,
        fee_currency: None,
        leverage: None,
        swap_from: None,
        swap_to: None,
    }
}

#[test]
fn test_cost_basis_survives_cross_account_transfer() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    // Account A buys 1 BTC at 50,000 and withdraws it.
    let report_a = engine.compute_with_pool(
        &[
            event("BUY", "BTC", 1.0, Some(50000.0), 1000),
            event("WITHDRAWAL", "BTC", 1.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );
    assert!(report_a.positions.is_empty());
    assert_eq!(report_a.realized_pnl, Decimal::zero());
    assert_eq!(pool.pending_quantity(&Symbol::new("BTC")), d("1"));

    // Account B deposits the same 1 BTC and inherits the cost.
    let report_b = engine.compute_with_pool(
        &[event("DEPOSIT", "BTC", 1.0, None, 3000)],
        &NoPrices,
        &mut pool,
    );
    let btc = report_b
        .position(&Symbol::new("BTC"), Direction::Long)
        .unwrap();
    assert_eq!(btc.quantity, d("1"));
    assert_eq!(btc.notional_open, d("50000"));
    assert_eq!(btc.invested, d("50000"));
    assert!(pool.is_empty());
}

#[test]
fn test_partial_deposit_splits_the_fragment() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    engine.compute_with_pool(
        &[
            event("BUY", "BTC", 2.0, Some(40000.0), 1000),
            event("WITHDRAWAL", "BTC", 2.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );

    let report = engine.compute_with_pool(
        &[event("DEPOSIT", "BTC", 0.5, None, 3000)],
        &NoPrices,
        &mut pool,
    );
    let btc = report
        .position(&Symbol::new("BTC"), Direction::Long)
        .unwrap();
    assert_eq!(btc.quantity, d("0.5"));
    assert_eq!(btc.notional_open, d("20000"));
    // The rest stays parked for the next deposit.
    assert_eq!(pool.pending_quantity(&Symbol::new("BTC")), d("1.5"));
}

#[test]
fn test_deposit_beyond_pool_opens_at_zero_cost() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    engine.compute_with_pool(
        &[
            event("BUY", "BTC", 1.0, Some(50000.0), 1000),
            event("WITHDRAWAL", "BTC", 1.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );

    // 3 BTC deposited, only 1 has a known origin.
    let report = engine.compute_with_pool(
        &[event("DEPOSIT", "BTC", 3.0, None, 3000)],
        &NoPrices,
        &mut pool,
    );
    let btc = report
        .position(&Symbol::new("BTC"), Direction::Long)
        .unwrap();
    assert_eq!(btc.quantity, d("3"));
    assert_eq!(btc.notional_open, d("50000"));
}

#[test]
fn test_deposit_with_no_pool_history_is_free_basis() {
    let engine = LotEngine::new(EngineConfig::default());
    let report = engine.compute(&[event("DEPOSIT", "ETH", 5.0, None, 1000)], &NoPrices);
    let eth = report
        .position(&Symbol::new("ETH"), Direction::Long)
        .unwrap();
    assert_eq!(eth.quantity, d("5"));
    assert_eq!(eth.invested, Decimal::zero());
}

#[test]
fn test_same_instant_withdraw_then_redeposit() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    // Deposit listed before withdrawal at the same timestamp; the ordering
    // tie-break must process the withdrawal first so cost can be inherited.
    let report = engine.compute_with_pool(
        &[
            event("BUY", "BTC", 1.0, Some(50000.0), 1000),
            event("DEPOSIT", "BTC", 1.0, None, 2000),
            event("WITHDRAWAL", "BTC", 1.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );

    let btc = report
        .position(&Symbol::new("BTC"), Direction::Long)
        .unwrap();
    assert_eq!(btc.quantity, d("1"));
    assert_eq!(btc.notional_open, d("50000"));
    assert!(pool.is_empty());
}

#[test]
fn test_transfers_inherit_fifo_across_withdrawals() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    engine.compute_with_pool(
        &[
            event("BUY", "BTC", 1.0, Some(30000.0), 1000),
            event("WITHDRAWAL", "BTC", 1.0, None, 2000),
            event("BUY", "BTC", 1.0, Some(60000.0), 3000),
            event("WITHDRAWAL", "BTC", 1.0, None, 4000),
        ],
        &NoPrices,
        &mut pool,
    );

    // The first deposit drains the older (30,000) fragment first.
    let report = engine.compute_with_pool(
        &[event("DEPOSIT", "BTC", 1.0, None, 5000)],
        &NoPrices,
        &mut pool,
    );
    let btc = report
        .position(&Symbol::new("BTC"), Direction::Long)
        .unwrap();
    assert_eq!(btc.notional_open, d("30000"));
    assert_eq!(pool.pending_quantity(&Symbol::new("BTC")), d("1"));
}

#[test]
fn test_stable_transfers_move_cash_not_pool() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    let report = engine.compute_with_pool(
        &[
            event("DEPOSIT", "USDT", 1000.0, None, 1000),
            event("WITHDRAWAL", "USDT", 400.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );

    assert!(report.positions.is_empty());
    assert_eq!(report.cash.get(&Symbol::new("USDT")), Some(&d("600")));
    assert!(pool.is_empty());
}

#[test]
fn test_over_withdrawal_caps_at_open_quantity() {
    let engine = LotEngine::new(EngineConfig::default());
    let mut pool = TransferPool::new();

    let report = engine.compute_with_pool(
        &[
            event("BUY", "BTC", 1.0, Some(50000.0), 1000),
            event("WITHDRAWAL", "BTC", 2.0, None, 2000),
        ],
        &NoPrices,
        &mut pool,
    );

    assert!(report.positions.is_empty());
    assert_eq!(report.caveats.len(), 1);
    // Only what was actually held reaches the pool.
    assert_eq!(pool.pending_quantity(&Symbol::new("BTC")), d("1"));
}
