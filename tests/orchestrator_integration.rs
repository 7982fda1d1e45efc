//! Full arbitrage runs and their failure paths

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use triarb::common::types::{AssetPair, Exchange, Side};
use triarb::config::types::TradingConfig;
use triarb::execution::{ArbitrageOrchestrator, Execution, LegRole, RunStatus};
use triarb::reporting::BalanceLedger;
use triarb::strategy::{Direction, Triangle};

struct Harness {
    mock: Arc<MockExchange>,
    notifier: Arc<RecordingNotifier>,
    ledger: Arc<BalanceLedger>,
    orchestrator: ArbitrageOrchestrator,
    _dir: TempDir,
}

async fn harness(mock: MockExchange, trading: TradingConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mock = shared(mock);
    let notifier = Arc::new(RecordingNotifier::new());
    let ledger = Arc::new(BalanceLedger::open(dir.path().join("balance.csv")).await.unwrap());
    let orchestrator =
        ArbitrageOrchestrator::new(mock.clone(), &trading, ledger.clone(), notifier.clone());

    Harness {
        mock,
        notifier,
        ledger,
        orchestrator,
        _dir: dir,
    }
}

fn triangle() -> Triangle {
    Triangle::new("ETH", "BTC", "ALT")
}

/// Market where backward amounts divide exactly:
/// 8 ETH -> 0.4 BTC -> 1000 ALT -> 10 ETH
fn backward_market() -> MockExchange {
    MockExchange::new(Exchange::Binance)
        .with_balance("ETH", dec!(10))
        .with_ticker(eth_btc(), dec!(0.05), dec!(0.05))
        .with_ticker(alt_btc(), dec!(0.0004), dec!(0.0004))
        .with_ticker(alt_eth(), dec!(0.01), dec!(0.01))
        .with_book(book(eth_btc(), &ladder(dec!(0.05), dec!(-0.001), 20, dec!(1000)), &[]))
        .with_book(book(alt_btc(), &[], &ladder(dec!(0.0004), dec!(0.00001), 20, dec!(100000))))
        .with_book(book(alt_eth(), &ladder(dec!(0.01), dec!(-0.0001), 20, dec!(100000)), &[]))
}

// ============================================================================
// Forward
// ============================================================================

#[tokio::test]
async fn test_forward_completes_and_measures_from_balances() {
    let mock = triangle_market()
        .with_rule(alt_eth(), Side::Buy, FillRule::Always)
        .with_rule(alt_btc(), Side::Sell, FillRule::Always);
    // Closing leg buys ETH cheaper than the triangle implies
    mock.set_ticker(eth_btc(), dec!(0.0399), dec!(0.04));
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.legs.len(), 3);
    assert!(run.legs.iter().all(|leg| leg.filled));
    // 8 ETH -> 800 ALT -> 0.4 BTC -> 10 ETH
    assert_eq!(run.balance_before, dec!(10));
    assert_eq!(run.balance_after, dec!(12));
    assert_eq!(run.realized_diff, dec!(2));
    assert_eq!(h.ledger.baseline().await, dec!(2));

    let alerts = h.notifier.alerts();
    let summary = alerts.last().unwrap();
    assert!(summary.starts_with("Arbitrage ALT (forward), completed, diff: 2"));
    assert!(summary.contains("balance: 2"));
    assert!(h.notifier.logs().iter().any(|l| l == "Arbitrage: ETH -> ALT -> BTC -> ETH"));
}

#[tokio::test]
async fn test_forward_leg1_failure_aborts_without_position() {
    let h = harness(triangle_market(), fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.legs.len(), 1);
    assert_eq!(run.legs[0].attempts, 14);
    assert_eq!(run.realized_diff, Decimal::ZERO);
    assert_eq!(run.balance_after, run.balance_before);
    // Opening read and the leg 1 budget, nothing after
    assert_eq!(h.mock.balance_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.mock.balance("ETH"), dec!(10));
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert!(h.mock.orders().iter().all(|o| o.kind == OrderKind::Limit));

    // A zero diff is still recorded
    assert_eq!(h.ledger.len().await, 2);
    assert_eq!(h.ledger.baseline().await, Decimal::ZERO);
    assert!(h.notifier.alerts().last().unwrap().contains("aborted"));
}

#[tokio::test]
async fn test_forward_leg1_partial_residue_is_sold_back() {
    let mock = triangle_market().with_rule(alt_eth(), Side::Buy, FillRule::Partial(dec!(0.5)));
    let trading = TradingConfig {
        max_orderbook_tries: 2,
        ..fast_trading()
    };
    let h = harness(mock, trading).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    let revert = run.legs.last().unwrap();
    assert_eq!(revert.role, LegRole::Revert);
    assert!(revert.filled);

    let last = h.mock.orders().last().cloned().unwrap();
    assert_eq!(last.kind, OrderKind::Market);
    assert_eq!(last.pair, alt_eth());
    assert_eq!(last.side, Side::Sell);
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert!(run.realized_diff < Decimal::ZERO);
}

/// Triangle market whose ALT/ETH asks sit at 0.01, 0.0125 and 0.02
fn stepped_market() -> MockExchange {
    triangle_market().with_book(book(
        alt_eth(),
        &[],
        &[
            (dec!(0.01), dec!(10000)),
            (dec!(0.0125), dec!(10000)),
            (dec!(0.02), dec!(10000)),
        ],
    ))
}

#[tokio::test]
async fn test_forward_leg1_partial_then_fill_commits_only_the_budget() {
    let mock = stepped_market()
        .with_rule(
            alt_eth(),
            Side::Buy,
            FillRule::PartialExceptAt {
                fraction: dec!(0.5),
                price: dec!(0.0125),
            },
        )
        .with_rule(alt_btc(), Side::Sell, FillRule::Always);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.legs[0].attempts, 2);
    assert_eq!(
        run.legs[0].execution,
        Execution {
            quantity: dec!(720),
            notional: dec!(8),
        }
    );
    let leg1_amounts: Vec<_> = h.mock.orders_on(&alt_eth()).iter().map(|o| o.amount).collect();
    assert_eq!(leg1_amounts, vec![dec!(800), dec!(320)]);

    // 8 ETH -> 720 ALT -> 0.36 BTC -> 7.2 ETH
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert_eq!(run.balance_after, dec!(9.2));
    assert_eq!(run.realized_diff, dec!(-0.8));
}

#[tokio::test]
async fn test_forward_leg1_partials_never_exceed_budget_and_are_unwound() {
    let mock = stepped_market().with_rule(alt_eth(), Side::Buy, FillRule::Partial(dec!(0.9)));
    let trading = TradingConfig {
        max_orderbook_tries: 3,
        ..fast_trading()
    };
    let h = harness(mock, trading).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    let leg1 = &run.legs[0];
    assert!(!leg1.filled);
    assert_eq!(leg1.execution.quantity, dec!(781.2));
    assert_eq!(leg1.execution.notional, dec!(7.992));

    let revert = h.mock.orders().last().cloned().unwrap();
    assert_eq!(revert.kind, OrderKind::Market);
    assert_eq!(revert.side, Side::Sell);
    assert_eq!(revert.amount, dec!(781.2));

    // 10 - 7.992 + 781.2 * 0.0099
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert_eq!(run.balance_after, dec!(9.74188));
    assert_eq!(run.realized_diff, dec!(-0.25812));
}

#[tokio::test]
async fn test_concurrent_runs_keep_their_own_diffs() {
    let zzz_eth = AssetPair::new("ZZZ", "ETH");
    let mock = triangle_market()
        .with_rule(alt_eth(), Side::Buy, FillRule::Always)
        .with_rule(alt_btc(), Side::Sell, FillRule::Always)
        .with_book(book(
            zzz_eth.clone(),
            &[],
            &ladder(dec!(0.001), dec!(0.00001), 20, dec!(100000)),
        ));
    mock.set_ticker(eth_btc(), dec!(0.0399), dec!(0.04));
    let h = harness(mock, fast_trading()).await;
    let stale = Triangle::new("ETH", "BTC", "ZZZ");
    let alt_triangle = triangle();

    let (alt, zzz) = tokio::join!(
        h.orchestrator.run(&alt_triangle, Direction::Forward),
        h.orchestrator.run(&stale, Direction::Forward),
    );
    let (alt, zzz) = (alt.unwrap(), zzz.unwrap());

    assert_eq!(alt.status, RunStatus::Completed);
    assert_eq!(alt.realized_diff, dec!(2));

    // ALT traded while ZZZ was resting orders; none of it lands on ZZZ
    assert_eq!(zzz.status, RunStatus::Aborted);
    assert!(h.mock.orders_on(&zzz_eth).len() > 1);
    assert_eq!(zzz.realized_diff, Decimal::ZERO);

    assert_eq!(h.mock.balance("ETH"), dec!(12));
    assert_eq!(h.ledger.len().await, 3);
    assert_eq!(h.ledger.baseline().await, dec!(2));
}

#[tokio::test]
async fn test_forward_leg2_failure_reverts_exactly_what_leg1_bought() {
    let mock = triangle_market().with_rule(alt_eth(), Side::Buy, FillRule::Always);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::PartiallyReverted);
    let roles: Vec<_> = run.legs.iter().map(|l| l.role).collect();
    assert_eq!(roles, vec![LegRole::First, LegRole::Second, LegRole::Revert]);
    assert!(!run.legs[1].filled);
    assert_eq!(run.legs[1].attempts, 14);

    let revert = h.mock.orders().last().cloned().unwrap();
    assert_eq!(revert.kind, OrderKind::Market);
    assert_eq!(revert.pair, alt_eth());
    assert_eq!(revert.side, Side::Sell);
    assert_eq!(revert.amount, dec!(800));

    // Bought 800 at 0.0100, sold back at the 0.0099 bid
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert_eq!(run.realized_diff, dec!(-0.08));
    assert_eq!(h.ledger.baseline().await, dec!(-0.08));
    assert!(h.notifier.alerts().last().unwrap().contains("partially reverted"));
}

#[tokio::test]
async fn test_unreadable_balance_fails_before_any_order() {
    let mock = triangle_market().with_rule(alt_eth(), Side::Buy, FillRule::Always);
    mock.fail_balances(3);
    let h = harness(mock, fast_trading()).await;

    let result = h.orchestrator.run(&triangle(), Direction::Forward).await;

    assert!(result.is_err());
    assert!(h.mock.orders().is_empty());
    assert_eq!(h.ledger.len().await, 1);
}

#[tokio::test]
async fn test_transient_balance_failure_is_retried() {
    let mock = triangle_market();
    mock.fail_balances(2);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Forward).await.unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.balance_before, dec!(10));
}

// ============================================================================
// Backward
// ============================================================================

#[tokio::test]
async fn test_backward_completes() {
    let mock = backward_market()
        .with_rule(eth_btc(), Side::Sell, FillRule::Always)
        .with_rule(alt_btc(), Side::Buy, FillRule::Always)
        .with_rule(alt_eth(), Side::Sell, FillRule::Always);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Backward).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.legs.len(), 3);
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert_eq!(h.mock.balance("BTC"), Decimal::ZERO);
    assert_eq!(run.balance_after, dec!(12));
    assert_eq!(run.realized_diff, dec!(2));

    let first = &h.mock.orders()[0];
    assert_eq!(first.pair, eth_btc());
    assert_eq!(first.side, Side::Sell);
}

#[tokio::test]
async fn test_backward_leg3_falls_back_to_market() {
    let mock = backward_market()
        .with_rule(eth_btc(), Side::Sell, FillRule::Always)
        .with_rule(alt_btc(), Side::Buy, FillRule::Always);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Backward).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.legs.len(), 4);
    assert!(!run.legs[2].filled);
    assert!(run.legs[3].filled);
    assert_eq!(h.mock.balance("ALT"), Decimal::ZERO);
    assert_eq!(h.mock.orders().last().unwrap().kind, OrderKind::Market);
}

#[tokio::test]
async fn test_backward_leg2_failure_buys_base_back() {
    let mock = backward_market().with_rule(eth_btc(), Side::Sell, FillRule::Always);
    let h = harness(mock, fast_trading()).await;

    let run = h.orchestrator.run(&triangle(), Direction::Backward).await.unwrap();

    assert_eq!(run.status, RunStatus::PartiallyReverted);

    // 8 ETH sold at 0.05 for 0.4 BTC, bought back at the 0.05 ask
    let revert = h.mock.orders().last().cloned().unwrap();
    assert_eq!(revert.kind, OrderKind::Market);
    assert_eq!(revert.pair, eth_btc());
    assert_eq!(revert.side, Side::Buy);
    assert_eq!(revert.amount, dec!(8));
    assert_eq!(h.mock.balance("BTC"), Decimal::ZERO);
    assert_eq!(run.realized_diff, Decimal::ZERO);
}
