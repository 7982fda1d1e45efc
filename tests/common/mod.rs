//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use triarb::common::errors::{ClientError, Result};
use triarb::common::traits::{ExchangeGateway, Notifier};
use triarb::common::types::{
    AssetPair, Balances, Exchange, OpenOrder, OrderBook, PriceLevel, Side, Ticker,
};
use triarb::config::types::TradingConfig;

/// How the mock treats limit orders on one pair and side
#[derive(Debug, Clone, PartialEq)]
pub enum FillRule {
    /// Rests untouched until canceled
    Never,
    /// Fills on placement
    Always,
    /// Fills on placement only at exactly this price
    AtPrice(Decimal),
    /// Fills this fraction on placement, the rest rests forever
    Partial(Decimal),
    /// Fills `fraction` on placement and the rest once open orders have
    /// been queried `after_checks` times
    PartialThenFill { fraction: Decimal, after_checks: usize },
    /// Fills fully at `price`, anywhere else fills `fraction` and rests
    PartialExceptAt { fraction: Decimal, price: Decimal },
    /// Placement fails
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Every order the mock accepted or rejected, in placement order
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub id: String,
    pub kind: OrderKind,
    pub pair: AssetPair,
    pub side: Side,
    pub amount: Decimal,
    pub price: Option<Decimal>,
}

#[derive(Debug)]
struct Pending {
    remaining: Decimal,
    checks_left: usize,
}

#[derive(Debug, Default)]
struct MockState {
    balances: Balances,
    tickers: HashMap<AssetPair, Ticker>,
    books: HashMap<AssetPair, OrderBook>,
    rules: HashMap<(AssetPair, Side), FillRule>,
    open: Vec<OpenOrder>,
    pending: HashMap<String, Pending>,
    orders: Vec<PlacedOrder>,
    failing_pairs: HashSet<AssetPair>,
    balance_failures: usize,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("order-{}", self.next_id)
    }

    /// Move balances for a trade of `amount` base units at `price`
    fn settle(&mut self, pair: &AssetPair, side: Side, amount: Decimal, price: Decimal) -> Result<()> {
        let cost = amount * price;
        let (spent, spend_amount, received, receive_amount) = match side {
            Side::Buy => (&pair.quote, cost, &pair.base, amount),
            Side::Sell => (&pair.base, amount, &pair.quote, cost),
        };

        let available = self.balances.free(spent);
        if available < spend_amount {
            return Err(ClientError::InsufficientBalance(format!(
                "{} {} needed, {} available",
                spend_amount, spent, available
            )));
        }

        let received_before = self.balances.free(received);
        self.balances.set(spent.clone(), available - spend_amount);
        self.balances.set(received.clone(), received_before + receive_amount);
        Ok(())
    }
}

/// Scripted in-memory exchange that counts every call
pub struct MockExchange {
    exchange: Exchange,
    state: Mutex<MockState>,
    pub balance_calls: AtomicUsize,
    pub ticker_calls: AtomicUsize,
    pub book_calls: AtomicUsize,
    pub open_order_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange,
            state: Mutex::new(MockState::default()),
            balance_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            book_calls: AtomicUsize::new(0),
            open_order_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(self, asset: &str, amount: Decimal) -> Self {
        self.state.lock().balances.set(asset, amount);
        self
    }

    pub fn with_ticker(self, pair: AssetPair, bid: Decimal, ask: Decimal) -> Self {
        self.state.lock().tickers.insert(pair, Ticker::new(bid, ask));
        self
    }

    pub fn with_book(self, book: OrderBook) -> Self {
        self.state.lock().books.insert(book.pair.clone(), book);
        self
    }

    pub fn with_rule(self, pair: AssetPair, side: Side, rule: FillRule) -> Self {
        self.set_rule(pair, side, rule);
        self
    }

    pub fn set_rule(&self, pair: AssetPair, side: Side, rule: FillRule) {
        self.state.lock().rules.insert((pair, side), rule);
    }

    pub fn set_ticker(&self, pair: AssetPair, bid: Decimal, ask: Decimal) {
        self.state.lock().tickers.insert(pair, Ticker::new(bid, ask));
    }

    /// Make every ticker and book fetch for `pair` fail
    pub fn fail_pair(&self, pair: AssetPair) {
        self.state.lock().failing_pairs.insert(pair);
    }

    /// Make the next `count` balance fetches fail
    pub fn fail_balances(&self, count: usize) {
        self.state.lock().balance_failures = count;
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        self.state.lock().balances.free(asset)
    }

    pub fn orders(&self) -> Vec<PlacedOrder> {
        self.state.lock().orders.clone()
    }

    pub fn orders_on(&self, pair: &AssetPair) -> Vec<PlacedOrder> {
        self.orders().into_iter().filter(|o| &o.pair == pair).collect()
    }

    pub fn open_orders(&self) -> Vec<OpenOrder> {
        self.state.lock().open.clone()
    }

    pub fn tickers_fetched(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn books_fetched(&self) -> usize {
        self.book_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn fetch_balance(&self) -> Result<Balances> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.balance_failures > 0 {
            state.balance_failures -= 1;
            return Err(ClientError::Timeout("balance".to_string()));
        }
        Ok(state.balances.clone())
    }

    async fn fetch_ticker(&self, pair: &AssetPair) -> Result<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.failing_pairs.contains(pair) {
            return Err(ClientError::Timeout(format!("ticker {}", pair)));
        }
        state
            .tickers
            .get(pair)
            .copied()
            .ok_or_else(|| ClientError::MarketNotFound(pair.to_string()))
    }

    async fn fetch_order_book(&self, pair: &AssetPair) -> Result<OrderBook> {
        self.book_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.failing_pairs.contains(pair) {
            return Err(ClientError::Timeout(format!("book {}", pair)));
        }
        state
            .books
            .get(pair)
            .cloned()
            .ok_or_else(|| ClientError::MarketNotFound(pair.to_string()))
    }

    async fn fetch_open_orders(&self, pair: &AssetPair) -> Result<Vec<OpenOrder>> {
        self.open_order_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        let mut completed = Vec::new();
        for (id, pending) in state.pending.iter_mut() {
            if pending.checks_left == 0 {
                continue;
            }
            pending.checks_left -= 1;
            if pending.checks_left == 0 {
                completed.push((id.clone(), pending.remaining));
            }
        }
        for (id, remaining) in completed {
            state.pending.remove(&id);
            if let Some(index) = state.open.iter().position(|o| o.id == id) {
                let order = state.open.remove(index);
                state.settle(&order.pair, order.side, remaining, order.price)?;
            }
        }

        Ok(state.open.iter().filter(|o| &o.pair == pair).cloned().collect())
    }

    async fn cancel_order(&self, order_id: &str, _pair: &AssetPair) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let Some(index) = state.open.iter().position(|o| o.id == order_id) else {
            return Err(ClientError::Exchange {
                code: -2011,
                message: "Unknown order sent.".to_string(),
            });
        };
        state.open.remove(index);
        state.pending.remove(order_id);
        Ok(())
    }

    async fn create_market_order(&self, pair: &AssetPair, side: Side, amount: Decimal) -> Result<String> {
        let mut state = self.state.lock();
        let ticker = state
            .tickers
            .get(pair)
            .copied()
            .ok_or_else(|| ClientError::MarketNotFound(pair.to_string()))?;
        let price = match side {
            Side::Buy => ticker.ask,
            Side::Sell => ticker.bid,
        };

        let id = state.next_id();
        state.orders.push(PlacedOrder {
            id: id.clone(),
            kind: OrderKind::Market,
            pair: pair.clone(),
            side,
            amount,
            price: None,
        });
        state.settle(pair, side, amount, price)?;
        Ok(id)
    }

    async fn create_limit_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> Result<String> {
        let mut state = self.state.lock();
        let rule = state
            .rules
            .get(&(pair.clone(), side))
            .cloned()
            .unwrap_or(FillRule::Never);

        let id = state.next_id();
        state.orders.push(PlacedOrder {
            id: id.clone(),
            kind: OrderKind::Limit,
            pair: pair.clone(),
            side,
            amount,
            price: Some(price),
        });

        let resting = |filled: Decimal| OpenOrder {
            id: id.clone(),
            pair: pair.clone(),
            side,
            price,
            amount,
            filled,
        };

        match rule {
            FillRule::Reject => {
                return Err(ClientError::Exchange {
                    code: -1013,
                    message: "Filter failure: PRICE_FILTER".to_string(),
                });
            }
            FillRule::Always => state.settle(pair, side, amount, price)?,
            FillRule::AtPrice(target) if target == price => state.settle(pair, side, amount, price)?,
            FillRule::AtPrice(_) | FillRule::Never => state.open.push(resting(Decimal::ZERO)),
            FillRule::PartialExceptAt { price: target, .. } if target == price => {
                state.settle(pair, side, amount, price)?
            }
            FillRule::Partial(fraction) | FillRule::PartialExceptAt { fraction, .. } => {
                let filled = amount * fraction;
                state.settle(pair, side, filled, price)?;
                state.open.push(resting(filled));
            }
            FillRule::PartialThenFill { fraction, after_checks } => {
                let filled = amount * fraction;
                state.settle(pair, side, filled, price)?;
                state.open.push(resting(filled));
                state.pending.insert(
                    id.clone(),
                    Pending {
                        remaining: amount - filled,
                        checks_left: after_checks,
                    },
                );
            }
        }
        Ok(id)
    }
}

/// Notifier that keeps everything it is given
#[derive(Default)]
pub struct RecordingNotifier {
    logs: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn log(&self, text: &str) {
        self.logs.lock().push(text.to_string());
    }

    async fn alert(&self, text: &str) {
        self.alerts.lock().push(text.to_string());
    }
}

/// Order book with the given (price, size) levels
pub fn book(pair: AssetPair, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> OrderBook {
    let levels = |side: &[(Decimal, Decimal)]| {
        side.iter()
            .map(|(price, size)| PriceLevel::new(*price, *size))
            .collect::<Vec<_>>()
    };
    OrderBook::new(pair, levels(bids), levels(asks))
}

/// `count` levels starting at `start`, moving by `step`, each of `size`
pub fn ladder(start: Decimal, step: Decimal, count: usize, size: Decimal) -> Vec<(Decimal, Decimal)> {
    (0..count)
        .map(|i| (start + step * Decimal::from(i), size))
        .collect()
}

pub fn alt_eth() -> AssetPair {
    AssetPair::new("ALT", "ETH")
}

pub fn alt_btc() -> AssetPair {
    AssetPair::new("ALT", "BTC")
}

pub fn eth_btc() -> AssetPair {
    AssetPair::new("ETH", "BTC")
}

/// Trading settings with millisecond waits
pub fn fast_trading() -> TradingConfig {
    TradingConfig {
        limit_order_wait_ms: 1,
        partial_fill_waits: 2,
        report_currency: None,
        ..TradingConfig::default()
    }
}

/// A Binance-like market for ETH/BTC/ALT with deep books and 10 ETH.
///
/// Prices (no fees): ALT/ETH 0.01, ALT/BTC 0.0005, ETH/BTC 0.05, so the
/// triangle is balanced.
pub fn triangle_market() -> MockExchange {
    MockExchange::new(Exchange::Binance)
        .with_balance("ETH", dec!(10))
        .with_ticker(alt_eth(), dec!(0.0099), dec!(0.01))
        .with_ticker(alt_btc(), dec!(0.0005), dec!(0.00051))
        .with_ticker(eth_btc(), dec!(0.0499), dec!(0.05))
        .with_book(book(
            alt_eth(),
            &ladder(dec!(0.0099), dec!(-0.0001), 20, dec!(10000)),
            &ladder(dec!(0.0100), dec!(0.0001), 20, dec!(10000)),
        ))
        .with_book(book(
            alt_btc(),
            &ladder(dec!(0.00050), dec!(-0.00001), 20, dec!(10000)),
            &ladder(dec!(0.00051), dec!(0.00001), 20, dec!(10000)),
        ))
        .with_book(book(
            eth_btc(),
            &ladder(dec!(0.0499), dec!(-0.0001), 20, dec!(1000)),
            &ladder(dec!(0.0500), dec!(0.0001), 20, dec!(1000)),
        ))
}

pub fn shared(mock: MockExchange) -> Arc<MockExchange> {
    Arc::new(mock)
}
