#![allow(dead_code)]

use chrono::{DateTime, Utc};
use propdesk::adapters::sqlite_adapter::SqliteStoreAdapter;
use propdesk::domain::config_validation::MarketSelection;
use propdesk::domain::error::PropdeskError;
use propdesk::domain::ticker::{MarketState, PriceTick};
use propdesk::domain::trade::Side;
use propdesk::ports::market_data_port::MarketDataPort;
use propdesk::ports::trade_store_port::NewTrade;
use std::cell::RefCell;
use std::collections::HashMap;

pub fn tick(symbol: &str, price: f64, change_percent: f64) -> PriceTick {
    PriceTick {
        symbol: symbol.to_string(),
        name: None,
        price,
        change: price * change_percent / 100.0,
        change_percent,
        currency: "USD".into(),
        market_state: MarketState::Regular,
        timestamp: timestamp(0),
    }
}

pub fn tick_batch(ticks: &[(&str, f64, f64)]) -> HashMap<String, PriceTick> {
    ticks
        .iter()
        .map(|&(s, p, c)| (s.to_string(), tick(s, p, c)))
        .collect()
}

pub fn timestamp(offset_secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_748_874_600 + offset_secs, 0).unwrap()
}

pub fn new_trade(
    challenge_id: &str,
    symbol: &str,
    side: Side,
    quantity: f64,
    price: f64,
) -> NewTrade {
    NewTrade {
        challenge_id: challenge_id.into(),
        symbol: symbol.into(),
        side,
        quantity,
        entry_price: price,
        created_at: timestamp(0),
    }
}

/// Seeded in-memory store: schema plus the default plans.
pub fn memory_store() -> SqliteStoreAdapter {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store.seed_default_plans().unwrap();
    store
}

/// Scripted market feed: returns the queued batches in order, then keeps
/// repeating the last one. A queued `Err` is consumed once.
pub struct MockMarketPort {
    responses: RefCell<Vec<Result<HashMap<String, PriceTick>, String>>>,
    last: RefCell<HashMap<String, PriceTick>>,
}

impl MockMarketPort {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(Vec::new()),
            last: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_batch(self, batch: HashMap<String, PriceTick>) -> Self {
        self.responses.borrow_mut().push(Ok(batch));
        self
    }

    pub fn with_error(self, reason: &str) -> Self {
        self.responses.borrow_mut().push(Err(reason.to_string()));
        self
    }
}

impl MarketDataPort for MockMarketPort {
    fn fetch_tickers(
        &self,
        _selection: &MarketSelection,
    ) -> Result<HashMap<String, PriceTick>, PropdeskError> {
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Ok(self.last.borrow().clone());
        }
        match responses.remove(0) {
            Ok(batch) => {
                *self.last.borrow_mut() = batch.clone();
                Ok(batch)
            }
            Err(reason) => Err(PropdeskError::MarketData { reason }),
        }
    }
}
