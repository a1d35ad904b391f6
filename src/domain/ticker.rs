//! Market tickers and the last-known price board.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Trading session state as reported by the market-data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketState {
    Regular,
    Pre,
    Post,
    Closed,
    Halted,
    Unknown,
}

impl MarketState {
    /// Feeds report free-form state strings; anything unrecognized maps to
    /// `Unknown` rather than failing the whole refresh.
    pub fn parse(input: &str) -> Self {
        match input.to_uppercase().as_str() {
            "REGULAR" => MarketState::Regular,
            "PRE" | "PREPRE" => MarketState::Pre,
            "POST" | "POSTPOST" => MarketState::Post,
            "CLOSED" => MarketState::Closed,
            "HALTED" => MarketState::Halted,
            _ => MarketState::Unknown,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, MarketState::Halted)
    }
}

/// A single price observation for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    pub change: f64,
    /// Percent change versus prior close, signed.
    pub change_percent: f64,
    pub currency: String,
    pub market_state: MarketState,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Absolute volatility proxy used by the signal engine.
    pub fn volatility(&self) -> f64 {
        self.change_percent.abs()
    }
}

/// Latest known tick per symbol.
///
/// A refresh merges new ticks over the existing set: a partial or empty
/// response leaves previously seen symbols at their last-known price, so a
/// flaky feed degrades to a stale view instead of dropping holdings to zero.
#[derive(Debug, Clone, Default)]
pub struct PriceBoard {
    ticks: HashMap<String, PriceTick>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a refresh batch. Returns the number of symbols updated.
    pub fn apply(&mut self, batch: HashMap<String, PriceTick>) -> usize {
        let updated = batch.len();
        for (symbol, tick) in batch {
            self.ticks.insert(symbol, tick);
        }
        updated
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceTick> {
        self.ticks.get(symbol)
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.ticks.get(symbol).map(|t| t.price)
    }

    /// Snapshot of prices keyed by symbol, for marking holdings to market.
    pub fn price_map(&self) -> HashMap<String, f64> {
        self.ticks
            .iter()
            .map(|(symbol, tick)| (symbol.clone(), tick.price))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Tickers ordered by symbol for stable presentation.
    pub fn tickers(&self) -> Vec<&PriceTick> {
        let mut all: Vec<&PriceTick> = self.ticks.values().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

#[cfg(test)]
pub(crate) fn sample_tick(symbol: &str, price: f64, change_percent: f64) -> PriceTick {
    PriceTick {
        symbol: symbol.to_string(),
        name: None,
        price,
        change: price * change_percent / 100.0,
        change_percent,
        currency: "USD".into(),
        market_state: MarketState::Regular,
        timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}
