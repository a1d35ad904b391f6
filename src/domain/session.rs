//! Desk session: the single-writer snapshot the presentation layer reads.
//!
//! All inputs arrive as events (price refresh, trade insert, trade-log
//! reload, selection change) and every event leaves the snapshot in a state
//! identical to a full recompute from the same inputs. Price refreshes and
//! trade inserts may interleave in any order; because price application
//! never touches cost-basis state and trade application never touches price
//! state, both orders converge to the same holdings.
//!
//! Asynchronous fetches are tagged with the session generation at request
//! time. Switching the challenge or instrument bumps the generation, so a
//! completion for a view no longer shown is dropped instead of applied.

use std::collections::HashMap;

use super::challenge::Challenge;
use super::ledger::{Holding, Ledger};
use super::plan::{build_alert, build_plan, RiskAlert, TradePlan};
use super::signal::{evaluate, evaluate_all, opportunities, Signal};
use super::ticker::{PriceBoard, PriceTick};
use super::trade::TradeRecord;

/// Fallback daily-loss limit when no challenge is attached, matching the
/// most common plan tier.
pub const DEFAULT_DAILY_LOSS_LIMIT: f64 = 5.0;

/// How many recent trades the snapshot retains for display.
const RECENT_TRADES: usize = 50;

/// Monotonic tag identifying which challenge/instrument selection a pending
/// fetch was issued for.
pub type Generation = u64;

#[derive(Debug, Default)]
pub struct DeskSession {
    generation: Generation,
    challenge: Option<Challenge>,
    selected: Option<String>,
    prices: PriceBoard,
    ledger: Ledger,
    recent_trades: Vec<TradeRecord>,
    trade_count: u64,
    last_error: Option<String>,

    holdings: Vec<Holding>,
    signals: Vec<Signal>,
    plan: Option<TradePlan>,
    alert: Option<RiskAlert>,
    opportunities: Vec<Signal>,
}

impl DeskSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation; callers stamp outgoing fetches with this.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Attach (or clear) the active challenge. Clears per-challenge state
    /// and invalidates all pending fetches.
    pub fn set_challenge(&mut self, challenge: Option<Challenge>) {
        self.generation += 1;
        self.challenge = challenge;
        self.ledger = Ledger::new();
        self.recent_trades.clear();
        self.trade_count = 0;
        self.recompute();
    }

    /// Select the instrument the plan and alert are derived for.
    pub fn select_symbol(&mut self, symbol: Option<String>) {
        self.generation += 1;
        self.selected = symbol;
        self.recompute();
    }

    fn daily_loss_limit(&self) -> f64 {
        self.challenge
            .as_ref()
            .map(|c| c.plan.daily_loss_limit)
            .unwrap_or(DEFAULT_DAILY_LOSS_LIMIT)
    }

    /// Apply a completed price poll. Stale completions are dropped and
    /// reported as `false`.
    pub fn apply_price_refresh(
        &mut self,
        generation: Generation,
        batch: HashMap<String, PriceTick>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.prices.apply(batch);
        self.last_error = None;
        self.recompute();
        true
    }

    /// Record a failed poll. The previous snapshot stays; the next scheduled
    /// poll is the retry.
    pub fn apply_fetch_error(&mut self, generation: Generation, reason: String) -> bool {
        if generation != self.generation {
            return false;
        }
        self.last_error = Some(reason);
        true
    }

    /// Apply a completed trade-log load (oldest first).
    pub fn apply_trade_log(&mut self, generation: Generation, trades: Vec<TradeRecord>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.ledger = Ledger::from_trades(&trades);
        self.trade_count = trades.len() as u64;
        self.recent_trades = trades;
        if self.recent_trades.len() > RECENT_TRADES {
            let cut = self.recent_trades.len() - RECENT_TRADES;
            self.recent_trades.drain(..cut);
        }
        self.recompute();
        true
    }

    /// Apply a single newly inserted trade from the store feed.
    pub fn apply_trade_event(&mut self, generation: Generation, trade: TradeRecord) -> bool {
        if generation != self.generation {
            return false;
        }
        self.ledger.apply_trade(&trade);
        self.trade_count += 1;
        self.recent_trades.push(trade);
        if self.recent_trades.len() > RECENT_TRADES {
            self.recent_trades.remove(0);
        }
        self.recompute();
        true
    }

    /// Settle a validated order against the attached challenge.
    pub fn settle_order(&mut self, order: &super::trade::OrderTicket) {
        if let Some(challenge) = self.challenge.as_mut() {
            challenge.settle_order(order);
        }
    }

    fn recompute(&mut self) {
        self.holdings = self.ledger.holdings(&self.prices);

        if self.prices.is_empty() {
            self.signals.clear();
            self.plan = None;
            self.alert = None;
            self.opportunities.clear();
            return;
        }

        let limit = self.daily_loss_limit();
        self.signals = evaluate_all(self.prices.tickers(), limit);
        self.opportunities = opportunities(&self.signals);

        let selected_tick = self
            .selected
            .as_deref()
            .and_then(|symbol| self.prices.get(symbol))
            .cloned();
        match selected_tick {
            Some(tick) => {
                let signal = evaluate(&tick, limit);
                self.plan = Some(build_plan(&tick, limit));
                self.alert = Some(build_alert(&tick, &signal));
            }
            None => {
                self.plan = None;
                self.alert = None;
            }
        }
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn selected_symbol(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn prices(&self) -> &PriceBoard {
        &self.prices
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn plan(&self) -> Option<&TradePlan> {
        self.plan.as_ref()
    }

    pub fn alert(&self) -> Option<&RiskAlert> {
        self.alert.as_ref()
    }

    pub fn opportunities(&self) -> &[Signal] {
        &self.opportunities
    }

    pub fn recent_trades(&self) -> &[TradeRecord] {
        &self.recent_trades
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::challenge::sample_challenge;
    use crate::domain::signal::SignalAction;
    use crate::domain::ticker::sample_tick;
    use crate::domain::trade::Side;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Utc};

    fn trade(symbol: &str, side: Side, quantity: f64, price: f64) -> TradeRecord {
        TradeRecord {
            id: 0,
            challenge_id: "ch-1".into(),
            symbol: symbol.into(),
            side,
            quantity,
            entry_price: price,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn batch(ticks: &[(&str, f64, f64)]) -> HashMap<String, PriceTick> {
        ticks
            .iter()
            .map(|&(s, p, c)| (s.to_string(), sample_tick(s, p, c)))
            .collect()
    }

    fn session_with_challenge() -> DeskSession {
        let mut session = DeskSession::new();
        session.set_challenge(Some(sample_challenge(10000.0)));
        session
    }

    #[test]
    fn empty_session_has_empty_snapshot() {
        let session = DeskSession::new();
        assert!(session.holdings().is_empty());
        assert!(session.signals().is_empty());
        assert!(session.plan().is_none());
        assert!(session.alert().is_none());
        assert!(session.opportunities().is_empty());
    }

    #[test]
    fn price_then_trade_equals_trade_then_price() {
        let prices = batch(&[("AAPL", 120.0, 1.0)]);
        let new_trade = trade("AAPL", Side::Buy, 10.0, 100.0);

        let mut a = session_with_challenge();
        let gen_a = a.generation();
        a.apply_price_refresh(gen_a, prices.clone());
        a.apply_trade_event(gen_a, new_trade.clone());

        let mut b = session_with_challenge();
        let gen_b = b.generation();
        b.apply_trade_event(gen_b, new_trade);
        b.apply_price_refresh(gen_b, prices);

        assert_eq!(a.holdings(), b.holdings());
        assert_eq!(a.holdings().len(), 1);
        assert_relative_eq!(a.holdings()[0].value, 1200.0);
    }

    #[test]
    fn reload_then_events_converges_with_rebuild() {
        let log = vec![
            trade("AAPL", Side::Buy, 10.0, 100.0),
            trade("AAPL", Side::Buy, 5.0, 110.0),
        ];
        let late = trade("AAPL", Side::Sell, 10.0, 120.0);

        let mut incremental = session_with_challenge();
        let generation = incremental.generation();
        incremental.apply_trade_log(generation, log.clone());
        incremental.apply_trade_event(generation, late.clone());

        let mut reloaded = session_with_challenge();
        let generation = reloaded.generation();
        let mut full = log;
        full.push(late);
        reloaded.apply_trade_log(generation, full);

        assert_eq!(incremental.holdings(), reloaded.holdings());
        assert_eq!(incremental.trade_count(), 3);
    }

    #[test]
    fn signals_derive_from_challenge_limit() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_price_refresh(generation, batch(&[("AAPL", 100.0, 2.0)]));

        assert_eq!(session.signals().len(), 1);
        let signal = &session.signals()[0];
        assert_eq!(signal.action, SignalAction::Buy);
        // limit 5 → sl 0.01 → stop at 99.
        assert_relative_eq!(signal.stop_loss, 99.0);
    }

    #[test]
    fn plan_and_alert_require_selection() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_price_refresh(generation, batch(&[("AAPL", 100.0, 2.0)]));
        assert!(session.plan().is_none());
        assert!(session.alert().is_none());

        session.select_symbol(Some("AAPL".into()));
        assert_eq!(session.plan().unwrap().symbol, "AAPL");
        assert!(session.alert().is_some());
    }

    #[test]
    fn selection_without_quote_has_no_plan() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_price_refresh(generation, batch(&[("AAPL", 100.0, 2.0)]));
        session.select_symbol(Some("TSLA".into()));
        assert!(session.plan().is_none());
        assert!(session.signals().len() == 1);
    }

    #[test]
    fn stale_price_refresh_dropped() {
        let mut session = session_with_challenge();
        let stale = session.generation();
        session.select_symbol(Some("AAPL".into()));

        let applied = session.apply_price_refresh(stale, batch(&[("AAPL", 100.0, 2.0)]));
        assert!(!applied);
        assert!(session.prices().is_empty());
        assert!(session.signals().is_empty());
    }

    #[test]
    fn stale_trade_event_dropped() {
        let mut session = session_with_challenge();
        let stale = session.generation();
        session.set_challenge(Some(sample_challenge(20000.0)));

        let applied = session.apply_trade_event(stale, trade("AAPL", Side::Buy, 1.0, 100.0));
        assert!(!applied);
        assert!(session.holdings().is_empty());
        assert_eq!(session.trade_count(), 0);
    }

    #[test]
    fn challenge_switch_clears_ledger() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_trade_event(generation, trade("AAPL", Side::Buy, 10.0, 100.0));
        assert_eq!(session.trade_count(), 1);

        session.set_challenge(Some(sample_challenge(5000.0)));
        assert_eq!(session.trade_count(), 0);
        assert!(session.holdings().is_empty());
    }

    #[test]
    fn fetch_error_keeps_last_known_snapshot() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_price_refresh(generation, batch(&[("AAPL", 100.0, 2.0)]));
        assert_eq!(session.signals().len(), 1);

        session.apply_fetch_error(generation, "proxy unreachable".into());
        assert_eq!(session.last_error(), Some("proxy unreachable"));
        assert_eq!(session.signals().len(), 1);

        // A successful refresh clears the indicator.
        session.apply_price_refresh(generation, batch(&[("AAPL", 101.0, 2.1)]));
        assert!(session.last_error().is_none());
    }

    #[test]
    fn empty_refresh_after_data_keeps_derived_outputs() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        session.apply_price_refresh(generation, batch(&[("AAPL", 100.0, 2.0)]));
        session.apply_price_refresh(generation, HashMap::new());
        // Last-known prices survive, so signals still compute.
        assert_eq!(session.signals().len(), 1);
    }

    #[test]
    fn recent_trades_bounded() {
        let mut session = session_with_challenge();
        let generation = session.generation();
        for i in 0..60 {
            session.apply_trade_event(generation, trade("AAPL", Side::Buy, 1.0, 100.0 + i as f64));
        }
        assert_eq!(session.recent_trades().len(), 50);
        assert_eq!(session.trade_count(), 60);
        // Oldest entries dropped first.
        assert_relative_eq!(session.recent_trades()[0].entry_price, 110.0);
    }

    #[test]
    fn settle_order_updates_challenge() {
        let mut session = session_with_challenge();
        session.settle_order(&crate::domain::trade::OrderTicket {
            symbol: "AAPL".into(),
            side: Side::Buy,
            quantity: 10.0,
            price: 100.0,
        });
        assert_relative_eq!(session.challenge().unwrap().current_balance, 9000.0);
    }
}
