//! Property tests for the ledger fold.

mod common;

use common::tick_batch;
use propdesk::domain::ledger::Ledger;
use propdesk::domain::session::DeskSession;
use propdesk::domain::ticker::PriceBoard;
use propdesk::domain::trade::{Side, TradeRecord};
use proptest::prelude::*;

fn record(symbol: String, side: Side, quantity: f64, price: f64) -> TradeRecord {
    TradeRecord {
        id: 0,
        challenge_id: "ch-prop".into(),
        symbol,
        side,
        quantity,
        entry_price: price,
        created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}

fn arb_trade() -> impl Strategy<Value = TradeRecord> {
    (
        prop::sample::select(vec!["AAPL", "TSLA", "IAM", "BTC-USD"]),
        prop::bool::ANY,
        0.01f64..1000.0,
        0.01f64..10_000.0,
    )
        .prop_map(|(symbol, is_buy, quantity, price)| {
            let side = if is_buy { Side::Buy } else { Side::Sell };
            record(symbol.to_string(), side, quantity, price)
        })
}

proptest! {
    #[test]
    fn incremental_application_matches_rebuild(trades in prop::collection::vec(arb_trade(), 0..60)) {
        let rebuilt = Ledger::from_trades(&trades);

        let mut incremental = Ledger::new();
        for trade in &trades {
            incremental.apply_trade(trade);
        }

        let board = PriceBoard::new();
        prop_assert_eq!(rebuilt.holdings(&board), incremental.holdings(&board));
    }

    #[test]
    fn quantities_never_go_negative(trades in prop::collection::vec(arb_trade(), 0..60)) {
        let ledger = Ledger::from_trades(&trades);
        for holding in ledger.holdings(&PriceBoard::new()) {
            prop_assert!(holding.quantity >= 0.0);
        }
        for trade in &trades {
            // Every prefix of the log also respects the invariant.
            if let Some(book) = ledger.book(&trade.symbol) {
                prop_assert!(book.quantity >= 0.0);
            }
        }
    }

    #[test]
    fn price_and_trade_events_commute(
        trades in prop::collection::vec(arb_trade(), 1..20),
        price in 0.01f64..10_000.0,
    ) {
        let (last, earlier) = trades.split_last().unwrap();
        let prices = tick_batch(&[("AAPL", price, 1.0), ("TSLA", price * 2.0, -1.0)]);

        let mut price_first = DeskSession::new();
        let generation = price_first.generation();
        price_first.apply_trade_log(generation, earlier.to_vec());
        price_first.apply_price_refresh(generation, prices.clone());
        price_first.apply_trade_event(generation, last.clone());

        let mut trade_first = DeskSession::new();
        let generation = trade_first.generation();
        trade_first.apply_trade_log(generation, earlier.to_vec());
        trade_first.apply_trade_event(generation, last.clone());
        trade_first.apply_price_refresh(generation, prices);

        prop_assert_eq!(price_first.holdings(), trade_first.holdings());
    }

    #[test]
    fn partial_sell_preserves_average_cost(
        buy_quantity in 1.0f64..1000.0,
        buy_price in 0.01f64..10_000.0,
        sell_fraction in 0.01f64..0.99,
    ) {
        let buy = record("AAPL".into(), Side::Buy, buy_quantity, buy_price);
        let mut ledger = Ledger::from_trades(std::slice::from_ref(&buy));
        let before = ledger.book("AAPL").unwrap().avg_entry_price();

        let sell = record("AAPL".into(), Side::Sell, buy_quantity * sell_fraction, buy_price * 1.1);
        ledger.apply_trade(&sell);
        let after = ledger.book("AAPL").unwrap().avg_entry_price();

        prop_assert!((before - after).abs() <= before.abs() * 1e-9);
    }
}
