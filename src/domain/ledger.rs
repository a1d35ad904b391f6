//! Ledger aggregation: folding the trade log into per-symbol holdings.
//!
//! The ledger is a pure accumulator over the append-only trade log. Price
//! data never enters the accumulator; it is only applied when deriving the
//! holdings view, so trade application and price refreshes commute.

use std::collections::HashMap;

use super::ticker::PriceBoard;
use super::trade::{Side, TradeRecord};

/// Running per-symbol accumulator: open quantity and total cost of the
/// currently-held units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SymbolBook {
    pub quantity: f64,
    pub cost_basis: f64,
}

impl SymbolBook {
    /// Volume-weighted average cost of the held quantity. Zero when flat.
    pub fn avg_entry_price(&self) -> f64 {
        if self.quantity > 0.0 {
            self.cost_basis / self.quantity
        } else {
            0.0
        }
    }

    fn apply(&mut self, side: Side, quantity: f64, price: f64) {
        match side {
            Side::Buy => {
                self.quantity += quantity;
                self.cost_basis += quantity * price;
            }
            Side::Sell => {
                // Average cost per unit is preserved; the sold portion's
                // cost simply leaves the book. Over-sells clamp to flat.
                let avg = self.avg_entry_price();
                self.quantity = (self.quantity - quantity).max(0.0);
                self.cost_basis = self.quantity * avg;
            }
        }
    }
}

/// An aggregated open position in one instrument, marked to market.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    /// Latest known tick price, 0 when the symbol has never been quoted.
    pub market_price: f64,
    pub value: f64,
    pub unrealized_pnl: f64,
}

/// Per-challenge position ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    books: HashMap<String, SymbolBook>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rebuild: fold the complete trade log, oldest first.
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut ledger = Ledger::new();
        for trade in trades {
            ledger.apply_trade(trade);
        }
        ledger
    }

    /// Reconstruct the accumulator from a previously derived holdings view
    /// (`cost_basis = avg_entry_price × quantity`). Used when only the view
    /// survived, e.g. restored from a cached snapshot.
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let mut books = HashMap::new();
        for h in holdings {
            books.insert(
                h.symbol.clone(),
                SymbolBook {
                    quantity: h.quantity,
                    cost_basis: h.avg_entry_price * h.quantity,
                },
            );
        }
        Ledger { books }
    }

    /// Incremental update for a single newly observed trade. Applying the
    /// full log one trade at a time yields the same books as
    /// [`Ledger::from_trades`].
    pub fn apply_trade(&mut self, trade: &TradeRecord) {
        self.books
            .entry(trade.symbol.clone())
            .or_default()
            .apply(trade.side, trade.quantity, trade.entry_price);
    }

    pub fn book(&self, symbol: &str) -> Option<&SymbolBook> {
        self.books.get(symbol)
    }

    /// Open symbols, i.e. those with quantity above zero.
    pub fn open_symbols(&self) -> usize {
        self.books.values().filter(|b| b.quantity > 0.0).count()
    }

    /// Derive the holdings view, marked to market from the price board.
    /// Flat symbols are filtered out; symbols without a quote are carried at
    /// price 0 rather than dropped.
    pub fn holdings(&self, prices: &PriceBoard) -> Vec<Holding> {
        let mut holdings: Vec<Holding> = self
            .books
            .iter()
            .filter(|(_, book)| book.quantity > 0.0)
            .map(|(symbol, book)| {
                let avg_entry_price = book.avg_entry_price();
                let market_price = prices.price(symbol).unwrap_or(0.0);
                Holding {
                    symbol: symbol.clone(),
                    quantity: book.quantity,
                    avg_entry_price,
                    market_price,
                    value: market_price * book.quantity,
                    unrealized_pnl: (market_price - avg_entry_price) * book.quantity,
                }
            })
            .collect();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        holdings
    }
}
