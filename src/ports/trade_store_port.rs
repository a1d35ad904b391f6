//! Trade persistence port traits.

use crate::domain::error::PropdeskError;
use crate::domain::trade::{Side, TradeRecord};
use chrono::{DateTime, Utc};

/// A trade to be appended, before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub challenge_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub created_at: DateTime<Utc>,
}

/// A live feed of trades inserted after the subscription was opened.
/// Dropping the feed is the unsubscribe; a feed for a de-selected challenge
/// must simply be dropped, never drained into the session.
pub trait TradeFeed {
    /// Next batch of newly inserted trades, oldest first. Empty when nothing
    /// arrived since the last call.
    fn poll(&mut self) -> Result<Vec<TradeRecord>, PropdeskError>;
}

/// Append-only trade store keyed by challenge.
pub trait TradeStorePort {
    /// Insert a trade and return it with its assigned id.
    fn insert_trade(&self, trade: &NewTrade) -> Result<TradeRecord, PropdeskError>;

    /// Full trade log for a challenge, oldest first.
    fn list_trades(&self, challenge_id: &str) -> Result<Vec<TradeRecord>, PropdeskError>;

    fn count_trades(&self, challenge_id: &str) -> Result<u64, PropdeskError>;

    /// Open an insert feed positioned at the current end of the log.
    fn subscribe(&self, challenge_id: &str) -> Result<Box<dyn TradeFeed>, PropdeskError>;
}
