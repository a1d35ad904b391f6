//! Trade records and order validation.

use chrono::{DateTime, Utc};

use super::challenge::Challenge;
use super::error::PropdeskError;

/// Order side. The ledger never represents short positions, so a sell
/// only ever reduces an existing holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Parse a side from storage or user input. Case-insensitive.
    pub fn parse(input: &str) -> Result<Self, PropdeskError> {
        match input.to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(PropdeskError::TradeLog {
                reason: format!("unknown side: {other}"),
            }),
        }
    }
}

/// An immutable executed trade. Append-only per challenge; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: i64,
    pub challenge_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.quantity * self.entry_price
    }
}

/// An order as entered by the user, before it becomes a [`TradeRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
}

impl OrderTicket {
    /// Validate an order against the active challenge. Rejected orders must
    /// not mutate any state; callers only insert the trade after this passes.
    pub fn validate(&self, challenge: &Challenge) -> Result<(), PropdeskError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(PropdeskError::OrderRejected {
                reason: "quantity must be positive".into(),
            });
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PropdeskError::OrderRejected {
                reason: "no valid price for instrument".into(),
            });
        }
        if self.side == Side::Buy && challenge.current_balance < self.notional() {
            return Err(PropdeskError::OrderRejected {
                reason: format!(
                    "insufficient balance: need {:.2}, have {:.2}",
                    self.notional(),
                    challenge.current_balance
                ),
            });
        }
        Ok(())
    }

    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::challenge::sample_challenge;

    fn ticket(side: Side, quantity: f64, price: f64) -> OrderTicket {
        OrderTicket {
            symbol: "AAPL".into(),
            side,
            quantity,
            price,
        }
    }

    #[test]
    fn side_round_trips_through_str() {
        assert_eq!(Side::parse("buy").unwrap(), Side::Buy);
        assert_eq!(Side::parse("SELL").unwrap(), Side::Sell);
        assert_eq!(Side::Buy.as_str(), "buy");
        assert_eq!(Side::Sell.as_str(), "sell");
    }

    #[test]
    fn side_rejects_unknown() {
        assert!(Side::parse("short").is_err());
    }

    #[test]
    fn valid_buy_passes() {
        let challenge = sample_challenge(10000.0);
        assert!(ticket(Side::Buy, 10.0, 100.0).validate(&challenge).is_ok());
    }

    #[test]
    fn zero_quantity_rejected() {
        let challenge = sample_challenge(10000.0);
        let err = ticket(Side::Buy, 0.0, 100.0)
            .validate(&challenge)
            .unwrap_err();
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn negative_quantity_rejected() {
        let challenge = sample_challenge(10000.0);
        assert!(ticket(Side::Sell, -3.0, 100.0).validate(&challenge).is_err());
    }

    #[test]
    fn nan_quantity_rejected() {
        let challenge = sample_challenge(10000.0);
        assert!(ticket(Side::Buy, f64::NAN, 100.0)
            .validate(&challenge)
            .is_err());
    }

    #[test]
    fn buy_exceeding_balance_rejected() {
        let challenge = sample_challenge(500.0);
        let err = ticket(Side::Buy, 10.0, 100.0)
            .validate(&challenge)
            .unwrap_err();
        assert!(err.to_string().contains("insufficient balance"));
    }

    #[test]
    fn sell_is_not_balance_checked() {
        // Sells credit the account; the ledger clamps over-sells instead.
        let challenge = sample_challenge(0.0);
        assert!(ticket(Side::Sell, 10.0, 100.0).validate(&challenge).is_ok());
    }

    #[test]
    fn notional_is_quantity_times_price() {
        let t = ticket(Side::Buy, 2.5, 40.0);
        assert!((t.notional() - 100.0).abs() < f64::EPSILON);
    }
}
