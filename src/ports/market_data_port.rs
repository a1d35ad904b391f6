//! Market data port trait.

use crate::domain::config_validation::MarketSelection;
use crate::domain::error::PropdeskError;
use crate::domain::ticker::PriceTick;
use std::collections::HashMap;

/// Source of price ticks. A poll may legitimately return a partial mapping
/// (feed trouble on some symbols); callers merge into a
/// [`crate::domain::ticker::PriceBoard`] so missing symbols keep their
/// last-known price.
pub trait MarketDataPort {
    fn fetch_tickers(
        &self,
        selection: &MarketSelection,
    ) -> Result<HashMap<String, PriceTick>, PropdeskError>;
}
