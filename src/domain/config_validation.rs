//! Desk settings: typed view over the INI configuration.

use super::error::PropdeskError;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;

pub const DEFAULT_POLL_INTERVAL_SECS: i64 = 30;

/// Which instruments a price poll should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketSelection {
    /// Everything the feed offers.
    All,
    /// An explicit watchlist.
    Symbols(Vec<String>),
}

/// Validated runtime settings for the desk.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskSettings {
    pub database_path: String,
    pub market_base_url: String,
    pub selection: MarketSelection,
    pub user: String,
    pub poll_interval_secs: u64,
}

/// Parse a comma-separated watchlist. Symbols are upper-cased; empty tokens
/// and duplicates are configuration mistakes, not data to silently fix.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, PropdeskError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(PropdeskError::ConfigInvalid {
                section: "market_data".into(),
                key: "symbols".into(),
                reason: "empty symbol in list".into(),
            });
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(PropdeskError::ConfigInvalid {
                section: "market_data".into(),
                key: "symbols".into(),
                reason: format!("duplicate symbol: {symbol}"),
            });
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PropdeskError> {
    config
        .get_string(section, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PropdeskError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

/// Build and validate [`DeskSettings`] from a configuration source.
pub fn validate_desk_settings(config: &dyn ConfigPort) -> Result<DeskSettings, PropdeskError> {
    let database_path = require(config, "database", "path")?;
    let market_base_url = require(config, "market_data", "base_url")?;
    let user = require(config, "session", "user")?;

    let selection = match config.get_string("market_data", "symbols") {
        Some(list) => MarketSelection::Symbols(parse_symbols(&list)?),
        None => MarketSelection::All,
    };

    let poll_interval_secs =
        config.get_int("session", "poll_interval_secs", DEFAULT_POLL_INTERVAL_SECS);
    if poll_interval_secs <= 0 {
        return Err(PropdeskError::ConfigInvalid {
            section: "session".into(),
            key: "poll_interval_secs".into(),
            reason: format!("must be positive, got {poll_interval_secs}"),
        });
    }

    Ok(DeskSettings {
        database_path,
        market_base_url,
        selection,
        user,
        poll_interval_secs: poll_interval_secs as u64,
    })
}
