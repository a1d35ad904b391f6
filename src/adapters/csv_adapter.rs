//! CSV trade-log adapter.
//!
//! Imports and exports a challenge's trade log as
//! `symbol,side,quantity,entry_price,created_at` with RFC 3339 timestamps.

use crate::domain::error::PropdeskError;
use crate::domain::trade::{Side, TradeRecord};
use crate::ports::trade_store_port::NewTrade;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;

const HEADERS: [&str; 5] = ["symbol", "side", "quantity", "entry_price", "created_at"];

fn log_err(reason: String) -> PropdeskError {
    PropdeskError::TradeLog { reason }
}

/// Read a trade log for one challenge. Rows must be oldest-first, the same
/// order the store keeps; callers insert them in file order.
pub fn read_trade_log<P: AsRef<Path>>(
    path: P,
    challenge_id: &str,
) -> Result<Vec<NewTrade>, PropdeskError> {
    let file = File::open(&path).map_err(|e| {
        log_err(format!("failed to open {}: {e}", path.as_ref().display()))
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| log_err(format!("CSV parse error: {e}")))?
        .clone();
    if headers.iter().ne(HEADERS) {
        return Err(log_err(format!(
            "unexpected columns: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut trades = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = result.map_err(|e| log_err(format!("CSV parse error: {e}")))?;

        let field = |column: usize| {
            record
                .get(column)
                .ok_or_else(|| log_err(format!("line {line}: missing column {}", HEADERS[column])))
        };

        let symbol = field(0)?.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(log_err(format!("line {line}: empty symbol")));
        }
        let side = Side::parse(field(1)?)
            .map_err(|e| log_err(format!("line {line}: {e}")))?;
        let quantity: f64 = field(2)?
            .parse()
            .map_err(|e| log_err(format!("line {line}: invalid quantity: {e}")))?;
        if !(quantity > 0.0) {
            return Err(log_err(format!("line {line}: quantity must be positive")));
        }
        let entry_price: f64 = field(3)?
            .parse()
            .map_err(|e| log_err(format!("line {line}: invalid entry_price: {e}")))?;
        if !(entry_price > 0.0) {
            return Err(log_err(format!("line {line}: entry_price must be positive")));
        }
        let created_at = DateTime::parse_from_rfc3339(field(4)?)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| log_err(format!("line {line}: invalid created_at: {e}")))?;

        trades.push(NewTrade {
            challenge_id: challenge_id.to_string(),
            symbol,
            side,
            quantity,
            entry_price,
            created_at,
        });
    }

    Ok(trades)
}

/// Write a trade log, oldest first.
pub fn write_trade_log<P: AsRef<Path>>(
    path: P,
    trades: &[TradeRecord],
) -> Result<(), PropdeskError> {
    let file = File::create(&path).map_err(|e| {
        log_err(format!("failed to create {}: {e}", path.as_ref().display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(HEADERS)
        .map_err(|e| log_err(format!("CSV write error: {e}")))?;
    for trade in trades {
        writer
            .write_record([
                trade.symbol.clone(),
                trade.side.as_str().to_string(),
                trade.quantity.to_string(),
                trade.entry_price.to_string(),
                trade.created_at.to_rfc3339(),
            ])
            .map_err(|e| log_err(format!("CSV write error: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| log_err(format!("CSV write error: {e}")))?;
    Ok(())
}
