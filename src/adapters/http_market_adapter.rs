//! HTTP market-data proxy adapter.
//!
//! Speaks the proxy's JSON contract: POST `/api/market-data` with an
//! optional symbol list, response `{success, data, error}` keyed by symbol.
//! Every failure maps to [`PropdeskError::MarketData`]; the caller treats it
//! as transient and retries on the next scheduled poll.

use crate::domain::config_validation::MarketSelection;
use crate::domain::error::PropdeskError;
use crate::domain::ticker::{MarketState, PriceTick};
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct TickerRequest<'a> {
    symbols: Option<&'a [String]>,
    market: &'a str,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    success: bool,
    #[serde(default)]
    data: HashMap<String, TickerPayload>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerPayload {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    price: f64,
    #[serde(default)]
    change: f64,
    #[serde(default)]
    change_percent: f64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    market_state: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// The proxy emits local ISO timestamps without an offset; accept both.
/// Unparseable values fall back to receipt time rather than failing the poll.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|text| {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    })
    .unwrap_or_else(Utc::now)
}

fn tick_from_payload(payload: TickerPayload) -> PriceTick {
    let market_state = payload
        .market_state
        .as_deref()
        .map(MarketState::parse)
        .unwrap_or(MarketState::Unknown);
    PriceTick {
        timestamp: parse_timestamp(payload.timestamp.as_deref()),
        symbol: payload.symbol,
        name: payload.name,
        price: payload.price,
        change: payload.change,
        change_percent: payload.change_percent,
        currency: payload.currency.unwrap_or_else(|| "USD".into()),
        market_state,
    }
}

/// Decode a proxy response body into ticks. Symbols whose payload carries a
/// non-positive price are dropped; the rest of the batch still applies.
pub fn parse_ticker_response(body: &str) -> Result<HashMap<String, PriceTick>, PropdeskError> {
    let response: TickerResponse =
        serde_json::from_str(body).map_err(|e| PropdeskError::MarketData {
            reason: format!("malformed response: {e}"),
        })?;

    if !response.success {
        return Err(PropdeskError::MarketData {
            reason: response
                .error
                .unwrap_or_else(|| "proxy reported failure".into()),
        });
    }

    Ok(response
        .data
        .into_iter()
        .filter(|(_, payload)| payload.price > 0.0)
        .map(|(symbol, payload)| (symbol, tick_from_payload(payload)))
        .collect())
}

pub struct HttpMarketAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpMarketAdapter {
    pub fn new(base_url: &str) -> Result<Self, PropdeskError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PropdeskError::MarketData {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl MarketDataPort for HttpMarketAdapter {
    fn fetch_tickers(
        &self,
        selection: &MarketSelection,
    ) -> Result<HashMap<String, PriceTick>, PropdeskError> {
        let symbols = match selection {
            MarketSelection::All => None,
            MarketSelection::Symbols(list) => Some(list.as_slice()),
        };
        let request = TickerRequest {
            symbols,
            market: "all",
        };

        let response = self
            .client
            .post(format!("{}/api/market-data", self.base_url))
            .json(&request)
            .send()
            .map_err(|e| PropdeskError::MarketData {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PropdeskError::MarketData {
                reason: format!("proxy returned {status}"),
            });
        }

        let body = response.text().map_err(|e| PropdeskError::MarketData {
            reason: e.to_string(),
        })?;
        parse_ticker_response(&body)
    }
}
