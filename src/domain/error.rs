//! Domain error types.

/// Top-level error type for propdesk.
#[derive(Debug, thiserror::Error)]
pub enum PropdeskError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("trade log error: {reason}")]
    TradeLog { reason: String },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("no active challenge for user {user}")]
    NoActiveChallenge { user: String },

    #[error("unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PropdeskError> for std::process::ExitCode {
    fn from(err: &PropdeskError) -> Self {
        let code: u8 = match err {
            PropdeskError::Io(_) => 1,
            PropdeskError::ConfigParse { .. }
            | PropdeskError::ConfigMissing { .. }
            | PropdeskError::ConfigInvalid { .. } => 2,
            PropdeskError::Database { .. } | PropdeskError::DatabaseQuery { .. } => 3,
            PropdeskError::MarketData { .. } => 4,
            PropdeskError::TradeLog { .. } => 5,
            PropdeskError::OrderRejected { .. }
            | PropdeskError::NoActiveChallenge { .. }
            | PropdeskError::UnknownSymbol { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn display_includes_reason() {
        let err = PropdeskError::MarketData {
            reason: "proxy returned 503".into(),
        };
        assert_eq!(err.to_string(), "market data error: proxy returned 503");
    }

    #[test]
    fn order_rejected_display() {
        let err = PropdeskError::OrderRejected {
            reason: "quantity must be positive".into(),
        };
        assert_eq!(err.to_string(), "order rejected: quantity must be positive");
    }

    #[test]
    fn exit_codes_distinguish_classes() {
        let config = PropdeskError::ConfigMissing {
            section: "database".into(),
            key: "path".into(),
        };
        let db = PropdeskError::Database {
            reason: "pool exhausted".into(),
        };
        let order = PropdeskError::OrderRejected {
            reason: "insufficient balance".into(),
        };
        // ExitCode exposes no accessor; compare via Debug formatting.
        assert_eq!(
            format!("{:?}", ExitCode::from(&config)),
            format!("{:?}", ExitCode::from(2u8))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&db)),
            format!("{:?}", ExitCode::from(3u8))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&order)),
            format!("{:?}", ExitCode::from(6u8))
        );
    }
}
