pub mod challenge_port;
pub mod config_port;
pub mod market_data_port;
pub mod trade_store_port;
