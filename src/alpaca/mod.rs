//! Alpaca module - REST and market-data stream clients for the brokerage

pub mod messages;
pub mod rest;
pub mod stream;

pub use rest::{AlpacaConnector, AlpacaRestClient};
pub use stream::AlpacaStreamClient;
