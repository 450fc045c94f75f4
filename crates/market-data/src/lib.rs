//! Daily price history for the feature join.

pub mod yahoo_finance;

pub use yahoo_finance::YahooFinanceClient;
