//! Folio - portfolio accounting engine for crypto and fiat ledgers
//!
//! Replays a ledger of buys, sells, swaps, transfers and interest against
//! historical prices to produce daily quantities, daily portfolio value and
//! contributed cash per settlement currency, and the cost basis of every open
//! position under weighted-average, FIFO or LIFO.

pub mod anomaly;
pub mod cli;
pub mod config;
pub mod cost_basis;
pub mod dispatcher;
pub mod error;
pub mod importers;
pub mod ledger;
pub mod pricing;
pub mod reports;
pub mod timeline;
pub mod utils;
