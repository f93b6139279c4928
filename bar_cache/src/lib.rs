//! Local cache in front of a rate-limited market-data API.
//!
//! - [`policy::BarCache`] decides per request whether to serve stored bars,
//!   fetch, or fetch-and-merge.
//! - [`store`] and [`watchlist`] persist to SQLite through diesel.
//! - [`indicators`] computes derived series over bars.
//! - [`metrics`] holds the dashboard headline numbers and maintenance.

pub mod config;
pub mod db;
pub mod errors;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod schema;
pub mod store;
pub mod tz;
pub mod watchlist;
