//! Error types for the store and the cache policy.

use chrono::{DateTime, Utc};
use market_data_ingestor::{models::granularity::GranularityError, providers::ProviderError};
use thiserror::Error;

use crate::indicators::UnknownIndicator;

/// Failures of the local SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("stored timestamp {value:?} in {table} is not RFC 3339: {source}")]
    Timestamp {
        table: &'static str,
        value: String,
        source: chrono::ParseError,
    },

    #[error("stored granularity {period}/{interval} is invalid: {source}")]
    Granularity {
        period: String,
        interval: String,
        source: GranularityError,
    },

    #[error("volume {0} does not fit in a BIGINT column")]
    VolumeOverflow(u64),

    #[error("could not stat database file: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a resolution produced nothing to serve.
#[derive(Debug, Error)]
pub enum UnavailableCause {
    #[error("fetch failed: {0}")]
    Fetch(#[source] ProviderError),

    #[error("no rows")]
    NoRows,
}

/// A fetch failed but older cached rows were served instead.
///
/// Attached to a successful resolution; never returned as an `Err`.
#[derive(Debug, Error)]
#[error("serving stale data (newest bar {newest}): {cause}")]
pub struct StaleDataServed {
    pub newest: DateTime<Utc>,
    #[source]
    pub cause: ProviderError,
}

/// Errors surfaced by [`BarCache`](crate::policy::BarCache) and the indicator evaluator.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no data available for {symbol}: {cause}")]
    DataUnavailable {
        symbol: String,
        #[source]
        cause: UnavailableCause,
    },

    #[error(transparent)]
    UnknownIndicator(#[from] UnknownIndicator),

    #[error("invalid granularity: {0}")]
    InvalidGranularity(#[from] GranularityError),

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for CacheError {
    fn from(e: diesel::result::Error) -> Self {
        CacheError::Store(StoreError::Diesel(e))
    }
}
