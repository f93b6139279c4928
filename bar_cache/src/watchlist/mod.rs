//! Watchlist: user-curated tickers with notes, targets and priorities.
//!
//! Tickers are validated against the provider before they are stored, so the
//! list only ever holds symbols the dashboard can chart. Persistence goes
//! through [`WatchlistRepo`]; the SQLite implementation lives in `repo.rs`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use indexmap::IndexMap;
use market_data_ingestor::{
    models::symbol::normalize_symbol,
    providers::{DataProvider, ProviderError},
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    errors::StoreError,
    models::{WatchlistChangeset, WatchlistTicker},
};

pub mod repo;

pub const DEFAULT_PRIORITY: i32 = 3;
const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("invalid ticker symbol: {0:?}")]
    InvalidTicker(String),

    #[error("ticker {ticker:?} not found: {source}")]
    Validation {
        ticker: String,
        #[source]
        source: ProviderError,
    },

    #[error("ticker {0:?} is already in the watchlist")]
    Duplicate(String),

    #[error("ticker {0:?} is not in the watchlist")]
    NotFound(String),

    #[error("priority must be between 1 and 5, got {0}")]
    InvalidPriority(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for WatchlistError {
    fn from(e: diesel::result::Error) -> Self {
        WatchlistError::Store(StoreError::Diesel(e))
    }
}

pub type WatchlistResult<T> = Result<T, WatchlistError>;

/// What the provider told us about a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTicker {
    pub ticker: String,
    pub company_name: String,
}

/// Input for [`add`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicker {
    pub ticker: String,
    pub sector: Option<String>,
    pub notes: Option<String>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub priority: i32,
}

impl NewTicker {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            sector: None,
            notes: None,
            target_price: None,
            stop_loss: None,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Aggregate view of the active watchlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatchlistSummary {
    pub total_tickers: usize,
    /// Ticker count per sector, first-seen order; missing sectors count as "Unknown".
    pub sectors: IndexMap<String, usize>,
    pub priority_distribution: BTreeMap<i32, usize>,
    pub tickers: Vec<WatchlistTicker>,
}

/// Portable surface, SQLite implementation lives in `repo.rs`.
pub trait WatchlistRepo {
    fn insert(
        &self,
        conn: &mut SqliteConnection,
        validated: &ValidatedTicker,
        new: &NewTicker,
        added_at: DateTime<Utc>,
    ) -> WatchlistResult<WatchlistTicker>;

    fn find(&self, conn: &mut SqliteConnection, ticker: &str) -> WatchlistResult<Option<WatchlistTicker>>;

    /// Newest first.
    fn list(&self, conn: &mut SqliteConnection, active_only: bool) -> WatchlistResult<Vec<WatchlistTicker>>;

    /// Returns whether a row was deleted.
    fn delete(&self, conn: &mut SqliteConnection, ticker: &str) -> WatchlistResult<bool>;

    /// Applies `changes`; `None` when the ticker is absent.
    fn update(
        &self,
        conn: &mut SqliteConnection,
        ticker: &str,
        changes: &WatchlistChangeset,
    ) -> WatchlistResult<Option<WatchlistTicker>>;
}

fn check_priority(p: i32) -> WatchlistResult<()> {
    if PRIORITY_RANGE.contains(&p) {
        Ok(())
    } else {
        Err(WatchlistError::InvalidPriority(p))
    }
}

fn clean_ticker(raw: &str) -> WatchlistResult<String> {
    normalize_symbol(raw).ok_or_else(|| WatchlistError::InvalidTicker(raw.to_string()))
}

/// Normalises `raw` and asks the provider whether it exists.
pub async fn validate_ticker<P: DataProvider + ?Sized>(
    provider: &P,
    raw: &str,
) -> WatchlistResult<ValidatedTicker> {
    let ticker = clean_ticker(raw)?;
    let info = provider
        .symbol_info(&ticker)
        .await
        .map_err(|source| WatchlistError::Validation {
            ticker: ticker.clone(),
            source,
        })?;

    Ok(ValidatedTicker {
        company_name: info.name.unwrap_or_else(|| ticker.clone()),
        ticker,
    })
}

/// Validates and stores a new ticker. Duplicates and out-of-range priorities
/// are rejected before the provider is called.
pub async fn add<P, R>(
    provider: &P,
    repo: &R,
    conn: &mut SqliteConnection,
    mut new: NewTicker,
) -> WatchlistResult<WatchlistTicker>
where
    P: DataProvider + ?Sized,
    R: WatchlistRepo,
{
    check_priority(new.priority)?;
    new.ticker = clean_ticker(&new.ticker)?;
    if repo.find(conn, &new.ticker)?.is_some() {
        return Err(WatchlistError::Duplicate(new.ticker));
    }

    let validated = validate_ticker(provider, &new.ticker).await?;
    let row = repo.insert(conn, &validated, &new, Utc::now())?;
    info!(ticker = %row.ticker, company = %row.company_name, priority = row.priority, "added to watchlist");
    Ok(row)
}

pub fn list<R: WatchlistRepo>(
    repo: &R,
    conn: &mut SqliteConnection,
    active_only: bool,
) -> WatchlistResult<Vec<WatchlistTicker>> {
    repo.list(conn, active_only)
}

pub fn remove<R: WatchlistRepo>(repo: &R, conn: &mut SqliteConnection, ticker: &str) -> WatchlistResult<()> {
    let ticker = clean_ticker(ticker)?;
    if repo.delete(conn, &ticker)? {
        info!(%ticker, "removed from watchlist");
        Ok(())
    } else {
        Err(WatchlistError::NotFound(ticker))
    }
}

/// Applies a partial update. An empty changeset returns the row unchanged.
pub fn update<R: WatchlistRepo>(
    repo: &R,
    conn: &mut SqliteConnection,
    ticker: &str,
    changes: &WatchlistChangeset,
) -> WatchlistResult<WatchlistTicker> {
    let ticker = clean_ticker(ticker)?;
    if let Some(p) = changes.priority {
        check_priority(p)?;
    }

    let updated = if changes.is_empty() {
        repo.find(conn, &ticker)?
    } else {
        repo.update(conn, &ticker, changes)?
    };
    updated.ok_or(WatchlistError::NotFound(ticker))
}

/// Most recently added active ticker.
pub fn most_recent<R: WatchlistRepo>(repo: &R, conn: &mut SqliteConnection) -> WatchlistResult<Option<String>> {
    Ok(repo.list(conn, true)?.into_iter().next().map(|t| t.ticker))
}

pub fn summary<R: WatchlistRepo>(repo: &R, conn: &mut SqliteConnection) -> WatchlistResult<WatchlistSummary> {
    let tickers = repo.list(conn, true)?;

    let mut sectors: IndexMap<String, usize> = IndexMap::new();
    let mut priority_distribution = BTreeMap::new();
    for t in &tickers {
        let sector = t.sector.clone().unwrap_or_else(|| "Unknown".to_string());
        *sectors.entry(sector).or_default() += 1;
        *priority_distribution.entry(t.priority).or_default() += 1;
    }

    Ok(WatchlistSummary {
        total_tickers: tickers.len(),
        sectors,
        priority_distribution,
        tickers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_bounds() {
        assert!(check_priority(1).is_ok());
        assert!(check_priority(5).is_ok());
        assert!(matches!(check_priority(0), Err(WatchlistError::InvalidPriority(0))));
        assert!(matches!(check_priority(6), Err(WatchlistError::InvalidPriority(6))));
    }

    #[test]
    fn tickers_are_normalised() {
        assert_eq!(clean_ticker(" msft ").unwrap(), "MSFT");
        assert!(matches!(clean_ticker(""), Err(WatchlistError::InvalidTicker(_))));
    }
}
