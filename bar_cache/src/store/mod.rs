//! Bar and indicator repository (SQLite).
//!
//! The store is the single source the cache policy serves from. Bars are
//! written insert-or-ignore on their identity key (symbol, ts, period,
//! interval), so a stored bar never changes. Indicator rows are derived and
//! overwritten on every recompute.
use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use market_data_ingestor::models::{
    bar::{Bar, BarSeries},
    granularity::Granularity,
};
use serde::Serialize;

use crate::{errors::StoreError, indicators::IndicatorRow};

pub mod repo;

/// Result type used throughout the store.
pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts and file size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub bar_rows: i64,
    pub indicator_rows: i64,
    pub symbols: i64,
    pub watchlist_rows: i64,
    /// `None` for in-memory databases.
    pub file_size_bytes: Option<u64>,
}

/// Rows removed by [`BarStore::clear_older_than`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub bars_deleted: usize,
    pub indicators_deleted: usize,
}

/// Portable surface, SQLite implementation lives in `repo.rs`.
pub trait BarStore {
    /// Timestamp of the newest stored bar for the key, if any.
    fn newest_bar_ts(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Stored bars for the key, oldest first. With `limit`, only the newest
    /// `limit` bars (still oldest first).
    fn load_bars(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Bar>>;

    /// Inserts every bar of `series` that is not already stored, in one
    /// immediate transaction. Returns how many rows were new.
    fn insert_bars_ignore(&self, conn: &mut SqliteConnection, series: &BarSeries) -> StoreResult<usize>;

    /// Writes indicator rows, replacing any stored row with the same (symbol, ts).
    fn upsert_indicators(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        rows: &[IndicatorRow],
    ) -> StoreResult<usize>;

    /// Stored indicator rows for `symbol`, oldest first, optionally only the newest `limit`.
    fn load_indicators(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        limit: Option<i64>,
    ) -> StoreResult<Vec<IndicatorRow>>;

    /// Distinct symbols with at least one stored bar, sorted.
    fn available_symbols(&self, conn: &mut SqliteConnection) -> StoreResult<Vec<String>>;

    /// Row counts, plus the size of the file at `database_path` if given.
    fn stats(&self, conn: &mut SqliteConnection, database_path: Option<&str>) -> StoreResult<StoreStats>;

    /// Deletes bars and indicator rows written before `cutoff`.
    fn clear_older_than(
        &self,
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<CleanupReport>;
}
