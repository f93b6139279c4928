//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`]:
//! - [`crate::schema::stock_bars`]: fetched OHLCV bars, unique per (symbol, ts, period, interval)
//! - [`crate::schema::technical_indicators`]: derived indicator values, unique per (symbol, ts)
//! - [`crate::schema::watchlist_tickers`]: user-curated tickers
//!
//! Timestamps are RFC 3339 UTC text (see [`crate::tz`]).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use market_data_ingestor::models::{bar::Bar, granularity::Granularity};
use serde::Serialize;

use crate::{errors::StoreError, indicators::IndicatorRow, schema::*, tz};

/// A row in [`crate::schema::stock_bars`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = stock_bars, check_for_backend(diesel::sqlite::Sqlite))]
pub struct BarRow {
    /// Database primary key.
    pub id: i32,
    /// Upper-cased ticker.
    pub symbol: String,
    /// Bar open time, RFC 3339 UTC.
    pub ts: String,
    /// Opening price.
    pub open: f64,
    /// High.
    pub high: f64,
    /// Low.
    pub low: f64,
    /// Close.
    pub close: f64,
    /// Shares traded.
    pub volume: i64,
    /// Period string, e.g. "6mo".
    pub period: String,
    /// Interval string, e.g. "1d".
    pub interval: String,
    /// When the row was first written.
    pub created_at: String,
}

impl BarRow {
    /// Converts back to the in-memory bar.
    pub fn to_bar(&self) -> Result<Bar, StoreError> {
        Ok(Bar {
            timestamp: parse_ts("stock_bars", &self.ts)?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume.max(0) as u64,
        })
    }
}

/// Insertable form of [`BarRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stock_bars)]
pub struct NewBarRow<'a> {
    /// Upper-cased ticker.
    pub symbol: &'a str,
    /// RFC 3339 UTC, millisecond precision.
    pub ts: String,
    /// Opening price.
    pub open: f64,
    /// High.
    pub high: f64,
    /// Low.
    pub low: f64,
    /// Close.
    pub close: f64,
    /// Shares traded.
    pub volume: i64,
    /// Period string.
    pub period: &'static str,
    /// Interval string.
    pub interval: &'static str,
}

impl<'a> NewBarRow<'a> {
    /// Builds the row for `bar` under the full identity key.
    pub fn from_bar(symbol: &'a str, granularity: Granularity, bar: &Bar) -> Result<Self, StoreError> {
        let volume = i64::try_from(bar.volume).map_err(|_| StoreError::VolumeOverflow(bar.volume))?;
        Ok(Self {
            symbol,
            ts: tz::to_rfc3339_millis(bar.timestamp),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume,
            period: granularity.period().as_str(),
            interval: granularity.interval().as_str(),
        })
    }
}

/// A row in [`crate::schema::technical_indicators`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = technical_indicators, check_for_backend(diesel::sqlite::Sqlite))]
pub struct IndicatorRecord {
    /// Database primary key.
    pub id: i32,
    /// Upper-cased ticker.
    pub symbol: String,
    /// Bar timestamp the values belong to.
    pub ts: String,
    /// Simple moving average, 20 bars.
    pub sma_20: Option<f64>,
    /// Simple moving average, 50 bars.
    pub sma_50: Option<f64>,
    /// Simple moving average, 100 bars.
    pub sma_100: Option<f64>,
    /// Simple moving average, 200 bars.
    pub sma_200: Option<f64>,
    /// Exponential moving average, 20 bars.
    pub ema_20: Option<f64>,
    /// RSI, 14 bars.
    pub rsi_14: Option<f64>,
    /// RSI, 21 bars.
    pub rsi_21: Option<f64>,
    /// MACD line (12/26).
    pub macd: Option<f64>,
    /// MACD signal line (9).
    pub macd_signal: Option<f64>,
    /// Bollinger upper band.
    pub bb_upper: Option<f64>,
    /// Bollinger middle band.
    pub bb_middle: Option<f64>,
    /// Bollinger lower band.
    pub bb_lower: Option<f64>,
    /// When the row was last written.
    pub created_at: String,
}

impl IndicatorRecord {
    /// Converts back to the evaluator's row type.
    pub fn to_row(&self) -> Result<IndicatorRow, StoreError> {
        Ok(IndicatorRow {
            timestamp: parse_ts("technical_indicators", &self.ts)?,
            sma_20: self.sma_20,
            sma_50: self.sma_50,
            sma_100: self.sma_100,
            sma_200: self.sma_200,
            ema_20: self.ema_20,
            rsi_14: self.rsi_14,
            rsi_21: self.rsi_21,
            macd: self.macd,
            macd_signal: self.macd_signal,
            bb_upper: self.bb_upper,
            bb_middle: self.bb_middle,
            bb_lower: self.bb_lower,
        })
    }
}

/// Insertable/updatable form of [`IndicatorRecord`].
///
/// `None` is written as NULL on update so a recompute fully replaces the row.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = technical_indicators, treat_none_as_null = true)]
pub struct NewIndicatorRecord<'a> {
    /// Upper-cased ticker.
    pub symbol: &'a str,
    /// RFC 3339 UTC.
    pub ts: String,
    /// See [`IndicatorRecord::sma_20`].
    pub sma_20: Option<f64>,
    /// See [`IndicatorRecord::sma_50`].
    pub sma_50: Option<f64>,
    /// See [`IndicatorRecord::sma_100`].
    pub sma_100: Option<f64>,
    /// See [`IndicatorRecord::sma_200`].
    pub sma_200: Option<f64>,
    /// See [`IndicatorRecord::ema_20`].
    pub ema_20: Option<f64>,
    /// See [`IndicatorRecord::rsi_14`].
    pub rsi_14: Option<f64>,
    /// See [`IndicatorRecord::rsi_21`].
    pub rsi_21: Option<f64>,
    /// See [`IndicatorRecord::macd`].
    pub macd: Option<f64>,
    /// See [`IndicatorRecord::macd_signal`].
    pub macd_signal: Option<f64>,
    /// See [`IndicatorRecord::bb_upper`].
    pub bb_upper: Option<f64>,
    /// See [`IndicatorRecord::bb_middle`].
    pub bb_middle: Option<f64>,
    /// See [`IndicatorRecord::bb_lower`].
    pub bb_lower: Option<f64>,
    /// Refreshed on every write.
    pub created_at: String,
}

impl<'a> NewIndicatorRecord<'a> {
    /// Builds the row for `row`, stamped with `written_at`.
    pub fn from_row(symbol: &'a str, row: &IndicatorRow, written_at: DateTime<Utc>) -> Self {
        Self {
            symbol,
            ts: tz::to_rfc3339_millis(row.timestamp),
            sma_20: row.sma_20,
            sma_50: row.sma_50,
            sma_100: row.sma_100,
            sma_200: row.sma_200,
            ema_20: row.ema_20,
            rsi_14: row.rsi_14,
            rsi_21: row.rsi_21,
            macd: row.macd,
            macd_signal: row.macd_signal,
            bb_upper: row.bb_upper,
            bb_middle: row.bb_middle,
            bb_lower: row.bb_lower,
            created_at: tz::to_rfc3339_millis(written_at),
        }
    }
}

/// A row in [`crate::schema::watchlist_tickers`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = watchlist_tickers, check_for_backend(diesel::sqlite::Sqlite))]
pub struct WatchlistTicker {
    /// Database primary key.
    pub id: i32,
    /// Upper-cased ticker, unique.
    pub ticker: String,
    /// Company name as reported by the provider.
    pub company_name: String,
    /// Optional sector label.
    pub sector: Option<String>,
    /// When the ticker was added, RFC 3339 UTC.
    pub added_date: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Optional price target.
    pub target_price: Option<f64>,
    /// Optional stop loss.
    pub stop_loss: Option<f64>,
    /// Inactive tickers are kept but hidden from the active list.
    pub is_active: bool,
    /// 1 (highest) ..= 5.
    pub priority: i32,
    /// Row creation timestamp.
    pub created_at: String,
    /// Maintained by trigger on UPDATE.
    pub updated_at: String,
}

/// Insertable form of [`WatchlistTicker`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = watchlist_tickers)]
pub struct NewWatchlistTicker<'a> {
    /// Upper-cased ticker.
    pub ticker: &'a str,
    /// Company name.
    pub company_name: &'a str,
    /// Optional sector label.
    pub sector: Option<&'a str>,
    /// RFC 3339 UTC.
    pub added_date: String,
    /// Free-form notes.
    pub notes: Option<&'a str>,
    /// Optional price target.
    pub target_price: Option<f64>,
    /// Optional stop loss.
    pub stop_loss: Option<f64>,
    /// Always true on insert.
    pub is_active: bool,
    /// 1 ..= 5.
    pub priority: i32,
}

/// Partial update of a watchlist row. Outer `None` leaves the column untouched;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = watchlist_tickers)]
pub struct WatchlistChangeset {
    /// New notes.
    pub notes: Option<Option<String>>,
    /// New price target.
    pub target_price: Option<Option<f64>>,
    /// New stop loss.
    pub stop_loss: Option<Option<f64>>,
    /// New priority, validated by the caller.
    pub priority: Option<i32>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
}

impl WatchlistChangeset {
    /// True when the update would not touch any column.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_ts(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    tz::parse_ts_to_utc(value).map_err(|source| StoreError::Timestamp {
        table,
        value: value.to_string(),
        source,
    })
}
