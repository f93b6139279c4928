use chrono::{DateTime, Utc};
use diesel::{
    dsl::{count_distinct, max},
    prelude::*,
};
use market_data_ingestor::models::{
    bar::{Bar, BarSeries},
    granularity::Granularity,
};
use tracing::debug;

use crate::{
    db::connection::sqlite_path,
    errors::StoreError,
    indicators::IndicatorRow,
    models::{BarRow, IndicatorRecord, NewBarRow, NewIndicatorRecord},
    schema::{stock_bars::dsl as sb, technical_indicators::dsl as ti, watchlist_tickers::dsl as wt},
    store::{BarStore, CleanupReport, StoreResult, StoreStats},
    tz,
};

/// Repository for bars and indicators in a SQLite database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteRepo;

impl SqliteRepo {
    pub fn new() -> Self {
        Self
    }
}

impl BarStore for SqliteRepo {
    fn newest_bar_ts(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let newest: Option<String> = sb::stock_bars
            .filter(sb::symbol.eq(symbol))
            .filter(sb::period.eq(granularity.period().as_str()))
            .filter(sb::interval.eq(granularity.interval().as_str()))
            .select(max(sb::ts))
            .first(conn)?;

        newest
            .map(|s| {
                tz::parse_ts_to_utc(&s).map_err(|source| StoreError::Timestamp {
                    table: "stock_bars",
                    value: s.clone(),
                    source,
                })
            })
            .transpose()
    }

    fn load_bars(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Bar>> {
        let mut query = sb::stock_bars
            .filter(sb::symbol.eq(symbol))
            .filter(sb::period.eq(granularity.period().as_str()))
            .filter(sb::interval.eq(granularity.interval().as_str()))
            .order(sb::ts.desc())
            .select(BarRow::as_select())
            .into_boxed();
        if let Some(n) = limit {
            query = query.limit(n);
        }

        let rows: Vec<BarRow> = query.load(conn)?;
        rows.iter().rev().map(BarRow::to_bar).collect()
    }

    fn insert_bars_ignore(&self, conn: &mut SqliteConnection, series: &BarSeries) -> StoreResult<usize> {
        let rows = series
            .bars
            .iter()
            .map(|b| NewBarRow::from_bar(&series.symbol, series.granularity, b))
            .collect::<StoreResult<Vec<_>>>()?;

        let inserted = conn.immediate_transaction(|conn| {
            let mut inserted = 0;
            for row in &rows {
                inserted += diesel::insert_into(sb::stock_bars)
                    .values(row)
                    .on_conflict((sb::symbol, sb::ts, sb::period, sb::interval))
                    .do_nothing()
                    .execute(conn)?;
            }
            StoreResult::Ok(inserted)
        })?;

        debug!(
            symbol = %series.symbol,
            granularity = %series.granularity,
            offered = rows.len(),
            inserted,
            "merged bars"
        );
        Ok(inserted)
    }

    fn upsert_indicators(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        rows: &[IndicatorRow],
    ) -> StoreResult<usize> {
        let now = Utc::now();
        let records: Vec<NewIndicatorRecord<'_>> = rows
            .iter()
            .map(|r| NewIndicatorRecord::from_row(symbol, r, now))
            .collect();

        conn.immediate_transaction(|conn| {
            let mut written = 0;
            for rec in &records {
                written += diesel::insert_into(ti::technical_indicators)
                    .values(rec)
                    .on_conflict((ti::symbol, ti::ts))
                    .do_update()
                    .set(rec)
                    .execute(conn)?;
            }
            StoreResult::Ok(written)
        })
    }

    fn load_indicators(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        limit: Option<i64>,
    ) -> StoreResult<Vec<IndicatorRow>> {
        let mut query = ti::technical_indicators
            .filter(ti::symbol.eq(symbol))
            .order(ti::ts.desc())
            .select(IndicatorRecord::as_select())
            .into_boxed();
        if let Some(n) = limit {
            query = query.limit(n);
        }

        let records: Vec<IndicatorRecord> = query.load(conn)?;
        records.iter().rev().map(IndicatorRecord::to_row).collect()
    }

    fn available_symbols(&self, conn: &mut SqliteConnection) -> StoreResult<Vec<String>> {
        Ok(sb::stock_bars
            .select(sb::symbol)
            .distinct()
            .order(sb::symbol.asc())
            .load(conn)?)
    }

    fn stats(&self, conn: &mut SqliteConnection, database_path: Option<&str>) -> StoreResult<StoreStats> {
        let bar_rows: i64 = sb::stock_bars.count().get_result(conn)?;
        let indicator_rows: i64 = ti::technical_indicators.count().get_result(conn)?;
        let symbols: i64 = sb::stock_bars.select(count_distinct(sb::symbol)).first(conn)?;
        let watchlist_rows: i64 = wt::watchlist_tickers.count().get_result(conn)?;

        let file_size_bytes = match database_path.map(sqlite_path) {
            Some(p) if !p.is_empty() && p != ":memory:" => Some(std::fs::metadata(p)?.len()),
            _ => None,
        };

        Ok(StoreStats {
            bar_rows,
            indicator_rows,
            symbols,
            watchlist_rows,
            file_size_bytes,
        })
    }

    fn clear_older_than(
        &self,
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<CleanupReport> {
        let cutoff_s = tz::to_rfc3339_millis(cutoff);

        conn.immediate_transaction(|conn| {
            let bars_deleted =
                diesel::delete(sb::stock_bars.filter(sb::created_at.lt(&cutoff_s))).execute(conn)?;
            let indicators_deleted =
                diesel::delete(ti::technical_indicators.filter(ti::created_at.lt(&cutoff_s)))
                    .execute(conn)?;
            StoreResult::Ok(CleanupReport {
                bars_deleted,
                indicators_deleted,
            })
        })
    }
}
