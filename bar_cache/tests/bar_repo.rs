mod common;

use bar_cache::{
    indicators::{self, Indicator, IndicatorRow},
    metrics,
    store::{BarStore, repo::SqliteRepo},
};
use chrono::{Duration, Utc};
use common::{daily_bars, day0, setup_db};
use diesel::{RunQueryDsl, connection::SimpleConnection};
use market_data_ingestor::models::{bar::BarSeries, granularity::Granularity};

fn series(symbol: &str, n: usize) -> BarSeries {
    BarSeries {
        symbol: symbol.to_string(),
        granularity: Granularity::parse("3mo", "1d").unwrap(),
        bars: daily_bars(n, 100.0),
    }
}

#[test]
fn insert_ignore_reports_new_rows_only() {
    let (_db, mut conn) = setup_db();
    let repo = SqliteRepo::new();
    let s = series("AAPL", 6);

    assert_eq!(repo.insert_bars_ignore(&mut conn, &s).unwrap(), 6);
    assert_eq!(repo.insert_bars_ignore(&mut conn, &s).unwrap(), 0);

    let newest = repo.newest_bar_ts(&mut conn, "AAPL", s.granularity).unwrap();
    assert_eq!(newest, Some(day0() + Duration::days(5)));

    let other = Granularity::parse("1y", "1d").unwrap();
    assert_eq!(repo.newest_bar_ts(&mut conn, "AAPL", other).unwrap(), None);
}

#[test]
fn load_bars_limit_keeps_newest_in_order() {
    let (_db, mut conn) = setup_db();
    let repo = SqliteRepo::new();
    let s = series("MSFT", 10);
    repo.insert_bars_ignore(&mut conn, &s).unwrap();

    let tail = repo.load_bars(&mut conn, "MSFT", s.granularity, Some(3)).unwrap();
    assert_eq!(tail, s.bars[7..].to_vec());
}

#[test]
fn indicator_upsert_overwrites_previous_values() {
    let (_db, mut conn) = setup_db();
    let repo = SqliteRepo::new();
    let bars = daily_bars(30, 100.0);

    let rows = indicators::compute(&bars, &[Indicator::Sma20]);
    assert_eq!(repo.upsert_indicators(&mut conn, "AAPL", &rows).unwrap(), 30);

    // Recompute with different inputs on the same timestamps.
    let shifted = daily_bars(30, 200.0);
    let rows2 = indicators::compute(&shifted, &[Indicator::Sma20, Indicator::Rsi14]);
    repo.upsert_indicators(&mut conn, "AAPL", &rows2).unwrap();

    let stored: Vec<IndicatorRow> = repo.load_indicators(&mut conn, "AAPL", None).unwrap();
    assert_eq!(stored.len(), 30);
    assert_eq!(stored, rows2);
    assert!(stored[0].sma_20.is_none());
    assert!(stored[29].sma_20.unwrap() > 200.0);

    let last_two = repo.load_indicators(&mut conn, "AAPL", Some(2)).unwrap();
    assert_eq!(last_two, rows2[28..].to_vec());
}

#[test]
fn available_symbols_and_stats() {
    let (db, mut conn) = setup_db();
    let repo = SqliteRepo::new();
    repo.insert_bars_ignore(&mut conn, &series("TSLA", 3)).unwrap();
    repo.insert_bars_ignore(&mut conn, &series("AAPL", 2)).unwrap();

    assert_eq!(
        metrics::available_tickers(&repo, &mut conn).unwrap(),
        vec!["AAPL".to_string(), "TSLA".to_string()]
    );

    let stats = repo.stats(&mut conn, Some(&db.path)).unwrap();
    assert_eq!(stats.bar_rows, 5);
    assert_eq!(stats.symbols, 2);
    assert_eq!(stats.indicator_rows, 0);
    assert_eq!(stats.watchlist_rows, 0);
    assert!(stats.file_size_bytes.unwrap() > 0);
}

#[test]
fn cleanup_deletes_only_rows_older_than_cutoff() {
    let (_db, mut conn) = setup_db();
    let repo = SqliteRepo::new();
    repo.insert_bars_ignore(&mut conn, &series("OLD", 4)).unwrap();
    repo.insert_bars_ignore(&mut conn, &series("NEW", 3)).unwrap();
    let rows = indicators::compute(&daily_bars(4, 100.0), &[Indicator::Ema20]);
    repo.upsert_indicators(&mut conn, "OLD", &rows).unwrap();

    conn.batch_execute(
        "UPDATE stock_bars SET created_at = '2020-01-01T00:00:00.000Z' WHERE symbol = 'OLD';
         UPDATE technical_indicators SET created_at = '2020-01-01T00:00:00.000Z';",
    )
    .unwrap();

    let report = metrics::cleanup(&repo, &mut conn, 30, Utc::now()).unwrap();
    assert_eq!(report.bars_deleted, 4);
    assert_eq!(report.indicators_deleted, 4);

    assert_eq!(
        repo.available_symbols(&mut conn).unwrap(),
        vec!["NEW".to_string()]
    );

    // nothing left that old
    let again = metrics::cleanup(&repo, &mut conn, 30, Utc::now()).unwrap();
    assert_eq!(again.bars_deleted, 0);
}

#[test]
fn volume_check_constraint_holds() {
    let (_db, mut conn) = setup_db();
    let res = diesel::sql_query(
        "INSERT INTO stock_bars (symbol, ts, open, high, low, close, volume, period, interval)
         VALUES ('BAD', '2024-01-02T14:30:00.000Z', 1, 2, 0.5, 1.5, -1, '5d', '1d')",
    )
    .execute(&mut conn);
    assert!(res.is_err());
}
