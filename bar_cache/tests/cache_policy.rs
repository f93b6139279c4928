mod common;

use std::sync::Arc;

use bar_cache::{
    errors::{CacheError, UnavailableCause},
    policy::{BarCache, Served},
    store::{BarStore, repo::SqliteRepo},
};
use chrono::Duration;
use common::{FakeProvider, daily_bars, day0, setup_db};
use market_data_ingestor::models::{bar::Bar, granularity::Granularity};

fn five_days() -> Granularity {
    Granularity::parse("5d", "1d").unwrap()
}

fn fresh() -> Duration {
    Duration::minutes(5)
}

#[tokio::test]
async fn empty_cache_fetches_once_then_serves_from_store() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());
    let now = day0() + Duration::days(4) + Duration::minutes(1);

    let first = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), now)
        .await
        .unwrap();
    assert!(matches!(first.served, Served::Fetched { inserted: 5 }));
    assert_eq!(first.series.len(), 5);
    assert_eq!(provider.fetch_count(), 1);

    let stored = SqliteRepo::new()
        .load_bars(&mut conn, "TEST", five_days(), None)
        .unwrap();
    assert_eq!(stored, daily_bars(5, 100.0));

    let second = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), now)
        .await
        .unwrap();
    assert!(matches!(second.served, Served::Cache));
    assert_eq!(second.series.bars, first.series.bars);
    assert_eq!(provider.fetch_count(), 1, "fresh cache must not fetch");
}

#[tokio::test]
async fn failed_fetch_with_stale_rows_serves_them_tagged() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());

    cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0() + Duration::days(4))
        .await
        .unwrap();

    provider.fail_from_now();
    let later = day0() + Duration::days(10);
    let res = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), later)
        .await
        .unwrap();

    assert!(res.is_stale());
    assert_eq!(res.series.len(), 5);
    let warning = res.stale_warning().unwrap();
    assert_eq!(warning.newest, day0() + Duration::days(4));
    assert_eq!(provider.fetch_count(), 2);
}

#[tokio::test]
async fn failed_fetch_on_empty_cache_is_unavailable() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::failing());
    let cache = BarCache::new(provider.clone());

    let err = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::DataUnavailable {
            cause: UnavailableCause::Fetch(_),
            ..
        }
    ));
    assert_eq!(provider.fetch_count(), 1);
}

#[tokio::test]
async fn empty_fetch_on_empty_cache_is_unavailable() {
    let (_db, mut conn) = setup_db();
    let cache = BarCache::new(FakeProvider::returning(Vec::new()));

    let err = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::DataUnavailable {
            cause: UnavailableCause::NoRows,
            ..
        }
    ));
}

#[tokio::test]
async fn overlapping_fetch_never_rewrites_stored_rows() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());
    cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0() + Duration::days(4))
        .await
        .unwrap();

    // Same timestamps for the first five, different prices throughout.
    provider.set_bars(daily_bars(8, 500.0));
    let res = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0() + Duration::days(8))
        .await
        .unwrap();

    assert!(matches!(res.served, Served::Fetched { inserted: 3 }));
    assert_eq!(res.series.len(), 8);
    assert_eq!(&res.series.bars[..5], &daily_bars(5, 100.0)[..]);
    assert_eq!(&res.series.bars[5..], &daily_bars(8, 500.0)[5..]);
}

#[tokio::test]
async fn malformed_bars_are_dropped_before_merge() {
    let (_db, mut conn) = setup_db();
    let mut bars = daily_bars(4, 100.0);
    // high below close
    bars[1].high = bars[1].close - 10.0;
    bars[2].open = f64::NAN;
    let cache = BarCache::new(FakeProvider::returning(bars.clone()));

    let res = cache
        .resolve_at(&mut conn, "TEST", "5d", "1d", fresh(), day0())
        .await
        .unwrap();

    assert!(matches!(res.served, Served::Fetched { inserted: 2 }));
    let stamps: Vec<_> = res.series.bars.iter().map(|b| b.timestamp).collect();
    assert_eq!(stamps, vec![bars[0].timestamp, bars[3].timestamp]);
}

#[tokio::test]
async fn bad_requests_never_reach_the_provider() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());

    let err = cache
        .resolve_at(&mut conn, "TEST", "1y", "1m", fresh(), day0())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidGranularity(_)));

    let err = cache
        .resolve_at(&mut conn, "TEST", "2w", "1d", fresh(), day0())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidGranularity(_)));

    let err = cache
        .resolve_at(&mut conn, "   ", "5d", "1d", fresh(), day0())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidSymbol(_)));

    assert_eq!(provider.fetch_count(), 0);
}

#[tokio::test]
async fn symbols_are_normalised_and_keys_are_separate() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());
    let now = day0() + Duration::days(4);

    let res = cache
        .resolve_at(&mut conn, " test ", "5d", "1d", fresh(), now)
        .await
        .unwrap();
    assert_eq!(res.series.symbol, "TEST");

    // same symbol, different granularity: its own cache key
    cache
        .resolve_at(&mut conn, "TEST", "1mo", "1d", fresh(), now)
        .await
        .unwrap();
    assert_eq!(provider.fetch_count(), 2);

    let stats = SqliteRepo::new().stats(&mut conn, None).unwrap();
    assert_eq!(stats.bar_rows, 10);
    assert_eq!(stats.symbols, 1);
}

#[tokio::test]
async fn refresh_ignores_freshness_but_not_failures() {
    let (_db, mut conn) = setup_db();
    let provider = Arc::new(FakeProvider::returning(daily_bars(5, 100.0)));
    let cache = BarCache::new(provider.clone());
    let now = day0() + Duration::days(4);

    cache.refresh_at(&mut conn, "TEST", five_days(), now).await.unwrap();
    let again = cache.refresh_at(&mut conn, "TEST", five_days(), now).await.unwrap();
    assert!(matches!(again.served, Served::Fetched { inserted: 0 }));
    assert_eq!(provider.fetch_count(), 2);

    provider.fail_from_now();
    let err = cache
        .refresh_at(&mut conn, "TEST", five_days(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::DataUnavailable { .. }));
}

mod merge_properties {
    use super::*;
    use proptest::prelude::*;

    fn bars_at(days: &[u8], base: f64) -> Vec<Bar> {
        days.iter()
            .map(|&d| {
                let mut b = daily_bars(1, base + d as f64).remove(0);
                b.timestamp = day0() + Duration::days(d as i64);
                b
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn merge_is_union_with_first_write_winning(
            first in proptest::collection::btree_set(0u8..40, 1..15),
            second in proptest::collection::btree_set(0u8..40, 0..15),
        ) {
            let first: Vec<u8> = first.into_iter().collect();
            let second: Vec<u8> = second.into_iter().collect();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let (_db, mut conn) = setup_db();
            let provider = Arc::new(FakeProvider::returning(bars_at(&first, 100.0)));
            let cache = BarCache::new(provider.clone());

            rt.block_on(cache.refresh_at(&mut conn, "PROP", five_days(), day0())).unwrap();
            provider.set_bars(bars_at(&second, 900.0));
            let res = rt.block_on(cache.refresh_at(&mut conn, "PROP", five_days(), day0())).unwrap();

            let mut union: Vec<u8> = first.iter().chain(&second).copied().collect();
            union.sort_unstable();
            union.dedup();
            prop_assert_eq!(res.series.len(), union.len());

            for b in &res.series.bars {
                let day = (b.timestamp - day0()).num_days() as u8;
                let base = if first.contains(&day) { 100.0 } else { 900.0 };
                prop_assert_eq!(b.close, base + day as f64);
            }
            let ts: Vec<_> = res.series.bars.iter().map(|b| b.timestamp).collect();
            prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
