#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bar_cache::db::{connection, migrate};
use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use market_data_ingestor::{
    models::{
        bar::{Bar, BarSeries},
        request_params::BarsRequestParams,
        symbol::SymbolInfo,
    },
    providers::{ApiSnafu, DataProvider, ProviderError, SymbolNotFoundSnafu},
};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// Session open of 2024-03-04 (a Monday), 14:30 UTC.
pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
}

/// `n` consecutive daily bars starting at [`day0`], closes rising from `base`.
pub fn daily_bars(n: usize, base: f64) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = base + i as f64;
            Bar {
                timestamp: day0() + Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000 + i as u64,
            }
        })
        .collect()
}

enum Script {
    Bars(Vec<Bar>),
    Fail,
}

/// In-memory provider that records how often it was called.
pub struct FakeProvider {
    script: Mutex<Script>,
    fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn returning(bars: Vec<Bar>) -> Self {
        Self {
            script: Mutex::new(Script::Bars(bars)),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Mutex::new(Script::Fail),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_bars(&self, bars: Vec<Bar>) {
        *self.script.lock().unwrap() = Script::Bars(bars);
    }

    pub fn fail_from_now(&self) {
        *self.script.lock().unwrap() = Script::Fail;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let bars = match &*self.script.lock().unwrap() {
            Script::Bars(bars) => bars.clone(),
            Script::Fail => {
                return ApiSnafu {
                    message: "upstream unavailable",
                }
                .fail();
            }
        };
        Ok(BarSeries {
            symbol: params.symbol,
            granularity: params.granularity,
            bars,
        })
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, ProviderError> {
        if symbol.starts_with("ZZ") {
            return SymbolNotFoundSnafu { symbol }.fail();
        }
        Ok(SymbolInfo {
            symbol: symbol.to_string(),
            name: Some(format!("{symbol} Inc.")),
            exchange: Some("NMS".to_string()),
            instrument_type: Some("EQUITY".to_string()),
            currency: Some("USD".to_string()),
        })
    }
}
