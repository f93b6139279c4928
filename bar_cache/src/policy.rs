//! Cache policy: serve from the store, fetch, or fetch-and-merge.
//!
//! For a request (symbol, period, interval):
//!
//! 1. Validate the symbol and the granularity. Nothing touches the network or
//!    the store on a bad request.
//! 2. Look up the newest stored bar for the key. If it is no older than
//!    `now - freshness`, serve the stored bars ([`Served::Cache`]).
//! 3. Otherwise fetch the full period, drop malformed bars, merge with
//!    insert-or-ignore and serve what the store now holds ([`Served::Fetched`]).
//! 4. If the fetch fails and stale bars exist, serve them tagged
//!    [`Served::Stale`]. With nothing stored the failure is
//!    [`CacheError::DataUnavailable`].
//!
//! The result is always read back from the store, so callers see exactly the
//! rows a later cache hit would return.

use chrono::{DateTime, Duration, Utc};
use diesel::SqliteConnection;
use market_data_ingestor::{
    models::{
        bar::BarSeries, granularity::Granularity, request_params::BarsRequestParams,
        symbol::normalize_symbol,
    },
    providers::DataProvider,
};
use tracing::{debug, info, warn};

use crate::{
    errors::{CacheError, StaleDataServed, UnavailableCause},
    store::{BarStore, repo::SqliteRepo},
};

/// How a resolution was satisfied.
#[derive(Debug)]
pub enum Served {
    /// Fresh enough; no network call was made.
    Cache,
    /// Fetched and merged; `inserted` rows were new.
    Fetched { inserted: usize },
    /// The fetch failed and older rows were served instead.
    Stale(StaleDataServed),
}

/// Bars for a request plus how they were obtained.
#[derive(Debug)]
pub struct Resolution {
    pub series: BarSeries,
    pub served: Served,
}

impl Resolution {
    pub fn is_stale(&self) -> bool {
        matches!(self.served, Served::Stale(_))
    }

    pub fn stale_warning(&self) -> Option<&StaleDataServed> {
        match &self.served {
            Served::Stale(w) => Some(w),
            _ => None,
        }
    }
}

/// The cache in front of a [`DataProvider`].
///
/// Holds no connection; every call borrows one from the caller for its
/// duration.
pub struct BarCache<P, S = SqliteRepo> {
    provider: P,
    store: S,
}

impl<P: DataProvider> BarCache<P, SqliteRepo> {
    pub fn new(provider: P) -> Self {
        Self::with_store(provider, SqliteRepo::new())
    }
}

impl<P: DataProvider, S: BarStore> BarCache<P, S> {
    pub fn with_store(provider: P, store: S) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves bars for string-typed granularity against the wall clock.
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        period: &str,
        interval: &str,
        freshness: Duration,
    ) -> Result<Resolution, CacheError> {
        self.resolve_at(conn, symbol, period, interval, freshness, Utc::now())
            .await
    }

    /// [`resolve`](Self::resolve) with an explicit "now".
    pub async fn resolve_at(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        period: &str,
        interval: &str,
        freshness: Duration,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CacheError> {
        let granularity = Granularity::parse(period, interval)?;
        self.resolve_granularity(conn, symbol, granularity, freshness, now)
            .await
    }

    /// Core of the policy over an already validated granularity.
    pub async fn resolve_granularity(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
        freshness: Duration,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CacheError> {
        let symbol = validate_symbol(symbol)?;
        let newest = self.store.newest_bar_ts(conn, &symbol, granularity)?;

        if let Some(newest) = newest {
            if newest >= now - freshness {
                let series = self.read_back(conn, &symbol, granularity)?;
                debug!(%symbol, %granularity, %newest, bars = series.len(), "cache hit");
                return Ok(Resolution {
                    series,
                    served: Served::Cache,
                });
            }
            debug!(%symbol, %granularity, %newest, "cache stale");
        } else {
            debug!(%symbol, %granularity, "cache empty");
        }

        let params = BarsRequestParams::for_period(symbol.clone(), granularity, now);
        match self.provider.fetch_bars(params).await {
            Ok(fetched) => self.merge_and_read(conn, &symbol, granularity, fetched),
            Err(cause) => match newest {
                Some(newest) => {
                    warn!(%symbol, %granularity, %newest, error = %cause, "fetch failed, serving stale bars");
                    let series = self.read_back(conn, &symbol, granularity)?;
                    Ok(Resolution {
                        series,
                        served: Served::Stale(StaleDataServed { newest, cause }),
                    })
                }
                None => Err(CacheError::DataUnavailable {
                    symbol,
                    cause: UnavailableCause::Fetch(cause),
                }),
            },
        }
    }

    /// Always fetches, regardless of freshness. A failed fetch is
    /// `DataUnavailable` even when older bars are stored.
    pub async fn refresh(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Resolution, CacheError> {
        self.refresh_at(conn, symbol, granularity, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CacheError> {
        let symbol = validate_symbol(symbol)?;
        let params = BarsRequestParams::for_period(symbol.clone(), granularity, now);
        match self.provider.fetch_bars(params).await {
            Ok(fetched) => self.merge_and_read(conn, &symbol, granularity, fetched),
            Err(cause) => Err(CacheError::DataUnavailable {
                symbol,
                cause: UnavailableCause::Fetch(cause),
            }),
        }
    }

    fn merge_and_read(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
        fetched: BarSeries,
    ) -> Result<Resolution, CacheError> {
        let offered = fetched.len();
        let (good, bad): (Vec<_>, Vec<_>) = fetched.bars.into_iter().partition(|b| b.is_well_formed());
        for b in &bad {
            warn!(
                %symbol, %granularity, ts = %b.timestamp,
                open = b.open, high = b.high, low = b.low, close = b.close,
                "dropping malformed bar"
            );
        }

        // Key the rows by the request, not by whatever the provider echoed.
        let clean = BarSeries {
            symbol: symbol.to_string(),
            granularity,
            bars: good,
        };
        let inserted = self.store.insert_bars_ignore(conn, &clean)?;
        let series = self.read_back(conn, symbol, granularity)?;

        if series.is_empty() {
            return Err(CacheError::DataUnavailable {
                symbol: symbol.to_string(),
                cause: UnavailableCause::NoRows,
            });
        }

        info!(
            %symbol, %granularity,
            offered, dropped = bad.len(), inserted, stored = series.len(),
            "fetched and merged"
        );
        Ok(Resolution {
            series,
            served: Served::Fetched { inserted },
        })
    }

    /// Whole stored history for the key, not just the period's lookback.
    /// Retention is bounded only by `cleanup`.
    fn read_back(
        &self,
        conn: &mut SqliteConnection,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<BarSeries, CacheError> {
        let bars = self.store.load_bars(conn, symbol, granularity, None)?;
        Ok(BarSeries {
            symbol: symbol.to_string(),
            granularity,
            bars,
        })
    }
}

fn validate_symbol(raw: &str) -> Result<String, CacheError> {
    normalize_symbol(raw).ok_or_else(|| CacheError::InvalidSymbol(raw.to_string()))
}
