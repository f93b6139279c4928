use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};

use crate::{
    models::{NewWatchlistTicker, WatchlistChangeset, WatchlistTicker},
    schema::watchlist_tickers::dsl as wt,
    tz,
    watchlist::{NewTicker, ValidatedTicker, WatchlistError, WatchlistRepo, WatchlistResult},
};

/// Watchlist persistence in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteWatchlistRepo;

impl SqliteWatchlistRepo {
    pub fn new() -> Self {
        Self
    }
}

impl WatchlistRepo for SqliteWatchlistRepo {
    fn insert(
        &self,
        conn: &mut SqliteConnection,
        validated: &ValidatedTicker,
        new: &NewTicker,
        added_at: DateTime<Utc>,
    ) -> WatchlistResult<WatchlistTicker> {
        let row = NewWatchlistTicker {
            ticker: &validated.ticker,
            company_name: &validated.company_name,
            sector: new.sector.as_deref(),
            added_date: tz::to_rfc3339_millis(added_at),
            notes: new.notes.as_deref(),
            target_price: new.target_price,
            stop_loss: new.stop_loss,
            is_active: true,
            priority: new.priority,
        };

        diesel::insert_into(wt::watchlist_tickers)
            .values(&row)
            .returning(WatchlistTicker::as_returning())
            .get_result(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    WatchlistError::Duplicate(validated.ticker.clone())
                }
                other => other.into(),
            })
    }

    fn find(&self, conn: &mut SqliteConnection, ticker: &str) -> WatchlistResult<Option<WatchlistTicker>> {
        Ok(wt::watchlist_tickers
            .filter(wt::ticker.eq(ticker))
            .select(WatchlistTicker::as_select())
            .first(conn)
            .optional()?)
    }

    fn list(&self, conn: &mut SqliteConnection, active_only: bool) -> WatchlistResult<Vec<WatchlistTicker>> {
        let mut query = wt::watchlist_tickers
            .select(WatchlistTicker::as_select())
            .order((wt::added_date.desc(), wt::id.desc()))
            .into_boxed();
        if active_only {
            query = query.filter(wt::is_active.eq(true));
        }
        Ok(query.load(conn)?)
    }

    fn delete(&self, conn: &mut SqliteConnection, ticker: &str) -> WatchlistResult<bool> {
        let n = diesel::delete(wt::watchlist_tickers.filter(wt::ticker.eq(ticker))).execute(conn)?;
        Ok(n > 0)
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        ticker: &str,
        changes: &WatchlistChangeset,
    ) -> WatchlistResult<Option<WatchlistTicker>> {
        let n = diesel::update(wt::watchlist_tickers.filter(wt::ticker.eq(ticker)))
            .set(changes)
            .execute(conn)?;
        if n == 0 {
            return Ok(None);
        }
        // RETURNING would not see the updated_at trigger's write
        self.find(conn, ticker)
    }
}
