mod common;

use bar_cache::{
    models::WatchlistChangeset,
    watchlist::{self, NewTicker, WatchlistError, WatchlistRepo, repo::SqliteWatchlistRepo},
};
use common::{FakeProvider, setup_db};
use diesel::{RunQueryDsl, sql_query};

#[tokio::test]
async fn add_validates_and_stores_company_name() {
    let (_db, mut conn) = setup_db();
    let provider = FakeProvider::returning(Vec::new());
    let repo = SqliteWatchlistRepo::new();

    let row = watchlist::add(&provider, &repo, &mut conn, NewTicker::new(" aapl "))
        .await
        .unwrap();
    assert_eq!(row.ticker, "AAPL");
    assert_eq!(row.company_name, "AAPL Inc.");
    assert_eq!(row.priority, watchlist::DEFAULT_PRIORITY);
    assert!(row.is_active);

    let err = watchlist::add(&provider, &repo, &mut conn, NewTicker::new("AAPL"))
        .await
        .unwrap_err();
    assert!(matches!(err, WatchlistError::Duplicate(t) if t == "AAPL"));
}

#[tokio::test]
async fn add_rejects_unknown_tickers_and_bad_priorities() {
    let (_db, mut conn) = setup_db();
    let provider = FakeProvider::returning(Vec::new());
    let repo = SqliteWatchlistRepo::new();

    let err = watchlist::add(&provider, &repo, &mut conn, NewTicker::new("ZZZZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, WatchlistError::Validation { .. }));

    let new = NewTicker {
        priority: 7,
        ..NewTicker::new("MSFT")
    };
    let err = watchlist::add(&provider, &repo, &mut conn, new).await.unwrap_err();
    assert!(matches!(err, WatchlistError::InvalidPriority(7)));

    assert!(watchlist::list(&repo, &mut conn, false).unwrap().is_empty());
}

#[tokio::test]
async fn list_summary_and_most_recent() {
    let (_db, mut conn) = setup_db();
    let provider = FakeProvider::returning(Vec::new());
    let repo = SqliteWatchlistRepo::new();

    for (t, sector, priority) in [
        ("AAPL", Some("Technology"), 1),
        ("XOM", Some("Energy"), 3),
        ("MSFT", Some("Technology"), 3),
        ("BRK-B", None, 2),
    ] {
        let new = NewTicker {
            sector: sector.map(String::from),
            priority,
            ..NewTicker::new(t)
        };
        watchlist::add(&provider, &repo, &mut conn, new).await.unwrap();
    }

    let listed: Vec<String> = watchlist::list(&repo, &mut conn, true)
        .unwrap()
        .into_iter()
        .map(|t| t.ticker)
        .collect();
    assert_eq!(listed, ["BRK-B", "MSFT", "XOM", "AAPL"]);
    assert_eq!(
        watchlist::most_recent(&repo, &mut conn).unwrap().as_deref(),
        Some("BRK-B")
    );

    watchlist::update(
        &repo,
        &mut conn,
        "xom",
        &WatchlistChangeset {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    let s = watchlist::summary(&repo, &mut conn).unwrap();
    assert_eq!(s.total_tickers, 3);
    assert_eq!(s.sectors.get("Technology"), Some(&2));
    assert_eq!(s.sectors.get("Unknown"), Some(&1));
    assert_eq!(s.sectors.get("Energy"), None);
    assert_eq!(s.priority_distribution.get(&3), Some(&1));
    assert_eq!(s.priority_distribution.get(&2), Some(&1));

    assert_eq!(watchlist::list(&repo, &mut conn, false).unwrap().len(), 4);
}

#[tokio::test]
async fn update_edits_fields_and_bumps_updated_at() {
    let (_db, mut conn) = setup_db();
    let provider = FakeProvider::returning(Vec::new());
    let repo = SqliteWatchlistRepo::new();

    let new = NewTicker {
        notes: Some("watch earnings".into()),
        ..NewTicker::new("NVDA")
    };
    watchlist::add(&provider, &repo, &mut conn, new).await.unwrap();
    sql_query("UPDATE watchlist_tickers SET updated_at = '2020-01-01T00:00:00.000Z'")
        .execute(&mut conn)
        .unwrap();

    let row = watchlist::update(
        &repo,
        &mut conn,
        "NVDA",
        &WatchlistChangeset {
            notes: Some(None),
            target_price: Some(Some(150.0)),
            priority: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(row.notes, None);
    assert_eq!(row.target_price, Some(150.0));
    assert_eq!(row.stop_loss, None);
    assert_eq!(row.priority, 1);
    assert!(row.updated_at.as_str() > "2020-01-01T00:00:00.000Z");

    // empty changeset is a read
    let same = watchlist::update(&repo, &mut conn, "NVDA", &WatchlistChangeset::default()).unwrap();
    assert_eq!(same, row);

    let err = watchlist::update(
        &repo,
        &mut conn,
        "NVDA",
        &WatchlistChangeset {
            priority: Some(0),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, WatchlistError::InvalidPriority(0)));

    let err = watchlist::update(
        &repo,
        &mut conn,
        "AMD",
        &WatchlistChangeset {
            priority: Some(2),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, WatchlistError::NotFound(_)));
}

#[tokio::test]
async fn remove_deletes_once() {
    let (_db, mut conn) = setup_db();
    let provider = FakeProvider::returning(Vec::new());
    let repo = SqliteWatchlistRepo::new();

    watchlist::add(&provider, &repo, &mut conn, NewTicker::new("TSLA"))
        .await
        .unwrap();
    watchlist::remove(&repo, &mut conn, "tsla").unwrap();
    assert!(repo.find(&mut conn, "TSLA").unwrap().is_none());
    assert!(matches!(
        watchlist::remove(&repo, &mut conn, "TSLA"),
        Err(WatchlistError::NotFound(_))
    ));
}
