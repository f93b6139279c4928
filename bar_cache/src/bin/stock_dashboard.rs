use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use market_data_ingestor::{
    models::granularity::{Interval, Period},
    providers::yahoo_chart::YahooChartProvider,
};
use tracing::{info, warn};

use bar_cache::{
    config::{DashboardConfig, load_config_path},
    db::{connection, migrate},
    indicators::{self, Indicator, signals},
    logging::{LogConfig, LogFormat, init_logging},
    metrics,
    models::WatchlistChangeset,
    policy::{BarCache, Served},
    store::BarStore,
    tz,
    watchlist::{self, DEFAULT_PRIORITY, NewTicker, repo::SqliteWatchlistRepo},
};

#[derive(Parser)]
#[command(version, about = "Stock dashboard CLI backed by a local bar cache")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, value_name = "FILE", default_value = "dashboard.toml")]
    config: PathBuf,

    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print JSON instead of tables where supported.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations.
    Migrate,
    /// Print bars for a symbol, fetching when the cache is stale.
    Bars(BarsCmd),
    /// Compute indicators over cached bars.
    Indicators(IndicatorsCmd),
    /// Latest price and intraday move per ticker.
    Quotes {
        tickers: Vec<String>,
    },
    /// Row counts and database size.
    Stats,
    /// Symbols with stored bars.
    Tickers,
    /// Delete rows older than N days.
    Cleanup {
        #[arg(long)]
        days: Option<i64>,
    },
    Watchlist(WatchlistCmd),
}

#[derive(Args)]
struct BarsCmd {
    symbol: String,
    #[arg(long, default_value = "6mo")]
    period: Period,
    /// Defaults to the configured interval for the period.
    #[arg(long)]
    interval: Option<Interval>,
    /// Fetch even when the cache is fresh.
    #[arg(long)]
    refresh: bool,
    /// Only print the newest N bars.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct IndicatorsCmd {
    symbol: String,
    #[arg(long, default_value = "6mo")]
    period: Period,
    #[arg(long)]
    interval: Option<Interval>,
    /// Indicator names, e.g. SMA_20 RSI_14 MACD BB. All when empty.
    #[arg(long = "name", value_name = "NAME")]
    names: Vec<String>,
    /// Persist the computed rows.
    #[arg(long)]
    store: bool,
}

#[derive(Args)]
struct WatchlistCmd {
    #[command(subcommand)]
    sub: WatchlistSub,
}

#[derive(Subcommand)]
enum WatchlistSub {
    Add {
        ticker: String,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        target_price: Option<f64>,
        #[arg(long)]
        stop_loss: Option<f64>,
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: i32,
    },
    List {
        /// Include deactivated tickers.
        #[arg(long)]
        all: bool,
    },
    Remove {
        ticker: String,
    },
    Update {
        ticker: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, conflicts_with = "notes")]
        clear_notes: bool,
        #[arg(long)]
        target_price: Option<f64>,
        #[arg(long)]
        stop_loss: Option<f64>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        active: Option<bool>,
    },
    Summary,
    Recent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&LogConfig::new(&cli.log_level).with_format(cli.log_format))?;

    let cfg = load_config_path(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    let display_tz = cfg.display_tz()?;

    migrate::run_all(&cfg.database_url)?;
    let mut conn = connection::connect_sqlite(&cfg.database_url)?;

    match cli.cmd {
        Cmd::Migrate => info!(database = %cfg.database_url, "schema up to date"),
        Cmd::Bars(cmd) => bars(&cfg, &mut conn, display_tz, cmd).await?,
        Cmd::Indicators(cmd) => indicators_cmd(&cfg, &mut conn, display_tz, cli.json, cmd).await?,
        Cmd::Quotes { tickers } => {
            let tickers = if tickers.is_empty() { cfg.default_tickers.clone() } else { tickers };
            let cache = BarCache::new(provider(&cfg)?);
            let snaps = metrics::price_snapshots(&cache, &mut conn, &tickers).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snaps)?);
                return Ok(());
            }
            for (ticker, s) in &snaps {
                println!("{ticker:<8} {:>10.2} {:>+9.2} {:>+7.2}%", s.price, s.change, s.pct_change);
            }
        }
        Cmd::Stats => {
            let store = bar_cache::store::repo::SqliteRepo::new();
            let path = connection::sqlite_path(&cfg.database_url);
            let stats = store.stats(&mut conn, Some(path))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("bars:       {}", stats.bar_rows);
            println!("indicators: {}", stats.indicator_rows);
            println!("symbols:    {}", stats.symbols);
            println!("watchlist:  {}", stats.watchlist_rows);
            if let Some(bytes) = stats.file_size_bytes {
                println!("file size:  {:.2} MB", bytes as f64 / (1024.0 * 1024.0));
            }
        }
        Cmd::Tickers => {
            let store = bar_cache::store::repo::SqliteRepo::new();
            for symbol in metrics::available_tickers(&store, &mut conn)? {
                println!("{symbol}");
            }
        }
        Cmd::Cleanup { days } => {
            let days = days.unwrap_or(cfg.retention_days);
            if days < 1 {
                bail!("--days must be at least 1");
            }
            let store = bar_cache::store::repo::SqliteRepo::new();
            let report = metrics::cleanup(&store, &mut conn, days, Utc::now())?;
            println!(
                "deleted {} bars and {} indicator rows older than {days} days",
                report.bars_deleted, report.indicators_deleted
            );
        }
        Cmd::Watchlist(WatchlistCmd { sub }) => watchlist_cmd(&cfg, &mut conn, display_tz, cli.json, sub).await?,
    }

    Ok(())
}

fn provider(cfg: &DashboardConfig) -> Result<YahooChartProvider> {
    Ok(YahooChartProvider::new(cfg.provider_config()?)?)
}

async fn bars(cfg: &DashboardConfig, conn: &mut diesel::SqliteConnection, display_tz: Tz, cmd: BarsCmd) -> Result<()> {
    let granularity = cfg.granularity_for(cmd.period, cmd.interval)?;
    let cache = BarCache::new(provider(cfg)?);

    let res = if cmd.refresh {
        cache.refresh(conn, &cmd.symbol, granularity).await?
    } else {
        cache
            .resolve_granularity(conn, &cmd.symbol, granularity, cfg.freshness(), Utc::now())
            .await?
    };
    report_served(&res.served);

    let bars = &res.series.bars;
    let shown = &bars[bars.len().saturating_sub(cmd.limit.unwrap_or(bars.len()))..];
    let intraday = granularity.interval().is_intraday();
    for b in shown {
        println!(
            "{}  O {:>10.2}  H {:>10.2}  L {:>10.2}  C {:>10.2}  V {:>12}",
            tz::format_display(b.timestamp, display_tz, intraday),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        );
    }

    if let Some(m) = metrics::basic_metrics(bars) {
        println!(
            "{} {}: last {:.2}  change {:+.2} ({:+.2}%)  high {:.2}  low {:.2}  volume {}",
            res.series.symbol, granularity, m.last_close, m.change, m.pct_change, m.high, m.low, m.volume
        );
    }
    Ok(())
}

async fn indicators_cmd(
    cfg: &DashboardConfig,
    conn: &mut diesel::SqliteConnection,
    display_tz: Tz,
    json: bool,
    cmd: IndicatorsCmd,
) -> Result<()> {
    // Reject bad names before touching the network.
    let requested: Vec<Indicator> = if cmd.names.is_empty() {
        Indicator::ALL.to_vec()
    } else {
        cmd.names.iter().map(|n| n.parse()).collect::<Result<_, _>>()?
    };

    let granularity = cfg.granularity_for(cmd.period, cmd.interval)?;
    let cache = BarCache::new(provider(cfg)?);
    let res = cache
        .resolve_granularity(conn, &cmd.symbol, granularity, cfg.freshness(), Utc::now())
        .await?;
    report_served(&res.served);

    let bars = &res.series.bars;
    let rows = indicators::compute(bars, &requested);
    if cmd.store {
        let n = cache.store().upsert_indicators(conn, &res.series.symbol, &rows)?;
        info!(symbol = %res.series.symbol, rows = n, "stored indicator rows");
    }

    let Some(s) = signals::summary(bars, &rows) else {
        println!("no bars for {}", res.series.symbol);
        return Ok(());
    };
    if json {
        let out = serde_json::json!({
            "symbol": res.series.symbol,
            "summary": s,
            "signals": signals::signals(bars, &rows),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let intraday = granularity.interval().is_intraday();
    if let Some(last) = rows.last() {
        println!("{} as of {}", res.series.symbol, tz::format_display(last.timestamp, display_tz, intraday));
    }
    let fields = [
        ("SMA 20", s.sma_20),
        ("SMA 50", s.sma_50),
        ("SMA 100", s.sma_100),
        ("SMA 200", s.sma_200),
        ("EMA 20", s.ema_20),
        ("RSI 14", s.rsi_14),
        ("MACD", s.macd),
        ("MACD signal", s.macd_signal),
        ("MACD histogram", s.macd_histogram),
        ("BB upper", s.bb_upper),
        ("BB middle", s.bb_middle),
        ("BB lower", s.bb_lower),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            println!("  {label:<15} {v:>10.2}");
        }
    }
    if let Some(zone) = s.rsi_zone {
        println!("  RSI zone        {zone}");
    }
    if let Some(pos) = s.bb_position {
        println!("  Band position   {pos}");
    }

    if let Some(sig) = signals::signals(bars, &rows) {
        for label in [sig.rsi_label(), sig.macd_label(), sig.moving_average_label()].into_iter().flatten() {
            println!("  signal: {label}");
        }
    }
    Ok(())
}

async fn watchlist_cmd(
    cfg: &DashboardConfig,
    conn: &mut diesel::SqliteConnection,
    display_tz: Tz,
    json: bool,
    sub: WatchlistSub,
) -> Result<()> {
    let repo = SqliteWatchlistRepo::new();
    match sub {
        WatchlistSub::Add {
            ticker,
            sector,
            notes,
            target_price,
            stop_loss,
            priority,
        } => {
            let new = NewTicker {
                sector,
                notes,
                target_price,
                stop_loss,
                priority,
                ..NewTicker::new(ticker)
            };
            let row = watchlist::add(&provider(cfg)?, &repo, conn, new).await?;
            println!("added {} ({})", row.ticker, row.company_name);
        }
        WatchlistSub::List { all } => {
            for t in watchlist::list(&repo, conn, !all)? {
                let added = tz::parse_ts_to_utc(&t.added_date)
                    .map(|dt| tz::format_display(dt, display_tz, false))
                    .unwrap_or(t.added_date.clone());
                println!(
                    "{:<8} P{} {:<30} {:<16} added {}{}",
                    t.ticker,
                    t.priority,
                    t.company_name,
                    t.sector.as_deref().unwrap_or("-"),
                    added,
                    if t.is_active { "" } else { " (inactive)" }
                );
            }
        }
        WatchlistSub::Remove { ticker } => {
            watchlist::remove(&repo, conn, &ticker)?;
            println!("removed {}", ticker.trim().to_uppercase());
        }
        WatchlistSub::Update {
            ticker,
            notes,
            clear_notes,
            target_price,
            stop_loss,
            priority,
            active,
        } => {
            let changes = WatchlistChangeset {
                notes: if clear_notes { Some(None) } else { notes.map(Some) },
                target_price: target_price.map(Some),
                stop_loss: stop_loss.map(Some),
                priority,
                is_active: active,
            };
            let row = watchlist::update(&repo, conn, &ticker, &changes)?;
            println!("updated {} at {}", row.ticker, row.updated_at);
        }
        WatchlistSub::Summary => {
            let s = watchlist::summary(&repo, conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
                return Ok(());
            }
            println!("{} active tickers", s.total_tickers);
            for (sector, n) in &s.sectors {
                println!("  {sector:<20} {n}");
            }
            for (p, n) in &s.priority_distribution {
                println!("  priority {p}: {n}");
            }
        }
        WatchlistSub::Recent => match watchlist::most_recent(&repo, conn)? {
            Some(t) => println!("{t}"),
            None => warn!("watchlist is empty"),
        },
    }
    Ok(())
}

fn report_served(served: &Served) {
    match served {
        Served::Cache => info!("served from cache"),
        Served::Fetched { inserted } => info!(inserted, "fetched from provider"),
        Served::Stale(w) => warn!("{w}"),
    }
}
