use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use market_structure_analysis::feed::{BarFeed, ReplayFeed};
use market_structure_analysis::levels::LevelCalculator;
use market_structure_analysis::structure::{analyze, classify_strength};
use market_structure_analysis::tracker::OpeningRangeTracker;
use market_structure_core::hours::MarketHours;
use market_structure_core::key_levels::{KeyLevels, OpeningRange};
use market_structure_core::level_store::LevelStore;
use market_structure_core::store::BarStore;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "market-structure",
    about = "Compute and track market structure and key levels from 1-minute bars"
)]
struct Cli {
    /// Root directory for data storage (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Exchange timezone identifier
    #[arg(long, default_value = "America/New_York")]
    timezone: String,

    /// Regular session open, local exchange time (HH:MM)
    #[arg(long, default_value = "09:30")]
    market_open: String,

    /// Regular session close, local exchange time (HH:MM)
    #[arg(long, default_value = "16:00")]
    market_close: String,

    /// Premarket start, local exchange time (HH:MM)
    #[arg(long, default_value = "04:00")]
    premarket_start: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily key level calculation for symbols
    Levels {
        /// Symbols to calculate (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Trading date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Run one opening-range calculation for a symbol
    OpeningRange {
        #[arg(short, long)]
        symbol: String,

        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Window length in minutes: 5 or 15
        #[arg(long, default_value = "5")]
        minutes: u8,
    },

    /// Print the structure snapshot for a stored trading day
    Structure {
        #[arg(short, long)]
        symbol: String,

        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Symmetric swing look-back window in bars
        #[arg(long, default_value = "5")]
        lookback: usize,
    },

    /// Show which dates have stored key levels
    Status {
        /// Filter by symbol (shows all if omitted)
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Replay a stored day through the opening range tracker
    Replay {
        /// Symbols to track (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },

    /// Recompute both opening ranges from stored bars (post-restart catch-up)
    Resync {
        #[arg(short, long)]
        symbol: String,

        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}

fn parse_hours(cli: &Cli) -> Result<MarketHours> {
    let timezone: Tz = cli
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid timezone {}: {e}", cli.timezone))?;
    let parse_time = |s: &str, what: &str| {
        NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("invalid {what}: {s}"))
    };
    Ok(MarketHours {
        timezone,
        open: parse_time(&cli.market_open, "market open")?,
        close: parse_time(&cli.market_close, "market close")?,
        premarket_start: parse_time(&cli.premarket_start, "premarket start")?,
    })
}

fn fmt_level(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_levels(row: &KeyLevels) {
    println!("{} {}", row.symbol, row.date);
    println!(
        "  previous day   high {}  low {}  open {}  close {}",
        fmt_level(row.previous_day_high),
        fmt_level(row.previous_day_low),
        fmt_level(row.previous_day_open),
        fmt_level(row.previous_day_close),
    );
    println!(
        "  premarket      high {}  low {}",
        fmt_level(row.premarket_high),
        fmt_level(row.premarket_low),
    );
    println!(
        "  opening range  5m {}/{}  15m {}/{}",
        fmt_level(row.opening_range_5m_high),
        fmt_level(row.opening_range_5m_low),
        fmt_level(row.opening_range_15m_high),
        fmt_level(row.opening_range_15m_low),
    );
    println!(
        "  weekly         high {}  low {}  close {}  eq {}  ath {}",
        fmt_level(row.last_week_high),
        fmt_level(row.last_week_low),
        fmt_level(row.last_week_close),
        fmt_level(row.equilibrium),
        fmt_level(row.all_time_high),
    );
}

fn cmd_levels(calc: &LevelCalculator, symbols: &[String], date: NaiveDate) -> Result<()> {
    for symbol in symbols {
        let symbol = symbol.to_uppercase();
        match calc.calculate_daily(&symbol, date) {
            Ok(row) => print_levels(&row),
            Err(e) => warn!("{symbol}: daily calculation failed: {e}"),
        }
    }
    Ok(())
}

fn cmd_opening_range(
    calc: &LevelCalculator,
    symbol: &str,
    date: NaiveDate,
    minutes: u8,
) -> Result<()> {
    let range = match minutes {
        5 => OpeningRange::FiveMinute,
        15 => OpeningRange::FifteenMinute,
        other => anyhow::bail!("unsupported opening range: {other} minutes. Expected: 5, 15"),
    };
    let row = calc
        .update_opening_range(&symbol.to_uppercase(), date, range)
        .with_context(|| format!("opening range update failed for {symbol} {date}"))?;
    print_levels(&row);
    Ok(())
}

fn cmd_structure(store: &BarStore, symbol: &str, date: NaiveDate, lookback: usize) -> Result<()> {
    let symbol = symbol.to_uppercase();
    let bars = store
        .read_day(&symbol, date)
        .with_context(|| format!("no bars for {symbol} {date}"))?;

    let snapshot = analyze(&bars, lookback);
    println!(
        "{symbol} {date}: {} bars, trend {:?}, strength {:?}",
        bars.len(),
        snapshot.trend,
        classify_strength(&snapshot),
    );
    println!(
        "  swing highs: {}",
        snapshot
            .swing_highs
            .iter()
            .map(|s| s.price.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );
    println!(
        "  swing lows:  {}",
        snapshot
            .swing_lows
            .iter()
            .map(|s| s.price.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );
    if let Some(bos) = &snapshot.latest_break_of_structure {
        println!(
            "  break of structure: {:?} close {} beyond swing {} at {}",
            bos.direction, bos.price, bos.broken_swing.price, bos.timestamp,
        );
    }
    if let Some(choch) = &snapshot.latest_change_of_character {
        println!(
            "  change of character: {:?} close {} beyond swing {} at {}",
            choch.direction, choch.price, choch.broken_swing.price, choch.timestamp,
        );
    }
    Ok(())
}

fn cmd_status(levels: &LevelStore, bars: &BarStore, symbol: Option<&str>) -> Result<()> {
    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => bars.list_symbols().context("failed to list symbols")?,
    };

    if symbols.is_empty() {
        println!("No data in store.");
        return Ok(());
    }

    for sym in &symbols {
        let dates = levels
            .list_dates(sym)
            .with_context(|| format!("failed to list level dates for {sym}"))?;

        if dates.is_empty() {
            println!("{sym}: no stored levels");
            continue;
        }

        let first = dates.first().expect("nonempty");
        let last = dates.last().expect("nonempty");
        println!("{sym}: {} day(s) of levels, {first} to {last}", dates.len());
    }

    Ok(())
}

async fn cmd_replay(
    data_dir: &PathBuf,
    hours: MarketHours,
    symbols: &[String],
    date: NaiveDate,
) -> Result<()> {
    let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();

    let (tx, mut updates) = broadcast::channel(64);
    let calc = Arc::new(
        LevelCalculator::new(BarStore::new(data_dir), LevelStore::new(data_dir), hours)
            .with_publisher(tx),
    );

    // Daily rows first, so opening-range patches have something to land on
    for symbol in &symbols {
        if let Err(e) = calc.calculate_daily(symbol, date) {
            warn!("{symbol}: daily calculation failed: {e}");
        }
    }

    let tracker = OpeningRangeTracker::with_date(Arc::clone(&calc), symbols.clone(), date);
    let (handle, _task) = tracker.spawn();

    let feed = ReplayFeed::new(BarStore::new(data_dir), symbols, date);
    info!("replaying {date} through the {} feed", feed.name());
    feed.run(&handle).await?;
    handle.drain().await?;

    let mut count = 0;
    while let Ok(update) = updates.try_recv() {
        println!("update {} {}:", update.symbol, update.date);
        print_levels(&update.levels);
        count += 1;
    }
    println!("{count} level update(s) published.");
    Ok(())
}

async fn cmd_resync(
    data_dir: &PathBuf,
    hours: MarketHours,
    symbol: &str,
    date: NaiveDate,
) -> Result<()> {
    let symbol = symbol.to_uppercase();
    let calc = Arc::new(LevelCalculator::new(
        BarStore::new(data_dir),
        LevelStore::new(data_dir),
        hours,
    ));

    let tracker = OpeningRangeTracker::with_date(Arc::clone(&calc), vec![symbol.clone()], date);
    let (handle, _task) = tracker.spawn();
    handle
        .resync(&symbol, date)
        .await
        .with_context(|| format!("resync failed for {symbol} {date}"))?;

    let row = calc.level_store().get(&symbol, date)?;
    print_levels(&row);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let hours = parse_hours(&cli)?;
    let bars = BarStore::new(&cli.data_dir);
    let levels = LevelStore::new(&cli.data_dir);

    match &cli.command {
        Commands::Levels { symbols, date } => {
            let date = date.unwrap_or_else(|| hours.today());
            let calc = LevelCalculator::new(bars, levels, hours);
            cmd_levels(&calc, symbols, date)?;
        }
        Commands::OpeningRange {
            symbol,
            date,
            minutes,
        } => {
            let calc = LevelCalculator::new(bars, levels, hours);
            cmd_opening_range(&calc, symbol, *date, *minutes)?;
        }
        Commands::Structure {
            symbol,
            date,
            lookback,
        } => {
            cmd_structure(&bars, symbol, *date, *lookback)?;
        }
        Commands::Status { symbol } => {
            cmd_status(&levels, &bars, symbol.as_deref())?;
        }
        Commands::Replay { symbols, date } => {
            cmd_replay(&cli.data_dir, hours, symbols, *date).await?;
        }
        Commands::Resync { symbol, date } => {
            cmd_resync(&cli.data_dir, hours, symbol, *date).await?;
        }
    }

    Ok(())
}
