use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use tracing::info;

use matchday_signals::batch::run_day;
use matchday_signals::cli;
use matchday_signals::config::EngineConfig;
use matchday_signals::historical_dataset::{self, load_snapshot_json};
use matchday_signals::match_data::{HistoricalMatch, parse_date};

const VALUE_FLAGS: &[&str] = &["--date", "--config", "--db"];

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    matchday_signals::init_tracing();

    let args = cli::args();
    let snapshot_path = cli::positional(&args, VALUE_FLAGS)
        .map(PathBuf::from)
        .context("usage: matchday_signals <snapshot.json> [--date=YYYY-MM-DD] [--config=path] [--db=path]")?;
    let config_path = cli::flag_value(&args, "--config")
        .or_else(|| std::env::var("MATCHDAY_CONFIG").ok())
        .map(PathBuf::from);
    let mut cfg = match config_path {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env();

    let mut snapshot = load_snapshot_json(&snapshot_path)?;
    if let Some(db_path) = cli::flag_value(&args, "--db").map(PathBuf::from) {
        let conn = historical_dataset::open_db(&db_path)?;
        let stored = historical_dataset::load_matches(&conn)?;
        let loaded = stored.len();
        let added = historical_dataset::merge_history(&mut snapshot.history, stored);
        info!(db = %db_path.display(), loaded, added, "history merged from sqlite");
    }

    let date = match cli::flag_value(&args, "--date") {
        Some(raw) => parse_date(&raw).ok_or_else(|| anyhow!("invalid --date {raw}"))?,
        None => default_date(&snapshot.fixtures),
    };

    let cancel = AtomicBool::new(false);
    let report = run_day(date, &snapshot, &cfg, &cancel);

    let out = serde_json::to_string_pretty(&report).context("encode day report")?;
    println!("{out}");
    Ok(())
}

fn default_date(fixtures: &[HistoricalMatch]) -> NaiveDate {
    fixtures
        .iter()
        .map(|f| f.date)
        .min()
        .unwrap_or_else(|| Utc::now().date_naive())
}
