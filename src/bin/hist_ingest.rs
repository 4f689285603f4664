use std::path::PathBuf;

use anyhow::{Context, Result};

use matchday_signals::{cli, historical_dataset};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    matchday_signals::init_tracing();

    let args = cli::args();
    let snapshot_path = cli::positional(&args, &["--db"])
        .map(PathBuf::from)
        .context("usage: hist_ingest <snapshot.json> --db=path")?;
    let db_path = cli::flag_value(&args, "--db")
        .map(PathBuf::from)
        .context("missing --db=path")?;

    let snapshot = historical_dataset::load_snapshot_json(&snapshot_path)?;
    let mut conn = historical_dataset::open_db(&db_path)?;
    let stored = historical_dataset::store_matches(&mut conn, &snapshot.history)?;

    println!("Historical ingest complete");
    println!("DB: {}", db_path.display());
    println!(
        "Rows: accepted={} unscored={} rejected={}",
        snapshot.history_report.accepted,
        snapshot.history_report.unscored,
        snapshot.history_report.rejected.len()
    );
    println!("Matches upserted: {stored}");
    for (row, reason) in snapshot.history_report.rejected.iter().take(6) {
        println!("   - row {row}: {reason}");
    }
    Ok(())
}
