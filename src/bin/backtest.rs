use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchday_signals::calibration::{self, Outcome, Prob3};
use matchday_signals::cli;
use matchday_signals::config::EngineConfig;
use matchday_signals::historical_dataset;
use matchday_signals::match_data::HistoricalMatch;
use matchday_signals::profile::EngineProfile;
use matchday_signals::settlement::{Settlement, settle_tip};
use matchday_signals::win_prob::predict_match;

const DEFAULT_WARMUP: usize = 200;
const DEFAULT_ITERATIONS: u32 = 2_000;

#[derive(Default)]
struct PickTally {
    settled: usize,
    won: usize,
    cash_out: usize,
    unsettled: usize,
    fallback: usize,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    matchday_signals::init_tracing();

    let args = cli::args();
    let path = cli::positional(&args, &["--warmup", "--iterations", "--config"])
        .map(PathBuf::from)
        .context("usage: backtest <snapshot.json> [--warmup=N] [--iterations=N] [--config=path]")?;
    let mut cfg = match cli::flag_value(&args, "--config") {
        Some(p) => EngineConfig::load(&PathBuf::from(p))?,
        None => EngineConfig::default(),
    };
    cfg.simulation.iterations = cli::flag_u64(&args, "--iterations")
        .map(|n| n.clamp(100, 100_000) as u32)
        .unwrap_or(DEFAULT_ITERATIONS);
    cfg.apply_env();
    let warmup = cli::flag_u64(&args, "--warmup").map(|n| n as usize).unwrap_or(DEFAULT_WARMUP);

    let snapshot = historical_dataset::load_snapshot_json(&path)?;
    let mut finished: Vec<HistoricalMatch> = snapshot.history.into_iter().filter(|m| m.is_played()).collect();
    finished.sort_by_key(|m| m.date);
    if finished.len() <= warmup {
        return Err(anyhow!(
            "need more than {warmup} finished matches, got {}",
            finished.len()
        ));
    }

    let mut by_date: BTreeMap<chrono::NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, m) in finished.iter().enumerate().skip(warmup) {
        by_date.entry(m.date).or_default().push(idx);
    }

    let mut predictions: Vec<Prob3> = Vec::new();
    let mut outcomes: Vec<Outcome> = Vec::new();
    let mut picks = PickTally::default();

    for (date, indices) in &by_date {
        // Everything strictly before this date; same-day results stay hidden.
        let cutoff = finished.partition_point(|m| m.date < *date);
        let past = &finished[..cutoff];
        let profile = EngineProfile::build(past, snapshot.standings.clone(), &snapshot.leagues, &cfg);

        for &idx in indices {
            let actual = &finished[idx];
            let Some(score) = actual.score else { continue };
            let mut fixture = actual.clone();
            fixture.score = None;

            let p = predict_match(&fixture, past, &profile, &cfg);
            predictions.push(Prob3::from_percentages(p.outcome.home, p.outcome.draw, p.outcome.away));
            outcomes.push(calibration::classify_outcome(score.home as i32, score.away as i32));

            let Some(pick) = p.best_pick else { continue };
            if pick.fallback {
                picks.fallback += 1;
                continue;
            }
            match settle_tip(pick.candidate.label, score, true) {
                Some(Settlement::Won) => {
                    picks.settled += 1;
                    picks.won += 1;
                }
                Some(Settlement::CashOut) => {
                    picks.settled += 1;
                    picks.cash_out += 1;
                }
                Some(_) => picks.settled += 1,
                None => picks.unsettled += 1,
            }
        }
    }

    let metrics = calibration::evaluate_probs(&predictions, &outcomes);
    println!("Walk-forward backtest");
    println!("Snapshot: {}", path.display());
    println!(
        "Matches: {} (warmup {warmup}, iterations {})",
        metrics.samples, cfg.simulation.iterations
    );
    println!(
        "1X2: brier={:.4} log_loss={:.4} accuracy={:.1}%",
        metrics.brier,
        metrics.log_loss,
        metrics.accuracy * 100.0
    );
    let hit_rate = if picks.settled > 0 {
        picks.won as f64 / picks.settled as f64 * 100.0
    } else {
        0.0
    };
    println!(
        "Best picks: settled={} won={} ({hit_rate:.1}%) cash_out={} unsettled={} fallback={}",
        picks.settled, picks.won, picks.cash_out, picks.unsettled, picks.fallback
    );

    println!("Draw calibration:");
    for bin in calibration::calibration_bins(&predictions, &outcomes, Outcome::Draw, 10) {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  [{:.1}, {:.1}) n={} pred={:.3} actual={:.3}",
            bin.lower, bin.upper, bin.count, bin.mean_predicted, bin.observed_rate
        );
    }
    Ok(())
}
