use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::distributor::{DailyDistribution, DistributionEntry, distribute};
use crate::historical_dataset::Snapshot;
use crate::match_data::HistoricalMatch;
use crate::profile::EngineProfile;
use crate::win_prob::{MatchPrediction, predict_match};

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Input order, minus whatever was skipped after cancellation.
    pub predictions: Vec<MatchPrediction>,
    pub skipped: usize,
    pub cancelled: bool,
}

/// Runs the per-match pipeline over `fixtures` in parallel. Setting `cancel`
/// stops new matches from starting; matches already running finish.
pub fn analyze_fixtures(
    fixtures: &[HistoricalMatch],
    history: &[HistoricalMatch],
    profile: &EngineProfile,
    cfg: &EngineConfig,
    cancel: &AtomicBool,
) -> BatchOutcome {
    let pool = build_analysis_pool();
    let results: Vec<Option<MatchPrediction>> = with_analysis_pool(&pool, || {
        fixtures
            .par_iter()
            .map(|fixture| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                Some(predict_match(fixture, history, profile, cfg))
            })
            .collect()
    });

    let skipped = results.iter().filter(|r| r.is_none()).count();
    let cancelled = cancel.load(Ordering::Relaxed);
    if cancelled {
        warn!(skipped, total = fixtures.len(), "batch cancelled");
    }
    BatchOutcome {
        predictions: results.into_iter().flatten().collect(),
        skipped,
        cancelled,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub predictions: Vec<MatchPrediction>,
    pub distribution: DailyDistribution,
    pub cancelled: bool,
}

/// Analyses the snapshot's fixtures dated `date` and distributes them into
/// buckets. The profile is rebuilt from history before the lookahead cutoff.
pub fn run_day(date: NaiveDate, snapshot: &Snapshot, cfg: &EngineConfig, cancel: &AtomicBool) -> DayReport {
    let todays: Vec<HistoricalMatch> = snapshot
        .fixtures
        .iter()
        .filter(|f| f.date == date)
        .cloned()
        .collect();
    info!(%date, fixtures = todays.len(), "running day");

    let profile = EngineProfile::as_of(
        &snapshot.history,
        snapshot.standings.clone(),
        &snapshot.leagues,
        cfg,
        date,
    );
    let outcome = analyze_fixtures(&todays, &snapshot.history, &profile, cfg, cancel);
    let entries: Vec<DistributionEntry> = outcome.predictions.iter().map(DistributionEntry::from).collect();
    let distribution = distribute(&entries, &profile.league_registry, &cfg.distribution);

    DayReport {
        date,
        predictions: outcome.predictions,
        distribution,
        cancelled: outcome.cancelled,
    }
}

fn build_analysis_pool() -> Option<rayon::ThreadPool> {
    let threads = analysis_parallelism()?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_analysis_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

/// `MATCHDAY_THREADS`, when set; otherwise rayon's global pool is used.
fn analysis_parallelism() -> Option<usize> {
    env::var("MATCHDAY_THREADS")
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
        .map(|n| n.clamp(1, 64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::{Score, TeamRef};

    fn m(id: &str, day: u32, home: &str, away: &str, score: Option<(u8, u8)>) -> HistoricalMatch {
        HistoricalMatch {
            fixture_id: Some(id.to_string()),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            league: "EU-ENG Premier League".to_string(),
            league_id: None,
            home: TeamRef::named(home),
            away: TeamRef::named(away),
            score: score.map(|(h, a)| Score::new(h, a)),
            odds: Default::default(),
            tip: None,
        }
    }

    fn small_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.simulation.iterations = 500;
        cfg
    }

    #[test]
    fn batch_keeps_input_order() {
        let cfg = small_config();
        let history = vec![m("h1", 1, "A", "B", Some((2, 1))), m("h2", 2, "C", "D", Some((0, 0)))];
        let profile = EngineProfile::build(&history, Default::default(), &[], &cfg);
        let fixtures = vec![
            m("f1", 10, "A", "C", None),
            m("f2", 10, "D", "B", None),
            m("f3", 10, "B", "A", None),
        ];
        let out = analyze_fixtures(&fixtures, &history, &profile, &cfg, &AtomicBool::new(false));
        let ids: Vec<_> = out
            .predictions
            .iter()
            .map(|p| p.fixture.fixture_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        assert!(!out.cancelled);
        assert_eq!(out.skipped, 0);
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let cfg = small_config();
        let profile = EngineProfile::build(&[], Default::default(), &[], &cfg);
        let fixtures = vec![m("f1", 10, "A", "C", None)];
        let out = analyze_fixtures(&fixtures, &[], &profile, &cfg, &AtomicBool::new(true));
        assert!(out.predictions.is_empty());
        assert_eq!(out.skipped, 1);
        assert!(out.cancelled);
    }

    #[test]
    fn run_day_only_takes_that_date() {
        let cfg = small_config();
        let snapshot = Snapshot {
            fixtures: vec![m("f1", 10, "A", "C", None), m("f2", 11, "B", "D", None)],
            ..Snapshot::default()
        };
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let report = run_day(day, &snapshot, &cfg, &AtomicBool::new(false));
        assert_eq!(report.predictions.len(), 1);
        assert_eq!(report.distribution.pool.len(), 1);
        assert_eq!(
            report.distribution.bucket("continental-top").unwrap().fixture_ids,
            vec!["f1"]
        );
    }

    #[test]
    fn run_day_ratings_ignore_later_results() {
        let cfg = small_config();
        let mut history = vec![m("h0", 1, "A", "B", Some((1, 1)))];
        for day in 20..30 {
            history.push(m(&format!("h{day}"), day, "A", "B", Some((5, 0))));
        }
        let fixture = m("f1", 10, "A", "B", None);
        let day = fixture.date;
        let snapshot = Snapshot {
            history: history.clone(),
            fixtures: vec![fixture.clone()],
            ..Snapshot::default()
        };
        let report = run_day(day, &snapshot, &cfg, &AtomicBool::new(false));

        let past_only = EngineProfile::build(&history[..1], Default::default(), &[], &cfg);
        let expected = crate::win_prob::predict_match(&fixture, &history, &past_only, &cfg);
        let got = &report.predictions[0];
        assert_eq!(got.elo_diff, expected.elo_diff);
        assert_eq!(got.lambda_home, expected.lambda_home);
        assert_eq!(got.simulation, expected.simulation);

        let leaky = EngineProfile::build(&history, Default::default(), &[], &cfg);
        let leaked = crate::win_prob::predict_match(&fixture, &history, &leaky, &cfg);
        assert!(leaked.elo_diff > got.elo_diff);
    }
}
