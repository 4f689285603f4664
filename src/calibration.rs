use serde::Serialize;
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::match_data::HistoricalMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    const EVEN: Prob3 = Prob3 {
        home: 1.0 / 3.0,
        draw: 1.0 / 3.0,
        away: 1.0 / 3.0,
    };

    pub fn from_percentages(home: f64, draw: f64, away: f64) -> Self {
        let sum = home + draw + away;
        if sum <= 0.0 || !sum.is_finite() {
            return Self::EVEN;
        }
        Self {
            home: home / sum,
            draw: draw / sum,
            away: away / sum,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Most likely outcome; ties go home, then draw.
    pub fn favourite(&self) -> Outcome {
        Outcome::ALL
            .into_iter()
            .fold(Outcome::Home, |best, o| if self.get(o) > self.get(best) { o } else { best })
    }

    fn squared_error(&self, actual: Outcome) -> f64 {
        Outcome::ALL
            .into_iter()
            .map(|o| {
                let hit = if o == actual { 1.0 } else { 0.0 };
                (self.get(o) - hit).powi(2)
            })
            .sum()
    }
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    match home_goals.cmp(&away_goals) {
        std::cmp::Ordering::Greater => Outcome::Home,
        std::cmp::Ordering::Less => Outcome::Away,
        std::cmp::Ordering::Equal => Outcome::Draw,
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

/// Mismatched or empty inputs score as zero samples.
pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let (brier, log_loss, hits) = predictions.iter().zip(outcomes).fold(
        (0.0_f64, 0.0_f64, 0usize),
        |(brier, log_loss, hits), (p, &actual)| {
            (
                brier + p.squared_error(actual),
                log_loss - p.get(actual).clamp(1e-12, 1.0).ln(),
                hits + usize::from(p.favourite() == actual),
            )
        },
    );

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier / n,
        log_loss: log_loss / n,
        accuracy: hits as f64 / n,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_predicted: f64,
    pub observed_rate: f64,
}

pub fn calibration_bins(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let width = 1.0 / bins as f64;
    let mut out: Vec<CalibrationBin> = (0..bins)
        .map(|i| CalibrationBin {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count: 0,
            mean_predicted: 0.0,
            observed_rate: 0.0,
        })
        .collect();

    for (p, &actual) in predictions.iter().zip(outcomes) {
        let prob = p.get(class).clamp(0.0, 1.0);
        let bin = &mut out[((prob * bins as f64) as usize).min(bins - 1)];
        bin.count += 1;
        bin.mean_predicted += prob;
        if actual == class {
            bin.observed_rate += 1.0;
        }
    }

    for bin in out.iter_mut().filter(|b| b.count > 0) {
        bin.mean_predicted /= bin.count as f64;
        bin.observed_rate /= bin.count as f64;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RhoSource {
    Fitted,
    Default,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RhoFit {
    pub rho: f64,
    pub source: RhoSource,
    pub samples: usize,
    pub observed_low_score: f64,
    pub expected_low_score: f64,
}

pub fn dc_tau(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

pub fn poisson_pmf(goals: u32, lambda: f64) -> f64 {
    let lambda = lambda.max(0.0);
    let numer = lambda.powi(goals as i32) * (-lambda).exp();
    let denom = (1..=goals).fold(1.0_f64, |acc, k| acc * k as f64).max(1.0);
    numer / denom
}

fn is_low_score(home: u8, away: u8) -> bool {
    home <= 1 && away <= 1
}

/// Fits rho from the gap between the observed share of 0-0/1-0/0-1/1-1 results
/// and the share independent Poisson predicts at the dataset's mean goals.
/// Too little data yields the configured default.
pub fn fit_optimal_rho(history: &[HistoricalMatch], cfg: &SimulationConfig) -> RhoFit {
    let mut samples = 0usize;
    let mut low = 0usize;
    let mut home_goals = 0.0_f64;
    let mut away_goals = 0.0_f64;

    for m in history {
        let Some(score) = m.score else { continue };
        samples += 1;
        home_goals += score.home as f64;
        away_goals += score.away as f64;
        if is_low_score(score.home, score.away) {
            low += 1;
        }
    }

    if samples < cfg.rho_min_matches {
        warn!(
            samples,
            required = cfg.rho_min_matches,
            rho = cfg.default_rho,
            "not enough scored matches for rho fit, using default"
        );
        return RhoFit {
            rho: cfg.default_rho,
            source: RhoSource::Default,
            samples,
            observed_low_score: 0.0,
            expected_low_score: 0.0,
        };
    }

    let n = samples as f64;
    let (lh, la) = (home_goals / n, away_goals / n);
    let expected: f64 = [(0, 0), (1, 0), (0, 1), (1, 1)]
        .iter()
        .map(|&(h, a)| poisson_pmf(h, lh) * poisson_pmf(a, la))
        .sum();
    let observed = low as f64 / n;

    let raw = cfg.default_rho + (expected - observed) * cfg.rho_sensitivity;
    let rho = (raw.clamp(cfg.rho_min, cfg.rho_max) * 1000.0).round() / 1000.0;

    info!(
        samples,
        observed = format!("{:.3}", observed),
        expected = format!("{:.3}", expected),
        rho,
        "fitted Dixon-Coles rho"
    );

    RhoFit {
        rho,
        source: RhoSource::Fitted,
        samples,
        observed_low_score: observed,
        expected_low_score: expected,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::match_data::{MarketOdds, Score, TeamRef};

    fn scored(home: u8, away: u8) -> HistoricalMatch {
        HistoricalMatch {
            fixture_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            league: "L".to_string(),
            league_id: None,
            home: TeamRef::named("H"),
            away: TeamRef::named("A"),
            score: Some(Score::new(home, away)),
            odds: MarketOdds::default(),
            tip: None,
        }
    }

    #[test]
    fn perfect_forecasts_score_zero_brier() {
        let preds = [
            Prob3::from_percentages(100.0, 0.0, 0.0),
            Prob3::from_percentages(0.0, 100.0, 0.0),
        ];
        let m = evaluate_probs(&preds, &[Outcome::Home, Outcome::Draw]);
        assert_eq!(m.samples, 2);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_inputs_score_nothing() {
        let preds = [Prob3::from_percentages(50.0, 25.0, 25.0)];
        assert_eq!(evaluate_probs(&preds, &[]).samples, 0);
    }

    #[test]
    fn bins_average_per_bucket() {
        let preds = [
            Prob3::from_percentages(40.0, 25.0, 35.0),
            Prob3::from_percentages(45.0, 29.0, 26.0),
            Prob3::from_percentages(18.0, 72.0, 10.0),
        ];
        let outcomes = [Outcome::Draw, Outcome::Home, Outcome::Draw];
        let bins = calibration_bins(&preds, &outcomes, Outcome::Draw, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[2].count, 2);
        assert!((bins[2].mean_predicted - 0.27).abs() < 1e-9);
        assert!((bins[2].observed_rate - 0.5).abs() < 1e-9);
        assert_eq!(bins[7].count, 1);
        assert!((bins[7].observed_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tau_matches_dixon_coles_table() {
        let rho = -0.11;
        assert!((dc_tau(0, 0, 1.5, 1.2, rho) - (1.0 + 1.5 * 1.2 * 0.11)).abs() < 1e-12);
        assert!((dc_tau(1, 0, 1.5, 1.2, rho) - (1.0 - 1.2 * 0.11)).abs() < 1e-12);
        assert!((dc_tau(0, 1, 1.5, 1.2, rho) - (1.0 - 1.5 * 0.11)).abs() < 1e-12);
        assert!((dc_tau(1, 1, 1.5, 1.2, rho) - 1.11).abs() < 1e-12);
        assert_eq!(dc_tau(2, 1, 1.5, 1.2, rho), 1.0);
    }

    #[test]
    fn rho_defaults_below_sample_minimum() {
        let cfg = SimulationConfig::default();
        let history: Vec<_> = (0..499).map(|_| scored(1, 1)).collect();
        let fit = fit_optimal_rho(&history, &cfg);
        assert_eq!(fit.source, RhoSource::Default);
        assert_eq!(fit.rho, cfg.default_rho);
    }

    #[test]
    fn rho_is_clamped_to_bounds() {
        let cfg = SimulationConfig::default();
        // Nothing but 1-1 draws: observed low-score share far above Poisson.
        let history: Vec<_> = (0..600).map(|_| scored(1, 1)).collect();
        let fit = fit_optimal_rho(&history, &cfg);
        assert_eq!(fit.source, RhoSource::Fitted);
        assert!(fit.rho >= cfg.rho_min && fit.rho <= cfg.rho_max);

        // High-scoring only: low-score share is zero, rho moves toward zero.
        let history: Vec<_> = (0..600).map(|_| scored(3, 2)).collect();
        let fit = fit_optimal_rho(&history, &cfg);
        assert!(fit.rho <= 0.0);
        assert!(fit.rho > cfg.default_rho);
    }
}
