use std::collections::BTreeMap;

use serde::Serialize;

use crate::calibration::dc_tau;
use crate::config::{DrawConfig, SimulationConfig};
use crate::league_params::volatility_index;
use crate::match_data::{ExternalTip, Market};
use crate::rng::{Mulberry32, SimRng};

// Knuth's sampler multiplies uniforms until it drops below exp(-lambda);
// beyond this it underflows long before it terminates sensibly.
const MAX_SAMPLER_LAMBDA: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stability {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExactScore {
    pub home: u32,
    pub away: u32,
    pub percent: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub win_home: u32,
    pub draw: u32,
    pub win_away: u32,
    pub dc_1x: u32,
    pub dc_x2: u32,
    pub dc_12: u32,
    pub over_15: u32,
    pub over_25: u32,
    pub under_35: u32,
    pub ht_goal: u32,
    pub btts: u32,
    pub no_goal: u32,
    pub home_clean_sheet: u32,
    pub away_clean_sheet: u32,
    pub exact_scores: Vec<ExactScore>,
    pub modal_score: Option<ExactScore>,
    pub stability: Stability,
    pub volatility_index: u8,
    pub iterations: u32,
    pub total_weight: f64,
}

impl SimulationResult {
    pub fn neutral(iterations: u32, entropy: f64) -> Self {
        Self {
            win_home: 33,
            draw: 34,
            win_away: 33,
            dc_1x: 67,
            dc_x2: 67,
            dc_12: 66,
            over_15: 50,
            over_25: 50,
            under_35: 50,
            ht_goal: 50,
            btts: 50,
            no_goal: 50,
            home_clean_sheet: 50,
            away_clean_sheet: 50,
            exact_scores: Vec::new(),
            modal_score: None,
            stability: Stability::Low,
            volatility_index: volatility_index(entropy),
            iterations,
            total_weight: 0.0,
        }
    }

    pub fn probability(&self, market: Market) -> u32 {
        match market {
            Market::Home => self.win_home,
            Market::Draw => self.draw,
            Market::Away => self.win_away,
            Market::HomeOrDraw => self.dc_1x,
            Market::DrawOrAway => self.dc_x2,
            Market::HomeOrAway => self.dc_12,
            Market::Over05FirstHalf => self.ht_goal,
            Market::Over15 => self.over_15,
            Market::Over25 => self.over_25,
            Market::Under35 => self.under_35,
            Market::BttsYes => self.btts,
            Market::BttsNo => self.no_goal,
        }
    }
}

pub fn classify_stability(scores: &[ExactScore]) -> Stability {
    let top1 = scores.first().map(|s| s.percent).unwrap_or(0);
    let top3: u32 = scores.iter().take(3).map(|s| s.percent).sum();
    if top1 >= 14 || top3 >= 35 {
        Stability::High
    } else if top1 >= 10 || top3 >= 25 {
        Stability::Medium
    } else {
        Stability::Low
    }
}

/// Knuth's Poisson sampler driven by `rng`.
pub fn sample_poisson(lambda: f64, rng: &mut dyn SimRng) -> u32 {
    let lambda = lambda.clamp(0.0, MAX_SAMPLER_LAMBDA);
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        k += 1;
        p *= rng.next_f64();
        if p <= limit {
            break;
        }
    }
    k - 1
}

#[derive(Default)]
struct Tally {
    home: f64,
    draw: f64,
    away: f64,
    dc_1x: f64,
    dc_x2: f64,
    dc_12: f64,
    over_15: f64,
    over_25: f64,
    under_35: f64,
    ht_goal: f64,
    btts: f64,
    no_goal: f64,
    home_clean: f64,
    away_clean: f64,
    scores: BTreeMap<(u32, u32), f64>,
}

impl Tally {
    fn add(&mut self, hg: u32, ag: u32, ht_goals: u32, w: f64) {
        if hg > ag {
            self.home += w;
        } else if hg == ag {
            self.draw += w;
        } else {
            self.away += w;
        }
        if hg >= ag {
            self.dc_1x += w;
        }
        if ag >= hg {
            self.dc_x2 += w;
        }
        if hg != ag {
            self.dc_12 += w;
        }

        let total = hg + ag;
        if total >= 2 {
            self.over_15 += w;
        }
        if total >= 3 {
            self.over_25 += w;
        }
        if total <= 3 {
            self.under_35 += w;
        }
        if ht_goals > 0 {
            self.ht_goal += w;
        }
        if hg > 0 && ag > 0 {
            self.btts += w;
        } else {
            self.no_goal += w;
        }
        if ag == 0 {
            self.home_clean += w;
        }
        if hg == 0 {
            self.away_clean += w;
        }
        *self.scores.entry((hg, ag)).or_insert(0.0) += w;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchSimulator {
    pub rho: f64,
    pub jitter_scale: f64,
    pub half_time_share: f64,
}

impl MatchSimulator {
    pub fn new(rho: f64, cfg: &SimulationConfig) -> Self {
        Self {
            rho,
            jitter_scale: cfg.jitter_scale,
            half_time_share: cfg.half_time_share,
        }
    }

    pub fn simulate(
        &self,
        lambda_home: f64,
        lambda_away: f64,
        iterations: u32,
        seed: &str,
        entropy: f64,
    ) -> SimulationResult {
        let mut rng = Mulberry32::from_seed_str(seed);
        self.simulate_with(lambda_home, lambda_away, iterations, entropy, &mut rng)
    }

    pub fn simulate_with(
        &self,
        lambda_home: f64,
        lambda_away: f64,
        iterations: u32,
        entropy: f64,
        rng: &mut dyn SimRng,
    ) -> SimulationResult {
        let mut tally = Tally::default();
        let jitter = (entropy - 1.0) * self.jitter_scale;

        for _ in 0..iterations {
            let (mut lh, mut la) = (lambda_home, lambda_away);
            if entropy != 1.0 {
                lh = (lambda_home + rng.next_f64() * jitter * 2.0 - jitter).max(0.1);
                la = (lambda_away + rng.next_f64() * jitter * 2.0 - jitter).max(0.1);
            }

            let hg = sample_poisson(lh, rng);
            let ag = sample_poisson(la, rng);
            let w = dc_tau(hg, ag, lambda_home, lambda_away, self.rho).max(0.0);

            let ht_home = sample_poisson(lh * self.half_time_share, rng);
            let ht_away = sample_poisson(la * self.half_time_share, rng);

            tally.add(hg, ag, ht_home + ht_away, w);
        }

        let total_weight: f64 = tally.scores.values().sum();
        if total_weight <= 0.0 || !total_weight.is_finite() {
            return SimulationResult::neutral(iterations, entropy);
        }
        let pct = |v: f64| (v / total_weight * 100.0).round() as u32;

        let mut exact_scores: Vec<ExactScore> = tally
            .scores
            .iter()
            .map(|(&(home, away), &weight)| ExactScore {
                home,
                away,
                percent: pct(weight),
                weight,
            })
            .collect();
        exact_scores.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then((a.home, a.away).cmp(&(b.home, b.away)))
        });

        SimulationResult {
            win_home: pct(tally.home),
            draw: pct(tally.draw),
            win_away: pct(tally.away),
            dc_1x: pct(tally.dc_1x),
            dc_x2: pct(tally.dc_x2),
            dc_12: pct(tally.dc_12),
            over_15: pct(tally.over_15),
            over_25: pct(tally.over_25),
            under_35: pct(tally.under_35),
            ht_goal: pct(tally.ht_goal),
            btts: pct(tally.btts),
            no_goal: pct(tally.no_goal),
            home_clean_sheet: pct(tally.home_clean),
            away_clean_sheet: pct(tally.away_clean),
            modal_score: exact_scores.first().copied(),
            stability: classify_stability(&exact_scores),
            volatility_index: volatility_index(entropy),
            exact_scores,
            iterations,
            total_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeProbs {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OutcomeProbs {
    pub fn get(&self, market: Market) -> Option<f64> {
        match market {
            Market::Home => Some(self.home),
            Market::Draw => Some(self.draw),
            Market::Away => Some(self.away),
            Market::HomeOrDraw => Some(self.home + self.draw),
            Market::DrawOrAway => Some(self.draw + self.away),
            Market::HomeOrAway => Some(self.home + self.away),
            _ => None,
        }
    }
}

/// Blends the simulated draw with the teams' historical draw rate, shrinks it
/// when an outside source calls a winner, then rescales home/away so the three
/// sum to 100.
pub fn refine_draw(
    sim: &SimulationResult,
    avg_hist_draw: f64,
    tip: Option<&ExternalTip>,
    cfg: &DrawConfig,
) -> OutcomeProbs {
    let mut draw = sim.draw as f64 * cfg.sim_weight + avg_hist_draw * cfg.hist_weight;
    if tip.is_some_and(ExternalTip::is_decisive) {
        draw *= cfg.decisive_tip_shrink;
    }
    let draw = draw.clamp(0.0, 100.0);
    let remainder = 100.0 - draw;

    let (h, a) = (sim.win_home as f64, sim.win_away as f64);
    let (home, away) = if h + a > 0.0 {
        (h * remainder / (h + a), a * remainder / (h + a))
    } else {
        (remainder / 2.0, remainder / 2.0)
    };
    OutcomeProbs { home, draw, away }
}
