use serde::Serialize;
use tracing::debug;

use crate::config::SelectionConfig;
use crate::error::CandidateRejection;
use crate::league_params::clean_league_key;
use crate::match_data::{Market, MarketOdds, MarketType};
use crate::simulator::{OutcomeProbs, SimulationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OddsSource {
    Bookmaker,
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueEdge {
    pub implied_probability: f64,
    pub edge: f64,
    pub roi: f64,
    pub profitable: bool,
}

pub fn value_edge(probability: f64, odds: f64, min_edge: f64) -> ValueEdge {
    if !odds.is_finite() || odds <= 1.0 {
        return ValueEdge {
            implied_probability: 100.0,
            edge: 0.0,
            roi: 0.0,
            profitable: false,
        };
    }
    let implied = 100.0 / odds;
    let edge = probability - implied;
    let roi = edge / implied * 100.0;
    ValueEdge {
        implied_probability: round1(implied),
        edge: round1(edge),
        roi: round1(roi),
        profitable: edge >= min_edge,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalCandidate {
    pub market: Market,
    pub label: &'static str,
    pub probability: f64,
    pub odds: f64,
    pub odds_source: OddsSource,
    pub market_type: MarketType,
    pub edge: Option<ValueEdge>,
}

impl SignalCandidate {
    pub fn new(market: Market, probability: f64, bookmaker: Option<f64>, min_edge: f64) -> Self {
        let (odds, odds_source) = match bookmaker {
            Some(o) => (o, OddsSource::Bookmaker),
            None => (round2(100.0 / probability.max(1.0)), OddsSource::Estimated),
        };
        Self {
            market,
            label: market.label(),
            probability,
            odds,
            odds_source,
            market_type: market.market_type(),
            edge: bookmaker.map(|o| value_edge(probability, o, min_edge)),
        }
    }
}

/// One candidate per market. Result and double-chance markets read the refined
/// 1X2 triple, goal markets the simulation.
pub fn build_candidates(
    sim: &SimulationResult,
    outcome: &OutcomeProbs,
    odds: &MarketOdds,
    cfg: &SelectionConfig,
) -> Vec<SignalCandidate> {
    Market::ALL
        .iter()
        .map(|&m| {
            let p = outcome.get(m).unwrap_or(sim.probability(m) as f64);
            SignalCandidate::new(m, p, odds.get(m), cfg.min_value_edge)
        })
        .collect()
}

pub fn check_candidate(
    c: &SignalCandidate,
    league: &str,
    cfg: &SelectionConfig,
) -> Result<(), CandidateRejection> {
    let required = cfg.min_probability(c.market);
    if c.probability < required {
        return Err(CandidateRejection::LowProbability {
            probability: c.probability,
            required,
        });
    }
    if c.odds < cfg.min_odds {
        return Err(CandidateRejection::OddsTooLow {
            odds: c.odds,
            min: cfg.min_odds,
        });
    }
    if c.odds > cfg.hard_cap {
        return Err(CandidateRejection::AboveHardCap {
            odds: c.odds,
            cap: cfg.hard_cap,
        });
    }
    if c.odds >= cfg.premium_band_start && c.probability < cfg.premium_band_min_probability {
        return Err(CandidateRejection::PremiumBand {
            odds: c.odds,
            required: cfg.premium_band_min_probability,
        });
    }
    let key = clean_league_key(league);
    for floor in &cfg.league_floors {
        if floor.market == c.market && key.contains(&floor.league) && c.odds <= floor.min_odds_exclusive {
            return Err(CandidateRejection::LeagueFloor {
                odds: c.odds,
                floor: floor.min_odds_exclusive,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPick {
    pub candidate: SignalCandidate,
    pub fallback: bool,
}

fn rank(a: &SignalCandidate, b: &SignalCandidate) -> std::cmp::Ordering {
    b.probability
        .total_cmp(&a.probability)
        .then(b.market_type.priority().cmp(&a.market_type.priority()))
}

/// Highest-probability qualifying candidate, double chance before straight
/// before goals on ties. Falls back to the most probable candidate overall, so
/// this is `None` only for an empty slice.
pub fn select_best(candidates: &[SignalCandidate], league: &str, cfg: &SelectionConfig) -> Option<BestPick> {
    let mut qualified: Vec<&SignalCandidate> = Vec::new();
    for c in candidates {
        match check_candidate(c, league, cfg) {
            Ok(()) => qualified.push(c),
            Err(reason) => debug!(market = c.label, %reason, "candidate rejected"),
        }
    }
    qualified.sort_by(|a, b| rank(a, b));
    if let Some(best) = qualified.first() {
        return Some(BestPick {
            candidate: (*best).clone(),
            fallback: false,
        });
    }

    let mut all: Vec<&SignalCandidate> = candidates.iter().collect();
    all.sort_by(|a, b| rank(a, b));
    all.first().map(|c| BestPick {
        candidate: (*c).clone(),
        fallback: true,
    })
}
