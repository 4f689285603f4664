use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::match_data::Market;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub elo: EloConfig,
    pub form: FormConfig,
    pub league: LeagueConfig,
    pub simulation: SimulationConfig,
    pub draw: DrawConfig,
    pub selection: SelectionConfig,
    pub trading: TradingConfig,
    pub distribution: DistributionConfig,
    pub lookahead: Lookahead,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    pub k: f64,
    pub initial_rating: f64,
    pub home_adv_pts: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k: 32.0,
            initial_rating: 1500.0,
            home_adv_pts: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyRules {
    /// Per 0-0 result when scoring an Over market.
    pub goalless_on_over: f64,
    /// Per 4+ goal result when scoring an Under market at 3.5 or below.
    pub goal_fest_on_under: f64,
    pub goal_fest_threshold: u32,
    /// Per draw when scoring "12".
    pub draw_on_no_draw: f64,
}

impl Default for PenaltyRules {
    fn default() -> Self {
        Self {
            goalless_on_over: 5.0,
            goal_fest_on_under: 5.0,
            goal_fest_threshold: 4,
            draw_on_no_draw: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub decay_per_day: f64,
    pub min_weight: f64,
    pub season_months: u32,
    pub current_form_matches: usize,
    pub goals_market_matches: usize,
    pub result_market_matches: usize,
    pub min_goals_market_matches: usize,
    pub min_result_market_matches: usize,
    pub draw_rate_matches: usize,
    pub default_scored: f64,
    pub default_conceded: f64,
    pub default_draw_rate: f64,
    pub penalties: PenaltyRules,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            decay_per_day: 0.0127,
            min_weight: 0.1,
            season_months: 6,
            current_form_matches: 5,
            goals_market_matches: 9,
            result_market_matches: 5,
            min_goals_market_matches: 5,
            min_result_market_matches: 3,
            draw_rate_matches: 30,
            default_scored: 1.3,
            default_conceded: 1.2,
            default_draw_rate: 25.0,
            penalties: PenaltyRules::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueConfig {
    pub global_goal_baseline: f64,
    pub dynamic_min_league_matches: usize,
    pub dynamic_min_total_matches: usize,
    pub relegation_boost: f64,
    pub title_race_boost: f64,
    pub direct_clash_boost: f64,
    pub direct_clash_points: u32,
    pub zone_size: u32,
    pub split_min_played: u32,
    pub split_ratio_max: f64,
    pub split_weight: f64,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            global_goal_baseline: 2.72,
            dynamic_min_league_matches: 20,
            dynamic_min_total_matches: 100,
            relegation_boost: 0.15,
            title_race_boost: 0.10,
            direct_clash_boost: 0.05,
            direct_clash_points: 3,
            zone_size: 4,
            split_min_played: 3,
            split_ratio_max: 1.2,
            split_weight: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub iterations: u32,
    pub default_rho: f64,
    pub rho_min_matches: usize,
    pub rho_sensitivity: f64,
    pub rho_min: f64,
    pub rho_max: f64,
    pub jitter_scale: f64,
    pub half_time_share: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            default_rho: -0.11,
            rho_min_matches: 500,
            rho_sensitivity: 1.5,
            rho_min: -0.20,
            rho_max: 0.0,
            jitter_scale: 0.3,
            half_time_share: 0.45,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub sim_weight: f64,
    pub hist_weight: f64,
    pub decisive_tip_shrink: f64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            sim_weight: 0.7,
            hist_weight: 0.3,
            decisive_tip_shrink: 0.90,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketThreshold {
    pub market: Market,
    pub min_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueOddsFloor {
    pub league: String,
    pub market: Market,
    pub min_odds_exclusive: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub thresholds: Vec<MarketThreshold>,
    pub default_min_probability: f64,
    pub min_odds: f64,
    pub hard_cap: f64,
    pub premium_band_start: f64,
    pub premium_band_min_probability: f64,
    pub league_floors: Vec<LeagueOddsFloor>,
    pub min_value_edge: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let t = |market, min_probability| MarketThreshold {
            market,
            min_probability,
        };
        Self {
            thresholds: vec![
                t(Market::HomeOrAway, 90.0),
                t(Market::HomeOrDraw, 85.0),
                t(Market::DrawOrAway, 85.0),
                t(Market::Over15, 75.0),
                t(Market::Home, 65.0),
                t(Market::Draw, 65.0),
                t(Market::Away, 65.0),
                t(Market::BttsYes, 75.0),
                t(Market::Over25, 82.0),
            ],
            default_min_probability: 75.0,
            min_odds: 1.01,
            hard_cap: 1.40,
            premium_band_start: 1.30,
            premium_band_min_probability: 80.0,
            league_floors: vec![
                LeagueOddsFloor {
                    league: "serie b".to_string(),
                    market: Market::Over15,
                    min_odds_exclusive: 1.20,
                },
                LeagueOddsFloor {
                    league: "serie c".to_string(),
                    market: Market::Over15,
                    min_odds_exclusive: 1.20,
                },
            ],
            min_value_edge: 3.0,
        }
    }
}

impl SelectionConfig {
    pub fn min_probability(&self, market: Market) -> f64 {
        self.thresholds
            .iter()
            .find(|t| t.market == market)
            .map(|t| t.min_probability)
            .unwrap_or(self.default_min_probability)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub professional_bonus: f64,
    pub motivation_bonus: f64,
    pub over25_min_probability: f64,
    pub over25_min_score: f64,
    pub over25_elo_gap: f64,
    pub over25_relaxed_edge: f64,
    pub ltd_draw_min: f64,
    pub ltd_draw_max: f64,
    pub ltd_biscotto_draw: f64,
    pub ltd_min_draw_odds: f64,
    pub ltd_default_draw_odds: f64,
    pub ltd_max_hist_draw: f64,
    pub surge_min_probability: f64,
    pub surge_max_probability: f64,
    pub under35_min_probability: f64,
    pub sniper_min_probability: f64,
    pub sniper_motivated_min_probability: f64,
    pub sniper_penalty: f64,
    pub sniper_override: f64,
    pub solid_professional: f64,
    pub professional_first: f64,
    pub elite_elo_gap: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            professional_bonus: 15.0,
            motivation_bonus: 5.0,
            over25_min_probability: 40.0,
            over25_min_score: 60.0,
            over25_elo_gap: 200.0,
            over25_relaxed_edge: -5.0,
            ltd_draw_min: 22.0,
            ltd_draw_max: 38.0,
            ltd_biscotto_draw: 33.0,
            ltd_min_draw_odds: 3.40,
            ltd_default_draw_odds: 3.50,
            ltd_max_hist_draw: 35.0,
            surge_min_probability: 65.0,
            surge_max_probability: 90.0,
            under35_min_probability: 60.0,
            sniper_min_probability: 72.0,
            sniper_motivated_min_probability: 65.0,
            sniper_penalty: 25.0,
            sniper_override: 90.0,
            solid_professional: 65.0,
            professional_first: 70.0,
            elite_elo_gap: 250.0,
        }
    }
}

/// Filters a preset bucket applies on top of the blacklist. Empty lists and
/// missing bands mean "no constraint".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketPreset {
    pub league_ids: Vec<u32>,
    pub tips: Vec<String>,
    pub odds: Option<(f64, f64)>,
    pub probability: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub blacklist: Vec<String>,
    pub domestic_prefix: String,
    pub continental_top: Vec<String>,
    pub cup_keywords: Vec<String>,
    pub high_winrate: BucketPreset,
    pub ai_special: BucketPreset,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            blacklist: Vec::new(),
            domestic_prefix: "eu-ita".to_string(),
            continental_top: [
                "EU-ENG Premier League",
                "EU-ESP La Liga",
                "EU-DEU Bundesliga",
                "EU-FRA Ligue 1",
                "EU-NED Eredivisie",
                "EU-CHE Super League",
                "EU-PRT Primeira Liga",
                "EU-BEL Pro League",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            cup_keywords: ["champions league", "europa league", "conference league"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            high_winrate: BucketPreset::default(),
            ai_special: BucketPreset::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookahead {
    /// Only matches strictly before the fixture's own date.
    #[default]
    MatchDate,
    /// Everything before a fixed "today", reproducing wall-clock behaviour.
    WallClock(NaiveDate),
}

impl Lookahead {
    pub fn as_of(&self, match_date: NaiveDate) -> NaiveDate {
        match self {
            Lookahead::MatchDate => match_date,
            Lookahead::WallClock(today) => *today,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Some(n) = std::env::var("MATCHDAY_ITERATIONS")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
        {
            self.simulation.iterations = n;
        }
        if let Ok(raw) = std::env::var("MATCHDAY_BLACKLIST") {
            self.distribution.blacklist.extend(parse_list(&raw));
        }
    }
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
