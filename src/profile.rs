use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calibration::{RhoFit, fit_optimal_rho};
use crate::config::EngineConfig;
use crate::elo::TeamRatings;
use crate::league_params::{DynamicGoalFactors, StandingsRow};
use crate::match_data::{HistoricalMatch, normalize_league};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueEntry {
    pub name: String,
    pub league_id: u32,
}

#[derive(Debug, Clone)]
pub struct EngineProfile {
    pub ratings: TeamRatings,
    pub goal_factors: DynamicGoalFactors,
    pub rho: RhoFit,
    pub standings: HashMap<u32, Vec<StandingsRow>>,
    pub league_registry: HashMap<String, u32>,
}

impl EngineProfile {
    pub fn build(
        history: &[HistoricalMatch],
        standings: HashMap<u32, Vec<StandingsRow>>,
        leagues: &[LeagueEntry],
        cfg: &EngineConfig,
    ) -> Self {
        let ratings = TeamRatings::from_history(history, &cfg.elo);
        let goal_factors = DynamicGoalFactors::compute(history, &cfg.league);
        let rho = fit_optimal_rho(history, &cfg.simulation);
        let league_registry: HashMap<String, u32> = leagues
            .iter()
            .map(|l| (normalize_league(&l.name), l.league_id))
            .collect();

        info!(
            history = history.len(),
            teams = ratings.len(),
            elo_matches = ratings.replayed(),
            goal_factor_leagues = goal_factors.factors.len(),
            rho = rho.rho,
            standings = standings.len(),
            leagues = league_registry.len(),
            "engine profile built"
        );

        Self {
            ratings,
            goal_factors,
            rho,
            standings,
            league_registry,
        }
    }

    /// Profile for fixtures played on `date`: only results before the
    /// lookahead cutoff feed ratings, rho and goal factors.
    pub fn as_of(
        history: &[HistoricalMatch],
        standings: HashMap<u32, Vec<StandingsRow>>,
        leagues: &[LeagueEntry],
        cfg: &EngineConfig,
        date: NaiveDate,
    ) -> Self {
        let cutoff = cfg.lookahead.as_of(date);
        let past: Vec<HistoricalMatch> = history.iter().filter(|m| m.date < cutoff).cloned().collect();
        debug!(%cutoff, kept = past.len(), dropped = history.len() - past.len(), "history cut for profile");
        Self::build(&past, standings, leagues, cfg)
    }

    pub fn resolve_league_id(&self, league: &str, league_id: Option<u32>) -> Option<u32> {
        league_id.or_else(|| self.league_registry.get(&normalize_league(league)).copied())
    }

    pub fn standings_for(&self, league: &str, league_id: Option<u32>) -> Option<&[StandingsRow]> {
        let id = self.resolve_league_id(league, league_id)?;
        self.standings.get(&id).map(Vec::as_slice)
    }
}
