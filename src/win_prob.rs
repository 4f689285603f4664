use serde::Serialize;

use crate::config::EngineConfig;
use crate::league_params::{LeagueProfile, resolve_profile};
use crate::match_data::{HistoricalMatch, Market, TeamRef, normalize_league};
use crate::profile::EngineProfile;
use crate::signal_selector::{BestPick, build_candidates, select_best};
use crate::simulator::{MatchSimulator, OutcomeProbs, SimulationResult, refine_draw};
use crate::team_form::{FormMode, FormReport, FormResult, TeamFormAnalyzer};
use crate::trading::{StrategyCandidate, StrategyContext, generate_strategies};

const LAMBDA_MIN: f64 = 0.1;
const LAMBDA_MAX: f64 = 6.0;
const FORM_WEIGHT: f64 = 0.6;
const SEASON_WEIGHT: f64 = 0.4;
const ELO_SCALE: f64 = 1500.0;
const ELO_FACTOR_CAP: f64 = 0.2;
const CATEGORY_GAP_ELO: f64 = 250.0;

const CUP_KEYWORDS: &[&str] = &[
    "cup",
    "coppa",
    "trofeo",
    "copa",
    "final",
    "supercup",
    "supercoppa",
    "super cup",
    "qualifiers",
    "play-off",
    "friendlies",
    "friendly",
    "international",
    "spareggio",
];

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDigest {
    pub name: String,
    pub elo: f64,
    pub season_scored: f64,
    pub season_conceded: f64,
    pub form_scored: f64,
    pub form_conceded: f64,
    pub sequence: String,
    pub draw_rate: f64,
    pub matches: usize,
}

impl TeamDigest {
    fn new(team: &TeamRef, elo: f64, report: &FormReport, draw_rate: f64) -> Self {
        let sequence = report
            .current_form
            .outcomes
            .iter()
            .map(|r| match r {
                FormResult::Win => 'W',
                FormResult::Draw => 'D',
                FormResult::Loss => 'L',
            })
            .collect();
        Self {
            name: team.name.clone(),
            elo,
            season_scored: report.season.avg_scored,
            season_conceded: report.season.avg_conceded,
            form_scored: report.current_form.avg_scored,
            form_conceded: report.current_form.avg_conceded,
            sequence,
            draw_rate,
            matches: report.season.matches,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPrediction {
    pub fixture: HistoricalMatch,
    pub league_id: Option<u32>,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub elo_diff: f64,
    pub home: TeamDigest,
    pub away: TeamDigest,
    pub league: LeagueProfile,
    pub simulation: SimulationResult,
    pub outcome: OutcomeProbs,
    pub avg_hist_draw: f64,
    pub best_pick: Option<BestPick>,
    pub form_score: Option<f64>,
    pub strategies: Vec<StrategyCandidate>,
    pub is_cup: bool,
    pub category_gap: bool,
}

impl MatchPrediction {
    pub fn best_strategy(&self) -> Option<&StrategyCandidate> {
        self.strategies.first()
    }
}

pub fn elo_factor(elo_diff: f64) -> f64 {
    1.0 + clamp(elo_diff / ELO_SCALE, -ELO_FACTOR_CAP, ELO_FACTOR_CAP)
}

pub fn compose_lambdas(
    home: &FormReport,
    away: &FormReport,
    league: &LeagueProfile,
    elo_diff: f64,
) -> (f64, f64) {
    let attack = |own: &FormReport, opp: &FormReport| {
        (own.current_form.avg_scored * FORM_WEIGHT
            + own.season.avg_scored * SEASON_WEIGHT
            + opp.current_form.avg_conceded * FORM_WEIGHT
            + opp.season.avg_conceded * SEASON_WEIGHT)
            / 2.0
    };
    let lh = attack(home, away) * league.goal_factor * league.motivation_home * elo_factor(elo_diff);
    let la = attack(away, home) * league.goal_factor * league.motivation_away * elo_factor(-elo_diff);
    (clamp(lh, LAMBDA_MIN, LAMBDA_MAX), clamp(la, LAMBDA_MIN, LAMBDA_MAX))
}

pub fn is_cup_competition(league: &str) -> bool {
    let l = normalize_league(league);
    if l.contains("league") {
        return false;
    }
    CUP_KEYWORDS.iter().any(|k| l.contains(k))
}

pub fn predict_match(
    fixture: &HistoricalMatch,
    history: &[HistoricalMatch],
    profile: &EngineProfile,
    cfg: &EngineConfig,
) -> MatchPrediction {
    let as_of = cfg.lookahead.as_of(fixture.date);
    let form = TeamFormAnalyzer::new(history, &cfg.form, as_of);
    let home_report = form.compute_stats(&fixture.home, true, FormMode::All);
    let away_report = form.compute_stats(&fixture.away, false, FormMode::All);

    let elo_home = profile.ratings.rating(&fixture.home);
    let elo_away = profile.ratings.rating(&fixture.away);
    let elo_diff = elo_home - elo_away;

    let league_id = profile.resolve_league_id(&fixture.league, fixture.league_id);
    let league = resolve_profile(
        &fixture.league,
        &fixture.home,
        &fixture.away,
        profile.standings_for(&fixture.league, league_id),
        &profile.goal_factors,
        &cfg.league,
    );

    let (lambda_home, lambda_away) = compose_lambdas(&home_report, &away_report, &league, elo_diff);
    let simulator = MatchSimulator::new(profile.rho.rho, &cfg.simulation);
    let simulation = simulator.simulate(
        lambda_home,
        lambda_away,
        cfg.simulation.iterations,
        &fixture.seed(),
        league.entropy,
    );

    let draw_home = form.draw_rate(&fixture.home);
    let draw_away = form.draw_rate(&fixture.away);
    let rate_or_default = |total: usize, rate: f64| {
        if total > 0 { rate } else { cfg.form.default_draw_rate }
    };
    let home_draw_rate = rate_or_default(draw_home.total, draw_home.rate);
    let away_draw_rate = rate_or_default(draw_away.total, draw_away.rate);
    let avg_hist_draw = (home_draw_rate + away_draw_rate) / 2.0;

    let tip = fixture.tip.as_ref().filter(|t| t.has_label());
    let outcome = refine_draw(&simulation, avg_hist_draw, tip, &cfg.draw);

    let candidates = build_candidates(&simulation, &outcome, &fixture.odds, &cfg.selection);
    let best_pick = select_best(&candidates, &fixture.league, &cfg.selection);

    let score_market = tip
        .and_then(|t| Market::from_label(&t.label))
        .or(best_pick.as_ref().map(|p| p.candidate.market));
    let form_score = score_market.map(|m| {
        form.form_score(
            &fixture.home,
            &fixture.away,
            m,
            tip.and_then(|t| t.ht_goal_probability),
        )
    });

    let ctx = StrategyContext {
        sim: &simulation,
        outcome: &outcome,
        odds: &fixture.odds,
        tip,
        league: &league,
        elo_diff,
        avg_hist_draw,
        form_score,
        best_pick_probability: best_pick.as_ref().map(|p| p.candidate.probability).unwrap_or(0.0),
        min_value_edge: cfg.selection.min_value_edge,
    };
    let plan = generate_strategies(&ctx, &cfg.trading);
    let strategies = plan.top3().to_vec();

    let is_cup = is_cup_competition(&fixture.league);
    MatchPrediction {
        fixture: fixture.clone(),
        league_id,
        lambda_home,
        lambda_away,
        elo_diff,
        home: TeamDigest::new(&fixture.home, elo_home, &home_report, home_draw_rate),
        away: TeamDigest::new(&fixture.away, elo_away, &away_report, away_draw_rate),
        league,
        simulation,
        outcome,
        avg_hist_draw,
        best_pick,
        form_score,
        strategies,
        is_cup,
        category_gap: is_cup && elo_diff.abs() > CATEGORY_GAP_ELO,
    }
}
