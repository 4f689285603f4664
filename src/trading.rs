use serde::Serialize;

use crate::config::TradingConfig;
use crate::league_params::{BadgeKind, LeagueProfile};
use crate::match_data::{ExternalTip, Market, MarketOdds};
use crate::signal_selector::value_edge;
use crate::simulator::{OutcomeProbs, SimulationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategyKind {
    BackOver25,
    LayTheDraw,
    SecondHalfSurge,
    Under35Scalping,
    HtSniper,
    EliteSurge,
}

impl StrategyKind {
    pub fn is_professional(self) -> bool {
        matches!(
            self,
            StrategyKind::BackOver25
                | StrategyKind::LayTheDraw
                | StrategyKind::EliteSurge
                | StrategyKind::SecondHalfSurge
        )
    }

    pub fn code(self) -> &'static str {
        match self {
            StrategyKind::BackOver25 => "BACK_OVER_25",
            StrategyKind::LayTheDraw => "LAY_THE_DRAW",
            StrategyKind::SecondHalfSurge => "SECOND_HALF_SURGE",
            StrategyKind::Under35Scalping => "UNDER_35_SCALPING",
            StrategyKind::HtSniper => "HT_SNIPER",
            StrategyKind::EliteSurge => "ELITE_SURGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPlan {
    pub min_odds: f64,
    pub max_odds: Option<f64>,
    pub timing: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitPlan {
    pub target_odds: Option<f64>,
    pub timing: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLoss {
    pub trigger_odds: f64,
    pub timing: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingInstruction {
    pub action: &'static str,
    pub entry: EntryPlan,
    pub exit: ExitPlan,
    pub stop_loss: StopLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyCandidate {
    pub kind: StrategyKind,
    pub confidence: f64,
    pub instruction: TradingInstruction,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub sim: &'a SimulationResult,
    pub outcome: &'a OutcomeProbs,
    pub odds: &'a MarketOdds,
    pub tip: Option<&'a ExternalTip>,
    pub league: &'a LeagueProfile,
    pub elo_diff: f64,
    pub avg_hist_draw: f64,
    /// Form score of the published pick, when there is one.
    pub form_score: Option<f64>,
    pub best_pick_probability: f64,
    pub min_value_edge: f64,
}

fn instruction(kind: StrategyKind, elo_diff: f64) -> TradingInstruction {
    let (action, entry, exit, stop_loss) = match kind {
        StrategyKind::BackOver25 => (
            "Back Over 2.5",
            (1.80, Some(2.30), "first 15-20 min"),
            (Some(1.15), "after the first goal (cash-out)"),
            (1.20, "if 0-0 at 70 min"),
        ),
        StrategyKind::LayTheDraw => (
            "Lay The Draw",
            (3.40, Some(4.50), "live at 15-20 min"),
            (Some(2.00), "after the favourite scores"),
            (2.00, "if 0-0 at 70 min"),
        ),
        StrategyKind::SecondHalfSurge => (
            "Back Over 0.5 2nd half",
            (1.60, Some(2.00), "minute 55-65"),
            (Some(1.10), "after a second-half goal (cash-out)"),
            (1.01, "minute 85"),
        ),
        StrategyKind::Under35Scalping => (
            "Under 3.5 scalping",
            (1.30, Some(1.60), "live, first 5-10 min"),
            (Some(1.15), "after 15-20 min without a goal"),
            (2.50, "after the first goal conceded"),
        ),
        StrategyKind::HtSniper => (
            "Back Over 0.5 HT",
            (1.50, Some(2.00), "minute 15-20"),
            (Some(1.10), "after a first-half goal (cash-out)"),
            (1.01, "end of first half"),
        ),
        StrategyKind::EliteSurge => (
            if elo_diff > 0.0 { "BACK 1" } else { "BACK 2" },
            (1.80, None, "in-play, 0-15 min"),
            (None, "60 min or one goal"),
            (3.00, "if the favourite concedes first"),
        ),
    };
    TradingInstruction {
        action,
        entry: EntryPlan {
            min_odds: entry.0,
            max_odds: entry.1,
            timing: entry.2,
        },
        exit: ExitPlan {
            target_odds: exit.0,
            timing: exit.1,
        },
        stop_loss: StopLoss {
            trigger_odds: stop_loss.0,
            timing: stop_loss.1,
        },
    }
}

fn candidate(kind: StrategyKind, confidence: f64, elo_diff: f64, reasoning: String) -> StrategyCandidate {
    StrategyCandidate {
        kind,
        confidence,
        instruction: instruction(kind, elo_diff),
        reasoning,
    }
}

fn bonus(on: bool, points: f64) -> f64 {
    if on { points } else { 0.0 }
}

fn back_over_25(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let over25 = ctx.sim.over_25 as f64;
    let score = ctx.form_score.unwrap_or(over25);
    if over25 < cfg.over25_min_probability && score < cfg.over25_min_score {
        return None;
    }

    let motivated = ctx.league.has_motivation();
    let elo_gap = ctx.elo_diff.abs() > cfg.over25_elo_gap;
    if let Some(price) = ctx.odds.get(Market::Over25) {
        let min_edge = if motivated || elo_gap {
            cfg.over25_relaxed_edge
        } else {
            0.0
        };
        if value_edge(over25, price, ctx.min_value_edge).edge < min_edge {
            return None;
        }
    }

    let confidence = ((over25 * 0.6 + score * 0.4).round()
        + cfg.professional_bonus
        + bonus(motivated, cfg.motivation_bonus)
        + bonus(elo_gap, cfg.motivation_bonus))
    .min(98.0);
    let mut reasoning = format!("Over 2.5 simulated at {over25:.0}%.");
    if motivated {
        reasoning.push_str(" Table motivation in play.");
    }
    if elo_gap {
        reasoning.push_str(&format!(" ELO gap of {:.0}.", ctx.elo_diff));
    }
    Some(candidate(StrategyKind::BackOver25, confidence, ctx.elo_diff, reasoning))
}

fn lay_the_draw(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let draw = ctx.outcome.draw;
    if draw < cfg.ltd_draw_min || draw > cfg.ltd_draw_max {
        return None;
    }
    if ctx.league.has_badge(BadgeKind::DirectClash) && draw > cfg.ltd_biscotto_draw {
        return None;
    }
    let draw_odds = ctx.odds.get(Market::Draw).unwrap_or(cfg.ltd_default_draw_odds);
    if draw_odds < cfg.ltd_min_draw_odds || ctx.avg_hist_draw >= cfg.ltd_max_hist_draw {
        return None;
    }

    let odds_bonus = ((draw_odds - 3.0) * 5.0).min(15.0);
    let relegation = ctx.league.has_badge(BadgeKind::RelegationFight);
    let confidence = ((100.0 - (draw * 0.7 + ctx.avg_hist_draw * 0.3) + odds_bonus).round()
        + cfg.professional_bonus
        + bonus(relegation, cfg.motivation_bonus))
    .min(95.0);
    let reasoning = format!(
        "Draw at {draw:.0}% with a {:.0}% historical draw rate; draw priced {draw_odds:.2}.",
        ctx.avg_hist_draw
    );
    Some(candidate(StrategyKind::LayTheDraw, confidence, ctx.elo_diff, reasoning))
}

fn second_half_surge(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let prob = ctx
        .tip
        .and_then(|t| t.probability)
        .unwrap_or(ctx.best_pick_probability);
    if prob < cfg.surge_min_probability || prob >= cfg.surge_max_probability {
        return None;
    }
    let motivated = ctx.league.has_motivation();
    let confidence = ((prob * 0.8 + 15.0).round() + 10.0 + bonus(motivated, cfg.motivation_bonus)).min(95.0);
    let reasoning = format!("Pick probability {prob:.0}% suits a late second-half entry.");
    Some(candidate(StrategyKind::SecondHalfSurge, confidence, ctx.elo_diff, reasoning))
}

fn under_35(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let under = ctx.sim.under_35 as f64;
    if under < cfg.under35_min_probability || ctx.league.has_motivation() {
        return None;
    }
    let confidence = (under * 0.7 + 15.0).round().min(90.0);
    let reasoning = format!("Under 3.5 simulated at {under:.0}% with no table pressure.");
    Some(candidate(StrategyKind::Under35Scalping, confidence, ctx.elo_diff, reasoning))
}

fn ht_sniper(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let external = ctx.tip.and_then(|t| t.ht_goal_probability).unwrap_or(0.0);
    let ht = external.max(ctx.sim.ht_goal as f64);
    let motivated = ctx.league.has_motivation();
    if ht < cfg.sniper_min_probability
        && !(ht >= cfg.sniper_motivated_min_probability && motivated)
    {
        return None;
    }
    let title = ctx.league.has_badge(BadgeKind::TitleRace);
    let confidence = (ht.round() + bonus(title, cfg.motivation_bonus)).min(95.0) - cfg.sniper_penalty;
    let reasoning = format!("First-half goal at {ht:.0}%.");
    Some(candidate(StrategyKind::HtSniper, confidence, ctx.elo_diff, reasoning))
}

fn elite_surge(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> Option<StrategyCandidate> {
    let gap = ctx.elo_diff.abs();
    if gap <= cfg.elite_elo_gap {
        return None;
    }
    let confidence = (85.0 + gap / 50.0).min(97.0);
    let reasoning = format!("ELO gap of {gap:.0} points favours the stronger side.");
    Some(candidate(StrategyKind::EliteSurge, confidence, ctx.elo_diff, reasoning))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradingPlan {
    pub ranked: Vec<StrategyCandidate>,
}

impl TradingPlan {
    pub fn best(&self) -> Option<&StrategyCandidate> {
        self.ranked.first()
    }

    pub fn top3(&self) -> &[StrategyCandidate] {
        &self.ranked[..self.ranked.len().min(3)]
    }
}

/// Confidence descending, except that a sniper below the override threshold
/// drops behind every professional strategy at or above `professional_first`.
pub fn rank_strategies(mut all: Vec<StrategyCandidate>, cfg: &TradingConfig) -> Vec<StrategyCandidate> {
    all.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let Some(sniper) = all.iter().position(|s| s.kind == StrategyKind::HtSniper) else {
        return all;
    };
    if all[sniper].confidence >= cfg.sniper_override {
        return all;
    }
    let last_pro = all
        .iter()
        .rposition(|s| s.kind.is_professional() && s.confidence >= cfg.professional_first);
    if let Some(j) = last_pro.filter(|j| *j > sniper) {
        let s = all.remove(sniper);
        all.insert(j, s);
    }
    all
}

pub fn generate_strategies(ctx: &StrategyContext<'_>, cfg: &TradingConfig) -> TradingPlan {
    let mut all: Vec<StrategyCandidate> = [
        back_over_25(ctx, cfg),
        lay_the_draw(ctx, cfg),
        second_half_surge(ctx, cfg),
        elite_surge(ctx, cfg),
        under_35(ctx, cfg),
    ]
    .into_iter()
    .flatten()
    .collect();

    // The sniper only makes the list when nothing solid and professional does.
    if let Some(sniper) = ht_sniper(ctx, cfg) {
        let solid = all
            .iter()
            .any(|s| s.kind.is_professional() && s.confidence > cfg.solid_professional);
        if all.is_empty() || !solid {
            all.push(sniper);
        }
    }

    TradingPlan {
        ranked: rank_strategies(all, cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league_params::{BadgeSide, MotivationBadge, Volatility};

    fn league(badges: Vec<MotivationBadge>) -> LeagueProfile {
        LeagueProfile {
            goal_factor: 1.0,
            entropy: 1.0,
            volatility: Volatility::Stable,
            volatility_index: 4,
            motivation_home: 1.0,
            motivation_away: 1.0,
            rank_home: None,
            rank_away: None,
            badges,
        }
    }

    fn sim(over_25: u32, under_35: u32, ht_goal: u32) -> SimulationResult {
        let mut s = SimulationResult::neutral(10_000, 1.0);
        s.over_25 = over_25;
        s.under_35 = under_35;
        s.ht_goal = ht_goal;
        s
    }

    fn strat(kind: StrategyKind, confidence: f64) -> StrategyCandidate {
        candidate(kind, confidence, 0.0, String::new())
    }

    #[test]
    fn sniper_yields_to_strong_professional() {
        let cfg = TradingConfig::default();
        let ranked = rank_strategies(
            vec![
                strat(StrategyKind::HtSniper, 80.0),
                strat(StrategyKind::LayTheDraw, 72.0),
                strat(StrategyKind::Under35Scalping, 75.0),
            ],
            &cfg,
        );
        let kinds: Vec<_> = ranked.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StrategyKind::Under35Scalping,
                StrategyKind::LayTheDraw,
                StrategyKind::HtSniper
            ]
        );

        // A weak professional does not outrank it.
        let ranked = rank_strategies(
            vec![strat(StrategyKind::LayTheDraw, 65.0), strat(StrategyKind::HtSniper, 68.0)],
            &cfg,
        );
        assert_eq!(ranked[0].kind, StrategyKind::HtSniper);
    }

    #[test]
    fn elite_surge_on_large_gap() {
        let cfg = TradingConfig::default();
        let s = sim(30, 80, 40);
        let outcome = OutcomeProbs {
            home: 60.0,
            draw: 20.0,
            away: 20.0,
        };
        let l = league(vec![]);
        let ctx = StrategyContext {
            sim: &s,
            outcome: &outcome,
            odds: &MarketOdds::default(),
            tip: None,
            league: &l,
            elo_diff: -400.0,
            avg_hist_draw: 25.0,
            form_score: None,
            best_pick_probability: 50.0,
            min_value_edge: 3.0,
        };
        let plan = generate_strategies(&ctx, &cfg);
        let best = plan.best().unwrap();
        assert_eq!(best.kind, StrategyKind::EliteSurge);
        assert_eq!(best.confidence, 93.0);
        assert_eq!(best.instruction.action, "BACK 2");
        assert!(plan.top3().len() <= 3);
    }

    #[test]
    fn lay_the_draw_formula_and_biscotto_guard() {
        let cfg = TradingConfig::default();
        let s = sim(20, 90, 40);
        let outcome = OutcomeProbs {
            home: 40.0,
            draw: 30.0,
            away: 30.0,
        };
        let odds = MarketOdds {
            draw: Some(3.8),
            ..Default::default()
        };
        let l = league(vec![]);
        let ctx = StrategyContext {
            sim: &s,
            outcome: &outcome,
            odds: &odds,
            tip: None,
            league: &l,
            elo_diff: 0.0,
            avg_hist_draw: 20.0,
            form_score: None,
            best_pick_probability: 50.0,
            min_value_edge: 3.0,
        };
        let ltd = lay_the_draw(&ctx, &cfg).unwrap();
        // 100 - (21 + 6) + 4 = 77, +15.
        assert_eq!(ltd.confidence, 92.0);

        let clash = league(vec![MotivationBadge {
            side: BadgeSide::Both,
            kind: BadgeKind::DirectClash,
        }]);
        let high_draw = OutcomeProbs {
            home: 32.0,
            draw: 36.0,
            away: 32.0,
        };
        let ctx = StrategyContext {
            league: &clash,
            outcome: &high_draw,
            ..ctx
        };
        assert!(lay_the_draw(&ctx, &cfg).is_none());
    }

    #[test]
    fn sniper_suppressed_by_solid_professional() {
        let cfg = TradingConfig::default();
        let s = sim(65, 40, 85);
        let outcome = OutcomeProbs {
            home: 45.0,
            draw: 15.0,
            away: 40.0,
        };
        let l = league(vec![]);
        let ctx = StrategyContext {
            sim: &s,
            outcome: &outcome,
            odds: &MarketOdds::default(),
            tip: None,
            league: &l,
            elo_diff: 0.0,
            avg_hist_draw: 25.0,
            form_score: Some(70.0),
            best_pick_probability: 50.0,
            min_value_edge: 3.0,
        };
        let plan = generate_strategies(&ctx, &cfg);
        assert!(plan.ranked.iter().all(|s| s.kind != StrategyKind::HtSniper));
        assert_eq!(plan.best().unwrap().kind, StrategyKind::BackOver25);

        // Alone, the sniper is kept with its penalty applied.
        let quiet = sim(20, 40, 85);
        let ctx = StrategyContext { sim: &quiet, form_score: None, ..ctx };
        let plan = generate_strategies(&ctx, &cfg);
        assert_eq!(plan.ranked.len(), 1);
        assert_eq!(plan.ranked[0].kind, StrategyKind::HtSniper);
        assert_eq!(plan.ranked[0].confidence, 60.0);
    }
}
