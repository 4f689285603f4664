use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::config::FormConfig;
use crate::match_data::{HistoricalMatch, Market, MarketType, Score, Side, TeamRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl FormResult {
    fn from_goals(scored: u8, conceded: u8) -> Self {
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => FormResult::Win,
            std::cmp::Ordering::Equal => FormResult::Draw,
            std::cmp::Ordering::Less => FormResult::Loss,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonStats {
    pub avg_scored: f64,
    pub avg_conceded: f64,
    pub matches: usize,
    pub total_weight: f64,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
}

impl SeasonStats {
    pub fn draw_rate_or(&self, default: f64) -> f64 {
        if self.matches == 0 {
            return default;
        }
        self.draws as f64 / self.matches as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentForm {
    pub avg_scored: f64,
    pub avg_conceded: f64,
    pub match_count: usize,
    pub outcomes: Vec<FormResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MarketScore {
    Scored {
        successes: usize,
        total: usize,
        percentage: f64,
        penalty: f64,
        score_value: f64,
    },
    InsufficientData {
        total: usize,
        required: usize,
    },
}

impl MarketScore {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, MarketScore::InsufficientData { .. })
    }

    pub fn value_or_zero(&self) -> f64 {
        match self {
            MarketScore::Scored { score_value, .. } => *score_value,
            MarketScore::InsufficientData { .. } => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// Entire history, no recency window. Feeds the simulator.
    All,
    Market(Market),
}

#[derive(Debug, Clone, Serialize)]
pub struct FormReport {
    pub season: SeasonStats,
    pub current_form: CurrentForm,
    pub market: Option<MarketScore>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DrawRate {
    pub rate: f64,
    pub total: usize,
    pub draws: usize,
}

struct Appearance {
    date: NaiveDate,
    side: Side,
    score: Score,
}

impl Appearance {
    fn goals(&self) -> (u8, u8) {
        self.score.for_side(self.side)
    }
}

/// Time-decay weight of a match played on `date`, seen from `as_of`.
pub fn time_weight(date: NaiveDate, as_of: NaiveDate, cfg: &FormConfig) -> f64 {
    let days = (as_of - date).num_days().max(0) as f64;
    (-cfg.decay_per_day * days).exp().max(cfg.min_weight)
}

pub struct TeamFormAnalyzer<'a> {
    history: &'a [HistoricalMatch],
    cfg: &'a FormConfig,
    as_of: NaiveDate,
}

impl<'a> TeamFormAnalyzer<'a> {
    pub fn new(history: &'a [HistoricalMatch], cfg: &'a FormConfig, as_of: NaiveDate) -> Self {
        Self {
            history,
            cfg,
            as_of,
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn appearances(&self, team: &TeamRef, windowed: bool) -> Vec<Appearance> {
        let horizon = if windowed {
            self.as_of.checked_sub_months(Months::new(self.cfg.season_months))
        } else {
            None
        };

        let mut out: Vec<Appearance> = Vec::new();
        for m in self.history {
            let Some(score) = m.score else { continue };
            if m.date >= self.as_of {
                continue;
            }
            if let Some(h) = horizon {
                if m.date < h {
                    continue;
                }
            }
            let Some(side) = m.side_of(team) else { continue };
            out.push(Appearance {
                date: m.date,
                side,
                score,
            });
        }
        // Stable: same-day rows keep input order.
        out.sort_by(|a, b| b.date.cmp(&a.date));
        out
    }

    fn season(&self, apps: &[Appearance]) -> SeasonStats {
        let mut scored = 0.0;
        let mut conceded = 0.0;
        let mut total_weight = 0.0;
        let (mut wins, mut draws, mut losses) = (0, 0, 0);

        for a in apps {
            let (gf, ga) = a.goals();
            let w = time_weight(a.date, self.as_of, self.cfg);
            scored += gf as f64 * w;
            conceded += ga as f64 * w;
            total_weight += w;
            match FormResult::from_goals(gf, ga) {
                FormResult::Win => wins += 1,
                FormResult::Draw => draws += 1,
                FormResult::Loss => losses += 1,
            }
        }

        let (avg_scored, avg_conceded) = if total_weight > 0.0 {
            (scored / total_weight, conceded / total_weight)
        } else {
            (self.cfg.default_scored, self.cfg.default_conceded)
        };
        SeasonStats {
            avg_scored,
            avg_conceded,
            matches: apps.len(),
            total_weight,
            wins,
            draws,
            losses,
        }
    }

    fn current_form(&self, apps: &[Appearance], season: &SeasonStats) -> CurrentForm {
        let recent = &apps[..apps.len().min(self.cfg.current_form_matches)];
        let mut scored = 0.0;
        let mut conceded = 0.0;
        let mut total_weight = 0.0;
        let mut outcomes = Vec::with_capacity(recent.len());

        for a in recent {
            let (gf, ga) = a.goals();
            let w = time_weight(a.date, self.as_of, self.cfg);
            scored += gf as f64 * w;
            conceded += ga as f64 * w;
            total_weight += w;
            outcomes.push(FormResult::from_goals(gf, ga));
        }

        let (avg_scored, avg_conceded) = if total_weight > 0.0 {
            (scored / total_weight, conceded / total_weight)
        } else {
            (season.avg_scored, season.avg_conceded)
        };
        CurrentForm {
            avg_scored,
            avg_conceded,
            match_count: recent.len(),
            outcomes,
        }
    }

    pub fn compute_stats(&self, team: &TeamRef, is_home: bool, mode: FormMode) -> FormReport {
        let apps = self.appearances(team, mode != FormMode::All);
        let season = self.season(&apps);
        let current_form = self.current_form(&apps, &season);
        let market = match mode {
            FormMode::All => None,
            FormMode::Market(market) => Some(self.score_market(&apps, is_home, market)),
        };
        FormReport {
            season,
            current_form,
            market,
        }
    }

    pub fn market_score(&self, team: &TeamRef, is_home: bool, market: Market) -> MarketScore {
        let apps = self.appearances(team, true);
        self.score_market(&apps, is_home, market)
    }

    fn score_market(&self, apps: &[Appearance], is_home: bool, market: Market) -> MarketScore {
        let goals_market = market.market_type() == MarketType::Goals;
        let (relevant, required): (Vec<&Appearance>, usize) = if goals_market {
            (
                apps.iter().take(self.cfg.goals_market_matches).collect(),
                self.cfg.min_goals_market_matches,
            )
        } else {
            let wanted = if is_home { Side::Home } else { Side::Away };
            (
                apps.iter()
                    .filter(|a| a.side == wanted)
                    .take(self.cfg.result_market_matches)
                    .collect(),
                self.cfg.min_result_market_matches,
            )
        };

        if relevant.len() < required {
            return MarketScore::InsufficientData {
                total: relevant.len(),
                required,
            };
        }

        let rules = &self.cfg.penalties;
        let mut successes = 0usize;
        let mut penalty = 0.0;
        for a in &relevant {
            let (h, aw) = (a.score.home, a.score.away);
            let total = a.score.total();
            let (gf, ga) = a.goals();
            let success = match market {
                Market::Over05FirstHalf | Market::Over15 | Market::Over25 => {
                    if total == 0 {
                        penalty += rules.goalless_on_over;
                    }
                    total as f64 > goal_line(market)
                }
                Market::Under35 => {
                    if total >= rules.goal_fest_threshold {
                        penalty += rules.goal_fest_on_under;
                    }
                    (total as f64) < goal_line(market)
                }
                Market::BttsYes => h > 0 && aw > 0,
                Market::BttsNo => h == 0 || aw == 0,
                Market::Draw => gf == ga,
                Market::Home => {
                    if is_home {
                        gf > ga
                    } else {
                        gf < ga
                    }
                }
                Market::Away => {
                    if is_home {
                        gf < ga
                    } else {
                        gf > ga
                    }
                }
                Market::HomeOrDraw => {
                    if is_home {
                        gf >= ga
                    } else {
                        gf <= ga
                    }
                }
                Market::DrawOrAway => {
                    if is_home {
                        gf <= ga
                    } else {
                        gf >= ga
                    }
                }
                Market::HomeOrAway => {
                    if gf == ga {
                        penalty += rules.draw_on_no_draw;
                    }
                    gf > ga
                }
            };
            if success {
                successes += 1;
            }
        }

        let percentage = successes as f64 / relevant.len() as f64 * 100.0;
        MarketScore::Scored {
            successes,
            total: relevant.len(),
            percentage: percentage.round(),
            penalty,
            score_value: (percentage - penalty).round().max(0.0),
        }
    }

    /// Draw share over the team's most recent scored matches, ignoring the
    /// recency window.
    pub fn draw_rate(&self, team: &TeamRef) -> DrawRate {
        let apps = self.appearances(team, false);
        let recent = &apps[..apps.len().min(self.cfg.draw_rate_matches)];
        if recent.is_empty() {
            return DrawRate {
                rate: 0.0,
                total: 0,
                draws: 0,
            };
        }
        let draws = recent.iter().filter(|a| a.score.home == a.score.away).count();
        DrawRate {
            rate: (draws as f64 / recent.len() as f64 * 100.0).round(),
            total: recent.len(),
            draws,
        }
    }

    pub fn form_score(
        &self,
        home: &TeamRef,
        away: &TeamRef,
        market: Market,
        ht_probability: Option<f64>,
    ) -> f64 {
        let h = self.market_score(home, true, market).value_or_zero();
        let a = self.market_score(away, false, market).value_or_zero();
        let mut score = ((h + a) / 2.0).round();

        if let Some(ht) = ht_probability.filter(|p| *p > 0.0) {
            match market {
                Market::Over05FirstHalf | Market::Over15 | Market::Over25 => {
                    if ht >= 75.0 {
                        score += 15.0;
                    } else if ht >= 65.0 {
                        score += 10.0;
                    } else if ht >= 55.0 {
                        score += 5.0;
                    }
                }
                Market::Under35 => {
                    if ht >= 75.0 {
                        score -= 15.0;
                    } else if ht >= 65.0 {
                        score -= 10.0;
                    }
                }
                _ => {}
            }
        }
        score.clamp(0.0, 100.0)
    }
}

fn goal_line(market: Market) -> f64 {
    match market {
        Market::Over05FirstHalf => 0.5,
        Market::Over15 => 1.5,
        Market::Over25 => 2.5,
        Market::Under35 => 3.5,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::MarketOdds;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, home: &str, away: &str, h: u8, a: u8) -> HistoricalMatch {
        HistoricalMatch {
            fixture_id: None,
            date,
            league: "L".to_string(),
            league_id: None,
            home: TeamRef::named(home),
            away: TeamRef::named(away),
            score: Some(Score::new(h, a)),
            odds: MarketOdds::default(),
            tip: None,
        }
    }

    #[test]
    fn weight_decays_and_floors() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        assert_eq!(time_weight(as_of, as_of, &cfg), 1.0);
        let w10 = time_weight(d(2024, 5, 22), as_of, &cfg);
        let w20 = time_weight(d(2024, 5, 12), as_of, &cfg);
        assert!(w10 > w20);
        assert_eq!(time_weight(d(2020, 1, 1), as_of, &cfg), 0.1);
    }

    #[test]
    fn recent_match_weighs_more_in_averages() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        // Same two results, swapped dates: the recent 4-0 pulls harder.
        let a = vec![row(d(2024, 5, 30), "T", "X", 4, 0), row(d(2024, 5, 1), "T", "Y", 0, 0)];
        let b = vec![row(d(2024, 5, 1), "T", "X", 4, 0), row(d(2024, 5, 30), "T", "Y", 0, 0)];
        let team = TeamRef::named("T");
        let sa = TeamFormAnalyzer::new(&a, &cfg, as_of).compute_stats(&team, true, FormMode::All);
        let sb = TeamFormAnalyzer::new(&b, &cfg, as_of).compute_stats(&team, true, FormMode::All);
        assert!(sa.season.avg_scored > 2.0);
        assert!(sb.season.avg_scored < 2.0);
        assert!(sa.current_form.avg_scored > sb.current_form.avg_scored);
    }

    #[test]
    fn future_and_same_day_matches_are_invisible() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history = vec![row(as_of, "T", "X", 5, 0), row(d(2024, 7, 1), "T", "Y", 5, 0)];
        let team = TeamRef::named("T");
        let s = TeamFormAnalyzer::new(&history, &cfg, as_of).compute_stats(&team, true, FormMode::All);
        assert_eq!(s.season.matches, 0);
        assert_eq!(s.season.avg_scored, 1.3);
        assert_eq!(s.season.avg_conceded, 1.2);
        assert_eq!(s.current_form.avg_scored, 1.3);
    }

    #[test]
    fn outcomes_are_newest_first() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history = vec![
            row(d(2024, 5, 1), "T", "A", 1, 0),
            row(d(2024, 5, 10), "B", "T", 1, 1),
            row(d(2024, 5, 20), "T", "C", 0, 2),
        ];
        let team = TeamRef::named("T");
        let s = TeamFormAnalyzer::new(&history, &cfg, as_of).compute_stats(&team, true, FormMode::All);
        assert_eq!(
            s.current_form.outcomes,
            vec![FormResult::Loss, FormResult::Draw, FormResult::Win]
        );
    }

    #[test]
    fn insufficient_data_for_every_market() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history = vec![
            row(d(2024, 5, 1), "T", "A", 1, 0),
            row(d(2024, 5, 10), "T", "B", 2, 1),
        ];
        let team = TeamRef::named("T");
        let f = TeamFormAnalyzer::new(&history, &cfg, as_of);
        for market in Market::ALL {
            let s = f.market_score(&team, true, market);
            assert!(s.is_insufficient(), "{market:?}");
            assert_eq!(s.value_or_zero(), 0.0);
        }
    }

    #[test]
    fn over_penalty_for_goalless_draws() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history: Vec<_> = [(3, 1), (2, 0), (0, 0), (1, 1), (2, 2)]
            .iter()
            .enumerate()
            .map(|(i, (h, a))| row(d(2024, 5, 1 + i as u32), "T", "O", *h, *a))
            .collect();
        let team = TeamRef::named("T");
        let s = TeamFormAnalyzer::new(&history, &cfg, as_of).market_score(&team, true, Market::Over15);
        // 4 of 5 above 1.5 = 80%, one 0-0 costs 5.
        assert_eq!(
            s,
            MarketScore::Scored {
                successes: 4,
                total: 5,
                percentage: 80.0,
                penalty: 5.0,
                score_value: 75.0,
            }
        );
    }

    #[test]
    fn result_markets_use_location_matches() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history = vec![
            row(d(2024, 5, 1), "O1", "T", 2, 0),
            row(d(2024, 5, 2), "O2", "T", 1, 0),
            row(d(2024, 5, 3), "O3", "T", 1, 1),
            row(d(2024, 5, 4), "T", "O4", 3, 0),
        ];
        let team = TeamRef::named("T");
        let f = TeamFormAnalyzer::new(&history, &cfg, as_of);
        // As the away side in a "1" tip: away defeats count as successes.
        match f.market_score(&team, false, Market::Home) {
            MarketScore::Scored {
                successes, total, ..
            } => {
                assert_eq!(total, 3);
                assert_eq!(successes, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        // Only one home match: not enough.
        assert!(f.market_score(&team, true, Market::Home).is_insufficient());
    }

    #[test]
    fn season_window_applies_to_markets_only() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 12, 1);
        let history: Vec<_> = (1..=5)
            .map(|i| row(d(2024, 1, i), "T", "O", 2, 1))
            .collect();
        let team = TeamRef::named("T");
        let f = TeamFormAnalyzer::new(&history, &cfg, as_of);
        assert!(f.market_score(&team, true, Market::Over25).is_insufficient());
        let all = f.compute_stats(&team, true, FormMode::All);
        assert_eq!(all.season.matches, 5);
    }

    #[test]
    fn draw_rate_and_form_score() {
        let cfg = FormConfig::default();
        let as_of = d(2024, 6, 1);
        let history: Vec<_> = [(1, 1), (2, 1), (0, 0), (3, 1)]
            .iter()
            .enumerate()
            .map(|(i, (h, a))| row(d(2024, 5, 1 + i as u32), "T", "O", *h, *a))
            .collect();
        let team = TeamRef::named("T");
        let f = TeamFormAnalyzer::new(&history, &cfg, as_of);
        let dr = f.draw_rate(&team);
        assert_eq!((dr.draws, dr.total, dr.rate), (2, 4, 50.0));
        assert_eq!(f.draw_rate(&TeamRef::named("nobody")).total, 0);

        // Neither side has enough matches: base 0, HT boost still applies.
        let s = f.form_score(&team, &TeamRef::named("O"), Market::Over25, Some(80.0));
        assert_eq!(s, 15.0);
        let s = f.form_score(&team, &TeamRef::named("O"), Market::Under35, Some(80.0));
        assert_eq!(s, 0.0);
    }
}
