use std::collections::HashMap;

use tracing::debug;

use crate::config::EloConfig;
use crate::match_data::{HistoricalMatch, TeamKey, TeamRef};

#[derive(Debug, Clone)]
pub struct TeamRatings {
    initial: f64,
    ratings: HashMap<TeamKey, f64>,
    replayed: usize,
}

impl TeamRatings {
    pub fn empty(cfg: &EloConfig) -> Self {
        Self {
            initial: cfg.initial_rating,
            ratings: HashMap::new(),
            replayed: 0,
        }
    }

    pub fn from_history(history: &[HistoricalMatch], cfg: &EloConfig) -> Self {
        let mut matches: Vec<&HistoricalMatch> = history.iter().collect();
        // Stable sort keeps same-day rows in input order.
        matches.sort_by_key(|m| m.date);

        let mut out = Self::empty(cfg);
        for m in matches {
            let Some(score) = m.score else { continue };
            let (home, away) = (m.home.key(), m.away.key());
            if home == away {
                debug!(fixture = %m.fixture_label(), "skipping elo row with identical teams");
                continue;
            }

            let rh = out.rating_by_key(&home);
            let ra = out.rating_by_key(&away);
            let actual_home = match score.home.cmp(&score.away) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Less => 0.0,
                std::cmp::Ordering::Equal => 0.5,
            };
            let (dh, da) = update_deltas(rh, ra, actual_home, cfg);
            out.ratings.insert(home, rh + dh);
            out.ratings.insert(away, ra + da);
            out.replayed += 1;
        }
        out
    }

    pub fn rating(&self, team: &TeamRef) -> f64 {
        self.rating_by_key(&team.key())
    }

    fn rating_by_key(&self, key: &TeamKey) -> f64 {
        self.ratings.get(key).copied().unwrap_or(self.initial)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn replayed(&self) -> usize {
        self.replayed
    }
}

pub fn update_deltas(rating_home: f64, rating_away: f64, actual_home: f64, cfg: &EloConfig) -> (f64, f64) {
    let expected_home = expected_score(rating_home + cfg.home_adv_pts, rating_away);
    let delta = cfg.k * (actual_home - expected_home);
    (delta, -delta)
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::match_data::{MarketOdds, Score};

    fn m(day: u32, home: &str, away: &str, score: Option<(u8, u8)>) -> HistoricalMatch {
        HistoricalMatch {
            fixture_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            league: "L".to_string(),
            league_id: None,
            home: TeamRef::named(home),
            away: TeamRef::named(away),
            score: score.map(|(h, a)| Score::new(h, a)),
            odds: MarketOdds::default(),
            tip: None,
        }
    }

    #[test]
    fn single_update_is_zero_sum() {
        let cfg = EloConfig::default();
        for actual in [0.0, 0.5, 1.0] {
            let (dh, da) = update_deltas(1600.0, 1400.0, actual, &cfg);
            assert!((dh + da).abs() < 1e-12);
        }
        let (dh, _) = update_deltas(1500.0, 1500.0, 1.0, &cfg);
        assert!((dh - 16.0).abs() < 1e-9);
    }

    #[test]
    fn replay_order_is_chronological_not_input_order() {
        let cfg = EloConfig::default();
        let sorted = vec![
            m(1, "A", "B", Some((2, 0))),
            m(2, "B", "C", Some((1, 1))),
            m(3, "C", "A", Some((0, 3))),
        ];
        let mut shuffled = sorted.clone();
        shuffled.reverse();

        let a = TeamRatings::from_history(&sorted, &cfg);
        let b = TeamRatings::from_history(&shuffled, &cfg);
        for t in ["A", "B", "C"] {
            let team = TeamRef::named(t);
            assert_eq!(a.rating(&team), b.rating(&team));
        }
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let cfg = EloConfig::default();
        let history = vec![
            m(1, "A", "B", None),
            m(2, "A", "a ", Some((1, 0))),
            m(3, "A", "B", Some((1, 0))),
        ];
        let r = TeamRatings::from_history(&history, &cfg);
        assert_eq!(r.replayed(), 1);
        assert!(r.rating(&TeamRef::named("A")) > 1500.0);
        assert_eq!(r.rating(&TeamRef::named("Unknown")), 1500.0);
    }

    #[test]
    fn ratings_stay_zero_sum_over_a_replay() {
        let cfg = EloConfig::default();
        let history = vec![
            m(1, "A", "B", Some((2, 0))),
            m(2, "B", "C", Some((0, 1))),
            m(3, "C", "A", Some((2, 2))),
        ];
        let r = TeamRatings::from_history(&history, &cfg);
        let total: f64 = ["A", "B", "C"]
            .iter()
            .map(|t| r.rating(&TeamRef::named(*t)))
            .sum();
        assert!((total - 4500.0).abs() < 1e-9);
    }
}
