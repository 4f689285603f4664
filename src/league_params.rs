use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LeagueConfig;
use crate::match_data::{HistoricalMatch, TeamRef, normalize_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Chaotic,
    High,
    Medium,
    Stable,
    Solid,
}

#[derive(Debug, Clone, Copy)]
pub struct LeagueDna {
    pub key: &'static str,
    pub avg_goals: f64,
    pub home_adv: f64,
    pub entropy: f64,
    pub volatility: Volatility,
}

// Order matters: first containment match wins.
static LEAGUE_DNA: Lazy<Vec<LeagueDna>> = Lazy::new(|| {
    let dna = |key, avg_goals, home_adv, entropy, volatility| LeagueDna {
        key,
        avg_goals,
        home_adv,
        entropy,
        volatility,
    };
    vec![
        dna("eredivisie", 3.27, 0.14, 1.25, Volatility::Chaotic),
        dna("bundesliga", 3.27, 0.28, 1.15, Volatility::High),
        dna("3. liga", 3.27, 0.28, 1.15, Volatility::High),
        dna("premier league", 2.77, 0.40, 1.10, Volatility::Medium),
        dna("la liga", 2.56, 0.31, 1.00, Volatility::Stable),
        dna("serie a", 2.39, 0.05, 0.85, Volatility::Solid),
        dna("serie b", 2.50, 0.35, 0.80, Volatility::Solid),
        dna("championship", 2.60, 0.29, 1.10, Volatility::Medium),
        dna("portugal", 2.88, 0.26, 1.05, Volatility::Medium),
        dna("ligat ha'al", 3.01, 0.25, 1.00, Volatility::Medium),
        dna("k league 2", 2.30, 0.41, 0.90, Volatility::Stable),
    ]
});

static ENTROPY_FALLBACK: Lazy<Vec<(&'static str, f64)>> = Lazy::new(|| {
    vec![
        ("eredivisie", 1.25),
        ("bundesliga", 1.15),
        ("premier league", 1.10),
        ("ligue 1", 1.00),
        ("la liga", 0.95),
        ("serie a", 0.85),
        ("serie b", 0.80),
        ("portugal", 1.05),
        ("championship", 1.10),
    ]
});

/// Lowercased league name without a leading "eu-xxx " region code or any
/// bracketed tags.
pub fn clean_league_key(raw: &str) -> String {
    let mut s = normalize_name(raw);
    if s.len() >= 6
        && s.starts_with("eu-")
        && s.as_bytes()[3..6].iter().all(|b| b.is_ascii_lowercase())
    {
        s = s[6..].trim_start().to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    normalize_name(&out)
}

pub fn find_dna(league: &str) -> Option<&'static LeagueDna> {
    let raw = normalize_name(league);
    let clean = clean_league_key(league);
    if clean.is_empty() {
        return None;
    }
    LEAGUE_DNA
        .iter()
        .find(|d| clean.contains(d.key) || raw.contains(d.key) || d.key.contains(clean.as_str()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicGoalFactors {
    pub factors: BTreeMap<String, f64>,
    pub sample_matches: usize,
}

impl DynamicGoalFactors {
    pub fn compute(history: &[HistoricalMatch], cfg: &LeagueConfig) -> Self {
        let mut per_league: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        let mut total_goals = 0u64;
        let mut total = 0usize;

        for m in history {
            let Some(score) = m.score else { continue };
            let key = clean_league_key(&m.league);
            if key.is_empty() {
                continue;
            }
            let goals = score.total() as u64;
            let e = per_league.entry(key).or_insert((0, 0));
            e.0 += goals;
            e.1 += 1;
            total_goals += goals;
            total += 1;
        }

        if total < cfg.dynamic_min_total_matches {
            warn!(
                total,
                required = cfg.dynamic_min_total_matches,
                "not enough history for dynamic goal factors"
            );
            return Self {
                factors: BTreeMap::new(),
                sample_matches: total,
            };
        }

        let global_avg = total_goals as f64 / total as f64;
        let mut factors = BTreeMap::new();
        if global_avg > 0.0 {
            for (league, (goals, n)) in per_league {
                if n < cfg.dynamic_min_league_matches {
                    continue;
                }
                let avg = goals as f64 / n as f64;
                factors.insert(league, ((avg / global_avg) * 100.0).round() / 100.0);
            }
        }
        debug!(leagues = factors.len(), total, "dynamic goal factors computed");
        Self {
            factors,
            sample_matches: total,
        }
    }

    pub fn lookup(&self, league: &str) -> Option<f64> {
        let clean = clean_league_key(league);
        if clean.is_empty() {
            return None;
        }
        self.factors
            .iter()
            .find(|(k, _)| clean.contains(k.as_str()) || k.contains(clean.as_str()))
            .map(|(_, f)| *f)
    }
}

pub fn goal_factor(league: &str, dynamic: &DynamicGoalFactors, cfg: &LeagueConfig) -> f64 {
    if let Some(dna) = find_dna(league) {
        return dna.avg_goals / cfg.global_goal_baseline;
    }
    dynamic.lookup(league).unwrap_or(1.0)
}

pub fn entropy_factor(league: &str) -> (f64, Volatility) {
    if let Some(dna) = find_dna(league) {
        return (dna.entropy, dna.volatility);
    }
    let raw = normalize_name(league);
    let clean = clean_league_key(league);
    let entropy = ENTROPY_FALLBACK
        .iter()
        .find(|(k, _)| !clean.is_empty() && (raw.contains(k) || clean.contains(k)))
        .map(|(_, e)| *e)
        .unwrap_or(1.0);
    (entropy, Volatility::Stable)
}

pub fn volatility_index(entropy: f64) -> u8 {
    (((entropy.max(1.0) - 0.8) * 20.0).round()).clamp(0.0, 10.0) as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalSplit {
    pub played: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl GoalSplit {
    fn scored_rate(&self) -> Option<f64> {
        (self.played > 0).then(|| self.goals_for as f64 / self.played as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    #[serde(default)]
    pub team_id: Option<u64>,
    pub team_name: String,
    pub rank: u32,
    pub points: i32,
    #[serde(default)]
    pub all: GoalSplit,
    #[serde(default)]
    pub home: GoalSplit,
    #[serde(default)]
    pub away: GoalSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadgeKind {
    TitleRace,
    RelegationFight,
    DirectClash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadgeSide {
    Home,
    Away,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotivationBadge {
    pub side: BadgeSide,
    pub kind: BadgeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeagueProfile {
    pub goal_factor: f64,
    pub entropy: f64,
    pub volatility: Volatility,
    pub volatility_index: u8,
    pub motivation_home: f64,
    pub motivation_away: f64,
    pub rank_home: Option<u32>,
    pub rank_away: Option<u32>,
    pub badges: Vec<MotivationBadge>,
}

impl LeagueProfile {
    pub fn has_motivation(&self) -> bool {
        !self.badges.is_empty()
    }

    pub fn has_badge(&self, kind: BadgeKind) -> bool {
        self.badges.iter().any(|b| b.kind == kind)
    }
}

pub fn fold_team_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in normalize_name(raw).chars() {
        match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ą' => out.push('a'),
            'ç' | 'ć' | 'č' => out.push('c'),
            'è' | 'é' | 'ê' | 'ë' | 'ę' | 'ě' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' | 'ı' => out.push('i'),
            'ł' => out.push('l'),
            'ñ' | 'ń' => out.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => out.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'ś' | 'ş' | 'š' => out.push('s'),
            'ź' | 'ż' | 'ž' => out.push('z'),
            'ğ' => out.push('g'),
            'ð' => out.push('d'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            'þ' => out.push_str("th"),
            c => out.push(c),
        }
    }
    out
}

/// Standings row for `team`: by id, then exact folded name, then containment.
pub fn find_standing<'a>(table: &'a [StandingsRow], team: &TeamRef) -> Option<&'a StandingsRow> {
    if let Some(id) = team.id {
        if let Some(row) = table.iter().find(|r| r.team_id == Some(id)) {
            return Some(row);
        }
    }
    let wanted = fold_team_name(&team.name);
    if wanted.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|r| fold_team_name(&r.team_name) == wanted)
        .or_else(|| {
            table.iter().find(|r| {
                let name = fold_team_name(&r.team_name);
                !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
            })
        })
}

fn zone_boost(
    row: &StandingsRow,
    total: u32,
    side: BadgeSide,
    cfg: &LeagueConfig,
    badges: &mut Vec<MotivationBadge>,
) -> f64 {
    // Relegation takes precedence in short tables where the zones overlap.
    if row.rank + cfg.zone_size > total {
        badges.push(MotivationBadge {
            side,
            kind: BadgeKind::RelegationFight,
        });
        cfg.relegation_boost
    } else if row.rank <= cfg.zone_size {
        badges.push(MotivationBadge {
            side,
            kind: BadgeKind::TitleRace,
        });
        cfg.title_race_boost
    } else {
        0.0
    }
}

fn split_correction(split: &GoalSplit, all: &GoalSplit, cfg: &LeagueConfig) -> f64 {
    if split.played < cfg.split_min_played {
        return 1.0;
    }
    let (Some(split_rate), Some(season_rate)) = (split.scored_rate(), all.scored_rate()) else {
        return 1.0;
    };
    if season_rate <= 0.0 {
        return 1.0;
    }
    let ratio = (split_rate / season_rate).clamp(1.0, cfg.split_ratio_max);
    (1.0 - cfg.split_weight) + ratio * cfg.split_weight
}

pub fn resolve_profile(
    league: &str,
    home: &TeamRef,
    away: &TeamRef,
    standings: Option<&[StandingsRow]>,
    dynamic: &DynamicGoalFactors,
    cfg: &LeagueConfig,
) -> LeagueProfile {
    let goal_factor = goal_factor(league, dynamic, cfg);
    let (entropy, volatility) = entropy_factor(league);

    let mut profile = LeagueProfile {
        goal_factor,
        entropy,
        volatility,
        volatility_index: volatility_index(entropy),
        motivation_home: 1.0,
        motivation_away: 1.0,
        rank_home: None,
        rank_away: None,
        badges: Vec::new(),
    };

    let Some(table) = standings.filter(|t| !t.is_empty()) else {
        return profile;
    };
    let (Some(h), Some(a)) = (find_standing(table, home), find_standing(table, away)) else {
        debug!(league, home = %home, away = %away, "teams not found in standings");
        return profile;
    };

    let total = table.len() as u32;
    profile.rank_home = Some(h.rank);
    profile.rank_away = Some(a.rank);
    profile.motivation_home += zone_boost(h, total, BadgeSide::Home, cfg, &mut profile.badges);
    profile.motivation_away += zone_boost(a, total, BadgeSide::Away, cfg, &mut profile.badges);

    if (h.points - a.points).unsigned_abs() <= cfg.direct_clash_points {
        profile.motivation_home += cfg.direct_clash_boost;
        profile.motivation_away += cfg.direct_clash_boost;
        profile.badges.push(MotivationBadge {
            side: BadgeSide::Both,
            kind: BadgeKind::DirectClash,
        });
    }

    profile.motivation_home *= split_correction(&h.home, &h.all, cfg);
    profile.motivation_away *= split_correction(&a.away, &a.all, cfg);
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u64, name: &str, rank: u32, points: i32) -> StandingsRow {
        StandingsRow {
            team_id: Some(id),
            team_name: name.to_string(),
            rank,
            points,
            all: GoalSplit {
                played: 10,
                goals_for: 10,
                goals_against: 10,
            },
            home: GoalSplit::default(),
            away: GoalSplit::default(),
        }
    }

    fn table() -> Vec<StandingsRow> {
        (1..=20)
            .map(|r| row(r as u64, &format!("Team {r}"), r, 60 - 2 * r as i32))
            .collect()
    }

    #[test]
    fn league_keys_drop_region_and_tags() {
        assert_eq!(clean_league_key("EU-ITA  Serie A [R12]"), "serie a");
        assert_eq!(clean_league_key("Premier League"), "premier league");
        assert_eq!(clean_league_key(""), "");
    }

    #[test]
    fn static_profile_wins_over_dynamic() {
        let cfg = LeagueConfig::default();
        let mut dynamic = DynamicGoalFactors::default();
        dynamic.factors.insert("serie a".to_string(), 1.5);
        dynamic.factors.insert("allsvenskan".to_string(), 1.12);

        let f = goal_factor("EU-ITA Serie A", &dynamic, &cfg);
        assert!((f - 2.39 / 2.72).abs() < 1e-12);
        assert_eq!(goal_factor("Allsvenskan", &dynamic, &cfg), 1.12);
        assert_eq!(goal_factor("Unknown League", &dynamic, &cfg), 1.0);
        assert_eq!(goal_factor("", &dynamic, &cfg), 1.0);
    }

    #[test]
    fn dynamic_factors_need_enough_data() {
        use crate::match_data::{MarketOdds, Score};
        use chrono::NaiveDate;

        let cfg = LeagueConfig::default();
        let mk = |league: &str, h, a| HistoricalMatch {
            fixture_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            league: league.to_string(),
            league_id: None,
            home: TeamRef::named("H"),
            away: TeamRef::named("A"),
            score: Some(Score::new(h, a)),
            odds: MarketOdds::default(),
            tip: None,
        };
        let small: Vec<_> = (0..50).map(|_| mk("X", 1, 1)).collect();
        assert!(DynamicGoalFactors::compute(&small, &cfg).factors.is_empty());

        let mut big: Vec<_> = (0..90).map(|_| mk("Low League", 1, 0)).collect();
        big.extend((0..30).map(|_| mk("High League", 3, 2)));
        big.extend((0..10).map(|_| mk("Tiny League", 4, 4)));
        let f = DynamicGoalFactors::compute(&big, &cfg);
        assert!(f.lookup("High League").unwrap() > 1.0);
        assert!(f.lookup("Low League").unwrap() < 1.0);
        assert_eq!(f.lookup("Tiny League"), None);
    }

    #[test]
    fn entropy_uses_profile_then_fallback() {
        assert_eq!(entropy_factor("EU-NED Eredivisie").0, 1.25);
        assert_eq!(entropy_factor("Ligue 1").0, 1.00);
        assert_eq!(entropy_factor("Somewhere Else").0, 1.0);
        assert_eq!(volatility_index(1.25), 9);
        assert_eq!(volatility_index(0.85), 4);
    }

    #[test]
    fn relegation_and_direct_clash_badges() {
        let cfg = LeagueConfig::default();
        let t = table();
        // Rank 18 and 19: both in the bottom four, two points apart.
        let p = resolve_profile(
            "Serie A",
            &TeamRef::with_id("Team 18", 18),
            &TeamRef::with_id("Team 19", 19),
            Some(&t),
            &DynamicGoalFactors::default(),
            &cfg,
        );
        assert!((p.motivation_home - 1.20).abs() < 1e-12);
        assert!((p.motivation_away - 1.20).abs() < 1e-12);
        assert!(p.has_badge(BadgeKind::RelegationFight));
        assert!(p.has_badge(BadgeKind::DirectClash));
        assert_eq!(p.rank_home, Some(18));
    }

    #[test]
    fn title_race_only_for_top_four() {
        let cfg = LeagueConfig::default();
        let t = table();
        let p = resolve_profile(
            "Serie A",
            &TeamRef::named("team 2"),
            &TeamRef::named("Team 10"),
            Some(&t),
            &DynamicGoalFactors::default(),
            &cfg,
        );
        assert!((p.motivation_home - 1.10).abs() < 1e-12);
        assert_eq!(p.motivation_away, 1.0);
        assert_eq!(p.badges.len(), 1);
        // Rank 16 is not in the bottom four of twenty.
        let p = resolve_profile(
            "Serie A",
            &TeamRef::named("Team 16"),
            &TeamRef::named("Team 8"),
            Some(&t),
            &DynamicGoalFactors::default(),
            &cfg,
        );
        assert!(p.badges.is_empty());
    }

    #[test]
    fn home_split_scales_motivation() {
        let cfg = LeagueConfig::default();
        let mut t = table();
        t[9].home = GoalSplit {
            played: 5,
            goals_for: 10,
            goals_against: 3,
        };
        let p = resolve_profile(
            "Serie A",
            &TeamRef::with_id("Team 10", 10),
            &TeamRef::with_id("Team 12", 12),
            Some(&t),
            &DynamicGoalFactors::default(),
            &cfg,
        );
        // Home rate 2.0 vs season 1.0 clamps to 1.2 -> 0.95 + 0.06.
        assert!((p.motivation_home - 1.01).abs() < 1e-12);
        assert_eq!(p.motivation_away, 1.0);
    }

    #[test]
    fn missing_standings_are_neutral() {
        let p = resolve_profile(
            "Serie A",
            &TeamRef::named("A"),
            &TeamRef::named("B"),
            None,
            &DynamicGoalFactors::default(),
            &LeagueConfig::default(),
        );
        assert_eq!((p.motivation_home, p.motivation_away), (1.0, 1.0));
        assert!(!p.has_motivation());
        assert_eq!(fold_team_name("Łódź"), "lodz");
    }
}
