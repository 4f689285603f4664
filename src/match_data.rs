use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calibration::{Outcome, classify_outcome};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamRef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TeamKey {
    Id(u64),
    Name(String),
}

impl TeamRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn with_id(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id: Some(id),
        }
    }

    pub fn key(&self) -> TeamKey {
        match self.id {
            Some(id) => TeamKey::Id(id),
            None => TeamKey::Name(normalize_name(&self.name)),
        }
    }
}

impl fmt::Display for TeamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}

impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn total(&self) -> u32 {
        self.home as u32 + self.away as u32
    }

    pub fn outcome(&self) -> Outcome {
        classify_outcome(self.home as i32, self.away as i32)
    }

    pub fn for_side(&self, side: Side) -> (u8, u8) {
        match side {
            Side::Home => (self.home, self.away),
            Side::Away => (self.away, self.home),
        }
    }

    /// Parses the first `"<home>-<away>"` pair in the string, tolerating
    /// spaces and en dashes ("2 - 1", "2–1", "FT 2-1").
    pub fn parse(raw: &str) -> Option<Score> {
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if !chars[i].is_ascii_digit() {
                i += 1;
                continue;
            }
            let (home, after_home) = take_digits(&chars, i);
            let mut j = skip_spaces(&chars, after_home);
            if j < chars.len() && (chars[j] == '-' || chars[j] == '–') {
                j = skip_spaces(&chars, j + 1);
                if j < chars.len() && chars[j].is_ascii_digit() {
                    let (away, _) = take_digits(&chars, j);
                    return Some(Score {
                        home: home.parse().ok()?,
                        away: away.parse().ok()?,
                    });
                }
            }
            i = after_home;
        }
        None
    }
}

fn take_digits(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn skip_spaces(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketType {
    DoubleChance,
    Straight,
    Goals,
}

impl MarketType {
    pub fn priority(self) -> u8 {
        match self {
            MarketType::DoubleChance => 3,
            MarketType::Straight => 2,
            MarketType::Goals => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    Home,
    Draw,
    Away,
    HomeOrDraw,
    DrawOrAway,
    HomeOrAway,
    Over05FirstHalf,
    Over15,
    Over25,
    Under35,
    BttsYes,
    BttsNo,
}

impl Market {
    pub const ALL: [Market; 12] = [
        Market::Home,
        Market::Draw,
        Market::Away,
        Market::HomeOrDraw,
        Market::DrawOrAway,
        Market::HomeOrAway,
        Market::Over05FirstHalf,
        Market::Over15,
        Market::Over25,
        Market::Under35,
        Market::BttsYes,
        Market::BttsNo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Market::Home => "1",
            Market::Draw => "X",
            Market::Away => "2",
            Market::HomeOrDraw => "1X",
            Market::DrawOrAway => "X2",
            Market::HomeOrAway => "12",
            Market::Over05FirstHalf => "+0.5 HT",
            Market::Over15 => "+1.5",
            Market::Over25 => "+2.5",
            Market::Under35 => "-3.5",
            Market::BttsYes => "Gol",
            Market::BttsNo => "No Gol",
        }
    }

    pub fn market_type(self) -> MarketType {
        match self {
            Market::Home | Market::Draw | Market::Away => MarketType::Straight,
            Market::HomeOrDraw | Market::DrawOrAway | Market::HomeOrAway => {
                MarketType::DoubleChance
            }
            _ => MarketType::Goals,
        }
    }

    pub fn from_label(raw: &str) -> Option<Market> {
        let s = raw.trim().to_ascii_lowercase();
        Market::ALL
            .into_iter()
            .find(|m| m.label().to_ascii_lowercase() == s)
            .or(match s.as_str() {
                "gg" | "btts" => Some(Market::BttsYes),
                "ng" | "nogol" | "no goal" => Some(Market::BttsNo),
                "x1" => Some(Market::HomeOrDraw),
                "2x" => Some(Market::DrawOrAway),
                "21" => Some(Market::HomeOrAway),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
    pub home_or_draw: Option<f64>,
    pub draw_or_away: Option<f64>,
    pub home_or_away: Option<f64>,
    pub over_05_first_half: Option<f64>,
    pub over_15: Option<f64>,
    pub over_25: Option<f64>,
    pub under_35: Option<f64>,
    pub btts_yes: Option<f64>,
    pub btts_no: Option<f64>,
}

impl MarketOdds {
    pub fn get(&self, market: Market) -> Option<f64> {
        let raw = match market {
            Market::Home => self.home,
            Market::Draw => self.draw,
            Market::Away => self.away,
            Market::HomeOrDraw => self.home_or_draw,
            Market::DrawOrAway => self.draw_or_away,
            Market::HomeOrAway => self.home_or_away,
            Market::Over05FirstHalf => self.over_05_first_half,
            Market::Over15 => self.over_15,
            Market::Over25 => self.over_25,
            Market::Under35 => self.under_35,
            Market::BttsYes => self.btts_yes,
            Market::BttsNo => self.btts_no,
        };
        raw.filter(|o| o.is_finite() && *o > 1.0)
    }

    pub fn has_full_1x2(&self) -> bool {
        self.get(Market::Home).is_some()
            && self.get(Market::Draw).is_some()
            && self.get(Market::Away).is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalTip {
    pub label: String,
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub ht_goal_probability: Option<f64>,
}

impl ExternalTip {
    pub fn is_decisive(&self) -> bool {
        matches!(self.label.trim(), "1" | "2")
    }

    pub fn has_label(&self) -> bool {
        !self.label.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub fixture_id: Option<String>,
    pub date: NaiveDate,
    pub league: String,
    pub league_id: Option<u32>,
    pub home: TeamRef,
    pub away: TeamRef,
    pub score: Option<Score>,
    #[serde(default)]
    pub odds: MarketOdds,
    #[serde(default)]
    pub tip: Option<ExternalTip>,
}

impl HistoricalMatch {
    pub fn is_played(&self) -> bool {
        self.score.is_some()
    }

    pub fn has_team_ids(&self) -> bool {
        self.home.id.is_some() || self.away.id.is_some()
    }

    /// Which side `team` played in this match. Rows carrying ids are matched on
    /// ids only; rows without ids fall back to exact normalized-name equality.
    pub fn side_of(&self, team: &TeamRef) -> Option<Side> {
        if self.has_team_ids() {
            let id = team.id?;
            if self.home.id == Some(id) {
                return Some(Side::Home);
            }
            if self.away.id == Some(id) {
                return Some(Side::Away);
            }
            return None;
        }
        let wanted = normalize_name(&team.name);
        if wanted.is_empty() {
            return None;
        }
        if normalize_name(&self.home.name) == wanted {
            Some(Side::Home)
        } else if normalize_name(&self.away.name) == wanted {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn fixture_label(&self) -> String {
        format!("{} - {}", self.home, self.away)
    }

    pub fn seed(&self) -> String {
        format!("{}-{}-{}", self.home, self.away, self.date)
    }

    pub fn stable_id(&self) -> Option<&str> {
        self.fixture_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn normalize_league(raw: &str) -> String {
    normalize_name(raw)
}

/// Splits `"Home - Away"`. Team names containing hyphens survive as long as
/// the separator itself is spaced.
pub fn parse_teams(raw: &str) -> Option<(String, String)> {
    for sep in [" - ", " – "] {
        if let Some((h, a)) = raw.split_once(sep) {
            let (h, a) = (h.trim(), a.trim());
            if !h.is_empty() && !a.is_empty() {
                return Some((h.to_string(), a.to_string()));
            }
        }
    }
    let (h, a) = raw.split_once(['-', '–'])?;
    let (h, a) = (h.trim(), a.trim());
    if h.is_empty() || a.is_empty() {
        return None;
    }
    Some((h.to_string(), a.to_string()))
}

pub fn parse_odds(raw: &str) -> Option<f64> {
    let v = raw.trim().replace(',', ".").parse::<f64>().ok()?;
    (v.is_finite() && v > 1.0).then_some(v)
}

/// `YYYY-MM-DD`, an ISO timestamp starting with one, or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}
