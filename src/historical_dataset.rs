use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::RowRejection;
use crate::league_params::StandingsRow;
use crate::match_data::{
    ExternalTip, HistoricalMatch, MarketOdds, Score, TeamKey, TeamRef, parse_date, parse_odds, parse_teams,
};
use crate::profile::LeagueEntry;

/// A history or fixture row as it arrives from upstream feeds. Everything is
/// optional and loosely typed; `normalize_rows` turns it into `HistoricalMatch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMatchRow {
    #[serde(alias = "fixtureId", alias = "id")]
    pub fixture_id: Option<Value>,
    #[serde(alias = "data")]
    pub date: Option<String>,
    #[serde(alias = "lega")]
    pub league: Option<String>,
    #[serde(alias = "leagueId")]
    pub league_id: Option<Value>,
    /// "Home - Away" when the teams are not given separately.
    #[serde(alias = "partita", alias = "match")]
    pub fixture: Option<String>,
    #[serde(alias = "homeTeam")]
    pub home: Option<String>,
    #[serde(alias = "awayTeam")]
    pub away: Option<String>,
    #[serde(alias = "teamIdHome", alias = "homeTeamId")]
    pub home_id: Option<Value>,
    #[serde(alias = "teamIdAway", alias = "awayTeamId")]
    pub away_id: Option<Value>,
    #[serde(alias = "risultato", alias = "result")]
    pub score: Option<String>,

    #[serde(alias = "quota1", alias = "odds_1")]
    pub odds_home: Option<Value>,
    #[serde(alias = "quotaX", alias = "odds_x")]
    pub odds_draw: Option<Value>,
    #[serde(alias = "quota2", alias = "odds_2")]
    pub odds_away: Option<Value>,
    #[serde(alias = "quota1X", alias = "odds_1x")]
    pub odds_home_or_draw: Option<Value>,
    #[serde(alias = "quotaX2", alias = "odds_x2")]
    pub odds_draw_or_away: Option<Value>,
    #[serde(alias = "quota12", alias = "odds_12")]
    pub odds_home_or_away: Option<Value>,
    #[serde(alias = "quotaOver05HT")]
    pub odds_over_05_ht: Option<Value>,
    #[serde(alias = "quotaOver15", alias = "odds_over15")]
    pub odds_over_15: Option<Value>,
    #[serde(alias = "quotaOver25", alias = "odds_over25")]
    pub odds_over_25: Option<Value>,
    #[serde(alias = "quotaUnder35", alias = "odds_under35")]
    pub odds_under_35: Option<Value>,
    #[serde(alias = "quotaGG", alias = "odds_btts")]
    pub odds_btts_yes: Option<Value>,
    #[serde(alias = "quotaNG", alias = "odds_no_btts")]
    pub odds_btts_no: Option<Value>,

    pub tip: Option<String>,
    #[serde(alias = "quota")]
    pub tip_odds: Option<Value>,
    #[serde(alias = "probabilita")]
    pub tip_probability: Option<Value>,
    #[serde(alias = "htProb", alias = "ht_prob")]
    pub ht_goal_probability: Option<Value>,
}

fn value_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_f64(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').replace(',', ".").parse().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn odds_of(v: &Option<Value>) -> Option<f64> {
    match v.as_ref()? {
        Value::String(s) => parse_odds(s),
        other => value_f64(other).filter(|o| *o > 1.0),
    }
}

impl RawMatchRow {
    fn odds(&self) -> MarketOdds {
        MarketOdds {
            home: odds_of(&self.odds_home),
            draw: odds_of(&self.odds_draw),
            away: odds_of(&self.odds_away),
            home_or_draw: odds_of(&self.odds_home_or_draw),
            draw_or_away: odds_of(&self.odds_draw_or_away),
            home_or_away: odds_of(&self.odds_home_or_away),
            over_05_first_half: odds_of(&self.odds_over_05_ht),
            over_15: odds_of(&self.odds_over_15),
            over_25: odds_of(&self.odds_over_25),
            under_35: odds_of(&self.odds_under_35),
            btts_yes: odds_of(&self.odds_btts_yes),
            btts_no: odds_of(&self.odds_btts_no),
        }
    }

    fn external_tip(&self) -> Option<ExternalTip> {
        let label = self.tip.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(ExternalTip {
            label: label.to_string(),
            odds: odds_of(&self.tip_odds),
            probability: self.tip_probability.as_ref().and_then(value_f64),
            ht_goal_probability: self.ht_goal_probability.as_ref().and_then(value_f64),
        })
    }

    fn teams(&self) -> Option<(String, String)> {
        let home = self.home.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let away = self.away.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (home, away) {
            (Some(h), Some(a)) => Some((h.to_string(), a.to_string())),
            _ => self.fixture.as_deref().and_then(parse_teams),
        }
    }

    pub fn normalize(&self) -> Result<HistoricalMatch, RowRejection> {
        let (home, away) = self.teams().ok_or(RowRejection::MissingTeams)?;
        let home = TeamRef {
            name: home,
            id: self.home_id.as_ref().and_then(value_u64),
        };
        let away = TeamRef {
            name: away,
            id: self.away_id.as_ref().and_then(value_u64),
        };
        if home.key() == away.key() {
            return Err(RowRejection::SameTeam(home.name));
        }

        let raw_date = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RowRejection::MissingDate)?;
        let date = parse_date(raw_date).ok_or_else(|| RowRejection::BadDate(raw_date.to_string()))?;

        Ok(HistoricalMatch {
            fixture_id: self.fixture_id.as_ref().and_then(value_str),
            date,
            league: self.league.as_deref().unwrap_or("").trim().to_string(),
            league_id: self
                .league_id
                .as_ref()
                .and_then(value_u64)
                .and_then(|id| u32::try_from(id).ok()),
            home,
            away,
            // Unparseable scores leave the match unplayed.
            score: self.score.as_deref().and_then(Score::parse),
            odds: self.odds(),
            tip: self.external_tip(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub unscored: usize,
    pub rejected: Vec<(usize, RowRejection)>,
}

pub fn normalize_rows(rows: &[RawMatchRow]) -> (Vec<HistoricalMatch>, IngestReport) {
    let mut out = Vec::with_capacity(rows.len());
    let mut report = IngestReport::default();
    for (idx, row) in rows.iter().enumerate() {
        match row.normalize() {
            Ok(m) => {
                if m.score.is_none() {
                    report.unscored += 1;
                }
                out.push(m);
            }
            Err(reason) => {
                debug!(row = idx, %reason, "row rejected");
                report.rejected.push((idx, reason));
            }
        }
    }
    report.accepted = out.len();
    (out, report)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    history: Vec<RawMatchRow>,
    fixtures: Vec<RawMatchRow>,
    standings: HashMap<u32, Vec<StandingsRow>>,
    leagues: Vec<LeagueEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub history: Vec<HistoricalMatch>,
    pub fixtures: Vec<HistoricalMatch>,
    pub standings: HashMap<u32, Vec<StandingsRow>>,
    pub leagues: Vec<LeagueEntry>,
    pub history_report: IngestReport,
    pub fixtures_report: IngestReport,
}

pub fn parse_snapshot(raw: &str) -> Result<Snapshot> {
    let snap: RawSnapshot = serde_json::from_str(raw).context("parse snapshot json")?;
    let (history, history_report) = normalize_rows(&snap.history);
    let (fixtures, fixtures_report) = normalize_rows(&snap.fixtures);
    Ok(Snapshot {
        history,
        fixtures,
        standings: snap.standings,
        leagues: snap.leagues,
        history_report,
        fixtures_report,
    })
}

pub fn load_snapshot_json(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    let snap = parse_snapshot(&raw).with_context(|| format!("load snapshot {}", path.display()))?;
    info!(
        path = %path.display(),
        history = snap.history.len(),
        history_rejected = snap.history_report.rejected.len(),
        fixtures = snap.fixtures.len(),
        leagues = snap.leagues.len(),
        "snapshot loaded"
    );
    Ok(snap)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_key TEXT PRIMARY KEY,
            fixture_id TEXT NULL,
            match_date TEXT NOT NULL,
            league TEXT NOT NULL,
            league_id INTEGER NULL,
            home_team TEXT NOT NULL,
            home_team_id INTEGER NULL,
            away_team TEXT NOT NULL,
            away_team_id INTEGER NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            odds_json TEXT NOT NULL,
            tip_json TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn team_key(team: &TeamRef) -> String {
    match team.key() {
        TeamKey::Id(id) => format!("#{id}"),
        TeamKey::Name(name) => name,
    }
}

/// Primary key: the fixture id when there is one, else date and team names.
fn match_key(m: &HistoricalMatch) -> String {
    match m.stable_id() {
        Some(id) => format!("id:{id}"),
        None => format!("{}|{}|{}", m.date, team_key(&m.home), team_key(&m.away)),
    }
}

pub fn store_matches(conn: &mut Connection, matches: &[HistoricalMatch]) -> Result<usize> {
    let tx = conn.transaction().context("begin sqlite transaction")?;
    for m in matches {
        upsert_match(&tx, m)?;
    }
    tx.commit().context("commit matches")?;
    Ok(matches.len())
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &HistoricalMatch) -> Result<()> {
    let odds_json = serde_json::to_string(&m.odds).context("encode odds")?;
    let tip_json = m
        .tip
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("encode tip")?;
    tx.execute(
        r#"
        INSERT INTO matches (
            match_key, fixture_id, match_date, league, league_id,
            home_team, home_team_id, away_team, away_team_id,
            home_goals, away_goals, odds_json, tip_json, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14
        )
        ON CONFLICT(match_key) DO UPDATE SET
            fixture_id = excluded.fixture_id,
            match_date = excluded.match_date,
            league = excluded.league,
            league_id = excluded.league_id,
            home_team = excluded.home_team,
            home_team_id = excluded.home_team_id,
            away_team = excluded.away_team,
            away_team_id = excluded.away_team_id,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            odds_json = excluded.odds_json,
            tip_json = excluded.tip_json,
            updated_at = excluded.updated_at
        "#,
        params![
            match_key(m),
            m.fixture_id,
            m.date.to_string(),
            m.league,
            m.league_id.map(i64::from),
            m.home.name,
            m.home.id.map(|id| id as i64),
            m.away.name,
            m.away.id.map(|id| id as i64),
            m.score.map(|s| s.home as i64),
            m.score.map(|s| s.away as i64),
            odds_json,
            tip_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

pub fn load_matches(conn: &Connection) -> Result<Vec<HistoricalMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                fixture_id, match_date, league, league_id,
                home_team, home_team_id, away_team, away_team_id,
                home_goals, away_goals, odds_json, tip_json
            FROM matches
            ORDER BY match_date ASC, match_key ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<i64>>(7)?,
                row.get::<_, Option<i64>>(8)?,
                row.get::<_, Option<i64>>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, Option<String>>(11)?,
            ))
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        let (fixture_id, date, league, league_id, home, home_id, away, away_id, hg, ag, odds, tip) =
            row.context("decode match row")?;
        let date = parse_date(&date).with_context(|| format!("stored date {date}"))?;
        let score = match (hg, ag) {
            (Some(h), Some(a)) => Some(Score::new(
                u8::try_from(h).context("home goals out of range")?,
                u8::try_from(a).context("away goals out of range")?,
            )),
            _ => None,
        };
        out.push(HistoricalMatch {
            fixture_id,
            date,
            league,
            league_id: league_id.and_then(|id| u32::try_from(id).ok()),
            home: TeamRef {
                name: home,
                id: home_id.and_then(|id| u64::try_from(id).ok()),
            },
            away: TeamRef {
                name: away,
                id: away_id.and_then(|id| u64::try_from(id).ok()),
            },
            score,
            odds: serde_json::from_str::<MarketOdds>(&odds).context("decode stored odds")?,
            tip: tip
                .as_deref()
                .map(serde_json::from_str::<ExternalTip>)
                .transpose()
                .context("decode stored tip")?,
        });
    }
    Ok(out)
}

/// Folds `extra` into `base` keyed like the sqlite table, so a match known to
/// both sources is counted once. A scored row replaces an unscored one; ties
/// keep `base`. Returns how many rows were new.
pub fn merge_history(base: &mut Vec<HistoricalMatch>, extra: Vec<HistoricalMatch>) -> usize {
    let mut index: HashMap<String, usize> = base
        .iter()
        .enumerate()
        .map(|(idx, m)| (match_key(m), idx))
        .collect();
    let mut added = 0usize;
    for m in extra {
        let key = match_key(&m);
        match index.get(&key) {
            Some(&idx) => {
                if m.is_played() && !base[idx].is_played() {
                    base[idx] = m;
                }
            }
            None => {
                index.insert(key, base.len());
                base.push(m);
                added += 1;
            }
        }
    }
    debug!(added, total = base.len(), "history merged");
    added
}
