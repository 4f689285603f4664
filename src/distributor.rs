use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{BucketPreset, DistributionConfig};
use crate::match_data::normalize_league;
use crate::win_prob::MatchPrediction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickSummary {
    pub label: String,
    pub odds: Option<f64>,
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub fixture_id: Option<String>,
    pub fixture: String,
    pub league: String,
    pub league_id: Option<u32>,
    pub external_tip: Option<PickSummary>,
    pub engine_pick: Option<PickSummary>,
}

impl From<&MatchPrediction> for DistributionEntry {
    fn from(p: &MatchPrediction) -> Self {
        let external_tip = p
            .fixture
            .tip
            .as_ref()
            .filter(|t| t.has_label())
            .map(|t| PickSummary {
                label: t.label.trim().to_string(),
                odds: t.odds,
                probability: t.probability,
            });
        let engine_pick = p.best_pick.as_ref().filter(|b| !b.fallback).map(|b| PickSummary {
            label: b.candidate.label.to_string(),
            odds: Some(b.candidate.odds),
            probability: Some(b.candidate.probability),
        });
        Self {
            fixture_id: p.fixture.stable_id().map(str::to_string),
            fixture: p.fixture.fixture_label(),
            league: p.fixture.league.clone(),
            league_id: p.league_id,
            external_tip,
            engine_pick,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyBucket {
    pub id: &'static str,
    pub name: &'static str,
    pub fixture_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyDistribution {
    /// Deduplicated, non-blacklisted entries in first-seen order.
    pub pool: Vec<DistributionEntry>,
    pub buckets: Vec<StrategyBucket>,
}

impl DailyDistribution {
    pub fn bucket(&self, id: &str) -> Option<&StrategyBucket> {
        self.buckets.iter().find(|b| b.id == id)
    }
}

fn in_band(value: Option<f64>, band: Option<(f64, f64)>) -> bool {
    match band {
        None => true,
        Some((lo, hi)) => value.is_some_and(|v| v >= lo && v <= hi),
    }
}

fn preset_accepts(preset: &BucketPreset, league_id: Option<u32>, pick: Option<&PickSummary>) -> bool {
    if !preset.league_ids.is_empty() && !league_id.is_some_and(|id| preset.league_ids.contains(&id)) {
        return false;
    }
    let Some(pick) = pick else {
        return false;
    };
    if !preset.tips.is_empty() && !preset.tips.iter().any(|t| t == &pick.label) {
        return false;
    }
    in_band(pick.odds, preset.odds) && in_band(pick.probability, preset.probability)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketKind {
    All,
    Domestic,
    ContinentalTop,
    Cup,
    HighWinrate,
    AiSpecial,
}

impl BucketKind {
    const ALL: [BucketKind; 6] = [
        BucketKind::All,
        BucketKind::Domestic,
        BucketKind::ContinentalTop,
        BucketKind::Cup,
        BucketKind::HighWinrate,
        BucketKind::AiSpecial,
    ];

    fn id(self) -> &'static str {
        match self {
            BucketKind::All => "all",
            BucketKind::Domestic => "domestic",
            BucketKind::ContinentalTop => "continental-top",
            BucketKind::Cup => "cup",
            BucketKind::HighWinrate => "high-winrate",
            BucketKind::AiSpecial => "ai-special",
        }
    }

    fn name(self) -> &'static str {
        match self {
            BucketKind::All => "All",
            BucketKind::Domestic => "Domestic",
            BucketKind::ContinentalTop => "Continental top",
            BucketKind::Cup => "Cups",
            BucketKind::HighWinrate => "High win rate",
            BucketKind::AiSpecial => "AI special",
        }
    }
}

struct BucketFilters<'a> {
    cfg: &'a DistributionConfig,
    domestic: String,
    continental: Vec<String>,
    cups: Vec<String>,
}

impl<'a> BucketFilters<'a> {
    fn new(cfg: &'a DistributionConfig) -> Self {
        Self {
            cfg,
            domestic: cfg.domestic_prefix.to_lowercase(),
            continental: cfg.continental_top.iter().map(|l| normalize_league(l)).collect(),
            cups: cfg.cup_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn accepts(&self, kind: BucketKind, e: &DistributionEntry) -> bool {
        let league = normalize_league(&e.league);
        match kind {
            BucketKind::All => e.external_tip.is_some() || e.engine_pick.is_some(),
            BucketKind::Domestic => league.starts_with(&self.domestic),
            BucketKind::ContinentalTop => self.continental.contains(&league),
            BucketKind::Cup => self.cups.iter().any(|k| league.contains(k.as_str())),
            BucketKind::HighWinrate => {
                preset_accepts(&self.cfg.high_winrate, e.league_id, e.external_tip.as_ref())
            }
            BucketKind::AiSpecial => {
                preset_accepts(&self.cfg.ai_special, e.league_id, e.engine_pick.as_ref())
            }
        }
    }
}

/// Dedupes by fixture id, drops blacklisted leagues and sorts the rest into
/// overlapping buckets. Entries without a fixture id never make it into the
/// pool. A later duplicate replaces the earlier one in place.
pub fn distribute(
    entries: &[DistributionEntry],
    registry: &HashMap<String, u32>,
    cfg: &DistributionConfig,
) -> DailyDistribution {
    let mut pool: Vec<DistributionEntry> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut dropped_no_id = 0usize;

    for e in entries {
        let Some(id) = e.fixture_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            dropped_no_id += 1;
            continue;
        };
        let mut entry = e.clone();
        entry.fixture_id = Some(id.to_string());
        if entry.league_id.is_none() {
            entry.league_id = registry.get(&normalize_league(&entry.league)).copied();
        }
        match seen.get(id) {
            Some(&idx) => pool[idx] = entry,
            None => {
                seen.insert(id.to_string(), pool.len());
                pool.push(entry);
            }
        }
    }

    let blacklist: Vec<String> = cfg
        .blacklist
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    pool.retain(|e| {
        let raw = e.league.trim().to_lowercase();
        let norm = normalize_league(&e.league);
        let banned = blacklist.iter().any(|b| *b == raw || *b == norm);
        if banned {
            debug!(fixture = %e.fixture, league = %e.league, "blacklisted league");
        }
        !banned
    });

    let filters = BucketFilters::new(cfg);
    let buckets: Vec<StrategyBucket> = BucketKind::ALL
        .iter()
        .map(|&kind| StrategyBucket {
            id: kind.id(),
            name: kind.name(),
            fixture_ids: pool
                .iter()
                .filter(|e| filters.accepts(kind, e))
                .filter_map(|e| e.fixture_id.clone())
                .collect(),
        })
        .collect();

    info!(
        input = entries.len(),
        pool = pool.len(),
        dropped_no_id,
        all = buckets.first().map(|b| b.fixture_ids.len()).unwrap_or(0),
        "strategies distributed"
    );

    DailyDistribution { pool, buckets }
}
