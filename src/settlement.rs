use serde::Serialize;

use crate::match_data::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Settlement {
    Won,
    Lost,
    /// A trade that can be closed in profit without the full target.
    CashOut,
    /// Not lost yet and only needs the clock to run out.
    LiveGreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipRule {
    /// Back under / lay over: lost once `total >= goals`.
    Under { goals: u32 },
    /// Plain over: won once `total >= goals`.
    Over { goals: u32 },
    /// Back over / lay under as a trade: partial goals can be cashed out.
    TradeOver { goals: u32 },
    LayTheDraw,
    BttsYes,
    BttsNo,
    Home,
    Draw,
    Away,
    HomeOrDraw,
    DrawOrAway,
    HomeOrAway,
}

const LINES: [(&str, u32); 4] = [("0.5", 1), ("1.5", 2), ("2.5", 3), ("3.5", 4)];

fn mentions_line(t: &str, words: &[&str], sign: char, short: char, line: &str) -> bool {
    if t.contains(&format!("{sign}{line}")) {
        return true;
    }
    if words.iter().any(|w| t.contains(&format!("{w} {line}"))) {
        return true;
    }
    // "o2.5" / "u 3.5" shorthands, as whole tokens.
    let compact = format!("{short}{line}");
    let spaced = format!("{short} {line}");
    t.split_whitespace().any(|tok| tok == compact) || t.starts_with(&spaced) || t.contains(&format!(" {spaced}"))
}

/// First-half markets cannot be settled from a full-time score.
fn is_first_half(t: &str) -> bool {
    t.contains(" ht") || t.contains("1t") || t.contains("first half") || t.contains("1st half")
}

pub fn parse_tip(tip: &str) -> Option<TipRule> {
    let t = tip.trim().to_lowercase();
    if t.is_empty() || is_first_half(&t) {
        return None;
    }

    for (line, goals) in [("3.5", 4), ("2.5", 3), ("1.5", 2)] {
        if t.contains(&format!("back under {line}")) || t.contains(&format!("lay over {line}")) {
            return Some(TipRule::Under { goals });
        }
    }
    for (line, goals) in [("2.5", 3), ("3.5", 4)] {
        if t.contains(&format!("back over {line}")) || t.contains(&format!("lay under {line}")) {
            return Some(TipRule::TradeOver { goals });
        }
    }
    if t.contains("lay the draw") || t.contains("lay draw") || t.contains("laythedraw") {
        return Some(TipRule::LayTheDraw);
    }

    for (line, goals) in LINES {
        if mentions_line(&t, &["over"], '+', 'o', line) {
            return Some(TipRule::Over { goals });
        }
    }
    for (line, goals) in LINES {
        if mentions_line(&t, &["under"], '-', 'u', line) {
            return Some(TipRule::Under { goals });
        }
    }

    if matches!(t.as_str(), "gg" | "gol" | "goal") || t.contains("btts") {
        return Some(TipRule::BttsYes);
    }
    if matches!(t.as_str(), "ng" | "no gol" | "no goal") || t.contains("no goal") {
        return Some(TipRule::BttsNo);
    }

    let clean: String = t.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    match clean.as_str() {
        "1" => Some(TipRule::Home),
        "2" => Some(TipRule::Away),
        "x" => Some(TipRule::Draw),
        "1x" | "x1" => Some(TipRule::HomeOrDraw),
        "x2" | "2x" => Some(TipRule::DrawOrAway),
        "12" | "21" => Some(TipRule::HomeOrAway),
        _ => None,
    }
}

fn won_if(cond: bool) -> Settlement {
    if cond { Settlement::Won } else { Settlement::Lost }
}

/// Settles `tip` against `score`. For an unfinished match the score is the
/// current one: bets that only need time to pass come back `LiveGreen`.
pub fn settle_tip(tip: &str, score: Score, finished: bool) -> Option<Settlement> {
    let rule = parse_tip(tip)?;
    Some(settle_rule(rule, score, finished))
}

pub fn settle_rule(rule: TipRule, score: Score, finished: bool) -> Settlement {
    let (h, a) = (score.home as u32, score.away as u32);
    let total = h + a;
    let hold = if finished {
        Settlement::Won
    } else {
        Settlement::LiveGreen
    };
    match rule {
        TipRule::Under { goals } => {
            if total >= goals {
                Settlement::Lost
            } else {
                hold
            }
        }
        TipRule::Over { goals } => won_if(total >= goals),
        TipRule::TradeOver { goals } => {
            if total >= goals {
                Settlement::Won
            } else if total > 0 {
                Settlement::CashOut
            } else {
                Settlement::Lost
            }
        }
        TipRule::LayTheDraw => {
            if h != a {
                Settlement::Won
            } else if total >= 2 {
                Settlement::CashOut
            } else {
                Settlement::Lost
            }
        }
        TipRule::BttsYes => won_if(h > 0 && a > 0),
        TipRule::BttsNo => {
            if h > 0 && a > 0 {
                Settlement::Lost
            } else {
                hold
            }
        }
        TipRule::Home => won_if(h > a),
        TipRule::Away => won_if(a > h),
        TipRule::Draw => won_if(h == a),
        TipRule::HomeOrDraw => won_if(h >= a),
        TipRule::DrawOrAway => won_if(a >= h),
        TipRule::HomeOrAway => won_if(h != a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(h: u8, a: u8) -> Score {
        Score::new(h, a)
    }

    #[test]
    fn straight_and_double_chance() {
        assert_eq!(settle_tip("1", s(2, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip(" X ", s(1, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("x2", s(2, 1), true), Some(Settlement::Lost));
        assert_eq!(settle_tip("2X", s(0, 0), true), Some(Settlement::Won));
        assert_eq!(settle_tip("1-2", s(0, 0), true), Some(Settlement::Lost));
    }

    #[test]
    fn goal_lines() {
        assert_eq!(settle_tip("+1.5", s(1, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("Over 2.5", s(1, 1), true), Some(Settlement::Lost));
        assert_eq!(settle_tip("o2.5", s(2, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("-3.5", s(2, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("Under 3.5", s(2, 1), false), Some(Settlement::LiveGreen));
        assert_eq!(settle_tip("-3.5", s(3, 1), false), Some(Settlement::Lost));
    }

    #[test]
    fn trading_phrases() {
        assert_eq!(settle_tip("Back Over 2.5", s(1, 0), true), Some(Settlement::CashOut));
        assert_eq!(settle_tip("Back Over 2.5", s(0, 0), true), Some(Settlement::Lost));
        assert_eq!(settle_tip("Lay Under 3.5", s(3, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("Lay The Draw", s(1, 1), true), Some(Settlement::CashOut));
        assert_eq!(settle_tip("Lay The Draw", s(0, 0), true), Some(Settlement::Lost));
        assert_eq!(settle_tip("Lay The Draw", s(0, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("Back Under 2.5", s(1, 0), false), Some(Settlement::LiveGreen));
    }

    #[test]
    fn btts_and_unknown() {
        assert_eq!(settle_tip("Gol", s(1, 1), true), Some(Settlement::Won));
        assert_eq!(settle_tip("No Gol", s(1, 0), false), Some(Settlement::LiveGreen));
        assert_eq!(settle_tip("No Gol", s(1, 1), true), Some(Settlement::Lost));
        assert_eq!(settle_tip("+0.5 HT", s(1, 0), true), None);
        assert_eq!(settle_tip("corner handicap", s(1, 0), true), None);
        assert_eq!(settle_tip("", s(1, 0), true), None);
    }
}
