use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    #[error("row has no home/away teams")]
    MissingTeams,

    #[error("same team on both sides: {0}")]
    SameTeam(String),

    #[error("row has no date")]
    MissingDate,

    #[error("unparseable date: {0}")]
    BadDate(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CandidateRejection {
    #[error("probability {probability:.0}% below the {required:.0}% minimum")]
    LowProbability { probability: f64, required: f64 },

    #[error("odds {odds:.2} below the {min:.2} minimum")]
    OddsTooLow { odds: f64, min: f64 },

    #[error("odds {odds:.2} above the {cap:.2} cap")]
    AboveHardCap { odds: f64, cap: f64 },

    #[error("odds {odds:.2} need at least {required:.0}% probability")]
    PremiumBand { odds: f64, required: f64 },

    #[error("odds {odds:.2} not above the {floor:.2} floor for this league")]
    LeagueFloor { odds: f64, floor: f64 },
}
