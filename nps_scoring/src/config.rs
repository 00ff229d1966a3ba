// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The highest answer on the recommendation scale. The lowest is 0.
pub const MAX_SCORE: u8 = 10;

/// Number of distinct answers on the 0-10 scale.
pub const SCALE_SIZE: usize = MAX_SCORE as usize + 1;

/// One respondent's answer to the "how likely are you to recommend" question.
///
/// The score is guaranteed to be on the 0-10 scale at construction.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ScoreRow {
    score: u8,
    wave: String,
}

impl ScoreRow {
    pub fn new(score: i64, wave: &str) -> Result<ScoreRow, ScoringErrors> {
        if !(0..=MAX_SCORE as i64).contains(&score) {
            return Err(ScoringErrors::ScoreOutOfRange(score));
        }
        Ok(ScoreRow {
            score: score as u8,
            wave: wave.to_string(),
        })
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    /// The survey wave (cohort) this answer was collected in.
    pub fn wave(&self) -> &str {
        &self.wave
    }
}

// ******** Output data structures *********

/// The three groups of the net promoter score.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Category {
    Promoter,
    Passive,
    Detractor,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CategoryStats {
    pub count: u64,
    /// Percentage of all the valid answers, between 0 and 100.
    pub pct: f64,
}

/// Statistics over a non-empty set of scores.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreReport {
    pub count: u64,
    pub min: u8,
    pub max: u8,
    pub mean: f64,
    /// Number of answers for each score, indexed by the score.
    pub distribution: [u64; SCALE_SIZE],
    /// The cutoff used for `below_threshold_pct` (strictly below).
    pub below_threshold_cutoff: u8,
    pub below_threshold_pct: f64,
    pub promoters: CategoryStats,
    pub passives: CategoryStats,
    pub detractors: CategoryStats,
    /// promoters.pct - detractors.pct, between -100 and 100.
    pub nps: f64,
}

impl ScoreReport {
    /// The composite score as it should be presented: two decimal places.
    pub fn nps_display(&self) -> String {
        format!("{:.2}", self.nps)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct WaveReport {
    pub wave: String,
    pub report: ScoreReport,
}

/// Errors that prevent a report from being computed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringErrors {
    /// There is no valid score to compute statistics on.
    EmptyScoreSet,
    ScoreOutOfRange(i64),
    InvalidRules(String),
}

impl Error for ScoringErrors {}

impl Display for ScoringErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringErrors::EmptyScoreSet => write!(f, "no valid score to analyze"),
            ScoringErrors::ScoreOutOfRange(s) => {
                write!(f, "score {} is outside of the 0-{} scale", s, MAX_SCORE)
            }
            ScoringErrors::InvalidRules(msg) => write!(f, "invalid scoring rules: {}", msg),
        }
    }
}

// ********* Configuration **********

/// The thresholds that split the scale into categories.
///
/// The defaults follow the usual net promoter convention:
/// 9-10 promoters, 7-8 passives, 0-6 detractors.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoreRules {
    /// Scores greater or equal are promoters.
    pub promoter_threshold: u8,
    /// Scores lower or equal are detractors.
    pub detractor_threshold: u8,
    /// Scores strictly lower are counted in the below-threshold percentage.
    pub below_threshold_cutoff: u8,
}

impl ScoreRules {
    pub const DEFAULT_RULES: ScoreRules = ScoreRules {
        promoter_threshold: 9,
        detractor_threshold: 6,
        below_threshold_cutoff: 7,
    };

    /// Checks that the categories form a partition of the scale.
    pub fn validate(&self) -> Result<(), ScoringErrors> {
        if self.promoter_threshold > MAX_SCORE {
            return Err(ScoringErrors::InvalidRules(format!(
                "promoter threshold {} is above {}",
                self.promoter_threshold, MAX_SCORE
            )));
        }
        if self.detractor_threshold >= self.promoter_threshold {
            return Err(ScoringErrors::InvalidRules(format!(
                "detractor threshold {} must be lower than the promoter threshold {}",
                self.detractor_threshold, self.promoter_threshold
            )));
        }
        if self.below_threshold_cutoff > MAX_SCORE + 1 {
            return Err(ScoringErrors::InvalidRules(format!(
                "below threshold cutoff {} is above {}",
                self.below_threshold_cutoff,
                MAX_SCORE + 1
            )));
        }
        Ok(())
    }
}

impl Default for ScoreRules {
    fn default() -> Self {
        ScoreRules::DEFAULT_RULES
    }
}
