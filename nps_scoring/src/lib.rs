mod config;
use log::{debug, info};

use std::collections::HashMap;

pub use crate::config::*;

/// Places a score in one of the three categories.
///
/// The rules are assumed to be valid: every score falls in exactly one category.
pub fn categorize(score: u8, rules: &ScoreRules) -> Category {
    if score >= rules.promoter_threshold {
        Category::Promoter
    } else if score <= rules.detractor_threshold {
        Category::Detractor
    } else {
        Category::Passive
    }
}

fn pct(part: u64, total: u64) -> f64 {
    100.0 * (part as f64) / (total as f64)
}

/// Computes the statistics for a set of scores.
///
/// An empty set has no meaningful statistics: it returns `ScoringErrors::EmptyScoreSet`
/// instead of a report filled with zeros.
///
/// ```
/// use nps_scoring::{analyze_scores, ScoreRow, ScoreRules};
/// # use nps_scoring::ScoringErrors;
///
/// let rows: Vec<ScoreRow> = [9, 9, 8, 6, 10]
///     .iter()
///     .map(|s| ScoreRow::new(*s, "wave 1"))
///     .collect::<Result<_, _>>()?;
/// let report = analyze_scores(&rows, &ScoreRules::DEFAULT_RULES)?;
/// assert_eq!(report.nps_display(), "40.00");
///
/// # Ok::<(), ScoringErrors>(())
/// ```
pub fn analyze_scores(
    rows: &[ScoreRow],
    rules: &ScoreRules,
) -> Result<ScoreReport, ScoringErrors> {
    rules.validate()?;
    info!("analyze_scores: processing {:?} scores, rules: {:?}", rows.len(), rules);

    let min = rows
        .iter()
        .map(|r| r.score())
        .min()
        .ok_or(ScoringErrors::EmptyScoreSet)?;
    let max = rows
        .iter()
        .map(|r| r.score())
        .max()
        .ok_or(ScoringErrors::EmptyScoreSet)?;

    let count = rows.len() as u64;
    let mut distribution = [0u64; SCALE_SIZE];
    let mut total: u64 = 0;
    let mut below: u64 = 0;
    let (mut promoters, mut passives, mut detractors) = (0u64, 0u64, 0u64);
    for r in rows.iter() {
        let s = r.score();
        distribution[s as usize] += 1;
        total += s as u64;
        if s < rules.below_threshold_cutoff {
            below += 1;
        }
        match categorize(s, rules) {
            Category::Promoter => promoters += 1,
            Category::Passive => passives += 1,
            Category::Detractor => detractors += 1,
        }
    }
    debug!(
        "analyze_scores: distribution: {:?} promoters: {} passives: {} detractors: {}",
        distribution, promoters, passives, detractors
    );

    // Single division over the count difference.
    let nps = 100.0 * (promoters as f64 - detractors as f64) / (count as f64);

    Ok(ScoreReport {
        count,
        min,
        max,
        mean: (total as f64) / (count as f64),
        distribution,
        below_threshold_cutoff: rules.below_threshold_cutoff,
        below_threshold_pct: pct(below, count),
        promoters: CategoryStats {
            count: promoters,
            pct: pct(promoters, count),
        },
        passives: CategoryStats {
            count: passives,
            pct: pct(passives, count),
        },
        detractors: CategoryStats {
            count: detractors,
            pct: pct(detractors, count),
        },
        nps,
    })
}

/// Computes one report per survey wave, in the order in which the waves first appear.
pub fn analyze_by_wave(
    rows: &[ScoreRow],
    rules: &ScoreRules,
) -> Result<Vec<WaveReport>, ScoringErrors> {
    if rows.is_empty() {
        return Err(ScoringErrors::EmptyScoreSet);
    }
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ScoreRow>> = HashMap::new();
    for r in rows.iter() {
        let group = groups.entry(r.wave().to_string()).or_insert_with(|| {
            order.push(r.wave().to_string());
            Vec::new()
        });
        group.push(r.clone());
    }

    let mut res: Vec<WaveReport> = Vec::new();
    for wave in order {
        let group = groups.remove(&wave).unwrap_or_default();
        let report = analyze_scores(&group, rules)?;
        info!("analyze_by_wave: wave {:?}: nps {}", wave, report.nps_display());
        res.push(WaveReport { wave, report });
    }
    Ok(res)
}
