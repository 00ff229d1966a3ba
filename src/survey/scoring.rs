// Bridge between the cleaned records and the scoring library.

use serde_json::json;
use serde_json::Value as JSValue;

use nps_scoring::ScoreRow;

use crate::survey::*;

/// Reads the score of every record. Returns the valid rows and the number of
/// records whose score could not be used.
pub fn extract_score_rows(records: &[CleanedRecord], score_field: &str) -> (Vec<ScoreRow>, usize) {
    let mut rows: Vec<ScoreRow> = Vec::new();
    let mut invalid_count: usize = 0;
    for (idx, r) in records.iter().enumerate() {
        let cell = match r.get(score_field) {
            Some(c) if !c.is_null() => c,
            _ => {
                warn!(
                    "extract_score_rows: record {} of wave {:?} has no {:?}",
                    idx, r.wave, score_field
                );
                invalid_count += 1;
                continue;
            }
        };
        let parsed = cell
            .as_integer()
            .map(|s| ScoreRow::new(s, &r.wave));
        match parsed {
            Some(Ok(row)) => rows.push(row),
            Some(Err(e)) => {
                warn!("extract_score_rows: record {}: {}", idx, e);
                invalid_count += 1;
            }
            None => {
                warn!(
                    "extract_score_rows: record {}: {:?} is not a whole number",
                    idx,
                    cell.as_text()
                );
                invalid_count += 1;
            }
        }
    }
    debug!(
        "extract_score_rows: {} valid scores, {} invalid",
        rows.len(),
        invalid_count
    );
    (rows, invalid_count)
}

/// Report over the valid rows. An empty set is an error that tells how many rows
/// were rejected on the way.
pub fn report_or_empty(
    rows: &[ScoreRow],
    rules: &ScoreRules,
    invalid_count: usize,
) -> PResult<ScoreReport> {
    match nps_scoring::analyze_scores(rows, rules) {
        Ok(report) => Ok(report),
        Err(ScoringErrors::EmptyScoreSet) => EmptyScoreSetSnafu { invalid_count }.fail(),
        Err(e) => Err(e).context(InvalidScoreRulesSnafu),
    }
}

fn category_js(c: &nps_scoring::CategoryStats) -> JSValue {
    json!({"count": c.count, "pct": format!("{:.2}", c.pct)})
}

pub fn report_to_json(report: &ScoreReport) -> JSValue {
    let distribution: Vec<JSValue> = report
        .distribution
        .iter()
        .enumerate()
        .map(|(score, count)| json!({"score": score, "count": count}))
        .collect();
    json!({
        "count": report.count,
        "min": report.min,
        "max": report.max,
        "mean": format!("{:.2}", report.mean),
        "distribution": distribution,
        "belowThreshold": {
            "cutoff": report.below_threshold_cutoff,
            "pct": format!("{:.2}", report.below_threshold_pct),
        },
        "promoters": category_js(&report.promoters),
        "passives": category_js(&report.passives),
        "detractors": category_js(&report.detractors),
        "nps": report.nps_display(),
    })
}

pub fn score_outcome_to_json(outcome: &ScoreOutcome) -> JSValue {
    json!({
        "report": report_to_json(&outcome.report),
        "invalidCount": outcome.invalid_count,
    })
}

pub fn wave_outcome_to_json(outcome: &WaveScoreOutcome) -> JSValue {
    let waves: Vec<JSValue> = outcome
        .waves
        .iter()
        .map(|w| json!({"wave": w.wave, "report": report_to_json(&w.report)}))
        .collect();
    json!({
        "overall": score_outcome_to_json(&outcome.overall),
        "waves": waves,
    })
}
