// Wave filtering and row cleaning.

use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::survey::*;

/// A row of the requested wave, renamed to canonical fields.
///
/// Invariant: every field of the contract is present and not null.
#[derive(PartialEq, Debug, Clone)]
pub struct CleanedRecord {
    pub wave: String,
    pub fields: BTreeMap<String, CellValue>,
}

impl CleanedRecord {
    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields.get(field)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct CleaningStats {
    pub rows_read: usize,
    pub rows_in_wave: usize,
    /// Rows of the wave dropped because a contract field was empty.
    pub rows_incomplete: usize,
    pub rows_kept: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CleaningOutcome {
    pub records: Vec<CleanedRecord>,
    pub stats: CleaningStats,
}

fn in_wave(row: &RawRow, wave_column: &str, wave_label: &str) -> bool {
    match row.get(wave_column) {
        Some(v) if !v.is_null() => v.as_text() == wave_label,
        _ => false,
    }
}

/// Keeps the rows of one wave that satisfy the column contract, renamed to the
/// canonical fields. The order of the rows is kept.
///
/// The contract is checked against the columns of the rows of the wave only.
/// A row missing any contract field is dropped, whichever consumer needs it.
pub fn clean_rows(
    rows: &[RawRow],
    wave_label: &str,
    wave_column: &str,
    contract: &ColumnContract,
) -> PResult<CleaningOutcome> {
    let mut stats = CleaningStats {
        rows_read: rows.len(),
        ..CleaningStats::default()
    };
    if rows.is_empty() {
        info!("clean_rows: the sheet has no row");
        return Ok(CleaningOutcome {
            records: Vec::new(),
            stats,
        });
    }

    ensure!(
        rows.iter().any(|r| r.contains_key(wave_column)),
        MissingWaveColumnSnafu {
            column: wave_column
        }
    );

    let selected: Vec<&RawRow> = rows
        .iter()
        .filter(|r| in_wave(r, wave_column, wave_label))
        .collect();
    stats.rows_in_wave = selected.len();
    if selected.is_empty() {
        info!(
            "clean_rows: no row for wave {:?} among {} rows",
            wave_label, stats.rows_read
        );
        return Ok(CleaningOutcome {
            records: Vec::new(),
            stats,
        });
    }

    let schema: HashSet<&str> = selected
        .iter()
        .flat_map(|r| r.keys().map(|k| k.as_str()))
        .collect();
    let missing: Vec<String> = contract
        .entries()
        .iter()
        .filter(|e| !schema.contains(e.source.as_str()))
        .map(|e| e.source.clone())
        .collect();
    ensure!(missing.is_empty(), ContractMismatchSnafu { missing });

    let mut records: Vec<CleanedRecord> = Vec::new();
    for (idx, row) in selected.iter().enumerate() {
        let mut fields: BTreeMap<String, CellValue> = BTreeMap::new();
        let mut null_fields: Vec<&str> = Vec::new();
        for e in contract.entries() {
            match row.get(&e.source) {
                Some(v) if !v.is_null() => {
                    fields.insert(e.canonical.clone(), v.clone());
                }
                _ => null_fields.push(e.canonical.as_str()),
            }
        }
        if !null_fields.is_empty() {
            debug!(
                "clean_rows: dropping row {} of wave {:?}: empty fields {:?}",
                idx, wave_label, null_fields
            );
            stats.rows_incomplete += 1;
            continue;
        }
        records.push(CleanedRecord {
            wave: wave_label.to_string(),
            fields,
        });
    }
    stats.rows_kept = records.len();
    if stats.rows_incomplete > 0 {
        warn!(
            "clean_rows: {} rows of wave {:?} dropped for missing answers",
            stats.rows_incomplete, wave_label
        );
    }
    info!("clean_rows: {:?}", stats);
    Ok(CleaningOutcome { records, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::test_support::*;

    fn rows() -> Vec<RawRow> {
        vec![
            survey_row("W1", "Great mentors", "Projects", CellValue::Int(9)),
            survey_row("w1", "lowercase wave", "Talks", CellValue::Int(8)),
            survey_row("W2", "Other wave", "Labs", CellValue::Int(5)),
            survey_row("W1", "  ", "Projects", CellValue::Int(7)),
            survey_row("W1", "Nice", "Food", CellValue::Empty),
            survey_row("W1", "Solid", "Mentoring", CellValue::Int(10)),
        ]
    }

    #[test]
    fn keeps_complete_rows_of_the_wave_in_order() {
        let outcome = clean_rows(&rows(), "W1", WAVE, &survey_contract()).unwrap();
        let feedback: Vec<String> = outcome
            .records
            .iter()
            .map(|r| r.get("engineer_feedback").unwrap().as_text())
            .collect();
        assert_eq!(feedback, vec!["Great mentors", "Solid"]);
        assert_eq!(
            outcome.stats,
            CleaningStats {
                rows_read: 6,
                rows_in_wave: 4,
                rows_incomplete: 2,
                rows_kept: 2,
            }
        );
        // Unmapped columns are dropped.
        assert!(outcome.records[0].get("Timestamp").is_none());
        assert_eq!(outcome.records[0].fields.len(), 3);
        assert_eq!(outcome.records[0].wave, "W1");
    }

    #[test]
    fn unknown_wave_is_empty_not_an_error() {
        let contracts = vec![
            survey_contract(),
            identity_contract(&["Not", "In", "The", "Sheet"]),
        ];
        for contract in contracts.iter() {
            let outcome = clean_rows(&rows(), "W3", WAVE, contract).unwrap();
            assert!(outcome.records.is_empty());
            assert_eq!(outcome.stats.rows_in_wave, 0);
        }
    }

    #[test]
    fn missing_wave_column() {
        let res = clean_rows(&rows(), "W1", "Cohort", &survey_contract());
        match res {
            Err(PipelineError::MissingWaveColumn { column }) => assert_eq!(column, "Cohort"),
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn row_without_wave_cell_is_only_excluded() {
        let mut rs = rows();
        rs.push(row(&[("Feedback", text("No wave")), ("Liked", text("x"))]));
        let outcome = clean_rows(&rs, "W1", WAVE, &survey_contract()).unwrap();
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn contract_mismatch_names_missing_columns() {
        let contract = ColumnContract::new(vec![
            ("engineer_feedback".to_string(), "Feedback".to_string()),
            ("topics_learned".to_string(), "Topics".to_string()),
            ("engineer_improvements".to_string(), "Improve".to_string()),
        ])
        .unwrap();
        match clean_rows(&rows(), "W1", WAVE, &contract) {
            Err(PipelineError::ContractMismatch { missing }) => {
                assert_eq!(missing, vec!["Topics".to_string(), "Improve".to_string()])
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn contract_checked_after_wave_filter() {
        let mut rs = vec![row(&[
            (WAVE, text("W2")),
            ("Feedback", text("only here")),
            ("Liked", text("x")),
            ("Score", CellValue::Int(3)),
            ("Extra", text("only in W2")),
        ])];
        rs.push(row(&[
            (WAVE, text("W1")),
            ("Feedback", text("ok")),
            ("Liked", text("y")),
            ("Score", CellValue::Int(9)),
        ]));
        let contract = ColumnContract::new(vec![
            ("engineer_feedback".to_string(), "Feedback".to_string()),
            ("extra".to_string(), "Extra".to_string()),
        ])
        .unwrap();
        // "Extra" exists, but only in rows of another wave.
        assert!(matches!(
            clean_rows(&rs, "W1", WAVE, &contract),
            Err(PipelineError::ContractMismatch { .. })
        ));
        // In the wave where it exists, no error.
        let outcome = clean_rows(&rs, "W2", WAVE, &contract).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn numeric_wave_labels_match_their_text() {
        let rs = vec![row(&[(WAVE, CellValue::Float(2.0)), ("Feedback", text("ok"))])];
        let contract = identity_contract(&["Feedback"]);
        let outcome = clean_rows(&rs, "2", WAVE, &contract).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn empty_sheet() {
        let outcome = clean_rows(&[], "W1", WAVE, &survey_contract()).unwrap();
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn cleaning_is_idempotent() {
        let first = clean_rows(&rows(), "W1", WAVE, &survey_contract()).unwrap();
        let as_raw: Vec<RawRow> = first
            .records
            .iter()
            .map(|r| {
                let mut raw: RawRow = r.fields.clone();
                raw.insert(WAVE.to_string(), text(&r.wave));
                raw
            })
            .collect();
        let identity = identity_contract(&[
            "engineer_feedback",
            "program_likings",
            "recommendation_score",
        ]);
        let second = clean_rows(&as_raw, "W1", WAVE, &identity).unwrap();
        assert_eq!(second.records, first.records);
        assert_eq!(second.stats.rows_incomplete, 0);
    }
}
