// The feedback bundle: qualitative answers of one wave, collected per field.

use serde::{Deserialize, Serialize};
use text_diff::print_diff;

use crate::survey::*;

pub const ENGINEER_FEEDBACK: &str = "engineer_feedback";
pub const PROGRAM_LIKINGS: &str = "program_likings";
pub const TOPICS_LEARNED: &str = "topics_learned";
pub const PROGRAM_IMPROVEMENTS: &str = "program_improvements";
pub const ENGINEER_IMPROVEMENTS: &str = "engineer_improvements";

pub const BUNDLE_FIELDS: [&str; 5] = [
    ENGINEER_FEEDBACK,
    PROGRAM_LIKINGS,
    TOPICS_LEARNED,
    PROGRAM_IMPROVEMENTS,
    ENGINEER_IMPROVEMENTS,
];

/// The five qualitative fields of a wave.
///
/// Each field is collected on its own: a record contributes to a field only when it
/// has a value for it, so the lengths of the fields may differ.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackBundle {
    pub engineer_feedback: Vec<String>,
    pub program_likings: Vec<String>,
    pub topics_learned: Vec<String>,
    pub program_improvements: Vec<String>,
    pub engineer_improvements: Vec<String>,
}

fn collect_field(records: &[CleanedRecord], field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get(field))
        .filter(|v| !v.is_null())
        .map(|v| v.as_text())
        .collect()
}

pub fn aggregate_feedback(records: &[CleanedRecord]) -> FeedbackBundle {
    let bundle = FeedbackBundle {
        engineer_feedback: collect_field(records, ENGINEER_FEEDBACK),
        program_likings: collect_field(records, PROGRAM_LIKINGS),
        topics_learned: collect_field(records, TOPICS_LEARNED),
        program_improvements: collect_field(records, PROGRAM_IMPROVEMENTS),
        engineer_improvements: collect_field(records, ENGINEER_IMPROVEMENTS),
    };
    debug!(
        "aggregate_feedback: {} records -> field lengths {} {} {} {} {}",
        records.len(),
        bundle.engineer_feedback.len(),
        bundle.program_likings.len(),
        bundle.topics_learned.len(),
        bundle.program_improvements.len(),
        bundle.engineer_improvements.len()
    );
    bundle
}

pub fn write_bundle(bundle: &FeedbackBundle, path: &str) -> PResult<()> {
    write_json_atomic(bundle, path)
}

pub fn load_bundle(path: &str) -> PResult<FeedbackBundle> {
    let contents = fs::read_to_string(path).context(ReadingArtifactSnafu { path })?;
    let bundle: FeedbackBundle =
        serde_json::from_str(&contents).context(ParsingArtifactSnafu { path })?;
    Ok(bundle)
}

/// Compares the bundle stored at `path` with a reference bundle. Both are rendered
/// the same way, so that only the content matters. Differences are printed.
pub fn check_reference(path: &str, reference: &str) -> PResult<()> {
    let computed = load_bundle(path)?;
    let expected = load_bundle(reference)?;
    let pretty_computed =
        serde_json::to_string_pretty(&computed).context(SerializingArtifactSnafu { path })?;
    let pretty_expected = serde_json::to_string_pretty(&expected)
        .context(SerializingArtifactSnafu { path: reference })?;
    if pretty_computed != pretty_expected {
        warn!("Found differences with the reference bundle");
        print_diff(pretty_expected.as_str(), pretty_computed.as_str(), "\n");
        return ReferenceMismatchSnafu { path, reference }.fail();
    }
    info!("check_reference: {} matches {}", path, reference);
    Ok(())
}
