use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use nps_scoring::{ScoreReport, ScoreRules, ScoringErrors, WaveReport};

pub mod cleaning;
pub mod config_reader;
pub mod feedback;
pub mod insights;
pub mod io_common;
pub mod io_csv;
pub mod io_gemini;
pub mod io_gsheets;
pub mod io_xlsx;
pub mod scoring;
pub mod summary;

use crate::survey::cleaning::*;
use crate::survey::config_reader::*;
use crate::survey::feedback::*;
use crate::survey::io_common::*;
use crate::survey::summary::*;

/// Errors raised by the spreadsheet providers.
#[derive(Debug, Snafu)]
pub enum SourceError {
    #[snafu(display("Error opening workbook {path}"))]
    OpeningWorkbook {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook {path} has no worksheet"))]
    EmptyWorkbook { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of CSV file {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: u64,
    },
    #[snafu(display("Column {column:?} appears more than once in the header"))]
    DuplicateHeader { column: String },
    #[snafu(display("No spreadsheet credentials: set {token_var} or {key_var}"))]
    MissingSheetsCredentials { token_var: String, key_var: String },
    #[snafu(display("Error building the HTTP client"))]
    SheetsClient { source: reqwest::Error },
    #[snafu(display("Request for sheet {sheet_id} failed"))]
    SheetsRequest {
        source: reqwest::Error,
        sheet_id: String,
    },
    #[snafu(display("Spreadsheet service answered {status} for sheet {sheet_id}: {body}"))]
    SheetsStatus {
        sheet_id: String,
        status: u16,
        body: String,
    },
    #[snafu(display("Could not decode the values of sheet {sheet_id}"))]
    SheetsPayload {
        source: reqwest::Error,
        sheet_id: String,
    },
}

/// Errors raised by the text generation service client.
#[derive(Debug, Snafu)]
pub enum GenerationError {
    #[snafu(display("No API key for the text generation service: set {var}"))]
    MissingApiKey { var: String },
    #[snafu(display("Error building the HTTP client"))]
    GenerationClient { source: reqwest::Error },
    #[snafu(display("Request to model {model} failed"))]
    GenerationRequest {
        source: reqwest::Error,
        model: String,
    },
    #[snafu(display("Text generation service answered {status}: {body}"))]
    GenerationStatus { status: u16, body: String },
    #[snafu(display("Could not decode the text generation response"))]
    GenerationPayload { source: reqwest::Error },
    #[snafu(display("The text generation service returned no text"))]
    EmptyCompletion {},
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("Cannot find a spreadsheet identifier in {locator:?}"))]
    InvalidLocator { locator: String },
    #[snafu(display("Spreadsheet {locator:?} is unavailable"))]
    SourceUnavailable {
        locator: String,
        source: SourceError,
    },
    #[snafu(display("The wave column {column:?} is missing from the sheet"))]
    MissingWaveColumn { column: String },
    #[snafu(display("Columns missing from the sheet: {}", missing.join(", ")))]
    ContractMismatch { missing: Vec<String> },
    #[snafu(display("No JSON object found in the generated text: {excerpt:?}"))]
    NoStructuredOutput { excerpt: String },
    #[snafu(display("The generated summary could not be decoded: {excerpt:?}"))]
    MalformedSummary {
        excerpt: String,
        source: serde_json::Error,
    },
    #[snafu(display("The text generation service is unavailable"))]
    GenerationUnavailable { source: GenerationError },
    #[snafu(display("No valid score to analyze ({invalid_count} invalid values)"))]
    EmptyScoreSet { invalid_count: usize },

    #[snafu(display("Error opening file {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Unknown input type {input_type:?} (expected gsheets, xlsx or csv)"))]
    UnknownInputType { input_type: String },
    #[snafu(display("Invalid column contract: {reason}"))]
    InvalidContract { reason: String },
    #[snafu(display("Invalid scoring thresholds"))]
    InvalidScoreRules { source: ScoringErrors },
    #[snafu(display("Error writing {path}"))]
    WritingArtifact {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing {path}"))]
    SerializingArtifact {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error reading {path}"))]
    ReadingArtifact {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error decoding {path}"))]
    ParsingArtifact {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("The feedback bundle {path} differs from the reference {reference}"))]
    ReferenceMismatch { path: String, reference: String },
}

pub type PResult<T> = Result<T, PipelineError>;

/// What the caller asks for: one sheet, one wave.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExtractionRequest {
    pub locator: String,
    pub wave_label: String,
}

/// The rows of one wave, after cleaning.
#[derive(PartialEq, Debug, Clone)]
pub struct CleanedSheet {
    pub sheet_id: String,
    pub records: Vec<CleanedRecord>,
    pub stats: CleaningStats,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ExtractionOutcome {
    pub sheet_id: String,
    pub feedback_bundle_path: String,
    pub bundle: FeedbackBundle,
    pub summary: SummaryResult,
    pub stats: CleaningStats,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScoreOutcome {
    pub report: ScoreReport,
    /// Rows whose score was missing, not a number or outside of 0-10.
    pub invalid_count: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct WaveScoreOutcome {
    pub overall: ScoreOutcome,
    pub waves: Vec<WaveReport>,
}

/// Opens the spreadsheet provider selected in the configuration.
pub fn open_sheet_source(config: &PipelineConfig, locator: &str) -> PResult<Box<dyn SheetSource>> {
    let res: Box<dyn SheetSource> = match config.provider {
        InputType::GSheets => Box::new(
            io_gsheets::GoogleSheetsReader::from_env(config)
                .context(SourceUnavailableSnafu { locator })?,
        ),
        InputType::Xlsx => Box::new(io_xlsx::XlsxReader {}),
        InputType::Csv => Box::new(io_csv::CsvReader {}),
    };
    Ok(res)
}

/// Resolves the locator and retrieves all the rows of the first worksheet.
pub fn fetch_sheet(locator: &str, source: &dyn SheetSource) -> PResult<(String, Vec<RawRow>)> {
    let sheet_id = resolve_locator(locator)?;
    info!("fetch_sheet: reading sheet {:?}", sheet_id);
    let rows = source
        .fetch_rows(&sheet_id)
        .context(SourceUnavailableSnafu { locator })?;
    info!("fetch_sheet: {} rows read from {:?}", rows.len(), sheet_id);
    Ok((sheet_id, rows))
}

/// Reader and cleaner: the rows of the requested wave that satisfy the contract.
pub fn load_cleaned_records(
    request: &ExtractionRequest,
    config: &PipelineConfig,
    contract: &ColumnContract,
    source: &dyn SheetSource,
) -> PResult<CleanedSheet> {
    let (sheet_id, rows) = fetch_sheet(&request.locator, source)?;
    let outcome = clean_rows(
        &rows,
        &request.wave_label,
        &config.wave_column_name,
        contract,
    )?;
    Ok(CleanedSheet {
        sheet_id,
        records: outcome.records,
        stats: outcome.stats,
    })
}

/// Extraction half of the pipeline: reads, cleans, aggregates and persists the
/// feedback bundle. Returns the cleaned sheet and the bundle that was written.
pub fn extract_feedback(
    request: &ExtractionRequest,
    config: &PipelineConfig,
    contract: &ColumnContract,
    source: &dyn SheetSource,
) -> PResult<(CleanedSheet, FeedbackBundle)> {
    let sheet = load_cleaned_records(request, config, contract, source)?;
    if sheet.records.is_empty() {
        warn!(
            "extract_feedback: no usable row for wave {:?} in sheet {:?}",
            request.wave_label, sheet.sheet_id
        );
    }
    let absent: Vec<&str> = BUNDLE_FIELDS
        .iter()
        .copied()
        .filter(|f| !contract.has_field(f))
        .collect();
    if !absent.is_empty() {
        info!(
            "extract_feedback: fields without a column, left empty: {:?}",
            absent
        );
    }
    let bundle = aggregate_feedback(&sheet.records);
    discard_stale_summary(config)?;
    write_bundle(&bundle, &config.feedback_output_file)?;
    info!(
        "extract_feedback: feedback bundle written to {}",
        config.feedback_output_file
    );
    Ok((sheet, bundle))
}

// A summary left by a previous run must not be paired with the new bundle.
fn discard_stale_summary(config: &PipelineConfig) -> PResult<()> {
    if let Some(path) = config.summary_output_file.as_ref() {
        if Path::new(path).exists() {
            debug!("discard_stale_summary: removing {}", path);
            fs::remove_file(path).context(WritingArtifactSnafu { path: path.clone() })?;
        }
    }
    Ok(())
}

/// Summarizes a bundle and, when configured, persists the summary.
/// Nothing is written if the generation or the parsing fails.
pub fn summarize_and_store(
    bundle: &FeedbackBundle,
    config: &PipelineConfig,
    generator: &dyn TextGenerator,
) -> PResult<SummaryResult> {
    let summary = summarize_bundle(bundle, generator)?;
    if let Some(path) = config.summary_output_file.as_ref() {
        write_json_atomic(&summary, path)?;
        info!("summarize_and_store: summary written to {}", path);
    }
    Ok(summary)
}

/// The full extraction request: feedback bundle on disk plus its summary.
pub fn run_extraction(
    request: &ExtractionRequest,
    config: &PipelineConfig,
    contract: &ColumnContract,
    source: &dyn SheetSource,
    generator: &dyn TextGenerator,
) -> PResult<ExtractionOutcome> {
    let (sheet, bundle) = extract_feedback(request, config, contract, source)?;
    let summary = summarize_and_store(&bundle, config, generator)?;
    Ok(ExtractionOutcome {
        sheet_id: sheet.sheet_id,
        feedback_bundle_path: config.feedback_output_file.clone(),
        bundle,
        summary,
        stats: sheet.stats,
    })
}

/// Score report over cleaned records.
pub fn score_records(records: &[CleanedRecord], config: &PipelineConfig) -> PResult<ScoreOutcome> {
    let rules: ScoreRules = config.score_rules()?;
    let (rows, invalid_count) = scoring::extract_score_rows(records, &config.score_field_name);
    let report = scoring::report_or_empty(&rows, &rules, invalid_count)?;
    Ok(ScoreOutcome {
        report,
        invalid_count,
    })
}

/// Score reports for several waves of the same sheet: one overall report and one per wave.
/// The sheet is read once.
pub fn score_waves(
    locator: &str,
    wave_labels: &[String],
    config: &PipelineConfig,
    contract: &ColumnContract,
    source: &dyn SheetSource,
) -> PResult<WaveScoreOutcome> {
    let rules: ScoreRules = config.score_rules()?;
    if !contract.has_field(&config.score_field_name) {
        warn!(
            "score_waves: the column contract has no {:?} field, no score can be read",
            config.score_field_name
        );
    }
    let (_, rows) = fetch_sheet(locator, source)?;
    let mut records: Vec<CleanedRecord> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for wave_label in wave_labels.iter() {
        if !seen.insert(wave_label.as_str()) {
            warn!("score_waves: wave {:?} requested twice, scored once", wave_label);
            continue;
        }
        let outcome = clean_rows(&rows, wave_label, &config.wave_column_name, contract)?;
        records.extend(outcome.records);
    }
    let (score_rows, invalid_count) =
        scoring::extract_score_rows(&records, &config.score_field_name);
    let report = scoring::report_or_empty(&score_rows, &rules, invalid_count)?;
    let waves =
        nps_scoring::analyze_by_wave(&score_rows, &rules).context(InvalidScoreRulesSnafu)?;
    Ok(WaveScoreOutcome {
        overall: ScoreOutcome {
            report,
            invalid_count,
        },
        waves,
    })
}
