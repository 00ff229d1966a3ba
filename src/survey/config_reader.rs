use crate::survey::*;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

/// Where the survey responses come from.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "gsheets")]
    GSheets,
    #[serde(rename = "xlsx")]
    Xlsx,
    #[serde(rename = "csv")]
    Csv,
}

pub fn parse_input_type(s: &str) -> PResult<InputType> {
    match s {
        "gsheets" => Ok(InputType::GSheets),
        "xlsx" => Ok(InputType::Xlsx),
        "csv" => Ok(InputType::Csv),
        x => UnknownInputTypeSnafu { input_type: x }.fail(),
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub wave_column_name: String,
    /// Canonical name of the 0-10 recommendation field.
    pub score_field_name: String,
    pub promoter_threshold: u8,
    pub detractor_threshold: u8,
    pub below_threshold_cutoff: u8,
    pub column_contract_file: String,
    pub feedback_output_file: String,
    pub summary_output_file: Option<String>,
    pub provider: InputType,
    /// A1 range read by the Google Sheets provider. Without a sheet name the
    /// range refers to the first worksheet.
    pub sheet_range: String,
    pub sheets_api_base: String,
    pub generator_model: String,
    pub generator_api_base: String,
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            wave_column_name: "Survey Wave".to_string(),
            score_field_name: "recommendation_score".to_string(),
            promoter_threshold: ScoreRules::DEFAULT_RULES.promoter_threshold,
            detractor_threshold: ScoreRules::DEFAULT_RULES.detractor_threshold,
            below_threshold_cutoff: ScoreRules::DEFAULT_RULES.below_threshold_cutoff,
            column_contract_file: "col_keys.json".to_string(),
            feedback_output_file: "reviews_data.json".to_string(),
            summary_output_file: None,
            provider: InputType::GSheets,
            sheet_range: "A:ZZ".to_string(),
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            generator_model: "gemini-pro".to_string(),
            generator_api_base: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn score_rules(&self) -> PResult<ScoreRules> {
        let rules = ScoreRules {
            promoter_threshold: self.promoter_threshold,
            detractor_threshold: self.detractor_threshold,
            below_threshold_cutoff: self.below_threshold_cutoff,
        };
        rules.validate().context(InvalidScoreRulesSnafu)?;
        Ok(rules)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    // The file paths of a configuration are relative to the file itself.
    fn rebase(&mut self, root: &Path) {
        let rebase_one = |p: &str| -> String {
            if Path::new(p).is_absolute() {
                p.to_string()
            } else {
                let full: PathBuf = root.join(p);
                full.display().to_string()
            }
        };
        self.column_contract_file = rebase_one(&self.column_contract_file);
        self.feedback_output_file = rebase_one(&self.feedback_output_file);
        self.summary_output_file = self.summary_output_file.as_deref().map(rebase_one);
    }
}

pub fn read_config(path: &str) -> PResult<PipelineConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let mut config: PipelineConfig =
        serde_json::from_str(contents.as_str()).context(ParsingConfigSnafu { path })?;
    if let Some(root) = Path::new(path).parent() {
        config.rebase(root);
    }
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ContractEntry {
    pub canonical: String,
    pub source: String,
}

/// Which source columns are required, and the canonical name each one takes.
///
/// Invariants: at least one entry, no blank name, no source column or canonical
/// name used twice.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnContract {
    entries: Vec<ContractEntry>,
}

impl ColumnContract {
    /// Builds a contract from (canonical name, source column) pairs.
    pub fn new(pairs: Vec<(String, String)>) -> PResult<ColumnContract> {
        ensure!(
            !pairs.is_empty(),
            InvalidContractSnafu {
                reason: "the contract has no column"
            }
        );
        let mut entries: Vec<ContractEntry> = Vec::new();
        for (canonical, source) in pairs {
            ensure!(
                !canonical.trim().is_empty(),
                InvalidContractSnafu {
                    reason: format!("blank canonical name for column {:?}", source)
                }
            );
            ensure!(
                !source.trim().is_empty(),
                InvalidContractSnafu {
                    reason: format!("blank source column for field {:?}", canonical)
                }
            );
            ensure!(
                !entries.iter().any(|e| e.canonical == canonical),
                InvalidContractSnafu {
                    reason: format!("field {:?} is declared twice", canonical)
                }
            );
            ensure!(
                !entries.iter().any(|e| e.source == source),
                InvalidContractSnafu {
                    reason: format!("column {:?} is mapped twice", source)
                }
            );
            entries.push(ContractEntry { canonical, source });
        }
        Ok(ColumnContract { entries })
    }

    pub fn entries(&self) -> &[ContractEntry] {
        &self.entries
    }

    pub fn has_field(&self, canonical: &str) -> bool {
        self.entries.iter().any(|e| e.canonical == canonical)
    }
}

/// Reads a contract stored as a JSON object `{"Source column": "canonical", ...}`,
/// the layout of `col_keys.json`. The order of the file is kept.
pub fn read_column_contract(path: &str) -> PResult<ColumnContract> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let js: JSMap<String, JSValue> =
        serde_json::from_str(contents.as_str()).context(ParsingConfigSnafu { path })?;
    parse_column_contract(&js)
}

pub fn parse_column_contract(js: &JSMap<String, JSValue>) -> PResult<ColumnContract> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (source, canonical) in js.iter() {
        match canonical {
            JSValue::String(c) => pairs.push((c.clone(), source.clone())),
            x => {
                return InvalidContractSnafu {
                    reason: format!(
                        "the field name of column {:?} must be a string, got {}",
                        source, x
                    ),
                }
                .fail()
            }
        }
    }
    ColumnContract::new(pairs)
}
