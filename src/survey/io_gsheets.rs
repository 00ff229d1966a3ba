// Client for the values endpoint of the Google Sheets API.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value as JSValue;

use crate::survey::*;

pub const TOKEN_VAR: &str = "GOOGLE_SHEETS_TOKEN";
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SheetsAuth {
    /// OAuth access token, sent as a bearer token.
    Bearer(String),
    ApiKey(String),
}

pub struct GoogleSheetsReader {
    http: Client,
    api_base: String,
    range: String,
    auth: SheetsAuth,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JSValue>>,
}

impl GoogleSheetsReader {
    pub fn new(config: &PipelineConfig, auth: SheetsAuth) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context(SheetsClientSnafu)?;
        Ok(GoogleSheetsReader {
            http,
            api_base: config.sheets_api_base.trim_end_matches('/').to_string(),
            range: config.sheet_range.clone(),
            auth,
        })
    }

    /// Credentials come from the environment: a bearer token first, then an API key.
    pub fn from_env(config: &PipelineConfig) -> Result<Self, SourceError> {
        let auth = match (std::env::var(TOKEN_VAR), std::env::var(API_KEY_VAR)) {
            (Ok(token), _) if !token.is_empty() => SheetsAuth::Bearer(token),
            (_, Ok(key)) if !key.is_empty() => SheetsAuth::ApiKey(key),
            _ => {
                return MissingSheetsCredentialsSnafu {
                    token_var: TOKEN_VAR,
                    key_var: API_KEY_VAR,
                }
                .fail()
            }
        };
        GoogleSheetsReader::new(config, auth)
    }

    fn values_url(&self, sheet_id: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base, sheet_id, self.range
        )
    }
}

impl SheetSource for GoogleSheetsReader {
    fn fetch_rows(&self, sheet_id: &str) -> Result<Vec<RawRow>, SourceError> {
        let url = self.values_url(sheet_id);
        debug!("GoogleSheetsReader: GET {}", url);
        let mut req = self.http.get(&url).query(&[
            ("valueRenderOption", "UNFORMATTED_VALUE"),
            ("majorDimension", "ROWS"),
        ]);
        req = match &self.auth {
            SheetsAuth::Bearer(token) => req.bearer_auth(token),
            SheetsAuth::ApiKey(key) => req.query(&[("key", key.as_str())]),
        };
        let resp = req.send().context(SheetsRequestSnafu { sheet_id })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return SheetsStatusSnafu {
                sheet_id,
                status: status.as_u16(),
                body,
            }
            .fail();
        }
        let vr: ValueRange = resp.json().context(SheetsPayloadSnafu { sheet_id })?;
        rows_from_values(&vr.values)
    }
}

fn read_cell_json(v: &JSValue) -> CellValue {
    match v {
        JSValue::Null => CellValue::Empty,
        JSValue::String(s) if s.is_empty() => CellValue::Empty,
        JSValue::String(s) => CellValue::Text(s.clone()),
        JSValue::Bool(b) => CellValue::Bool(*b),
        JSValue::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
        },
        other => CellValue::Text(other.to_string()),
    }
}

/// The first row of the value range is the header, the others are the records.
pub fn rows_from_values(values: &[Vec<JSValue>]) -> Result<Vec<RawRow>, SourceError> {
    let (header, body) = match values.split_first() {
        Some((h, b)) => (h, b),
        None => return Ok(Vec::new()),
    };
    let header: Vec<CellValue> = header.iter().map(read_cell_json).collect();
    let body = body
        .iter()
        .map(|cells| cells.iter().map(read_cell_json).collect::<Vec<_>>());
    rows_from_grid(&header, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_range_to_rows() {
        let payload = json!({
            "range": "Form Responses 1!A1:D3",
            "majorDimension": "ROWS",
            "values": [
                ["Timestamp", "Survey Wave", "Score", "Feedback"],
                [45292.5, "W1", 9, "Great"],
                [45293.25, "W1", 7.5]
            ]
        });
        let vr: ValueRange = serde_json::from_value(payload).unwrap();
        let rows = rows_from_values(&vr.values).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Score"), Some(&CellValue::Int(9)));
        assert_eq!(rows[1].get("Score"), Some(&CellValue::Float(7.5)));
        assert_eq!(rows[1].get("Feedback"), Some(&CellValue::Empty));
        assert_eq!(
            rows[0].get("Survey Wave"),
            Some(&CellValue::Text("W1".to_string()))
        );
    }

    #[test]
    fn empty_value_range() {
        let vr: ValueRange = serde_json::from_str(r#"{"range": "A1:B2"}"#).unwrap();
        assert!(rows_from_values(&vr.values).unwrap().is_empty());
    }

    #[test]
    fn values_url_uses_the_range() {
        let config = PipelineConfig {
            sheets_api_base: "http://localhost:9999/".to_string(),
            ..PipelineConfig::default()
        };
        let reader =
            GoogleSheetsReader::new(&config, SheetsAuth::ApiKey("k".to_string())).unwrap();
        assert_eq!(
            reader.values_url("abc"),
            "http://localhost:9999/v4/spreadsheets/abc/values/A:ZZ"
        );
    }
}
