// Client for the generateContent endpoint of the Gemini API.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::survey::*;

pub const API_KEY_VAR: &str = "GEMINI_KEY";

pub struct GeminiClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &PipelineConfig, api_key: String) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context(GenerationClientSnafu)?;
        Ok(GeminiClient {
            http,
            api_base: config.generator_api_base.trim_end_matches('/').to_string(),
            model: config.generator_model.clone(),
            api_key,
        })
    }

    pub fn from_env(config: &PipelineConfig) -> Result<Self, GenerationError> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.is_empty() => GeminiClient::new(config, key),
            _ => MissingApiKeySnafu { var: API_KEY_VAR }.fail(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

// The text parts of the first candidate, joined.
fn completion_text(resp: &GenerateResponse) -> Option<String> {
    let content = resp.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.endpoint();
        debug!("GeminiClient: POST {}", url);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .context(GenerationRequestSnafu {
                model: self.model.clone(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return GenerationStatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }
        let parsed: GenerateResponse = resp.json().context(GenerationPayloadSnafu)?;
        completion_text(&parsed).context(EmptyCompletionSnafu)
    }
}
