// Summary of a feedback bundle by a text generation service.

use serde::{Deserialize, Serialize};

use crate::survey::*;

/// At most this many aspects are kept on each side of the summary.
pub const MAX_ASPECTS: usize = 5;

/// Length of the service output quoted in errors.
pub const EXCERPT_LEN: usize = 200;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AspectEntry {
    pub aspect: String,
    pub explanation: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryResult {
    pub positive_aspects: Vec<AspectEntry>,
    pub improvements_needed: Vec<AspectEntry>,
}

/// The text completion capability of a generation service.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

const RUBRIC: &str = "You are analyzing the answers to a program feedback survey. \
The answers are grouped by question in the JSON document below.

List exactly 5 positive aspects of the program and exactly 5 aspects that need improvement. \
Describe each aspect with the format: aspect: example-quote – one-sentence explanation. \
The example quote must come from the answers.

Your final answer must be a single JSON object with the keys \"positive_aspects\" and \
\"improvements_needed\". Each key holds a list of objects with the keys \"aspect\" and \
\"explanation\".";

/// The prompt for a bundle. Same bundle, same prompt.
pub fn build_prompt(bundle: &FeedbackBundle) -> PResult<String> {
    let js = serde_json::to_string_pretty(bundle).context(SerializingArtifactSnafu {
        path: "<prompt>",
    })?;
    Ok(format!("{}\n\nSurvey answers:\n```json\n{}\n```\n", RUBRIC, js))
}

/// The first characters of a text, for error messages.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_LEN).collect()
}

// The span between the first opening brace and the last closing brace.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start > end {
        return None;
    }
    Some(&text[start..=end])
}

fn cap_aspects(side: &str, mut entries: Vec<AspectEntry>) -> Vec<AspectEntry> {
    if entries.len() > MAX_ASPECTS {
        warn!(
            "parse_summary: {} {} returned, keeping the first {}",
            entries.len(),
            side,
            MAX_ASPECTS
        );
        entries.truncate(MAX_ASPECTS);
    }
    entries
}

/// Reads the summary out of the free text returned by the service.
///
/// The JSON object is taken between the first `{` and the last `}` of the text.
/// Nothing is recovered from a partially valid object.
pub fn parse_summary(text: &str) -> PResult<SummaryResult> {
    let span = json_span(text).context(NoStructuredOutputSnafu {
        excerpt: excerpt(text),
    })?;
    let parsed: SummaryResult = serde_json::from_str(span).context(MalformedSummarySnafu {
        excerpt: excerpt(span),
    })?;
    Ok(SummaryResult {
        positive_aspects: cap_aspects("positive aspects", parsed.positive_aspects),
        improvements_needed: cap_aspects("improvements", parsed.improvements_needed),
    })
}

pub fn summarize_bundle(
    bundle: &FeedbackBundle,
    generator: &dyn TextGenerator,
) -> PResult<SummaryResult> {
    let prompt = build_prompt(bundle)?;
    debug!("summarize_bundle: prompt of {} bytes", prompt.len());
    let completion = generator
        .generate(&prompt)
        .context(GenerationUnavailableSnafu)?;
    debug!("summarize_bundle: completion: {:?}", excerpt(&completion));
    let summary = parse_summary(&completion)?;
    info!(
        "summarize_bundle: {} positive aspects, {} improvements",
        summary.positive_aspects.len(),
        summary.improvements_needed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::test_support::*;

    fn entry(aspect: &str, explanation: &str) -> AspectEntry {
        AspectEntry {
            aspect: aspect.to_string(),
            explanation: explanation.to_string(),
        }
    }

    #[test]
    fn parse_embedded_object() {
        let text = "blah {\"positive_aspects\":[{\"aspect\":\"A\",\"explanation\":\"E\"}],\"improvements_needed\":[]} trailing";
        let res = parse_summary(text).unwrap();
        assert_eq!(res.positive_aspects, vec![entry("A", "E")]);
        assert!(res.improvements_needed.is_empty());
    }

    #[test]
    fn parse_inside_code_fence_and_extra_keys() {
        let text = r#"```json
{"positive_aspects": [{"aspect": "Mentors", "explanation": "Always there", "quote": "x"}],
 "improvements_needed": [{"aspect": "Rooms", "explanation": "Too cold"}]}
```"#;
        let res = parse_summary(text).unwrap();
        assert_eq!(res.positive_aspects, vec![entry("Mentors", "Always there")]);
        assert_eq!(res.improvements_needed, vec![entry("Rooms", "Too cold")]);
    }

    #[test]
    fn no_braces() {
        for text in ["no json at all", "} reversed {", ""] {
            assert!(matches!(
                parse_summary(text),
                Err(PipelineError::NoStructuredOutput { .. })
            ));
        }
    }

    #[test]
    fn malformed_object() {
        let texts = [
            "{not json}",
            r#"{"positive_aspects": []}"#,
            r#"{"positive_aspects": [{"aspect": "A"}], "improvements_needed": []}"#,
        ];
        for text in texts {
            assert!(matches!(
                parse_summary(text),
                Err(PipelineError::MalformedSummary { .. })
            ));
        }
    }

    #[test]
    fn excerpt_is_bounded() {
        let long = format!("{{{}", "x".repeat(1000));
        match parse_summary(&long) {
            Err(PipelineError::NoStructuredOutput { excerpt }) => {
                assert_eq!(excerpt.chars().count(), EXCERPT_LEN)
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn extra_aspects_are_dropped() {
        let many: Vec<AspectEntry> = (0..7)
            .map(|i| entry(&format!("A{}", i), "E"))
            .collect();
        let text = serde_json::to_string(&SummaryResult {
            positive_aspects: many,
            improvements_needed: vec![entry("I", "E")],
        })
        .unwrap();
        let res = parse_summary(&text).unwrap();
        assert_eq!(res.positive_aspects.len(), MAX_ASPECTS);
        assert_eq!(res.positive_aspects[4].aspect, "A4");
        assert_eq!(res.improvements_needed.len(), 1);
    }

    #[test]
    fn prompt_is_deterministic_and_embeds_the_bundle() {
        let bundle = FeedbackBundle {
            engineer_feedback: vec!["The mentors were excellent".to_string()],
            ..FeedbackBundle::default()
        };
        let p1 = build_prompt(&bundle).unwrap();
        let p2 = build_prompt(&bundle).unwrap();
        assert_eq!(p1, p2);
        assert!(p1.contains("The mentors were excellent"));
        assert!(p1.contains("positive_aspects"));
        assert!(p1.contains("improvements_needed"));
        assert!(p1.contains("aspect: example-quote – one-sentence explanation"));
        assert!(p1.contains(&serde_json::to_string_pretty(&bundle).unwrap()));
    }

    #[test]
    fn generator_failures_are_reported() {
        let res = summarize_bundle(&FeedbackBundle::default(), &FailingGenerator {});
        assert!(matches!(
            res,
            Err(PipelineError::GenerationUnavailable { .. })
        ));
    }
}
