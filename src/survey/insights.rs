// Keyword statistics over a feedback bundle. No external service involved.

use std::collections::HashMap;

use serde::Serialize;

use crate::survey::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Frequency {
    pub label: String,
    pub count: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct ImprovementSummary {
    pub most_common: Vec<Frequency>,
    pub total_suggestions: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct FeedbackInsights {
    pub sentiment_analysis: SentimentCounts,
    pub topic_frequencies: Vec<Frequency>,
    pub most_liked_aspect: Option<String>,
    pub program_improvements: ImprovementSummary,
    pub engineer_improvements: ImprovementSummary,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

pub fn classify_sentiment(comment: &str) -> Sentiment {
    let lower = comment.to_lowercase();
    if lower.contains("good") || lower.contains("excellent") {
        Sentiment::Positive
    } else if lower.contains("bad") || lower.contains("poor") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn count_sentiment(comments: &[String]) -> SentimentCounts {
    let mut res = SentimentCounts::default();
    for c in comments.iter() {
        match classify_sentiment(c) {
            Sentiment::Positive => res.positive += 1,
            Sentiment::Negative => res.negative += 1,
            Sentiment::Neutral => res.neutral += 1,
        }
    }
    res
}

// Counts in order of first appearance.
fn count_in_order<'a, I>(items: I) -> Vec<Frequency>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut res: Vec<Frequency> = Vec::new();
    for item in items {
        match index.get(item) {
            Some(idx) => res[*idx].count += 1,
            None => {
                index.insert(item, res.len());
                res.push(Frequency {
                    label: item.to_string(),
                    count: 1,
                });
            }
        }
    }
    res
}

fn topic_frequencies(topics: &[String]) -> Vec<Frequency> {
    let lowered: Vec<String> = topics
        .iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    let mut res = count_in_order(lowered.iter().map(|s| s.as_str()));
    res.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    res
}

fn most_liked(likings: &[String]) -> Option<String> {
    let counts = count_in_order(likings.iter().map(|s| s.as_str()));
    // The first maximum wins ties.
    let mut best: Option<&Frequency> = None;
    for f in counts.iter() {
        match best {
            Some(b) if b.count >= f.count => {}
            _ => best = Some(f),
        }
    }
    best.map(|f| f.label.clone())
}

fn summarize_improvements(suggestions: &[String]) -> ImprovementSummary {
    let mut most_common = count_in_order(suggestions.iter().map(|s| s.as_str()));
    // Stable sort: equal counts keep the order of first appearance.
    most_common.sort_by(|a, b| b.count.cmp(&a.count));
    ImprovementSummary {
        most_common,
        total_suggestions: suggestions.len(),
    }
}

pub fn analyze_feedback(bundle: &FeedbackBundle) -> FeedbackInsights {
    let res = FeedbackInsights {
        sentiment_analysis: count_sentiment(&bundle.engineer_feedback),
        topic_frequencies: topic_frequencies(&bundle.topics_learned),
        most_liked_aspect: most_liked(&bundle.program_likings),
        program_improvements: summarize_improvements(&bundle.program_improvements),
        engineer_improvements: summarize_improvements(&bundle.engineer_improvements),
    };
    info!(
        "analyze_feedback: sentiment {:?}, {} topics, most liked {:?}",
        res.sentiment_analysis,
        res.topic_frequencies.len(),
        res.most_liked_aspect
    );
    res
}
