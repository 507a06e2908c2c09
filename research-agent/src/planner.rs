//! Question planning: decompose a query into research sub-questions

use research_core::{ResearchResult, MAX_SUB_QUESTIONS};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::agent::ResearchAgent;
use crate::config::ModelRole;

impl ResearchAgent {
    /// Generate up to [`MAX_SUB_QUESTIONS`] research questions for a query
    ///
    /// A model call failure is returned as an error. A response that cannot be
    /// read as a JSON array yields an empty list instead.
    #[instrument(skip(self))]
    pub async fn generate_follow_up_questions(&self, query: &str) -> ResearchResult<Vec<String>> {
        let prompt = format!(
            r#"Based on the following research query, generate 3 specific research questions
that would help gather comprehensive information that would fully answer this question.
The questions should explore different aspects of the topic and help elicit detailed information.
Ensure the questions in their totality would fully answer the research query and are a little broad.
The questions should not be too specific, but rather general and short enough to be answered with the research query.
Never return more than 5 questions.

Research Query: {}

Format your response as a JSON array of 3 questions only. No preamble or explanation.
Example: ["Question 1?", "Question 2?", "Question 3?"]"#,
            query
        );

        let completion = self.call(self.request(ModelRole::Reasoning, prompt)).await?;
        let content = completion.content()?;

        let questions = parse_questions(&content);
        if questions.is_empty() {
            warn!("Planner response held no usable questions; continuing without sub-questions");
        } else {
            info!("Planned {} sub-questions", questions.len());
        }

        Ok(questions)
    }
}

/// Parse the whole response as a JSON array
pub fn parse_strict(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text.trim()).ok()? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Parse the greedy span from the first `[` to the last `]` as a JSON array
pub fn extract_bracketed_array(text: &str) -> Option<Vec<Value>> {
    let pattern = regex::Regex::new(r"(?s)\[.*\]").ok()?;
    let span = pattern.find(text)?;
    parse_strict(span.as_str())
}

/// Question texts from a planner response, capped at [`MAX_SUB_QUESTIONS`]
///
/// Non-string entries are skipped. Never fails: unreadable input gives an empty list.
pub fn parse_questions(text: &str) -> Vec<String> {
    let items = parse_strict(text)
        .or_else(|| extract_bracketed_array(text))
        .unwrap_or_default();

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(question) => Some(question.trim().to_string()),
            _ => None,
        })
        .filter(|question| !question.is_empty())
        .take(MAX_SUB_QUESTIONS)
        .collect()
}
