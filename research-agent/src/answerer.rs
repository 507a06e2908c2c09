//! Tool-augmented answering of sub-questions with the search model

use research_core::{QaPair, ResearchResult, SubQuestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::agent::ResearchAgent;
use crate::client::SearchSettings;
use crate::config::ModelRole;
use crate::sources::extract_images;
use crate::tools::ToolExecutionRecord;

/// Output-token ceiling for the research-data gathering call
pub const RESEARCH_DATA_MAX_TOKENS: u32 = 8192;

/// Tool metadata the search model attached to one completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResults {
    pub executed_tools: Option<Vec<ToolExecutionRecord>>,
    /// Raw `search_results.images` entries across all search tools
    #[serde(default)]
    pub images: Vec<Value>,
}

impl ToolResults {
    fn from_tools(executed_tools: Option<Vec<ToolExecutionRecord>>) -> Self {
        let images = executed_tools
            .as_deref()
            .map(extract_images)
            .unwrap_or_default();
        Self {
            executed_tools,
            images,
        }
    }

    pub fn tools(&self) -> &[ToolExecutionRecord] {
        self.executed_tools.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    pub question_num: usize,
    pub total: usize,
    pub tool_results: ToolResults,
}

impl AnsweredQuestion {
    pub fn qa_pair(&self) -> QaPair {
        QaPair {
            question: self.question.clone(),
            answer: self.answer.clone(),
        }
    }
}

/// Free-text research notes gathered by the search model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchData {
    pub text: String,
    pub tool_results: ToolResults,
}

impl ResearchAgent {
    /// Answer one sub-question with the search model, citing sources as markdown links
    #[instrument(skip(self, query), fields(question_num = question.index, total = question.total))]
    pub async fn answer_question(
        &self,
        query: &str,
        question: &SubQuestion,
    ) -> ResearchResult<AnsweredQuestion> {
        let prompt = format!(
            r#"You are a knowledgeable research assistant. You MUST call a search tool. Please answer the following question
based on the context of this research query: "{}"

Question: {}

Provide a factual answer with relevant information. Include sources or data if available.
VERY IMPORTANT: When citing sources, include hyperlinks to those sources in your answer.
Use the format [Source Name](URL) for all citations.
Focus on accuracy and relevance to the research topic."#,
            query, question.text
        );

        let request = self
            .request(ModelRole::Search, prompt)
            .with_search_settings(self.search_settings());

        let completion = self.call(request).await?;
        let answer = completion.content()?;
        let tool_results = ToolResults::from_tools(completion.executed_tools());

        debug!(
            "Answered question {}/{} with {} tool records",
            question.index,
            question.total,
            tool_results.tools().len()
        );

        Ok(AnsweredQuestion {
            question: question.text.clone(),
            answer,
            question_num: question.index,
            total: question.total,
            tool_results,
        })
    }

    /// Gather broad, citation-heavy research notes for the query
    #[instrument(skip(self, query, qa_pairs), fields(pairs = qa_pairs.len()))]
    pub async fn gather_research_data(
        &self,
        query: &str,
        qa_pairs: &[QaPair],
    ) -> ResearchResult<ResearchData> {
        let mut context = format!("Main Query: {}\n\nAdditional Information:\n", query);
        for (i, qa) in qa_pairs.iter().enumerate() {
            context.push_str(&format!(
                "{}. Question: {}\nAnswer: {}\n\n",
                i + 1,
                qa.question,
                qa.answer
            ));
        }

        let prompt = format!(
            r#"You are a research assistant tasked with gathering detailed research data.
I need you to search for information related to this research query and the follow-up questions.

{}

Gather comprehensive research data with these requirements:
1. Search for relevant facts, statistics, and information
2. Find authoritative sources for each piece of information
3. VERY IMPORTANT: Include HYPERLINKED citations for ALL information using markdown format: [Source Name](URL)
4. Gather diverse perspectives on the topic
5. Focus on recent and reliable information
6. Structure information clearly with headings when appropriate

For EACH piece of information, follow this pattern:
- State the fact or information clearly
- Provide the source with a hyperlink: [Source Name](URL)
- Add brief context about why this information is relevant

Format your response in clear sections based on different aspects of the topic."#,
            context
        );

        let request = self
            .request(ModelRole::Search, prompt)
            .with_max_tokens(RESEARCH_DATA_MAX_TOKENS)
            .with_search_settings(self.search_settings());

        let completion = self.call(request).await?;

        Ok(ResearchData {
            text: completion.content()?,
            tool_results: ToolResults::from_tools(completion.executed_tools()),
        })
    }

    fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            include_images: self.include_images(),
        }
    }
}
