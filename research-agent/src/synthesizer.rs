//! Long-form report synthesis with the reasoning model

use research_core::{QaPair, ResearchResult};
use tracing::{info, instrument};

use crate::agent::ResearchAgent;
use crate::config::ModelRole;

/// Output-token ceiling for the report call
pub const REPORT_MAX_TOKENS: u32 = 8192;

/// Context block interleaving `Q{n}`/`A{n}` pairs, with research data appended when non-blank
pub fn build_report_context(
    query: &str,
    qa_pairs: &[QaPair],
    research_data: Option<&str>,
) -> String {
    let mut context = format!(
        "Research Query: {}\n\nResearch Questions and Answers:\n",
        query
    );

    for (i, qa) in qa_pairs.iter().enumerate() {
        context.push_str(&format!(
            "Q{n}: {}\nA{n}: {}\n\n",
            qa.question,
            qa.answer,
            n = i + 1
        ));
    }

    if let Some(data) = research_data.filter(|data| !data.trim().is_empty()) {
        context.push_str(&format!("\nResearch Data:\n{}\n\n", data));
    }

    context
}

impl ResearchAgent {
    /// Write the markdown report
    ///
    /// The structure is requested, not checked: callers must cope with a
    /// report that lacks the expected headings.
    #[instrument(skip(self, query, qa_pairs, research_data), fields(pairs = qa_pairs.len()))]
    pub async fn generate_complete_report(
        &self,
        query: &str,
        qa_pairs: &[QaPair],
        research_data: Option<&str>,
    ) -> ResearchResult<String> {
        let context = build_report_context(query, qa_pairs, research_data);

        let prompt = format!(
            r#"You are tasked with writing a comprehensive research report based on the provided information.

{}

Create a complete, well-structured research report with these sections:

1. A descriptive, professional title for the report (7-12 words)
2. An executive summary (2-3 paragraphs)
3. 4-6 main content sections that cover different aspects of the topic
4. A conclusion section

Requirements:
- Structure each section with appropriate headers using markdown (# for title, ## for major sections, ### for subsections)
- Include factual information with HYPERLINKED CITATIONS using markdown format: [Source Name](URL)
- Integrate information from the Research questions/answers
- Provide your own analysis and insights in addition to the facts
- Use academic, professional language throughout
- Each section should have substantial content (3-4 paragraphs)
- End with a conclusion that summarizes key findings and suggests areas for future research

Format your response using proper markdown, with clear section breaks."#,
            context
        );

        let request = self
            .request(ModelRole::Reasoning, prompt)
            .with_max_tokens(REPORT_MAX_TOKENS);

        let report = self.call(request).await?.content()?;
        info!("Synthesized report ({} characters)", report.len());

        Ok(report)
    }
}
