//! Final report assembly and markdown export

use std::fs;
use std::path::{Path, PathBuf};

use research_core::{QaPair, ResearchError};
use tracing::info;

pub const QA_SECTION_HEADING: &str = "## Questions and Detailed Answers";

const DEFAULT_TITLE: &str = "Research Report";

/// The "Questions and Detailed Answers" section appended after the model's report
///
/// Built from the pairs themselves so it is present even when synthesis
/// produced no usable structure.
pub fn qa_appendix(qa_pairs: &[QaPair]) -> String {
    let mut section = format!("\n\n{}\n\n", QA_SECTION_HEADING);
    for qa in qa_pairs {
        section.push_str(&format!("### Q: {}\n\n{}\n\n", qa.question, qa.answer));
    }
    section
}

/// Title from a leading `# ` line, or a generic title
pub fn report_title(report: &str) -> String {
    report
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

/// Markdown filename derived from the report title
pub fn report_filename(report: &str) -> String {
    let clean: String = report_title(report)
        .chars()
        .filter(|c| !matches!(c, ':' | '?' | '!' | ',' | ';' | '/' | '\\'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    format!("{}.md", clean)
}

/// Write the report into `dir` and return the file path
pub fn save_report(dir: &Path, report: &str) -> Result<PathBuf, ResearchError> {
    fs::create_dir_all(dir).map_err(|e| {
        ResearchError::internal(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let path = dir.join(report_filename(report));
    info!("Saving report to: {}", path.display());

    fs::write(&path, report).map_err(|e| {
        ResearchError::internal(format!("Failed to write {}: {}", path.display(), e))
    })?;

    Ok(path)
}
