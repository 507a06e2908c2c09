//! Source and image aggregation from search-tool records

use indexmap::IndexSet;
use serde_json::Value;

use crate::tools::ToolExecutionRecord;

/// Search URL used when a search tool reported no result URLs
const FALLBACK_SEARCH_BASE: &str = "https://www.google.com/search?q=";

const URL_LINE_PREFIX: &str = "URL: ";

/// Insertion-ordered set of unique URLs that only ever grows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSet(IndexSet<String>);

/// Source URLs collected across a research run
pub type SourceSet = UrlSet;

/// Image URLs collected across a research run
pub type ImageSet = UrlSet;

impl UrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every candidate not already present; returns the ones that were new
    pub fn extend_new<I>(&mut self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates
            .into_iter()
            .map(|candidate| candidate.trim().to_string())
            .filter(|candidate| !candidate.is_empty())
            .filter(|candidate| self.0.insert(candidate.clone()))
            .collect()
    }

    /// Add raw image entries, keeping string entries and the `url` of object entries
    pub fn extend_images(&mut self, images: &[Value]) -> Vec<String> {
        self.extend_new(images.iter().filter_map(image_url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

/// Candidate source URLs from every search record, in record order
///
/// Duplicates are kept here; [`UrlSet::extend_new`] deduplicates.
pub fn extract_source_urls(tools: &[ToolExecutionRecord]) -> Vec<String> {
    tools
        .iter()
        .filter(|tool| tool.is_search())
        .flat_map(urls_for_tool)
        .collect()
}

/// Every `search_results.images` entry across all search records, not deduplicated
pub fn extract_images(tools: &[ToolExecutionRecord]) -> Vec<Value> {
    tools
        .iter()
        .filter(|tool| tool.is_search())
        .flat_map(|tool| tool.images())
        .collect()
}

/// A web-search URL for the given query
pub fn fallback_search_url(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{}{}", FALLBACK_SEARCH_BASE, encoded)
}

fn urls_for_tool(tool: &ToolExecutionRecord) -> Vec<String> {
    let mut urls = tool
        .output_text()
        .map(|text| urls_from_output(&text))
        .unwrap_or_default();

    if urls.is_empty() {
        if let Some(query) = tool.query_argument() {
            urls.push(fallback_search_url(&query));
        }
    }

    urls
}

/// `URL: ` lines first, then a pattern scan over the whole text
fn urls_from_output(text: &str) -> Vec<String> {
    let from_lines: Vec<String> = text
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(URL_LINE_PREFIX))
        .map(|rest| rest.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    if !from_lines.is_empty() {
        return from_lines;
    }

    scan_url_markers(text).unwrap_or_default()
}

fn scan_url_markers(text: &str) -> Option<Vec<String>> {
    let pattern = regex::Regex::new(r#"URL:\s*([^\s"'\\,}\]]+)"#).ok()?;
    Some(
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
    )
}

fn image_url(image: &Value) -> Option<String> {
    match image {
        Value::String(url) => Some(url.clone()),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("image_url"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search(output: Value) -> ToolExecutionRecord {
        ToolExecutionRecord {
            kind: Some("search".into()),
            output: Some(output),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_url_lines_collapse_in_set() {
        let tool = search(json!(
            "Title: A\nURL: https://a.example\nContent: ...\n\nTitle: A again\nURL: https://a.example\n"
        ));
        let candidates = extract_source_urls(&[tool]);
        assert_eq!(candidates.len(), 2);

        let mut sources = SourceSet::new();
        let added = sources.extend_new(candidates);
        assert_eq!(added, vec!["https://a.example".to_string()]);
        assert_eq!(sources.len(), 1);
        assert!(sources.contains("https://a.example"));
    }

    #[test]
    fn test_regex_fallback_when_no_url_lines() {
        let tool = search(json!({"results": [{"text": "see URL: https://b.example/page"}]}));
        assert_eq!(extract_source_urls(&[tool]), vec!["https://b.example/page"]);
    }

    #[test]
    fn test_query_fallback_when_output_has_no_urls() {
        let tool = ToolExecutionRecord {
            kind: Some("search".into()),
            output: Some(json!("nothing useful")),
            arguments: Some(json!("{\"query\": \"rust & tokio\"}")),
            ..Default::default()
        };
        assert_eq!(
            extract_source_urls(&[tool]),
            vec!["https://www.google.com/search?q=rust+%26+tokio"]
        );
    }

    #[test]
    fn test_non_search_tools_ignored() {
        let tool = ToolExecutionRecord {
            kind: Some("python".into()),
            output: Some(json!("URL: https://c.example")),
            ..Default::default()
        };
        assert!(extract_source_urls(&[tool.clone()]).is_empty());
        assert!(extract_images(&[tool]).is_empty());
    }

    #[test]
    fn test_empty_and_malformed_records() {
        assert!(extract_source_urls(&[]).is_empty());
        let empty = ToolExecutionRecord {
            kind: Some("search".into()),
            ..Default::default()
        };
        assert!(extract_source_urls(&[empty]).is_empty());

        let mut sources = SourceSet::new();
        assert!(sources.extend_new(vec![String::new(), "   ".into()]).is_empty());
        assert!(sources.is_empty());
    }

    #[test]
    fn test_images_concatenated_then_deduplicated_by_set() {
        let with_images = |images: Value| ToolExecutionRecord {
            kind: Some("search".into()),
            search_results: Some(json!({ "images": images })),
            ..Default::default()
        };
        let tools = vec![
            with_images(json!(["https://img.example/1.png", "https://img.example/2.png"])),
            with_images(json!(["https://img.example/1.png", {"url": "https://img.example/3.png"}, 7])),
        ];

        let raw = extract_images(&tools);
        assert_eq!(raw.len(), 5);

        let mut images = ImageSet::new();
        images.extend_images(&raw);
        assert_eq!(
            images.to_vec(),
            vec![
                "https://img.example/1.png",
                "https://img.example/2.png",
                "https://img.example/3.png"
            ]
        );
    }

    #[test]
    fn test_set_keeps_insertion_order_and_grows_only() {
        let mut sources = SourceSet::new();
        sources.extend_new(vec!["https://z.example".into(), "https://a.example".into()]);
        let added =
            sources.extend_new(vec!["https://a.example".into(), "https://m.example".into()]);
        assert_eq!(added, vec!["https://m.example"]);
        assert_eq!(
            sources.to_vec(),
            vec!["https://z.example", "https://a.example", "https://m.example"]
        );
    }
}
