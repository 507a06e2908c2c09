//! Tool-execution metadata attached to search-model completions
//!
//! The search model reports the tools it ran, but the list can sit at one of
//! several places in the raw completion depending on the upstream version.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation performed by the search model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// JSON-encoded string or object, usually `{"query": ...}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Plain-text search output or a structured object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Value>,
}

impl ToolExecutionRecord {
    pub fn is_search(&self) -> bool {
        self.kind.as_deref() == Some("search")
    }

    /// The output as text; structured outputs are rendered as JSON
    pub fn output_text(&self) -> Option<String> {
        match self.output.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The `query` argument, whether arguments arrived as an object or a JSON string
    pub fn query_argument(&self) -> Option<String> {
        let query = match self.arguments.as_ref()? {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()?
                .get("query")?
                .as_str()?
                .to_string(),
            Value::Object(map) => map.get("query")?.as_str()?.to_string(),
            _ => return None,
        };

        let query = query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }

    /// Entries under `search_results.images`, verbatim
    pub fn images(&self) -> Vec<Value> {
        self.search_results
            .as_ref()
            .and_then(|results| results.get("images"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Find the executed-tool list in a raw completion
///
/// Locations are checked in order and the first non-null one wins:
/// `choices[0].message.executed_tools`, `choices[0].message.tool_results.executed_tools`,
/// `choices[0].executed_tools`, then the top-level `executed_tools`.
/// Entries that do not look like tool records are dropped.
pub fn resolve_executed_tools(completion: &Value) -> Option<Vec<ToolExecutionRecord>> {
    const LOCATIONS: [&str; 4] = [
        "/choices/0/message/executed_tools",
        "/choices/0/message/tool_results/executed_tools",
        "/choices/0/executed_tools",
        "/executed_tools",
    ];

    let found = LOCATIONS
        .iter()
        .filter_map(|pointer| completion.pointer(pointer))
        .find(|value| !value.is_null())?;

    let records = found
        .as_array()?
        .iter()
        .filter_map(|entry| serde_json::from_value::<ToolExecutionRecord>(entry.clone()).ok())
        .collect();

    Some(records)
}
