//! Deep Research Agent
//!
//! This crate provides the model-calling stages of the research pipeline:
//! question planning with the reasoning model, tool-augmented answering with
//! the search model, source and image aggregation from tool metadata, and
//! long-form report synthesis.

pub mod agent;
pub mod answerer;
pub mod client;
pub mod config;
pub mod planner;
pub mod sources;
pub mod synthesizer;
pub mod tools;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use agent::ResearchAgent;
pub use answerer::{AnsweredQuestion, ResearchData, ToolResults};
pub use client::{ChatMessage, ChatModel, ChatRequest, Completion, GroqClient, SearchSettings};
pub use config::{ModelConfig, ModelRole};
pub use planner::{extract_bracketed_array, parse_questions, parse_strict};
pub use sources::{
    extract_images, extract_source_urls, fallback_search_url, ImageSet, SourceSet, UrlSet,
};
pub use synthesizer::build_report_context;
pub use tools::{resolve_executed_tools, ToolExecutionRecord};
