//! Service layer for the Deep Research pipeline
//!
//! This crate sequences the agent's stages into one streamed research run,
//! assembles the final report and encodes events as server-sent event frames.

pub mod config;
pub mod report;
pub mod research_service;
pub mod sse;

pub use config::PipelineConfig;
pub use report::{qa_appendix, report_filename, report_title, save_report, QA_SECTION_HEADING};
pub use research_service::{EventSink, ResearchService};
pub use sse::{event_stream, SseFrame};
