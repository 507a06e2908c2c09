//! Core types for the Deep Research pipeline
//!
//! This crate defines the shared data structures used across the pipeline,
//! including the error taxonomy, sub-questions, answered pairs and the
//! progress events streamed to clients.

pub mod error;
pub mod event;
pub mod research;

pub use error::{ResearchError, ResearchResult};
pub use event::{ResearchEvent, Step, StepTiming, Timings};
pub use research::{QaPair, SubQuestion, MAX_SUB_QUESTIONS};
