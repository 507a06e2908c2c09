//! Progress event types streamed to research clients
//!
//! These types define the JSON payloads carried in each server-sent event.
//! A run emits any number of `progress` and `sources_update` events and is
//! terminated by exactly one `complete` or `error` event.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::QaPair;

// ============================================================================
// Pipeline Steps
// ============================================================================

/// Pipeline stage a progress event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FollowUpQuestions,
    AnsweringQuestions,
    ResearchData,
    FinalReport,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::FollowUpQuestions => "follow_up_questions",
            Step::AnsweringQuestions => "answering_questions",
            Step::ResearchData => "research_data",
            Step::FinalReport => "final_report",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Wall-clock measurement for one finished step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTiming {
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl StepTiming {
    pub fn finished_now(duration: Duration) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            completed_at: Utc::now(),
        }
    }
}

/// Per-step timings keyed by step name, plus a `total` entry once the run ends.
///
/// Purely observational: nothing in the pipeline branches on these values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timings(IndexMap<String, StepTiming>);

impl Timings {
    pub const TOTAL: &'static str = "total";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step, duration: Duration) {
        self.0
            .insert(step.as_str().to_string(), StepTiming::finished_now(duration));
    }

    pub fn record_total(&mut self, duration: Duration) {
        self.0
            .insert(Self::TOTAL.to_string(), StepTiming::finished_now(duration));
    }

    pub fn get(&self, key: &str) -> Option<&StepTiming> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ============================================================================
// Server -> Client Events
// ============================================================================

/// Payload of a single server-sent event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// A stage started or advanced
    Progress {
        step: Step,
        message: String,
        /// Fraction in [0, 1], only reported while answering
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timings: Option<Timings>,
    },
    /// New source URLs were discovered
    SourcesUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<Step>,
        sources: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
    },
    /// The report is finished; terminal
    Complete {
        report: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timings: Option<Timings>,
        #[serde(default)]
        qa_pairs: Vec<QaPair>,
    },
    /// The run failed; terminal
    Error { message: String },
}

impl ResearchEvent {
    /// Plain progress notification without snapshots attached
    pub fn progress(step: Step, message: impl Into<String>) -> Self {
        ResearchEvent::Progress {
            step,
            message: message.into(),
            progress: None,
            sources: None,
            images: None,
            timings: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResearchEvent::Error {
            message: message.into(),
        }
    }

    /// Value of the `status` tag
    pub fn status(&self) -> &'static str {
        match self {
            ResearchEvent::Progress { .. } => "progress",
            ResearchEvent::SourcesUpdate { .. } => "sources_update",
            ResearchEvent::Complete { .. } => "complete",
            ResearchEvent::Error { .. } => "error",
        }
    }

    /// `complete` and `error` end a run; nothing may follow them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchEvent::Complete { .. } | ResearchEvent::Error { .. }
        )
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            ResearchEvent::Progress { step, .. } => Some(*step),
            ResearchEvent::SourcesUpdate { step, .. } => *step,
            _ => None,
        }
    }
}
