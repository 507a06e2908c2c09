//! Scripted chat model for tests
//!
//! Replies are chosen from the prompt: planner, report and research-data
//! prompts each have a fixed reply, and answer prompts are matched on their
//! `Question: ` line.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use research_core::{ResearchError, ResearchResult};
use serde_json::{json, Value};

use crate::client::{ChatModel, ChatRequest, Completion};

#[derive(Debug, Clone)]
enum Reply {
    Content { text: String, tools: Option<Value> },
    Fail(String),
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply::Content {
            text: text.into(),
            tools: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedAnswer {
    reply: Reply,
    delay: Duration,
}

/// A [`ChatModel`] that answers from a script and records every request
#[derive(Debug)]
pub struct ScriptedModel {
    planner: Reply,
    planner_delay: Duration,
    report: Reply,
    report_delay: Duration,
    research_data: Reply,
    answers: HashMap<String, ScriptedAnswer>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            planner: Reply::text(r#"["Question one?", "Question two?", "Question three?"]"#),
            planner_delay: Duration::ZERO,
            report: Reply::text("# Scripted Research Report\n\n## Executive Summary\n\nSummary."),
            report_delay: Duration::ZERO,
            research_data: Reply::text("Scripted research data."),
            answers: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_planner(mut self, response: &str) -> Self {
        self.planner = Reply::text(response);
        self
    }

    pub fn fail_planner(mut self, message: &str) -> Self {
        self.planner = Reply::Fail(message.to_string());
        self
    }

    pub fn with_planner_delay(mut self, delay: Duration) -> Self {
        self.planner_delay = delay;
        self
    }

    pub fn with_report_delay(mut self, delay: Duration) -> Self {
        self.report_delay = delay;
        self
    }

    pub fn with_report(mut self, report: &str) -> Self {
        self.report = Reply::text(report);
        self
    }

    pub fn fail_report(mut self, message: &str) -> Self {
        self.report = Reply::Fail(message.to_string());
        self
    }

    pub fn with_research_data(mut self, text: &str) -> Self {
        self.research_data = Reply::text(text);
        self
    }

    /// Script the answer for a question; `tools` is placed at `message.executed_tools`
    pub fn with_answer(mut self, question: &str, answer: &str, tools: Value) -> Self {
        let tools = (!tools.is_null()).then_some(tools);
        self.answers.insert(
            question.to_string(),
            ScriptedAnswer {
                reply: Reply::Content {
                    text: answer.to_string(),
                    tools,
                },
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn fail_answer(mut self, question: &str, message: &str) -> Self {
        self.answers.insert(
            question.to_string(),
            ScriptedAnswer {
                reply: Reply::Fail(message.to_string()),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Delay the reply for a question, to make answers finish out of order
    pub fn with_answer_delay(mut self, question: &str, delay: Duration) -> Self {
        self.answers
            .entry(question.to_string())
            .or_insert_with(|| ScriptedAnswer {
                reply: Reply::text(default_answer(question)),
                delay: Duration::ZERO,
            })
            .delay = delay;
        self
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn script_for(&self, prompt: &str) -> (Reply, Duration) {
        if prompt.contains("generate 3 specific research questions") {
            return (self.planner.clone(), self.planner_delay);
        }
        if prompt.contains("writing a comprehensive research report") {
            return (self.report.clone(), self.report_delay);
        }
        if prompt.contains("gathering detailed research data") {
            return (self.research_data.clone(), Duration::ZERO);
        }

        let question = question_line(prompt).unwrap_or_default();
        match self.answers.get(question) {
            Some(scripted) => (scripted.reply.clone(), scripted.delay),
            None => (Reply::text(default_answer(question)), Duration::ZERO),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> ResearchResult<Completion> {
        let (reply, delay) = self.script_for(request.prompt());
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Fail(message) => Err(ResearchError::api(message)),
            Reply::Content { text, tools } => {
                let mut message = json!({"role": "assistant", "content": text});
                if let Some(tools) = tools {
                    message["executed_tools"] = tools;
                }
                Ok(Completion::new(json!({"choices": [{"message": message}]})))
            }
        }
    }
}

fn question_line(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("Question: "))
        .map(str::trim)
}

fn default_answer(question: &str) -> String {
    format!("Scripted answer to: {}", question)
}
