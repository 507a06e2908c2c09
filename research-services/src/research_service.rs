//! Research service for streamed deep-research runs
//!
//! This service sequences the research agent's stages for one query and
//! reports each transition as a [`ResearchEvent`] on a channel:
//!
//! `follow_up_questions -> answering_questions -> final_report -> complete`
//!
//! `sources_update` events interleave with answering, and `error` can end the
//! run from any stage. Exactly one terminal event is sent per run.

use std::future::Future;
use std::time::Instant;

use research_agent::{
    extract_source_urls, AnsweredQuestion, ImageSet, ResearchAgent, ResearchData, SourceSet,
    ToolResults,
};
use research_core::{
    QaPair, ResearchError, ResearchEvent, ResearchResult, Step, SubQuestion, Timings,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::report::qa_appendix;

/// Channel capacity between a run and its HTTP stream
const EVENT_BUFFER: usize = 32;

/// Sending half of a run's event channel
///
/// A failed send means the client went away and is reported as
/// [`ResearchError::StreamClosed`] so the run stops.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ResearchEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ResearchEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: ResearchEvent) -> ResearchResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ResearchError::stream_closed("client disconnected"))
    }

    /// Resolves once the receiving side has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Await `work`, abandoning it if the client disconnects first
    pub async fn until_closed<T, F>(&self, work: F) -> ResearchResult<T>
    where
        F: Future<Output = ResearchResult<T>>,
    {
        tokio::select! {
            result = work => result,
            _ = self.closed() => Err(ResearchError::stream_closed("client disconnected")),
        }
    }
}

/// Service that runs research pipelines
#[derive(Debug, Clone)]
pub struct ResearchService {
    agent: ResearchAgent,
    config: PipelineConfig,
}

impl ResearchService {
    pub fn new(agent: ResearchAgent, config: PipelineConfig) -> Self {
        let agent = agent.with_images(config.include_images);
        Self { agent, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a run in the background and return its event stream
    pub fn start(&self, query: String) -> mpsc::Receiver<ResearchEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let service = self.clone();
        tokio::spawn(async move {
            service.run(&query, EventSink::new(tx)).await;
        });
        rx
    }

    /// Drive one run to its terminal event
    #[instrument(skip(self, sink))]
    pub async fn run(&self, query: &str, sink: EventSink) {
        let mut run = RunState::new();

        let terminal = match self.run_pipeline(query, &sink, &mut run).await {
            Ok(complete) => complete,
            Err(e) if e.is_stream_closed() => {
                info!("Client disconnected; research run abandoned");
                return;
            }
            Err(e) => {
                error!("Error in research process: {}", e);
                ResearchEvent::error(format!(
                    "An error occurred during the research process: {}",
                    e
                ))
            }
        };

        if sink.send(terminal).await.is_err() {
            warn!("Client disconnected before the final event was delivered");
        }
    }

    async fn run_pipeline(
        &self,
        query: &str,
        sink: &EventSink,
        run: &mut RunState,
    ) -> ResearchResult<ResearchEvent> {
        // Step 1: Plan sub-questions
        sink.send(ResearchEvent::progress(
            Step::FollowUpQuestions,
            "Generating follow-up questions...",
        ))
        .await?;

        let step_start = Instant::now();
        let questions = sink
            .until_closed(self.agent.generate_follow_up_questions(query))
            .await?;
        let questions = SubQuestion::from_texts(questions);
        run.timings.record(Step::FollowUpQuestions, step_start.elapsed());

        info!("Researching {} sub-questions", questions.len());

        // Step 2: Answer every sub-question concurrently
        let step_start = Instant::now();
        let total = questions.len();
        sink.send(run.progress(
            self,
            Step::AnsweringQuestions,
            format!("Answering {} research questions...", total),
            Some(0.0),
        ))
        .await?;

        let mut answers = AnswerTasks::spawn(&self.agent, query, &questions);

        let mut research_task = None;
        if self.config.gather_research_data {
            sink.send(run.progress(
                self,
                Step::ResearchData,
                "Gathering research data...",
                None,
            ))
            .await?;
            research_task = Some(AbortOnDrop(spawn_research_data(&self.agent, query)));
        }

        for completed in 1..=total {
            let answered = sink.until_closed(answers.next_in_order()).await?;

            run.qa_pairs.push(answered.qa_pair());
            if run.absorb(self, &answered.tool_results) {
                sink.send(run.sources_update(self, Step::AnsweringQuestions))
                    .await?;
            }

            sink.send(run.progress(
                self,
                Step::AnsweringQuestions,
                format!(
                    "Answered question {}/{}: {}",
                    completed, total, answered.question
                ),
                Some(completed as f64 / total as f64),
            ))
            .await?;
        }
        run.timings
            .record(Step::AnsweringQuestions, step_start.elapsed());

        let research_data = match research_task {
            Some(mut task) => {
                let data = sink
                    .until_closed(join_task(&mut task.0, "research data"))
                    .await?;
                if run.absorb(self, &data.tool_results) {
                    sink.send(run.sources_update(self, Step::ResearchData))
                        .await?;
                }
                run.timings.record(Step::ResearchData, step_start.elapsed());
                Some(data.text)
            }
            None => None,
        };

        // Step 3: Synthesize the report
        let step_start = Instant::now();
        sink.send(run.progress(
            self,
            Step::FinalReport,
            "Generating final report...",
            None,
        ))
        .await?;

        let report_content = sink
            .until_closed(self.agent.generate_complete_report(
                query,
                &run.qa_pairs,
                research_data.as_deref(),
            ))
            .await?;
        let report = report_content + &qa_appendix(&run.qa_pairs);

        run.timings.record(Step::FinalReport, step_start.elapsed());
        run.timings.record_total(run.started.elapsed());

        info!(
            "Research complete: {} answers, {} sources",
            run.qa_pairs.len(),
            run.sources.len()
        );

        Ok(ResearchEvent::Complete {
            report,
            sources: Some(run.sources.to_vec()),
            images: self.images_snapshot(&run.images),
            timings: Some(run.timings.clone()),
            qa_pairs: std::mem::take(&mut run.qa_pairs),
        })
    }

    fn images_snapshot(&self, images: &ImageSet) -> Option<Vec<String>> {
        self.config.include_images.then(|| images.to_vec())
    }
}

/// Per-run state; never shared between runs
struct RunState {
    started: Instant,
    qa_pairs: Vec<QaPair>,
    sources: SourceSet,
    images: ImageSet,
    timings: Timings,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            qa_pairs: Vec::new(),
            sources: SourceSet::new(),
            images: ImageSet::new(),
            timings: Timings::new(),
        }
    }

    /// Fold tool metadata into the source and image sets; true if a source was new
    ///
    /// New images alone do not count. They ride along in the next snapshot.
    fn absorb(&mut self, service: &ResearchService, tool_results: &ToolResults) -> bool {
        let new_sources = self
            .sources
            .extend_new(extract_source_urls(tool_results.tools()));

        if service.config.include_images {
            self.images.extend_images(&tool_results.images);
        }

        !new_sources.is_empty()
    }

    fn progress(
        &self,
        service: &ResearchService,
        step: Step,
        message: impl Into<String>,
        progress: Option<f64>,
    ) -> ResearchEvent {
        ResearchEvent::Progress {
            step,
            message: message.into(),
            progress,
            sources: Some(self.sources.to_vec()),
            images: service.images_snapshot(&self.images),
            timings: Some(self.timings.clone()),
        }
    }

    fn sources_update(&self, service: &ResearchService, step: Step) -> ResearchEvent {
        ResearchEvent::SourcesUpdate {
            step: Some(step),
            sources: self.sources.to_vec(),
            images: service.images_snapshot(&self.images),
        }
    }
}

/// One spawned answer task per sub-question, joined in dispatch order
///
/// Every request is in flight before the first one is awaited. Dropping the
/// set aborts whatever is still running.
struct AnswerTasks {
    handles: Vec<JoinHandle<ResearchResult<AnsweredQuestion>>>,
    next: usize,
}

impl AnswerTasks {
    fn spawn(agent: &ResearchAgent, query: &str, questions: &[SubQuestion]) -> Self {
        let handles = questions
            .iter()
            .cloned()
            .map(|question| {
                let agent = agent.clone();
                let query = query.to_string();
                tokio::spawn(async move { agent.answer_question(&query, &question).await })
            })
            .collect();

        Self { handles, next: 0 }
    }

    async fn next_in_order(&mut self) -> ResearchResult<AnsweredQuestion> {
        let index = self.next;
        let handle = self
            .handles
            .get_mut(index)
            .ok_or_else(|| ResearchError::internal("No answer task left to await"))?;
        self.next += 1;
        join_task(handle, "answer").await
    }
}

impl Drop for AnswerTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_research_data(
    agent: &ResearchAgent,
    query: &str,
) -> JoinHandle<ResearchResult<ResearchData>> {
    let agent = agent.clone();
    let query = query.to_string();
    tokio::spawn(async move { agent.gather_research_data(&query, &[]).await })
}

async fn join_task<T>(
    handle: &mut JoinHandle<ResearchResult<T>>,
    what: &str,
) -> ResearchResult<T> {
    handle
        .await
        .map_err(|e| ResearchError::internal(format!("{} task failed: {}", what, e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_agent::testing::ScriptedModel;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(
        model: ScriptedModel,
        config: PipelineConfig,
    ) -> (ResearchService, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let agent = ResearchAgent::new(model.clone());
        (ResearchService::new(agent, config), model)
    }

    async fn collect(service: &ResearchService, query: &str) -> Vec<ResearchEvent> {
        let mut rx = service.start(query.to_string());
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn terminal_count(events: &[ResearchEvent]) -> usize {
        events.iter().filter(|e| e.is_terminal()).count()
    }

    fn answer_progress(events: &[ResearchEvent]) -> Vec<(f64, String)> {
        events
            .iter()
            .filter_map(|event| match event {
                ResearchEvent::Progress {
                    step: Step::AnsweringQuestions,
                    progress: Some(p),
                    message,
                    ..
                } => Some((*p, message.clone())),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_run_event_sequence() {
        let (service, _) = service(ScriptedModel::new(), PipelineConfig::default());
        let events = collect(&service, "quantum computing").await;

        assert_eq!(terminal_count(&events), 1);
        assert!(events.last().unwrap().is_terminal());

        let steps: Vec<Step> = events.iter().filter_map(|e| e.step()).collect();
        assert_eq!(steps.first(), Some(&Step::FollowUpQuestions));
        assert_eq!(steps.last(), Some(&Step::FinalReport));

        match events.last().unwrap() {
            ResearchEvent::Complete {
                report,
                qa_pairs,
                timings,
                ..
            } => {
                assert_eq!(qa_pairs.len(), 3);
                assert!(report.starts_with("# Scripted Research Report"));
                let section = report.split(crate::report::QA_SECTION_HEADING).nth(1).unwrap();
                assert_eq!(section.matches("### Q: ").count(), qa_pairs.len());
                let timings = timings.as_ref().unwrap();
                assert!(timings.get(Timings::TOTAL).is_some());
                assert!(timings.get("follow_up_questions").is_some());
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_progress_fractions_follow_dispatch_order() {
        // The first question finishes last; progress must still be reported in index order
        let model = ScriptedModel::new()
            .with_planner(r#"["First?", "Second?", "Third?"]"#)
            .with_answer_delay("First?", Duration::from_millis(150))
            .with_answer_delay("Second?", Duration::from_millis(10));
        let (service, _) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;
        let progress = answer_progress(&events);

        assert_eq!(progress.len(), 4);
        assert_eq!(progress[0].0, 0.0);
        assert_eq!(progress[1].0, 1.0 / 3.0);
        assert_eq!(progress[2].0, 2.0 / 3.0);
        assert_eq!(progress[3].0, 1.0);
        assert!(progress[1].1.ends_with("1/3: First?"));
        assert!(progress[2].1.ends_with("2/3: Second?"));
        assert!(progress[3].1.ends_with("3/3: Third?"));

        match events.last().unwrap() {
            ResearchEvent::Complete { qa_pairs, .. } => {
                let order: Vec<&str> = qa_pairs.iter().map(|qa| qa.question.as_str()).collect();
                assert_eq!(order, vec!["First?", "Second?", "Third?"]);
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_answers_dispatched_concurrently() {
        let model = ScriptedModel::new()
            .with_planner(r#"["A?", "B?", "C?"]"#)
            .with_answer_delay("A?", Duration::from_millis(200))
            .with_answer_delay("B?", Duration::from_millis(200))
            .with_answer_delay("C?", Duration::from_millis(200));
        let (service, _) = service(model, PipelineConfig::default());

        let started = Instant::now();
        let events = collect(&service, "topic").await;
        assert!(matches!(events.last(), Some(ResearchEvent::Complete { .. })));
        // Three sequential calls would need at least 600ms
        assert!(
            started.elapsed() < Duration::from_millis(550),
            "answers ran sequentially: {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_malformed_planner_output_still_completes() {
        let model = ScriptedModel::new().with_planner("not json at all");
        let (service, model) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;
        assert_eq!(terminal_count(&events), 1);

        match events.last().unwrap() {
            ResearchEvent::Complete {
                report, qa_pairs, ..
            } => {
                assert!(qa_pairs.is_empty());
                assert!(report.starts_with("# Scripted Research Report"));
                assert!(report.ends_with("## Questions and Detailed Answers\n\n"));
            }
            other => panic!("expected complete, got {:?}", other),
        }

        // Planner and synthesizer only
        assert_eq!(model.requests().len(), 2);
        assert_eq!(answer_progress(&events).len(), 1);
    }

    #[tokio::test]
    async fn test_planner_failure_emits_single_error() {
        let model = ScriptedModel::new().fail_planner("upstream unavailable");
        let (service, model) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step(), Some(Step::FollowUpQuestions));
        match &events[1] {
            ResearchEvent::Error { message } => {
                assert!(message.starts_with("An error occurred during the research process"));
                assert!(message.contains("upstream unavailable"));
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_failure_aborts_run() {
        let model = ScriptedModel::new()
            .with_planner(r#"["Good?", "Bad?"]"#)
            .fail_answer("Bad?", "search tool crashed");
        let (service, _) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;
        assert_eq!(terminal_count(&events), 1);
        assert!(matches!(events.last(), Some(ResearchEvent::Error { .. })));
        assert!(!events.iter().any(|e| e.step() == Some(Step::FinalReport)));
    }

    #[tokio::test]
    async fn test_synthesizer_failure_emits_error_without_report() {
        let model = ScriptedModel::new().fail_report("context too long");
        let (service, _) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;
        assert_eq!(terminal_count(&events), 1);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ResearchEvent::Complete { .. })));
        match events.last().unwrap() {
            ResearchEvent::Error { message } => assert!(message.contains("context too long")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sources_deduplicated_across_answers() {
        let tools = json!([{
            "type": "search",
            "output": "URL: https://a.example\nURL: https://a.example\nURL: https://b.example",
            "search_results": {"images": ["https://img.example/1.png"]}
        }]);
        let model = ScriptedModel::new()
            .with_planner(r#"["One?", "Two?"]"#)
            .with_answer("One?", "answer one", tools.clone())
            .with_answer("Two?", "answer two", tools);
        let (service, _) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;

        let updates: Vec<&ResearchEvent> = events
            .iter()
            .filter(|e| matches!(e, ResearchEvent::SourcesUpdate { .. }))
            .collect();
        // The second answer brings nothing new
        assert_eq!(updates.len(), 1);

        match events.last().unwrap() {
            ResearchEvent::Complete {
                sources, images, ..
            } => {
                assert_eq!(
                    sources.as_deref().unwrap(),
                    ["https://a.example", "https://b.example"]
                );
                assert_eq!(images.as_deref().unwrap(), ["https://img.example/1.png"]);
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_images_omitted_when_disabled() {
        let config = PipelineConfig {
            include_images: false,
            ..PipelineConfig::default()
        };
        let (service, model) = service(ScriptedModel::new(), config);

        let events = collect(&service, "topic").await;
        match events.last().unwrap() {
            ResearchEvent::Complete { images, .. } => assert!(images.is_none()),
            other => panic!("expected complete, got {:?}", other),
        }
        let answer_request = model
            .requests()
            .into_iter()
            .find(|r| r.search_settings.is_some())
            .unwrap();
        assert!(!answer_request.search_settings.unwrap().include_images);
    }

    #[tokio::test]
    async fn test_research_data_stage() {
        let model = ScriptedModel::new().with_research_data("Data with [S](https://s.example)");
        let config = PipelineConfig {
            gather_research_data: true,
            ..PipelineConfig::default()
        };
        let (service, model) = service(model, config);

        let events = collect(&service, "topic").await;
        assert!(events.iter().any(|e| e.step() == Some(Step::ResearchData)));
        assert!(matches!(events.last(), Some(ResearchEvent::Complete { .. })));

        let report_request = model
            .requests()
            .into_iter()
            .find(|r| r.prompt().contains("comprehensive research report"))
            .unwrap();
        assert!(report_request
            .prompt()
            .contains("Research Data:\nData with [S](https://s.example)"));
    }

    /// Run in the background, read events until `stop_at` arrives, then hang up
    async fn hang_up_after(service: &ResearchService, stop_at: Step) -> Duration {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn({
            let service = service.clone();
            async move { service.run("topic", EventSink::new(tx)).await }
        });

        while let Some(event) = rx.recv().await {
            if event.step() == Some(stop_at) {
                break;
            }
        }
        drop(rx);

        let hung_up = Instant::now();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run did not stop")
            .unwrap();
        hung_up.elapsed()
    }

    #[tokio::test]
    async fn test_disconnect_abandons_report_call() {
        let model = ScriptedModel::new().with_report_delay(Duration::from_millis(1500));
        let (service, _) = service(model, PipelineConfig::default());

        let elapsed = hang_up_after(&service, Step::FinalReport).await;
        assert!(
            elapsed < Duration::from_millis(300),
            "run kept waiting on the report for {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_disconnect_abandons_planner_call() {
        let model = ScriptedModel::new().with_planner_delay(Duration::from_millis(1500));
        let (service, model) = service(model, PipelineConfig::default());

        let elapsed = hang_up_after(&service, Step::FollowUpQuestions).await;
        assert!(
            elapsed < Duration::from_millis(300),
            "run kept waiting on the planner for {:?}",
            elapsed
        );
        // Nothing after the planner was attempted
        assert!(model
            .requests()
            .iter()
            .all(|r| r.prompt().contains("generate 3 specific research questions")));
    }

    #[tokio::test]
    async fn test_disconnect_while_answering_stops_waiting() {
        let model = ScriptedModel::new()
            .with_answer_delay("Question one?", Duration::from_millis(1500));
        let (service, _) = service(model, PipelineConfig::default());

        let elapsed = hang_up_after(&service, Step::AnsweringQuestions).await;
        assert!(
            elapsed < Duration::from_millis(300),
            "run kept waiting on answers for {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_new_images_alone_do_not_trigger_sources_update() {
        let sourced = json!([{
            "type": "search",
            "output": "URL: https://a.example",
            "search_results": {"images": ["https://img.example/1.png"]}
        }]);
        let images_only = json!([{
            "type": "search",
            "output": "URL: https://a.example",
            "search_results": {"images": ["https://img.example/2.png"]}
        }]);
        let model = ScriptedModel::new()
            .with_planner(r#"["One?", "Two?"]"#)
            .with_answer("One?", "answer one", sourced)
            .with_answer("Two?", "answer two", images_only);
        let (service, _) = service(model, PipelineConfig::default());

        let events = collect(&service, "topic").await;
        let updates = events
            .iter()
            .filter(|e| matches!(e, ResearchEvent::SourcesUpdate { .. }))
            .count();
        assert_eq!(updates, 1);

        match events.last().unwrap() {
            ResearchEvent::Complete { images, .. } => assert_eq!(
                images.as_deref().unwrap(),
                ["https://img.example/1.png", "https://img.example/2.png"]
            ),
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_stops_when_client_disconnects() {
        let model = ScriptedModel::new()
            .with_answer_delay("Question one?", Duration::from_millis(50));
        let (service, model) = service(model, PipelineConfig::default());

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn({
            let service = service.clone();
            async move { service.run("topic", EventSink::new(tx)).await }
        });

        // Take the first event, then hang up
        assert!(rx.recv().await.is_some());
        drop(rx);

        handle.await.unwrap();
        assert!(!model
            .requests()
            .iter()
            .any(|r| r.prompt().contains("comprehensive research report")));
    }
}
