//! Research agent shared by all model-calling stages

use std::sync::Arc;

use research_core::ResearchResult;
use tracing::debug;

use crate::client::{ChatModel, ChatRequest, Completion};
use crate::config::{ModelConfig, ModelRole, DEFAULT_REASONING_MODEL, DEFAULT_SEARCH_MODEL};

/// Handle to the chat model plus the model ids for each role
///
/// Cheap to clone; each parallel answer task owns a clone.
#[derive(Clone)]
pub struct ResearchAgent {
    model: Arc<dyn ChatModel>,
    reasoning_model: String,
    search_model: String,
    include_images: bool,
}

impl ResearchAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            include_images: true,
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, config: &ModelConfig) -> Self {
        Self::new(model)
            .with_reasoning_model(&config.reasoning_model)
            .with_search_model(&config.search_model)
    }

    pub fn with_reasoning_model(mut self, model: &str) -> Self {
        self.reasoning_model = model.to_string();
        self
    }

    pub fn with_search_model(mut self, model: &str) -> Self {
        self.search_model = model.to_string();
        self
    }

    /// Ask the search model for images alongside web results
    pub fn with_images(mut self, include_images: bool) -> Self {
        self.include_images = include_images;
        self
    }

    pub fn include_images(&self) -> bool {
        self.include_images
    }

    pub fn model_id(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Reasoning => &self.reasoning_model,
            ModelRole::Search => &self.search_model,
        }
    }

    pub(crate) fn request(&self, role: ModelRole, prompt: String) -> ChatRequest {
        ChatRequest::user(self.model_id(role), prompt)
    }

    pub(crate) async fn call(&self, request: ChatRequest) -> ResearchResult<Completion> {
        debug!(
            "Calling {} with a {} character prompt",
            request.model,
            request.prompt().len()
        );
        self.model.complete(request).await
    }
}

impl std::fmt::Debug for ResearchAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchAgent")
            .field("reasoning_model", &self.reasoning_model)
            .field("search_model", &self.search_model)
            .field("include_images", &self.include_images)
            .finish()
    }
}
