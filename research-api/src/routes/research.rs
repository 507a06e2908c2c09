//! Streaming research endpoints

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use research_core::{ResearchError, ResearchResult};
use research_services::event_stream;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;

/// Create research routes
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/research/stream",
        get(stream_research_get).post(stream_research_post),
    )
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub query: String,
}

/// Error body sent before any stream is opened
#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

async fn stream_research_post(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Response {
    stream_research(state, request.query)
}

async fn stream_research_get(
    State(state): State<AppState>,
    Query(request): Query<ResearchRequest>,
) -> Response {
    stream_research(state, request.query)
}

/// Trimmed query, rejecting blank input
fn validate_query(query: &str) -> ResearchResult<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ResearchError::invalid_request("Query must not be empty"));
    }
    Ok(query.to_string())
}

/// Start a research run and stream its events as `text/event-stream`
fn stream_research(state: AppState, query: String) -> Response {
    let query = match validate_query(&query) {
        Ok(query) => query,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    // Check if research service is available
    let research_service = match &state.research_service {
        Some(service) => service,
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Research service not available. Check the GROQ_API_KEY environment variable.",
            );
        }
    };

    info!("Starting streamed research for: {}", query);
    let events = research_service.start(query);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(event_stream(events)))
        .unwrap_or_else(|e| {
            error!("Failed to build event stream response: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
