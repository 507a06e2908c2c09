//! Deep Research API Server
//!
//! HTTP surface that streams research runs to browser clients as
//! server-sent events.

pub mod routes;

use std::sync::Arc;

use axum::{
    http::{header, Method},
    Router,
};
use research_services::ResearchService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone, Default)]
pub struct AppState {
    /// Research service (optional - requires GROQ_API_KEY)
    pub research_service: Option<Arc<ResearchService>>,
}

impl AppState {
    pub fn new(research_service: Option<ResearchService>) -> Self {
        Self {
            research_service: research_service.map(Arc::new),
        }
    }
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes::root_routes())
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
