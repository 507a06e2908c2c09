//! API route definitions

mod health;
mod research;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(research::routes())
        .merge(health::routes())
}

/// Routes mounted outside `/api`
pub fn root_routes() -> Router<AppState> {
    Router::new().route("/", get(root))
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Research Assistant API is running"}))
}
