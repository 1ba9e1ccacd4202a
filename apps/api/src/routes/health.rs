use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
///
/// Liveness plus the rate-limit backend this replica counts against.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let rate_limit_store = if state.config.redis_url.is_some() {
        "redis"
    } else {
        "memory"
    };
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "rate_limit_store": rate_limit_store,
    }))
}
