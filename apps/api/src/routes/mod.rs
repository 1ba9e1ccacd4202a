pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::privacy::handlers as privacy;
use crate::state::AppState;
use crate::workspace::handlers as workspace;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Public CV access
        .route("/api/v1/cv/:slug", get(privacy::handle_public_metadata))
        .route("/api/v1/cv/:slug/access", post(privacy::handle_access))
        // Workspace settings (owner)
        .route("/api/v1/workspaces", post(workspace::handle_create_workspace))
        .route(
            "/api/v1/workspaces/:id/privacy",
            get(privacy::handle_get_privacy).put(privacy::handle_update_privacy),
        )
        // Collaborators
        .route(
            "/api/v1/workspaces/:id/collaborators",
            get(workspace::handle_list_collaborators).post(workspace::handle_invite),
        )
        .route(
            "/api/v1/workspaces/:id/collaborators/accept",
            post(workspace::handle_accept),
        )
        .route(
            "/api/v1/workspaces/:id/collaborators/decline",
            post(workspace::handle_decline),
        )
        .route(
            "/api/v1/workspaces/:id/collaborators/:collab_id",
            patch(workspace::handle_update_member).delete(workspace::handle_remove_member),
        )
        .with_state(state)
}
