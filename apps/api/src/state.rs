use std::sync::Arc;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::workspace::store::WorkspaceStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Workspace + membership persistence. Default: PgWorkspaceStore.
    pub workspaces: Arc<dyn WorkspaceStore>,
    /// Guards credential-guessing and settings endpoints.
    pub rate_limiter: RateLimiter,
    pub config: Config,
}
