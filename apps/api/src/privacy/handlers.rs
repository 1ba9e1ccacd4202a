//! Axum route handlers for CV access and privacy settings.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{ClientId, MaybeUser, RequireUser};
use crate::errors::AppError;
use crate::privacy::access::{
    evaluate_access, owner_privacy_view, public_metadata, update_privacy, OwnerPrivacyView,
    PresentedCredentials, PublicCvMetadata, UpdatePrivacyParams, UpdatePrivacyResult,
};
use crate::privacy::policy::AccessDecision;
use crate::state::AppState;

const ACCESS_ENDPOINT: &str = "cv.access";
const PRIVACY_UPDATE_ENDPOINT: &str = "privacy.update";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AccessRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrivacyRequest {
    pub level: String,
    pub new_password: Option<String>,
    pub allow_search_engines: Option<bool>,
    #[serde(default)]
    pub regenerate_token: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdatePrivacyResponse {
    #[serde(flatten)]
    pub result: UpdatePrivacyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PrivacySettingsResponse {
    #[serde(flatten)]
    pub settings: OwnerPrivacyView,
    pub share_url: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/cv/:slug
pub async fn handle_public_metadata(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicCvMetadata>, AppError> {
    Ok(Json(public_metadata(state.workspaces.as_ref(), &slug).await?))
}

/// POST /api/v1/cv/:slug/access
///
/// Always answers with an `AccessDecision`; prompts and denials are 200s.
/// Requests that carry a token or password count against both the caller's
/// and the CV's rate limit.
pub async fn handle_access(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    MaybeUser(user): MaybeUser,
    ClientId(client): ClientId,
    Json(req): Json<AccessRequest>,
) -> Result<Json<AccessDecision>, AppError> {
    let credentials = PresentedCredentials {
        token: req.token,
        password: req.password,
    };
    if credentials.is_guess() {
        state
            .rate_limiter
            .enforce(
                &client,
                ACCESS_ENDPOINT,
                state.config.rate_limit_window_ms,
                state.config.rate_limit_max_requests,
            )
            .await?;
        // Shared by every caller, so rotating identities cannot reset it.
        state
            .rate_limiter
            .enforce(
                &format!("slug:{}", slug.trim().to_lowercase()),
                ACCESS_ENDPOINT,
                state.config.rate_limit_window_ms,
                state.config.rate_limit_slug_max_requests,
            )
            .await?;
    }

    let decision = evaluate_access(
        state.workspaces.as_ref(),
        &slug,
        credentials,
        user.map(|u| u.id),
    )
    .await?;
    Ok(Json(decision))
}

/// GET /api/v1/workspaces/:id/privacy
pub async fn handle_get_privacy(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
) -> Result<Json<PrivacySettingsResponse>, AppError> {
    let (row, settings) = owner_privacy_view(state.workspaces.as_ref(), workspace_id, user.id).await?;
    let share_url = settings
        .secret_token
        .as_deref()
        .map(|t| state.config.share_url(&row.slug, t));
    Ok(Json(PrivacySettingsResponse {
        settings,
        share_url,
    }))
}

/// PUT /api/v1/workspaces/:id/privacy
pub async fn handle_update_privacy(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
    ClientId(client): ClientId,
    Json(req): Json<UpdatePrivacyRequest>,
) -> Result<Json<UpdatePrivacyResponse>, AppError> {
    state
        .rate_limiter
        .enforce(
            &client,
            PRIVACY_UPDATE_ENDPOINT,
            state.config.rate_limit_window_ms,
            state.config.rate_limit_max_requests,
        )
        .await?;

    let result = update_privacy(
        state.workspaces.as_ref(),
        UpdatePrivacyParams {
            workspace_id,
            actor_id: user.id,
            level: req.level,
            new_password: req.new_password,
            allow_search_engines: req.allow_search_engines,
            regenerate_token: req.regenerate_token,
        },
    )
    .await?;

    let share_url = match &result.secret_token {
        Some(token) => state
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .map(|row| state.config.share_url(&row.slug, token)),
        None => None,
    };

    Ok(Json(UpdatePrivacyResponse { result, share_url }))
}
