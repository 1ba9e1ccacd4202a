//! Axum route handlers for workspaces and their members.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, ClientId, RequireUser};
use crate::errors::AppError;
use crate::models::workspace::{
    CollaborationRecord, CollaborationStatus, CollaboratorRole, Permissions, PrivacyLevel,
};
use crate::state::AppState;
use crate::workspace::collaboration::{
    accept_invitation, change_membership, decline_invitation, ensure_removable, new_invitation,
    normalize_email, require_member, validate_slug,
};
use crate::workspace::store::NewWorkspace;

const INVITE_ENDPOINT: &str = "collaborators.invite";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub id: Uuid,
    pub slug: String,
    pub owner_id: Uuid,
    pub privacy_level: PrivacyLevel,
    pub allow_search_engines: bool,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: CollaboratorRole,
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: Option<CollaboratorRole>,
    pub permissions: Option<Permissions>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/workspaces
pub async fn handle_create_workspace(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<WorkspaceResponse>), AppError> {
    let slug = validate_slug(&req.slug)?;
    let owner_email = user.require_email()?.to_string();
    let row = state
        .workspaces
        .create_workspace(NewWorkspace {
            slug,
            owner_id: user.id,
            owner_email,
        })
        .await?;
    let privacy = row.privacy()?;

    Ok((
        StatusCode::CREATED,
        Json(WorkspaceResponse {
            id: row.id,
            slug: row.slug,
            owner_id: row.owner_id,
            privacy_level: privacy.level,
            allow_search_engines: privacy.allow_search_engines,
        }),
    ))
}

/// GET /api/v1/workspaces/:id/collaborators
pub async fn handle_list_collaborators(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<CollaborationRecord>>, AppError> {
    let actor = state.workspaces.find_membership(workspace_id, user.id).await?;
    require_member(actor.as_ref())?;
    Ok(Json(state.workspaces.list_collaborators(workspace_id).await?))
}

/// POST /api/v1/workspaces/:id/collaborators
pub async fn handle_invite(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
    ClientId(client): ClientId,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<CollaborationRecord>), AppError> {
    state
        .rate_limiter
        .enforce(
            &client,
            INVITE_ENDPOINT,
            state.config.rate_limit_window_ms,
            state.config.rate_limit_max_requests,
        )
        .await?;

    let actor = state.workspaces.find_membership(workspace_id, user.id).await?;
    let existing = state
        .workspaces
        .find_by_email(workspace_id, &normalize_email(&req.email))
        .await?;
    let record = new_invitation(
        actor.as_ref(),
        existing.as_ref(),
        &req.email,
        req.role,
        req.permissions,
        Utc::now(),
    )?;
    state.workspaces.save_collaborator(&record).await?;

    info!(%workspace_id, collaborator_id = %record.id, role = record.role.as_str(), "Invitation created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn respond_to_invitation(
    state: &AppState,
    workspace_id: Uuid,
    user: &AuthUser,
    status: CollaborationStatus,
) -> Result<CollaborationRecord, AppError> {
    let email = normalize_email(user.require_email()?);
    let mut record = state
        .workspaces
        .find_by_email(workspace_id, &email)
        .await?
        .filter(|r| r.status == CollaborationStatus::Pending)
        .ok_or_else(|| AppError::NotFound("No pending invitation for this account".to_string()))?;

    match status {
        CollaborationStatus::Accepted => accept_invitation(&mut record, user.id, &email, Utc::now())?,
        _ => decline_invitation(&mut record, user.id, &email, Utc::now())?,
    }
    state.workspaces.save_collaborator(&record).await?;

    info!(%workspace_id, collaborator_id = %record.id, status = record.status.as_str(), "Invitation answered");
    Ok(record)
}

/// POST /api/v1/workspaces/:id/collaborators/accept
pub async fn handle_accept(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
) -> Result<Json<CollaborationRecord>, AppError> {
    let record =
        respond_to_invitation(&state, workspace_id, &user, CollaborationStatus::Accepted).await?;
    Ok(Json(record))
}

/// POST /api/v1/workspaces/:id/collaborators/decline
pub async fn handle_decline(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    RequireUser(user): RequireUser,
) -> Result<Json<CollaborationRecord>, AppError> {
    let record =
        respond_to_invitation(&state, workspace_id, &user, CollaborationStatus::Declined).await?;
    Ok(Json(record))
}

/// PATCH /api/v1/workspaces/:id/collaborators/:collab_id
pub async fn handle_update_member(
    State(state): State<AppState>,
    Path((workspace_id, collaborator_id)): Path<(Uuid, Uuid)>,
    RequireUser(user): RequireUser,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<CollaborationRecord>, AppError> {
    let actor = state.workspaces.find_membership(workspace_id, user.id).await?;
    let mut target = state
        .workspaces
        .find_collaborator(workspace_id, collaborator_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collaborator {collaborator_id} not found")))?;

    change_membership(actor.as_ref(), &mut target, req.role, req.permissions, Utc::now())?;
    state.workspaces.save_collaborator(&target).await?;
    Ok(Json(target))
}

/// DELETE /api/v1/workspaces/:id/collaborators/:collab_id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    Path((workspace_id, collaborator_id)): Path<(Uuid, Uuid)>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode, AppError> {
    let actor = state.workspaces.find_membership(workspace_id, user.id).await?;
    let target = state
        .workspaces
        .find_collaborator(workspace_id, collaborator_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collaborator {collaborator_id} not found")))?;

    ensure_removable(actor.as_ref(), &target)?;
    state
        .workspaces
        .delete_collaborator(workspace_id, collaborator_id)
        .await?;

    info!(%workspace_id, %collaborator_id, "Collaborator removed");
    Ok(StatusCode::NO_CONTENT)
}
