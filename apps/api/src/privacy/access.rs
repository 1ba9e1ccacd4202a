//! The two calls the rest of the app makes into the privacy core:
//! "can this request see this CV" and "owner changes the privacy level".
//! Lookups happen here so that `policy::evaluate` stays pure.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::workspace::{PrivacyConfiguration, PrivacyLevel, WorkspaceRow};
use crate::privacy::policy::{
    evaluate_stored, redact_for_visitor, AccessDecision, AccessRequestContext,
};
use crate::privacy::settings::{set_privacy_level_str, PrivacyUpdate};
use crate::workspace::collaboration::require_owner;
use crate::workspace::store::WorkspaceStore;

/// Credentials a visitor presented with the request.
#[derive(Debug, Clone, Default)]
pub struct PresentedCredentials {
    pub token: Option<String>,
    pub password: Option<String>,
}

impl PresentedCredentials {
    pub fn is_guess(&self) -> bool {
        self.token.is_some() || self.password.is_some()
    }
}

pub async fn evaluate_access(
    store: &dyn WorkspaceStore,
    slug: &str,
    credentials: PresentedCredentials,
    user_id: Option<Uuid>,
) -> Result<AccessDecision, AppError> {
    let had_guess = credentials.is_guess();
    let row = store
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV '{slug}' not found")))?;

    let collaboration = match user_id {
        Some(uid) => store.find_membership(row.id, uid).await?,
        None => None,
    };
    let ctx = AccessRequestContext {
        is_authenticated: user_id.is_some(),
        collaboration,
        provided_token: credentials.token,
        provided_password: credentials.password,
    };

    let workspace_id = row.id;

    // Password verification runs the KDF; keep it off the async workers.
    let decision = tokio::task::spawn_blocking(move || evaluate_stored(&row, &ctx))
        .await
        .map_err(|e| anyhow::anyhow!("access evaluation task failed: {e}"))?;

    if !decision.can_access && had_guess && !decision.is_prompt() {
        warn!(%workspace_id, reason = ?decision.reason, "Rejected CV credential");
    }
    Ok(redact_for_visitor(decision))
}

#[derive(Debug, Clone)]
pub struct UpdatePrivacyParams {
    pub workspace_id: Uuid,
    pub actor_id: Uuid,
    pub level: String,
    pub new_password: Option<String>,
    pub allow_search_engines: Option<bool>,
    pub regenerate_token: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePrivacyResult {
    pub level: PrivacyLevel,
    pub allow_search_engines: bool,
    /// Present only when this call minted a token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

async fn load_owned_workspace(
    store: &dyn WorkspaceStore,
    workspace_id: Uuid,
    actor_id: Uuid,
) -> Result<WorkspaceRow, AppError> {
    let row = store
        .find_by_id(workspace_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workspace {workspace_id} not found")))?;
    let membership = store.find_membership(workspace_id, actor_id).await?;
    require_owner(membership.as_ref())?;
    Ok(row)
}

pub async fn update_privacy(
    store: &dyn WorkspaceStore,
    params: UpdatePrivacyParams,
) -> Result<UpdatePrivacyResult, AppError> {
    load_owned_workspace(store, params.workspace_id, params.actor_id).await?;

    let UpdatePrivacyParams {
        workspace_id,
        level,
        new_password,
        allow_search_engines,
        regenerate_token,
        ..
    } = params;
    let update = PrivacyUpdate {
        new_password,
        regenerate_token,
        allow_search_engines,
    };

    let transition = store
        .update_privacy(
            workspace_id,
            Box::new(move |current: &PrivacyConfiguration| {
                set_privacy_level_str(current, &level, update)
            }),
        )
        .await?;

    info!(
        %workspace_id,
        level = %transition.config.level,
        token_minted = transition.generated_token.is_some(),
        "Privacy settings updated"
    );

    Ok(UpdatePrivacyResult {
        level: transition.config.level,
        allow_search_engines: transition.config.allow_search_engines,
        secret_token: transition.generated_token,
    })
}

/// What the owner's settings page shows. Never includes the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerPrivacyView {
    pub level: String,
    pub secret_token: Option<String>,
    pub has_password: bool,
    pub allow_search_engines: bool,
}

pub async fn owner_privacy_view(
    store: &dyn WorkspaceStore,
    workspace_id: Uuid,
    actor_id: Uuid,
) -> Result<(WorkspaceRow, OwnerPrivacyView), AppError> {
    let row = load_owned_workspace(store, workspace_id, actor_id).await?;
    let view = OwnerPrivacyView {
        level: row.privacy_level.clone(),
        secret_token: row.secret_token.clone(),
        has_password: row.password_hash.is_some(),
        allow_search_engines: row.allow_search_engines,
    };
    Ok((row, view))
}

/// Metadata safe for anyone: no token, no hash.
#[derive(Debug, Clone, Serialize)]
pub struct PublicCvMetadata {
    pub slug: String,
    pub privacy_level: PrivacyLevel,
    pub allow_search_engines: bool,
}

pub async fn public_metadata(
    store: &dyn WorkspaceStore,
    slug: &str,
) -> Result<PublicCvMetadata, AppError> {
    let row = store
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV '{slug}' not found")))?;
    let (privacy_level, allow_search_engines) = match row.privacy() {
        Ok(config) => (config.level, config.allow_search_engines),
        Err(e) => {
            tracing::error!(workspace_id = %row.id, "Stored privacy configuration is invalid: {e}");
            (PrivacyLevel::Private, false)
        }
    };
    Ok(PublicCvMetadata {
        slug: row.slug,
        privacy_level,
        allow_search_engines,
    })
}
