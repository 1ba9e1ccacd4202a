use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::workspace::{CollaborationRecord, PrivacyConfiguration, WorkspaceRow};
use crate::privacy::settings::PrivacyTransition;
use crate::privacy::PrivacyError;

/// A privacy change, run against the locked current configuration.
/// May be CPU-heavy (password hashing); stores run it off the async executor.
pub type PrivacyMutation =
    Box<dyn FnOnce(&PrivacyConfiguration) -> Result<PrivacyTransition, PrivacyError> + Send>;

pub struct NewWorkspace {
    pub slug: String,
    pub owner_id: Uuid,
    pub owner_email: String,
}

/// Persistence for workspaces and their members.
///
/// Carried in `AppState` as `Arc<dyn WorkspaceStore>`. Postgres in production,
/// an in-memory map in tests.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Inserts the workspace (private, no credentials) and its accepted owner record.
    async fn create_workspace(&self, new: NewWorkspace) -> Result<WorkspaceRow, AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<WorkspaceRow>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkspaceRow>, AppError>;

    /// The user's accepted membership, if any.
    async fn find_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError>;

    /// Applies `mutation` atomically: no concurrent update can interleave
    /// between reading the current configuration and writing the result.
    async fn update_privacy(
        &self,
        workspace_id: Uuid,
        mutation: PrivacyMutation,
    ) -> Result<PrivacyTransition, AppError>;

    async fn list_collaborators(&self, workspace_id: Uuid)
        -> Result<Vec<CollaborationRecord>, AppError>;

    async fn find_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError>;

    /// Most recent record for an email, any status.
    async fn find_by_email(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<Option<CollaborationRecord>, AppError>;

    /// Insert or overwrite by id.
    async fn save_collaborator(&self, record: &CollaborationRecord) -> Result<(), AppError>;

    async fn delete_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<(), AppError>;
}

/// Runs a privacy mutation on the blocking pool.
pub(crate) async fn run_mutation(
    current: PrivacyConfiguration,
    mutation: PrivacyMutation,
) -> Result<PrivacyTransition, AppError> {
    let result = tokio::task::spawn_blocking(move || mutation(&current))
        .await
        .map_err(|e| anyhow::anyhow!("privacy update task failed: {e}"))?;
    Ok(result?)
}
