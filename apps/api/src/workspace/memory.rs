use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::workspace::{
    CollaborationRecord, CollaborationStatus, CollaboratorRole, PrivacyConfiguration, WorkspaceRow,
};
use crate::privacy::settings::PrivacyTransition;
use crate::workspace::collaboration::owner_record;
use crate::workspace::store::{run_mutation, NewWorkspace, PrivacyMutation, WorkspaceStore};

#[derive(Default)]
struct Tables {
    workspaces: HashMap<Uuid, WorkspaceRow>,
    collaborators: HashMap<Uuid, CollaborationRecord>,
}

/// Map-backed store for tests. One lock guards everything, which also makes
/// `update_privacy` atomic.
#[derive(Default)]
pub struct InMemoryWorkspaceStore {
    tables: Mutex<Tables>,
}

impl InMemoryWorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a stored row, e.g. to plant a corrupt privacy level.
    pub async fn put_row(&self, row: WorkspaceRow) {
        self.tables.lock().await.workspaces.insert(row.id, row);
    }
}

#[async_trait]
impl WorkspaceStore for InMemoryWorkspaceStore {
    async fn create_workspace(&self, new: NewWorkspace) -> Result<WorkspaceRow, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.workspaces.values().any(|w| w.slug == new.slug) {
            return Err(AppError::Conflict(format!(
                "Slug '{}' is already taken",
                new.slug
            )));
        }
        let now = Utc::now();
        let privacy = PrivacyConfiguration::new_private();
        let mut row = WorkspaceRow {
            id: Uuid::new_v4(),
            slug: new.slug,
            owner_id: new.owner_id,
            privacy_level: String::new(),
            secret_token: None,
            password_hash: None,
            allow_search_engines: false,
            has_been_public: false,
            created_at: now,
            updated_at: now,
        };
        row.apply_privacy(&privacy);
        let owner = owner_record(row.id, new.owner_id, &new.owner_email, now);
        tables.collaborators.insert(owner.id, owner);
        tables.workspaces.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<WorkspaceRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.workspaces.values().find(|w| w.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkspaceRow>, AppError> {
        Ok(self.tables.lock().await.workspaces.get(&id).cloned())
    }

    async fn find_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .collaborators
            .values()
            .find(|c| {
                c.workspace_id == workspace_id
                    && c.user_id == Some(user_id)
                    && c.status == CollaborationStatus::Accepted
            })
            .cloned())
    }

    async fn update_privacy(
        &self,
        workspace_id: Uuid,
        mutation: PrivacyMutation,
    ) -> Result<PrivacyTransition, AppError> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .workspaces
            .get_mut(&workspace_id)
            .ok_or_else(|| AppError::NotFound(format!("Workspace {workspace_id} not found")))?;
        let current = row.privacy_for_update();
        let transition = run_mutation(current, mutation).await?;
        row.apply_privacy(&transition.config);
        row.updated_at = Utc::now();
        Ok(transition)
    }

    async fn list_collaborators(
        &self,
        workspace_id: Uuid,
    ) -> Result<Vec<CollaborationRecord>, AppError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<_> = tables
            .collaborators
            .values()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect();
        records.sort_by_key(|c| c.created_at);
        Ok(records)
    }

    async fn find_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .collaborators
            .get(&collaborator_id)
            .filter(|c| c.workspace_id == workspace_id)
            .cloned())
    }

    async fn find_by_email(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .collaborators
            .values()
            .filter(|c| c.workspace_id == workspace_id && c.invited_email == email)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn save_collaborator(&self, record: &CollaborationRecord) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if record.status == CollaborationStatus::Accepted
            && tables.collaborators.values().any(|c| {
                c.id != record.id
                    && c.workspace_id == record.workspace_id
                    && c.status == CollaborationStatus::Accepted
                    && c.user_id.is_some()
                    && c.user_id == record.user_id
            })
        {
            return Err(AppError::Conflict(
                "This user is already a member of the workspace".to_string(),
            ));
        }
        tables.collaborators.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        match tables.collaborators.get(&collaborator_id) {
            Some(c) if c.workspace_id == workspace_id && c.role != CollaboratorRole::Owner => {
                tables.collaborators.remove(&collaborator_id);
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "Collaborator {collaborator_id} not found"
            ))),
        }
    }
}
