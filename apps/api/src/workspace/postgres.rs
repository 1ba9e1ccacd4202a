use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::workspace::{
    CollaborationRecord, CollaboratorRow, PrivacyConfiguration, WorkspaceRow,
};
use crate::privacy::settings::PrivacyTransition;
use crate::workspace::collaboration::owner_record;
use crate::workspace::store::{run_mutation, NewWorkspace, PrivacyMutation, WorkspaceStore};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgWorkspaceStore {
    pool: PgPool,
}

impl PgWorkspaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn to_record(row: CollaboratorRow) -> Result<CollaborationRecord, AppError> {
    Ok(CollaborationRecord::try_from(row)?)
}

async fn upsert_collaborator<'e, E>(executor: E, record: &CollaborationRecord) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO workspace_collaborators
            (id, workspace_id, user_id, invited_email, role,
             can_edit, can_suggest_changes, can_view_analytics, can_invite_others, can_manage_settings,
             status, invited_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (id) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            role = EXCLUDED.role,
            can_edit = EXCLUDED.can_edit,
            can_suggest_changes = EXCLUDED.can_suggest_changes,
            can_view_analytics = EXCLUDED.can_view_analytics,
            can_invite_others = EXCLUDED.can_invite_others,
            can_manage_settings = EXCLUDED.can_manage_settings,
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.id)
    .bind(record.workspace_id)
    .bind(record.user_id)
    .bind(&record.invited_email)
    .bind(record.role.as_str())
    .bind(record.permissions.can_edit)
    .bind(record.permissions.can_suggest_changes)
    .bind(record.permissions.can_view_analytics)
    .bind(record.permissions.can_invite_others)
    .bind(record.permissions.can_manage_settings)
    .bind(record.status.as_str())
    .bind(record.invited_by)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("This user is already a member of the workspace".to_string())
        } else {
            AppError::Database(e)
        }
    })?;
    Ok(())
}

#[async_trait]
impl WorkspaceStore for PgWorkspaceStore {
    async fn create_workspace(&self, new: NewWorkspace) -> Result<WorkspaceRow, AppError> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        let privacy = PrivacyConfiguration::new_private();

        let row = sqlx::query_as::<_, WorkspaceRow>(
            r#"
            INSERT INTO workspaces
                (id, slug, owner_id, privacy_level, secret_token, password_hash,
                 allow_search_engines, has_been_public)
            VALUES ($1, $2, $3, $4, NULL, NULL, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&new.slug)
        .bind(new.owner_id)
        .bind(privacy.level.as_str())
        .bind(privacy.allow_search_engines)
        .bind(privacy.has_been_public)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Slug '{}' is already taken", new.slug))
            } else {
                AppError::Database(e)
            }
        })?;

        let owner = owner_record(id, new.owner_id, &new.owner_email, Utc::now());
        upsert_collaborator(&mut *tx, &owner).await?;
        tx.commit().await?;

        info!(workspace_id = %id, slug = %new.slug, "Created workspace");
        Ok(row)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<WorkspaceRow>, AppError> {
        Ok(
            sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkspaceRow>, AppError> {
        Ok(
            sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let row = sqlx::query_as::<_, CollaboratorRow>(
            r#"
            SELECT * FROM workspace_collaborators
            WHERE workspace_id = $1 AND user_id = $2 AND status = 'accepted'
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(to_record).transpose()
    }

    async fn update_privacy(
        &self,
        workspace_id: Uuid,
        mutation: PrivacyMutation,
    ) -> Result<PrivacyTransition, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WorkspaceRow>(
            "SELECT * FROM workspaces WHERE id = $1 FOR UPDATE",
        )
        .bind(workspace_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workspace {workspace_id} not found")))?;

        let current = row.privacy_for_update();
        let transition = run_mutation(current, mutation).await?;
        let next = &transition.config;

        sqlx::query(
            r#"
            UPDATE workspaces
            SET privacy_level = $1, secret_token = $2, password_hash = $3,
                allow_search_engines = $4, has_been_public = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(next.level.as_str())
        .bind(&next.secret_token)
        .bind(&next.password_hash)
        .bind(next.allow_search_engines)
        .bind(next.has_been_public)
        .bind(workspace_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transition)
    }

    async fn list_collaborators(
        &self,
        workspace_id: Uuid,
    ) -> Result<Vec<CollaborationRecord>, AppError> {
        sqlx::query_as::<_, CollaboratorRow>(
            "SELECT * FROM workspace_collaborators WHERE workspace_id = $1 ORDER BY created_at ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(to_record)
        .collect()
    }

    async fn find_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let row = sqlx::query_as::<_, CollaboratorRow>(
            "SELECT * FROM workspace_collaborators WHERE workspace_id = $1 AND id = $2",
        )
        .bind(workspace_id)
        .bind(collaborator_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(to_record).transpose()
    }

    async fn find_by_email(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<Option<CollaborationRecord>, AppError> {
        let row = sqlx::query_as::<_, CollaboratorRow>(
            r#"
            SELECT * FROM workspace_collaborators
            WHERE workspace_id = $1 AND invited_email = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(workspace_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(to_record).transpose()
    }

    async fn save_collaborator(&self, record: &CollaborationRecord) -> Result<(), AppError> {
        upsert_collaborator(&self.pool, record).await
    }

    async fn delete_collaborator(
        &self,
        workspace_id: Uuid,
        collaborator_id: Uuid,
    ) -> Result<(), AppError> {
        // The owner row is also protected here in case a caller skipped the rules.
        let result = sqlx::query(
            "DELETE FROM workspace_collaborators WHERE workspace_id = $1 AND id = $2 AND role <> 'owner'",
        )
        .bind(workspace_id)
        .bind(collaborator_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Collaborator {collaborator_id} not found"
            )));
        }
        Ok(())
    }
}
