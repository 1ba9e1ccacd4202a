//! Membership rules for a workspace.
//!
//! The owner record is created accepted with the workspace and is immutable
//! afterwards: it cannot be removed, demoted, or leave. Nobody is ever promoted
//! to owner.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::workspace::{
    CollaborationRecord, CollaborationStatus, CollaboratorRole, Permissions,
};

const SLUG_MIN: usize = 3;
const SLUG_MAX: usize = 64;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lower-case ASCII letters, digits and `-`, no leading/trailing `-`.
pub fn validate_slug(slug: &str) -> Result<String, AppError> {
    let slug = slug.trim().to_lowercase();
    if slug.len() < SLUG_MIN || slug.len() > SLUG_MAX {
        return Err(AppError::Validation(format!(
            "slug must be between {SLUG_MIN} and {SLUG_MAX} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::Validation(
            "slug may only contain letters, digits and '-'".to_string(),
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(AppError::Validation(
            "slug cannot start or end with '-'".to_string(),
        ));
    }
    Ok(slug)
}

pub fn owner_record(
    workspace_id: Uuid,
    owner_id: Uuid,
    owner_email: &str,
    now: DateTime<Utc>,
) -> CollaborationRecord {
    CollaborationRecord {
        id: Uuid::new_v4(),
        workspace_id,
        user_id: Some(owner_id),
        invited_email: normalize_email(owner_email),
        role: CollaboratorRole::Owner,
        permissions: Permissions::all(),
        status: CollaborationStatus::Accepted,
        invited_by: None,
        created_at: now,
        updated_at: now,
    }
}

/// Returns the actor's membership if it is accepted, else `Forbidden`.
pub fn require_member(actor: Option<&CollaborationRecord>) -> Result<&CollaborationRecord, AppError> {
    actor
        .filter(|m| m.is_accepted())
        .ok_or_else(|| AppError::Forbidden("Not a member of this workspace".to_string()))
}

pub fn require_owner(actor: Option<&CollaborationRecord>) -> Result<&CollaborationRecord, AppError> {
    let member = require_member(actor)?;
    if member.role != CollaboratorRole::Owner {
        return Err(AppError::Forbidden(
            "Only the workspace owner can do this".to_string(),
        ));
    }
    Ok(member)
}

/// Builds a pending invitation. `existing` is any live (pending or accepted)
/// record already held by the invited email.
///
/// Granting anything beyond the role's baseline permissions takes
/// `can_manage_settings`.
pub fn new_invitation(
    inviter: Option<&CollaborationRecord>,
    existing: Option<&CollaborationRecord>,
    email: &str,
    role: CollaboratorRole,
    permissions: Option<Permissions>,
    now: DateTime<Utc>,
) -> Result<CollaborationRecord, AppError> {
    let inviter = require_member(inviter)?;
    if !inviter.permissions.can_invite_others {
        return Err(AppError::Forbidden(
            "You do not have permission to invite others".to_string(),
        ));
    }
    if role == CollaboratorRole::Owner {
        return Err(AppError::Validation(
            "A workspace has exactly one owner".to_string(),
        ));
    }
    let baseline = Permissions::for_role(role);
    let permissions = permissions.unwrap_or(baseline);
    if !inviter.permissions.can_manage_settings && !permissions.is_within(&baseline) {
        return Err(AppError::Forbidden(
            "Only members who manage settings can grant extra permissions".to_string(),
        ));
    }
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if let Some(existing) = existing {
        if existing.status != CollaborationStatus::Declined {
            return Err(AppError::Conflict(format!(
                "{email} is already {}",
                existing.status.as_str()
            )));
        }
    }

    Ok(CollaborationRecord {
        id: Uuid::new_v4(),
        workspace_id: inviter.workspace_id,
        user_id: None,
        invited_email: email,
        role,
        permissions,
        status: CollaborationStatus::Pending,
        invited_by: inviter.user_id,
        created_at: now,
        updated_at: now,
    })
}

fn respond(
    record: &mut CollaborationRecord,
    user_id: Uuid,
    email: &str,
    status: CollaborationStatus,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if normalize_email(email) != record.invited_email {
        return Err(AppError::Forbidden(
            "This invitation was sent to a different email".to_string(),
        ));
    }
    if record.status != CollaborationStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Invitation is already {}",
            record.status.as_str()
        )));
    }
    record.status = status;
    if status == CollaborationStatus::Accepted {
        record.user_id = Some(user_id);
    }
    record.updated_at = now;
    Ok(())
}

pub fn accept_invitation(
    record: &mut CollaborationRecord,
    user_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    respond(record, user_id, email, CollaborationStatus::Accepted, now)
}

pub fn decline_invitation(
    record: &mut CollaborationRecord,
    user_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    respond(record, user_id, email, CollaborationStatus::Declined, now)
}

pub fn change_membership(
    actor: Option<&CollaborationRecord>,
    target: &mut CollaborationRecord,
    role: Option<CollaboratorRole>,
    permissions: Option<Permissions>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let actor = require_member(actor)?;
    if !actor.permissions.can_manage_settings {
        return Err(AppError::Forbidden(
            "You do not have permission to manage members".to_string(),
        ));
    }
    if target.role == CollaboratorRole::Owner {
        return Err(AppError::Forbidden(
            "The workspace owner cannot be changed".to_string(),
        ));
    }
    if role == Some(CollaboratorRole::Owner) {
        return Err(AppError::Validation(
            "A workspace has exactly one owner".to_string(),
        ));
    }

    if let Some(role) = role {
        target.role = role;
        if permissions.is_none() {
            target.permissions = Permissions::for_role(role);
        }
    }
    if let Some(permissions) = permissions {
        target.permissions = permissions;
    }
    target.updated_at = now;
    Ok(())
}

/// Removal by a manager, or the member leaving on their own.
pub fn ensure_removable(
    actor: Option<&CollaborationRecord>,
    target: &CollaborationRecord,
) -> Result<(), AppError> {
    let actor = require_member(actor)?;
    if target.role == CollaboratorRole::Owner {
        return Err(AppError::Forbidden(
            "The workspace owner cannot be removed".to_string(),
        ));
    }
    let is_self = actor.id == target.id;
    if !is_self && !actor.permissions.can_manage_settings {
        return Err(AppError::Forbidden(
            "You do not have permission to remove members".to_string(),
        ));
    }
    Ok(())
}
