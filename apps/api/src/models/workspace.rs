use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::privacy::PrivacyError;

/// Who can open a published CV. Exactly one level is active per workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    SecretLink,
    Password,
    Private,
}

impl PrivacyLevel {
    pub const ALL: [PrivacyLevel; 4] = [
        PrivacyLevel::Public,
        PrivacyLevel::SecretLink,
        PrivacyLevel::Password,
        PrivacyLevel::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::SecretLink => "secret_link",
            PrivacyLevel::Password => "password",
            PrivacyLevel::Private => "private",
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "secret_link" => Ok(PrivacyLevel::SecretLink),
            "password" => Ok(PrivacyLevel::Password),
            "private" => Ok(PrivacyLevel::Private),
            other => Err(PrivacyError::InvalidLevel(other.to_string())),
        }
    }
}

/// Privacy settings embedded in a workspace.
///
/// `secret_token` and `password_hash` outlive level changes so that switching
/// back to a previous level restores the credentials visitors already hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyConfiguration {
    pub level: PrivacyLevel,
    pub secret_token: Option<String>,
    /// `"<saltHex>:<derivedKeyHex>"`, never plaintext.
    pub password_hash: Option<String>,
    pub allow_search_engines: bool,
    /// Set once the workspace has been public at least once.
    pub has_been_public: bool,
}

impl PrivacyConfiguration {
    /// Settings for a freshly created workspace: private, unindexed, no credentials.
    pub fn new_private() -> Self {
        Self {
            level: PrivacyLevel::Private,
            secret_token: None,
            password_hash: None,
            allow_search_engines: false,
            has_been_public: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Owner,
    Collaborator,
    Viewer,
}

impl CollaboratorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaboratorRole::Owner => "owner",
            CollaboratorRole::Collaborator => "collaborator",
            CollaboratorRole::Viewer => "viewer",
        }
    }
}

impl FromStr for CollaboratorRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(CollaboratorRole::Owner),
            "collaborator" => Ok(CollaboratorRole::Collaborator),
            "viewer" => Ok(CollaboratorRole::Viewer),
            other => Err(anyhow::anyhow!("unknown collaborator role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    Pending,
    Accepted,
    Declined,
}

impl CollaborationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaborationStatus::Pending => "pending",
            CollaborationStatus::Accepted => "accepted",
            CollaborationStatus::Declined => "declined",
        }
    }
}

impl FromStr for CollaborationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CollaborationStatus::Pending),
            "accepted" => Ok(CollaborationStatus::Accepted),
            "declined" => Ok(CollaborationStatus::Declined),
            other => Err(anyhow::anyhow!("unknown collaboration status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_edit: bool,
    pub can_suggest_changes: bool,
    pub can_view_analytics: bool,
    pub can_invite_others: bool,
    pub can_manage_settings: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            can_edit: true,
            can_suggest_changes: true,
            can_view_analytics: true,
            can_invite_others: true,
            can_manage_settings: true,
        }
    }

    /// Baseline permissions granted to a new member of the given role.
    pub fn for_role(role: CollaboratorRole) -> Self {
        match role {
            CollaboratorRole::Owner => Self::all(),
            CollaboratorRole::Collaborator => Self {
                can_edit: true,
                can_suggest_changes: true,
                ..Self::default()
            },
            CollaboratorRole::Viewer => Self::default(),
        }
    }

    /// True when every flag set here is also set in `other`.
    pub fn is_within(&self, other: &Permissions) -> bool {
        (!self.can_edit || other.can_edit)
            && (!self.can_suggest_changes || other.can_suggest_changes)
            && (!self.can_view_analytics || other.can_view_analytics)
            && (!self.can_invite_others || other.can_invite_others)
            && (!self.can_manage_settings || other.can_manage_settings)
    }
}

/// A user's membership in a workspace. Only `Accepted` records grant access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// Unset until an invitation is accepted.
    pub user_id: Option<Uuid>,
    pub invited_email: String,
    pub role: CollaboratorRole,
    pub permissions: Permissions,
    pub status: CollaborationStatus,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationRecord {
    pub fn is_accepted(&self) -> bool {
        self.status == CollaborationStatus::Accepted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub slug: String,
    pub owner_id: Uuid,
    pub privacy_level: String,
    pub secret_token: Option<String>,
    pub password_hash: Option<String>,
    pub allow_search_engines: bool,
    pub has_been_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceRow {
    /// Decodes the embedded privacy columns. Fails on an unknown stored level.
    pub fn privacy(&self) -> Result<PrivacyConfiguration, PrivacyError> {
        Ok(PrivacyConfiguration {
            level: self.privacy_level.parse()?,
            secret_token: self.secret_token.clone(),
            password_hash: self.password_hash.clone(),
            allow_search_engines: self.allow_search_engines,
            has_been_public: self.has_been_public,
        })
    }

    /// Configuration an owner edits. A corrupt stored level reads as `Private`
    /// with credentials kept, so the next update repairs the row.
    pub fn privacy_for_update(&self) -> PrivacyConfiguration {
        self.privacy().unwrap_or_else(|e| {
            tracing::warn!(workspace_id = %self.id, "Replacing invalid stored privacy level: {e}");
            PrivacyConfiguration {
                level: PrivacyLevel::Private,
                secret_token: self.secret_token.clone(),
                password_hash: self.password_hash.clone(),
                allow_search_engines: self.allow_search_engines,
                has_been_public: self.has_been_public,
            }
        })
    }

    pub fn apply_privacy(&mut self, config: &PrivacyConfiguration) {
        self.privacy_level = config.level.as_str().to_string();
        self.secret_token = config.secret_token.clone();
        self.password_hash = config.password_hash.clone();
        self.allow_search_engines = config.allow_search_engines;
        self.has_been_public = config.has_been_public;
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CollaboratorRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Option<Uuid>,
    pub invited_email: String,
    pub role: String,
    pub can_edit: bool,
    pub can_suggest_changes: bool,
    pub can_view_analytics: bool,
    pub can_invite_others: bool,
    pub can_manage_settings: bool,
    pub status: String,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CollaboratorRow> for CollaborationRecord {
    type Error = anyhow::Error;

    fn try_from(row: CollaboratorRow) -> Result<Self, Self::Error> {
        Ok(CollaborationRecord {
            id: row.id,
            workspace_id: row.workspace_id,
            user_id: row.user_id,
            invited_email: row.invited_email,
            role: row.role.parse()?,
            permissions: Permissions {
                can_edit: row.can_edit,
                can_suggest_changes: row.can_suggest_changes,
                can_view_analytics: row.can_view_analytics,
                can_invite_others: row.can_invite_others,
                can_manage_settings: row.can_manage_settings,
            },
            status: row.status.parse()?,
            invited_by: row.invited_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_level_parse_round_trip() {
        for level in PrivacyLevel::ALL {
            assert_eq!(level.as_str().parse::<PrivacyLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_privacy_for_update_falls_back_to_private() {
        let now = Utc::now();
        let row = WorkspaceRow {
            id: Uuid::new_v4(),
            slug: "jane-doe".to_string(),
            owner_id: Uuid::new_v4(),
            privacy_level: "friends_only".to_string(),
            secret_token: Some("tok".to_string()),
            password_hash: Some("salt:key".to_string()),
            allow_search_engines: true,
            has_been_public: true,
            created_at: now,
            updated_at: now,
        };
        assert!(row.privacy().is_err());

        let config = row.privacy_for_update();
        assert_eq!(config.level, PrivacyLevel::Private);
        assert_eq!(config.secret_token.as_deref(), Some("tok"));
        assert_eq!(config.password_hash.as_deref(), Some("salt:key"));
        assert!(config.allow_search_engines);
        assert!(config.has_been_public);
    }

    #[test]
    fn test_privacy_level_rejects_unknown() {
        let err = "friends_only".parse::<PrivacyLevel>().unwrap_err();
        assert!(matches!(err, PrivacyError::InvalidLevel(ref v) if v == "friends_only"));
    }

    #[test]
    fn test_privacy_level_serializes_snake_case() {
        let json = serde_json::to_string(&PrivacyLevel::SecretLink).unwrap();
        assert_eq!(json, "\"secret_link\"");
    }

    #[test]
    fn test_viewer_has_no_permissions() {
        assert_eq!(Permissions::for_role(CollaboratorRole::Viewer), Permissions::default());
    }

    #[test]
    fn test_collaborator_can_edit_but_not_manage() {
        let p = Permissions::for_role(CollaboratorRole::Collaborator);
        assert!(p.can_edit);
        assert!(p.can_suggest_changes);
        assert!(!p.can_manage_settings);
        assert!(!p.can_invite_others);
    }

    #[test]
    fn test_permissions_is_within() {
        let collaborator = Permissions::for_role(CollaboratorRole::Collaborator);
        assert!(Permissions::default().is_within(&collaborator));
        assert!(collaborator.is_within(&collaborator));
        assert!(collaborator.is_within(&Permissions::all()));
        assert!(!Permissions::all().is_within(&collaborator));
    }
}
