//! Access decision for a published CV.
//!
//! `evaluate` is pure and total: every combination of privacy configuration and
//! request context yields a decision. Expected denials ("enter a password",
//! "sign in") are decisions, not errors.

use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};

use crate::models::workspace::{
    CollaborationRecord, PrivacyConfiguration, PrivacyLevel, WorkspaceRow,
};
use crate::privacy::credentials::verify_password;

pub const REASON_INVALID_TOKEN: &str = "Invalid or missing secret token";
pub const REASON_INCORRECT_PASSWORD: &str = "Incorrect password";
pub const REASON_AUTH_REQUIRED: &str = "Authentication required";
pub const REASON_INSUFFICIENT_PERMISSIONS: &str = "Access denied - insufficient permissions";
pub const REASON_INVALID_CONFIGURATION: &str = "Invalid privacy configuration";
pub const REASON_GENERIC_DENIAL: &str = "Access denied";

/// Everything the caller presented, resolved before evaluation.
#[derive(Debug, Clone, Default)]
pub struct AccessRequestContext {
    pub is_authenticated: bool,
    pub collaboration: Option<CollaborationRecord>,
    pub provided_token: Option<String>,
    pub provided_password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub can_access: bool,
    pub requires_password: bool,
    pub requires_authentication: bool,
    pub is_collaborator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    fn granted() -> Self {
        Self {
            can_access: true,
            ..Self::default()
        }
    }

    fn denied(reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// True when the visitor is being asked for something, not turned away.
    pub fn is_prompt(&self) -> bool {
        !self.can_access
            && self.reason.is_none()
            && (self.requires_password || self.requires_authentication)
    }
}

pub fn evaluate(config: &PrivacyConfiguration, ctx: &AccessRequestContext) -> AccessDecision {
    // Accepted collaborators keep access whatever the owner later sets the level to.
    if ctx
        .collaboration
        .as_ref()
        .is_some_and(CollaborationRecord::is_accepted)
    {
        return AccessDecision {
            can_access: true,
            is_collaborator: true,
            ..AccessDecision::default()
        };
    }

    match config.level {
        PrivacyLevel::Public => AccessDecision::granted(),
        PrivacyLevel::SecretLink => {
            let matches = match (&ctx.provided_token, &config.secret_token) {
                (Some(provided), Some(stored)) => {
                    constant_time_eq(provided.as_bytes(), stored.as_bytes())
                }
                _ => false,
            };
            if matches {
                AccessDecision::granted()
            } else {
                AccessDecision::denied(REASON_INVALID_TOKEN)
            }
        }
        PrivacyLevel::Password => match &ctx.provided_password {
            None => AccessDecision {
                requires_password: true,
                ..AccessDecision::default()
            },
            Some(password) => {
                let ok = config
                    .password_hash
                    .as_deref()
                    .is_some_and(|stored| verify_password(password, stored));
                if ok {
                    AccessDecision::granted()
                } else {
                    AccessDecision {
                        requires_password: true,
                        ..AccessDecision::denied(REASON_INCORRECT_PASSWORD)
                    }
                }
            }
        },
        PrivacyLevel::Private => {
            if ctx.is_authenticated {
                AccessDecision::denied(REASON_INSUFFICIENT_PERMISSIONS)
            } else {
                AccessDecision {
                    requires_authentication: true,
                    ..AccessDecision::denied(REASON_AUTH_REQUIRED)
                }
            }
        }
    }
}

/// Evaluates against a stored workspace row, whose level column may hold a
/// value this build does not recognise.
pub fn evaluate_stored(row: &WorkspaceRow, ctx: &AccessRequestContext) -> AccessDecision {
    match row.privacy() {
        Ok(config) => evaluate(&config, ctx),
        Err(e) => {
            tracing::error!(workspace_id = %row.id, "Stored privacy configuration is invalid: {e}");
            // Collaborators still get in; everyone else is refused.
            if ctx
                .collaboration
                .as_ref()
                .is_some_and(CollaborationRecord::is_accepted)
            {
                return evaluate(&PrivacyConfiguration::new_private(), ctx);
            }
            AccessDecision::denied(REASON_INVALID_CONFIGURATION)
        }
    }
}

/// Replaces reasons that describe server-side data problems with a generic one.
pub fn redact_for_visitor(mut decision: AccessDecision) -> AccessDecision {
    if decision.reason.as_deref() == Some(REASON_INVALID_CONFIGURATION) {
        decision.reason = Some(REASON_GENERIC_DENIAL.to_string());
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workspace::{
        CollaborationStatus, CollaboratorRole, Permissions,
    };
    use crate::privacy::credentials::{generate_token, hash_password};
    use chrono::Utc;
    use uuid::Uuid;

    fn config(level: PrivacyLevel) -> PrivacyConfiguration {
        PrivacyConfiguration {
            level,
            secret_token: None,
            password_hash: None,
            allow_search_engines: false,
            has_been_public: false,
        }
    }

    fn collaboration(status: CollaborationStatus) -> CollaborationRecord {
        CollaborationRecord {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            invited_email: "friend@example.com".to_string(),
            role: CollaboratorRole::Viewer,
            permissions: Permissions::default(),
            status,
            invited_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn row(level: &str) -> WorkspaceRow {
        WorkspaceRow {
            id: Uuid::new_v4(),
            slug: "jane-doe".to_string(),
            owner_id: Uuid::new_v4(),
            privacy_level: level.to_string(),
            secret_token: None,
            password_hash: None,
            allow_search_engines: false,
            has_been_public: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_accepted_collaborator_overrides_every_level() {
        let ctx = AccessRequestContext {
            is_authenticated: true,
            collaboration: Some(collaboration(CollaborationStatus::Accepted)),
            ..Default::default()
        };
        for level in PrivacyLevel::ALL {
            let decision = evaluate(&config(level), &ctx);
            assert!(decision.can_access, "level {level} should grant");
            assert!(decision.is_collaborator);
            assert!(decision.reason.is_none());
        }
    }

    #[test]
    fn test_pending_collaboration_confers_nothing() {
        let ctx = AccessRequestContext {
            is_authenticated: true,
            collaboration: Some(collaboration(CollaborationStatus::Pending)),
            ..Default::default()
        };
        let decision = evaluate(&config(PrivacyLevel::Private), &ctx);
        assert!(!decision.can_access);
        assert!(!decision.is_collaborator);
        assert_eq!(decision.reason.as_deref(), Some(REASON_INSUFFICIENT_PERMISSIONS));
    }

    #[test]
    fn test_declined_collaboration_confers_nothing() {
        let mut cfg = config(PrivacyLevel::SecretLink);
        cfg.secret_token = Some(generate_token());
        let ctx = AccessRequestContext {
            is_authenticated: true,
            collaboration: Some(collaboration(CollaborationStatus::Declined)),
            ..Default::default()
        };
        assert!(!evaluate(&cfg, &ctx).can_access);
    }

    #[test]
    fn test_public_is_unconditional() {
        let decision = evaluate(&config(PrivacyLevel::Public), &AccessRequestContext::default());
        assert_eq!(
            decision,
            AccessDecision {
                can_access: true,
                ..Default::default()
            }
        );

        let ctx = AccessRequestContext {
            provided_token: Some("junk".to_string()),
            provided_password: Some("junk".to_string()),
            ..Default::default()
        };
        assert!(evaluate(&config(PrivacyLevel::Public), &ctx).can_access);
    }

    #[test]
    fn test_secret_link_round_trip() {
        let token = generate_token();
        let mut cfg = config(PrivacyLevel::SecretLink);
        cfg.secret_token = Some(token.clone());

        let ok = evaluate(
            &cfg,
            &AccessRequestContext {
                provided_token: Some(token),
                ..Default::default()
            },
        );
        assert!(ok.can_access);

        let bad = evaluate(
            &cfg,
            &AccessRequestContext {
                provided_token: Some("wrong".to_string()),
                ..Default::default()
            },
        );
        assert!(!bad.can_access);
        assert_eq!(bad.reason.as_deref(), Some(REASON_INVALID_TOKEN));
        assert!(!bad.requires_password);
        assert!(!bad.requires_authentication);
    }

    #[test]
    fn test_secret_link_is_exact() {
        let mut cfg = config(PrivacyLevel::SecretLink);
        cfg.secret_token = Some("abcd".to_string());
        for attempt in ["abc", "ABCD", "abce", "abcd ", "abcde", ""] {
            let ctx = AccessRequestContext {
                provided_token: Some(attempt.to_string()),
                ..Default::default()
            };
            assert!(!evaluate(&cfg, &ctx).can_access, "{attempt:?} must not match");
        }

        cfg.secret_token = Some("abc".to_string());
        let ctx = AccessRequestContext {
            provided_token: Some("ABC".to_string()),
            ..Default::default()
        };
        assert!(!evaluate(&cfg, &ctx).can_access);
    }

    #[test]
    fn test_secret_link_without_stored_token_denies() {
        let ctx = AccessRequestContext {
            provided_token: Some(String::new()),
            ..Default::default()
        };
        let decision = evaluate(&config(PrivacyLevel::SecretLink), &ctx);
        assert!(!decision.can_access);
        assert_eq!(decision.reason.as_deref(), Some(REASON_INVALID_TOKEN));
    }

    #[test]
    fn test_password_flow() {
        let mut cfg = config(PrivacyLevel::Password);
        cfg.password_hash = Some(hash_password("sesame"));

        let ok = evaluate(
            &cfg,
            &AccessRequestContext {
                provided_password: Some("sesame".to_string()),
                ..Default::default()
            },
        );
        assert!(ok.can_access);

        let wrong = evaluate(
            &cfg,
            &AccessRequestContext {
                provided_password: Some("wrong".to_string()),
                ..Default::default()
            },
        );
        assert!(!wrong.can_access);
        assert!(wrong.requires_password);
        assert_eq!(wrong.reason.as_deref(), Some(REASON_INCORRECT_PASSWORD));
        assert!(!wrong.is_prompt());

        let ask = evaluate(&cfg, &AccessRequestContext::default());
        assert!(!ask.can_access);
        assert!(ask.requires_password);
        assert!(ask.reason.is_none());
        assert!(ask.is_prompt());
    }

    #[test]
    fn test_password_with_corrupt_hash_denies() {
        let mut cfg = config(PrivacyLevel::Password);
        cfg.password_hash = Some("corrupted".to_string());
        let ctx = AccessRequestContext {
            provided_password: Some("sesame".to_string()),
            ..Default::default()
        };
        let decision = evaluate(&cfg, &ctx);
        assert!(!decision.can_access);
        assert_eq!(decision.reason.as_deref(), Some(REASON_INCORRECT_PASSWORD));
    }

    #[test]
    fn test_private_denial_reasons() {
        let anon = evaluate(&config(PrivacyLevel::Private), &AccessRequestContext::default());
        assert!(!anon.can_access);
        assert!(anon.requires_authentication);
        assert_eq!(anon.reason.as_deref(), Some(REASON_AUTH_REQUIRED));

        let signed_in = evaluate(
            &config(PrivacyLevel::Private),
            &AccessRequestContext {
                is_authenticated: true,
                ..Default::default()
            },
        );
        assert!(!signed_in.can_access);
        assert!(!signed_in.requires_authentication);
        assert_eq!(
            signed_in.reason.as_deref(),
            Some(REASON_INSUFFICIENT_PERMISSIONS)
        );
    }

    #[test]
    fn test_credentials_ignored_when_level_inactive() {
        let mut cfg = config(PrivacyLevel::Private);
        cfg.secret_token = Some("tok".to_string());
        cfg.password_hash = Some(hash_password("pw"));
        let ctx = AccessRequestContext {
            provided_token: Some("tok".to_string()),
            provided_password: Some("pw".to_string()),
            ..Default::default()
        };
        assert!(!evaluate(&cfg, &ctx).can_access);
    }

    #[test]
    fn test_unknown_stored_level_denies() {
        let decision = evaluate_stored(&row("friends_only"), &AccessRequestContext::default());
        assert!(!decision.can_access);
        assert_eq!(decision.reason.as_deref(), Some(REASON_INVALID_CONFIGURATION));

        let redacted = redact_for_visitor(decision);
        assert_eq!(redacted.reason.as_deref(), Some(REASON_GENERIC_DENIAL));
    }

    #[test]
    fn test_unknown_stored_level_still_admits_collaborator() {
        let ctx = AccessRequestContext {
            is_authenticated: true,
            collaboration: Some(collaboration(CollaborationStatus::Accepted)),
            ..Default::default()
        };
        assert!(evaluate_stored(&row("garbage"), &ctx).can_access);
    }

    #[test]
    fn test_stored_public_row_grants() {
        assert!(evaluate_stored(&row("public"), &AccessRequestContext::default()).can_access);
    }
}
