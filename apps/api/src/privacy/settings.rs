//! Owner-side privacy transitions.
//!
//! Callers must have verified the owner before invoking `set_privacy_level`;
//! the store applies the result under a row lock.

use crate::models::workspace::{PrivacyConfiguration, PrivacyLevel};
use crate::privacy::credentials::{generate_token, hash_password};
use crate::privacy::PrivacyError;

#[derive(Debug, Clone, Default)]
pub struct PrivacyUpdate {
    pub new_password: Option<String>,
    pub regenerate_token: bool,
    pub allow_search_engines: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PrivacyTransition {
    pub config: PrivacyConfiguration,
    /// Plaintext token minted by this transition; handed back exactly once.
    pub generated_token: Option<String>,
}

pub fn set_privacy_level(
    current: &PrivacyConfiguration,
    new_level: PrivacyLevel,
    update: PrivacyUpdate,
) -> Result<PrivacyTransition, PrivacyError> {
    let mut next = current.clone();
    let mut generated_token = None;

    match new_level {
        PrivacyLevel::SecretLink => {
            if update.regenerate_token || next.secret_token.is_none() {
                let token = generate_token();
                next.secret_token = Some(token.clone());
                generated_token = Some(token);
            }
        }
        PrivacyLevel::Password => match update.new_password.as_deref() {
            Some(password) if password.trim().is_empty() => {
                return Err(PrivacyError::EmptyPassword);
            }
            Some(password) => next.password_hash = Some(hash_password(password)),
            None if next.password_hash.is_none() => return Err(PrivacyError::PasswordRequired),
            None => {}
        },
        PrivacyLevel::Public | PrivacyLevel::Private => {}
    }

    next.allow_search_engines = match update.allow_search_engines {
        Some(explicit) => explicit,
        None if new_level == PrivacyLevel::Public && !current.has_been_public => true,
        None => current.allow_search_engines,
    };
    if new_level == PrivacyLevel::Public {
        next.has_been_public = true;
    }
    next.level = new_level;

    Ok(PrivacyTransition {
        config: next,
        generated_token,
    })
}

/// Same as [`set_privacy_level`] for a level that arrived as a string.
pub fn set_privacy_level_str(
    current: &PrivacyConfiguration,
    new_level: &str,
    update: PrivacyUpdate,
) -> Result<PrivacyTransition, PrivacyError> {
    set_privacy_level(current, new_level.parse()?, update)
}
