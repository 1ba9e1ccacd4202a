// CV privacy: credentials, the access decision, owner-side settings changes.
// `credentials`, `policy` and `settings` are synchronous and free of I/O;
// `access` resolves the lookups and `handlers` exposes them over HTTP.

pub mod access;
pub mod credentials;
pub mod handlers;
pub mod policy;
pub mod settings;

use thiserror::Error;

/// Rejections of an owner's privacy change. Never produced by a visitor read.
#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error("Invalid privacy level: {0}")]
    InvalidLevel(String),

    #[error("A password is required to enable password protection")]
    PasswordRequired,

    #[error("Password cannot be empty")]
    EmptyPassword,
}
