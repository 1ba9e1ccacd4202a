//! Caller identity.
//!
//! Sign-in happens at the upstream auth gateway, which forwards the verified
//! user as `x-user-id` / `x-user-email`. Requests without those headers are
//! anonymous visitors.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn require_email(&self) -> Result<&str, AppError> {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Signed-in email is required".to_string()))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn user_from_parts(parts: &Parts) -> Result<Option<AuthUser>, AppError> {
    let Some(raw) = header_str(parts, USER_ID_HEADER) else {
        return Ok(None);
    };
    let id = Uuid::parse_str(raw.trim()).map_err(|_| AppError::Unauthorized)?;
    Ok(Some(AuthUser {
        id,
        email: header_str(parts, USER_EMAIL_HEADER).map(str::to_string),
    }))
}

/// The signed-in user, if any.
pub struct MaybeUser(pub Option<AuthUser>);

/// The signed-in user; `401` otherwise.
pub struct RequireUser(pub AuthUser);

/// Key used to rate-limit the caller: user id when signed in, else client IP.
///
/// `x-forwarded-for` is only honored when the deployment sits behind a proxy
/// that appends the real peer (`TRUST_FORWARDED_FOR`), and then only its last
/// hop. Otherwise the socket peer address is used.
pub struct ClientId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_from_parts(parts)?))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_parts(parts)?
            .map(RequireUser)
            .ok_or(AppError::Unauthorized)
    }
}

pub fn client_key(parts: &Parts, trust_forwarded_for: bool) -> String {
    if let Ok(Some(user)) = user_from_parts(parts) {
        return format!("user:{}", user.id);
    }
    if trust_forwarded_for {
        let hop = header_str(parts, FORWARDED_FOR_HEADER)
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = hop {
            return format!("ip:{hop}");
        }
    }
    match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => format!("ip:{}", peer.ip()),
        None => "anonymous".to_string(),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientId(client_key(parts, state.config.trust_forwarded_for)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_missing_user_is_anonymous() {
        let mut p = parts(&[]);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut p, &()).await.unwrap();
        assert!(user.is_none());
        assert!(RequireUser::from_request_parts(&mut p, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_user_id_is_rejected() {
        let mut p = parts(&[(USER_ID_HEADER, "not-a-uuid")]);
        let err = MaybeUser::from_request_parts(&mut p, &()).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_client_key_prefers_user() {
        let id = Uuid::new_v4();
        let p = parts(&[
            (USER_ID_HEADER, &id.to_string()),
            (FORWARDED_FOR_HEADER, "10.0.0.1"),
        ]);
        assert_eq!(client_key(&p, true), format!("user:{id}"));
    }

    #[test]
    fn test_client_key_ignores_forwarded_for_unless_trusted() {
        let mut p = parts(&[(FORWARDED_FOR_HEADER, "198.51.100.7")]);
        assert_eq!(client_key(&p, false), "anonymous");

        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40000))));
        assert_eq!(client_key(&p, false), "ip:192.0.2.10");
    }

    #[test]
    fn test_client_key_uses_last_forwarded_hop_when_trusted() {
        let mut p = parts(&[(FORWARDED_FOR_HEADER, " 203.0.113.9, 10.0.0.1 ")]);
        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40000))));
        assert_eq!(client_key(&p, true), "ip:10.0.0.1");

        let p = parts(&[]);
        assert_eq!(client_key(&p, true), "anonymous");
    }
}
