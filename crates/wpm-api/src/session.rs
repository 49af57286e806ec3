use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, warn};

use wpm_db::Database;
use wpm_types::models::UserIdentity;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";
pub const SESSION_TTL_HOURS: i64 = 24;

/// 256 bits of randomness per token.
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session cookie")]
    NoSession,
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A freshly issued session, ready to be handed to the client.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Map a session token to the identity it authenticates.
///
/// An expired session is deleted on the way out and reported exactly like a
/// missing one would be to the caller (`Expired` vs `NotFound` is only kept
/// apart for logging). Failing to delete it is logged and otherwise ignored.
pub fn resolve(
    db: &Database,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UserIdentity, SessionError> {
    let token = token.ok_or(SessionError::NoSession)?;
    let session = db.get_session(token)?.ok_or(SessionError::NotFound)?;

    if now > session.expires_at {
        if let Err(e) = db.delete_session(token) {
            warn!("Failed to delete expired session for user {}: {:#}", session.user_id, e);
        }
        return Err(SessionError::Expired);
    }

    let user = db
        .get_user_by_id(session.user_id)?
        .ok_or(SessionError::NotFound)?;

    Ok(user.into())
}

pub fn issue(db: &Database, user_id: i64, now: DateTime<Utc>) -> anyhow::Result<NewSession> {
    let session = NewSession {
        token: generate_token(),
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
    };
    db.create_session(&session.token, user_id, session.expires_at)?;
    Ok(session)
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn session_cookie(session: &NewSession) -> anyhow::Result<Cookie<'static>> {
    let expires = time::OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp())?;

    Ok(Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .expires(expires)
        .build())
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn session_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

async fn resolve_request(parts: &Parts, state: &AppState) -> Result<UserIdentity, SessionError> {
    let token = session_token(parts);
    let state = state.clone();
    tokio::task::spawn_blocking(move || resolve(&state.db, token.as_deref(), Utc::now()))
        .await
        .map_err(|e| SessionError::Store(e.into()))?
}

/// Extractor for routes that require a session. Rejects with a redirect to
/// the login page.
pub struct CurrentUser(pub UserIdentity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(resolve_request(parts, state).await?))
    }
}

/// Extractor for JSON endpoints that require a session. Rejects with 401
/// instead of a redirect, before any body extractor runs.
pub struct ApiUser(pub UserIdentity);

impl FromRequestParts<AppState> for ApiUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_request(parts, state).await {
            Ok(user) => Ok(ApiUser(user)),
            Err(SessionError::Store(e)) => Err(ApiError::Store(e)),
            Err(e) => {
                debug!("Rejecting API request: {}", e);
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Extractor for routes that only annotate their output with the caller.
/// Store failures still reject; any other session problem reads as anonymous.
pub struct MaybeUser(pub Option<UserIdentity>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_request(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(SessionError::Store(e)) => Err(ApiError::Store(e)),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_alice() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("alice", "a@x.com", "A", "B", "hash").unwrap();
        (db, id)
    }

    #[test]
    fn test_missing_token() {
        let (db, _) = db_with_alice();
        assert!(matches!(resolve(&db, None, Utc::now()), Err(SessionError::NoSession)));
    }

    #[test]
    fn test_unknown_token() {
        let (db, _) = db_with_alice();
        assert!(matches!(
            resolve(&db, Some("nope"), Utc::now()),
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn test_valid_session_resolves_full_profile() {
        let (db, id) = db_with_alice();
        let now = Utc::now();
        let session = issue(&db, id, now).unwrap();

        let user = resolve(&db, Some(&session.token), now).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert!(!user.is_admin);
        assert_eq!(session.expires_at - now, Duration::hours(24));
    }

    #[test]
    fn test_expired_session_is_deleted() {
        let (db, id) = db_with_alice();
        let issued_at = Utc::now();
        let session = issue(&db, id, issued_at).unwrap();

        let later = issued_at + Duration::hours(SESSION_TTL_HOURS) + Duration::seconds(1);
        assert!(matches!(
            resolve(&db, Some(&session.token), later),
            Err(SessionError::Expired)
        ));
        assert!(db.get_session(&session.token).unwrap().is_none());

        // a second access behaves like any unknown token
        assert!(matches!(
            resolve(&db, Some(&session.token), later),
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn test_tokens_are_unique_and_long() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_session_cookie_flags() {
        let session = NewSession {
            token: "abc".into(),
            expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
        };
        let cookie = session_cookie(&session).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        let expires = cookie.expires_datetime().unwrap();
        assert_eq!(expires.unix_timestamp(), session.expires_at.timestamp());
    }
}
