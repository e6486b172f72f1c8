//! Authenticated principal extraction.
//!
//! Sessions are issued by the identity service; this crate only reads the
//! session token (cookie or bearer), hashes it and resolves it to a user.

use axum::http::{
    HeaderMap, StatusCode,
    header::{AUTHORIZATION, COOKIE},
};
use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

use crate::questions::AccountStore;

pub const SESSION_COOKIE_NAME: &str = "enroll_session";

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

/// Resolve the session into a principal, or return 401 for missing sessions.
pub async fn require_auth(
    headers: &HeaderMap,
    store: &dyn AccountStore,
) -> Result<Principal, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    match store.lookup_session(&hash_session_token(&token)).await {
        Ok(Some(user)) => Ok(Principal {
            user_id: user.user_id,
            email: user.email,
        }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Hash a session token so raw values never touch the database.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME)
            .then(|| val.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}
