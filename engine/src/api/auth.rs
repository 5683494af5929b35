//! Request authentication
//!
//! Two independent schemes:
//! - operator sessions: `Authorization: Bearer <token>` or the
//!   `alkulous_session` cookie, checked against the in-memory `SessionRegistry`
//! - external callers: `x-api-key`, checked against the `api_keys` table

use super::{ApiError, AppState};
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use rand::Rng;
use sdk::types::ApiKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SESSION_COOKIE: &str = "alkulous_session";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Sessions expire after 24 hours
const SESSION_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone)]
struct SessionToken {
    created_at: u64,
    /// Configured tokens never expire
    permanent: bool,
}

/// Valid operator session tokens
#[derive(Debug, Default)]
pub struct SessionRegistry {
    tokens: Mutex<HashMap<String, SessionToken>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and register a new 24-hour token
    pub fn issue(&self) -> String {
        let token = generate_token();
        self.insert(token.clone(), now_secs(), false);
        tracing::info!("Generated new session token");
        token
    }

    /// Register a fixed token (from config) that never expires
    pub fn register_permanent(&self, token: impl Into<String>) {
        self.insert(token.into(), now_secs(), true);
    }

    pub fn validate(&self, token: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens
            .get(token)
            .is_some_and(|t| is_live(t, now_secs()))
    }

    fn insert(&self, token: String, created_at: u64, permanent: bool) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let now = now_secs();
        // Clean up expired tokens
        tokens.retain(|_, t| is_live(t, now));
        tokens.insert(
            token,
            SessionToken {
                created_at,
                permanent,
            },
        );
    }
}

fn is_live(token: &SessionToken, now: u64) -> bool {
    token.permanent || now.saturating_sub(token.created_at) < SESSION_TTL_SECS
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Generate a 32-character alphanumeric token
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..62u8);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}

/// Session token from the bearer header, falling back to the cookie
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// Extractor guarding operator-only routes
#[derive(Debug, Clone, Copy)]
pub struct OperatorSession;

#[axum::async_trait]
impl FromRequestParts<AppState> for OperatorSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match session_token(&parts.headers) {
            Some(token) if state.sessions.validate(token) => Ok(OperatorSession),
            Some(_) => Err(ApiError::unauthorized("Invalid or expired session")),
            None => Err(ApiError::unauthorized("Unauthorized")),
        }
    }
}

/// Extractor resolving the `x-api-key` header to a stored key
#[derive(Debug, Clone)]
pub struct ApiKeyCaller(pub ApiKey);

#[axum::async_trait]
impl FromRequestParts<AppState> for ApiKeyCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing API Key"))?;

        match state.api_keys.find_by_key(key).await? {
            Some(api_key) => Ok(ApiKeyCaller(api_key)),
            None => Err(ApiError::unauthorized("Invalid API Key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        // Tokens should be 32 characters long
        assert_eq!(token1.len(), 32);
        assert_eq!(token2.len(), 32);

        // Tokens should be different
        assert_ne!(token1, token2);

        // Tokens should only contain alphanumeric characters
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_registry_validates_issued_tokens() {
        let registry = SessionRegistry::new();
        let token = registry.issue();

        assert!(registry.validate(&token));
        assert!(!registry.validate("invalid_token"));
    }

    #[test]
    fn test_token_expiration() {
        let now = now_secs();

        // Token that's 23 hours old (should be valid)
        let recent = SessionToken {
            created_at: now - 82_800,
            permanent: false,
        };
        assert!(is_live(&recent, now));

        // Token that's 25 hours old (should be invalid)
        let old = SessionToken {
            created_at: now - 90_000,
            permanent: false,
        };
        assert!(!is_live(&old, now));

        // Configured tokens never expire
        let fixed = SessionToken {
            created_at: now - 90_000,
            permanent: true,
        };
        assert!(is_live(&fixed, now));
    }

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; alkulous_session=abc123"),
        );
        assert_eq!(session_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers), Some("xyz"));
    }
}
