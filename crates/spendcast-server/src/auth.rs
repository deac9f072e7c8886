//! Request authentication
//!
//! Spendcast never handles passwords or cookies. Identity comes from one of:
//! - An identity header set by an authenticating reverse proxy
//!   (`x-forwarded-email` unless `SPENDCAST_USER_HEADER` says otherwise)
//! - A per-user API key sent as `Authorization: Bearer <key>`
//!
//! The auth middleware turns the outcome into a `RequestContext` that every
//! handler takes as an extractor.
//!
//! Anyone who can reach the port directly can send the identity header, so it
//! is only honoured when no API keys are configured, or when
//! `SPENDCAST_TRUST_USER_HEADER` is set for a deployment that sits behind a
//! proxy which strips the header from client requests.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use tracing::warn;

use crate::AppError;

/// Environment variable naming the identity header
pub const USER_HEADER_ENV: &str = "SPENDCAST_USER_HEADER";

/// Environment variable holding API keys (`user=key,user2=key2`)
pub const API_KEYS_ENV: &str = "SPENDCAST_API_KEYS";

/// Environment variable that keeps the identity header trusted alongside API keys
pub const TRUST_USER_HEADER_ENV: &str = "SPENDCAST_TRUST_USER_HEADER";

/// Identity header used when none is configured
pub const DEFAULT_USER_HEADER: &str = "x-forwarded-email";

/// User identifier used when authentication is disabled
pub const LOCAL_USER: &str = "local-dev";

const AUTHORIZATION_HEADER: &str = "authorization";

pub type UserId = String;

/// How a request was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ProxyHeader,
    ApiKey,
    /// Authentication disabled (local development)
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProxyHeader => "proxy_header",
            Self::ApiKey => "api_key",
            Self::None => "none",
        }
    }
}

/// What a request presents to prove who it is
pub struct Credentials<'a> {
    pub headers: &'a HeaderMap,
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
    pub method: AuthMethod,
}

/// Pluggable authentication backend
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credentials: &Credentials<'_>) -> Option<Session>;

    fn current_user(&self, session: &Session) -> Option<UserId>;
}

/// An API key bound to a user
#[derive(Clone)]
pub struct ApiKey {
    pub user: UserId,
    pub key: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("user", &self.user)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Parse `user=key` pairs separated by commas
///
/// Malformed entries are skipped with a warning.
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once('=') {
                Some((user, key)) if !user.trim().is_empty() && !key.trim().is_empty() => {
                    Some(ApiKey {
                        user: user.trim().to_string(),
                        key: key.trim().to_string(),
                    })
                }
                _ => {
                    warn!("Ignoring malformed API key entry (expected user=key)");
                    None
                }
            }
        })
        .collect()
}

/// Trusts a reverse proxy's identity header, or a per-user API key
///
/// With API keys configured the header is ignored unless
/// [`with_trusted_header`](Self::with_trusted_header) turns it back on.
#[derive(Debug, Clone)]
pub struct ProxyAuthenticator {
    user_header: String,
    api_keys: Vec<ApiKey>,
    header_trusted: bool,
}

impl ProxyAuthenticator {
    pub fn new(user_header: impl Into<String>, api_keys: Vec<ApiKey>) -> Self {
        Self {
            user_header: user_header.into().to_lowercase(),
            header_trusted: api_keys.is_empty(),
            api_keys,
        }
    }

    /// Also accept the identity header when API keys are configured
    pub fn with_trusted_header(mut self, trusted: bool) -> Self {
        self.header_trusted = trusted || self.api_keys.is_empty();
        self
    }

    pub fn user_header(&self) -> &str {
        &self.user_header
    }

    pub fn header_trusted(&self) -> bool {
        self.header_trusted
    }

    /// Find the user owning `provided`, comparing in constant time
    fn user_for_key(&self, provided: &str) -> Option<&str> {
        use subtle::ConstantTimeEq;

        let provided_bytes = provided.as_bytes();
        let mut found = None;
        for api_key in &self.api_keys {
            let key_bytes = api_key.key.as_bytes();
            // Only compare if lengths match (constant-time for same-length keys)
            if provided_bytes.len() == key_bytes.len()
                && bool::from(provided_bytes.ct_eq(key_bytes))
                && found.is_none()
            {
                found = Some(api_key.user.as_str());
            }
        }
        found
    }
}

impl Default for ProxyAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_USER_HEADER, Vec::new())
    }
}

impl Authenticator for ProxyAuthenticator {
    fn authenticate(&self, credentials: &Credentials<'_>) -> Option<Session> {
        let header_user = credentials
            .headers
            .get(self.user_header.as_str())
            .filter(|_| self.header_trusted)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(user) = header_user {
            return Some(Session {
                user: user.to_string(),
                method: AuthMethod::ProxyHeader,
            });
        }

        credentials
            .headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .and_then(|key| self.user_for_key(key.trim()))
            .map(|user| Session {
                user: user.to_string(),
                method: AuthMethod::ApiKey,
            })
    }

    fn current_user(&self, session: &Session) -> Option<UserId> {
        let user = session.user.trim();
        (!user.is_empty()).then(|| user.to_string())
    }
}

/// The authenticated caller of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user: UserId,
    pub auth_method: AuthMethod,
}

impl RequestContext {
    pub fn local() -> Self {
        Self {
            user: LOCAL_USER.to_string(),
            auth_method: AuthMethod::None,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(AppError::unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn authenticator() -> ProxyAuthenticator {
        ProxyAuthenticator::new(
            DEFAULT_USER_HEADER,
            parse_api_keys("alice=alice-secret,bob=bob-secret"),
        )
    }

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys(" alice = k1 ,broken,,=nouser,bob=k2");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].user, "alice");
        assert_eq!(keys[0].key, "k1");
        assert_eq!(keys[1].user, "bob");
    }

    #[test]
    fn test_proxy_header() {
        let h = headers(&[("x-forwarded-email", "carol@example.com")]);
        let session = ProxyAuthenticator::default()
            .authenticate(&Credentials { headers: &h })
            .unwrap();
        assert_eq!(session.user, "carol@example.com");
        assert_eq!(session.method, AuthMethod::ProxyHeader);
    }

    #[test]
    fn test_blank_proxy_header_rejected() {
        let h = headers(&[("x-forwarded-email", "   ")]);
        assert!(ProxyAuthenticator::default()
            .authenticate(&Credentials { headers: &h })
            .is_none());
    }

    #[test]
    fn test_header_ignored_when_api_keys_configured() {
        let auth = authenticator();
        assert!(!auth.header_trusted());

        let h = headers(&[("x-forwarded-email", "alice")]);
        assert!(auth.authenticate(&Credentials { headers: &h }).is_none());

        // A valid key still works, and decides the user
        let h = headers(&[
            ("x-forwarded-email", "alice"),
            ("authorization", "Bearer bob-secret"),
        ]);
        let session = auth.authenticate(&Credentials { headers: &h }).unwrap();
        assert_eq!(session.user, "bob");
        assert_eq!(session.method, AuthMethod::ApiKey);
    }

    #[test]
    fn test_trusted_header_alongside_api_keys() {
        let auth = authenticator().with_trusted_header(true);
        let h = headers(&[("x-forwarded-email", "carol@example.com")]);
        let session = auth.authenticate(&Credentials { headers: &h }).unwrap();
        assert_eq!(session.user, "carol@example.com");
        assert_eq!(session.method, AuthMethod::ProxyHeader);

        // Without keys there is nothing else to authenticate with
        assert!(ProxyAuthenticator::default()
            .with_trusted_header(false)
            .header_trusted());
    }

    #[test]
    fn test_api_key_maps_to_user() {
        let h = headers(&[("authorization", "Bearer bob-secret")]);
        let session = authenticator()
            .authenticate(&Credentials { headers: &h })
            .unwrap();
        assert_eq!(session.user, "bob");
        assert_eq!(session.method, AuthMethod::ApiKey);
    }

    #[test]
    fn test_wrong_api_key_rejected() {
        let h = headers(&[("authorization", "Bearer bob-secreT")]);
        assert!(authenticator()
            .authenticate(&Credentials { headers: &h })
            .is_none());
        let h = headers(&[("authorization", "Basic bob-secret")]);
        assert!(authenticator()
            .authenticate(&Credentials { headers: &h })
            .is_none());
    }

    #[test]
    fn test_custom_header_name() {
        let auth = ProxyAuthenticator::new("X-Remote-User", vec![]);
        assert_eq!(auth.user_header(), "x-remote-user");
        let h = headers(&[("x-remote-user", "dave")]);
        assert_eq!(
            auth.authenticate(&Credentials { headers: &h })
                .map(|s| s.user),
            Some("dave".to_string())
        );
    }

    #[test]
    fn test_current_user() {
        let auth = authenticator();
        let session = Session {
            user: "alice".to_string(),
            method: AuthMethod::ApiKey,
        };
        assert_eq!(auth.current_user(&session), Some("alice".to_string()));
        let empty = Session {
            user: " ".to_string(),
            method: AuthMethod::ProxyHeader,
        };
        assert_eq!(auth.current_user(&empty), None);
    }

    #[test]
    fn test_api_key_debug_redacts() {
        let keys = parse_api_keys("alice=topsecret");
        assert!(!format!("{:?}", keys[0]).contains("topsecret"));
    }
}
