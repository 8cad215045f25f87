//! Auth session and user as issued by the backend's auth service

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds before expiry at which a session is treated as expired
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID (also the profile ID)
    pub id: Uuid,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata supplied at sign-up
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Metadata attached to a user at sign-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Credential bundle issued by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for API requests
    pub access_token: String,
    /// Token used to obtain a fresh session
    pub refresh_token: String,
    /// Usually "bearer"
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp of expiry
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// The signed-in user
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Expiry time, from `expires_at` or the access token's `exp` claim
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .or_else(|| jwt_expiry(&self.access_token))
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Whether the session is expired (or about to be) at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at()
            .is_some_and(|exp| exp.timestamp() - EXPIRY_LEEWAY_SECS <= now.timestamp())
    }

    /// Whether the session is expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Fill in `expires_at` from `expires_in` when the backend omitted it
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(issued_at.timestamp() + self.expires_in);
        }
        self
    }
}

/// Read the `exp` claim of a JWT without verifying it
fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_token(access_token: String, expires_at: Option<i64>) -> Session {
        Session {
            access_token,
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at,
            user: User {
                id: Uuid::new_v4(),
                email: Some("a@b.c".to_string()),
                user_metadata: UserMetadata::default(),
            },
        }
    }

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"x","exp":{exp}}}"#));
        format!("{header}.{claims}.signature")
    }

    #[test]
    fn test_expiry_from_field() {
        let now = Utc::now();
        let session = session_with_token("opaque".into(), Some(now.timestamp() + 3600));
        assert!(!session.is_expired_at(now));
        let session = session_with_token("opaque".into(), Some(now.timestamp() + 30));
        assert!(session.is_expired_at(now));
    }

    #[test]
    fn test_expiry_from_jwt_claim() {
        let now = Utc::now();
        let session = session_with_token(jwt_with_exp(now.timestamp() - 10), None);
        assert!(session.is_expired_at(now));
        let session = session_with_token(jwt_with_exp(now.timestamp() + 7200), None);
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn test_unknown_expiry_is_not_expired() {
        let session = session_with_token("not-a-jwt".into(), None);
        assert!(session.expires_at().is_none());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_with_issued_at() {
        let now = Utc::now();
        let session = session_with_token("opaque".into(), None).with_issued_at(now);
        assert_eq!(session.expires_at, Some(now.timestamp() + 3600));
    }
}
