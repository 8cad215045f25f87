//! Typed errors that callers match on
//!
//! Everything else travels as `anyhow::Error` with context attached at the
//! call site.

use thiserror::Error;

/// Input rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required form field is blank
    #[error("Please fill in all fields")]
    MissingFields,
    /// Password and confirmation differ
    #[error("Passwords do not match")]
    PasswordMismatch,
    /// Password shorter than the minimum
    #[error("Password must be at least {min} characters")]
    WeakPassword {
        /// Minimum length
        min: usize,
    },
    /// Password reset without an email
    #[error("Please enter your email address")]
    MissingEmail,
    /// Post without text and without an image
    #[error("Please add some content or an image")]
    EmptyPost,
}

/// Failure reported by (or about) the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Non-success HTTP status
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },
    /// Operation needs a signed-in user
    #[error("Not signed in")]
    NotSignedIn,
    /// Backend URL or key missing from the configuration
    #[error("Backend is not configured: set backend_url and anon_key in {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Build an API error from a status and a raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            message: extract_message(body),
        }
    }
}

/// Pull a human-readable message out of an error body
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["msg", "message", "error_description", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str())
                && !msg.is_empty()
            {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed".to_string()
    } else {
        trimmed.to_string()
    }
}
