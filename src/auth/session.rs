//! Session manager: sign-up, sign-in, password reset, sign-out, restore

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::Backend;
use crate::error::BackendError;
use crate::models::{Session, User};

use super::credentials::CredentialStore;
use super::state::{AuthEvent, AuthHandle};
use super::validate::{SignInForm, SignUpForm, normalize_email, validate_reset_email};

/// Credential store key holding the serialized session
pub const SESSION_KEY: &str = "framez.auth.token";

/// Drives the auth service and keeps the stored session, the backend token
/// and the auth store in step
pub struct SessionManager<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    auth: AuthHandle,
}

impl<B, S> Clone for SessionManager<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            auth: self.auth.clone(),
        }
    }
}

impl<B: Backend, S: CredentialStore> SessionManager<B, S> {
    /// Create a session manager
    pub const fn new(backend: Arc<B>, store: Arc<S>, auth: AuthHandle) -> Self {
        Self {
            backend,
            store,
            auth,
        }
    }

    /// Restore the stored session at startup, refreshing it if expired
    pub async fn restore(&self) -> Result<Option<Session>> {
        let session = match self.load_stored() {
            Some(session) if session.is_expired() => {
                tracing::info!("Stored session expired, refreshing");
                match self.backend.refresh_session(&session.refresh_token).await {
                    Ok(fresh) => {
                        self.persist(&fresh)?;
                        Some(fresh)
                    }
                    Err(e) => {
                        tracing::warn!("Session refresh failed: {:#}", e);
                        self.forget();
                        None
                    }
                }
            }
            other => other,
        };

        self.backend
            .set_access_token(session.as_ref().map(|s| s.access_token.clone()));
        self.auth
            .publish_and_wait(AuthEvent::InitialSession(session.clone()))
            .await?;

        Ok(session)
    }

    /// Register a new account. Validation failures never reach the backend.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<Option<Session>> {
        form.validate()?;

        let email = normalize_email(&form.email);
        let session = self
            .backend
            .sign_up(&email, &form.password, form.full_name.trim())
            .await
            .context("Signup failed")?;

        if let Some(session) = &session {
            self.establish(session.clone(), AuthEvent::SignedIn(session.clone()))
                .await?;
        }
        tracing::info!("Account created for {}", email);

        Ok(session)
    }

    /// Password sign-in
    pub async fn sign_in(&self, form: &SignInForm) -> Result<Session> {
        form.validate()?;

        let email = normalize_email(&form.email);
        let session = self
            .backend
            .sign_in_with_password(&email, &form.password)
            .await
            .context("Login failed")?;

        self.establish(session.clone(), AuthEvent::SignedIn(session.clone()))
            .await?;
        tracing::info!("Signed in as {}", email);

        Ok(session)
    }

    /// Send a password-reset email
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        validate_reset_email(email)?;

        self.backend
            .reset_password_for_email(&normalize_email(email))
            .await
            .context("Reset failed")
    }

    /// Sign out. Local state is cleared even if the backend call fails.
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.backend.sign_out().await {
            tracing::warn!("Backend sign-out failed: {:#}", e);
        }
        self.forget();
        self.backend.set_access_token(None);
        self.auth.publish_and_wait(AuthEvent::SignedOut).await
    }

    /// Refresh the current session if it is about to expire
    pub async fn ensure_fresh(&self) -> Result<()> {
        let Some(session) = self.auth.snapshot().session().cloned() else {
            return Err(BackendError::NotSignedIn.into());
        };
        if !session.is_expired() {
            return Ok(());
        }

        let fresh = self
            .backend
            .refresh_session(&session.refresh_token)
            .await
            .context("Session expired, please log in again")?;
        self.establish(fresh.clone(), AuthEvent::TokenRefreshed(fresh))
            .await
    }

    /// Re-read the signed-in user from the backend and publish it
    pub async fn reload_user(&self) -> Result<User> {
        self.ensure_fresh().await?;
        let user = self
            .backend
            .fetch_user()
            .await
            .context("Failed to load user")?;
        self.auth
            .publish_and_wait(AuthEvent::UserUpdated(user.clone()))
            .await?;
        Ok(user)
    }

    /// Handle to the auth store
    pub const fn auth(&self) -> &AuthHandle {
        &self.auth
    }

    async fn establish(&self, session: Session, event: AuthEvent) -> Result<()> {
        self.persist(&session)?;
        self.backend.set_access_token(Some(session.access_token));
        self.auth.publish_and_wait(event).await
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session).context("Failed to serialize session")?;
        self.store
            .set_item(SESSION_KEY, &json)
            .context("Failed to store session")
    }

    fn load_stored(&self) -> Option<Session> {
        let json = match self.store.get_item(SESSION_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read stored session: {:#}", e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Discarding unreadable stored session: {}", e);
                self.forget();
                None
            }
        }
    }

    fn forget(&self) {
        if let Err(e) = self.store.remove_item(SESSION_KEY) {
            tracing::warn!("Failed to remove stored session: {:#}", e);
        }
    }
}
