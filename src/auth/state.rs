//! Auth state and the single task allowed to write it
//!
//! The session manager publishes [`AuthEvent`]s; the [`AuthStore`] task
//! applies them in arrival order, loads the profile for the new user, and
//! publishes snapshots that the UI reads through [`AuthHandle`].

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot, watch};

use crate::api::Backend;
use crate::models::{Profile, Session, User};

/// Current session, user and profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    session: Option<Session>,
    user: Option<User>,
    profile: Option<Profile>,
}

impl AuthState {
    /// Replace the session; the user follows the session
    pub fn set_session(&mut self, session: Option<Session>) {
        self.user = session.as_ref().map(|s| s.user.clone());
        self.session = session;
    }

    /// Replace the user
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    /// Replace the profile
    pub fn set_profile(&mut self, profile: Option<Profile>) {
        self.profile = profile;
    }

    /// Forget everything
    pub fn clear_auth(&mut self) {
        *self = Self::default();
    }

    /// Current session
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Current user
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Current profile
    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Whether a session is present
    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Name to greet the user with
    pub fn display_name(&self) -> Option<String> {
        if let Some(profile) = &self.profile {
            return Some(profile.display_name());
        }
        let user = self.user.as_ref()?;
        user.user_metadata
            .full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| user.email.clone())
    }
}

/// Auth change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Result of restoring the stored session at startup
    InitialSession(Option<Session>),
    /// User signed in (or signed up with auto-confirm)
    SignedIn(Session),
    /// Session refreshed
    TokenRefreshed(Session),
    /// User record changed
    UserUpdated(User),
    /// User signed out
    SignedOut,
}

struct Envelope {
    event: AuthEvent,
    ack: Option<oneshot::Sender<()>>,
}

/// Cloneable handle for publishing events and reading auth state
#[derive(Clone)]
pub struct AuthHandle {
    events: mpsc::Sender<Envelope>,
    state: watch::Receiver<AuthState>,
}

impl AuthHandle {
    /// Publish an event without waiting for it to be applied
    pub async fn publish(&self, event: AuthEvent) -> Result<()> {
        self.events
            .send(Envelope { event, ack: None })
            .await
            .map_err(|_| anyhow!("Auth store has shut down"))
    }

    /// Publish an event and wait until it (and its profile load) is applied
    pub async fn publish_and_wait(&self, event: AuthEvent) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Envelope {
                event,
                ack: Some(tx),
            })
            .await
            .map_err(|_| anyhow!("Auth store has shut down"))?;
        rx.await.map_err(|_| anyhow!("Auth store has shut down"))
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }
}

/// The single writer of [`AuthState`]
pub struct AuthStore<B> {
    backend: Arc<B>,
    state: AuthState,
    publisher: watch::Sender<AuthState>,
}

impl<B: Backend> AuthStore<B> {
    /// Spawn the writer task and return a handle to it
    pub fn spawn(backend: Arc<B>) -> AuthHandle {
        let (events_tx, mut events_rx) = mpsc::channel::<Envelope>(16);
        let (publisher, state_rx) = watch::channel(AuthState::default());

        let mut store = Self {
            backend,
            state: AuthState::default(),
            publisher,
        };

        tokio::spawn(async move {
            while let Some(envelope) = events_rx.recv().await {
                store.apply(envelope.event).await;
                if let Some(ack) = envelope.ack {
                    let _ = ack.send(());
                }
            }
            tracing::debug!("Auth store stopped");
        });

        AuthHandle {
            events: events_tx,
            state: state_rx,
        }
    }

    async fn apply(&mut self, event: AuthEvent) {
        tracing::debug!("Auth event: {}", event_name(&event));
        match event {
            AuthEvent::InitialSession(session) => self.replace_session(session).await,
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.replace_session(Some(session)).await;
            }
            AuthEvent::UserUpdated(user) => {
                self.state.set_user(Some(user));
                self.publish();
            }
            AuthEvent::SignedOut => {
                self.state.clear_auth();
                self.publish();
            }
        }
    }

    async fn replace_session(&mut self, session: Option<Session>) {
        let previous_user = self.state.user().map(|u| u.id);
        self.state.set_session(session);

        let Some(user_id) = self.state.user().map(|u| u.id) else {
            self.state.set_profile(None);
            self.publish();
            return;
        };

        if previous_user != Some(user_id) {
            self.state.set_profile(None);
        }
        self.publish();

        if previous_user == Some(user_id) && self.state.profile().is_some() {
            return;
        }

        match self.backend.fetch_profile(user_id).await {
            Ok(profile) => {
                tracing::info!("Profile loaded: {}", profile.display_name());
                self.state.set_profile(Some(profile));
                self.publish();
            }
            Err(e) => tracing::warn!("Failed to fetch profile for {}: {:#}", user_id, e),
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}

const fn event_name(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::InitialSession(_) => "initial_session",
        AuthEvent::SignedIn(_) => "signed_in",
        AuthEvent::TokenRefreshed(_) => "token_refreshed",
        AuthEvent::UserUpdated(_) => "user_updated",
        AuthEvent::SignedOut => "signed_out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, session_for, test_profile};
    use uuid::Uuid;

    #[test]
    fn test_set_session_sets_user() {
        let mut state = AuthState::default();
        let session = session_for(Uuid::new_v4());
        state.set_session(Some(session.clone()));
        assert_eq!(state.user(), Some(&session.user));
        assert!(state.is_signed_in());

        state.set_session(None);
        assert!(state.user().is_none());
    }

    #[test]
    fn test_clear_auth() {
        let user_id = Uuid::new_v4();
        let mut state = AuthState::default();
        state.set_session(Some(session_for(user_id)));
        state.set_profile(Some(test_profile(user_id, "Ada")));
        state.clear_auth();
        assert_eq!(state, AuthState::default());
    }

    #[tokio::test]
    async fn test_sign_in_loads_profile() {
        let user_id = Uuid::new_v4();
        let backend = Arc::new(MockBackend::new());
        backend.add_profile(test_profile(user_id, "Ada"));

        let handle = AuthStore::spawn(backend);
        handle
            .publish_and_wait(AuthEvent::SignedIn(session_for(user_id)))
            .await
            .unwrap();

        let state = handle.snapshot();
        assert!(state.is_signed_in());
        assert_eq!(state.display_name().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_profile_failure_keeps_session() {
        let user_id = Uuid::new_v4();
        let handle = AuthStore::spawn(Arc::new(MockBackend::new()));

        handle
            .publish_and_wait(AuthEvent::SignedIn(session_for(user_id)))
            .await
            .unwrap();

        let state = handle.snapshot();
        assert!(state.is_signed_in());
        assert!(state.profile().is_none());
    }

    #[tokio::test]
    async fn test_events_apply_in_order() {
        let user_id = Uuid::new_v4();
        let backend = Arc::new(MockBackend::new());
        backend.add_profile(test_profile(user_id, "Ada"));
        let handle = AuthStore::spawn(backend);

        // Fire-and-forget restore racing a sign-out: the later event wins
        handle
            .publish(AuthEvent::InitialSession(Some(session_for(user_id))))
            .await
            .unwrap();
        handle.publish_and_wait(AuthEvent::SignedOut).await.unwrap();

        assert_eq!(handle.snapshot(), AuthState::default());
    }

    #[tokio::test]
    async fn test_refresh_keeps_loaded_profile() {
        let user_id = Uuid::new_v4();
        let backend = Arc::new(MockBackend::new());
        backend.add_profile(test_profile(user_id, "Ada"));
        let handle = AuthStore::spawn(backend.clone());

        handle
            .publish_and_wait(AuthEvent::SignedIn(session_for(user_id)))
            .await
            .unwrap();
        handle
            .publish_and_wait(AuthEvent::TokenRefreshed(session_for(user_id)))
            .await
            .unwrap();

        assert_eq!(backend.call_count("fetch_profile"), 1);
        assert!(handle.snapshot().profile().is_some());
    }
}
