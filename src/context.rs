//! Shared services for the CLI and the TUI

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::api::{Backend, SupabaseClient};
use crate::auth::{AuthHandle, AuthStore, CredentialStore, HybridStore, SessionManager};
use crate::compose::Composer;
use crate::config::Config;
use crate::error::BackendError;
use crate::profile::ProfilePage;
use crate::sync::FeedSync;

/// Configuration, backend client and session services wired together.
///
/// Must be created inside a Tokio runtime: it spawns the auth store task.
pub struct AppContext<B = SupabaseClient, S = HybridStore> {
    /// Loaded configuration
    pub config: Config,
    /// Backend client
    pub backend: Arc<B>,
    /// Session manager
    pub sessions: SessionManager<B, S>,
}

impl AppContext {
    /// Build the production context and restore the stored session
    pub async fn connect(config: Config) -> Result<Self> {
        let backend = Arc::new(SupabaseClient::from_config(&config)?);
        let store = HybridStore::open();
        if !store.is_persistent() {
            tracing::warn!("Sessions will not survive a restart");
        }

        let context = Self::new(config, backend, Arc::new(store));
        context.sessions.restore().await?;
        Ok(context)
    }
}

impl<B: Backend, S: CredentialStore> AppContext<B, S> {
    /// Wire services around a backend and a credential store
    pub fn new(config: Config, backend: Arc<B>, store: Arc<S>) -> Self {
        let auth = AuthStore::spawn(Arc::clone(&backend));
        let sessions = SessionManager::new(Arc::clone(&backend), store, auth);
        Self {
            config,
            backend,
            sessions,
        }
    }

    /// Auth store handle
    pub const fn auth(&self) -> &AuthHandle {
        self.sessions.auth()
    }

    /// ID of the signed-in user
    pub fn user_id(&self) -> Result<Uuid> {
        self.auth()
            .snapshot()
            .user()
            .map(|u| u.id)
            .ok_or_else(|| BackendError::NotSignedIn.into())
    }

    /// Feed synchronizer for all posts
    pub fn feed(&self) -> FeedSync<B> {
        FeedSync::new(Arc::clone(&self.backend))
    }

    /// Post composer
    pub fn composer(&self) -> Composer<B> {
        Composer::new(Arc::clone(&self.backend))
    }

    /// Profile page loader
    pub fn profile_page(&self) -> ProfilePage<B> {
        ProfilePage::new(Arc::clone(&self.backend))
    }
}
