//! Async operations for the TUI
//!
//! The TUI loop is synchronous. It sends [`AsyncCommand`]s to one worker task
//! and polls [`AsyncResult`]s back. The worker also owns the realtime
//! subscription, which follows the auth state. It is opened after sign-in,
//! rejoined when the access token changes or the server closes it, and
//! dropped on sign-out.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::api::{Backend, ChangeEvent, POSTS_TABLE, Subscription};
use crate::auth::{AuthState, CredentialStore, SignInForm, SignUpForm};
use crate::compose::Draft;
use crate::context::AppContext;
use crate::likes::{LikeToggle, fetch_like_state};
use crate::models::{LikeState, Post};
use crate::profile::{ProfileView, load_profile};
use crate::sync::{FeedSync, RefreshTrigger};

/// Commands sent from the TUI to the async worker
#[derive(Debug, Clone)]
pub enum AsyncCommand {
    /// Password sign-in
    SignIn(SignInForm),
    /// Create an account
    SignUp(SignUpForm),
    /// Send a reset email
    ResetPassword(String),
    /// Sign out
    SignOut,
    /// Reload the feed
    RefreshFeed(RefreshTrigger),
    /// Load like state for posts
    LoadLikes(Vec<Uuid>),
    /// Like or unlike, starting from the backend's current state
    ToggleLike { post_id: Uuid },
    /// Publish a post
    CreatePost(Draft),
    /// Load a profile page
    LoadProfile(Uuid),
    /// Shutdown the worker
    Shutdown,
}

/// Results sent back from the async worker to the TUI
#[derive(Debug)]
pub enum AsyncResult {
    /// Signed in; the auth snapshot carries the session
    SignedIn,
    /// Account created. `confirmed` is false when email confirmation is pending.
    SignedUp { confirmed: bool },
    /// Reset email sent
    ResetSent { email: String },
    /// Signed out
    SignedOut,
    /// Feed reloaded
    FeedLoaded { posts: Vec<Post> },
    /// Feed reload failed; the previous list stays
    FeedFailed { message: String },
    /// Like states loaded
    LikesLoaded { states: Vec<(Uuid, LikeState)> },
    /// Like toggled
    LikeToggled { post_id: Uuid, state: LikeState },
    /// Like toggle failed
    LikeFailed { post_id: Uuid, message: String },
    /// Post published
    PostCreated { post: Post },
    /// Post failed
    PostFailed { message: String },
    /// Profile page loaded
    ProfileLoaded { view: ProfileView },
    /// Auth or profile request failed
    Error { message: String },
}

/// Channel handles for communicating with the async worker
pub struct AsyncHandle {
    /// Send commands to the worker
    pub cmd_tx: mpsc::Sender<AsyncCommand>,
    /// Receive results from the worker
    pub result_rx: mpsc::Receiver<AsyncResult>,
}

/// Spawn the async worker and return handles
pub fn spawn_worker<B: Backend, S: CredentialStore>(context: Arc<AppContext<B, S>>) -> AsyncHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<AsyncCommand>(32);
    let (result_tx, result_rx) = mpsc::channel::<AsyncResult>(32);

    let worker = Worker {
        feed: context.feed(),
        auth_rx: context.auth().subscribe(),
        context,
        result_tx,
        subscription: None,
        subscribed_token: None,
    };
    tokio::spawn(worker.run(cmd_rx));

    AsyncHandle { cmd_tx, result_rx }
}

struct Worker<B, S> {
    context: Arc<AppContext<B, S>>,
    feed: FeedSync<B>,
    auth_rx: watch::Receiver<AuthState>,
    result_tx: mpsc::Sender<AsyncResult>,
    subscription: Option<Subscription>,
    /// Access token the subscription joined with
    subscribed_token: Option<String>,
}

impl<B: Backend, S: CredentialStore> Worker<B, S> {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<AsyncCommand>) {
        self.follow_auth().await;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(AsyncCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd).await,
                },
                changed = self.auth_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.follow_auth().await;
                }
                change = next_change(self.subscription.as_mut()) => match change {
                    Some(change) => self.refresh(RefreshTrigger::Change(change)).await,
                    None => {
                        // Rejoined on the next refresh or auth change
                        tracing::warn!("Realtime subscription ended");
                        self.subscription = None;
                        self.subscribed_token = None;
                    }
                },
            }
        }

        tracing::debug!("Async worker stopped");
    }

    /// Open, rejoin or drop the realtime subscription to match the session.
    ///
    /// The channel authorizes with the access token it joined with, so a
    /// refreshed token means joining again.
    async fn follow_auth(&mut self) {
        let token = self
            .auth_rx
            .borrow_and_update()
            .session()
            .map(|s| s.access_token.clone());

        let Some(token) = token else {
            if let Some(subscription) = self.subscription.take() {
                tracing::info!("Closing realtime subscription");
                subscription.unsubscribe();
            }
            self.subscribed_token = None;
            return;
        };
        if !self.context.config.realtime
            || (self.subscription.is_some() && self.subscribed_token.as_ref() == Some(&token))
        {
            return;
        }

        if let Some(stale) = self.subscription.take() {
            tracing::info!("Access token changed, rejoining realtime");
            stale.unsubscribe();
        }
        match self.context.backend.subscribe(POSTS_TABLE).await {
            Ok(subscription) => {
                tracing::info!("Subscribed to {} changes", POSTS_TABLE);
                self.subscription = Some(subscription);
                self.subscribed_token = Some(token);
            }
            Err(e) => {
                self.subscribed_token = None;
                tracing::warn!("Realtime subscription failed: {:#}", e);
            }
        }
    }

    /// Refresh the session if it is about to expire, then return the user ID
    async fn fresh_user_id(&self) -> Result<Uuid> {
        self.context.sessions.ensure_fresh().await?;
        self.context.user_id()
    }

    async fn handle(&mut self, cmd: AsyncCommand) {
        match cmd {
            AsyncCommand::SignIn(form) => self.handle_sign_in(form).await,
            AsyncCommand::SignUp(form) => self.handle_sign_up(form).await,
            AsyncCommand::ResetPassword(email) => self.handle_reset(email).await,
            AsyncCommand::SignOut => self.handle_sign_out().await,
            AsyncCommand::RefreshFeed(trigger) => self.refresh(trigger).await,
            AsyncCommand::LoadLikes(post_ids) => self.handle_load_likes(post_ids).await,
            AsyncCommand::ToggleLike { post_id } => self.handle_toggle_like(post_id).await,
            AsyncCommand::CreatePost(draft) => self.handle_create_post(draft).await,
            AsyncCommand::LoadProfile(user_id) => self.handle_load_profile(user_id).await,
            AsyncCommand::Shutdown => {}
        }
    }

    async fn send(&self, result: AsyncResult) {
        let _ = self.result_tx.send(result).await;
    }

    async fn handle_sign_in(&self, form: SignInForm) {
        match self.context.sessions.sign_in(&form).await {
            Ok(_) => self.send(AsyncResult::SignedIn).await,
            Err(e) => {
                tracing::warn!("Sign-in failed: {:#}", e);
                self.send(AsyncResult::Error {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn handle_sign_up(&self, form: SignUpForm) {
        match self.context.sessions.sign_up(&form).await {
            Ok(session) => {
                self.send(AsyncResult::SignedUp {
                    confirmed: session.is_some(),
                })
                .await;
            }
            Err(e) => {
                tracing::warn!("Sign-up failed: {:#}", e);
                self.send(AsyncResult::Error {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn handle_reset(&self, email: String) {
        match self.context.sessions.reset_password(&email).await {
            Ok(()) => self.send(AsyncResult::ResetSent { email }).await,
            Err(e) => {
                tracing::warn!("Password reset failed: {:#}", e);
                self.send(AsyncResult::Error {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn handle_sign_out(&self) {
        match self.context.sessions.sign_out().await {
            Ok(()) => self.send(AsyncResult::SignedOut).await,
            Err(e) => {
                self.send(AsyncResult::Error {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn refresh(&mut self, trigger: RefreshTrigger) {
        if let Err(e) = self.context.sessions.ensure_fresh().await {
            tracing::debug!("Skipping feed refresh: {:#}", e);
            return;
        }
        if self.subscription.is_none() {
            self.follow_auth().await;
        }
        match self.feed.refresh(trigger).await {
            Ok(true) => {
                let posts = self.feed.posts().to_vec();
                self.send(AsyncResult::FeedLoaded { posts }).await;
            }
            Ok(false) => {}
            Err(e) => {
                self.send(AsyncResult::FeedFailed {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn handle_load_likes(&self, post_ids: Vec<Uuid>) {
        let user_id = match self.fresh_user_id().await {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::debug!("Skipping like load: {:#}", e);
                return;
            }
        };

        let mut states = Vec::with_capacity(post_ids.len());
        for post_id in post_ids {
            match fetch_like_state(self.context.backend.as_ref(), user_id, post_id).await {
                Ok(state) => states.push((post_id, state)),
                Err(e) => tracing::warn!("Failed to load likes for {}: {:#}", post_id, e),
            }
        }
        self.send(AsyncResult::LikesLoaded { states }).await;
    }

    async fn handle_toggle_like(&self, post_id: Uuid) {
        match self.toggle_like(post_id).await {
            Ok(next) => {
                self.send(AsyncResult::LikeToggled {
                    post_id,
                    state: next,
                })
                .await;
            }
            Err(e) => {
                tracing::warn!("Like toggle on {} failed: {:#}", post_id, e);
                self.send(AsyncResult::LikeFailed {
                    post_id,
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    /// Read the current like state, then flip it
    async fn toggle_like(&self, post_id: Uuid) -> Result<LikeState> {
        let user_id = self.fresh_user_id().await?;
        let mut toggle = LikeToggle::new(Arc::clone(&self.context.backend), user_id, post_id);
        toggle.load().await?;
        toggle.toggle().await
    }

    async fn handle_create_post(&mut self, draft: Draft) {
        let result = match self.fresh_user_id().await {
            Ok(user_id) => self.context.composer().create_post(user_id, &draft).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(post) => {
                self.feed.prepend(post.clone());
                self.send(AsyncResult::PostCreated { post }).await;
            }
            Err(e) => {
                tracing::warn!("Post failed: {:#}", e);
                self.send(AsyncResult::PostFailed {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }

    async fn handle_load_profile(&self, user_id: Uuid) {
        let result = match self.context.sessions.ensure_fresh().await {
            Ok(()) => load_profile(Arc::clone(&self.context.backend), user_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(view) => self.send(AsyncResult::ProfileLoaded { view }).await,
            Err(e) => {
                tracing::warn!("Profile load failed: {:#}", e);
                self.send(AsyncResult::Error {
                    message: error_message(&e),
                })
                .await;
            }
        }
    }
}

/// Next change from the subscription; pends forever without one
async fn next_change(subscription: Option<&mut Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

/// User-facing text for an error: the outermost context plus the root cause
fn error_message(e: &anyhow::Error) -> String {
    let outer = e.to_string();
    let root = e.root_cause().to_string();
    if outer == root {
        outer
    } else {
        format!("{outer}: {root}")
    }
}
