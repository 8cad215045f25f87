//! Like toggle for a single post

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::api::Backend;
use crate::models::LikeState;

/// Read whether `user_id` likes `post_id` and the post's like count
pub async fn fetch_like_state<B: Backend>(
    backend: &B,
    user_id: Uuid,
    post_id: Uuid,
) -> Result<LikeState> {
    let (liked, count) = tokio::try_join!(
        backend.like_exists(user_id, post_id),
        backend.like_count(post_id)
    )
    .context("Failed to load likes")?;
    Ok(LikeState::new(liked, count))
}

/// Write the opposite of `state` to the backend and return the flipped state.
///
/// The count is adjusted locally rather than re-read.
pub async fn toggle_like<B: Backend>(
    backend: &B,
    user_id: Uuid,
    post_id: Uuid,
    state: LikeState,
) -> Result<LikeState> {
    if state.liked {
        backend
            .delete_like(user_id, post_id)
            .await
            .context("Failed to unlike post")?;
    } else {
        backend
            .insert_like(user_id, post_id)
            .await
            .context("Failed to like post")?;
    }
    Ok(state.flipped())
}

/// Like state of one post for the signed-in user
pub struct LikeToggle<B> {
    backend: Arc<B>,
    user_id: Uuid,
    post_id: Uuid,
    state: LikeState,
}

impl<B: Backend> LikeToggle<B> {
    /// Create an unloaded toggle
    pub fn new(backend: Arc<B>, user_id: Uuid, post_id: Uuid) -> Self {
        Self {
            backend,
            user_id,
            post_id,
            state: LikeState::default(),
        }
    }

    /// Current state
    pub const fn state(&self) -> LikeState {
        self.state
    }

    /// Load like existence and count
    pub async fn load(&mut self) -> Result<LikeState> {
        self.state = fetch_like_state(self.backend.as_ref(), self.user_id, self.post_id).await?;
        Ok(self.state)
    }

    /// Like or unlike. A toggle while another is in flight does nothing;
    /// on failure the state is left as it was.
    pub async fn toggle(&mut self) -> Result<LikeState> {
        if !self.state.begin() {
            tracing::debug!("Ignoring toggle on {} while one is in flight", self.post_id);
            return Ok(self.state);
        }

        let before = LikeState {
            loading: false,
            ..self.state
        };
        match toggle_like(self.backend.as_ref(), self.user_id, self.post_id, before).await {
            Ok(next) => {
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                tracing::warn!("Like toggle on {} failed: {:#}", self.post_id, e);
                self.state = before;
                Err(e)
            }
        }
    }
}
