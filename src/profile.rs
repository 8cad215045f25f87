//! Profile page: a user's profile, posts and stats

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::api::Backend;
use crate::models::{Post, Profile, ProfileStats};
use crate::sync::FeedSync;

/// Everything shown on a profile page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    /// Whose page this is
    pub profile: Profile,
    /// Their posts, newest first
    pub posts: Vec<Post>,
    /// Post and like totals
    pub stats: ProfileStats,
}

/// Loads profile pages and keeps the last good one
pub struct ProfilePage<B> {
    backend: Arc<B>,
    view: Option<ProfileView>,
}

impl<B: Backend> ProfilePage<B> {
    /// Create an empty page
    pub const fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            view: None,
        }
    }

    /// Last loaded view
    pub const fn view(&self) -> Option<&ProfileView> {
        self.view.as_ref()
    }

    /// Load a user's page. On failure the previous view is kept.
    pub async fn load(&mut self, user_id: Uuid) -> Result<&ProfileView> {
        let view = load_profile(Arc::clone(&self.backend), user_id).await?;
        Ok(self.view.insert(view))
    }
}

/// Fetch profile, posts and stats for `user_id`
pub async fn load_profile<B: Backend>(backend: Arc<B>, user_id: Uuid) -> Result<ProfileView> {
    let mut author_feed = FeedSync::for_author(Arc::clone(&backend), user_id);
    let (profile, posts) = tokio::try_join!(
        backend.fetch_profile(user_id),
        author_feed.fetch_posts()
    )
    .context("Failed to load profile")?;
    let posts = posts.to_vec();

    let counts = try_join_all(posts.iter().map(|post| backend.like_count(post.id)))
        .await
        .context("Failed to count likes")?;
    let likes_received = counts
        .into_iter()
        .fold(0u32, |total, count| total.saturating_add(count));

    let stats = ProfileStats {
        posts: posts.len(),
        likes_received,
    };
    tracing::debug!("Profile {}: {:?}", user_id, stats);

    Ok(ProfileView {
        profile,
        posts,
        stats,
    })
}
