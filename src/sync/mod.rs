//! Feed synchronization
//!
//! Every trigger runs the same full fetch. There is no pagination and no
//! incremental merge: the newest successful fetch replaces the list.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::api::{Backend, ChangeEvent, POSTS_TABLE};
use crate::models::Post;

/// Why the feed is being reloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The feed view gained focus
    Focus,
    /// The user asked for a refresh
    PullToRefresh,
    /// The backend pushed a row change
    Change(ChangeEvent),
}

impl RefreshTrigger {
    /// Whether this trigger should cause a fetch
    pub fn is_relevant(&self) -> bool {
        match self {
            Self::Focus | Self::PullToRefresh => true,
            Self::Change(change) => change.table == POSTS_TABLE,
        }
    }
}

/// Keeps a list of posts in step with the backend
pub struct FeedSync<B> {
    backend: Arc<B>,
    author: Option<Uuid>,
    posts: Vec<Post>,
    refreshing: bool,
}

impl<B: Backend> FeedSync<B> {
    /// Synchronizer for the global feed
    pub const fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            author: None,
            posts: Vec::new(),
            refreshing: false,
        }
    }

    /// Synchronizer for one author's posts
    pub const fn for_author(backend: Arc<B>, author: Uuid) -> Self {
        Self {
            backend,
            author: Some(author),
            posts: Vec::new(),
            refreshing: false,
        }
    }

    /// Current posts, newest first
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Whether a pull-to-refresh is in progress
    pub const fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Reload all posts. On failure the previous list is kept.
    pub async fn fetch_posts(&mut self) -> Result<&[Post]> {
        let posts = self
            .backend
            .fetch_posts(self.author)
            .await
            .context("Failed to load posts")?;

        tracing::debug!("Fetched {} posts", posts.len());
        self.posts = posts;
        Ok(&self.posts)
    }

    /// Handle a trigger. Returns whether a fetch ran.
    pub async fn refresh(&mut self, trigger: RefreshTrigger) -> Result<bool> {
        if !trigger.is_relevant() {
            return Ok(false);
        }

        let pull = trigger == RefreshTrigger::PullToRefresh;
        if pull {
            self.refreshing = true;
        }
        let result = self.fetch_posts().await.map(|_| true);
        if pull {
            self.refreshing = false;
        }

        if let Err(e) = &result {
            tracing::warn!("Feed refresh ({:?}) failed: {:#}", trigger, e);
        }
        result
    }

    /// Put a freshly created post at the top without refetching
    pub fn prepend(&mut self, post: Post) {
        if self.author.is_none_or(|a| a == post.user_id) {
            self.posts.insert(0, post);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChangeKind;
    use crate::testing::{MockBackend, test_profile};

    fn change(table: &str) -> RefreshTrigger {
        RefreshTrigger::Change(ChangeEvent {
            table: table.to_string(),
            kind: ChangeKind::Insert,
        })
    }

    #[tokio::test]
    async fn test_fetch_newest_first() {
        let backend = Arc::new(MockBackend::new());
        let user_id = uuid::Uuid::new_v4();
        backend.add_profile(test_profile(user_id, "Ada"));
        backend.add_post(user_id, "first");
        backend.add_post(user_id, "second");

        let mut feed = FeedSync::new(Arc::clone(&backend));
        let posts = feed.fetch_posts().await.unwrap();

        assert_eq!(posts.len(), 2);
        assert!(posts[0].created_at >= posts[1].created_at);
        assert_eq!(posts[0].author_name(), "Ada");
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_list() {
        let backend = Arc::new(MockBackend::new());
        backend.add_post(uuid::Uuid::new_v4(), "kept");

        let mut feed = FeedSync::new(Arc::clone(&backend));
        feed.fetch_posts().await.unwrap();

        backend.fail_next("fetch_posts");
        assert!(feed.refresh(RefreshTrigger::PullToRefresh).await.is_err());

        assert_eq!(feed.posts().len(), 1);
        assert_eq!(feed.posts()[0].text(), "kept");
        assert!(!feed.is_refreshing());
    }

    #[tokio::test]
    async fn test_only_post_changes_refetch() {
        let backend = Arc::new(MockBackend::new());
        let mut feed = FeedSync::new(Arc::clone(&backend));

        assert!(!feed.refresh(change("likes")).await.unwrap());
        assert_eq!(backend.call_count("fetch_posts"), 0);

        assert!(feed.refresh(change("posts")).await.unwrap());
        assert!(feed.refresh(RefreshTrigger::Focus).await.unwrap());
        assert_eq!(backend.call_count("fetch_posts"), 2);
    }

    #[tokio::test]
    async fn test_author_scope() {
        let backend = Arc::new(MockBackend::new());
        let ada = uuid::Uuid::new_v4();
        let bob = uuid::Uuid::new_v4();
        backend.add_post(ada, "mine");
        backend.add_post(bob, "theirs");

        let mut feed = FeedSync::for_author(Arc::clone(&backend), ada);
        feed.fetch_posts().await.unwrap();
        assert_eq!(feed.posts().len(), 1);

        let other = backend.add_post(bob, "later");
        feed.prepend(other);
        assert_eq!(feed.posts().len(), 1);
    }
}
