//! Like model and the local like/count state shown on a post card

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `likes` table. The backend keeps (user, post) unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    /// Row ID
    pub id: Uuid,
    /// Who liked
    pub user_id: Uuid,
    /// What was liked
    pub post_id: Uuid,
    /// When
    pub created_at: DateTime<Utc>,
}

/// Like state of one post for the current user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    /// Whether the current user likes the post
    pub liked: bool,
    /// Aggregate like count (optimistically adjusted)
    pub count: u32,
    /// A toggle is in flight
    pub loading: bool,
}

impl LikeState {
    /// Create a settled state
    pub const fn new(liked: bool, count: u32) -> Self {
        Self {
            liked,
            count,
            loading: false,
        }
    }

    /// Mark a toggle as started. Returns `false` if one is already in flight.
    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    /// Apply a completed toggle: flip and adjust the count by one
    pub fn flipped(self) -> Self {
        let count = if self.liked {
            self.count.saturating_sub(1)
        } else {
            self.count.saturating_add(1)
        };
        Self::new(!self.liked, count)
    }

    /// Clear the in-flight flag without changing anything else
    pub fn settle(&mut self) {
        self.loading = false;
    }
}
