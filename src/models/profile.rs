//! Profile model (a row of the `profiles` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the auth user ID
    pub id: Uuid,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Display name
    #[serde(default)]
    pub full_name: String,
    /// Avatar URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Name for display, falling back to the email's local part
    pub fn display_name(&self) -> String {
        let name = self.full_name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email
            .split('@')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    /// First letter of the display name, upper-cased (avatar placeholder)
    pub fn initial(&self) -> char {
        self.display_name()
            .chars()
            .next()
            .map_or('?', |c| c.to_uppercase().next().unwrap_or(c))
    }
}

/// Counters shown on a profile page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileStats {
    /// Number of posts by the user
    pub posts: usize,
    /// Likes received across those posts
    pub likes_received: u32,
}
