//! Post model (a row of the `posts` table joined with its author)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Profile;

/// A post as returned by the feed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Row ID
    pub id: Uuid,
    /// Owning user ID
    pub user_id: Uuid,
    /// Text content (may be absent for image-only posts)
    #[serde(default)]
    pub content: Option<String>,
    /// Public URL of the attached image
    #[serde(default)]
    pub image_url: Option<String>,
    /// When the post was created
    pub created_at: DateTime<Utc>,
    /// Author profile (the joined `profiles` relation)
    #[serde(rename = "profiles", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Profile>,
}

/// Insert payload for a new post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    /// Owning user ID
    pub user_id: Uuid,
    /// Trimmed text content, `None` when blank
    pub content: Option<String>,
    /// Public URL of the uploaded image
    pub image_url: Option<String>,
}

impl Post {
    /// Name to show for the author, falling back to a short user ID
    pub fn author_name(&self) -> String {
        match &self.author {
            Some(profile) => profile.display_name(),
            None => self.user_id.to_string()[..8].to_string(),
        }
    }

    /// Text content, or an empty string for image-only posts
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Get a short preview of the content (for list display)
    pub fn preview(&self, max_len: usize) -> String {
        let content = self.text().replace('\n', " ");
        if content.chars().count() <= max_len {
            content
        } else {
            let cut: String = content.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }

    /// Get relative time string (e.g., "5m", "2h", "3d")
    pub fn relative_time(&self) -> String {
        relative_time_since(self.created_at, Utc::now())
    }
}

pub(crate) fn relative_time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(then);

    if duration.num_seconds() < 60 {
        format!("{}s", duration.num_seconds().max(0))
    } else if duration.num_minutes() < 60 {
        format!("{}m", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d", duration.num_days())
    } else {
        then.format("%b %d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_deserialize_joined_row() {
        let json = r#"{
            "id": "0b6f7f38-3a57-4a4e-9a3c-3c1f3f6c8f10",
            "user_id": "5d0c1c1e-8f37-4c8e-8d0e-2b0c7e4f5a11",
            "content": null,
            "image_url": "https://example.supabase.co/storage/v1/object/public/post-images/a.png",
            "created_at": "2025-10-30T12:00:00.123456+00:00",
            "profiles": {
                "id": "5d0c1c1e-8f37-4c8e-8d0e-2b0c7e4f5a11",
                "email": "ada@example.com",
                "full_name": "Ada Lovelace",
                "avatar_url": null,
                "created_at": "2025-10-01T00:00:00+00:00",
                "updated_at": "2025-10-01T00:00:00+00:00"
            }
        }"#;

        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.content, None);
        assert_eq!(post.text(), "");
        assert_eq!(post.author_name(), "Ada Lovelace");
        assert!(post.image_url.is_some());
    }

    #[test]
    fn test_preview_truncates() {
        let mut post: Post = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "created_at": Utc::now(),
        }))
        .unwrap();
        post.content = Some("hello\nworld, this is long".to_string());
        assert_eq!(post.preview(100), "hello world, this is long");
        assert_eq!(post.preview(8), "hello...");
    }

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        assert_eq!(relative_time_since(now - Duration::seconds(5), now), "5s");
        assert_eq!(relative_time_since(now - Duration::minutes(5), now), "5m");
        assert_eq!(relative_time_since(now - Duration::hours(2), now), "2h");
        assert_eq!(relative_time_since(now - Duration::days(3), now), "3d");
    }
}
