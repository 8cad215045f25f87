//! Backend API client
//!
//! [`Backend`] is the seam between the app and the hosted backend. The real
//! implementation is [`SupabaseClient`]; tests substitute an in-memory one.

pub mod realtime;
pub mod supabase;

use std::future::Future;

use anyhow::Result;
use uuid::Uuid;

use crate::models::{NewPost, Post, Profile, Session, User};

pub use realtime::{ChangeEvent, ChangeKind, Subscription};
pub use supabase::SupabaseClient;

/// Table holding posts
pub const POSTS_TABLE: &str = "posts";
/// Table holding profiles
pub const PROFILES_TABLE: &str = "profiles";
/// Table holding likes
pub const LIKES_TABLE: &str = "likes";

/// Operations the app needs from the hosted backend
pub trait Backend: Send + Sync + 'static {
    /// Use this bearer token for subsequent requests (`None` = anonymous)
    fn set_access_token(&self, token: Option<String>);

    // ==================== Auth ====================

    /// Register a new user. Returns a session when the backend auto-confirms.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Password sign-in
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    /// Exchange a refresh token for a new session
    fn refresh_session(&self, refresh_token: &str) -> impl Future<Output = Result<Session>> + Send;

    /// Send a password-reset email
    fn reset_password_for_email(&self, email: &str) -> impl Future<Output = Result<()>> + Send;

    /// Revoke the current session on the backend
    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the user the current access token belongs to
    fn fetch_user(&self) -> impl Future<Output = Result<User>> + Send;

    // ==================== Tables ====================

    /// Fetch one profile by user ID
    fn fetch_profile(&self, user_id: Uuid) -> impl Future<Output = Result<Profile>> + Send;

    /// Fetch posts newest first, joined with author profiles, optionally for one author
    fn fetch_posts(&self, author: Option<Uuid>) -> impl Future<Output = Result<Vec<Post>>> + Send;

    /// Insert a post and return the stored row
    fn insert_post(&self, post: &NewPost) -> impl Future<Output = Result<Post>> + Send;

    /// Whether `user_id` likes `post_id`
    fn like_exists(&self, user_id: Uuid, post_id: Uuid)
    -> impl Future<Output = Result<bool>> + Send;

    /// Number of likes on a post
    fn like_count(&self, post_id: Uuid) -> impl Future<Output = Result<u32>> + Send;

    /// Insert a like row
    fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Delete the like row for (user, post)
    fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    // ==================== Storage ====================

    /// Upload bytes to `path` inside the post image bucket
    fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Public URL of an object in the post image bucket
    fn public_url(&self, path: &str) -> String;

    // ==================== Realtime ====================

    /// Subscribe to row changes on `table`
    fn subscribe(&self, table: &str) -> impl Future<Output = Result<Subscription>> + Send;
}
