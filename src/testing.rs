//! In-memory backend for unit tests

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::{Backend, ChangeEvent, Subscription};
use crate::error::BackendError;
use crate::models::{NewPost, Post, Profile, Session, User, UserMetadata};

/// Session for `user_id` valid for an hour
pub fn session_for(user_id: Uuid) -> Session {
    Session {
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some((Utc::now() + Duration::hours(1)).timestamp()),
        user: User {
            id: user_id,
            email: Some("ada@example.com".to_string()),
            user_metadata: UserMetadata::default(),
        },
    }
}

/// Profile with a name
pub fn test_profile(user_id: Uuid, full_name: &str) -> Profile {
    Profile {
        id: user_id,
        email: format!("{}@example.com", full_name.to_lowercase()),
        full_name: full_name.to_string(),
        avatar_url: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[derive(Default)]
struct Data {
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    access_token: Option<String>,
    user: Option<Uuid>,
    last_sign_up: Option<(String, String)>,
    profiles: Vec<Profile>,
    posts: Vec<Post>,
    likes: HashSet<(Uuid, Uuid)>,
    uploads: Vec<(String, usize, String)>,
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
}

/// Backend double that records calls and keeps rows in memory
#[derive(Default)]
pub struct MockBackend {
    data: Mutex<Data>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and fail it if it was marked failing
    fn call(&self, name: &'static str) -> Result<()> {
        let mut data = self.data();
        data.calls.push(name);
        if data.failing.remove(name) {
            bail!(BackendError::Api {
                status: 500,
                message: format!("{name} failed"),
            });
        }
        Ok(())
    }

    /// Make the next call to `name` fail
    pub fn fail_next(&self, name: &'static str) {
        self.data().failing.insert(name);
    }

    /// Names of all calls so far
    pub fn calls(&self) -> Vec<&'static str> {
        self.data().calls.clone()
    }

    /// How often `name` was called
    pub fn call_count(&self, name: &str) -> usize {
        self.data().calls.iter().filter(|c| **c == name).count()
    }

    /// Accept password sign-in and refresh for a new user; returns its ID
    pub fn signed_in_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.data().user = Some(id);
        id
    }

    pub fn access_token(&self) -> Option<String> {
        self.data().access_token.clone()
    }

    pub fn last_sign_up(&self) -> Option<(String, String)> {
        self.data().last_sign_up.clone()
    }

    pub fn add_profile(&self, profile: Profile) {
        self.data().profiles.push(profile);
    }

    /// Insert a post directly, as another client would
    pub fn add_post(&self, user_id: Uuid, content: &str) -> Post {
        let mut data = self.data();
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            content: Some(content.to_string()),
            image_url: None,
            created_at: Utc::now(),
            author: data.profiles.iter().find(|p| p.id == user_id).cloned(),
        };
        data.posts.push(post.clone());
        post
    }

    pub fn add_like(&self, user_id: Uuid, post_id: Uuid) {
        self.data().likes.insert((user_id, post_id));
    }

    pub fn posts(&self) -> Vec<Post> {
        self.data().posts.clone()
    }

    /// (path, size, content type) of every upload
    pub fn uploads(&self) -> Vec<(String, usize, String)> {
        self.data().uploads.clone()
    }

    /// Drop every subscriber's channel, as a server closing it would
    pub fn close_subscriptions(&self) {
        self.data().subscribers.clear();
    }

    /// Push a change to every subscriber
    pub async fn emit(&self, change: ChangeEvent) {
        let subscribers = self.data().subscribers.clone();
        for tx in subscribers {
            let _ = tx.send(change.clone()).await;
        }
    }
}

impl Backend for MockBackend {
    fn set_access_token(&self, token: Option<String>) {
        self.data().access_token = token;
    }

    async fn sign_up(&self, email: &str, _password: &str, full_name: &str) -> Result<Option<Session>> {
        self.call("sign_up")?;
        self.data().last_sign_up = Some((email.to_string(), full_name.to_string()));
        Ok(None)
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Session> {
        self.call("sign_in_with_password")?;
        match self.data().user {
            Some(id) => Ok(session_for(id)),
            None => bail!(BackendError::Api {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session> {
        self.call("refresh_session")?;
        match self.data().user {
            Some(id) => Ok(Session {
                access_token: format!("refreshed-{id}"),
                ..session_for(id)
            }),
            None => bail!("Invalid refresh token"),
        }
    }

    async fn reset_password_for_email(&self, _email: &str) -> Result<()> {
        self.call("reset_password_for_email")
    }

    async fn sign_out(&self) -> Result<()> {
        self.call("sign_out")
    }

    async fn fetch_user(&self) -> Result<User> {
        self.call("fetch_user")?;
        match self.data().user {
            Some(id) => Ok(session_for(id).user),
            None => bail!(BackendError::NotSignedIn),
        }
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.call("fetch_profile")?;
        match self.data().profiles.iter().find(|p| p.id == user_id) {
            Some(profile) => Ok(profile.clone()),
            None => bail!("Profile not found"),
        }
    }

    async fn fetch_posts(&self, author: Option<Uuid>) -> Result<Vec<Post>> {
        self.call("fetch_posts")?;
        let mut posts: Vec<Post> = self
            .data()
            .posts
            .iter()
            .filter(|p| author.is_none_or(|a| p.user_id == a))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        self.call("insert_post")?;
        let mut data = self.data();
        let row = Post {
            id: Uuid::new_v4(),
            user_id: post.user_id,
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            created_at: Utc::now(),
            author: data.profiles.iter().find(|p| p.id == post.user_id).cloned(),
        };
        data.posts.push(row.clone());
        Ok(row)
    }

    async fn like_exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.call("like_exists")?;
        Ok(self.data().likes.contains(&(user_id, post_id)))
    }

    async fn like_count(&self, post_id: Uuid) -> Result<u32> {
        self.call("like_count")?;
        let count = self.data().likes.iter().filter(|(_, p)| *p == post_id).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        self.call("insert_like")?;
        if !self.data().likes.insert((user_id, post_id)) {
            bail!(BackendError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        self.call("delete_like")?;
        self.data().likes.remove(&(user_id, post_id));
        Ok(())
    }

    async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.call("upload_object")?;
        self.data()
            .uploads
            .push((path.to_string(), bytes.len(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://mock.local/storage/v1/object/public/post-images/{path}")
    }

    async fn subscribe(&self, _table: &str) -> Result<Subscription> {
        self.call("subscribe")?;
        let (tx, rx) = mpsc::channel(16);
        self.data().subscribers.push(tx);
        Ok(Subscription::new(rx, None))
    }
}
