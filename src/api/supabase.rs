//! Supabase-compatible backend client (auth, REST tables, storage, realtime)

use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::error::BackendError;
use crate::models::{NewPost, Post, Profile, Session, User};

use super::realtime::{self, Subscription};
use super::{Backend, LIKES_TABLE, POSTS_TABLE, PROFILES_TABLE};

/// Columns selected for feed rows: the post plus its author's profile
const POST_SELECT: &str = "*,profiles(*)";

/// Supabase API client
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    /// Create a new client for a project URL
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            bucket: bucket.to_string(),
            access_token: RwLock::new(None),
        }
    }

    /// Create a client from the app configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.ensure_backend()?;
        Ok(Self::new(
            &config.backend_url,
            &config.anon_key,
            &config.storage_bucket,
        ))
    }

    /// Current access token, if signed in
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build auth API URL
    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, endpoint)
    }

    /// Build REST API URL for a table and a query string
    fn rest_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, table, query)
    }

    /// Build storage API URL for an object
    fn storage_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    /// Start a request carrying the API key and the current bearer token
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    /// Send an auth request with a JSON body and parse the session it returns
    async fn token_request<T: Serialize + Sync>(&self, grant_type: &str, body: &T) -> Result<Session> {
        let url = self.auth_url(&format!("/token?grant_type={grant_type}"));

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .context("Failed to reach auth service")?;

        let session: Session = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse session response")?;

        Ok(session.with_issued_at(Utc::now()))
    }
}

/// Turn a non-success response into a `BackendError`
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("Backend error {}: {}", status, body);
    Err(BackendError::from_response(status.as_u16(), &body).into())
}

/// Percent-encode each segment of an object path
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`
pub fn parse_content_range(header: &str) -> Option<u32> {
    header.rsplit('/').next()?.trim().parse().ok()
}

impl Backend for SupabaseClient {
    fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Option<Session>> {
        let url = self.auth_url("/signup");

        let request = SignUpRequest {
            email,
            password,
            data: SignUpData { full_name },
        };

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach auth service")?;

        let body: Value = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse sign-up response")?;

        // Without auto-confirm the backend returns only the user
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up for {} needs email confirmation", email);
            return Ok(None);
        }

        let session: Session =
            serde_json::from_value(body).context("Failed to parse sign-up session")?;
        Ok(Some(session.with_issued_at(Utc::now())))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.token_request("password", &PasswordGrant { email, password })
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        self.token_request("refresh_token", &RefreshGrant { refresh_token })
            .await
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        let url = self.auth_url("/recover");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&RecoverRequest { email })
            .send()
            .await
            .context("Failed to reach auth service")?;

        check(response).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        if self.access_token().is_none() {
            return Ok(());
        }

        let response = self
            .request(Method::POST, &self.auth_url("/logout"))
            .send()
            .await
            .context("Failed to reach auth service")?;

        check(response).await?;
        Ok(())
    }

    async fn fetch_user(&self) -> Result<User> {
        if self.access_token().is_none() {
            return Err(BackendError::NotSignedIn.into());
        }

        let response = self
            .request(Method::GET, &self.auth_url("/user"))
            .send()
            .await
            .context("Failed to reach auth service")?;

        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse user response")
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile> {
        let url = self.rest_url(PROFILES_TABLE, &format!("select=*&id=eq.{user_id}"));

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .context("Failed to fetch profile")?;

        let profiles: Vec<Profile> = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse profile response")?;

        profiles.into_iter().next().context("Profile not found")
    }

    async fn fetch_posts(&self, author: Option<Uuid>) -> Result<Vec<Post>> {
        let mut query = format!("select={POST_SELECT}&order=created_at.desc");
        if let Some(author) = author {
            query.push_str(&format!("&user_id=eq.{author}"));
        }

        let response = self
            .request(Method::GET, &self.rest_url(POSTS_TABLE, &query))
            .send()
            .await
            .context("Failed to fetch posts")?;

        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse posts response")
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let url = self.rest_url(POSTS_TABLE, &format!("select={POST_SELECT}"));

        let response = self
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(post)
            .send()
            .await
            .context("Failed to create post")?;

        let rows: Vec<Post> = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse created post")?;

        rows.into_iter().next().context("Backend returned no post row")
    }

    async fn like_exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let url = self.rest_url(
            LIKES_TABLE,
            &format!("select=id&user_id=eq.{user_id}&post_id=eq.{post_id}&limit=1"),
        );

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .context("Failed to check like")?;

        let rows: Vec<Value> = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse like response")?;

        Ok(!rows.is_empty())
    }

    async fn like_count(&self, post_id: Uuid) -> Result<u32> {
        let url = self.rest_url(LIKES_TABLE, &format!("select=id&post_id=eq.{post_id}"));

        let response = self
            .request(Method::HEAD, &url)
            .header("Prefer", "count=exact")
            .send()
            .await
            .context("Failed to count likes")?;

        let response = check(response).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .context("Missing like count in response")
    }

    async fn insert_like(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        let response = self
            .request(Method::POST, &self.rest_url(LIKES_TABLE, "select=id"))
            .header("Prefer", "return=minimal")
            .json(&LikeRequest { user_id, post_id })
            .send()
            .await
            .context("Failed to like post")?;

        check(response).await?;
        Ok(())
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> Result<()> {
        let url = self.rest_url(
            LIKES_TABLE,
            &format!("user_id=eq.{user_id}&post_id=eq.{post_id}"),
        );

        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .context("Failed to unlike post")?;

        check(response).await?;
        Ok(())
    }

    async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &self.storage_url(path))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .context("Failed to upload image")?;

        check(response).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription> {
        let url = realtime::websocket_url(&self.base_url, &self.anon_key);
        let token = self.access_token();
        realtime::connect(&url, table, token.as_deref()).await
    }
}

// ==================== API Types ====================

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Debug, Serialize)]
struct SignUpData<'a> {
    full_name: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct LikeRequest {
    user_id: Uuid,
    post_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_json(user_id: Uuid) -> Value {
        json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": user_id, "email": "ada@example.com", "user_metadata": { "full_name": "Ada" } }
        })
    }

    fn post_json(user_id: Uuid, content: Option<&str>, image_url: Option<&str>) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "content": content,
            "image_url": image_url,
            "created_at": "2025-11-01T10:00:00+00:00",
            "profiles": {
                "id": user_id,
                "email": "ada@example.com",
                "full_name": "Ada",
                "avatar_url": null,
                "created_at": "2025-10-01T00:00:00+00:00",
                "updated_at": "2025-10-01T00:00:00+00:00"
            }
        })
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let client = SupabaseClient::new("https://abc.supabase.co/", "anon", "post-images");
        assert_eq!(
            client.public_url("user/my photo.png"),
            "https://abc.supabase.co/storage/v1/object/public/post-images/user/my%20photo.png"
        );
    }

    #[tokio::test]
    async fn test_sign_in_sends_password_grant() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "email": "ada@example.com", "password": "secret1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json(user_id)))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        let session = client
            .sign_in_with_password("ada@example.com", "secret1")
            .await
            .unwrap();

        assert_eq!(session.user.id, user_id);
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_sign_in_error_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        let err = client
            .sign_in_with_password("ada@example.com", "wrong")
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<BackendError>(),
            Some(&BackendError::Api {
                status: 400,
                message: "Invalid login credentials".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_sign_up_without_confirmation_returns_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_json(json!({
                "email": "ada@example.com",
                "password": "secret1",
                "data": { "full_name": "Ada" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": Uuid::new_v4(),
                "email": "ada@example.com"
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        let session = client.sign_up("ada@example.com", "secret1", "Ada").await.unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_fetch_posts_uses_token_and_order() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("select", "*,profiles(*)"))
            .and(query_param("order", "created_at.desc"))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                post_json(user_id, Some("hello"), None),
                post_json(user_id, None, Some("https://x/y.png")),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        client.set_access_token(Some("access-1".to_string()));

        let posts = client.fetch_posts(None).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].text(), "hello");
        assert_eq!(posts[1].author_name(), "Ada");
    }

    #[tokio::test]
    async fn test_fetch_posts_for_author_filters() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("user_id", format!("eq.{user_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        assert!(client.fetch_posts(Some(user_id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_like_count_reads_content_range() {
        let server = MockServer::start().await;
        let post_id = Uuid::new_v4();

        Mock::given(method("HEAD"))
            .and(path("/rest/v1/likes"))
            .and(query_param("post_id", format!("eq.{post_id}")))
            .and(header("Prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "0-6/7"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        assert_eq!(client.like_count(post_id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_upload_then_public_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/post-images/u1/1.png"))
            .and(header("Content-Type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "post-images/u1/1.png" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        client
            .upload_object("u1/1.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(
            client.public_url("u1/1.png"),
            format!("{}/storage/v1/object/public/post-images/u1/1.png", server.uri())
        );
    }

    #[tokio::test]
    async fn test_sign_out_without_token_is_noop() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        client.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_user_requires_token() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "email": "ada@example.com",
                "user_metadata": { "full_name": "Ada" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon", "post-images");
        assert!(client.fetch_user().await.is_err());

        client.set_access_token(Some("access-1".to_string()));
        let user = client.fetch_user().await.unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.user_metadata.full_name.as_deref(), Some("Ada"));
    }
}
