//! Post composer: optional image upload followed by the post insert

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use image::ImageFormat;
use uuid::Uuid;

use crate::api::Backend;
use crate::error::ValidationError;
use crate::models::{NewPost, Post};

/// Content type used when the image format cannot be detected
const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";
const FALLBACK_EXTENSION: &str = "jpg";

/// A post being written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Caption text
    pub content: String,
    /// Local image to attach
    pub image: Option<PathBuf>,
}

impl Draft {
    /// Draft with text only
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image: None,
        }
    }

    /// Attach an image
    #[must_use]
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }

    /// Trimmed text, or `None` when blank
    pub fn trimmed_content(&self) -> Option<String> {
        let trimmed = self.content.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// A post needs text or an image
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trimmed_content().is_none() && self.image.is_none() {
            return Err(ValidationError::EmptyPost);
        }
        Ok(())
    }

    /// Whether nothing has been entered
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.image.is_none()
    }
}

/// Image bytes ready for upload
#[derive(Debug)]
struct ImageUpload {
    bytes: Vec<u8>,
    content_type: &'static str,
    extension: &'static str,
}

impl ImageUpload {
    async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;

        let (content_type, extension) = match image::guess_format(&bytes) {
            Ok(format) => (format.to_mime_type(), extension_for(format)),
            Err(_) => {
                tracing::debug!("Unknown image format for {}", path.display());
                (FALLBACK_CONTENT_TYPE, FALLBACK_EXTENSION)
            }
        };

        Ok(Self {
            bytes,
            content_type,
            extension,
        })
    }
}

fn extension_for(format: ImageFormat) -> &'static str {
    format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Object path for a user's upload
pub fn object_path(user_id: Uuid, unix_millis: i64, extension: &str) -> String {
    format!("{user_id}/{unix_millis}.{extension}")
}

/// Creates posts on behalf of the signed-in user
pub struct Composer<B> {
    backend: Arc<B>,
}

impl<B: Backend> Composer<B> {
    /// Create a composer
    pub const fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Validate, upload the image if any, then insert the post row.
    ///
    /// An upload failure means no row is written. An insert failure after a
    /// successful upload leaves the uploaded object in the bucket.
    pub async fn create_post(&self, user_id: Uuid, draft: &Draft) -> Result<Post> {
        draft.validate()?;

        let image_url = match &draft.image {
            Some(path) => Some(self.upload_image(user_id, path).await?),
            None => None,
        };

        let new_post = NewPost {
            user_id,
            content: draft.trimmed_content(),
            image_url,
        };

        match self.backend.insert_post(&new_post).await {
            Ok(post) => {
                tracing::info!("Created post {}", post.id);
                Ok(post)
            }
            Err(e) => {
                if let Some(url) = &new_post.image_url {
                    tracing::warn!("Post insert failed, uploaded image left orphaned at {}", url);
                }
                Err(e.context("Failed to create post"))
            }
        }
    }

    async fn upload_image(&self, user_id: Uuid, path: &Path) -> Result<String> {
        let upload = ImageUpload::read(path).await?;
        let object = object_path(user_id, Utc::now().timestamp_millis(), upload.extension);

        tracing::debug!(
            "Uploading {} ({} bytes, {})",
            object,
            upload.bytes.len(),
            upload.content_type
        );
        self.backend
            .upload_object(&object, upload.bytes, upload.content_type)
            .await
            .context("Failed to upload image")?;

        Ok(self.backend.public_url(&object))
    }
}
