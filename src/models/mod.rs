//! Data models for Framez

mod like;
mod post;
mod profile;
mod session;

pub use like::{Like, LikeState};
pub use post::{NewPost, Post};
pub use profile::{Profile, ProfileStats};
pub use session::{Session, User, UserMetadata};
