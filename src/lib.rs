//! # Framez 📸
//!
//! A photo-sharing social client for your terminal.
//!
//! ## Overview
//!
//! Framez talks to a Supabase-compatible backend: sign up and log in, read a
//! live feed of photo posts, like them, publish your own with an image and a
//! caption, and look at your profile. Everything the TUI does is also
//! available as a one-shot CLI command.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          App                                │
//! │   Sync event loop + async worker over command channels      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │      Auth       │ │  Feed / Likes   │ │       UI        │
//! │                 │ │                 │ │                 │
//! │ • Auth store    │ │ • Feed sync     │ │ • Routes        │
//! │ • Sessions      │ │ • Like toggle   │ │ • Post cards    │
//! │ • Credentials   │ │ • Composer      │ │ • Themes        │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!          │                   │                   │
//!          └───────────────────┴───────────────────┘
//!                              │
//!                              ▼
//!                 ┌─────────────────────────┐
//!                 │           API           │
//!                 │ • Auth, tables, storage │
//!                 │ • Realtime websocket    │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`] — The `Backend` trait and the Supabase client
//! - [`app`] — TUI application state and event loop
//! - [`auth`] — Auth state store, session manager, credential storage
//! - [`compose`] — Post drafts and image upload
//! - [`config`] — Configuration management
//! - [`likes`] — Like state and toggling
//! - [`profile`] — Profile page data
//! - [`sync`] — Feed synchronization
//! - [`theme`] — Theme support via ratatui-themes
//!
//! ## Example
//!
//! ```no_run
//! use framez::{Config, app};
//!
//! fn main() -> anyhow::Result<()> {
//!     app::run(Config::load()?)
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/framez/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_excessive_bools)]

pub mod api;
pub mod app;
pub mod auth;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod likes;
pub mod models;
pub mod paths;
pub mod profile;
pub mod sync;
pub mod theme;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use api::{Backend, SupabaseClient};
pub use app::AppState;
pub use config::Config;
pub use context::AppContext;
pub use error::{BackendError, ValidationError};
pub use models::{LikeState, Post, Profile, Session, User};
pub use theme::{Theme, ThemeColors};

// Re-export theme types from ratatui-themes crate
pub use ratatui_themes::{ThemeName, ThemePalette};

/// ASCII logo for the application
pub const LOGO: &str = r"
    ______
   / ____/________ _____ ___  ___  ____
  / /_  / ___/ __ `/ __ `__ \/ _ \/_  /
 / __/ / /  / /_/ / / / / / /  __/ / /_
/_/   /_/   \__,_/_/ /_/ /_/\___/ /___/
";

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
