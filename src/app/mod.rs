//! TUI Application module

mod async_ops;
mod events;
mod state;
mod ui;

pub use state::{AppState, Field, Mode, Route, Toast, ToastKind};
pub use ui::post_card;

use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::api::Backend;
use crate::auth::CredentialStore;
use crate::config::Config;
use crate::context::AppContext;

use async_ops::{AsyncCommand, AsyncHandle, AsyncResult, spawn_worker};

/// Run the TUI application
pub fn run(config: Config) -> Result<()> {
    let rt = Runtime::new()?;

    // Restore the stored session before the first frame
    let context = Arc::new(rt.block_on(AppContext::connect(config))?);
    let async_handle = rt.block_on(async { spawn_worker(Arc::clone(&context)) });

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut state = AppState::new(context.config.clone());

    let result = run_app(&mut terminal, &mut state, &context, async_handle);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Save config on exit (keeps the chosen theme)
    if state.config != context.config {
        state.config.save()?;
    }

    result
}

fn run_app<B: Backend, S: CredentialStore>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    context: &AppContext<B, S>,
    mut async_handle: AsyncHandle,
) -> Result<()> {
    let mut auth_rx = context.auth().subscribe();

    let initial = auth_rx.borrow_and_update().clone();
    if state.apply_auth(initial)
        && let Some(cmd) = events::on_focus(state)
    {
        let _ = async_handle.cmd_tx.blocking_send(cmd);
    }

    loop {
        // Follow session changes from the auth store
        if auth_rx.has_changed().unwrap_or(false) {
            let snapshot = auth_rx.borrow_and_update().clone();
            if state.apply_auth(snapshot)
                && let Some(cmd) = events::on_focus(state)
            {
                let _ = async_handle.cmd_tx.blocking_send(cmd);
            }
        }

        while let Ok(result) = async_handle.result_rx.try_recv() {
            if let Some(cmd) = handle_async_result(state, result) {
                let _ = async_handle.cmd_tx.blocking_send(cmd);
            }
        }

        terminal.draw(|frame| ui::render(frame, state))?;

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(cmd) = events::handle_key(state, key)
        {
            let _ = async_handle.cmd_tx.blocking_send(cmd);
        }

        state.tick();

        if state.should_quit {
            let _ = async_handle.cmd_tx.blocking_send(AsyncCommand::Shutdown);
            break;
        }
    }

    Ok(())
}

/// Apply a worker result to the state. May return a follow-up command.
fn handle_async_result(state: &mut AppState, result: AsyncResult) -> Option<AsyncCommand> {
    match result {
        AsyncResult::SignedIn => {
            state.submitting = false;
            state.notify(ToastKind::Success, "Welcome back!");
            None
        }
        AsyncResult::SignedUp { confirmed } => {
            state.submitting = false;
            if confirmed {
                state.notify(ToastKind::Success, "Account created!");
            } else {
                state.sign_in.email = state.sign_up.email.trim().to_string();
                state.notify(
                    ToastKind::Success,
                    "Account created. Check your email to confirm it, then log in.",
                );
                state.navigate(Route::Login);
            }
            None
        }
        AsyncResult::ResetSent { email } => {
            state.submitting = false;
            state.notify(ToastKind::Success, format!("Reset link sent to {email}"));
            state.navigate(Route::Login);
            None
        }
        AsyncResult::SignedOut => {
            state.notify(ToastKind::Info, "Signed out");
            None
        }
        AsyncResult::FeedLoaded { posts } => {
            state.set_posts(posts);
            // Counts change under us, so every reload rereads them
            load_likes(state.likes_to_load(&state.posts))
        }
        AsyncResult::FeedFailed { message } => {
            state.loading = false;
            state.refreshing = false;
            state.notify_error(message);
            None
        }
        AsyncResult::LikesLoaded { states } => {
            for (post_id, like) in states {
                // A toggle in flight owns the entry
                if !state.like_state(post_id).loading {
                    state.likes.insert(post_id, like);
                }
            }
            None
        }
        AsyncResult::LikeToggled { post_id, state: like } => {
            state.likes.insert(post_id, like);
            None
        }
        AsyncResult::LikeFailed { post_id, message } => {
            // The backend's view is unknown now; reread it
            state.likes.remove(&post_id);
            state.notify_error(message);
            Some(AsyncCommand::LoadLikes(vec![post_id]))
        }
        AsyncResult::PostCreated { post } => {
            state.posting = false;
            state.reset_composer();
            state.posts.insert(0, post);
            state.selected_post = 0;
            state.notify(ToastKind::Success, "Posted!");
            state.navigate(Route::Feed);
            events::on_focus(state)
        }
        AsyncResult::PostFailed { message } => {
            state.posting = false;
            state.notify_error(message);
            None
        }
        AsyncResult::ProfileLoaded { view } => {
            state.profile_loading = false;
            state.selected_profile_post = state
                .selected_profile_post
                .min(view.posts.len().saturating_sub(1));
            let missing = state.likes_to_load(&view.posts);
            state.profile = Some(view);
            load_likes(missing)
        }
        AsyncResult::Error { message } => {
            state.submitting = false;
            state.profile_loading = false;
            state.notify_error(message);
            None
        }
    }
}

fn load_likes(post_ids: Vec<Uuid>) -> Option<AsyncCommand> {
    (!post_ids.is_empty()).then_some(AsyncCommand::LoadLikes(post_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthState;
    use crate::models::{LikeState, Post};
    use crate::testing::session_for;
    use chrono::Utc;

    fn signed_in_state() -> AppState {
        let mut state = AppState::new(Config::default());
        let mut auth = AuthState::default();
        auth.set_session(Some(session_for(Uuid::new_v4())));
        state.apply_auth(auth);
        state
    }

    fn post() -> Post {
        Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: Some("hello".to_string()),
            image_url: None,
            created_at: Utc::now(),
            author: None,
        }
    }

    #[test]
    fn test_feed_loaded_requests_likes() {
        let mut state = signed_in_state();
        let post = post();

        let cmd = handle_async_result(
            &mut state,
            AsyncResult::FeedLoaded {
                posts: vec![post.clone()],
            },
        );

        assert!(matches!(cmd, Some(AsyncCommand::LoadLikes(ids)) if ids == vec![post.id]));
        assert_eq!(state.posts.len(), 1);
    }

    #[test]
    fn test_feed_failure_keeps_posts() {
        let mut state = signed_in_state();
        state.set_posts(vec![post()]);
        state.refreshing = true;

        handle_async_result(
            &mut state,
            AsyncResult::FeedFailed {
                message: "Failed to load posts".to_string(),
            },
        );

        assert_eq!(state.posts.len(), 1);
        assert!(!state.refreshing);
        assert_eq!(state.toast.as_ref().map(|t| t.kind), Some(ToastKind::Error));
    }

    #[test]
    fn test_feed_reload_rereads_known_likes() {
        let mut state = signed_in_state();
        let post = post();
        handle_async_result(
            &mut state,
            AsyncResult::FeedLoaded {
                posts: vec![post.clone()],
            },
        );
        state.likes.insert(post.id, LikeState::new(false, 1));

        let cmd = handle_async_result(
            &mut state,
            AsyncResult::FeedLoaded {
                posts: vec![post.clone()],
            },
        );

        assert!(matches!(cmd, Some(AsyncCommand::LoadLikes(ids)) if ids == vec![post.id]));
    }

    #[test]
    fn test_like_failure_forgets_and_reloads_state() {
        let mut state = signed_in_state();
        let post_id = Uuid::new_v4();
        state.likes.insert(post_id, LikeState::new(false, 2));
        assert!(state.begin_like(post_id));

        let cmd = handle_async_result(
            &mut state,
            AsyncResult::LikeFailed {
                post_id,
                message: "Failed to like post".to_string(),
            },
        );

        assert!(!state.likes.contains_key(&post_id));
        assert!(matches!(cmd, Some(AsyncCommand::LoadLikes(ids)) if ids == vec![post_id]));
        assert_eq!(state.toast.as_ref().map(|t| t.kind), Some(ToastKind::Error));
    }

    #[test]
    fn test_loaded_likes_do_not_clobber_in_flight_toggle() {
        let mut state = signed_in_state();
        let post_id = Uuid::new_v4();
        state.likes.insert(post_id, LikeState::new(false, 0));
        state.begin_like(post_id);

        handle_async_result(
            &mut state,
            AsyncResult::LikesLoaded {
                states: vec![(post_id, LikeState::new(true, 9))],
            },
        );

        assert!(state.like_state(post_id).loading);
    }

    #[test]
    fn test_post_created_returns_to_feed() {
        let mut state = signed_in_state();
        state.navigate(Route::Create);
        state.draft.content = "hello".to_string();
        state.posting = true;

        let cmd = handle_async_result(&mut state, AsyncResult::PostCreated { post: post() });

        assert_eq!(state.route, Route::Feed);
        assert!(state.draft.is_empty());
        assert!(!state.posting);
        assert!(matches!(cmd, Some(AsyncCommand::RefreshFeed(_))));
    }

    #[test]
    fn test_unconfirmed_sign_up_goes_to_login() {
        let mut state = AppState::new(Config::default());
        state.navigate(Route::Signup);
        state.sign_up.email = " ada@example.com ".to_string();
        state.submitting = true;

        handle_async_result(&mut state, AsyncResult::SignedUp { confirmed: false });

        assert_eq!(state.route, Route::Login);
        assert_eq!(state.sign_in.email, "ada@example.com");
        assert!(!state.submitting);
    }
}
