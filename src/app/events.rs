//! Event handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::async_ops::AsyncCommand;
use super::state::{AppState, Mode, Route, ToastKind};
use crate::sync::RefreshTrigger;
use crate::theme::Theme;

/// Handle key events, returning an optional async command
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> Option<AsyncCommand> {
    match state.mode {
        Mode::ThemePicker => {
            handle_theme_picker_key(state, key);
            return None;
        }
        Mode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter) {
                state.mode = Mode::Normal;
            }
            return None;
        }
        Mode::Normal => {}
    }

    if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
        state.should_quit = true;
        return None;
    }

    if state.focused_field().is_some() {
        return handle_form_key(state, key);
    }

    // Global shortcuts on screens without inputs
    match key.code {
        KeyCode::Char('q') => {
            state.should_quit = true;
            return None;
        }
        KeyCode::Char('?') | KeyCode::F(1) => {
            state.mode = Mode::Help;
            return None;
        }
        KeyCode::Char('t') => {
            state.theme_picker_index = Theme::all()
                .iter()
                .position(|t| *t == state.theme.inner())
                .unwrap_or(0);
            state.mode = Mode::ThemePicker;
            return None;
        }
        _ => {}
    }

    match state.route {
        Route::Feed | Route::Profile => handle_list_key(state, key),
        _ => handle_tab_key(state, key),
    }
}

/// Switch tabs. Returns the command the new tab needs on focus.
fn switch_tab(state: &mut AppState, route: Route) -> Option<AsyncCommand> {
    state.navigate(route);
    on_focus(state)
}

/// Command to run when a tab gains focus
pub fn on_focus(state: &mut AppState) -> Option<AsyncCommand> {
    match state.route {
        Route::Feed => {
            state.loading = state.posts.is_empty();
            Some(AsyncCommand::RefreshFeed(RefreshTrigger::Focus))
        }
        Route::Profile => {
            let user_id = state.auth.user()?.id;
            state.profile_loading = true;
            Some(AsyncCommand::LoadProfile(user_id))
        }
        _ => None,
    }
}

fn handle_tab_key(state: &mut AppState, key: KeyEvent) -> Option<AsyncCommand> {
    match (key.modifiers, key.code) {
        (_, KeyCode::Tab) => {
            let next = state.route.next_tab();
            switch_tab(state, next)
        }
        (_, KeyCode::BackTab) => {
            let prev = state.route.prev_tab();
            switch_tab(state, prev)
        }
        (_, KeyCode::Char('1')) => switch_tab(state, Route::Feed),
        (_, KeyCode::Char('2')) => switch_tab(state, Route::Create),
        (_, KeyCode::Char('3')) => switch_tab(state, Route::Profile),
        (KeyModifiers::SHIFT, KeyCode::Char('O')) => Some(AsyncCommand::SignOut),
        (_, KeyCode::Esc) => {
            state.toast = None;
            None
        }
        _ => None,
    }
}

fn handle_list_key(state: &mut AppState, key: KeyEvent) -> Option<AsyncCommand> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            state.select_next();
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            state.select_prev();
            None
        }
        KeyCode::Char('g') | KeyCode::Home => {
            match state.route {
                Route::Profile => state.selected_profile_post = 0,
                _ => state.selected_post = 0,
            }
            None
        }
        KeyCode::Char('r') => {
            if state.route == Route::Profile {
                return on_focus(state);
            }
            if state.refreshing {
                return None;
            }
            state.refreshing = true;
            Some(AsyncCommand::RefreshFeed(RefreshTrigger::PullToRefresh))
        }
        KeyCode::Char('l' | ' ') => {
            let post_id = state.visible_posts().get(state.selection())?.id;
            if !state.likes.contains_key(&post_id) {
                // Nothing to toggle from yet
                return Some(AsyncCommand::LoadLikes(vec![post_id]));
            }
            state
                .begin_like(post_id)
                .then_some(AsyncCommand::ToggleLike { post_id })
        }
        KeyCode::Char('n') => switch_tab(state, Route::Create),
        _ => handle_tab_key(state, key),
    }
}

fn handle_form_key(state: &mut AppState, key: KeyEvent) -> Option<AsyncCommand> {
    let field = state.focused_field()?;

    match (key.modifiers, key.code) {
        (_, KeyCode::Esc) if state.route == Route::Create => {
            state.navigate(Route::Feed);
            on_focus(state)
        }
        (_, KeyCode::Esc) if state.route != Route::Login => {
            state.navigate(Route::Login);
            None
        }
        (_, KeyCode::Esc) => {
            state.should_quit = true;
            None
        }
        (_, KeyCode::Tab | KeyCode::Down) => {
            state.focus_next();
            None
        }
        (_, KeyCode::BackTab | KeyCode::Up) => {
            state.focus_prev();
            None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('s')) => submit(state),
        (KeyModifiers::CONTROL, KeyCode::Char('n')) if state.route == Route::Login => {
            state.navigate(Route::Signup);
            None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('r')) if state.route == Route::Login => {
            state.reset_email = state.sign_in.email.clone();
            state.navigate(Route::ForgotPassword);
            None
        }
        (_, KeyCode::Enter) if field.is_multiline() => {
            state.field_mut(field).push('\n');
            None
        }
        (_, KeyCode::Enter) => {
            if state.focus + 1 < state.fields().len() {
                state.focus_next();
                None
            } else {
                submit(state)
            }
        }
        (_, KeyCode::Backspace) => {
            state.field_mut(field).pop();
            None
        }
        (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
            state.field_mut(field).push(c);
            None
        }
        _ => None,
    }
}

/// Validate locally and build the command for the current form
fn submit(state: &mut AppState) -> Option<AsyncCommand> {
    if state.submitting || state.posting {
        return None;
    }

    let cmd = match state.route {
        Route::Login => state
            .sign_in
            .validate()
            .map(|()| AsyncCommand::SignIn(state.sign_in.clone())),
        Route::Signup => state
            .sign_up
            .validate()
            .map(|()| AsyncCommand::SignUp(state.sign_up.clone())),
        Route::ForgotPassword => crate::auth::validate::validate_reset_email(&state.reset_email)
            .map(|()| AsyncCommand::ResetPassword(state.reset_email.clone())),
        Route::Create => {
            let draft = state.current_draft();
            draft.validate().map(|()| AsyncCommand::CreatePost(draft))
        }
        Route::Feed | Route::Profile => return None,
    };

    match cmd {
        Ok(cmd) => {
            if state.route == Route::Create {
                state.posting = true;
                state.notify(ToastKind::Info, "Posting...");
            } else {
                state.submitting = true;
            }
            Some(cmd)
        }
        Err(e) => {
            state.notify_error(e.to_string());
            None
        }
    }
}

fn handle_theme_picker_key(state: &mut AppState, key: KeyEvent) {
    let themes = Theme::all();
    let len = themes.len();

    match key.code {
        KeyCode::Esc => {
            state.theme = state.config.theme;
            state.mode = Mode::Normal;
        }
        KeyCode::Enter => {
            let selected = Theme::from(themes[state.theme_picker_index]);
            state.theme = selected;
            state.config.theme = selected;
            state.mode = Mode::Normal;
            state.notify(ToastKind::Success, format!("Theme set to {}", selected.name()));
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.theme_picker_index = (state.theme_picker_index + 1) % len;
            state.theme = Theme::from(themes[state.theme_picker_index]);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.theme_picker_index = state.theme_picker_index.checked_sub(1).unwrap_or(len - 1);
            state.theme = Theme::from(themes[state.theme_picker_index]);
        }
        KeyCode::Char('n') => state.next_theme(),
        _ => {}
    }
}
