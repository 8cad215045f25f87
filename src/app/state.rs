//! Application state

use std::collections::HashMap;
use std::path::PathBuf;

use uuid::Uuid;

use crate::auth::{AuthState, SignInForm, SignUpForm};
use crate::compose::Draft;
use crate::config::Config;
use crate::models::{LikeState, Post};
use crate::profile::ProfileView;
use crate::theme::Theme;

/// Ticks a toast stays visible (the loop polls every 50 ms)
const TOAST_TICKS: u64 = 60;

/// Screens. The first three are public, the rest are tabs for signed-in users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Login,
    Signup,
    ForgotPassword,
    Feed,
    Create,
    Profile,
}

impl Route {
    /// Tab routes in display order
    pub const TABS: [Self; 3] = [Self::Feed, Self::Create, Self::Profile];

    /// Reachable without a session
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Login | Self::Signup | Self::ForgotPassword)
    }

    /// Where to go given whether a session exists
    pub const fn resolve(self, signed_in: bool) -> Self {
        match (signed_in, self.is_public()) {
            (true, true) => Self::Feed,
            (false, false) => Self::Login,
            _ => self,
        }
    }

    /// Next tab
    pub const fn next_tab(self) -> Self {
        match self {
            Self::Feed => Self::Create,
            Self::Create => Self::Profile,
            Self::Profile => Self::Feed,
            other => other,
        }
    }

    /// Previous tab
    pub const fn prev_tab(self) -> Self {
        match self {
            Self::Feed => Self::Profile,
            Self::Create => Self::Feed,
            Self::Profile => Self::Create,
            other => other,
        }
    }

    /// Title shown in the tab bar
    pub const fn title(self) -> &'static str {
        match self {
            Self::Login => "Log in",
            Self::Signup => "Sign up",
            Self::ForgotPassword => "Reset password",
            Self::Feed => "Feed",
            Self::Create => "Create",
            Self::Profile => "Profile",
        }
    }

    /// Input fields on this screen, in focus order
    pub const fn fields(self) -> &'static [Field] {
        match self {
            Self::Login => &[Field::Email, Field::Password],
            Self::Signup => &[
                Field::FullName,
                Field::Email,
                Field::Password,
                Field::ConfirmPassword,
            ],
            Self::ForgotPassword => &[Field::Email],
            Self::Create => &[Field::Content, Field::ImagePath],
            Self::Feed | Self::Profile => &[],
        }
    }
}

/// A text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FullName,
    Email,
    Password,
    ConfirmPassword,
    Content,
    ImagePath,
}

impl Field {
    /// Label shown next to the input
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full name",
            Self::Email => "Email",
            Self::Password => "Password",
            Self::ConfirmPassword => "Confirm password",
            Self::Content => "What's on your mind?",
            Self::ImagePath => "Image file",
        }
    }

    /// Whether input is masked
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::ConfirmPassword)
    }

    /// Whether Enter inserts a newline instead of moving on
    pub const fn is_multiline(self) -> bool {
        matches!(self, Self::Content)
    }
}

/// Modal overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Help,
    ThemePicker,
}

/// Notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// A transient notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    expires_at: u64,
}

/// Application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Whether to quit
    pub should_quit: bool,
    /// Current theme
    pub theme: Theme,
    /// Current screen
    pub route: Route,
    /// Overlay
    pub mode: Mode,
    /// Theme picker cursor
    pub theme_picker_index: usize,

    /// Latest auth snapshot
    pub auth: AuthState,
    /// Sign-in form
    pub sign_in: SignInForm,
    /// Sign-up form
    pub sign_up: SignUpForm,
    /// Password-reset email
    pub reset_email: String,
    /// Focused field index on the current screen
    pub focus: usize,
    /// An auth request is in flight
    pub submitting: bool,

    /// Feed posts, newest first
    pub posts: Vec<Post>,
    /// Selected feed card
    pub selected_post: usize,
    /// Feed is loading for the first time
    pub loading: bool,
    /// Pull-to-refresh in progress
    pub refreshing: bool,
    /// Like state per post
    pub likes: HashMap<Uuid, LikeState>,

    /// Post being written
    pub draft: Draft,
    /// Image path as typed
    pub image_input: String,
    /// A post is being published
    pub posting: bool,

    /// Loaded profile page
    pub profile: Option<ProfileView>,
    /// Selected card on the profile page
    pub selected_profile_post: usize,
    /// Profile page is loading
    pub profile_loading: bool,

    /// Current notification
    pub toast: Option<Toast>,

    tick: u64,
}

impl AppState {
    /// Create a new app state
    pub fn new(config: Config) -> Self {
        let theme = config.theme;
        Self {
            config,
            should_quit: false,
            theme,
            route: Route::Login,
            mode: Mode::Normal,
            theme_picker_index: 0,
            auth: AuthState::default(),
            sign_in: SignInForm::default(),
            sign_up: SignUpForm::default(),
            reset_email: String::new(),
            focus: 0,
            submitting: false,
            posts: Vec::new(),
            selected_post: 0,
            loading: false,
            refreshing: false,
            likes: HashMap::new(),
            draft: Draft::default(),
            image_input: String::new(),
            posting: false,
            profile: None,
            selected_profile_post: 0,
            profile_loading: false,
            toast: None,
            tick: 0,
        }
    }

    /// Advance the animation clock and expire the toast
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        if self.toast.as_ref().is_some_and(|t| t.expires_at <= self.tick) {
            self.toast = None;
        }
    }

    /// Current tick
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Show a notification
    pub fn notify(&mut self, kind: ToastKind, message: impl Into<String>) {
        self.toast = Some(Toast {
            kind,
            message: message.into(),
            expires_at: self.tick.saturating_add(TOAST_TICKS),
        });
    }

    /// Show an error notification
    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notify(ToastKind::Error, message);
    }

    /// Take a new auth snapshot and redirect if the session appeared or went away.
    /// Returns `true` when the user just became signed in.
    pub fn apply_auth(&mut self, auth: AuthState) -> bool {
        let was_signed_in = self.auth.is_signed_in();
        let signed_in = auth.is_signed_in();
        self.auth = auth;

        if was_signed_in && !signed_in {
            self.clear_user_data();
        }
        self.navigate(self.route);

        signed_in && !was_signed_in
    }

    /// Go to a route, subject to the session redirect
    pub fn navigate(&mut self, route: Route) {
        let target = route.resolve(self.auth.is_signed_in());
        if target != self.route {
            self.route = target;
            self.focus = 0;
        }
    }

    /// Fields of the current screen
    pub const fn fields(&self) -> &'static [Field] {
        self.route.fields()
    }

    /// Focused field, if the screen has any
    pub fn focused_field(&self) -> Option<Field> {
        self.fields().get(self.focus).copied()
    }

    /// Move focus to the next field
    pub fn focus_next(&mut self) {
        let len = self.fields().len();
        if len > 0 {
            self.focus = (self.focus + 1) % len;
        }
    }

    /// Move focus to the previous field
    pub fn focus_prev(&mut self) {
        let len = self.fields().len();
        if len > 0 {
            self.focus = self.focus.checked_sub(1).unwrap_or(len - 1);
        }
    }

    /// Text buffer behind a field on the current screen
    pub fn field_mut(&mut self, field: Field) -> &mut String {
        match (self.route, field) {
            (Route::Login, Field::Email) => &mut self.sign_in.email,
            (Route::Login, _) => &mut self.sign_in.password,
            (Route::Signup, Field::FullName) => &mut self.sign_up.full_name,
            (Route::Signup, Field::Email) => &mut self.sign_up.email,
            (Route::Signup, Field::ConfirmPassword) => &mut self.sign_up.confirm_password,
            (Route::Signup, _) => &mut self.sign_up.password,
            (Route::Create, Field::ImagePath) => &mut self.image_input,
            (Route::Create, _) => &mut self.draft.content,
            _ => &mut self.reset_email,
        }
    }

    /// Current value of a field
    pub fn field_value(&self, field: Field) -> &str {
        match (self.route, field) {
            (Route::Login, Field::Email) => &self.sign_in.email,
            (Route::Login, _) => &self.sign_in.password,
            (Route::Signup, Field::FullName) => &self.sign_up.full_name,
            (Route::Signup, Field::Email) => &self.sign_up.email,
            (Route::Signup, Field::ConfirmPassword) => &self.sign_up.confirm_password,
            (Route::Signup, _) => &self.sign_up.password,
            (Route::Create, Field::ImagePath) => &self.image_input,
            (Route::Create, _) => &self.draft.content,
            _ => &self.reset_email,
        }
    }

    /// Draft with the typed image path applied
    pub fn current_draft(&self) -> Draft {
        let path = self.image_input.trim();
        Draft {
            content: self.draft.content.clone(),
            image: (!path.is_empty()).then(|| PathBuf::from(path)),
        }
    }

    /// Clear the composer after a successful post
    pub fn reset_composer(&mut self) {
        self.draft = Draft::default();
        self.image_input.clear();
        self.focus = 0;
    }

    /// Selected feed post
    pub fn selected_post(&self) -> Option<&Post> {
        self.posts.get(self.selected_post)
    }

    /// Posts on the current screen
    pub fn visible_posts(&self) -> &[Post] {
        match (self.route, &self.profile) {
            (Route::Profile, Some(view)) => &view.posts,
            (Route::Profile, None) => &[],
            _ => &self.posts,
        }
    }

    /// Selected card on the current screen
    pub const fn selection(&self) -> usize {
        match self.route {
            Route::Profile => self.selected_profile_post,
            _ => self.selected_post,
        }
    }

    /// Move the selection down
    pub fn select_next(&mut self) {
        let len = self.visible_posts().len();
        let selected = match self.route {
            Route::Profile => &mut self.selected_profile_post,
            _ => &mut self.selected_post,
        };
        if len > 0 {
            *selected = (*selected + 1).min(len - 1);
        }
    }

    /// Move the selection up
    pub fn select_prev(&mut self) {
        let selected = match self.route {
            Route::Profile => &mut self.selected_profile_post,
            _ => &mut self.selected_post,
        };
        *selected = selected.saturating_sub(1);
    }

    /// Replace the feed, keeping the selection in range
    pub fn set_posts(&mut self, posts: Vec<Post>) {
        self.posts = posts;
        self.selected_post = self.selected_post.min(self.posts.len().saturating_sub(1));
        self.loading = false;
        self.refreshing = false;
    }

    /// Like state of a post
    pub fn like_state(&self, post_id: Uuid) -> LikeState {
        self.likes.get(&post_id).copied().unwrap_or_default()
    }

    /// Posts whose like state should be (re)read. Entries with a toggle in
    /// flight are left alone.
    pub fn likes_to_load(&self, posts: &[Post]) -> Vec<Uuid> {
        posts
            .iter()
            .map(|p| p.id)
            .filter(|id| !self.like_state(*id).loading)
            .collect()
    }

    /// Mark a like toggle as started. Returns `false` if the post's like
    /// state has not loaded or a toggle is already in flight.
    pub fn begin_like(&mut self, post_id: Uuid) -> bool {
        self.likes.get_mut(&post_id).is_some_and(LikeState::begin)
    }

    /// Cycle through themes
    pub fn next_theme(&mut self) {
        self.theme = self.theme.next();
        self.config.theme = self.theme;
    }

    fn clear_user_data(&mut self) {
        self.posts.clear();
        self.selected_post = 0;
        self.likes.clear();
        self.profile = None;
        self.selected_profile_post = 0;
        self.reset_composer();
        self.sign_in = SignInForm::default();
        self.sign_up = SignUpForm::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::session_for;

    fn signed_in() -> AuthState {
        let mut auth = AuthState::default();
        auth.set_session(Some(session_for(Uuid::new_v4())));
        auth
    }

    fn test_post() -> Post {
        Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: Some("hello".to_string()),
            image_url: None,
            created_at: chrono::Utc::now(),
            author: None,
        }
    }

    #[test]
    fn test_route_redirects() {
        for route in [Route::Login, Route::Signup, Route::ForgotPassword] {
            assert_eq!(route.resolve(true), Route::Feed);
            assert_eq!(route.resolve(false), route);
        }
        for route in Route::TABS {
            assert_eq!(route.resolve(true), route);
            assert_eq!(route.resolve(false), Route::Login);
        }
    }

    #[test]
    fn test_sign_in_then_out_moves_between_groups() {
        let mut state = AppState::new(Config::default());
        state.navigate(Route::Profile);
        assert_eq!(state.route, Route::Login);

        assert!(state.apply_auth(signed_in()));
        assert_eq!(state.route, Route::Feed);

        state.navigate(Route::Signup);
        assert_eq!(state.route, Route::Feed);

        state.posts = vec![];
        state.likes.insert(Uuid::new_v4(), LikeState::new(true, 1));
        assert!(!state.apply_auth(AuthState::default()));
        assert_eq!(state.route, Route::Login);
        assert!(state.likes.is_empty());
    }

    #[test]
    fn test_begin_like_gates_second_press() {
        let mut state = AppState::new(Config::default());
        let post_id = Uuid::new_v4();
        state.likes.insert(post_id, LikeState::new(false, 2));

        assert!(state.begin_like(post_id));
        assert!(!state.begin_like(post_id));
        assert!(state.like_state(post_id).loading);
    }

    #[test]
    fn test_begin_like_needs_loaded_state() {
        let mut state = AppState::new(Config::default());
        let post_id = Uuid::new_v4();

        assert!(!state.begin_like(post_id));
        assert!(!state.likes.contains_key(&post_id));
    }

    #[test]
    fn test_likes_to_load_skips_in_flight_toggles() {
        let mut state = AppState::new(Config::default());
        let posts = vec![test_post(), test_post()];
        state.likes.insert(posts[0].id, LikeState::new(true, 3));
        state.likes.insert(posts[1].id, LikeState::new(false, 0));
        state.begin_like(posts[1].id);

        assert_eq!(state.likes_to_load(&posts), vec![posts[0].id]);
    }

    #[test]
    fn test_focus_wraps_and_edits_field() {
        let mut state = AppState::new(Config::default());
        state.navigate(Route::Signup);
        assert_eq!(state.focused_field(), Some(Field::FullName));

        state.focus_prev();
        assert_eq!(state.focused_field(), Some(Field::ConfirmPassword));
        state.field_mut(Field::ConfirmPassword).push_str("secret");
        assert_eq!(state.sign_up.confirm_password, "secret");

        state.focus_next();
        assert_eq!(state.focused_field(), Some(Field::FullName));
    }

    #[test]
    fn test_toast_expires() {
        let mut state = AppState::new(Config::default());
        state.notify(ToastKind::Info, "hello");
        for _ in 0..TOAST_TICKS - 1 {
            state.tick();
        }
        assert!(state.toast.is_some());
        state.tick();
        assert!(state.toast.is_none());
    }

    #[test]
    fn test_current_draft_uses_image_input() {
        let mut state = AppState::new(Config::default());
        state.image_input = "  ".to_string();
        assert!(state.current_draft().image.is_none());
        state.image_input = " /tmp/cat.png ".to_string();
        assert_eq!(
            state.current_draft().image,
            Some(PathBuf::from("/tmp/cat.png"))
        );
    }
}
