//! UI rendering for the TUI

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::state::{AppState, Mode, Route, ToastKind};
use crate::models::{LikeState, Post};
use crate::theme::{Theme, ThemeColors};

/// Wordmark shown in the title bar
const ICON: &str = "📷";

/// Spinner animation frames
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Indent of card body lines
const CARD_INDENT: &str = "   ";

/// Main render function
pub fn render(frame: &mut Frame, state: &AppState) {
    let colors = state.theme.colors();

    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(colors.bg)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Screen
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_tabs(frame, state, chunks[0]);
    match state.route {
        Route::Login | Route::Signup | Route::ForgotPassword => {
            render_auth_screen(frame, state, chunks[1]);
        }
        Route::Feed => render_feed(frame, state, chunks[1]),
        Route::Create => render_composer(frame, state, chunks[1]),
        Route::Profile => render_profile(frame, state, chunks[1]),
    }
    render_status_bar(frame, state, chunks[2]);

    match state.mode {
        Mode::Help => render_help_popup(frame, state),
        Mode::ThemePicker => render_theme_picker(frame, state),
        Mode::Normal => {}
    }
}

fn render_tabs(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block())
        .title(format!(" {ICON} Framez "))
        .title_style(colors.logo());

    if state.route.is_public() {
        let title = Paragraph::new(Line::from(Span::styled(
            state.route.title(),
            colors.tab_active(),
        )))
        .block(block);
        frame.render_widget(title, area);
        return;
    }

    let titles: Vec<Line> = Route::TABS
        .iter()
        .enumerate()
        .map(|(i, route)| {
            let marker = if *route == state.route { "●" } else { "○" };
            Line::from(format!("{marker} {} {}", i + 1, route.title()))
        })
        .collect();
    let selected = Route::TABS.iter().position(|r| *r == state.route);

    let tabs = Tabs::new(titles)
        .block(block)
        .select(selected)
        .style(colors.tab())
        .highlight_style(colors.tab_active())
        .divider(Span::styled(" │ ", colors.text_muted()));

    frame.render_widget(tabs, area);
}

// ==================== Auth screens ====================

fn render_auth_screen(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();
    let form_area = centered_rect(60, 80, area);

    let (heading, blurb) = match state.route {
        Route::Signup => ("Create account", "Join Framez and start sharing."),
        Route::ForgotPassword => (
            "Forgot password?",
            "We'll email you a link to reset it.",
        ),
        _ => ("Welcome back", "Log in to see what your friends are sharing."),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            heading,
            colors.text_primary().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::from(Span::styled(blurb, colors.text_muted())).alignment(Alignment::Center),
        Line::from(""),
    ];
    lines.extend(form_lines(state, &colors));

    lines.push(Line::from(""));
    let button = if state.submitting {
        format!("{} Please wait", spinner(state.current_tick()))
    } else {
        match state.route {
            Route::Signup => "[ Sign up ]".to_string(),
            Route::ForgotPassword => "[ Send reset link ]".to_string(),
            _ => "[ Log in ]".to_string(),
        }
    };
    lines.push(Line::from(Span::styled(button, colors.tab_active())).alignment(Alignment::Center));
    lines.push(Line::from(""));

    let hints: &[(&str, &str)] = match state.route {
        Route::Login => &[("Ctrl+N", "sign up"), ("Ctrl+R", "forgot password")],
        _ => &[("Esc", "back to log in")],
    };
    lines.push(hint_line(hints, &colors).alignment(Alignment::Center));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block_focus());
    frame.render_widget(Paragraph::new(lines).block(block), form_area);
}

/// Labelled inputs for the fields of the current screen
fn form_lines(state: &AppState, colors: &ThemeColors) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, field) in state.fields().iter().enumerate() {
        let focused = i == state.focus;
        let value = state.field_value(*field);
        let shown = if field.is_secret() {
            "•".repeat(value.chars().count())
        } else {
            value.to_string()
        };

        lines.push(Line::from(Span::styled(
            format!("  {}", field.label()),
            if focused {
                colors.text_primary()
            } else {
                colors.text_muted()
            },
        )));
        let cursor = if focused { "▏" } else { "" };
        for (n, text) in shown.split('\n').enumerate() {
            let prefix = if n == 0 { "  › " } else { "    " };
            lines.push(Line::from(vec![
                Span::styled(prefix, colors.text_secondary()),
                Span::styled(text.to_string(), colors.text()),
            ]));
        }
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled(cursor, colors.text_primary()));
        }
        lines.push(Line::from(""));
    }
    lines
}

// ==================== Feed ====================

fn render_feed(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();

    let title = if state.refreshing {
        format!(" Feed {} ", spinner(state.current_tick()))
    } else {
        format!(" Feed ({}) ", state.posts.len())
    };
    let block = Block::default()
        .title(title)
        .title_style(colors.text_primary())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block_focus());

    if state.loading && state.posts.is_empty() {
        render_loading(frame, state, block, area, "Loading posts...");
        return;
    }
    if state.posts.is_empty() {
        render_empty_state(
            frame,
            &colors,
            block,
            area,
            ("📭", "No posts yet", "Be the first to share something! Press n."),
        );
        return;
    }

    render_post_list(frame, state, &state.posts, state.selected_post, block, area);
}

fn render_post_list(
    frame: &mut Frame,
    state: &AppState,
    posts: &[Post],
    selected: usize,
    block: Block<'_>,
    area: Rect,
) {
    let colors = state.theme.colors();
    let width = usize::from(area.width.saturating_sub(3));

    let items: Vec<ListItem> = posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let lines = post_card(post, state.like_state(post.id), width, &colors, i == selected);
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items).block(block);
    let mut list_state = ListState::default();
    list_state.select(Some(selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

/// Lines of one post card: header, body, image reference, likes
pub fn post_card(
    post: &Post,
    like: LikeState,
    width: usize,
    colors: &ThemeColors,
    selected: bool,
) -> Vec<Line<'static>> {
    let base = if selected {
        colors.selected()
    } else {
        Style::default()
    };

    let initial = post
        .author
        .as_ref()
        .map_or('?', crate::models::Profile::initial);
    let header = format!(" ({initial}) {} · {}", post.author_name(), post.relative_time());

    let mut lines = vec![Line::styled(pad(&header, width), base.patch(colors.author()))];

    let body_width = width.saturating_sub(CARD_INDENT.len() + 1).max(1);
    for paragraph in post.text().lines() {
        if paragraph.trim().is_empty() {
            lines.push(Line::styled(pad("", width), base));
            continue;
        }
        for wrapped in textwrap::wrap(paragraph, body_width) {
            lines.push(Line::styled(
                pad(&format!("{CARD_INDENT}{wrapped}"), width),
                base.patch(colors.text()),
            ));
        }
    }

    if let Some(url) = &post.image_url {
        let name = url.rsplit('/').next().unwrap_or(url);
        lines.push(Line::styled(
            pad(&format!("{CARD_INDENT}🖼  {name}"), width),
            base.patch(colors.text_secondary()),
        ));
    }

    let heart = if like.liked { "♥" } else { "♡" };
    let count = if like.count > 0 {
        format!(" {}", like.count)
    } else {
        String::new()
    };
    let pending = if like.loading { " …" } else { "" };
    lines.push(Line::styled(
        pad(&format!("{CARD_INDENT}{heart}{count}{pending}"), width),
        base.patch(colors.like(like.liked)),
    ));

    lines.push(Line::from(""));
    lines
}

/// Pad with spaces to a display width so selection fills the row
fn pad(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(used)))
}

// ==================== Composer ====================

fn render_composer(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();

    let block = Block::default()
        .title(" New post ")
        .title_style(colors.text_primary())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block_focus());

    let mut lines = vec![Line::from("")];
    lines.extend(form_lines(state, &colors));

    let draft = state.current_draft();
    if let Some(path) = &draft.image {
        let status = if path.is_file() {
            Span::styled("  ✓ image attached", colors.text_secondary())
        } else {
            Span::styled("  ✗ file not found", colors.text_warning())
        };
        lines.push(Line::from(status));
        lines.push(Line::from(""));
    }

    let button = if state.posting {
        format!("{} Posting", spinner(state.current_tick()))
    } else {
        "[ Post ]".to_string()
    };
    lines.push(Line::from(Span::styled(button, colors.tab_active())).alignment(Alignment::Center));
    lines.push(Line::from(""));
    lines.push(
        hint_line(
            &[("Ctrl+S", "post"), ("Tab", "next field"), ("Esc", "back to feed")],
            &colors,
        )
        .alignment(Alignment::Center),
    );

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

// ==================== Profile ====================

fn render_profile(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    let header_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block());

    let Some(view) = &state.profile else {
        render_loading(frame, state, header_block, area, "Loading profile...");
        return;
    };

    let header = vec![
        Line::from(vec![
            Span::styled(format!(" ({}) ", view.profile.initial()), colors.author()),
            Span::styled(
                view.profile.display_name(),
                colors.text().add_modifier(Modifier::BOLD),
            ),
            if state.profile_loading {
                Span::styled(format!("  {}", spinner(state.current_tick())), colors.text_muted())
            } else {
                Span::raw("")
            },
        ]),
        Line::from(Span::styled(
            format!("     {}", view.profile.email),
            colors.text_muted(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("     {}", view.stats.posts), colors.text_primary()),
            Span::styled(" posts   ", colors.text_muted()),
            Span::styled(view.stats.likes_received.to_string(), colors.like(true)),
            Span::styled(" likes", colors.text_muted()),
        ]),
        hint_line(&[("r", "reload"), ("Shift+O", "log out")], &colors),
    ];
    frame.render_widget(Paragraph::new(header).block(header_block), chunks[0]);

    let block = Block::default()
        .title(" Posts ")
        .title_style(colors.text_primary())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(colors.block_focus());

    if view.posts.is_empty() {
        render_empty_state(
            frame,
            &colors,
            block,
            chunks[1],
            ("📷", "No posts yet", "Your posts will show up here."),
        );
        return;
    }

    render_post_list(
        frame,
        state,
        &view.posts,
        state.selected_profile_post,
        block,
        chunks[1],
    );
}

// ==================== Shared components ====================

/// Current spinner frame
pub fn spinner(tick: u64) -> &'static str {
    let idx = usize::try_from(tick / 2).unwrap_or(0) % SPINNER.len();
    SPINNER[idx]
}

fn render_loading(frame: &mut Frame, state: &AppState, block: Block<'_>, area: Rect, text: &str) {
    let colors = state.theme.colors();
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(spinner(state.current_tick()), colors.text_primary()),
            Span::styled(format!(" {text}"), colors.text_muted()),
        ])
        .alignment(Alignment::Center),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Icon, title and description centered in the area
fn render_empty_state(
    frame: &mut Frame,
    colors: &ThemeColors,
    block: Block<'_>,
    area: Rect,
    (icon, title, description): (&str, &str, &str),
) {
    let lines = vec![
        Line::from(""),
        Line::from(icon.to_string()).alignment(Alignment::Center),
        Line::from(""),
        Line::from(Span::styled(
            title.to_string(),
            colors.text().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::from(Span::styled(description.to_string(), colors.text_muted()))
            .alignment(Alignment::Center),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn hint_line(hints: &[(&str, &str)], colors: &ThemeColors) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", colors.text_muted()));
        }
        spans.push(Span::styled((*key).to_string(), colors.key_hint()));
        spans.push(Span::styled(format!(": {action}"), colors.text_muted()));
    }
    Line::from(spans)
}

fn render_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let colors = state.theme.colors();

    let content = if let Some(toast) = &state.toast {
        let icon = match toast.kind {
            ToastKind::Success => "✓",
            ToastKind::Error => "✗",
            ToastKind::Info => "ℹ",
        };
        Line::from(Span::styled(
            format!(" {icon} {}", toast.message),
            colors.toast(toast.kind),
        ))
    } else {
        let mut line = Line::from(" ");
        if let Some(name) = state.auth.display_name() {
            line.push_span(Span::styled(format!("{name}  "), colors.text_secondary()));
        }
        let hints: &[(&str, &str)] = match state.route {
            Route::Feed => &[
                ("j/k", "move"),
                ("l", "like"),
                ("r", "refresh"),
                ("Tab", "next tab"),
                ("?", "help"),
                ("q", "quit"),
            ],
            Route::Profile => &[("j/k", "move"), ("l", "like"), ("?", "help"), ("q", "quit")],
            Route::Create => &[("Ctrl+S", "post"), ("Esc", "cancel")],
            _ => &[("Enter", "next/submit"), ("Ctrl+C", "quit")],
        };
        for span in hint_line(hints, &colors).spans {
            line.push_span(span);
        }
        line
    };

    let status = Paragraph::new(content).style(Style::default().bg(colors.bg_card));
    frame.render_widget(status, area);
}

fn render_help_popup(frame: &mut Frame, state: &AppState) {
    let colors = state.theme.colors();
    let popup_area = centered_rect(50, 70, frame.area());

    frame.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(
            format!("  {title}"),
            colors.text_primary().add_modifier(Modifier::BOLD),
        ))
    };
    let key = |k: &'static str, action: &'static str| {
        Line::from(vec![
            Span::styled(format!("    {k:<10}"), colors.key_hint()),
            Span::styled(action, colors.text()),
        ])
    };

    let lines = vec![
        Line::from(""),
        section("Navigation"),
        key("1 2 3", "Feed, Create, Profile"),
        key("Tab", "Next tab"),
        key("j / k", "Move selection"),
        key("g", "Jump to top"),
        Line::from(""),
        section("Posts"),
        key("l / Space", "Like or unlike"),
        key("r", "Refresh"),
        key("n", "New post"),
        key("Ctrl+S", "Publish (composer)"),
        Line::from(""),
        section("General"),
        key("t", "Pick theme"),
        key("Shift+O", "Log out"),
        key("?", "Toggle help"),
        key("q", "Quit"),
    ];

    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(colors.block_focus())
            .style(Style::default().bg(colors.bg_card))
            .title(" Help ")
            .title_style(colors.text_primary()),
    );
    frame.render_widget(help, popup_area);
}

fn render_theme_picker(frame: &mut Frame, state: &AppState) {
    let colors = state.theme.colors();
    let popup_area = centered_rect(50, 70, frame.area());

    frame.render_widget(Clear, popup_area);

    let themes = Theme::all();
    let items: Vec<ListItem> = themes
        .iter()
        .enumerate()
        .map(|(i, theme_name)| {
            let palette = theme_name.palette();
            let selected = i == state.theme_picker_index;
            let label = format!(
                "  {} {} ",
                if selected { "▸" } else { " " },
                theme_name.display_name()
            );
            let style = if selected {
                Style::default()
                    .fg(palette.accent)
                    .bg(palette.selection)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.fg).bg(colors.bg)
            };

            ListItem::new(Line::from(vec![
                Span::styled(label, style),
                Span::styled("█", Style::default().fg(palette.accent).bg(colors.bg)),
                Span::styled("█", Style::default().fg(palette.secondary).bg(colors.bg)),
                Span::styled("█", Style::default().fg(palette.error).bg(colors.bg)),
            ]))
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(Some(state.theme_picker_index));

    let list = List::new(items).style(Style::default().bg(colors.bg)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(colors.block_focus())
            .title(format!(
                " Theme ({}/{}) ",
                state.theme_picker_index + 1,
                themes.len()
            ))
            .title_bottom(Line::from(" ↑↓ preview │ ↵ apply │ Esc cancel ").centered()),
    );
    frame.render_stateful_widget(list, popup_area, &mut list_state);
}

/// Helper function to create a centered rect
const fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_width = r.width * percent_x / 100;
    let popup_height = r.height * percent_y / 100;
    Rect {
        x: r.x + (r.width.saturating_sub(popup_width)) / 2,
        y: r.y + (r.height.saturating_sub(popup_height)) / 2,
        width: popup_width,
        height: popup_height,
    }
}
