//! Theme configuration and colors.
//!
//! Palettes come from the `ratatui-themes` crate; [`ThemeColors`] maps a
//! palette onto the roles Framez screens use.

use ratatui::style::{Color, Modifier, Style};
use ratatui_themes::{ThemeName, ThemePalette};
use serde::{Deserialize, Serialize};

use crate::app::ToastKind;

/// Theme wrapper around `ThemeName` from ratatui-themes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme(pub ThemeName);

impl Theme {
    /// All available theme names.
    #[must_use]
    pub const fn all() -> &'static [ThemeName] {
        ThemeName::all()
    }

    /// Next theme in rotation
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0.next())
    }

    /// Display name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0.display_name()
    }

    /// Color roles for this theme
    #[must_use]
    pub fn colors(&self) -> ThemeColors {
        ThemeColors::from_palette(self.0.palette())
    }

    /// Inner `ThemeName`
    #[must_use]
    pub const fn inner(&self) -> ThemeName {
        self.0
    }
}

impl From<ThemeName> for Theme {
    fn from(name: ThemeName) -> Self {
        Self(name)
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Color roles used by the Framez screens.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    /// Screen background
    pub bg: Color,
    /// Card background
    pub bg_card: Color,
    /// Body text
    pub fg: Color,
    /// Secondary text (timestamps, hints)
    pub fg_muted: Color,

    /// Brand accent
    pub primary: Color,
    /// Second accent
    pub secondary: Color,

    /// Success toasts
    pub success: Color,
    /// Warnings
    pub warning: Color,
    /// Errors and error toasts
    pub error: Color,
    /// Informational toasts
    pub info: Color,

    /// Unfocused border
    pub border: Color,
    /// Focused border
    pub border_focus: Color,
    /// Selected card background
    pub selection: Color,

    /// Filled heart of a liked post
    pub heart: Color,
}

impl ThemeColors {
    /// Map a `ThemePalette` onto Framez roles
    #[must_use]
    pub fn from_palette(p: ThemePalette) -> Self {
        Self {
            bg: p.bg,
            bg_card: lighten(p.bg, 10),
            fg: p.fg,
            fg_muted: p.muted,

            primary: p.accent,
            secondary: p.secondary,

            success: p.success,
            warning: p.warning,
            error: p.error,
            info: p.info,

            border: p.muted,
            border_focus: p.accent,
            selection: p.selection,

            heart: p.error,
        }
    }

    /// Body text
    #[must_use]
    pub fn text(&self) -> Style {
        Style::default().fg(self.fg)
    }

    /// Muted text
    #[must_use]
    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.fg_muted)
    }

    /// Accent text
    #[must_use]
    pub fn text_primary(&self) -> Style {
        Style::default().fg(self.primary)
    }

    /// Secondary accent text
    #[must_use]
    pub fn text_secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    /// Warning text
    #[must_use]
    pub fn text_warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    /// Author name on a card
    #[must_use]
    pub fn author(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Heart and count; filled when liked
    #[must_use]
    pub fn like(&self, liked: bool) -> Style {
        if liked {
            Style::default().fg(self.heart).add_modifier(Modifier::BOLD)
        } else {
            self.text_muted()
        }
    }

    /// Toast text for a notification kind
    #[must_use]
    pub fn toast(&self, kind: ToastKind) -> Style {
        let color = match kind {
            ToastKind::Success => self.success,
            ToastKind::Error => self.error,
            ToastKind::Info => self.info,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Unfocused block border
    #[must_use]
    pub fn block(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Focused block border
    #[must_use]
    pub fn block_focus(&self) -> Style {
        Style::default().fg(self.border_focus)
    }

    /// Selected card
    #[must_use]
    pub fn selected(&self) -> Style {
        Style::default().bg(self.selection).fg(self.fg)
    }

    /// Inactive tab
    #[must_use]
    pub fn tab(&self) -> Style {
        Style::default().fg(self.fg_muted)
    }

    /// Active tab
    #[must_use]
    pub fn tab_active(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Key hints in help lines
    #[must_use]
    pub fn key_hint(&self) -> Style {
        Style::default()
            .fg(self.secondary)
            .add_modifier(Modifier::BOLD)
    }

    /// Wordmark in the title bar
    #[must_use]
    pub fn logo(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }
}

fn lighten(color: Color, amount: u8) -> Color {
    if let Color::Rgb(r, g, b) = color {
        Color::Rgb(
            r.saturating_add(amount),
            g.saturating_add(amount),
            b.saturating_add(amount),
        )
    } else {
        color
    }
}
