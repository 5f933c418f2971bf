use log::{info, warn};
use ratatui::style::Color;
use syntect::highlighting::{Theme as SyntaxTheme, ThemeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    /// Presentation-class token applied to the workspace root.
    pub class: &'static str,
    syntax: &'static str,
}

pub const THEME_CATALOG: [Theme; 3] = [
    Theme {
        name: "Light",
        class: "theme-light",
        syntax: "InspiredGitHub",
    },
    Theme {
        name: "Dark",
        class: "theme-dark",
        syntax: "base16-ocean.dark",
    },
    Theme {
        name: "Solarized",
        class: "theme-solarized",
        syntax: "Solarized (dark)",
    },
];

pub fn default_theme() -> Theme {
    THEME_CATALOG[0]
}

pub fn find_theme(name: &str) -> Option<Theme> {
    let name = name.trim();
    THEME_CATALOG
        .iter()
        .copied()
        .find(|theme| theme.name.eq_ignore_ascii_case(name))
}

pub fn catalog_position(theme: &Theme) -> Option<usize> {
    THEME_CATALOG.iter().position(|t| t == theme)
}

/// Process-wide current theme.
///
/// `generation` bumps on every `set_theme`, so observers holding derived
/// presentation can tell it has gone stale.
#[derive(Debug, Clone)]
pub struct ThemeState {
    current: Theme,
    generation: u64,
}

impl ThemeState {
    pub fn new(initial: Theme) -> Self {
        Self {
            current: initial,
            generation: 0,
        }
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if catalog_position(&theme).is_none() {
            warn!("event=theme_set status=uncatalogued name={:?}", theme.name);
        }
        self.current = theme;
        self.generation = self.generation.wrapping_add(1);
        info!("event=theme_set status=ok name={:?} class={}", theme.name, theme.class);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiPalette {
    pub base_fg: Color,
    pub base_bg: Option<Color>,
    pub accent: Color,
    pub muted: Color,
    pub code_bg: Option<Color>,
    pub border: Color,
}

/// Maps catalog themes onto syntect highlighting themes and terminal colors.
pub struct ThemeManager {
    theme_set: ThemeSet,
    fallback: SyntaxTheme,
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeManager {
    pub fn new() -> Self {
        Self {
            theme_set: ThemeSet::load_defaults(),
            fallback: SyntaxTheme::default(),
        }
    }

    pub fn syntax_theme(&self, theme: &Theme) -> &SyntaxTheme {
        self.theme_set
            .themes
            .get(theme.syntax)
            .unwrap_or(&self.fallback)
    }

    pub fn ui_palette(&self, theme: &Theme) -> UiPalette {
        palette_from_theme(self.syntax_theme(theme))
    }
}

fn palette_from_theme(theme: &SyntaxTheme) -> UiPalette {
    let settings = &theme.settings;
    let base_fg = settings
        .foreground
        .map(to_ratatui)
        .unwrap_or(Color::Gray);
    let base_bg = settings.background.map(to_ratatui);
    let accent = settings
        .caret
        .or(settings.selection_foreground)
        .or(settings.foreground)
        .map(to_ratatui)
        .unwrap_or(Color::Cyan);
    let muted = settings
        .gutter_foreground
        .or(settings.foreground)
        .map(to_ratatui)
        .unwrap_or(Color::DarkGray);
    let code_bg = settings
        .line_highlight
        .or(settings.selection)
        .or(settings.background)
        .map(to_ratatui);

    UiPalette {
        base_fg,
        base_bg,
        accent,
        muted,
        code_bg,
        border: muted,
    }
}

fn to_ratatui(color: syntect::highlighting::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_catalog_entry() {
        assert_eq!(ThemeState::new(default_theme()).current(), THEME_CATALOG[0]);
    }

    #[test]
    fn catalog_names_and_classes_are_unique() {
        for (i, a) in THEME_CATALOG.iter().enumerate() {
            for b in &THEME_CATALOG[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.class, b.class);
            }
        }
    }

    #[test]
    fn set_theme_replaces_and_bumps_generation() {
        let mut state = ThemeState::new(default_theme());
        let before = state.generation();
        state.set_theme(THEME_CATALOG[2]);
        assert_eq!(state.current().name, "Solarized");
        assert_eq!(state.generation(), before + 1);

        // Re-selecting the same theme still counts as a change.
        state.set_theme(THEME_CATALOG[2]);
        assert_eq!(state.generation(), before + 2);
    }

    #[test]
    fn find_theme_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(find_theme("dark").map(|t| t.class), Some("theme-dark"));
        assert_eq!(find_theme("Neon"), None);
    }

    #[test]
    fn every_catalog_theme_has_a_syntax_theme() {
        let manager = ThemeManager::new();
        for theme in THEME_CATALOG {
            assert!(manager.theme_set.themes.contains_key(theme.syntax), "{}", theme.name);
        }
        let light = manager.ui_palette(&THEME_CATALOG[0]);
        let dark = manager.ui_palette(&THEME_CATALOG[1]);
        assert_ne!(light.base_bg, dark.base_bg);
    }
}
