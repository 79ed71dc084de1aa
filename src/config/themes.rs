use std::collections::HashMap;

use ratatui::style::Color;

use super::ThemeName;

/// Colours the diary screen is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub background: Color,
    pub gutter_fg: Color,
    pub gutter_bg: Color,
    pub current_line: Color,
    pub today_bg: Color,
    pub today_fg: Color,
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub accent: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    palettes: HashMap<ThemeName, Palette>,
}

impl ThemeRegistry {
    pub fn contains(&self, theme: &ThemeName) -> bool {
        self.palettes.contains_key(theme)
    }

    pub fn palette(&self, theme: &ThemeName) -> Palette {
        self.palettes
            .get(theme)
            .copied()
            .unwrap_or_else(light_palette)
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        let palettes = [
            (ThemeName::Light, light_palette()),
            (
                ThemeName::Dark,
                Palette {
                    text: Color::Gray,
                    background: Color::Reset,
                    gutter_fg: Color::DarkGray,
                    gutter_bg: Color::Black,
                    current_line: Color::DarkGray,
                    today_bg: Color::Green,
                    today_fg: Color::Black,
                    selected_bg: Color::Cyan,
                    selected_fg: Color::Black,
                    accent: Color::Cyan,
                },
            ),
            (
                ThemeName::HighContrast,
                Palette {
                    text: Color::White,
                    background: Color::Black,
                    gutter_fg: Color::White,
                    gutter_bg: Color::Black,
                    current_line: Color::Yellow,
                    today_bg: Color::Yellow,
                    today_fg: Color::Black,
                    selected_bg: Color::White,
                    selected_fg: Color::Black,
                    accent: Color::Yellow,
                },
            ),
        ]
        .into_iter()
        .collect();
        Self { palettes }
    }
}

fn light_palette() -> Palette {
    Palette {
        text: Color::Reset,
        background: Color::Reset,
        gutter_fg: Color::Gray,
        gutter_bg: Color::White,
        current_line: Color::Gray,
        // pale green
        today_bg: Color::Rgb(152, 251, 152),
        today_fg: Color::Black,
        selected_bg: Color::Blue,
        selected_fg: Color::White,
        accent: Color::Blue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_theme_has_a_palette() {
        let registry = ThemeRegistry::default();
        for theme in [ThemeName::Light, ThemeName::Dark, ThemeName::HighContrast] {
            assert!(registry.contains(&theme));
        }
        assert_eq!(
            registry.palette(&ThemeName::Light).today_bg,
            Color::Rgb(152, 251, 152)
        );
    }
}
