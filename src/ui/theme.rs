use ratatui::style::{Color, Modifier, Style};

/// Colors for one appearance. Picked from `AppSettings::dark_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub base: Style,
    pub header: Style,
    pub assistant_name: Style,
    pub user_name: Style,
    pub assistant_text: Style,
    pub user_text: Style,
    pub timestamp: Style,
    pub citation: Style,
    pub marker: Style,
    pub status: Style,
    pub notice: Style,
    pub input: Style,
    pub panel: Style,
}

impl Theme {
    pub fn for_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    fn dark() -> Self {
        Self {
            base: Style::default().fg(Color::White).bg(Color::Rgb(17, 17, 22)),
            header: Style::default()
                .fg(Color::Rgb(244, 114, 182))
                .bg(Color::Rgb(30, 27, 38))
                .add_modifier(Modifier::BOLD),
            assistant_name: Style::default()
                .fg(Color::Rgb(244, 114, 182))
                .add_modifier(Modifier::BOLD),
            user_name: Style::default()
                .fg(Color::Rgb(125, 211, 252))
                .add_modifier(Modifier::BOLD),
            assistant_text: Style::default().fg(Color::Rgb(230, 230, 235)),
            user_text: Style::default().fg(Color::Rgb(200, 220, 240)),
            timestamp: Style::default().fg(Color::DarkGray),
            citation: Style::default()
                .fg(Color::Rgb(167, 139, 250))
                .add_modifier(Modifier::ITALIC),
            marker: Style::default()
                .fg(Color::Rgb(244, 114, 182))
                .add_modifier(Modifier::SLOW_BLINK),
            status: Style::default().fg(Color::DarkGray),
            notice: Style::default().fg(Color::Yellow),
            input: Style::default().fg(Color::Gray).bg(Color::Rgb(24, 24, 24)),
            panel: Style::default().fg(Color::Rgb(244, 114, 182)).bg(Color::Rgb(30, 27, 38)),
        }
    }

    fn light() -> Self {
        Self {
            base: Style::default().fg(Color::Black).bg(Color::Rgb(253, 242, 248)),
            header: Style::default()
                .fg(Color::Rgb(190, 24, 93))
                .bg(Color::Rgb(252, 231, 243))
                .add_modifier(Modifier::BOLD),
            assistant_name: Style::default()
                .fg(Color::Rgb(190, 24, 93))
                .add_modifier(Modifier::BOLD),
            user_name: Style::default()
                .fg(Color::Rgb(3, 105, 161))
                .add_modifier(Modifier::BOLD),
            assistant_text: Style::default().fg(Color::Rgb(40, 40, 48)),
            user_text: Style::default().fg(Color::Rgb(30, 58, 95)),
            timestamp: Style::default().fg(Color::Gray),
            citation: Style::default()
                .fg(Color::Rgb(109, 40, 217))
                .add_modifier(Modifier::ITALIC),
            marker: Style::default()
                .fg(Color::Rgb(190, 24, 93))
                .add_modifier(Modifier::SLOW_BLINK),
            status: Style::default().fg(Color::Gray),
            notice: Style::default().fg(Color::Rgb(180, 83, 9)),
            input: Style::default().fg(Color::Black).bg(Color::Rgb(243, 232, 238)),
            panel: Style::default().fg(Color::Rgb(190, 24, 93)).bg(Color::Rgb(252, 231, 243)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_differ() {
        assert_ne!(Theme::for_mode(true), Theme::for_mode(false));
        assert_eq!(Theme::for_mode(true).base.bg, Some(Color::Rgb(17, 17, 22)));
    }
}
