use super::text_metrics::{cursor_row_col, truncate_to_width, wrap_lines};
use super::theme::Theme;
use super::typewriter::TypewriterBoard;
use crate::persona::Persona;
use crate::state::{Message, Role, SavedExcerpt};
use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const MARKER: &str = "▍";

pub fn input_visual_rows(input: &str, width: usize) -> usize {
    wrap_lines(input, width).len().max(1)
}

/// Pre-wrapped lines for the history pane. Each entry carries the message's
/// position in the full conversation so `/save N` keeps working while a
/// search filter hides some of them.
pub fn conversation_lines(
    messages: &[(usize, &Message)],
    board: &TypewriterBoard,
    persona: &Persona,
    theme: &Theme,
    width: usize,
) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for (position, message) in messages {
        let (name, name_style, text_style) = match message.role {
            Role::Assistant => (
                persona.assistant_name.as_str(),
                theme.assistant_name,
                theme.assistant_text,
            ),
            Role::User => (persona.user_name.as_str(), theme.user_name, theme.user_text),
        };
        let time = message.timestamp.with_timezone(&Local).format("%H:%M");
        lines.push(Line::from(vec![
            Span::styled(format!("#{} ", position + 1), theme.timestamp),
            Span::styled(name.to_string(), name_style),
            Span::styled(format!("  {time}"), theme.timestamp),
        ]));

        let shown = board.displayed(message);
        let mut body: Vec<Line<'static>> = wrap_lines(shown, width)
            .into_iter()
            .map(|row| Line::styled(row, text_style))
            .collect();
        if board.show_marker(&message.id) {
            if let Some(last) = body.last_mut() {
                last.push_span(Span::styled(MARKER, theme.marker));
            }
        }
        lines.extend(body);

        if !message.sources.is_empty() && !message.streaming {
            lines.push(Line::styled(
                "  sources",
                theme.citation.add_modifier(Modifier::BOLD),
            ));
            for (index, source) in message.sources.iter().enumerate() {
                let entry = format!("  [{}] {} <{}>", index + 1, source.title, source.uri);
                lines.extend(
                    wrap_lines(&entry, width)
                        .into_iter()
                        .map(|row| Line::styled(row, theme.citation)),
                );
            }
        }
        lines.push(Line::default());
    }
    lines
}

pub fn render_header(frame: &mut Frame<'_>, area: Rect, title: &str, theme: &Theme) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let text = truncate_to_width(title, area.width as usize);
    frame.render_widget(Paragraph::new(text).style(theme.header), area);
}

/// Draws the rows of `lines` starting at `scroll`.
pub fn render_messages(
    frame: &mut Frame<'_>,
    area: Rect,
    lines: Vec<Line<'static>>,
    scroll: usize,
    theme: &Theme,
) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let scroll = scroll.min(u16::MAX as usize) as u16;
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(theme.base)
            .scroll((scroll, 0)),
        area,
    );
}

pub fn render_status_line(frame: &mut Frame<'_>, area: Rect, status: &str, style: Style) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let text = truncate_to_width(status, area.width as usize);
    frame.render_widget(Paragraph::new(text).style(style), area);
}

pub fn render_input(
    frame: &mut Frame<'_>,
    area: Rect,
    input: &str,
    cursor_byte: usize,
    theme: &Theme,
) {
    if area.height == 0 || area.width <= 2 {
        return;
    }

    let input_width = area.width.saturating_sub(2).max(1) as usize;
    let rows = wrap_lines(input, input_width);
    let (cursor_row, cursor_col) = cursor_row_col(input, cursor_byte, input_width);
    let visible_rows = area.height as usize;
    let window_start = cursor_row.saturating_add(1).saturating_sub(visible_rows);

    let rendered: Vec<Line<'static>> = (0..visible_rows)
        .map(|offset| {
            let row_index = window_start + offset;
            let prefix = if row_index == 0 { "> " } else { "  " };
            let row = rows.get(row_index).cloned().unwrap_or_default();
            Line::from(format!("{prefix}{row}"))
        })
        .collect();

    frame.render_widget(Paragraph::new(rendered).style(theme.input), area);

    let cursor_y = area
        .y
        .saturating_add(cursor_row.saturating_sub(window_start) as u16);
    let cursor_x = area
        .x
        .saturating_add(2 + cursor_col as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(1)));
    frame.set_cursor_position((cursor_x, cursor_y));
}

/// Centered overlay listing saved excerpts, newest first.
pub fn render_saved_panel(frame: &mut Frame<'_>, saved: &[SavedExcerpt], theme: &Theme) {
    let size = frame.area();
    let width = size.width.clamp(30, 96).min(size.width);
    let height = size.height.clamp(8, 24).min(size.height);
    let x = size.x + size.width.saturating_sub(width) / 2;
    let y = size.y + size.height.saturating_sub(height) / 2;
    let area = Rect::new(x, y, width, height);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Saved wisdom ({})", saved.len()))
        .style(theme.panel);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text_width = inner.width.max(1) as usize;
    let mut lines = vec![Line::styled(
        "/unsave N removes an entry   esc closes",
        theme.timestamp,
    )];
    if saved.is_empty() {
        lines.push(Line::from("Nothing saved yet."));
    }
    for (index, excerpt) in saved.iter().enumerate() {
        let when = excerpt.saved_at.with_timezone(&Local).format("%d %b %H:%M");
        lines.push(Line::default());
        lines.push(Line::styled(
            format!("{}. saved {when}", index + 1),
            theme.assistant_name,
        ));
        lines.extend(
            wrap_lines(&excerpt.content, text_width)
                .into_iter()
                .take(4)
                .map(|row| Line::styled(row, theme.assistant_text)),
        );
    }

    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}
