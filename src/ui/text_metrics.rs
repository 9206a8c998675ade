use unicode_width::UnicodeWidthChar;

pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Hard-wraps `text` to `width` columns. Explicit newlines always break;
/// carriage returns are dropped. Never returns an empty list.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut used = 0usize;

    for ch in text.chars() {
        match ch {
            '\r' => continue,
            '\n' => {
                lines.push(String::new());
                used = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_width(ch);
        if used + ch_width > width && used > 0 {
            lines.push(String::new());
            used = 0;
        }
        if let Some(line) = lines.last_mut() {
            line.push(ch);
        }
        used += ch_width;
    }
    lines
}

/// Row and column of byte offset `cursor` once `text` is wrapped to `width`.
pub fn cursor_row_col(text: &str, cursor: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let cursor = floor_char_boundary(text, cursor);
    let (mut row, mut col) = (0usize, 0usize);

    for (idx, ch) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        match ch {
            '\r' => continue,
            '\n' => {
                row += 1;
                col = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_width(ch);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }

    if col >= width {
        (row + 1, 0)
    } else {
        (row, col)
    }
}

/// Cuts `text` to at most `width` columns, marking the cut with `...` when
/// there is room for it.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let width = width.max(1);
    if display_width(text) <= width {
        return text.to_string();
    }
    let budget = if width >= 4 { width - 3 } else { width };
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_width(ch);
        if used + ch_width > budget {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    if width >= 4 {
        out.push_str("...");
    }
    out
}

pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
