use super::text_metrics::floor_char_boundary;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press asks the app to do beyond editing the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerAction {
    None,
    Submit(String),
    Cancel,
    Quit,
    ScrollUp,
    ScrollDown,
}

/// The draft being typed, plus recall of previously sent drafts.
#[derive(Debug, Default)]
pub struct Composer {
    buffer: String,
    cursor: usize,
    sent: Vec<String>,
    recall_index: Option<usize>,
    stash: Option<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Replaces the whole draft and parks the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.cursor = self.buffer.len();
        self.recall_index = None;
    }

    pub fn clear(&mut self) {
        self.set_text(String::new());
    }

    pub fn insert_str(&mut self, value: &str) {
        self.recall_index = None;
        let at = floor_char_boundary(&self.buffer, self.cursor);
        self.buffer.insert_str(at, value);
        self.cursor = at + value.len();
    }

    pub fn backspace(&mut self) {
        let end = floor_char_boundary(&self.buffer, self.cursor);
        let start = self.prev_boundary(end);
        if start == end {
            return;
        }
        self.recall_index = None;
        self.buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    pub fn delete(&mut self) {
        let start = floor_char_boundary(&self.buffer, self.cursor);
        let end = self.next_boundary(start);
        if start == end {
            return;
        }
        self.recall_index = None;
        self.buffer.replace_range(start..end, "");
        self.cursor = start;
    }

    /// Takes the draft for sending. Whitespace-only drafts stay put.
    pub fn submit(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let value = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.recall_index = None;
        self.stash = None;
        if self.sent.last() != Some(&value) {
            self.sent.push(value.clone());
        }
        Some(value)
    }

    pub fn recall_previous(&mut self) {
        if self.sent.is_empty() {
            return;
        }
        let index = match self.recall_index {
            Some(index) => index.saturating_sub(1),
            None => {
                self.stash = Some(self.buffer.clone());
                self.sent.len() - 1
            }
        };
        self.recall_index = Some(index);
        self.buffer = self.sent[index].clone();
        self.cursor = self.buffer.len();
    }

    pub fn recall_next(&mut self) {
        let Some(index) = self.recall_index else {
            return;
        };
        if index + 1 < self.sent.len() {
            self.recall_index = Some(index + 1);
            self.buffer = self.sent[index + 1].clone();
        } else {
            self.recall_index = None;
            self.buffer = self.stash.take().unwrap_or_default();
        }
        self.cursor = self.buffer.len();
    }

    pub fn apply_key(&mut self, key: KeyEvent) -> ComposerAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return ComposerAction::Cancel,
            KeyCode::Char('d') if ctrl && self.buffer.is_empty() => return ComposerAction::Quit,
            KeyCode::Char('j') if ctrl => self.insert_str("\n"),
            KeyCode::Char('u') if ctrl => self.clear(),
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => self.insert_str("\n"),
            KeyCode::Enter => {
                if let Some(value) = self.submit() {
                    return ComposerAction::Submit(value);
                }
            }
            KeyCode::Esc => return ComposerAction::Cancel,
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.prev_boundary(self.cursor),
            KeyCode::Right => self.cursor = self.next_boundary(self.cursor),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.buffer.len(),
            KeyCode::Up => self.recall_previous(),
            KeyCode::Down => self.recall_next(),
            KeyCode::PageUp => return ComposerAction::ScrollUp,
            KeyCode::PageDown => return ComposerAction::ScrollDown,
            KeyCode::Char(ch) => self.insert_str(ch.encode_utf8(&mut [0u8; 4])),
            _ => {}
        }
        ComposerAction::None
    }

    fn prev_boundary(&self, index: usize) -> usize {
        let index = floor_char_boundary(&self.buffer, index);
        self.buffer[..index]
            .char_indices()
            .next_back()
            .map_or(0, |(at, _)| at)
    }

    fn next_boundary(&self, index: usize) -> usize {
        let index = floor_char_boundary(&self.buffer, index);
        self.buffer[index..]
            .chars()
            .next()
            .map_or(index, |ch| index + ch.len_utf8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut Composer, text: &str) {
        for ch in text.chars() {
            composer.apply_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_typing_and_submit() {
        let mut composer = Composer::new();
        type_text(&mut composer, "héllo");
        assert_eq!(composer.text(), "héllo");
        assert_eq!(
            composer.apply_key(key(KeyCode::Enter)),
            ComposerAction::Submit("héllo".to_string())
        );
        assert!(composer.is_empty());
        assert_eq!(composer.cursor(), 0);
    }

    #[test]
    fn test_blank_draft_is_not_submitted() {
        let mut composer = Composer::new();
        type_text(&mut composer, "   ");
        assert_eq!(composer.apply_key(key(KeyCode::Enter)), ComposerAction::None);
        assert_eq!(composer.text(), "   ");
    }

    #[test]
    fn test_editing_respects_char_boundaries() {
        let mut composer = Composer::new();
        type_text(&mut composer, "aé✓");
        composer.apply_key(key(KeyCode::Left));
        composer.apply_key(key(KeyCode::Backspace));
        assert_eq!(composer.text(), "a✓");
        composer.apply_key(key(KeyCode::Home));
        composer.apply_key(key(KeyCode::Delete));
        assert_eq!(composer.text(), "✓");
    }

    #[test]
    fn test_recall_walks_sent_drafts_and_restores_stash() {
        let mut composer = Composer::new();
        type_text(&mut composer, "one");
        composer.submit();
        type_text(&mut composer, "two");
        composer.submit();
        type_text(&mut composer, "dra");

        composer.recall_previous();
        assert_eq!(composer.text(), "two");
        composer.recall_previous();
        assert_eq!(composer.text(), "one");
        composer.recall_previous();
        assert_eq!(composer.text(), "one");
        composer.recall_next();
        assert_eq!(composer.text(), "two");
        composer.recall_next();
        assert_eq!(composer.text(), "dra");
    }

    #[test]
    fn test_control_keys_map_to_actions() {
        let mut composer = Composer::new();
        let ctrl = |ch| KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL);
        assert_eq!(composer.apply_key(ctrl('d')), ComposerAction::Quit);
        assert_eq!(composer.apply_key(ctrl('c')), ComposerAction::Cancel);
        type_text(&mut composer, "x");
        assert_eq!(composer.apply_key(ctrl('d')), ComposerAction::None);
        composer.apply_key(ctrl('j'));
        assert_eq!(composer.text(), "x\n");
        assert_eq!(
            composer.apply_key(key(KeyCode::PageUp)),
            ComposerAction::ScrollUp
        );
    }
}
