use super::message::{Message, MessageId, Role};
use crate::persona::Persona;
use chrono::Local;

/// Ordered message list. Only its own operations mutate it, and only
/// `clear` ever removes anything.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
    welcome: String,
}

impl ConversationStore {
    /// Store holding just the welcome message.
    pub fn new(welcome: impl Into<String>) -> Self {
        let mut store = Self {
            messages: Vec::new(),
            welcome: welcome.into(),
        };
        store.clear();
        store
    }

    /// Store seeded with previously persisted messages. An empty list falls
    /// back to the welcome message.
    pub fn restored(welcome: impl Into<String>, messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            return Self::new(welcome);
        }
        Self {
            messages,
            welcome: welcome.into(),
        }
    }

    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Applies `updater` to the one message with `id`, leaving order and
    /// every other message untouched. Returns whether a message matched.
    pub fn replace_by_id<F>(&mut self, id: &MessageId, updater: F) -> bool
    where
        F: FnOnce(&Message) -> Message,
    {
        let Some(slot) = self.messages.iter_mut().find(|message| &message.id == id) else {
            return false;
        };
        let mut updated = updater(&*slot);
        updated.id = slot.id.clone();
        *slot = updated;
        true
    }

    /// Drops every message and starts over from a fresh welcome message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages.push(Message::assistant(self.welcome.clone()));
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn streaming_count(&self) -> usize {
        self.messages.iter().filter(|message| message.streaming).count()
    }

    /// Case-insensitive substring filter over message content. A blank term
    /// matches everything.
    pub fn search(&self, term: &str) -> Vec<&Message> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.messages.iter().collect();
        }
        self.messages
            .iter()
            .filter(|message| message.content.to_lowercase().contains(&needle))
            .collect()
    }

    /// Plain-text export: `[HH:MM] Name: content` blocks separated by a blank
    /// line, times in local time.
    pub fn transcript(&self, persona: &Persona) -> String {
        self.messages
            .iter()
            .map(|message| {
                let time = message.timestamp.with_timezone(&Local).format("%H:%M");
                let name = match message.role {
                    Role::Assistant => &persona.assistant_name,
                    Role::User => &persona.user_name,
                };
                format!("[{time}] {name}: {}", message.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
