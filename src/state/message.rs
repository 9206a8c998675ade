use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh identity. UUIDs keep ids unique across clear and regenerate
    /// cycles, so a late snapshot can never land on a newer message.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Where a message came from in this process. Not persisted: anything read
/// back from storage is tagged `Restored` by the loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageOrigin {
    #[default]
    Live,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, rename = "is_streaming")]
    pub streaming: bool,
    #[serde(skip)]
    pub origin: MessageOrigin,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            timestamp: Utc::now(),
            streaming: false,
            origin: MessageOrigin::Live,
        }
    }

    /// Empty assistant message that is waiting for its first snapshot.
    pub fn placeholder() -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            timestamp: Utc::now(),
            streaming: true,
            origin: MessageOrigin::Live,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            streaming: false,
            content: content.into(),
            ..Self::placeholder()
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Copy of this message emptied back to the placeholder state. Identity
    /// and creation time are kept.
    pub fn reset_for_stream(&self) -> Self {
        Self {
            content: String::new(),
            sources: Vec::new(),
            streaming: true,
            ..self.clone()
        }
    }
}

/// A pinned copy of a message's text. Lives independently of the message it
/// was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedExcerpt {
    pub id: MessageId,
    pub content: String,
    #[serde(alias = "timestamp")]
    pub saved_at: DateTime<Utc>,
}

impl SavedExcerpt {
    pub fn of(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            content: message.content.clone(),
            saved_at: Utc::now(),
        }
    }
}
