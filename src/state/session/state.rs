use super::super::message::{Message, MessageId, SavedExcerpt};
use super::super::store::ConversationStore;
use crate::persistence::{self, RecordStore, RestoredSession};
use crate::persona::Persona;
use crate::settings::AppSettings;
use std::sync::Arc;

/// What regeneration needs to remember about the last user send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationCursor {
    pub last_query: String,
    pub attempts: u32,
}

impl RegenerationCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One request/response exchange bound to the assistant message it writes
/// into. Every update for the turn is addressed by `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub target: MessageId,
    pub prompt: String,
    pub attempt: u32,
    pub regenerating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
    Cancelled,
}

pub struct ChatSession {
    pub(super) store: ConversationStore,
    pub(super) cursor: RegenerationCursor,
    pub(super) in_flight: bool,
    pub(super) saved: Vec<SavedExcerpt>,
    pub(super) settings: AppSettings,
    pub(super) persona: Arc<Persona>,
    pub(super) records: Arc<dyn RecordStore>,
}

impl ChatSession {
    /// Fresh session: welcome message, default settings, nothing saved.
    pub fn new(persona: Arc<Persona>, records: Arc<dyn RecordStore>) -> Self {
        Self::from_restored(persona, records, RestoredSession::default())
    }

    /// Session rebuilt from whatever `records` holds.
    pub fn load(persona: Arc<Persona>, records: Arc<dyn RecordStore>) -> Self {
        let restored = persistence::load_session(records.as_ref());
        tracing::info!(
            messages = restored.messages.len(),
            saved = restored.saved.len(),
            "session restored"
        );
        Self::from_restored(persona, records, restored)
    }

    fn from_restored(
        persona: Arc<Persona>,
        records: Arc<dyn RecordStore>,
        restored: RestoredSession,
    ) -> Self {
        Self {
            store: ConversationStore::restored(persona.welcome.clone(), restored.messages),
            cursor: RegenerationCursor::default(),
            in_flight: false,
            saved: restored.saved,
            settings: restored.settings,
            persona,
            records,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.all()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn cursor(&self) -> &RegenerationCursor {
        &self.cursor
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn saved(&self) -> &[SavedExcerpt] {
        &self.saved
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Whether a regenerate request would do anything right now.
    pub fn can_regenerate(&self) -> bool {
        !self.in_flight && !self.cursor.last_query.is_empty()
    }
}
