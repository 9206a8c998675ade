use super::super::message::{Message, MessageId, SavedExcerpt};
use super::ChatSession;
use crate::persistence::{write_record, HISTORY_KEY, SAVED_KEY, SETTINGS_KEY};
use crate::settings::AppSettings;

impl ChatSession {
    /// Back to a lone welcome message. A turn still running keeps its gate;
    /// its late snapshots find no slot and are dropped.
    pub fn clear_history(&mut self) {
        self.store.clear();
        self.cursor.reset();
        self.persist();
    }

    /// Pins a copy of a message at the top of the saved list. Returns false
    /// if the message is unknown or already saved.
    pub fn save_excerpt(&mut self, id: &MessageId) -> bool {
        if self.saved.iter().any(|excerpt| &excerpt.id == id) {
            return false;
        }
        let Some(message) = self.store.get(id) else {
            return false;
        };
        self.saved.insert(0, SavedExcerpt::of(message));
        self.persist();
        true
    }

    pub fn remove_excerpt(&mut self, id: &MessageId) -> bool {
        let before = self.saved.len();
        self.saved.retain(|excerpt| &excerpt.id != id);
        let removed = self.saved.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn search(&self, term: &str) -> Vec<&Message> {
        self.store.search(term)
    }

    pub fn transcript(&self) -> String {
        self.store.transcript(&self.persona)
    }

    /// Applies `change` to the settings and stores the normalized result.
    pub fn update_settings<F>(&mut self, change: F)
    where
        F: FnOnce(&mut AppSettings),
    {
        change(&mut self.settings);
        self.settings = std::mem::take(&mut self.settings).normalized();
        self.persist();
    }

    /// Writes history, settings and saved excerpts. Failures are logged and
    /// otherwise ignored; the in-memory session stays authoritative.
    pub fn persist(&self) {
        let records = self.records.as_ref();
        let outcomes = [
            (HISTORY_KEY, write_record(records, HISTORY_KEY, self.store.all())),
            (SETTINGS_KEY, write_record(records, SETTINGS_KEY, &self.settings)),
            (SAVED_KEY, write_record(records, SAVED_KEY, &self.saved)),
        ];
        for (key, outcome) in outcomes {
            if let Err(error) = outcome {
                tracing::warn!(key, error = %format!("{error:#}"), "failed to persist record");
            }
        }
    }

    /// Draft text after a recognized utterance is dictated into it.
    pub fn append_voice_input(draft: &str, utterance: &str) -> String {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return draft.to_string();
        }
        if draft.is_empty() {
            return utterance.to_string();
        }
        format!("{draft} {utterance}")
    }
}
