use crate::settings::AppSettings;
use crate::state::{Message, MessageOrigin, SavedExcerpt};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const HISTORY_KEY: &str = "tappi_chat_history_v8";
pub const SETTINGS_KEY: &str = "tappi_settings_v8";
pub const SAVED_KEY: &str = "tappi_saved_wisdom_v8";

/// Named text records. Implementations decide where the bytes live; callers
/// only ever hand over JSON text.
pub trait RecordStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per record under a state directory.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => {
                Err(error).with_context(|| format!("Failed to read record {}", path.display()))
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, value)
            .with_context(|| format!("Failed to write record {}", staging.display()))?;
        std::fs::rename(&staging, &path)
            .with_context(|| format!("Failed to replace record {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("Failed to remove record {}", path.display()))
            }
        }
    }
}

/// Process-local records, used by tests and by sessions that should leave
/// nothing behind.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, key: &str, value: &str) -> Self {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        records.remove(key);
        Ok(())
    }
}

/// Everything a session restores at startup. Each part falls back on its
/// own, so a corrupt history never costs the user their settings.
#[derive(Debug, Clone, Default)]
pub struct RestoredSession {
    pub messages: Vec<Message>,
    pub settings: AppSettings,
    pub saved: Vec<SavedExcerpt>,
}

pub fn load_session(records: &dyn RecordStore) -> RestoredSession {
    let messages = read_record::<Vec<Message>>(records, HISTORY_KEY)
        .unwrap_or_default()
        .into_iter()
        .map(|mut message| {
            message.origin = MessageOrigin::Restored;
            message.streaming = false;
            message
        })
        .collect();

    let settings = read_record::<AppSettings>(records, SETTINGS_KEY)
        .unwrap_or_default()
        .normalized();

    let saved = read_record::<Vec<SavedExcerpt>>(records, SAVED_KEY).unwrap_or_default();

    RestoredSession {
        messages,
        settings,
        saved,
    }
}

pub fn write_record<T: Serialize + ?Sized>(
    records: &dyn RecordStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let text =
        serde_json::to_string(value).with_context(|| format!("Failed to encode record {key}"))?;
    records.write(key, &text)
}

fn read_record<T: DeserializeOwned>(records: &dyn RecordStore, key: &str) -> Option<T> {
    let text = match records.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(error) => {
            tracing::warn!(key, error = %format!("{error:#}"), "record unreadable, using default");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, %error, "record corrupt, using default");
            None
        }
    }
}
