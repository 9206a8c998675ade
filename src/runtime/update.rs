use crate::state::{MessageId, Snapshot};
use std::path::PathBuf;

/// Messages from background workers to the UI loop. Turn updates carry the
/// sequence number of the turn that produced them so the loop can discard
/// anything from a turn it has already abandoned.
#[derive(Debug)]
pub enum UiUpdate {
    Snapshot { turn: u64, snapshot: Snapshot },
    TurnFailed { turn: u64, error: String },
    TurnFinished { turn: u64 },
    SpeechReady {
        message: MessageId,
        path: PathBuf,
        seconds: f32,
    },
    SpeechFailed { message: MessageId, error: String },
}
