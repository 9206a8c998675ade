mod update;
mod worker;

pub use update::UiUpdate;
pub use worker::{spawn_speech, spawn_turn, SpeechJob, TurnHandle};
