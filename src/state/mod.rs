pub mod accumulator;
mod message;
mod session;
mod source;
mod store;

pub use accumulator::{
    snapshot_stream, Snapshot, SnapshotStream, StreamAccumulator, MAP_TITLE_PREFIX,
};
pub use message::{Citation, Message, MessageId, MessageOrigin, Role, SavedExcerpt};
pub use session::{ChatSession, RegenerationCursor, Turn, TurnOutcome};
pub use source::CompletionSource;
pub use store::ConversationStore;
