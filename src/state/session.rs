mod library;
mod state;
mod turns;


pub use state::{ChatSession, RegenerationCursor, Turn, TurnOutcome};
