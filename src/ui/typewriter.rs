//! Paced reveal of assistant text.
//!
//! Network arrival drives display while a message streams; once it settles,
//! any text the reader has not seen yet is typed out one `char` per tick by a
//! task owned by the message's [`Typewriter`]. Dropping the typewriter (or
//! moving it to another phase) cancels the task.

use crate::state::{Message, MessageId, MessageOrigin, Role};
use crate::util::char_boundary;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_millis(15);
pub const HISTORY_GRACE: Duration = Duration::from_secs(2);

/// Decides which assistant messages are old history and skip the animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Settled messages created longer ago than the window count as history.
    GraceWindow(Duration),
    /// Only messages read back from storage count as history.
    ExplicitOrigin,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        HistoryPolicy::GraceWindow(HISTORY_GRACE)
    }
}

impl HistoryPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grace" | "grace-window" | "timestamp" => Some(HistoryPolicy::default()),
            "origin" | "explicit" | "explicit-origin" => Some(HistoryPolicy::ExplicitOrigin),
            _ => None,
        }
    }

    pub fn is_history(&self, message: &Message, now: DateTime<Utc>) -> bool {
        match self {
            HistoryPolicy::GraceWindow(window) => {
                let age = now.signed_duration_since(message.timestamp);
                !message.streaming && age.to_std().is_ok_and(|age| age > *window)
            }
            HistoryPolicy::ExplicitOrigin => message.origin == MessageOrigin::Restored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Instant,
    LiveStream,
    Reveal,
    Settled,
}

struct RevealTask {
    progress: watch::Receiver<usize>,
    _cancel_on_drop: DropGuard,
}

pub struct Typewriter {
    interval: Duration,
    policy: HistoryPolicy,
    phase: RevealPhase,
    content: Arc<str>,
    total_chars: usize,
    shown: usize,
    reveal: Option<RevealTask>,
}

impl Typewriter {
    pub fn new(interval: Duration, policy: HistoryPolicy) -> Self {
        Self {
            interval,
            policy,
            phase: RevealPhase::Settled,
            content: Arc::from(""),
            total_chars: 0,
            shown: 0,
            reveal: None,
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    /// Brings the typewriter in line with the current state of `message`.
    /// Cheap when nothing changed; safe to call on every frame.
    ///
    /// Starting a reveal spawns onto the ambient tokio runtime.
    pub fn sync(&mut self, message: &Message, now: DateTime<Utc>) {
        let content_changed = *self.content != *message.content;
        if content_changed {
            self.shown = self.shown_chars().min(message.content.chars().count());
            self.reveal = None;
            self.content = Arc::from(message.content.as_str());
            self.total_chars = self.content.chars().count();
        }

        if message.role == Role::User || self.policy.is_history(message, now) {
            self.show_all(RevealPhase::Instant);
            return;
        }
        if message.streaming {
            self.show_all(RevealPhase::LiveStream);
            return;
        }

        let shown = self.shown_chars();
        if shown >= self.total_chars {
            self.show_all(RevealPhase::Settled);
            return;
        }
        if self.reveal.is_none() {
            self.start_reveal(shown);
        }
    }

    /// The prefix of the content a reader should see right now.
    pub fn displayed(&self) -> &str {
        let end = char_boundary(&self.content, self.shown_chars());
        &self.content[..end]
    }

    /// True while text is still arriving or still being typed out.
    pub fn show_marker(&self) -> bool {
        matches!(self.phase, RevealPhase::LiveStream | RevealPhase::Reveal)
    }

    fn shown_chars(&self) -> usize {
        match &self.reveal {
            Some(task) => (*task.progress.borrow()).min(self.total_chars),
            None => self.shown,
        }
    }

    fn show_all(&mut self, phase: RevealPhase) {
        self.reveal = None;
        self.shown = self.total_chars;
        self.phase = phase;
    }

    fn start_reveal(&mut self, from: usize) {
        let total = self.total_chars;
        let period = self.interval;
        let (progress_tx, progress_rx) = watch::channel(from);
        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut shown = from;
            while shown < total {
                tokio::select! {
                    _ = cancelled.cancelled() => return,
                    _ = ticker.tick() => {
                        shown += 1;
                        if progress_tx.send(shown).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        self.shown = from;
        self.phase = RevealPhase::Reveal;
        self.reveal = Some(RevealTask {
            progress: progress_rx,
            _cancel_on_drop: cancel.drop_guard(),
        });
    }
}

/// One typewriter per visible message, keyed by id.
pub struct TypewriterBoard {
    interval: Duration,
    policy: HistoryPolicy,
    writers: HashMap<MessageId, Typewriter>,
}

impl TypewriterBoard {
    pub fn new(interval: Duration, policy: HistoryPolicy) -> Self {
        Self {
            interval,
            policy,
            writers: HashMap::new(),
        }
    }

    /// Syncs every message and drops typewriters whose message is gone.
    pub fn sync(&mut self, messages: &[Message], now: DateTime<Utc>) {
        self.writers
            .retain(|id, _| messages.iter().any(|message| &message.id == id));
        for message in messages {
            let (interval, policy) = (self.interval, self.policy);
            self.writers
                .entry(message.id.clone())
                .or_insert_with(|| Typewriter::new(interval, policy))
                .sync(message, now);
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<&Typewriter> {
        self.writers.get(id)
    }

    /// Text to draw for `message`, falling back to its full content when the
    /// board has not seen it yet.
    pub fn displayed<'a>(&'a self, message: &'a Message) -> &'a str {
        self.writers
            .get(&message.id)
            .map_or(message.content.as_str(), Typewriter::displayed)
    }

    pub fn show_marker(&self, id: &MessageId) -> bool {
        self.writers.get(id).is_some_and(Typewriter::show_marker)
    }

    /// Whether any reveal is still running, i.e. the view needs redrawing.
    pub fn is_animating(&self) -> bool {
        self.writers
            .values()
            .any(|writer| writer.phase == RevealPhase::Reveal)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}
