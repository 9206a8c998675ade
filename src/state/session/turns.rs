use super::super::accumulator::{Snapshot, SnapshotStream};
use super::super::message::Message;
use super::{ChatSession, Turn, TurnOutcome};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

impl ChatSession {
    /// Starts a turn for `input`: appends the user message and an empty
    /// streaming placeholder, remembers the query for regeneration and closes
    /// the in-flight gate. Blank input or a turn already running yields `None`
    /// and changes nothing.
    pub fn begin_send(&mut self, input: &str) -> Option<Turn> {
        if input.trim().is_empty() || self.in_flight {
            return None;
        }

        self.cursor.last_query = input.to_string();
        self.cursor.attempts = 0;

        let placeholder = Message::placeholder();
        let target = placeholder.id.clone();
        self.store.append([Message::user(input), placeholder]);
        self.in_flight = true;
        self.persist();

        Some(Turn {
            target,
            prompt: input.to_string(),
            attempt: 0,
            regenerating: false,
        })
    }

    /// Re-asks the remembered query with one more attempt on the counter.
    ///
    /// The last message is reused (emptied, identity kept) when it belongs to
    /// the assistant; otherwise a new placeholder is appended.
    pub fn begin_regenerate(&mut self) -> Option<Turn> {
        if !self.can_regenerate() {
            return None;
        }

        self.cursor.attempts += 1;

        let reusable = self
            .store
            .last()
            .filter(|message| message.is_assistant())
            .map(|message| message.id.clone());
        let target = match reusable {
            Some(id) => {
                self.store.replace_by_id(&id, Message::reset_for_stream);
                id
            }
            None => {
                let placeholder = Message::placeholder();
                let id = placeholder.id.clone();
                self.store.append([placeholder]);
                id
            }
        };
        self.in_flight = true;
        self.persist();

        Some(Turn {
            target,
            prompt: self.cursor.last_query.clone(),
            attempt: self.cursor.attempts,
            regenerating: true,
        })
    }

    /// Writes a snapshot into the turn's slot. Returns false when the slot no
    /// longer exists (history cleared mid-turn).
    pub fn apply_snapshot(&mut self, turn: &Turn, snapshot: &Snapshot) -> bool {
        let applied = self.store.replace_by_id(&turn.target, |message| Message {
            content: snapshot.text.clone(),
            sources: snapshot.sources.clone(),
            streaming: !snapshot.done,
            ..message.clone()
        });
        if applied && snapshot.done {
            self.persist();
        }
        applied
    }

    /// Settles the slot with the persona apology and opens the gate.
    pub fn fail_turn(&mut self, turn: &Turn) {
        let apology = self.persona.failure_text(turn.regenerating).to_string();
        self.store.replace_by_id(&turn.target, |message| Message {
            content: apology,
            streaming: false,
            ..message.clone()
        });
        self.in_flight = false;
        self.persist();
    }

    /// Ends a turn however it went. Whatever the slot holds is kept and it
    /// stops streaming.
    pub fn finish_turn(&mut self, turn: &Turn) {
        let still_streaming = self
            .store
            .get(&turn.target)
            .is_some_and(|message| message.streaming);
        if still_streaming {
            self.store.replace_by_id(&turn.target, |message| Message {
                streaming: false,
                ..message.clone()
            });
        }
        self.in_flight = false;
        self.persist();
    }

    /// Consumes `stream` for `turn` until it ends, fails or `cancel` fires.
    /// The gate is always open again when this returns.
    pub async fn drive(
        &mut self,
        turn: &Turn,
        mut stream: SnapshotStream,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(target_id = %turn.target, "turn cancelled");
                    break TurnOutcome::Cancelled;
                }
                next = stream.next() => match next {
                    Some(Ok(snapshot)) => {
                        self.apply_snapshot(turn, &snapshot);
                    }
                    Some(Err(error)) => {
                        tracing::error!(
                            target_id = %turn.target,
                            attempt = turn.attempt,
                            error = %format!("{error:#}"),
                            "completion stream failed"
                        );
                        self.fail_turn(turn);
                        return TurnOutcome::Failed;
                    }
                    None => break TurnOutcome::Completed,
                },
            }
        };
        self.finish_turn(turn);
        outcome
    }
}
