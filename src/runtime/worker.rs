use super::UiUpdate;
use crate::api::ApiClient;
use crate::persona::Persona;
use crate::settings::AppSettings;
use crate::speech;
use crate::state::{CompletionSource, MessageId, Turn};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running turn worker. Cancelling stops it at the next suspension point;
/// nothing it would have sent afterwards is delivered.
pub struct TurnHandle {
    pub seq: u64,
    pub turn: Turn,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TurnHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Consumes the snapshot stream for `turn` on its own task and forwards every
/// item, in order, over `update_tx`.
pub fn spawn_turn(
    source: &CompletionSource,
    seq: u64,
    turn: Turn,
    settings: &AppSettings,
    update_tx: mpsc::UnboundedSender<UiUpdate>,
) -> TurnHandle {
    let mut stream = source.query_stream(&turn.prompt, settings, turn.attempt);
    let cancel = CancellationToken::new();
    let cancelled = cancel.clone();
    let attempt = turn.attempt;

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    tracing::debug!(seq, "turn worker cancelled");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(snapshot)) => {
                        if update_tx.send(UiUpdate::Snapshot { turn: seq, snapshot }).is_err() {
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        let error = format!("{error:#}");
                        tracing::error!(seq, attempt, %error, "completion stream failed");
                        let _ = update_tx.send(UiUpdate::TurnFailed { turn: seq, error });
                        return;
                    }
                    None => break,
                },
            }
        }
        let _ = update_tx.send(UiUpdate::TurnFinished { turn: seq });
    });

    TurnHandle {
        seq,
        turn,
        cancel,
        join,
    }
}

/// Everything needed to voice one message.
pub struct SpeechJob {
    pub message: MessageId,
    pub text: String,
    pub path: PathBuf,
}

/// Synthesizes `job.text`, writes it as a WAV clip and reports back.
pub fn spawn_speech(
    client: ApiClient,
    persona: Persona,
    job: SpeechJob,
    update_tx: mpsc::UnboundedSender<UiUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = async {
            let buffer = speech::synthesize(&client, &persona, &job.text).await?;
            buffer.write_wav(&job.path)?;
            anyhow::Ok(buffer.duration_secs())
        }
        .await;

        let update = match outcome {
            Ok(seconds) => UiUpdate::SpeechReady {
                message: job.message,
                path: job.path,
                seconds,
            },
            Err(error) => {
                let error = format!("{error:#}");
                tracing::warn!(message = %job.message, %error, "speech synthesis failed");
                UiUpdate::SpeechFailed {
                    message: job.message,
                    error,
                }
            }
        };
        let _ = update_tx.send(update);
    })
}
