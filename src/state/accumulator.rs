use super::message::Citation;
use crate::api::stream::StreamParser;
use crate::api::ByteStream;
use crate::types::{GenerateContentResponse, GroundingRef};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

/// Title prefix marking citations that came from the maps tool.
pub const MAP_TITLE_PREFIX: &str = "[Map] ";

/// Full restatement of a response at one point in time. Each snapshot
/// supersedes the previous one; `text` is never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub sources: Vec<Citation>,
    pub done: bool,
}

pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Snapshot>> + Send>>;

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    sources: Vec<Citation>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, chunk: &GenerateContentResponse) {
        if let Some(text) = chunk.text() {
            self.text.push_str(&text);
        }

        for grounding in chunk.grounding_chunks() {
            if let Some((title, uri)) = grounding.web.as_ref().and_then(complete_ref) {
                self.add_source(title.to_string(), uri);
            }
            if let Some((title, uri)) = grounding.maps.as_ref().and_then(complete_ref) {
                self.add_source(format!("{MAP_TITLE_PREFIX}{title}"), uri);
            }
        }
    }

    pub fn snapshot(&self, done: bool) -> Snapshot {
        Snapshot {
            text: self.text.clone(),
            sources: self.sources.clone(),
            done,
        }
    }

    /// First title seen for a URI wins; later duplicates are dropped whatever
    /// their provenance.
    fn add_source(&mut self, title: String, uri: &str) {
        if self.sources.iter().any(|source| source.uri == uri) {
            return;
        }
        self.sources.push(Citation {
            title,
            uri: uri.to_string(),
        });
    }
}

fn complete_ref(grounding: &GroundingRef) -> Option<(&str, &str)> {
    let uri = grounding.uri.as_deref().filter(|uri| !uri.is_empty())?;
    let title = grounding.title.as_deref().filter(|title| !title.is_empty())?;
    Some((title, uri))
}

enum Phase {
    Opening(BoxFuture<'static, Result<ByteStream>>),
    Reading(ByteStream),
    Finished,
}

struct Pump {
    phase: Phase,
    parser: StreamParser,
    accumulator: StreamAccumulator,
    pending: VecDeque<Snapshot>,
}

impl Pump {
    fn absorb_all(&mut self, chunks: Vec<GenerateContentResponse>) {
        for chunk in chunks {
            self.accumulator.absorb(&chunk);
            self.pending.push_back(self.accumulator.snapshot(false));
        }
    }
}

/// Turns a byte-stream opener into a lazy snapshot sequence.
///
/// Nothing happens until the first poll. Every parsed chunk yields one
/// `done = false` snapshot and a clean end of input yields a final
/// `done = true` snapshot. A failure anywhere yields one `Err` and ends the
/// sequence without a terminal snapshot.
pub fn snapshot_stream<F>(open: F) -> SnapshotStream
where
    F: Future<Output = Result<ByteStream>> + Send + 'static,
{
    let pump = Pump {
        phase: Phase::Opening(Box::pin(open)),
        parser: StreamParser::new(),
        accumulator: StreamAccumulator::new(),
        pending: VecDeque::new(),
    };

    Box::pin(futures::stream::unfold(pump, |mut pump| async move {
        loop {
            if let Some(snapshot) = pump.pending.pop_front() {
                return Some((Ok(snapshot), pump));
            }

            match std::mem::replace(&mut pump.phase, Phase::Finished) {
                Phase::Opening(open) => match open.await {
                    Ok(bytes) => pump.phase = Phase::Reading(bytes),
                    Err(error) => return Some((Err(error), pump)),
                },
                Phase::Reading(mut bytes) => match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let chunks = match pump.parser.process(&chunk) {
                            Ok(chunks) => chunks,
                            Err(error) => return Some((Err(error), pump)),
                        };
                        pump.absorb_all(chunks);
                        pump.phase = Phase::Reading(bytes);
                    }
                    Some(Err(error)) => return Some((Err(error), pump)),
                    None => {
                        let tail = pump.parser.finish();
                        pump.absorb_all(tail);
                        pump.pending.push_back(pump.accumulator.snapshot(true));
                    }
                },
                Phase::Finished => return None,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_client::MockApiClient;
    use anyhow::anyhow;
    use bytes::Bytes;

    fn chunk(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    fn byte_stream(frames: Vec<Result<String>>) -> ByteStream {
        let items: Vec<Result<Bytes>> = frames
            .into_iter()
            .map(|frame| frame.map(|f| Bytes::from(format!("{f}\n\n"))))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    #[test]
    fn test_text_accumulates_across_chunks() {
        let mut acc = StreamAccumulator::new();
        acc.absorb(&chunk(r#"{"candidates":[{"content":{"parts":[{"text":"Paris"}]}}]}"#));
        acc.absorb(&chunk(r#"{"candidates":[{"content":{"parts":[{"text":" is"}]}}]}"#));
        assert_eq!(acc.snapshot(false).text, "Paris is");
    }

    #[test]
    fn test_sources_dedup_by_uri_keeping_first_title() {
        let mut acc = StreamAccumulator::new();
        acc.absorb(&chunk(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[{"web":{"uri":"https://a.example","title":"First"}}]}}]}"#,
        ));
        acc.absorb(&chunk(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[
                {"web":{"uri":"https://b.example","title":"B"}},
                {"web":{"uri":"https://a.example","title":"Second"}}
            ]}}]}"#,
        ));
        let sources = acc.snapshot(false).sources;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "First");
        assert_eq!(sources[0].uri, "https://a.example");
        assert_eq!(sources[1].uri, "https://b.example");
    }

    #[test]
    fn test_map_sources_are_tagged_and_collide_with_web_by_uri() {
        let mut acc = StreamAccumulator::new();
        acc.absorb(&chunk(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[
                {"maps":{"uri":"https://maps.example/1","title":"Cafe"}},
                {"web":{"uri":"https://maps.example/1","title":"Cafe website"}}
            ]}}]}"#,
        ));
        let sources = acc.snapshot(false).sources;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "[Map] Cafe");
    }

    #[test]
    fn test_incomplete_grounding_refs_are_ignored() {
        let mut acc = StreamAccumulator::new();
        acc.absorb(&chunk(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[
                {"web":{"uri":"https://a.example"}},
                {"web":{"title":"No link"}},
                {"maps":{"uri":"","title":"Empty"}}
            ]}}]}"#,
        ));
        assert!(acc.snapshot(false).sources.is_empty());
    }

    #[tokio::test]
    async fn test_stream_ends_with_done_even_without_new_content() {
        let frames = vec![
            Ok(MockApiClient::text_frame("Hi")),
            Ok(r#"data: {"candidates":[{"finishReason":"STOP"}]}"#.to_string()),
        ];
        let snapshots: Vec<Snapshot> = snapshot_stream(async move { Ok(byte_stream(frames)) })
            .map(|item| item.expect("no failure"))
            .collect()
            .await;

        assert_eq!(snapshots.len(), 3);
        assert!(snapshots[..2].iter().all(|s| !s.done));
        assert_eq!(snapshots[1].text, "Hi");
        let last = snapshots.last().unwrap();
        assert!(last.done);
        assert_eq!(last.text, "Hi");
    }

    #[tokio::test]
    async fn test_empty_stream_still_yields_terminal_snapshot() {
        let snapshots: Vec<Result<Snapshot>> =
            snapshot_stream(async move { Ok(byte_stream(Vec::new())) })
                .collect()
                .await;
        assert_eq!(snapshots.len(), 1);
        let only = snapshots[0].as_ref().expect("terminal snapshot");
        assert!(only.done);
        assert!(only.text.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_ends_sequence_without_done() {
        let frames = vec![
            Ok(MockApiClient::text_frame("Par")),
            Err(anyhow!("connection reset")),
            Ok(MockApiClient::text_frame("is")),
        ];
        let items: Vec<Result<Snapshot>> =
            snapshot_stream(async move { Ok(byte_stream(frames)) })
                .collect()
                .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "Par");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_open_failure_is_single_error() {
        let items: Vec<Result<Snapshot>> =
            snapshot_stream(async move { Err::<ByteStream, _>(anyhow!("401")) })
                .collect()
                .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_opener_runs_lazily() {
        let opened = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = opened.clone();
        let mut stream = snapshot_stream(async move {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(byte_stream(Vec::new()))
        });
        assert!(!opened.load(std::sync::atomic::Ordering::SeqCst));
        let _ = stream.next().await;
        assert!(opened.load(std::sync::atomic::Ordering::SeqCst));
    }
}
