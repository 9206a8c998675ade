use crate::api::client::{ByteStream, CompletionRequest, MockStreamProducer};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// SSE frames delivered in order, then a clean end of stream.
    Frames(Vec<String>),
    /// SSE frames delivered in order, then a transport error.
    FailAfter(Vec<String>, String),
    /// The request itself is rejected before any byte arrives.
    Reject(String),
}

#[derive(Clone, Default)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    speech: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self::scripted(responses.into_iter().map(MockResponse::Frames).collect())
    }

    pub fn scripted(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    pub fn with_speech(self, base64_payload: impl Into<String>) -> Self {
        if let Ok(mut speech) = self.speech.lock() {
            *speech = Some(base64_payload.into());
        }
        self
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Builds an SSE `data:` frame carrying a text part.
    pub fn text_frame(text: &str) -> String {
        let payload = serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        });
        format!("data: {payload}")
    }

    /// Builds an SSE `data:` frame carrying grounding chunks only. Each entry
    /// is `(kind, title, uri)` with `kind` either `"web"` or `"maps"`.
    pub fn grounding_frame(entries: &[(&str, &str, &str)]) -> String {
        let chunks: Vec<serde_json::Value> = entries
            .iter()
            .map(|(kind, title, uri)| {
                let mut chunk = serde_json::Map::new();
                chunk.insert(
                    kind.to_string(),
                    serde_json::json!({ "title": title, "uri": uri }),
                );
                serde_json::Value::Object(chunk)
            })
            .collect();
        let payload = serde_json::json!({
            "candidates": [{ "groundingMetadata": { "groundingChunks": chunks } }]
        });
        format!("data: {payload}")
    }
}

fn frame_bytes(frames: Vec<String>) -> Vec<Result<Bytes>> {
    frames
        .into_iter()
        .map(|s| {
            let framed = if s.ends_with("\n\n") {
                s
            } else {
                format!("{s}\n\n")
            };
            Ok(Bytes::from(framed))
        })
        .collect()
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, request: &CompletionRequest) -> Result<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses_guard = self
            .responses
            .lock()
            .map_err(|_| anyhow!("MockApiClient: response script poisoned"))?;
        if responses_guard.is_empty() {
            return Err(anyhow!("MockApiClient: No more responses configured"));
        }

        match responses_guard.remove(0) {
            MockResponse::Frames(frames) => Ok(Box::pin(stream::iter(frame_bytes(frames)))),
            MockResponse::FailAfter(frames, error) => {
                let mut items = frame_bytes(frames);
                items.push(Err(anyhow!(error)));
                Ok(Box::pin(stream::iter(items)))
            }
            MockResponse::Reject(error) => Err(anyhow!(error)),
        }
    }

    fn create_mock_speech(&self, _text: &str) -> Result<String> {
        self.speech
            .lock()
            .ok()
            .and_then(|speech| speech.clone())
            .ok_or_else(|| anyhow!("MockApiClient: No speech payload configured"))
    }
}
