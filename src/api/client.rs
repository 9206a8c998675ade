use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::settings::ModelChoice;
use crate::types::{
    ApiContent, ApiTool, EmptyObject, GenerateContentRequest, GenerateContentResponse, LatLng,
    RetrievalConfig, ToolConfig,
};
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const SPEECH_VOICE: &str = "Kore";

/// Scripted stand-in for the remote service. Tests and offline runs hand one
/// of these to [`ApiClient::new_mock`] so the real parser still sees SSE bytes.
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, request: &CompletionRequest) -> Result<ByteStream>;

    fn create_mock_speech(&self, _text: &str) -> Result<String> {
        Err(anyhow!("mock producer has no speech payload configured"))
    }
}

/// Everything a single completion call needs, resolved before the request
/// is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: ModelChoice,
    pub use_search: bool,
    pub use_maps: bool,
    pub location: Option<LatLng>,
    pub system_instruction: String,
}

impl CompletionRequest {
    pub fn to_api_request(&self) -> GenerateContentRequest {
        let mut tools = Vec::new();
        if self.use_search {
            tools.push(ApiTool::GoogleSearch(EmptyObject {}));
        }
        if self.use_maps {
            tools.push(ApiTool::GoogleMaps(EmptyObject {}));
        }
        let tool_config = match (self.use_maps, self.location) {
            (true, Some(lat_lng)) => Some(ToolConfig {
                retrieval_config: RetrievalConfig { lat_lng },
            }),
            _ => None,
        };

        GenerateContentRequest {
            contents: vec![ApiContent::user_text(self.prompt.clone())],
            system_instruction: Some(ApiContent::system_text(self.system_instruction.clone())),
            tools,
            tool_config,
            generation_config: None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            mock_stream_producer: None,
        })
    }

    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: None,
            api_url: "http://localhost:8000/v1beta".to_string(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    pub async fn create_stream(&self, request: &CompletionRequest) -> Result<ByteStream> {
        if let Some(producer) = &self.mock_stream_producer {
            return producer.create_mock_stream(request);
        }

        let request_url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.api_url,
            request.model.wire_id()
        );
        let payload = serde_json::to_value(request.to_api_request())
            .context("failed to encode completion request")?;
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .authorized_post(&request_url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    /// Requests a spoken rendition of `text` and returns the base64 PCM payload.
    pub async fn generate_speech(&self, text: &str, tone: &str) -> Result<String> {
        let spoken = format!("{tone}: {text}");
        if let Some(producer) = &self.mock_stream_producer {
            return producer.create_mock_speech(&spoken);
        }

        let request_url = format!("{}/models/{SPEECH_MODEL}:generateContent", self.api_url);
        let payload = json!({
            "contents": [{ "parts": [{ "text": spoken }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": SPEECH_VOICE }
                    }
                }
            }
        });
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response: GenerateContentResponse = self
            .authorized_post(&request_url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?
            .json()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;

        response
            .inline_audio()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no audio data in speech response from '{request_url}'"))
    }

    fn authorized_post(&self, request_url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(request_url)
            .header("content-type", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header("x-goog-api-key", api_key);
        }
        request
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local API endpoint '{}': {}. Start your local server or update TAPPI_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach API endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("API request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "API endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("API request to '{}' failed: {}", request_url, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(use_search: bool, use_maps: bool, location: Option<LatLng>) -> CompletionRequest {
        CompletionRequest {
            prompt: "where is lunch".to_string(),
            model: ModelChoice::Flash,
            use_search,
            use_maps,
            location,
            system_instruction: "persona".to_string(),
        }
    }

    #[test]
    fn test_tools_follow_settings_flags() {
        let api = request(true, false, None).to_api_request();
        assert_eq!(api.tools, vec![ApiTool::GoogleSearch(EmptyObject {})]);

        let api = request(false, false, None).to_api_request();
        assert!(api.tools.is_empty());
    }

    #[test]
    fn test_location_only_sent_with_maps_enabled() {
        let here = LatLng {
            latitude: 48.85,
            longitude: 2.35,
        };
        let with_maps = request(false, true, Some(here)).to_api_request();
        assert_eq!(
            with_maps.tool_config.map(|config| config.retrieval_config.lat_lng),
            Some(here)
        );

        let without_maps = request(true, false, Some(here)).to_api_request();
        assert!(without_maps.tool_config.is_none());
    }

    #[test]
    fn test_maps_without_location_degrades_silently() {
        let api = request(false, true, None).to_api_request();
        assert_eq!(api.tools, vec![ApiTool::GoogleMaps(EmptyObject {})]);
        assert!(api.tool_config.is_none());
    }

    #[test]
    fn test_system_instruction_is_carried() {
        let api = request(false, false, None).to_api_request();
        let instruction = api.system_instruction.expect("system instruction");
        assert_eq!(instruction.parts[0].text.as_deref(), Some("persona"));
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let mut config = Config::for_tests();
        config.api_key = Some("key".to_string());
        config.api_url = "https://generativelanguage.googleapis.com/v1beta/".to_string();
        let client = ApiClient::new(&config).expect("client should build");
        assert_eq!(
            client.api_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert!(!client.is_local_endpoint());
    }
}
