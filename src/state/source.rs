use super::accumulator::{snapshot_stream, SnapshotStream};
use crate::api::{ApiClient, CompletionRequest};
use crate::geo::Locator;
use crate::persona::Persona;
use crate::settings::AppSettings;
use std::sync::Arc;

/// The remote model as the conversation core sees it: a prompt goes in, a
/// snapshot stream comes out.
#[derive(Clone)]
pub struct CompletionSource {
    client: ApiClient,
    locator: Arc<dyn Locator>,
    persona: Arc<Persona>,
}

impl CompletionSource {
    pub fn new(client: ApiClient, locator: Arc<dyn Locator>, persona: Arc<Persona>) -> Self {
        Self {
            client,
            locator,
            persona,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Resolves location (maps only) and the persona instruction for
    /// `attempt`. A failed lookup is logged and the request goes out without
    /// coordinates.
    pub async fn resolve_request(
        &self,
        prompt: &str,
        settings: &AppSettings,
        attempt: u32,
    ) -> CompletionRequest {
        let location = if settings.use_maps {
            match self.locator.locate().await {
                Ok(position) => Some(position),
                Err(error) => {
                    tracing::warn!(%error, "geolocation failed, continuing without location");
                    None
                }
            }
        } else {
            None
        };

        CompletionRequest {
            prompt: prompt.to_string(),
            model: settings.model,
            use_search: settings.use_search,
            use_maps: settings.use_maps,
            location,
            system_instruction: self.persona.system_instruction(attempt),
        }
    }

    /// Lazy snapshot sequence for one prompt. Nothing is sent until the
    /// stream is first polled.
    pub fn query_stream(&self, prompt: &str, settings: &AppSettings, attempt: u32) -> SnapshotStream {
        let source = self.clone();
        let prompt = prompt.to_string();
        let settings = settings.clone();
        snapshot_stream(async move {
            let request = source.resolve_request(&prompt, &settings, attempt).await;
            tracing::debug!(
                model = request.model.wire_id(),
                attempt,
                search = request.use_search,
                maps = request.use_maps,
                located = request.location.is_some(),
                "opening completion stream"
            );
            source.client.create_stream(&request).await
        })
    }
}
