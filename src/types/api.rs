use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<ApiPart>,
}

impl ApiContent {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![ApiPart::text(text)],
        }
    }

    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![ApiPart::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl ApiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

/// Tool switches understood by the generative-language API. Each variant
/// serializes to an object with a single empty member, e.g. `{"googleSearch":{}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiTool {
    GoogleSearch(EmptyObject),
    GoogleMaps(EmptyObject),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub retrieval_config: RetrievalConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    pub lat_lng: LatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<serde_json::Value>,
}

/// One element of a `streamGenerateContent` response, or the whole body of a
/// unary `generateContent` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated non-thought text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|part| !part.thought.unwrap_or(false))
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn grounding_chunks(&self) -> &[GroundingChunk] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .map(|metadata| metadata.grounding_chunks.as_slice())
            .unwrap_or(&[])
    }

    pub fn inline_audio(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()
            .map(|inline| inline.data.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<ApiContent>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<GroundingRef>,
    #[serde(default)]
    pub maps: Option<GroundingRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingRef {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_tools_as_single_member_objects() {
        let request = GenerateContentRequest {
            contents: vec![ApiContent::user_text("hi")],
            system_instruction: Some(ApiContent::system_text("be nice")),
            tools: vec![
                ApiTool::GoogleSearch(EmptyObject {}),
                ApiTool::GoogleMaps(EmptyObject {}),
            ],
            tool_config: Some(ToolConfig {
                retrieval_config: RetrievalConfig {
                    lat_lng: LatLng {
                        latitude: 1.5,
                        longitude: -2.0,
                    },
                },
            }),
            generation_config: None,
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["tools"][0], serde_json::json!({ "googleSearch": {} }));
        assert_eq!(value["tools"][1], serde_json::json!({ "googleMaps": {} }));
        assert_eq!(
            value["toolConfig"]["retrievalConfig"]["latLng"]["latitude"],
            1.5
        );
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be nice");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_request_omits_empty_tools_and_config() {
        let request = GenerateContentRequest {
            contents: vec![ApiContent::user_text("hi")],
            system_instruction: None,
            tools: Vec::new(),
            tool_config: None,
            generation_config: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("toolConfig").is_none());
    }

    #[test]
    fn test_response_text_skips_thought_parts() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"pondering","thought":true},
                {"text":"Paris"},
                {"text":" is"}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text().as_deref(), Some("Paris is"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text_or_chunks() {
        let chunk: GenerateContentResponse =
            serde_json::from_str(r#"{"usageMetadata":{"totalTokenCount":3}}"#).unwrap();
        assert!(chunk.text().is_none());
        assert!(chunk.grounding_chunks().is_empty());
        assert!(chunk.inline_audio().is_none());
    }

    #[test]
    fn test_grounding_chunks_parse_web_and_maps() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[
                {"web":{"uri":"https://a.example","title":"A"}},
                {"maps":{"uri":"https://maps.example/1","title":"Cafe"}}
            ]}}]}"#,
        )
        .unwrap();
        let chunks = chunk.grounding_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].web.as_ref().and_then(|w| w.uri.as_deref()),
            Some("https://a.example")
        );
        assert_eq!(
            chunks[1].maps.as_ref().and_then(|m| m.title.as_deref()),
            Some("Cafe")
        );
    }

    #[test]
    fn test_inline_audio_reads_first_part() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16;rate=24000","data":"AAAA"}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.inline_audio(), Some("AAAA"));
    }
}
