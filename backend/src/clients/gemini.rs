use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use url::Url;

use super::VisionModel;
use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::outbound::MemeInferenceRequest;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

fn build_request(request: &MemeInferenceRequest) -> GenerateRequest<'_> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: request.system_instruction,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![
                Part::Text {
                    text: request.prompt,
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: &request.media_type,
                        data: STANDARD.encode(&request.image),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Google Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    endpoint: Url,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(http_client: HttpClient, config: &GeminiConfig) -> Result<Self, url::ParseError> {
        let endpoint = config
            .base_url
            .join(&format!("models/{}:generateContent", config.model))?;
        Ok(Self {
            http_client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, request: &MemeInferenceRequest) -> Result<String, AnalysisError> {
        let mut builder = self
            .http_client
            .post(self.endpoint.clone())
            .json(&build_request(request));
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AnalysisError::Transport(format!(
                "model provider returned status {}: {}",
                status.as_u16(),
                truncate(&body)
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            AnalysisError::ExternalFormat(format!("model provider returned malformed JSON: {}", e))
        })?;
        parsed
            .text()
            .ok_or_else(|| AnalysisError::ExternalFormat("model returned no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::Upload;
    use serde_json::json;

    fn meme_request() -> MemeInferenceRequest {
        MemeInferenceRequest::new(Upload {
            bytes: b"GIF89a".to_vec(),
            file_name: Some("meme.gif".into()),
            content_type: Some("image/gif".into()),
        })
    }

    #[test]
    fn request_carries_instruction_image_and_temperature() {
        let request = meme_request();
        let body = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!(request.system_instruction)
        );
        assert_eq!(body["contents"][0]["role"], json!("user"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!(request.prompt));
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"],
            json!({"mimeType": "image/gif", "data": STANDARD.encode(b"GIF89a")})
        );
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"label\":"}, {"text": "\"fair meme\"}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"label\":\"fair meme\"}"));
    }

    #[test]
    fn blocked_response_has_no_text() {
        let response: GenerateResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn endpoint_includes_model_name() {
        let config = GeminiConfig {
            api_key: None,
            base_url: Url::parse("https://generativelanguage.googleapis.com/v1beta/").unwrap(),
            model: "gemini-1.5-flash".into(),
        };
        let client = GeminiClient::new(HttpClient::new(), &config).unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
