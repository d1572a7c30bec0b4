use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::error::AnalysisError;
use crate::inbound::Upload;

pub const MEME_INSTRUCTIONS: &str = r#"You are a safety classifier for image memes.
Classify the meme into exactly ONE of these labels:
- "hate meme"
- "not hate meme"
- "normal meme"
- "fair meme"

Return strict JSON with keys:
{
  "label": "hate meme" | "not hate meme" | "normal meme" | "fair meme",
  "reason": "short, precise explanation referencing visual/text cues"
}
Do not include any extra text before or after the JSON."#;

pub const MEME_PROMPT: &str = "Analyze the attached image and produce the JSON.";

pub const MEME_TEMPERATURE: f32 = 0.2;

const DEFAULT_UPLOAD_NAME: &str = "upload.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetRequest {
    pub tweet: String,
}

impl TweetRequest {
    pub fn new(tweet: String) -> Self {
        Self { tweet }
    }
}

/// Re-package an uploaded table as the `file` field of a new form.
///
/// The bytes are forwarded untouched.
pub fn bulk_form(upload: Upload) -> Result<Form, AnalysisError> {
    let file_name = upload
        .file_name
        .clone()
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    let mut part = Part::bytes(upload.bytes).file_name(file_name);
    if let Some(content_type) = upload.content_type.as_deref() {
        part = part.mime_str(content_type)?;
    }
    Ok(Form::new().part("file", part))
}

/// Everything a vision model needs to classify one meme.
#[derive(Debug, Clone, PartialEq)]
pub struct MemeInferenceRequest {
    pub system_instruction: &'static str,
    pub prompt: &'static str,
    pub image: Vec<u8>,
    pub media_type: String,
    pub temperature: f32,
}

impl MemeInferenceRequest {
    pub fn new(upload: Upload) -> Self {
        let media_type = upload.media_type().to_string();
        Self {
            system_instruction: MEME_INSTRUCTIONS,
            prompt: MEME_PROMPT,
            image: upload.bytes,
            media_type,
            temperature: MEME_TEMPERATURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MemeLabel;
    use strum::IntoEnumIterator;

    #[test]
    fn tweet_request_serializes_single_field() {
        let body = serde_json::to_value(TweetRequest::new("hi".into())).unwrap();
        assert_eq!(body, serde_json::json!({"tweet": "hi"}));
    }

    #[test]
    fn instructions_enumerate_every_meme_label() {
        for label in MemeLabel::iter() {
            assert!(MEME_INSTRUCTIONS.contains(&format!("\"{}\"", label)));
        }
        assert!(MEME_INSTRUCTIONS.contains("\"label\""));
        assert!(MEME_INSTRUCTIONS.contains("\"reason\""));
        assert!(MEME_INSTRUCTIONS.contains("Do not include any extra text before or after the JSON."));
    }

    #[test]
    fn meme_request_keeps_image_bytes() {
        let upload = Upload {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            file_name: Some("cat.jpg".into()),
            content_type: Some("image/jpeg".into()),
        };
        let request = MemeInferenceRequest::new(upload);
        assert_eq!(request.image, vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(request.media_type, "image/jpeg");
        assert_eq!(request.temperature, 0.2);
    }

    #[test]
    fn bulk_form_rejects_malformed_content_type() {
        let upload = Upload {
            bytes: b"tweets\nhello\n".to_vec(),
            file_name: Some("tweets.csv".into()),
            content_type: Some("not a mime".into()),
        };
        assert!(bulk_form(upload).is_err());
    }
}
