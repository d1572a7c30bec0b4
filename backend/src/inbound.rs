use actix_multipart::{Multipart, MultipartError};
use actix_web::{ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use crate::error::{AnalysisError, ValidationError};
use crate::observe::InputShape;

pub const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// A single uploaded form field, kept as the bytes the client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl Upload {
    pub fn media_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
    }

    pub fn file_shape(&self) -> InputShape {
        InputShape::File {
            name: self.file_name.clone(),
            bytes: self.bytes.len(),
        }
    }

    pub fn image_shape(&self) -> InputShape {
        InputShape::Image {
            media_type: self.media_type().to_string(),
            bytes: self.bytes.len(),
        }
    }
}

/// Pull the `tweet` string out of a JSON request body.
///
/// A body that is not JSON at all is treated the same as one without the field.
pub fn parse_tweet_body(body: &[u8]) -> Result<String, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationError::MissingText)?;
    match value.get("tweet") {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(ValidationError::MissingText),
    }
}

/// Collect a raw request body with no size cap.
///
/// A body that breaks off mid-stream is discarded and later reads as missing text.
pub async fn read_body(mut payload: web::Payload) -> Vec<u8> {
    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) => body.extend_from_slice(&chunk),
            Err(err) => {
                log::warn!("Discarding unreadable request body: {}", err);
                return Vec::new();
            }
        }
    }
    body
}

/// Return the first multipart field named `field`.
///
/// A body that cannot be read as multipart at all counts as a missing upload.
pub async fn read_upload(payload: Multipart, field: &str) -> Result<Option<Upload>, AnalysisError> {
    match drain_field(payload, field).await {
        Ok(found) => Ok(found),
        Err(err) if err.status_code().is_client_error() => {
            log::warn!("Discarding unreadable multipart body: {}", err);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn drain_field(mut payload: Multipart, field: &str) -> Result<Option<Upload>, MultipartError> {
    let mut found = None;

    while let Some(mut part) = payload.try_next().await? {
        let is_target = found.is_none() && part.name() == Some(field);

        let mut data = Vec::new();
        while let Some(chunk) = part.next().await {
            let chunk = chunk?;
            if is_target {
                data.extend_from_slice(&chunk);
            }
        }

        if is_target {
            let file_name = part
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            let content_type = part.content_type().map(|mime| mime.to_string());
            found = Some(Upload {
                bytes: data,
                file_name,
                content_type,
            });
        }
    }

    Ok(found)
}
