use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde_json::Value;
use shared::ErrorBody;

/// Reasons a client submission is rejected before anything leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing or non-string text")]
    MissingText,
    #[error("missing file")]
    MissingFile,
    #[error("missing image")]
    MissingImage,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16, body: String },
    #[error("{0}")]
    ExternalFormat(String),
    #[error("model returned an invalid label")]
    ExternalValidation { raw: Value },
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        // Endpoint URLs are configuration and stay out of outward payloads.
        AnalysisError::Transport(err.without_url().to_string())
    }
}

impl From<actix_multipart::MultipartError> for AnalysisError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AnalysisError::Transport(format!("failed to read upload: {}", err))
    }
}

impl AnalysisError {
    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AnalysisError::ExternalFormat(_) | AnalysisError::ExternalValidation { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AnalysisError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Which of the three request pipelines an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Tweet,
    Batch,
    Meme,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::Tweet => "tweet",
            Pipeline::Batch => "batch",
            Pipeline::Meme => "meme",
        }
    }

    fn missing_input_summary(&self) -> &'static str {
        match self {
            Pipeline::Tweet => "Tweet text is required",
            Pipeline::Batch => "CSV file is required",
            Pipeline::Meme => "Image is required as 'image' form-data field",
        }
    }

    fn upstream_summary(&self) -> &'static str {
        match self {
            Pipeline::Tweet => "Failed to analyze tweet",
            Pipeline::Batch => "Failed to process CSV file",
            Pipeline::Meme => "Failed to analyze meme image",
        }
    }

    fn unexpected_summary(&self) -> &'static str {
        match self {
            Pipeline::Tweet => "Failed to analyze tweet. Please try again.",
            Pipeline::Batch => "Failed to process CSV file. Please try again.",
            Pipeline::Meme => "Failed to analyze meme image",
        }
    }

    fn unexpected_hint(&self) -> Option<&'static str> {
        match self {
            Pipeline::Meme => Some(
                "Ensure the Gemini endpoint is reachable and GEMINI_API_KEY is set in the server environment.",
            ),
            _ => None,
        }
    }
}

pub fn error_body(pipeline: Pipeline, err: &AnalysisError) -> ErrorBody {
    match err {
        AnalysisError::Validation(reason) => {
            ErrorBody::new(pipeline.missing_input_summary()).with_details(reason.to_string())
        }
        AnalysisError::UpstreamStatus { body, .. } => {
            ErrorBody::new(pipeline.upstream_summary()).with_details(body.clone())
        }
        AnalysisError::ExternalFormat(message) => {
            ErrorBody::new("Invalid model response").with_details(message.clone())
        }
        AnalysisError::ExternalValidation { raw } => {
            ErrorBody::new("Invalid model response").with_raw(raw.clone())
        }
        AnalysisError::Transport(message) => {
            let body = ErrorBody::new(pipeline.unexpected_summary()).with_details(message.clone());
            match pipeline.unexpected_hint() {
                Some(hint) => body.with_hint(hint),
                None => body,
            }
        }
    }
}

pub fn project(pipeline: Pipeline, err: &AnalysisError) -> HttpResponse {
    HttpResponse::build(err.status()).json(error_body(pipeline, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AnalysisError::from(ValidationError::MissingText);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = error_body(Pipeline::Tweet, &err);
        assert_eq!(body.error, "Tweet text is required");
        assert_eq!(body.details.as_deref(), Some("missing or non-string text"));
    }

    #[test]
    fn upstream_status_is_passed_through() {
        let err = AnalysisError::UpstreamStatus {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = error_body(Pipeline::Batch, &err);
        assert_eq!(body.error, "Failed to process CSV file");
        assert_eq!(body.details.as_deref(), Some("overloaded"));
    }

    #[test]
    fn bogus_upstream_status_becomes_bad_gateway() {
        let err = AnalysisError::UpstreamStatus {
            status: 42,
            body: String::new(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn model_failures_are_bad_gateway() {
        let raw = json!({"label": "funny meme"});
        let err = AnalysisError::ExternalValidation { raw: raw.clone() };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_body(Pipeline::Meme, &err).raw, Some(raw));

        let err = AnalysisError::ExternalFormat("model returned non-JSON response".into());
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn transport_failures_carry_hint_on_meme_path_only() {
        let err = AnalysisError::Transport("connection refused".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_body(Pipeline::Meme, &err).hint.is_some());
        let tweet = error_body(Pipeline::Tweet, &err);
        assert!(tweet.hint.is_none());
        assert_eq!(tweet.details.as_deref(), Some("connection refused"));
    }
}
