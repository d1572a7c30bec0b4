pub mod classifier;
pub mod gemini;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::inbound::Upload;
use crate::outbound::{MemeInferenceRequest, TweetRequest};

/// Whatever the classification backend answered, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait ClassificationBackend: Send + Sync {
    async fn analyze_tweet(&self, request: &TweetRequest) -> Result<UpstreamReply, AnalysisError>;

    async fn analyze_batch(&self, upload: Upload) -> Result<UpstreamReply, AnalysisError>;
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Returns the model's raw text output.
    async fn generate(&self, request: &MemeInferenceRequest) -> Result<String, AnalysisError>;
}
