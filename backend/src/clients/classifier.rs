use async_trait::async_trait;
use reqwest::Client as HttpClient;
use url::Url;

use super::{ClassificationBackend, UpstreamReply};
use crate::error::AnalysisError;
use crate::inbound::Upload;
use crate::outbound::{TweetRequest, bulk_form};

const ANALYZE_PATH: &str = "api/analyze";
const BULK_ANALYZE_PATH: &str = "api/bulk-analyze";

/// Classification backend reached over HTTP.
#[derive(Clone)]
pub struct HttpClassifier {
    http_client: HttpClient,
    analyze_url: Url,
    bulk_analyze_url: Url,
}

impl HttpClassifier {
    pub fn new(http_client: HttpClient, base_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http_client,
            analyze_url: base_url.join(ANALYZE_PATH)?,
            bulk_analyze_url: base_url.join(BULK_ANALYZE_PATH)?,
        })
    }

    async fn into_reply(response: reqwest::Response) -> Result<UpstreamReply, AnalysisError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(UpstreamReply { status, body })
    }
}

#[async_trait]
impl ClassificationBackend for HttpClassifier {
    async fn analyze_tweet(&self, request: &TweetRequest) -> Result<UpstreamReply, AnalysisError> {
        let response = self
            .http_client
            .post(self.analyze_url.clone())
            .json(request)
            .send()
            .await?;
        Self::into_reply(response).await
    }

    async fn analyze_batch(&self, upload: Upload) -> Result<UpstreamReply, AnalysisError> {
        let form = bulk_form(upload)?;
        let response = self
            .http_client
            .post(self.bulk_analyze_url.clone())
            .multipart(form)
            .send()
            .await?;
        Self::into_reply(response).await
    }
}
