use serde_json::Value;
use shared::{AnalysisResult, BatchResult, MemeResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::clients::{ClassificationBackend, UpstreamReply, VisionModel};
use crate::error::{AnalysisError, Pipeline, ValidationError};
use crate::inbound::{Upload, parse_tweet_body};
use crate::normalize::{normalize_batch, normalize_meme, normalize_tweet};
use crate::observe::{Event, InputShape, Observer};
use crate::outbound::{MemeInferenceRequest, TweetRequest};

/// The three analysis pipelines. Holds no per-request state.
#[derive(Clone)]
pub struct Analyzer {
    backend: Arc<dyn ClassificationBackend>,
    vision: Arc<dyn VisionModel>,
    observer: Observer,
}

impl Analyzer {
    pub fn new(
        backend: Arc<dyn ClassificationBackend>,
        vision: Arc<dyn VisionModel>,
        observer: Observer,
    ) -> Self {
        Self {
            backend,
            vision,
            observer,
        }
    }

    pub async fn analyze_tweet(
        &self,
        request_id: Uuid,
        body: &[u8],
    ) -> Result<AnalysisResult, AnalysisError> {
        let pipeline = Pipeline::Tweet;
        let outcome: Result<AnalysisResult, AnalysisError> = async {
            let tweet = parse_tweet_body(body)?;
            self.received(request_id, pipeline, InputShape::Text {
                chars: tweet.chars().count(),
            });

            self.forwarded(request_id, pipeline, "classification backend");
            let reply = self.backend.analyze_tweet(&TweetRequest::new(tweet)).await?;
            let response = self.interpret(request_id, pipeline, reply)?;
            normalize_tweet(&response)
        }
        .await;
        self.finish(request_id, pipeline, outcome)
    }

    pub async fn analyze_batch(
        &self,
        request_id: Uuid,
        upload: Option<Upload>,
    ) -> Result<BatchResult, AnalysisError> {
        let pipeline = Pipeline::Batch;
        let outcome: Result<BatchResult, AnalysisError> = async {
            let upload = upload.ok_or(ValidationError::MissingFile)?;
            self.received(request_id, pipeline, upload.file_shape());

            self.forwarded(request_id, pipeline, "classification backend");
            let reply = self.backend.analyze_batch(upload).await?;
            let response = self.interpret(request_id, pipeline, reply)?;
            normalize_batch(&response)
        }
        .await;
        self.finish(request_id, pipeline, outcome)
    }

    pub async fn analyze_meme(
        &self,
        request_id: Uuid,
        upload: Option<Upload>,
    ) -> Result<MemeResult, AnalysisError> {
        let pipeline = Pipeline::Meme;
        let outcome: Result<MemeResult, AnalysisError> = async {
            let upload = upload
                .filter(|upload| !upload.bytes.is_empty())
                .ok_or(ValidationError::MissingImage)?;
            self.received(request_id, pipeline, upload.image_shape());

            self.forwarded(request_id, pipeline, "vision model");
            let text = self.vision.generate(&MemeInferenceRequest::new(upload)).await?;
            self.observer.emit(Event::ModelResponded {
                request_id,
                text_len: text.len(),
            });
            normalize_meme(&text)
        }
        .await;
        self.finish(request_id, pipeline, outcome)
    }

    /// Non-2xx replies are handed back untouched; anything else must be JSON.
    fn interpret(
        &self,
        request_id: Uuid,
        pipeline: Pipeline,
        reply: UpstreamReply,
    ) -> Result<Value, AnalysisError> {
        self.observer.emit(Event::UpstreamResponded {
            request_id,
            pipeline,
            status: reply.status,
        });
        if !reply.is_success() {
            return Err(AnalysisError::UpstreamStatus {
                status: reply.status,
                body: reply.body,
            });
        }
        serde_json::from_str(&reply.body).map_err(|_| {
            AnalysisError::ExternalFormat("classification backend returned non-JSON response".to_string())
        })
    }

    fn received(&self, request_id: Uuid, pipeline: Pipeline, shape: InputShape) {
        self.observer.emit(Event::Received {
            request_id,
            pipeline,
            shape,
        });
    }

    fn forwarded(&self, request_id: Uuid, pipeline: Pipeline, target: &'static str) {
        self.observer.emit(Event::Forwarded {
            request_id,
            pipeline,
            target,
        });
    }

    fn finish<T>(
        &self,
        request_id: Uuid,
        pipeline: Pipeline,
        outcome: Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        match &outcome {
            Ok(_) => self.observer.emit(Event::Completed {
                request_id,
                pipeline,
            }),
            Err(err) => self.observer.emit(Event::Failed {
                request_id,
                pipeline,
                status: err.status().as_u16(),
                reason: err.to_string(),
            }),
        }
        outcome
    }
}
