use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Pipeline;

/// What a request looked like, without its content.
#[derive(Debug, Clone, PartialEq)]
pub enum InputShape {
    Text { chars: usize },
    File { name: Option<String>, bytes: usize },
    Image { media_type: String, bytes: usize },
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputShape::Text { chars } => write!(f, "text ({} chars)", chars),
            InputShape::File { name, bytes } => write!(
                f,
                "file {} ({} bytes)",
                name.as_deref().unwrap_or("<unnamed>"),
                bytes
            ),
            InputShape::Image { media_type, bytes } => {
                write!(f, "image {} ({} bytes)", media_type, bytes)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Received {
        request_id: Uuid,
        pipeline: Pipeline,
        shape: InputShape,
    },
    Forwarded {
        request_id: Uuid,
        pipeline: Pipeline,
        target: &'static str,
    },
    UpstreamResponded {
        request_id: Uuid,
        pipeline: Pipeline,
        status: u16,
    },
    ModelResponded {
        request_id: Uuid,
        text_len: usize,
    },
    Completed {
        request_id: Uuid,
        pipeline: Pipeline,
    },
    Failed {
        request_id: Uuid,
        pipeline: Pipeline,
        status: u16,
        reason: String,
    },
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Optional sink handed to each component. An empty observer drops events.
#[derive(Clone, Default)]
pub struct Observer {
    sink: Option<Arc<dyn EventSink>>,
}

impl Observer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn emit(&self, event: Event) {
        if let Some(sink) = &self.sink {
            sink.record(&event);
        }
    }
}

/// Renders events through the `log` facade.
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &Event) {
        match event {
            Event::Received {
                request_id,
                pipeline,
                shape,
            } => log::info!("[{}] {} request received: {}", request_id, pipeline.name(), shape),
            Event::Forwarded {
                request_id,
                pipeline,
                target,
            } => log::debug!("[{}] {} request forwarded to {}", request_id, pipeline.name(), target),
            Event::UpstreamResponded {
                request_id,
                pipeline,
                status,
            } => log::info!("[{}] {} upstream status {}", request_id, pipeline.name(), status),
            Event::ModelResponded {
                request_id,
                text_len,
            } => log::info!("[{}] model responded with {} chars", request_id, text_len),
            Event::Completed {
                request_id,
                pipeline,
            } => log::info!("[{}] {} analysis completed", request_id, pipeline.name()),
            Event::Failed {
                request_id,
                pipeline,
                status,
                reason,
            } => log::error!(
                "[{}] {} analysis failed with {}: {}",
                request_id,
                pipeline.name(),
                status,
                reason
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<Event>>,
    }

    impl EventSink for RecordingSink {
        fn record(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
