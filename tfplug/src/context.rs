//! Request-scoped context
//!
//! Every provider and resource call receives a [`Context`]. It carries a
//! request id used to correlate log lines and the time the request started.
//! There is no cancellation: a call runs until its single round-trip ends.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    request_id: Uuid,
    operation: String,
    started_at: DateTime<Utc>,
}

impl Context {
    pub fn new() -> Self {
        Self::for_operation("request")
    }

    pub fn for_operation(operation: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id: Uuid::new_v4(),
                operation: operation.into(),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.inner.started_at).num_milliseconds()
    }

    /// Span for log lines emitted while serving this request
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.inner.request_id,
            operation = %self.inner.operation
        )
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
