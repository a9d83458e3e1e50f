//! Observational tracing collaborators
//!
//! A [`Tracer`] brackets each transport attempt. It never influences control
//! flow. [`TracingDataSource`] hands out one tracer per attempt.

use std::sync::Arc;

use crate::http::endpoint::{Endpoint, Method};

/// Brackets one transport attempt
pub trait Tracer: Send + Sync {
    fn on_start(&self);

    /// `success` is true only for status 200
    fn on_stop(&self, success: bool);
}

/// Creates tracers for outgoing attempts
pub trait TracingDataSource: Send + Sync {
    fn tracer(&self, endpoint: &Endpoint, method: Method, url: &str) -> Option<Arc<dyn Tracer>>;
}

/// Tracer that logs attempt start and stop with the elapsed time
#[derive(Debug)]
pub struct LogTracer {
    label: String,
    started: std::sync::Mutex<Option<tokio::time::Instant>>,
}

impl LogTracer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: std::sync::Mutex::new(None),
        }
    }
}

impl Tracer for LogTracer {
    fn on_start(&self) {
        let mut started = self.started.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *started = Some(tokio::time::Instant::now());
        tracing::trace!(request = %self.label, "Attempt started");
    }

    fn on_stop(&self, success: bool) {
        let started = self.started.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let elapsed_ms = started.map(|t| t.elapsed().as_millis() as u64);
        tracing::trace!(request = %self.label, success, elapsed_ms, "Attempt finished");
    }
}

/// Data source that creates a [`LogTracer`] per attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracingSource;

impl TracingDataSource for LogTracingSource {
    fn tracer(&self, endpoint: &Endpoint, method: Method, url: &str) -> Option<Arc<dyn Tracer>> {
        Some(Arc::new(LogTracer::new(format!("{} {} {}", endpoint.id(), method, url))))
    }
}
