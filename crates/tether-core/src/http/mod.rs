//! Resilient HTTP request pipeline
//!
//! This module provides:
//! - Outcome classification of transport attempts
//! - Retry and fail predicates over classified failures
//! - Connectivity-aware retry with exponential backoff
//! - Advisory per-endpoint request deduplication
//! - Event channels for connection, timeout and authorization failures

pub mod body;
pub mod connectivity;
pub mod dedup;
pub mod endpoint;
pub mod events;
pub mod headers;
pub mod outcome;
pub mod pipeline;
pub mod predicates;
pub mod retry;
pub mod trace;
pub mod transport;
pub mod url;

pub use body::ParameterEncoding;
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivitySignal};
pub use dedup::RequestLimiter;
pub use endpoint::{Endpoint, EndpointId, Method, DEFAULT_REQUEST_TIMEOUT};
pub use events::{ErrorEvent, PipelineEvents};
pub use headers::{BearerToken, HeaderError, HeaderProvider, Headers, NoHeaders, StaticHeaders};
pub use outcome::{ClientError, Outcome, OutcomeClassifier, StatusCodeSets, TransportError, TransportErrorKind};
pub use pipeline::{Pipeline, PipelineBuilder, Request, RequestHandle, Response};
pub use predicates::{should_fail, should_retry, ConnectionError};
pub use retry::{BackoffPolicy, CancelToken, RetryCoordinator, RetryDecision, RetryMode, RetryPolicy, RetryState};
pub use trace::{LogTracingSource, Tracer, TracingDataSource};
pub use transport::{RawResponse, RequestDescriptor, ReqwestTransport, Transport};
pub use url::{QueryItem, ResolvedKey};
