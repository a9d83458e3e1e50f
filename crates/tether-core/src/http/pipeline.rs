//! Request pipeline
//!
//! Orchestrates one logical request: resolve the URL, gather headers,
//! consult the dedup cache, dispatch attempts through the transport under the
//! retry coordinator, classify each result, record completions, and publish
//! terminal failures on the event channels.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::http::body::{describe as describe_body, ParameterEncoding};
use crate::http::connectivity::{Connectivity, ConnectivitySignal};
use crate::http::dedup::RequestLimiter;
use crate::http::endpoint::{Endpoint, EndpointId, Method};
use crate::http::events::{ErrorEvent, PipelineEvents};
use crate::http::headers::{set_header, HeaderProvider, Headers, NoHeaders};
use crate::http::outcome::{ClientError, Outcome, OutcomeClassifier, StatusCodeSets};
use crate::http::predicates::{should_fail, ConnectionError};
use crate::http::retry::{CancelToken, RetryCoordinator, RetryPolicy, RetryState};
use crate::http::trace::{Tracer, TracingDataSource};
use crate::http::transport::{RequestDescriptor, ReqwestTransport, Transport};
use crate::http::url::{self as request_url, QueryItem, ResolvedKey};

const BODY_PREVIEW_CHARS: usize = 1024;

/// One logical request against an endpoint
#[derive(Debug, Clone)]
pub struct Request {
    endpoint: Arc<Endpoint>,
    method: Method,
    query: Vec<QueryItem>,
    headers: Headers,
    body: Option<Vec<u8>>,
    encoding: ParameterEncoding,
    retry: Option<RetryPolicy>,
}

impl Request {
    pub fn new(endpoint: impl Into<Arc<Endpoint>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            encoding: ParameterEncoding::Json,
            retry: None,
        }
    }

    pub fn get(endpoint: impl Into<Arc<Endpoint>>) -> Self {
        Self::new(endpoint)
    }

    pub fn post(endpoint: impl Into<Arc<Endpoint>>) -> Self {
        Self::new(endpoint).method(Method::Post)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryItem::new(name, value));
        self
    }

    pub fn query_items(mut self, items: impl IntoIterator<Item = QueryItem>) -> Self {
        self.query.extend(items);
        self
    }

    /// Per-request header; overrides the header provider on conflict
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> crate::Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        self.encoding = ParameterEncoding::Json;
        Ok(self)
    }

    /// Send `params` as URL-encoded query items
    pub fn url_encoded(mut self, params: impl IntoIterator<Item = QueryItem>) -> Self {
        self.query.extend(params);
        self.encoding = ParameterEncoding::UrlEncoded;
        self
    }

    /// Send a pre-built multipart body
    pub fn multipart(mut self, boundary: impl Into<String>, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.encoding = ParameterEncoding::MultipartForm {
            boundary: boundary.into(),
        };
        self
    }

    /// Raw body, sent with the current encoding's content type
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the pipeline's retry policy for this request
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn resolve(&self) -> Result<ResolvedKey, ClientError> {
        request_url::resolve_key(&self.endpoint, &self.query).map(|(_, key)| key)
    }

    fn content_type(&self) -> Option<String> {
        match (&self.encoding, &self.body) {
            (ParameterEncoding::UrlEncoded, _) | (_, Some(_)) => Some(self.encoding.content_type()),
            _ => None,
        }
    }
}

/// A successful logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// 200, or 302 for a passed-through redirect
    pub status: u16,
    pub body: Vec<u8>,
    /// Transport attempts made, the successful one included
    pub attempts: u32,
    /// The dedup cache considered this request redundant when it was sent
    pub duplicate: bool,
}

impl Response {
    pub fn is_redirect(&self) -> bool {
        self.status == 302
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode response body");
            ClientError::ParseError
        })
    }
}

/// Handle to a spawned logical request
#[derive(Debug)]
pub struct RequestHandle {
    cancel: CancelToken,
    state: watch::Receiver<RetryState>,
    task: JoinHandle<Result<Response, ClientError>>,
}

impl RequestHandle {
    /// Cancel the request. No-op once it has terminated.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> RetryState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal result
    pub async fn join(self) -> Result<Response, ClientError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Request task aborted");
                Err(ClientError::Cancelled)
            }
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    classifier: OutcomeClassifier,
    retry: RetryPolicy,
    limiter: RequestLimiter,
    connectivity: ConnectivitySignal,
    headers: Arc<dyn HeaderProvider>,
    tracing: Option<Arc<dyn TracingDataSource>>,
    events: PipelineEvents,
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    transport: Arc<dyn Transport>,
    codes: StatusCodeSets,
    retry: RetryPolicy,
    connectivity: ConnectivitySignal,
    headers: Arc<dyn HeaderProvider>,
    tracing: Option<Arc<dyn TracingDataSource>>,
    event_capacity: usize,
}

impl PipelineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            codes: StatusCodeSets::default(),
            retry: RetryPolicy::default(),
            connectivity: ConnectivitySignal::fixed(Connectivity::Unknown),
            headers: Arc::new(NoHeaders),
            tracing: None,
            event_capacity: crate::http::events::DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Builder with a reqwest transport, status codes, retry policy and
    /// event capacity taken from `config`
    pub fn from_config(config: &ClientConfig) -> crate::Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(Self::new(Arc::new(transport))
            .status_codes(config.status_codes.clone())
            .retry_policy(config.retry.to_policy())
            .event_capacity(config.events.capacity))
    }

    pub fn status_codes(mut self, codes: StatusCodeSets) -> Self {
        self.codes = codes;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn connectivity(mut self, signal: ConnectivitySignal) -> Self {
        self.connectivity = signal;
        self
    }

    pub fn header_provider(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.headers = provider;
        self
    }

    pub fn tracing_source(mut self, source: Arc<dyn TracingDataSource>) -> Self {
        self.tracing = Some(source);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            inner: Arc::new(Inner {
                transport: self.transport,
                classifier: OutcomeClassifier::new(self.codes),
                retry: self.retry,
                limiter: RequestLimiter::new(),
                connectivity: self.connectivity,
                headers: self.headers,
                tracing: self.tracing,
                events: PipelineEvents::new(self.event_capacity),
            }),
        }
    }
}

/// Resilient request pipeline; cheap to clone
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder::new(transport)
    }

    pub fn events(&self) -> &PipelineEvents {
        &self.inner.events
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.inner.limiter
    }

    /// Advisory: false when the same resolved request completed within the
    /// endpoint window
    pub fn should_dispatch(&self, request: &Request) -> Result<bool, ClientError> {
        let key = request.resolve()?;
        Ok(self
            .inner
            .limiter
            .should_dispatch(&request.endpoint, &key.url, Instant::now()))
    }

    pub fn invalidate(&self, endpoint: &EndpointId) {
        self.inner.limiter.invalidate(endpoint);
    }

    pub fn invalidate_all(&self) {
        self.inner.limiter.invalidate_all();
    }

    /// Run a logical request to completion on the current task.
    ///
    /// Dropping the returned future cancels the in-flight attempt.
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let coordinator = self.coordinator(&request, CancelToken::new());
        self.execute(request, &coordinator).await
    }

    /// Run a logical request and decode a successful body as JSON
    pub async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T, ClientError> {
        let endpoint = request.endpoint.id().clone();
        self.send(request).await?.json().inspect_err(|error| {
            self.inner.publish_failure(&endpoint, error);
        })
    }

    /// Run a logical request on its own task
    pub fn spawn(&self, request: Request) -> RequestHandle {
        let cancel = CancelToken::new();
        let coordinator = self.coordinator(&request, cancel.clone());
        let state = coordinator.state();
        let pipeline = self.clone();

        let task = tokio::spawn(async move { pipeline.execute(request, &coordinator).await });

        RequestHandle { cancel, state, task }
    }

    fn coordinator(&self, request: &Request, cancel: CancelToken) -> RetryCoordinator {
        let policy = request.retry.clone().unwrap_or_else(|| self.inner.retry.clone());
        RetryCoordinator::new(policy, self.inner.connectivity.clone(), cancel)
    }

    async fn execute(&self, request: Request, coordinator: &RetryCoordinator) -> Result<Response, ClientError> {
        let inner = &*self.inner;
        let endpoint = request.endpoint.clone();

        let (url, key) = request_url::resolve_key(&endpoint, &request.query).inspect_err(|_| {
            tracing::warn!(endpoint = %endpoint.id(), "Request URL could not be resolved");
        })?;

        let mut headers = inner.headers.headers().map_err(|e| {
            tracing::warn!(endpoint = %endpoint.id(), error = %e, "Header provider failed");
            ClientError::Headers(e.to_string())
        })?;
        if let Some(content_type) = request.content_type() {
            set_header(&mut headers, "Content-Type", content_type);
        }
        for (name, value) in request.headers {
            set_header(&mut headers, name, value);
        }

        let duplicate = !inner.limiter.should_dispatch(&endpoint, &key.url, Instant::now());
        if duplicate {
            tracing::debug!(endpoint = %endpoint.id(), url = %key.url, "Request repeats a recent completion");
        }

        tracing::debug!(
            method = %request.method,
            url = %url,
            encoding = ?request.encoding,
            headers = ?headers.keys().collect::<Vec<_>>(),
            "Beginning request"
        );
        if let Some(body) = &request.body {
            tracing::debug!(body = %describe_body(body), "Request body");
        }

        let descriptor = RequestDescriptor {
            method: request.method,
            url,
            headers,
            body: request.body,
            timeout: endpoint.timeout(),
        };

        let result = coordinator
            .run(|attempt| {
                let descriptor = descriptor.clone();
                let endpoint = &endpoint;
                let key = &key;
                async move { inner.attempt(endpoint, key, descriptor, attempt, duplicate).await }
            })
            .await;

        if let Err(error) = &result {
            inner.publish_failure(endpoint.id(), error);
        }
        result
    }
}

impl Inner {
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        key: &ResolvedKey,
        descriptor: RequestDescriptor,
        attempt: u32,
        duplicate: bool,
    ) -> Result<Response, ClientError> {
        let trace = AttemptTrace::start(
            self.tracing
                .as_ref()
                .and_then(|source| source.tracer(endpoint, descriptor.method, &key.url)),
        );

        let result = self.transport.send(descriptor).await;

        trace.finish(matches!(&result, Ok(response) if response.status == 200));
        match &result {
            Ok(response) => tracing::debug!(
                attempt,
                status = response.status,
                body = %preview(&response.body),
                "Received response"
            ),
            Err(e) => tracing::debug!(attempt, error = %e, "Transport attempt failed"),
        }

        let outcome = self.classifier.classify(result);
        self.limiter.record_key(key, Instant::now());

        let status = match &outcome {
            Outcome::Redirect(_) => 302,
            _ => 200,
        };
        outcome.into_result().map(|body| Response {
            status,
            body,
            attempts: attempt,
            duplicate,
        })
    }

    fn publish_failure(&self, endpoint: &EndpointId, error: &ClientError) {
        if matches!(error, ClientError::Cancelled) {
            tracing::debug!(endpoint = %endpoint, "Request cancelled");
            return;
        }

        tracing::error!(endpoint = %endpoint, error = %error, "Request failed");

        let cancelled_transport = error.transport().is_some_and(|e| e.is_cancelled());
        if !cancelled_transport {
            self.events.error(ErrorEvent {
                endpoint: endpoint.clone(),
                error: error.clone(),
            });
        }

        if matches!(error, ClientError::AuthorizationFailed { .. }) {
            self.events.auth_failure(error.clone());
        }

        if error.is_timeout() {
            self.events.timeout(endpoint.clone());
        }

        let connectivity = self.connectivity.current();
        if should_fail(error, connectivity) {
            let event = ConnectionError::for_connectivity(connectivity);
            tracing::warn!(endpoint = %endpoint, event = %event, "Connection degraded");
            self.events.connection_error(event);
        }
    }
}

/// Closes a tracer bracket; an attempt dropped mid-flight reports failure
struct AttemptTrace {
    tracer: Option<Arc<dyn Tracer>>,
}

impl AttemptTrace {
    fn start(tracer: Option<Arc<dyn Tracer>>) -> Self {
        if let Some(tracer) = &tracer {
            tracer.on_start();
        }
        Self { tracer }
    }

    fn finish(mut self, success: bool) {
        if let Some(tracer) = self.tracer.take() {
            tracer.on_stop(success);
        }
    }
}

impl Drop for AttemptTrace {
    fn drop(&mut self) {
        if let Some(tracer) = self.tracer.take() {
            tracer.on_stop(false);
        }
    }
}

fn preview(body: &[u8]) -> String {
    describe_body(body).chars().take(BODY_PREVIEW_CHARS).collect()
}
