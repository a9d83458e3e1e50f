//! Fetch command handler

use crate::cli::FetchArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::{redaction, timing::Timer};
use crate::output::{FetchReport, OutputWriter};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tether_core::http::{
    ConnectionError, Headers, LogTracingSource, QueryItem, RetryMode, StaticHeaders,
};
use tether_core::{ClientConfig, Endpoint, EndpointId, PipelineBuilder, Request, Response};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

/// Handle the fetch command
#[instrument(skip_all, fields(target = %args.target))]
pub async fn handle_fetch(args: FetchArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let timer = Timer::new("fetch_command");

    let (endpoint, endpoint_headers) = resolve_target(&args, config)?;
    let client = client_config(&args, &config.client)?;
    let request = build_request(&args, Arc::new(endpoint))?;

    let key = request.resolve()?;
    let mut logged_headers = endpoint_headers.clone();
    logged_headers.extend(parse_headers(&args.headers)?);
    debug!(
        url = %key.url,
        headers = ?redaction::redact_headers(&logged_headers),
        "Prepared request"
    );

    let pipeline = PipelineBuilder::from_config(&client)?
        .header_provider(Arc::new(StaticHeaders::new(endpoint_headers)))
        .tracing_source(Arc::new(LogTracingSource))
        .build();

    let mut listener = EventListener::subscribe(&pipeline);

    let spinner = output.spinner(&format!("{} {}", args.method, key.url));
    let result = pipeline.send(request).await;
    let elapsed = timer.elapsed();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    for warning in listener.drain() {
        output.warning(&warning)?;
    }

    let response = result?;
    info!(status = response.status, attempts = response.attempts, "Fetch completed");

    let mut report = fetch_report(&args, &key.endpoint, &key.url, &response, elapsed);

    if let Some(path) = &args.save_to {
        let body = report.body_text(args.pretty)?;
        std::fs::write(path, &body)?;
        report.body = serde_json::Value::Null;
        output.fetch_report(&report, args.pretty)?;
        output.success(&format!("✓ Saved {} bytes to {}", body.len(), path.display()))?;
    } else {
        output.fetch_report(&report, args.pretty)?;
    }

    Ok(())
}

/// Collects pipeline notifications published while the request runs
struct EventListener {
    connection: broadcast::Receiver<ConnectionError>,
    timeouts: broadcast::Receiver<EndpointId>,
    auth_failures: broadcast::Receiver<tether_core::ClientError>,
}

impl EventListener {
    fn subscribe(pipeline: &tether_core::Pipeline) -> Self {
        let events = pipeline.events();
        Self {
            connection: events.subscribe_connection_errors(),
            timeouts: events.subscribe_timeouts(),
            auth_failures: events.subscribe_auth_failures(),
        }
    }

    fn drain(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        while let Ok(event) = self.connection.try_recv() {
            warnings.push(match event {
                ConnectionError::InternetDown => "No internet connection".to_string(),
                ConnectionError::ServerDown => "Server is unreachable or down".to_string(),
            });
        }
        while let Ok(endpoint) = self.timeouts.try_recv() {
            warnings.push(format!("Request to '{}' timed out", endpoint));
        }
        while let Ok(error) = self.auth_failures.try_recv() {
            warnings.push(format!("Authorization rejected: {}", error));
        }

        warnings
    }
}

/// Look the target up in the configuration, falling back to an absolute URL
fn resolve_target(args: &FetchArgs, config: &Config) -> Result<(Endpoint, Headers)> {
    let (mut endpoint, headers) = match config.endpoints.get(&args.target) {
        Some(endpoint_config) => (
            endpoint_config.to_endpoint(&args.target)?,
            endpoint_config.headers.clone(),
        ),
        None if is_absolute_url(&args.target) => (
            Endpoint::new(args.target.as_str(), args.target.as_str()),
            Headers::new(),
        ),
        None => {
            return Err(Error::EndpointNotFound {
                name: args.target.clone(),
            })
        }
    };

    if let Some(secs) = args.timeout {
        if secs == 0 {
            return Err(Error::invalid_args("--timeout must be greater than zero"));
        }
        endpoint = endpoint.with_timeout(Duration::from_secs(secs));
    }

    Ok((endpoint, headers))
}

fn is_absolute_url(target: &str) -> bool {
    let lower = target.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Apply command-line retry overrides to the configured client settings
fn client_config(args: &FetchArgs, base: &ClientConfig) -> Result<ClientConfig> {
    let mut client = base.clone();
    if let Some(max_attempts) = args.max_attempts {
        if max_attempts == 0 {
            return Err(Error::invalid_args("--max-attempts must be at least 1"));
        }
        client.retry.max_attempts = max_attempts;
    }
    if args.timer_only {
        client.retry.mode = RetryMode::TimerOnly;
    }
    Ok(client)
}

fn build_request(args: &FetchArgs, endpoint: Arc<Endpoint>) -> Result<Request> {
    let items = args
        .query
        .iter()
        .map(|raw| parse_query_item(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut request = Request::new(endpoint).method(args.method);
    request = if args.form {
        request.url_encoded(items)
    } else {
        request.query_items(items)
    };

    if let Some(json) = &args.json {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::invalid_args(format!("--json is not valid JSON: {}", e)))?;
        request = request.json(&value)?;
    }

    for (name, value) in parse_headers(&args.headers)? {
        request = request.header(name, value);
    }

    Ok(request)
}

/// Parse `NAME=VALUE`; a bare `NAME` becomes a valueless item
fn parse_query_item(raw: &str) -> Result<QueryItem> {
    let item = match raw.split_once('=') {
        Some((name, value)) => QueryItem::new(name, value),
        None => QueryItem::flag(raw),
    };
    if item.name.is_empty() {
        return Err(Error::invalid_args(format!("Query item '{}' has no name", raw)));
    }
    Ok(item)
}

/// Parse `Name: value` header arguments
fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| Error::invalid_args(format!("Header '{}' must look like 'Name: value'", header)))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::invalid_args(format!("Header '{}' has no name", header)));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn fetch_report(args: &FetchArgs, endpoint: &EndpointId, url: &str, response: &Response, elapsed: Duration) -> FetchReport {
    let body = serde_json::from_slice(&response.body).unwrap_or_else(|_| serde_json::Value::String(response.text()));

    FetchReport {
        endpoint: endpoint.to_string(),
        method: args.method.to_string(),
        url: url.to_string(),
        status: response.status,
        attempts: response.attempts,
        duplicate: response.duplicate,
        elapsed_ms: elapsed.as_millis() as u64,
        body,
    }
}
