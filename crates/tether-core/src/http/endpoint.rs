//! Endpoint descriptors and HTTP methods
//!
//! An [`Endpoint`] is a named, reusable target: base URL, deduplication
//! window and request timeout. It is immutable once built and is usually
//! shared behind an `Arc` by many requests.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request timeout applied when an endpoint does not set one
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Opaque identity of an endpoint; the first half of a resolved request key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EndpointId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A named target configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    id: EndpointId,
    base_url: String,
    window: Duration,
    timeout: Duration,
}

impl Endpoint {
    /// Create an endpoint with no deduplication window and the default timeout.
    ///
    /// The base URL is kept verbatim; it is only parsed when a request is
    /// resolved, so a malformed URL surfaces as `ClientError::InvalidUrl`.
    pub fn new(id: impl Into<EndpointId>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            window: Duration::ZERO,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the window during which a repeated request is considered redundant
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the per-request timeout handed to the transport
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// HTTP request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Options,
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPTIONS" => Ok(Method::Options),
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Options => reqwest::Method::OPTIONS,
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Trace => reqwest::Method::TRACE,
            Method::Connect => reqwest::Method::CONNECT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = Endpoint::new("users", "https://api.example.com/users");
        assert_eq!(endpoint.id().as_str(), "users");
        assert_eq!(endpoint.window(), Duration::ZERO);
        assert_eq!(endpoint.timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_endpoint_builders() {
        let endpoint = Endpoint::new("users", "https://api.example.com/users")
            .with_window(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(3));
        assert_eq!(endpoint.window(), Duration::from_secs(5));
        assert_eq!(endpoint.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("Connect".parse::<Method>().unwrap(), Method::Connect);
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_reqwest_mapping() {
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
