//! Header and authorization providers
//!
//! A provider is consulted once per logical request before dispatch. A
//! failing provider short-circuits the request with
//! [`ClientError::Headers`](crate::http::ClientError::Headers).

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;

/// Request header mapping
pub type Headers = BTreeMap<String, String>;

/// Insert a header, replacing any existing entry whose name differs only in case
pub fn set_header(headers: &mut Headers, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value.into());
}

/// Header provider errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid header configuration: {0}")]
    InvalidConfig(String),
}

/// Supplies headers for outgoing requests
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> Result<Headers, HeaderError>;
}

/// Provider that adds nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeaders;

impl HeaderProvider for NoHeaders {
    fn headers(&self) -> Result<Headers, HeaderError> {
        Ok(Headers::new())
    }
}

/// Fixed header set with `${ENV:VAR}` expansion in values
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: Headers,
}

impl StaticHeaders {
    pub fn new(headers: Headers) -> Self {
        Self { headers }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl HeaderProvider for StaticHeaders {
    fn headers(&self) -> Result<Headers, HeaderError> {
        self.headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), expand_env_vars(value)?)))
            .collect()
    }
}

/// Expand every `${ENV:NAME}` occurrence with the named environment variable
pub fn expand_env_vars(value: &str) -> Result<String, HeaderError> {
    let re = Regex::new(r"\$\{ENV:([^}]+)\}").map_err(|e| HeaderError::InvalidConfig(e.to_string()))?;

    let mut result = value.to_string();
    for cap in re.captures_iter(value) {
        let var_name = &cap[1];
        let env_value =
            std::env::var(var_name).map_err(|_| HeaderError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &env_value);
    }

    Ok(result)
}

#[derive(Debug, Clone)]
enum TokenSource {
    Literal(String),
    Env(String),
}

/// `Authorization: Bearer <token>` from a literal or an environment variable
#[derive(Debug, Clone)]
pub struct BearerToken {
    source: TokenSource,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Literal(token.into()),
        }
    }

    /// Read the token from `var` each time headers are requested
    pub fn from_env(var: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Env(var.into()),
        }
    }
}

impl HeaderProvider for BearerToken {
    fn headers(&self) -> Result<Headers, HeaderError> {
        let token = match &self.source {
            TokenSource::Literal(token) => token.clone(),
            TokenSource::Env(var) => std::env::var(var).map_err(|_| HeaderError::EnvVarNotFound(var.clone()))?,
        };

        if token.trim().is_empty() {
            return Err(HeaderError::MissingCredential("bearer token is empty".to_string()));
        }

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        set_header(&mut headers, "content-type", "text/plain");
        set_header(&mut headers, "Accept", "*/*");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert!(headers.get("Content-Type").is_none());
    }

    #[test]
    fn test_no_headers() {
        assert!(NoHeaders.headers().unwrap().is_empty());
    }

    #[test]
    fn test_static_headers_env_expansion() {
        std::env::set_var("TETHER_TEST_HEADER_KEY", "key-789");

        let provider = StaticHeaders::default()
            .with("X-API-Key", "${ENV:TETHER_TEST_HEADER_KEY}")
            .with("Accept", "application/json");
        let headers = provider.headers().unwrap();

        assert_eq!(headers.get("X-API-Key").unwrap(), "key-789");
        assert_eq!(headers.get("Accept").unwrap(), "application/json");

        std::env::remove_var("TETHER_TEST_HEADER_KEY");
    }

    #[test]
    fn test_static_headers_missing_env() {
        let provider = StaticHeaders::default().with("X-API-Key", "${ENV:TETHER_TEST_DEFINITELY_UNSET}");
        assert_eq!(
            provider.headers().unwrap_err(),
            HeaderError::EnvVarNotFound("TETHER_TEST_DEFINITELY_UNSET".to_string())
        );
    }

    #[test]
    fn test_bearer_token() {
        let headers = BearerToken::new("abc").headers().unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer abc");

        assert!(matches!(
            BearerToken::new("  ").headers(),
            Err(HeaderError::MissingCredential(_))
        ));
        assert!(matches!(
            BearerToken::from_env("TETHER_TEST_TOKEN_UNSET").headers(),
            Err(HeaderError::EnvVarNotFound(_))
        ));
    }
}
