//! URL resolution for outgoing requests
//!
//! Query items are appended to the endpoint's base URL with a stricter
//! percent-encoding than the URL query default: RFC 3986 general delimiters
//! `:#[]@` and sub-delimiters `!$&'()*+,;=` are always escaped. `/` and `?`
//! stay literal (RFC 3986 section 3.4).

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::http::endpoint::{Endpoint, EndpointId};
use crate::http::outcome::ClientError;

/// A single query item; items without a value are skipped on resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    pub name: String,
    pub value: Option<String>,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// The unit of deduplication: endpoint identity plus the fully resolved URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedKey {
    pub endpoint: EndpointId,
    pub url: String,
}

/// Bytes escaped in query names and values: everything except the RFC 3986
/// unreserved set plus `/` and `?`
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'?');

/// Percent-encode a string for use as a query name or value
pub fn encode_rfc3986(input: &str) -> String {
    utf8_percent_encode(input, QUERY_ESCAPE).to_string()
}

/// Resolve the final request URL for an endpoint and a set of query items.
///
/// With no query items the base URL is used unchanged (after validation).
/// Otherwise the base URL's query is replaced by the encoded items, in order.
pub fn resolve(endpoint: &Endpoint, query: &[QueryItem]) -> Result<Url, ClientError> {
    let base = endpoint.base_url().trim();
    if base.is_empty() {
        return Err(ClientError::InvalidUrl);
    }

    let mut url = Url::parse(base).map_err(|e| {
        tracing::debug!(endpoint = %endpoint.id(), error = %e, "Rejected endpoint base URL");
        ClientError::InvalidUrl
    })?;

    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl);
    }

    if query.is_empty() {
        return Ok(url);
    }

    let encoded: Vec<String> = query
        .iter()
        .filter_map(|item| {
            item.value
                .as_ref()
                .map(|value| format!("{}={}", encode_rfc3986(&item.name), encode_rfc3986(value)))
        })
        .collect();

    url.set_query(Some(&encoded.join("&")));
    Ok(url)
}

/// Resolve and return the deduplication key alongside the URL
pub fn resolve_key(endpoint: &Endpoint, query: &[QueryItem]) -> Result<(Url, ResolvedKey), ClientError> {
    let url = resolve(endpoint, query)?;
    let key = ResolvedKey {
        endpoint: endpoint.id().clone(),
        url: url.as_str().to_string(),
    };
    Ok((url, key))
}
