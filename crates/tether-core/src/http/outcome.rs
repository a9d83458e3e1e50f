//! Outcome classification for completed transport attempts
//!
//! Every attempt produces exactly one [`Outcome`]. Status codes are routed
//! through three configurable, possibly overlapping sets in a fixed order:
//! 200, 302, bad request, authorization failed, server down, generic.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::transport::RawResponse;

/// Transport-level failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The attempt exceeded the endpoint timeout
    Timeout,
    /// Host name could not be resolved
    Dns,
    /// Connection could not be established
    Connect,
    /// Connection was reset or closed mid-exchange
    ConnectionReset,
    /// The attempt was cancelled before completion
    Cancelled,
    /// Response body could not be read
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failure to deliver a well-formed HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == TransportErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            connect_kind(&error)
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else if error.is_request() {
            TransportErrorKind::ConnectionReset
        } else {
            TransportErrorKind::Other
        };

        Self::new(kind, error.to_string())
    }
}

// reqwest folds resolver failures into connect errors; the source chain
// is the only place the distinction survives.
fn connect_kind(error: &reqwest::Error) -> TransportErrorKind {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("dns") || text.contains("failed to lookup address") {
            return TransportErrorKind::Dns;
        }
        source = cause.source();
    }
    TransportErrorKind::Connect
}

/// Terminal failure of one logical request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Response could not be parsed")]
    ParseError,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Bad request (status {status})")]
    BadRequest { status: u16, body: Vec<u8> },

    #[error("Authorization failed (status {status})")]
    AuthorizationFailed { status: u16, body: Vec<u8> },

    #[error("Server down (status {status})")]
    ServerDown { status: u16, body: Vec<u8> },

    #[error("API error (status {status})")]
    Api { status: u16, body: Vec<u8> },

    #[error("Header provider failed: {0}")]
    Headers(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    /// HTTP status code for status-derived failures
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadRequest { status, .. }
            | ClientError::AuthorizationFailed { status, .. }
            | ClientError::ServerDown { status, .. }
            | ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body for status-derived failures
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            ClientError::BadRequest { body, .. }
            | ClientError::AuthorizationFailed { body, .. }
            | ClientError::ServerDown { body, .. }
            | ClientError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            ClientError::Transport(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.transport().is_some_and(TransportError::is_timeout)
    }
}

/// The classified result of one transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Vec<u8>),
    /// 302 is passed through as a payload; redirects are not followed
    Redirect(Vec<u8>),
    BadRequest { status: u16, body: Vec<u8> },
    AuthorizationFailed { status: u16, body: Vec<u8> },
    ServerDown { status: u16, body: Vec<u8> },
    GenericApiError { status: u16, body: Vec<u8> },
    Transport(TransportError),
    ParseError,
    InvalidUrl,
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Outcome::Success(_) | Outcome::Redirect(_))
    }

    /// Split the outcome into a payload or a terminal failure
    pub fn into_result(self) -> Result<Vec<u8>, ClientError> {
        match self {
            Outcome::Success(body) | Outcome::Redirect(body) => Ok(body),
            Outcome::BadRequest { status, body } => Err(ClientError::BadRequest { status, body }),
            Outcome::AuthorizationFailed { status, body } => {
                Err(ClientError::AuthorizationFailed { status, body })
            }
            Outcome::ServerDown { status, body } => Err(ClientError::ServerDown { status, body }),
            Outcome::GenericApiError { status, body } => Err(ClientError::Api { status, body }),
            Outcome::Transport(error) => Err(ClientError::Transport(error)),
            Outcome::ParseError => Err(ClientError::ParseError),
            Outcome::InvalidUrl => Err(ClientError::InvalidUrl),
        }
    }
}

/// Status code routing sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCodeSets {
    pub bad_request: BTreeSet<u16>,
    pub authorization_failed: BTreeSet<u16>,
    pub server_down: BTreeSet<u16>,
}

impl Default for StatusCodeSets {
    fn default() -> Self {
        Self {
            bad_request: BTreeSet::from([400, 500]),
            authorization_failed: BTreeSet::from([401]),
            server_down: BTreeSet::from([502]),
        }
    }
}

/// Maps completed attempts onto [`Outcome`]s
#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    codes: StatusCodeSets,
}

impl OutcomeClassifier {
    pub fn new(codes: StatusCodeSets) -> Self {
        Self { codes }
    }

    pub fn codes(&self) -> &StatusCodeSets {
        &self.codes
    }

    /// Classify a transport result
    pub fn classify(&self, result: Result<RawResponse, TransportError>) -> Outcome {
        match result {
            Ok(response) => self.classify_status(response.status, response.body),
            Err(error) => Outcome::Transport(error),
        }
    }

    /// Classify a status code and body
    pub fn classify_status(&self, status: u16, body: Vec<u8>) -> Outcome {
        if !(100..=599).contains(&status) {
            return Outcome::ParseError;
        }

        match status {
            200 => Outcome::Success(body),
            302 => Outcome::Redirect(body),
            s if self.codes.bad_request.contains(&s) => Outcome::BadRequest { status, body },
            s if self.codes.authorization_failed.contains(&s) => {
                Outcome::AuthorizationFailed { status, body }
            }
            s if self.codes.server_down.contains(&s) => Outcome::ServerDown { status, body },
            _ => Outcome::GenericApiError { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing() {
        let classifier = OutcomeClassifier::default();
        assert_eq!(classifier.classify_status(200, b"ok".to_vec()), Outcome::Success(b"ok".to_vec()));
        assert_eq!(classifier.classify_status(302, b"moved".to_vec()), Outcome::Redirect(b"moved".to_vec()));
        assert!(matches!(classifier.classify_status(400, vec![]), Outcome::BadRequest { status: 400, .. }));
        assert!(matches!(classifier.classify_status(500, vec![]), Outcome::BadRequest { status: 500, .. }));
        assert!(matches!(classifier.classify_status(401, vec![]), Outcome::AuthorizationFailed { status: 401, .. }));
        assert!(matches!(classifier.classify_status(502, vec![]), Outcome::ServerDown { status: 502, .. }));
        assert!(matches!(classifier.classify_status(404, vec![]), Outcome::GenericApiError { status: 404, .. }));
        assert!(matches!(classifier.classify_status(201, vec![]), Outcome::GenericApiError { status: 201, .. }));
    }

    #[test]
    fn test_overlapping_sets_follow_precedence() {
        let codes = StatusCodeSets {
            bad_request: BTreeSet::from([400]),
            authorization_failed: BTreeSet::from([400, 403, 502]),
            server_down: BTreeSet::from([403, 503]),
        };
        let classifier = OutcomeClassifier::new(codes);
        assert!(matches!(classifier.classify_status(400, vec![]), Outcome::BadRequest { .. }));
        assert!(matches!(classifier.classify_status(403, vec![]), Outcome::AuthorizationFailed { .. }));
        assert!(matches!(classifier.classify_status(502, vec![]), Outcome::AuthorizationFailed { .. }));
        assert!(matches!(classifier.classify_status(503, vec![]), Outcome::ServerDown { .. }));
    }

    #[test]
    fn test_fixed_codes_win_over_sets() {
        let codes = StatusCodeSets {
            bad_request: BTreeSet::from([200, 302]),
            ..Default::default()
        };
        let classifier = OutcomeClassifier::new(codes);
        assert!(matches!(classifier.classify_status(200, vec![]), Outcome::Success(_)));
        assert!(matches!(classifier.classify_status(302, vec![]), Outcome::Redirect(_)));
    }

    #[test]
    fn test_out_of_range_status_is_parse_error() {
        let classifier = OutcomeClassifier::default();
        assert_eq!(classifier.classify_status(0, vec![]), Outcome::ParseError);
        assert_eq!(classifier.classify_status(700, vec![]), Outcome::ParseError);
    }

    #[test]
    fn test_transport_failure() {
        let classifier = OutcomeClassifier::default();
        let outcome = classifier.classify(Err(TransportError::timeout("deadline elapsed")));
        assert!(outcome.is_error());
        let err = outcome.into_result().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_into_result_carries_body_and_status() {
        let err = Outcome::ServerDown { status: 502, body: b"down".to_vec() }
            .into_result()
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.body(), Some(&b"down"[..]));
        assert_eq!(Outcome::Redirect(b"x".to_vec()).into_result(), Ok(b"x".to_vec()));
    }
}
