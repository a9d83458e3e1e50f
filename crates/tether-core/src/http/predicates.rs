//! Retry and fail predicates
//!
//! Two independent decisions over a terminal [`ClientError`]:
//! [`should_retry`] drives the bounded retry loop, [`should_fail`] decides
//! whether a process-wide connection-degraded notification fires.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::connectivity::Connectivity;
use crate::http::outcome::ClientError;

/// Payload of the connection-error channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionError {
    /// The server signalled it is unavailable
    ServerDown,
    /// The device has no network connection
    InternetDown,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ServerDown => f.write_str("server down"),
            ConnectionError::InternetDown => f.write_str("internet down"),
        }
    }
}

impl ConnectionError {
    /// Pick the payload from the sampled connectivity state
    pub fn for_connectivity(connectivity: Connectivity) -> Self {
        match connectivity {
            Connectivity::NoConnection => ConnectionError::InternetDown,
            Connectivity::Connected | Connectivity::Unknown => ConnectionError::ServerDown,
        }
    }
}

/// True only for transport-layer failures.
///
/// Status-derived failures are the server's answer and are never retried.
pub fn should_retry(error: &ClientError) -> bool {
    matches!(error, ClientError::Transport(_))
}

/// True when retrying is futile.
///
/// Any error fails while the device is offline. Otherwise only `ServerDown`
/// fails; transport failures are left to the retry loop and other errors
/// are surfaced without a connection notification. `Unknown` connectivity
/// is treated like `Connected`.
pub fn should_fail(error: &ClientError, connectivity: Connectivity) -> bool {
    if connectivity == Connectivity::NoConnection {
        return true;
    }

    match error {
        ClientError::Transport(_) => false,
        ClientError::ServerDown { .. } => true,
        _ => false,
    }
}
