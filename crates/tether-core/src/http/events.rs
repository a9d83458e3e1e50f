//! Pipeline event channels
//!
//! Four multi-subscriber broadcast channels. Late subscribers only see
//! events sent after they subscribed; a channel without subscribers drops
//! its events.

use tokio::sync::broadcast;

use crate::http::endpoint::EndpointId;
use crate::http::outcome::ClientError;
use crate::http::predicates::ConnectionError;

/// Default buffer size of each channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A terminal failure published on the generic error channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub endpoint: EndpointId,
    pub error: ClientError,
}

/// Sender side of all pipeline channels
#[derive(Debug, Clone)]
pub struct PipelineEvents {
    connection: broadcast::Sender<ConnectionError>,
    errors: broadcast::Sender<ErrorEvent>,
    timeouts: broadcast::Sender<EndpointId>,
    auth_failures: broadcast::Sender<ClientError>,
}

impl PipelineEvents {
    /// `capacity` must be non-zero
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            connection: broadcast::channel(capacity).0,
            errors: broadcast::channel(capacity).0,
            timeouts: broadcast::channel(capacity).0,
            auth_failures: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_connection_errors(&self) -> broadcast::Receiver<ConnectionError> {
        self.connection.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.errors.subscribe()
    }

    pub fn subscribe_timeouts(&self) -> broadcast::Receiver<EndpointId> {
        self.timeouts.subscribe()
    }

    pub fn subscribe_auth_failures(&self) -> broadcast::Receiver<ClientError> {
        self.auth_failures.subscribe()
    }

    // Send errors only mean nobody is listening.

    pub(crate) fn connection_error(&self, event: ConnectionError) {
        let _ = self.connection.send(event);
    }

    pub(crate) fn error(&self, event: ErrorEvent) {
        let _ = self.errors.send(event);
    }

    pub(crate) fn timeout(&self, endpoint: EndpointId) {
        let _ = self.timeouts.send(endpoint);
    }

    pub(crate) fn auth_failure(&self, error: ClientError) {
        let _ = self.auth_failures.send(error);
    }
}

impl Default for PipelineEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_to_all_subscribers() {
        let events = PipelineEvents::default();
        let mut first = events.subscribe_connection_errors();
        let mut second = events.subscribe_connection_errors();

        events.connection_error(ConnectionError::InternetDown);

        assert_eq!(first.recv().await.unwrap(), ConnectionError::InternetDown);
        assert_eq!(second.recv().await.unwrap(), ConnectionError::InternetDown);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let events = PipelineEvents::default();
        events.timeout(EndpointId::new("early"));

        let mut late = events.subscribe_timeouts();
        assert!(matches!(late.try_recv(), Err(broadcast::error::TryRecvError::Empty)));

        events.timeout(EndpointId::new("late"));
        assert_eq!(late.recv().await.unwrap(), EndpointId::new("late"));
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let events = PipelineEvents::new(0);
        events.error(ErrorEvent {
            endpoint: EndpointId::new("x"),
            error: ClientError::ParseError,
        });
        events.auth_failure(ClientError::AuthorizationFailed { status: 401, body: vec![] });
    }
}
