//! Shared test support utilities for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tether_core::http::{
    Connectivity, ConnectivitySignal, Endpoint, PipelineBuilder, RawResponse, RequestDescriptor,
    Transport, TransportError, TransportErrorKind,
};
use tokio::time::Instant;

/// One scripted transport reply, optionally delayed
pub struct Reply {
    pub result: Result<RawResponse, TransportError>,
    pub delay: Duration,
}

pub fn status(code: u16, body: &str) -> Reply {
    Reply {
        result: Ok(RawResponse::new(code, body)),
        delay: Duration::ZERO,
    }
}

pub fn failure(kind: TransportErrorKind) -> Reply {
    Reply {
        result: Err(TransportError::new(kind, format!("scripted {} failure", kind))),
        delay: Duration::ZERO,
    }
}

pub fn dns_failure() -> Reply {
    failure(TransportErrorKind::Dns)
}

pub fn delayed(mut reply: Reply, delay: Duration) -> Reply {
    reply.delay = delay;
    reply
}

/// In-memory transport replaying a fixed script; answers 200 once exhausted
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(Instant, RequestDescriptor)>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.url.to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push((Instant::now(), request));
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(reply) => {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                reply.result
            }
            None => Ok(RawResponse::new(200, "")),
        }
    }
}

/// Endpoint with a 5 second dedup window
pub fn items_endpoint() -> Arc<Endpoint> {
    Arc::new(Endpoint::new("items", "https://api.example.com/items").with_window(Duration::from_secs(5)))
}

/// Builder over `transport` with connectivity fixed at `Connected`
pub fn connected_builder(transport: Arc<ScriptedTransport>) -> PipelineBuilder {
    PipelineBuilder::new(transport).connectivity(ConnectivitySignal::fixed(Connectivity::Connected))
}
