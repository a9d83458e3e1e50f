//! Advisory request deduplication
//!
//! Records when each resolved request last completed and answers whether a
//! new dispatch of the same request falls outside the endpoint's window.
//! Records are grouped by endpoint so one endpoint can be invalidated without
//! touching the others. Entries never expire on their own.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::http::endpoint::{Endpoint, EndpointId};
use crate::http::url::ResolvedKey;

type Records = HashMap<EndpointId, HashMap<String, Instant>>;

/// Last-completion cache keyed by endpoint, then resolved URL
#[derive(Debug, Default)]
pub struct RequestLimiter {
    records: Mutex<Records>,
}

impl RequestLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when no completion is recorded for the key, or the last one is
    /// more than `endpoint.window()` away from `now`
    pub fn should_dispatch(&self, endpoint: &Endpoint, url: &str, now: Instant) -> bool {
        let records = self.records();
        let last = records
            .get(endpoint.id())
            .and_then(|urls| urls.get(url))
            .copied();

        match last {
            None => true,
            Some(last) => distance(now, last) > endpoint.window(),
        }
    }

    /// Upsert the completion time for a resolved request
    pub fn record_completion(&self, endpoint: &EndpointId, url: &str, now: Instant) {
        self.records()
            .entry(endpoint.clone())
            .or_default()
            .insert(url.to_string(), now);
    }

    pub fn should_dispatch_key(&self, endpoint: &Endpoint, key: &ResolvedKey, now: Instant) -> bool {
        self.should_dispatch(endpoint, &key.url, now)
    }

    pub fn record_key(&self, key: &ResolvedKey, now: Instant) {
        self.record_completion(&key.endpoint, &key.url, now);
    }

    /// Forget every record for one endpoint
    pub fn invalidate(&self, endpoint: &EndpointId) {
        if let Some(urls) = self.records().remove(endpoint) {
            tracing::debug!(endpoint = %endpoint, entries = urls.len(), "Invalidated dedup records");
        }
    }

    pub fn invalidate_all(&self) {
        self.records().clear();
    }

    /// Number of recorded resolved requests across all endpoints
    pub fn len(&self) -> usize {
        self.records().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn distance(a: Instant, b: Instant) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
