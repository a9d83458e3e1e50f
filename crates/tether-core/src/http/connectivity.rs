//! Connectivity signal
//!
//! A tri-state reachability feed. The owner holds a [`ConnectivityMonitor`]
//! and pushes state changes; any number of [`ConnectivitySignal`]s observe it.
//! Nothing here is global: the monitor is created by the embedding
//! application and handed to the pipeline at construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Network reachability as last reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    NoConnection,
    #[default]
    Unknown,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Connected => f.write_str("connected"),
            Connectivity::NoConnection => f.write_str("no connection"),
            Connectivity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Owner side of the connectivity feed
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state; subscribers are only woken on an actual change
    pub fn set(&self, state: Connectivity) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            tracing::debug!(state = %state, "Connectivity changed");
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ConnectivitySignal {
        ConnectivitySignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Connectivity::Unknown)
    }
}

/// Read-only subscriber side of the connectivity feed
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    rx: watch::Receiver<Connectivity>,
}

impl ConnectivitySignal {
    /// A signal frozen at one state that never reports a transition
    pub fn fixed(state: Connectivity) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    pub fn current(&self) -> Connectivity {
        *self.rx.borrow()
    }

    /// Resolve on the next transition into `Connected`.
    ///
    /// Edge-triggered: being connected already does not resolve this. If the
    /// monitor is dropped the future never resolves.
    pub async fn became_reachable(&self) {
        let mut rx = self.rx.clone();
        rx.mark_unchanged();
        loop {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            if *rx.borrow_and_update() == Connectivity::Connected {
                return;
            }
        }
    }
}
