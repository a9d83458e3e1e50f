//! Tether Core - Resilient HTTP request pipeline
//!
//! Issues requests against named endpoints, classifies every outcome into a
//! typed taxonomy, retries transport failures with a connectivity-aware
//! backoff, and flags requests that repeat a recent completion.
//!
//! # Main Components
//!
//! - **Outcome Classification**: status codes and transport failures become [`http::Outcome`]s
//! - **Retry Coordination**: bounded attempts with backoff, woken early when connectivity returns
//! - **Request Deduplication**: advisory per-endpoint windows over resolved URLs
//! - **Event Channels**: broadcast notifications for terminal failures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_core::{ClientConfig, Endpoint, PipelineBuilder, Request};
//!
//! async fn example() -> tether_core::Result<()> {
//!     let pipeline = PipelineBuilder::from_config(&ClientConfig::default())?.build();
//!     let users = Arc::new(Endpoint::new("users", "https://api.example.com/users"));
//!
//!     let response = pipeline.send(Request::get(users).query("page", "2")).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::{BackoffConfig, ClientConfig, EventsConfig, RetryConfig, TransportConfig};
pub use error::{Error, Result};
pub use http::{
    ClientError, Connectivity, ConnectivityMonitor, ConnectivitySignal, Endpoint, EndpointId, Method,
    Pipeline, PipelineBuilder, Request, RequestHandle, Response,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
