//! Client configuration
//!
//! Everything here deserializes with serde and every field has a default, so
//! an empty document yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::events::DEFAULT_EVENT_CAPACITY;
use crate::http::outcome::StatusCodeSets;
use crate::http::retry::{BackoffPolicy, RetryMode, RetryPolicy};
use crate::{Error, Result};

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub status_codes: StatusCodeSets,
    pub retry: RetryConfig,
    pub events: EventsConfig,
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        if self.events.capacity == 0 {
            return Err(Error::configuration("events.capacity must be greater than zero"));
        }
        if self.transport.resource_timeout_secs == 0 {
            return Err(Error::configuration(
                "transport.resource_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub mode: RetryMode,
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            mode: RetryMode::OnConnect,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        self.backoff.validate()
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff.to_policy(),
            mode: self.mode,
        }
    }
}

/// Serializable backoff schedule; closures are only available in code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    Immediate,
    Constant {
        delay_secs: f64,
    },
    Exponential {
        #[serde(default = "default_initial_secs")]
        initial_secs: f64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default = "default_max_secs")]
        max_secs: f64,
    },
}

fn default_initial_secs() -> f64 {
    5.0
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_secs() -> f64 {
    90.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential {
            initial_secs: default_initial_secs(),
            multiplier: default_multiplier(),
            max_secs: default_max_secs(),
        }
    }
}

fn check_secs(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::configuration(format!(
            "{} must be a finite, non-negative number of seconds",
            name
        )));
    }
    Ok(())
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            BackoffConfig::Immediate => Ok(()),
            BackoffConfig::Constant { delay_secs } => check_secs("retry.backoff.delay_secs", *delay_secs),
            BackoffConfig::Exponential {
                initial_secs,
                multiplier,
                max_secs,
            } => {
                check_secs("retry.backoff.initial_secs", *initial_secs)?;
                check_secs("retry.backoff.max_secs", *max_secs)?;
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    return Err(Error::configuration("retry.backoff.multiplier must be at least 1"));
                }
                if max_secs < initial_secs {
                    return Err(Error::configuration(
                        "retry.backoff.max_secs must not be smaller than initial_secs",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Convert into a runtime policy. Call [`validate`](Self::validate) first;
    /// out-of-range values are clamped to zero.
    pub fn to_policy(&self) -> BackoffPolicy {
        let secs = |value: f64| Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO);
        match self {
            BackoffConfig::Immediate => BackoffPolicy::Immediate,
            BackoffConfig::Constant { delay_secs } => BackoffPolicy::Constant(secs(*delay_secs)),
            BackoffConfig::Exponential {
                initial_secs,
                multiplier,
                max_secs,
            } => BackoffPolicy::Exponential {
                initial: secs(*initial_secs),
                multiplier: *multiplier,
                max: secs(*max_secs),
            },
        }
    }
}

/// Event channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffered events per channel before slow subscribers start lagging
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Default transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub pool_max_idle_per_host: usize,
    /// Upper bound on a whole exchange, independent of endpoint timeouts
    pub resource_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 50,
            resource_timeout_secs: 50,
            user_agent: None,
        }
    }
}
