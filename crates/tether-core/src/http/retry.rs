//! Retry logic with exponential backoff for HTTP requests
//!
//! A logical request runs as a bounded loop of attempts. Between attempts the
//! coordinator waits for the backoff delay or, in [`RetryMode::OnConnect`],
//! for connectivity to come back, whichever happens first. Cancellation is
//! observed at every suspension point.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::http::connectivity::ConnectivitySignal;
use crate::http::outcome::ClientError;
use crate::http::predicates::should_retry;

/// Caller-supplied attempt number to delay mapping
pub type CustomBackoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Delay schedule between attempts
#[derive(Clone)]
pub enum BackoffPolicy {
    Immediate,
    Constant(Duration),
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
    Custom(CustomBackoff),
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            initial: Duration::from_secs(5),
            multiplier: 2.0,
            max: Duration::from_secs(90),
        }
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffPolicy::Immediate => f.write_str("Immediate"),
            BackoffPolicy::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            BackoffPolicy::Exponential { initial, multiplier, max } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("multiplier", multiplier)
                .field("max", max)
                .finish(),
            BackoffPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl BackoffPolicy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        BackoffPolicy::Custom(Arc::new(f))
    }

    /// Delay to wait after the given (1-based) attempt has failed
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Immediate => Duration::ZERO,
            BackoffPolicy::Constant(delay) => *delay,
            BackoffPolicy::Exponential { initial, multiplier, max } => {
                if attempt <= 1 {
                    return *initial;
                }
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let secs = (initial.as_secs_f64() * multiplier.powi(exponent)).min(max.as_secs_f64());
                Duration::try_from_secs_f64(secs).unwrap_or(*max)
            }
            BackoffPolicy::Custom(f) => f(attempt),
        }
    }
}

/// What ends a retry wait early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Timer races a connectivity-restored signal
    #[default]
    OnConnect,
    /// Timer only
    TimerOnly,
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of transport attempts, the first one included
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub mode: RetryMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: BackoffPolicy::default(),
            mode: RetryMode::OnConnect,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Decide what follows a failed attempt
    pub fn decide(&self, attempt: u32, error: &ClientError) -> RetryDecision {
        if should_retry(error) && attempt < self.max_attempts {
            RetryDecision::Retry {
                delay: self.backoff.delay(attempt),
            }
        } else {
            RetryDecision::NoRetry
        }
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Lifecycle of one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    WaitingToRetry { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    PermanentlyFailed { attempts: u32 },
    Cancelled,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::PermanentlyFailed { .. } | RetryState::Cancelled
        )
    }
}

/// Cooperative cancellation flag shared between a handle and its task
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Idempotent
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one logical request through its attempts
#[derive(Debug)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
    connectivity: ConnectivitySignal,
    cancel: CancelToken,
    state: watch::Sender<RetryState>,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy, connectivity: ConnectivitySignal, cancel: CancelToken) -> Self {
        let (state, _rx) = watch::channel(RetryState::Attempting { attempt: 1 });
        Self {
            policy,
            connectivity,
            cancel,
            state,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Observe state transitions
    pub fn state(&self) -> watch::Receiver<RetryState> {
        self.state.subscribe()
    }

    fn transition(&self, next: RetryState) {
        tracing::debug!(state = ?next, "Retry state transition");
        self.state.send_replace(next);
    }

    /// Run `attempt` until it succeeds, fails permanently, or is cancelled.
    ///
    /// `attempt` receives the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut current = 1;

        loop {
            if self.cancel.is_cancelled() {
                self.transition(RetryState::Cancelled);
                return Err(ClientError::Cancelled);
            }

            self.transition(RetryState::Attempting { attempt: current });

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.transition(RetryState::Cancelled);
                    return Err(ClientError::Cancelled);
                }
                result = attempt(current) => result,
            };

            let error = match result {
                Ok(value) => {
                    self.transition(RetryState::Succeeded { attempts: current });
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.policy.decide(current, &error) {
                RetryDecision::NoRetry => {
                    self.transition(RetryState::PermanentlyFailed { attempts: current });
                    return Err(error);
                }
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        attempt = current,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Request failed, retrying"
                    );
                    self.transition(RetryState::WaitingToRetry { attempt: current, delay });

                    if !self.wait(delay).await {
                        self.transition(RetryState::Cancelled);
                        return Err(ClientError::Cancelled);
                    }
                    current += 1;
                }
            }
        }
    }

    /// Returns false when cancelled during the wait
    async fn wait(&self, delay: Duration) -> bool {
        let reachable = async {
            match self.policy.mode {
                RetryMode::OnConnect => self.connectivity.became_reachable().await,
                RetryMode::TimerOnly => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
            _ = reachable => {
                tracing::debug!("Connectivity restored, retrying early");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::connectivity::{Connectivity, ConnectivityMonitor};
    use crate::http::outcome::{TransportError, TransportErrorKind};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn dns_error() -> ClientError {
        ClientError::Transport(TransportError::new(TransportErrorKind::Dns, "lookup failed"))
    }

    fn coordinator(policy: RetryPolicy) -> RetryCoordinator {
        RetryCoordinator::new(
            policy,
            ConnectivitySignal::fixed(Connectivity::Connected),
            CancelToken::new(),
        )
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.mode, RetryMode::OnConnect);
        assert_eq!(policy.backoff.delay(1), Duration::from_secs(5));
        assert_eq!(policy.backoff.delay(2), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = BackoffPolicy::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.delay(3), Duration::from_secs(20));
        assert_eq!(backoff.delay(5), Duration::from_secs(80));
        assert_eq!(backoff.delay(6), Duration::from_secs(90));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(90));
    }

    #[test]
    fn test_other_backoffs() {
        assert_eq!(BackoffPolicy::Immediate.delay(4), Duration::ZERO);
        assert_eq!(BackoffPolicy::Constant(Duration::from_secs(3)).delay(9), Duration::from_secs(3));
        let custom = BackoffPolicy::custom(|attempt| Duration::from_millis(attempt as u64 * 100));
        assert_eq!(custom.delay(3), Duration::from_millis(300));
        assert_eq!(format!("{custom:?}"), "Custom(..)");
    }

    #[test]
    fn test_decide_respects_budget_and_predicate() {
        let policy = RetryPolicy::new(3);
        assert_eq!(
            policy.decide(1, &dns_error()),
            RetryDecision::Retry { delay: Duration::from_secs(5) }
        );
        assert_eq!(
            policy.decide(2, &dns_error()),
            RetryDecision::Retry { delay: Duration::from_secs(10) }
        );
        assert_eq!(policy.decide(3, &dns_error()), RetryDecision::NoRetry);

        let status = ClientError::ServerDown { status: 502, body: vec![] };
        assert_eq!(policy.decide(1, &status), RetryDecision::NoRetry);
    }

    #[test]
    fn test_cancel_token_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retried_once_by_default() {
        let coordinator = coordinator(RetryPolicy::default());
        let calls = Mutex::new(Vec::new());

        let result: Result<(), _> = coordinator
            .run(|attempt| {
                calls.lock().unwrap().push((attempt, Instant::now()));
                async { Err(dns_error()) }
            })
            .await;

        assert_eq!(result, Err(dns_error()));
        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(5));
        assert_eq!(
            *coordinator.state().borrow(),
            RetryState::PermanentlyFailed { attempts: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_not_retried() {
        let coordinator = coordinator(RetryPolicy::new(5));
        let mut count = 0;

        let result: Result<(), _> = coordinator
            .run(|_| {
                count += 1;
                async { Err(ClientError::AuthorizationFailed { status: 401, body: vec![] }) }
            })
            .await;

        assert!(matches!(result, Err(ClientError::AuthorizationFailed { .. })));
        assert_eq!(count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_grow_between_attempts() {
        let coordinator = coordinator(RetryPolicy::new(4).with_mode(RetryMode::TimerOnly));
        let calls = Mutex::new(Vec::new());

        let result = coordinator
            .run(|attempt| {
                calls.lock().unwrap().push(Instant::now());
                async move {
                    if attempt < 4 {
                        Err(dns_error())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(4));
        let calls = calls.into_inner().unwrap();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![Duration::from_secs(5), Duration::from_secs(10), Duration::from_secs(20)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_restoration_wakes_wait() {
        let monitor = ConnectivityMonitor::new(Connectivity::NoConnection);
        let policy = RetryPolicy::default().with_backoff(BackoffPolicy::Constant(Duration::from_secs(60)));
        let coordinator = Arc::new(RetryCoordinator::new(policy, monitor.signal(), CancelToken::new()));
        let start = Instant::now();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|attempt| async move {
                        if attempt == 1 {
                            Err(dns_error())
                        } else {
                            Ok(Instant::now())
                        }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        monitor.set(Connectivity::Connected);

        let second_attempt = task.await.unwrap().unwrap();
        assert!(second_attempt - start < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_only_ignores_connectivity() {
        let monitor = ConnectivityMonitor::new(Connectivity::NoConnection);
        let policy = RetryPolicy::default()
            .with_backoff(BackoffPolicy::Constant(Duration::from_secs(60)))
            .with_mode(RetryMode::TimerOnly);
        let coordinator = Arc::new(RetryCoordinator::new(policy, monitor.signal(), CancelToken::new()));
        let start = Instant::now();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|attempt| async move {
                        if attempt == 1 {
                            Err(dns_error())
                        } else {
                            Ok(Instant::now())
                        }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        monitor.set(Connectivity::Connected);

        let second_attempt = task.await.unwrap().unwrap();
        assert_eq!(second_attempt - start, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_stops_attempts() {
        let cancel = CancelToken::new();
        let coordinator = Arc::new(RetryCoordinator::new(
            RetryPolicy::new(5),
            ConnectivitySignal::fixed(Connectivity::Connected),
            cancel.clone(),
        ));
        let calls = Arc::new(Mutex::new(0u32));

        let task = {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|_| {
                        *calls.lock().unwrap() += 1;
                        async { Err::<(), _>(dns_error()) }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), Err(ClientError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(*coordinator.state().borrow(), RetryState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let coordinator = RetryCoordinator::new(
            RetryPolicy::default(),
            ConnectivitySignal::fixed(Connectivity::Connected),
            cancel,
        );

        let result = coordinator.run(|_| async { Ok::<_, ClientError>(()) }).await;
        assert_eq!(result, Err(ClientError::Cancelled));
    }
}
