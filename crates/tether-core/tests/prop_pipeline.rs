//! Property-based tests for classification, retry and deduplication
//!
//! These tests verify invariants that should hold for all inputs.

use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;
use tether_core::http::{
    should_retry, BackoffPolicy, ClientError, Endpoint, Outcome, OutcomeClassifier, RequestLimiter,
    RetryDecision, RetryPolicy, StatusCodeSets, TransportError, TransportErrorKind,
};
use tokio::time::Instant;

// Strategy functions for property testing

fn code_set_strategy() -> impl Strategy<Value = BTreeSet<u16>> {
    proptest::collection::btree_set(100u16..=599, 0..8)
}

fn status_sets_strategy() -> impl Strategy<Value = StatusCodeSets> {
    (code_set_strategy(), code_set_strategy(), code_set_strategy()).prop_map(
        |(bad_request, authorization_failed, server_down)| StatusCodeSets {
            bad_request,
            authorization_failed,
            server_down,
        },
    )
}

fn transport_kind_strategy() -> impl Strategy<Value = TransportErrorKind> {
    prop_oneof![
        Just(TransportErrorKind::Timeout),
        Just(TransportErrorKind::Dns),
        Just(TransportErrorKind::Connect),
        Just(TransportErrorKind::ConnectionReset),
        Just(TransportErrorKind::Body),
        Just(TransportErrorKind::Other),
    ]
}

proptest! {
    /// Property: a completion suppresses dispatch for exactly the window
    #[test]
    fn prop_dedup_window(window_ms in 0u64..60_000, offset_ms in 0u64..120_000) {
        let limiter = RequestLimiter::new();
        let endpoint = Endpoint::new("items", "https://api.example.com/items")
            .with_window(Duration::from_millis(window_ms));
        let url = "https://api.example.com/items?id=1";
        let t0 = Instant::now();

        limiter.record_completion(endpoint.id(), url, t0);
        let allowed = limiter.should_dispatch(&endpoint, url, t0 + Duration::from_millis(offset_ms));

        prop_assert_eq!(allowed, offset_ms > window_ms);
    }

    /// Property: overlapping sets resolve in the fixed precedence order
    #[test]
    fn prop_classifier_precedence(codes in status_sets_strategy(), status in 100u16..=599) {
        let classifier = OutcomeClassifier::new(codes.clone());
        let outcome = classifier.classify_status(status, Vec::new());

        let expected = if status == 200 {
            "success"
        } else if status == 302 {
            "redirect"
        } else if codes.bad_request.contains(&status) {
            "bad_request"
        } else if codes.authorization_failed.contains(&status) {
            "authorization_failed"
        } else if codes.server_down.contains(&status) {
            "server_down"
        } else {
            "generic"
        };

        let actual = match outcome {
            Outcome::Success(_) => "success",
            Outcome::Redirect(_) => "redirect",
            Outcome::BadRequest { .. } => "bad_request",
            Outcome::AuthorizationFailed { .. } => "authorization_failed",
            Outcome::ServerDown { .. } => "server_down",
            Outcome::GenericApiError { .. } => "generic",
            other => panic!("unexpected outcome {other:?}"),
        };
        prop_assert_eq!(actual, expected);
    }

    /// Property: status-derived failures are never retried
    #[test]
    fn prop_status_failures_not_retried(status in 100u16..=599, max_attempts in 1u32..10, attempt in 1u32..10) {
        let classifier = OutcomeClassifier::default();
        if let Err(error) = classifier.classify_status(status, Vec::new()).into_result() {
            prop_assert!(!should_retry(&error));
            prop_assert_eq!(RetryPolicy::new(max_attempts).decide(attempt, &error), RetryDecision::NoRetry);
        }
    }

    /// Property: transport failures retry while attempts remain
    #[test]
    fn prop_transport_failures_retry_within_budget(
        kind in transport_kind_strategy(),
        max_attempts in 1u32..10,
        attempt in 1u32..12,
    ) {
        let error = ClientError::Transport(TransportError::new(kind, "scripted"));
        prop_assert!(should_retry(&error));

        let decision = RetryPolicy::new(max_attempts).decide(attempt, &error);
        prop_assert_eq!(matches!(decision, RetryDecision::Retry { .. }), attempt < max_attempts);
    }

    /// Property: the delay before attempt n is min(max, initial * multiplier^(n-2))
    #[test]
    fn prop_exponential_delay(initial_ms in 1u64..10_000, multiplier in 1u32..5, max_ms in 10_000u64..200_000, n in 2u32..20) {
        let backoff = BackoffPolicy::Exponential {
            initial: Duration::from_millis(initial_ms),
            multiplier: multiplier as f64,
            max: Duration::from_millis(max_ms),
        };

        let expected_ms = ((initial_ms as f64) * (multiplier as f64).powi(n as i32 - 2)).min(max_ms as f64);
        let actual_ms = backoff.delay(n - 1).as_secs_f64() * 1000.0;

        prop_assert!((actual_ms - expected_ms).abs() < 1.0, "expected {expected_ms}, got {actual_ms}");
        prop_assert!(backoff.delay(n - 1) <= Duration::from_millis(max_ms));
    }
}
