//! Executor-level retry behavior and the tuned backoff schedules.

use std::sync::Mutex;
use std::time::Duration;

use studykit_core::{Attempt, RequestExecutor, RetryConfig, RetryPolicy, TransportError};

fn status(code: u16) -> TransportError {
    TransportError::Status {
        code,
        body: String::new(),
    }
}

fn fast(config: RetryConfig) -> RetryConfig {
    RetryConfig {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        ..config
    }
}

#[test]
fn test_tuned_schedules_follow_doubling_with_cap() {
    let atomic = RetryConfig::atomic();
    assert_eq!(atomic.max_attempts, 3);
    let expected = [1_000u64, 2_000, 4_000];
    let mut attempt = Attempt::first();
    for delay_ms in expected {
        assert_eq!(atomic.delay_for(attempt), Duration::from_millis(delay_ms));
        attempt = attempt.next();
    }

    let streaming = RetryConfig::streaming();
    let expected = [1_500u64, 3_000, 6_000, 10_000, 10_000];
    let mut attempt = Attempt::first();
    for delay_ms in expected {
        assert_eq!(
            streaming.delay_for(attempt),
            Duration::from_millis(delay_ms)
        );
        attempt = attempt.next();
    }
}

#[tokio::test]
async fn test_attempts_are_threaded_in_order() {
    let executor = RequestExecutor::new(RetryPolicy::new(fast(RetryConfig::atomic())));
    let seen = Mutex::new(Vec::new());

    let result = executor
        .execute(|attempt| {
            seen.lock().unwrap().push(attempt.index());
            async move {
                if attempt.index() < 3 {
                    Err(TransportError::Network("connection reset".to_string()))
                } else {
                    Ok(attempt.index())
                }
            }
        })
        .await;

    assert_eq!(result.ok(), Some(3));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_mixed_transient_failures_recover() {
    let executor = RequestExecutor::new(RetryPolicy::new(fast(RetryConfig::atomic())));
    let calls = Mutex::new(0u32);

    let result = executor
        .execute(|_attempt| {
            let call = {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            async move {
                match call {
                    1 => Err(status(429)),
                    2 => Err(TransportError::Network("dns failure".to_string())),
                    _ => Ok("answer"),
                }
            }
        })
        .await;

    assert_eq!(result.ok(), Some("answer"));
    assert_eq!(*calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_client_error_short_circuits_without_delay() {
    let executor = RequestExecutor::new(RetryPolicy::new(RetryConfig::atomic()));
    let calls = Mutex::new(0u32);

    // Full-size delays: if this ever retried, the test would hang for
    // seconds instead of failing fast on the call count.
    let result: Result<(), _> = executor
        .execute(|_attempt| {
            *calls.lock().unwrap() += 1;
            async { Err(status(400)) }
        })
        .await;

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(result.err().and_then(|e| e.status_code()), Some(400));
}

#[tokio::test]
async fn test_exhaustion_reports_attempt_count_and_last_failure() {
    let executor = RequestExecutor::new(RetryPolicy::new(fast(RetryConfig::streaming())));

    let result: Result<(), _> = executor
        .execute(|attempt| async move {
            Err(TransportError::StreamRead(format!(
                "dropped on attempt {}",
                attempt.index()
            )))
        })
        .await;

    match result {
        Err(TransportError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(last.to_string().contains("attempt 3"));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_parse_failure_is_not_retried_atomically() {
    let executor = RequestExecutor::new(RetryPolicy::new(RetryConfig::atomic()));
    let calls = Mutex::new(0u32);

    let result: Result<(), _> = executor
        .execute(|_attempt| {
            *calls.lock().unwrap() += 1;
            async { Err(TransportError::PayloadParse("expected value".to_string())) }
        })
        .await;

    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(matches!(result, Err(TransportError::PayloadParse(_))));
}
