use std::time::Duration;

use opencode_api::retry::*;
use opencode_api::ApiError;
use reqwest::{Method, StatusCode};

#[test]
fn retry_http_status_is_retryable() {
    assert!(is_retryable_http_error(408, ""));
    assert!(is_retryable_http_error(429, ""));
    assert!(is_retryable_http_error(500, ""));
    assert!(is_retryable_http_error(503, ""));
    assert!(!is_retryable_http_error(404, "session not found"));
}

#[test]
fn retry_http_error_pattern_is_retryable() {
    assert!(is_retryable_http_error(400, "Rate limit exceeded"));
    assert!(is_retryable_http_error(400, "upstream connect error"));
    assert!(is_retryable_http_error(400, "request timed out"));
}

#[test]
fn backoff_delay_is_exponential_and_capped() {
    let base = Duration::from_millis(BASE_DELAY_MS);
    let max = Duration::from_millis(MAX_DELAY_MS);
    assert_eq!(backoff_delay(0, base, max).as_millis(), 1000);
    assert_eq!(backoff_delay(1, base, max).as_millis(), 2000);
    assert_eq!(backoff_delay(3, base, max).as_millis(), 8000);
    assert_eq!(backoff_delay(5, base, max), max);
    assert_eq!(backoff_delay(u32::MAX, base, max), max);
}

#[test]
fn backoff_delay_respects_custom_bounds() {
    let base = Duration::from_millis(10);
    let max = Duration::from_millis(40);
    assert_eq!(backoff_delay(1, base, max), Duration::from_millis(20));
    assert_eq!(backoff_delay(3, base, max), max);
    assert_eq!(backoff_delay(30, Duration::MAX, max), max);
}

#[test]
fn only_idempotent_reads_retry_http_failures() {
    let unavailable = ApiError::Http {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "overloaded".to_owned(),
    };
    assert!(unavailable.is_retryable(&Method::GET));
    assert!(!unavailable.is_retryable(&Method::POST));

    let missing = ApiError::Http {
        status: StatusCode::NOT_FOUND,
        message: "not found".to_owned(),
    };
    assert!(!missing.is_retryable(&Method::GET));

    assert!(ApiError::Network("connection reset".to_owned()).is_retryable(&Method::POST));
    assert!(ApiError::StreamClosed.is_retryable(&Method::GET));
    assert!(!ApiError::Cancelled.is_retryable(&Method::GET));
    assert!(!ApiError::decode("bad").is_retryable(&Method::GET));
}
