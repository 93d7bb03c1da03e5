use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Base delay before the first caller-side retry.
pub const BASE_DELAY_MS: u64 = 1000;
/// Upper bound for a single backoff delay.
pub const MAX_DELAY_MS: u64 = 30_000;

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?(refused|reset)|timed?.?out")
            .expect("retry regex must compile")
    })
}

/// Status/body classification for transient server failures.
///
/// Nothing in this crate retries on its own; callers consult this when deciding.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
        || transient_error_regex().is_match(error_text)
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(30));
    base.checked_mul(factor).unwrap_or(max).min(max)
}

