//! Retry and backoff policy for the redirect probe.
//!
//! Only throttling is retried. Any other failure status leaves the row
//! unresolved on the first attempt.

use std::time::Duration;

/// High-level classification of an HTTP failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server asked us to slow down (429).
    Throttled,
    /// Any other non-success status (not retried).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff: `base_delay * 2^(attempt-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of requests per URL (including the first).
    pub max_attempts: u32,
    /// Delay after the first throttled response.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based (1 = first request).
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Other => RetryDecision::NoRetry,
            ErrorKind::Throttled => {
                let exp = 1u32 << attempt.saturating_sub(1).min(16);
                RetryDecision::RetryAfter(self.base_delay.saturating_mul(exp))
            }
        }
    }
}

pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 => ErrorKind::Throttled,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(p: &RetryPolicy, attempt: u32) -> Duration {
        match p.decide(attempt, ErrorKind::Throttled) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry at attempt {attempt}"),
        }
    }

    #[test]
    fn backoff_starts_at_one_second_and_doubles() {
        let p = RetryPolicy::default();
        let delays: Vec<_> = (1..=4).map(|a| delay(&p, a)).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 8].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn stops_after_five_requests() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(5, ErrorKind::Throttled), RetryDecision::NoRetry);
    }

    #[test]
    fn only_429_is_throttling() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Other);
        assert_eq!(classify_http_status(404), ErrorKind::Other);
    }

    #[test]
    fn other_failures_are_not_retried() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }
}
