//! Retry utilities for transient remote failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::InferenceError;
use rand::Rng;
use std::time::Duration;

/// Determine whether an item error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx),
/// connection failures. Non-retryable: auth failures, bad requests,
/// unreadable images, malformed response bodies.
pub fn is_retryable(error: &InferenceError) -> bool {
    match error {
        InferenceError::Timeout { .. } => true,
        InferenceError::RemoteRequest {
            status_code,
            message,
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            // Fallback for non-HTTP errors (e.g., connection refused, DNS failure)
            message.contains("timed out") || message.contains("connect")
        }
        InferenceError::ImageLoad { .. } | InferenceError::ResponseShape(_) => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// [`backoff_duration`] plus up to 10% random jitter.
pub fn jittered_backoff(attempt: u32, base_delay_ms: u64) -> Duration {
    let base = backoff_duration(attempt, base_delay_ms);
    let spread = (base.as_millis() as u64) / 10;
    if spread == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
