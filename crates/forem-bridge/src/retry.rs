// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff + jitter.
//
// Classifies errors into Transient (auto-retry) and Permanent (give up). Only
// transient errors trigger automatic retries. Device registration retries
// without a limit until the server acknowledges it.

use std::time::Duration;

use forem_core::config::BridgeConfig;
use forem_core::error::BridgeError;
use forem_core::types::ErrorClass;
use rand::Rng;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts; `None` retries until success.
    pub max_retries: Option<u32>,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl RetryConfig {
    /// Backoff for device registration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_millis(config.registration_base_delay_ms),
            max_delay: Duration::from_millis(config.registration_max_delay_ms),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry, the error is permanent.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `BridgeError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &BridgeError) -> ErrorClass {
    match err {
        // Transient: network, stale CSRF token, page still loading
        BridgeError::Registration(detail) => classify_registration_detail(detail),
        BridgeError::Upload(_) => ErrorClass::Transient,
        BridgeError::MissingSession => ErrorClass::Transient,
        BridgeError::ScriptEvaluation(_) => ErrorClass::Transient,
        BridgeError::SessionFetch(_) => ErrorClass::Transient,
        BridgeError::MetadataUnavailable(_) => ErrorClass::Transient,
        BridgeError::Artwork(_) => ErrorClass::Transient,
        BridgeError::StreamLoad(_) => ErrorClass::Transient,

        // Permanent: bad data, platform missing
        BridgeError::Decode(_) => ErrorClass::Permanent,
        BridgeError::ImageError(_) => ErrorClass::Permanent,
        BridgeError::Serialization(_) => ErrorClass::Permanent,
        BridgeError::InvalidUrl(_) => ErrorClass::Permanent,
        BridgeError::PlatformUnavailable => ErrorClass::Permanent,
    }
}

/// Classify a registration failure detail string.
fn classify_registration_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();

    // The token or device is rejected outright
    if lower.contains("invalid token") || lower.contains("unsupported platform") {
        return ErrorClass::Permanent;
    }

    // Everything else, including 401/422 from a stale CSRF token, is worth
    // another attempt with a fresh token
    ErrorClass::Transient
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &BridgeError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!(error = %err, "permanent error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::Transient => match config.max_retries {
            Some(max) if attempt >= max => {
                warn!(attempt, max, "retry limit exhausted");
                RetryDecision::Exhausted
            }
            _ => {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        },
    }
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay)
/// jitter is a random value in [0, base) to prevent thundering herd.
pub fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));

    let jitter_ms = if base_ms > 0 {
        rand::thread_rng().gen_range(0..base_ms)
    } else {
        0
    };
    let total_ms = exp_ms.saturating_add(jitter_ms);
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}
