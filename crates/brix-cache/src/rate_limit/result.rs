use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";
pub const HEADER_RATELIMIT_RETRY_AFTER: &str = "X-RateLimit-Retry-After";

/// Limits for one rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
    /// Admitted requests per window.
    pub max_requests: u32,
    /// Key segment separating independent limits, e.g. `"login"`.
    pub key_prefix: String,
}

impl RateLimitOptions {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            key_prefix: RateLimitConfig::default().key_prefix,
        }
    }

    pub fn with_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitOptions {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            window_ms: config.window_ms,
            max_requests: config.max_requests,
            key_prefix: config.key_prefix.clone(),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window is considered reset.
    pub reset_time: i64,
    /// Seconds to wait before retrying; only set when rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RateLimitResult {
    /// Builds the result for `count` requests observed in the window at `now_ms`.
    pub(crate) fn evaluate(options: &RateLimitOptions, now_ms: i64, count: u64, admitted: bool) -> Self {
        let limit = options.max_requests;
        let remaining = u64::from(limit).saturating_sub(count) as u32;
        let reset_time = now_ms.saturating_add(i64::try_from(options.window_ms).unwrap_or(i64::MAX));

        if admitted {
            return Self {
                success: true,
                limit,
                remaining,
                reset_time,
                retry_after: None,
                message: None,
            };
        }

        let retry_after = retry_after_secs(reset_time - now_ms);
        Self {
            success: false,
            limit,
            remaining,
            reset_time,
            retry_after: Some(retry_after),
            message: Some(format!(
                "Rate limit exceeded. Try again in {retry_after} seconds."
            )),
        }
    }

    /// Result used when the store cannot be consulted: the request is allowed.
    pub(crate) fn fail_open(options: &RateLimitOptions, now_ms: i64) -> Self {
        Self {
            success: true,
            limit: options.max_requests,
            remaining: options.max_requests,
            reset_time: now_ms.saturating_add(i64::try_from(options.window_ms).unwrap_or(i64::MAX)),
            retry_after: None,
            message: None,
        }
    }

    /// Response headers describing this result.
    ///
    /// `Retry-After` and `X-RateLimit-Retry-After` are only present on a
    /// rejection. `X-RateLimit-Reset` is in epoch seconds, rounded up.
    pub fn headers(&self) -> BTreeMap<&'static str, String> {
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_LIMIT, self.limit.to_string());
        headers.insert(HEADER_REMAINING, self.remaining.to_string());
        headers.insert(HEADER_RESET, ceil_div(self.reset_time, 1000).to_string());

        if !self.success {
            let retry_after = self.retry_after.unwrap_or(1).to_string();
            headers.insert(HEADER_RETRY_AFTER, retry_after.clone());
            headers.insert(HEADER_RATELIMIT_RETRY_AFTER, retry_after);
        }
        headers
    }
}

fn retry_after_secs(wait_ms: i64) -> u64 {
    ceil_div(wait_ms, 1000).max(1) as u64
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value.div_euclid(divisor);
    if value.rem_euclid(divisor) == 0 {
        quotient
    } else {
        quotient + 1
    }
}
