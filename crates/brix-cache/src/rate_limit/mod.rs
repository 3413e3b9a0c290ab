//! Distributed sliding-window rate limiting.

mod limiter;
mod result;

pub use limiter::RateLimiter;
pub use result::{
    HEADER_LIMIT, HEADER_RATELIMIT_RETRY_AFTER, HEADER_REMAINING, HEADER_RESET,
    HEADER_RETRY_AFTER, RateLimitOptions, RateLimitResult,
};
