//! Sliding-window limiter over a shared sorted set.
//!
//! Each admitted or rejected `check()` adds one stamp scored by its arrival
//! time. Stamps at or before `now - window` are pruned in the same atomic
//! transaction, so the set cardinality is the request count of the window.

use std::collections::BTreeMap;

use brix_store::{DynClock, DynKvStore, ScoreBound, StoreError, StoreResult, Transaction};
use uuid::Uuid;

use super::result::{RateLimitOptions, RateLimitResult};
use crate::config::{BrixConfig, RateLimitConfig};
use crate::keys::Namespace;
use crate::metrics;

/// Prefixes owned by the cache keyspace.
const RESERVED_PREFIXES: [&str; 2] = ["cache", "tag"];

/// Distributed sliding-window rate limiter.
///
/// Store failures fail open: the request is allowed with a full quota and a
/// single warning is logged.
#[derive(Clone)]
pub struct RateLimiter {
    store: DynKvStore,
    clock: DynClock,
    ns: Namespace,
    defaults: RateLimitConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("namespace", &self.ns.name())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(store: DynKvStore, clock: DynClock, defaults: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            ns: Namespace::new("brix"),
            defaults,
        }
    }

    pub fn from_config(store: DynKvStore, clock: DynClock, config: &BrixConfig) -> Self {
        Self::new(store, clock, config.rate_limit.clone()).with_namespace(&config.namespace)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ns = Namespace::new(namespace);
        self
    }

    /// Options built from the configured defaults.
    pub fn default_options(&self) -> RateLimitOptions {
        RateLimitOptions::from(&self.defaults)
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub(crate) fn store(&self) -> &DynKvStore {
        &self.store
    }

    pub(crate) fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Records one request for `key` and decides whether it is admitted.
    ///
    /// The request is rejected once more than `max_requests` stamps lie
    /// inside the window. Rejected requests are recorded too.
    pub async fn check(&self, key: &str, options: &RateLimitOptions) -> RateLimitResult {
        let options = self.normalize(options);
        let now = self.clock.now_ms();

        match self.consume(key, &options, now).await {
            Ok(count) => {
                let admitted = count <= u64::from(options.max_requests);
                let result = RateLimitResult::evaluate(&options, now, count, admitted);
                if admitted {
                    metrics::record_rate_limit("allowed");
                } else {
                    tracing::debug!(
                        key = %key,
                        prefix = %options.key_prefix,
                        count,
                        limit = options.max_requests,
                        "rate limit exceeded"
                    );
                    metrics::record_rate_limit("rejected");
                }
                result
            }
            Err(e) => {
                self.report_failure("check", key, &e);
                metrics::record_rate_limit("fail_open");
                RateLimitResult::fail_open(&options, now)
            }
        }
    }

    /// Reports the current state for `key` without recording a request.
    ///
    /// `success` tells whether one more request would be admitted.
    pub async fn get(&self, key: &str, options: &RateLimitOptions) -> RateLimitResult {
        let options = self.normalize(options);
        let now = self.clock.now_ms();

        match self.peek(key, &options, now).await {
            Ok(count) => {
                let admitted = count < u64::from(options.max_requests);
                RateLimitResult::evaluate(&options, now, count, admitted)
            }
            Err(e) => {
                self.report_failure("get", key, &e);
                RateLimitResult::fail_open(&options, now)
            }
        }
    }

    /// Drops the window for `key`. Returns whether one existed.
    pub async fn reset(&self, key: &str, options: &RateLimitOptions) -> bool {
        let options = self.normalize(options);
        let window_key = self.ns.window_key(&options.key_prefix, key);
        match self.store.del(&[window_key]).await {
            Ok(removed) => {
                tracing::debug!(key = %key, prefix = %options.key_prefix, removed, "rate limit reset");
                removed > 0
            }
            Err(e) => {
                self.report_failure("reset", key, &e);
                false
            }
        }
    }

    /// Response headers for `result`.
    pub fn headers(&self, result: &RateLimitResult) -> BTreeMap<&'static str, String> {
        result.headers()
    }

    async fn consume(&self, key: &str, options: &RateLimitOptions, now: i64) -> StoreResult<u64> {
        let window_key = self.ns.window_key(&options.key_prefix, key);
        let member = format!("{now}-{}", Uuid::new_v4());

        let mut tx = Transaction::new();
        tx.zadd(&window_key, now, member)
            .zrem_range_by_score(&window_key, ScoreBound::NegInf, prune_bound(options, now))
            .zcard(&window_key)
            .pexpire(&window_key, window_expiry_ms(options.window_ms));
        let replies = self.store.exec(tx).await?;

        count_reply(replies.get(2), "ZCARD")
    }

    async fn peek(&self, key: &str, options: &RateLimitOptions, now: i64) -> StoreResult<u64> {
        let window_key = self.ns.window_key(&options.key_prefix, key);

        let mut tx = Transaction::new();
        tx.zrem_range_by_score(&window_key, ScoreBound::NegInf, prune_bound(options, now))
            .zcount(&window_key, prune_bound_exclusive(options, now), ScoreBound::Inclusive(now));
        let replies = self.store.exec(tx).await?;

        count_reply(replies.get(1), "ZCOUNT")
    }

    /// Replaces zero or reserved values with the configured defaults.
    fn normalize(&self, options: &RateLimitOptions) -> RateLimitOptions {
        let mut normalized = options.clone();
        if normalized.window_ms == 0 {
            tracing::warn!(default_window_ms = self.defaults.window_ms, "window_ms is 0, using default");
            normalized.window_ms = self.defaults.window_ms.max(1);
        }
        if normalized.max_requests == 0 {
            tracing::warn!(default_max_requests = self.defaults.max_requests, "max_requests is 0, using default");
            normalized.max_requests = self.defaults.max_requests.max(1);
        }
        if normalized.key_prefix.is_empty() || RESERVED_PREFIXES.contains(&normalized.key_prefix.as_str()) {
            tracing::warn!(
                prefix = %normalized.key_prefix,
                default_prefix = %self.defaults.key_prefix,
                "unusable key prefix, using default"
            );
            normalized.key_prefix = self.defaults.key_prefix.clone();
        }
        normalized
    }

    fn report_failure(&self, operation: &'static str, key: &str, error: &StoreError) {
        tracing::warn!(
            operation,
            key = %key,
            backend = self.store.backend_name(),
            error = %error,
            "rate limit store call failed, allowing request"
        );
        metrics::record_store_error(operation, error.category());
    }
}

/// Upper bound of the prune range: stamps at or before `now - window` leave.
fn prune_bound(options: &RateLimitOptions, now: i64) -> ScoreBound {
    ScoreBound::Inclusive(window_start(options, now))
}

fn prune_bound_exclusive(options: &RateLimitOptions, now: i64) -> ScoreBound {
    ScoreBound::Exclusive(window_start(options, now))
}

fn window_start(options: &RateLimitOptions, now: i64) -> i64 {
    now.saturating_sub(i64::try_from(options.window_ms).unwrap_or(i64::MAX))
}

/// Window key lifetime: the window rounded up to whole seconds.
fn window_expiry_ms(window_ms: u64) -> u64 {
    window_ms.div_ceil(1000).saturating_mul(1000)
}

fn count_reply(reply: Option<&brix_store::Reply>, command: &str) -> StoreResult<u64> {
    reply
        .and_then(brix_store::Reply::as_int)
        .map(|n| n.max(0) as u64)
        .ok_or_else(|| StoreError::unexpected_reply(format!("{command} did not return an integer")))
}
