use std::time::Duration;

/// Per-call options for [`CacheStore::get`](super::CacheStore::get).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Skip the cache entirely; the call is always a miss.
    pub no_cache: bool,
    /// Serve expired entries while a background refresh runs.
    pub stale_while_revalidate: Option<Duration>,
    /// Oldest staleness that may still be served. Defaults to the configured
    /// `max_stale_age_secs` (24h).
    pub max_stale_age: Option<Duration>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn stale_while_revalidate(mut self, window: Duration) -> Self {
        self.stale_while_revalidate = Some(window);
        self
    }

    pub fn max_stale_age(mut self, age: Duration) -> Self {
        self.max_stale_age = Some(age);
        self
    }

    /// A zero window counts as "not configured".
    pub(crate) fn serves_stale(&self) -> bool {
        self.stale_while_revalidate.is_some_and(|w| !w.is_zero())
    }
}

/// Per-call options for [`CacheStore::set`](super::CacheStore::set).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Entry lifetime. Defaults to the configured `default_ttl_secs` (300s).
    pub ttl: Option<Duration>,
    /// Labels for bulk invalidation.
    pub tags: Vec<String>,
    /// Report success without writing anything.
    pub no_store: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }
}
