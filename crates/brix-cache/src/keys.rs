//! Key layout in the shared store.
//!
//! ```text
//! {ns}:cache:{key}        cache entry (string, JSON)
//! {ns}:tag:{tag}          tag index (set of cache entry keys)
//! {ns}:{prefix}:{key}     rate-limit window (sorted set of request stamps)
//! ```

/// Builds namespaced store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn cache_key(&self, key: &str) -> String {
        format!("{}:cache:{key}", self.name)
    }

    #[inline]
    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{tag}", self.name)
    }

    pub fn cache_pattern(&self) -> String {
        format!("{}:cache:*", self.name)
    }

    pub fn tag_pattern(&self) -> String {
        format!("{}:tag:*", self.name)
    }

    /// Whether a stored key belongs to this namespace's cache entries.
    pub fn owns_cache_key(&self, stored: &str) -> bool {
        stored
            .strip_prefix(self.name.as_str())
            .is_some_and(|rest| rest.starts_with(":cache:"))
    }

    #[inline]
    pub fn window_key(&self, prefix: &str, key: &str) -> String {
        format!("{}:{prefix}:{key}", self.name)
    }

    pub fn window_pattern(&self, prefix: &str) -> String {
        format!("{}:{prefix}:*", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let ns = Namespace::new("brix");
        assert_eq!(ns.cache_key("fixtures:today"), "brix:cache:fixtures:today");
        assert_eq!(ns.tag_key("matches"), "brix:tag:matches");
        assert_eq!(ns.window_key("ratelimit", "10.0.0.1"), "brix:ratelimit:10.0.0.1");
        assert_eq!(ns.cache_pattern(), "brix:cache:*");
    }

    #[test]
    fn test_owns_cache_key() {
        let ns = Namespace::new("brix");
        assert!(ns.owns_cache_key("brix:cache:a"));
        assert!(!ns.owns_cache_key("brix:tag:a"));
        assert!(!ns.owns_cache_key("brixother:cache:a"));
        assert!(!ns.owns_cache_key("other:cache:a"));
    }
}
