//! TTL cache behind the feed service.
//!
//! The feed service treats the cache as an optional injected collaborator
//! with a narrow interface; when it is absent every query goes straight to
//! the database. `MemoryCache` is the in-process implementation; the trait
//! seam is where a shared store (Redis) would slot in.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Key/value cache with TTL expiry and glob-pattern deletion.
#[async_trait]
pub trait FeedCache: Send + Sync {
    /// Get a value, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Delete every entry whose key matches a glob pattern (`feed:*`).
    async fn del_pattern(&self, pattern: &str);
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Process-local TTL cache.
///
/// Expired entries are dropped lazily on read and swept on write, so the map
/// never grows past the working set of live keys plus whatever expired since
/// the last insert.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_valid() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired; drop it under the write lock.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_valid() {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_valid());
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn del_pattern(&self, pattern: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !glob_match(pattern, key));
    }
}

/// Minimal glob matching: `*` matches any run of characters, everything else
/// is literal. Covers the `prefix:*` patterns the feed namespace uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            // Anchored prefix
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            // Anchored suffix
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("feed:*", "feed:latest:1:10"));
        assert!(glob_match("feed:*", "feed:"));
        assert!(!glob_match("feed:*", "profile:1"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exact2"));
        assert!(glob_match("*:10", "feed:latest:1:10"));
        assert!(glob_match("feed:*:10", "feed:latest:1:10"));
        assert!(!glob_match("feed:*:11", "feed:latest:1:10"));
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set("feed:latest:1:10", "payload".into(), Duration::from_secs(60))
            .await;

        assert_eq!(
            cache.get("feed:latest:1:10").await.as_deref(),
            Some("payload")
        );
        assert!(cache.get("feed:latest:2:10").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("feed:x", "stale".into(), Duration::from_millis(10))
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("feed:x").await.is_none());
    }

    #[tokio::test]
    async fn test_del_pattern_scopes_to_prefix() {
        let cache = MemoryCache::new();
        cache
            .set("feed:latest:1:10", "a".into(), Duration::from_secs(60))
            .await;
        cache
            .set("feed:trending-tags", "b".into(), Duration::from_secs(60))
            .await;
        cache
            .set("profile:42", "c".into(), Duration::from_secs(60))
            .await;

        cache.del_pattern("feed:*").await;

        assert!(cache.get("feed:latest:1:10").await.is_none());
        assert!(cache.get("feed:trending-tags").await.is_none());
        assert_eq!(cache.get("profile:42").await.as_deref(), Some("c"));
    }
}
