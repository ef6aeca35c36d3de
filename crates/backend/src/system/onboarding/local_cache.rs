use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// In-memory key/value cache of one session
#[derive(Debug, Clone, Default)]
pub struct LocalCache {
    entries: HashMap<String, String>,
    last_updated: Option<DateTime<Utc>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    /// Mark the cache as freshly written
    pub fn stamp(&mut self) {
        self.last_updated = Some(Utc::now());
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Local caches of all live sessions, keyed by user id.
///
/// A request checks out a copy, works on it and stores it back. Concurrent
/// requests of the same user are not coordinated; the last store wins.
#[derive(Clone, Default)]
pub struct SessionCaches {
    sessions: Arc<RwLock<HashMap<String, LocalCache>>>,
}

impl SessionCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkout(&self, session_key: &str) -> LocalCache {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_key).cloned().unwrap_or_default()
    }

    pub fn store(&self, session_key: &str, cache: LocalCache) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_key.to_string(), cache);
    }

    pub fn evict(&self, session_key: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_key);
    }

    /// Удалить кэши, не обновлявшиеся дольше `max_age_hours`
    pub fn cleanup_old_sessions(&self, max_age_hours: i64) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        sessions.retain(|_, cache| match cache.last_updated() {
            Some(updated) => (now - updated).num_hours() < max_age_hours,
            None => false,
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_read_as_missing() {
        let mut cache = LocalCache::new();
        cache.set("status", "  ");
        assert_eq!(cache.get("status"), None);
        cache.set("status", "payment");
        assert_eq!(cache.get("status").as_deref(), Some("payment"));
    }

    #[test]
    fn test_sessions_do_not_share_state() {
        let caches = SessionCaches::new();
        let mut first = caches.checkout("user-a");
        first.set("status", "complete");
        first.stamp();
        caches.store("user-a", first);

        assert_eq!(
            caches.checkout("user-a").get("status").as_deref(),
            Some("complete")
        );
        assert!(caches.checkout("user-b").is_empty());
    }

    #[test]
    fn test_cleanup_drops_unstamped_and_evict_removes() {
        let caches = SessionCaches::new();
        let mut fresh = LocalCache::new();
        fresh.set("status", "setup");
        fresh.stamp();
        caches.store("fresh", fresh);
        caches.store("never-written", LocalCache::new());

        caches.cleanup_old_sessions(24);
        assert_eq!(caches.len(), 1);

        caches.evict("fresh");
        assert_eq!(caches.len(), 0);
    }
}
