use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Bounded memory of recently accepted message ids.
///
/// Slack retries deliveries and sends the same message as both `app_mention`
/// and `message`; only the first copy is processed. Past capacity the oldest
/// id is forgotten.
pub struct DedupSet {
    seen: Mutex<LruCache<String, ()>>,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `true` the first time `id` is seen.
    pub fn first_delivery(&self, id: &str) -> bool {
        let mut seen = self.seen.lock();
        // `contains` does not refresh recency, so eviction stays insertion-ordered
        if seen.contains(id) {
            return false;
        }
        seen.put(id.to_string(), ());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_dropped() {
        let dedup = DedupSet::new(10);
        assert!(dedup.first_delivery("C1:1.0"));
        assert!(!dedup.first_delivery("C1:1.0"));
        assert!(dedup.first_delivery("C1:2.0"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_oldest_is_evicted_past_capacity() {
        let dedup = DedupSet::new(2);
        assert!(dedup.first_delivery("a"));
        assert!(dedup.first_delivery("b"));
        // Re-seeing "a" must not make it younger than "b"
        assert!(!dedup.first_delivery("a"));
        assert!(dedup.first_delivery("c"));

        assert_eq!(dedup.len(), 2);
        assert!(dedup.first_delivery("a"));
        assert!(!dedup.first_delivery("c"));
    }
}
