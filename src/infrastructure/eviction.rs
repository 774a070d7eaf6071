//! LRU (least recently seen) eviction adapter.

use crate::application::ports::{EvictionCandidate, EvictionPolicy};

/// Evicts the candidate seen longest ago once the entry limit is exceeded.
#[derive(Debug, Clone)]
pub struct LruEviction {
    max_entries: usize,
}

impl LruEviction {
    /// Create a policy keeping at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl<K, V> EvictionPolicy<K, V> for LruEviction
where
    K: Clone,
    V: Clone,
{
    fn select_victim(&self, candidates: &[EvictionCandidate<K, V>]) -> Option<K> {
        candidates
            .iter()
            .min_by_key(|candidate| candidate.last_access)
            .map(|candidate| candidate.key.clone())
    }

    fn should_evict(&self, current_entries: usize) -> bool {
        current_entries > self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local};

    #[test]
    fn test_select_oldest() {
        let policy = LruEviction::new(10);
        let now = Local::now();
        let candidates = vec![
            EvictionCandidate {
                key: "key1",
                value: 100,
                last_access: now,
            },
            EvictionCandidate {
                key: "key2",
                value: 200,
                last_access: now - Duration::seconds(10),
            },
            EvictionCandidate {
                key: "key3",
                value: 300,
                last_access: now - Duration::seconds(5),
            },
        ];
        assert_eq!(policy.select_victim(&candidates), Some("key2"));
    }

    #[test]
    fn test_should_evict_only_above_limit() {
        let policy = LruEviction::new(500);
        assert!(!<LruEviction as EvictionPolicy<String, u32>>::should_evict(&policy, 500));
        assert!(<LruEviction as EvictionPolicy<String, u32>>::should_evict(&policy, 501));
    }

    #[test]
    fn test_empty_candidates() {
        let policy = LruEviction::new(10);
        let candidates: Vec<EvictionCandidate<String, u32>> = vec![];
        assert_eq!(policy.select_victim(&candidates), None);
    }
}
