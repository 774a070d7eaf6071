//! Central registry of tracked incidents.
//!
//! The registry maps incident keys to shared [`Incident`] records. Lookups
//! take only the storage shard lock; per-incident state is guarded by the
//! incident itself, and snapshots are copied out before any file I/O.

use crate::application::ports::{Clock, EvictionCandidate, EvictionPolicy, Storage};
use crate::domain::incident::{Incident, IncidentKey, IncidentSnapshot};
use std::sync::Arc;

/// Registry managing all incidents.
///
/// Generic over the storage implementation. In production, use
/// `Arc<ShardedStorage<IncidentKey, Arc<Incident>>>`.
#[derive(Clone)]
pub struct IncidentRegistry<S>
where
    S: Storage<IncidentKey, Arc<Incident>> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    eviction: Arc<dyn EvictionPolicy<IncidentKey, IncidentSnapshot>>,
}

impl<S> IncidentRegistry<S>
where
    S: Storage<IncidentKey, Arc<Incident>> + Clone,
{
    pub fn new(
        storage: S,
        clock: Arc<dyn Clock>,
        eviction: Arc<dyn EvictionPolicy<IncidentKey, IncidentSnapshot>>,
    ) -> Self {
        Self {
            storage,
            clock,
            eviction,
        }
    }

    /// Find or create the incident for `key`.
    ///
    /// The flag is true when the incident was created by this call.
    pub fn incident(&self, key: IncidentKey) -> (Arc<Incident>, bool) {
        let now = self.clock.now();
        let mut created = false;
        let incident = self.storage.with_entry_mut(
            key.clone(),
            || {
                created = true;
                Arc::new(Incident::new(key, now))
            },
            |incident| Arc::clone(incident),
        );
        (incident, created)
    }

    /// Copies of every incident, ordered by first occurrence.
    pub fn snapshots(&self) -> Vec<IncidentSnapshot> {
        let mut incidents = Vec::with_capacity(self.storage.len());
        self.storage
            .for_each(|_, incident| incidents.push(Arc::clone(incident)));
        let mut snapshots: Vec<_> = incidents.iter().map(|i| i.snapshot()).collect();
        snapshots.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.key.cmp(&b.key)));
        snapshots
    }

    /// Start a new day for every incident, then evict down to the policy's limit.
    ///
    /// Returns the evicted incidents so the caller can delete their files.
    pub fn roll(&self) -> Vec<IncidentSnapshot> {
        let mut incidents = Vec::with_capacity(self.storage.len());
        self.storage
            .for_each(|_, incident| incidents.push(Arc::clone(incident)));
        for incident in &incidents {
            incident.roll();
        }

        if !self.eviction.should_evict(self.storage.len()) {
            return Vec::new();
        }

        let mut candidates: Vec<EvictionCandidate<IncidentKey, IncidentSnapshot>> = incidents
            .iter()
            .map(|incident| {
                let snapshot = incident.snapshot();
                EvictionCandidate {
                    key: snapshot.key.clone(),
                    last_access: snapshot.last_seen,
                    value: snapshot,
                }
            })
            .collect();

        let mut evicted = Vec::new();
        while self.eviction.should_evict(self.storage.len()) {
            let Some(victim) = self.eviction.select_victim(&candidates) else {
                break;
            };
            if let Some(pos) = candidates.iter().position(|c| c.key == victim) {
                evicted.push(candidates.swap_remove(pos).value);
            }
            self.storage.remove(&victim);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn clear(&self) {
        self.storage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::eviction::LruEviction;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedStorage;
    use std::thread;
    use std::time::Duration;

    type Registry = IncidentRegistry<Arc<ShardedStorage<IncidentKey, Arc<Incident>>>>;

    fn registry(max: usize) -> (Registry, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let registry = IncidentRegistry::new(
            Arc::new(ShardedStorage::new()),
            clock.clone(),
            Arc::new(LruEviction::new(max)),
        );
        (registry, clock)
    }

    #[test]
    fn test_incident_created_once() {
        let (registry, _) = registry(10);
        let key = IncidentKey::new("S", "P", "E");
        let (first, created) = registry.incident(key.clone());
        assert!(created);
        let (second, created) = registry.incident(key);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_roll_evicts_least_recently_seen() {
        let (registry, clock) = registry(3);
        for i in 0..5 {
            let (incident, _) = registry.incident(IncidentKey::new(format!("S{}", i), "P", "E"));
            incident.record(clock.now(), 0);
            clock.advance(Duration::from_secs(1));
        }
        // S0 is seen again, so S1 and S2 are now the oldest.
        let (s0, _) = registry.incident(IncidentKey::new("S0", "P", "E"));
        s0.record(clock.now(), 0);

        let evicted = registry.roll();
        let mut ids: Vec<_> = evicted.iter().map(|s| s.key.source_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_snapshots_ordered_by_first_seen() {
        let (registry, clock) = registry(10);
        registry.incident(IncidentKey::new("B", "P", "E"));
        clock.advance(Duration::from_secs(1));
        registry.incident(IncidentKey::new("A", "P", "E"));
        let ids: Vec<_> = registry
            .snapshots()
            .into_iter()
            .map(|s| s.key.source_id)
            .collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_concurrent_access() {
        let (registry, _) = registry(10_000);
        let registry = Arc::new(registry);
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for j in 0..100 {
                        registry.incident(IncidentKey::new(format!("S{}", i), format!("P{}", j), "E"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 1000);
    }
}
