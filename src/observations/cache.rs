use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Everything fetched for one species: the raw records and the reported total
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    pub records: Vec<Value>,
    pub total_count: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    current_species: Option<String>,
    entries: HashMap<String, Arc<ObservationSet>>,
}

/// Process-wide observation cache that follows one species at a time.
///
/// Asking for a different species (or forcing a refresh) drops every entry,
/// so in practice the cache holds the data of the last species requested.
/// The lock is only held for the bookkeeping itself, never across a fetch.
#[derive(Debug, Clone, Default)]
pub struct ObservationCache {
    state: Arc<Mutex<CacheState>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the invalidation rules for a request and returns the cached set, if any
    pub fn lookup(&self, species: &str, force: bool) -> Option<Arc<ObservationSet>> {
        let mut state = self.lock();

        if force || state.current_species.as_deref() != Some(species) {
            if !state.entries.is_empty() {
                debug!(
                    "Invalidating observation cache ({} entries, force={})",
                    state.entries.len(),
                    force
                );
            }
            state.entries.clear();
            state.current_species = Some(species.to_string());
        }

        state.entries.get(species).cloned()
    }

    pub fn store(&self, species: &str, set: Arc<ObservationSet>) {
        self.lock().entries.insert(species.to_string(), set);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.current_species = None;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A poisoned lock only means a panic happened mid-update of plain data
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_set(count: u64) -> Arc<ObservationSet> {
        Arc::new(ObservationSet {
            records: vec![json!({"observed_on": "2020-05-01"})],
            total_count: count,
        })
    }

    #[test]
    fn test_lookup_hits_after_store() {
        let cache = ObservationCache::new();
        assert!(cache.lookup("Gekko gecko", false).is_none());

        cache.store("Gekko gecko", sample_set(7));
        let hit = cache.lookup("Gekko gecko", false).unwrap();
        assert_eq!(hit.total_count, 7);
    }

    #[test]
    fn test_force_discards_entry() {
        let cache = ObservationCache::new();
        cache.lookup("Gekko gecko", false);
        cache.store("Gekko gecko", sample_set(7));

        assert!(cache.lookup("Gekko gecko", true).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_species_switch_discards_everything() {
        let cache = ObservationCache::new();
        cache.lookup("Gekko gecko", false);
        cache.store("Gekko gecko", sample_set(7));

        assert!(cache.lookup("Naja atra", false).is_none());
        assert!(cache.lookup("Gekko gecko", false).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_species_key_is_case_sensitive() {
        let cache = ObservationCache::new();
        cache.lookup("Gekko gecko", false);
        cache.store("Gekko gecko", sample_set(7));

        assert!(cache.lookup("gekko gecko", false).is_none());
    }

    #[test]
    fn test_clear_resets_current_species() {
        let cache = ObservationCache::new();
        cache.lookup("Gekko gecko", false);
        cache.store("Gekko gecko", sample_set(7));
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.lookup("Gekko gecko", false).is_none());
    }
}
