//! Association Cache: id → last-known association, with checksum-based
//! eviction as the only consistency mechanism (no TTLs — refresh cadence
//! is tens of seconds to minutes, so staleness is bounded by the poll loop
//! itself).

use std::collections::HashMap;

use parking_lot::RwLock;
use sa_domain::model::Association;

pub struct AssociationCache {
    entries: RwLock<HashMap<String, Association>>,
}

impl Default for AssociationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, association: Association) {
        self.entries
            .write()
            .insert(association.association_id.clone(), association);
    }

    pub fn get(&self, association_id: &str) -> Option<Association> {
        self.entries.read().get(association_id).cloned()
    }

    pub fn is_cached(&self, association_id: &str) -> bool {
        self.entries.read().contains_key(association_id)
    }

    /// Checksum-driven validation: a cached record with the same checksum
    /// is considered unchanged (`None` is returned, nothing evicted); a
    /// checksum mismatch evicts the stale record so the caller knows to
    /// re-fetch detail.
    ///
    /// Returns `true` when the candidate is a cache hit with a matching
    /// checksum (no detail fetch needed), `false` otherwise (miss, or a
    /// checksum change that just evicted the stale entry).
    pub fn validate(&self, candidate: &Association) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&candidate.association_id) {
            Some(cached) if cached.checksum == candidate.checksum => true,
            Some(_) => {
                entries.remove(&candidate.association_id);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, association_id: &str) {
        self.entries.write().remove(association_id);
    }

    pub fn retain_ids(&self, keep: impl Fn(&str) -> bool) {
        self.entries.write().retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    fn make(id: &str, checksum: &str) -> Association {
        Association {
            association_id: id.into(),
            instance_id: "mi-1".into(),
            name: "AWS-RunShellScript".into(),
            document_version: "1".into(),
            schedule_expression: Some("rate(30 minutes)".into()),
            checksum: checksum.into(),
            create_date: Utc::now(),
            last_execution_date: None,
            next_scheduled_date: None,
            detailed_status: None,
            parameters: StdHashMap::new(),
            output_location: None,
            document: None,
            exclude_from_future_scheduling: false,
            legacy_association: false,
            run_now: false,
            errors: Vec::new(),
        }
    }

    #[test]
    fn add_and_get_round_trips() {
        let cache = AssociationCache::new();
        cache.add(make("a1", "sum1"));
        assert!(cache.is_cached("a1"));
        assert_eq!(cache.get("a1").unwrap().checksum, "sum1");
    }

    #[test]
    fn validate_returns_true_on_checksum_match() {
        let cache = AssociationCache::new();
        cache.add(make("a1", "sum1"));
        assert!(cache.validate(&make("a1", "sum1")));
        // Unchanged: entry is still there.
        assert!(cache.is_cached("a1"));
    }

    #[test]
    fn validate_evicts_on_checksum_mismatch() {
        let cache = AssociationCache::new();
        cache.add(make("a1", "sum1"));
        assert!(!cache.validate(&make("a1", "sum2")));
        assert!(!cache.is_cached("a1"));
    }

    #[test]
    fn validate_returns_false_on_cache_miss() {
        let cache = AssociationCache::new();
        assert!(!cache.validate(&make("unknown", "sum1")));
    }

    #[test]
    fn retain_ids_prunes_entries_not_in_current_refresh() {
        let cache = AssociationCache::new();
        cache.add(make("a1", "sum1"));
        cache.add(make("a2", "sum1"));
        cache.retain_ids(|id| id == "a1");
        assert!(cache.is_cached("a1"));
        assert!(!cache.is_cached("a2"));
    }
}
