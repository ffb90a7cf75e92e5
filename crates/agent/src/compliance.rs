//! Compliance Store: association id → compliance entry, preserving
//! insertion order and rejecting stale (out-of-order) updates.

use std::collections::HashMap;

use parking_lot::RwLock;
use sa_domain::model::ComplianceEntry;

struct Inner {
    by_id: HashMap<String, ComplianceEntry>,
    order: Vec<String>,
}

pub struct ComplianceStore {
    inner: RwLock<Inner>,
}

impl Default for ComplianceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Insert or update an entry. Rejects (silently, returning `false`)
    /// updates whose `execution_time` is strictly earlier than what is
    /// already stored — an out-of-order report from a retried/duplicated
    /// status call must never regress the compliance picture.
    pub fn update(&self, entry: ComplianceEntry) -> bool {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_id.get(&entry.association_id) {
            if entry.execution_time < existing.execution_time {
                return false;
            }
        } else {
            inner.order.push(entry.association_id.clone());
        }
        inner.by_id.insert(entry.association_id.clone(), entry);
        true
    }

    pub fn get(&self, association_id: &str) -> Option<ComplianceEntry> {
        self.inner.read().by_id.get(association_id).cloned()
    }

    /// A stable, insertion-ordered snapshot of every entry currently held.
    pub fn entries(&self) -> Vec<ComplianceEntry> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Drop every entry whose association id is not in `current_ids` —
    /// called after a Schedule Manager refresh to keep the compliance
    /// picture in step with the live association set.
    pub fn refresh(&self, current_ids: &std::collections::HashSet<String>) {
        let mut inner = self.inner.write();
        inner.by_id.retain(|id, _| current_ids.contains(id));
        inner.order.retain(|id| current_ids.contains(id));
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sa_domain::model::ComplianceSeverity;
    use sa_domain::model::ComplianceStatus;
    use std::collections::HashSet;

    fn entry(id: &str, time_offset_secs: i64) -> ComplianceEntry {
        ComplianceEntry {
            association_id: id.into(),
            document_name: "AWS-RunShellScript".into(),
            document_version: "1".into(),
            severity: ComplianceSeverity::Unspecified,
            status: ComplianceStatus::Compliant,
            execution_time: Utc::now() + Duration::seconds(time_offset_secs),
            title: ComplianceEntry::DEFAULT_TITLE.into(),
        }
    }

    #[test]
    fn update_then_get_round_trips() {
        let store = ComplianceStore::new();
        assert!(store.update(entry("a1", 0)));
        assert_eq!(store.get("a1").unwrap().association_id, "a1");
    }

    #[test]
    fn stale_update_is_rejected() {
        let store = ComplianceStore::new();
        let fresh = entry("a1", 100);
        let fresh_time = fresh.execution_time;
        store.update(fresh);
        let accepted = store.update(entry("a1", 0));
        assert!(!accepted);
        assert_eq!(store.get("a1").unwrap().execution_time, fresh_time);
    }

    #[test]
    fn entries_preserve_insertion_order() {
        let store = ComplianceStore::new();
        store.update(entry("c", 0));
        store.update(entry("a", 0));
        store.update(entry("b", 0));
        let ids: Vec<String> = store.entries().into_iter().map(|e| e.association_id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn refresh_drops_entries_not_in_current_set() {
        let store = ComplianceStore::new();
        store.update(entry("a", 0));
        store.update(entry("b", 0));
        let mut keep = HashSet::new();
        keep.insert("a".to_string());
        store.refresh(&keep);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert_eq!(store.len(), 1);
    }
}
