use ahash::{AHashMap as HashMap, RandomState};
use linkerd_export_controller_core::ServiceRef;
use parking_lot::RwLock;
use std::hash::BuildHasher;

const DEFAULT_SHARDS: usize = 16;

/// Holds the exported flag of every service for which an export event has been observed.
///
/// A service without a record is not exported. Records are spread over a fixed set of shards so
/// that updates for distinct services rarely contend, while updates for the same service always
/// serialize on its shard.
#[derive(Debug)]
pub struct ExportStore {
    shards: Box<[RwLock<HashMap<ServiceRef, bool>>]>,
    hasher: RandomState,
}

// === impl ExportStore ===

impl Default for ExportStore {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl ExportStore {
    pub fn with_shards(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    pub fn is_exported(&self, service: &ServiceRef) -> bool {
        self.shard(service)
            .read()
            .get(service)
            .copied()
            .unwrap_or(false)
    }

    /// Sets a service's exported flag, returning true if the value changed.
    ///
    /// Creating a record always counts as a change, even when the new value is false.
    pub fn set_exported(&self, service: ServiceRef, exported: bool) -> bool {
        self.set_exported_then(service, exported, |_, _| {})
    }

    /// Removes a service's record, returning true if the service was exported.
    pub fn remove(&self, service: &ServiceRef) -> bool {
        self.remove_then(service, |_| {})
    }

    /// Like [`ExportStore::set_exported`], but invokes `on_change` while the record is still
    /// locked so that observers see changes to a single service in the order they were applied.
    /// `on_change` must not block.
    pub(crate) fn set_exported_then(
        &self,
        service: ServiceRef,
        exported: bool,
        on_change: impl FnOnce(&ServiceRef, bool),
    ) -> bool {
        let mut shard = self.shard(&service).write();
        if shard.get(&service) == Some(&exported) {
            return false;
        }
        on_change(&service, exported);
        shard.insert(service, exported);
        true
    }

    pub(crate) fn remove_then(
        &self,
        service: &ServiceRef,
        on_change: impl FnOnce(&ServiceRef),
    ) -> bool {
        let mut shard = self.shard(service).write();
        let exported = shard.remove(service).unwrap_or(false);
        if exported {
            on_change(service);
        }
        exported
    }

    /// Returns the number of records, exported or not.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    pub fn exported_count(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().values().filter(|exported| **exported).count())
            .sum()
    }

    pub fn exported_services(&self) -> Vec<ServiceRef> {
        let mut services = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .iter()
                    .filter(|(_, exported)| **exported)
                    .map(|(service, _)| service.clone())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        services.sort();
        services
    }

    fn shard(&self, service: &ServiceRef) -> &RwLock<HashMap<ServiceRef, bool>> {
        let idx = BuildHasher::hash_one(&self.hasher, service) as usize % self.shards.len();
        &self.shards[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    #[test]
    fn unknown_service_not_exported() {
        let store = ExportStore::default();
        assert!(!store.is_exported(&ServiceRef::new("ns", "svc")));
        assert!(store.is_empty());
    }

    #[test]
    fn set_exported_reports_changes() {
        let store = ExportStore::default();
        let svc = ServiceRef::new("ns", "svc");

        assert!(store.set_exported(svc.clone(), true));
        assert!(!store.set_exported(svc.clone(), true));
        assert!(store.is_exported(&svc));

        assert!(store.set_exported(svc.clone(), false));
        assert!(!store.is_exported(&svc));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn first_record_is_a_change() {
        let store = ExportStore::default();
        assert!(store.set_exported(ServiceRef::new("ns", "svc"), false));
    }

    #[test]
    fn remove_reports_exported() {
        let store = ExportStore::default();
        let svc = ServiceRef::new("ns", "svc");
        assert!(!store.remove(&svc));

        store.set_exported(svc.clone(), false);
        assert!(!store.remove(&svc));
        assert!(store.is_empty());

        store.set_exported(svc.clone(), true);
        assert!(store.remove(&svc));
        assert!(!store.is_exported(&svc));
        assert!(store.is_empty());
    }

    #[test]
    fn exported_services_sorted() {
        let store = ExportStore::with_shards(4);
        store.set_exported(ServiceRef::new("ns-b", "svc"), true);
        store.set_exported(ServiceRef::new("ns-a", "svc"), true);
        store.set_exported(ServiceRef::new("ns-a", "other"), false);
        assert_eq!(
            store.exported_services(),
            vec![ServiceRef::new("ns-a", "svc"), ServiceRef::new("ns-b", "svc")]
        );
    }

    #[test]
    fn parallel_writers_for_distinct_services() {
        let store = ExportStore::default();
        thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..100 {
                        assert!(store.set_exported(ServiceRef::new(format!("ns-{t}"), i), true));
                    }
                });
            }
        });
        assert_eq!(store.len(), 800);
        assert_eq!(store.exported_services().len(), 800);
    }

    #[test]
    fn same_service_writes_serialize() {
        let store = ExportStore::default();
        let svc = ServiceRef::new("ns", "svc");
        let changes = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    if store.set_exported(svc.clone(), true) {
                        changes.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }
}
