use crate::{metrics::ExportMetrics, notify::Notifier, store::ExportStore};
use linkerd_export_controller_core::{
    visible, Discoverability, Endpoint, Proxy, ServiceRef, Switches,
};
use linkerd_export_controller_k8s_api::{ResourceExt, ServiceExport};
use parking_lot::RwLock;
use std::sync::Arc;

/// Answers endpoint visibility queries for the configuration generator.
///
/// The cache is the only writer of export state: watch events enter through
/// [`ExportCache::on_export_created`] and [`ExportCache::on_export_deleted`], and every change is
/// forwarded to the [`Notifier`].
#[derive(Debug)]
pub struct ExportCache {
    switches: Switches,
    store: ExportStore,
    notifier: Arc<Notifier>,
    metrics: ExportMetrics,
}

/// Adapts `ServiceExport` watch events onto an [`ExportCache`].
///
/// kubert serializes events by locking this adapter; lookups go directly to the shared cache and
/// are never blocked by it.
#[derive(Clone, Debug)]
pub struct ExportIndex {
    cache: Arc<ExportCache>,
}

pub type SharedExportIndex = Arc<RwLock<ExportIndex>>;

// === impl ExportCache ===

impl ExportCache {
    pub fn new(switches: Switches, notifier: Arc<Notifier>, metrics: ExportMetrics) -> Self {
        Self {
            switches,
            store: ExportStore::default(),
            notifier,
            metrics,
        }
    }

    pub fn shared(
        switches: Switches,
        notifier: Arc<Notifier>,
        metrics: ExportMetrics,
    ) -> Arc<Self> {
        Arc::new(Self::new(switches, notifier, metrics))
    }

    pub fn switches(&self) -> &Switches {
        &self.switches
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn is_exported(&self, service: &ServiceRef) -> bool {
        self.store.is_exported(service)
    }

    pub fn discoverability(&self, service: &ServiceRef) -> Discoverability {
        Discoverability::new(self.store.is_exported(service), &self.switches)
    }

    pub fn is_visible_to(&self, endpoint: &Endpoint, proxy: &Proxy) -> bool {
        visible(
            &endpoint.cluster,
            self.store.is_exported(&endpoint.service),
            &self.switches,
            &proxy.cluster,
        )
    }

    /// Returns the endpoints of `service` that `proxy` may discover, in their original order.
    ///
    /// The service's export state is read once, so every endpoint is judged against the same
    /// state even if an export event is processed concurrently.
    pub fn filter_instances(
        &self,
        service: &ServiceRef,
        instances: impl IntoIterator<Item = Endpoint>,
        proxy: &Proxy,
    ) -> Vec<Endpoint> {
        let discoverability = self.discoverability(service);
        instances
            .into_iter()
            .filter(|ep| discoverability.is_discoverable(&ep.cluster, &proxy.cluster))
            .collect()
    }

    /// Sets a service's exported flag, notifying if the value changed.
    ///
    /// Only the pending notification is written while the record is locked, so pending state
    /// follows the order in which changes to the record were applied. Logging, metrics and the
    /// dispatcher wake-up happen after the record is released.
    pub fn set_exported(&self, service: ServiceRef, exported: bool) -> bool {
        let mut queued = false;
        let changed = self
            .store
            .set_exported_then(service.clone(), exported, |service, exported| {
                queued = self.notifier.enqueue(service.clone(), exported);
            });
        if changed {
            self.changed(&service, exported, queued);
        }
        changed
    }

    pub fn on_export_created(&self, service: ServiceRef) {
        if !self.set_exported(service.clone(), true) {
            tracing::debug!(%service, "Service already exported");
        }
    }

    pub fn on_export_deleted(&self, service: ServiceRef) {
        let mut queued = false;
        let changed = self.store.remove_then(&service, |service| {
            queued = self.notifier.enqueue(service.clone(), false);
        });
        if changed {
            self.changed(&service, false, queued);
        } else {
            tracing::debug!(%service, "Service was not exported");
        }
    }

    pub fn exported_count(&self) -> usize {
        self.store.exported_count()
    }

    pub fn exported_services(&self) -> Vec<ServiceRef> {
        self.store.exported_services()
    }

    fn changed(&self, service: &ServiceRef, exported: bool, queued: bool) {
        tracing::info!(%service, exported, "Export state changed");
        self.metrics.transition(exported);
        self.notifier.enqueued(service, exported, queued);
    }
}

// === impl ExportIndex ===

impl ExportIndex {
    pub fn shared(cache: Arc<ExportCache>) -> SharedExportIndex {
        Arc::new(RwLock::new(Self { cache }))
    }
}

impl kubert::index::IndexNamespacedResource<ServiceExport> for ExportIndex {
    fn apply(&mut self, export: ServiceExport) {
        let name = export.name_unchecked();
        let Some(namespace) = export.namespace() else {
            tracing::warn!(%name, "Ignoring ServiceExport without a namespace");
            return;
        };
        self.cache.on_export_created(ServiceRef { namespace, name });
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.cache.on_export_deleted(ServiceRef { namespace, name });
    }

    // Resets apply every live export and delete the rest; re-applying an exported service is a
    // no-op, so the default implementation is replay-safe.
}
