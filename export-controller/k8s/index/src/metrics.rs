use crate::ExportCache;
use kube::Resource;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric},
    metrics::{counter::Counter, family::Family, gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::sync::Arc;

/// Counts export state transitions.
#[derive(Clone, Debug, Default)]
pub struct ExportMetrics {
    transitions: Family<TransitionLabels, Counter>,
}

/// Counts push signals emitted by the notifier.
#[derive(Clone, Debug, Default)]
pub struct PushMetrics {
    pub(crate) signals: Counter,
    pub(crate) coalesced: Counter,
    pub(crate) resolve_errors: Counter,
}

/// Counts watch events applied to an index.
#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    applies: Family<KindLabels, Counter>,
    deletes: Family<KindLabels, Counter>,
    resets: Family<KindLabels, Counter>,
}

/// Wraps an index, recording each watch event before forwarding it.
pub struct InstrumentedIndex<T> {
    inner: Arc<RwLock<T>>,
    metrics: IndexMetrics,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TransitionLabels {
    exported: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

#[derive(Debug)]
struct CacheCollector(Arc<ExportCache>);

/// Reports the size of the export cache and its pending push set.
pub fn register_cache(reg: &mut Registry, cache: Arc<ExportCache>) {
    reg.register_collector(Box::new(CacheCollector(cache)));
}

// === impl ExportMetrics ===

impl ExportMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let transitions = Family::default();
        reg.register(
            "transitions",
            "Count of changes to a service's exported state",
            transitions.clone(),
        );
        Self { transitions }
    }

    pub(crate) fn transition(&self, exported: bool) {
        let exported = if exported { "true" } else { "false" };
        self.transitions
            .get_or_create(&TransitionLabels { exported })
            .inc();
    }
}

// === impl PushMetrics ===

impl PushMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let signals = Counter::default();
        reg.register(
            "push_signals",
            "Count of push signals emitted",
            signals.clone(),
        );

        let coalesced = Counter::default();
        reg.register(
            "push_coalesced",
            "Count of transitions folded into an already pending push",
            coalesced.clone(),
        );

        let resolve_errors = Counter::default();
        reg.register(
            "push_resolve_errors",
            "Count of pushes skipped because the service's endpoints could not be resolved",
            resolve_errors.clone(),
        );

        Self {
            signals,
            coalesced,
            resolve_errors,
        }
    }
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let applies = Family::default();
        reg.register("applies", "Count of applies to the index", applies.clone());

        let deletes = Family::default();
        reg.register("deletes", "Count of deletes to the index", deletes.clone());

        let resets = Family::default();
        reg.register("resets", "Count of resets to the index", resets.clone());

        Self {
            applies,
            deletes,
            resets,
        }
    }

    pub fn wrap<T>(&self, inner: Arc<RwLock<T>>) -> Arc<RwLock<InstrumentedIndex<T>>> {
        Arc::new(RwLock::new(InstrumentedIndex {
            inner,
            metrics: self.clone(),
        }))
    }
}

// === impl InstrumentedIndex ===

impl<T, R> IndexNamespacedResource<R> for InstrumentedIndex<T>
where
    T: IndexNamespacedResource<R>,
    R: Resource<DynamicType = ()>,
{
    fn apply(&mut self, resource: R) {
        self.metrics
            .applies
            .get_or_create(&KindLabels::of::<R>())
            .inc();
        self.inner.write().apply(resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.metrics
            .deletes
            .get_or_create(&KindLabels::of::<R>())
            .inc();
        self.inner.write().delete(namespace, name);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        self.metrics
            .resets
            .get_or_create(&KindLabels::of::<R>())
            .inc();
        self.inner.write().reset(resources, removed);
    }
}

impl KindLabels {
    fn of<R: Resource<DynamicType = ()>>() -> Self {
        Self {
            kind: R::kind(&()).to_string(),
        }
    }
}

// === impl CacheCollector ===

impl Collector for CacheCollector {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let exported_encoder = encoder.encode_descriptor(
            "exported_services",
            "The number of services currently exported",
            None,
            MetricType::Gauge,
        )?;
        let exported = ConstGauge::new(self.0.exported_count() as i64);
        exported.encode(exported_encoder)?;

        let pending_encoder = encoder.encode_descriptor(
            "pending_pushes",
            "The number of services with an undispatched push",
            None,
            MetricType::Gauge,
        )?;
        let pending = ConstGauge::new(self.0.notifier().pending() as i64);
        pending.encode(pending_encoder)?;

        Ok(())
    }
}
