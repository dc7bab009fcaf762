use crate::{
    core::{ClusterId, Switches},
    index::{
        self,
        metrics::{self, ExportMetrics, IndexMetrics, InstrumentedIndex, PushMetrics},
        ClusterInfo, ExportCache, ExportIndex, Notifier, PushSignal,
    },
    k8s::{self, Client, Resource},
    push,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use parking_lot::RwLock;
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "export", about = "A multi-cluster service export controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "linkerd=info,warn",
        env = "LINKERD_EXPORT_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Identifies the local cluster within the mesh.
    #[clap(long, env = "LINKERD_CLUSTER_ID")]
    cluster_id: ClusterId,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,

    /// Allows services exported with a `ServiceExport` to be discovered from other clusters.
    #[clap(long, env = "ENABLE_MCS_SERVICE_DISCOVERY")]
    mcs_discovery_enabled: bool,

    /// Keeps every service cluster-local, even when exported.
    #[clap(long, env = "ENABLE_MCS_CLUSTER_LOCAL")]
    mcs_cluster_local: bool,
}

/// The indexes and push pipeline fed by the controller's watches.
struct Controller {
    notifier: Arc<Notifier>,
    exports: Arc<RwLock<InstrumentedIndex<ExportIndex>>>,
    registry: Arc<RwLock<InstrumentedIndex<index::registry::Index>>>,
    pushes: mpsc::UnboundedReceiver<PushSignal>,
    delivered: Counter,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            cluster_id,
            cluster_domain,
            mcs_discovery_enabled,
            mcs_cluster_local,
        } = self;

        let switches = Switches {
            mcs_discovery_enabled,
            cluster_local_override: mcs_cluster_local,
        };
        let cluster_info = Arc::new(ClusterInfo {
            cluster_id,
            dns_domain: cluster_domain,
        });

        let mut prom = <Registry>::default();
        let Controller {
            notifier,
            exports,
            registry,
            pushes,
            delivered,
        } = Controller::new(switches, cluster_info.clone(), &mut prom);

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(
            cluster = %cluster_info.cluster_id,
            mcs_discovery_enabled,
            cluster_local_override = mcs_cluster_local,
            "Starting export controller"
        );

        // Spawn resource watches.

        if api_resource_exists::<k8s::ServiceExport>(&runtime.client()).await {
            let export_events = runtime.watch_all::<k8s::ServiceExport>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(exports, export_events)
                    .instrument(info_span!("serviceexports")),
            );
        } else {
            tracing::warn!(
                "serviceexports.multicluster.x-k8s.io resource kind not found, skipping watches"
            );
        }

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(registry.clone(), services)
                .instrument(info_span!("services")),
        );

        let endpoint_slices = runtime.watch_all::<k8s::EndpointSlice>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(registry, endpoint_slices)
                .instrument(info_span!("endpointslices")),
        );

        // Dispatch push signals as export state changes.
        tokio::spawn(notifier.run().instrument(info_span!("notifier")));
        tokio::spawn(push::process_signals(pushes, delivered).instrument(info_span!("push")));

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

// === impl Controller ===

impl Controller {
    fn new(switches: Switches, cluster_info: Arc<ClusterInfo>, prom: &mut Registry) -> Self {
        // Build the endpoint registry from which push signals are built, and the export cache
        // which publishes them.
        let registry = index::registry::Index::shared(cluster_info);
        let (push_tx, pushes) = mpsc::unbounded_channel();
        let export_reg = prom.sub_registry_with_prefix("export_cache");
        let notifier = Arc::new(Notifier::new(
            Arc::new(registry.clone()),
            Arc::new(push_tx),
            PushMetrics::register(export_reg),
        ));
        let cache = ExportCache::shared(
            switches,
            notifier.clone(),
            ExportMetrics::register(export_reg),
        );
        metrics::register_cache(export_reg, cache.clone());

        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("index"));

        let delivered = Counter::default();
        prom.sub_registry_with_prefix("push_pipeline").register(
            "signals",
            "Count of push signals received by the push pipeline",
            delivered.clone(),
        );

        Self {
            notifier,
            exports: index_metrics.wrap(ExportIndex::shared(cache)),
            registry: index_metrics.wrap(registry),
            pushes,
            delivered,
        }
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubert::index::IndexNamespacedResource;
    use std::collections::BTreeMap;

    fn mk_meta(name: &str) -> k8s::ObjectMeta {
        k8s::ObjectMeta {
            namespace: Some("ns".to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn watches_feed_push_pipeline() {
        let mut prom = <Registry>::default();
        let switches = Switches {
            mcs_discovery_enabled: true,
            cluster_local_override: false,
        };
        let cluster_info = Arc::new(ClusterInfo {
            cluster_id: "c1".into(),
            dns_domain: "cluster.local".to_string(),
        });
        let mut controller = Controller::new(switches, cluster_info, &mut prom);

        controller.registry.write().apply(k8s::Service {
            metadata: mk_meta("svc"),
            ..Default::default()
        });
        controller.registry.write().apply(k8s::EndpointSlice {
            metadata: k8s::ObjectMeta {
                labels: Some(BTreeMap::from([(
                    k8s::labels::SERVICE_NAME.to_string(),
                    "svc".to_string(),
                )])),
                ..mk_meta("svc-abcde")
            },
            address_type: "IPv4".to_string(),
            endpoints: vec![k8s::Endpoint {
                addresses: vec!["10.0.0.1".to_string()],
                ..Default::default()
            }],
            ports: Some(vec![k8s::EndpointPort {
                port: Some(8080),
                ..Default::default()
            }]),
        });
        controller.exports.write().apply(k8s::ServiceExport {
            metadata: mk_meta("svc"),
            spec: Default::default(),
            status: None,
        });

        assert_eq!(controller.notifier.dispatch_pending(), 1);
        let signal = controller.pushes.try_recv().expect("signal must be sent");
        assert!(signal.exported);
        assert_eq!(signal.hostname, "svc.ns.svc.cluster.local");
        assert_eq!(signal.endpoints.len(), 1);
        assert_eq!(controller.delivered.get(), 0);

        let mut text = String::new();
        prometheus_client::encoding::text::encode(&mut text, &prom).unwrap();
        assert!(text.contains("export_cache_transitions_total{exported=\"true\"} 1"));
        assert!(text.contains("export_cache_push_signals_total 1"));
        assert!(text.contains("index_applies_total{kind=\"Service\"} 1"));
        assert!(text.contains("index_applies_total{kind=\"EndpointSlice\"} 1"));
        assert!(text.contains("index_applies_total{kind=\"ServiceExport\"} 1"));
    }
}
