use linkerd_export_controller_core::{ClusterId, ServiceRef};

/// Holds cluster metadata.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// Identifies this cluster within the mesh.
    ///
    /// Every endpoint discovered by the local registry originates in this cluster.
    pub cluster_id: ClusterId,

    /// E.g. "cluster.local"
    pub dns_domain: String,
}

impl ClusterInfo {
    pub fn service_hostname(&self, service: &ServiceRef) -> String {
        format!(
            "{}.{}.svc.{}",
            service.name, service.namespace, self.dns_domain
        )
    }
}
