use crate::ClusterInfo;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use linkerd_export_controller_core::{ClusterId, Endpoint, ServiceRef};
use linkerd_export_controller_k8s_api::{self as k8s, labels, ResourceExt};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

/// Resolves services to their current endpoints.
pub trait EndpointRegistry: Send + Sync {
    fn hostname(&self, service: &ServiceRef) -> String;

    fn endpoints(&self, service: &ServiceRef) -> Result<Vec<Endpoint>, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("service {0} is not known to the registry")]
    UnknownService(ServiceRef),
}

pub type SharedIndex = Arc<RwLock<Index>>;

/// Indexes the local cluster's `Service` and `EndpointSlice` resources.
#[derive(Debug)]
pub struct Index {
    cluster_info: Arc<ClusterInfo>,
    services: HashSet<ServiceRef>,

    /// Endpoints by service, then by slice name.
    endpoints: HashMap<ServiceRef, BTreeMap<String, Vec<Endpoint>>>,

    /// Slice name (as a namespaced reference) to the service that owns it.
    slice_owners: HashMap<ServiceRef, ServiceRef>,
}

// === impl Index ===

impl Index {
    pub fn shared(cluster_info: Arc<ClusterInfo>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            cluster_info,
            services: HashSet::new(),
            endpoints: HashMap::new(),
            slice_owners: HashMap::new(),
        }))
    }

    pub fn endpoints(&self, service: &ServiceRef) -> Result<Vec<Endpoint>, RegistryError> {
        match self.endpoints.get(service) {
            Some(slices) => Ok(slices.values().flatten().cloned().collect()),
            None if self.services.contains(service) => Ok(Vec::new()),
            None => Err(RegistryError::UnknownService(service.clone())),
        }
    }

    fn remove_slice(&mut self, slice: &ServiceRef) {
        let Some(service) = self.slice_owners.remove(slice) else {
            return;
        };
        if let Some(slices) = self.endpoints.get_mut(&service) {
            slices.remove(&slice.name);
            if slices.is_empty() {
                self.endpoints.remove(&service);
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Service> for Index {
    fn apply(&mut self, service: k8s::Service) {
        let Some(namespace) = service.namespace() else {
            tracing::warn!(name = %service.name_unchecked(), "Ignoring Service without a namespace");
            return;
        };
        self.services
            .insert(ServiceRef::new(namespace, service.name_unchecked()));
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.services.remove(&ServiceRef { namespace, name });
    }
}

impl kubert::index::IndexNamespacedResource<k8s::EndpointSlice> for Index {
    fn apply(&mut self, slice: k8s::EndpointSlice) {
        let Some(namespace) = slice.namespace() else {
            tracing::warn!(name = %slice.name_unchecked(), "Ignoring EndpointSlice without a namespace");
            return;
        };
        let id = ServiceRef::new(&namespace, slice.name_unchecked());

        let Some(service) = labels::owning_service(&slice).map(|name| ServiceRef::new(&namespace, name))
        else {
            tracing::debug!(%namespace, name = %id.name, "Ignoring EndpointSlice without a service");
            self.remove_slice(&id);
            return;
        };

        let endpoints = mk_endpoints(&self.cluster_info.cluster_id, &service, &slice);
        tracing::debug!(%service, slice = %id.name, endpoints = endpoints.len(), "indexing EndpointSlice");

        if let Some(prior) = self.slice_owners.get(&id) {
            if *prior != service {
                self.remove_slice(&id);
            }
        }
        self.slice_owners.insert(id.clone(), service.clone());
        self.endpoints
            .entry(service)
            .or_default()
            .insert(id.name, endpoints);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove_slice(&ServiceRef { namespace, name });
    }
}

impl EndpointRegistry for SharedIndex {
    fn hostname(&self, service: &ServiceRef) -> String {
        self.read().cluster_info.service_hostname(service)
    }

    fn endpoints(&self, service: &ServiceRef) -> Result<Vec<Endpoint>, RegistryError> {
        self.read().endpoints(service)
    }
}

/// Builds an endpoint for each ready address and port in the slice.
fn mk_endpoints(
    cluster: &ClusterId,
    service: &ServiceRef,
    slice: &k8s::EndpointSlice,
) -> Vec<Endpoint> {
    if slice.address_type != "IPv4" && slice.address_type != "IPv6" {
        tracing::debug!(%service, address_type = %slice.address_type, "Skipping non-IP EndpointSlice");
        return Vec::new();
    }

    let ports = slice
        .ports
        .iter()
        .flatten()
        .filter_map(|p| p.port)
        .filter_map(|p| u16::try_from(p).ok())
        .collect::<Vec<_>>();
    let labels = slice.metadata.labels.clone().unwrap_or_default();

    let mut endpoints = Vec::new();
    for ep in slice.endpoints.iter() {
        // Kubernetes treats an unset condition as ready.
        let ready = ep
            .conditions
            .as_ref()
            .and_then(|c| c.ready)
            .unwrap_or(true);
        if !ready {
            continue;
        }
        for addr in ep.addresses.iter() {
            let ip = match addr.parse::<IpAddr>() {
                Ok(ip) => ip,
                Err(error) => {
                    tracing::warn!(%service, %addr, %error, "Invalid endpoint address");
                    continue;
                }
            };
            endpoints.extend(ports.iter().map(|port| Endpoint {
                service: service.clone(),
                cluster: cluster.clone(),
                addr: SocketAddr::new(ip, *port),
                labels: labels.clone(),
            }));
        }
    }
    endpoints
}
