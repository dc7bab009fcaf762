use std::{collections::BTreeMap, fmt, net::SocketAddr, sync::Arc};

/// Identifies the cluster in which a workload is registered or a proxy is running.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(Arc<str>);

/// Identifies a service within the registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRef {
    pub namespace: String,
    pub name: String,
}

/// A network endpoint backing a service.
///
/// Endpoints are owned by the registry; visibility decisions are derived from them but never
/// written back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub service: ServiceRef,

    /// The cluster in which the endpoint was registered.
    pub cluster: ClusterId,

    pub addr: SocketAddr,

    /// Opaque to visibility decisions.
    pub labels: BTreeMap<String, String>,
}

/// A connected data-plane proxy requesting configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proxy {
    pub cluster: ClusterId,
    pub namespace: String,
}

// === impl ClusterId ===

impl ClusterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for ClusterId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl std::str::FromStr for ClusterId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// === impl ServiceRef ===

impl ServiceRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Proxy ===

impl Proxy {
    pub fn new(cluster: impl Into<ClusterId>, namespace: impl ToString) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.to_string(),
        }
    }
}
