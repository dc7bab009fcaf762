#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod multicluster;

pub use self::multicluster::{ServiceExport, ServiceExportSpec, ServiceExportStatus};
pub use k8s_openapi::api::{
    self,
    core::v1::{Service, ServicePort, ServiceSpec},
    discovery::v1::{Endpoint, EndpointConditions, EndpointPort, EndpointSlice},
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Client, Resource,
};
