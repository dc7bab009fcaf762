//! Linkerd Export Controller
//!
//! The export controller decides, for every endpoint of a service registered in the local cluster,
//! whether proxies in other clusters may discover it. It watches the following cluster resources:
//!
//! - Each `ServiceExport` marks the service with the same namespace and name as exported. When
//!   an export is created or deleted, the service's exported flag flips and a push signal is
//!   queued so that the endpoint set is recomputed for every interested proxy.
//! - Each `Service` and `EndpointSlice` populates the endpoint registry from which push signals
//!   are built.
//!
//! ```text
//! [ ServiceExport ] -> [ ExportStore ] -> [ Notifier ] -> push pipeline
//!                            ^
//!                            |
//!      config generator -> [ ExportCache ] -> visible(..)
//! ```
//!
//! Export state is held in a sharded map so that watch updates never block configuration lookups
//! for longer than a single record update. Notifications are coalesced per service: a burst of
//! transitions produces a single push reflecting the final state.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cache;
mod cluster_info;
pub mod metrics;
pub mod notify;
pub mod registry;
mod store;


pub use self::{
    cache::{ExportCache, ExportIndex, SharedExportIndex},
    cluster_info::ClusterInfo,
    notify::{Notifier, PushSignal, PushSink},
    registry::{EndpointRegistry, RegistryError},
    store::ExportStore,
};
