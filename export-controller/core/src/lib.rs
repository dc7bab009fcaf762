//! Core types for the multi-cluster export controller.
//!
//! Endpoints are registered in exactly one cluster. Whether a proxy running in another cluster may
//! discover them depends on whether the endpoint's service has been exported (via a
//! `ServiceExport` resource) and on the controller's global switches. This crate holds the types
//! shared by the index and the runtime, along with the stateless [`visible`] policy.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod discoverability;
mod endpoint;

pub use self::{
    discoverability::{visible, Discoverability, Switches},
    endpoint::{ClusterId, Endpoint, Proxy, ServiceRef},
};
