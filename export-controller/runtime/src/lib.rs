pub use linkerd_export_controller_core as core;
pub use linkerd_export_controller_k8s_api as k8s;
pub use linkerd_export_controller_k8s_index as index;

mod args;
mod push;

pub use self::args::Args;
