use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Marks the service of the same name and namespace as visible to every cluster in the mesh.
///
/// The resource carries no configuration; its presence is the signal.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "multicluster.x-k8s.io",
    version = "v1alpha1",
    kind = "ServiceExport",
    status = "ServiceExportStatus",
    schema = "disabled",
    namespaced
)]
pub struct ServiceExportSpec {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ServiceExportCondition>,
}

/// Conditions are written by the multi-cluster implementation, e.g. `Valid` or `Conflict`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn api_version() {
        assert_eq!(ServiceExport::api_version(&()), "multicluster.x-k8s.io/v1alpha1");
        assert_eq!(ServiceExport::kind(&()), "ServiceExport");
    }

    #[test]
    fn deserializes_without_status() {
        let export: ServiceExport = serde_json::from_value(serde_json::json!({
            "apiVersion": "multicluster.x-k8s.io/v1alpha1",
            "kind": "ServiceExport",
            "metadata": {
                "name": "test-svc",
                "namespace": "test-ns",
            },
            "spec": {},
        }))
        .expect("must deserialize");
        assert_eq!(export.metadata.name.as_deref(), Some("test-svc"));
        assert_eq!(export.metadata.namespace.as_deref(), Some("test-ns"));
        assert!(export.status.is_none());
    }

    #[test]
    fn deserializes_conditions() {
        let status: ServiceExportStatus = serde_json::from_value(serde_json::json!({
            "conditions": [{
                "type": "Valid",
                "status": "True",
                "lastTransitionTime": "2024-01-01T00:00:00Z",
            }],
        }))
        .expect("must deserialize");
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].type_, "Valid");
        assert_eq!(status.conditions[0].reason, None);
    }
}
