use k8s_openapi::api::discovery::v1::EndpointSlice;
use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

/// Set on every `EndpointSlice` managed by the endpoint-slice controller, naming the `Service` that
/// owns it.
pub const SERVICE_NAME: &str = "kubernetes.io/service-name";

/// Returns the name of the `Service` that owns the given slice, if any.
pub fn owning_service(slice: &EndpointSlice) -> Option<&str> {
    service_name(slice.metadata.labels.as_ref()?)
}

pub fn service_name(labels: &Map) -> Option<&str> {
    labels
        .get(SERVICE_NAME)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn service_name_label() {
        let labels = btreemap! {
            SERVICE_NAME.to_string() => "test-svc".to_string(),
            "app".to_string() => "prod-app".to_string(),
        };
        assert_eq!(service_name(&labels), Some("test-svc"));
    }

    #[test]
    fn empty_service_name_ignored() {
        let labels = btreemap! { SERVICE_NAME.to_string() => String::new() };
        assert_eq!(service_name(&labels), None);
        assert_eq!(service_name(&Map::new()), None);
    }

    #[test]
    fn unlabeled_slice() {
        assert_eq!(owning_service(&EndpointSlice::default()), None);
    }
}
