//! Headless service giving node set pods stable DNS names

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use eskube_common::crd::Elasticsearch;
use eskube_common::names;

use crate::labels::statefulset_labels;

/// Elasticsearch HTTP port
pub const HTTP_PORT: i32 = 9200;
/// Elasticsearch transport port
pub const TRANSPORT_PORT: i32 = 9300;
/// Name of the transport port
pub const TRANSPORT_PORT_NAME: &str = "transport";

/// Build the headless service of a StatefulSet
///
/// Not-ready pods are published so nodes can discover each other while the
/// cluster forms.
pub fn headless_service(es: &Elasticsearch, statefulset: &str) -> Service {
    let cluster = es.metadata.name.as_deref().unwrap_or_default();
    let labels = statefulset_labels(cluster, statefulset);
    let protocol = es.spec.http.protocol();
    Service {
        metadata: ObjectMeta {
            name: Some(names::headless_service(statefulset)),
            namespace: Some(es.namespace_or_default()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            selector: Some(labels),
            ports: Some(vec![
                ServicePort {
                    name: Some(protocol.to_string()),
                    port: HTTP_PORT,
                    target_port: Some(IntOrString::Int(HTTP_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                },
                ServicePort {
                    name: Some(TRANSPORT_PORT_NAME.to_string()),
                    port: TRANSPORT_PORT,
                    target_port: Some(IntOrString::Int(TRANSPORT_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headless_service() {
        let es: Elasticsearch = serde_json::from_value(json!({
            "apiVersion": "elasticsearch.k8s.elastic.co/v1",
            "kind": "Elasticsearch",
            "metadata": {"name": "quickstart", "namespace": "search"},
            "spec": {"version": "8.12.0", "http": {"tls": {"selfSignedCertificate": {"disabled": true}}}}
        }))
        .expect("fixture should deserialize");

        let svc = headless_service(&es, "quickstart-es-default");
        assert_eq!(svc.metadata.name.as_deref(), Some("quickstart-es-default"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("search"));
        let spec = svc.spec.expect("spec");
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        let selector = spec.selector.expect("selector");
        assert_eq!(
            selector.get("elasticsearch.k8s.elastic.co/statefulset-name").map(String::as_str),
            Some("quickstart-es-default")
        );
        let ports: Vec<(Option<String>, i32)> = spec
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(|p| (p.name, p.port))
            .collect();
        assert_eq!(
            ports,
            vec![
                (Some("http".to_string()), 9200),
                (Some("transport".to_string()), 9300)
            ]
        );
    }
}
