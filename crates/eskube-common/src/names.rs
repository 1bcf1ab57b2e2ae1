//! Names of the resources generated for an Elasticsearch cluster

/// Longest accepted Elasticsearch resource name
///
/// Leaves room for the longest generated suffix within the 63 character
/// label value limit.
pub const MAX_ELASTICSEARCH_NAME_LENGTH: usize = 36;

/// Longest accepted node set name
pub const MAX_NODE_SET_NAME_LENGTH: usize = 23;

/// Kubernetes DNS label limit, applied to StatefulSet and pod names
pub const MAX_NAME_LENGTH: usize = 63;

/// Name of the Elasticsearch container in every pod
pub const ELASTICSEARCH_CONTAINER_NAME: &str = "elasticsearch";

const ES_SUFFIX: &str = "es";

fn es_name(cluster: &str, suffix: &str) -> String {
    format!("{cluster}-{ES_SUFFIX}-{suffix}")
}

/// StatefulSet backing a node set: `{cluster}-es-{nodeset}`
pub fn statefulset(cluster: &str, node_set: &str) -> String {
    es_name(cluster, node_set)
}

/// Headless service of a StatefulSet (same name as the StatefulSet)
pub fn headless_service(statefulset: &str) -> String {
    statefulset.to_string()
}

/// Pod name for an ordinal of a StatefulSet
pub fn pod(statefulset: &str, ordinal: i32) -> String {
    format!("{statefulset}-{ordinal}")
}

/// Pod names of a StatefulSet with the given replica count
pub fn pods(statefulset: &str, replicas: i32) -> Vec<String> {
    (0..replicas.max(0)).map(|i| pod(statefulset, i)).collect()
}

/// PersistentVolumeClaim created by a StatefulSet claim template for a pod
pub fn pvc(claim_template: &str, pod: &str) -> String {
    format!("{claim_template}-{pod}")
}

/// ConfigMap holding the generated scripts
pub fn scripts_config_map(cluster: &str) -> String {
    es_name(cluster, "scripts")
}

/// Secret holding the rendered elasticsearch.yml of a StatefulSet
pub fn config_secret(statefulset: &str) -> String {
    es_name(statefulset, "config")
}

/// Secret holding the transport certificates of a StatefulSet
pub fn transport_certificates_secret(statefulset: &str) -> String {
    es_name(statefulset, "transport-certs")
}

/// Secret holding the HTTP certificates of the cluster
pub fn http_certificates_secret(cluster: &str) -> String {
    es_name(cluster, "http-certs-internal")
}

/// Secret holding the transport CA certificates of remote clusters
pub fn remote_ca_secret(cluster: &str) -> String {
    es_name(cluster, "remote-ca")
}

/// Secret holding the file realm users and roles
pub fn xpack_file_realm_secret(cluster: &str) -> String {
    es_name(cluster, "xpack-file-realm")
}

/// Secret holding the internal probe user credentials
pub fn internal_users_secret(cluster: &str) -> String {
    es_name(cluster, "internal-users")
}

/// Secret holding the file-based settings
pub fn file_settings_secret(cluster: &str) -> String {
    es_name(cluster, "file-settings")
}

/// Secret aggregating the user secure settings
pub fn secure_settings_secret(cluster: &str) -> String {
    es_name(cluster, "secure-settings")
}

/// Length of the suffix appended to a StatefulSet name for its highest pod ordinal
pub fn pod_ordinal_suffix_len(count: i32) -> usize {
    // "-" plus the digits of the last ordinal
    1 + (count - 1).max(0).to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        let sts = statefulset("quickstart", "default");
        assert_eq!(sts, "quickstart-es-default");
        assert_eq!(headless_service(&sts), "quickstart-es-default");
        assert_eq!(pod(&sts, 2), "quickstart-es-default-2");
        assert_eq!(
            pvc("elasticsearch-data", "quickstart-es-default-0"),
            "elasticsearch-data-quickstart-es-default-0"
        );
        assert_eq!(scripts_config_map("quickstart"), "quickstart-es-scripts");
        assert_eq!(
            transport_certificates_secret(&sts),
            "quickstart-es-default-es-transport-certs"
        );
    }

    #[test]
    fn test_pods_and_ordinal_suffix() {
        assert_eq!(pods("a-es-b", 2), vec!["a-es-b-0", "a-es-b-1"]);
        assert!(pods("a-es-b", 0).is_empty());
        assert_eq!(pod_ordinal_suffix_len(1), 2);
        assert_eq!(pod_ordinal_suffix_len(10), 2);
        assert_eq!(pod_ordinal_suffix_len(11), 3);
        assert_eq!(pod_ordinal_suffix_len(0), 2);
    }
}
