//! Labels applied to node set pods and StatefulSets

use std::collections::BTreeMap;

use semver::Version;

use eskube_common::version;
use eskube_settings::{Node, NodeRole};

/// Resource type label
pub const TYPE_LABEL: &str = "common.k8s.elastic.co/type";
/// Value of [`TYPE_LABEL`]
pub const TYPE: &str = "elasticsearch";
/// Cluster name label
pub const CLUSTER_NAME_LABEL: &str = "elasticsearch.k8s.elastic.co/cluster-name";
/// StatefulSet name label
pub const STATEFULSET_NAME_LABEL: &str = "elasticsearch.k8s.elastic.co/statefulset-name";
/// Elasticsearch version label
pub const VERSION_LABEL: &str = "elasticsearch.k8s.elastic.co/version";
/// HTTP scheme label
pub const HTTP_SCHEME_LABEL: &str = "elasticsearch.k8s.elastic.co/http-scheme";

const ROLE_LABEL_PREFIX: &str = "elasticsearch.k8s.elastic.co/node-";

/// Label of a role, such as `elasticsearch.k8s.elastic.co/node-master`
pub fn role_label(role: NodeRole) -> String {
    format!("{ROLE_LABEL_PREFIX}{}", role.as_str())
}

/// Version from which a role gets a label
fn role_label_min_version(role: NodeRole) -> Option<(u64, u64, u64)> {
    match role {
        NodeRole::Master | NodeRole::Data | NodeRole::Ingest | NodeRole::Ml => None,
        NodeRole::VotingOnly => Some((7, 3, 0)),
        NodeRole::Transform | NodeRole::RemoteClusterClient => Some((7, 7, 0)),
        NodeRole::DataContent | NodeRole::DataHot | NodeRole::DataWarm | NodeRole::DataCold => {
            Some((7, 10, 0))
        }
        NodeRole::DataFrozen => Some((7, 12, 0)),
    }
}

/// Labels identifying a cluster
pub fn cluster_labels(cluster: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_NAME_LABEL.to_string(), cluster.to_string()),
        (TYPE_LABEL.to_string(), TYPE.to_string()),
    ])
}

/// Labels selecting the pods of a StatefulSet
pub fn statefulset_labels(cluster: &str, statefulset: &str) -> BTreeMap<String, String> {
    let mut labels = cluster_labels(cluster);
    labels.insert(STATEFULSET_NAME_LABEL.to_string(), statefulset.to_string());
    labels
}

/// Labels of a node set pod
///
/// Role labels only exist for versions where the role does.
pub fn pod_labels(
    cluster: &str,
    statefulset: &str,
    ver: &Version,
    node: &Node,
    scheme: &str,
) -> BTreeMap<String, String> {
    let mut labels = statefulset_labels(cluster, statefulset);
    labels.insert(VERSION_LABEL.to_string(), ver.to_string());
    for role in NodeRole::ALL {
        let labelled = role_label_min_version(role)
            .map(|(major, minor, patch)| version::at_least(ver, major, minor, patch))
            .unwrap_or(true);
        if labelled {
            labels.insert(
                role_label(role),
                node.is_configured_with_role(role).to_string(),
            );
        }
    }
    labels.insert(HTTP_SCHEME_LABEL.to_string(), scheme.to_string());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[&str]) -> Node {
        Node {
            roles: Some(list.iter().map(|r| r.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Story: role labels appear as the roles are introduced
    #[test]
    fn story_role_labels_follow_version() {
        let node = Node::default();

        // Scenario: 7.2 only knows the original roles
        let labels = pod_labels("es", "es-es-default", &version::from(7, 2, 0), &node, "https");
        assert_eq!(labels.get("elasticsearch.k8s.elastic.co/node-master").map(String::as_str), Some("true"));
        assert!(!labels.contains_key("elasticsearch.k8s.elastic.co/node-voting_only"));
        assert!(!labels.contains_key("elasticsearch.k8s.elastic.co/node-transform"));

        // Scenario: 7.10 labels the data tiers
        let labels = pod_labels("es", "es-es-default", &version::from(7, 10, 0), &node, "https");
        assert_eq!(labels.get("elasticsearch.k8s.elastic.co/node-voting_only").map(String::as_str), Some("false"));
        assert_eq!(labels.get("elasticsearch.k8s.elastic.co/node-data_hot").map(String::as_str), Some("true"));
        assert!(!labels.contains_key("elasticsearch.k8s.elastic.co/node-data_frozen"));

        // Scenario: 8.x labels everything
        let labels = pod_labels("es", "es-es-default", &version::from(8, 12, 0), &roles(&["master"]), "http");
        assert_eq!(labels.len(), 17);
        assert_eq!(labels.get("elasticsearch.k8s.elastic.co/node-data").map(String::as_str), Some("false"));
        assert_eq!(labels.get(HTTP_SCHEME_LABEL).map(String::as_str), Some("http"));
        assert_eq!(labels.get(VERSION_LABEL).map(String::as_str), Some("8.12.0"));
        assert_eq!(labels.get(STATEFULSET_NAME_LABEL).map(String::as_str), Some("es-es-default"));
        assert_eq!(labels.get(TYPE_LABEL).map(String::as_str), Some("elasticsearch"));
    }
}
