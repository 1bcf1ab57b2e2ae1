//! Elasticsearch Custom Resource Definition
//!
//! The Elasticsearch CRD describes a whole cluster: its version, HTTP and
//! transport layers, secure settings and the node sets that make it up.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::change_budget::UpdateStrategy;
use super::node_set::NodeSet;

/// API group of the Elasticsearch resource
pub const GROUP: &str = "elasticsearch.k8s.elastic.co";

/// API version of the Elasticsearch resource
pub const API_VERSION: &str = "elasticsearch.k8s.elastic.co/v1";

/// Kind of the Elasticsearch resource
pub const KIND: &str = "Elasticsearch";

/// Default container image repository
pub const DEFAULT_IMAGE_REPOSITORY: &str = "docker.elastic.co/elasticsearch/elasticsearch";

/// Annotation disabling the no-downgrade check on updates
pub const DISABLE_DOWNGRADE_VALIDATION_ANNOTATION: &str =
    "eck.k8s.elastic.co/disable-downgrade-validation";

/// Annotation listing node labels exposed to the pods as annotations
pub const DOWNWARD_NODE_LABELS_ANNOTATION: &str = "eck.k8s.elastic.co/downward-node-labels";

/// Specification of an Elasticsearch cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elasticsearch.k8s.elastic.co",
    version = "v1",
    kind = "Elasticsearch",
    plural = "elasticsearches",
    shortname = "es",
    status = "ElasticsearchStatus",
    namespaced,
    printcolumn = r#"{"name":"Health","type":"string","jsonPath":".status.health"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    /// Elasticsearch version, `{major}.{minor}.{patch}[-{label}]`
    pub version: String,

    /// Container image, defaults to the official image for the version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// HTTP layer settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Transport layer settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Node sets making up the cluster
    #[serde(default)]
    pub node_sets: Vec<NodeSet>,

    /// How changes are rolled out
    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    /// Secrets whose entries are loaded into the Elasticsearch keystore
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,
}

impl ElasticsearchSpec {
    /// Container image, falling back to the official image for the version
    pub fn image_or_default(&self) -> String {
        match &self.image {
            Some(image) if !image.is_empty() => image.clone(),
            _ => format!("{DEFAULT_IMAGE_REPOSITORY}:{}", self.version),
        }
    }
}

/// HTTP layer settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// TLS options of the HTTP layer
    #[serde(default)]
    pub tls: TlsOptions,
}

impl HttpConfig {
    /// Scheme served by the HTTP layer: `https` unless TLS is explicitly disabled
    pub fn protocol(&self) -> &'static str {
        if self.tls.enabled() {
            "https"
        } else {
            "http"
        }
    }
}

/// TLS options of the HTTP layer
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// Self-signed certificate generated by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_signed_certificate: Option<SelfSignedCertificate>,

    /// User-provided certificate secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<SecretRef>,
}

impl TlsOptions {
    /// TLS is on unless the self-signed certificate is disabled without a custom one
    pub fn enabled(&self) -> bool {
        let self_signed_disabled = self
            .self_signed_certificate
            .as_ref()
            .map(|s| s.disabled)
            .unwrap_or(false);
        self.certificate.is_some() || !self_signed_disabled
    }
}

/// Self-signed certificate options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignedCertificate {
    /// Extra subject alternative names of the certificate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alt_names: Vec<SubjectAlternativeName>,

    /// Disable the generated certificate
    #[serde(default)]
    pub disabled: bool,
}

/// A subject alternative name: a DNS name or an IP address
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAlternativeName {
    /// DNS name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,

    /// IP address literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Transport layer settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// TLS options of the transport layer
    #[serde(default)]
    pub tls: TransportTlsOptions,
}

/// TLS options of the transport layer
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportTlsOptions {
    /// Self-signed transport certificates issued per pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_signed_certificates: Option<SelfSignedTransportCertificates>,
}

impl TransportTlsOptions {
    /// Per-pod self-signed transport certificates are issued unless disabled
    pub fn self_signed_enabled(&self) -> bool {
        !self
            .self_signed_certificates
            .as_ref()
            .map(|s| s.disabled)
            .unwrap_or(false)
    }
}

/// Self-signed transport certificates options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignedTransportCertificates {
    /// Disable the per-pod certificates
    #[serde(default)]
    pub disabled: bool,
}

/// Reference to a secret by name
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Name of the secret
    pub secret_name: String,
}

/// A secret whose entries are exposed to Elasticsearch
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    /// Name of the secret
    pub secret_name: String,

    /// Keys to project, all keys when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<KeyToPath>,
}

/// A secret key and the path it is exposed under
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyToPath {
    /// Key in the secret
    pub key: String,

    /// Path to expose the key under, defaults to the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Observed state of an Elasticsearch cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchStatus {
    /// Lowest version currently running in the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Reconciliation phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Cluster health as reported by Elasticsearch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,

    /// The generation of the spec that was last processed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Elasticsearch {
    /// True when the user opted out of the no-downgrade check
    pub fn is_configured_to_allow_downgrades(&self) -> bool {
        self.annotations()
            .get(DISABLE_DOWNGRADE_VALIDATION_ANNOTATION)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Node labels to expose to the pods, in annotation order
    pub fn downward_node_labels(&self) -> Vec<String> {
        self.annotations()
            .get(DOWNWARD_NODE_LABELS_ANNOTATION)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when node labels are exposed to the pods
    pub fn has_downward_node_labels(&self) -> bool {
        !self.downward_node_labels().is_empty()
    }

    /// Lowest running version if known
    pub fn status_version(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.version.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Namespace of the resource, `default` when unset
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn sample_cluster() -> Elasticsearch {
        serde_yaml::from_str(
            r#"
apiVersion: elasticsearch.k8s.elastic.co/v1
kind: Elasticsearch
metadata:
  name: quickstart
  namespace: search
  annotations:
    eck.k8s.elastic.co/downward-node-labels: "topology.kubernetes.io/zone, topology.kubernetes.io/region"
spec:
  version: 8.12.0
  http:
    tls:
      selfSignedCertificate:
        subjectAltNames:
          - ip: 10.0.0.1
          - dns: search.example.com
  nodeSets:
    - name: default
      count: 3
      config:
        node.store.allow_mmap: false
  updateStrategy:
    changeBudget:
      maxUnavailable: 2
"#,
        )
        .expect("sample cluster should parse")
    }

    /// Story: a user manifest round-trips into typed fields
    #[test]
    fn story_manifest_parses_into_typed_spec() {
        let es = sample_cluster();
        assert_eq!(es.spec.version, "8.12.0");
        assert_eq!(es.spec.node_sets.len(), 1);
        assert_eq!(es.spec.node_sets[0].count, 3);
        assert_eq!(
            es.spec.update_strategy.change_budget.max_unavailable,
            Some(2)
        );
        let sans = &es
            .spec
            .http
            .tls
            .self_signed_certificate
            .as_ref()
            .expect("self-signed options")
            .subject_alt_names;
        assert_eq!(sans[0].ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(es.namespace_or_default(), "search");
    }

    #[test]
    fn test_image_defaults_to_official_repository() {
        let mut es = sample_cluster();
        assert_eq!(
            es.spec.image_or_default(),
            "docker.elastic.co/elasticsearch/elasticsearch:8.12.0"
        );
        es.spec.image = Some("registry.local/es:custom".to_string());
        assert_eq!(es.spec.image_or_default(), "registry.local/es:custom");
    }

    #[test]
    fn test_http_protocol() {
        let mut es = sample_cluster();
        assert_eq!(es.spec.http.protocol(), "https");
        es.spec.http.tls.self_signed_certificate = Some(SelfSignedCertificate {
            disabled: true,
            ..Default::default()
        });
        assert_eq!(es.spec.http.protocol(), "http");
        es.spec.http.tls.certificate = Some(SecretRef {
            secret_name: "my-cert".to_string(),
        });
        assert_eq!(es.spec.http.protocol(), "https");
    }

    #[test]
    fn test_transport_self_signed_toggle() {
        let mut es = sample_cluster();
        assert!(es.spec.transport.tls.self_signed_enabled());
        es.spec.transport.tls.self_signed_certificates =
            Some(SelfSignedTransportCertificates { disabled: true });
        assert!(!es.spec.transport.tls.self_signed_enabled());
    }

    /// Story: annotations drive downgrade checks and downward node labels
    #[test]
    fn story_annotations_are_interpreted() {
        let mut es = sample_cluster();
        assert!(!es.is_configured_to_allow_downgrades());
        assert_eq!(
            es.downward_node_labels(),
            vec!["topology.kubernetes.io/zone", "topology.kubernetes.io/region"]
        );
        assert!(es.has_downward_node_labels());

        es.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(
                DISABLE_DOWNGRADE_VALIDATION_ANNOTATION.to_string(),
                "true".to_string(),
            );
        assert!(es.is_configured_to_allow_downgrades());
    }

    #[test]
    fn test_status_version_ignores_empty() {
        let mut es = sample_cluster();
        assert_eq!(es.status_version(), None);
        es.status = Some(ElasticsearchStatus {
            version: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(es.status_version(), None);
        es.status = Some(ElasticsearchStatus {
            version: Some("7.17.0".to_string()),
            ..Default::default()
        });
        assert_eq!(es.status_version(), Some("7.17.0"));
    }

    #[test]
    fn test_crd_metadata() {
        let crd = Elasticsearch::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("elasticsearches.elasticsearch.k8s.elastic.co")
        );
        assert_eq!(crd.spec.group, GROUP);
    }
}
