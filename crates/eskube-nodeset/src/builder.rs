//! Node set build pipeline
//!
//! [`NodeSetBuilder`] turns one node set of a cluster into the StatefulSet
//! and headless service that run it. Building is pure: the live StatefulSet
//! is an input, never fetched.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PodTemplateSpec, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use serde::Serialize;

use eskube_common::crd::{ChangeBudget, Elasticsearch, NodeSet};
use eskube_common::{names, Result};
use eskube_settings::{CanonicalConfig, PolicyConfig};

use crate::claims::{claim_templates, preserve_claim_templates};
use crate::hash::hash_object;
use crate::keystore::KeystoreResources;
use crate::labels::statefulset_labels;
use crate::pod_template::{build_pod_template, PodTemplateInputs};
use crate::resources::NodeSetResources;
use crate::scripts::Scripts;
use crate::service::headless_service;

/// Annotation holding the content hash of a built StatefulSet
pub const STATEFULSET_HASH_ANNOTATION: &str = "elasticsearch.k8s.elastic.co/statefulset-hash";

const ON_DELETE: &str = "OnDelete";
const PARALLEL: &str = "Parallel";

/// Everything built for one node set
#[derive(Clone, Debug)]
pub struct BuildArtifact {
    /// StatefulSet running the node set
    pub statefulset: StatefulSet,
    /// Headless service of the StatefulSet
    pub headless_service: Service,
    /// Merged configuration of the node set
    pub config: CanonicalConfig,
    /// Hash of the StatefulSet content
    pub content_hash: String,
    /// Change budget the rollout has to respect
    pub change_budget: ChangeBudget,
}

impl BuildArtifact {
    /// View consumed by the desired-nodes compiler
    pub fn resources(&self, node_set: &str) -> NodeSetResources {
        NodeSetResources {
            node_set: node_set.to_string(),
            statefulset: self.statefulset.clone(),
            headless_service: self.headless_service.clone(),
            config: self.config.clone(),
        }
    }
}

/// The parts of a StatefulSet that define what runs
#[derive(Serialize)]
struct HashedContent<'a> {
    replicas: i32,
    labels: &'a BTreeMap<String, String>,
    template: &'a PodTemplateSpec,
    claims: &'a [PersistentVolumeClaim],
}

/// Builder for the resources of one node set
pub struct NodeSetBuilder<'a> {
    es: &'a Elasticsearch,
    node_set: &'a NodeSet,
    config: &'a CanonicalConfig,
    keystore: Option<KeystoreResources>,
    policy: Option<&'a PolicyConfig>,
    existing: Option<&'a StatefulSet>,
    default_security_context: bool,
}

impl<'a> NodeSetBuilder<'a> {
    /// Create a builder for `node_set` with its merged configuration
    pub fn new(es: &'a Elasticsearch, node_set: &'a NodeSet, config: &'a CanonicalConfig) -> Self {
        Self {
            es,
            node_set,
            config,
            keystore: None,
            policy: None,
            existing: None,
            default_security_context: true,
        }
    }

    /// Keystore material of the cluster
    pub fn with_keystore(mut self, keystore: Option<KeystoreResources>) -> Self {
        self.keystore = keystore;
        self
    }

    /// Operator policy of the cluster
    pub fn with_policy(mut self, policy: &'a PolicyConfig) -> Self {
        self.policy = Some(policy);
        self
    }

    /// The StatefulSet currently running the node set, if any
    pub fn with_existing(mut self, existing: Option<&'a StatefulSet>) -> Self {
        self.existing = existing;
        self
    }

    /// Whether to apply the default pod security context
    pub fn with_default_security_context(mut self, enabled: bool) -> Self {
        self.default_security_context = enabled;
        self
    }

    /// Build the node set resources
    pub fn build(self) -> Result<BuildArtifact> {
        let es = self.es;
        let cluster = es.metadata.name.as_deref().unwrap_or_default();
        let statefulset_name = names::statefulset(cluster, &self.node_set.name);
        let default_policy = PolicyConfig::default();
        let policy = self.policy.unwrap_or(&default_policy);

        let claims = preserve_claim_templates(
            es,
            &claim_templates(&self.node_set.volume_claim_templates),
            self.existing,
        );
        let scripts = Scripts::render(es)?;
        let template = build_pod_template(&PodTemplateInputs {
            es,
            node_set: self.node_set,
            config: self.config,
            scripts: &scripts,
            keystore: self.keystore.as_ref(),
            policy,
            claims: &claims,
            set_default_security_context: self.default_security_context,
        })?;

        let labels = statefulset_labels(cluster, &statefulset_name);
        let content_hash = hash_object(&HashedContent {
            replicas: self.node_set.count,
            labels: &labels,
            template: &template,
            claims: &claims,
        })?;

        let statefulset = StatefulSet {
            metadata: ObjectMeta {
                name: Some(statefulset_name.clone()),
                namespace: Some(es.namespace_or_default()),
                labels: Some(labels.clone()),
                annotations: Some(BTreeMap::from([(
                    STATEFULSET_HASH_ANNOTATION.to_string(),
                    content_hash.clone(),
                )])),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(self.node_set.count),
                service_name: Some(names::headless_service(&statefulset_name)),
                selector: LabelSelector {
                    match_labels: Some(labels),
                    ..Default::default()
                },
                template,
                volume_claim_templates: Some(claims),
                update_strategy: Some(StatefulSetUpdateStrategy {
                    type_: Some(ON_DELETE.to_string()),
                    ..Default::default()
                }),
                pod_management_policy: Some(PARALLEL.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        tracing::debug!(
            cluster = %cluster,
            node_set = %self.node_set.name,
            hash = %content_hash,
            "built node set"
        );

        Ok(BuildArtifact {
            headless_service: headless_service(es, &statefulset_name),
            statefulset,
            config: self.config.clone(),
            content_hash,
            change_budget: es.spec.update_strategy.change_budget.clone(),
        })
    }
}
