//! Rendering every node set of a cluster
//!
//! Runs the same steps as a reconcile, without applying anything: the
//! resource is validated, each node set gets its merged configuration and
//! built resources, and the desired nodes are derived from the result. Live
//! StatefulSets and claims are read through a [`ClusterStateStore`].

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Serialize;

use eskube_common::crd::Elasticsearch;
use eskube_common::{Error, Result};
use eskube_nodeset::{
    to_desired_nodes, BuildArtifact, ClusterStateStore, DesiredNodes, KeystoreResources,
    NodeSetBuilder, NodeSetResources, Scripts,
};
use eskube_settings::{node_set_config, PolicyConfig};
use eskube_validation::validate_create;

/// Options of a render
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Operator policy applied to every node set
    pub policy: PolicyConfig,
    /// Apply the default pod security context
    pub set_default_security_context: bool,
}

/// One built node set
#[derive(Clone, Debug)]
pub struct RenderedNodeSet {
    /// Name of the node set
    pub name: String,
    /// Built resources
    pub artifact: BuildArtifact,
}

/// Everything built for a cluster
#[derive(Clone, Debug)]
pub struct RenderedCluster {
    /// Scripts ConfigMap shared by every node set
    pub scripts: ConfigMap,
    /// Built node sets, in declaration order
    pub node_sets: Vec<RenderedNodeSet>,
}

/// Validate and build every node set of `es`
pub async fn render_cluster(
    es: &Elasticsearch,
    store: &dyn ClusterStateStore,
    options: &RenderOptions,
) -> Result<RenderedCluster> {
    let cluster = es.metadata.name.as_deref().unwrap_or_default();
    if let Some(err) = validate_create(es).into_error(cluster) {
        return Err(err);
    }
    let namespace = es.namespace_or_default();

    let scripts = Scripts::render(es)?.config_map(es);
    let keystore = KeystoreResources::for_cluster(es)?;

    let mut node_sets = Vec::with_capacity(es.spec.node_sets.len());
    for node_set in &es.spec.node_sets {
        let config = node_set_config(es, node_set, &options.policy)?;
        let statefulset = eskube_common::names::statefulset(cluster, &node_set.name);
        let existing = store.get_statefulset(&namespace, &statefulset).await?;
        let artifact = NodeSetBuilder::new(es, node_set, &config)
            .with_keystore(keystore.clone())
            .with_policy(&options.policy)
            .with_existing(existing.as_ref())
            .with_default_security_context(options.set_default_security_context)
            .build()?;
        node_sets.push(RenderedNodeSet {
            name: node_set.name.clone(),
            artifact,
        });
    }

    tracing::info!(cluster = %cluster, node_sets = node_sets.len(), "rendered cluster");
    Ok(RenderedCluster { scripts, node_sets })
}

fn to_yaml<T: Serialize>(kind: &str, object: &T) -> Result<String> {
    serde_yaml::to_string(object).map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
}

impl RenderedCluster {
    /// Views consumed by the desired-nodes compiler
    pub fn resources(&self) -> Vec<NodeSetResources> {
        self.node_sets
            .iter()
            .map(|ns| ns.artifact.resources(&ns.name))
            .collect()
    }

    /// Desired nodes of the cluster running `version`
    pub async fn desired_nodes(
        &self,
        store: &dyn ClusterStateStore,
        version: &str,
    ) -> Result<DesiredNodes> {
        to_desired_nodes(store, &self.resources(), version).await
    }

    /// Multi-document YAML of every built object
    pub fn to_yaml(&self) -> Result<String> {
        let mut docs = vec![to_yaml("ConfigMap", &self.scripts)?];
        for ns in &self.node_sets {
            docs.push(to_yaml("Service", &ns.artifact.headless_service)?);
            docs.push(to_yaml("StatefulSet", &ns.artifact.statefulset)?);
        }
        Ok(docs.join("---\n"))
    }
}
