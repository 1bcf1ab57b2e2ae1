//! Per-node compute and storage resources
//!
//! Converts the Elasticsearch container resources of a built StatefulSet and
//! the live state of its claims into one [`NodeResource`] per pod, then into
//! the desired-nodes declaration sent to Elasticsearch.
//!
//! Missing information is aggregated into a single
//! [`Error::ResourceNotAvailable`] per node set. Claims that are not bound yet
//! are not errors: the estimate is returned with `requeue` set.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaim, ResourceRequirements, Service,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use serde::Serialize;

use eskube_common::{names, version, Error, Result};
use eskube_settings::visit::{HEADLESS_SERVICE_NAME_VAR, NAMESPACE_VAR, POD_NAME_VAR};
use eskube_settings::{visit, CanonicalConfig, Value, VariableReplacer};

use crate::quantity::{parse_quantity, ParsedQuantity};
use crate::store::ClusterStateStore;

const CPU: &str = "cpu";
const MEMORY: &str = "memory";
const STORAGE: &str = "storage";

/// Everything built for one node set that the resource compiler reads
#[derive(Clone, Debug)]
pub struct NodeSetResources {
    /// Name of the node set
    pub node_set: String,
    /// Built StatefulSet
    pub statefulset: StatefulSet,
    /// Built headless service
    pub headless_service: Service,
    /// Merged configuration
    pub config: CanonicalConfig,
}

/// Processors available to a node: the request as minimum, the limit as maximum
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProcessorsRange {
    /// Guaranteed processors
    pub min: f64,
    /// Processor ceiling, absent when unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ProcessorsRange {
    /// Single processor count: the limit when set, else the request
    pub fn single(&self) -> f64 {
        self.max.unwrap_or(self.min)
    }
}

/// Resources of one pod
#[derive(Clone, Debug, PartialEq)]
pub struct NodeResource {
    /// Pod name
    pub name: String,
    /// Processors
    pub cpu: ProcessorsRange,
    /// Memory in bytes
    pub memory_bytes: i64,
    /// Data storage in bytes
    pub storage_bytes: i64,
    /// The storage value is provisional
    pub requeue: bool,
}

/// A node of the desired-nodes declaration
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DesiredNode {
    /// Version the node runs
    pub node_version: String,
    /// Processor count, before 8.3.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<f64>,
    /// Processor range, from 8.3.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors_range: Option<ProcessorsRange>,
    /// Memory as `{bytes}b`
    pub memory: String,
    /// Storage as `{bytes}b`
    pub storage: String,
    /// Node settings with per-pod placeholders resolved
    pub settings: serde_json::Value,
}

/// Desired nodes of a cluster
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesiredNodes {
    /// One entry per pod, in node set order
    pub nodes: Vec<DesiredNode>,
    /// At least one value is provisional; compute again later
    pub requeue: bool,
}

#[derive(Default)]
struct ResourceReasons {
    node_set: String,
    reasons: Vec<String>,
}

impl ResourceReasons {
    fn add(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    fn into_error(self) -> Error {
        Error::resource_not_available(self.node_set, self.reasons)
    }
}

fn quantity(
    list: Option<&BTreeMap<String, Quantity>>,
    resource: &str,
    reasons: &mut ResourceReasons,
) -> Option<ParsedQuantity> {
    let q = list?.get(resource)?;
    match parse_quantity(q) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            reasons.add(format!("{resource}: {e}"));
            None
        }
    }
}

fn processors(
    resources: Option<&ResourceRequirements>,
    reasons: &mut ResourceReasons,
) -> Option<ProcessorsRange> {
    let limit = quantity(resources.and_then(|r| r.limits.as_ref()), CPU, reasons);
    let request = quantity(resources.and_then(|r| r.requests.as_ref()), CPU, reasons);

    if limit.is_some_and(|l| l.is_zero()) {
        reasons.add("CPU limit is set but value is 0");
        return None;
    }
    if request.is_some_and(|r| r.is_zero()) {
        reasons.add("CPU request is set but value is 0");
        return None;
    }
    match (request, limit) {
        (None, None) => {
            reasons.add("no CPU request or limit set");
            None
        }
        // the platform defaults the request to the limit
        (None, Some(limit)) => Some(ProcessorsRange {
            min: limit.as_f64(),
            max: Some(limit.as_f64()),
        }),
        (Some(request), limit) => Some(ProcessorsRange {
            min: request.as_f64(),
            max: limit.map(|l| l.as_f64()),
        }),
    }
}

fn memory(resources: Option<&ResourceRequirements>, reasons: &mut ResourceReasons) -> Option<i64> {
    let has_limit = resources
        .and_then(|r| r.limits.as_ref())
        .is_some_and(|l| l.contains_key(MEMORY));
    if !has_limit {
        reasons.add("memory limit is not set");
        return None;
    }
    let limit = quantity(resources.and_then(|r| r.limits.as_ref()), MEMORY, reasons)?;
    let request = quantity(resources.and_then(|r| r.requests.as_ref()), MEMORY, reasons);
    if request.is_some_and(|r| r != limit) {
        reasons.add("memory request and limit do not have the same value");
        return None;
    }
    if limit.is_zero() {
        reasons.add("Memory limit is set but value is 0");
        return None;
    }
    Some(limit.value())
}

fn claimed_storage(claim: &PersistentVolumeClaim) -> Option<ParsedQuantity> {
    let q = claim.spec.as_ref()?.resources.as_ref()?.requests.as_ref()?.get(STORAGE)?;
    parse_quantity(q).ok()
}

fn status_capacity(claim: &PersistentVolumeClaim) -> Option<i64> {
    let q = claim.status.as_ref()?.capacity.as_ref()?.get(STORAGE)?;
    parse_quantity(q).ok().map(|p| p.value())
}

/// Find the Elasticsearch container of a StatefulSet
pub fn elasticsearch_container(sts: &StatefulSet) -> Option<&Container> {
    sts.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == names::ELASTICSEARCH_CONTAINER_NAME)
}

fn missing_container(sts: &StatefulSet) -> Error {
    Error::internal_with_context(
        "desired-nodes",
        format!(
            "cannot find Elasticsearch container in StatefulSet {}/{}",
            sts.namespace().unwrap_or_default(),
            sts.name_any()
        ),
    )
}

/// Compute the resources of every pod of a node set
///
/// Returns the resources and whether any of them is provisional.
pub async fn compute_node_resources(
    store: &dyn ClusterStateStore,
    resources: &NodeSetResources,
) -> Result<(Vec<NodeResource>, bool)> {
    let sts = &resources.statefulset;
    let container = elasticsearch_container(sts).ok_or_else(|| missing_container(sts))?;

    let mut reasons = ResourceReasons {
        node_set: resources.node_set.clone(),
        ..Default::default()
    };
    let cpu = processors(container.resources.as_ref(), &mut reasons);
    let memory_bytes = memory(container.resources.as_ref(), &mut reasons);

    let path_data = match resources.config.get("path.data") {
        Some(Value::String(path)) => path.clone(),
        _ => {
            reasons.add("Elasticsearch path.data must be a string, multiple paths is not supported");
            return Err(reasons.into_error());
        }
    };

    let Some(volume_name) = container
        .volume_mounts
        .iter()
        .flatten()
        .find(|m| m.mount_path == path_data)
        .map(|m| m.name.clone())
    else {
        reasons.add(format!("Elasticsearch path.data {path_data} must be mounted by a volume"));
        return Err(reasons.into_error());
    };

    let claim_templates = sts
        .spec
        .as_ref()
        .and_then(|s| s.volume_claim_templates.as_ref());
    let Some(claim) = claim_templates
        .into_iter()
        .flatten()
        .find(|c| c.metadata.name.as_deref() == Some(volume_name.as_str()))
    else {
        reasons.add(format!(
            "Volume claim with name \"{volume_name}\" not found in Spec.VolumeClaimTemplates"
        ));
        return Err(reasons.into_error());
    };

    let Some(claimed) = claimed_storage(claim) else {
        reasons.add(format!("No storage request in claim \"{volume_name}\""));
        return Err(reasons.into_error());
    };

    let (Some(cpu), Some(memory_bytes)) = (cpu, memory_bytes) else {
        return Err(reasons.into_error());
    };
    if !reasons.reasons.is_empty() {
        return Err(reasons.into_error());
    }

    let namespace = sts.namespace().unwrap_or_default();
    let replicas = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    let mut nodes = Vec::with_capacity(usize::try_from(replicas).unwrap_or_default());
    for pod in names::pods(&sts.name_any(), replicas) {
        let pvc_name = names::pvc(&volume_name, &pod);
        let (storage_bytes, requeue) = match store.get_pvc(&namespace, &pvc_name).await? {
            None => {
                tracing::debug!(node_set = %resources.node_set, pvc = %pvc_name, "claim not found, using claimed storage");
                (claimed.value(), true)
            }
            Some(pvc) => match status_capacity(&pvc) {
                Some(capacity) => (capacity, false),
                None => (
                    claimed_storage(&pvc).unwrap_or(claimed).value(),
                    true,
                ),
            },
        };
        nodes.push(NodeResource {
            name: pod,
            cpu,
            memory_bytes,
            storage_bytes,
            requeue,
        });
    }

    let requeue = nodes.iter().any(|n| n.requeue);
    Ok((nodes, requeue))
}

/// Project the resources of every node set into desired nodes
pub async fn to_desired_nodes(
    store: &dyn ClusterStateStore,
    node_sets: &[NodeSetResources],
    node_version: &str,
) -> Result<DesiredNodes> {
    let ver = version::parse(node_version)
        .map_err(|e| Error::internal_with_context("desired-nodes", format!("version {node_version}: {e}")))?;
    let with_range = version::at_least(&ver, 8, 3, 0);

    let mut desired = DesiredNodes::default();
    for resources in node_sets {
        let sts = &resources.statefulset;
        let (nodes, requeue) = compute_node_resources(store, resources).await?;
        desired.requeue |= requeue;

        let namespace = sts.namespace().unwrap_or_default();
        let service = resources.headless_service.name_any();
        for node in nodes {
            let replacer = VariableReplacer::new()
                .with(POD_NAME_VAR, node.name.as_str())
                .with(NAMESPACE_VAR, namespace.as_str())
                .with(HEADLESS_SERVICE_NAME_VAR, service.as_str());
            let mut settings = resources.config.to_nested();
            visit(&mut settings, &|s| replacer.replace(s));

            desired.nodes.push(DesiredNode {
                node_version: node_version.to_string(),
                processors: (!with_range).then(|| node.cpu.single()),
                processors_range: with_range.then_some(node.cpu),
                memory: format!("{}b", node.memory_bytes),
                storage: format!("{}b", node.storage_bytes),
                settings,
            });
        }
    }
    tracing::debug!(nodes = desired.nodes.len(), requeue = desired.requeue, "computed desired nodes");
    Ok(desired)
}
