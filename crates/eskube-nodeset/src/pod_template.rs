//! Pod template of a node set
//!
//! The template is built from controller defaults and then merged with the
//! user's `podTemplate`. User fields win on the Elasticsearch container and
//! on volumes of the same name; controller labels and annotations win on
//! their own keys.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, Capabilities, Container, ContainerPort, EnvVar, EnvVarSource, ExecAction,
    Lifecycle, LifecycleHandler, ObjectFieldSelector, PersistentVolumeClaim, PodAffinityTerm,
    PodAntiAffinity, PodSecurityContext, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    SeccompProfile, SecurityContext, Volume, VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use semver::Version;

use eskube_common::crd::{Elasticsearch, NodeSet};
use eskube_common::{names, version, Error, Result};
use eskube_settings::{unpack, CanonicalConfig, PolicyConfig};

use crate::hash::ContentHasher;
use crate::keystore::KeystoreResources;
use crate::labels::{pod_labels, CLUSTER_NAME_LABEL};
use crate::scripts::{pre_stop_command, prepare_fs_command, readiness_probe_command, Scripts};
use crate::service::{HTTP_PORT, TRANSPORT_PORT, TRANSPORT_PORT_NAME};
use crate::volumes::{
    build_volumes, data_mount, probe_password_path, VolumeInputs, DATA_VOLUME_NAME,
    PROBE_USER_NAME,
};

/// Annotation holding the hash of everything a pod reads at startup
pub const CONFIG_HASH_ANNOTATION: &str = "elasticsearch.k8s.elastic.co/config-hash";
/// Annotation set when self-signed transport certificates are disabled
pub const TRANSPORT_CERTS_DISABLED_ANNOTATION: &str =
    "eck.k8s.elastic.co/transport-certificates-disabled";
/// Name of the filesystem init container
pub const INIT_FILESYSTEM_CONTAINER_NAME: &str = "elastic-internal-init-filesystem";

/// Seconds Elasticsearch gets to shut down
pub const DEFAULT_TERMINATION_GRACE_PERIOD_SECONDS: i64 = 180;
const DEFAULT_MEMORY: &str = "2Gi";
const DEFAULT_FS_GROUP: i64 = 1000;
const ES_JAVA_OPTS: &str = "ES_JAVA_OPTS";
const LOG4J_NO_LOOKUPS: &str = "-Dlog4j2.formatMsgNoLookups";

/// Inputs to the pod template of a node set
pub struct PodTemplateInputs<'a> {
    /// Cluster
    pub es: &'a Elasticsearch,
    /// Node set being built
    pub node_set: &'a NodeSet,
    /// Merged configuration of the node set
    pub config: &'a CanonicalConfig,
    /// Rendered scripts of the cluster
    pub scripts: &'a Scripts,
    /// Keystore material, when secure settings exist
    pub keystore: Option<&'a KeystoreResources>,
    /// Operator policy
    pub policy: &'a PolicyConfig,
    /// Claim templates of the StatefulSet
    pub claims: &'a [PersistentVolumeClaim],
    /// Apply the default pod security context on versions running as non-root
    pub set_default_security_context: bool,
}

fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn value_env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn default_env(es: &Elasticsearch, headless_service: &str) -> Vec<EnvVar> {
    vec![
        field_env("POD_IP", "status.podIP"),
        field_env("POD_NAME", "metadata.name"),
        field_env("NODE_NAME", "spec.nodeName"),
        field_env("NAMESPACE", "metadata.namespace"),
        value_env("PROBE_PASSWORD_PATH", probe_password_path()),
        value_env("PROBE_USERNAME", PROBE_USER_NAME),
        value_env("READINESS_PROBE_PROTOCOL", es.spec.http.protocol()),
        value_env("HEADLESS_SERVICE_NAME", headless_service),
        value_env("NSS_SDB_USE_CACHE", "no"),
    ]
}

fn default_resources() -> ResourceRequirements {
    let memory = BTreeMap::from([("memory".to_string(), Quantity(DEFAULT_MEMORY.to_string()))]);
    ResourceRequirements {
        requests: Some(memory.clone()),
        limits: Some(memory),
        ..Default::default()
    }
}

fn readiness_probe() -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(readiness_probe_command()),
        }),
        failure_threshold: Some(3),
        initial_delay_seconds: Some(10),
        period_seconds: Some(5),
        success_threshold: Some(1),
        timeout_seconds: Some(5),
        ..Default::default()
    }
}

fn pre_stop_hook() -> Lifecycle {
    Lifecycle {
        pre_stop: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(pre_stop_command()),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn default_affinity(cluster: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 100,
                    pod_affinity_term: PodAffinityTerm {
                        topology_key: "kubernetes.io/hostname".to_string(),
                        label_selector: Some(LabelSelector {
                            match_labels: Some(BTreeMap::from([(
                                CLUSTER_NAME_LABEL.to_string(),
                                cluster.to_string(),
                            )])),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Container security context for versions running as non-root
fn container_security_context(ver: &Version, read_only_root: bool) -> Option<SecurityContext> {
    if !version::at_least(ver, 8, 0, 0) {
        return None;
    }
    Some(SecurityContext {
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        privileged: Some(false),
        read_only_root_filesystem: Some(read_only_root),
        run_as_non_root: Some(true),
        ..Default::default()
    })
}

fn pod_security_context() -> PodSecurityContext {
    PodSecurityContext {
        fs_group: Some(DEFAULT_FS_GROUP),
        seccomp_profile: Some(SeccompProfile {
            type_: "RuntimeDefault".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Merge items keyed by name: `overrides` replace same-named `base` items in
/// place, the others are appended
fn merge_by_key<T: Clone, K: PartialEq>(base: &[T], overrides: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut merged = base.to_vec();
    for item in overrides {
        match merged.iter_mut().find(|m| key(m) == key(item)) {
            Some(existing) => *existing = item.clone(),
            None => merged.push(item.clone()),
        }
    }
    merged
}

fn merge_mounts(base: &[VolumeMount], overrides: &[VolumeMount]) -> Vec<VolumeMount> {
    let mut merged: Vec<VolumeMount> = base
        .iter()
        .filter(|m| {
            !overrides
                .iter()
                .any(|o| o.name == m.name || o.mount_path == m.mount_path)
        })
        .cloned()
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}

/// Apply the user's Elasticsearch container on top of the default one
fn merge_container(defaults: Container, user: Option<&Container>) -> Container {
    let Some(user) = user else {
        return defaults;
    };
    let mut merged = user.clone();
    merged.image = user.image.clone().or(defaults.image);
    merged.resources = user.resources.clone().or(defaults.resources);
    merged.readiness_probe = user.readiness_probe.clone().or(defaults.readiness_probe);
    merged.lifecycle = user.lifecycle.clone().or(defaults.lifecycle);
    merged.security_context = user.security_context.clone().or(defaults.security_context);
    merged.env = Some(merge_by_key(
        defaults.env.as_deref().unwrap_or_default(),
        user.env.as_deref().unwrap_or_default(),
        |e| e.name.clone(),
    ));
    merged.ports = Some(merge_by_key(
        defaults.ports.as_deref().unwrap_or_default(),
        user.ports.as_deref().unwrap_or_default(),
        |p| p.container_port,
    ));
    merged.volume_mounts = Some(merge_mounts(
        defaults.volume_mounts.as_deref().unwrap_or_default(),
        user.volume_mounts.as_deref().unwrap_or_default(),
    ));
    merged
}

/// Prepend the log4j mitigation to `ES_JAVA_OPTS` unless already present
fn enable_log4j_no_lookups(container: &mut Container) {
    let param = format!("{LOG4J_NO_LOOKUPS}=true");
    let env = container.env.get_or_insert_with(Vec::new);
    match env.iter_mut().find(|e| e.name == ES_JAVA_OPTS) {
        Some(opts) => {
            let current = opts.value.clone().unwrap_or_default();
            if current.is_empty() {
                opts.value = Some(param);
            } else if !current.contains(LOG4J_NO_LOOKUPS) {
                opts.value = Some(format!("{param} {current}"));
            }
        }
        None => env.push(value_env(ES_JAVA_OPTS, param)),
    }
}

/// Fill in what an init container inherits from the Elasticsearch container
fn with_init_defaults(mut init: Container, main: &Container) -> Container {
    if init.image.is_none() {
        init.image = main.image.clone();
    }
    init.env = Some(merge_by_key(
        main.env.as_deref().unwrap_or_default(),
        init.env.as_deref().unwrap_or_default(),
        |e| e.name.clone(),
    ));
    if init.security_context.is_none() {
        init.security_context = main.security_context.clone();
    }
    init
}

fn config_hash(inputs: &PodTemplateInputs<'_>) -> Result<String> {
    let mut hasher = ContentHasher::new();
    hasher.update_object(inputs.config)?;
    hasher.update(inputs.scripts.content().as_bytes());
    let node_labels = inputs.es.downward_node_labels();
    if !node_labels.is_empty() {
        hasher.update(node_labels.join(",").as_bytes());
    }
    if let Some(keystore) = inputs.keystore {
        hasher.update(keystore.hash.as_bytes());
    }
    Ok(hasher.finish())
}

fn annotations(inputs: &PodTemplateInputs<'_>) -> Result<BTreeMap<String, String>> {
    let mut annotations = BTreeMap::new();
    if !inputs.es.spec.transport.tls.self_signed_enabled() {
        annotations.insert(TRANSPORT_CERTS_DISABLED_ANNOTATION.to_string(), "true".to_string());
    }
    annotations.insert(CONFIG_HASH_ANNOTATION.to_string(), config_hash(inputs)?);
    annotations.extend(inputs.policy.policy_annotations.clone());
    Ok(annotations)
}

/// Build the pod template of a node set
pub fn build_pod_template(inputs: &PodTemplateInputs<'_>) -> Result<PodTemplateSpec> {
    let es = inputs.es;
    let cluster = es.metadata.name.as_deref().unwrap_or_default();
    let ver = version::parse(&es.spec.version).map_err(|e| {
        Error::validation_for_field(cluster, "spec.version", format!("{}: {e}", es.spec.version))
    })?;
    let statefulset = names::statefulset(cluster, &inputs.node_set.name);
    let headless_service = names::headless_service(&statefulset);

    let user = inputs.node_set.pod_template.clone().unwrap_or_default();
    let user_meta = user.metadata.unwrap_or_default();
    let user_spec = user.spec.unwrap_or_default();

    // volumes: controller defaults, then same-named user volumes replace them
    let layout = build_volumes(&VolumeInputs {
        cluster,
        statefulset: &statefulset,
        version: &ver,
        claims: inputs.claims,
        keystore: inputs.keystore.map(|k| &k.volume),
        downward_annotations: es.has_downward_node_labels(),
        policy_mounts: &inputs.policy.additional_volumes,
    });
    let volumes: Vec<Volume> = merge_by_key(
        &layout.volumes,
        user_spec.volumes.as_deref().unwrap_or_default(),
        |v| v.name.clone(),
    );
    let mut mounts = layout.mounts;
    let mut init_mounts = layout.init_mounts;
    let data = data_mount(&volumes);
    if let Some(data) = &data {
        mounts.push(data.clone());
        init_mounts.push(data.clone());
    }

    let settings = unpack(inputs.config, &ver)?;
    let mut labels = user_meta.labels.clone().unwrap_or_default();
    labels.extend(pod_labels(
        cluster,
        &statefulset,
        &ver,
        &settings.node,
        es.spec.http.protocol(),
    ));
    let mut annotations_map = user_meta.annotations.clone().unwrap_or_default();
    annotations_map.extend(annotations(inputs)?);

    let security_context = container_security_context(&ver, data.is_some());
    let defaults = Container {
        name: names::ELASTICSEARCH_CONTAINER_NAME.to_string(),
        image: Some(es.spec.image_or_default()),
        ports: Some(vec![
            ContainerPort {
                name: Some(es.spec.http.protocol().to_string()),
                container_port: HTTP_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                name: Some(TRANSPORT_PORT_NAME.to_string()),
                container_port: TRANSPORT_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ]),
        env: Some(default_env(es, &headless_service)),
        resources: Some(default_resources()),
        readiness_probe: Some(readiness_probe()),
        lifecycle: Some(pre_stop_hook()),
        volume_mounts: Some(mounts),
        security_context: security_context.clone(),
        ..Default::default()
    };
    let user_main = user_spec
        .containers
        .iter()
        .find(|c| c.name == names::ELASTICSEARCH_CONTAINER_NAME);
    let mut main = merge_container(defaults, user_main);
    if !version::at_least(&ver, 7, 2, 0) {
        enable_log4j_no_lookups(&mut main);
    }

    let mut containers = vec![main.clone()];
    containers.extend(
        user_spec
            .containers
            .iter()
            .filter(|c| c.name != names::ELASTICSEARCH_CONTAINER_NAME)
            .cloned(),
    );

    let mut init_containers = vec![Container {
        name: INIT_FILESYSTEM_CONTAINER_NAME.to_string(),
        command: Some(prepare_fs_command()),
        volume_mounts: Some(init_mounts),
        ..Default::default()
    }];
    if let Some(keystore) = inputs.keystore {
        init_containers.push(keystore.init_container.clone());
    }
    let init_containers = merge_by_key(
        &init_containers,
        user_spec.init_containers.as_deref().unwrap_or_default(),
        |c| c.name.clone(),
    )
    .into_iter()
    .map(|c| with_init_defaults(c, &main))
    .collect();

    let pod_security = match &user_spec.security_context {
        Some(user_ctx) => Some(user_ctx.clone()),
        None if inputs.set_default_security_context && version::at_least(&ver, 8, 0, 0) => {
            Some(pod_security_context())
        }
        None => None,
    };

    let spec = PodSpec {
        containers,
        init_containers: Some(init_containers),
        volumes: Some(volumes),
        security_context: pod_security,
        termination_grace_period_seconds: user_spec
            .termination_grace_period_seconds
            .or(Some(DEFAULT_TERMINATION_GRACE_PERIOD_SECONDS)),
        affinity: user_spec
            .affinity
            .clone()
            .or_else(|| Some(default_affinity(cluster))),
        ..user_spec
    };

    tracing::debug!(
        cluster = %cluster,
        node_set = %inputs.node_set.name,
        volumes = spec.volumes.as_ref().map(Vec::len).unwrap_or_default(),
        "built pod template"
    );

    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            annotations: Some(annotations_map),
            ..user_meta
        }),
        spec: Some(spec),
    })
}

/// True when the pod mounts a data volume
pub fn has_data_volume(template: &PodTemplateSpec) -> bool {
    template
        .spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .is_some_and(|v| v.iter().any(|v| v.name == DATA_VOLUME_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::claim_templates;
    use serde_json::json;

    fn cluster(version: &str, extra: serde_json::Value) -> Elasticsearch {
        let mut es = json!({
            "apiVersion": "elasticsearch.k8s.elastic.co/v1",
            "kind": "Elasticsearch",
            "metadata": {"name": "quickstart", "namespace": "search"},
            "spec": {"version": version, "nodeSets": [{"name": "default", "count": 3}]}
        });
        if let (Some(spec), Some(extra)) = (es["spec"].as_object_mut(), extra.as_object()) {
            spec.extend(extra.clone());
        }
        serde_json::from_value(es).expect("fixture should deserialize")
    }

    fn build(
        es: &Elasticsearch,
        node_set: &NodeSet,
        policy: &PolicyConfig,
        set_default_security_context: bool,
    ) -> PodTemplateSpec {
        let config = eskube_settings::node_set_config(es, node_set, policy).expect("config");
        let scripts = Scripts::render(es).expect("scripts");
        let claims = claim_templates(&node_set.volume_claim_templates);
        build_pod_template(&PodTemplateInputs {
            es,
            node_set,
            config: &config,
            scripts: &scripts,
            keystore: None,
            policy,
            claims: &claims,
            set_default_security_context,
        })
        .expect("pod template should build")
    }

    fn main_container(template: &PodTemplateSpec) -> &Container {
        template
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .expect("main container")
    }

    fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
        container
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    /// Story: a bare node set gets the full controller defaults
    #[test]
    fn story_default_pod_template() {
        let es = cluster("8.12.0", json!({}));
        let node_set = es.spec.node_sets[0].clone();
        let template = build(&es, &node_set, &PolicyConfig::default(), true);
        let spec = template.spec.as_ref().expect("spec");
        let main = main_container(&template);

        assert_eq!(main.name, "elasticsearch");
        assert_eq!(
            main.image.as_deref(),
            Some("docker.elastic.co/elasticsearch/elasticsearch:8.12.0")
        );
        let ports: Vec<(Option<&str>, i32)> = main
            .ports
            .iter()
            .flatten()
            .map(|p| (p.name.as_deref(), p.container_port))
            .collect();
        assert_eq!(ports, vec![(Some("https"), 9200), (Some("transport"), 9300)]);
        let env_names: Vec<&str> = main.env.iter().flatten().map(|e| e.name.as_str()).collect();
        assert_eq!(
            env_names,
            vec![
                "POD_IP",
                "POD_NAME",
                "NODE_NAME",
                "NAMESPACE",
                "PROBE_PASSWORD_PATH",
                "PROBE_USERNAME",
                "READINESS_PROBE_PROTOCOL",
                "HEADLESS_SERVICE_NAME",
                "NSS_SDB_USE_CACHE"
            ]
        );
        assert_eq!(env_value(main, "HEADLESS_SERVICE_NAME"), Some("quickstart-es-default"));
        assert_eq!(
            main.resources.as_ref().and_then(|r| r.limits.as_ref()).and_then(|l| l.get("memory")),
            Some(&Quantity("2Gi".to_string()))
        );
        assert_eq!(spec.termination_grace_period_seconds, Some(180));

        // Scenario: data volume mounted because the default claim exists
        assert!(main
            .volume_mounts
            .iter()
            .flatten()
            .any(|m| m.name == "elasticsearch-data" && m.mount_path == "/usr/share/elasticsearch/data"));

        // Scenario: init container runs the bootstrap script with inherited env
        let init = spec.init_containers.as_ref().and_then(|i| i.first()).expect("init");
        assert_eq!(init.name, INIT_FILESYSTEM_CONTAINER_NAME);
        assert_eq!(init.image, main.image);
        assert_eq!(
            init.command.as_ref().and_then(|c| c.last()).map(String::as_str),
            Some("/mnt/elastic-internal/scripts/prepare-fs.sh")
        );
        assert_eq!(env_value(init, "PROBE_USERNAME"), Some("elastic-internal-probe"));

        // Scenario: non-root versions get the pod security context
        let psc = spec.security_context.as_ref().expect("pod security context");
        assert_eq!(psc.fs_group, Some(1000));
        assert_eq!(
            psc.seccomp_profile.as_ref().map(|s| s.type_.as_str()),
            Some("RuntimeDefault")
        );

        let meta = template.metadata.as_ref().expect("metadata");
        let annotations = meta.annotations.as_ref().expect("annotations");
        assert_eq!(annotations.get(CONFIG_HASH_ANNOTATION).map(String::len), Some(16));
        assert!(!annotations.contains_key(TRANSPORT_CERTS_DISABLED_ANNOTATION));
    }

    #[test]
    fn test_security_context_opt_out_and_old_versions() {
        let es = cluster("8.12.0", json!({}));
        let node_set = es.spec.node_sets[0].clone();
        let template = build(&es, &node_set, &PolicyConfig::default(), false);
        assert!(template.spec.as_ref().and_then(|s| s.security_context.as_ref()).is_none());

        let es = cluster("7.17.0", json!({}));
        let template = build(&es, &node_set, &PolicyConfig::default(), true);
        assert!(template.spec.as_ref().and_then(|s| s.security_context.as_ref()).is_none());
    }

    /// Story: user template fields override the defaults, controller labels stay authoritative
    #[test]
    fn story_user_template_merge() {
        let es = cluster("8.12.0", json!({}));
        let node_set: NodeSet = serde_json::from_value(json!({
            "name": "default",
            "count": 1,
            "podTemplate": {
                "metadata": {
                    "labels": {"team": "search", "elasticsearch.k8s.elastic.co/cluster-name": "spoofed"},
                    "annotations": {"owner": "search-team"}
                },
                "spec": {
                    "terminationGracePeriodSeconds": 30,
                    "containers": [
                        {
                            "name": "elasticsearch",
                            "resources": {"limits": {"memory": "8Gi", "cpu": "2"}},
                            "env": [{"name": "ES_JAVA_OPTS", "value": "-Xms4g -Xmx4g"}, {"name": "NSS_SDB_USE_CACHE", "value": "yes"}]
                        },
                        {"name": "sidecar", "image": "busybox"}
                    ],
                    "volumes": [{"name": "elasticsearch-logs", "hostPath": {"path": "/var/log/es"}}]
                }
            }
        }))
        .expect("node set");

        let template = build(&es, &node_set, &PolicyConfig::default(), true);
        let spec = template.spec.as_ref().expect("spec");
        let main = main_container(&template);

        // Scenario: user resources and env win, defaults fill the rest
        assert_eq!(
            main.resources.as_ref().and_then(|r| r.limits.as_ref()).and_then(|l| l.get("memory")),
            Some(&Quantity("8Gi".to_string()))
        );
        assert_eq!(env_value(main, "NSS_SDB_USE_CACHE"), Some("yes"));
        assert_eq!(env_value(main, "ES_JAVA_OPTS"), Some("-Xms4g -Xmx4g"));
        assert!(main.image.is_some());
        assert!(main.readiness_probe.is_some());
        assert_eq!(spec.termination_grace_period_seconds, Some(30));

        // Scenario: sidecars are kept after the Elasticsearch container
        let names: Vec<&str> = spec.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["elasticsearch", "sidecar"]);

        // Scenario: a user volume replaces the default of the same name
        let logs = spec
            .volumes
            .iter()
            .flatten()
            .filter(|v| v.name == "elasticsearch-logs")
            .collect::<Vec<_>>();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].host_path.is_some());

        // Scenario: reserved labels cannot be spoofed
        let labels = template.metadata.as_ref().and_then(|m| m.labels.as_ref()).expect("labels");
        assert_eq!(labels.get("team").map(String::as_str), Some("search"));
        assert_eq!(
            labels.get("elasticsearch.k8s.elastic.co/cluster-name").map(String::as_str),
            Some("quickstart")
        );
        let annotations = template
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.as_ref())
            .expect("annotations");
        assert_eq!(annotations.get("owner").map(String::as_str), Some("search-team"));
    }

    #[test]
    fn test_log4j_mitigation_below_7_2() {
        let es = cluster("7.1.1", json!({}));
        let node_set: NodeSet = serde_json::from_value(json!({
            "name": "default",
            "count": 1,
            "podTemplate": {"spec": {"containers": [
                {"name": "elasticsearch", "env": [{"name": "ES_JAVA_OPTS", "value": "-Xms1g"}]}
            ]}}
        }))
        .expect("node set");
        let template = build(&es, &node_set, &PolicyConfig::default(), true);
        assert_eq!(
            env_value(main_container(&template), "ES_JAVA_OPTS"),
            Some("-Dlog4j2.formatMsgNoLookups=true -Xms1g")
        );

        let es = cluster("7.1.1", json!({}));
        let template = build(&es, &es.spec.node_sets[0].clone(), &PolicyConfig::default(), true);
        assert_eq!(
            env_value(main_container(&template), "ES_JAVA_OPTS"),
            Some("-Dlog4j2.formatMsgNoLookups=true")
        );

        let es = cluster("7.2.0", json!({}));
        let template = build(&es, &es.spec.node_sets[0].clone(), &PolicyConfig::default(), true);
        assert_eq!(env_value(main_container(&template), "ES_JAVA_OPTS"), None);
    }

    /// Story: the config hash tracks every input a pod reads at startup
    #[test]
    fn story_config_hash_inputs() {
        let hash = |es: &Elasticsearch, policy: &PolicyConfig| {
            let template = build(es, &es.spec.node_sets[0].clone(), policy, true);
            template
                .metadata
                .and_then(|m| m.annotations)
                .and_then(|a| a.get(CONFIG_HASH_ANNOTATION).cloned())
                .expect("hash")
        };
        let base = cluster("8.12.0", json!({}));
        let base_hash = hash(&base, &PolicyConfig::default());
        assert_eq!(base_hash, hash(&base, &PolicyConfig::default()));

        // Scenario: a policy setting changes the hash
        let policy = PolicyConfig::from_yaml("elasticsearch:\n  indices.recovery.max_bytes_per_sec: 100mb\n")
            .expect("policy");
        assert_ne!(base_hash, hash(&base, &policy));

        // Scenario: downward node labels change the hash
        let mut labelled = base.clone();
        labelled.metadata.annotations = Some(BTreeMap::from([(
            "eck.k8s.elastic.co/downward-node-labels".to_string(),
            "topology.kubernetes.io/zone".to_string(),
        )]));
        assert_ne!(base_hash, hash(&labelled, &PolicyConfig::default()));
    }

    #[test]
    fn test_transport_disabled_and_policy_annotations() {
        let es = cluster(
            "8.12.0",
            json!({"transport": {"tls": {"selfSignedCertificates": {"disabled": true}}}}),
        );
        let policy = PolicyConfig::from_yaml(
            "annotations:\n  policy.k8s.elastic.co/name: baseline\nsecretMounts:\n  - secretName: repo\n    mountPath: /mnt/repo\n",
        )
        .expect("policy");
        let template = build(&es, &es.spec.node_sets[0].clone(), &policy, true);
        let annotations = template
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.as_ref())
            .expect("annotations");
        assert_eq!(
            annotations.get(TRANSPORT_CERTS_DISABLED_ANNOTATION).map(String::as_str),
            Some("true")
        );
        assert_eq!(
            annotations.get("policy.k8s.elastic.co/name").map(String::as_str),
            Some("baseline")
        );
        assert!(main_container(&template)
            .volume_mounts
            .iter()
            .flatten()
            .any(|m| m.name == "repo" && m.mount_path == "/mnt/repo"));
    }

    #[test]
    fn test_no_data_mount_without_data_volume() {
        let es = cluster("8.12.0", json!({}));
        let node_set: NodeSet = serde_json::from_value(json!({
            "name": "default",
            "count": 1,
            "volumeClaimTemplates": [{"metadata": {"name": "scratch"}}]
        }))
        .expect("node set");
        let template = build(&es, &node_set, &PolicyConfig::default(), true);
        assert!(!has_data_volume(&template));
        let main = main_container(&template);
        assert!(!main.volume_mounts.iter().flatten().any(|m| m.name == "elasticsearch-data"));
        assert_eq!(
            main.security_context.as_ref().and_then(|s| s.read_only_root_filesystem),
            Some(false)
        );
    }
}
