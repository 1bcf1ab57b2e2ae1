//! Shell scripts shipped to every node set pod
//!
//! The scripts live in one ConfigMap per cluster and are mounted at
//! [`SCRIPTS_MOUNT_PATH`]. Their content feeds the pod config hash, so a
//! script change rolls the pods.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use minijinja::{context, Environment};
use serde::Serialize;
use thiserror::Error;

use eskube_common::crd::Elasticsearch;
use eskube_common::names;
use eskube_settings::defaults::{DATA_PATH, LOGS_PATH};

use crate::labels::{cluster_labels, VERSION_LABEL};
use crate::volumes::{
    downward_annotations_path, downward_labels_path, init_local_path, probe_password_path,
    CONFIG_MOUNT_PATH, FILE_REALM_MOUNT_PATH, INIT_TRANSPORT_CERTS_MOUNT_PATH, PROBE_USER_NAME,
    SCRIPTS_MOUNT_PATH, TRANSPORT_CERTS_DISABLED_MARKER,
};

/// Bootstrap script run by the filesystem init container
pub const PREPARE_FS_SCRIPT: &str = "prepare-fs.sh";
/// Readiness probe script
pub const READINESS_PROBE_SCRIPT: &str = "readiness-probe-script.sh";
/// Pre-stop hook script
pub const PRE_STOP_HOOK_SCRIPT: &str = "pre-stop-hook-script.sh";

/// Exit code of the bootstrap script on an unsupported distribution
pub const UNSUPPORTED_DISTRIBUTION_EXIT_CODE: i32 = 42;
/// Default extra wait of the pre-stop hook, in seconds
pub const PRE_STOP_ADDITIONAL_WAIT_SECONDS: u32 = 50;
/// Attempts of each pre-stop API call
pub const PRE_STOP_RETRIES: u32 = 10;
/// DNS errors tolerated by the pre-stop hook before giving up
pub const PRE_STOP_MAX_DNS_ERRORS: u32 = 2;
/// First version supporting the node shutdown API
pub const NODE_SHUTDOWN_MIN_VERSION: (u64, u64, u64) = (7, 15, 2);

const HTTP_PORT: u16 = 9200;

const PREPARE_FS_TEMPLATE: &str = include_str!("../templates/prepare-fs.sh");
const READINESS_PROBE_TEMPLATE: &str = include_str!("../templates/readiness-probe-script.sh");
const PRE_STOP_HOOK_TEMPLATE: &str = include_str!("../templates/pre-stop-hook-script.sh");

const FILE_REALM_FILES: &[&str] = &["users", "users_roles", "roles.yml", "service_tokens"];

/// Script rendering failures
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template failed to parse or render
    #[error("failed to render {name}: {source}")]
    Render {
        /// Script name
        name: &'static str,
        /// Underlying template error
        #[source]
        source: minijinja::Error,
    },
}

impl From<TemplateError> for eskube_common::Error {
    fn from(err: TemplateError) -> Self {
        eskube_common::Error::internal_with_context("scripts", err.to_string())
    }
}

#[derive(Serialize)]
struct PathPair {
    source: String,
    target: String,
}

fn render(
    name: &'static str,
    template: &str,
    ctx: minijinja::Value,
) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.add_template(name, template)
        .map_err(|source| TemplateError::Render { name, source })?;
    env.get_template(name)
        .and_then(|t| t.render(ctx))
        .map_err(|source| TemplateError::Render { name, source })
}

/// Render the bootstrap script
///
/// Node labels, when set, make the script wait for the matching pod
/// annotations before Elasticsearch starts.
pub fn render_prepare_fs(node_labels: &[String]) -> Result<String, TemplateError> {
    let config_local = init_local_path("config");
    let mut linked_files = vec![PathPair {
        source: format!("{CONFIG_MOUNT_PATH}/elasticsearch.yml"),
        target: format!("{config_local}/elasticsearch.yml"),
    }];
    linked_files.extend(FILE_REALM_FILES.iter().map(|file| PathPair {
        source: format!("{FILE_REALM_MOUNT_PATH}/{file}"),
        target: format!("{config_local}/{file}"),
    }));

    let persisted_dirs: Vec<PathPair> = ["plugins", "bin", "config"]
        .into_iter()
        .map(|dir| PathPair {
            source: format!("/usr/share/elasticsearch/{dir}"),
            target: init_local_path(dir),
        })
        .collect();

    render(
        PREPARE_FS_SCRIPT,
        PREPARE_FS_TEMPLATE,
        context! {
            unsupported_distribution_exit_code => UNSUPPORTED_DISTRIBUTION_EXIT_CODE,
            linked_files => linked_files,
            persisted_dirs => persisted_dirs,
            chown_dirs => vec![DATA_PATH, LOGS_PATH],
            transport_certificates_key_path =>
                format!("{INIT_TRANSPORT_CERTS_MOUNT_PATH}/${{POD_NAME}}.tls.key"),
            transport_certificates_disabled_marker =>
                format!("{INIT_TRANSPORT_CERTS_MOUNT_PATH}/{TRANSPORT_CERTS_DISABLED_MARKER}"),
            expose_node_labels => !node_labels.is_empty(),
            node_labels => node_labels.join(","),
            node_label_list => node_labels,
            downward_annotations_file => downward_annotations_path(),
        },
    )
}

/// Render the readiness probe script
pub fn render_readiness_probe() -> Result<String, TemplateError> {
    render(
        READINESS_PROBE_SCRIPT,
        READINESS_PROBE_TEMPLATE,
        context! {
            downward_labels_file => downward_labels_path(),
            version_label => VERSION_LABEL,
            http_port => HTTP_PORT,
        },
    )
}

/// Render the pre-stop hook script for a cluster
pub fn render_pre_stop_hook(es: &Elasticsearch) -> Result<String, TemplateError> {
    let (major, minor, patch) = NODE_SHUTDOWN_MIN_VERSION;
    let cluster = es.metadata.name.as_deref().unwrap_or_default();
    let service_url = format!(
        "{}://{cluster}-es-internal-http.{}.svc:{HTTP_PORT}",
        es.spec.http.protocol(),
        es.namespace_or_default()
    );
    render(
        PRE_STOP_HOOK_SCRIPT,
        PRE_STOP_HOOK_TEMPLATE,
        context! {
            pre_stop_additional_wait_seconds => PRE_STOP_ADDITIONAL_WAIT_SECONDS,
            max_dns_errors => PRE_STOP_MAX_DNS_ERRORS,
            retries => PRE_STOP_RETRIES,
            node_shutdown_min_version => format!("{major}.{minor}.{patch}"),
            node_shutdown_major => major,
            node_shutdown_minor => minor,
            node_shutdown_patch => patch,
            downward_labels_file => downward_labels_path(),
            version_label => VERSION_LABEL,
            probe_password_path => probe_password_path(),
            probe_username => PROBE_USER_NAME,
            service_url => service_url,
        },
    )
}

/// Rendered scripts of a cluster, keyed by file name
#[derive(Clone, Debug, PartialEq)]
pub struct Scripts {
    data: BTreeMap<String, String>,
}

impl Scripts {
    /// Render every script for a cluster
    pub fn render(es: &Elasticsearch) -> Result<Self, TemplateError> {
        let data = BTreeMap::from([
            (
                PREPARE_FS_SCRIPT.to_string(),
                render_prepare_fs(&es.downward_node_labels())?,
            ),
            (READINESS_PROBE_SCRIPT.to_string(), render_readiness_probe()?),
            (PRE_STOP_HOOK_SCRIPT.to_string(), render_pre_stop_hook(es)?),
        ]);
        Ok(Self { data })
    }

    /// Content of one script
    pub fn get(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(String::as_str)
    }

    /// Concatenated content in file name order, as fed to the config hash
    pub fn content(&self) -> String {
        self.data.values().map(String::as_str).collect()
    }

    /// The scripts ConfigMap of a cluster
    pub fn config_map(&self, es: &Elasticsearch) -> ConfigMap {
        let cluster = es.metadata.name.as_deref().unwrap_or_default();
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(names::scripts_config_map(cluster)),
                namespace: Some(es.namespace_or_default()),
                labels: Some(cluster_labels(cluster)),
                ..Default::default()
            },
            data: Some(self.data.clone()),
            ..Default::default()
        }
    }
}

/// Command of the filesystem init container
pub fn prepare_fs_command() -> Vec<String> {
    vec![
        "bash".to_string(),
        "-c".to_string(),
        format!("{SCRIPTS_MOUNT_PATH}/{PREPARE_FS_SCRIPT}"),
    ]
}

/// Command of the readiness probe
pub fn readiness_probe_command() -> Vec<String> {
    vec![
        "bash".to_string(),
        "-c".to_string(),
        format!("{SCRIPTS_MOUNT_PATH}/{READINESS_PROBE_SCRIPT}"),
    ]
}

/// Command of the pre-stop hook
pub fn pre_stop_command() -> Vec<String> {
    vec![
        "bash".to_string(),
        "-c".to_string(),
        format!("{SCRIPTS_MOUNT_PATH}/{PRE_STOP_HOOK_SCRIPT}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster(annotations: serde_json::Value) -> Elasticsearch {
        serde_json::from_value(json!({
            "apiVersion": "elasticsearch.k8s.elastic.co/v1",
            "kind": "Elasticsearch",
            "metadata": {"name": "quickstart", "namespace": "search", "annotations": annotations},
            "spec": {"version": "8.12.0", "nodeSets": [{"name": "default", "count": 1}]}
        }))
        .expect("fixture should deserialize")
    }

    /// Story: the bootstrap script guards the distribution and waits for certificates
    #[test]
    fn story_prepare_fs() {
        let script = render_prepare_fs(&[]).expect("script should render");

        // Scenario: unsupported distributions exit with the sentinel
        assert!(script.contains("exit 42"));

        // Scenario: the script waits for the key or the disabled marker
        assert!(script.contains(
            "INIT_CONTAINER_LOCAL_KEY_PATH=/mnt/elastic-internal/transport-certificates/${POD_NAME}.tls.key"
        ));
        assert!(script.contains("/mnt/elastic-internal/transport-certificates/transport.certs.disabled"));

        // Scenario: configuration and file realm are linked into the local config copy
        assert!(script.contains(
            "ln -sf /mnt/elastic-internal/elasticsearch-config/elasticsearch.yml /mnt/elastic-internal/elasticsearch-config-local/elasticsearch.yml"
        ));
        assert!(script.contains("cp -avf /usr/share/elasticsearch/plugins/* /mnt/elastic-internal/elasticsearch-plugins-local/"));
        assert!(script.contains("chown -v elasticsearch:elasticsearch /usr/share/elasticsearch/data"));

        // Scenario: no annotation wait without node labels
        assert!(!script.contains("REQUIRED_ANNOTATIONS"));

        let script = render_prepare_fs(&["topology.kubernetes.io/zone".to_string()])
            .expect("script should render");
        assert!(script.contains(r#"REQUIRED_ANNOTATIONS=("topology.kubernetes.io/zone" )"#));
        assert!(script.contains("/mnt/elastic-internal/downward-api/annotations"));
    }

    #[test]
    fn test_readiness_probe_defaults() {
        let script = render_readiness_probe().expect("script should render");
        assert!(script.contains("READINESS_PROBE_TIMEOUT=${READINESS_PROBE_TIMEOUT:=3}"));
        assert!(script.contains("${LOOPBACK}:9200/"));
        assert!(script.contains("grep \"elasticsearch.k8s.elastic.co/version\""));
    }

    /// Story: the pre-stop hook only calls node shutdown on versions supporting it
    #[test]
    fn story_pre_stop_hook() {
        let script = render_pre_stop_hook(&cluster(json!({}))).expect("script should render");
        assert!(script.contains("PRE_STOP_ADDITIONAL_WAIT_SECONDS=${PRE_STOP_ADDITIONAL_WAIT_SECONDS:=50}"));
        assert!(script.contains("max_dns_errors=2"));
        assert!(script.contains("retry 10 request -X PUT"));
        assert!(script.contains("node shutdown is supported as of 7.15.2"));
        assert!(script.contains(r#"[ "$major" -eq 7 ] && [ "$minor" -eq 15 ] && [ "$patch" -ge 2 ]"#));
        assert!(script.contains("PROBE_PASSWORD=$(</mnt/elastic-internal/probe-user/elastic-internal-probe)"));
        assert!(script.contains("ES_URL=https://quickstart-es-internal-http.search.svc:9200"));
    }

    #[test]
    fn test_config_map_and_content() {
        let es = cluster(json!({"eck.k8s.elastic.co/downward-node-labels": "topology.kubernetes.io/zone"}));
        let scripts = Scripts::render(&es).expect("scripts should render");
        let cm = scripts.config_map(&es);
        assert_eq!(cm.metadata.name.as_deref(), Some("quickstart-es-scripts"));
        let keys: Vec<&String> = cm.data.iter().flat_map(|d| d.keys()).collect();
        assert_eq!(
            keys,
            vec!["pre-stop-hook-script.sh", "prepare-fs.sh", "readiness-probe-script.sh"]
        );
        assert!(scripts
            .get(PREPARE_FS_SCRIPT)
            .is_some_and(|s| s.contains("REQUIRED_ANNOTATIONS")));
        assert!(scripts.content().starts_with("#!/usr/bin/env bash"));
        assert_eq!(Scripts::render(&es).expect("scripts should render"), scripts);
    }
}
