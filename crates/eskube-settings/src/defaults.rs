//! Controller-managed default settings and per-node-set configuration
//!
//! The defaults carry the settings the controller owns (identity, network
//! binding, paths, security). Users cannot override most of them because the
//! keys are denylisted at admission.

use semver::Version;

use eskube_common::crd::{Elasticsearch, NodeSet};
use eskube_common::version;

use crate::canonical::{merge, CanonicalConfig, Value};
use crate::error::SettingsError;
use crate::policy::PolicyConfig;

/// Elasticsearch configuration directory
pub const CONFIG_DIR: &str = "/usr/share/elasticsearch/config";
/// Default data path
pub const DATA_PATH: &str = "/usr/share/elasticsearch/data";
/// Default logs path
pub const LOGS_PATH: &str = "/usr/share/elasticsearch/logs";
/// Directory holding the node transport certificates
pub const TRANSPORT_CERTS_DIR: &str = "/usr/share/elasticsearch/config/transport-certs";
/// Directory holding the HTTP certificates
pub const HTTP_CERTS_DIR: &str = "/usr/share/elasticsearch/config/http-certs";

/// Default settings for a cluster at a version
pub fn default_config(
    cluster_name: &str,
    ver: &Version,
    http_tls: bool,
) -> Result<CanonicalConfig, SettingsError> {
    let mut cfg = CanonicalConfig::new();
    cfg.set("node.name", "${POD_NAME}")?;
    cfg.set("cluster.name", cluster_name)?;
    cfg.set("network.host", "0")?;
    cfg.set("network.publish_host", "${POD_IP}")?;
    cfg.set("path.data", DATA_PATH)?;
    cfg.set("path.logs", LOGS_PATH)?;

    if version::at_least(ver, 7, 0, 0) {
        cfg.set("discovery.seed_providers", "file")?;
        cfg.set("xpack.security.authc.realms.file.file1.order", -100i64)?;
        cfg.set("xpack.security.authc.realms.native.native1.order", -99i64)?;
    } else {
        cfg.set("discovery.zen.hosts_provider", "file")?;
    }

    cfg.set("xpack.security.enabled", "true")?;
    cfg.set("xpack.security.authc.reserved_realm.enabled", "false")?;

    cfg.set("xpack.security.transport.ssl.enabled", "true")?;
    cfg.set("xpack.security.transport.ssl.verification_mode", "certificate")?;
    cfg.set(
        "xpack.security.transport.ssl.key",
        format!("{TRANSPORT_CERTS_DIR}/${{POD_NAME}}.tls.key"),
    )?;
    cfg.set(
        "xpack.security.transport.ssl.certificate",
        format!("{TRANSPORT_CERTS_DIR}/${{POD_NAME}}.tls.crt"),
    )?;
    cfg.set(
        "xpack.security.transport.ssl.certificate_authorities",
        Value::List(vec![Value::from(format!("{TRANSPORT_CERTS_DIR}/ca.crt"))]),
    )?;

    cfg.set("xpack.security.http.ssl.enabled", http_tls.to_string())?;
    if http_tls {
        cfg.set("xpack.security.http.ssl.key", format!("{HTTP_CERTS_DIR}/tls.key"))?;
        cfg.set(
            "xpack.security.http.ssl.certificate",
            format!("{HTTP_CERTS_DIR}/tls.crt"),
        )?;
        cfg.set(
            "xpack.security.http.ssl.certificate_authorities",
            Value::List(vec![Value::from(format!("{HTTP_CERTS_DIR}/ca.crt"))]),
        )?;
    }

    Ok(cfg)
}

/// User configuration of a node set, canonicalized
pub fn user_config(node_set: &NodeSet) -> Result<CanonicalConfig, SettingsError> {
    CanonicalConfig::from_value(&node_set.config_value())
}

/// Full configuration of a node set: `defaults < policy < user`
pub fn node_set_config(
    es: &Elasticsearch,
    node_set: &NodeSet,
    policy: &PolicyConfig,
) -> Result<CanonicalConfig, SettingsError> {
    let ver = version::parse(&es.spec.version)
        .map_err(|e| SettingsError::invalid(format!("version {}: {e}", es.spec.version)))?;
    let cluster_name = es.metadata.name.as_deref().unwrap_or_default();
    let defaults = default_config(cluster_name, &ver, es.spec.http.tls.enabled())?;
    let user = user_config(node_set)?;
    let merged = merge(&defaults, policy.elasticsearch_config.as_ref(), &user);
    tracing::debug!(
        cluster = %cluster_name,
        node_set = %node_set.name,
        settings = merged.len(),
        "merged node set configuration"
    );
    Ok(merged)
}
